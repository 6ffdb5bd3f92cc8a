use auditlens_types::Value;

/// Decode a raw field value into a scalar or an ordered list of tokens.
///
/// Values containing `|` split on `|`; otherwise values containing `,`
/// split on `,`. Tokens are trimmed, and tokens that are empty or exactly
/// `-` (the agent's placeholder for "none") are dropped from lists. The
/// same filtering applies to both delimiters.
///
/// Scalars consisting solely of ASCII digits decode as `Value::Number`.
pub fn decode_value(raw: &str) -> Value {
    if raw.contains('|') {
        Value::List(split_tokens(raw, '|'))
    } else if raw.contains(',') {
        Value::List(split_tokens(raw, ','))
    } else {
        decode_scalar(raw)
    }
}

fn split_tokens(raw: &str, delimiter: char) -> Vec<Value> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|token| !token.is_empty() && *token != "-")
        .map(decode_scalar)
        .collect()
}

fn decode_scalar(token: &str) -> Value {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        // Oversized digit runs (agent counters are well below this) stay text.
        if let Ok(n) = token.parse::<i64>() {
            return Value::Number(n);
        }
    }
    Value::Text(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_stays_scalar() {
        assert_eq!(decode_value("Ubuntu"), Value::from("Ubuntu"));
    }

    #[test]
    fn digit_only_scalars_become_numbers() {
        assert_eq!(decode_value("65"), Value::Number(65));
        assert_eq!(decode_value("0"), Value::Number(0));
    }

    #[test]
    fn mixed_digit_text_stays_text() {
        assert_eq!(decode_value("6.5"), Value::from("6.5"));
        assert_eq!(decode_value("65a"), Value::from("65a"));
        assert_eq!(decode_value("-65"), Value::from("-65"));
    }

    #[test]
    fn pipe_delimited_values_split_into_lists() {
        assert_eq!(
            decode_value("sshd|cron|rsyslog"),
            Value::List(vec![
                Value::from("sshd"),
                Value::from("cron"),
                Value::from("rsyslog")
            ])
        );
    }

    #[test]
    fn comma_delimited_values_split_when_no_pipe_present() {
        assert_eq!(
            decode_value("192.168.1.10,192.168.1.11"),
            Value::List(vec![
                Value::from("192.168.1.10"),
                Value::from("192.168.1.11")
            ])
        );
    }

    #[test]
    fn pipe_wins_over_comma() {
        // A pipe-delimited value may contain commas inside a token.
        assert_eq!(
            decode_value("a,b|c"),
            Value::List(vec![Value::from("a,b"), Value::from("c")])
        );
    }

    #[test]
    fn tokens_are_trimmed() {
        assert_eq!(
            decode_value(" a | b "),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn empty_and_dash_tokens_are_dropped_for_both_delimiters() {
        assert_eq!(
            decode_value("a||-|b"),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            decode_value("a,,-,b"),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn all_placeholder_tokens_yield_an_empty_list() {
        assert_eq!(decode_value("-|-"), Value::List(vec![]));
    }

    #[test]
    fn digit_tokens_inside_lists_are_coerced() {
        assert_eq!(
            decode_value("22|80|443"),
            Value::List(vec![Value::Number(22), Value::Number(80), Value::Number(443)])
        );
    }

    #[test]
    fn trailing_delimiter_does_not_add_a_token() {
        assert_eq!(
            decode_value("a|b|"),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }
}

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use auditlens_core::{
    events_from_diff, ingest_report, visible_events, ReportStore, Settings,
};
use auditlens_domain::{check_compliance, validate_patterns, Ruleset};
use auditlens_report::parse_report;
use auditlens_types::{ConfigFile, Defaults, DiffResult};

mod config_loader;
mod env_expand;

use config_loader::{load_config_with_includes, merge_configs};

#[derive(Parser)]
#[command(name = "auditlens")]
#[command(about = "Fleet audit report parsing, diffing, and compliance", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a report and print the key/value map as JSON.
    Parse(ParseArgs),

    /// Diff two reports and print the added/removed/changed delta as JSON.
    Diff(DiffArgs),

    /// Ingest a report for a device: diff against its stored predecessor
    /// and update the local state directory.
    Ingest(IngestArgs),

    /// Filter a stored diff through the current silence rules and print the
    /// visible change events.
    Activity(ActivityArgs),

    /// Evaluate the configured rulesets against a report.
    Check(CheckArgs),

    /// Validate the configuration file (queries and glob patterns).
    Validate(ValidateArgs),

    /// Print the effective configuration (built-in + optional config merge).
    Rules(RulesArgs),
}

#[derive(Parser, Debug)]
struct ParseArgs {
    /// Report file, or '-' for stdin.
    report: PathBuf,
}

#[derive(Parser, Debug)]
struct DiffArgs {
    /// The previously stored report.
    old: PathBuf,

    /// The newly uploaded report.
    new: PathBuf,

    /// Exclude a key from the comparison entirely. Repeatable. Prefer
    /// silence rules: they filter at display time and stay reversible.
    #[arg(long = "ignore-key", action = clap::ArgAction::Append)]
    ignore_keys: Vec<String>,

    /// Where to write the diff JSON instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct IngestArgs {
    /// Report file, or '-' for stdin.
    report: PathBuf,

    /// Stable device identifier.
    #[arg(long)]
    host_id: String,

    /// Directory holding each device's latest stored report.
    #[arg(long, default_value = ".auditlens-state")]
    state_dir: PathBuf,

    /// Path to a config file. If omitted, uses ./auditlens.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable built-in silence rules and rulesets; only use the config file.
    #[arg(long)]
    no_default_rules: bool,
}

#[derive(Parser, Debug)]
struct ActivityArgs {
    /// Stored diff JSON file, or '-' for stdin.
    diff: PathBuf,

    /// Hostname of the device the diff belongs to.
    #[arg(long)]
    hostname: Option<String>,

    /// Path to a config file. If omitted, uses ./auditlens.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable built-in silence rules and rulesets; only use the config file.
    #[arg(long)]
    no_default_rules: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Report file, or '-' for stdin.
    report: PathBuf,

    /// Path to a config file. If omitted, uses ./auditlens.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable built-in silence rules and rulesets; only use the config file.
    #[arg(long)]
    no_default_rules: bool,

    #[arg(long, value_enum, default_value_t = CheckFormat::Json)]
    format: CheckFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CheckFormat {
    Json,
    Summary,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Path to a config file. If omitted, uses ./auditlens.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RulesArgs {
    /// Path to a config file. If omitted, uses ./auditlens.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable built-in silence rules and rulesets; only use the config file.
    #[arg(long)]
    no_default_rules: bool,

    #[arg(long, value_enum, default_value_t = RulesFormat::Toml)]
    format: RulesFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RulesFormat {
    Toml,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    match real_main(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

fn real_main(command: Commands) -> Result<i32> {
    match command {
        Commands::Parse(args) => {
            cmd_parse(args)?;
            Ok(0)
        }
        Commands::Diff(args) => {
            cmd_diff(args)?;
            Ok(0)
        }
        Commands::Ingest(args) => {
            cmd_ingest(args)?;
            Ok(0)
        }
        Commands::Activity(args) => {
            cmd_activity(args)?;
            Ok(0)
        }
        Commands::Check(args) => cmd_check(args),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Rules(args) => {
            cmd_rules(args)?;
            Ok(0)
        }
    }
}

/// Initialize tracing/logging based on CLI flags.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("logging initialized at level: {}", level);
}

/// Read a file argument, with '-' meaning stdin.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))
    }
}

fn load_config(path: Option<PathBuf>, no_default_rules: bool) -> Result<ConfigFile> {
    let config_path = path.or_else(|| {
        let p = PathBuf::from("auditlens.toml");
        p.exists().then_some(p)
    });

    let mut config = if no_default_rules {
        ConfigFile {
            includes: vec![],
            defaults: Defaults::default(),
            silence: vec![],
            ruleset: vec![],
        }
    } else {
        ConfigFile::built_in()
    };

    if let Some(path) = config_path {
        debug!("loading config from '{}'", path.display());
        let file_config = load_config_with_includes(&path, |text| {
            env_expand::expand_env_vars(text).map(|expanded| expanded.into_owned())
        })?;
        config = merge_configs(config, file_config);
    }

    Ok(config)
}

fn compile_rulesets(config: &ConfigFile) -> Result<Vec<Ruleset>> {
    config
        .ruleset
        .iter()
        .map(|rs| Ruleset::compile(rs).map_err(anyhow::Error::from))
        .collect()
}

fn parse_report_or_fail(text: &str) -> Result<auditlens_types::ParsedReport> {
    let report = parse_report(text);
    if report.is_empty() {
        bail!("could not parse report: no key=value lines found");
    }
    Ok(report)
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("render json")?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create '{}'", parent.display()))?;
                }
            }
            std::fs::write(path, json).with_context(|| format!("write '{}'", path.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_parse(args: ParseArgs) -> Result<()> {
    let text = read_input(&args.report)?;
    let report = parse_report_or_fail(&text)?;
    info!(keys = report.len(), "report parsed");
    write_json(&report, None)
}

fn cmd_diff(args: DiffArgs) -> Result<()> {
    let old_text = read_input(&args.old)?;
    let new_text = read_input(&args.new)?;

    let ignore_keys: BTreeSet<String> = args.ignore_keys.into_iter().collect();
    let diff = auditlens_domain::compare_reports(&old_text, &new_text, &ignore_keys);

    info!(changes = diff.change_count(), "diff computed");
    write_json(&diff, args.out.as_deref())
}

/// File-per-device store under a state directory: the CLI stand-in for the
/// service's report storage.
struct FsReportStore {
    state_dir: PathBuf,
}

impl FsReportStore {
    fn report_path(&self, host_id: &str) -> PathBuf {
        self.state_dir.join(format!("{host_id}.report"))
    }
}

impl ReportStore for FsReportStore {
    fn latest_report(&self, host_id: &str) -> Result<Option<String>> {
        let path = self.report_path(host_id);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("read '{}'", path.display()))
    }

    fn store_report(&mut self, host_id: &str, report_text: &str) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("create '{}'", self.state_dir.display()))?;
        let path = self.report_path(host_id);
        std::fs::write(&path, report_text).with_context(|| format!("write '{}'", path.display()))
    }
}

fn cmd_ingest(args: IngestArgs) -> Result<()> {
    if args.host_id.is_empty()
        || !args
            .host_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!("host id must be non-empty and contain only [A-Za-z0-9._-]");
    }

    let text = read_input(&args.report)?;
    let config = load_config(args.config, args.no_default_rules)?;
    let settings = Settings::resolve(&config.defaults);

    let mut store = FsReportStore {
        state_dir: args.state_dir,
    };
    let outcome = ingest_report(&mut store, &args.host_id, &text, &settings)?;

    write_json(&outcome, None)
}

fn cmd_activity(args: ActivityArgs) -> Result<()> {
    let diff_text = read_input(&args.diff)?;
    let diff: DiffResult = serde_json::from_str(&diff_text).context("parse diff json")?;

    let config = load_config(args.config, args.no_default_rules)?;
    let events = events_from_diff(args.hostname.as_deref(), Utc::now(), &diff);
    let visible = visible_events(&events, &config.silence);

    info!(
        total = events.len(),
        visible = visible.len(),
        "silence rules applied"
    );
    write_json(&visible, None)
}

fn cmd_check(args: CheckArgs) -> Result<i32> {
    let text = read_input(&args.report)?;
    let report = parse_report_or_fail(&text)?;

    let config = load_config(args.config, args.no_default_rules)?;
    let rulesets = compile_rulesets(&config)?;

    // An evaluation fault is an error (exit 2), never "non-compliant".
    let result = check_compliance(&rulesets, &report)?;

    match args.format {
        CheckFormat::Json => write_json(&result, None)?,
        CheckFormat::Summary => {
            for ruleset in &result.rulesets {
                let status = if ruleset.compliant { "pass" } else { "FAIL" };
                println!("{status}  {}", ruleset.name);
                for rule in &ruleset.rules {
                    let mark = match rule.compliant {
                        Some(true) => "pass",
                        Some(false) => "FAIL",
                        None => "skip",
                    };
                    println!("  {mark}  {}", rule.name);
                }
            }
            println!(
                "overall: {}",
                if result.compliant {
                    "compliant"
                } else {
                    "non-compliant"
                }
            );
        }
    }

    Ok(if result.compliant { 0 } else { 1 })
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    let config_path = args.config.or_else(|| {
        let p = PathBuf::from("auditlens.toml");
        p.exists().then_some(p)
    });

    let Some(path) = config_path else {
        bail!("no configuration file found; specify --config or create auditlens.toml");
    };

    let config = load_config_with_includes(&path, |text| {
        env_expand::expand_env_vars(text).map(|expanded| expanded.into_owned())
    })?;

    let mut problems = 0usize;

    for ruleset in &config.ruleset {
        if let Err(err) = Ruleset::compile(ruleset) {
            eprintln!("invalid: {err}");
            problems += 1;
        }
    }

    for rule in &config.silence {
        if let Err(err) = validate_patterns(rule) {
            eprintln!(
                "invalid: silence rule '{}' has a bad glob: {err}",
                rule.key_pattern
            );
            problems += 1;
        }
    }

    if problems > 0 {
        println!(
            "{problems} problem(s) in '{}' ({} ruleset(s), {} silence rule(s) checked)",
            path.display(),
            config.ruleset.len(),
            config.silence.len()
        );
        return Ok(1);
    }

    println!(
        "ok: {} ruleset(s), {} silence rule(s)",
        config.ruleset.len(),
        config.silence.len()
    );
    Ok(0)
}

fn cmd_rules(args: RulesArgs) -> Result<()> {
    let config = load_config(args.config, args.no_default_rules)?;

    match args.format {
        RulesFormat::Toml => {
            let rendered = toml::to_string_pretty(&config).context("render toml")?;
            print!("{rendered}");
        }
        RulesFormat::Json => {
            let rendered = serde_json::to_string_pretty(&config).context("render json")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

//! Common fixtures: realistic report texts and a small builder.

/// A representative audit report as uploaded by a fleet agent.
pub const SAMPLE_REPORT: &str = "\
# audit report
report_version_major=1
report_version_minor=0
hostname=web-1
os=Linux
os_fullname=Ubuntu 24.04 LTS
os_version=24.04
hardening_index=65
firewall_installed=1
default_gateway[]=192.168.1.1
network_ipv4_address[]=192.168.1.10
network_ipv4_address[]=10.0.0.5
automation_tool_running[]=ansible
warning[]=W0001|Reboot required|
suggestion[]=S0001|Install a PAM module|
report_datetime_start=2024-02-20 08:00:00
report_datetime_end=2024-02-20 08:03:12
uptime_in_seconds=86400
";

/// The same host one upload later: the hardening index moved, a warning was
/// resolved, a package list appeared, and the volatile keys all changed.
pub const SAMPLE_REPORT_UPDATED: &str = "\
# audit report
report_version_major=1
report_version_minor=0
hostname=web-1
os=Linux
os_fullname=Ubuntu 24.04 LTS
os_version=24.04
hardening_index=70
firewall_installed=1
default_gateway[]=192.168.1.1
network_ipv4_address[]=192.168.1.10
network_ipv4_address[]=10.0.0.5
automation_tool_running[]=ansible
suggestion[]=S0001|Install a PAM module|
installed_packages=openssh|vim|curl
report_datetime_start=2024-02-27 08:00:00
report_datetime_end=2024-02-27 08:02:58
uptime_in_seconds=691200
";

/// Line-oriented builder for report texts in tests.
#[derive(Debug, Default, Clone)]
pub struct ReportBuilder {
    lines: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plain `key=value` line.
    pub fn entry(mut self, key: &str, value: &str) -> Self {
        self.lines.push(format!("{key}={value}"));
        self
    }

    /// A `key[]=value` list line.
    pub fn list_entry(mut self, key: &str, value: &str) -> Self {
        self.lines.push(format!("{key}[]={value}"));
        self
    }

    /// A `#`-prefixed comment line.
    pub fn comment(mut self, text: &str) -> Self {
        self.lines.push(format!("# {text}"));
        self
    }

    /// A raw line, exactly as given.
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

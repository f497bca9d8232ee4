/// Monitoring-plugin severity of a check run.
///
/// The discriminants are the process exit codes expected by Nagios-compatible
/// schedulers and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Verdict {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The single line and verdict emitted for a whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    verdict: Verdict,
    message: String,
}

impl CheckReport {
    pub fn new(verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            message: message.into(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn write_to<W: std::io::Write>(&self, output: &mut W) -> std::io::Result<()> {
        writeln!(output, "{}", self.message.trim())
    }
}

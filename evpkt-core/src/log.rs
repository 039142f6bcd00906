//! Leveled diagnostics.
//!
//! Usage errors inside the codec (bad slot index, double validation, negative
//! header values, ...) never panic. They are reported here at
//! [`LogLevel::Critical`] and the offending call turns into a no-op.
//!
//! Messages are filtered against a process-wide minimum severity and then
//! forwarded to [`tracing`], carrying `subsystem` and `severity` fields. With
//! the `log-none` feature every call site inside the crate is compiled out.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Syslog-style severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl LogLevel {
    /// Converts a raw level number. Values above 7 are rejected.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Emergency),
            1 => Some(Self::Alert),
            2 => Some(Self::Critical),
            3 => Some(Self::Error),
            4 => Some(Self::Warning),
            5 => Some(Self::Notice),
            6 => Some(Self::Info),
            7 => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "EMERGENCY",
            Self::Alert => "ALERT",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown log level: {0}")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Accepts level names in any case ("critical", "WARNING") or the
    /// numeric value ("2").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        if let Ok(value) = name.parse::<u8>() {
            return Self::from_u8(value).ok_or_else(|| ParseLogLevelError(s.to_string()));
        }

        match name.as_str() {
            "EMERGENCY" => Ok(Self::Emergency),
            "ALERT" => Ok(Self::Alert),
            "CRITICAL" => Ok(Self::Critical),
            "ERROR" => Ok(Self::Error),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "NOTICE" => Ok(Self::Notice),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Error as u8);

/// Sets the process-wide minimum severity. Messages less severe than
/// `level` are dropped.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the process-wide minimum severity (default: [`LogLevel::Error`]).
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed)).unwrap_or(LogLevel::Debug)
}

/// Returns true if a message at `level` passes the current threshold.
#[inline]
pub fn is_enabled(level: LogLevel) -> bool {
    level <= log_level()
}

/// Emits `message` for `subsystem` if `level` passes the threshold.
pub fn log(level: LogLevel, subsystem: &str, message: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }

    let severity = level.as_str();
    match level {
        LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
            tracing::error!(subsystem = subsystem, severity = severity, "{}", message)
        }
        LogLevel::Warning => {
            tracing::warn!(subsystem = subsystem, severity = severity, "{}", message)
        }
        LogLevel::Notice | LogLevel::Info => {
            tracing::info!(subsystem = subsystem, severity = severity, "{}", message)
        }
        LogLevel::Debug => {
            tracing::debug!(subsystem = subsystem, severity = severity, "{}", message)
        }
    }
}

/// Reports a usage error at [`LogLevel::Critical`].
macro_rules! critical {
    ($subsystem:expr, $($arg:tt)+) => {{
        #[cfg(not(feature = "log-none"))]
        $crate::log::log($crate::log::LogLevel::Critical, $subsystem, format_args!($($arg)+));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Emergency < LogLevel::Critical);
        assert!(LogLevel::Critical < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Debug);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("7".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("8".parse::<LogLevel>().is_err());
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(LogLevel::from_u8(0), Some(LogLevel::Emergency));
        assert_eq!(LogLevel::from_u8(3), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_u8(42), None);
    }

    #[test]
    fn test_default_threshold_lets_critical_through() {
        // Unit tests share the process; only read the default here.
        assert!(is_enabled(LogLevel::Critical));
        assert!(!is_enabled(LogLevel::Debug));
    }
}

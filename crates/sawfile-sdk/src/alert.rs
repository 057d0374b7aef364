//! Operator alerting.
//!
//! Alerts are the operator-facing side of integrity failures, separate from
//! diagnostic logging. The host injects a sink when opening
//! [`Keys`](crate::Keys); [`LogAlertSink`] is used when none is given.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Severity of an operator alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Receiver of operator alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, level: AlertLevel, message: &str);
}

/// Forwards alerts to `tracing` under the `sawfile::alert` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Info => info!(target: "sawfile::alert", "{message}"),
            AlertLevel::Warning => warn!(target: "sawfile::alert", "{message}"),
            AlertLevel::Critical => error!(target: "sawfile::alert", "{message}"),
        }
    }
}

/// One recorded alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Collects alerts in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every alert raised so far, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().expect("alert mutex poisoned").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.message).collect()
    }

    pub fn clear(&self) {
        self.alerts.lock().expect("alert mutex poisoned").clear();
    }
}

impl AlertSink for MemoryAlertSink {
    fn alert(&self, level: AlertLevel, message: &str) {
        self.alerts.lock().expect("alert mutex poisoned").push(Alert {
            level,
            message: message.to_string(),
        });
    }
}

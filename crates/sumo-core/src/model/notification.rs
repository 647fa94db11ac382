// ── Notifications ──
//
// Everything the workers tell the presentation layer. Fire-and-forget:
// the core never waits for acknowledgment.

use serde::Serialize;

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A modal message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialog {
    pub title: String,
    /// Body text; may contain simple HTML for rich presenters.
    pub message: String,
    /// Raw diagnostic text, empty when there is nothing to troubleshoot.
    pub details: String,
    /// Image reference shown beside the message.
    pub image: Option<String>,
}

impl Dialog {
    /// An error dialog listing remediation `hints` as bullet lines.
    pub fn error(title: impl Into<String>, hints: &[&str], details: impl Into<String>) -> Self {
        let message = hints
            .iter()
            .map(|h| format!("* {h}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            title: title.into(),
            message,
            details: details.into(),
            image: None,
        }
    }
}

/// Device presence transitions and session bootstrap results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PortEvent {
    Connected(String),
    Disconnected,
    NetworksLoaded(Vec<String>),
}

/// A single message on the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Status { severity: Severity, text: String },
    Dialog(Dialog),
    Port(PortEvent),
}

impl Notification {
    pub fn status(severity: Severity, text: impl Into<String>) -> Self {
        Self::Status {
            severity,
            text: text.into(),
        }
    }

    /// The severity of a status message, `None` for other kinds.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Status { severity, .. } => Some(*severity),
            _ => None,
        }
    }
}

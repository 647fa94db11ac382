//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use sumo_config::ConfigError;
use sumo_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NO_DEVICE: i32 = 3;
    pub const UPDATE_FAILED: i32 = 4;
    pub const CONFIG: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("No SumoRobot found within {seconds}s")]
    #[diagnostic(
        code(sumo::no_device),
        help(
            "Connect the SumoRobot with a USB cable.\n\
             Run: sumo ports   to see which serial ports are visible"
        )
    )]
    NoDevice { seconds: u64 },

    #[error("The {kind} failed")]
    #[diagnostic(code(sumo::update_failed))]
    UpdateFailed {
        kind: String,
        #[help]
        hint: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(sumo::rejected))]
    Rejected { message: String },

    #[error("{message}")]
    #[diagnostic(code(sumo::operation))]
    Operation {
        message: String,
        #[help]
        hint: Option<String>,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sumo::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(sumo::config_exists),
        help("Use --force to overwrite it, or edit it in place.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(sumo::config), help("Run: sumo config show"))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Interrupted")]
    #[diagnostic(code(sumo::interrupted))]
    Interrupted,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoDevice { .. } => exit_code::NO_DEVICE,
            Self::UpdateFailed { .. } => exit_code::UPDATE_FAILED,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ConfigExists { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::NotConnected => Self::NoDevice { seconds: 0 },
            CoreError::UpdateInProgress { .. } => Self::Rejected {
                message: err.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },
            other => Self::Operation {
                message: other.to_string(),
                hint: other.hint().map(str::to_owned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_hint() {
        let err = CliError::from(CoreError::NetworkFetch {
            reason: "HTTP 503".into(),
        });
        match &err {
            CliError::Operation { message, hint } => {
                assert!(message.contains("HTTP 503"));
                assert_eq!(hint.as_deref(), Some("Check your Internet connection"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn validation_is_a_usage_error() {
        let err = CliError::from(CoreError::Validation {
            field: "password".into(),
            reason: "password must not be empty".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}

use thiserror::Error;

/// Top-level error type for the `sumo-api` crate.
///
/// Covers every failure mode of the firmware distribution endpoints:
/// transport, HTTP status, URL handling, and index page scraping.
/// `sumo-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing or joining error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    // ── Index scraping ──────────────────────────────────────────────
    /// No line of the index page carried the firmware marker.
    #[error("No line containing '{marker}' found on {url}")]
    MarkerNotFound { marker: String, url: String },

    /// A line carried the marker but no quoted link could be extracted.
    #[error("Line containing '{marker}' has no quoted link: {line}")]
    MalformedLink { marker: String, line: String },
}

impl Error {
    /// Returns `true` if this error comes from resolving the binary link,
    /// as opposed to fetching bytes.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::MarkerNotFound { .. } | Self::MalformedLink { .. })
    }

    /// Returns `true` if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }
}

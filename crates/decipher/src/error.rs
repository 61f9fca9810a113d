use std::io;

/// Every way an analysis can fail. The `Display` text is what the page shows.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Could not read the image: {0}")]
    Read(#[from] io::Error),
    #[error("No API key configured. Set GEMINI_API_KEY or add a key to config.toml.")]
    MissingApiKey,
    #[error("Request timed out. Try again.")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("{}", status_message(.status))]
    Status { status: u16 },
    #[error("Unexpected API response.")]
    Malformed,
    #[error("Empty response from API.")]
    Empty,
    #[error("{0}")]
    Other(String),
}

fn status_message(status: &u16) -> String {
    match *status {
        400 => "Bad request. The image may be unsupported.".into(),
        401 | 403 => "Invalid API key. Check GEMINI_API_KEY.".into(),
        429 => "Rate limited. Wait a moment and try again.".into(),
        500 | 503 => "API server error. Try again.".into(),
        code => format!("API error (HTTP {code})."),
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed
        } else {
            Self::Network(e.to_string())
        }
    }
}

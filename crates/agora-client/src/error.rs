use thiserror::Error;

/// Failure talking to a run service.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// An `error` event sent by the server inside the stream.
    #[error("remote run error: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RunError {
    /// Whether the server no longer knows the session (or assistant) the request named.
    ///
    /// A 404 status, or error text mentioning `404` / `not found` in any case.
    pub fn is_session_missing(&self) -> bool {
        if let RunError::Http { status: 404, .. } = self {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("404") || text.contains("not found")
    }
}

impl From<reqwest::Error> for RunError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RunError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None if e.is_decode() => RunError::Decode(e.to_string()),
            None => RunError::Transport(e.to_string()),
        }
    }
}

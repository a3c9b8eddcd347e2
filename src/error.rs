// Error taxonomy for a single upload run.
// - Validation errors describe bad local input and are never sent over the
//   network.
// - Transport errors mean the HTTP exchange did not complete.
// A completed exchange with a non-2xx status is not an error; see
// `api::UploadResult::exit_code`.

use std::path::PathBuf;

/// Exit code when the server answered with a 2xx status.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when the server answered with any other status.
pub const EXIT_SERVER_FAILURE: u8 = 1;
/// Exit code for local validation failures.
pub const EXIT_VALIDATION: u8 = 2;
/// Exit code when the request never completed.
pub const EXIT_TRANSPORT: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("audio file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("audio path is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("missing --token (or ICAD_API_KEY env var).")]
    MissingToken,

    /// The token contains bytes that cannot travel in an HTTP header.
    #[error("token is not a valid HTTP header value")]
    InvalidToken,

    #[error("cannot read audio file {}: {source}", path.display())]
    AudioUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Transport(String),
}

impl UploadError {
    /// Whether the failure happened before anything was sent.
    pub fn is_validation(&self) -> bool {
        !matches!(self, UploadError::Transport(_))
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_validation() {
            EXIT_VALIDATION
        } else {
            EXIT_TRANSPORT
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        // The top-level reqwest message hides the cause ("error sending
        // request"), so walk the chain for the useful part.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        UploadError::Transport(message)
    }
}

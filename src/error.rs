use std::process::ExitStatus;

use crate::model::vod::VideoId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the login, second-factor and logout calls.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account disabled")]
    AccountDisabled,

    #[error("blocked")]
    Blocked,

    #[error("second factor failed")]
    SecondFactorFailed,

    /// Unknown or missing `RESULT` code.
    #[error("login failed")]
    LoginFailed { code: Option<i64> },

    #[error("could not reach the login server: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("could not log out: {0}")]
    Logout(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid VOD URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: &'static str },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("no downloadable segments for VOD {video_id}")]
    EmptyManifest { video_id: VideoId },

    #[error("{operation} request failed: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("segment {index} download exited with {status}")]
    SegmentDownload { index: usize, status: ExitStatus },

    #[error("download cancelled before any part was fetched")]
    Cancelled,

    #[error("concatenation exited with {status}")]
    Concat { status: ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn http(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Error::Http { operation, source }
    }

    /// Whether the host loop can move on to the next URL after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Spawn { .. })
    }
}

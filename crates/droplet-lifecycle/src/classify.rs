//! Mapping of remote call failures onto retry/propagate decisions.

use std::fmt;

/// Failure reported by a [`ComputeClient`](crate::ComputeClient) call.
///
/// `status` is the HTTP status when the provider answered; `None` means the
/// request never got a response (connect failure, reset, client timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub status: Option<u16>,
    pub message: String,
}

impl ClientError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        classify(self)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ClientError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource does not exist (any more, or yet).
    NotFound,
    /// Permanent; the request must change before it can succeed.
    RemoteRejected,
    /// Temporary server or network fault, safe to retry inside a poll.
    Transient,
    /// A local deadline expired.
    Timeout,
}

pub fn classify(err: &ClientError) -> ErrorClass {
    match err.status {
        Some(404) => ErrorClass::NotFound,
        Some(408 | 429) => ErrorClass::Transient,
        Some(400..=499) => ErrorClass::RemoteRejected,
        Some(_) | None => ErrorClass::Transient,
    }
}

use thiserror::Error;

use crate::models::Status;

#[derive(Debug, Error)]
pub enum AgendaError {
    /// Transport-level failure: connect, timeout, or body decode.
    #[error("network error: {0}")]
    Fetch(String),

    /// Non-2xx response, carrying the backend's error message when present.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 401. The session is gone; callers redirect to login instead of toasting.
    #[error("session expired")]
    SessionExpired,

    #[error("resource not found")]
    NotFound,

    /// Rejected locally, before any network call is made.
    #[error("cannot {action} an appointment that is {from}")]
    InvalidTransition { from: Status, action: String },

    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// A mutation for this appointment has not resolved yet.
    #[error("appointment {0} already has an update in flight")]
    UpdateInFlight(i64),

    /// The backend rejected a mutation that passed local validation.
    #[error("update rejected by backend: {0}")]
    RemoteUpdate(#[source] Box<AgendaError>),
}

impl From<reqwest::Error> for AgendaError {
    fn from(e: reqwest::Error) -> Self {
        AgendaError::Fetch(e.to_string())
    }
}

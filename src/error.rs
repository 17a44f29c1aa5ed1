//! Error codes carried on `error` events.

use frames::Event;

/// Stable, grepable code for an error sent to a client.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Build the `error` event for `err`.
pub fn error_event(err: &(impl ErrorCode + ?Sized)) -> Event {
    Event::error(err.error_code(), err.to_string())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for security-group rule management
//!
//! For failures of the port-range language itself, see [`PortRangeError`].
//!
//! [`PortRangeError`]: super::PortRangeError

use std::fmt::Display;

/// An error that can be generated while synchronizing rules with the registry
///
/// This is the error convention callers see.  Failures reported by the
/// registry (or by the transport used to reach it) are translated into one of
/// these variants as soon as they're received, so that the rest of the system
/// remains agnostic to how the registry is reached.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request was well-formed, but the operation cannot be completed given
    /// the current state of the registry.
    #[error("Invalid Request: {message}")]
    InvalidRequest { message: String },
    /// Authentication credentials were required but either missing or invalid.
    #[error("Missing or invalid credentials")]
    Unauthenticated { internal_message: String },
    /// The specified input field is not valid.
    #[error("Invalid Value: {label}, {message}")]
    InvalidValue { label: String, message: String },
    /// The request is not authorized to perform the requested operation.
    #[error("Forbidden")]
    Forbidden,

    /// The system encountered an unhandled operational error.
    #[error("Internal Error: {internal_message}")]
    InternalError { internal_message: String },
    /// The registry (or part of it) is unavailable.
    #[error("Service Unavailable: {internal_message}")]
    ServiceUnavailable { internal_message: String },
}

impl Error {
    /// Returns whether the error is likely transient and could reasonably be
    /// retried
    ///
    /// Nothing in this workspace retries on its own; this exists for callers
    /// that layer a retry policy on top.
    pub fn retryable(&self) -> bool {
        match self {
            Error::ServiceUnavailable { .. } => true,

            Error::Unauthenticated { .. }
            | Error::InvalidRequest { .. }
            | Error::InvalidValue { .. }
            | Error::Forbidden
            | Error::InternalError { .. } => false,
        }
    }

    /// Generates an [`Error::InternalError`] error with the specific message
    ///
    /// InternalError should be used for operational conditions that should not
    /// happen but that we cannot reasonably handle at runtime (e.g., failing
    /// to reach the registry, or getting a response we can't interpret).
    pub fn internal_error(internal_message: &str) -> Error {
        Error::InternalError { internal_message: internal_message.to_owned() }
    }

    /// Generates an [`Error::InvalidRequest`] error with the specific message
    ///
    /// This should be used for failures due possibly to invalid client input
    /// or malformed requests.
    pub fn invalid_request(message: &str) -> Error {
        Error::InvalidRequest { message: message.to_owned() }
    }

    /// Generates an [`Error::InvalidValue`] error for the input field `label`
    pub fn invalid_value(label: &str, message: &str) -> Error {
        Error::InvalidValue {
            label: label.to_owned(),
            message: message.to_owned(),
        }
    }

    /// Generates an [`Error::ServiceUnavailable`] error with the specific
    /// message
    ///
    /// This should be used for transient failures where the caller might be
    /// expected to retry.  Logic errors or other problems indicating that a
    /// retry would not work should probably be an InternalError (if it's a
    /// registry problem) or InvalidRequest (if it's a client problem) instead.
    pub fn unavail(message: &str) -> Error {
        Error::ServiceUnavailable { internal_message: message.to_owned() }
    }

    /// Given an [`Error`] with an internal message, return the same error with
    /// `context` prepended to it
    ///
    /// Errors without an internal message are returned unchanged.
    pub fn internal_context<C>(mut self, context: C) -> Error
    where
        C: Display + Send + Sync + 'static,
    {
        if let Some(message) = self.internal_message_mut() {
            *message = format!("{}: {}", context, message);
        }
        self
    }

    fn internal_message_mut(&mut self) -> Option<&mut String> {
        match self {
            Error::Unauthenticated { internal_message }
            | Error::InternalError { internal_message }
            | Error::ServiceUnavailable { internal_message } => {
                Some(internal_message)
            }
            Error::InvalidRequest { .. }
            | Error::InvalidValue { .. }
            | Error::Forbidden => None,
        }
    }
}

/// Adds context to the internal message of a failed [`Result`]
///
/// Unlike `anyhow::Context`, this does not add a new error to the cause chain:
/// the [`Error`] keeps its variant and only its `internal_message` changes.
///
/// ```
/// use sgroups_common::api::external::Error;
/// use sgroups_common::api::external::InternalContext;
///
/// let result: Result<(), Error> = Err(Error::unavail("registry restarting"));
/// let error = result.internal_context("upsert via registry").unwrap_err();
/// assert!(error.retryable());
/// assert_eq!(
///     error.to_string(),
///     "Service Unavailable: upsert via registry: registry restarting"
/// );
/// ```
pub trait InternalContext<T> {
    fn internal_context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;

    fn with_internal_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> InternalContext<T> for Result<T, Error> {
    fn internal_context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|error| error.internal_context(context))
    }

    fn with_internal_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.internal_context(f()))
    }
}

#[cfg(test)]
mod test {
    use super::Error;
    use super::InternalContext;

    #[test]
    fn test_context() {
        let error = Error::internal_error("database is locked")
            .internal_context("delete via registry");
        assert_eq!(
            error,
            Error::internal_error("delete via registry: database is locked")
        );

        let result: Result<(), Error> = Err(Error::Unauthenticated {
            internal_message: "token expired".to_string(),
        });
        let mut calls = 0;
        let error = result
            .with_internal_context(|| {
                calls += 1;
                "upsert"
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(
            error,
            Error::Unauthenticated {
                internal_message: "upsert: token expired".to_string()
            }
        );

        // Errors meant for the user are left alone.
        let result: Result<(), Error> =
            Err(Error::invalid_request("no such group"));
        assert_eq!(
            result.internal_context("upsert").unwrap_err(),
            Error::invalid_request("no such group")
        );
        assert_eq!(
            Error::Forbidden.internal_context("upsert"),
            Error::Forbidden
        );

        // The context is only built when there is an error.
        let result: Result<u16, Error> = Ok(80);
        let value = result
            .with_internal_context(|| -> String { panic!("not an error") })
            .unwrap();
        assert_eq!(value, 80);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::unavail("registry restarting").retryable());
        assert!(!Error::internal_error("boom").retryable());
        assert!(!Error::invalid_value("ports-from", "bad").retryable());
        assert!(!Error::Forbidden.retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::invalid_value("ports-to", "'80-', bad").to_string(),
            "Invalid Value: ports-to, '80-', bad"
        );
        assert_eq!(
            Error::invalid_request("no such group").to_string(),
            "Invalid Request: no such group"
        );
    }
}

//! Error classification shared by the library, the CLI and the webhook server.
//!
//! Errors are `anyhow::Error` all the way through. When an error needs to be told apart by a
//! caller (a validation failure shown to the user, a bad webhook signature mapped to a 400), it is
//! tagged with an `ErrorType` through `IntoResult::pub_result` and recovered with `error_type`.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Missing or malformed user input. Nothing was changed.
    Validation,
    /// A category with the same identity already exists. Nothing was changed.
    Conflict,
    /// Reading or writing the local store failed.
    Storage,
    /// A backup artifact could not be read or does not have the expected shape.
    Backup,
    /// The data directory or its config file is missing or invalid.
    Config,
    /// An inbound webhook failed signature verification.
    Signature,
    /// The billing provider or the hosted database returned an error.
    Upstream,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// An error that carries an `ErrorType` alongside its source chain.
pub struct TypedError {
    kind: ErrorType,
    source: Error,
}

impl TypedError {
    pub fn kind(&self) -> ErrorType {
        self.kind
    }
}

impl Debug for TypedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.kind, self.source)
    }
}

impl Display for TypedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // `{:#}` prints the whole context chain on one line.
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for TypedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// Attaches an `ErrorType` to the error side of a result.
pub trait IntoResult<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn pub_result(self, kind: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let source = e.into();
            // Keep the innermost classification if the error was already tagged.
            if error_type(&source).is_some() {
                return source;
            }
            Error::new(TypedError { kind, source })
        })
    }
}

/// Creates a tagged error from a message.
pub fn typed(kind: ErrorType, message: impl Display) -> Error {
    Error::new(TypedError {
        kind,
        source: anyhow::anyhow!("{message}"),
    })
}

/// Returns the `ErrorType` of `err`, looking through any context added after tagging.
pub fn error_type(err: &Error) -> Option<ErrorType> {
    err.chain()
        .find_map(|e| e.downcast_ref::<TypedError>())
        .map(TypedError::kind)
}

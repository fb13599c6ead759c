use thiserror::Error;

/// Error surface of the client core. Nothing here is fatal: every
/// variant is meant to be rendered by the presentation layer. Stale
/// responses are not represented; they are discarded without error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required field was missing or malformed; no request was issued.
    #[error("{0}")]
    Validation(String),

    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with `success: false`; carries the
    /// service-supplied message when there was one.
    #[error("{0}")]
    Backend(String),

    #[error("no server selected")]
    NoServerSelected,

    #[error("nothing selected")]
    NothingSelected,

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("cannot select a directory: {0}")]
    NotAFile(String),

    /// The entry does not belong to the current listing snapshot.
    #[error("entry is not part of the current listing: {0}")]
    UnknownEntry(String),
}

use thiserror::Error;

use crate::message::MessageError;

/// Topic/payload parsing failures.
///
/// Produced at the dispatch boundary; the connection engine drops the
/// offending message with a diagnostic instead of terminating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Topic matched none of the convention's grammar shapes.
    #[error("provided topic \"{topic}\" is not a valid v1 convention topic")]
    UnsupportedTopic {
        /// The rejected topic
        topic: String,
    },

    /// Topic shape matched but the payload or a captured attribute was
    /// invalid for it.
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Convenient Result type for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

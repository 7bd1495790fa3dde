//! Wire format error types.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or building DNS wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer is too short to contain the expected data.
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort {
        /// Expected minimum size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Unexpected end of data while parsing.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof {
        /// Byte offset where the data ran out.
        offset: usize,
    },

    /// Label exceeds the 63-byte limit.
    #[error("label too long: {length} bytes exceeds maximum of 63")]
    LabelTooLong {
        /// Actual label length.
        length: usize,
    },

    /// Name exceeds the 255-byte wire limit.
    #[error("name too long: {length} bytes exceeds maximum of 255")]
    NameTooLong {
        /// Actual wire length.
        length: usize,
    },

    /// Empty label in the middle of a name.
    #[error("empty label at position {position}")]
    EmptyLabel {
        /// Position of the offending label.
        position: usize,
    },

    /// A compression pointer that points forward or at itself.
    #[error("invalid compression pointer at offset {offset}: points to {target}")]
    InvalidPointer {
        /// Offset of the pointer.
        offset: usize,
        /// Offset the pointer references.
        target: usize,
    },

    /// Too many compression pointer jumps (loop suspected).
    #[error("too many compression jumps (more than {max_jumps})")]
    TooManyPointerJumps {
        /// The jump ceiling that was exceeded.
        max_jumps: usize,
    },

    /// Reserved or unknown label type bits.
    #[error("invalid label type 0x{label_type:02X} at offset {offset}")]
    InvalidLabelType {
        /// Offset of the length byte.
        offset: usize,
        /// The raw length byte.
        label_type: u8,
    },

    /// Anything else that makes the data unusable.
    #[error("invalid data at offset {offset}: {message}")]
    InvalidData {
        /// Byte offset of the invalid data.
        offset: usize,
        /// What was wrong with it.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::BufferTooShort`].
    pub fn buffer_too_short(expected: usize, actual: usize) -> Self {
        Self::BufferTooShort { expected, actual }
    }

    /// Shorthand for [`Error::InvalidData`].
    pub fn invalid_data(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidData {
            offset,
            message: message.into(),
        }
    }
}

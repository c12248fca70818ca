/// Errors raised while encoding or decoding chunks and addresses.
///
/// ```text
///   WireError
///   ├── UnexpectedEof    ← fewer than 8 bytes, no room for the span
///   ├── PayloadTooLarge  ← payload longer than CHUNK_SIZE
///   ├── InvalidAddress   ← wrong width or bad hex digits
///   └── Io               ← from the underlying writer
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before the 8-byte span prefix could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// A chunk payload exceeded the fixed maximum.
    #[error("chunk payload too large ({size} bytes, limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// An address could not be built from the given bytes or text.
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    /// I/O error during read or write.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

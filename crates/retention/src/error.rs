use thiserror::Error;

/// Failure decoding a persisted retention record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The chunk set field exists but is not an array.
    #[error("chunk_set is not an array")]
    NotAnArray,
    /// An entry of the chunk set is not a 64-bit integer.
    #[error("chunk_set entry {index} is not a 64-bit integer")]
    NotAnInteger {
        /// Position of the offending entry.
        index: usize,
    },
}

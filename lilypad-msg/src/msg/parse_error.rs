/// Errors encounterable while parsing an option stream
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// A delta or length nibble was the reserved value 15 outside of a
  /// payload marker
  ReservedNibble,
  /// A delta/length extension or an option value ran past the end of
  /// the buffer
  UnexpectedEndOfStream,
  /// More options on the wire than the index array can hold
  TooManyOptions(usize),
  /// Accumulating deltas overflowed the option-number range
  NumberOverflow,
}

impl OptParseError {
  /// Shorthand for [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Version field was not 1
  InvalidVersion(u8),

  /// The message type field is invalid (see [`super::Type`])
  InvalidType(u8),

  /// Token length was > 8
  InvalidTokenLength(u8),

  /// A `0.00` message carried more than the bare header
  NonEmptyEmptyMessage,

  /// Error parsing the option stream
  OptParseError(OptParseError),
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl From<OptParseError> for MessageParseError {
  fn from(e: OptParseError) -> Self {
    Self::OptParseError(e)
  }
}

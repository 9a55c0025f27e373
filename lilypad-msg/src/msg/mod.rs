/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message Options
pub mod opt;

/// Message Token & ID
pub mod token;

/// Message Type & Version
pub mod ty;

pub use code::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;

/// # Message payload
/// The representation-tagged payload sum type: either one contiguous
/// byte range, or a chain of iovec-style chunks assembled by the
/// caller (e.g. a header the transport prepends to an immutable body).
///
/// Messages never own payload bytes; both variants borrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload<'a> {
  /// One contiguous byte range
  Contiguous(&'a [u8]),
  /// Scattered chunks, serialized back-to-back on the wire
  Chunks(&'a [&'a [u8]]),
}

impl<'a> Payload<'a> {
  /// The zero-length payload
  pub const fn empty() -> Self {
    Payload::Contiguous(&[])
  }

  /// Total number of payload bytes
  pub fn len(&self) -> usize {
    match self {
      | Payload::Contiguous(bytes) => bytes.len(),
      | Payload::Chunks(chunks) => chunks.iter().map(|c| c.len()).sum(),
    }
  }

  /// Is there any payload at all?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy the payload into `dest`, regardless of representation.
  ///
  /// Returns the number of bytes written, or `None` if `dest` is too
  /// small.
  pub fn copy_to(&self, dest: &mut [u8]) -> Option<usize> {
    match self {
      | Payload::Contiguous(bytes) => {
        dest.get_mut(..bytes.len())?.copy_from_slice(bytes);
        Some(bytes.len())
      },
      | Payload::Chunks(chunks) => {
        let mut at = 0;
        for chunk in chunks.iter() {
          dest.get_mut(at..at + chunk.len())?.copy_from_slice(chunk);
          at += chunk.len();
        }
        Some(at)
      },
    }
  }
}

impl<'a> Default for Payload<'a> {
  fn default() -> Self {
    Payload::empty()
  }
}

/// # CoAP Message
/// The transport-independent part of a message: code, options view,
/// payload. Everything here borrows caller storage; see the
/// [crate docs](crate) for the ownership story.
///
/// The messaging-layer half (token, RFC 7252 type and ID) lives in
/// [`Properties`], mirroring the wire split between the envelope and
/// the per-transport header.
#[derive(Debug)]
pub struct Message<'a> {
  /// Request method, response status or `0.00`
  pub code: Code,
  /// Options view over caller storage
  pub options: Options<'a>,
  /// Payload view
  pub payload: Payload<'a>,
}

impl<'a> Message<'a> {
  /// A message with no options and no payload.
  ///
  /// Useful for empty responses; an empty mutable slice is a valid
  /// (zero-capacity) options storage.
  pub fn empty(code: Code) -> Message<'static> {
    Message { code,
              options: Options::new(&mut []),
              payload: Payload::empty() }
  }

  /// A response with the given payload, using `options` as scratch
  /// storage the caller prepared (e.g. with a Content-Format set).
  pub fn response(code: Code, payload: &'a [u8], options: Options<'a>) -> Message<'a> {
    Message { code,
              options,
              payload: Payload::Contiguous(payload) }
  }
}

/// RFC 7252 messaging-layer data attached to a message: the two-bit
/// type and the 16-bit message ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rfc7252 {
  /// Message ID, deduplicating and correlating ACK/RST
  pub id: Id,
  /// CON / NON / ACK / RST
  pub ty: Type,
}

/// # Message properties
/// Token plus transport-specific auxiliary data. For RFC 7252
/// transports that's [`Rfc7252`]; reliable transports would add their
/// own variant here.
///
/// `is_notification` marks messages belonging to a notification-class
/// (Observe) exchange, which always use the separate-response style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Properties {
  /// Exchange correlator
  pub token: Token,
  /// RFC 7252 messaging-layer fields
  pub rfc7252: Rfc7252,
  /// Belongs to an observe exchange
  pub is_notification: bool,
}

impl Properties {
  /// Properties for a fresh confirmable or non-confirmable message
  pub fn new(ty: Type, id: Id, token: Token) -> Self {
    Self { token,
           rfc7252: Rfc7252 { id, ty },
           is_notification: false }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn payload_lens() {
    assert_eq!(Payload::empty().len(), 0);
    assert!(Payload::empty().is_empty());

    let chunks: &[&[u8]] = &[b"ab", b"", b"cde"];
    let p = Payload::Chunks(chunks);
    assert_eq!(p.len(), 5);

    let mut buf = [0u8; 8];
    assert_eq!(p.copy_to(&mut buf), Some(5));
    assert_eq!(&buf[..5], b"abcde");

    let mut small = [0u8; 3];
    assert_eq!(p.copy_to(&mut small), None);
  }

  #[test]
  fn empty_message() {
    let m = Message::empty(Code::EMPTY);
    assert_eq!(m.options.count(), 0);
    assert!(m.payload.is_empty());
  }
}

use tinyvec::ArrayVec;

use crate::TOKEN_LENGTH_MAX;

/// # Message ID
/// 16-bit identifier correlating ACK/RST messages with the CON/NON
/// they answer, and deduplicating retransmissions.
///
/// See [RFC7252 §4](https://datatracker.ietf.org/doc/html/rfc7252#section-4).
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Debug, Eq, Ord, Default)]
pub struct Id(pub u16);

impl Id {
  /// Decode from the two network-order header bytes
  pub fn from_be_bytes(bs: [u8; 2]) -> Self {
    Self(u16::from_be_bytes(bs))
  }

  /// The ID following this one, wrapping at 2^16
  pub fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }
}

/// # Token
/// Opaque correlator chosen by the client and echoed verbatim by the
/// server; 0 to [`TOKEN_LENGTH_MAX`] bytes.
///
/// Unlike [`Id`], which belongs to the messaging layer, the token
/// correlates *exchanges* and survives separate responses.
///
/// See [RFC7252 §5.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; TOKEN_LENGTH_MAX]>);

impl Token {
  /// The zero-length token
  pub const fn empty() -> Self {
    Self(ArrayVec::from_array_empty([0; TOKEN_LENGTH_MAX]))
  }

  /// Token from raw bytes; at most [`TOKEN_LENGTH_MAX`] are kept.
  pub fn from_bytes(bytes: &[u8]) -> Self {
    let mut arr = ArrayVec::new();
    for b in bytes.iter().take(TOKEN_LENGTH_MAX) {
      arr.push(*b);
    }
    Self(arr)
  }

  /// Derive a full-width token from an arbitrary byte sequence.
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change
  /// in the future.
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }

  /// The token bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Number of token bytes (0-8)
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Is this the zero-length token?
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_wraps() {
    assert_eq!(Id(u16::MAX).next(), Id(0));
    assert_eq!(Id(41).next(), Id(42));
  }

  #[test]
  fn token_from_bytes() {
    let t = Token::from_bytes(&[0xd1, 0x97, 0x96, 0xc1]);
    assert_eq!(t.len(), 4);
    assert_eq!(t.as_bytes(), &[0xd1, 0x97, 0x96, 0xc1]);
  }

  #[test]
  fn opaque_is_full_width() {
    assert_eq!(Token::opaque(b"lily").len(), 8);
    assert_eq!(Token::opaque(b"lily"), Token::opaque(b"lily"));
    assert_ne!(Token::opaque(b"lily"), Token::opaque(b"pad"));
  }
}

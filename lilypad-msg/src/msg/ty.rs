use super::parse_error::MessageParseError;

/// # Message Type
/// The two-bit type field of an RFC 7252 message, determining the
/// reliability semantics of the exchange.
///
/// See [RFC7252 §4.2 / §4.3](https://datatracker.ietf.org/doc/html/rfc7252#section-4.2).
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug, Default)]
#[repr(u8)]
pub enum Type {
  /// Confirmable: retransmitted with exponential back-off until an
  /// [`Type::Ack`] (or [`Type::Reset`]) with the same ID arrives.
  Con = 0,
  /// Non-confirmable: fire and forget.
  #[default]
  Non = 1,
  /// Acknowledgement: confirms receipt of a CON with the same ID,
  /// possibly carrying a piggybacked response.
  Ack = 2,
  /// Reset: the peer received a message it lacks context to process.
  /// Also the "pong" answering an empty CON ping.
  Reset = 3,
}

impl Type {
  /// Abbreviation used in logs & packet dumps
  pub const fn abbrev(self) -> &'static str {
    match self {
      | Type::Con => "CON",
      | Type::Non => "NON",
      | Type::Ack => "ACK",
      | Type::Reset => "RST",
    }
  }
}

impl TryFrom<u8> for Type {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    match b {
      | 0 => Ok(Type::Con),
      | 1 => Ok(Type::Non),
      | 2 => Ok(Type::Ack),
      | 3 => Ok(Type::Reset),
      | _ => Err(MessageParseError::InvalidType(b)),
    }
  }
}

impl From<Type> for u8 {
  fn from(ty: Type) -> u8 {
    ty as u8
  }
}

/// Version of the CoAP protocol the message adheres to.
///
/// RFC 7252 pins this to 1; everything else is a message format error.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_values() {
    for b in 0u8..4 {
      assert_eq!(u8::from(Type::try_from(b).unwrap()), b);
    }
    assert!(Type::try_from(4).is_err());
  }
}

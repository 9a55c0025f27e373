use lilypad_msg::pdu::BuildError;
use lilypad_msg::MessageParseError;

use crate::endpoint::Proto;

/// The context an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// Handling an inbound datagram
  Receiving,
  /// Transmitting a message
  Sending,
  /// Driving timers in [`Core::poll`](super::Core::poll)
  Polling,
  /// Registering or deregistering a listener
  Registering,
}

impl When {
  /// Construct a specific error from the context it occurred in
  pub fn what<E>(self, what: What<E>) -> Error<E> {
    Error { when: self, what }
  }
}

/// A contextless error, generic over the transport driver's error
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum What<E> {
  /// The inbound PDU violates the message format
  BadMessage(MessageParseError),
  /// Serializing an outbound PDU failed
  Build(BuildError),
  /// A fixed pool (carbon copies, transmissions) or caller buffer is
  /// exhausted
  NoBuffer,
  /// No such listener / endpoint state
  NotFound,
  /// The inbound message class/type combination violates RFC 7252
  Protocol,
  /// Confirmable delivery exceeded its retransmission budget
  TimedOut,
  /// A secure send was attempted without a session
  NotConnected,
  /// No compiled-in driver speaks this protocol
  NotSupported(Proto),
  /// The listener is already registered
  AlreadyExists,
  /// The clock failed to provide timing
  Clock,
  /// The transport driver failed
  Transport(E),
}

/// An error encounterable from within [`Core`](super::Core):
/// what happened, and what the core was doing at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error<E> {
  /// What happened?
  pub what: What<E>,
  /// What were we doing when it happened?
  pub when: When,
}

impl<E> Error<E> {
  /// The parse error, if this is a [`What::BadMessage`]
  pub fn message_parse_error(&self) -> Option<&MessageParseError> {
    match self.what {
      | What::BadMessage(ref e) => Some(e),
      | _ => None,
    }
  }
}

impl<E> From<BuildError> for What<E> {
  fn from(e: BuildError) -> Self {
    match e {
      | BuildError::OutOfBuffer { .. } => What::NoBuffer,
      | e => What::Build(e),
    }
  }
}

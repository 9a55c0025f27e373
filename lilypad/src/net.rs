use core::fmt;

use crate::endpoint::{Endpoint, Proto};

/// # Transport driver
/// The narrow interface the core asks of a transport: a vectored send
/// and a capability probe. Drivers do not share code; adding a
/// transport means implementing this trait and giving [`Endpoint`]
/// a variant for it.
///
/// Inbound traffic does not flow through this trait; the owner of
/// the socket reads datagrams and feeds them to
/// [`Core::handle_datagram`](crate::core::Core::handle_datagram).
pub trait Transport {
  /// Errors the driver can produce while sending
  type Error: fmt::Debug;

  /// Send the concatenation of `chunks` as one PDU to `remote`.
  ///
  /// The chunk list is the scatter-gather form produced by the PDU
  /// builder (`[header][options][0xFF][payload…]`); drivers with
  /// vectored I/O can pass it straight down, others concatenate.
  fn sendv(&self,
           chunks: &[&[u8]],
           remote: &Endpoint,
           local: Option<&Endpoint>)
           -> Result<(), Self::Error>;

  /// Does this driver speak `proto`? Sends to unsupported protocols
  /// fail with [`What::NotSupported`](crate::core::What::NotSupported)
  /// before reaching the driver.
  fn supports(&self, proto: Proto) -> bool;

  /// Hook invoked when the core drops all state for an endpoint
  /// (e.g. after a connection-finished signal). Secure transports
  /// tear down the session here.
  fn session_teardown(&self, _remote: &Endpoint) {}
}

/// One inbound datagram, as delivered by a transport driver.
#[derive(Debug)]
pub struct Incoming<'a> {
  /// The received bytes. Mutable because the parsed message edits
  /// options in place within this buffer.
  pub bytes: &'a mut [u8],
  /// The datagram was larger than the receive buffer and was cut
  /// off. The exchange layer answers truncated requests with 4.13.
  pub truncated: bool,
  /// Sender
  pub remote: Endpoint,
  /// Receiving local endpoint, when the driver knows it
  pub local: Option<Endpoint>,
}

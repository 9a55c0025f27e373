use lilypad_msg::Message;

use super::Resource;

/// Errors a handler can meet while responding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RespondError {
  /// [`RequestContext::send_response`] was already called once
  AlreadySent,
  /// An output buffer was too small (link-format overflow)
  NoBuffer,
  /// The messaging layer could not transmit the response
  SendFailed,
}

/// The exchange-layer services a handler can reach through its
/// [`RequestContext`]. Implemented by the core; object-safe so that
/// handlers stay plain `fn` pointers.
pub(crate) trait Service {
  /// Transmit `response` for the request being handled.
  fn respond(&self, response: &mut Message<'_>) -> Result<(), RespondError>;

  /// Render the link-format directory for the inbound transport into
  /// `out`, returning the byte count.
  fn link_format(&self, out: &mut [u8]) -> Result<usize, RespondError>;
}

/// # Request context
/// Per-request state handed to the handler: the matched resource and
/// a single-shot response channel.
///
/// [`RequestContext::send_response`] may be called exactly once; the
/// context disarms itself on the first call and any further attempt
/// fails with [`RespondError::AlreadySent`].
pub struct RequestContext<'r> {
  resource: &'r Resource,
  service: &'r dyn Service,
  armed: bool,
}

impl<'r> RequestContext<'r> {
  pub(crate) fn new(resource: &'r Resource, service: &'r dyn Service) -> Self {
    Self { resource,
           service,
           armed: true }
  }

  /// The resource whose handler is running
  pub fn resource(&self) -> &Resource {
    self.resource
  }

  /// The opaque argument registered with the resource
  pub fn arg(&self) -> Option<&'static (dyn core::any::Any + Send + Sync)> {
    self.resource.arg
  }

  /// Send a response built by the handler. One-shot: the second call
  /// fails without transmitting anything.
  pub fn send_response(&mut self, response: &mut Message<'_>) -> Result<(), RespondError> {
    if !self.armed {
      return Err(RespondError::AlreadySent);
    }
    // disarm before the attempt so a failed send cannot be retried
    // into a duplicate
    self.armed = false;
    self.service.respond(response)
  }

  /// Render the resource directory (`/.well-known/core` body) for
  /// the transport this request arrived on.
  pub fn link_format(&self, out: &mut [u8]) -> Result<usize, RespondError> {
    self.service.link_format(out)
  }

  /// Has no response been sent yet?
  pub(crate) fn is_armed(&self) -> bool {
    self.armed
  }
}

impl<'r> core::fmt::Debug for RequestContext<'r> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("RequestContext")
     .field("resource", &self.resource.path)
     .field("armed", &self.armed)
     .finish()
  }
}

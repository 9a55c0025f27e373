//! The exchange layer: everything between "the messaging layer passed
//! a message up" and "a resource handler ran".
//!
//! Split deliberately in two, mirroring the receive path's timing
//! constraints: *pre-processing* (truncation policy, resource lookup,
//! immediate error replies) answers the network-timing-sensitive
//! questions synchronously, and only then does *processing* invoke
//! the user-visible handler.

use lilypad_msg::{Code, CodeKind, Message, Method, Options, Properties, Type};

use crate::config::{PATH_LENGTH_MAX, PDU_SIZE_MAX};
use crate::core::{Core, Error, What, When};
use crate::endpoint::{Endpoint, Proto};
use crate::net::Transport;
use crate::server::{Aux, LinkEncodeError, LinkFormatCtx, MatchResult, Outcome, RequestContext,
                    Resource, RespondError, Service, WELL_KNOWN_LISTENER};
use crate::status;
use crate::time::Clock;

/// Should this response be withheld because the request's No-Response
/// option (RFC 7967) marked its class as uninteresting?
///
/// The bitmap is indexed by `class - 1`: bit 1 suppresses 2.xx, bit 3
/// suppresses 4.xx, bit 4 suppresses 5.xx.
pub fn response_is_optional<const N: usize>(request_options: &Options<'_, N>, code: Code) -> bool {
  match request_options.no_response() {
    | Some(bitmap) => {
      let class_index = code.class.wrapping_sub(1);
      class_index < 7 && bitmap & 1 << class_index != 0
    },
    | None => false,
  }
}

/// The response channel handed (behind `dyn`) to request handlers.
struct Responder<'p, T, C>
  where T: Transport,
        C: Clock
{
  core: &'p Core<T, C>,
  remote: &'p Endpoint,
  local: Option<&'p Endpoint>,
  properties: &'p Properties,
  reliable: bool,
}

impl<'p, T, C> Service for Responder<'p, T, C>
  where T: Transport,
        C: Clock
{
  fn respond(&self, response: &mut Message<'_>) -> Result<(), RespondError> {
    self.core
        .send_response_body(response, self.properties, self.remote, self.local, self.reliable)
        .map_err(|_| RespondError::SendFailed)
  }

  fn link_format(&self, out: &mut [u8]) -> Result<usize, RespondError> {
    self.core
        .build_link_format(self.remote.proto(), out)
        .map_err(|_| RespondError::NoBuffer)
  }
}

impl<T, C> Core<T, C>
  where T: Transport,
        C: Clock
{
  /// Route a passed-up message by code class.
  pub(crate) fn dispatch(&self,
                         message: &mut Message<'_>,
                         properties: &Properties,
                         remote: &Endpoint,
                         local: Option<&Endpoint>,
                         truncated: bool,
                         expected_response: bool)
                         -> Result<(), Error<T::Error>> {
    match message.code.kind() {
      | CodeKind::Request => self.handle_request(message, properties, remote, local, truncated),

      | CodeKind::Response if expected_response => {
        match self.on_response {
          | Some(hook) => hook(remote, message, properties),
          | None => log::debug!("expected response dropped, no response hook installed"),
        }
        Ok(())
      },

      | CodeKind::Response => {
        log::debug!("[MID {}] received unknown response", properties.rfc7252.id.0);
        if properties.rfc7252.ty == Type::Con {
          // RFC 7252 §4.2: a CON we lack context for gets rejected
          // with a Reset; §4.3 keeps the NON rejection silent
          self.send_reset(properties.rfc7252.id, remote, local)?;
        }
        Err(When::Receiving.what(What::Protocol))
      },

      | CodeKind::Signal => {
        log::debug!("signaling message (7.{:02}) on a datagram transport, ignoring",
                    message.code.detail);
        Err(When::Receiving.what(What::Protocol))
      },

      | CodeKind::Reserved => {
        log::warn!("message with reserved code class {}, dropping", message.code.class);
        Err(When::Receiving.what(What::Protocol))
      },

      // empty messages never leave the messaging layer
      | CodeKind::Empty => Ok(()),
    }
  }

  /// Pre-process one request: truncation policy, then resource
  /// lookup, answering errors immediately; on success, run the
  /// handler.
  fn handle_request(&self,
                    message: &mut Message<'_>,
                    properties: &Properties,
                    remote: &Endpoint,
                    local: Option<&Endpoint>,
                    truncated: bool)
                    -> Result<(), Error<T::Error>> {
    if truncated {
      // the option stream was intact, so a compliant reply is
      // possible: tell the peer how much we can take
      log::debug!("truncated request, not processing, sending 4.13 with Size1");
      let mut storage = [0u8; 8];
      let mut options = Options::new(&mut storage);
      options.set_size1(PDU_SIZE_MAX as u32).ok();
      let mut response = Message::response(status::REQUEST_ENTITY_TOO_LARGE, &[], options);
      return self.send_response_body(&mut response, properties, remote, local, false);
    }

    let resource = match self.find_resource(message, remote) {
      | Ok(resource) => resource,
      | Err(code) => {
        let mut response = Message::empty(code);
        return self.send_response_body(&mut response, properties, remote, local, false);
      },
    };

    self.process_request(resource, message, properties, remote, local)
  }

  /// Walk the listener list in registration order (the built-in
  /// `/.well-known/core` listener last), remembering a wrong-method
  /// match so the caller can answer 4.05 over 4.04.
  fn find_resource(&self,
                   message: &Message<'_>,
                   remote: &Endpoint)
                   -> Result<&'static Resource, Code> {
    let mut path_buf = [0u8; PATH_LENGTH_MAX];
    let path = match message.options.uri_path(&mut path_buf) {
      | Ok(path) => path,
      | Err(_) => {
        // a path that doesn't fit the buffer cannot match anything
        // registered here
        log::debug!("could not copy Uri-Path");
        return Err(status::NOT_FOUND);
      },
    };
    let method = Method::from_code(message.code);

    let mut best = Err(status::NOT_FOUND);

    let state = self.lock();
    let listeners = state.listeners
                         .iter()
                         .copied()
                         .chain(core::iter::once(&WELL_KNOWN_LISTENER));
    for listener in listeners {
      if !listener.protocols.contains(remote.proto()) {
        log::trace!("ignoring listener, proto {} not in set", remote.proto());
        continue;
      }

      match (listener.matcher)(listener, path, method, remote) {
        | MatchResult::Found(resource) => {
          log::debug!("{}{}: found",
                      resource.path,
                      if resource.flags.match_subtree() { "/**" } else { "" });
          return Ok(resource);
        },
        | MatchResult::MethodNotAllowed(_) => {
          best = Err(status::METHOD_NOT_ALLOWED);
        },
        | MatchResult::NotFound => {},
      }
    }

    match best {
      | Err(code) if code == status::METHOD_NOT_ALLOWED => {
        log::debug!("{}: method not allowed", path);
      },
      | _ => log::debug!("{}: resource not found", path),
    }
    best
  }

  /// Invoke the handler and drive the response path its [`Outcome`]
  /// asks for.
  fn process_request(&self,
                     resource: &'static Resource,
                     message: &mut Message<'_>,
                     properties: &Properties,
                     remote: &Endpoint,
                     local: Option<&Endpoint>)
                     -> Result<(), Error<T::Error>> {
    let reliable = resource.flags.reliable();
    let responder = Responder { core: self,
                                remote,
                                local,
                                properties,
                                reliable };
    let aux = Aux { remote,
                    local,
                    properties };
    let mut ctx = RequestContext::new(resource, &responder);

    log::trace!("invoking handler for {}", resource.path);
    let outcome = (resource.handler)(message, &aux, &mut ctx);
    let armed = ctx.is_armed();

    let code = match outcome {
      | Outcome::Done if !armed => return Ok(()),
      | Outcome::Done => {
        // the context was never consumed: the application claims it
        // responded but nothing went out
        log::warn!("handler for {} returned Done without responding", resource.path);
        status::INTERNAL_SERVER_ERROR
      },
      | Outcome::Ignore => {
        log::trace!("handler ignoring request");
        return Ok(());
      },
      | Outcome::Respond(code) => code,
      | Outcome::Error(e) => status::for_handler_error(e),
    };

    if self.config.honor_no_response && response_is_optional(&message.options, code) {
      log::debug!("response {} is optional, not responding", code);
      return Ok(());
    }

    log::debug!("sending response {} {} from handler outcome", code, status::phrase(code));
    let mut response = Message::empty(code);
    self.send_response_body(&mut response, properties, remote, local, reliable)
  }

  /// Transmit a response for the request described by
  /// `request_properties` (token echoed, ACK piggybacked when the
  /// request was confirmable). On failure, a last-ditch 5.00 goes out
  /// unreliably before the error propagates.
  pub(crate) fn send_response_body(&self,
                                   response: &mut Message<'_>,
                                   request_properties: &Properties,
                                   remote: &Endpoint,
                                   local: Option<&Endpoint>,
                                   reliable: bool)
                                   -> Result<(), Error<T::Error>> {
    let mut properties = *request_properties;
    match self.messaging_send(response, &mut properties, remote, local, reliable) {
      | Ok(()) => Ok(()),
      | Err(e) => {
        log::warn!("failed to send response, trying to send 5.00 unreliably");
        let fallback = Message::empty(status::INTERNAL_SERVER_ERROR);
        let mut properties = *request_properties;
        self.messaging_send(&fallback, &mut properties, remote, local, false)
            .ok();
        Err(e)
      },
    }
  }

  /// Render `<path>` entries for every resource reachable over
  /// `proto`, comma-separated, using each listener's link encoder.
  /// The built-in `/.well-known/core` resource does not list itself.
  pub(crate) fn build_link_format(&self,
                                  proto: Proto,
                                  out: &mut [u8])
                                  -> Result<usize, LinkEncodeError> {
    let state = self.lock();
    let mut at = 0;
    let mut ctx = LinkFormatCtx { first: true };

    for listener in state.listeners.iter().copied() {
      if !listener.protocols.contains(proto) {
        continue;
      }
      for resource in listener.resources {
        if !resource.protocols.contains(proto) {
          continue;
        }
        at += (listener.link_encoder)(resource, &mut out[at..], &ctx)?;
        ctx.first = false;
      }
    }

    Ok(at)
  }
}

#[cfg(test)]
mod tests {
  use core::sync::atomic::{AtomicUsize, Ordering};

  use lilypad_msg::opt::ContentFormat;
  use lilypad_msg::{Id, Token};

  use super::*;
  use crate::config::Config;
  use crate::net::Incoming;
  use crate::path::PathSpec;
  use crate::server::{HandlerError, Listener, MethodSet, ResourceFlags};
  use crate::test::{parse_sent, request_bytes, request_bytes_with, udp, FakeClock, TestCore,
                    TestTransport};

  static HITS: AtomicUsize = AtomicUsize::new(0);

  fn content(_: &mut Message<'_>, _: &Aux<'_>, _: &mut RequestContext<'_>) -> Outcome {
    HITS.fetch_add(1, Ordering::Relaxed);
    Outcome::Respond(status::CONTENT)
  }

  fn greet(_: &mut Message<'_>, _: &Aux<'_>, ctx: &mut RequestContext<'_>) -> Outcome {
    let mut storage = [0u8; 8];
    let mut options = Options::new(&mut storage);
    options.set_content_format(ContentFormat::TEXT).unwrap();
    let mut response = Message::response(status::CONTENT, b"hi there", options);

    match ctx.send_response(&mut response) {
      | Ok(()) => {
        // the second send must be refused
        assert_eq!(ctx.send_response(&mut response), Err(RespondError::AlreadySent));
        Outcome::Done
      },
      | Err(_) => Outcome::Error(HandlerError::Other),
    }
  }

  fn ignore(_: &mut Message<'_>, _: &Aux<'_>, _: &mut RequestContext<'_>) -> Outcome {
    Outcome::Ignore
  }

  fn fail_not_found(_: &mut Message<'_>, _: &Aux<'_>, _: &mut RequestContext<'_>) -> Outcome {
    Outcome::Error(HandlerError::NotFound)
  }

  fn done_liar(_: &mut Message<'_>, _: &Aux<'_>, _: &mut RequestContext<'_>) -> Outcome {
    Outcome::Done
  }

  static RESOURCES: [Resource; 5] =
    [Resource::new(PathSpec::new(&["sensors", "temp"]), content, MethodSet::just(Method::Get)),
     Resource::new(PathSpec::new(&["greet"]), greet, MethodSet::just(Method::Get)),
     Resource::new(PathSpec::new(&["quiet"]), ignore, MethodSet::just(Method::Get)),
     Resource::new(PathSpec::new(&["missing"]), fail_not_found, MethodSet::just(Method::Get)),
     Resource::new(PathSpec::new(&["liar"]), done_liar, MethodSet::just(Method::Get))];

  static LISTENER: Listener = Listener::new(&RESOURCES);

  static SUBTREE: [Resource; 1] =
    [Resource::new(PathSpec::new(&["files"]), content,
                   MethodSet::just(Method::Get)).with_flags(ResourceFlags::MATCH_SUBTREE)];

  static SUBTREE_LISTENER: Listener = Listener::new(&SUBTREE);

  fn core_with_listener() -> TestCore {
    let core = TestCore::new(TestTransport::default(),
                             FakeClock::fixed(0),
                             Config::default()).unwrap();
    core.register(&LISTENER).unwrap();
    core
  }

  fn feed(core: &TestCore, mut bytes: Vec<u8>) -> Result<(), Error<()>> {
    core.handle_datagram(Incoming { bytes: &mut bytes,
                                    truncated: false,
                                    remote: udp("10.1.1.1:40000"),
                                    local: None })
  }

  #[test]
  fn piggybacked_response_to_confirmable_get() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Con, Method::Get.code(), 0x1234, b"tok", "/sensors/temp"))
      .unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent.len(), 1);
    let (message, properties) = &sent[0];
    assert_eq!(properties.rfc7252.ty, Type::Ack);
    assert_eq!(properties.rfc7252.id, Id(0x1234));
    assert_eq!(properties.token, Token::from_bytes(b"tok"));
    assert_eq!(message.code, status::CONTENT);
    assert!(HITS.load(Ordering::Relaxed) > 0);
  }

  #[test]
  fn handler_sent_response_with_payload() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Con, Method::Get.code(), 7, b"", "/greet")).unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent.len(), 1);
    let (message, properties) = &sent[0];
    assert_eq!(message.code, status::CONTENT);
    assert_eq!(properties.rfc7252.ty, Type::Ack);
    assert_eq!(message.payload_bytes, b"hi there");
    assert_eq!(message.content_format, Some(ContentFormat::TEXT));
  }

  #[test]
  fn unknown_path_is_404_and_wrong_method_is_405() {
    let core = core_with_listener();

    feed(&core, request_bytes(Type::Con, Method::Get.code(), 1, b"", "/nope")).unwrap();
    feed(&core, request_bytes(Type::Con, Method::Delete.code(), 2, b"", "/sensors/temp")).unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent[0].0.code, status::NOT_FOUND);
    assert_eq!(sent[1].0.code, status::METHOD_NOT_ALLOWED);
    // both went out as piggybacked ACKs for the CON requests
    assert_eq!(sent[0].1.rfc7252.ty, Type::Ack);
    assert_eq!(sent[1].1.rfc7252.id, Id(2));
  }

  #[test]
  fn non_request_gets_separate_non_response() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Non, Method::Get.code(), 50, b"t", "/sensors/temp")).unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent.len(), 1);
    let (message, properties) = &sent[0];
    assert_eq!(message.code, status::CONTENT);
    // separate-response style: a fresh NON, not an ACK for ID 50
    assert_eq!(properties.rfc7252.ty, Type::Non);
    assert_eq!(properties.token, Token::from_bytes(b"t"));
  }

  #[test]
  fn ignore_outcome_stays_silent() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Con, Method::Get.code(), 9, b"", "/quiet")).unwrap();
    assert!(core.transport().sent.borrow().is_empty());
  }

  #[test]
  fn handler_errors_map_to_statuses() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Con, Method::Get.code(), 3, b"", "/missing")).unwrap();
    assert_eq!(parse_sent(core.transport())[0].0.code, status::NOT_FOUND);
  }

  #[test]
  fn done_without_response_is_a_500() {
    let core = core_with_listener();
    feed(&core, request_bytes(Type::Con, Method::Get.code(), 4, b"", "/liar")).unwrap();
    assert_eq!(parse_sent(core.transport())[0].0.code, status::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn subtree_resources_answer_nested_paths() {
    let core = core_with_listener();
    core.register(&SUBTREE_LISTENER).unwrap();

    feed(&core, request_bytes(Type::Con, Method::Get.code(), 5, b"", "/files/a/b")).unwrap();
    assert_eq!(parse_sent(core.transport())[0].0.code, status::CONTENT);
  }

  #[test]
  fn no_response_suppression() {
    let core = core_with_listener();

    // bit 1 set: client is uninterested in 2.xx responses
    let bytes = request_bytes_with(Type::Non,
                                   Method::Get.code(),
                                   6,
                                   b"",
                                   "/sensors/temp",
                                   |o| o.set_no_response(0b0000_0010).unwrap());
    feed(&core, bytes).unwrap();
    assert!(core.transport().sent.borrow().is_empty());
  }

  #[test]
  fn truncated_request_gets_413_with_size1() {
    let core = core_with_listener();
    let mut bytes = request_bytes(Type::Con, Method::Post.code(), 8, b"", "/sensors/temp");
    core.handle_datagram(Incoming { bytes: &mut bytes,
                                    truncated: true,
                                    remote: udp("10.1.1.1:40000"),
                                    local: None })
        .unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent[0].0.code, status::REQUEST_ENTITY_TOO_LARGE);
    assert_eq!(sent[0].0.size1, Some(PDU_SIZE_MAX as u32));
  }

  #[test]
  fn well_known_core_lists_registered_resources() {
    let core = TestCore::new(TestTransport::default(),
                             FakeClock::fixed(0),
                             Config::default()).unwrap();
    core.register(&SUBTREE_LISTENER).unwrap();

    feed(&core, request_bytes(Type::Con, Method::Get.code(), 11, b"", "/.well-known/core"))
      .unwrap();

    let sent = parse_sent(core.transport());
    assert_eq!(sent[0].0.code, status::CONTENT);
    assert_eq!(sent[0].0.content_format, Some(ContentFormat::LINK_FORMAT));
    assert_eq!(sent[0].0.payload_bytes, b"</files>");
  }

  #[test]
  fn well_known_core_joins_with_commas() {
    let core = core_with_listener();
    core.register(&SUBTREE_LISTENER).unwrap();

    feed(&core, request_bytes(Type::Con, Method::Get.code(), 12, b"", "/.well-known/core"))
      .unwrap();

    let sent = parse_sent(core.transport());
    let body = String::from_utf8(sent[0].0.payload_bytes.clone()).unwrap();
    assert_eq!(body,
               "</sensors/temp>,</greet>,</quiet>,</missing>,</liar>,</files>");
  }

  #[test]
  fn unexpected_con_response_elicits_reset() {
    let core = core_with_listener();
    // a CON carrying 2.05 out of nowhere
    let mut bytes = vec![0x44, 0x45, 0x00, 0x2a, 1, 2, 3, 4];
    let result = core.handle_datagram(Incoming { bytes: &mut bytes,
                                                 truncated: false,
                                                 remote: udp("10.1.1.1:40000"),
                                                 local: None });
    assert!(matches!(result, Err(Error { what: What::Protocol, .. })));

    let sent = parse_sent(core.transport());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.rfc7252.ty, Type::Reset);
    assert_eq!(sent[0].1.rfc7252.id, Id(0x2a));
    assert_eq!(sent[0].0.code, Code::EMPTY);
  }

  #[test]
  fn unexpected_non_response_is_dropped_silently() {
    let core = core_with_listener();
    let mut bytes = vec![0x54, 0x45, 0x00, 0x2b, 1, 2, 3, 4];
    let result = core.handle_datagram(Incoming { bytes: &mut bytes,
                                                 truncated: false,
                                                 remote: udp("10.1.1.1:40000"),
                                                 local: None });
    assert!(matches!(result, Err(Error { what: What::Protocol, .. })));
    assert!(core.transport().sent.borrow().is_empty());
  }

  #[test]
  fn suppression_bitmap() {
    let mut storage = [0u8; 16];
    let mut options = Options::<8>::new(&mut storage);
    options.set_no_response(0b0001_1010).unwrap();

    assert!(response_is_optional(&options, status::CONTENT));
    assert!(response_is_optional(&options, status::NOT_FOUND));
    assert!(response_is_optional(&options, status::INTERNAL_SERVER_ERROR));

    let mut storage = [0u8; 16];
    let mut options = Options::<8>::new(&mut storage);
    options.set_no_response(0b0000_0010).unwrap();
    assert!(response_is_optional(&options, status::CONTENT));
    assert!(!response_is_optional(&options, status::NOT_FOUND));

    let empty_storage: &mut [u8] = &mut [];
    let options = Options::<8>::new(empty_storage);
    assert!(!response_is_optional(&options, status::CONTENT));
  }
}

use core::any::Any;
use core::fmt;

use lilypad_msg::opt::ContentFormat;
use lilypad_msg::{Message, Method, Options, Properties};

use crate::config::WELL_KNOWN_CORE_SIZE_MAX;
use crate::endpoint::{Endpoint, ProtoSet};
use crate::path::PathSpec;
use crate::status;

/// Method sets
pub mod method;

/// One-shot response context
pub mod respond;

pub use method::MethodSet;
pub use respond::{RequestContext, RespondError};

pub(crate) use respond::Service;

/// Behavior switches on a [`Resource`].
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct ResourceFlags(u16);

impl ResourceFlags {
  /// No flags
  pub const NONE: ResourceFlags = ResourceFlags(0);

  /// Responses from this resource are sent confirmably when they are
  /// not piggybacked.
  pub const RELIABLE: ResourceFlags = ResourceFlags(0x0001);

  /// The resource path is a prefix of acceptable request paths:
  /// `/sensors` with this flag also answers `/sensors/sht31/t`.
  pub const MATCH_SUBTREE: ResourceFlags = ResourceFlags(0x4000);

  /// Combine two flag sets
  pub const fn union(self, other: ResourceFlags) -> ResourceFlags {
    ResourceFlags(self.0 | other.0)
  }

  /// Is [`ResourceFlags::RELIABLE`] set?
  pub const fn reliable(self) -> bool {
    self.0 & Self::RELIABLE.0 != 0
  }

  /// Is [`ResourceFlags::MATCH_SUBTREE`] set?
  pub const fn match_subtree(self) -> bool {
    self.0 & Self::MATCH_SUBTREE.0 != 0
  }
}

/// What a request handler decided.
///
/// This is the whole contract between handlers and the exchange
/// layer; the response path for each variant is fixed:
///
/// | variant | exchange layer behavior |
/// |---|---|
/// | `Respond(code)` | build & send an empty-body response with `code` |
/// | `Done` | handler already called [`RequestContext::send_response`] |
/// | `Ignore` | drop without responding (the handler vouches the request's No-Response permits it) |
/// | `Error(e)` | respond with [`status::for_handler_error`]`(e)` |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  /// Respond with this status and no body
  Respond(lilypad_msg::Code),
  /// A response was already sent through the context
  Done,
  /// Deliberately answer nothing
  Ignore,
  /// Handler failed; map the error to a status
  Error(HandlerError),
}

/// Why a handler could not serve a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerError {
  /// The addressed thing does not exist (4.04)
  NotFound,
  /// The client may not do this (4.03)
  PermissionDenied,
  /// The request was malformed (4.00)
  InvalidInput,
  /// Anything else (5.00)
  Other,
}

/// Auxiliary per-request data handed to handlers next to the message.
#[derive(Clone, Copy, Debug)]
pub struct Aux<'r> {
  /// Requesting endpoint
  pub remote: &'r Endpoint,
  /// Local endpoint the request arrived on, if the driver knows it
  pub local: Option<&'r Endpoint>,
  /// Token and messaging-layer data of the request
  pub properties: &'r Properties,
}

/// A request handler.
///
/// Handlers run synchronously on the event-loop thread; long-running
/// work must be deferred elsewhere and the handler return quickly.
pub type Handler = fn(&mut Message<'_>, &Aux<'_>, &mut RequestContext<'_>) -> Outcome;

/// # Resource
/// A handler bound to a path, method set and transport set.
///
/// Resources are statically allocated and grouped into [`Listener`]s:
///
/// ```
/// use lilypad::msg::{Message, Method};
/// use lilypad::path::PathSpec;
/// use lilypad::server::{Aux, MethodSet, Outcome, RequestContext, Resource};
/// use lilypad::status;
///
/// fn read_temperature(_: &mut Message<'_>,
///                     _: &Aux<'_>,
///                     _: &mut RequestContext<'_>)
///                     -> Outcome {
///   Outcome::Respond(status::CONTENT)
/// }
///
/// static TEMPERATURE: Resource =
///   Resource::new(PathSpec::new(&["sensors", "temperature"]),
///                 read_temperature,
///                 MethodSet::just(Method::Get));
/// ```
pub struct Resource {
  /// Path this resource answers on
  pub path: PathSpec,
  /// The request handler
  pub handler: Handler,
  /// Opaque argument, reachable via [`RequestContext::arg`]
  pub arg: Option<&'static (dyn Any + Send + Sync)>,
  /// Methods the resource accepts
  pub methods: MethodSet,
  /// Transports the resource accepts
  pub protocols: ProtoSet,
  /// Behavior switches
  pub flags: ResourceFlags,
}

impl Resource {
  /// A resource reachable over every transport, with no flags.
  pub const fn new(path: PathSpec, handler: Handler, methods: MethodSet) -> Self {
    Resource { path,
               handler,
               arg: None,
               methods,
               protocols: ProtoSet::ALLOW_ALL,
               flags: ResourceFlags::NONE }
  }

  /// Replace the flags
  pub const fn with_flags(mut self, flags: ResourceFlags) -> Self {
    self.flags = flags;
    self
  }

  /// Restrict the transports
  pub const fn with_protocols(mut self, protocols: ProtoSet) -> Self {
    self.protocols = protocols;
    self
  }

  /// Attach an opaque argument
  pub const fn with_arg(mut self, arg: &'static (dyn Any + Send + Sync)) -> Self {
    self.arg = Some(arg);
    self
  }
}

impl fmt::Debug for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resource")
     .field("path", &self.path)
     .field("methods", &self.methods)
     .field("flags", &self.flags)
     .finish()
  }
}

/// Result of matching one listener against a request.
#[derive(Clone, Copy, Debug)]
pub enum MatchResult {
  /// Path, method and transport all fit
  Found(&'static Resource),
  /// Path fits but the method set does not; remembered as the
  /// best-so-far outcome while the walk continues
  MethodNotAllowed(&'static Resource),
  /// Nothing in this listener fits
  NotFound,
}

/// A request-matching strategy for one listener.
pub type Matcher = fn(&'static Listener,
                      path: &str,
                      method: Option<Method>,
                      remote: &Endpoint)
                      -> MatchResult;

/// Mutable state threaded through one link-format rendering pass.
#[derive(Clone, Copy, Debug)]
pub struct LinkFormatCtx {
  /// No entry has been written yet (suppresses the `,` separator)
  pub first: bool,
}

/// Renders one resource as a link-format entry.
pub type LinkEncoder =
  fn(&Resource, &mut [u8], &LinkFormatCtx) -> Result<usize, LinkEncodeError>;

/// The output buffer cannot hold the next link-format entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkEncodeError;

/// # Listener
/// An ordered collection of resources sharing a request-matching
/// strategy, a link-format encoder and a transport set.
///
/// Listeners are statically allocated and registered with
/// [`Core::register`](crate::core::Core::register); lookup walks them
/// in registration order.
pub struct Listener {
  /// The resources, matched in order
  pub resources: &'static [Resource],
  /// Request-matching strategy, [`default_matcher`] by default
  pub matcher: Matcher,
  /// Link-format encoder, [`encode_link`] by default
  pub link_encoder: LinkEncoder,
  /// Transports this listener accepts at all
  pub protocols: ProtoSet,
}

impl Listener {
  /// A listener with the default matcher and link encoder, open to
  /// every transport.
  pub const fn new(resources: &'static [Resource]) -> Self {
    Listener { resources,
               matcher: default_matcher,
               link_encoder: encode_link,
               protocols: ProtoSet::ALLOW_ALL }
  }

  /// Restrict the transports
  pub const fn with_protocols(mut self, protocols: ProtoSet) -> Self {
    self.protocols = protocols;
    self
  }
}

impl fmt::Debug for Listener {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Listener")
     .field("resources", &self.resources)
     .field("protocols", &self.protocols)
     .finish()
  }
}

/// The default request matcher: walk the listener's resources in
/// order, gate by transport, match the path (honoring
/// [`ResourceFlags::MATCH_SUBTREE`]), then check the method set.
///
/// A path match with the wrong method is remembered so that the
/// caller can answer `4.05` instead of `4.04` when no better
/// resource turns up.
pub fn default_matcher(listener: &'static Listener,
                       path: &str,
                       method: Option<Method>,
                       remote: &Endpoint)
                       -> MatchResult {
  let mut best = MatchResult::NotFound;

  for resource in listener.resources {
    if !resource.protocols.contains(remote.proto()) {
      log::trace!("ignoring resource <{}>, proto {} not in allowed set",
                  resource.path,
                  remote.proto());
      continue;
    }

    if !resource.path.matches_str(path, resource.flags.match_subtree()) {
      continue;
    }

    match method {
      | Some(m) if resource.methods.contains(m) => return MatchResult::Found(resource),
      | _ => best = MatchResult::MethodNotAllowed(resource),
    }
  }

  best
}

/// The default link encoder: `,<path>` (the `,` only between
/// entries).
pub fn encode_link(resource: &Resource,
                   buf: &mut [u8],
                   ctx: &LinkFormatCtx)
                   -> Result<usize, LinkEncodeError> {
  let mut at = 0;

  // separator, angle brackets, and at least "/" must fit
  if buf.len() < 3 + if ctx.first { 0 } else { 1 } {
    return Err(LinkEncodeError);
  }

  if !ctx.first {
    buf[at] = b',';
    at += 1;
  }
  buf[at] = b'<';
  at += 1;

  let path_room = buf.len() - at - 1;
  let n = resource.path
                  .serialize(&mut buf[at..at + path_room])
                  .ok_or(LinkEncodeError)?;
  at += n;

  buf[at] = b'>';
  Ok(at + 1)
}

/// Handler for `GET /.well-known/core`: lists every registered
/// resource reachable over the inbound transport as an
/// `application/link-format` document.
pub fn well_known_core_handler(_message: &mut Message<'_>,
                               _aux: &Aux<'_>,
                               ctx: &mut RequestContext<'_>)
                               -> Outcome {
  let mut links = [0u8; WELL_KNOWN_CORE_SIZE_MAX];
  let size = match ctx.link_format(&mut links) {
    | Ok(size) => size,
    | Err(_) => return Outcome::Error(HandlerError::Other),
  };

  let mut storage = [0u8; 4];
  let mut options = Options::new(&mut storage);
  if options.set_content_format(ContentFormat::LINK_FORMAT).is_err() {
    return Outcome::Error(HandlerError::Other);
  }

  let mut response = Message::response(status::CONTENT, &links[..size], options);
  match ctx.send_response(&mut response) {
    | Ok(()) => Outcome::Done,
    | Err(_) => Outcome::Error(HandlerError::Other),
  }
}

pub(crate) static WELL_KNOWN_RESOURCES: [Resource; 1] =
  [Resource::new(PathSpec::new(&[".well-known", "core"]),
                 well_known_core_handler,
                 MethodSet::just(Method::Get))];

/// The built-in listener serving `/.well-known/core`. Consulted after
/// all registered listeners, and excluded from its own output.
pub(crate) static WELL_KNOWN_LISTENER: Listener = Listener::new(&WELL_KNOWN_RESOURCES);

//! A small CoAP server: `GET coap://localhost:5683/hello` answers
//! with a text payload, and `/.well-known/core` lists what's here.
//!
//! Try it with any CoAP client, e.g.
//! `coap-client -m get coap://127.0.0.1:5683/hello`

use std::time::Duration;

use lilypad::config::Config;
use lilypad::core::Core;
use lilypad::msg::opt::ContentFormat;
use lilypad::msg::{Message, Method, Options};
use lilypad::path::PathSpec;
use lilypad::server::{Aux, HandlerError, Listener, MethodSet, Outcome, RequestContext, Resource};
use lilypad::status;
use lilypad::std::{Clock, UdpTransport};

fn hello(_message: &mut Message<'_>,
         aux: &Aux<'_>,
         ctx: &mut RequestContext<'_>)
         -> Outcome {
  log::info!("saying hello to {}", aux.remote);

  let mut storage = [0u8; 8];
  let mut options = Options::new(&mut storage);
  if options.set_content_format(ContentFormat::TEXT).is_err() {
    return Outcome::Error(HandlerError::Other);
  }

  let mut response = Message::response(status::CONTENT, b"hello from lilypad", options);
  match ctx.send_response(&mut response) {
    | Ok(()) => Outcome::Done,
    | Err(_) => Outcome::Error(HandlerError::Other),
  }
}

fn bump(_message: &mut Message<'_>, _aux: &Aux<'_>, _ctx: &mut RequestContext<'_>) -> Outcome {
  Outcome::Respond(status::CHANGED)
}

static RESOURCES: [Resource; 2] =
  [Resource::new(PathSpec::new(&["hello"]), hello, MethodSet::just(Method::Get)),
   Resource::new(PathSpec::new(&["counter"]), bump, MethodSet::just(Method::Post))];

static LISTENER: Listener = Listener::new(&RESOURCES);

fn main() -> std::io::Result<()> {
  simple_logger::init_with_level(log::Level::Debug).unwrap();

  let transport = UdpTransport::bind("0.0.0.0:5683")?;
  let core = Core::new(transport, Clock::new(), Config::default()).expect("clock is monotonic");
  core.register(&LISTENER).expect("first registration");

  log::info!("listening on 0.0.0.0:5683");

  let mut buf = [0u8; lilypad::config::PDU_SIZE_MAX];
  loop {
    match core.transport().recv(&mut buf) {
      | Ok(incoming) => {
        if let Err(e) = core.handle_datagram(incoming) {
          log::debug!("dropped datagram: {:?}", e);
        }
      },
      | Err(nb::Error::WouldBlock) => std::thread::sleep(Duration::from_millis(10)),
      | Err(nb::Error::Other(e)) => return Err(e),
    }

    if let Err(e) = core.poll() {
      log::warn!("poll failed: {:?}", e);
    }
  }
}

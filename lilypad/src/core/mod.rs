//! The core: one value owning the transport, the clock, and the
//! single mutex-guarded state block everything else lives in.
//!
//! The mutex is held only across short allocation/lookup critical
//! sections, never across a transport send, a handler
//! invocation, never across a timer wait. The next-message-ID counter
//! is the sole piece of shared mutable state outside it (an atomic).

use core::sync::atomic::{AtomicU16, Ordering};

use ::std::sync::{Mutex, MutexGuard};

use embedded_time::Instant;
use lilypad_msg::pdu::{self, ParsedPdu};
use lilypad_msg::{Id, Message, Properties, Token};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{Config, CARBON_COPIES_MAX, GENERATED_TOKEN_LENGTH, PDU_SIZE_MAX,
                    TRANSMISSIONS_MAX};
use crate::endpoint::Endpoint;
use crate::logging;
use crate::messaging::{Classified, Transmission};
use crate::net::{Incoming, Transport};
use crate::sched::{Event, Scheduler};
use crate::server::Listener;
use crate::time::{elapsed_millis, Clock};

mod error;

pub use error::{Error, What, When};

/// Called with expected responses (piggybacked on an ACK matching an
/// open transmission) so a client built on the core can consume them.
pub type ResponseHook = fn(&Endpoint, &Message<'_>, &Properties);

/// Called when a confirmable transmission exhausted its
/// retransmission budget without an ACK.
pub type TimeoutHook = fn(&Endpoint, Id);

/// Fixed pool of PDU-sized slots retaining sent confirmable messages
/// byte-for-byte. A slot's first byte is 0 when free; a stored PDU
/// always starts with the version bits, so it can never read as free
/// while allocated.
pub(crate) struct CarbonPool {
  slots: [[u8; PDU_SIZE_MAX]; CARBON_COPIES_MAX],
}

impl CarbonPool {
  fn new() -> Self {
    Self { slots: [[0; PDU_SIZE_MAX]; CARBON_COPIES_MAX] }
  }

  /// Linear scan for a free slot; claims it by making the first byte
  /// nonzero until the PDU builder overwrites it.
  pub(crate) fn alloc(&mut self) -> Option<usize> {
    for (i, slot) in self.slots.iter_mut().enumerate() {
      if slot[0] == 0 {
        slot[0] = 0xff;
        return Some(i);
      }
    }
    log::debug!("no space to alloc PDU copy");
    None
  }

  pub(crate) fn free(&mut self, i: usize) {
    self.slots[i][0] = 0;
  }

  pub(crate) fn slot_mut(&mut self, i: usize) -> &mut [u8] {
    &mut self.slots[i]
  }

  pub(crate) fn slot(&self, i: usize) -> &[u8] {
    &self.slots[i]
  }

  pub(crate) fn used(&self) -> usize {
    self.slots.iter().filter(|s| s[0] != 0).count()
  }
}

/// Everything the state mutex guards.
pub(crate) struct State<C: Clock> {
  pub(crate) listeners: Vec<&'static Listener>,
  pub(crate) transmissions: [Option<Transmission>; TRANSMISSIONS_MAX],
  pub(crate) carbons: CarbonPool,
  pub(crate) sched: Scheduler<C>,
  pub(crate) rng: ChaCha8Rng,
}

/// A point-in-time snapshot of pool usage, the runtime rendition of a
/// state dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreStats {
  /// Live confirmable transmissions awaiting ACK
  pub active_transmissions: usize,
  /// Allocated carbon-copy slots (equals `active_transmissions` at
  /// all times)
  pub used_carbon_copies: usize,
  /// Registered listeners, the built-in one not counted
  pub listeners: usize,
}

/// # Core
/// The CoAP core: transport driver, clock, configuration, message-ID
/// counter, and the state block.
///
/// All inbound processing, handler invocation and timer work runs on
/// whichever thread calls [`Core::handle_datagram`] and
/// [`Core::poll`]; the intended shape is one dedicated event-loop
/// thread calling both.
pub struct Core<T, C>
  where T: Transport,
        C: Clock
{
  pub(crate) transport: T,
  pub(crate) clock: C,
  pub(crate) config: Config,
  pub(crate) next_mid: AtomicU16,
  pub(crate) on_response: Option<ResponseHook>,
  pub(crate) on_timeout: Option<TimeoutHook>,
  pub(crate) state: Mutex<State<C>>,
}

impl<T, C> Core<T, C>
  where T: Transport,
        C: Clock
{
  /// Build a core around a transport and a clock.
  ///
  /// Seeds the message-ID counter and the jitter RNG from the clock;
  /// fails only if the clock cannot produce a reading.
  pub fn new(transport: T, clock: C, config: Config) -> Result<Self, Error<T::Error>> {
    let now = clock.try_now().map_err(|_| When::Polling.what(What::Clock))?;
    let seed = elapsed_millis(now, Instant::new(0));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let next_mid = AtomicU16::new(rng.gen());

    Ok(Self { transport,
              clock,
              config,
              next_mid,
              on_response: None,
              on_timeout: None,
              state: Mutex::new(State { listeners: Vec::new(),
                                        transmissions: [None; TRANSMISSIONS_MAX],
                                        carbons: CarbonPool::new(),
                                        sched: Scheduler::new(),
                                        rng }) })
  }

  /// Install a hook receiving expected responses.
  pub fn on_response(mut self, hook: ResponseHook) -> Self {
    self.on_response = Some(hook);
    self
  }

  /// Install a hook notified of confirmable-delivery timeouts.
  pub fn on_timeout(mut self, hook: TimeoutHook) -> Self {
    self.on_timeout = Some(hook);
    self
  }

  /// The transport driver, e.g. for receiving datagrams to feed back
  /// into [`Core::handle_datagram`].
  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// The active configuration.
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// The clock driving timeouts.
  pub fn clock(&self) -> &C {
    &self.clock
  }

  pub(crate) fn lock(&self) -> MutexGuard<'_, State<C>> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub(crate) fn try_now(&self, when: When) -> Result<Instant<C>, Error<T::Error>> {
    self.clock.try_now().map_err(|_| when.what(What::Clock))
  }

  pub(crate) fn fresh_id(&self) -> Id {
    Id(self.next_mid.fetch_add(1, Ordering::Relaxed))
  }

  /// Register a statically-allocated listener. Listeners are matched
  /// in registration order; registering the same listener twice is
  /// an error.
  pub fn register(&self, listener: &'static Listener) -> Result<(), Error<T::Error>> {
    let mut state = self.lock();
    if state.listeners.iter().any(|l| core::ptr::eq(*l, listener)) {
      return Err(When::Registering.what(What::AlreadyExists));
    }
    state.listeners.push(listener);
    log::debug!("registered listener with {} resources", listener.resources.len());
    Ok(())
  }

  /// Deregister a listener by identity.
  pub fn deregister(&self, listener: &'static Listener) -> Result<(), Error<T::Error>> {
    let mut state = self.lock();
    match state.listeners.iter().position(|l| core::ptr::eq(*l, listener)) {
      | Some(i) => {
        state.listeners.remove(i);
        Ok(())
      },
      | None => Err(When::Registering.what(What::NotFound)),
    }
  }

  /// Generate a random full-width token.
  pub fn generate_token(&self) -> Token {
    let mut bytes = [0u8; GENERATED_TOKEN_LENGTH];
    self.lock().rng.fill_bytes(&mut bytes);
    Token::from_bytes(&bytes)
  }

  /// Drop all per-endpoint state (open transmissions) and let the
  /// transport tear down any session. Invoked when a transport
  /// signals that a peer is gone.
  pub fn forget_endpoint(&self, endpoint: &Endpoint) {
    {
      let mut state = self.lock();
      for slot in 0..TRANSMISSIONS_MAX {
        let matches = state.transmissions[slot].as_ref()
                                               .map(|t| t.endpoint == *endpoint)
                                               .unwrap_or(false);
        if matches {
          Self::drop_transmission(&mut state, slot);
        }
      }
    }
    self.transport.session_teardown(endpoint);
  }

  /// Release a transmission record and its carbon copy, cancelling
  /// the ACK timeout.
  pub(crate) fn drop_transmission(state: &mut State<C>, slot: usize) -> Option<Transmission> {
    let transmission = state.transmissions[slot].take()?;
    state.carbons.free(transmission.carbon);
    state.sched.cancel(Event::AckTimeout { slot });
    log::debug!("[MID {}] transmission ended", transmission.id.0);
    Some(transmission)
  }

  /// Pool usage snapshot.
  pub fn stats(&self) -> CoreStats {
    let state = self.lock();
    CoreStats { active_transmissions: state.transmissions.iter().flatten().count(),
                used_carbon_copies: state.carbons.used(),
                listeners: state.listeners.len() }
  }

  /// Handle one inbound datagram: parse, run the RFC 7252 messaging
  /// layer (ACK/RST bookkeeping, ping/pong), then dispatch to the
  /// exchange layer.
  pub fn handle_datagram(&self, incoming: Incoming<'_>) -> Result<(), Error<T::Error>> {
    let Incoming { bytes,
                   truncated,
                   remote,
                   local } = incoming;

    let ParsedPdu { mut message,
                    properties } =
      pdu::parse(bytes).map_err(|e| When::Receiving.what(What::BadMessage(e)))?;

    log::trace!("recvd {} <- {}",
                logging::msg_summary(&message, &properties),
                remote);

    let expected_response =
      match self.classify_inbound(&message, &properties, &remote, local.as_ref())? {
        | Classified::Swallowed => return Ok(()),
        | Classified::PassUp { expected_response } => expected_response,
      };

    self.dispatch(&mut message,
                  &properties,
                  &remote,
                  local.as_ref(),
                  truncated,
                  expected_response)
  }

  /// Drive the scheduler: fire due timers and run the posted events
  /// (retransmissions, give-ups). Call this regularly from the event
  /// loop.
  pub fn poll(&self) -> Result<(), Error<T::Error>> {
    let now = self.try_now(When::Polling)?;

    loop {
      let event = {
        let mut state = self.lock();
        state.sched.service(now);
        state.sched.pop()
      };

      match event {
        | Some(Event::AckTimeout { slot }) => self.on_ack_timeout(slot, now),
        | None => return Ok(()),
      }
    }
  }

  /// Send a request or standalone response.
  ///
  /// `reliable` selects confirmable delivery; `properties` comes back
  /// with the ID and type actually used on the wire.
  pub fn send(&self,
              message: &Message<'_>,
              properties: &mut Properties,
              remote: &Endpoint,
              local: Option<&Endpoint>,
              reliable: bool)
              -> Result<(), Error<T::Error>> {
    self.messaging_send(message, properties, remote, local, reliable)
  }

  /// CoAP ping: an empty confirmable message. The peer answers with
  /// a Reset ("pong"), which completes the transmission. Returns the
  /// message ID to correlate with.
  pub fn ping(&self, remote: &Endpoint, local: Option<&Endpoint>) -> Result<Id, Error<T::Error>> {
    let message = Message::empty(lilypad_msg::Code::EMPTY);
    let mut properties = Properties::default();
    self.messaging_send(&message, &mut properties, remote, local, true)?;
    Ok(properties.rfc7252.id)
  }
}

impl<T, C> core::fmt::Debug for Core<T, C>
  where T: Transport,
        C: Clock
{
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Core").field("stats", &self.stats()).finish()
  }
}

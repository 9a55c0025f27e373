//! The RFC 7252 messaging state machine: type/ID bookkeeping,
//! acknowledgement-driven retransmission with exponential back-off,
//! deduplication carbon copies, ping/pong and reset handling.
//!
//! Outbound, every message is classified into one of four wire forms
//! (piggybacked ACK, fresh CON, fresh NON, bare RST); confirmable
//! messages are retained byte-for-byte in a carbon-copy slot and
//! retransmitted on a doubling schedule until acknowledged or out of
//! budget. Inbound, ACK/RST traffic is consumed here and everything
//! else is passed up to the exchange layer.

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use lilypad_msg::pdu;
use lilypad_msg::{Code, CodeKind, Id, Message, Properties, Token, Type};
use rand::Rng;

use crate::config::PDU_SIZE_MAX;
use crate::core::{Core, Error, State, What, When};
use crate::endpoint::Endpoint;
use crate::logging;
use crate::net::Transport;
use crate::sched::Event;
use crate::time::Clock;

/// Tracks one confirmable message awaiting acknowledgement.
///
/// Lifetime ends on ACK reception, RST reception, timeout exhaustion
/// or explicit cancellation; all four release the carbon copy and the
/// scheduled timeout.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Transmission {
  /// Who we're waiting on
  pub(crate) endpoint: Endpoint,
  /// Message ID the ACK/RST must carry
  pub(crate) id: Id,
  /// Carbon-copy slot holding the exact wire PDU
  pub(crate) carbon: usize,
  /// Bytes used within the carbon-copy slot
  pub(crate) pdu_len: usize,
  /// Retransmissions left before giving up
  pub(crate) remaining: u8,
  /// Backoff base for this transmission, drawn once with jitter
  pub(crate) base_ms: u64,
}

/// What the messaging layer decided about an inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Classified {
  /// Fully handled here (ACK/RST bookkeeping, ping, empty NON);
  /// nothing for the exchange layer.
  Swallowed,
  /// Hand the message to the exchange layer.
  PassUp {
    /// The message is a response matching an open transmission
    expected_response: bool,
  },
}

impl<T, C> Core<T, C>
  where T: Transport,
        C: Clock
{
  fn find_transmission(state: &State<C>, remote: &Endpoint, id: Id) -> Option<usize> {
    state.transmissions
         .iter()
         .position(|t| matches!(t, Some(t) if t.id == id && t.endpoint == *remote))
  }

  /// Complete (cancel) the transmission matching `(remote, id)`,
  /// releasing its carbon copy and timeout. Returns whether one
  /// matched.
  pub(crate) fn complete_transmission(&self, remote: &Endpoint, id: Id) -> bool {
    let mut state = self.lock();
    match Self::find_transmission(&state, remote, id) {
      | Some(slot) => {
        Self::drop_transmission(&mut state, slot);
        true
      },
      | None => false,
    }
  }

  /// Observation-deregistration hint: the peer reset one of our
  /// notifications and wants no more (RFC 7641 §3.6).
  pub(crate) fn forget_notifications(&self, remote: &Endpoint) {
    log::trace!("peer {} deregistered from notifications", remote);
  }

  /// The §4.2/§4.3 inbound table. Consumes ACK/RST and empty
  /// messages; decides what the exchange layer sees.
  pub(crate) fn classify_inbound(&self,
                                 message: &Message<'_>,
                                 properties: &Properties,
                                 remote: &Endpoint,
                                 local: Option<&Endpoint>)
                                 -> Result<Classified, Error<T::Error>> {
    let id = properties.rfc7252.id;

    match properties.rfc7252.ty {
      | Type::Ack => {
        let matched = self.complete_transmission(remote, id);
        match message.code.kind() {
          | CodeKind::Empty => {
            log::debug!("[MID {}] received ACK, stopping retransmission", id.0);
            Ok(Classified::Swallowed)
          },
          | CodeKind::Response if matched => Ok(Classified::PassUp { expected_response: true }),
          | CodeKind::Response => {
            // late ACK: the transmission is already gone, treat as
            // unmatched and drop
            log::debug!("[MID {}] ACK without open transmission, ignoring", id.0);
            Ok(Classified::Swallowed)
          },
          | _ => {
            log::debug!("[MID {}] ACK with code {}, expected 0.00 or a response, ignoring",
                        id.0,
                        message.code);
            Err(When::Receiving.what(What::Protocol))
          },
        }
      },

      | Type::Reset => {
        self.complete_transmission(remote, id);
        if message.code != Code::EMPTY {
          log::debug!("[MID {}] RST with code {}, expected 0.00, ignoring", id.0, message.code);
          return Err(When::Receiving.what(What::Protocol));
        }
        self.forget_notifications(remote);
        Ok(Classified::Swallowed)
      },

      | Type::Con if message.code == Code::EMPTY => {
        // CoAP ping: pong with a RST before anything else happens
        log::debug!("[MID {}] received empty CON (ping), sending RST (pong)", id.0);
        self.send_reset(id, remote, local)?;
        Ok(Classified::Swallowed)
      },

      | Type::Non if message.code == Code::EMPTY => {
        log::debug!("[MID {}] received empty NON, ignoring", id.0);
        Ok(Classified::Swallowed)
      },

      | Type::Con | Type::Non => Ok(Classified::PassUp { expected_response: false }),
    }
  }

  /// Send a bare RST for `id`. Never retransmitted, never classified.
  pub(crate) fn send_reset(&self,
                           id: Id,
                           remote: &Endpoint,
                           local: Option<&Endpoint>)
                           -> Result<(), Error<T::Error>> {
    log::debug!("[MID {}] sending RST", id.0);
    let message = Message::empty(Code::EMPTY);
    let properties = Properties::new(Type::Reset, id, Token::empty());
    self.transmit(&message, &properties, remote, local)
  }

  /// Fire-and-forget transmit of `message` exactly as described by
  /// `properties`, via the scatter-gather builder.
  pub(crate) fn transmit(&self,
                         message: &Message<'_>,
                         properties: &Properties,
                         remote: &Endpoint,
                         local: Option<&Endpoint>)
                         -> Result<(), Error<T::Error>> {
    if !self.transport.supports(remote.proto()) {
      log::warn!("missing driver for proto {}", remote.proto());
      return Err(When::Sending.what(What::NotSupported(remote.proto())));
    }

    let mut header: pdu::HeaderBuffer = Default::default();
    let chunks = pdu::build_slices(&mut header, message, properties)
      .map_err(|e| When::Sending.what(e.into()))?;

    log::trace!("sending {} -> {}",
                logging::msg_summary(message, properties),
                remote);

    self.transport
        .sendv(&chunks, remote, local)
        .map_err(|e| When::Sending.what(What::Transport(e)))
  }

  fn format_separate(&self, properties: &mut Properties, reliable: bool) {
    properties.rfc7252.id = self.fresh_id();
    properties.rfc7252.ty = if reliable { Type::Con } else { Type::Non };
  }

  /// The outbound classification table: piggyback responses onto the
  /// request's ACK, everything else goes out fresh as CON or NON per
  /// `reliable`. CONs get a carbon copy and an ACK timeout.
  pub(crate) fn messaging_send(&self,
                               message: &Message<'_>,
                               properties: &mut Properties,
                               remote: &Endpoint,
                               local: Option<&Endpoint>,
                               reliable: bool)
                               -> Result<(), Error<T::Error>> {
    if properties.is_notification {
      // notifications always use the separate-response style
      self.format_separate(properties, reliable);
    } else if message.code.is_response() && properties.rfc7252.ty == Type::Con {
      // piggybacked response: ride the ACK, keep the request's ID
      properties.rfc7252.ty = Type::Ack;
    } else {
      self.format_separate(properties, reliable);
    }

    match properties.rfc7252.ty {
      | Type::Con => self.send_con(message, properties, remote, local),
      | _ => self.transmit(message, properties, remote, local),
    }
  }

  /// Confirmable send: reserve a carbon copy, then a transmission
  /// record, build the PDU into the carbon slot, transmit, and arm
  /// the ACK timeout.
  fn send_con(&self,
              message: &Message<'_>,
              properties: &Properties,
              remote: &Endpoint,
              local: Option<&Endpoint>)
              -> Result<(), Error<T::Error>> {
    if !self.transport.supports(remote.proto()) {
      log::warn!("missing driver for proto {}", remote.proto());
      return Err(When::Sending.what(What::NotSupported(remote.proto())));
    }

    let now = self.try_now(When::Sending)?;
    let mut wire = [0u8; PDU_SIZE_MAX];
    let wire_len;

    {
      let mut state = self.lock();

      let carbon = match state.carbons.alloc() {
        | Some(carbon) => carbon,
        | None => return Err(When::Sending.what(What::NoBuffer)),
      };
      let slot = match state.transmissions.iter().position(|t| t.is_none()) {
        | Some(slot) => slot,
        | None => {
          log::debug!("no space to alloc transmission state");
          state.carbons.free(carbon);
          return Err(When::Sending.what(What::NoBuffer));
        },
      };

      let len = match pdu::build(state.carbons.slot_mut(carbon), message, properties) {
        | Ok(len) => len,
        | Err(e) => {
          state.carbons.free(carbon);
          return Err(When::Sending.what(e.into()));
        },
      };

      let Milliseconds(ack_ms) = self.config.ack_timeout;
      let factor = self.config.ack_random_factor_1000 as u64;
      let base_ms = match factor {
        | f if f > 1000 => state.rng.gen_range(ack_ms..ack_ms * f / 1000),
        | _ => ack_ms,
      };

      state.transmissions[slot] = Some(Transmission { endpoint: *remote,
                                                      id: properties.rfc7252.id,
                                                      carbon,
                                                      pdu_len: len,
                                                      remaining: self.config.max_retransmissions,
                                                      base_ms });
      state.sched.schedule(Event::AckTimeout { slot }, now, base_ms);

      // sends happen outside the lock, so the wire bytes leave the
      // carbon slot through a stack copy
      wire[..len].copy_from_slice(&state.carbons.slot(carbon)[..len]);
      wire_len = len;
    }

    log::trace!("sending {} -> {}",
                logging::msg_summary(message, properties),
                remote);

    match self.transport.sendv(&[&wire[..wire_len]], remote, local) {
      | Ok(()) => Ok(()),
      | Err(e) => {
        // a send that never left must not pin a slot for the whole
        // backoff schedule
        let mut state = self.lock();
        if let Some(slot) = Self::find_transmission(&state, remote, properties.rfc7252.id) {
          Self::drop_transmission(&mut state, slot);
        }
        Err(When::Sending.what(What::Transport(e)))
      },
    }
  }

  /// ACK-timeout handler: retransmit the exact carbon copy and double
  /// the timeout, or give up when the budget is spent.
  pub(crate) fn on_ack_timeout(&self, slot: usize, now: Instant<C>) {
    enum Action {
      Retransmit {
        wire: [u8; PDU_SIZE_MAX],
        len: usize,
        endpoint: Endpoint,
        id: Id,
        remaining: u8,
        delay_ms: u64,
      },
      GiveUp {
        endpoint: Endpoint,
        id: Id,
      },
    }

    let action = {
      let mut state = self.lock();
      let transmission = match state.transmissions[slot] {
        | Some(t) => t,
        | None => return,
      };

      if transmission.remaining == 0 {
        Self::drop_transmission(&mut state, slot);
        Action::GiveUp { endpoint: transmission.endpoint,
                         id: transmission.id }
      } else {
        // retry index i: the first timeout retransmits with i = 0 and
        // waits base * 2^0, landing the fires at base * 2^i after the
        // initial send
        let i = (self.config.max_retransmissions - transmission.remaining) as u32;
        let delay_ms = transmission.base_ms << i;

        if let Some(t) = state.transmissions[slot].as_mut() {
          t.remaining -= 1;
        }
        state.sched.reschedule(Event::AckTimeout { slot }, now, delay_ms);

        let mut wire = [0u8; PDU_SIZE_MAX];
        wire[..transmission.pdu_len]
          .copy_from_slice(&state.carbons.slot(transmission.carbon)[..transmission.pdu_len]);

        Action::Retransmit { wire,
                             len: transmission.pdu_len,
                             endpoint: transmission.endpoint,
                             id: transmission.id,
                             remaining: transmission.remaining - 1,
                             delay_ms }
      }
    };

    match action {
      | Action::Retransmit { wire,
                             len,
                             endpoint,
                             id,
                             remaining,
                             delay_ms, } => {
        log::debug!("[MID {}] ACK timeout, retransmitting now, waiting {} ms, {} attempts remaining",
                    id.0,
                    delay_ms,
                    remaining);
        if let Err(e) = self.transport.sendv(&[&wire[..len]], &endpoint, None) {
          log::warn!("[MID {}] retransmission failed: {:?}", id.0, e);
        }
      },
      | Action::GiveUp { endpoint, id } => {
        log::debug!("[MID {}] ACK timeout, max retransmissions exceeded", id.0);
        match self.on_timeout {
          | Some(hook) => hook(&endpoint, id),
          | None => log::warn!("[MID {}] confirmable delivery to {} timed out", id.0, endpoint),
        }
      },
    }
  }
}

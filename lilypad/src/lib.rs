//! `lilypad` is a unified CoAP framework core aiming to be:
//! - predictable on constrained targets (fixed pools, no allocation on
//!   the datagram path)
//! - transport-agnostic behind a narrow driver interface
//! - faithful to RFC 7252 messaging semantics
//!
//! ## Shape
//! The core is a [`Core`](core::Core): one value owning a transport
//! driver, a clock, and a single mutex-guarded state block (listener
//! registry, retransmission pools, the cooperative event scheduler).
//! Inbound datagrams enter through
//! [`Core::handle_datagram`](core::Core::handle_datagram); timers are
//! driven by calling [`Core::poll`](core::Core::poll) from the event
//! loop. Everything (resource handlers, timer callbacks, transport
//! receive paths) runs sequentially on that one thread.
//!
//! ## Layers
//! Bottom-up, each depending only on those below:
//! - [`lilypad_msg`]: options, PDU framing, message views
//! - [`endpoint`] / [`path`] / [`net`]: addressing, path matching,
//!   the transport driver interface
//! - [`messaging`]: RFC 7252 types, IDs, retransmission with carbon
//!   copies
//! - [`exchange`] / [`server`]: request dispatch to registered
//!   resources and the response path
//!
//! CoAP itself is an application-level protocol bringing HTTP
//! semantics (verbs, options-as-headers, response status classes) to
//! constrained devices over datagram transports; see
//! [RFC 7252](https://datatracker.ietf.org/doc/html/rfc7252).

// docs
#![cfg_attr(docsrs, feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]

pub use lilypad_msg as msg;


pub(crate) mod logging;
pub(crate) mod string;

/// configuring runtime behavior & compile-time bounds
pub mod config;

/// the core: state, inbound dispatch, public send surface
pub mod core;

/// transport-tagged remote/local addresses
pub mod endpoint;

/// request pre-processing & the response path
pub mod exchange;

/// RFC 7252 messaging state machine
pub mod messaging;

/// transport driver interface
pub mod net;

/// resource path objects & matching
pub mod path;

/// scheduled events over the cooperative queue
pub(crate) mod sched;

/// resources, listeners, request handlers
pub mod server;

/// response status codes
pub mod status;

/// `std`-backed clock and UDP driver
pub mod std;

/// time abstractions
pub mod time;

/// Helper constants and functions for creating multicast addresses
pub mod multicast {
  use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

  /// IPv4 "All CoAP devices" multicast address.
  ///
  /// If using multicast to discover devices, it's recommended
  /// that you use this address with a port specific to your
  /// application.
  pub const ALL_COAP_DEVICES_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 187);

  /// Create a SocketAddr (IP + port) with the [`ALL_COAP_DEVICES_IP`]
  /// address
  pub const fn all_coap_devices(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(ALL_COAP_DEVICES_IP, port))
  }
}

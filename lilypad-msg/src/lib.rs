//! `lilypad-msg` is the wire layer of the `lilypad` CoAP framework:
//! low-level parsing, random-access manipulation and serialization of
//! CoAP messages as specified by [RFC 7252](https://datatracker.ietf.org/doc/html/rfc7252).
//!
//! ## Zero-copy
//! Unlike most CoAP codecs, nothing in this crate owns a buffer. A
//! [`Message`] is a _view_ over storage supplied by the caller:
//! the [options container](msg::opt::Options) borrows a mutable byte
//! slice and edits the delta-encoded option blob in place, and the
//! [payload](msg::Payload) is a borrowed range (or chain of ranges) of
//! the datagram the message was parsed from.
//!
//! This makes the crate allocator-free and suitable for constrained
//! targets: the only "allocation" is the caller deciding how big its
//! receive buffer is.
//!
//! ## Layout
//! - [`msg`]: message envelope, [`Code`], [`Token`], [`Type`],
//!   [`msg::opt`] (the option codec) and friends
//! - [`pdu`]: framing, RFC 7252 header encode/decode, payload-marker
//!   handling, contiguous and scatter-gather builders

// docs
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
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
// -
// features
#![cfg_attr(not(feature = "std"), no_std)]

/// Message types
pub mod msg;

/// PDU framer & parser
pub mod pdu;

pub use msg::*;

/// The byte separating the option blob from the payload.
///
/// Never a legal option head: nibble value 15 is reserved in both
/// positions and only permitted in this exact shape.
pub const PAYLOAD_MARKER: u8 = 0xff;

/// Upper bound for token lengths we accept.
///
/// RFC 7252 reserves TKL values 9-15; RFC 8974 extended tokens are not
/// supported, so anything above 8 is a message format error.
pub const TOKEN_LENGTH_MAX: usize = 8;

#[cfg(test)]
pub(crate) mod test {
  /// Scenario bytes: CON POST /actuators/leds?color=g (JSON) "mode=on"
  pub const POST_ACTUATORS: &[u8] =
    &[0x40, 0x02, 0xfe, 0xb1, 0xb9, 0x61, 0x63, 0x74, 0x75, 0x61, 0x74, 0x6f, 0x72, 0x73, 0x04,
      0x6c, 0x65, 0x64, 0x73, 0x11, 0x32, 0x37, 0x63, 0x6f, 0x6c, 0x6f, 0x72, 0x3d, 0x67, 0x21,
      0x32, 0xff, 0x6d, 0x6f, 0x64, 0x65, 0x3d, 0x6f, 0x6e];
}

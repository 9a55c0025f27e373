use embedded_time::duration::Milliseconds;

use crate::time::Millis;

/// Largest PDU the core sends or retains for retransmission, bytes.
///
/// This is also the size of one carbon-copy slot, so it bounds every
/// confirmable message.
pub const PDU_SIZE_MAX: usize = 1280;

/// Options per message (the option index array bound)
pub const OPTIONS_MAX: usize = 16;

/// Stack buffer for the aggregate Uri-Path during resource lookup.
///
/// Requests whose path doesn't fit cannot match any resource and are
/// answered 4.04.
pub const PATH_LENGTH_MAX: usize = 64;

/// Concurrent confirmable transmissions awaiting acknowledgement
pub const TRANSMISSIONS_MAX: usize = 4;

/// Carbon-copy slots for byte-exact retransmission
pub const CARBON_COPIES_MAX: usize = 4;

/// Output bound for the `/.well-known/core` link-format payload
pub const WELL_KNOWN_CORE_SIZE_MAX: usize = 256;

/// Length of tokens produced by
/// [`Core::generate_token`](crate::core::Core::generate_token)
pub const GENERATED_TOKEN_LENGTH: usize = 8;

/// Runtime configuration of the RFC 7252 messaging layer.
///
/// The defaults are the transmission parameters of
/// [RFC7252 §4.8](https://datatracker.ietf.org/doc/html/rfc7252#section-4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Base ACK timeout before the first retransmission.
  ///
  /// Defaults to 2 seconds:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use lilypad::config::Config;
  ///
  /// assert_eq!(Config::default().ack_timeout, Milliseconds(2_000u64));
  /// ```
  pub ack_timeout: Millis,

  /// `ACK_RANDOM_FACTOR`, scaled by 1000.
  ///
  /// Each confirmable transmission draws its backoff base uniformly
  /// from `[ack_timeout, ack_timeout * factor / 1000)`. A value of
  /// `1000` disables the jitter.
  ///
  /// Defaults to 1500 (factor 1.5):
  /// ```
  /// use lilypad::config::Config;
  ///
  /// assert_eq!(Config::default().ack_random_factor_1000, 1500);
  /// ```
  pub ack_random_factor_1000: u16,

  /// `MAX_RETRANSMIT`: how many times an unacknowledged confirmable
  /// message is retransmitted before the exchange times out. The wire
  /// sees at most `max_retransmissions + 1` copies.
  ///
  /// Defaults to 4:
  /// ```
  /// use lilypad::config::Config;
  ///
  /// assert_eq!(Config::default().max_retransmissions, 4);
  /// ```
  pub max_retransmissions: u8,

  /// Honor the request's No-Response option (RFC 7967) for responses
  /// the exchange layer builds itself.
  ///
  /// Defaults to true.
  pub honor_no_response: bool,
}

impl Default for Config {
  fn default() -> Self {
    Config { ack_timeout: Milliseconds(2_000),
             ack_random_factor_1000: 1500,
             max_retransmissions: 4,
             honor_no_response: true }
  }
}

impl Config {
  /// Worst-case span from first transmission to giving up, with the
  /// configured jitter ceiling.
  pub fn max_transmit_wait(&self) -> Millis {
    let upper = self.ack_timeout.0 * self.ack_random_factor_1000 as u64 / 1000;
    Milliseconds(upper << (self.max_retransmissions as u32 + 1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rfc_defaults() {
    let c = Config::default();
    // final deadline with the default parameters: 3s jitter ceiling,
    // doubled once per retransmission plus the closing timeout
    assert_eq!(c.max_transmit_wait(), Milliseconds(96_000u64));
  }
}

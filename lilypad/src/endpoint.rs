use core::fmt;

use no_std_net::SocketAddr;

/// Transport protocol discriminant.
///
/// UDP and DTLS are the transports the core ships drivers for; the
/// reliable transports (RFC 8323) are representable so endpoints and
/// bitmasks stay stable when a driver for them is added.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Proto {
  /// CoAP over UDP (`coap`)
  Udp = 0,
  /// CoAP over DTLS (`coaps`)
  Dtls = 1,
  /// CoAP over TCP (`coap+tcp`)
  Tcp = 2,
  /// CoAP over TLS-over-TCP (`coaps+tcp`)
  TcpTls = 3,
  /// CoAP over WebSockets (`coap+ws`)
  Ws = 4,
  /// CoAP over secure WebSockets (`coaps+ws`)
  WsTls = 5,
}

impl Proto {
  /// Does this transport provide its own reliability (making the
  /// RFC 7252 retransmission machinery unnecessary)?
  pub const fn is_reliable_transport(self) -> bool {
    matches!(self, Proto::Tcp | Proto::TcpTls | Proto::Ws | Proto::WsTls)
  }

  /// The URI scheme naming this transport
  pub const fn scheme(self) -> &'static str {
    match self {
      | Proto::Udp => "coap",
      | Proto::Dtls => "coaps",
      | Proto::Tcp => "coap+tcp",
      | Proto::TcpTls => "coaps+tcp",
      | Proto::Ws => "coap+ws",
      | Proto::WsTls => "coaps+ws",
    }
  }

  /// Short display name
  pub const fn name(self) -> &'static str {
    match self {
      | Proto::Udp => "UDP",
      | Proto::Dtls => "DTLS",
      | Proto::Tcp => "TCP",
      | Proto::TcpTls => "TLS",
      | Proto::Ws => "WS",
      | Proto::WsTls => "WSS",
    }
  }
}

impl fmt::Display for Proto {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// A set of [`Proto`]s, used to gate listeners and resources by
/// transport.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ProtoSet(u8);

impl ProtoSet {
  /// The empty set
  pub const NONE: ProtoSet = ProtoSet(0);

  /// Every transport, present and future
  pub const ALLOW_ALL: ProtoSet = ProtoSet(u8::MAX);

  /// The set containing exactly `proto`
  pub const fn just(proto: Proto) -> Self {
    ProtoSet(1 << proto as u8)
  }

  /// This set plus `proto`
  pub const fn with(self, proto: Proto) -> Self {
    ProtoSet(self.0 | 1 << proto as u8)
  }

  /// Membership test
  pub const fn contains(self, proto: Proto) -> bool {
    self.0 & 1 << proto as u8 != 0
  }
}

impl Default for ProtoSet {
  fn default() -> Self {
    ProtoSet::ALLOW_ALL
  }
}

/// # Endpoint
/// A transport-tagged remote or local address.
///
/// Equality is by protocol discriminant plus the full address tuple
/// (IP, port, and scope for IPv6), which is what keys the
/// retransmission table.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Endpoint {
  /// Plain UDP socket address
  Udp(SocketAddr),
  /// DTLS-secured UDP socket address
  Dtls(SocketAddr),
}

impl Endpoint {
  /// The transport this endpoint speaks
  pub fn proto(&self) -> Proto {
    match self {
      | Endpoint::Udp(_) => Proto::Udp,
      | Endpoint::Dtls(_) => Proto::Dtls,
    }
  }

  /// The socket address behind the tag
  pub fn addr(&self) -> SocketAddr {
    match self {
      | Endpoint::Udp(addr) | Endpoint::Dtls(addr) => *addr,
    }
  }

  /// Is this a multicast destination?
  pub fn is_multicast(&self) -> bool {
    self.addr().ip().is_multicast()
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.proto(), self.addr())
  }
}

//! `std`-backed implementations of the core's collaborators: a
//! monotonic millisecond [`Clock`] and a [`UdpTransport`] over
//! [`::std::net::UdpSocket`].

use ::std::io;
use ::std::net::UdpSocket;
use ::std::time;

use embedded_time::rate::Fraction;
use embedded_time::Instant;

use crate::config::PDU_SIZE_MAX;
use crate::endpoint::{Endpoint, Proto};
use crate::net::{Incoming, Transport};

/// A monotonic clock counting milliseconds since its creation.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
  start: time::Instant,
}

impl Clock {
  /// A clock whose epoch is now.
  pub fn new() -> Self {
    Self { start: time::Instant::now() }
  }
}

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

  fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
    Ok(Instant::new(self.start.elapsed().as_millis() as u64))
  }
}

fn to_std(addr: no_std_net::SocketAddr) -> ::std::net::SocketAddr {
  match addr {
    | no_std_net::SocketAddr::V4(v4) => {
      let ip = v4.ip().octets();
      (::std::net::Ipv4Addr::from(ip), v4.port()).into()
    },
    | no_std_net::SocketAddr::V6(v6) => {
      let ip = v6.ip().octets();
      (::std::net::Ipv6Addr::from(ip), v6.port()).into()
    },
  }
}

fn from_std(addr: ::std::net::SocketAddr) -> no_std_net::SocketAddr {
  match addr {
    | ::std::net::SocketAddr::V4(v4) => {
      no_std_net::SocketAddr::V4(no_std_net::SocketAddrV4::new(v4.ip().octets().into(),
                                                               v4.port()))
    },
    | ::std::net::SocketAddr::V6(v6) => {
      no_std_net::SocketAddr::V6(no_std_net::SocketAddrV6::new(v6.ip().octets().into(),
                                                               v6.port(),
                                                               v6.flowinfo(),
                                                               v6.scope_id()))
    },
  }
}

/// CoAP-over-UDP driver on a non-blocking [`UdpSocket`].
#[derive(Debug)]
pub struct UdpTransport {
  socket: UdpSocket,
}

impl UdpTransport {
  /// Bind to `addr` and switch the socket to non-blocking mode.
  pub fn bind<A: ::std::net::ToSocketAddrs>(addr: A) -> io::Result<Self> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    Ok(Self { socket })
  }

  /// Receive one datagram into `buf`, non-blocking.
  ///
  /// The returned [`Incoming`] is ready for
  /// [`Core::handle_datagram`](crate::core::Core::handle_datagram).
  /// A datagram filling `buf` completely is flagged as possibly
  /// truncated; the socket API gives no better signal, and a false
  /// positive only costs a 4.13 the peer deserves anyway.
  pub fn recv<'b>(&self, buf: &'b mut [u8]) -> nb::Result<Incoming<'b>, io::Error> {
    match self.socket.recv_from(buf) {
      | Ok((n, from)) => {
        let truncated = n == buf.len();
        Ok(Incoming { bytes: &mut buf[..n],
                      truncated,
                      remote: Endpoint::Udp(from_std(from)),
                      local: None })
      },
      | Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(nb::Error::WouldBlock),
      | Err(e) => Err(nb::Error::Other(e)),
    }
  }

  /// The bound local address, as an [`Endpoint`].
  pub fn local_endpoint(&self) -> io::Result<Endpoint> {
    self.socket.local_addr().map(|a| Endpoint::Udp(from_std(a)))
  }
}

impl Transport for UdpTransport {
  type Error = io::Error;

  fn sendv(&self,
           chunks: &[&[u8]],
           remote: &Endpoint,
           _local: Option<&Endpoint>)
           -> Result<(), io::Error> {
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    if total > PDU_SIZE_MAX {
      return Err(io::Error::new(io::ErrorKind::InvalidInput, "PDU exceeds PDU_SIZE_MAX"));
    }

    // plain UdpSocket has no vectored send; gather on the stack
    let mut dgram = [0u8; PDU_SIZE_MAX];
    let mut at = 0;
    for chunk in chunks {
      dgram[at..at + chunk.len()].copy_from_slice(chunk);
      at += chunk.len();
    }

    self.socket.send_to(&dgram[..at], to_std(remote.addr())).map(|_| ())
  }

  fn supports(&self, proto: Proto) -> bool {
    proto == Proto::Udp
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn addr_round_trip() {
    for addr in ["127.0.0.1:5683", "[2001:db8::1]:5684"] {
      let ours: no_std_net::SocketAddr = addr.parse().unwrap();
      assert_eq!(from_std(to_std(ours)), ours);
    }
  }

  #[test]
  fn sendv_gathers_chunks() {
    let a = UdpTransport::bind("127.0.0.1:0").unwrap();
    let b = UdpTransport::bind("127.0.0.1:0").unwrap();
    let to = b.local_endpoint().unwrap();

    a.sendv(&[&[0x40, 0x01], &[0x00, 0x07], b"x"], &to, None).unwrap();

    // a datagram socket needs a beat
    let mut buf = [0u8; 64];
    let received = loop {
      match b.recv(&mut buf) {
        | Ok(incoming) => break incoming.bytes.to_vec(),
        | Err(nb::Error::WouldBlock) => ::std::thread::yield_now(),
        | Err(nb::Error::Other(e)) => panic!("{}", e),
      }
    };
    assert_eq!(received, vec![0x40, 0x01, 0x00, 0x07, b'x']);
  }
}

use super::{OptNumber, Options, OptionsError};

/// Option numbers used by the exchange layer, from the
/// [IANA CoAP registry](https://www.iana.org/assignments/core-parameters/core-parameters.xhtml).
pub mod number {
  use super::OptNumber;

  /// If-Match, repeatable opaque <= 8 B
  pub const IF_MATCH: OptNumber = OptNumber(1);
  /// Uri-Host, string <= 255 B
  pub const URI_HOST: OptNumber = OptNumber(3);
  /// ETag, repeatable opaque 1-8 B
  pub const ETAG: OptNumber = OptNumber(4);
  /// If-None-Match, presence only
  pub const IF_NONE_MATCH: OptNumber = OptNumber(5);
  /// Observe, uint <= 3 B (RFC 7641)
  pub const OBSERVE: OptNumber = OptNumber(6);
  /// Uri-Port, uint <= 2 B
  pub const URI_PORT: OptNumber = OptNumber(7);
  /// Location-Path, repeatable string <= 255 B
  pub const LOCATION_PATH: OptNumber = OptNumber(8);
  /// Uri-Path, repeatable string <= 255 B
  pub const URI_PATH: OptNumber = OptNumber(11);
  /// Content-Format, uint <= 2 B
  pub const CONTENT_FORMAT: OptNumber = OptNumber(12);
  /// Max-Age, uint <= 4 B
  pub const MAX_AGE: OptNumber = OptNumber(14);
  /// Uri-Query, repeatable string <= 255 B
  pub const URI_QUERY: OptNumber = OptNumber(15);
  /// Accept, uint <= 2 B
  pub const ACCEPT: OptNumber = OptNumber(17);
  /// Location-Query, repeatable string <= 255 B
  pub const LOCATION_QUERY: OptNumber = OptNumber(20);
  /// Block2, uint <= 3 B (RFC 7959)
  pub const BLOCK2: OptNumber = OptNumber(23);
  /// Block1, uint <= 3 B (RFC 7959)
  pub const BLOCK1: OptNumber = OptNumber(27);
  /// Size2, uint <= 4 B
  pub const SIZE2: OptNumber = OptNumber(28);
  /// Proxy-Uri, string <= 1034 B
  pub const PROXY_URI: OptNumber = OptNumber(35);
  /// Proxy-Scheme, string <= 255 B
  pub const PROXY_SCHEME: OptNumber = OptNumber(39);
  /// Size1, uint <= 4 B
  pub const SIZE1: OptNumber = OptNumber(60);
  /// No-Response, uint <= 1 B (RFC 7967)
  pub const NO_RESPONSE: OptNumber = OptNumber(258);
}

impl OptNumber {
  /// The registered name of this option, used in logs and dumps.
  pub fn name(&self) -> Option<&'static str> {
    Some(match *self {
           | number::IF_MATCH => "If-Match",
           | number::URI_HOST => "Uri-Host",
           | number::ETAG => "ETag",
           | number::IF_NONE_MATCH => "If-None-Match",
           | number::OBSERVE => "Observe",
           | number::URI_PORT => "Uri-Port",
           | number::LOCATION_PATH => "Location-Path",
           | number::URI_PATH => "Uri-Path",
           | number::CONTENT_FORMAT => "Content-Format",
           | number::MAX_AGE => "Max-Age",
           | number::URI_QUERY => "Uri-Query",
           | number::ACCEPT => "Accept",
           | number::LOCATION_QUERY => "Location-Query",
           | number::BLOCK2 => "Block2",
           | number::BLOCK1 => "Block1",
           | number::SIZE2 => "Size2",
           | number::PROXY_URI => "Proxy-Uri",
           | number::PROXY_SCHEME => "Proxy-Scheme",
           | number::SIZE1 => "Size1",
           | number::NO_RESPONSE => "No-Response",
           | _ => return None,
         })
  }
}

/// # Content-Format
/// Numeric media-type identifier
/// ([RFC7252 §12.3](https://datatracker.ietf.org/doc/html/rfc7252#section-12.3)).
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ContentFormat(pub u16);

impl ContentFormat {
  /// `text/plain; charset=utf-8`
  pub const TEXT: Self = Self(0);
  /// `application/link-format` (resource discovery)
  pub const LINK_FORMAT: Self = Self(40);
  /// `application/xml`
  pub const XML: Self = Self(41);
  /// `application/octet-stream`
  pub const OCTET_STREAM: Self = Self(42);
  /// `application/exi`
  pub const EXI: Self = Self(47);
  /// `application/json`
  pub const JSON: Self = Self(50);
  /// `application/cbor`
  pub const CBOR: Self = Self(60);
}

/// Typed accessors for the options the exchange layer knows about.
///
/// Getters are zero-copy where the canonical type allows; setters
/// encode minimally. Path- and query-valued options get join/split
/// helpers on top of the raw repeatable values.
impl<'a, const N: usize> Options<'a, N> {
  /// Content-Format of the payload
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.uint_max(number::CONTENT_FORMAT, 2)
        .map(|v| ContentFormat(v as u16))
  }

  /// Set the Content-Format option
  pub fn set_content_format(&mut self, format: ContentFormat) -> Result<(), OptionsError> {
    self.set_uint(number::CONTENT_FORMAT, format.0 as u32)
  }

  /// Content-Format the client is willing to accept
  pub fn accept(&self) -> Option<ContentFormat> {
    self.uint_max(number::ACCEPT, 2).map(|v| ContentFormat(v as u16))
  }

  /// Set the Accept option
  pub fn set_accept(&mut self, format: ContentFormat) -> Result<(), OptionsError> {
    self.set_uint(number::ACCEPT, format.0 as u32)
  }

  /// Max-Age of the response for caching, in seconds
  pub fn max_age(&self) -> Option<u32> {
    self.uint_max(number::MAX_AGE, 4)
  }

  /// Set the Max-Age option
  pub fn set_max_age(&mut self, seconds: u32) -> Result<(), OptionsError> {
    self.set_uint(number::MAX_AGE, seconds)
  }

  /// Size1: request body size indication / admissible request size
  pub fn size1(&self) -> Option<u32> {
    self.uint_max(number::SIZE1, 4)
  }

  /// Set the Size1 option
  pub fn set_size1(&mut self, size: u32) -> Result<(), OptionsError> {
    self.set_uint(number::SIZE1, size)
  }

  /// Size2: response body size indication
  pub fn size2(&self) -> Option<u32> {
    self.uint_max(number::SIZE2, 4)
  }

  /// Set the Size2 option
  pub fn set_size2(&mut self, size: u32) -> Result<(), OptionsError> {
    self.set_uint(number::SIZE2, size)
  }

  /// Observe sequence number / register-deregister value (<= 24 bit)
  pub fn observe(&self) -> Option<u32> {
    self.uint_max(number::OBSERVE, 3)
  }

  /// Set the Observe option; only the low 24 bits are representable
  pub fn set_observe(&mut self, value: u32) -> Result<(), OptionsError> {
    self.set_uint(number::OBSERVE, value & 0x00ff_ffff)
  }

  /// No-Response suppression bitmap (RFC 7967)
  pub fn no_response(&self) -> Option<u8> {
    self.uint_max(number::NO_RESPONSE, 1).map(|v| v as u8)
  }

  /// Set the No-Response option
  pub fn set_no_response(&mut self, bitmap: u8) -> Result<(), OptionsError> {
    self.set_uint(number::NO_RESPONSE, bitmap as u32)
  }

  /// Uri-Port override
  pub fn uri_port(&self) -> Option<u16> {
    self.uint_max(number::URI_PORT, 2).map(|v| v as u16)
  }

  /// Set the Uri-Port option
  pub fn set_uri_port(&mut self, port: u16) -> Result<(), OptionsError> {
    self.set_uint(number::URI_PORT, port as u32)
  }

  /// Block1 descriptor, raw uint form (RFC 7959)
  pub fn block1(&self) -> Option<u32> {
    self.uint_max(number::BLOCK1, 3)
  }

  /// Set the Block1 option
  pub fn set_block1(&mut self, value: u32) -> Result<(), OptionsError> {
    self.set_uint(number::BLOCK1, value & 0x00ff_ffff)
  }

  /// Block2 descriptor, raw uint form (RFC 7959)
  pub fn block2(&self) -> Option<u32> {
    self.uint_max(number::BLOCK2, 3)
  }

  /// Set the Block2 option
  pub fn set_block2(&mut self, value: u32) -> Result<(), OptionsError> {
    self.set_uint(number::BLOCK2, value & 0x00ff_ffff)
  }

  fn str_value(&self, n: OptNumber) -> Result<Option<&str>, OptionsError> {
    match self.get(n) {
      | None => Ok(None),
      | Some(v) => core::str::from_utf8(v).map(Some)
                                          .map_err(OptionsError::InvalidUtf8),
    }
  }

  /// Uri-Host of the request
  pub fn uri_host(&self) -> Result<Option<&str>, OptionsError> {
    self.str_value(number::URI_HOST)
  }

  /// Set the Uri-Host option
  pub fn set_uri_host(&mut self, host: &str) -> Result<(), OptionsError> {
    self.set(number::URI_HOST, host.as_bytes())
  }

  /// Proxy-Uri for forward proxying
  pub fn proxy_uri(&self) -> Result<Option<&str>, OptionsError> {
    self.str_value(number::PROXY_URI)
  }

  /// Proxy-Scheme for forward proxying
  pub fn proxy_scheme(&self) -> Result<Option<&str>, OptionsError> {
    self.str_value(number::PROXY_SCHEME)
  }

  /// All ETag values on this message
  pub fn etags(&self) -> impl Iterator<Item = &[u8]> {
    self.iter_number(number::ETAG)
  }

  /// Add a repeatable ETag value (1-8 bytes)
  pub fn add_etag(&mut self, tag: &[u8]) -> Result<(), OptionsError> {
    self.add(number::ETAG, tag)
  }

  /// All If-Match values on this message
  pub fn if_match(&self) -> impl Iterator<Item = &[u8]> {
    self.iter_number(number::IF_MATCH)
  }

  /// Add a repeatable If-Match value
  pub fn add_if_match(&mut self, tag: &[u8]) -> Result<(), OptionsError> {
    self.add(number::IF_MATCH, tag)
  }

  /// Is the If-None-Match flag present?
  pub fn if_none_match(&self) -> bool {
    self.contains(number::IF_NONE_MATCH)
  }

  /// Raise the If-None-Match flag (presence-only option)
  pub fn set_if_none_match(&mut self) -> Result<(), OptionsError> {
    self.set(number::IF_NONE_MATCH, &[])
  }

  /// Join all values of `n` into `buf`, each preceded by `prefix`.
  /// Writes the bare prefix when no values exist ("/" for the root
  /// path).
  fn join_prefixed<'b>(&self,
                       n: OptNumber,
                       prefix: u8,
                       buf: &'b mut [u8])
                       -> Result<&'b str, OptionsError> {
    let mut at = 0usize;
    for component in self.iter_number(n) {
      if at + 1 + component.len() > buf.len() {
        return Err(OptionsError::OutOfBuffer);
      }
      buf[at] = prefix;
      buf[at + 1..at + 1 + component.len()].copy_from_slice(component);
      at += 1 + component.len();
    }

    if at == 0 {
      if buf.is_empty() {
        return Err(OptionsError::OutOfBuffer);
      }
      buf[0] = prefix;
      at = 1;
    }

    core::str::from_utf8(&buf[..at]).map_err(OptionsError::InvalidUtf8)
  }

  /// Join all values of `n` into `buf` with `sep` *between* values
  /// (no leading separator; empty output for no values).
  fn join_separated<'b>(&self,
                        n: OptNumber,
                        sep: u8,
                        buf: &'b mut [u8])
                        -> Result<&'b str, OptionsError> {
    let mut at = 0usize;
    for component in self.iter_number(n) {
      let lead = if at > 0 { 1 } else { 0 };
      if at + lead + component.len() > buf.len() {
        return Err(OptionsError::OutOfBuffer);
      }
      if lead == 1 {
        buf[at] = sep;
        at += 1;
      }
      buf[at..at + component.len()].copy_from_slice(component);
      at += component.len();
    }

    core::str::from_utf8(&buf[..at]).map_err(OptionsError::InvalidUtf8)
  }

  fn add_split(&mut self, n: OptNumber, joined: &str, sep: char) -> Result<(), OptionsError> {
    for component in joined.split(sep).filter(|c| !c.is_empty()) {
      self.add(n, component.as_bytes())?;
    }
    Ok(())
  }

  /// The aggregate Uri-Path as a `/`-prefixed absolute path, written
  /// into `buf`. The root path renders as `"/"`.
  pub fn uri_path<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str, OptionsError> {
    self.join_prefixed(number::URI_PATH, b'/', buf)
  }

  /// Split `path` at `/` and add one Uri-Path option per non-empty
  /// component.
  pub fn add_uri_path(&mut self, path: &str) -> Result<(), OptionsError> {
    self.add_split(number::URI_PATH, path, '/')
  }

  /// Iterate the Uri-Path components
  pub fn uri_path_components(&self) -> impl Iterator<Item = Result<&str, OptionsError>> {
    self.iter_number(number::URI_PATH)
        .map(|v| core::str::from_utf8(v).map_err(OptionsError::InvalidUtf8))
  }

  /// The aggregate Location-Path as a `/`-prefixed absolute path
  pub fn location_path<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str, OptionsError> {
    self.join_prefixed(number::LOCATION_PATH, b'/', buf)
  }

  /// Split `path` at `/` and add Location-Path options
  pub fn add_location_path(&mut self, path: &str) -> Result<(), OptionsError> {
    self.add_split(number::LOCATION_PATH, path, '/')
  }

  /// The aggregate Uri-Query joined with `&`
  pub fn uri_queries<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str, OptionsError> {
    self.join_separated(number::URI_QUERY, b'&', buf)
  }

  /// Split `queries` at `&` and add one Uri-Query option per
  /// non-empty parameter.
  pub fn add_uri_queries(&mut self, queries: &str) -> Result<(), OptionsError> {
    self.add_split(number::URI_QUERY, queries, '&')
  }

  /// Add a single Uri-Query parameter
  pub fn add_uri_query(&mut self, query: &str) -> Result<(), OptionsError> {
    self.add(number::URI_QUERY, query.as_bytes())
  }

  /// The aggregate Location-Query joined with `&`
  pub fn location_queries<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str, OptionsError> {
    self.join_separated(number::LOCATION_QUERY, b'&', buf)
  }

  /// Split `queries` at `&` and add Location-Query options
  pub fn add_location_queries(&mut self, queries: &str) -> Result<(), OptionsError> {
    self.add_split(number::LOCATION_QUERY, queries, '&')
  }

  /// Find the value of the first `name=value` Uri-Query parameter.
  ///
  /// Each option value is split at its first `=`; a parameter present
  /// without `=` yields the empty slice.
  pub fn uri_query_value(&self, name: &str) -> Option<&[u8]> {
    self.iter_number(number::URI_QUERY).find_map(|q| {
                                         match q.iter().position(|b| *b == b'=') {
                                           | Some(eq) if &q[..eq] == name.as_bytes() => {
                                             Some(&q[eq + 1..])
                                           },
                                           | None if q == name.as_bytes() => Some(&[][..]),
                                           | _ => None,
                                         }
                                       })
  }
}

#[cfg(test)]
mod tests {
  use super::super::OptNumber;
  use super::*;

  #[test]
  fn path_join_and_split() {
    let mut storage = [0u8; 64];
    let mut opts = Options::<16>::new(&mut storage);
    opts.add_uri_path("/actuators//leds/").unwrap();

    let components: Vec<&str> = opts.uri_path_components().map(|c| c.unwrap()).collect();
    assert_eq!(components, vec!["actuators", "leds"]);

    let mut buf = [0u8; 32];
    assert_eq!(opts.uri_path(&mut buf).unwrap(), "/actuators/leds");
  }

  #[test]
  fn root_path_renders_as_slash() {
    let mut storage = [0u8; 8];
    let opts = Options::<4>::new(&mut storage);
    let mut buf = [0u8; 4];
    assert_eq!(opts.uri_path(&mut buf).unwrap(), "/");
  }

  #[test]
  fn path_join_overflows_small_buffer() {
    let mut storage = [0u8; 64];
    let mut opts = Options::<16>::new(&mut storage);
    opts.add_uri_path("abcdef/ghi").unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(opts.uri_path(&mut buf), Err(OptionsError::OutOfBuffer));
  }

  #[test]
  fn queries_join_without_leading_separator() {
    let mut storage = [0u8; 64];
    let mut opts = Options::<16>::new(&mut storage);
    opts.add_uri_query("color=g").unwrap();
    opts.add_uri_query("dim=2").unwrap();

    let mut buf = [0u8; 32];
    assert_eq!(opts.uri_queries(&mut buf).unwrap(), "color=g&dim=2");
  }

  #[test]
  fn query_value_lookup() {
    let mut storage = [0u8; 64];
    let mut opts = Options::<16>::new(&mut storage);
    opts.add_uri_queries("color=g&flag&x=1=2").unwrap();

    assert_eq!(opts.uri_query_value("color"), Some(&b"g"[..]));
    assert_eq!(opts.uri_query_value("flag"), Some(&b""[..]));
    assert_eq!(opts.uri_query_value("x"), Some(&b"1=2"[..]));
    assert_eq!(opts.uri_query_value("nope"), None);
  }

  #[test]
  fn content_format_and_accept() {
    let mut storage = [0u8; 16];
    let mut opts = Options::<8>::new(&mut storage);
    opts.set_content_format(ContentFormat::JSON).unwrap();
    opts.set_accept(ContentFormat::CBOR).unwrap();

    assert_eq!(opts.content_format(), Some(ContentFormat(50)));
    assert_eq!(opts.accept(), Some(ContentFormat(60)));
  }

  #[test]
  fn presence_only_if_none_match() {
    let mut storage = [0u8; 8];
    let mut opts = Options::<4>::new(&mut storage);
    assert!(!opts.if_none_match());
    opts.set_if_none_match().unwrap();
    assert!(opts.if_none_match());
    assert_eq!(opts.get(number::IF_NONE_MATCH), Some(&b""[..]));
  }

  #[test]
  fn no_response_is_one_byte() {
    let mut storage = [0u8; 8];
    let mut opts = Options::<4>::new(&mut storage);
    opts.set_no_response(0x1a).unwrap();
    assert_eq!(opts.no_response(), Some(0x1a));
    // the delta 258 needs the one-byte extension (258 - 13 = 245)
    assert_eq!(opts.as_bytes(), &[0xd1, 245, 0x1a][..]);
  }

  #[test]
  fn names() {
    assert_eq!(number::URI_PATH.name(), Some("Uri-Path"));
    assert_eq!(number::NO_RESPONSE.name(), Some("No-Response"));
    assert_eq!(OptNumber(9999).name(), None);
  }
}

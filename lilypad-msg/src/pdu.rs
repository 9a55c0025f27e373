//! RFC 7252 framing: the four-byte header, token, option blob and
//! payload-marker, in both directions.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Token (if any, TKL bytes) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Options (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Parsing is zero-copy: the resulting [`Message`] borrows the PDU
//! buffer. The two builders cover both transmit paths of the
//! messaging layer: [`build`] writes a contiguous PDU (e.g. into a
//! retransmission carbon copy), [`build_slices`] produces an
//! iovec-style chunk list so the transport can gather the header,
//! option blob and payload without an intermediate copy.

use tinyvec::ArrayVec;

use crate::msg::{Code, Id, Message, Options, Payload, Properties, Rfc7252, Token, Type};
use crate::{MessageParseError, PAYLOAD_MARKER, TOKEN_LENGTH_MAX};

/// Fixed part of the RFC 7252 header
pub const HEADER_SIZE: usize = 4;

/// Header plus the longest admissible token
pub const HEADER_SIZE_MAX: usize = HEADER_SIZE + TOKEN_LENGTH_MAX;

/// Stack buffer for [`build_slices`] headers
pub type HeaderBuffer = [u8; HEADER_SIZE_MAX];

/// Upper bound on the chunk list produced by [`build_slices`]:
/// header, option blob, payload marker, and up to five payload chunks
pub const CHUNKS_MAX: usize = 8;

const VERSION_1: u8 = 1;

/// Outcome of a successful [`parse`]
#[derive(Debug)]
pub struct ParsedPdu<'a> {
  /// Code, options view, payload view
  pub message: Message<'a>,
  /// Token and RFC 7252 type/ID
  pub properties: Properties,
}

/// Errors encounterable while serializing a PDU
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
  /// Destination capacity is smaller than the encoded size
  OutOfBuffer {
    /// what the destination can hold
    capacity: usize,
    /// what the message needs
    size: usize,
  },
  /// More payload chunks than [`CHUNKS_MAX`] minus framing
  TooManyChunks,
}

/// Parse one datagram into a message view.
///
/// The buffer is borrowed mutably because the option container keeps
/// in-place edit access to the option region; parsing itself writes
/// nothing.
///
/// A PDU whose options parse cleanly but whose payload was cut off by
/// a too-small receive buffer parses *successfully*; truncation is
/// reported out-of-band by the transport, and rejecting it here would
/// make a compliant 4.13 reply impossible.
pub fn parse(pdu: &mut [u8]) -> Result<ParsedPdu<'_>, MessageParseError> {
  if pdu.len() < HEADER_SIZE {
    return Err(MessageParseError::eof());
  }

  let b0 = pdu[0];
  let version = b0 >> 6;
  if version != VERSION_1 {
    return Err(MessageParseError::InvalidVersion(version));
  }

  let ty = Type::try_from(b0 >> 4 & 0b11)?;
  let tkl = (b0 & 0b1111) as usize;
  let code = Code::from(pdu[1]);
  let id = Id::from_be_bytes([pdu[2], pdu[3]]);

  // RFC 7252 §4.1: an Empty message is exactly the 4-byte header
  if code == Code::EMPTY && pdu.len() > HEADER_SIZE {
    return Err(MessageParseError::NonEmptyEmptyMessage);
  }

  // TKL 9-15 are reserved and MUST be a message format error
  if tkl > TOKEN_LENGTH_MAX {
    return Err(MessageParseError::InvalidTokenLength(tkl as u8));
  }
  if HEADER_SIZE + tkl > pdu.len() {
    return Err(MessageParseError::eof());
  }

  let (head, rest) = pdu.split_at_mut(HEADER_SIZE + tkl);
  let token = Token::from_bytes(&head[HEADER_SIZE..]);

  let (options, payload) = Options::parse(rest)?;

  Ok(ParsedPdu { message: Message { code,
                                    options,
                                    payload: Payload::Contiguous(payload) },
                 properties: Properties { token,
                                          rfc7252: Rfc7252 { id, ty },
                                          is_notification: false } })
}

/// Number of bytes [`build`] will write for this message.
pub fn encoded_size(message: &Message<'_>, properties: &Properties) -> usize {
  let payload = match message.payload.len() {
    | 0 => 0,
    | n => 1 + n,
  };
  HEADER_SIZE + properties.token.len() + message.options.len() + payload
}

/// Write the header and token into `dest`, returning the bytes used.
pub fn build_header(dest: &mut [u8],
                    code: Code,
                    properties: &Properties)
                    -> Result<usize, BuildError> {
  let token = properties.token.as_bytes();
  let size = HEADER_SIZE + token.len();
  if dest.len() < size {
    return Err(BuildError::OutOfBuffer { capacity: dest.len(),
                                         size });
  }

  dest[0] = VERSION_1 << 6 | u8::from(properties.rfc7252.ty) << 4 | token.len() as u8;
  dest[1] = code.into();
  dest[2..4].copy_from_slice(&properties.rfc7252.id.0.to_be_bytes());
  dest[HEADER_SIZE..size].copy_from_slice(token);
  Ok(size)
}

/// Serialize the whole PDU contiguously into `dest`, returning its
/// size. No payload marker is written for an empty payload.
pub fn build(dest: &mut [u8],
             message: &Message<'_>,
             properties: &Properties)
             -> Result<usize, BuildError> {
  let size = encoded_size(message, properties);
  if dest.len() < size {
    return Err(BuildError::OutOfBuffer { capacity: dest.len(),
                                         size });
  }

  let mut at = build_header(dest, message.code, properties)?;

  let options = message.options.as_bytes();
  dest[at..at + options.len()].copy_from_slice(options);
  at += options.len();

  if !message.payload.is_empty() {
    dest[at] = PAYLOAD_MARKER;
    at += 1;
    // capacity was checked up front against the total size
    message.payload
           .copy_to(&mut dest[at..])
           .ok_or(BuildError::OutOfBuffer { capacity: dest.len(),
                                            size })?;
    at += message.payload.len();
  }

  Ok(at)
}

/// Serialize as a scatter-gather chunk list:
/// `[header] [options] [0xFF] [payload…]`, skipping empty chunks.
///
/// The header lands in the caller's stack buffer; everything else is
/// borrowed straight from the message, so a transport with vectored
/// send never copies the payload.
pub fn build_slices<'b>(header: &'b mut HeaderBuffer,
                        message: &'b Message<'_>,
                        properties: &Properties)
                        -> Result<ArrayVec<[&'b [u8]; CHUNKS_MAX]>, BuildError> {
  let header_size = build_header(&mut header[..], message.code, properties)?;

  let mut chunks: ArrayVec<[&'b [u8]; CHUNKS_MAX]> = ArrayVec::new();
  chunks.push(&header[..header_size]);

  if message.options.len() > 0 {
    chunks.push(message.options.as_bytes());
  }

  if !message.payload.is_empty() {
    const MARKER: &[u8] = &[PAYLOAD_MARKER];
    chunks.push(MARKER);

    match message.payload {
      | Payload::Contiguous(bytes) => {
        if chunks.try_push(bytes).is_some() {
          return Err(BuildError::TooManyChunks);
        }
      },
      | Payload::Chunks(parts) => {
        for part in parts.iter().filter(|p| !p.is_empty()) {
          if chunks.try_push(part).is_some() {
            return Err(BuildError::TooManyChunks);
          }
        }
      },
    }
  }

  Ok(chunks)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::msg::opt::{known::number, ContentFormat, OptNumber};
  use crate::test::POST_ACTUATORS;

  fn gather(chunks: &[&[u8]]) -> Vec<u8> {
    chunks.concat()
  }

  fn round_trip(pdu: &[u8]) {
    let mut bytes = pdu.to_vec();
    let parsed = parse(&mut bytes).unwrap();

    let mut rebuilt = vec![0u8; pdu.len() + 100];
    let n = build(&mut rebuilt, &parsed.message, &parsed.properties).unwrap();
    assert_eq!(&rebuilt[..n], pdu);

    let mut header: HeaderBuffer = Default::default();
    let chunks = build_slices(&mut header, &parsed.message, &parsed.properties).unwrap();
    assert_eq!(gather(&chunks), pdu);
  }

  #[test]
  fn post_with_path_query_and_payload() {
    let mut pdu = POST_ACTUATORS.to_vec();
    let parsed = parse(&mut pdu).unwrap();

    assert_eq!(parsed.properties.rfc7252.ty, Type::Con);
    assert_eq!(parsed.properties.rfc7252.id, Id(65201));
    assert_eq!(parsed.properties.token.len(), 0);
    assert_eq!(parsed.message.code, Code::new(0, 2));

    let opts = &parsed.message.options;
    assert_eq!(opts.count(), 5);
    assert_eq!(opts.content_format(), Some(ContentFormat::JSON));
    assert_eq!(opts.accept(), Some(ContentFormat::JSON));

    let mut path = [0u8; 32];
    assert_eq!(opts.uri_path(&mut path).unwrap(), "/actuators/leds");
    let mut queries = [0u8; 32];
    assert_eq!(opts.uri_queries(&mut queries).unwrap(), "color=g");

    assert_eq!(parsed.message.payload, Payload::Contiguous(b"mode=on"));

    round_trip(POST_ACTUATORS);
  }

  #[test]
  fn method_not_allowed_ack_with_token() {
    let pdu = [0x64, 0x85, 0x0c, 0x3c, 0xd1, 0x97, 0x96, 0xc1];
    let mut bytes = pdu.to_vec();
    let parsed = parse(&mut bytes).unwrap();

    assert_eq!(parsed.properties.rfc7252.ty, Type::Ack);
    assert_eq!(parsed.properties.rfc7252.id, Id(3132));
    assert_eq!(parsed.message.code, Code::new(4, 5));
    assert_eq!(parsed.properties.token.as_bytes(), &[0xd1, 0x97, 0x96, 0xc1]);
    assert_eq!(parsed.message.options.count(), 0);
    assert!(parsed.message.payload.is_empty());

    let mut path = [0u8; 8];
    assert_eq!(parsed.message.options.uri_path(&mut path).unwrap(), "/");

    round_trip(&pdu);
  }

  #[test]
  fn confirmable_cbor_request() {
    let pdu = [0x44, 0x02, 0x0c, 0x3e, 0xd1, 0x97, 0x96, 0xc3, 0xc1, 0x3c, 0xff, 0x0a];
    let mut bytes = pdu.to_vec();
    let parsed = parse(&mut bytes).unwrap();

    assert_eq!(parsed.properties.rfc7252.ty, Type::Con);
    assert_eq!(parsed.properties.rfc7252.id, Id(3134));
    assert_eq!(parsed.message.code, Code::new(0, 2));
    assert_eq!(parsed.properties.token.as_bytes(), &[0xd1, 0x97, 0x96, 0xc3]);
    assert_eq!(parsed.message.options.count(), 1);
    assert_eq!(parsed.message.options.content_format(), Some(ContentFormat::CBOR));
    assert_eq!(parsed.message.payload, Payload::Contiguous(&[0x0a]));

    round_trip(&pdu);
  }

  #[test]
  fn rejects_bad_headers() {
    // version 2
    let mut bad = [0x84, 0x01, 0x00, 0x01];
    assert_eq!(parse(&mut bad).unwrap_err(), MessageParseError::InvalidVersion(2));

    // empty code with a trailing byte
    let mut bad = [0x40, 0x00, 0x00, 0x01, 0xff];
    assert_eq!(parse(&mut bad).unwrap_err(), MessageParseError::NonEmptyEmptyMessage);

    // reserved token length
    let mut bad = [0x49, 0x01, 0x00, 0x01];
    assert_eq!(parse(&mut bad).unwrap_err(), MessageParseError::InvalidTokenLength(9));

    // token longer than the buffer
    let mut bad = [0x44, 0x01, 0x00, 0x01, 0xaa];
    assert_eq!(parse(&mut bad).unwrap_err(), MessageParseError::eof());

    // shorter than a header
    let mut bad = [0x40, 0x01];
    assert_eq!(parse(&mut bad).unwrap_err(), MessageParseError::eof());
  }

  #[test]
  fn empty_message_is_exactly_the_header() {
    let mut pdu = [0x70, 0x00, 0xab, 0xcd];
    let parsed = parse(&mut pdu).unwrap();
    assert_eq!(parsed.message.code, Code::EMPTY);
    assert_eq!(parsed.properties.rfc7252.ty, Type::Reset);
    assert_eq!(parsed.properties.rfc7252.id, Id(0xabcd));
  }

  #[test]
  fn no_marker_for_empty_payload() {
    let msg = Message::empty(Code::new(2, 3));
    let props = Properties::new(Type::Ack, Id(7), Token::empty());

    let mut buf = [0u8; 16];
    let n = build(&mut buf, &msg, &props).unwrap();
    assert_eq!(n, HEADER_SIZE);
    assert_ne!(buf[n - 1], PAYLOAD_MARKER);
  }

  #[test]
  fn chunked_payload_builds_identically() {
    let mut storage = [0u8; 16];
    let mut options = Options::new(&mut storage);
    options.set_content_format(ContentFormat::TEXT).unwrap();

    let chunks: &[&[u8]] = &[b"mode", b"=", b"", b"on"];
    let msg = Message { code: Code::new(0, 2),
                        options,
                        payload: Payload::Chunks(chunks) };
    let props = Properties::new(Type::Non, Id(9), Token::from_bytes(b"\x01\x02"));

    let mut contiguous = [0u8; 64];
    let n = build(&mut contiguous, &msg, &props).unwrap();

    let mut header: HeaderBuffer = Default::default();
    let slices = build_slices(&mut header, &msg, &props).unwrap();
    assert_eq!(gather(&slices), &contiguous[..n]);
    assert!(gather(&slices).ends_with(b"mode=on"));
  }

  #[test]
  fn build_reports_capacity() {
    let mut storage = [0u8; 8];
    let mut options = Options::new(&mut storage);
    options.add(OptNumber(11), b"abc").unwrap();
    let msg = Message { code: Code::new(0, 1),
                        options,
                        payload: Payload::Contiguous(b"body") };
    let props = Properties::new(Type::Con, Id(1), Token::empty());

    let mut tiny = [0u8; 8];
    match build(&mut tiny, &msg, &props) {
      | Err(BuildError::OutOfBuffer { capacity: 8, size }) => {
        assert_eq!(size, 4 + 4 + 1 + 4);
      },
      | other => panic!("expected OutOfBuffer, got {:?}", other),
    }
  }

  #[test]
  fn truncated_payload_still_parses() {
    // scenario-A bytes cut off mid-payload: the option stream is
    // clean, so the parser must succeed and expose what it got
    let mut cut = POST_ACTUATORS[..POST_ACTUATORS.len() - 4].to_vec();
    let parsed = parse(&mut cut).unwrap();
    assert_eq!(parsed.message.payload, Payload::Contiguous(b"mod"));
    assert_eq!(parsed.message.options.count(), 5);
  }

  #[test]
  fn size1_hint_fits_after_tighten() {
    // after parsing, the options capacity is the options region;
    // a fresh response must use its own storage instead
    let mut pdu = POST_ACTUATORS.to_vec();
    let parsed = parse(&mut pdu).unwrap();
    assert_eq!(parsed.message.options.capacity(),
               parsed.message.options.len());
  }

  #[test]
  fn uses_number_table() {
    let mut pdu = POST_ACTUATORS.to_vec();
    let parsed = parse(&mut pdu).unwrap();
    let numbers: Vec<u16> = parsed.message.options.iter().map(|(n, _)| n.0).collect();
    assert_eq!(numbers,
               vec![number::URI_PATH.0,
                    number::URI_PATH.0,
                    number::CONTENT_FORMAT.0,
                    number::URI_QUERY.0,
                    number::ACCEPT.0]);
  }
}

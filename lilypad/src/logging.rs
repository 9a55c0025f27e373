use core::fmt::Write;

use lilypad_msg::{Message, Properties};

use crate::string::String;

/// One-line summary of a message for trace logs, bounded so logging
/// never allocates.
pub(crate) fn msg_summary(message: &Message<'_>, properties: &Properties) -> String<96> {
  let mut buf = String::default();
  write!(buf,
         "<{} {:?} mid={} code={} tkl={} payload=({} bytes) options=({}; {} bytes)>",
         properties.rfc7252.ty.abbrev(),
         message.code.kind(),
         properties.rfc7252.id.0,
         message.code,
         properties.token.len(),
         message.payload.len(),
         message.options.count(),
         message.options.len()).ok();
  buf
}

#[cfg(test)]
mod tests {
  use lilypad_msg::{Code, Id, Message, Properties, Token, Type};

  use super::*;

  #[test]
  fn summary_is_bounded() {
    let message = Message::empty(Code::new(0, 1));
    let properties = Properties::new(Type::Con, Id(7), Token::from_bytes(b"abcd"));
    let summary = msg_summary(&message, &properties);
    assert!(summary.as_str().contains("CON"));
    assert!(summary.as_str().contains("mid=7"));
    assert!(summary.as_str().len() <= 96);
  }
}

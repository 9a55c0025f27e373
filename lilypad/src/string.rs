use core::fmt;

use tinyvec::ArrayVec;

/// A bounded UTF-8 string supporting `core::fmt::Write`, for log
/// lines and link-format output that must not allocate.
///
/// Writes past the capacity are truncated, never an error.
#[derive(Clone, Copy, Default)]
pub(crate) struct String<const N: usize> {
  bytes: ArrayVec<[u8; N]>,
}

impl<const N: usize> String<N> {
  pub(crate) fn as_str(&self) -> &str {
    // only whole UTF-8 sequences are ever appended
    core::str::from_utf8(&self.bytes).unwrap_or("")
  }
}

impl<const N: usize> fmt::Write for String<N> {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    for ch in s.chars() {
      let mut utf8 = [0u8; 4];
      let encoded = ch.encode_utf8(&mut utf8);
      if self.bytes.len() + encoded.len() > N {
        break;
      }
      self.bytes.extend_from_slice(encoded.as_bytes());
    }
    Ok(())
  }
}

impl<const N: usize> fmt::Display for String<N> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl<const N: usize> fmt::Debug for String<N> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use core::fmt::Write;

  use super::*;

  #[test]
  fn truncates_at_capacity() {
    let mut s = String::<8>::default();
    write!(s, "hello {}", 12345).ok();
    assert_eq!(s.as_str(), "hello 12");
    assert_eq!(s.as_str().len(), 8);
  }
}

use core::fmt;

use lilypad_msg::opt::known::number;
use lilypad_msg::Options;

/// # Path specification
/// Either the distinguished root (`/`) or a static list of
/// components. Resources carry one of these; requests are matched
/// against it by string or directly against their `Uri-Path` options.
///
/// Matching rules:
/// - consecutive `/` in the actual path are treated as one,
/// - a trailing `/` is ignored,
/// - with *match subtree* the actual path may carry extra trailing
///   components; otherwise the lengths must agree exactly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PathSpec {
  components: &'static [&'static str],
}

impl PathSpec {
  /// The root path `/`
  pub const ROOT: PathSpec = PathSpec { components: &[] };

  /// A path from its components (no separators):
  /// `PathSpec::new(&["actuators", "leds"])` is `/actuators/leds`.
  pub const fn new(components: &'static [&'static str]) -> Self {
    PathSpec { components }
  }

  /// The components, outermost first
  pub fn components(&self) -> &'static [&'static str] {
    self.components
  }

  /// Is this the root path?
  pub fn is_root(&self) -> bool {
    self.components.is_empty()
  }

  /// Number of components (0 for the root)
  pub fn component_count(&self) -> usize {
    self.components.len()
  }

  /// Match against a `/`-separated path string.
  pub fn matches_str(&self, path: &str, match_subtree: bool) -> bool {
    let mut rest = path.as_bytes();

    for component in self.components {
      while let Some((b'/', tail)) = rest.split_first() {
        rest = tail;
      }
      if rest.is_empty() {
        return false;
      }

      let end = rest.iter().position(|b| *b == b'/').unwrap_or(rest.len());
      if &rest[..end] != component.as_bytes() {
        return false;
      }
      rest = &rest[end..];
    }

    // subtrees admit extra trailing components; exact matches may
    // only be followed by separators
    match_subtree || rest.iter().all(|b| *b == b'/')
  }

  /// Match against the `Uri-Path` options of a request.
  pub fn matches_options<const N: usize>(&self,
                                         options: &Options<'_, N>,
                                         match_subtree: bool)
                                         -> bool {
    let mut actual = options.iter_number(number::URI_PATH);

    for component in self.components {
      match actual.next() {
        | Some(value) if value == component.as_bytes() => {},
        | _ => return false,
      }
    }

    match_subtree || actual.next().is_none()
  }

  /// Write the `/`-prefixed rendition into `buf` (`/` for the root),
  /// returning the length or `None` when the buffer is too small.
  pub fn serialize(&self, buf: &mut [u8]) -> Option<usize> {
    if self.is_root() {
      *buf.first_mut()? = b'/';
      return Some(1);
    }

    let mut at = 0;
    for component in self.components {
      let end = at + 1 + component.len();
      if end > buf.len() {
        return None;
      }
      buf[at] = b'/';
      buf[at + 1..end].copy_from_slice(component.as_bytes());
      at = end;
    }
    Some(at)
  }
}

impl fmt::Display for PathSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return f.write_str("/");
    }
    for component in self.components {
      write!(f, "/{}", component)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const AB: PathSpec = PathSpec::new(&["a123", "b567"]);

  #[test]
  fn subtree_match_table() {
    let cases = [("/", false),
                 ("/a", false),
                 ("/a123", false),
                 ("/a123/b567", true),
                 ("/a123/b567/c89", true),
                 ("/a123/b567/c89/d00", true)];

    for (path, expected) in cases {
      assert_eq!(AB.matches_str(path, true), expected, "subtree {}", path);
    }
  }

  #[test]
  fn exact_match_table() {
    let cases = [("/", false),
                 ("/a", false),
                 ("/a123", false),
                 ("/a123/b567", true),
                 ("/a123/b567/c89", false),
                 ("/a123/b567/c89/d00", false)];

    for (path, expected) in cases {
      assert_eq!(AB.matches_str(path, false), expected, "exact {}", path);
    }
  }

  #[test]
  fn subtree_implies_exact() {
    // whenever the exact match succeeds, the subtree match must too
    for path in ["/", "/a123", "/a123/b567", "/a123/b567/", "/a123//b567/c"] {
      if AB.matches_str(path, false) {
        assert!(AB.matches_str(path, true), "{}", path);
      }
    }
  }

  #[test]
  fn reflexive_and_forgiving_about_slashes() {
    assert!(AB.matches_str("/a123/b567", false));
    assert!(AB.matches_str("a123/b567", false));
    assert!(AB.matches_str("//a123///b567/", false));
    assert!(PathSpec::ROOT.matches_str("/", false));
    assert!(PathSpec::ROOT.matches_str("///", false));
    assert!(!PathSpec::ROOT.matches_str("/x", false));
    assert!(PathSpec::ROOT.matches_str("/anything", true));
  }

  #[test]
  fn matches_uri_path_options() {
    let mut storage = [0u8; 64];
    let mut options = Options::<16>::new(&mut storage);
    options.add_uri_path("/a123/b567/c89").unwrap();

    assert!(AB.matches_options(&options, true));
    assert!(!AB.matches_options(&options, false));

    let mut storage = [0u8; 64];
    let mut options = Options::<16>::new(&mut storage);
    options.add_uri_path("/a123/b567").unwrap();
    assert!(AB.matches_options(&options, false));
  }

  #[test]
  fn serialize_and_display() {
    let mut buf = [0u8; 16];
    let n = AB.serialize(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"/a123/b567");
    assert_eq!(format!("{}", AB), "/a123/b567");
    assert_eq!(format!("{}", PathSpec::ROOT), "/");

    let mut tiny = [0u8; 4];
    assert_eq!(AB.serialize(&mut tiny), None);
  }
}

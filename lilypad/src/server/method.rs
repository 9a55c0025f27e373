use core::fmt;

use lilypad_msg::Method;

/// A set of request [`Method`]s, gating which verbs a resource
/// answers. Requests matching a resource's path but not its method
/// set are answered `4.05 Method Not Allowed`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct MethodSet(u8);

impl MethodSet {
  /// No methods; such a resource is unreachable
  pub const NONE: MethodSet = MethodSet(0);

  /// Every method, the RFC 8132 extensions included
  pub const ALL: MethodSet = MethodSet(0b1111_1110);

  /// The set containing exactly `method`
  pub const fn just(method: Method) -> Self {
    MethodSet(1 << method as u8)
  }

  /// This set plus `method`
  pub const fn with(self, method: Method) -> Self {
    MethodSet(self.0 | 1 << method as u8)
  }

  /// Membership test
  pub const fn contains(self, method: Method) -> bool {
    self.0 & 1 << method as u8 != 0
  }

  /// Is the set empty?
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl fmt::Display for MethodSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[ ")?;
    for method in Method::ALL {
      if self.contains(method) {
        write!(f, "{} ", method)?;
      }
    }
    f.write_str("]")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn membership() {
    let set = MethodSet::just(Method::Get).with(Method::Post);
    assert!(set.contains(Method::Get));
    assert!(set.contains(Method::Post));
    assert!(!set.contains(Method::Delete));
    assert!(MethodSet::ALL.contains(Method::IPatch));
    assert!(MethodSet::NONE.is_empty());
  }

  #[test]
  fn display() {
    let set = MethodSet::just(Method::Get).with(Method::Delete);
    assert_eq!(format!("{}", set), "[ GET DELETE ]");
  }
}

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds elapsed between two instants of the same clock,
/// saturating at zero when `now` is not after `since`.
pub fn elapsed_millis<C: Clock>(now: Instant<C>, since: Instant<C>) -> u64 {
  now.checked_duration_since(&since)
     .and_then(|generic| Millis::try_from(generic).ok())
     .map(|Milliseconds(ms)| ms)
     .unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use embedded_time::Instant;

  use super::*;
  use crate::test::FakeClock;

  #[test]
  fn elapsed() {
    let a = Instant::<FakeClock>::new(100);
    let b = Instant::<FakeClock>::new(350);
    assert_eq!(elapsed_millis(b, a), 250);
    assert_eq!(elapsed_millis(a, b), 0);
    assert_eq!(elapsed_millis(a, a), 0);
  }
}

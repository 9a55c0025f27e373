//! Scheduled events over the single cooperative event queue.
//!
//! An event lives in two stages: a timer entry, and then, once the
//! timer has expired, an entry on the FIFO queue the event loop drains.
//! The split keeps event processing off whatever drives the timers:
//! [`Scheduler::service`] only *moves* due timers onto the queue, and
//! the core runs the queued work from its own thread via
//! [`Scheduler::pop`].
//!
//! Cancellation removes the timer first, then any queue entry the
//! timer may already have posted.

use ::std::collections::VecDeque;

use embedded_time::Instant;

use crate::time::{elapsed_millis, Clock};

/// What to do when a timer fires. Events carry indices, not
/// references, so the scheduler never borrows core state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Event {
  /// A confirmable transmission went unacknowledged for its backoff
  /// interval; `slot` indexes the transmission table.
  AckTimeout {
    /// transmission table index
    slot: usize,
  },
}

struct Timer<C: Clock> {
  start: Instant<C>,
  delay_ms: u64,
  event: Event,
}

/// The two-stage cooperative scheduler.
pub(crate) struct Scheduler<C: Clock> {
  timers: Vec<Timer<C>>,
  queue: VecDeque<Event>,
}

impl<C: Clock> Scheduler<C> {
  pub(crate) fn new() -> Self {
    Self { timers: Vec::new(),
           queue: VecDeque::new() }
  }

  /// Install a timer posting `event` after `delay_ms`.
  pub(crate) fn schedule(&mut self, event: Event, now: Instant<C>, delay_ms: u64) {
    self.timers.push(Timer { start: now,
                             delay_ms,
                             event });
  }

  /// Adjust the timer for `event` without disturbing the event
  /// itself; installs a fresh timer if none exists.
  pub(crate) fn reschedule(&mut self, event: Event, now: Instant<C>, delay_ms: u64) {
    match self.timers.iter_mut().find(|t| t.event == event) {
      | Some(timer) => {
        timer.start = now;
        timer.delay_ms = delay_ms;
      },
      | None => self.schedule(event, now, delay_ms),
    }
  }

  /// Remove the timer for `event`, and the queue entry too in case
  /// the timer had already fired.
  pub(crate) fn cancel(&mut self, event: Event) {
    self.timers.retain(|t| t.event != event);
    self.queue.retain(|queued| *queued != event);
  }

  /// Move every expired timer onto the queue.
  pub(crate) fn service(&mut self, now: Instant<C>) {
    let mut i = 0;
    while i < self.timers.len() {
      if elapsed_millis(now, self.timers[i].start) >= self.timers[i].delay_ms {
        let timer = self.timers.swap_remove(i);
        self.queue.push_back(timer.event);
      } else {
        i += 1;
      }
    }
  }

  /// Take the next posted event, in posting order.
  pub(crate) fn pop(&mut self) -> Option<Event> {
    self.queue.pop_front()
  }

  #[cfg(test)]
  pub(crate) fn timer_count(&self) -> usize {
    self.timers.len()
  }
}

impl<C: Clock> core::fmt::Debug for Scheduler<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Scheduler")
     .field("timers", &self.timers.len())
     .field("queued", &self.queue.len())
     .finish()
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::Instant;

  use super::*;
  use crate::test::FakeClock;

  fn at(ms: u64) -> Instant<FakeClock> {
    Instant::new(ms)
  }

  const EV0: Event = Event::AckTimeout { slot: 0 };
  const EV1: Event = Event::AckTimeout { slot: 1 };

  #[test]
  fn fires_after_delay() {
    let mut sched = Scheduler::new();
    sched.schedule(EV0, at(0), 2000);

    sched.service(at(1999));
    assert_eq!(sched.pop(), None);

    sched.service(at(2000));
    assert_eq!(sched.pop(), Some(EV0));
    assert_eq!(sched.pop(), None);
    assert_eq!(sched.timer_count(), 0);
  }

  #[test]
  fn reschedule_moves_the_deadline() {
    let mut sched = Scheduler::new();
    sched.schedule(EV0, at(0), 1000);
    sched.reschedule(EV0, at(500), 1000);

    sched.service(at(1000));
    assert_eq!(sched.pop(), None);
    sched.service(at(1500));
    assert_eq!(sched.pop(), Some(EV0));
  }

  #[test]
  fn cancel_removes_timer_and_queue_entry() {
    let mut sched = Scheduler::new();
    sched.schedule(EV0, at(0), 100);
    sched.schedule(EV1, at(0), 100);

    // EV0 already posted: cancellation must dequeue it as well
    sched.service(at(100));
    sched.cancel(EV0);
    assert_eq!(sched.pop(), Some(EV1));
    assert_eq!(sched.pop(), None);

    // and cancelling before the fire removes the timer
    sched.schedule(EV0, at(200), 100);
    sched.cancel(EV0);
    sched.service(at(1000));
    assert_eq!(sched.pop(), None);
  }

  #[test]
  fn queue_preserves_posting_order() {
    let mut sched = Scheduler::new();
    sched.schedule(EV0, at(0), 50);
    sched.schedule(EV1, at(0), 10);

    sched.service(at(10));
    sched.service(at(50));
    assert_eq!(sched.pop(), Some(EV1));
    assert_eq!(sched.pop(), Some(EV0));
  }
}

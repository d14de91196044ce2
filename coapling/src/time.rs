use coapling_msg::Id;
use embedded_time::duration::Milliseconds;
use embedded_time::Instant;

use crate::net::RegId;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds elapsed between the clock's epoch and `instant`
pub(crate) fn millis_since_epoch<C: Clock>(instant: Instant<C>) -> Option<u64> {
  Millis::try_from(instant.duration_since_epoch()).ok()
                                                  .map(|Milliseconds(ms)| ms)
}

/// Something the runtime asked to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
  /// The confirmable message with this id may need to be sent again
  Retransmit(Id),
  /// The Max-Age of the resource registered as this id ran out
  MaxAge(RegId),
}

/// A one-shot timer.
///
/// Scheduling does not replace earlier events; every scheduled event
/// must be handed to [`CoapRadio::fire`](crate::radio::CoapRadio::fire)
/// once `after` has elapsed.
pub trait Timer {
  /// Ask to be woken up with `event` after `after`
  fn schedule(&mut self, after: Millis, event: TimerEvent);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::ClockMock;

  #[test]
  fn millis_since_epoch_scales_ticks() {
    let clock = ClockMock::new();
    clock.set(1_500);
    let now = embedded_time::Clock::try_now(&clock).unwrap();
    assert_eq!(millis_since_epoch(now), Some(1_500));
  }
}

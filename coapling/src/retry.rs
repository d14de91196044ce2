use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use rand::Rng;

use crate::time::Millis;

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Strategy to employ when retransmitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  ///
  /// After each failed attempt, double the delay before retrying again.
  Exponential {
    /// Minimum (inclusive) delay for second attempt
    init_min: Milliseconds<u64>,
    /// Maximum (inclusive) delay for second attempt
    init_max: Milliseconds<u64>,
  },
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  Delay {
    /// Minimum (inclusive) delay for attempts
    min: Milliseconds<u64>,
    /// Maximum (inclusive) delay for attempts
    max: Milliseconds<u64>,
  },
}

impl Strategy {
  /// Are min & max delays the same? if so, we should probably skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Get the min & max durations as an inclusive range
  pub fn range(&self) -> RangeInclusive<u64> {
    match self {
      | &Self::Delay { min: Milliseconds(min),
                       max: Milliseconds(max), } => (min..=max),

      | &Self::Exponential { init_min: Milliseconds(min),
                             init_max: Milliseconds(max), } => (min..=max),
    }
  }

  /// Get the amount of time this strategy will wait in total
  /// if every one of `max_attempts` goes unanswered
  pub fn max_time(&self, max_attempts: Attempts) -> Millis {
    let max = *self.range().end();
    Milliseconds((1..=max_attempts.0).map(|attempt| self.gap(max, attempt))
                                     .sum())
  }

  /// Delay between attempt number `attempt` and the next one
  /// when the initial delay is `init`
  const fn gap(&self, init: u64, attempt: u16) -> u64 {
    // | attempt | delay after it |
    // | 1       | init           |
    // | 2       | init * 2       |
    // | 3       | init * 4       |
    // | n       | init * 2^(n-1) |
    match self {
      | Self::Delay { .. } => init,
      | Self::Exponential { .. } => init * 2u64.pow(attempt.saturating_sub(1) as u32),
    }
  }
}

/// Retransmission state living alongside one confirmable message.
///
/// It does not own a timer; the runtime schedules a wakeup with
/// [`Backoff::delay`] after each transmission and asks
/// [`Backoff::next_attempt`] when it fires.
///
/// ```
/// use coapling::retry::{Attempts, Backoff, Strategy};
/// use embedded_time::duration::Milliseconds;
/// use rand::SeedableRng;
///
/// let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
/// let strategy = Strategy::Exponential { init_min: Milliseconds(100),
///                                        init_max: Milliseconds(100) };
/// let mut backoff = Backoff::new(strategy, Attempts(3), &mut rng);
///
/// assert_eq!(backoff.delay(), Milliseconds(100u64));
/// assert_eq!(backoff.next_attempt(), Some(Milliseconds(200u64)));
/// assert_eq!(backoff.next_attempt(), Some(Milliseconds(400u64)));
/// assert_eq!(backoff.next_attempt(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  strategy: Strategy,
  init: u64,
  attempts: Attempts,
  max_attempts: Attempts,
}

impl Default for Backoff {
  fn default() -> Self {
    Self { strategy: Strategy::Delay { min: Milliseconds(0),
                                       max: Milliseconds(0) },
           init: 0,
           attempts: Attempts(1),
           max_attempts: Attempts(1) }
  }
}

impl Backoff {
  /// Start backing off after the first transmission,
  /// drawing the initial delay from `rng` when the strategy has jitter
  pub fn new<R: Rng>(strategy: Strategy, max_attempts: Attempts, rng: &mut R) -> Self {
    Self { strategy,
           init: if strategy.has_jitter() {
             rng.gen_range(strategy.range())
           } else {
             *strategy.range().start()
           },
           attempts: Attempts(1),
           max_attempts }
  }

  /// Transmissions so far
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// How long to wait for an answer to the latest transmission
  pub fn delay(&self) -> Millis {
    Milliseconds(self.strategy.gap(self.init, self.attempts.0))
  }

  /// The wait after the latest transmission ran out.
  ///
  /// Returns the delay to wait after transmitting again, or `None` when
  /// every attempt has been used up and the message should be given up on.
  pub fn next_attempt(&mut self) -> Option<Millis> {
    if self.attempts >= self.max_attempts {
      None
    } else {
      self.attempts.0 += 1;
      Some(self.delay())
    }
  }
}

use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};

/// Configuration options related to outbound CON messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Con {
  /// Retry strategy for CON messages that
  /// have not yet been ACKed.
  ///
  /// Defaults to an exponential retry strategy starting
  /// between 2 and 3 seconds:
  /// ```
  /// use coapling::config::Con;
  /// use coapling::retry::Strategy;
  /// use embedded_time::duration::Milliseconds;
  ///
  /// assert_eq!(Con::default().unacked_retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(3_000) });
  /// ```
  pub unacked_retry_strategy: Strategy,
  /// Number of times we are allowed to transmit a CON message
  /// before giving up on it.
  ///
  /// Defaults to 4 attempts.
  /// ```
  /// use coapling::config::Con;
  /// use coapling::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(4));
  /// ```
  pub max_attempts: Attempts,
}

/// Configuration options related to generating messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
  /// Leading two bytes of every token this node generates,
  /// customizable so that nodes sharing a network generate
  /// distinct tokens.
  ///
  /// ```
  /// use coapling::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_seed, 0);
  /// ```
  pub token_seed: u16,

  /// Seed of the random number generator choosing the initial message id,
  /// the initial token counter and retransmission jitter.
  ///
  /// The default value is 0, although it is
  /// best practice to set this to something else.
  /// (random integer, machine identifier)
  pub prng_seed: u64,
}

/// Defaults for new [`ObservableService`](crate::observe::ObservableService)s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observe {
  /// Max-Age of notifications, in seconds.
  ///
  /// Observers are sent a fresh notification when this elapses
  /// without the value changing.
  ///
  /// ```
  /// use coapling::config::Observe;
  ///
  /// assert_eq!(Observe::default().max_age_seconds, 60);
  /// ```
  pub max_age_seconds: u32,
  /// Whether notifications after the first one are CON (or NON)
  /// for observers that did not ask for either through a condition.
  ///
  /// ```
  /// use coapling::config::Observe;
  ///
  /// assert!(Observe::default().notifications_confirmable);
  /// ```
  pub notifications_confirmable: bool,
}

impl Default for Con {
  fn default() -> Self {
    Con { unacked_retry_strategy: Strategy::Exponential { init_min: Milliseconds(2_000),
                                                          init_max: Milliseconds(3_000) },
          max_attempts: Attempts(4) }
  }
}

impl Default for Msg {
  fn default() -> Self {
    Msg { token_seed: 0,
          prng_seed: 0 }
  }
}

impl Default for Observe {
  fn default() -> Self {
    Observe { max_age_seconds: coapling_msg::COAP_DEFAULT_MAX_AGE,
              notifications_confirmable: true }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
  /// See [`Con`]
  pub con: Con,
  /// See [`Msg`]
  pub msg: Msg,
  /// See [`Observe`]
  pub observe: Observe,
}

impl Config {
  /// Longest a CON message can stay unacknowledged before it is given up on
  pub fn max_transmit_wait_millis(&self) -> u64 {
    let Milliseconds(ms) = self.con
                               .unacked_retry_strategy
                               .max_time(self.con.max_attempts);
    ms
  }
}

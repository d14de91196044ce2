use core::fmt;

use crate::{Code, OptNumber};

/// Errors encounterable while building, parsing or serializing a [`Packet`](crate::Packet)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Error {
  /// Fewer bytes than a CoAP header
  NotCoap,
  /// The version bits were not [`COAP_VERSION`](crate::COAP_VERSION)
  WrongCoapVersion,
  /// Option number is not part of the option table
  UnknownOpt,
  /// Value kind does not match the option's format
  WrongType,
  /// The arena (or an output buffer) has no room left
  NoMem,
  /// Tried to read an option that isn't in the packet
  OptNotSet,
  /// A non-repeatable option is already present
  OptAlreadySet,
  /// Option value is longer than its format allows
  OptTooLong,
  /// A critical option number this implementation does not know
  UnknownCriticalOption,
  /// A non-repeatable critical option occurred more than once
  MultipleOccurrencesOfCriticalOption,
  /// A string option was empty
  EmptyStringOption,
  /// The options run past the end of the datagram
  OptionsExceedPacketLength,
  /// A string option was not valid UTF-8
  InvalidUtf8,
}

impl Error {
  /// A short human-readable diagnostic, suitable for a response payload
  pub fn diagnostic(&self) -> &'static str {
    match self {
      | Error::NotCoap => "not a coap message",
      | Error::WrongCoapVersion => "unsupported coap version",
      | Error::UnknownOpt => "unknown option",
      | Error::WrongType => "option value has the wrong type",
      | Error::NoMem => "out of memory",
      | Error::OptNotSet => "option not set",
      | Error::OptAlreadySet => "option already set",
      | Error::OptTooLong => "option too long",
      | Error::UnknownCriticalOption => "unknown critical option",
      | Error::MultipleOccurrencesOfCriticalOption => "critical option repeated",
      | Error::EmptyStringOption => "empty string option",
      | Error::OptionsExceedPacketLength => "options exceed packet length",
      | Error::InvalidUtf8 => "option is not utf-8",
    }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.diagnostic())
  }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Response code and offending option recorded when parsing fails,
/// used to build a diagnostic response for the peer.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, Default)]
pub struct ErrorContext {
  /// Code the error response should carry
  pub code: Code,
  /// The option that caused the failure, if any
  pub option: Option<OptNumber>,
}

impl ErrorContext {
  /// A context for a failure not caused by a specific option
  pub fn new(code: Code) -> Self {
    Self { code,
           option: None }
  }

  /// A context blaming a specific option
  pub fn option(code: Code, option: OptNumber) -> Self {
    Self { code,
           option: Some(option) }
  }
}

use core::fmt;

/// Known values of the Content-Type and Accept options
pub mod content_format;
pub use content_format::ContentFormat;

/// Largest option number in the option table
pub const LARGEST_OPTION_NUMBER: u8 = 21;

/// Fenceposts are zero-length options at multiples of this number
pub const FENCEPOST_STEP: u16 = 14;

/// The kind of value an option carries
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub enum Format {
  /// No value; presence is the information (If-None-Match, fenceposts)
  None,
  /// Unsigned integer, minimally big-endian encoded
  Uint,
  /// UTF-8 string
  String,
  /// Opaque bytes
  Opaque,
  /// Not an option this implementation knows
  Unknown,
}

/// # Option Number
///
/// Identifies an option. Odd numbers are *critical*: a receiver that does
/// not understand one must reject the message, while unknown *elective*
/// (even) options are silently skipped.
///
/// Observe ([`OptNumber::OBSERVE`]) and Condition ([`OptNumber::CONDITION`])
/// are the numbers this crate uses for the Observe extension.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u8);

struct Meta {
  format: Format,
  repeatable: bool,
  max_len: usize,
}

const fn meta(format: Format, repeatable: bool, max_len: usize) -> Meta {
  Meta { format,
         repeatable,
         max_len }
}

const UNKNOWN: Meta = meta(Format::Unknown, false, 0);
const STRING_MAX: usize = crate::COAP_STRING_OPTS_MAXLEN;

#[rustfmt::skip]
const TABLE: [Meta; LARGEST_OPTION_NUMBER as usize + 1] = [
  UNKNOWN,                                  //  0
  meta(Format::Uint, false, 2),             //  1: Content-Type
  meta(Format::Uint, false, 4),             //  2: Max-Age
  meta(Format::String, true, STRING_MAX),   //  3: Proxy-Uri
  meta(Format::Opaque, true, 8),            //  4: ETag
  meta(Format::String, false, STRING_MAX),  //  5: Uri-Host
  meta(Format::String, true, STRING_MAX),   //  6: Location-Path
  meta(Format::Uint, false, 2),             //  7: Uri-Port
  meta(Format::String, true, STRING_MAX),   //  8: Location-Query
  meta(Format::String, true, STRING_MAX),   //  9: Uri-Path
  meta(Format::Uint, false, 4),             // 10: Observe
  meta(Format::Opaque, false, 8),           // 11: Token
  meta(Format::Uint, true, 2),              // 12: Accept
  meta(Format::Opaque, true, 8),            // 13: If-Match
  meta(Format::None, false, 0),             // 14: Fencepost
  meta(Format::String, true, STRING_MAX),   // 15: Uri-Query
  UNKNOWN,                                  // 16
  UNKNOWN,                                  // 17
  meta(Format::Opaque, true, 5),            // 18: Condition
  UNKNOWN,                                  // 19
  UNKNOWN,                                  // 20
  meta(Format::None, false, 0),             // 21: If-None-Match
];

impl OptNumber {
  /// Content-Type
  pub const CONTENT_TYPE: Self = Self(1);
  /// Max-Age
  pub const MAX_AGE: Self = Self(2);
  /// Proxy-Uri
  pub const PROXY_URI: Self = Self(3);
  /// ETag
  pub const ETAG: Self = Self(4);
  /// Uri-Host
  pub const URI_HOST: Self = Self(5);
  /// Location-Path
  pub const LOCATION_PATH: Self = Self(6);
  /// Uri-Port
  pub const URI_PORT: Self = Self(7);
  /// Location-Query
  pub const LOCATION_QUERY: Self = Self(8);
  /// Uri-Path
  pub const URI_PATH: Self = Self(9);
  /// Observe
  pub const OBSERVE: Self = Self(10);
  /// Token
  pub const TOKEN: Self = Self(11);
  /// Accept
  pub const ACCEPT: Self = Self(12);
  /// If-Match
  pub const IF_MATCH: Self = Self(13);
  /// Fencepost
  pub const FENCEPOST: Self = Self(14);
  /// Uri-Query
  pub const URI_QUERY: Self = Self(15);
  /// Condition (conditional observe)
  pub const CONDITION: Self = Self(18);
  /// If-None-Match
  pub const IF_NONE_MATCH: Self = Self(21);

  fn meta(&self) -> &'static Meta {
    TABLE.get(self.0 as usize).unwrap_or(&UNKNOWN)
  }

  /// The kind of value this option carries
  ///
  /// ```
  /// use coapling_msg::{Format, OptNumber};
  ///
  /// assert_eq!(OptNumber::URI_PATH.format(), Format::String);
  /// assert_eq!(OptNumber(16).format(), Format::Unknown);
  /// assert_eq!(OptNumber(200).format(), Format::Unknown);
  /// ```
  pub fn format(&self) -> Format {
    self.meta().format
  }

  /// May this option occur more than once?
  pub fn is_repeatable(&self) -> bool {
    self.meta().repeatable
  }

  /// Longest legal value
  pub fn max_len(&self) -> usize {
    self.meta().max_len
  }

  /// Is this option known to this implementation?
  pub fn is_known(&self) -> bool {
    self.0 <= LARGEST_OPTION_NUMBER && self.format() != Format::Unknown
  }

  /// Critical options are odd-numbered
  pub fn is_critical(&self) -> bool {
    self.0 & 1 == 1
  }

  /// Is this a fencepost (a non-zero multiple of 14)?
  pub fn is_fencepost(&self) -> bool {
    is_fencepost(self.0.into())
  }

  /// The character joining the segments of a repeatable string option
  /// when exposed as a single string.
  pub fn delimiter(&self) -> Option<u8> {
    match *self {
      | Self::URI_PATH | Self::LOCATION_PATH => Some(b'/'),
      | Self::URI_QUERY | Self::LOCATION_QUERY => Some(b'&'),
      | _ => None,
    }
  }
}

impl fmt::Display for OptNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match *self {
      | Self::CONTENT_TYPE => "Content-Type",
      | Self::MAX_AGE => "Max-Age",
      | Self::PROXY_URI => "Proxy-Uri",
      | Self::ETAG => "ETag",
      | Self::URI_HOST => "Uri-Host",
      | Self::LOCATION_PATH => "Location-Path",
      | Self::URI_PORT => "Uri-Port",
      | Self::LOCATION_QUERY => "Location-Query",
      | Self::URI_PATH => "Uri-Path",
      | Self::OBSERVE => "Observe",
      | Self::TOKEN => "Token",
      | Self::ACCEPT => "Accept",
      | Self::IF_MATCH => "If-Match",
      | Self::FENCEPOST => "Fencepost",
      | Self::URI_QUERY => "Uri-Query",
      | Self::CONDITION => "Condition",
      | Self::IF_NONE_MATCH => "If-None-Match",
      | OptNumber(n) => return write!(f, "Option({})", n),
    };

    f.write_str(name)
  }
}

/// Is `n` a fencepost number?
pub fn is_fencepost(n: u16) -> bool {
  n > 0 && n % FENCEPOST_STEP == 0
}

/// Distance from option number `prev` to the next fencepost.
///
/// ```
/// use coapling_msg::opt::next_fencepost_delta;
///
/// assert_eq!(next_fencepost_delta(0), 14);
/// assert_eq!(next_fencepost_delta(6), 8);
/// assert_eq!(next_fencepost_delta(14), 14);
/// ```
pub fn next_fencepost_delta(prev: u16) -> u16 {
  FENCEPOST_STEP - prev % FENCEPOST_STEP
}

/// A typed option value handed to [`Packet::add_option`](crate::Packet::add_option)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OptValue<'a> {
  /// For [`Format::Uint`] options
  Uint(u32),
  /// For [`Format::String`] options
  Str(&'a str),
  /// For [`Format::Opaque`] options
  Opaque(&'a [u8]),
  /// For [`Format::None`] options
  Empty,
}

impl<'a> OptValue<'a> {
  /// The option format this value is valid for
  pub fn format(&self) -> Format {
    match self {
      | OptValue::Uint(_) => Format::Uint,
      | OptValue::Str(_) => Format::String,
      | OptValue::Opaque(_) => Format::Opaque,
      | OptValue::Empty => Format::None,
    }
  }
}

use super::{OptString, Packet};
use crate::{ContentFormat,
            Error,
            OpaqueData,
            OptNumber,
            OptValue,
            COAP_DEFAULT_MAX_AGE,
            COAP_STD_PORT};

/// Typed accessors for the options this crate knows by name
impl<const N: usize> Packet<N> {
  /// Read a string option, `OptNotSet` counting as the empty string
  fn string_or_empty(&self, number: OptNumber) -> Result<OptString, Error> {
    let mut out = OptString::default();
    match self.get_string(number, &mut out) {
      | Ok(()) | Err(Error::OptNotSet) => Ok(out),
      | Err(e) => Err(e),
    }
  }

  fn set_segments(&mut self, number: OptNumber, value: &str) -> Result<(), Error> {
    match value {
      | "" => self.remove_option(number),
      | v => self.set_option(number, OptValue::Str(v)),
    }
  }

  /// The Uri-Path segments joined by `/`, without a leading slash.
  ///
  /// Empty when no Uri-Path is set.
  pub fn uri_path(&self) -> Result<OptString, Error> {
    self.string_or_empty(OptNumber::URI_PATH)
  }

  /// Replace the Uri-Path with the `/`-separated segments of `path`.
  ///
  /// ```
  /// use coapling_msg::{CoapPacket, OptNumber};
  ///
  /// let mut p = CoapPacket::new();
  /// p.set_uri_path("/sensors/temp").unwrap();
  /// assert_eq!(p.segments(OptNumber::URI_PATH).count(), 2);
  /// assert_eq!(p.uri_path().unwrap().as_str(), "sensors/temp");
  /// ```
  pub fn set_uri_path(&mut self, path: &str) -> Result<(), Error> {
    self.set_segments(OptNumber::URI_PATH, path.trim_start_matches('/'))
  }

  /// The Uri-Query segments joined by `&`
  pub fn uri_query(&self) -> Result<OptString, Error> {
    self.string_or_empty(OptNumber::URI_QUERY)
  }

  /// Replace the Uri-Query with the `&`-separated parameters of `query`
  /// (a leading `?` or `/` is ignored)
  pub fn set_uri_query(&mut self, query: &str) -> Result<(), Error> {
    self.set_segments(OptNumber::URI_QUERY,
                      query.trim_start_matches(|c| c == '?' || c == '/'))
  }

  /// Append query parameters after those already set
  pub fn add_uri_query(&mut self, query: &str) -> Result<(), Error> {
    self.add_option(OptNumber::URI_QUERY,
                    OptValue::Str(query.trim_start_matches(|c| c == '?' || c == '/')))
  }

  /// Uri-Host
  pub fn uri_host(&self) -> Result<OptString, Error> {
    let mut out = OptString::default();
    self.get_string(OptNumber::URI_HOST, &mut out).map(|_| out)
  }

  /// Set Uri-Host
  pub fn set_uri_host(&mut self, host: &str) -> Result<(), Error> {
    self.set_option(OptNumber::URI_HOST, OptValue::Str(host))
  }

  /// Uri-Port, [`COAP_STD_PORT`] when absent
  pub fn uri_port(&self) -> u16 {
    self.get_uint(OptNumber::URI_PORT)
        .ok()
        .and_then(|n| u16::try_from(n).ok())
        .unwrap_or(COAP_STD_PORT)
  }

  /// Set Uri-Port; the default port is expressed by leaving the option out
  pub fn set_uri_port(&mut self, port: u16) -> Result<(), Error> {
    match port {
      | COAP_STD_PORT => self.remove_option(OptNumber::URI_PORT),
      | port => self.set_option(OptNumber::URI_PORT, OptValue::Uint(port.into())),
    }
  }

  /// The Location-Path segments joined by `/`
  pub fn location_path(&self) -> Result<OptString, Error> {
    self.string_or_empty(OptNumber::LOCATION_PATH)
  }

  /// Replace the Location-Path
  pub fn set_location_path(&mut self, path: &str) -> Result<(), Error> {
    self.set_segments(OptNumber::LOCATION_PATH, path.trim_start_matches('/'))
  }

  /// The token, empty when the packet carries none
  pub fn token(&self) -> OpaqueData {
    self.get_opaque(OptNumber::TOKEN).unwrap_or_default()
  }

  /// Set the token; an empty token removes the option
  pub fn set_token(&mut self, token: &OpaqueData) -> Result<(), Error> {
    match token.is_empty() {
      | true => self.remove_option(OptNumber::TOKEN),
      | false => self.set_option(OptNumber::TOKEN, OptValue::Opaque(&token[..])),
    }
  }

  /// Content-Type
  pub fn content_type(&self) -> Option<ContentFormat> {
    self.get_uint(OptNumber::CONTENT_TYPE)
        .ok()
        .and_then(|n| u16::try_from(n).ok())
        .map(ContentFormat::from)
  }

  /// Set Content-Type
  pub fn set_content_type(&mut self, format: ContentFormat) -> Result<(), Error> {
    self.set_option(OptNumber::CONTENT_TYPE,
                    OptValue::Uint(u16::from(format).into()))
  }

  /// Every content format listed in Accept options
  pub fn accept(&self) -> impl Iterator<Item = ContentFormat> + '_ {
    self.segments(OptNumber::ACCEPT)
        .map(|b| b.iter().fold(0u16, |n, b| (n << 8) | u16::from(*b)))
        .map(ContentFormat::from)
  }

  /// Add an acceptable content format
  pub fn add_accept(&mut self, format: ContentFormat) -> Result<(), Error> {
    self.add_option(OptNumber::ACCEPT, OptValue::Uint(u16::from(format).into()))
  }

  /// Max-Age in seconds, [`COAP_DEFAULT_MAX_AGE`] when absent
  pub fn max_age(&self) -> u32 {
    self.get_uint(OptNumber::MAX_AGE)
        .unwrap_or(COAP_DEFAULT_MAX_AGE)
  }

  /// Set Max-Age in seconds
  pub fn set_max_age(&mut self, seconds: u32) -> Result<(), Error> {
    self.set_option(OptNumber::MAX_AGE, OptValue::Uint(seconds))
  }

  /// The Observe value
  pub fn observe(&self) -> Result<u32, Error> {
    self.get_uint(OptNumber::OBSERVE)
  }

  /// Set the Observe value
  pub fn set_observe(&mut self, n: u32) -> Result<(), Error> {
    self.set_option(OptNumber::OBSERVE, OptValue::Uint(n))
  }

  /// The raw value of every Condition option
  pub fn conditions(&self) -> impl Iterator<Item = &[u8]> + '_ {
    self.segments(OptNumber::CONDITION)
  }

  /// Append a Condition option
  pub fn add_condition(&mut self, raw: &[u8]) -> Result<(), Error> {
    self.add_option(OptNumber::CONDITION, OptValue::Opaque(raw))
  }
}

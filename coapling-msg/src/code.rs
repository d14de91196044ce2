use core::fmt;

/// # Message Code
///
/// A single byte split into a 3-bit class and a 5-bit detail,
/// written `c.dd` (e.g. `2.05` Content).
///
/// |class|meaning|
/// |---|---|
/// |`0`|Empty message (`0.00`) or a request method|
/// |`2`|Success response|
/// |`4`|Client error response|
/// |`5`|Server error response|
///
/// ```
/// use coapling_msg::Code;
///
/// assert_eq!(Code::CONTENT, Code::new(2, 5));
/// assert_eq!(u8::from(Code::CONTENT), 69);
/// assert_eq!(format!("{}", Code::NOT_FOUND), "4.04");
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Code {
  /// Request (0) or response class (2, 4, 5)
  pub class: u8,
  /// 2-digit detail in `[0, 32)`
  pub detail: u8,
}

macro_rules! code {
  ($(#[$doc:meta])* $name:ident = $c:literal * $d:literal) => {
    $(#[$doc])*
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: Code = Code::new($c, $d);
  };
}

impl Code {
  /// Create a new Code
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  code!(
    /// `0.00` carried by empty ACK and RST messages
    EMPTY = 0 * 00
  );
  code!(
    /// Request method GET
    GET = 0 * 01
  );
  code!(
    /// Request method POST
    POST = 0 * 02
  );
  code!(
    /// Request method PUT
    PUT = 0 * 03
  );
  code!(
    /// Request method DELETE
    DELETE = 0 * 04
  );

  code!(
    /// 2.01 Created
    CREATED = 2 * 01
  );
  code!(
    /// 2.02 Deleted
    DELETED = 2 * 02
  );
  code!(
    /// 2.03 Valid
    VALID = 2 * 03
  );
  code!(
    /// 2.04 Changed
    CHANGED = 2 * 04
  );
  code!(
    /// 2.05 Content
    CONTENT = 2 * 05
  );

  code!(
    /// 4.00 Bad Request
    BAD_REQUEST = 4 * 00
  );
  code!(
    /// 4.01 Unauthorized
    UNAUTHORIZED = 4 * 01
  );
  code!(
    /// 4.02 Bad Option
    BAD_OPTION = 4 * 02
  );
  code!(
    /// 4.03 Forbidden
    FORBIDDEN = 4 * 03
  );
  code!(
    /// 4.04 Not Found
    NOT_FOUND = 4 * 04
  );
  code!(
    /// 4.05 Method Not Allowed
    METHOD_NOT_ALLOWED = 4 * 05
  );
  code!(
    /// 4.06 Not Acceptable
    NOT_ACCEPTABLE = 4 * 06
  );
  code!(
    /// 4.12 Precondition Failed
    PRECONDITION_FAILED = 4 * 12
  );
  code!(
    /// 4.13 Request Entity Too Large
    REQUEST_ENTITY_TOO_LARGE = 4 * 13
  );
  code!(
    /// 4.15 Unsupported Media Type
    UNSUPPORTED_MEDIA_TYPE = 4 * 15
  );

  code!(
    /// 5.00 Internal Server Error
    INTERNAL_SERVER_ERROR = 5 * 00
  );
  code!(
    /// 5.01 Not Implemented
    NOT_IMPLEMENTED = 5 * 01
  );
  code!(
    /// 5.02 Bad Gateway
    BAD_GATEWAY = 5 * 02
  );
  code!(
    /// 5.03 Service Unavailable
    SERVICE_UNAVAILABLE = 5 * 03
  );
  code!(
    /// 5.04 Gateway Timeout
    GATEWAY_TIMEOUT = 5 * 04
  );
  code!(
    /// 5.05 Proxying Not Supported
    PROXYING_NOT_SUPPORTED = 5 * 05
  );

  /// Is this the empty code `0.00`?
  pub fn is_empty(&self) -> bool {
    *self == Self::EMPTY
  }

  /// Is this a request method (byte value `1..=31`)?
  pub fn is_request(&self) -> bool {
    matches!(u8::from(*self), 1..=31)
  }

  /// Is this a response status (byte value `64..=191`)?
  pub fn is_response(&self) -> bool {
    matches!(u8::from(*self), 64..=191)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    Code { class: b >> 5,
           detail: b & 0b0001_1111 }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    (code.class << 5) | (code.detail & 0b0001_1111)
  }
}

impl fmt::Display for Code {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::assert_eqb;

  #[test]
  fn parse_code() {
    let byte = 0b_010_00101u8;
    let code = Code::from(byte);
    assert_eq!(code, Code { class: 2, detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 4, detail: 4 };
    let actual: u8 = code.into();
    let expected = 0b_100_00100u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn draft_byte_values() {
    assert_eq!(u8::from(Code::GET), 1);
    assert_eq!(u8::from(Code::DELETE), 4);
    assert_eq!(u8::from(Code::CREATED), 65);
    assert_eq!(u8::from(Code::BAD_OPTION), 130);
    assert_eq!(u8::from(Code::PRECONDITION_FAILED), 140);
    assert_eq!(u8::from(Code::UNSUPPORTED_MEDIA_TYPE), 143);
    assert_eq!(u8::from(Code::PROXYING_NOT_SUPPORTED), 165);
  }

  #[test]
  fn classify() {
    assert!(Code::EMPTY.is_empty());
    assert!(Code::POST.is_request());
    assert!(!Code::POST.is_response());
    assert!(Code::GATEWAY_TIMEOUT.is_response());
    assert!(!Code::from(32).is_request());
    assert!(!Code::from(32).is_response());
  }

  #[test]
  fn display() {
    assert_eq!(Code::CONTENT.to_string(), "2.05");
    assert_eq!(Code::GET.to_string(), "0.01");
  }
}

use core::fmt;
use core::ops::Deref;

use tinyvec::ArrayVec;
use toad_len::Len;

/// Longest opaque option value (ETag, Token, If-Match)
pub const OPAQUE_MAXLEN: usize = 8;

/// # Opaque data
///
/// A fixed-capacity, copyable byte string of at most
/// [`OPAQUE_MAXLEN`] bytes, used for tokens and opaque option values.
///
/// Equality only considers the bytes in use.
///
/// ```
/// use coapling_msg::OpaqueData;
///
/// let tok = OpaqueData::new(&[0xAB]).unwrap();
/// assert_eq!(tok.as_ref(), &[0xAB]);
/// assert!(OpaqueData::new(&[0; 9]).is_none());
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OpaqueData(ArrayVec<[u8; OPAQUE_MAXLEN]>);

impl OpaqueData {
  /// Copy `bytes` into a new value, `None` if they do not fit.
  pub fn new(bytes: &[u8]) -> Option<Self> {
    if bytes.len() > OPAQUE_MAXLEN {
      return None;
    }

    let mut inner = ArrayVec::new();
    inner.extend_from_slice(bytes);
    Some(Self(inner))
  }

  /// The shortest big-endian representation of `n` (no leading zero bytes)
  pub fn from_uint(n: u32) -> Self {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let mut inner = ArrayVec::new();
    inner.extend_from_slice(&bytes[skip..]);
    Self(inner)
  }

  /// Interpret the bytes as a big-endian unsigned integer
  pub fn to_uint(&self) -> u32 {
    self.0.iter().fold(0u32, |n, b| (n << 8) | u32::from(*b))
  }
}

impl Deref for OpaqueData {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &self.0
  }
}

impl AsRef<[u8]> for OpaqueData {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl Len for OpaqueData {
  const CAPACITY: Option<usize> = Some(OPAQUE_MAXLEN);

  fn len(&self) -> usize {
    self.0.len()
  }

  fn is_full(&self) -> bool {
    self.0.len() >= OPAQUE_MAXLEN
  }
}

impl fmt::Debug for OpaqueData {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "OpaqueData(")?;
    self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))?;
    write!(f, ")")
  }
}

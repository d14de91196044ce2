use core::fmt;

use crate::Error;

/// Indicates if this message is of
/// type Confirmable (0), Non-confirmable (1), Acknowledgement (2), or Reset (3).
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug, Default)]
pub enum Type {
  /// Some messages require an acknowledgement.  These messages are
  /// called "Confirmable".  When no packets are lost, each Confirmable
  /// message elicits exactly one return message of type Acknowledgement
  /// or type Reset.
  #[default]
  Con,
  /// Some messages do not require an acknowledgement.  This is
  /// particularly true for messages that are repeated regularly for
  /// application requirements, such as repeated readings from a sensor.
  Non,
  /// An Acknowledgement message acknowledges that a specific
  /// Confirmable message arrived.  It may also carry a piggy-backed response.
  Ack,
  /// A Reset message indicates that a specific message was received,
  /// but some context is missing to properly process it.
  Reset,
}

impl TryFrom<u8> for Type {
  type Error = Error;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    match b {
      | 0 => Ok(Type::Con),
      | 1 => Ok(Type::Non),
      | 2 => Ok(Type::Ack),
      | 3 => Ok(Type::Reset),
      | _ => Err(Error::NotCoap),
    }
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    match t {
      | Type::Con => 0,
      | Type::Non => 1,
      | Type::Ack => 2,
      | Type::Reset => 3,
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
                  | Type::Con => "CON",
                  | Type::Non => "NON",
                  | Type::Ack => "ACK",
                  | Type::Reset => "RST",
                })
  }
}

/// # Message ID
///
/// 16-bit unsigned integer in network byte order.  Used to
/// detect message duplication and to match messages of type
/// Acknowledgement/Reset to messages of type Confirmable/Non-confirmable.
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Debug, Eq, Ord, Default)]
pub struct Id(pub u16);

impl Id {
  /// Create an Id from a big-endian 2-byte unsigned int
  pub fn from_be_bytes(bs: [u8; 2]) -> Self {
    Self(u16::from_be_bytes(bs))
  }

  /// The id directly following this one, wrapping at `u16::MAX`
  pub fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn type_numbering() {
    for b in 0..4u8 {
      assert_eq!(u8::from(Type::try_from(b).unwrap()), b);
    }
    assert_eq!(Type::try_from(4), Err(Error::NotCoap));
  }

  #[test]
  fn id_wraps() {
    assert_eq!(Id(u16::MAX).next(), Id(0));
    assert_eq!(Id::from_be_bytes([1, 2]), Id(0x0102));
  }
}

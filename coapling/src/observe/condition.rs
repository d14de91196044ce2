/// What a [`Condition`] checks before a notification is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
  /// Stop observing
  Cancellation,
  /// The value changed
  Timeseries,
  /// The value changed and at least `threshold` seconds passed
  MinResponseTime,
  /// The value changed or at least `threshold` seconds passed
  MaxResponseTime,
  /// The value moved by at least `threshold`
  Step,
  /// The value is below `threshold`
  AllValuesSmaller,
  /// The value is above `threshold`
  AllValuesGreater,
  /// The value is `threshold`
  ValueEquals,
  /// The value is not `threshold`
  ValueDiffers,
  /// At least `threshold` seconds passed
  Periodic,
}

impl TryFrom<u8> for ConditionType {
  type Error = u8;

  fn try_from(b: u8) -> Result<Self, u8> {
    use ConditionType::*;

    match b {
      | 0 => Ok(Cancellation),
      | 1 => Ok(Timeseries),
      | 2 => Ok(MinResponseTime),
      | 3 => Ok(MaxResponseTime),
      | 4 => Ok(Step),
      | 5 => Ok(AllValuesSmaller),
      | 6 => Ok(AllValuesGreater),
      | 7 => Ok(ValueEquals),
      | 8 => Ok(ValueDiffers),
      | 9 => Ok(Periodic),
      | n => Err(n),
    }
  }
}

/// Whether notifications sent because of a condition are confirmable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reliability {
  #[allow(missing_docs)]
  Non,
  #[allow(missing_docs)]
  Con,
}

/// How the threshold bytes of a condition are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
  /// Unsigned integer
  Integer,
  /// Seconds, as the 8 bit mantissa / exponent duration encoding
  /// (values below 0x80 are plain seconds)
  Duration,
  /// IEEE 754 single precision float
  Float,
}

impl TryFrom<u8> for ValueType {
  type Error = u8;

  fn try_from(b: u8) -> Result<Self, u8> {
    match b {
      | 0 => Ok(ValueType::Integer),
      | 1 => Ok(ValueType::Duration),
      | 2 => Ok(ValueType::Float),
      | n => Err(n),
    }
  }
}

/// Decode the 8 bit duration encoding: 4 bits of mantissa, 4 of exponent
fn duration(raw: u32) -> u64 {
  let raw = u64::from(raw);
  if raw < 0x80 {
    raw
  } else {
    (raw & 0xF0) << (raw & 0x0F)
  }
}

/// # Observe condition
///
/// A predicate attached to an observer, carried in the Condition option:
///
/// ```text
///  0   1   2   3   4   5   6   7
/// +---+---+---+---+---+---+---+---+-----------------
/// |       type        |rel| vtype | threshold (0-4 bytes, big-endian)
/// +---+---+---+---+---+---+---+---+-----------------
/// ```
///
/// ```
/// use coapling::observe::{Condition, ConditionType, Reliability, ValueType};
///
/// let step = Condition::parse(&[0b00100_1_00, 5]).unwrap();
/// assert_eq!(step.ty, ConditionType::Step);
/// assert_eq!(step.reliability, Reliability::Con);
/// assert_eq!(step.value_type, ValueType::Integer);
/// assert_eq!(step.threshold(), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
  /// What is checked
  pub ty: ConditionType,
  /// Type of notifications this condition causes
  pub reliability: Reliability,
  /// How `raw` is interpreted
  pub value_type: ValueType,
  /// Threshold bytes as a big-endian integer
  pub raw: u32,
}

impl Default for Condition {
  fn default() -> Self {
    Self { ty: ConditionType::Timeseries,
           reliability: Reliability::Non,
           value_type: ValueType::Integer,
           raw: 0 }
  }
}

impl Condition {
  /// Decode a Condition option value, `None` if it is malformed
  pub fn parse(bytes: &[u8]) -> Option<Self> {
    let (head, value) = match bytes.split_first() {
      | Some((head, value)) if value.len() <= 4 => (*head, value),
      | _ => return None,
    };

    let ty = ConditionType::try_from(head >> 3).ok()?;
    let value_type = ValueType::try_from(head & 0b11).ok()?;
    let reliability = match head & 0b100 {
      | 0 => Reliability::Non,
      | _ => Reliability::Con,
    };
    let raw = value.iter().fold(0u32, |n, b| (n << 8) | u32::from(*b));

    Some(Self { ty,
                reliability,
                value_type,
                raw })
  }

  /// Encode as a Condition option value, writing to `buf`
  /// and returning the number of bytes written
  pub fn write(&self, buf: &mut [u8; 5]) -> usize {
    let head = (self.ty as u8) << 3
               | match self.reliability {
                 | Reliability::Non => 0,
                 | Reliability::Con => 0b100,
               }
               | self.value_type as u8;
    let bytes = self.raw.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();

    buf[0] = head;
    buf[1..1 + 4 - skip].copy_from_slice(&bytes[skip..]);
    1 + 4 - skip
  }

  /// The threshold, decoded according to the value type
  pub fn threshold(&self) -> f64 {
    match self.value_type {
      | ValueType::Integer => f64::from(self.raw),
      | ValueType::Duration => duration(self.raw) as f64,
      | ValueType::Float => f64::from(f32::from_bits(self.raw)),
    }
  }

  /// Is a notification of `new` due, given the last value
  /// sent to this observer `elapsed_ms` ago?
  ///
  /// [`ConditionType::Cancellation`] never holds; it is acted on when
  /// the observer registers.
  pub fn holds<V: ObserveValue>(&self, new: V, last: V, elapsed_ms: u64) -> bool {
    use ConditionType::*;

    let t = self.threshold();
    let changed = new != last;
    let (new, last) = (new.to_f64(), last.to_f64());
    let elapsed = elapsed_ms as f64 / 1000.0;

    match self.ty {
      | Cancellation => false,
      | Timeseries => changed,
      | MinResponseTime => changed && elapsed >= t,
      | MaxResponseTime => changed || elapsed >= t,
      | Step => (new - last).abs() >= t,
      | AllValuesSmaller => new < t,
      | AllValuesGreater => new > t,
      | ValueEquals => new == t,
      | ValueDiffers => new != t,
      | Periodic => elapsed >= t,
    }
  }
}

/// A value an [`ObservableService`](super::ObservableService) can publish
/// and evaluate conditions against
pub trait ObserveValue: Copy + PartialEq + Default {
  /// Numeric view used when comparing against thresholds
  fn to_f64(self) -> f64;
}

macro_rules! observe_value {
  ($($t:ty),*) => {
    $(
      impl ObserveValue for $t {
        fn to_f64(self) -> f64 {
          self as f64
        }
      }
    )*
  };
}

observe_value!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

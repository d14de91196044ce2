use core::iter;

use super::raw::{END_OF_OPTIONS, LONG_OPTION};
use super::Packet;
use crate::opt::is_fencepost;
use crate::{Code, Error, ErrorContext, Format, Id, OptNumber, Type, COAP_VERSION, HEADER_LEN};

/// Option count nibble meaning "ended by the end-of-options marker"
const UNLIMITED_OPTIONS: u8 = 15;

impl<const N: usize> Packet<N> {
  /// Decode a datagram into a new packet
  pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, Error> {
    let mut p = Self::new();
    p.parse_message(bytes).map(|_| p)
  }

  /// Decode `bytes` into this packet, replacing its contents.
  ///
  /// On failure the options and payload are cleared, the header fields
  /// that could be read are kept and [`Packet::error_context`] tells
  /// which response code (and option) a diagnostic reply should carry.
  pub fn parse_message(&mut self, bytes: &[u8]) -> Result<(), Error> {
    self.init();

    let (b0, code, id) = match bytes {
      | [b0, code, id0, id1, ..] => (*b0, *code, Id::from_be_bytes([*id0, *id1])),
      | _ => return Err(self.fail(Error::NotCoap, ErrorContext::new(Code::BAD_REQUEST))),
    };

    self.version = b0 >> 6;
    self.ty = Type::try_from((b0 >> 4) & 0b11)?;
    self.code = Code::from(code);
    self.id = id;
    let count = b0 & 0x0f;

    if self.version != COAP_VERSION {
      return Err(self.fail(Error::WrongCoapVersion,
                           ErrorContext::new(Code::NOT_IMPLEMENTED)));
    }

    let opts = &bytes[HEADER_LEN..];
    let exceeded = ErrorContext::new(Code::BAD_REQUEST);
    let mut at = 0usize;
    let mut number = 0u16;
    let mut parsed = 0u8;

    while count == UNLIMITED_OPTIONS || parsed < count {
      let header = match opts.get(at) {
        | Some(h) => *h,
        | None => return Err(self.fail(Error::OptionsExceedPacketLength, exceeded)),
      };

      if count == UNLIMITED_OPTIONS && header == END_OF_OPTIONS {
        at += 1;
        break;
      }

      let (len, start) = match (header & 0x0f, opts.get(at + 1)) {
        | (LONG_OPTION, Some(extra)) => (*extra as usize + 15, at + 2),
        | (LONG_OPTION, None) => {
          return Err(self.fail(Error::OptionsExceedPacketLength, exceeded))
        },
        | (n, _) => (n as usize, at + 1),
      };

      let value = match opts.get(start..start + len) {
        | Some(v) => v,
        | None => return Err(self.fail(Error::OptionsExceedPacketLength, exceeded)),
      };

      number = number.saturating_add((header >> 4).into());
      parsed = parsed.saturating_add(1);
      at = start + len;

      self.accept_option(number, value)?;
    }

    self.set_data(&opts[at..]).map_err(|e| {
                                self.fail(e, ErrorContext::new(Code::REQUEST_ENTITY_TOO_LARGE))
                              })
  }

  /// Validate and store one decoded option
  fn accept_option(&mut self, number: u16, value: &[u8]) -> Result<(), Error> {
    let critical = number & 1 == 1;
    let known = u8::try_from(number).map(OptNumber)
                                    .ok()
                                    .filter(|n| n.is_known());

    let opt = match known {
      // fenceposts are regenerated when needed
      | _ if is_fencepost(number) => return Ok(()),
      | Some(opt) => opt,
      | None if critical => {
        let opt = OptNumber(u8::try_from(number).unwrap_or(u8::MAX));
        return Err(self.fail(Error::UnknownCriticalOption,
                             ErrorContext::option(Code::BAD_OPTION, opt)));
      },
      | None => return Ok(()),
    };

    let bad_option = ErrorContext::option(Code::BAD_OPTION, opt);

    if !opt.is_repeatable() && self.is_set(opt) {
      return match critical {
        | true => Err(self.fail(Error::MultipleOccurrencesOfCriticalOption, bad_option)),
        | false => Ok(()),
      };
    }

    if opt.format() == Format::String && value.is_empty() {
      return match critical {
        | true => Err(self.fail(Error::EmptyStringOption, bad_option)),
        | false => Ok(()),
      };
    }

    if value.len() > opt.max_len() {
      return Err(self.fail(Error::OptTooLong, bad_option));
    }

    self.splice(number, iter::once(value), false)
        .map_err(|e| self.fail(e, ErrorContext::new(Code::REQUEST_ENTITY_TOO_LARGE)))
  }

  fn fail(&mut self, e: Error, context: ErrorContext) -> Error {
    self.clear_content();
    self.error = context;
    e
  }

  fn needs_end_marker(&self) -> bool {
    self.option_count >= UNLIMITED_OPTIONS as usize
  }

  /// Exact number of bytes [`Packet::serialize`] will write
  pub fn serialize_length(&self) -> usize {
    HEADER_LEN + self.end_of_options + usize::from(self.needs_end_marker()) + self.data().len()
  }

  /// Encode this packet into `buf`, returning the number of bytes written.
  ///
  /// The option count in the header is the actual number of encoded options;
  /// from 15 options on the count is 15 and the options end with `0xF0`.
  pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
    let len = self.serialize_length();
    let out = buf.get_mut(..len).ok_or(Error::NoMem)?;

    let count = match self.needs_end_marker() {
      | true => UNLIMITED_OPTIONS,
      | false => self.option_count as u8,
    };

    out[0] = (self.version << 6) | (u8::from(self.ty) << 4) | count;
    out[1] = self.code.into();
    out[2..HEADER_LEN].copy_from_slice(&self.id.0.to_be_bytes());

    let mut at = HEADER_LEN;
    out[at..at + self.end_of_options].copy_from_slice(&self.storage[..self.end_of_options]);
    at += self.end_of_options;

    if self.needs_end_marker() {
      out[at] = END_OF_OPTIONS;
      at += 1;
    }

    out[at..].copy_from_slice(self.data());
    Ok(len)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::{assert_eqb, assert_eqb_iter};
  use crate::{CoapPacket, OpaqueData, OptValue};

  fn bytes_of(p: &CoapPacket) -> Vec<u8> {
    let mut buf = vec![0u8; p.serialize_length()];
    assert_eq!(p.serialize(&mut buf), Ok(buf.len()));
    buf
  }

  #[test]
  fn header_layout() {
    let mut p = CoapPacket::new();
    p.set_type(Type::Ack);
    p.set_code(Code::CONTENT);
    p.set_id(Id(0x1234));
    p.set_uri_path("a").unwrap();
    p.set_data(b"hi").unwrap();

    let bytes = bytes_of(&p);
    assert_eqb!(bytes[0], 0b01_10_0001);
    assert_eqb!(bytes[1], 69);
    assert_eqb_iter!(bytes[2..], [0x12, 0x34, 0b1001_0001, b'a', b'h', b'i']);
  }

  #[test]
  fn round_trip() {
    let mut p = CoapPacket::new();
    p.set_type(Type::Non);
    p.set_code(Code::PUT);
    p.set_id(Id(7));
    p.set_token(&OpaqueData::new(&[0xAB, 0xCD]).unwrap())
     .unwrap();
    p.set_uri_host("node-17.sensors.example").unwrap();
    p.set_uri_port(61616).unwrap();
    p.set_uri_path("/sensors/temp/raw").unwrap();
    p.set_uri_query("unit=c&avg=5").unwrap();
    p.set_observe(3).unwrap();
    p.add_option(OptNumber::IF_NONE_MATCH, OptValue::Empty)
     .unwrap();
    p.set_data(b"21.5").unwrap();

    let parsed = CoapPacket::try_from_bytes(&bytes_of(&p)).unwrap();
    assert_eq!(parsed, p);
    assert_eq!(parsed.ty(), Type::Non);
    assert_eq!(parsed.code(), Code::PUT);
    assert_eq!(parsed.id(), Id(7));
    assert_eq!(parsed.token().as_ref(), &[0xAB, 0xCD]);
    assert_eq!(parsed.uri_host().unwrap().as_str(), "node-17.sensors.example");
    assert_eq!(parsed.uri_port(), 61616);
    assert_eq!(parsed.uri_path().unwrap().as_str(), "sensors/temp/raw");
    assert_eq!(parsed.uri_query().unwrap().as_str(), "unit=c&avg=5");
    assert_eq!(parsed.observe(), Ok(3));
    assert!(parsed.is_set(OptNumber::IF_NONE_MATCH));
    assert_eq!(parsed.data(), b"21.5");
  }

  #[test]
  fn many_options_use_end_marker() {
    let mut p = CoapPacket::new();
    p.set_uri_path("a/b/c/d/e/f/g/h/i/j/k/l/m/n/o/p").unwrap();
    p.set_data(&[0xFF]).unwrap();

    let bytes = bytes_of(&p);
    assert_eq!(bytes[0] & 0x0f, 15);
    assert_eq!(bytes[bytes.len() - 2], END_OF_OPTIONS);
    assert_eq!(bytes.len(), p.serialize_length());

    let parsed = CoapPacket::try_from_bytes(&bytes).unwrap();
    assert_eq!(parsed.segments(OptNumber::URI_PATH).count(), 16);
    assert_eq!(parsed.data(), &[0xFF]);
  }

  #[test]
  fn too_short() {
    let mut p = CoapPacket::new();
    assert_eq!(p.parse_message(&[0x40, 1, 0]), Err(Error::NotCoap));
  }

  #[test]
  fn wrong_version() {
    let mut p = CoapPacket::new();
    assert_eq!(p.parse_message(&[0b10_00_0000, 1, 0, 1]),
               Err(Error::WrongCoapVersion));
    assert_eq!(p.error_context().code, Code::NOT_IMPLEMENTED);
  }

  #[test]
  fn unknown_critical_vs_elective() {
    // option 17: odd, unknown
    let critical = [0b01_00_0010, 1, 0, 1, 0b1111_0001, b'x', 0b0010_0001, b'y'];
    let mut p = CoapPacket::new();
    assert_eq!(p.parse_message(&critical), Err(Error::UnknownCriticalOption));
    assert_eq!(p.error_context().code, Code::BAD_OPTION);
    assert_eq!(p.error_context().option, Some(OptNumber(17)));
    assert_eq!(p.options().count(), 0);
    assert_eq!(p.id(), Id(1));

    // option 16: even, unknown, skipped
    let elective = [0b01_00_0010, 1, 0, 1, 0b1111_0001, b'x', 0b0001_0001, b'y', 0xFF];
    let p = CoapPacket::try_from_bytes(&elective).unwrap();
    assert!(!p.is_set(OptNumber(16)));
    assert_eq!(p.options().map(|o| o.number).collect::<Vec<_>>(),
               vec![OptNumber::URI_QUERY]);
    assert_eq!(p.data(), &[0xFF]);
  }

  #[test]
  fn duplicates() {
    // Uri-Host (5, critical) twice
    let critical = [0b01_00_0010, 1, 0, 1, 0b0101_0001, b'a', 0b0000_0001, b'b'];
    assert_eq!(CoapPacket::try_from_bytes(&critical),
               Err(Error::MultipleOccurrencesOfCriticalOption));

    // Max-Age (2, elective) twice: the second is skipped
    let elective = [0b01_00_0010, 1, 0, 1, 0b0010_0001, 9, 0b0000_0001, 8];
    let p = CoapPacket::try_from_bytes(&elective).unwrap();
    assert_eq!(p.max_age(), 9);
  }

  #[test]
  fn empty_strings() {
    let critical = [0b01_00_0001, 1, 0, 1, 0b1001_0000];
    assert_eq!(CoapPacket::try_from_bytes(&critical),
               Err(Error::EmptyStringOption));

    // Location-Path (6, elective)
    let elective = [0b01_00_0001, 1, 0, 1, 0b0110_0000];
    let p = CoapPacket::try_from_bytes(&elective).unwrap();
    assert!(!p.is_set(OptNumber::LOCATION_PATH));
  }

  #[test]
  fn options_exceed_length() {
    // announces 2 options, carries 1
    let truncated = [0b01_00_0010, 1, 0, 1, 0b1001_0001, b'a'];
    let mut p = CoapPacket::new();
    assert_eq!(p.parse_message(&truncated),
               Err(Error::OptionsExceedPacketLength));
    assert_eq!(p.error_context().code, Code::BAD_REQUEST);

    // value runs past the end
    let short_value = [0b01_00_0001, 1, 0, 1, 0b1001_0011, b'a'];
    assert_eq!(CoapPacket::try_from_bytes(&short_value),
               Err(Error::OptionsExceedPacketLength));
  }

  #[test]
  fn uint_too_long() {
    let long_max_age = [0b01_00_0001, 1, 0, 1, 0b0010_0101, 1, 2, 3, 4, 5];
    assert_eq!(CoapPacket::try_from_bytes(&long_max_age),
               Err(Error::OptTooLong));
  }

  #[test]
  fn explicit_fencepost_is_dropped() {
    // fencepost 14 then delta 0 "option" 14 again, then If-None-Match (21)
    let bytes = [0b01_00_0010, 1, 0, 1, 0b1110_0000, 0b0111_0000];
    let p = CoapPacket::try_from_bytes(&bytes).unwrap();
    assert!(p.is_set(OptNumber::IF_NONE_MATCH));
    assert_eq!(p.options().count(), 1);
    assert_eq!(bytes_of(&p), bytes);
  }

  #[test]
  fn payload_too_large() {
    let mut bytes = vec![0b01_00_0000, 1, 0, 1];
    bytes.extend(core::iter::repeat(0).take(200));
    assert_eq!(CoapPacket::try_from_bytes(&bytes), Err(Error::NoMem));
  }
}

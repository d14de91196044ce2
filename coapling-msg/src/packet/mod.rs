use core::fmt;
use core::iter;

use tinyvec::ArrayVec;
use toad_writable::Writable;

use crate::opt::{is_fencepost, LARGEST_OPTION_NUMBER};
use crate::{Code,
            Error,
            ErrorContext,
            Format,
            Id,
            OpaqueData,
            OptNumber,
            OptValue,
            Type,
            COAP_VERSION,
            DEFAULT_STORAGE_SIZE};

mod known;
pub(crate) mod raw;
mod wire;

use raw::{Cursor, Measure, RawOpt, RawOpts};

/// A stack-allocated string holding an option value
/// (e.g. a Uri-Path with its segments joined by `/`)
pub type OptString = Writable<ArrayVec<[u8; 128]>>;

/// A [`Packet`] with the default arena size
pub type CoapPacket = Packet<DEFAULT_STORAGE_SIZE>;

const INDEX_LEN: usize = LARGEST_OPTION_NUMBER as usize + 1;

/// An option as seen by callers (fenceposts are never yielded)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Opt<'a> {
  /// Option number
  pub number: OptNumber,
  /// Raw value bytes
  pub value: &'a [u8],
}

/// # CoAP packet
///
/// Header fields plus an `N`-byte arena holding the encoded options
/// (growing from the front) and the payload (sitting at the back).
///
/// Options are kept in ascending order in their on-the-wire encoding:
/// each option header holds a 4-bit delta from the previous option number
/// and a 4-bit length (15 escapes to an extra length byte). Fenceposts are
/// inserted and elided as options come and go so every delta stays encodable;
/// they are never visible through the accessors.
///
/// The option index holds offsets into the arena, so copies of a packet
/// are independent and valid.
///
/// ```
/// use coapling_msg::{CoapPacket, Error, OptNumber, OptValue};
///
/// let mut p = CoapPacket::new();
/// p.add_option(OptNumber::URI_PATH, OptValue::Str("a/b")).unwrap();
/// p.add_option(OptNumber::IF_NONE_MATCH, OptValue::Empty).unwrap();
///
/// assert_eq!(p.uri_path().unwrap().as_str(), "a/b");
/// assert_eq!(p.add_option(OptNumber::MAX_AGE, OptValue::Str("60")),
///            Err(Error::WrongType));
/// ```
#[derive(Clone, Copy)]
pub struct Packet<const N: usize> {
  version: u8,
  ty: Type,
  code: Code,
  id: Id,
  /// arena offset of the first occurrence of each option number
  index: [Option<u16>; INDEX_LEN],
  /// options encoded in the arena, fenceposts included
  option_count: usize,
  end_of_options: usize,
  payload: usize,
  error: ErrorContext,
  storage: [u8; N],
}

impl<const N: usize> Default for Packet<N> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const N: usize> Packet<N> {
  /// An empty CON packet with code 0.00 and id 0
  pub fn new() -> Self {
    Self { version: COAP_VERSION,
           ty: Type::Con,
           code: Code::EMPTY,
           id: Id(0),
           index: [None; INDEX_LEN],
           option_count: 0,
           end_of_options: 0,
           payload: N,
           error: ErrorContext::default(),
           storage: [0; N] }
  }

  /// Reset to the state of [`Packet::new`]
  pub fn init(&mut self) {
    *self = Self::new();
  }

  /// Drop options and payload, keeping the header
  fn clear_content(&mut self) {
    self.index = [None; INDEX_LEN];
    self.option_count = 0;
    self.end_of_options = 0;
    self.payload = N;
  }

  /// Protocol version
  pub fn version(&self) -> u8 {
    self.version
  }

  /// Message type
  pub fn ty(&self) -> Type {
    self.ty
  }

  /// Set the message type
  pub fn set_type(&mut self, ty: Type) {
    self.ty = ty;
  }

  /// Request method or response status
  pub fn code(&self) -> Code {
    self.code
  }

  /// Set the request method or response status
  pub fn set_code(&mut self, code: Code) {
    self.code = code;
  }

  /// Message id
  pub fn id(&self) -> Id {
    self.id
  }

  /// Set the message id
  pub fn set_id(&mut self, id: Id) {
    self.id = id;
  }

  /// Is this a request (method code)?
  pub fn is_request(&self) -> bool {
    self.code.is_request()
  }

  /// Is this a response (status code)?
  pub fn is_response(&self) -> bool {
    self.code.is_response()
  }

  /// Response code and option blamed by the last failed parse
  pub fn error_context(&self) -> ErrorContext {
    self.error
  }

  pub(crate) fn raw_options(&self) -> RawOpts<'_> {
    RawOpts::new(&self.storage[..self.end_of_options])
  }

  /// The options in this packet, in ascending order
  pub fn options(&self) -> impl Iterator<Item = Opt<'_>> + '_ {
    self.raw_options()
        .filter(|o| !is_fencepost(o.number))
        .map(move |o| Opt { number: OptNumber(o.number as u8),
                            value: &self.storage[o.start..o.end] })
  }

  /// Is at least one occurrence of `number` present?
  pub fn is_set(&self, number: OptNumber) -> bool {
    matches!(self.index.get(number.0 as usize), Some(Some(_)))
  }

  /// Every occurrence of `number`, in order
  pub fn segments(&self, number: OptNumber) -> impl Iterator<Item = &[u8]> + '_ {
    let n = u16::from(number.0);
    self.raw_options()
        .skip_while(move |o| o.number < n)
        .take_while(move |o| o.number == n)
        .map(move |o| &self.storage[o.start..o.end])
  }

  fn check_format(&self, number: OptNumber, format: Format) -> Result<(), Error> {
    if !number.is_known() {
      Err(Error::UnknownOpt)
    } else if number.format() != format {
      Err(Error::WrongType)
    } else if !self.is_set(number) {
      Err(Error::OptNotSet)
    } else {
      Ok(())
    }
  }

  fn first_segment(&self, number: OptNumber) -> Result<&[u8], Error> {
    self.segments(number).next().ok_or(Error::OptNotSet)
  }

  /// Read a uint option
  pub fn get_uint(&self, number: OptNumber) -> Result<u32, Error> {
    self.check_format(number, Format::Uint)?;
    let bytes = self.first_segment(number)?;
    Ok(bytes.iter().fold(0u32, |n, b| (n << 8) | u32::from(*b)))
  }

  /// Read the first occurrence of an opaque option
  pub fn get_opaque(&self, number: OptNumber) -> Result<OpaqueData, Error> {
    self.check_format(number, Format::Opaque)?;
    OpaqueData::new(self.first_segment(number)?).ok_or(Error::OptTooLong)
  }

  /// Write a string option into `out`, joining the segments of
  /// repeatable options with their delimiter.
  pub fn get_string<W: fmt::Write>(&self, number: OptNumber, out: &mut W) -> Result<(), Error> {
    self.check_format(number, Format::String)?;

    for (ix, seg) in self.segments(number).enumerate() {
      if ix > 0 {
        if let Some(delim) = number.delimiter() {
          out.write_char(delim as char).map_err(|_| Error::NoMem)?;
        }
      }

      let seg = core::str::from_utf8(seg).map_err(|_| Error::InvalidUtf8)?;
      out.write_str(seg).map_err(|_| Error::NoMem)?;
    }

    Ok(())
  }

  /// Add an occurrence of an option.
  ///
  /// Repeatable string options (paths and queries) are split on their
  /// delimiter into one occurrence per segment.
  ///
  /// On failure the packet is left untouched.
  pub fn add_option(&mut self, number: OptNumber, value: OptValue<'_>) -> Result<(), Error> {
    if !number.is_known() || number.is_fencepost() {
      return Err(Error::UnknownOpt);
    }

    if value.format() != number.format() {
      return Err(Error::WrongType);
    }

    if !number.is_repeatable() && self.is_set(number) {
      return Err(Error::OptAlreadySet);
    }

    let n = u16::from(number.0);
    let max = number.max_len();
    match value {
      | OptValue::Uint(v) => {
        let bytes = OpaqueData::from_uint(v);
        if bytes.len() > max {
          return Err(Error::OptTooLong);
        }
        self.splice(n, iter::once(&bytes[..]), false)
      },
      | OptValue::Opaque(bytes) if bytes.len() > max => Err(Error::OptTooLong),
      | OptValue::Opaque(bytes) => self.splice(n, iter::once(bytes), false),
      | OptValue::Empty => self.splice(n, iter::once(&[][..]), false),
      | OptValue::Str(s) => match number.delimiter() {
        | Some(delim) => {
          let segments = s.as_bytes()
                          .split(move |b| *b == delim)
                          .filter(|seg| !seg.is_empty());
          if segments.clone().any(|seg| seg.len() > max) {
            return Err(Error::OptTooLong);
          }
          self.splice(n, segments, false)
        },
        | None if s.is_empty() => Err(Error::EmptyStringOption),
        | None if s.len() > max => Err(Error::OptTooLong),
        | None => self.splice(n, iter::once(s.as_bytes()), false),
      },
    }
  }

  /// Remove every occurrence of `number`.
  ///
  /// Removing an option that is not set succeeds and changes nothing.
  pub fn remove_option(&mut self, number: OptNumber) -> Result<(), Error> {
    if !number.is_known() || number.is_fencepost() {
      return Err(Error::UnknownOpt);
    }

    if !self.is_set(number) {
      return Ok(());
    }

    self.splice(number.0.into(), iter::empty(), true)
  }

  /// Replace every occurrence of `number` with `value`.
  ///
  /// On failure the previous occurrences are kept.
  pub fn set_option(&mut self, number: OptNumber, value: OptValue<'_>) -> Result<(), Error> {
    let before = *self;
    self.remove_option(number)
        .and_then(|_| self.add_option(number, value))
        .map_err(|e| {
          *self = before;
          e
        })
  }

  /// Re-encode the arena region between the option before `number` and the
  /// option after it so that it holds `segments` (after any occurrences
  /// already present, unless `replace` is set) with fenceposts as needed.
  ///
  /// The tail is moved once, and the delta nibble of the option following the
  /// region is rewritten in place.
  fn splice<'v, I>(&mut self, number: u16, segments: I, replace: bool) -> Result<(), Error>
    where I: Iterator<Item = &'v [u8]> + Clone
  {
    let mut prev: Option<RawOpt> = None;
    let mut next: Option<RawOpt> = None;
    for opt in self.raw_options().filter(|o| !is_fencepost(o.number)) {
      if opt.number < number || (opt.number == number && !replace) {
        prev = Some(opt);
      } else if opt.number > number {
        next = Some(opt);
        break;
      }
    }

    let span_start = prev.map(|o| o.end).unwrap_or(0);
    let span_end = next.map(|o| o.at).unwrap_or(self.end_of_options);
    let prev_number = prev.map(|o| o.number).unwrap_or(0);
    let next_info = next.map(|o| (o.number, o.len()));

    let mut measure = Measure::default();
    raw::emit_span(&mut measure,
                   prev_number,
                   number,
                   segments.clone(),
                   next_info);

    let new_end = self.end_of_options - (span_end - span_start) + measure.0;
    if new_end > self.payload {
      return Err(Error::NoMem);
    }

    let tail = span_start + measure.0;
    self.storage.copy_within(span_end..self.end_of_options, tail);

    let last = raw::emit_span(&mut Cursor::new(&mut self.storage[span_start..tail]),
                              prev_number,
                              number,
                              segments,
                              next_info);

    if let Some((next_number, _)) = next_info {
      let header = &mut self.storage[tail];
      *header = (((next_number - last) as u8) << 4) | (*header & 0x0f);
    }

    self.end_of_options = new_end;
    self.reindex();
    Ok(())
  }

  fn reindex(&mut self) {
    let mut index = [None; INDEX_LEN];
    let mut count = 0;
    for opt in self.raw_options() {
      count += 1;
      if is_fencepost(opt.number) {
        continue;
      }

      if let Some(slot) = index.get_mut(opt.number as usize) {
        if slot.is_none() {
          *slot = Some(opt.at as u16);
        }
      }
    }

    self.index = index;
    self.option_count = count;
  }

  /// The payload
  pub fn data(&self) -> &[u8] {
    &self.storage[self.payload..]
  }

  /// Replace the payload, which is placed at the end of the arena.
  ///
  /// Fails with [`Error::NoMem`] (leaving the old payload) if it would
  /// overlap the options.
  pub fn set_data(&mut self, data: &[u8]) -> Result<(), Error> {
    let start = N.checked_sub(data.len()).ok_or(Error::NoMem)?;
    if start < self.end_of_options {
      return Err(Error::NoMem);
    }

    self.storage[start..].copy_from_slice(data);
    self.payload = start;
    Ok(())
  }

  /// Bytes still free between options and payload
  pub fn free(&self) -> usize {
    self.payload - self.end_of_options
  }
}

impl<const N: usize> PartialEq for Packet<N> {
  fn eq(&self, other: &Self) -> bool {
    self.version == other.version
    && self.ty == other.ty
    && self.code == other.code
    && self.id == other.id
    && self.storage[..self.end_of_options] == other.storage[..other.end_of_options]
    && self.data() == other.data()
  }
}

impl<const N: usize> Eq for Packet<N> {}

impl<const N: usize> fmt::Debug for Packet<N> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    struct Options<'a, const N: usize>(&'a Packet<N>);
    impl<'a, const N: usize> fmt::Debug for Options<'a, N> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
         .entries(self.0.options().map(|o| (o.number, o.value)))
         .finish()
      }
    }

    f.debug_struct("Packet")
     .field("ty", &self.ty)
     .field("code", &self.code)
     .field("id", &self.id)
     .field("options", &Options(self))
     .field("payload", &self.data())
     .finish()
  }
}

#[cfg(test)]
mod tests {
  use itertools::Itertools;

  use super::*;
  use crate::test::assert_eqb_iter;
  use crate::ContentFormat;

  type Small = Packet<16>;

  fn deltas_ok<const N: usize>(p: &Packet<N>) {
    let mut prev = 0u16;
    let opts = p.raw_options().collect::<Vec<_>>();
    assert_eq!(opts.iter().map(|o| o.end).last().unwrap_or(0),
               p.end_of_options,
               "options must cover exactly the option region");
    for o in opts {
      let delta = o.number - prev;
      assert!(delta <= 15, "delta {} in {:?}", delta, p);
      assert!(!(delta == 15 && o.len() == 0), "end marker in {:?}", p);
      prev = o.number;
    }
  }

  #[test]
  fn add_keeps_ascending_order() {
    let mut p = CoapPacket::new();
    p.add_option(OptNumber::URI_QUERY, OptValue::Str("a=1")).unwrap();
    p.add_option(OptNumber::CONTENT_TYPE, OptValue::Uint(50)).unwrap();
    p.add_option(OptNumber::URI_PATH, OptValue::Str("x")).unwrap();

    assert_eqb_iter!(&p.storage[..p.end_of_options],
                     [0b0001_0001, 50, 0b1000_0001, b'x', 0b0110_0011, b'a', b'=', b'1']);
    deltas_ok(&p);
  }

  #[test]
  fn fencepost_inserted_and_elided() {
    let mut p = CoapPacket::new();
    p.add_option(OptNumber::IF_NONE_MATCH, OptValue::Empty).unwrap();
    assert_eqb_iter!(&p.storage[..p.end_of_options], [0b1110_0000, 0b0111_0000]);
    assert_eq!(p.option_count, 2);

    p.add_option(OptNumber::URI_PATH, OptValue::Str("a")).unwrap();
    // 9 -> 21 needs no fencepost anymore
    assert_eqb_iter!(&p.storage[..p.end_of_options],
                     [0b1001_0001, b'a', 0b1100_0000]);
    assert_eq!(p.options().count(), 2);

    p.remove_option(OptNumber::URI_PATH).unwrap();
    assert_eqb_iter!(&p.storage[..p.end_of_options], [0b1110_0000, 0b0111_0000]);
    deltas_ok(&p);
  }

  #[test]
  fn any_insertion_order_gives_the_same_bytes() {
    let opts: [(OptNumber, OptValue<'static>); 6] =
      [(OptNumber::CONTENT_TYPE, OptValue::Uint(0)),
       (OptNumber::URI_HOST, OptValue::Str("host")),
       (OptNumber::URI_PATH, OptValue::Str("a/b")),
       (OptNumber::TOKEN, OptValue::Opaque(&[1, 2])),
       (OptNumber::URI_QUERY, OptValue::Str("q")),
       (OptNumber::IF_NONE_MATCH, OptValue::Empty)];

    let mut reference = CoapPacket::new();
    opts.iter()
        .for_each(|(n, v)| reference.add_option(*n, *v).unwrap());

    for order in opts.iter().permutations(opts.len()) {
      let mut p = CoapPacket::new();
      for (n, v) in order {
        p.add_option(*n, *v).unwrap();
        deltas_ok(&p);
      }
      assert_eq!(p, reference);
    }
  }

  #[test]
  fn removing_in_any_order_stays_encodable() {
    let all = [OptNumber::MAX_AGE,
               OptNumber::LOCATION_PATH,
               OptNumber::OBSERVE,
               OptNumber::URI_QUERY,
               OptNumber::CONDITION,
               OptNumber::IF_NONE_MATCH];

    for order in all.iter().permutations(all.len()) {
      let mut p = CoapPacket::new();
      p.set_max_age(30).unwrap();
      p.set_location_path("x/y").unwrap();
      p.set_observe(7).unwrap();
      p.set_uri_query("a&b").unwrap();
      p.add_condition(&[0b0010_0000, 5]).unwrap();
      p.add_option(OptNumber::IF_NONE_MATCH, OptValue::Empty).unwrap();

      for n in order {
        p.remove_option(*n).unwrap();
        assert!(!p.is_set(*n));
        deltas_ok(&p);
      }
      assert_eq!(p.end_of_options, 0);
    }
  }

  #[test]
  fn remove_unset_is_noop() {
    let mut p = CoapPacket::new();
    p.set_uri_path("a").unwrap();
    let before = p;
    assert_eq!(p.remove_option(OptNumber::ETAG), Ok(()));
    assert_eq!(p, before);
    assert_eq!(p.remove_option(OptNumber(22)), Err(Error::UnknownOpt));
  }

  #[test]
  fn api_misuse() {
    let mut p = CoapPacket::new();
    assert_eq!(p.add_option(OptNumber(22), OptValue::Uint(1)),
               Err(Error::UnknownOpt));
    assert_eq!(p.add_option(OptNumber(16), OptValue::Uint(1)),
               Err(Error::UnknownOpt));
    assert_eq!(p.add_option(OptNumber::FENCEPOST, OptValue::Empty),
               Err(Error::UnknownOpt));
    assert_eq!(p.add_option(OptNumber::URI_PATH, OptValue::Uint(1)),
               Err(Error::WrongType));
    assert_eq!(p.get_uint(OptNumber::MAX_AGE), Err(Error::OptNotSet));
    assert_eq!(p.get_uint(OptNumber::URI_HOST), Err(Error::WrongType));
    assert_eq!(p.add_option(OptNumber::URI_HOST, OptValue::Str("")),
               Err(Error::EmptyStringOption));
    assert_eq!(p.add_option(OptNumber::ETAG, OptValue::Opaque(&[0; 9])),
               Err(Error::OptTooLong));
    assert_eq!(p.add_option(OptNumber::CONTENT_TYPE, OptValue::Uint(0x1_0000)),
               Err(Error::OptTooLong));

    p.add_option(OptNumber::MAX_AGE, OptValue::Uint(5)).unwrap();
    assert_eq!(p.add_option(OptNumber::MAX_AGE, OptValue::Uint(6)),
               Err(Error::OptAlreadySet));
    p.set_option(OptNumber::MAX_AGE, OptValue::Uint(6)).unwrap();
    assert_eq!(p.get_uint(OptNumber::MAX_AGE), Ok(6));
  }

  #[test]
  fn uint_is_minimal() {
    let mut p = CoapPacket::new();
    p.set_max_age(0).unwrap();
    assert_eqb_iter!(&p.storage[..p.end_of_options], [0b0010_0000]);
    p.set_max_age(0x0100).unwrap();
    assert_eqb_iter!(&p.storage[..p.end_of_options], [0b0010_0010, 1, 0]);
    assert_eq!(p.max_age(), 0x0100);
  }

  #[test]
  fn long_string_option() {
    let host = "a-rather-long-hostname.example";
    let mut p = CoapPacket::new();
    p.set_uri_host(host).unwrap();
    assert_eq!(p.storage[0], 0b0101_1111);
    assert_eq!(p.storage[1] as usize, host.len() - 15);
    assert_eq!(p.uri_host().unwrap().as_str(), host);
  }

  #[test]
  fn capacity_boundary_leaves_packet_intact() {
    let mut p = Small::new();
    p.set_data(b"hello").unwrap();
    p.set_uri_path("abcdef").unwrap();

    let mut before = [0u8; 32];
    let before_len = p.serialize(&mut before).unwrap();

    assert_eq!(p.add_option(OptNumber::URI_QUERY, OptValue::Str("toolong")),
               Err(Error::NoMem));
    assert_eq!(p.set_data(b"much too long a payload"), Err(Error::NoMem));

    let mut after = [0u8; 32];
    let after_len = p.serialize(&mut after).unwrap();
    assert_eq!(before[..before_len], after[..after_len]);
  }

  #[test]
  fn copies_are_independent() {
    let mut a = CoapPacket::new();
    a.set_uri_path("a/b").unwrap();
    let mut b = a;
    b.set_uri_path("c").unwrap();
    b.set_content_type(ContentFormat::Json).unwrap();

    assert_eq!(a.uri_path().unwrap().as_str(), "a/b");
    assert_eq!(b.uri_path().unwrap().as_str(), "c");
    assert_eq!(a.content_type(), None);
  }

  #[test]
  fn repeatable_segments() {
    let mut p = CoapPacket::new();
    p.set_uri_path("/a//b/c").unwrap();
    assert_eq!(p.segments(OptNumber::URI_PATH).collect::<Vec<_>>(),
               vec![&b"a"[..], b"b", b"c"]);
    p.add_uri_query("x=1").unwrap();
    p.add_uri_query("y=2").unwrap();
    assert_eq!(p.uri_query().unwrap().as_str(), "x=1&y=2");
  }
}

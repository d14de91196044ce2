use crate::opt::next_fencepost_delta;

/// Length nibble announcing an extra length byte
pub(crate) const LONG_OPTION: u8 = 15;

/// Ends the option list when the header's option count is 15
pub(crate) const END_OF_OPTIONS: u8 = 0xF0;

/// Where one encoded option occurrence lives in the arena
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawOpt {
  /// offset of the header byte
  pub(crate) at: usize,
  pub(crate) number: u16,
  /// value bytes are `start..end`
  pub(crate) start: usize,
  pub(crate) end: usize,
}

impl RawOpt {
  pub(crate) fn len(&self) -> usize {
    self.end - self.start
  }
}

/// Walks delta-encoded options, accumulating option numbers.
///
/// Stops at the first header that would run past the end of `bytes`.
#[derive(Clone, Debug)]
pub(crate) struct RawOpts<'a> {
  bytes: &'a [u8],
  at: usize,
  number: u16,
}

impl<'a> RawOpts<'a> {
  pub(crate) fn new(bytes: &'a [u8]) -> Self {
    Self { bytes,
           at: 0,
           number: 0 }
  }
}

impl<'a> Iterator for RawOpts<'a> {
  type Item = RawOpt;

  fn next(&mut self) -> Option<RawOpt> {
    let header = *self.bytes.get(self.at)?;
    let (len, start) = match header & 0x0f {
      | LONG_OPTION => (*self.bytes.get(self.at + 1)? as usize + 15, self.at + 2),
      | n => (n as usize, self.at + 1),
    };

    let end = start + len;
    if end > self.bytes.len() {
      return None;
    }

    self.number = self.number.saturating_add((header >> 4).into());
    let opt = RawOpt { at: self.at,
                       number: self.number,
                       start,
                       end };
    self.at = end;
    Some(opt)
  }
}

/// Destination for encoded option bytes
pub(crate) trait Sink {
  fn put(&mut self, b: u8);
}

/// Counts bytes without writing them
#[derive(Debug, Default)]
pub(crate) struct Measure(pub(crate) usize);

impl Sink for Measure {
  fn put(&mut self, _: u8) {
    self.0 += 1;
  }
}

/// Writes bytes into a slice that was measured to be large enough
#[derive(Debug)]
pub(crate) struct Cursor<'a> {
  buf: &'a mut [u8],
  at: usize,
}

impl<'a> Cursor<'a> {
  pub(crate) fn new(buf: &'a mut [u8]) -> Self {
    Self { buf, at: 0 }
  }
}

impl<'a> Sink for Cursor<'a> {
  fn put(&mut self, b: u8) {
    if let Some(slot) = self.buf.get_mut(self.at) {
      *slot = b;
    }
    self.at += 1;
  }
}

/// A header of `delta` 15 and length 0 is the end-of-options marker,
/// so it is treated like an oversized delta.
pub(crate) fn needs_fencepost(delta: u16, len: usize) -> bool {
  delta > 15 || (delta == 15 && len == 0)
}

pub(crate) fn emit_opt<S: Sink>(sink: &mut S, delta: u16, value: &[u8]) {
  let delta = (delta as u8) << 4;
  match value.len() {
    | n if n >= LONG_OPTION as usize => {
      sink.put(delta | LONG_OPTION);
      sink.put((n - LONG_OPTION as usize) as u8);
    },
    | n => sink.put(delta | n as u8),
  }

  value.iter().for_each(|b| sink.put(*b));
}

/// Emit the fenceposts needed to step from option `from` to option `to`
/// (carrying `len` value bytes), returning the last number emitted.
pub(crate) fn emit_fenceposts<S: Sink>(sink: &mut S, mut from: u16, to: u16, len: usize) -> u16 {
  while needs_fencepost(to - from, len) {
    let fence = from + next_fencepost_delta(from);
    emit_opt(sink, fence - from, &[]);
    from = fence;
  }

  from
}

/// Encode the region between the option numbered `prev` and the
/// option `next` (number, value length): every segment of `number`,
/// plus whatever fenceposts keep all deltas encodable.
///
/// Returns the number of the last option emitted, from which `next`'s
/// delta must be computed.
pub(crate) fn emit_span<'v, S, I>(sink: &mut S,
                                  prev: u16,
                                  number: u16,
                                  segments: I,
                                  next: Option<(u16, usize)>)
                                  -> u16
  where S: Sink,
        I: Iterator<Item = &'v [u8]>
{
  let mut cur = prev;
  for seg in segments {
    cur = emit_fenceposts(sink, cur, number, seg.len());
    emit_opt(sink, number - cur, seg);
    cur = number;
  }

  match next {
    | Some((next, len)) => emit_fenceposts(sink, cur, next, len),
    | None => cur,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::assert_eqb_iter;

  fn encode(prev: u16, number: u16, segments: &[&[u8]], next: Option<(u16, usize)>) -> Vec<u8> {
    let mut buf = [0u8; 64];
    let mut measure = Measure::default();
    emit_span(&mut measure, prev, number, segments.iter().copied(), next);

    let mut cursor = Cursor::new(&mut buf);
    emit_span(&mut cursor, prev, number, segments.iter().copied(), next);
    buf[..measure.0].to_vec()
  }

  #[test]
  fn short_option() {
    assert_eqb_iter!(encode(0, 9, &[b"abc"], None),
                     [0b1001_0011, b'a', b'b', b'c']);
  }

  #[test]
  fn long_option_escape() {
    let value = [7u8; 20];
    let bytes = encode(0, 5, &[&value], None);
    assert_eq!(bytes[0], 0b0101_1111);
    assert_eq!(bytes[1], 5);
    assert_eq!(bytes.len(), 22);
  }

  #[test]
  fn fencepost_before_large_delta() {
    // 0 -> 21 does not fit a nibble: 0 -> 14 -> 21
    assert_eqb_iter!(encode(0, 21, &[b""], None), [0b1110_0000, 0b0111_0000]);
  }

  #[test]
  fn zero_length_delta_15_avoids_marker() {
    // 6 -> 21 with an empty value would encode as 0xF0
    assert_eqb_iter!(encode(6, 21, &[b""], None), [0b1000_0000, 0b0111_0000]);
    // with a value it is fine as is
    assert_eqb_iter!(encode(6, 21, &[b"x"], None), [0b1111_0001, b'x']);
  }

  #[test]
  fn fenceposts_towards_next() {
    // removing everything between 0 and 21
    assert_eqb_iter!(encode(0, 9, &[], Some((21, 0))), [0b1110_0000]);
    assert_eq!(encode(0, 9, &[], Some((15, 1))), Vec::<u8>::new());
  }

  #[test]
  fn walk() {
    let bytes = [0b1001_0001, b'a', 0b0000_0001, b'b', 0b1110_0000, 0b0111_0000];
    let opts = RawOpts::new(&bytes).collect::<Vec<_>>();
    assert_eq!(opts.iter().map(|o| o.number).collect::<Vec<_>>(),
               vec![9, 9, 23, 30]);
    assert_eq!(opts[1].start, 3);
    assert_eq!(opts[1].len(), 1);
  }

  #[test]
  fn walk_stops_at_truncation() {
    let bytes = [0b1001_0011, b'a'];
    assert_eq!(RawOpts::new(&bytes).count(), 0);
  }
}

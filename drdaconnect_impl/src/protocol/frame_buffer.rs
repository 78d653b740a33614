use crate::{
    protocol::dss::{
        splice_continuations, Chaining, DssType, CONTINUATION_CHUNK, DSS_HEADER_LEN, DSS_MARKER,
        MAX_DSS_LEN,
    },
    DrdaError, DrdaResult,
};
use std::{
    io::{BufRead, ErrorKind, Write},
    ops::Range,
};

/// Identifies a frame in the buffer; it is the offset of the frame's header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct FrameId(usize);

/// Token for a reserved two-byte object length, to be backfilled with `patch_length`.
#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub(crate) struct LengthMark(usize);

/// Result of a `flush`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Flushed {
    pub bytes: usize,
    pub frames: usize,
    pub continuations: usize,
    pub shrunk: bool,
}

/// How a streamed object ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamOutcome {
    Complete,
    /// The source failed or ended early; the rest of the declared length was zero-padded.
    Padded(String),
    /// The source failed during unknown-length streaming; the value was ended prematurely.
    Cut(String),
    /// The source delivered more bytes than declared; the surplus was not sent.
    Truncated,
}
impl StreamOutcome {
    pub(crate) fn is_degraded(&self) -> bool {
        *self != Self::Complete
    }
}

/// Growable byte buffer into which requests are serialized.
///
/// Frames are begun with `begin_frame`, filled with the `write_*` methods, and
/// finalized (length set, continuation headers spliced in) when the next frame is begun
/// or when the buffer is flushed.
/// Two-byte object lengths are reserved with `mark_length` and backfilled
/// with `patch_length`, in reverse order of marking.
#[derive(Debug)]
pub(crate) struct FrameBuffer {
    bytes: Vec<u8>,
    marks: Vec<usize>,
    open_frame: Option<usize>,
    secrets: Vec<Range<usize>>,
    frames: usize,
    continuations: usize,
    max_buffer_size: usize,
}

impl FrameBuffer {
    pub(crate) fn new(min_size: usize, max_buffer_size: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(min_size),
            marks: Vec::with_capacity(8),
            open_frame: None,
            secrets: Vec::new(),
            frames: 0,
            continuations: 0,
            max_buffer_size,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Starts a new frame; an open predecessor is finalized first.
    pub(crate) fn begin_frame(
        &mut self,
        dss_type: DssType,
        correlation_id: u16,
        chaining: Chaining,
    ) -> DrdaResult<FrameId> {
        self.finalize_frame()?;
        let start = self.bytes.len();
        self.bytes.extend_from_slice(&[
            0xFF,
            0xFF,
            DSS_MARKER,
            chaining.flags() | dss_type as u8,
        ]);
        self.bytes.extend_from_slice(&correlation_id.to_be_bytes());
        self.open_frame = Some(start);
        self.frames += 1;
        Ok(FrameId(start))
    }

    /// Changes the chaining flags of an already written frame.
    pub(crate) fn set_chaining(&mut self, frame: FrameId, chaining: Chaining) {
        let format = &mut self.bytes[frame.0 + 3];
        *format = (*format & 0x0F) | chaining.flags();
    }

    /// Computes the length of the open frame and, if necessary, splices in continuation headers.
    pub(crate) fn finalize_frame(&mut self) -> DrdaResult<()> {
        let Some(start) = self.open_frame.take() else {
            return Ok(());
        };
        if !self.marks.is_empty() {
            return Err(DrdaError::Impl("frame finalized with unpatched lengths"));
        }
        let frame_len = self.bytes.len() - start;
        if frame_len > MAX_DSS_LEN {
            let spliced = splice_continuations(&self.bytes[start..]);
            self.continuations += (spliced.len() - frame_len) / 2;
            for range in &mut self.secrets {
                if range.start >= start {
                    *range = spliced_offset(start, range.start)..spliced_offset(start, range.end);
                }
            }
            self.bytes.truncate(start);
            self.bytes.extend_from_slice(&spliced);
        } else {
            #[allow(clippy::cast_possible_truncation)]
            self.bytes[start..start + 2].copy_from_slice(&(frame_len as u16).to_be_bytes());
        }
        Ok(())
    }

    /// Writes the buffer to the transport and clears it.
    ///
    /// Credential bytes are overwritten before the buffer is cleared,
    /// also if the write fails.
    pub(crate) fn flush(&mut self, w: &mut dyn Write) -> DrdaResult<Flushed> {
        let finalized = self.finalize_frame();
        let result = finalized.and_then(|()| {
            w.write_all(&self.bytes)?;
            w.flush()?;
            Ok(())
        });
        let flushed = Flushed {
            bytes: self.bytes.len(),
            frames: self.frames,
            continuations: self.continuations,
            shrunk: self.clear(),
        };
        result.map(|()| flushed)
    }

    /// Drops the buffer content, e.g. after a failed request build.
    pub(crate) fn clear(&mut self) -> bool {
        self.mask_secrets();
        self.bytes.clear();
        self.marks.clear();
        self.open_frame = None;
        self.frames = 0;
        self.continuations = 0;
        if self.bytes.capacity() > self.max_buffer_size {
            self.bytes.shrink_to(self.max_buffer_size);
            true
        } else {
            false
        }
    }

    fn mask_secrets(&mut self) {
        for range in self.secrets.drain(..) {
            let end = range.end.min(self.bytes.len());
            if range.start < end {
                self.bytes[range.start..end].fill(0);
            }
        }
    }

    // primitives

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }
    pub(crate) fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }
    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Writes the bytes, padded with `pad` up to `length`; longer input is written completely.
    pub(crate) fn write_padded(&mut self, bytes: &[u8], length: usize, pad: u8) {
        self.bytes.extend_from_slice(bytes);
        for _ in bytes.len()..length {
            self.bytes.push(pad);
        }
    }

    /// Writes a two-byte length followed by the bytes.
    pub(crate) fn write_ld_bytes(&mut self, bytes: &[u8]) -> DrdaResult<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| DrdaError::Usage("value too long for a two-byte length"))?;
        self.write_u16(len);
        self.write_bytes(bytes);
        Ok(())
    }

    pub(crate) fn write_triplet_header(&mut self, length: u8, triplet_type: u8, id: u8) {
        self.bytes.extend_from_slice(&[length, triplet_type, id]);
    }

    // objects

    /// Reserves the length of a new object and writes its codepoint.
    pub(crate) fn mark_length(&mut self, codepoint: u16) -> LengthMark {
        let location = self.bytes.len();
        self.marks.push(location);
        self.bytes.extend_from_slice(&[0, 0]);
        self.write_u16(codepoint);
        LengthMark(location)
    }

    /// Backfills the length of the most recently marked object.
    ///
    /// Objects longer than 0x7FFF bytes get extended length bytes, inserted after the codepoint.
    pub(crate) fn patch_length(&mut self, mark: LengthMark) -> DrdaResult<()> {
        match self.marks.pop() {
            Some(location) if location == mark.0 => {}
            _ => return Err(DrdaError::Impl("lengths must be patched in reverse order")),
        }
        let location = mark.0;
        let length = self.bytes.len() - location;
        let extended_count = extended_length_byte_count(length as u64);
        let ll = if extended_count == 0 {
            length
        } else {
            let data_length = (length - 4) as u64;
            let tail = self.bytes.split_off(location + 4);
            self.bytes
                .extend_from_slice(&extended_length_bytes(extended_count, data_length));
            self.bytes.extend_from_slice(&tail);
            0x8000 | (extended_count + 4)
        };
        #[allow(clippy::cast_possible_truncation)]
        self.bytes[location..location + 2].copy_from_slice(&(ll as u16).to_be_bytes());
        Ok(())
    }

    /// Writes the header of an object with explicitly given length.
    pub(crate) fn write_length_and_codepoint(&mut self, length: u16, codepoint: u16) {
        self.write_u16(length);
        self.write_u16(codepoint);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn write_scalar_header(&mut self, codepoint: u16, data_length: usize) {
        self.write_length_and_codepoint((data_length + 4) as u16, codepoint);
    }
    pub(crate) fn write_scalar_u8(&mut self, codepoint: u16, value: u8) {
        self.write_scalar_header(codepoint, 1);
        self.write_u8(value);
    }
    pub(crate) fn write_scalar_u16(&mut self, codepoint: u16, value: u16) {
        self.write_scalar_header(codepoint, 2);
        self.write_u16(value);
    }
    pub(crate) fn write_scalar_i16(&mut self, codepoint: u16, value: i16) {
        self.write_scalar_header(codepoint, 2);
        self.write_i16(value);
    }
    pub(crate) fn write_scalar_i32(&mut self, codepoint: u16, value: i32) {
        self.write_scalar_header(codepoint, 4);
        self.write_i32(value);
    }
    pub(crate) fn write_scalar_i64(&mut self, codepoint: u16, value: i64) {
        self.write_scalar_header(codepoint, 8);
        self.write_i64(value);
    }
    pub(crate) fn write_scalar_bytes(&mut self, codepoint: u16, bytes: &[u8]) -> DrdaResult<()> {
        let mark = self.mark_length(codepoint);
        self.write_bytes(bytes);
        self.patch_length(mark)
    }
    pub(crate) fn write_scalar_string(&mut self, codepoint: u16, s: &str) -> DrdaResult<()> {
        self.write_scalar_bytes(codepoint, s.as_bytes())
    }
    pub(crate) fn write_scalar_padded(&mut self, codepoint: u16, s: &str, length: usize) {
        self.write_scalar_header(codepoint, std::cmp::max(length, s.len()));
        self.write_padded(s.as_bytes(), length, b' ');
    }

    /// Writes a scalar whose value is masked in the buffer after the next flush.
    pub(crate) fn write_scalar_secret(&mut self, codepoint: u16, secret: &[u8]) -> DrdaResult<()> {
        let mark = self.mark_length(codepoint);
        let start = self.bytes.len();
        self.write_bytes(secret);
        self.secrets.push(start..self.bytes.len());
        self.patch_length(mark)
    }

    /// Replaces the body of every object in the open frame with the output of `transform`.
    ///
    /// Used for encrypted object frames, where only the object bodies are enciphered.
    pub(crate) fn transform_frame_objects(
        &mut self,
        mut transform: impl FnMut(&[u8]) -> DrdaResult<Vec<u8>>,
    ) -> DrdaResult<()> {
        let start = self
            .open_frame
            .ok_or(DrdaError::Impl("no open frame to transform"))?;
        let payload = self.bytes.split_off(start + DSS_HEADER_LEN);
        let mut pos = 0;
        while pos < payload.len() {
            let (header_len, body_len, codepoint) = object_extent(&payload[pos..])?;
            let body = &payload[pos + header_len..pos + header_len + body_len];
            let transformed = transform(body)?;
            let mark = self.mark_length(codepoint);
            self.write_bytes(&transformed);
            self.patch_length(mark)?;
            pos += header_len + body_len;
        }
        Ok(())
    }

    /// Writes a large object of known or unknown length from a byte source.
    ///
    /// A frame must have been begun right before; the object is its only content.
    /// Full segments are sent to the transport as soon as it is clear that more data follows,
    /// so the source is never materialized completely.
    /// With unknown length, the object header carries no length, and the end of the
    /// value is given by the end of the frame.
    pub(crate) fn write_streamed_object(
        &mut self,
        w: &mut dyn Write,
        codepoint: u16,
        with_null_indicator: bool,
        declared_length: Option<u64>,
        source: &mut dyn BufRead,
    ) -> DrdaResult<StreamOutcome> {
        let frame_start = self
            .open_frame
            .take()
            .ok_or(DrdaError::Impl("streamed object needs an open frame"))?;
        if self.bytes.len() != frame_start + DSS_HEADER_LEN {
            return Err(DrdaError::Impl("streamed object must be the only object of its frame"));
        }

        let null_len = u64::from(with_null_indicator);
        match declared_length {
            Some(length) => {
                let data_length = length + null_len;
                let extended_count = extended_length_byte_count(data_length + 4);
                if extended_count == 0 {
                    #[allow(clippy::cast_possible_truncation)]
                    self.write_length_and_codepoint((data_length + 4) as u16, codepoint);
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    self.write_length_and_codepoint(0x8004 + extended_count as u16, codepoint);
                    let ext = extended_length_bytes(extended_count, data_length);
                    self.write_bytes(&ext);
                }
            }
            None => self.write_length_and_codepoint(0x8004, codepoint),
        }
        if with_null_indicator {
            self.write_u8(0);
        }

        let mut segment = Segment {
            start: frame_start,
            first: true,
        };
        let mut remaining = declared_length;
        let mut outcome = StreamOutcome::Complete;
        loop {
            let room = segment.start + MAX_DSS_LEN - self.bytes.len();
            let wanted = remaining.map_or(room, |r| usize::try_from(r).unwrap_or(room).min(room));

            let got = if outcome.is_degraded() {
                // zero-padding after a source failure
                let n = if remaining.is_some() { wanted } else { 0 };
                self.bytes.resize(self.bytes.len() + n, 0);
                n
            } else {
                let (n, error) = read_into(source, &mut self.bytes, wanted);
                if let Some(e) = error {
                    outcome = if remaining.is_some() {
                        StreamOutcome::Padded(e.to_string())
                    } else {
                        StreamOutcome::Cut(e.to_string())
                    };
                } else if n < wanted && remaining.is_some() {
                    outcome = StreamOutcome::Padded(format!(
                        "source ended {} bytes before the declared length",
                        remaining.unwrap_or_default() - n as u64
                    ));
                }
                n
            };
            if let Some(ref mut r) = remaining {
                *r -= got as u64;
            }

            let segment_full = self.bytes.len() == segment.start + MAX_DSS_LEN;
            let more = match remaining {
                Some(r) => r > 0,
                None if segment_full && !outcome.is_degraded() => match source.fill_buf() {
                    Ok(buf) => !buf.is_empty(),
                    Err(e) => {
                        outcome = StreamOutcome::Cut(e.to_string());
                        false
                    }
                },
                None => false,
            };
            if !more {
                if remaining.is_some()
                    && outcome == StreamOutcome::Complete
                    && source.fill_buf().map_or(false, |buf| !buf.is_empty())
                {
                    outcome = StreamOutcome::Truncated;
                }
                segment.close(&mut self.bytes, false);
                break;
            }
            if segment_full {
                segment.close(&mut self.bytes, true);
                if !segment.first {
                    self.continuations += 1;
                }
                w.write_all(&self.bytes)?;
                self.bytes.clear();
                self.bytes.extend_from_slice(&[0xFF, 0xFF]);
                segment = Segment {
                    start: 0,
                    first: false,
                };
            }
        }
        if !segment.first {
            self.continuations += 1;
        }
        if outcome.is_degraded() {
            warn!("streamed object 0x{codepoint:04X} is degraded: {outcome:?}");
        }
        Ok(outcome)
    }
}

struct Segment {
    start: usize,
    first: bool,
}
impl Segment {
    // sets the segment's length field
    fn close(&self, bytes: &mut [u8], continued: bool) {
        let len = if continued {
            0xFFFF
        } else {
            u16::try_from(bytes.len() - self.start).unwrap_or(u16::MAX)
        };
        bytes[self.start..self.start + 2].copy_from_slice(&len.to_be_bytes());
    }
}

// reads up to `wanted` bytes; bytes read before a failure are kept and counted
fn read_into(
    source: &mut dyn BufRead,
    bytes: &mut Vec<u8>,
    wanted: usize,
) -> (usize, Option<std::io::Error>) {
    let mut got = 0;
    while got < wanted {
        let available = match source.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return (got, Some(e)),
        };
        if available.is_empty() {
            break;
        }
        let n = available.len().min(wanted - got);
        bytes.extend_from_slice(&available[..n]);
        source.consume(n);
        got += n;
    }
    (got, None)
}

/// Number of extended length bytes an object of the given total size needs.
pub(crate) fn extended_length_byte_count(ddm_size: u64) -> usize {
    if ddm_size <= 0x7FFF {
        0
    } else if ddm_size <= 0x7FFF_FFFF {
        4
    } else if ddm_size <= 0x7FFF_FFFF_FFFF {
        6
    } else {
        8
    }
}

fn extended_length_bytes(count: usize, length: u64) -> Vec<u8> {
    length.to_be_bytes()[8 - count..].to_vec()
}

// (header length, body length, codepoint) of the object at the start of `bytes`
pub(crate) fn object_extent(bytes: &[u8]) -> DrdaResult<(usize, usize, u16)> {
    if bytes.len() < 4 {
        return Err(DrdaError::Impl("truncated object in frame"));
    }
    let ll = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let codepoint = u16::from_be_bytes([bytes[2], bytes[3]]);
    if ll & 0x8000 == 0 {
        return Ok((4, ll.saturating_sub(4), codepoint));
    }
    let count = (ll & 0x7FFF).saturating_sub(4);
    if bytes.len() < 4 + count || count == 0 {
        return Err(DrdaError::Impl("object without length in frame"));
    }
    let mut length = 0_usize;
    for b in &bytes[4..4 + count] {
        length = (length << 8) | usize::from(*b);
    }
    Ok((4 + count, length, codepoint))
}

// Maps an offset within a frame to its position after continuation headers were spliced in.
fn spliced_offset(frame_start: usize, offset: usize) -> usize {
    let relative = offset - frame_start;
    if relative < MAX_DSS_LEN {
        offset
    } else {
        offset + 2 * (1 + (relative - MAX_DSS_LEN) / CONTINUATION_CHUNK)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::dss::DssReader;
    use std::io::Read;

    #[test]
    fn test_nested_lengths() {
        let mut fb = FrameBuffer::new(1024, 4096);
        fb.begin_frame(DssType::Request, 1, Chaining::Unchained)
            .unwrap();
        let outer = fb.mark_length(0x1041);
        fb.write_scalar_string(0x115E, "abc").unwrap();
        fb.write_scalar_u16(0x1149, 8);
        fb.patch_length(outer).unwrap();
        fb.finalize_frame().unwrap();
        assert_eq!(
            fb.as_slice(),
            &[
                0x00, 0x17, 0xD0, 0x01, 0x00, 0x01, // header
                0x00, 0x11, 0x10, 0x41, // outer
                0x00, 0x07, 0x11, 0x5E, b'a', b'b', b'c', // EXTNAM
                0x00, 0x06, 0x11, 0x49, 0x00, 0x08 // SVRCOD
            ]
        );
    }

    #[test]
    fn test_patch_order_is_enforced() {
        let mut fb = FrameBuffer::new(64, 4096);
        fb.begin_frame(DssType::Request, 1, Chaining::Unchained)
            .unwrap();
        let outer = fb.mark_length(0x1041);
        let _inner = fb.mark_length(0x115E);
        assert!(fb.patch_length(outer).is_err());
    }

    #[test]
    fn test_extended_length() {
        let mut fb = FrameBuffer::new(64, 1 << 20);
        fb.begin_frame(DssType::Object, 1, Chaining::Unchained)
            .unwrap();
        fb.write_scalar_bytes(0x146C, &vec![7_u8; 40_000]).unwrap();
        // LL = 0x8008, codepoint, 4 extended length bytes holding 40_000
        assert_eq!(&fb.as_slice()[6..14], &[0x80, 0x08, 0x14, 0x6C, 0x00, 0x00, 0x9C, 0x40]);
        let mut wire = Vec::new();
        let flushed = fb.flush(&mut wire).unwrap();
        assert_eq!(flushed.frames, 1);
        assert_eq!(flushed.continuations, 1);
        let dss = DssReader::new(1).read_dss(&mut &wire[..]).unwrap();
        assert_eq!(dss.payload.len(), 8 + 40_000);
    }

    #[test]
    fn test_secrets_are_masked() {
        let mut fb = FrameBuffer::new(64, 4096);
        fb.begin_frame(DssType::Request, 1, Chaining::Unchained)
            .unwrap();
        fb.write_scalar_secret(0x11A1, b"P1").unwrap();
        fb.finalize_frame().unwrap();
        let secret_at = fb.len() - 2;
        assert_eq!(&fb.as_slice()[secret_at..], b"P1");
        fb.mask_secrets();
        assert_eq!(&fb.as_slice()[secret_at..], &[0, 0]);
    }

    #[test]
    fn test_flush_sends_and_clears() {
        let mut fb = FrameBuffer::new(64, 4096);
        fb.begin_frame(DssType::Request, 1, Chaining::Unchained)
            .unwrap();
        fb.write_scalar_secret(0x11A1, b"P1").unwrap();
        let mut wire = Vec::new();
        let flushed = fb.flush(&mut wire).unwrap();
        assert_eq!(flushed.bytes, 12);
        assert_eq!(&wire[10..], b"P1");
        assert!(fb.is_empty());
        assert!(fb.secrets.is_empty());
    }

    #[test]
    fn test_chaining_flags() {
        let mut fb = FrameBuffer::new(64, 4096);
        let first = fb
            .begin_frame(DssType::Request, 1, Chaining::Unchained)
            .unwrap();
        fb.write_scalar_u8(0x1149, 0);
        fb.begin_frame(DssType::Object, 1, Chaining::Unchained)
            .unwrap();
        fb.set_chaining(first, Chaining::SameCorrelator);
        fb.finalize_frame().unwrap();
        assert_eq!(fb.as_slice()[3], 0x51);
        assert_eq!(fb.as_slice()[14], 0x03);
    }

    fn streamed(declared: Option<u64>, data: &[u8], null: bool) -> (Vec<u8>, StreamOutcome) {
        let mut fb = FrameBuffer::new(64, 1 << 20);
        let mut wire = Vec::new();
        fb.begin_frame(DssType::Object, 1, Chaining::Unchained)
            .unwrap();
        let mut source = std::io::BufReader::new(data);
        let outcome = fb
            .write_streamed_object(&mut wire, 0x146C, null, declared, &mut source)
            .unwrap();
        fb.flush(&mut wire).unwrap();
        (wire, outcome)
    }

    #[test]
    fn test_streaming_unknown_length() {
        for size in [0_usize, 10, 32_756, 32_757, 32_758, 100_000] {
            let data: Vec<u8> = (0..size).map(|i| (i % 13) as u8).collect();
            let (wire, outcome) = streamed(None, &data, true);
            assert_eq!(outcome, StreamOutcome::Complete);
            let dss = DssReader::new(1).read_dss(&mut &wire[..]).unwrap();
            assert_eq!(&dss.payload[0..4], &[0x80, 0x04, 0x14, 0x6C]);
            assert_eq!(dss.payload[4], 0);
            assert_eq!(&dss.payload[5..], &data[..], "size {size}");
        }
    }

    #[test]
    fn test_streaming_known_length() {
        let data: Vec<u8> = (0..70_000).map(|i| (i % 7) as u8).collect();
        let (wire, outcome) = streamed(Some(70_000), &data, false);
        assert_eq!(outcome, StreamOutcome::Complete);
        let dss = DssReader::new(1).read_dss(&mut &wire[..]).unwrap();
        assert_eq!(&dss.payload[0..8], &[0x80, 0x08, 0x14, 0x6C, 0, 1, 0x11, 0x70]);
        assert_eq!(&dss.payload[8..], &data[..]);
    }

    struct FailingReader {
        good: usize,
    }
    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.good == 0 {
                return Err(std::io::Error::new(ErrorKind::Other, "disk on fire"));
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(1);
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_streaming_pads_on_source_failure() {
        let mut fb = FrameBuffer::new(64, 1 << 20);
        let mut wire = Vec::new();
        fb.begin_frame(DssType::Object, 1, Chaining::Unchained)
            .unwrap();
        let mut source = std::io::BufReader::new(FailingReader { good: 100 });
        let outcome = fb
            .write_streamed_object(&mut wire, 0x146C, false, Some(50_000), &mut source)
            .unwrap();
        assert!(matches!(outcome, StreamOutcome::Padded(_)));
        fb.flush(&mut wire).unwrap();
        let dss = DssReader::new(1).read_dss(&mut &wire[..]).unwrap();
        let value = &dss.payload[8..];
        assert_eq!(value.len(), 50_000);
        assert!(value[..100].iter().all(|b| *b == 1));
        assert!(value[100..].iter().all(|b| *b == 0));
    }
}

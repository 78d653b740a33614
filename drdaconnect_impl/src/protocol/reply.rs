use crate::{
    protocol::{
        codepoint::{
            self, SYNERRCD_DUP_OBJ_PRESENT, SYNERRCD_INCORRECT_EXTENDED_LEN,
            SYNERRCD_OBJ_LEN_LESS_THAN_4, SYNERRCD_OBJ_LEN_MISMATCH, SYNERRCD_OBJ_LEN_NOT_ALLOWED,
        },
        dss::{Dss, DssType},
        frame_buffer::object_extent,
    },
    DrdaError, DrdaResult,
};
use debug_ignore::DebugIgnore;
use std::collections::VecDeque;

/// Result of peeking at the next object of a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Peek {
    /// The next object starts with this codepoint.
    CodePoint(u16),
    /// The innermost open collection is completely consumed.
    EndOfCollection,
    /// The current frame is consumed and no frame with the same correlator follows.
    EndOfSameIdChain,
}

pub(crate) type Decryptor = Box<dyn Fn(&[u8]) -> DrdaResult<Vec<u8>> + Send>;

/// Read cursor over the frames of one reply chain.
///
/// Objects are addressed by their two-byte codepoint; every consumed byte is
/// accounted against the remaining length of the current frame and of each open collection.
/// The "validating" readers check lengths per value; `take` checks a whole region once
/// and hands it out for "fast" decoding.
#[derive(Debug)]
pub(crate) struct ReplyCursor {
    frames: VecDeque<Dss>,
    payload: Vec<u8>,
    pos: usize,
    same_id_follows: bool,
    collection_stack: Vec<usize>,
    ddm_scalar_len: usize,
    decryptor: Option<DebugIgnore<Decryptor>>,
}

impl ReplyCursor {
    pub(crate) fn new(frames: Vec<Dss>) -> Self {
        Self {
            frames: frames.into(),
            payload: Vec::new(),
            pos: 0,
            same_id_follows: false,
            collection_stack: Vec::with_capacity(4),
            ddm_scalar_len: 0,
            decryptor: None,
        }
    }

    /// Installs the function that deciphers encrypted object frames.
    pub(crate) fn set_decryptor(&mut self, decryptor: Decryptor) {
        self.decryptor = Some(DebugIgnore(decryptor));
    }

    fn dss_remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    /// Moves to the next frame, which must start a new same-id chain.
    pub(crate) fn start_same_id_chain_parse(&mut self) -> DrdaResult<()> {
        if self.dss_remaining() > 0 || self.same_id_follows {
            return Err(DrdaError::ChainEnd("previous reply data not completely consumed"));
        }
        self.load_next_dss()
    }

    fn load_next_dss(&mut self) -> DrdaResult<()> {
        let dss = self
            .frames
            .pop_front()
            .ok_or(DrdaError::ChainEnd("reply chain ended before the expected reply"))?;
        trace!(
            "ReplyCursor: next frame, type {:?}, correlation id {}, {} bytes",
            dss.dss_type,
            dss.correlation_id,
            dss.payload.len()
        );
        self.same_id_follows = dss.chained && dss.same_correlator;
        self.payload = if dss.dss_type == DssType::EncryptedObject {
            match self.decryptor {
                Some(ref decryptor) => decrypt_objects(&dss.payload, decryptor)?,
                None => return Err(DrdaError::Encryption("encrypted reply without negotiated key")),
            }
        } else {
            dss.payload
        };
        self.pos = 0;
        Ok(())
    }

    /// Checks that the current same-id chain is completely consumed.
    pub(crate) fn end_of_same_id_chain_data(&self) -> DrdaResult<()> {
        if !self.collection_stack.is_empty() {
            return Err(DrdaError::ChainEnd("collection not completely consumed"));
        }
        if self.dss_remaining() > 0 {
            return Err(DrdaError::ChainEnd("frame not completely consumed"));
        }
        if self.same_id_follows {
            return Err(DrdaError::ChainEnd("unexpected frame with same correlator"));
        }
        Ok(())
    }

    /// Checks that no further frames of the reply chain are left.
    pub(crate) fn end_of_chain(&self) -> DrdaResult<()> {
        self.end_of_same_id_chain_data()?;
        if self.frames.is_empty() {
            Ok(())
        } else {
            Err(DrdaError::ChainEnd("reply chain contains unexpected further replies"))
        }
    }

    /// Returns the codepoint of the next object without consuming anything.
    pub(crate) fn peek_code_point(&mut self) -> DrdaResult<Peek> {
        if let Some(&0) = self.collection_stack.last() {
            return Ok(Peek::EndOfCollection);
        }
        if self.dss_remaining() == 0 {
            if !self.collection_stack.is_empty() {
                return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
            }
            if !self.same_id_follows {
                return Ok(Peek::EndOfSameIdChain);
            }
            self.load_next_dss()?;
        }
        if self.dss_remaining() < 4 {
            return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_LESS_THAN_4));
        }
        Ok(Peek::CodePoint(u16::from_be_bytes([
            self.payload[self.pos + 2],
            self.payload[self.pos + 3],
        ])))
    }

    /// Reads the next object header; the codepoint must be `expected`.
    ///
    /// Returns the length of the object's data, which is also kept as the current scalar length.
    pub(crate) fn parse_length_and_match(&mut self, expected: u16) -> DrdaResult<usize> {
        if let Peek::CodePoint(actual) = self.peek_code_point()? {
            if actual != expected {
                return Err(DrdaError::UnexpectedCodepoint { actual, expected });
            }
        } else {
            return Err(DrdaError::RequiredObjectNotFound {
                codepoint: expected,
            });
        }
        let ll = self.read_u16()?;
        self.read_u16()?;
        let data_len = if ll & 0x8000 == 0 {
            let ll = usize::from(ll);
            if ll < 4 {
                return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_LESS_THAN_4));
            }
            ll - 4
        } else {
            match usize::from(ll & 0x7FFF) {
                4 => {
                    // streamed with unknown length: the object extends to the end of the frame
                    self.dss_remaining()
                }
                8 | 10 | 12 => {
                    let n = usize::from(ll & 0x7FFF) - 4;
                    let mut len = 0_u64;
                    for b in self.read_bytes(n)? {
                        len = (len << 8) | u64::from(b);
                    }
                    usize::try_from(len)
                        .map_err(|_| DrdaError::syntax(SYNERRCD_INCORRECT_EXTENDED_LEN))?
                }
                _ => return Err(DrdaError::syntax(SYNERRCD_INCORRECT_EXTENDED_LEN)),
            }
        };
        if data_len > self.dss_remaining()
            || self
                .collection_stack
                .last()
                .map_or(false, |top| data_len > *top)
        {
            return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
        }
        self.ddm_scalar_len = data_len;
        Ok(data_len)
    }

    /// Reads the header of a collection and opens it.
    pub(crate) fn enter_collection(&mut self, codepoint: u16) -> DrdaResult<()> {
        let len = self.parse_length_and_match(codepoint)?;
        self.collection_stack.push(len);
        Ok(())
    }

    /// Closes the innermost collection, which must be completely consumed.
    pub(crate) fn leave_collection(&mut self) -> DrdaResult<()> {
        match self.collection_stack.pop() {
            Some(0) => Ok(()),
            Some(_) => Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH)),
            None => Err(DrdaError::Impl("no open collection")),
        }
    }

    // Accounts consumed bytes against all open collections.
    fn adjust_lengths(&mut self, n: usize) -> DrdaResult<()> {
        if n > self.dss_remaining() {
            return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
        }
        for len in &mut self.collection_stack {
            *len = len
                .checked_sub(n)
                .ok_or(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH))?;
        }
        self.pos += n;
        Ok(())
    }

    /// Checks and consumes a region of `n` bytes, which is returned for fast decoding.
    pub(crate) fn take(&mut self, n: usize) -> DrdaResult<&[u8]> {
        let start = self.pos;
        self.adjust_lengths(n)?;
        Ok(&self.payload[start..start + n])
    }

    pub(crate) fn skip_bytes(&mut self, n: usize) -> DrdaResult<()> {
        self.adjust_lengths(n)
    }

    // validating readers

    pub(crate) fn read_u8(&mut self) -> DrdaResult<u8> {
        Ok(self.take(1)?[0])
    }
    pub(crate) fn read_u16(&mut self) -> DrdaResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
    pub(crate) fn read_i64(&mut self) -> DrdaResult<i64> {
        let mut a = [0_u8; 8];
        a.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(a))
    }
    pub(crate) fn read_bytes(&mut self, n: usize) -> DrdaResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    fn check_scalar_len(&self, expected: usize) -> DrdaResult<()> {
        if self.ddm_scalar_len == expected {
            Ok(())
        } else {
            Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_NOT_ALLOWED))
        }
    }

    // scalar readers: header and value

    pub(crate) fn parse_u8(&mut self, codepoint: u16) -> DrdaResult<u8> {
        self.parse_length_and_match(codepoint)?;
        self.check_scalar_len(1)?;
        self.read_u8()
    }
    pub(crate) fn parse_u16(&mut self, codepoint: u16) -> DrdaResult<u16> {
        self.parse_length_and_match(codepoint)?;
        self.check_scalar_len(2)?;
        self.read_u16()
    }
    pub(crate) fn parse_i64(&mut self, codepoint: u16) -> DrdaResult<i64> {
        self.parse_length_and_match(codepoint)?;
        self.check_scalar_len(8)?;
        self.read_i64()
    }
    /// Reads a byte string whose length must lie within `min..=max`.
    pub(crate) fn parse_bytes(&mut self, codepoint: u16, min: usize, max: usize) -> DrdaResult<Vec<u8>> {
        let len = self.parse_length_and_match(codepoint)?;
        if len < min || len > max {
            return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_NOT_ALLOWED));
        }
        self.read_bytes(len)
    }
    /// Reads a character string; trailing blanks are removed.
    pub(crate) fn parse_string(&mut self, codepoint: u16, max: usize) -> DrdaResult<String> {
        let bytes = self.parse_bytes(codepoint, 0, max)?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }

    /// Runs `handler` for each object of the innermost open collection, and closes it.
    ///
    /// The handler returns `false` for codepoints it does not know,
    /// which makes the whole reply unusable.
    pub(crate) fn do_until_collection_end(
        &mut self,
        mut handler: impl FnMut(&mut Self, u16) -> DrdaResult<bool>,
    ) -> DrdaResult<()> {
        loop {
            match self.peek_code_point()? {
                Peek::CodePoint(cp) => {
                    if !handler(self, cp)? {
                        return Err(DrdaError::ParameterNotSupported { codepoint: cp });
                    }
                }
                Peek::EndOfCollection => return self.leave_collection(),
                Peek::EndOfSameIdChain => {
                    return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
                }
            }
        }
    }
}

/// Tracks the objects that were found within one collection.
#[derive(Debug, Default)]
pub(crate) struct FoundObjects(Vec<u16>);
impl FoundObjects {
    /// Registers a found object; duplicates are a syntax error.
    pub(crate) fn found(&mut self, codepoint: u16) -> DrdaResult<()> {
        if self.0.contains(&codepoint) {
            trace!("duplicate object {}", codepoint::name(codepoint));
            Err(DrdaError::syntax(SYNERRCD_DUP_OBJ_PRESENT))
        } else {
            self.0.push(codepoint);
            Ok(())
        }
    }

    /// Fails for the first of the given codepoints that was not found.
    pub(crate) fn require(&self, codepoints: &[u16]) -> DrdaResult<()> {
        match codepoints.iter().find(|cp| !self.0.contains(cp)) {
            Some(codepoint) => Err(DrdaError::RequiredObjectNotFound {
                codepoint: *codepoint,
            }),
            None => Ok(()),
        }
    }
}

// Deciphers the data of every object in an encrypted frame.
fn decrypt_objects(payload: &[u8], decryptor: &Decryptor) -> DrdaResult<Vec<u8>> {
    let mut result = Vec::with_capacity(payload.len());
    let mut pos = 0;
    while pos < payload.len() {
        let (header_len, body_len, cp) = object_extent(&payload[pos..])?;
        let body = payload
            .get(pos + header_len..pos + header_len + body_len)
            .ok_or(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH))?;
        let clear = decryptor(body)?;
        let ddm_size = clear.len() + 4;
        if ddm_size <= 0x7FFF {
            #[allow(clippy::cast_possible_truncation)]
            result.extend_from_slice(&(ddm_size as u16).to_be_bytes());
            result.extend_from_slice(&cp.to_be_bytes());
        } else {
            result.extend_from_slice(&0x8008_u16.to_be_bytes());
            result.extend_from_slice(&cp.to_be_bytes());
            #[allow(clippy::cast_possible_truncation)]
            result.extend_from_slice(&(clear.len() as u32).to_be_bytes());
        }
        result.extend_from_slice(&clear);
        pos += header_len + body_len;
    }
    Ok(result)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::protocol::codepoint::{EXCSATRD, EXTNAM, MGRLVLLS, SRVCLSNM, SRVNAM};

    pub(crate) fn dss(payload: Vec<u8>, chained: bool, same_correlator: bool) -> Dss {
        Dss {
            dss_type: DssType::Reply,
            chained,
            same_correlator,
            correlation_id: 1,
            payload,
        }
    }

    pub(crate) fn scalar(cp: u16, data: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&u16::try_from(data.len() + 4).unwrap().to_be_bytes());
        v.extend_from_slice(&cp.to_be_bytes());
        v.extend_from_slice(data);
        v
    }

    fn excsatrd(inner: &[Vec<u8>]) -> Vec<u8> {
        scalar(EXCSATRD, &inner.concat())
    }

    // parses EXCSATRD with EXTNAM and SRVNAM required, SRVCLSNM optional
    fn parse(cursor: &mut ReplyCursor) -> DrdaResult<(String, String)> {
        cursor.start_same_id_chain_parse()?;
        cursor.enter_collection(EXCSATRD)?;
        let mut found = FoundObjects::default();
        let mut extnam = String::new();
        let mut srvnam = String::new();
        cursor.do_until_collection_end(|c, cp| {
            match cp {
                EXTNAM => {
                    found.found(cp)?;
                    extnam = c.parse_string(cp, 255)?;
                }
                SRVNAM => {
                    found.found(cp)?;
                    srvnam = c.parse_string(cp, 255)?;
                }
                SRVCLSNM => {
                    found.found(cp)?;
                    c.parse_string(cp, 255)?;
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        found.require(&[EXTNAM, SRVNAM])?;
        cursor.end_of_chain()?;
        Ok((extnam, srvnam))
    }

    #[test]
    fn test_required_fields() {
        let good = excsatrd(&[scalar(EXTNAM, b"ext"), scalar(SRVNAM, b"srv  ")]);
        let mut cursor = ReplyCursor::new(vec![dss(good, false, false)]);
        assert_eq!(parse(&mut cursor).unwrap(), ("ext".into(), "srv".into()));

        let missing = excsatrd(&[scalar(EXTNAM, b"ext"), scalar(SRVCLSNM, b"x")]);
        let mut cursor = ReplyCursor::new(vec![dss(missing, false, false)]);
        assert!(matches!(
            parse(&mut cursor),
            Err(DrdaError::RequiredObjectNotFound { codepoint: SRVNAM })
        ));
    }

    #[test]
    fn test_unknown_codepoint_is_not_skipped() {
        let unknown = excsatrd(&[
            scalar(EXTNAM, b"ext"),
            scalar(MGRLVLLS, &[0, 0]),
            scalar(SRVNAM, b"srv"),
        ]);
        let mut cursor = ReplyCursor::new(vec![dss(unknown, false, false)]);
        assert!(matches!(
            parse(&mut cursor),
            Err(DrdaError::ParameterNotSupported { codepoint: MGRLVLLS })
        ));
    }

    #[test]
    fn test_duplicates_and_bad_lengths() {
        let dup = excsatrd(&[
            scalar(EXTNAM, b"ext"),
            scalar(EXTNAM, b"ext"),
            scalar(SRVNAM, b"srv"),
        ]);
        let mut cursor = ReplyCursor::new(vec![dss(dup, false, false)]);
        assert!(matches!(
            parse(&mut cursor),
            Err(DrdaError::Syntax { code: SYNERRCD_DUP_OBJ_PRESENT })
        ));

        // inner object claims more bytes than the collection holds
        let mut broken = excsatrd(&[scalar(EXTNAM, b"ext")]);
        broken[5] = 0x20;
        let mut cursor = ReplyCursor::new(vec![dss(broken, false, false)]);
        assert!(matches!(
            parse(&mut cursor),
            Err(DrdaError::Syntax { code: SYNERRCD_OBJ_LEN_MISMATCH })
        ));
    }

    #[test]
    fn test_same_id_chain_spans_frames() {
        let first = dss(scalar(EXTNAM, b"a"), true, true);
        let second = dss(scalar(SRVNAM, b"b"), false, false);
        let mut cursor = ReplyCursor::new(vec![first, second]);
        cursor.start_same_id_chain_parse().unwrap();
        assert_eq!(cursor.peek_code_point().unwrap(), Peek::CodePoint(EXTNAM));
        cursor.parse_string(EXTNAM, 10).unwrap();
        assert_eq!(cursor.peek_code_point().unwrap(), Peek::CodePoint(SRVNAM));
        cursor.parse_string(SRVNAM, 10).unwrap();
        assert_eq!(cursor.peek_code_point().unwrap(), Peek::EndOfSameIdChain);
        cursor.end_of_chain().unwrap();
    }

    #[test]
    fn test_new_chain_needs_explicit_start() {
        let first = dss(scalar(EXTNAM, b"a"), true, false);
        let second = dss(scalar(SRVNAM, b"b"), false, false);
        let mut cursor = ReplyCursor::new(vec![first, second]);
        cursor.start_same_id_chain_parse().unwrap();
        cursor.parse_string(EXTNAM, 10).unwrap();
        assert_eq!(cursor.peek_code_point().unwrap(), Peek::EndOfSameIdChain);
        assert!(cursor.end_of_chain().is_err());
        cursor.start_same_id_chain_parse().unwrap();
        assert_eq!(cursor.parse_string(SRVNAM, 10).unwrap(), "b");
        cursor.end_of_chain().unwrap();
    }

    #[test]
    fn test_extended_and_streamed_lengths() {
        let data = vec![9_u8; 40_000];
        let mut obj = vec![0x80, 0x08, 0x14, 0x6C];
        obj.extend_from_slice(&40_000_u32.to_be_bytes());
        obj.extend_from_slice(&data);
        let mut cursor = ReplyCursor::new(vec![dss(obj, false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        assert_eq!(cursor.parse_length_and_match(0x146C).unwrap(), 40_000);
        assert_eq!(cursor.take(40_000).unwrap().len(), 40_000);

        let mut streamed = vec![0x80, 0x04, 0x14, 0x6C];
        streamed.extend_from_slice(&data);
        let mut cursor = ReplyCursor::new(vec![dss(streamed, false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        assert_eq!(cursor.parse_length_and_match(0x146C).unwrap(), 40_000);
    }

    #[test]
    fn test_scalar_length_is_checked() {
        let mut cursor = ReplyCursor::new(vec![dss(scalar(0x1149, &[0, 0, 8]), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        assert!(matches!(
            cursor.parse_u16(0x1149),
            Err(DrdaError::Syntax { code: SYNERRCD_OBJ_LEN_NOT_ALLOWED })
        ));
    }
}

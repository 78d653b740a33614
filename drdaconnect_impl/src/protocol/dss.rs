//! Data stream structures (DSS), the frames of the wire protocol.
//!
//! ```text
//! Offset  Len  Field
//! 0       2    length, including the header; 0x8000 flags "continued"
//! 2       1    0xD0
//! 3       1    format: chaining flags | DSS type
//! 4       2    request correlation id
//! ```
//!
//! A frame with more than [`MAX_DSS_LEN`] bytes is split into a first segment
//! of exactly `MAX_DSS_LEN` bytes (its length field set to 0xFFFF) and
//! continuation segments, each prefixed with a two-byte length that counts itself.
use crate::{protocol::codepoint, DrdaError, DrdaResult};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

/// Size of a DSS header.
pub(crate) const DSS_HEADER_LEN: usize = 6;
/// Maximum length of one physical segment, header included.
pub(crate) const MAX_DSS_LEN: usize = 32_767;
/// Payload bytes carried by a full continuation segment.
pub(crate) const CONTINUATION_CHUNK: usize = MAX_DSS_LEN - 2;

pub(crate) const DSS_MARKER: u8 = 0xD0;
pub(crate) const CONTINUATION_FLAG: u16 = 0x8000;

// format byte
pub(crate) const GDSCHAIN: u8 = 0x40;
pub(crate) const GDSCHAIN_CONTINUE_ON_ERROR: u8 = 0x20;
pub(crate) const GDSCHAIN_SAME_ID: u8 = 0x10;
const TYPE_MASK: u8 = 0x0F;

/// The kinds of frames.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DssType {
    Request = 1,
    Reply = 2,
    Object = 3,
    EncryptedObject = 4,
}
impl DssType {
    fn from_format(format: u8) -> DrdaResult<Self> {
        match format & TYPE_MASK {
            2 => Ok(Self::Reply),
            3 => Ok(Self::Object),
            4 => Ok(Self::EncryptedObject),
            _ => Err(DrdaError::syntax(codepoint::SYNERRCD_FBYTE_NOT_SUPPORTED)),
        }
    }
}

/// How a frame is linked to its successor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Chaining {
    /// Last frame of the chain.
    Unchained,
    /// Another frame follows, with the next correlation id.
    DifferentCorrelator,
    /// Another frame follows, with the same correlation id.
    SameCorrelator,
}
impl Chaining {
    pub(crate) fn flags(self) -> u8 {
        match self {
            Self::Unchained => 0,
            Self::DifferentCorrelator => GDSCHAIN,
            Self::SameCorrelator => GDSCHAIN | GDSCHAIN_SAME_ID,
        }
    }
}

/// Inserts continuation headers into a single, already finalized-in-place DSS.
///
/// `dss` must start with the 6-byte header; its length field is overwritten.
/// If the frame fits into one segment, the result is the input with the correct length.
/// Otherwise, the first segment carries `MAX_DSS_LEN` bytes and length 0xFFFF,
/// and the remaining bytes are cut into chunks of at most `CONTINUATION_CHUNK` bytes,
/// each preceded by a two-byte length that includes itself.
/// All but the last continuation length are 0xFFFF.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn splice_continuations(dss: &[u8]) -> Vec<u8> {
    let total = dss.len();
    if total <= MAX_DSS_LEN {
        let mut result = dss.to_vec();
        result[0..2].copy_from_slice(&(total as u16).to_be_bytes());
        return result;
    }

    let overflow = total - MAX_DSS_LEN;
    let continuation_count = overflow.div_ceil(CONTINUATION_CHUNK);
    let mut result = Vec::<u8>::with_capacity(total + 2 * continuation_count);
    result.extend_from_slice(&dss[..MAX_DSS_LEN]);
    result[0] = 0xFF;
    result[1] = 0xFF;

    let mut chunks = dss[MAX_DSS_LEN..].chunks(CONTINUATION_CHUNK).peekable();
    while let Some(chunk) = chunks.next() {
        let header: u16 = if chunks.peek().is_some() {
            0xFFFF
        } else {
            (chunk.len() + 2) as u16
        };
        result.extend_from_slice(&header.to_be_bytes());
        result.extend_from_slice(chunk);
    }
    result
}

/// One received frame, with continuation segments already stripped.
#[derive(Debug)]
pub(crate) struct Dss {
    pub dss_type: DssType,
    pub chained: bool,
    pub same_correlator: bool,
    pub correlation_id: u16,
    pub payload: Vec<u8>,
}

/// Reads and validates frames of a reply chain.
#[derive(Debug)]
pub(crate) struct DssReader {
    expected_correlation_id: u16,
    continuation_segments: usize,
}
impl DssReader {
    pub(crate) fn new(first_correlation_id: u16) -> Self {
        Self {
            expected_correlation_id: first_correlation_id,
            continuation_segments: 0,
        }
    }

    /// Number of continuation segments seen so far.
    pub(crate) fn continuation_segments(&self) -> usize {
        self.continuation_segments
    }

    /// Reads frames until one arrives that is not chained to a successor.
    pub(crate) fn read_chain(&mut self, rdr: &mut dyn Read) -> DrdaResult<Vec<Dss>> {
        let mut chain = Vec::<Dss>::new();
        loop {
            let dss = self.read_dss(rdr)?;
            let chained = dss.chained;
            chain.push(dss);
            if !chained {
                return Ok(chain);
            }
        }
    }

    /// Reads a single frame including its continuation segments.
    pub(crate) fn read_dss(&mut self, rdr: &mut dyn Read) -> DrdaResult<Dss> {
        let raw_length = rdr.read_u16::<BigEndian>()?;
        let (mut length, mut continued) = if raw_length & CONTINUATION_FLAG == 0 {
            (usize::from(raw_length), false)
        } else {
            (MAX_DSS_LEN, true)
        };
        if length < DSS_HEADER_LEN {
            return Err(DrdaError::syntax(codepoint::SYNERRCD_DSS_LESS_THAN_6));
        }
        if rdr.read_u8()? != DSS_MARKER {
            return Err(DrdaError::syntax(codepoint::SYNERRCD_CBYTE_NOT_D0));
        }
        let format = rdr.read_u8()?;
        let dss_type = DssType::from_format(format)?;

        let chained = format & GDSCHAIN != 0;
        let same_correlator = format & GDSCHAIN_SAME_ID != 0;
        if !chained {
            if same_correlator {
                return Err(DrdaError::syntax(
                    codepoint::SYNERRCD_CHAIN_OFF_SAME_NEXT_CORRELATOR,
                ));
            }
            if format & GDSCHAIN_CONTINUE_ON_ERROR != 0 {
                return Err(DrdaError::syntax(
                    codepoint::SYNERRCD_CHAIN_OFF_ERROR_CONTINUE,
                ));
            }
        }

        let correlation_id = rdr.read_u16::<BigEndian>()?;
        if correlation_id != self.expected_correlation_id && correlation_id != 0xFFFF {
            return Err(DrdaError::syntax(codepoint::SYNERRCD_INVALID_CORRELATOR));
        }
        self.expected_correlation_id = match (chained, same_correlator) {
            (true, true) => self.expected_correlation_id,
            (true, false) => self.expected_correlation_id.wrapping_add(1),
            (false, _) => 1,
        };

        length -= DSS_HEADER_LEN;
        let mut payload = Vec::<u8>::with_capacity(length);
        loop {
            let start = payload.len();
            payload.resize(start + length, 0);
            rdr.read_exact(&mut payload[start..])?;
            if !continued {
                break;
            }
            let continuation = rdr.read_u16::<BigEndian>()?;
            self.continuation_segments += 1;
            if continuation & CONTINUATION_FLAG == 0 {
                continued = false;
                length = usize::from(continuation);
            } else {
                length = MAX_DSS_LEN;
            }
            if length <= 2 {
                return Err(DrdaError::syntax(
                    codepoint::SYNERRCD_DSS_CONT_LESS_OR_EQUAL_2,
                ));
            }
            length -= 2;
        }
        trace!(
            "received DSS: type {:?}, correlation id {}, {} payload bytes, chained: {}",
            dss_type,
            correlation_id,
            payload.len(),
            chained
        );

        Ok(Dss {
            dss_type,
            chained,
            same_correlator,
            correlation_id,
            payload,
        })
    }
}

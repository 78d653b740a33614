use crate::{
    protocol::codepoint::{NULLDATA, SYNERRCD_OBJ_LEN_MISMATCH},
    DrdaError, DrdaResult,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// Reader for FD:OCA encoded data within an already length-checked region.
///
/// Running out of data means that a value lies partly outside of the region;
/// this is reported as a length mismatch (see `is_truncation`).
#[derive(Debug)]
pub(crate) struct FdocaReader<'a> {
    rdr: Cursor<&'a [u8]>,
}

impl<'a> FdocaReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            rdr: Cursor::new(bytes),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn position(&self) -> usize {
        self.rdr.position() as usize
    }

    pub(crate) fn remaining(&self) -> usize {
        self.rdr.get_ref().len() - self.position()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn u8(&mut self) -> DrdaResult<u8> {
        self.rdr.read_u8().map_err(|_| truncated())
    }
    pub(crate) fn u16(&mut self) -> DrdaResult<u16> {
        self.rdr.read_u16::<BigEndian>().map_err(|_| truncated())
    }
    pub(crate) fn i16(&mut self) -> DrdaResult<i16> {
        self.rdr.read_i16::<BigEndian>().map_err(|_| truncated())
    }
    pub(crate) fn i32(&mut self) -> DrdaResult<i32> {
        self.rdr.read_i32::<BigEndian>().map_err(|_| truncated())
    }
    pub(crate) fn i64(&mut self) -> DrdaResult<i64> {
        self.rdr.read_i64::<BigEndian>().map_err(|_| truncated())
    }
    pub(crate) fn f32(&mut self) -> DrdaResult<f32> {
        self.rdr.read_f32::<BigEndian>().map_err(|_| truncated())
    }
    pub(crate) fn f64(&mut self) -> DrdaResult<f64> {
        self.rdr.read_f64::<BigEndian>().map_err(|_| truncated())
    }

    pub(crate) fn bytes(&mut self, n: usize) -> DrdaResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(truncated());
        }
        let start = self.position();
        self.rdr.set_position((start + n) as u64);
        Ok(&self.rdr.get_ref()[start..start + n])
    }

    pub(crate) fn skip(&mut self, n: usize) -> DrdaResult<()> {
        self.bytes(n).map(|_| ())
    }

    /// Reads a fixed-length character field.
    pub(crate) fn string(&mut self, n: usize) -> DrdaResult<String> {
        utf8(self.bytes(n)?.to_vec())
    }

    /// Reads a variable character string with two-byte length.
    pub(crate) fn vcs(&mut self) -> DrdaResult<String> {
        let len = usize::from(self.u16()?);
        self.string(len)
    }

    /// Reads a byte string with two-byte length; empty strings are returned as `None`.
    pub(crate) fn ld_bytes(&mut self) -> DrdaResult<Option<&'a [u8]>> {
        let len = usize::from(self.u16()?);
        if len == 0 {
            Ok(None)
        } else {
            self.bytes(len).map(Some)
        }
    }

    /// Reads a null indicator; returns true if the following group or value is null.
    pub(crate) fn is_null(&mut self) -> DrdaResult<bool> {
        Ok(self.u8()? == NULLDATA)
    }

    /// Reads a pair of mixed and single-byte strings without null indicators;
    /// at most one of the two lengths can be non-zero.
    pub(crate) fn vcm_or_vcs(&mut self) -> DrdaResult<Option<String>> {
        let vcm_len = usize::from(self.u16()?);
        let vcm = if vcm_len > 0 {
            Some(self.string(vcm_len)?)
        } else {
            None
        };
        let vcs_len = usize::from(self.u16()?);
        if vcs_len == 0 {
            return Ok(vcm);
        }
        if vcm.is_some() {
            return Err(impl_err!("only one of VCM, VCS can have a length greater than 0"));
        }
        self.string(vcs_len).map(Some)
    }

    /// Reads a pair of nullable mixed and single-byte strings, of which at most one is set.
    pub(crate) fn nvcm_or_nvcs(&mut self) -> DrdaResult<Option<String>> {
        if self.is_null()? {
            if self.is_null()? {
                Ok(None)
            } else {
                self.vcs().map(|s| Some(s).filter(|s| !s.is_empty()))
            }
        } else {
            let s = self.vcs()?;
            if !self.is_null()? {
                return Err(impl_err!("only one of NVCM, NVCS can be non-null"));
            }
            Ok(Some(s).filter(|s| !s.is_empty()))
        }
    }
}

/// Converts character data from the server, which are UTF-8 (CCSID 1208).
pub(crate) fn utf8(bytes: Vec<u8>) -> DrdaResult<String> {
    String::from_utf8(bytes).map_err(|e| impl_err!("received character data are not UTF-8: {e}"))
}

pub(crate) fn truncated() -> DrdaError {
    DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH)
}

/// True if the error was caused by data ending within a value.
pub(crate) fn is_truncation(e: &DrdaError) -> bool {
    matches!(e, DrdaError::Syntax { code } if *code == SYNERRCD_OBJ_LEN_MISMATCH)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nullable_strings() {
        let bytes = [
            0x00, 0x00, 0x02, b'h', b'i', 0xFF, // NVCM set
            0xFF, 0x00, 0x00, 0x01, b'x', // NVCS set
            0xFF, 0xFF, // both null
        ];
        let mut rdr = FdocaReader::new(&bytes);
        assert_eq!(rdr.nvcm_or_nvcs().unwrap().as_deref(), Some("hi"));
        assert_eq!(rdr.nvcm_or_nvcs().unwrap().as_deref(), Some("x"));
        assert_eq!(rdr.nvcm_or_nvcs().unwrap(), None);
        assert!(rdr.is_at_end());
    }

    #[test]
    fn test_strings_without_indicators() {
        let bytes = [
            0x00, 0x02, b'h', b'i', 0x00, 0x00, // VCM set
            0x00, 0x00, 0x00, 0x01, b'x', // VCS set
            0x00, 0x00, 0x00, 0x00, // both empty
        ];
        let mut rdr = FdocaReader::new(&bytes);
        assert_eq!(rdr.vcm_or_vcs().unwrap().as_deref(), Some("hi"));
        assert_eq!(rdr.vcm_or_vcs().unwrap().as_deref(), Some("x"));
        assert_eq!(rdr.vcm_or_vcs().unwrap(), None);
        assert!(rdr.is_at_end());

        let both = [0x00, 0x01, b'a', 0x00, 0x01, b'b'];
        assert!(matches!(
            FdocaReader::new(&both).vcm_or_vcs(),
            Err(DrdaError::ImplDetailed(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut rdr = FdocaReader::new(&[0x00, 0x02, 0xC3, 0x28]);
        assert!(matches!(rdr.vcs(), Err(DrdaError::ImplDetailed(_))));
    }

    #[test]
    fn test_truncation() {
        let mut rdr = FdocaReader::new(&[0x00, 0x05, b'a']);
        let e = rdr.vcs().unwrap_err();
        assert!(is_truncation(&e));
    }
}

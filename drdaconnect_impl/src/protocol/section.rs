use crate::{
    protocol::{
        codepoint::{PKGNAMCSN, SYNERRCD_OBJ_LEN_MISMATCH},
        frame_buffer::FrameBuffer,
        reply::ReplyCursor,
    },
    DrdaError, DrdaResult,
};
use std::borrow::Cow;

const FIXED_NAME_LENGTH: usize = 18;
const CONSISTENCY_TOKEN: &[u8; 8] = b"SYSLVL01";
const COLLECTION: &str = "NULLID";
// dynamic packages, with and without cursor holdability
const HOLD_PACKAGE: &str = "SYSSH200";
const NO_HOLD_PACKAGE: &str = "SYSSN200";
/// Number of sections per package.
pub(crate) const SECTIONS_PER_PACKAGE: u16 = 1_000;

/// Identifies a unit of precompiled work on the server: a package name plus a slot number.
///
/// A `Section` is referenced by every execute, describe, fetch or close of its statement,
/// and released when the statement is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    package: Cow<'static, str>,
    number: u16,
}

impl Section {
    fn new(holdable: bool, number: u16) -> Self {
        Self {
            package: Cow::Borrowed(if holdable { HOLD_PACKAGE } else { NO_HOLD_PACKAGE }),
            number,
        }
    }

    /// The package name.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The section number within the package.
    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn is_holdable(&self) -> bool {
        self.package == HOLD_PACKAGE
    }

    /// The cursor name that the server derives from the section.
    pub fn cursor_name(&self) -> String {
        format!("SQL_CUR{}C{}", if self.is_holdable() { "H" } else { "N" }, self.number)
    }

    /// Writes the PKGNAMCSN parameter.
    ///
    /// If all names fit into 18 bytes, the fixed layout is used, otherwise
    /// every name is preceded by its length.
    pub(crate) fn write_pkgnamcsn(&self, fb: &mut FrameBuffer, rdb_name: &str) -> DrdaResult<()> {
        let mark = fb.mark_length(PKGNAMCSN);
        let names = [rdb_name, COLLECTION, self.package()];
        if names.iter().all(|n| n.len() <= FIXED_NAME_LENGTH) {
            for name in names {
                fb.write_padded(name.as_bytes(), FIXED_NAME_LENGTH, b' ');
            }
        } else {
            for name in names {
                let length = name.len().max(FIXED_NAME_LENGTH);
                fb.write_u16(u16::try_from(length).map_err(|_| usage_err!("name {name} is too long"))?);
                fb.write_padded(name.as_bytes(), length, b' ');
            }
        }
        fb.write_bytes(CONSISTENCY_TOKEN);
        fb.write_u16(self.number);
        fb.patch_length(mark)
    }

    /// Reads a PKGNAMCSN parameter, in fixed or in length-prefixed layout.
    ///
    /// Database name and collection are not kept.
    pub(crate) fn parse_pkgnamcsn(cursor: &mut ReplyCursor) -> DrdaResult<Self> {
        let len = cursor.parse_length_and_match(PKGNAMCSN)?;
        let trailer = CONSISTENCY_TOKEN.len() + 2;
        let package = if len == 3 * FIXED_NAME_LENGTH + trailer {
            cursor.skip_bytes(2 * FIXED_NAME_LENGTH)?;
            trimmed(cursor.take(FIXED_NAME_LENGTH)?)
        } else {
            let mut consumed = trailer;
            let mut package = String::new();
            for _ in 0..3 {
                let n = usize::from(cursor.read_u16()?);
                consumed += 2 + n;
                if consumed > len {
                    return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
                }
                package = trimmed(cursor.take(n)?);
            }
            if consumed != len {
                return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_MISMATCH));
            }
            package
        };
        cursor.skip_bytes(CONSISTENCY_TOKEN.len())?;
        let number = cursor.read_u16()?;
        Ok(Self {
            package: Cow::Owned(package),
            number,
        })
    }
}

fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.package, self.number)
    }
}

/// Hands out free section numbers, separately for holdable and non-holdable cursors.
///
/// Section number 1 of each package is reserved for immediate execution.
#[derive(Debug)]
pub(crate) struct SectionManager {
    holdable: Pool,
    not_holdable: Pool,
}

#[derive(Debug)]
struct Pool {
    next: u16,
    freed: Vec<u16>,
}
impl Pool {
    fn new() -> Self {
        Self {
            next: 2,
            freed: Vec::new(),
        }
    }
    fn take(&mut self) -> DrdaResult<u16> {
        if let Some(number) = self.freed.pop() {
            return Ok(number);
        }
        if self.next > SECTIONS_PER_PACKAGE {
            return Err(usage_err!(
                "all {SECTIONS_PER_PACKAGE} sections are in use; close statements"
            ));
        }
        self.next += 1;
        Ok(self.next - 1)
    }
}

impl SectionManager {
    pub(crate) fn new() -> Self {
        Self {
            holdable: Pool::new(),
            not_holdable: Pool::new(),
        }
    }

    /// The section used for statements that are executed immediately.
    pub(crate) fn immediate_section(holdable: bool) -> Section {
        Section::new(holdable, 1)
    }

    /// Allocates a section for a statement to be prepared.
    pub(crate) fn allocate(&mut self, holdable: bool) -> DrdaResult<Section> {
        let pool = if holdable {
            &mut self.holdable
        } else {
            &mut self.not_holdable
        };
        Ok(Section::new(holdable, pool.take()?))
    }

    /// Returns a section for reuse.
    pub(crate) fn free(&mut self, section: &Section) {
        if section.number < 2 {
            return;
        }
        let pool = if section.is_holdable() {
            &mut self.holdable
        } else {
            &mut self.not_holdable
        };
        if !pool.freed.contains(&section.number) {
            pool.freed.push(section.number);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_allocation_and_reuse() {
        let mut sm = SectionManager::new();
        let a = sm.allocate(true).unwrap();
        let b = sm.allocate(true).unwrap();
        let c = sm.allocate(false).unwrap();
        assert_eq!((a.number(), b.number(), c.number()), (2, 3, 2));
        assert_eq!(a.package(), "SYSSH200");
        assert_eq!(c.package(), "SYSSN200");
        sm.free(&a);
        assert_eq!(sm.allocate(true).unwrap(), a);
        assert_eq!(b.cursor_name(), "SQL_CURHC3");
    }

    #[test]
    fn test_fixed_pkgnamcsn() {
        let mut fb = FrameBuffer::new(128, 1024);
        let section = SectionManager::immediate_section(true);
        section.write_pkgnamcsn(&mut fb, "SAMPLE").unwrap();
        let bytes = fb.as_slice();
        assert_eq!(bytes.len(), 68);
        assert_eq!(&bytes[0..4], &[0x00, 0x44, 0x21, 0x13]);
        assert_eq!(&bytes[4..10], b"SAMPLE");
        assert_eq!(&bytes[22..28], b"NULLID");
        assert_eq!(&bytes[40..48], b"SYSSH200");
        assert_eq!(&bytes[58..66], b"SYSLVL01");
        assert_eq!(&bytes[66..68], &[0x00, 0x01]);
    }

    #[test]
    fn test_long_rdb_name() {
        let mut fb = FrameBuffer::new(128, 1024);
        let section = SectionManager::immediate_section(false);
        section
            .write_pkgnamcsn(&mut fb, "A_VERY_LONG_DATABASE_NAME")
            .unwrap();
        let bytes = fb.as_slice();
        assert_eq!(&bytes[4..6], &[0x00, 25]);
        assert_eq!(&bytes[6..31], b"A_VERY_LONG_DATABASE_NAME");
        assert_eq!(&bytes[31..33], &[0x00, 18]);
        assert_eq!(bytes.len(), 4 + 27 + 20 + 20 + 8 + 2);
    }

    #[test]
    fn test_parse_pkgnamcsn() {
        use crate::protocol::reply::test::dss;

        for rdb_name in ["SAMPLE", "A_VERY_LONG_DATABASE_NAME"] {
            let mut fb = FrameBuffer::new(128, 1024);
            let section = SectionManager::new().allocate(false).unwrap();
            section.write_pkgnamcsn(&mut fb, rdb_name).unwrap();
            let mut cursor = ReplyCursor::new(vec![dss(fb.as_slice().to_vec(), false, false)]);
            cursor.start_same_id_chain_parse().unwrap();
            let parsed = Section::parse_pkgnamcsn(&mut cursor).unwrap();
            assert_eq!(parsed, section);
            cursor.end_of_chain().unwrap();
        }
    }
}

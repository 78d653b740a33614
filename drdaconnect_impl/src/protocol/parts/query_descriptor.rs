use crate::{
    protocol::{
        codepoint::QRYDSC,
        parts::{
            column_metadata::{ColumnDescriptor, ColumnMetadata},
            fdoca::FdocaReader,
            type_table::length_policy,
        },
    },
    DrdaError, DrdaResult,
};
use vec_map::VecMap;

// triplet types
const SDA_TRIPLET_TYPE: u8 = 0x70;
const RLO_TRIPLET_TYPE: u8 = 0x71;
const NGDA_TRIPLET_TYPE: u8 = 0x76;
const MDD_TRIPLET_TYPE: u8 = 0x78;
const CPT_TRIPLET_TYPE: u8 = 0x7F;

const MDD_TRIPLET_SIZE: usize = 7;
const SDA_TRIPLET_SIZE: usize = 12;
const SQLCADTA_RLO_SIZE: usize = 9;
const SQLDTARD_RLO_SIZE: usize = 6;

const SQLDTAGRP_LID: u8 = 0xD0;
const SQLCADTA_LID: u8 = 0xE0;
const SQLDTARD_LID: u8 = 0xF0;
const SQLCAGRP_LID: u8 = 0x54;

// (group lid, element taken, repetition factor)
const RLO_SQLCADTA: [[u8; 3]; 2] = [[SQLCAGRP_LID, 0, 1], [SQLDTAGRP_LID, 0, 1]];
const RLO_SQLDTARD: [[u8; 3]; 1] = [[SQLCADTA_LID, 0, 0]];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Start,
    End,
    Mdd,
    Sda,
    Rlo,
    Gda,
    Cpt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Id {
    Start,
    End,
    Sda,
    Zero,
    D0,
    E0,
    F0,
}

// Allowed successors of each triplet kind.
fn kind_may_follow(previous: Kind, next: Kind) -> bool {
    use Kind::{Cpt, End, Gda, Mdd, Rlo, Sda, Start};
    matches!(
        (previous, next),
        (Start, Mdd | Gda)
            | (Mdd, Sda | Rlo | Gda)
            | (Sda, Mdd)
            | (Rlo, End | Mdd | Rlo)
            | (Gda | Cpt, Mdd | Rlo | Cpt)
    )
}

// Allowed successors of each triplet id.
fn id_may_follow(previous: Id, next: Id) -> bool {
    use Id::{Sda, Start, Zero, D0, E0, End, F0};
    matches!(
        (previous, next),
        (Start, Zero | D0) | (Sda, Zero) | (Zero, Sda | Zero | D0 | E0) | (E0, Zero | F0) | (F0, End)
    )
}

// An environmental override of a local identifier, announced by MDD + SDA.
#[derive(Clone, Copy, Debug)]
struct Override {
    protocol_type: u8,
    ccsid: u32,
    length: u16,
}

/// Walks the triplets of one or more concatenated QRYDSC (or FDODSC) bodies.
struct TripletWalker {
    kind: Kind,
    id: Id,
    mdd_protocol_type: u8,
    overrides: VecMap<Override>,
    columns: Vec<ColumnDescriptor>,
}

impl TripletWalker {
    fn new() -> Self {
        Self {
            kind: Kind::Start,
            id: Id::Start,
            mdd_protocol_type: 0,
            overrides: VecMap::new(),
            columns: Vec::new(),
        }
    }

    // Validates the transition and records the new state.
    fn advance(&mut self, kind: Kind, checked_id: Id, new_id: Id, triplet: (u8, u8)) -> DrdaResult<()> {
        if !kind_may_follow(self.kind, kind) || !id_may_follow(self.id, checked_id) {
            trace!("triplet sequence violation: {:?}/{:?} -> {kind:?}/{checked_id:?}", self.kind, self.id);
            return Err(malformed(triplet.0, triplet.1));
        }
        self.kind = kind;
        self.id = new_id;
        Ok(())
    }

    fn walk(&mut self, rdr: &mut FdocaReader) -> DrdaResult<()> {
        while !rdr.is_at_end() {
            let length = usize::from(rdr.u8()?);
            let triplet_type = rdr.u8()?;
            let triplet_id = rdr.u8()?;
            let triplet = (triplet_type, triplet_id);
            if length < 3 || length - 3 > rdr.remaining() {
                return Err(malformed(triplet_type, triplet_id));
            }
            let mut body = FdocaReader::new(rdr.bytes(length - 3)?);
            match triplet_type {
                MDD_TRIPLET_TYPE => {
                    if length != MDD_TRIPLET_SIZE || triplet_id != 0 {
                        return Err(malformed(triplet_type, triplet_id));
                    }
                    self.advance(Kind::Mdd, Id::Zero, Id::Zero, triplet)?;
                    // class, type, reference type, protocol type
                    body.skip(3)?;
                    self.mdd_protocol_type = body.u8()?;
                }
                NGDA_TRIPLET_TYPE => {
                    if triplet_id != SQLDTAGRP_LID {
                        return Err(malformed(triplet_type, triplet_id));
                    }
                    self.advance(Kind::Gda, Id::D0, Id::Zero, triplet)?;
                    self.add_columns(&mut body, triplet)?;
                }
                CPT_TRIPLET_TYPE => {
                    if triplet_id != 0 {
                        return Err(malformed(triplet_type, triplet_id));
                    }
                    self.advance(Kind::Cpt, Id::Zero, Id::Zero, triplet)?;
                    self.add_columns(&mut body, triplet)?;
                }
                RLO_TRIPLET_TYPE => match triplet_id {
                    SQLCADTA_LID if length == SQLCADTA_RLO_SIZE => {
                        self.advance(Kind::Rlo, Id::E0, Id::E0, triplet)?;
                        check_rlo(&mut body, &RLO_SQLCADTA, triplet)?;
                    }
                    SQLDTARD_LID if length == SQLDTARD_RLO_SIZE => {
                        self.advance(Kind::Rlo, Id::F0, Id::F0, triplet)?;
                        check_rlo(&mut body, &RLO_SQLDTARD, triplet)?;
                    }
                    _ => return Err(malformed(triplet_type, triplet_id)),
                },
                SDA_TRIPLET_TYPE => {
                    if length != SDA_TRIPLET_SIZE {
                        return Err(malformed(triplet_type, triplet_id));
                    }
                    self.advance(Kind::Sda, Id::Sda, Id::Sda, triplet)?;
                    let _field_type = body.u8()?;
                    let ccsid = body.bytes(4)?;
                    let ccsid = u32::from_be_bytes([ccsid[0], ccsid[1], ccsid[2], ccsid[3]]);
                    let _character_size = body.u8()?;
                    let _mode = body.u8()?;
                    let length = body.u16()?;
                    self.overrides.insert(
                        usize::from(triplet_id),
                        Override {
                            protocol_type: self.mdd_protocol_type,
                            ccsid,
                            length,
                        },
                    );
                }
                _ => return Err(malformed(triplet_type, triplet_id)),
            }
        }
        Ok(())
    }

    // lid (1 byte) and length (2 bytes) per column
    fn add_columns(&mut self, body: &mut FdocaReader, triplet: (u8, u8)) -> DrdaResult<()> {
        if body.remaining() % 3 != 0 {
            return Err(malformed(triplet.0, triplet.1));
        }
        while !body.is_at_end() {
            let lid = body.u8()?;
            let length = body.u16()?;
            let column = match self.overrides.get(usize::from(lid)) {
                Some(o) => {
                    let length = if length == 0 { o.length } else { length };
                    ColumnDescriptor::from_wire(o.protocol_type, length, Some(o.ccsid))
                }
                None => ColumnDescriptor::from_wire(lid, length, None),
            };
            if length_policy(column.drda_type).is_none() {
                return Err(DrdaError::ValueNotSupported {
                    codepoint: QRYDSC,
                    value: u32::from(column.drda_type),
                });
            }
            self.columns.push(column);
        }
        Ok(())
    }

    fn finish(self) -> DrdaResult<ColumnMetadata> {
        if !kind_may_follow(self.kind, Kind::End) || !id_may_follow(self.id, Id::End) {
            return Err(malformed(0, 0));
        }
        Ok(ColumnMetadata::new(self.columns, None))
    }
}

fn check_rlo(body: &mut FdocaReader, rlo: &[[u8; 3]], triplet: (u8, u8)) -> DrdaResult<()> {
    for expected in rlo {
        let found = [body.u8()?, body.u8()?, body.u8()?];
        if found != *expected {
            return Err(malformed(triplet.0, triplet.1));
        }
    }
    Ok(())
}

fn malformed(triplet_type: u8, triplet_id: u8) -> DrdaError {
    DrdaError::MalformedDescriptor {
        triplet_type,
        triplet_id,
    }
}

/// Decodes the column descriptors from the concatenated bodies of QRYDSC objects.
///
/// The triplets must follow the row-descriptor grammar exactly: optional MDD/SDA
/// overrides, the SQLDTAGRP group with continuations, and the SQLCADTA and SQLDTARD
/// row layouts as the final triplets.
pub(crate) fn parse_column_descriptors(bytes: &[u8]) -> DrdaResult<ColumnMetadata> {
    let mut walker = TripletWalker::new();
    let mut rdr = FdocaReader::new(bytes);
    walker.walk(&mut rdr).map_err(|e| {
        if crate::protocol::parts::fdoca::is_truncation(&e) {
            malformed(0, 0)
        } else {
            e
        }
    })?;
    let metadata = walker.finish()?;
    debug!("query descriptor with {} columns", metadata.len());
    Ok(metadata)
}

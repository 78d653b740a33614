use crate::{
    protocol::{
        codepoint::{EXTDTA, FDODSC, FDODTA, SQLDTA},
        dss::{Chaining, DssType},
        frame_buffer::{FrameBuffer, StreamOutcome},
        parts::{
            drda_value::{DrdaValue, Encoded, INDICATOR_NOT_NULL},
            type_table::{
                check_compatible, is_nullable, length_policy, wire_type, LengthPolicy, SqlType,
                ValueShape, WireType,
            },
        },
    },
    DrdaResult,
};
use std::{
    borrow::Cow,
    io::{BufReader, Read, Write},
    sync::{Arc, Mutex},
};

// FD:OCA triplet vocabulary used for describing input data
const NGDA_TRIPLET_TYPE: u8 = 0x76;
const CPT_TRIPLET_TYPE: u8 = 0x7F;
const SQLDTAGRP_LID: u8 = 0xD0;
const MAX_VARS_IN_NGDA: usize = 84;
// row layout of SQLDTA: one SQLDTAGRP
const SQLDTA_RLO: [u8; 6] = [0x06, 0x71, 0xE4, 0xD0, 0x00, 0x01];
const ROW_INDICATOR: u8 = 0x00;

/// An input parameter, with its declared SQL type.
#[derive(Debug)]
pub struct Parameter {
    sql_type: SqlType,
    value: DrdaValue,
}

impl Parameter {
    /// Creates a parameter.
    pub fn new<V: Into<DrdaValue>>(sql_type: SqlType, value: V) -> Self {
        Self {
            sql_type,
            value: value.into(),
        }
    }

    /// Creates a parameter from a JDBC type code.
    ///
    /// # Errors
    ///
    /// `DrdaError::UsageDetailed` if the type code is 0 or not supported.
    pub fn try_new<V: Into<DrdaValue>>(type_code: i32, value: V) -> DrdaResult<Self> {
        Ok(Self::new(SqlType::try_new(type_code)?, value))
    }

    /// The declared SQL type.
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// The value.
    pub fn value(&self) -> &DrdaValue {
        &self.value
    }
}

enum LobSource<'a> {
    Bytes(Cow<'a, [u8]>),
    Stream(&'a Arc<Mutex<dyn Read + Send>>),
}

// A large-object parameter value that flows as EXTDTA.
struct ExternalValue<'a> {
    position: usize,
    nullable: bool,
    length: Option<u64>,
    source: LobSource<'a>,
}

/// Wire layout of a set of input parameters, computed before anything is written.
///
/// All checks (type codes, value/type compatibility, value ranges) happen here,
/// so that an invalid parameter fails the request before any byte is sent.
pub(crate) struct ParameterLayout<'a> {
    wire_types: Vec<WireType>,
    encoded: Vec<Encoded<'a>>,
    externals: Vec<ExternalValue<'a>>,
}

impl<'a> std::fmt::Debug for ParameterLayout<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ParameterLayout")
            .field("wire_types", &self.wire_types)
            .field(
                "externals",
                &self.externals.iter().map(|e| e.position).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<'a> ParameterLayout<'a> {
    /// Computes the layout.
    ///
    /// With `unknown_length_streaming` disabled, streamed large objects without
    /// known length are read completely to learn their length.
    pub(crate) fn new(
        parameters: &'a [Parameter],
        unknown_length_streaming: bool,
    ) -> DrdaResult<Self> {
        let mut wire_types = Vec::with_capacity(parameters.len());
        let mut encoded = Vec::with_capacity(parameters.len());
        let mut externals = Vec::new();

        for (position, parameter) in parameters.iter().enumerate() {
            let mut shape = parameter.value.shape()?;
            let mut buffered = None;
            if let (ValueShape::Stream(None), DrdaValue::LOBSTREAM(_, reader), false) =
                (shape, &parameter.value, unknown_length_streaming)
            {
                let bytes = read_completely(reader)?;
                shape = ValueShape::Stream(Some(bytes.len() as u64));
                buffered = Some(bytes);
            }
            check_compatible(parameter.sql_type, shape)?;
            let wire = wire_type(parameter.sql_type, shape);

            let external = if length_policy(wire.drda_type) == Some(LengthPolicy::Lob) {
                external_value(position, wire, &parameter.value, buffered)?
            } else {
                None
            };
            let lob_length = external.as_ref().map_or(Some(0), |e| e.length);
            encoded.push(parameter.value.encode(wire, lob_length)?);
            wire_types.push(wire);
            externals.extend(external);
        }
        trace!("parameter wire types: {wire_types:?}");
        Ok(Self {
            wire_types,
            encoded,
            externals,
        })
    }

    /// True if large-object values follow SQLDTA as EXTDTA objects.
    pub(crate) fn has_externals(&self) -> bool {
        !self.externals.is_empty()
    }

    /// Writes the SQLDTA object: FDODSC with the descriptor, and FDODTA with the values.
    pub(crate) fn write_sqldta(&self, fb: &mut FrameBuffer) -> DrdaResult<()> {
        let sqldta = fb.mark_length(SQLDTA);

        let fdodsc = fb.mark_length(FDODSC);
        write_sqldtagrp(&self.wire_types, fb);
        fb.write_bytes(&SQLDTA_RLO);
        fb.patch_length(fdodsc)?;

        let fdodta = fb.mark_length(FDODTA);
        fb.write_u8(ROW_INDICATOR);
        for value in &self.encoded {
            value.write(fb)?;
        }
        fb.patch_length(fdodta)?;

        fb.patch_length(sqldta)
    }

    /// Writes one EXTDTA object frame per large-object value, in parameter order.
    ///
    /// All but the last frame are chained with the same correlator; the last one gets
    /// `last_chaining`. Streamed values are sent to `w` while they are read.
    /// With `encryptor`, values are buffered and sent in encrypted object frames.
    /// Returns the positions and outcomes of degraded values.
    pub(crate) fn write_externals(
        &self,
        fb: &mut FrameBuffer,
        w: &mut dyn Write,
        correlation_id: u16,
        last_chaining: Chaining,
        encryptor: Option<&dyn Fn(&[u8]) -> DrdaResult<Vec<u8>>>,
    ) -> DrdaResult<Vec<(usize, StreamOutcome)>> {
        let mut degraded = Vec::new();
        let count = self.externals.len();
        for (i, external) in self.externals.iter().enumerate() {
            let chaining = if i + 1 < count {
                Chaining::SameCorrelator
            } else {
                last_chaining
            };
            let outcome = if let Some(encrypt) = encryptor {
                write_encrypted_external(fb, correlation_id, chaining, external, encrypt)?
            } else {
                fb.begin_frame(DssType::Object, correlation_id, chaining)?;
                match external.source {
                    LobSource::Bytes(ref bytes) => fb.write_streamed_object(
                        w,
                        EXTDTA,
                        external.nullable,
                        external.length,
                        &mut &bytes[..],
                    )?,
                    LobSource::Stream(reader) => {
                        let mut guard = reader.lock().map_err(|_| {
                            usage_err!("stream of parameter {} is poisoned", external.position + 1)
                        })?;
                        let mut source = BufReader::with_capacity(32_767, &mut *guard);
                        fb.write_streamed_object(
                            w,
                            EXTDTA,
                            external.nullable,
                            external.length,
                            &mut source,
                        )?
                    }
                }
            };
            if outcome.is_degraded() {
                degraded.push((external.position, outcome));
            }
        }
        Ok(degraded)
    }
}

// Values with length 0 are completely described in FDODTA.
fn external_value<'a>(
    position: usize,
    wire: WireType,
    value: &'a DrdaValue,
    buffered: Option<Vec<u8>>,
) -> DrdaResult<Option<ExternalValue<'a>>> {
    let nullable = is_nullable(wire.drda_type);
    let (length, source) = match (value, buffered) {
        (_, Some(bytes)) => (Some(bytes.len() as u64), LobSource::Bytes(Cow::Owned(bytes))),
        (DrdaValue::STRING(s) | DrdaValue::CLOB(s), None) => (
            Some(s.len() as u64),
            LobSource::Bytes(Cow::Borrowed(s.as_bytes())),
        ),
        (DrdaValue::BINARY(b) | DrdaValue::BLOB(b), None) => {
            (Some(b.len() as u64), LobSource::Bytes(Cow::Borrowed(b)))
        }
        (DrdaValue::LOBSTREAM(length, reader), None) => (*length, LobSource::Stream(reader)),
        (DrdaValue::NULL, None) => return Ok(None),
        (v, None) => return Err(usage_err!("value {v} cannot be sent as a large object")),
    };
    Ok(if length == Some(0) {
        None
    } else {
        Some(ExternalValue {
            position,
            nullable,
            length,
            source,
        })
    })
}

fn read_completely(reader: &Arc<Mutex<dyn Read + Send>>) -> DrdaResult<Vec<u8>> {
    let mut guard = reader
        .lock()
        .map_err(|_| usage_err!("parameter stream is poisoned"))?;
    let mut bytes = Vec::new();
    guard
        .read_to_end(&mut bytes)
        .map_err(|e| usage_err!("reading the parameter stream failed: {e}"))?;
    Ok(bytes)
}

fn write_encrypted_external(
    fb: &mut FrameBuffer,
    correlation_id: u16,
    chaining: Chaining,
    external: &ExternalValue,
    encrypt: &dyn Fn(&[u8]) -> DrdaResult<Vec<u8>>,
) -> DrdaResult<StreamOutcome> {
    let bytes = match external.source {
        LobSource::Bytes(ref bytes) => Cow::Borrowed(&bytes[..]),
        LobSource::Stream(reader) => Cow::Owned(read_completely(reader)?),
    };
    let outcome = match external.length {
        Some(length) if length != bytes.len() as u64 => StreamOutcome::Padded(format!(
            "source delivered {} instead of {length} bytes",
            bytes.len()
        )),
        _ => StreamOutcome::Complete,
    };
    fb.begin_frame(DssType::EncryptedObject, correlation_id, chaining)?;
    let mark = fb.mark_length(EXTDTA);
    if external.nullable {
        fb.write_u8(INDICATOR_NOT_NULL);
    }
    match external.length {
        #[allow(clippy::cast_possible_truncation)]
        Some(length) => fb.write_padded(&bytes[..bytes.len().min(length as usize)], length as usize, 0),
        None => fb.write_bytes(&bytes),
    }
    fb.patch_length(mark)?;
    fb.transform_frame_objects(encrypt)?;
    Ok(outcome)
}

// NGDA triplet for SQLDTAGRP, continued by CPT triplets.
#[allow(clippy::cast_possible_truncation)]
fn write_sqldtagrp(wire_types: &[WireType], fb: &mut FrameBuffer) {
    let mut triplet_type = NGDA_TRIPLET_TYPE;
    let mut id = SQLDTAGRP_LID;
    for chunk in wire_types.chunks(MAX_VARS_IN_NGDA) {
        fb.write_triplet_header((3 * chunk.len() + 3) as u8, triplet_type, id);
        for wire in chunk {
            fb.write_u8(wire.drda_type);
            fb.write_u16(wire.length);
        }
        triplet_type = CPT_TRIPLET_TYPE;
        id = 0x00;
    }
    if wire_types.is_empty() {
        fb.write_triplet_header(3, triplet_type, id);
    }
}

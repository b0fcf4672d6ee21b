// src/dbr.rs
//! The DBR family: CA's typed, metadata-augmented payload types.
//!
//! Seven native types (STRING, INT16, FLOAT32, ENUM16, CHAR, INT32,
//! FLOAT64) each come in five forms: plain, and four metadata-augmented
//! variants (STATUS, TIME, GRAPHIC, CONTROL). Four special types round out
//! the 39-entry numbering. Decoders never copy the bulk data array; they
//! hand back a typed view borrowing the circuit's receive buffer (or
//! whatever slice the caller passed in), per §4.1 and §9.

use crate::error::{LocalProtocolError, RemoteProtocolError};

/// The seven native CA scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    String,
    Int16,
    Float32,
    Enum16,
    Char,
    Int32,
    Float64,
}

impl NativeType {
    /// Width in bytes of one element on the wire.
    pub const fn element_size(self) -> usize {
        match self {
            NativeType::String => 40,
            NativeType::Int16 | NativeType::Enum16 => 2,
            NativeType::Float32 | NativeType::Int32 => 4,
            NativeType::Char => 1,
            NativeType::Float64 => 8,
        }
    }

    /// Whether this native type's GRAPHIC/CONTROL block carries a
    /// `precision` field (only the floating-point types do).
    const fn has_precision(self) -> bool {
        matches!(self, NativeType::Float32 | NativeType::Float64)
    }
}

/// One of the 39 numbered DBR type codes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbrType {
    String = 0,
    Int = 1,
    Float = 2,
    Enum = 3,
    Char = 4,
    Long = 5,
    Double = 6,
    StsString = 7,
    StsInt = 8,
    StsFloat = 9,
    StsEnum = 10,
    StsChar = 11,
    StsLong = 12,
    StsDouble = 13,
    TimeString = 14,
    TimeInt = 15,
    TimeFloat = 16,
    TimeEnum = 17,
    TimeChar = 18,
    TimeLong = 19,
    TimeDouble = 20,
    GrString = 21,
    GrInt = 22,
    GrFloat = 23,
    GrEnum = 24,
    GrChar = 25,
    GrLong = 26,
    GrDouble = 27,
    CtrlString = 28,
    CtrlInt = 29,
    CtrlFloat = 30,
    CtrlEnum = 31,
    CtrlChar = 32,
    CtrlLong = 33,
    CtrlDouble = 34,
    PutAckt = 35,
    PutAcks = 36,
    StsackString = 37,
    ClassName = 38,
}

/// Which of the five forms (plain, or one of the four augmentations) a
/// [`DbrType`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Augmentation {
    Plain,
    Status,
    Time,
    Graphic,
    Control,
}

impl DbrType {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Result<Self, RemoteProtocolError> {
        Ok(match code {
            0 => DbrType::String,
            1 => DbrType::Int,
            2 => DbrType::Float,
            3 => DbrType::Enum,
            4 => DbrType::Char,
            5 => DbrType::Long,
            6 => DbrType::Double,
            7 => DbrType::StsString,
            8 => DbrType::StsInt,
            9 => DbrType::StsFloat,
            10 => DbrType::StsEnum,
            11 => DbrType::StsChar,
            12 => DbrType::StsLong,
            13 => DbrType::StsDouble,
            14 => DbrType::TimeString,
            15 => DbrType::TimeInt,
            16 => DbrType::TimeFloat,
            17 => DbrType::TimeEnum,
            18 => DbrType::TimeChar,
            19 => DbrType::TimeLong,
            20 => DbrType::TimeDouble,
            21 => DbrType::GrString,
            22 => DbrType::GrInt,
            23 => DbrType::GrFloat,
            24 => DbrType::GrEnum,
            25 => DbrType::GrChar,
            26 => DbrType::GrLong,
            27 => DbrType::GrDouble,
            28 => DbrType::CtrlString,
            29 => DbrType::CtrlInt,
            30 => DbrType::CtrlFloat,
            31 => DbrType::CtrlEnum,
            32 => DbrType::CtrlChar,
            33 => DbrType::CtrlLong,
            34 => DbrType::CtrlDouble,
            35 => DbrType::PutAckt,
            36 => DbrType::PutAcks,
            37 => DbrType::StsackString,
            38 => DbrType::ClassName,
            other => {
                return Err(RemoteProtocolError::UnknownEnumValue {
                    field: "data_type",
                    value: other as u32,
                });
            }
        })
    }

    /// The native scalar kind this type carries, or `None` for the four
    /// special types which aren't simply "native type + metadata".
    pub const fn native_type(self) -> Option<NativeType> {
        use DbrType::*;
        Some(match self {
            String | StsString | TimeString | GrString | CtrlString => NativeType::String,
            Int | StsInt | TimeInt | GrInt | CtrlInt => NativeType::Int16,
            Float | StsFloat | TimeFloat | GrFloat | CtrlFloat => NativeType::Float32,
            Enum | StsEnum | TimeEnum | GrEnum | CtrlEnum => NativeType::Enum16,
            Char | StsChar | TimeChar | GrChar | CtrlChar => NativeType::Char,
            Long | StsLong | TimeLong | GrLong | CtrlLong => NativeType::Int32,
            Double | StsDouble | TimeDouble | GrDouble | CtrlDouble => NativeType::Float64,
            PutAckt | PutAcks | StsackString | ClassName => return None,
        })
    }

    pub const fn augmentation(self) -> Augmentation {
        use DbrType::*;
        match self {
            String | Int | Float | Enum | Char | Long | Double => Augmentation::Plain,
            StsString | StsInt | StsFloat | StsEnum | StsChar | StsLong | StsDouble => {
                Augmentation::Status
            }
            TimeString | TimeInt | TimeFloat | TimeEnum | TimeChar | TimeLong | TimeDouble => {
                Augmentation::Time
            }
            GrString | GrInt | GrFloat | GrEnum | GrChar | GrLong | GrDouble => {
                Augmentation::Graphic
            }
            CtrlString | CtrlInt | CtrlFloat | CtrlEnum | CtrlChar | CtrlLong | CtrlDouble => {
                Augmentation::Control
            }
            // Specials carry no augmentation in the STATUS/TIME/GRAPHIC/CONTROL
            // sense; each has its own fixed layout.
            PutAckt | PutAcks | StsackString | ClassName => Augmentation::Plain,
        }
    }

    /// Whether the native type is CHAR and this is a STATUS or TIME
    /// variant — the one case with a 1-byte RISC alignment pad between the
    /// metadata block and the data array.
    fn has_char_pad(self) -> bool {
        matches!(self.augmentation(), Augmentation::Status | Augmentation::Time)
            && self.native_type() == Some(NativeType::Char)
    }
}

/// Alarm status/severity pair, present in every augmented DBR form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub status: i16,
    pub severity: i16,
}

impl Status {
    fn decode(bytes: &[u8]) -> Status {
        Status {
            status: i16::from_be_bytes([bytes[0], bytes[1]]),
            severity: i16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.status.to_be_bytes());
        out.extend_from_slice(&self.severity.to_be_bytes());
    }
}

/// CA's on-wire timestamp: seconds since the EPICS epoch (1990-01-01
/// 00:00:00 UTC) plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStamp {
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl TimeStamp {
    fn decode(bytes: &[u8]) -> TimeStamp {
        TimeStamp {
            seconds: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            nanoseconds: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.seconds.to_be_bytes());
        out.extend_from_slice(&self.nanoseconds.to_be_bytes());
    }
}

/// One display/alarm/control limit value, typed to the native kind it
/// belongs to. STRING and ENUM never produce one of these (strings have no
/// limits; enums carry a string table instead, see [`EnumStrings`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Int16(i16),
    Float32(f32),
    Int32(i32),
    Float64(f64),
    Char(u8),
}

impl Limit {
    fn decode(native: NativeType, bytes: &[u8]) -> Limit {
        match native {
            NativeType::Int16 => Limit::Int16(i16::from_be_bytes([bytes[0], bytes[1]])),
            NativeType::Float32 => {
                Limit::Float32(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            NativeType::Int32 => {
                Limit::Int32(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            NativeType::Float64 => Limit::Float64(f64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])),
            NativeType::Char => Limit::Char(bytes[0]),
            NativeType::String | NativeType::Enum16 => {
                unreachable!("string/enum have no limit fields")
            }
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        match self {
            Limit::Int16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Limit::Float32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Limit::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Limit::Float64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Limit::Char(v) => out.push(v),
        }
    }
}

/// The six display/alarm limits carried by every GRAPHIC (and, by
/// extension, CONTROL) metadata block for a numeric native type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicLimits {
    pub upper_display: Limit,
    pub lower_display: Limit,
    pub upper_alarm: Limit,
    pub upper_warning: Limit,
    pub lower_warning: Limit,
    pub lower_alarm: Limit,
}

impl GraphicLimits {
    fn decode(native: NativeType, bytes: &[u8]) -> GraphicLimits {
        let size = native.element_size();
        let at = |i: usize| Limit::decode(native, &bytes[i * size..]);
        GraphicLimits {
            upper_display: at(0),
            lower_display: at(1),
            upper_alarm: at(2),
            upper_warning: at(3),
            lower_warning: at(4),
            lower_alarm: at(5),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        for limit in [
            self.upper_display,
            self.lower_display,
            self.upper_alarm,
            self.upper_warning,
            self.lower_warning,
            self.lower_alarm,
        ] {
            limit.encode(out);
        }
    }
}

/// The two additional limits a CONTROL block adds on top of GRAPHIC, for
/// numeric native types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLimits {
    pub upper_ctrl: Limit,
    pub lower_ctrl: Limit,
}

impl ControlLimits {
    fn decode(native: NativeType, bytes: &[u8]) -> ControlLimits {
        let size = native.element_size();
        ControlLimits {
            upper_ctrl: Limit::decode(native, &bytes[0..]),
            lower_ctrl: Limit::decode(native, &bytes[size..]),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.upper_ctrl.encode(out);
        self.lower_ctrl.encode(out);
    }
}

/// A borrowed view over the fixed-width enum-string table carried by
/// `GR_ENUM`/`CTRL_ENUM`: 16 slots of 26 bytes each, of which `no_str` are
/// meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumStrings<'a> {
    bytes: &'a [u8],
    no_str: u16,
}

/// Number of fixed enum-string slots always present on the wire.
pub const ENUM_STRING_SLOTS: usize = 16;
/// Width in bytes of each enum-string slot.
pub const ENUM_STRING_WIDTH: usize = 26;

impl<'a> EnumStrings<'a> {
    pub fn count(&self) -> u16 {
        self.no_str
    }

    /// The `i`th enum string, trimmed at its first NUL. `None` if `i` is
    /// out of `0..count()`.
    pub fn get(&self, i: u16) -> Option<&'a str> {
        if i >= self.no_str {
            return None;
        }
        let start = i as usize * ENUM_STRING_WIDTH;
        let slot = &self.bytes[start..start + ENUM_STRING_WIDTH];
        let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        std::str::from_utf8(&slot[..end]).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.no_str).filter_map(move |i| self.get(i))
    }
}

/// The decoded metadata block preceding an augmented DBR payload's data
/// array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metadata<'a> {
    None,
    Status(Status),
    Time(Status, TimeStamp),
    GraphicString(Status),
    GraphicNumeric {
        status: Status,
        units: [u8; 8],
        precision: Option<i16>,
        limits: GraphicLimits,
    },
    GraphicEnum {
        status: Status,
        strings: EnumStrings<'a>,
    },
    ControlString(Status),
    ControlNumeric {
        status: Status,
        units: [u8; 8],
        precision: Option<i16>,
        graphic: GraphicLimits,
        ctrl: ControlLimits,
    },
    ControlEnum {
        status: Status,
        strings: EnumStrings<'a>,
    },
    PutAckt(u16),
    PutAcks(u16),
    StsAckString {
        status: Status,
        ackt: u16,
        acks: u16,
    },
}

fn decode_units(bytes: &[u8]) -> [u8; 8] {
    let mut units = [0u8; 8];
    units.copy_from_slice(&bytes[..8]);
    units
}

impl<'a> Metadata<'a> {
    /// Decode the metadata block for `dbr_type`, returning it plus the
    /// number of bytes consumed.
    fn decode(dbr_type: DbrType, bytes: &'a [u8]) -> Result<(Metadata<'a>, usize), RemoteProtocolError> {
        let too_short = || RemoteProtocolError::PayloadLengthMismatch {
            expected: 0,
            actual: bytes.len(),
        };
        match dbr_type {
            DbrType::String | DbrType::Int | DbrType::Float | DbrType::Enum | DbrType::Char
            | DbrType::Long | DbrType::Double => Ok((Metadata::None, 0)),
            DbrType::StsString | DbrType::StsInt | DbrType::StsFloat | DbrType::StsEnum
            | DbrType::StsChar | DbrType::StsLong | DbrType::StsDouble => {
                if bytes.len() < 4 {
                    return Err(too_short());
                }
                Ok((Metadata::Status(Status::decode(bytes)), 4))
            }
            DbrType::TimeString | DbrType::TimeInt | DbrType::TimeFloat | DbrType::TimeEnum
            | DbrType::TimeChar | DbrType::TimeLong | DbrType::TimeDouble => {
                if bytes.len() < 12 {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let stamp = TimeStamp::decode(&bytes[4..]);
                Ok((Metadata::Time(status, stamp), 12))
            }
            DbrType::GrString => {
                if bytes.len() < 4 {
                    return Err(too_short());
                }
                Ok((Metadata::GraphicString(Status::decode(bytes)), 4))
            }
            DbrType::GrEnum => {
                let needed = 4 + 2 + ENUM_STRING_SLOTS * ENUM_STRING_WIDTH;
                if bytes.len() < needed {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let no_str = u16::from_be_bytes([bytes[4], bytes[5]]);
                let strings = EnumStrings { bytes: &bytes[6..6 + ENUM_STRING_SLOTS * ENUM_STRING_WIDTH], no_str };
                Ok((Metadata::GraphicEnum { status, strings }, needed))
            }
            DbrType::GrInt | DbrType::GrFloat | DbrType::GrChar | DbrType::GrLong | DbrType::GrDouble => {
                let native = dbr_type.native_type().unwrap();
                let precision_len = if native.has_precision() { 2 } else { 0 };
                let size = native.element_size();
                let needed = 4 + 8 + precision_len + 6 * size;
                if bytes.len() < needed {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let units = decode_units(&bytes[4..]);
                let mut pos = 12;
                let precision = if native.has_precision() {
                    let p = i16::from_be_bytes([bytes[pos], bytes[pos + 1]]);
                    pos += 2;
                    Some(p)
                } else {
                    None
                };
                let limits = GraphicLimits::decode(native, &bytes[pos..]);
                Ok((
                    Metadata::GraphicNumeric { status, units, precision, limits },
                    needed,
                ))
            }
            DbrType::CtrlString => {
                if bytes.len() < 4 {
                    return Err(too_short());
                }
                Ok((Metadata::ControlString(Status::decode(bytes)), 4))
            }
            DbrType::CtrlEnum => {
                let needed = 4 + 2 + ENUM_STRING_SLOTS * ENUM_STRING_WIDTH;
                if bytes.len() < needed {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let no_str = u16::from_be_bytes([bytes[4], bytes[5]]);
                let strings = EnumStrings { bytes: &bytes[6..6 + ENUM_STRING_SLOTS * ENUM_STRING_WIDTH], no_str };
                Ok((Metadata::ControlEnum { status, strings }, needed))
            }
            DbrType::CtrlInt | DbrType::CtrlFloat | DbrType::CtrlChar | DbrType::CtrlLong | DbrType::CtrlDouble => {
                let native = dbr_type.native_type().unwrap();
                let precision_len = if native.has_precision() { 2 } else { 0 };
                let size = native.element_size();
                let needed = 4 + 8 + precision_len + 8 * size;
                if bytes.len() < needed {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let units = decode_units(&bytes[4..]);
                let mut pos = 12;
                let precision = if native.has_precision() {
                    let p = i16::from_be_bytes([bytes[pos], bytes[pos + 1]]);
                    pos += 2;
                    Some(p)
                } else {
                    None
                };
                let graphic = GraphicLimits::decode(native, &bytes[pos..]);
                pos += 6 * size;
                let ctrl = ControlLimits::decode(native, &bytes[pos..]);
                Ok((
                    Metadata::ControlNumeric { status, units, precision, graphic, ctrl },
                    needed,
                ))
            }
            DbrType::PutAckt => {
                if bytes.len() < 2 {
                    return Err(too_short());
                }
                Ok((Metadata::PutAckt(u16::from_be_bytes([bytes[0], bytes[1]])), 2))
            }
            DbrType::PutAcks => {
                if bytes.len() < 2 {
                    return Err(too_short());
                }
                Ok((Metadata::PutAcks(u16::from_be_bytes([bytes[0], bytes[1]])), 2))
            }
            DbrType::StsackString => {
                if bytes.len() < 8 {
                    return Err(too_short());
                }
                let status = Status::decode(bytes);
                let ackt = u16::from_be_bytes([bytes[4], bytes[5]]);
                let acks = u16::from_be_bytes([bytes[6], bytes[7]]);
                Ok((Metadata::StsAckString { status, ackt, acks }, 8))
            }
            DbrType::ClassName => Ok((Metadata::None, 0)),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Metadata::None => {}
            Metadata::Status(s) | Metadata::GraphicString(s) | Metadata::ControlString(s) => {
                s.encode(out)
            }
            Metadata::Time(s, t) => {
                s.encode(out);
                t.encode(out);
            }
            Metadata::GraphicNumeric { status, units, precision, limits } => {
                status.encode(out);
                out.extend_from_slice(units);
                if let Some(p) = precision {
                    out.extend_from_slice(&p.to_be_bytes());
                }
                limits.encode(out);
            }
            Metadata::GraphicEnum { status, strings } | Metadata::ControlEnum { status, strings } => {
                status.encode(out);
                out.extend_from_slice(&strings.no_str.to_be_bytes());
                out.extend_from_slice(strings.bytes);
            }
            Metadata::ControlNumeric { status, units, precision, graphic, ctrl } => {
                status.encode(out);
                out.extend_from_slice(units);
                if let Some(p) = precision {
                    out.extend_from_slice(&p.to_be_bytes());
                }
                graphic.encode(out);
                ctrl.encode(out);
            }
            Metadata::PutAckt(v) | Metadata::PutAcks(v) => out.extend_from_slice(&v.to_be_bytes()),
            Metadata::StsAckString { status, ackt, acks } => {
                status.encode(out);
                out.extend_from_slice(&ackt.to_be_bytes());
                out.extend_from_slice(&acks.to_be_bytes());
            }
        }
    }
}

/// A borrowed, typed view over a native-type data array. No copying: reads
/// decode one element at a time straight out of the backing byte slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    String(StringArray<'a>),
    Int16(NumericArray<'a, i16>),
    Float32(NumericArray<'a, f32>),
    Enum16(NumericArray<'a, u16>),
    Char(&'a [u8]),
    Int32(NumericArray<'a, i32>),
    Float64(NumericArray<'a, f64>),
    /// `PUT_ACKT`/`PUT_ACKS`/`CLASS_NAME` carry no conventional data array;
    /// `ClassName`'s "data" is a name string, exposed separately by the
    /// command that carries it.
    None,
}

/// A borrowed view over an array of 40-byte fixed-width CA strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringArray<'a> {
    bytes: &'a [u8],
    count: u32,
}

impl<'a> StringArray<'a> {
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, i: u32) -> Option<&'a str> {
        if i >= self.count {
            return None;
        }
        let start = i as usize * 40;
        let slot = &self.bytes[start..start + 40];
        let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        std::str::from_utf8(&slot[..end]).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }
}

/// A borrowed, strongly-typed view over a fixed-width numeric array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericArray<'a, T> {
    bytes: &'a [u8],
    count: u32,
    _marker: std::marker::PhantomData<T>,
}

/// Scalar numeric kinds that can appear inside a [`NumericArray`].
pub trait WireScalar: Copy + PartialEq {
    const SIZE: usize;
    fn decode(bytes: &[u8]) -> Self;
    fn encode(self, out: &mut Vec<u8>);
}

impl WireScalar for i16 {
    const SIZE: usize = 2;
    fn decode(bytes: &[u8]) -> Self {
        i16::from_be_bytes([bytes[0], bytes[1]])
    }
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl WireScalar for u16 {
    const SIZE: usize = 2;
    fn decode(bytes: &[u8]) -> Self {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl WireScalar for i32 {
    const SIZE: usize = 4;
    fn decode(bytes: &[u8]) -> Self {
        i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl WireScalar for f32 {
    const SIZE: usize = 4;
    fn decode(bytes: &[u8]) -> Self {
        f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl WireScalar for f64 {
    const SIZE: usize = 8;
    fn decode(bytes: &[u8]) -> Self {
        f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl<'a, T: WireScalar> NumericArray<'a, T> {
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, i: u32) -> Option<T> {
        if i >= self.count {
            return None;
        }
        let start = i as usize * T::SIZE;
        Some(T::decode(&self.bytes[start..start + T::SIZE]))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

fn encode_numeric_array<T: WireScalar>(values: &[T], out: &mut Vec<u8>) {
    for &v in values {
        v.encode(out);
    }
}

impl<'a> Value<'a> {
    /// Decode `data_count` elements of `native` starting at the head of
    /// `bytes`. Does not consume or validate trailing padding; callers use
    /// [`data_len`] to know how much of `bytes` belongs to the array.
    pub(crate) fn decode(native: NativeType, data_count: u32, bytes: &'a [u8]) -> Result<Value<'a>, RemoteProtocolError> {
        let needed = data_len(native, data_count);
        if bytes.len() < needed {
            return Err(RemoteProtocolError::PayloadLengthMismatch {
                expected: needed,
                actual: bytes.len(),
            });
        }
        let bytes = &bytes[..needed];
        Ok(match native {
            NativeType::String => Value::String(StringArray { bytes, count: data_count }),
            NativeType::Int16 => Value::Int16(NumericArray { bytes, count: data_count, _marker: std::marker::PhantomData }),
            NativeType::Float32 => Value::Float32(NumericArray { bytes, count: data_count, _marker: std::marker::PhantomData }),
            NativeType::Enum16 => Value::Enum16(NumericArray { bytes, count: data_count, _marker: std::marker::PhantomData }),
            NativeType::Char => Value::Char(bytes),
            NativeType::Int32 => Value::Int32(NumericArray { bytes, count: data_count, _marker: std::marker::PhantomData }),
            NativeType::Float64 => Value::Float64(NumericArray { bytes, count: data_count, _marker: std::marker::PhantomData }),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::String(arr) => out.extend_from_slice(arr.bytes),
            Value::Int16(arr) => out.extend_from_slice(arr.bytes),
            Value::Float32(arr) => out.extend_from_slice(arr.bytes),
            Value::Enum16(arr) => out.extend_from_slice(arr.bytes),
            Value::Char(bytes) => out.extend_from_slice(bytes),
            Value::Int32(arr) => out.extend_from_slice(arr.bytes),
            Value::Float64(arr) => out.extend_from_slice(arr.bytes),
            Value::None => {}
        }
    }
}

/// Build a [`Value`] owning freshly-encoded bytes, for callers constructing
/// outgoing commands from plain Rust values rather than re-sending a
/// decoded view. Returns the encoded byte buffer directly since `Value`
/// itself only ever borrows.
pub fn encode_values<T: WireScalar>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::SIZE);
    encode_numeric_array(values, &mut out);
    out
}

fn data_len(native: NativeType, data_count: u32) -> usize {
    native.element_size() * data_count as usize
}

/// Bytes of trailing zero padding needed to round `len` up to a multiple of
/// 8 (§4.1). Array payloads get this; the 40-byte scalar STRING case
/// never needs it since 40 is already a multiple of 8.
pub fn pad_len(len: usize) -> usize {
    (8 - (len % 8)) % 8
}

/// A fully decoded DBR payload: metadata block plus data array, still
/// borrowing the input buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload<'a> {
    pub metadata: Metadata<'a>,
    pub value: Value<'a>,
}

/// Decode a DBR payload (metadata block + data array + alignment pad) for
/// `dbr_type`/`data_count` out of `bytes`, which must contain exactly the
/// payload (the caller has already sliced off `payload_size` bytes using
/// the header).
pub fn decode(dbr_type: DbrType, data_count: u32, bytes: &[u8]) -> Result<Payload<'_>, RemoteProtocolError> {
    let (metadata, meta_len) = Metadata::decode(dbr_type, bytes)?;
    let mut pos = meta_len;
    if dbr_type.has_char_pad() {
        if bytes.len() < pos + 1 {
            return Err(RemoteProtocolError::PayloadLengthMismatch {
                expected: pos + 1,
                actual: bytes.len(),
            });
        }
        pos += 1;
    }
    let value = match dbr_type {
        DbrType::ClassName => {
            // The "data" is a single NUL-padded class-name string, modeled
            // as a one-element StringArray-like Char view for callers that
            // want the raw bytes; command-level code interprets it as text.
            Value::Char(&bytes[pos..])
        }
        DbrType::PutAckt | DbrType::PutAcks | DbrType::StsackString => Value::None,
        _ => {
            let native = dbr_type.native_type().expect("checked above");
            Value::decode(native, data_count, &bytes[pos..])?
        }
    };
    Ok(Payload { metadata, value })
}

/// Encode a DBR payload: metadata block, optional char pad, data array,
/// then zero-pad to an 8-byte boundary.
pub fn encode(dbr_type: DbrType, payload: &Payload<'_>) -> Result<Vec<u8>, LocalProtocolError> {
    let mut out = Vec::new();
    payload.metadata.encode(&mut out);
    if dbr_type.has_char_pad() {
        out.push(0);
    }
    payload.value.encode(&mut out);
    let pad = pad_len(out.len());
    out.extend(std::iter::repeat(0u8).take(pad));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbr_type_code_roundtrip() {
        for code in 0u16..=38 {
            let ty = DbrType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
    }

    #[test]
    fn unknown_dbr_code_is_rejected() {
        assert!(DbrType::from_code(39).is_err());
        assert!(DbrType::from_code(9999).is_err());
    }

    #[test]
    fn native_type_element_sizes() {
        assert_eq!(NativeType::String.element_size(), 40);
        assert_eq!(NativeType::Int16.element_size(), 2);
        assert_eq!(NativeType::Float32.element_size(), 4);
        assert_eq!(NativeType::Enum16.element_size(), 2);
        assert_eq!(NativeType::Char.element_size(), 1);
        assert_eq!(NativeType::Int32.element_size(), 4);
        assert_eq!(NativeType::Float64.element_size(), 8);
    }

    #[test]
    fn plain_double_roundtrips() {
        let payload = Payload {
            metadata: Metadata::None,
            value: Value::Float64(NumericArray {
                bytes: &[0x40, 0x09, 0x21, 0xfb, 0x54, 0x44, 0x2d, 0x18],
                count: 1,
                _marker: std::marker::PhantomData,
            }),
        };
        let bytes = encode(DbrType::Double, &payload).unwrap();
        assert_eq!(bytes.len(), 8); // already 8-byte aligned, no pad.
        let decoded = decode(DbrType::Double, 1, &bytes).unwrap();
        match decoded.value {
            Value::Float64(arr) => assert!((arr.get(0).unwrap() - std::f64::consts::PI).abs() < 1e-9),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn time_double_roundtrip_preserves_status_and_timestamp() {
        let mut raw = Vec::new();
        Status { status: 0, severity: 0 }.encode(&mut raw);
        TimeStamp { seconds: 100, nanoseconds: 42 }.encode(&mut raw);
        encode_numeric_array(&[3.14f64], &mut raw);
        let pad = pad_len(raw.len());
        raw.extend(std::iter::repeat(0u8).take(pad));

        let decoded = decode(DbrType::TimeDouble, 1, &raw).unwrap();
        match decoded.metadata {
            Metadata::Time(status, stamp) => {
                assert_eq!(status.status, 0);
                assert_eq!(stamp.seconds, 100);
                assert_eq!(stamp.nanoseconds, 42);
            }
            _ => panic!("wrong metadata variant"),
        }
        match decoded.value {
            Value::Float64(arr) => assert_eq!(arr.get(0).unwrap(), 3.14),
            _ => panic!("wrong value variant"),
        }
    }

    #[test]
    fn sts_char_includes_risc_pad() {
        let mut raw = Vec::new();
        Status { status: 1, severity: 2 }.encode(&mut raw);
        raw.push(0); // RISC pad
        raw.push(65); // 'A'
        let pad = pad_len(raw.len());
        raw.extend(std::iter::repeat(0u8).take(pad));

        let decoded = decode(DbrType::StsChar, 1, &raw).unwrap();
        match decoded.value {
            Value::Char(bytes) => assert_eq!(bytes[0], 65),
            _ => panic!("wrong value variant"),
        }
    }

    #[test]
    fn string_array_trims_at_nul() {
        let mut bytes = vec![0u8; 40];
        bytes[..2].copy_from_slice(b"pv");
        let arr = StringArray { bytes: &bytes, count: 1 };
        assert_eq!(arr.get(0), Some("pv"));
        assert_eq!(arr.get(1), None);
    }

    #[test]
    fn scalar_string_payload_is_already_eight_aligned() {
        assert_eq!(pad_len(40), 0);
        assert_eq!(pad_len(80), 0);
    }

    #[test]
    fn pad_len_rounds_up_to_eight() {
        assert_eq!(pad_len(0), 0);
        assert_eq!(pad_len(1), 7);
        assert_eq!(pad_len(4), 4);
        assert_eq!(pad_len(8), 0);
        assert_eq!(pad_len(9), 7);
    }

    #[test]
    fn gr_enum_roundtrips_strings() {
        let mut raw = Vec::new();
        Status { status: 0, severity: 0 }.encode(&mut raw);
        raw.extend_from_slice(&2u16.to_be_bytes());
        let mut slot0 = [0u8; ENUM_STRING_WIDTH];
        slot0[..3].copy_from_slice(b"Off");
        let mut slot1 = [0u8; ENUM_STRING_WIDTH];
        slot1[..2].copy_from_slice(b"On");
        raw.extend_from_slice(&slot0);
        raw.extend_from_slice(&slot1);
        for _ in 2..ENUM_STRING_SLOTS {
            raw.extend_from_slice(&[0u8; ENUM_STRING_WIDTH]);
        }
        encode_numeric_array(&[1u16], &mut raw);
        let pad = pad_len(raw.len());
        raw.extend(std::iter::repeat(0u8).take(pad));

        let decoded = decode(DbrType::GrEnum, 1, &raw).unwrap();
        match decoded.metadata {
            Metadata::GraphicEnum { strings, .. } => {
                assert_eq!(strings.count(), 2);
                assert_eq!(strings.get(0), Some("Off"));
                assert_eq!(strings.get(1), Some("On"));
                assert_eq!(strings.get(2), None);
            }
            _ => panic!("wrong metadata variant"),
        }
    }

    #[test]
    fn ctrl_double_has_precision_and_all_limits() {
        let mut raw = Vec::new();
        Status { status: 0, severity: 0 }.encode(&mut raw);
        raw.extend_from_slice(b"volts\0\0\0");
        raw.extend_from_slice(&3i16.to_be_bytes()); // precision
        for v in [10.0f64, -10.0, 9.0, 8.0, -8.0, -9.0] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        for v in [10.0f64, -10.0] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        encode_numeric_array(&[5.0f64], &mut raw);

        let decoded = decode(DbrType::CtrlDouble, 1, &raw).unwrap();
        match decoded.metadata {
            Metadata::ControlNumeric { precision, graphic, ctrl, .. } => {
                assert_eq!(precision, Some(3));
                assert_eq!(graphic.upper_display, Limit::Float64(10.0));
                assert_eq!(ctrl.upper_ctrl, Limit::Float64(10.0));
            }
            _ => panic!("wrong metadata variant"),
        }
    }

    #[test]
    fn ctrl_int_has_no_precision_field() {
        let mut raw = Vec::new();
        Status { status: 0, severity: 0 }.encode(&mut raw);
        raw.extend_from_slice(&[0u8; 8]); // units
        for v in [100i16, -100, 90, 80, -80, -90] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        for v in [100i16, -100] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        encode_numeric_array(&[42i16], &mut raw);
        let pad = pad_len(raw.len());
        raw.extend(std::iter::repeat(0u8).take(pad));

        let decoded = decode(DbrType::CtrlInt, 1, &raw).unwrap();
        match decoded.metadata {
            Metadata::ControlNumeric { precision, .. } => assert_eq!(precision, None),
            _ => panic!("wrong metadata variant"),
        }
    }

    #[test]
    fn oversized_array_payload_uses_full_length() {
        let values: Vec<f64> = (0..200_000).map(|i| i as f64).collect();
        let bytes = encode_values(&values);
        assert_eq!(bytes.len(), 200_000 * 8);
        let decoded = Value::decode(NativeType::Float64, 200_000, &bytes).unwrap();
        match decoded {
            Value::Float64(arr) => {
                assert_eq!(arr.len(), 200_000);
                assert_eq!(arr.get(199_999), Some(199_999.0));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn truncated_payload_is_rejected_not_panicking() {
        let bytes = [0u8; 3];
        let err = decode(DbrType::Double, 1, &bytes).unwrap_err();
        matches!(err, RemoteProtocolError::PayloadLengthMismatch { .. });
    }
}

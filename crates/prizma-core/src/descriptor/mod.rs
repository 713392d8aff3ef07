//! Standalone parser for serialized descriptor sets.
//!
//! A descriptor set describes message and enum shapes, and is itself
//! encoded in the wire format it describes. This module decodes one into
//! a plain tree of file/message/field/enum descriptors using only the
//! varint and wire-type primitives in [`wire`]. No protobuf runtime is
//! involved, so a schema can be parsed without already having a schema.
//!
//! ## Algorithm Overview
//!
//! Every descriptor message is parsed the same way:
//!
//! 1. Read a tag varint and split it into field number and wire type
//! 2. Dispatch on the (number, wire type) pair for the fields this
//!    parser understands, recursing into length-delimited payloads for
//!    nested descriptors
//! 3. Skip anything else
//!
//! Step 3 makes the parser forward-compatible: descriptor fields it does
//! not know about (options, source info, reserved ranges, …) are walked
//! over without disturbing the fields that follow them.

mod wire;

use crate::error::{Error, Result};
use tracing::{debug, trace};

pub use wire::{write_tag, write_varint, WireCursor, WireType};

/// Scalar/composite type codes of a field descriptor.
///
/// The discriminants reproduce the standard descriptor numbering
/// (1=double … 18=sint64); any consumer generating descriptor bytes for
/// this parser must match these codes exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FieldType {
    /// 64-bit IEEE float, i64 wire
    Double = 1,
    /// 32-bit IEEE float, i32 wire
    Float = 2,
    /// Varint-encoded signed 64-bit
    Int64 = 3,
    /// Varint-encoded unsigned 64-bit
    Uint64 = 4,
    /// Varint-encoded signed 32-bit
    Int32 = 5,
    /// Little-endian unsigned 64-bit
    Fixed64 = 6,
    /// Little-endian unsigned 32-bit
    Fixed32 = 7,
    /// Varint-encoded boolean
    Bool = 8,
    /// Length-delimited UTF-8 text
    String = 9,
    /// Legacy group encoding (unsupported by the engine)
    Group = 10,
    /// Length-delimited nested message
    Message = 11,
    /// Length-delimited raw bytes
    Bytes = 12,
    /// Varint-encoded unsigned 32-bit
    Uint32 = 13,
    /// Varint-encoded enum value
    Enum = 14,
    /// Little-endian signed 32-bit
    Sfixed32 = 15,
    /// Little-endian signed 64-bit
    Sfixed64 = 16,
    /// Zigzag varint-encoded signed 32-bit
    Sint32 = 17,
    /// Zigzag varint-encoded signed 64-bit
    Sint64 = 18,
}

impl FieldType {
    /// The wire type payloads of this field type are encoded with.
    ///
    /// Returns `None` for [`FieldType::Group`], whose start/end wire
    /// types the engine rejects.
    pub fn wire_type(self) -> Option<WireType> {
        match self {
            FieldType::Int32
            | FieldType::Int64
            | FieldType::Uint32
            | FieldType::Uint64
            | FieldType::Sint32
            | FieldType::Sint64
            | FieldType::Bool
            | FieldType::Enum => Some(WireType::Varint),
            FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => Some(WireType::I64),
            FieldType::String | FieldType::Bytes | FieldType::Message => Some(WireType::Len),
            FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => Some(WireType::I32),
            FieldType::Group => None,
        }
    }
}

impl TryFrom<u32> for FieldType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            1 => FieldType::Double,
            2 => FieldType::Float,
            3 => FieldType::Int64,
            4 => FieldType::Uint64,
            5 => FieldType::Int32,
            6 => FieldType::Fixed64,
            7 => FieldType::Fixed32,
            8 => FieldType::Bool,
            9 => FieldType::String,
            10 => FieldType::Group,
            11 => FieldType::Message,
            12 => FieldType::Bytes,
            13 => FieldType::Uint32,
            14 => FieldType::Enum,
            15 => FieldType::Sfixed32,
            16 => FieldType::Sfixed64,
            17 => FieldType::Sint32,
            18 => FieldType::Sint64,
            _ => {
                return Err(Error::invalid_descriptor(format!(
                    "unknown field type code: {value}"
                )))
            }
        })
    }
}

/// Field cardinality label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Label {
    /// At most one value
    Optional = 1,
    /// Exactly one value (proto2)
    Required = 2,
    /// Ordered list of values
    Repeated = 3,
}

impl Label {
    /// Returns true for repeated fields.
    pub fn is_repeated(self) -> bool {
        matches!(self, Label::Repeated)
    }
}

impl TryFrom<u32> for Label {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Label::Optional),
            2 => Ok(Label::Required),
            3 => Ok(Label::Repeated),
            _ => Err(Error::invalid_descriptor(format!(
                "unknown label code: {value}"
            ))),
        }
    }
}

/// A parsed field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field number, unique within the owning type
    pub number: u32,
    /// Cardinality label
    pub label: Label,
    /// Declared scalar/composite type
    pub field_type: FieldType,
    /// Fully-qualified type name for message- and enum-valued fields,
    /// carried through verbatim from the descriptor bytes
    pub type_name: Option<String>,
}

/// A parsed message definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageDescriptor {
    /// Simple (unqualified) message name
    pub name: String,
    /// Declared fields in descriptor order
    pub fields: Vec<FieldDescriptor>,
    /// Nested message definitions
    pub nested: Vec<MessageDescriptor>,
    /// Nested enum definitions
    pub enums: Vec<EnumDescriptor>,
}

/// A parsed enum definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumDescriptor {
    /// Simple (unqualified) enum name
    pub name: String,
    /// Declared values in descriptor order
    pub values: Vec<EnumValueDescriptor>,
}

/// A single enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDescriptor {
    /// Value name
    pub name: String,
    /// Value number
    pub number: u32,
}

/// A parsed file definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDescriptor {
    /// Original file name, e.g. `demo.proto`
    pub name: String,
    /// Dot-separated package, empty when unset
    pub package: String,
    /// Top-level message definitions
    pub messages: Vec<MessageDescriptor>,
    /// Top-level enum definitions
    pub enums: Vec<EnumDescriptor>,
}

/// A parsed descriptor set: the file descriptors of one schema load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorSet {
    /// File descriptors in serialization order
    pub files: Vec<FileDescriptor>,
}

impl DescriptorSet {
    /// Parse a serialized descriptor set.
    ///
    /// The only failure mode is running off the end of the buffer (a
    /// truncated varint or a declared length exceeding the remaining
    /// bytes), plus malformed definitions such as out-of-range type or
    /// label codes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut files = Vec::new();
        let mut cur = WireCursor::new(bytes);

        while !cur.is_empty() {
            let (number, wire_type) = cur.read_tag()?;
            match (number, wire_type) {
                (1, WireType::Len) => files.push(parse_file(cur.read_len_delimited()?)?),
                _ => cur.skip(wire_type)?,
            }
        }

        debug!("parsed descriptor set: {} file(s)", files.len());
        Ok(Self { files })
    }
}

fn parse_file(bytes: &[u8]) -> Result<FileDescriptor> {
    let mut cur = WireCursor::new(bytes);
    let mut file = FileDescriptor::default();

    while !cur.is_empty() {
        let (number, wire_type) = cur.read_tag()?;
        match (number, wire_type) {
            (1, WireType::Len) => file.name = cur.read_string()?,
            (2, WireType::Len) => file.package = cur.read_string()?,
            (4, WireType::Len) => file.messages.push(parse_message(cur.read_len_delimited()?)?),
            (5, WireType::Len) => file.enums.push(parse_enum(cur.read_len_delimited()?)?),
            _ => cur.skip(wire_type)?,
        }
    }

    trace!(
        "parsed file '{}': {} message(s), {} enum(s)",
        file.name,
        file.messages.len(),
        file.enums.len()
    );
    Ok(file)
}

fn parse_message(bytes: &[u8]) -> Result<MessageDescriptor> {
    let mut cur = WireCursor::new(bytes);
    let mut message = MessageDescriptor::default();

    while !cur.is_empty() {
        let (number, wire_type) = cur.read_tag()?;
        match (number, wire_type) {
            (1, WireType::Len) => message.name = cur.read_string()?,
            (2, WireType::Len) => message.fields.push(parse_field(cur.read_len_delimited()?)?),
            (3, WireType::Len) => message.nested.push(parse_message(cur.read_len_delimited()?)?),
            (4, WireType::Len) => message.enums.push(parse_enum(cur.read_len_delimited()?)?),
            _ => cur.skip(wire_type)?,
        }
    }

    Ok(message)
}

fn parse_field(bytes: &[u8]) -> Result<FieldDescriptor> {
    let mut cur = WireCursor::new(bytes);
    let mut name = String::new();
    let mut number = None;
    let mut label = Label::Optional;
    let mut field_type = None;
    let mut type_name = None;

    while !cur.is_empty() {
        let (field, wire_type) = cur.read_tag()?;
        match (field, wire_type) {
            (1, WireType::Len) => name = cur.read_string()?,
            (3, WireType::Varint) => number = Some(cur.read_varint32()?),
            (4, WireType::Varint) => label = Label::try_from(cur.read_varint32()?)?,
            (5, WireType::Varint) => field_type = Some(FieldType::try_from(cur.read_varint32()?)?),
            (6, WireType::Len) => type_name = Some(cur.read_string()?),
            _ => cur.skip(wire_type)?,
        }
    }

    let number = number
        .ok_or_else(|| Error::invalid_descriptor(format!("field '{name}' has no number")))?;
    let field_type = field_type
        .ok_or_else(|| Error::invalid_descriptor(format!("field '{name}' has no type")))?;

    Ok(FieldDescriptor {
        name,
        number,
        label,
        field_type,
        type_name,
    })
}

fn parse_enum(bytes: &[u8]) -> Result<EnumDescriptor> {
    let mut cur = WireCursor::new(bytes);
    let mut definition = EnumDescriptor::default();

    while !cur.is_empty() {
        let (number, wire_type) = cur.read_tag()?;
        match (number, wire_type) {
            (1, WireType::Len) => definition.name = cur.read_string()?,
            (2, WireType::Len) => {
                definition
                    .values
                    .push(parse_enum_value(cur.read_len_delimited()?)?)
            }
            _ => cur.skip(wire_type)?,
        }
    }

    Ok(definition)
}

fn parse_enum_value(bytes: &[u8]) -> Result<EnumValueDescriptor> {
    let mut cur = WireCursor::new(bytes);
    let mut name = String::new();
    let mut number = 0;

    while !cur.is_empty() {
        let (field, wire_type) = cur.read_tag()?;
        match (field, wire_type) {
            (1, WireType::Len) => name = cur.read_string()?,
            (2, WireType::Varint) => number = cur.read_varint32()?,
            _ => cur.skip(wire_type)?,
        }
    }

    Ok(EnumValueDescriptor { name, number })
}

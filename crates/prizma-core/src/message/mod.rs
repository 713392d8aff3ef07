//! Decoded messages and their edit surface.
//!
//! A [`MessageValue`] is the in-memory form of one wire payload,
//! produced by [`crate::TypeRegistry::decode`], edited through the
//! label-checked accessors here, and serialized back by
//! [`MessageValue::encode`]. Storage is a field-number-keyed table of
//! element lists: a non-repeated field holds at most one element, and
//! an absent entry reads the same as an empty one.
//!
//! Every mutator validates the field number, the field's label, and the
//! supplied value's kind against the declared field type before
//! storing anything, so a value that decoded cleanly can always be
//! re-encoded. Mutations mark their field number in a touched set that
//! reads never populate; the set is bookkeeping for callers and is
//! excluded from equality.

mod codec;

use crate::descriptor::{FieldDescriptor, FieldType};
use crate::error::{Error, Result};
use crate::registry::MessageType;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One decoded field element.
///
/// The wire format collapses many declared types onto few
/// representations: every signed integral type (including enums)
/// decodes to [`FieldValue::Int`] and every unsigned one to
/// [`FieldValue::UInt`]. The declared [`FieldType`] on the message type
/// decides how an element is written back out.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit float.
    Double(f64),
    /// 32-bit float.
    Float(f32),
    /// Signed integral value (int32/64, sint32/64, sfixed32/64, enum).
    Int(i64),
    /// Unsigned integral value (uint32/64, fixed32/64).
    UInt(u64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Nested decoded message.
    Message(MessageValue),
}

impl FieldValue {
    /// Short kind label used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Double(_) => "double",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Message(_) => "message",
        }
    }
}

/// A decoded message bound to its type descriptor.
#[derive(Debug, Clone)]
pub struct MessageValue {
    ty: Arc<MessageType>,
    fields: BTreeMap<u32, Vec<FieldValue>>,
    touched: BTreeSet<u32>,
}

impl PartialEq for MessageValue {
    fn eq(&self, other: &Self) -> bool {
        // Edit tracking is bookkeeping, not content.
        self.ty.name() == other.ty.name() && self.fields == other.fields
    }
}

impl MessageValue {
    /// Creates an empty message of the given type.
    pub fn new(ty: Arc<MessageType>) -> Self {
        Self {
            ty,
            fields: BTreeMap::new(),
            touched: BTreeSet::new(),
        }
    }

    /// The message's type descriptor.
    pub fn message_type(&self) -> &Arc<MessageType> {
        &self.ty
    }

    /// Read a non-repeated field; `None` when absent.
    ///
    /// Using this on a repeated field is an error, as is an undeclared
    /// field number.
    pub fn get_field(&self, number: u32) -> Result<Option<&FieldValue>> {
        let field = self.descriptor(number)?;
        if field.label.is_repeated() {
            return Err(Error::FieldRepeated {
                type_name: self.ty.name().to_string(),
                number,
            });
        }
        Ok(self.fields.get(&number).and_then(|values| values.first()))
    }

    /// Read a repeated field's elements; empty when absent.
    ///
    /// Using this on a non-repeated field is an error, as is an
    /// undeclared field number.
    pub fn get_repeated_field(&self, number: u32) -> Result<&[FieldValue]> {
        let field = self.descriptor(number)?;
        if !field.label.is_repeated() {
            return Err(Error::FieldNotRepeated {
                type_name: self.ty.name().to_string(),
                number,
            });
        }
        Ok(self
            .fields
            .get(&number)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Replace a non-repeated field's value and mark it modified.
    ///
    /// The value's kind must match the declared field type; the label
    /// must be non-repeated.
    pub fn set_field(&mut self, number: u32, value: FieldValue) -> Result<()> {
        let ty = Arc::clone(&self.ty);
        let field = lookup(&ty, number)?;
        if field.label.is_repeated() {
            return Err(Error::FieldRepeated {
                type_name: ty.name().to_string(),
                number,
            });
        }
        check_kind(&ty, field, &value)?;
        self.fields.insert(number, vec![value]);
        self.touched.insert(number);
        Ok(())
    }

    /// Append an element to a repeated field and mark it modified.
    ///
    /// The value's kind must match the declared field type; the label
    /// must be repeated.
    pub fn add_repeated_field(&mut self, number: u32, value: FieldValue) -> Result<()> {
        let ty = Arc::clone(&self.ty);
        let field = lookup(&ty, number)?;
        if !field.label.is_repeated() {
            return Err(Error::FieldNotRepeated {
                type_name: ty.name().to_string(),
                number,
            });
        }
        check_kind(&ty, field, &value)?;
        self.fields.entry(number).or_default().push(value);
        self.touched.insert(number);
        Ok(())
    }

    /// Remove every stored element of a field and mark it modified.
    ///
    /// Works for both labels; an undeclared field number is an error.
    pub fn clear_field(&mut self, number: u32) -> Result<()> {
        let ty = Arc::clone(&self.ty);
        lookup(&ty, number)?;
        self.fields.remove(&number);
        self.touched.insert(number);
        Ok(())
    }

    /// Whether the field currently holds at least one element.
    ///
    /// Total over all numbers; undeclared numbers are simply absent.
    pub fn has_field(&self, number: u32) -> bool {
        self.fields
            .get(&number)
            .is_some_and(|values| !values.is_empty())
    }

    /// Field numbers holding at least one element, ascending.
    pub fn set_fields(&self) -> Vec<u32> {
        self.fields
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(number, _)| *number)
            .collect()
    }

    /// Field numbers recorded as modified since decode (or since the
    /// last [`Self::reset_modified_tracking`]).
    pub fn modified_fields(&self) -> &BTreeSet<u32> {
        &self.touched
    }

    /// Forget all modification records.
    pub fn reset_modified_tracking(&mut self) {
        self.touched.clear();
    }

    fn descriptor(&self, number: u32) -> Result<&FieldDescriptor> {
        lookup(&self.ty, number)
    }
}

fn lookup(ty: &MessageType, number: u32) -> Result<&FieldDescriptor> {
    ty.field(number)
        .ok_or_else(|| Error::unknown_field(ty.name(), number))
}

fn qualified(ty: &MessageType, field: &FieldDescriptor) -> String {
    format!("{}.{}", ty.name(), field.name)
}

/// Kind label a declared field type stores; `None` for group fields,
/// which are rejected before anything is stored.
fn expected_kind(field_type: FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::Double => Some("double"),
        FieldType::Float => Some("float"),
        FieldType::Int32
        | FieldType::Int64
        | FieldType::Sint32
        | FieldType::Sint64
        | FieldType::Sfixed32
        | FieldType::Sfixed64
        | FieldType::Enum => Some("int"),
        FieldType::Uint32 | FieldType::Uint64 | FieldType::Fixed32 | FieldType::Fixed64 => {
            Some("uint")
        }
        FieldType::Bool => Some("bool"),
        FieldType::String => Some("string"),
        FieldType::Bytes => Some("bytes"),
        FieldType::Message => Some("message"),
        FieldType::Group => None,
    }
}

fn check_kind(ty: &MessageType, field: &FieldDescriptor, value: &FieldValue) -> Result<()> {
    let Some(expected) = expected_kind(field.field_type) else {
        return Err(Error::GroupField {
            field: qualified(ty, field),
        });
    };
    if value.kind_name() != expected {
        return Err(Error::ValueKindMismatch {
            field: qualified(ty, field),
            expected,
            actual: value.kind_name(),
        });
    }
    Ok(())
}

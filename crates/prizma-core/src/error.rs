//! Error types for the prizma-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.
//!
//! Errors fall into two thrown classes: parse/decode errors (truncated input,
//! unknown wire types, unresolvable message types) and misuse errors (wrong
//! accessor for a field's label, value kind mismatch on a typed set). Schema
//! validation problems are *not* represented here; they are collected as
//! plain messages by [`crate::schema::Schema::validate`] so a caller can
//! report every dangling reference in one pass.

use crate::descriptor::WireType;
use thiserror::Error;

/// Result type alias for prizma operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all prizma-core operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input ended before a read completed
    #[error("truncated input at offset {offset}: {needed} more byte(s) needed")]
    Truncated {
        /// Byte offset where the read started
        offset: usize,
        /// Number of bytes missing
        needed: usize,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// Tag carried a wire type code outside the protobuf set
    #[error("unknown wire type: {value}")]
    InvalidWireType {
        /// The unrecognized 3-bit code
        value: u8,
    },

    /// Group wire types are not supported
    #[error("unsupported wire type {wire_type} (group encoding)")]
    UnsupportedWireType {
        /// The group wire type encountered
        wire_type: WireType,
    },

    /// Descriptor bytes carried a malformed definition
    #[error("invalid descriptor: {details}")]
    InvalidDescriptor {
        /// Detailed description of the issue
        details: String,
    },

    /// A type name was not present in the registry
    #[error("type '{name}' not found in registry")]
    UnknownType {
        /// The fully-qualified name that failed to resolve
        name: String,
    },

    /// Payload wire type disagreed with the field's declared type
    #[error("wire type mismatch for field '{field}': expected {expected}, got {actual}")]
    WireTypeMismatch {
        /// Qualified field description, e.g. `.pkg.Msg.name`
        field: String,
        /// Wire type implied by the declared field type
        expected: WireType,
        /// Wire type found in the payload
        actual: WireType,
    },

    /// A field declared with the legacy group type was encountered
    #[error("group-typed field '{field}' is not supported")]
    GroupField {
        /// Qualified field description
        field: String,
    },

    /// Singular accessor used on a repeated field
    #[error("field {number} of '{type_name}' is repeated; use the repeated accessors")]
    FieldRepeated {
        /// Owning message type name
        type_name: String,
        /// Field number
        number: u32,
    },

    /// Repeated accessor used on a singular field
    #[error("field {number} of '{type_name}' is not repeated")]
    FieldNotRepeated {
        /// Owning message type name
        type_name: String,
        /// Field number
        number: u32,
    },

    /// Field number not declared by the message type
    #[error("message type '{type_name}' has no field {number}")]
    UnknownField {
        /// Owning message type name
        type_name: String,
        /// The undeclared field number
        number: u32,
    },

    /// Supplied value does not match the field's declared kind
    #[error("value kind mismatch for field '{field}': expected {expected}, got {actual}")]
    ValueKindMismatch {
        /// Qualified field description
        field: String,
        /// Kind implied by the declared field type
        expected: &'static str,
        /// Kind of the supplied value
        actual: &'static str,
    },
}

impl Error {
    /// Creates a new truncated-input error
    pub fn truncated(offset: usize, needed: usize) -> Self {
        Self::Truncated { offset, needed }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new invalid descriptor error
    pub fn invalid_descriptor(details: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            details: details.into(),
        }
    }

    /// Creates a new unknown type error
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates a new wire type mismatch error
    pub fn wire_type_mismatch(
        field: impl Into<String>,
        expected: WireType,
        actual: WireType,
    ) -> Self {
        Self::WireTypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Creates a new unknown field error
    pub fn unknown_field(type_name: impl Into<String>, number: u32) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            number,
        }
    }

    /// Returns true if this error indicates API misuse (wrong accessor for a
    /// field's label, or a value that does not match the declared kind)
    /// rather than malformed input.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::FieldRepeated { .. }
                | Self::FieldNotRepeated { .. }
                | Self::UnknownField { .. }
                | Self::ValueKindMismatch { .. }
        )
    }
}

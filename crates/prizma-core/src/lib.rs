//! # prizma-core
//!
//! A schema-driven decode/edit/encode core for Protocol Buffer payloads.
//!
//! This crate provides the core functionality for:
//! - Parsing serialized descriptor sets without a protobuf runtime
//! - Decoding arbitrary wire payloads against a registered message type
//! - Editing decoded messages through label- and kind-checked accessors
//! - Re-encoding edited messages deterministically
//! - Projecting descriptor types into a protocol-neutral schema model
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`descriptor`]: Wire primitives and the standalone descriptor-set parser
//! - [`registry`]: Flat, name-addressable type tables
//! - [`message`]: Decoded values, the mutation API, and the wire codec
//! - [`schema`]: Neutral schema/value model, defaults, validation, JSON
//! - [`adapt`]: Registry-to-schema projection
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use prizma_core::{FieldValue, TypeRegistry};
//! use std::fs;
//!
//! // Load a compiled descriptor set and build the type tables
//! let descriptors = fs::read("./schema.desc")?;
//! let registry = TypeRegistry::from_bytes(&descriptors)?;
//!
//! // Decode a payload against one of its message types
//! let payload = fs::read("./order.bin")?;
//! let mut order = registry.decode(".shop.Order", &payload)?;
//!
//! // Edit and write back out
//! order.set_field(5, FieldValue::Double(19.99))?;
//! fs::write("./order-edited.bin", order.encode())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod adapt;
pub mod descriptor;
pub mod error;
pub mod message;
pub mod registry;
pub mod schema;

// Re-export primary types for convenience
pub use adapt::project_schema;
pub use descriptor::DescriptorSet;
pub use error::{Error, Result};
pub use message::{FieldValue, MessageValue};
pub use registry::{EnumType, MessageType, TypeRegistry};
pub use schema::{value_equals, value_to_json, Annotations, Schema, Type, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

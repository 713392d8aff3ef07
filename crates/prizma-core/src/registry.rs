//! Flat, name-addressable type tables built from parsed descriptors.
//!
//! The registry walks a [`DescriptorSet`] and inserts every message and
//! enum definition, top-level or nested, as an independent entry under
//! its fully-qualified name (dot-separated with a leading dot, e.g.
//! `.pkg.Outer.Inner`). Nested definitions are *not* kept as a nested
//! structure: flattening makes every later lookup a single map access
//! instead of a namespace walk.
//!
//! A registry is built once per schema load and read-only afterward.
//! Entries are handed out as [`Arc`]s, so decoded message values can
//! keep their type descriptor alive without copying it and the registry
//! can be shared across any number of concurrent decode calls.

use crate::descriptor::{DescriptorSet, EnumDescriptor, FieldDescriptor, MessageDescriptor};
use crate::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// An immutable message type: field table plus name index.
#[derive(Debug)]
pub struct MessageType {
    name: String,
    fields: BTreeMap<u32, FieldDescriptor>,
    field_names: HashMap<String, u32>,
}

impl MessageType {
    /// Fully-qualified type name, leading dot included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a field by number.
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.get(&number)
    }

    /// Resolve a field name to its number.
    pub fn field_number(&self, name: &str) -> Option<u32> {
        self.field_names.get(name).copied()
    }

    /// Look up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_number(name).and_then(|n| self.field(n))
    }

    /// Iterate fields in ascending field-number order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Number of declared fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// An immutable enum type: declaration-ordered values plus
/// bidirectional lookup.
///
/// Declaration order is kept because it is meaningful: the first
/// declared value is the enum's default.
#[derive(Debug)]
pub struct EnumType {
    name: String,
    values: Vec<(String, u32)>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl EnumType {
    /// Fully-qualified type name, leading dot included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a value number to its name.
    pub fn value_name(&self, number: u32) -> Option<&str> {
        self.by_number
            .get(&number)
            .map(|&index| self.values[index].0.as_str())
    }

    /// Resolve a value name to its number.
    pub fn value_number(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&index| self.values[index].1)
    }

    /// Iterate `(number, name)` pairs in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (u32, &str)> {
        self.values
            .iter()
            .map(|(name, number)| (*number, name.as_str()))
    }
}

/// Flat tables of message and enum types keyed by fully-qualified name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    messages: HashMap<String, Arc<MessageType>>,
    enums: HashMap<String, Arc<EnumType>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized descriptor set and build a registry from it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_descriptor_set(DescriptorSet::parse(bytes)?))
    }

    /// Build a registry from one parsed descriptor set.
    pub fn from_descriptor_set(set: DescriptorSet) -> Self {
        let mut registry = Self::new();
        registry.add_descriptor_set(set);
        registry
    }

    /// Register every definition of `set`.
    ///
    /// Intended for the construction phase only; a schema load may span
    /// several descriptor-set files. Re-registering an existing name
    /// replaces the previous entry.
    pub fn add_descriptor_set(&mut self, set: DescriptorSet) {
        for file in set.files {
            let prefix = if file.package.is_empty() {
                String::new()
            } else {
                format!(".{}", file.package)
            };
            for message in file.messages {
                self.register_message(&prefix, message);
            }
            for definition in file.enums {
                self.register_enum(&prefix, definition);
            }
        }
    }

    fn register_message(&mut self, prefix: &str, message: MessageDescriptor) {
        let name = format!("{prefix}.{}", message.name);

        for nested in message.nested {
            self.register_message(&name, nested);
        }
        for definition in message.enums {
            self.register_enum(&name, definition);
        }

        let mut fields = BTreeMap::new();
        let mut field_names = HashMap::new();
        for field in message.fields {
            field_names.insert(field.name.clone(), field.number);
            fields.insert(field.number, field);
        }

        let entry = MessageType {
            name: name.clone(),
            fields,
            field_names,
        };
        if self.messages.insert(name.clone(), Arc::new(entry)).is_some() {
            debug!("replaced message type '{}'", name);
        }
    }

    fn register_enum(&mut self, prefix: &str, definition: EnumDescriptor) {
        let name = format!("{prefix}.{}", definition.name);

        let mut values = Vec::with_capacity(definition.values.len());
        let mut by_number = HashMap::new();
        let mut by_name = HashMap::new();
        for value in definition.values {
            let index = values.len();
            by_number.insert(value.number, index);
            by_name.insert(value.name.clone(), index);
            values.push((value.name, value.number));
        }

        let entry = EnumType {
            name: name.clone(),
            values,
            by_number,
            by_name,
        };
        if self.enums.insert(name.clone(), Arc::new(entry)).is_some() {
            debug!("replaced enum type '{}'", name);
        }
    }

    /// Look up a message type by its fully-qualified (leading-dot) name.
    pub fn message_type(&self, name: &str) -> Option<&Arc<MessageType>> {
        self.messages.get(name)
    }

    /// Look up an enum type by its fully-qualified (leading-dot) name.
    pub fn enum_type(&self, name: &str) -> Option<&Arc<EnumType>> {
        self.enums.get(name)
    }

    /// Iterate all registered message types (unordered).
    pub fn message_types(&self) -> impl Iterator<Item = &Arc<MessageType>> {
        self.messages.values()
    }

    /// Iterate all registered enum types (unordered).
    pub fn enum_types(&self) -> impl Iterator<Item = &Arc<EnumType>> {
        self.enums.values()
    }

    /// Number of registered message types.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of registered enum types.
    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }
}

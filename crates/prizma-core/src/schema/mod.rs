//! Protocol-neutral structural model.
//!
//! Nothing in this module knows about protobuf: types are products,
//! sums, lists, maps, optionals and primitives, wired together by name
//! through [`Type::Ref`]. The adapter in
//! [`crate::adapt`] projects a [`crate::TypeRegistry`] into this shape;
//! consumers that render or diff schemas work against this model and
//! never see descriptors.
//!
//! A [`Schema`] is a snapshot. Nothing here mutates after construction;
//! editing happens on decoded message values, not on the model.

mod value;

pub use value::{value_equals, value_to_json, Value};

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};

/// Scalar kinds the model can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    Str,
    /// Raw byte string.
    Bytes,
}

/// A structural type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// A scalar.
    Primitive(Primitive),
    /// A record with named fields.
    Product(ProductType),
    /// A tagged choice between named variants.
    Sum(SumType),
    /// An ordered collection of one element type.
    List(Box<Type>),
    /// A keyed collection; keys may be any type.
    Map {
        /// Key type.
        key: Box<Type>,
        /// Value type.
        value: Box<Type>,
    },
    /// An explicitly absent-or-present wrapper.
    Optional(Box<Type>),
    /// A by-name reference to a definition in the owning [`Schema`].
    Ref(String),
}

/// A record type; field order is declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductType {
    /// Fields keyed by id, in declaration order.
    pub fields: IndexMap<String, ProductField>,
}

/// One field of a [`ProductType`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductField {
    /// The field's type.
    pub ty: Type,
    /// Source numbering, when the origin format has one.
    pub number: Option<u32>,
    /// Whether the source marked the field deprecated.
    pub deprecated: bool,
}

/// A tagged-choice type; variant order is declaration order, and the
/// first declared variant is the type's default.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SumType {
    /// Variants keyed by tag, in declaration order.
    pub variants: IndexMap<String, SumVariant>,
}

/// One variant of a [`SumType`].
#[derive(Debug, Clone, PartialEq)]
pub struct SumVariant {
    /// Payload type; data-less variants carry none.
    pub payload: Option<Type>,
    /// Source numbering, when the origin format has one.
    pub number: Option<u32>,
}

/// A closed set of named type definitions plus an optional entry point.
///
/// Ids are opaque to this module; the adapter uses fully-qualified
/// descriptor names, but nothing here depends on that.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// Definitions keyed by id.
    pub types: BTreeMap<String, Type>,
    /// Id of the designated root type, if any.
    pub root: Option<String>,
}

/// Display metadata kept outside the structural model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotations {
    /// Entries keyed by type id, or `"{type-id}.{member}"` for fields
    /// and variants.
    pub entries: BTreeMap<String, Annotation>,
}

/// Presentation data for one schema element.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Human-readable display name.
    pub name: String,
    /// Documentation text, when the source carried any.
    pub doc: Option<String>,
}

impl Annotations {
    /// Look up the annotation for a type id or `"{type-id}.{member}"` key.
    pub fn get(&self, key: &str) -> Option<&Annotation> {
        self.entries.get(key)
    }
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a definition by id: a single hop, no chain following.
    pub fn resolve_ref(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// Follow `ty` through any chain of [`Type::Ref`]s to a non-ref type.
    ///
    /// Returns `None` when a name in the chain is undefined or the chain
    /// is cyclic; resolution never loops.
    pub fn resolve_type<'a>(&'a self, ty: &'a Type) -> Option<&'a Type> {
        let mut seen = HashSet::new();
        let mut current = ty;
        while let Type::Ref(name) = current {
            if !seen.insert(name.as_str()) {
                return None;
            }
            current = self.types.get(name)?;
        }
        Some(current)
    }

    /// Produce the default value for a type.
    ///
    /// Primitives default to their zero value, products to a record of
    /// recursively defaulted fields, sums to their first declared
    /// variant (payload defaulted when present), lists and maps to
    /// empty collections, optionals to [`Value::Null`]. Refs resolve
    /// one level and recurse; an undefined name, a cyclic chain, or an
    /// empty sum produces [`Value::Null`].
    pub fn default_value(&self, ty: &Type) -> Value {
        let mut chain = HashSet::new();
        self.default_value_inner(ty, &mut chain)
    }

    fn default_value_inner(&self, ty: &Type, chain: &mut HashSet<String>) -> Value {
        match ty {
            Type::Primitive(primitive) => match primitive {
                Primitive::Bool => Value::Bool(false),
                Primitive::I32 => Value::I32(0),
                Primitive::I64 => Value::I64(0),
                Primitive::U32 => Value::U32(0),
                Primitive::U64 => Value::U64(0),
                Primitive::F32 => Value::F32(0.0),
                Primitive::F64 => Value::F64(0.0),
                Primitive::Str => Value::Str(String::new()),
                Primitive::Bytes => Value::Bytes(Vec::new()),
            },
            Type::Product(product) => {
                let mut fields = IndexMap::new();
                for (id, field) in &product.fields {
                    fields.insert(id.clone(), self.default_value_inner(&field.ty, chain));
                }
                Value::Product(fields)
            }
            Type::Sum(sum) => match sum.variants.first() {
                Some((tag, variant)) => Value::Sum {
                    tag: tag.clone(),
                    payload: variant
                        .payload
                        .as_ref()
                        .map(|payload| Box::new(self.default_value_inner(payload, chain))),
                },
                None => Value::Null,
            },
            Type::List(_) => Value::List(Vec::new()),
            Type::Map { .. } => Value::Map(Vec::new()),
            Type::Optional(_) => Value::Null,
            Type::Ref(name) => {
                // The chain set holds only the refs on the current
                // descent path, so two sibling fields may both default
                // the same target while a cycle still bottoms out.
                if !chain.insert(name.clone()) {
                    return Value::Null;
                }
                let value = match self.types.get(name) {
                    Some(target) => self.default_value_inner(target, chain),
                    None => Value::Null,
                };
                chain.remove(name);
                value
            }
        }
    }

    /// Check every definition (and the root id) for dangling references.
    ///
    /// Returns one message per problem and never stops early; an empty
    /// vector means the schema is closed. Refs are checked for
    /// existence, not traversed, so cyclic schemas validate fine.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(root) = &self.root {
            if !self.types.contains_key(root) {
                problems.push(format!("root type '{root}' is not defined"));
            }
        }
        for (id, ty) in &self.types {
            self.check_type(id, ty, &mut problems);
        }
        problems
    }

    fn check_type(&self, path: &str, ty: &Type, problems: &mut Vec<String>) {
        match ty {
            Type::Primitive(_) => {}
            Type::Product(product) => {
                for (field_id, field) in &product.fields {
                    let field_path = format!("{path}.{field_id}");
                    self.check_type(&field_path, &field.ty, problems);
                }
            }
            Type::Sum(sum) => {
                for (variant_id, variant) in &sum.variants {
                    if let Some(payload) = &variant.payload {
                        let variant_path = format!("{path}.{variant_id}");
                        self.check_type(&variant_path, payload, problems);
                    }
                }
            }
            Type::List(element) => self.check_type(path, element, problems),
            Type::Map { key, value } => {
                self.check_type(path, key, problems);
                self.check_type(path, value, problems);
            }
            Type::Optional(inner) => self.check_type(path, inner, problems),
            Type::Ref(name) => {
                if !self.types.contains_key(name) {
                    problems.push(format!("{path}: reference to undefined type '{name}'"));
                }
            }
        }
    }
}

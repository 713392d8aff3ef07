//! Projection from descriptor types into the neutral schema model.
//!
//! The projection is total and shallow: every registered message
//! becomes a product, every registered enum a data-less sum, and
//! cross-type references stay by-name [`Type::Ref`]s into the
//! registry's own id space (fully-qualified leading-dot names, which
//! cannot collide between the two tables). Nothing is resolved here;
//! [`Schema::validate`] is the place to learn about dangling names.

use crate::descriptor::{FieldDescriptor, FieldType};
use crate::registry::{EnumType, MessageType, TypeRegistry};
use crate::schema::{
    Annotation, Annotations, Primitive, ProductField, ProductType, Schema, SumType, SumVariant,
    Type,
};
use indexmap::IndexMap;
use tracing::debug;

/// Project a registry into a [`Schema`] plus display [`Annotations`].
///
/// `root` is recorded on the schema as given (normalized by the caller)
/// and is not checked for existence; a dangling root is a validation
/// finding, not a projection error.
///
/// Every type id gets an annotation whose display name is the trailing
/// path segment; every field and variant gets one under
/// `"{type-id}.{member}"`.
pub fn project_schema(registry: &TypeRegistry, root: Option<&str>) -> (Schema, Annotations) {
    let mut schema = Schema::new();
    let mut annotations = Annotations::default();

    for message in registry.message_types() {
        let ty = project_message(message, &mut annotations);
        schema.types.insert(message.name().to_string(), ty);
        annotate_type(&mut annotations, message.name());
    }
    for definition in registry.enum_types() {
        let ty = project_enum(definition, &mut annotations);
        schema.types.insert(definition.name().to_string(), ty);
        annotate_type(&mut annotations, definition.name());
    }
    schema.root = root.map(String::from);

    debug!(
        "projected {} message type(s) and {} enum type(s)",
        registry.message_count(),
        registry.enum_count()
    );
    (schema, annotations)
}

fn project_message(message: &MessageType, annotations: &mut Annotations) -> Type {
    let mut fields = IndexMap::new();
    for field in message.fields() {
        fields.insert(
            field.name.clone(),
            ProductField {
                ty: field_type(field),
                number: Some(field.number),
                deprecated: false,
            },
        );
        annotations.entries.insert(
            format!("{}.{}", message.name(), field.name),
            Annotation {
                name: field.name.clone(),
                doc: None,
            },
        );
    }
    Type::Product(ProductType { fields })
}

fn project_enum(definition: &EnumType, annotations: &mut Annotations) -> Type {
    let mut variants = IndexMap::new();
    for (number, name) in definition.values() {
        variants.insert(
            name.to_string(),
            SumVariant {
                payload: None,
                number: Some(number),
            },
        );
        annotations.entries.insert(
            format!("{}.{}", definition.name(), name),
            Annotation {
                name: name.to_string(),
                doc: None,
            },
        );
    }
    Type::Sum(SumType { variants })
}

/// Collapse a field's declared type onto the model; repeated fields
/// wrap their element type in a list.
fn field_type(field: &FieldDescriptor) -> Type {
    let base = match field.field_type {
        FieldType::Double => Type::Primitive(Primitive::F64),
        FieldType::Float => Type::Primitive(Primitive::F32),
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => {
            Type::Primitive(Primitive::I32)
        }
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => {
            Type::Primitive(Primitive::I64)
        }
        FieldType::Uint32 | FieldType::Fixed32 => Type::Primitive(Primitive::U32),
        FieldType::Uint64 | FieldType::Fixed64 => Type::Primitive(Primitive::U64),
        FieldType::Bool => Type::Primitive(Primitive::Bool),
        FieldType::String => Type::Primitive(Primitive::Str),
        FieldType::Bytes => Type::Primitive(Primitive::Bytes),
        FieldType::Message | FieldType::Enum | FieldType::Group => {
            Type::Ref(field.type_name.clone().unwrap_or_default())
        }
    };
    if field.label.is_repeated() {
        Type::List(Box::new(base))
    } else {
        base
    }
}

fn annotate_type(annotations: &mut Annotations, type_id: &str) {
    let display = type_id.rsplit('.').next().unwrap_or(type_id);
    annotations.entries.insert(
        type_id.to_string(),
        Annotation {
            name: display.to_string(),
            doc: None,
        },
    );
}

//! Wire-format decode and encode for message values.
//!
//! Decoding is schema-driven: the registry supplies the field table for
//! the target type, undeclared field numbers are skipped, and nested
//! messages are resolved through the registry by their declared type
//! name. Encoding walks the stored field table in ascending number
//! order, so output bytes depend only on content, not on edit history.

use crate::descriptor::{write_tag, write_varint, FieldDescriptor, FieldType, WireCursor, WireType};
use crate::error::{Error, Result};
use crate::message::{qualified, FieldValue, MessageValue};
use crate::registry::{MessageType, TypeRegistry};
use bytes::BufMut;
use std::sync::Arc;
use tracing::{debug, trace};

impl TypeRegistry {
    /// Decode a wire payload as the named message type.
    ///
    /// The type name must be a fully-qualified, leading-dot registry
    /// key. Undeclared field numbers in the payload are skipped; a
    /// declared field whose payload wire type contradicts its declared
    /// type is an error, as is a nested-message type name the registry
    /// cannot resolve.
    ///
    /// One fallback: when direct decoding fails with a wire-type
    /// mismatch, the payload is assumed to carry a length-delimited
    /// envelope (a varint length at offset zero), the envelope is
    /// stripped, and decoding runs once more. Any other error, and any
    /// error from the second attempt, propagates unchanged.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<MessageValue> {
        let ty = self
            .message_type(type_name)
            .ok_or_else(|| Error::unknown_type(type_name))?;
        debug!("decoding {} byte(s) as '{}'", bytes.len(), type_name);
        match self.decode_message(ty, bytes) {
            Ok(message) => Ok(message),
            Err(Error::WireTypeMismatch { .. }) => {
                debug!("wire type mismatch; retrying with envelope stripped");
                let mut cursor = WireCursor::new(bytes);
                let inner = cursor.read_len_delimited()?;
                self.decode_message(ty, inner)
            }
            Err(err) => Err(err),
        }
    }

    fn decode_message(&self, ty: &Arc<MessageType>, bytes: &[u8]) -> Result<MessageValue> {
        let mut message = MessageValue::new(Arc::clone(ty));
        let mut cursor = WireCursor::new(bytes);
        while !cursor.is_empty() {
            let (number, wire_type) = cursor.read_tag()?;
            let Some(field) = ty.field(number) else {
                trace!("skipping undeclared field {} in '{}'", number, ty.name());
                cursor.skip(wire_type)?;
                continue;
            };
            let value = self.read_field(ty, field, wire_type, &mut cursor)?;
            if field.label.is_repeated() {
                message.fields.entry(number).or_default().push(value);
            } else {
                message.fields.insert(number, vec![value]);
            }
        }
        Ok(message)
    }

    fn read_field(
        &self,
        ty: &MessageType,
        field: &FieldDescriptor,
        actual: WireType,
        cursor: &mut WireCursor<'_>,
    ) -> Result<FieldValue> {
        let Some(expected) = field.field_type.wire_type() else {
            return Err(Error::GroupField {
                field: qualified(ty, field),
            });
        };
        if actual != expected {
            return Err(Error::wire_type_mismatch(
                qualified(ty, field),
                expected,
                actual,
            ));
        }
        match field.field_type {
            FieldType::Double => Ok(FieldValue::Double(f64::from_bits(cursor.read_fixed64()?))),
            FieldType::Float => Ok(FieldValue::Float(f32::from_bits(cursor.read_fixed32()?))),
            FieldType::Int32 | FieldType::Int64 => {
                Ok(FieldValue::Int(cursor.read_varint()? as i64))
            }
            FieldType::Sint32 | FieldType::Sint64 => {
                Ok(FieldValue::Int(zigzag_decode(cursor.read_varint()?)))
            }
            FieldType::Uint32 | FieldType::Uint64 => Ok(FieldValue::UInt(cursor.read_varint()?)),
            FieldType::Fixed32 => Ok(FieldValue::UInt(u64::from(cursor.read_fixed32()?))),
            FieldType::Fixed64 => Ok(FieldValue::UInt(cursor.read_fixed64()?)),
            FieldType::Sfixed32 => Ok(FieldValue::Int(i64::from(cursor.read_fixed32()? as i32))),
            FieldType::Sfixed64 => Ok(FieldValue::Int(cursor.read_fixed64()? as i64)),
            FieldType::Bool => Ok(FieldValue::Bool(cursor.read_varint()? != 0)),
            FieldType::Enum => Ok(FieldValue::Int(cursor.read_varint()? as i64)),
            FieldType::String => Ok(FieldValue::Str(cursor.read_string()?)),
            FieldType::Bytes => Ok(FieldValue::Bytes(cursor.read_len_delimited()?.to_vec())),
            FieldType::Message => {
                let name = field.type_name.as_deref().unwrap_or_default();
                let nested = self
                    .message_type(name)
                    .ok_or_else(|| Error::unknown_type(name))?;
                let nested_bytes = cursor.read_len_delimited()?;
                Ok(FieldValue::Message(self.decode_message(nested, nested_bytes)?))
            }
            FieldType::Group => Err(Error::GroupField {
                field: qualified(ty, field),
            }),
        }
    }
}

impl MessageValue {
    /// Serialize to wire bytes.
    ///
    /// Fields are written in ascending field-number order regardless of
    /// the order edits happened in. Never fails: everything in the
    /// field table was kind-checked on the way in.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (number, values) in &self.fields {
            let Some(field) = self.ty.field(*number) else {
                continue;
            };
            for value in values {
                encode_field(&mut buf, *number, field, value);
            }
        }
        buf
    }
}

fn encode_field(buf: &mut Vec<u8>, number: u32, field: &FieldDescriptor, value: &FieldValue) {
    // Kind checks on decode and on every mutator keep the pairs below
    // exhaustive for stored data; anything else writes nothing.
    match (field.field_type, value) {
        (FieldType::Double, FieldValue::Double(v)) => {
            write_tag(buf, number, WireType::I64);
            buf.put_f64_le(*v);
        }
        (FieldType::Float, FieldValue::Float(v)) => {
            write_tag(buf, number, WireType::I32);
            buf.put_f32_le(*v);
        }
        (FieldType::Int32 | FieldType::Int64 | FieldType::Enum, FieldValue::Int(v)) => {
            write_tag(buf, number, WireType::Varint);
            write_varint(buf, *v as u64);
        }
        (FieldType::Sint32 | FieldType::Sint64, FieldValue::Int(v)) => {
            write_tag(buf, number, WireType::Varint);
            write_varint(buf, zigzag_encode(*v));
        }
        (FieldType::Uint32 | FieldType::Uint64, FieldValue::UInt(v)) => {
            write_tag(buf, number, WireType::Varint);
            write_varint(buf, *v);
        }
        (FieldType::Fixed32, FieldValue::UInt(v)) => {
            write_tag(buf, number, WireType::I32);
            buf.put_u32_le(*v as u32);
        }
        (FieldType::Fixed64, FieldValue::UInt(v)) => {
            write_tag(buf, number, WireType::I64);
            buf.put_u64_le(*v);
        }
        (FieldType::Sfixed32, FieldValue::Int(v)) => {
            write_tag(buf, number, WireType::I32);
            buf.put_i32_le(*v as i32);
        }
        (FieldType::Sfixed64, FieldValue::Int(v)) => {
            write_tag(buf, number, WireType::I64);
            buf.put_i64_le(*v);
        }
        (FieldType::Bool, FieldValue::Bool(v)) => {
            write_tag(buf, number, WireType::Varint);
            write_varint(buf, u64::from(*v));
        }
        (FieldType::String, FieldValue::Str(v)) => {
            write_tag(buf, number, WireType::Len);
            write_varint(buf, v.len() as u64);
            buf.put_slice(v.as_bytes());
        }
        (FieldType::Bytes, FieldValue::Bytes(v)) => {
            write_tag(buf, number, WireType::Len);
            write_varint(buf, v.len() as u64);
            buf.put_slice(v);
        }
        (FieldType::Message, FieldValue::Message(v)) => {
            let nested = v.encode();
            write_tag(buf, number, WireType::Len);
            write_varint(buf, nested.len() as u64);
            buf.put_slice(&nested);
        }
        _ => {}
    }
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorSet, EnumDescriptor, EnumValueDescriptor, FileDescriptor, Label, MessageDescriptor};
    use pretty_assertions::assert_eq;

    fn field(
        name: &str,
        number: u32,
        label: Label,
        field_type: FieldType,
        type_name: Option<&str>,
    ) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into(),
            number,
            label,
            field_type,
            type_name: type_name.map(String::from),
        }
    }

    fn blob_fields() -> Vec<FieldDescriptor> {
        use FieldType::*;
        use Label::{Optional, Repeated};
        vec![
            field("title", 1, Optional, String, None),
            field("count", 2, Optional, Int32, None),
            field("delta", 3, Optional, Sint64, None),
            field("mask", 4, Optional, Uint32, None),
            field("ok", 5, Optional, Bool, None),
            field("items", 6, Repeated, Message, Some(".demo.Item")),
            field("ratio", 7, Optional, Double, None),
            field("speed", 8, Optional, Float, None),
            field("tick", 9, Optional, Fixed32, None),
            field("stamp", 10, Optional, Fixed64, None),
            field("off32", 11, Optional, Sfixed32, None),
            field("off64", 12, Optional, Sfixed64, None),
            field("raw", 13, Optional, Bytes, None),
            field("status", 14, Optional, Enum, Some(".demo.Status")),
            field("small", 15, Optional, Sint32, None),
            field("big", 16, Optional, Uint64, None),
            field("wide", 17, Optional, Int64, None),
        ]
    }

    fn demo_registry() -> TypeRegistry {
        TypeRegistry::from_descriptor_set(DescriptorSet {
            files: vec![FileDescriptor {
                name: "demo.proto".into(),
                package: "demo".into(),
                messages: vec![
                    MessageDescriptor {
                        name: "Blob".into(),
                        fields: blob_fields(),
                        ..Default::default()
                    },
                    MessageDescriptor {
                        name: "Item".into(),
                        fields: vec![field("name", 1, Label::Optional, FieldType::String, None)],
                        ..Default::default()
                    },
                ],
                enums: vec![EnumDescriptor {
                    name: "Status".into(),
                    values: vec![
                        EnumValueDescriptor {
                            name: "UNKNOWN".into(),
                            number: 0,
                        },
                        EnumValueDescriptor {
                            name: "OK".into(),
                            number: 1,
                        },
                    ],
                }],
            }],
        })
    }

    fn len_prefixed(buf: &mut Vec<u8>, number: u32, payload: &[u8]) {
        write_tag(buf, number, WireType::Len);
        write_varint(buf, payload.len() as u64);
        buf.extend_from_slice(payload);
    }

    fn item_bytes(name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        len_prefixed(&mut buf, 1, name.as_bytes());
        buf
    }

    #[test]
    fn test_clear_and_readd_reproduces_decoded_value() {
        let registry = demo_registry();
        let mut payload = Vec::new();
        len_prefixed(&mut payload, 1, b"xxx");
        for name in ["red", "green", "blue"] {
            len_prefixed(&mut payload, 6, &item_bytes(name));
        }

        let mut decoded = registry.decode(".demo.Blob", &payload).unwrap();
        assert_eq!(
            decoded.get_field(1).unwrap(),
            Some(&FieldValue::Str("xxx".into()))
        );
        let items = decoded.get_repeated_field(6).unwrap().to_vec();
        assert_eq!(items.len(), 3);
        match &items[1] {
            FieldValue::Message(item) => {
                assert_eq!(
                    item.get_field(1).unwrap(),
                    Some(&FieldValue::Str("green".into()))
                );
            }
            other => panic!("expected message element, got {other:?}"),
        }

        decoded.clear_field(6).unwrap();
        assert!(!decoded.has_field(6));
        for item in items {
            decoded.add_repeated_field(6, item).unwrap();
        }

        let reference = registry.decode(".demo.Blob", &payload).unwrap();
        assert_eq!(decoded, reference);

        let recoded = registry.decode(".demo.Blob", &decoded.encode()).unwrap();
        assert_eq!(recoded, reference);
    }

    #[test]
    fn test_round_trip_covers_every_scalar_kind() {
        let registry = demo_registry();
        let mut item =
            MessageValue::new(Arc::clone(registry.message_type(".demo.Item").unwrap()));
        item.set_field(1, FieldValue::Str("zrno".into())).unwrap();

        let mut value =
            MessageValue::new(Arc::clone(registry.message_type(".demo.Blob").unwrap()));
        value.set_field(1, FieldValue::Str("naslov".into())).unwrap();
        value.set_field(2, FieldValue::Int(-5)).unwrap();
        value.set_field(3, FieldValue::Int(-9_000_000_000)).unwrap();
        value.set_field(4, FieldValue::UInt(u64::from(u32::MAX))).unwrap();
        value.set_field(5, FieldValue::Bool(true)).unwrap();
        value
            .add_repeated_field(6, FieldValue::Message(item))
            .unwrap();
        value.set_field(7, FieldValue::Double(-2.5)).unwrap();
        value.set_field(8, FieldValue::Float(0.25)).unwrap();
        value.set_field(9, FieldValue::UInt(7)).unwrap();
        value.set_field(10, FieldValue::UInt(1 << 40)).unwrap();
        value.set_field(11, FieldValue::Int(-1)).unwrap();
        value.set_field(12, FieldValue::Int(i64::MIN)).unwrap();
        value.set_field(13, FieldValue::Bytes(vec![0, 255, 7])).unwrap();
        value.set_field(14, FieldValue::Int(1)).unwrap();
        value.set_field(15, FieldValue::Int(-64)).unwrap();
        value.set_field(16, FieldValue::UInt(u64::MAX)).unwrap();
        value.set_field(17, FieldValue::Int(i64::MIN)).unwrap();

        let decoded = registry.decode(".demo.Blob", &value.encode()).unwrap();
        assert_eq!(decoded, value);

        // And once more through bytes.
        let again = registry.decode(".demo.Blob", &decoded.encode()).unwrap();
        assert_eq!(again, value);
    }

    #[test]
    fn test_undeclared_fields_are_skipped() {
        let registry = demo_registry();
        let mut payload = Vec::new();
        len_prefixed(&mut payload, 1, b"keep");
        write_tag(&mut payload, 99, WireType::Varint);
        write_varint(&mut payload, 1234);
        write_tag(&mut payload, 100, WireType::I32);
        payload.extend_from_slice(&7u32.to_le_bytes());
        write_tag(&mut payload, 101, WireType::Len);
        write_varint(&mut payload, 3);
        payload.extend_from_slice(b"abc");
        write_tag(&mut payload, 102, WireType::I64);
        payload.extend_from_slice(&9u64.to_le_bytes());
        write_tag(&mut payload, 2, WireType::Varint);
        write_varint(&mut payload, 7);

        let decoded = registry.decode(".demo.Blob", &payload).unwrap();
        assert_eq!(
            decoded.get_field(1).unwrap(),
            Some(&FieldValue::Str("keep".into()))
        );
        assert_eq!(decoded.get_field(2).unwrap(), Some(&FieldValue::Int(7)));
        assert_eq!(decoded.set_fields(), vec![1, 2]);
    }

    #[test]
    fn test_singular_overwrites_and_repeated_appends() {
        let registry = demo_registry();
        let mut payload = Vec::new();
        len_prefixed(&mut payload, 1, b"first");
        len_prefixed(&mut payload, 1, b"second");
        len_prefixed(&mut payload, 6, &item_bytes("a"));
        len_prefixed(&mut payload, 6, &item_bytes("b"));

        let decoded = registry.decode(".demo.Blob", &payload).unwrap();
        assert_eq!(
            decoded.get_field(1).unwrap(),
            Some(&FieldValue::Str("second".into()))
        );
        assert_eq!(decoded.get_repeated_field(6).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_target_type_errors() {
        let registry = demo_registry();
        assert!(matches!(
            registry.decode(".demo.Nope", &[]),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn test_unresolvable_nested_type_is_a_hard_error() {
        // Same shape as Blob but Item is not registered.
        let registry = TypeRegistry::from_descriptor_set(DescriptorSet {
            files: vec![FileDescriptor {
                name: "demo.proto".into(),
                package: "demo".into(),
                messages: vec![MessageDescriptor {
                    name: "Blob".into(),
                    fields: vec![field(
                        "items",
                        6,
                        Label::Repeated,
                        FieldType::Message,
                        Some(".demo.Item"),
                    )],
                    ..Default::default()
                }],
                enums: vec![],
            }],
        });

        let mut payload = Vec::new();
        len_prefixed(&mut payload, 6, &item_bytes("x"));
        match registry.decode(".demo.Blob", &payload) {
            Err(Error::UnknownType { name }) => assert_eq!(name, ".demo.Item"),
            other => panic!("expected unknown type error, got {other:?}"),
        }
    }

    #[test]
    fn test_group_typed_field_errors() {
        let registry = TypeRegistry::from_descriptor_set(DescriptorSet {
            files: vec![FileDescriptor {
                name: "legacy.proto".into(),
                package: "demo".into(),
                messages: vec![MessageDescriptor {
                    name: "Holder".into(),
                    fields: vec![field(
                        "legacy",
                        4,
                        Label::Optional,
                        FieldType::Group,
                        Some(".demo.Legacy"),
                    )],
                    ..Default::default()
                }],
                enums: vec![],
            }],
        });

        let payload = vec![4 << 3 | 3];
        match registry.decode(".demo.Holder", &payload) {
            Err(Error::GroupField { field }) => assert_eq!(field, ".demo.Holder.legacy"),
            other => panic!("expected group field error, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_wrapped_payload_decodes_on_retry() {
        let registry = demo_registry();
        // 13-byte payload; the envelope's length byte reads as tag
        // (field 1, wire type i32), which contradicts field 1's
        // declared string type and triggers the one retry.
        let mut payload = Vec::new();
        len_prefixed(&mut payload, 1, b"hello world");
        assert_eq!(payload.len(), 13);

        let mut wrapped = Vec::new();
        write_varint(&mut wrapped, payload.len() as u64);
        wrapped.extend_from_slice(&payload);

        let decoded = registry.decode(".demo.Blob", &wrapped).unwrap();
        assert_eq!(
            decoded.get_field(1).unwrap(),
            Some(&FieldValue::Str("hello world".into()))
        );
    }

    #[test]
    fn test_non_mismatch_errors_do_not_retry() {
        let registry = demo_registry();
        // 16-byte payload; the envelope's length byte reads as tag
        // (field 2, varint), which matches field 2's int32, so direct
        // decoding continues into the payload and trips on an invalid
        // wire type code. The stripped envelope would decode fine, but
        // only a wire-type mismatch earns the retry.
        let mut payload = Vec::new();
        len_prefixed(&mut payload, 1, b"abcdefghijklmn");
        assert_eq!(payload.len(), 16);

        let mut wrapped = Vec::new();
        write_varint(&mut wrapped, payload.len() as u64);
        wrapped.extend_from_slice(&payload);

        assert!(matches!(
            registry.decode(".demo.Blob", &wrapped),
            Err(Error::InvalidWireType { value: 6 })
        ));
    }

    #[test]
    fn test_encode_orders_fields_ascending() {
        let registry = demo_registry();
        let blob = registry.message_type(".demo.Blob").unwrap();

        let mut forward = MessageValue::new(Arc::clone(blob));
        forward.set_field(1, FieldValue::Str("t".into())).unwrap();
        forward.set_field(17, FieldValue::Int(9)).unwrap();

        let mut backward = MessageValue::new(Arc::clone(blob));
        backward.set_field(17, FieldValue::Int(9)).unwrap();
        backward.set_field(1, FieldValue::Str("t".into())).unwrap();

        let bytes = forward.encode();
        assert_eq!(bytes, backward.encode());
        assert_eq!(bytes[0], 1 << 3 | 2);
    }

    #[test]
    fn test_zigzag_codec() {
        let cases = [
            (0i64, 0u64),
            (-1, 1),
            (1, 2),
            (-2, 3),
            (2147483647, 4294967294),
            (-2147483648, 4294967295),
            (i64::MAX, u64::MAX - 1),
            (i64::MIN, u64::MAX),
        ];
        for (signed, encoded) in cases {
            assert_eq!(zigzag_encode(signed), encoded);
            assert_eq!(zigzag_decode(encoded), signed);
        }
    }
}

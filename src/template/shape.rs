//! Closed set of data shapes the flattener understands.
//!
//! Bound data reaches the engine through `serde::Serialize`: [`to_shape`]
//! drives any serializable value through [`ShapeSerializer`] and records the
//! structure it reports (record, keyed map, sequence, scalar, null). No
//! runtime type inspection happens past this point.

use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

use crate::error::{Result, XlsxtError};

/// A leaf value substituted into cell text.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// Structure of a bound value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shape {
    #[default]
    Null,
    Scalar(Scalar),
    /// Ordered collection.
    Seq(Vec<Shape>),
    /// Keyed collection; each key becomes its own child when flattened.
    Map(Vec<(String, Shape)>),
    /// Record fields in declaration order.
    Record(Vec<(String, Shape)>),
}

impl Shape {
    /// Build a shape from parsed JSON. Objects are treated as records.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(
                n.as_u64()
                    .map(Scalar::UInt)
                    .or_else(|| n.as_i64().map(Scalar::Int))
                    .or_else(|| n.as_f64().map(Scalar::Float))
                    .unwrap_or_else(|| Scalar::Str(n.to_string())),
            ),
            Value::String(s) => Self::Scalar(Scalar::Str(s)),
            Value::Array(items) => Self::Seq(items.into_iter().map(Self::from_json).collect()),
            Value::Object(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Value bound to sheet `index`: the matching element of a root sequence,
    /// or the whole shape when the root is not a sequence.
    pub fn element(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Seq(items) => items.get(index),
            other => Some(other),
        }
    }

    /// Field of a record or entry of a map.
    pub fn field(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Record(fields) | Self::Map(fields) => {
                fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Seq(_) | Self::Map(_))
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Scalar(s) => s.serialize(serializer),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) | Self::Record(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Convert any serializable value into a [`Shape`].
///
/// # Errors
/// `Data` when the value reports something the shape model cannot hold
/// (for example a map with a compound key).
pub fn to_shape<T: Serialize + ?Sized>(value: &T) -> Result<Shape> {
    value
        .serialize(ShapeSerializer)
        .map_err(|e| XlsxtError::Data(e.0))
}

#[derive(Debug)]
pub struct ShapeError(String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ShapeError {}

impl ser::Error for ShapeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

type ShapeResult = std::result::Result<Shape, ShapeError>;

/// `Serializer` that records the structure of a value as a [`Shape`].
pub struct ShapeSerializer;

fn scalar(s: Scalar) -> ShapeResult {
    Ok(Shape::Scalar(s))
}

fn tagged(variant: &str, value: Shape) -> Shape {
    Shape::Record(vec![(variant.to_string(), value)])
}

impl Serializer for ShapeSerializer {
    type Ok = Shape;
    type Error = ShapeError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = RecordBuilder;
    type SerializeStructVariant = RecordBuilder;

    fn serialize_bool(self, v: bool) -> ShapeResult {
        scalar(Scalar::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> ShapeResult {
        scalar(Scalar::Int(i64::from(v)))
    }
    fn serialize_i16(self, v: i16) -> ShapeResult {
        scalar(Scalar::Int(i64::from(v)))
    }
    fn serialize_i32(self, v: i32) -> ShapeResult {
        scalar(Scalar::Int(i64::from(v)))
    }
    fn serialize_i64(self, v: i64) -> ShapeResult {
        scalar(Scalar::Int(v))
    }
    fn serialize_u8(self, v: u8) -> ShapeResult {
        scalar(Scalar::UInt(u64::from(v)))
    }
    fn serialize_u16(self, v: u16) -> ShapeResult {
        scalar(Scalar::UInt(u64::from(v)))
    }
    fn serialize_u32(self, v: u32) -> ShapeResult {
        scalar(Scalar::UInt(u64::from(v)))
    }
    fn serialize_u64(self, v: u64) -> ShapeResult {
        scalar(Scalar::UInt(v))
    }
    fn serialize_f32(self, v: f32) -> ShapeResult {
        scalar(Scalar::Float(f64::from(v)))
    }
    fn serialize_f64(self, v: f64) -> ShapeResult {
        scalar(Scalar::Float(v))
    }
    fn serialize_char(self, v: char) -> ShapeResult {
        scalar(Scalar::Str(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> ShapeResult {
        scalar(Scalar::Str(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> ShapeResult {
        Ok(Shape::Seq(
            v.iter()
                .map(|b| Shape::Scalar(Scalar::UInt(u64::from(*b))))
                .collect(),
        ))
    }
    fn serialize_none(self) -> ShapeResult {
        Ok(Shape::Null)
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> ShapeResult {
        value.serialize(self)
    }
    fn serialize_unit(self) -> ShapeResult {
        Ok(Shape::Null)
    }
    fn serialize_unit_struct(self, _name: &'static str) -> ShapeResult {
        Ok(Shape::Null)
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> ShapeResult {
        scalar(Scalar::Str(variant.to_string()))
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> ShapeResult {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> ShapeResult {
        Ok(tagged(variant, value.serialize(ShapeSerializer)?))
    }
    fn serialize_seq(self, len: Option<usize>) -> std::result::Result<SeqBuilder, ShapeError> {
        Ok(SeqBuilder::new(len, None))
    }
    fn serialize_tuple(self, len: usize) -> std::result::Result<SeqBuilder, ShapeError> {
        Ok(SeqBuilder::new(Some(len), None))
    }
    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> std::result::Result<SeqBuilder, ShapeError> {
        Ok(SeqBuilder::new(Some(len), None))
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<SeqBuilder, ShapeError> {
        Ok(SeqBuilder::new(Some(len), Some(variant)))
    }
    fn serialize_map(self, len: Option<usize>) -> std::result::Result<MapBuilder, ShapeError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }
    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> std::result::Result<RecordBuilder, ShapeError> {
        Ok(RecordBuilder::new(len, None))
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<RecordBuilder, ShapeError> {
        Ok(RecordBuilder::new(len, Some(variant)))
    }
}

pub struct SeqBuilder {
    items: Vec<Shape>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn new(len: Option<usize>, variant: Option<&'static str>) -> Self {
        Self {
            items: Vec::with_capacity(len.unwrap_or(0)),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        self.items.push(value.serialize(ShapeSerializer)?);
        Ok(())
    }

    fn finish(self) -> Shape {
        let seq = Shape::Seq(self.items);
        match self.variant {
            Some(variant) => tagged(variant, seq),
            None => seq,
        }
    }
}

impl SerializeSeq for SeqBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        self.push(value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        self.push(value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        self.push(value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        self.push(value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

pub struct MapBuilder {
    entries: Vec<(String, Shape)>,
    next_key: Option<String>,
}

impl SerializeMap for MapBuilder {
    type Ok = Shape;
    type Error = ShapeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), ShapeError> {
        let key = match key.serialize(ShapeSerializer)? {
            Shape::Scalar(s) => s.to_string(),
            other => {
                return Err(ShapeError(format!(
                    "map keys must be scalars, got {other:?}"
                )))
            }
        };
        self.next_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), ShapeError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| ShapeError("map value without a key".to_string()))?;
        self.entries.push((key, value.serialize(ShapeSerializer)?));
        Ok(())
    }

    fn end(self) -> ShapeResult {
        Ok(Shape::Map(self.entries))
    }
}

pub struct RecordBuilder {
    fields: Vec<(String, Shape)>,
    variant: Option<&'static str>,
}

impl RecordBuilder {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self {
            fields: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), ShapeError> {
        self.fields
            .push((key.to_string(), value.serialize(ShapeSerializer)?));
        Ok(())
    }

    fn finish(self) -> Shape {
        let record = Shape::Record(self.fields);
        match self.variant {
            Some(variant) => tagged(variant, record),
            None => record,
        }
    }
}

impl ser::SerializeStruct for RecordBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), ShapeError> {
        self.push(key, value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for RecordBuilder {
    type Ok = Shape;
    type Error = ShapeError;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), ShapeError> {
        self.push(key, value)
    }
    fn end(self) -> ShapeResult {
        Ok(self.finish())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Line {
        name: String,
        qty: u32,
        note: Option<String>,
    }

    #[derive(Serialize)]
    struct Order {
        id: i64,
        lines: Vec<Line>,
        tags: HashMap<String, f64>,
        status: Status,
    }

    #[derive(Serialize)]
    enum Status {
        Open,
    }

    #[test]
    fn struct_fields_keep_declaration_order() {
        let order = Order {
            id: -7,
            lines: vec![Line {
                name: "bolt".into(),
                qty: 3,
                note: None,
            }],
            tags: HashMap::from([("vat".to_string(), 0.2)]),
            status: Status::Open,
        };
        let Shape::Record(fields) = to_shape(&order).unwrap() else {
            panic!("expected record");
        };
        let names: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["id", "lines", "tags", "status"]);
        assert_eq!(fields[0].1, Shape::Scalar(Scalar::Int(-7)));
        assert!(matches!(fields[2].1, Shape::Map(_)));
        assert_eq!(fields[3].1, Shape::Scalar(Scalar::Str("Open".into())));

        let Shape::Seq(lines) = &fields[1].1 else {
            panic!("expected seq");
        };
        assert_eq!(lines[0].field("note"), Some(&Shape::Null));
        assert_eq!(
            lines[0].field("qty"),
            Some(&Shape::Scalar(Scalar::UInt(3)))
        );
    }

    #[test]
    fn json_objects_become_records() {
        let shape = Shape::from_json(serde_json::json!({"a": [1, -2, 1.5], "b": null}));
        let a = shape.field("a").unwrap();
        assert_eq!(
            a,
            &Shape::Seq(vec![
                Shape::Scalar(Scalar::UInt(1)),
                Shape::Scalar(Scalar::Int(-2)),
                Shape::Scalar(Scalar::Float(1.5)),
            ])
        );
        assert_eq!(shape.field("b"), Some(&Shape::Null));
    }

    #[test]
    fn element_indexes_root_sequences_only() {
        let seq = Shape::Seq(vec![Shape::Null, Shape::Scalar(Scalar::Bool(true))]);
        assert_eq!(seq.element(1), Some(&Shape::Scalar(Scalar::Bool(true))));
        assert_eq!(seq.element(5), None);
        let rec = Shape::Record(vec![]);
        assert_eq!(rec.element(3), Some(&rec));
    }

    #[test]
    fn compound_map_keys_are_rejected() {
        let map = HashMap::from([((1, 2), "x")]);
        assert!(matches!(to_shape(&map), Err(XlsxtError::Data(_))));
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Scalar::Float(2.0).to_string(), "2");
        assert_eq!(Scalar::Float(0.25).to_string(), "0.25");
        assert_eq!(Scalar::Bool(false).to_string(), "false");
    }
}

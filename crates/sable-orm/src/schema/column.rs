//! Column descriptors.

use sable_core::codec;
use sable_core::{Result, Value};
use serde::Serialize;

/// Semantic kind of a column, independent of the dialect's type names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// 64-bit integer.
    Int,
    /// Fixed-point / floating number.
    Float,
    /// Text, optionally bounded by a length.
    Text,
    /// Boolean stored as a small integer.
    Boolean,
    /// Structured value stored as envelope text (see [`sable_core::codec`]).
    Serialized,
}

/// One column of an entity table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescriptor {
    name: String,
    kind: ColumnKind,
    auto_increment: bool,
    length: Option<u32>,
    default: Value,
}

impl ColumnDescriptor {
    fn new(name: impl Into<String>, kind: ColumnKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            auto_increment: false,
            length: None,
            default,
        }
    }

    /// Integer column.
    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ColumnKind::Int, Value::Int(default))
    }

    /// Float column.
    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ColumnKind::Float, Value::Float(default))
    }

    /// Text column; `None` means `DEFAULT NULL`.
    pub fn text(name: impl Into<String>, default: Option<&str>) -> Self {
        Self::new(name, ColumnKind::Text, default.into())
    }

    /// Boolean column.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ColumnKind::Boolean, Value::Bool(default))
    }

    /// Structured column; the default is encoded now.
    pub fn serialized<T: Serialize + ?Sized>(name: impl Into<String>, default: &T) -> Result<Self> {
        let encoded = codec::encode(default)?;
        Ok(Self::new(name, ColumnKind::Serialized, Value::Text(encoded)))
    }

    /// Infer the kind from a JSON default value.
    ///
    /// Integers map to `Int`, strings to `Text`, booleans to `Boolean`,
    /// floats to `Float`, arrays and objects to `Serialized`, and `null` to a
    /// `Text` column defaulting to `NULL`.
    pub fn infer(name: impl Into<String>, default: &serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;
        Ok(match default {
            Json::Null => Self::text(name, None),
            Json::Bool(b) => Self::boolean(name, *b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::int(name, i),
                None => Self::float(name, n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Self::text(name, Some(s.as_str())),
            Json::Array(_) | Json::Object(_) => Self::serialized(name, default)?,
        })
    }

    /// Mark as auto-increment. Ignored unless the kind is `Int`.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = self.kind == ColumnKind::Int;
        self
    }

    /// Bound the text length. Ignored unless the kind is `Text`.
    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        if self.kind == ColumnKind::Text {
            self.length = Some(length);
        }
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic kind.
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether the column auto-increments.
    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Text length bound.
    pub fn length(&self) -> Option<u32> {
        self.length
    }

    /// Default value. Serialized defaults are already encoded text.
    pub fn default_value(&self) -> &Value {
        &self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags_dropped_on_other_kinds() {
        let c = ColumnDescriptor::text("name", Some("x")).auto_increment();
        assert!(!c.is_auto_increment());
        let c = ColumnDescriptor::int("n", 0).with_length(10);
        assert_eq!(c.length(), None);

        let c = ColumnDescriptor::int("id", 0).auto_increment();
        assert!(c.is_auto_increment());
        let c = ColumnDescriptor::text("code", None).with_length(32);
        assert_eq!(c.length(), Some(32));
    }

    #[test]
    fn infer_kinds() {
        let cases = [
            (json!(5), ColumnKind::Int),
            (json!(1.5), ColumnKind::Float),
            (json!("a"), ColumnKind::Text),
            (json!(true), ColumnKind::Boolean),
            (json!([1, 2]), ColumnKind::Serialized),
            (json!({"a": 1}), ColumnKind::Serialized),
            (json!(null), ColumnKind::Text),
        ];
        for (default, kind) in cases {
            let c = ColumnDescriptor::infer("c", &default).unwrap();
            assert_eq!(c.kind(), kind, "{default}");
        }
    }

    #[test]
    fn infer_null_defaults_to_null_text() {
        let c = ColumnDescriptor::infer("bio", &json!(null)).unwrap();
        assert_eq!(c.default_value(), &Value::Null);
    }

    #[test]
    fn serialized_default_is_encoded() {
        let c = ColumnDescriptor::infer("tags", &json!(["a"])).unwrap();
        assert_eq!(
            c.default_value(),
            &Value::Text(r#"{"v":1,"data":["a"]}"#.to_string())
        );
    }
}

//! Driver-independent value model for probe results.
//!
//! The driver layer converts its native values into [`ProbeValue`] so the
//! normalizer and the renderers only ever see this closed set of variants.

/// A value produced by a probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeValue {
    Null,
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(String),
    /// 64-bit counter. Serialized as `{"$numberLong": "..."}`.
    Int64(i64),
    /// Database-assigned identifier as a hex string.
    ObjectId(String),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    /// Ordered mapping; key order is preserved through serialization.
    Document(Vec<(String, ProbeValue)>),
    Array(Vec<ProbeValue>),
}

impl ProbeValue {
    pub fn document<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ProbeValue)>,
    {
        Self::Document(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a field of a document. Returns `None` for non-documents.
    pub fn get(&self, key: &str) -> Option<&ProbeValue> {
        match self {
            Self::Document(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ProbeValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            Self::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            _ => None,
        }
    }

    /// Loose truthiness, as used by server replies (`ok: 1`, `ok: 1.0`, `self: true`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int32(n) => *n != 0,
            Self::Int64(n) => *n != 0,
            Self::Double(d) => *d != 0.0 && !d.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl From<&str> for ProbeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ProbeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for ProbeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for ProbeValue {
    fn from(n: i32) -> Self {
        Self::Int32(n)
    }
}

impl From<i64> for ProbeValue {
    fn from(n: i64) -> Self {
        Self::Int64(n)
    }
}

impl From<f64> for ProbeValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl<T: Into<ProbeValue>> From<Vec<T>> for ProbeValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Carries values that arrive as JSON (e.g. relaxed Extended JSON for BSON
/// kinds outside the closed set). Integers that fit in 32 bits become
/// `Int32`, other integers `Int64`.
impl From<serde_json::Value> for ProbeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Self::Int32(small),
                        Err(_) => Self::Int64(i),
                    }
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Document(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

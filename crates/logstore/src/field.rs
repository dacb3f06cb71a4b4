//! Field-path extraction over raw record bytes.
//!
//! A [`FieldPath`] addresses a nested value with dot-separated segments
//! (`"user.address.city"`). A numeric segment indexes into an array
//! (`"tags.0"`), and `\.` escapes a literal dot inside a segment.
//!
//! Extraction drives `serde_json` with a [`DeserializeSeed`] that follows the
//! path and skips every sibling with [`IgnoredAny`], so only the addressed
//! value is materialized. The record never has to match a typed shape.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, StoreError};

/// A parsed dot-separated field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses `path` into segments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFieldPath`] if the path is empty or has an
    /// empty segment (`"a..b"`, `".a"`, `"a."`).
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => current.push('\\'),
                },
                '.' => {
                    if current.is_empty() {
                        return Err(StoreError::InvalidFieldPath(path.to_string()));
                    }
                    segments.push(std::mem::take(&mut current));
                }
                other => current.push(other),
            }
        }

        if current.is_empty() {
            return Err(StoreError::InvalidFieldPath(path.to_string()));
        }
        segments.push(current);

        Ok(Self { segments })
    }

    /// A one-segment path naming a top-level field verbatim (no dot splitting).
    pub fn top_level(field: &str) -> Self {
        Self {
            segments: vec![field.to_string()],
        }
    }

    /// The path's segments, unescaped.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Extracts the addressed value from a JSON document held in `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Parse`] if `raw` is not a single well-formed
    /// JSON document. A path that does not resolve is not an error.
    pub fn extract(&self, raw: &[u8]) -> Result<Field> {
        let mut de = serde_json::Deserializer::from_slice(raw);
        let value = PathSeed {
            segments: &self.segments,
        }
        .deserialize(&mut de)?;
        de.end()?;
        Ok(Field { value })
    }
}

impl FromStr for FieldPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&seg.replace('\\', "\\\\").replace('.', "\\."))?;
        }
        Ok(())
    }
}

/// The outcome of a field extraction on a record that exists.
///
/// `exists()` is false when the path did not resolve (missing field, index
/// out of range, or descending into a scalar). A present JSON `null` exists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Field {
    value: Option<Value>,
}

impl Field {
    /// Returns `true` if the path resolved to a value.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the field, returning the resolved value.
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// The value as a string slice, if it is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    /// The value as an `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_ref().and_then(Value::as_i64)
    }

    /// The value as an `f64`, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(Value::as_f64)
    }

    /// The value as a `bool`, if it is a JSON boolean.
    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Value::as_bool)
    }
}

/// Follows `segments` through the document. Yields `None` when the path
/// leaves the document's shape.
struct PathSeed<'p> {
    segments: &'p [String],
}

impl<'de, 'p> DeserializeSeed<'de> for PathSeed<'p> {
    type Value = Option<Value>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.segments.split_first() {
            None => Value::deserialize(deserializer).map(Some),
            Some((head, rest)) => deserializer.deserialize_any(PathVisitor {
                head: head.as_str(),
                rest,
            }),
        }
    }
}

struct PathVisitor<'p> {
    head: &'p str,
    rest: &'p [String],
}

impl<'de, 'p> Visitor<'de> for PathVisitor<'p> {
    type Value = Option<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any JSON value containing field {:?}", self.head)
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut found = None;
        let mut matched = false;
        while let Some(key) = map.next_key::<String>()? {
            // First occurrence of a duplicated field wins.
            if !matched && key == self.head {
                matched = true;
                found = map.next_value_seed(PathSeed {
                    segments: self.rest,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let target = self.head.parse::<usize>().ok();
        let mut found = None;
        let mut i = 0usize;
        loop {
            if Some(i) == target {
                match seq.next_element_seed(PathSeed {
                    segments: self.rest,
                })? {
                    Some(v) => found = v,
                    None => break,
                }
            } else if seq.next_element::<IgnoredAny>()?.is_none() {
                break;
            }
            i += 1;
        }
        Ok(found)
    }

    // Scalars have no children, so any remaining path misses.

    fn visit_bool<E>(self, _v: bool) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_i64<E>(self, _v: i64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_u64<E>(self, _v: u64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_f64<E>(self, _v: f64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_str<E>(self, _v: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }
}

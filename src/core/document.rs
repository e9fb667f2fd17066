//! core::document
//!
//! Generic document tree for JSON and YAML files.
//!
//! # Design
//!
//! Files are decoded into an explicit tagged [`Document`] rather than an
//! untyped value so that the walk over keys, values and sequences is spelled
//! out in one place. Mappings keep insertion order so re-encoding a changed
//! file produces the smallest possible diff.
//!
//! Non-string YAML mapping keys (integers, booleans) are stringified on
//! decode.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Encoding;

/// Errors from decoding or encoding documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot decode {encoding} document: {message}")]
    Decode { encoding: Encoding, message: String },

    #[error("cannot encode {encoding} document: {message}")]
    Encode { encoding: Encoding, message: String },

    #[error("encoding '{0}' has no structured representation")]
    Unsupported(Encoding),
}

/// A decoded JSON or YAML document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Mapping(IndexMap<String, Document>),
    Sequence(Vec<Document>),
}

impl Document {
    /// Decode raw bytes with the given encoding.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Unsupported` for [`Encoding::Unknown`] and
    /// `DocumentError::Decode` if the bytes are not a valid document.
    pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self, DocumentError> {
        let decode_err = |message: String| DocumentError::Decode { encoding, message };
        match encoding {
            Encoding::Json => serde_json::from_slice(bytes).map_err(|e| decode_err(e.to_string())),
            Encoding::Yaml => {
                // An empty YAML file is a valid, empty document
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Document::Null);
                }
                serde_yaml::from_slice(bytes).map_err(|e| decode_err(e.to_string()))
            }
            Encoding::Unknown => Err(DocumentError::Unsupported(encoding)),
        }
    }

    /// Encode the document with the given encoding.
    ///
    /// JSON output is pretty-printed with a trailing newline.
    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, DocumentError> {
        let encode_err = |message: String| DocumentError::Encode { encoding, message };
        match encoding {
            Encoding::Json => {
                let mut out =
                    serde_json::to_vec_pretty(self).map_err(|e| encode_err(e.to_string()))?;
                out.push(b'\n');
                Ok(out)
            }
            Encoding::Yaml => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| encode_err(e.to_string())),
            Encoding::Unknown => Err(DocumentError::Unsupported(encoding)),
        }
    }

    /// Get the string value, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key, if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Mapping(map) => map.get(key),
            _ => None,
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Document::Null => serializer.serialize_unit(),
            Document::Bool(b) => serializer.serialize_bool(*b),
            Document::Number(n) => n.serialize(serializer),
            Document::String(s) => serializer.serialize_str(s),
            Document::Mapping(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Document::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON or YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Document, E> {
        Ok(Document::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Document, E> {
        Ok(Document::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Document, E> {
        Ok(Document::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Document, E> {
        serde_json::Number::from_f64(v)
            .map(Document::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v} is not supported")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Document, E> {
        Ok(Document::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Document, E> {
        Ok(Document::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Document, E> {
        Ok(Document::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Document, E> {
        Ok(Document::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Document, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Document, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Document::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Document, A::Error> {
        let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(MappingKey(key)) = access.next_key::<MappingKey>()? {
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Document::Mapping(map))
    }
}

/// Mapping key that accepts any scalar and keeps it as a string.
struct MappingKey(String);

impl<'de> Deserialize<'de> for MappingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = MappingKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar mapping key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<MappingKey, E> {
                Ok(MappingKey(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MappingKey, E> {
                Ok(MappingKey(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MappingKey, E> {
                Ok(MappingKey("null".to_owned()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

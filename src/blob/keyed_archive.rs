//! Decoder for keyed archives (`bplist00` containers written by NSKeyedArchiver).
//!
//! The binary plist is parsed with the `plist` crate, then `$objects` is
//! flattened into an arena of [`ArchiveObject`]s. UIDs become plain indices
//! into that arena and every one of them is range-checked before use.
//!
//! Body location: `$top.root` -> `NS(Mutable)AttributedString.NSString` ->
//! string object. A root that is itself a string object is accepted as well.
//!
//! CHANGELOG:
//! - 10/17/2026 - Cap reference chain length
//! - 10/16/2026 - Walk the object graph from `$top.root` instead of scanning `$objects`

use plist::Value;
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

use super::DecodeFailure;

/// NSUTF8StringEncoding
const ENCODING_UTF8: i64 = 4;
/// NSUnicodeStringEncoding (BOM-detected, big-endian default)
const ENCODING_UNICODE: i64 = 10;
/// NSUTF16LittleEndianStringEncoding
const ENCODING_UTF16_LE: i64 = 0x9400_0100;
/// NSUTF16BigEndianStringEncoding
const ENCODING_UTF16_BE: i64 = 0x9000_0100;

/// Longest reference chain followed from `$top.root`.
const MAX_DEPTH: usize = 256;

/// One entry of the `$objects` table.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveObject {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    ArrayRef(Vec<usize>),
    /// `{ $classname, $classes }` entry.
    Class { name: String, ancestry: Vec<String> },
    /// Any dictionary carrying a `$class` reference.
    Instance {
        class: usize,
        fields: BTreeMap<String, Field>,
    },
}

/// A value stored under an instance key.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Ref(usize),
    Refs(Vec<usize>),
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Parsed archive: the object arena plus the root index.
#[derive(Debug)]
pub struct KeyedArchive {
    objects: Vec<ArchiveObject>,
    root: usize,
}

/// Decode the message body from a keyed archive.
pub fn decode(bytes: &[u8]) -> Option<String> {
    match try_decode(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::debug!(error = %e, len = bytes.len(), "keyed archive decode failed");
            None
        }
    }
}

/// Same as [`decode`] but keeps the failure reason.
pub fn try_decode(bytes: &[u8]) -> Result<String, DecodeFailure> {
    KeyedArchive::parse(bytes)?.body_text()
}

impl KeyedArchive {
    /// Parse the container and build the object arena.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeFailure> {
        let value = Value::from_reader(Cursor::new(bytes))
            .map_err(|e| DecodeFailure::Container(e.to_string()))?;

        let top = value
            .as_dictionary()
            .ok_or(DecodeFailure::Structure("top level is not a dictionary"))?;

        match top.get("$archiver").and_then(Value::as_string) {
            Some("NSKeyedArchiver") => {}
            _ => return Err(DecodeFailure::Structure("missing NSKeyedArchiver marker")),
        }

        let raw_objects = top
            .get("$objects")
            .and_then(Value::as_array)
            .ok_or(DecodeFailure::Structure("missing $objects table"))?;
        let len = raw_objects.len();

        let root = top
            .get("$top")
            .and_then(Value::as_dictionary)
            .and_then(|t| t.get("root"))
            .ok_or(DecodeFailure::Structure("missing $top.root"))?;
        let root = match root {
            Value::Uid(uid) => checked_index(uid.get(), len)?,
            _ => return Err(DecodeFailure::Structure("$top.root is not a reference")),
        };

        let objects = raw_objects
            .iter()
            .map(|v| convert_object(v, len))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { objects, root })
    }

    /// Number of entries in the object table.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bounds-checked table lookup.
    pub fn get(&self, index: usize) -> Result<&ArchiveObject, DecodeFailure> {
        self.objects.get(index).ok_or(DecodeFailure::IndexOutOfRange {
            index,
            len: self.objects.len(),
        })
    }

    /// Resolve the class name of an instance's `$class` reference.
    pub fn class_name(&self, index: usize) -> Result<&str, DecodeFailure> {
        match self.get(index)? {
            ArchiveObject::Class { name, .. } => Ok(name),
            _ => Err(DecodeFailure::MissingClass),
        }
    }

    /// Follow the root down to the message body string.
    pub fn body_text(&self) -> Result<String, DecodeFailure> {
        let mut visited = HashSet::new();
        self.text_at(self.root, &mut visited)
    }

    fn text_at(&self, index: usize, visited: &mut HashSet<usize>) -> Result<String, DecodeFailure> {
        if visited.len() >= MAX_DEPTH {
            return Err(DecodeFailure::Structure("object graph nested too deeply"));
        }
        if !visited.insert(index) {
            return Err(DecodeFailure::Cycle(index));
        }

        match self.get(index)? {
            ArchiveObject::Str(s) => Ok(s.clone()),
            ArchiveObject::Instance { class, fields } => match self.class_name(*class)? {
                "NSAttributedString" | "NSMutableAttributedString" => {
                    let field = fields
                        .get("NSString")
                        .ok_or(DecodeFailure::MissingField("NSString"))?;
                    self.text_field(field, visited)
                }
                "NSString" | "NSMutableString" => {
                    if let Some(field) = fields.get("NS.string") {
                        return self.text_field(field, visited);
                    }
                    let bytes = match fields.get("NS.bytes") {
                        Some(Field::Bytes(b)) => b.as_slice(),
                        Some(Field::Ref(i)) => match self.get(*i)? {
                            ArchiveObject::Bytes(b) => b.as_slice(),
                            _ => return Err(DecodeFailure::Structure("NS.bytes is not data")),
                        },
                        _ => return Err(DecodeFailure::MissingField("NS.string")),
                    };
                    let marker = match fields.get("NS.encoding") {
                        None => None,
                        Some(Field::Int(n)) => Some(*n),
                        Some(_) => return Err(DecodeFailure::Structure("NS.encoding is not an integer")),
                    };
                    decode_marked(bytes, marker)
                }
                other => Err(DecodeFailure::UnexpectedClass(other.to_string())),
            },
            _ => Err(DecodeFailure::Structure("body is not a string object")),
        }
    }

    fn text_field(&self, field: &Field, visited: &mut HashSet<usize>) -> Result<String, DecodeFailure> {
        match field {
            Field::Str(s) => Ok(s.clone()),
            Field::Ref(i) => self.text_at(*i, visited),
            _ => Err(DecodeFailure::Structure("string field has unexpected type")),
        }
    }
}

/// Decode raw string bytes using only the archive's explicit encoding marker.
fn decode_marked(bytes: &[u8], marker: Option<i64>) -> Result<String, DecodeFailure> {
    match marker {
        None | Some(ENCODING_UTF8) => {
            String::from_utf8(bytes.to_vec()).map_err(|_| DecodeFailure::InvalidUtf8)
        }
        Some(ENCODING_UNICODE) => match bytes {
            [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
            [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
            _ => utf16(bytes, u16::from_be_bytes),
        },
        Some(ENCODING_UTF16_LE) => utf16(bytes, u16::from_le_bytes),
        Some(ENCODING_UTF16_BE) => utf16(bytes, u16::from_be_bytes),
        Some(other) => Err(DecodeFailure::UnsupportedEncoding(other)),
    }
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, DecodeFailure> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeFailure::LengthMismatch {
            declared: bytes.len() / 2,
            available: bytes.len(),
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| DecodeFailure::InvalidUtf16)
}

fn checked_index(uid: u64, len: usize) -> Result<usize, DecodeFailure> {
    usize::try_from(uid)
        .ok()
        .filter(|i| *i < len)
        .ok_or(DecodeFailure::IndexOutOfRange {
            index: usize::try_from(uid).unwrap_or(usize::MAX),
            len,
        })
}

fn convert_object(value: &Value, len: usize) -> Result<ArchiveObject, DecodeFailure> {
    Ok(match value {
        Value::String(s) if s == "$null" => ArchiveObject::Null,
        Value::String(s) => ArchiveObject::Str(s.clone()),
        Value::Boolean(b) => ArchiveObject::Bool(*b),
        Value::Integer(n) => ArchiveObject::Int(integer(n)?),
        Value::Real(f) => ArchiveObject::Double(*f),
        Value::Data(d) => ArchiveObject::Bytes(d.clone()),
        Value::Array(items) => ArchiveObject::ArrayRef(uid_list(items, len)?),
        Value::Dictionary(dict) => {
            if let Some(name) = dict.get("$classname") {
                let name = name
                    .as_string()
                    .ok_or(DecodeFailure::Structure("$classname is not a string"))?;
                let ancestry = match dict.get("$classes") {
                    Some(Value::Array(classes)) => classes
                        .iter()
                        .map(|c| c.as_string().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or(DecodeFailure::Structure("$classes holds a non-string"))?,
                    _ => Vec::new(),
                };
                ArchiveObject::Class {
                    name: name.to_string(),
                    ancestry,
                }
            } else {
                let class = match dict.get("$class") {
                    Some(Value::Uid(uid)) => checked_index(uid.get(), len)?,
                    _ => return Err(DecodeFailure::MissingClass),
                };
                let mut fields = BTreeMap::new();
                for (key, v) in dict.iter() {
                    if key == "$class" {
                        continue;
                    }
                    fields.insert(key.clone(), convert_field(v, len)?);
                }
                ArchiveObject::Instance { class, fields }
            }
        }
        _ => return Err(DecodeFailure::Structure("unsupported object type in $objects")),
    })
}

fn convert_field(value: &Value, len: usize) -> Result<Field, DecodeFailure> {
    Ok(match value {
        Value::Uid(uid) => Field::Ref(checked_index(uid.get(), len)?),
        Value::Array(items) => Field::Refs(uid_list(items, len)?),
        Value::Boolean(b) => Field::Bool(*b),
        Value::Integer(n) => Field::Int(integer(n)?),
        Value::Real(f) => Field::Double(*f),
        Value::String(s) => Field::Str(s.clone()),
        Value::Data(d) => Field::Bytes(d.clone()),
        _ => return Err(DecodeFailure::Structure("unsupported field type")),
    })
}

fn uid_list(items: &[Value], len: usize) -> Result<Vec<usize>, DecodeFailure> {
    items
        .iter()
        .map(|item| match item {
            Value::Uid(uid) => checked_index(uid.get(), len),
            _ => Err(DecodeFailure::Structure("array element is not a reference")),
        })
        .collect()
}

fn integer(n: &plist::Integer) -> Result<i64, DecodeFailure> {
    n.as_signed()
        .or_else(|| n.as_unsigned().and_then(|u| i64::try_from(u).ok()))
        .ok_or(DecodeFailure::Structure("integer out of range"))
}

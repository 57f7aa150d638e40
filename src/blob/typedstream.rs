//! Decoder for the legacy `streamtyped` archive format (NSArchiver).
//!
//! The stream is read front to back, exactly once:
//!
//! ```text
//! header   := int(4) string("streamtyped") int(system_version)
//! stream   := group+ EOF
//! group    := type_string value*          (one value per type code)
//! object   := START class group* END | EMPTY | reference
//! class    := START shared_string int(version) class | EMPTY | reference
//! ```
//!
//! Shared strings (type encodings and class names) live in one table, classes
//! and objects in another; references are signed ints offset by `0x92`.
//! Objects are registered on `START`, before their class chain is read.
//!
//! The body is found by position, never by content: the root object must be an
//! `NS(Mutable)AttributedString` whose first group is a single `NS(Mutable)String`
//! object whose own first group is a single `+` (UTF-8 bytes) value.
//!
//! CHANGELOG:
//! - 10/17/2026 - Depth limit covers embedded values and class chains
//! - 10/16/2026 - Full grammar walk replaces "NSString" + '+' byte search

use super::DecodeFailure;

const I16: u8 = 0x81;
const I32: u8 = 0x82;
const DECIMAL: u8 = 0x83;
const START: u8 = 0x84;
const EMPTY: u8 = 0x85;
const END: u8 = 0x86;
/// Lowest byte that is not a tag; `0x92` as i8 is -110.
const REFERENCE_BASE: i64 = -110;

const STREAM_VERSION: u64 = 4;
const STREAM_SIGNATURE: &[u8] = b"streamtyped";
/// Nesting limit for objects, embedded values and class chains combined.
const MAX_DEPTH: usize = 256;

/// A decoded value of one type code.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamValue {
    Nil,
    /// Index into the object table, for new and back-referenced objects alike.
    Object(usize),
    Utf8(Vec<u8>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Embedded(Vec<StreamValue>),
}

/// One slot of the object table.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEntry {
    Class {
        name: String,
        version: u64,
        parent: Option<usize>,
    },
    Object {
        class: Option<usize>,
        groups: Vec<Vec<StreamValue>>,
    },
    EmbeddedType(Vec<u8>),
}

/// Fully parsed stream.
#[derive(Debug)]
pub struct LegacyStream {
    pub system_version: u64,
    roots: Vec<Vec<StreamValue>>,
    objects: Vec<StreamEntry>,
}

/// Decode the message body from a typedstream.
pub fn decode(bytes: &[u8]) -> Option<String> {
    match try_decode(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::debug!(error = %e, len = bytes.len(), "typedstream decode failed");
            None
        }
    }
}

/// Same as [`decode`] but keeps the failure reason.
pub fn try_decode(bytes: &[u8]) -> Result<String, DecodeFailure> {
    LegacyStream::parse(bytes)?.body_text()
}

impl LegacyStream {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeFailure> {
        let mut reader = StreamReader::new(bytes);
        let system_version = reader.read_header()?;

        let mut roots = Vec::new();
        while !reader.at_end() {
            let types = reader.read_type_string(false)?;
            roots.push(reader.read_values(&types)?);
        }
        if roots.is_empty() {
            return Err(DecodeFailure::Structure("stream has no root value"));
        }

        Ok(Self {
            system_version,
            roots,
            objects: reader.objects,
        })
    }

    /// Bounds-checked object table lookup.
    pub fn entry(&self, index: usize) -> Result<&StreamEntry, DecodeFailure> {
        self.objects.get(index).ok_or(DecodeFailure::IndexOutOfRange {
            index,
            len: self.objects.len(),
        })
    }

    fn object(&self, index: usize) -> Result<(&str, &[Vec<StreamValue>]), DecodeFailure> {
        match self.entry(index)? {
            StreamEntry::Object {
                class: Some(class),
                groups,
            } => match self.entry(*class)? {
                StreamEntry::Class { name, .. } => Ok((name.as_str(), groups.as_slice())),
                _ => Err(DecodeFailure::MissingClass),
            },
            _ => Err(DecodeFailure::Structure("reference is not an object")),
        }
    }

    /// Locate the message text by its structural position.
    pub fn body_text(&self) -> Result<String, DecodeFailure> {
        let root = match self.roots.first().map(Vec::as_slice) {
            Some([StreamValue::Object(index)]) => *index,
            _ => return Err(DecodeFailure::Structure("root is not a single object")),
        };

        let (class, groups) = self.object(root)?;
        if !matches!(class, "NSAttributedString" | "NSMutableAttributedString") {
            return Err(DecodeFailure::UnexpectedClass(class.to_string()));
        }

        let string_index = match groups.first().map(Vec::as_slice) {
            Some([StreamValue::Object(index)]) => *index,
            _ => return Err(DecodeFailure::MissingField("NSString")),
        };

        let (class, groups) = self.object(string_index)?;
        if !matches!(class, "NSString" | "NSMutableString") {
            return Err(DecodeFailure::UnexpectedClass(class.to_string()));
        }

        match groups.first().map(Vec::as_slice) {
            Some([StreamValue::Utf8(bytes)]) => {
                String::from_utf8(bytes.clone()).map_err(|_| DecodeFailure::InvalidUtf8)
            }
            _ => Err(DecodeFailure::MissingField("NSString bytes")),
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

struct StreamReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Shared strings: type encodings and class names.
    types: Vec<Vec<u8>>,
    objects: Vec<StreamEntry>,
    depth: usize,
}

impl<'a> StreamReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            types: Vec::new(),
            objects: Vec::new(),
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Result<u8, DecodeFailure> {
        self.bytes.get(self.pos).copied().ok_or(DecodeFailure::Truncated)
    }

    fn peek_next(&self) -> Result<u8, DecodeFailure> {
        self.bytes.get(self.pos + 1).copied().ok_or(DecodeFailure::Truncated)
    }

    fn next(&mut self) -> Result<u8, DecodeFailure> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeFailure> {
        let available = self.bytes.len() - self.pos;
        if n > available {
            return Err(DecodeFailure::LengthMismatch {
                declared: n,
                available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeFailure> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_header(&mut self) -> Result<u64, DecodeFailure> {
        if self.read_unsigned()? != STREAM_VERSION {
            return Err(DecodeFailure::BadHeader("unsupported stream version"));
        }
        let len = self.read_length()?;
        if self.take(len)? != STREAM_SIGNATURE {
            return Err(DecodeFailure::BadHeader("missing streamtyped signature"));
        }
        self.read_unsigned()
    }

    // ------------------------------------------------------------------
    // Integers
    // ------------------------------------------------------------------

    fn read_signed(&mut self) -> Result<i64, DecodeFailure> {
        match self.next()? {
            I16 => Ok(i16::from_le_bytes(self.take_array()?) as i64),
            I32 => Ok(i32::from_le_bytes(self.take_array()?) as i64),
            tag @ DECIMAL..=0x91 => Err(DecodeFailure::UnexpectedTag(tag)),
            b => Ok(b as i8 as i64),
        }
    }

    fn read_unsigned(&mut self) -> Result<u64, DecodeFailure> {
        match self.next()? {
            I16 => Ok(u16::from_le_bytes(self.take_array()?) as u64),
            I32 => Ok(u32::from_le_bytes(self.take_array()?) as u64),
            tag @ DECIMAL..=0x91 => Err(DecodeFailure::UnexpectedTag(tag)),
            b => Ok(b as u64),
        }
    }

    fn read_length(&mut self) -> Result<usize, DecodeFailure> {
        let n = self.read_unsigned()?;
        usize::try_from(n).map_err(|_| DecodeFailure::Structure("length does not fit in memory"))
    }

    fn read_float(&mut self, double: bool) -> Result<f64, DecodeFailure> {
        if self.peek()? == DECIMAL {
            self.pos += 1;
            return Ok(if double {
                f64::from_le_bytes(self.take_array()?)
            } else {
                f32::from_le_bytes(self.take_array()?) as f64
            });
        }
        Ok(self.read_signed()? as f64)
    }

    /// References are signed ints offset by `REFERENCE_BASE`.
    fn read_reference(&mut self) -> Result<usize, DecodeFailure> {
        let raw = self.read_signed()?;
        usize::try_from(raw - REFERENCE_BASE)
            .map_err(|_| DecodeFailure::Structure("negative reference"))
    }

    // ------------------------------------------------------------------
    // Shared strings
    // ------------------------------------------------------------------

    /// A string stored once in the shared table and referenced afterwards.
    fn read_shared_string(&mut self) -> Result<Vec<u8>, DecodeFailure> {
        if self.peek()? == START {
            self.pos += 1;
            let len = self.read_length()?;
            let s = self.take(len)?.to_vec();
            self.types.push(s.clone());
            return Ok(s);
        }
        let index = self.read_reference()?;
        self.types
            .get(index)
            .cloned()
            .ok_or(DecodeFailure::IndexOutOfRange {
                index,
                len: self.types.len(),
            })
    }

    /// Type encoding that precedes a group of values.
    ///
    /// Embedded values sometimes repeat a type reference byte; the repeat is
    /// skipped. New embedded types also take a slot in the object table.
    fn read_type_string(&mut self, embedded: bool) -> Result<Vec<u8>, DecodeFailure> {
        match self.peek()? {
            START => {
                let types = self.read_shared_string()?;
                if embedded {
                    self.objects.push(StreamEntry::EmbeddedType(types.clone()));
                }
                Ok(types)
            }
            tag @ (EMPTY | END) => Err(DecodeFailure::UnexpectedTag(tag)),
            _ => {
                if embedded {
                    while self.peek()? == self.peek_next()? {
                        self.pos += 1;
                    }
                }
                self.read_shared_string()
            }
        }
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    fn read_values(&mut self, types: &[u8]) -> Result<Vec<StreamValue>, DecodeFailure> {
        if types.is_empty() {
            return Err(DecodeFailure::Structure("empty type encoding"));
        }

        let mut values = Vec::new();
        let mut i = 0;
        while i < types.len() {
            let code = types[i];
            i += 1;
            let value = match code {
                b'@' => self.read_object()?,
                b'+' => {
                    let len = self.read_length()?;
                    StreamValue::Utf8(self.take(len)?.to_vec())
                }
                b'*' => self.read_embedded()?,
                b'c' | b's' | b'i' | b'l' | b'q' => StreamValue::Int(self.read_signed()?),
                b'C' | b'S' | b'I' | b'L' | b'Q' => StreamValue::UInt(self.read_unsigned()?),
                b'f' => StreamValue::Float(self.read_float(false)?),
                b'd' => StreamValue::Float(self.read_float(true)?),
                b'[' => {
                    let (count, consumed) = parse_byte_array_type(&types[i..])?;
                    i += consumed;
                    StreamValue::Bytes(self.take(count)?.to_vec())
                }
                other => return Err(DecodeFailure::UnsupportedType(other as char)),
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_embedded(&mut self) -> Result<StreamValue, DecodeFailure> {
        match self.next()? {
            START => {}
            tag => return Err(DecodeFailure::UnexpectedTag(tag)),
        }
        self.nested(|r| {
            let types = r.read_type_string(true)?;
            Ok(StreamValue::Embedded(r.read_values(&types)?))
        })
    }

    /// Run one level of recursive descent under the depth limit.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, DecodeFailure>,
    ) -> Result<T, DecodeFailure> {
        if self.depth >= MAX_DEPTH {
            return Err(DecodeFailure::Structure("stream nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn read_object(&mut self) -> Result<StreamValue, DecodeFailure> {
        match self.peek()? {
            START => {
                self.pos += 1;
                self.nested(|r| {
                    let index = r.objects.len();
                    r.objects.push(StreamEntry::Object {
                        class: None,
                        groups: Vec::new(),
                    });

                    let class = r.read_class()?.ok_or(DecodeFailure::MissingClass)?;

                    let mut groups = Vec::new();
                    loop {
                        if r.peek()? == END {
                            r.pos += 1;
                            break;
                        }
                        let types = r.read_type_string(false)?;
                        groups.push(r.read_values(&types)?);
                    }

                    r.objects[index] = StreamEntry::Object {
                        class: Some(class),
                        groups,
                    };
                    Ok(StreamValue::Object(index))
                })
            }
            EMPTY => {
                self.pos += 1;
                Ok(StreamValue::Nil)
            }
            END => Err(DecodeFailure::UnexpectedTag(END)),
            _ => {
                let index = self.read_reference()?;
                match self.objects.get(index) {
                    Some(StreamEntry::Object { .. }) => Ok(StreamValue::Object(index)),
                    Some(_) => Err(DecodeFailure::Structure("reference is not an object")),
                    None => Err(DecodeFailure::IndexOutOfRange {
                        index,
                        len: self.objects.len(),
                    }),
                }
            }
        }
    }

    fn read_class(&mut self) -> Result<Option<usize>, DecodeFailure> {
        match self.peek()? {
            START => {
                self.pos += 1;
                let name = String::from_utf8(self.read_shared_string()?)
                    .map_err(|_| DecodeFailure::InvalidUtf8)?;
                let version = self.read_unsigned()?;

                let index = self.objects.len();
                self.objects.push(StreamEntry::Class {
                    name,
                    version,
                    parent: None,
                });

                let parent = self.nested(Self::read_class)?;
                if let Some(StreamEntry::Class { parent: slot, .. }) = self.objects.get_mut(index) {
                    *slot = parent;
                }
                Ok(Some(index))
            }
            EMPTY => {
                self.pos += 1;
                Ok(None)
            }
            END => Err(DecodeFailure::UnexpectedTag(END)),
            _ => {
                let index = self.read_reference()?;
                match self.objects.get(index) {
                    Some(StreamEntry::Class { .. }) => Ok(Some(index)),
                    Some(_) => Err(DecodeFailure::MissingClass),
                    None => Err(DecodeFailure::IndexOutOfRange {
                        index,
                        len: self.objects.len(),
                    }),
                }
            }
        }
    }
}

/// Parse the `<count>c]` tail of a `[<count>c]` byte-array type code.
///
/// Returns the element count and how many type bytes were consumed.
fn parse_byte_array_type(rest: &[u8]) -> Result<(usize, usize), DecodeFailure> {
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(DecodeFailure::UnsupportedType('['));
    }
    let count: usize = std::str::from_utf8(&rest[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DecodeFailure::UnsupportedType('['))?;
    match rest.get(digits..digits + 2) {
        Some([b'c' | b'C', b']']) => Ok((count, digits + 2)),
        _ => Err(DecodeFailure::UnsupportedType('[')),
    }
}

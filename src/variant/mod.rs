//! GVariant serialisation — type grammar and a zero-copy reader.
//!
//! GNOME Disks persists benchmark results with `g_variant_get_data()`, so a
//! cache file is nothing but the serialised bytes of one `a{sv}` value with
//! no header of its own.  Every value here is decoded straight out of the
//! borrowed byte slice; nothing is copied until a caller asks for a scalar.
//!
//! # Layout rules
//!
//! | Type | Encoding |
//! |------|----------|
//! | `b y n q i u x t h d` | fixed width (1 1 2 2 4 4 8 8 4 8), aligned to width |
//! | `s o g` | UTF-8 bytes followed by a NUL |
//! | `v` | child bytes, `0x00`, child type string (alignment 8) |
//! | `mT` | empty for Nothing; child bytes (+ `0x00` if `T` is variable) |
//! | `aT` | concatenated elements; variable elements add an end-offset table |
//! | `(…)` `{KV}` | aligned members; non-final variable members add an end offset, stored backwards |
//!
//! Framing offsets are as wide as the container needs: 1 byte up to 255
//! bytes of container, 2 up to 64 KiB, 4 up to 4 GiB, 8 beyond.
//!
//! # Endianness
//! Scalars are read little-endian, which is what every x86 and ARM desktop
//! writes.  GVariant has no in-band byte-order marker.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use thiserror::Error;

mod builder;

pub use builder::Value;

/// Nesting limit for type strings.  GLib uses 128; benchmark files need 3.
pub const MAX_TYPE_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantError {
    #[error("invalid type string {0:?}")]
    InvalidType(String),
    #[error("expected {expected}, found '{found}'")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("'{ty}' value must be {expected} bytes, found {found}")]
    SizeMismatch { ty: String, expected: usize, found: usize },
    #[error("framing offset {offset} out of range for a {size}-byte '{ty}'")]
    BadOffset { ty: String, offset: usize, size: usize },
    #[error("string is not NUL-terminated")]
    Unterminated,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("variant has no type separator")]
    MissingSeparator,
    #[error("integer {value} does not fit in {target}")]
    OutOfRange { value: i128, target: &'static str },
}

// ── Types ────────────────────────────────────────────────────────────────────

/// A parsed GVariant type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantType {
    Bool,
    Byte,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Handle,
    Double,
    String,
    ObjectPath,
    Signature,
    Variant,
    Maybe(Box<VariantType>),
    Array(Box<VariantType>),
    Tuple(Vec<VariantType>),
    DictEntry(Box<VariantType>, Box<VariantType>),
}

impl VariantType {
    /// Parse a complete type string.  Trailing characters are an error.
    pub fn parse(s: &str) -> Result<Self, VariantError> {
        let (ty, used) = Self::parse_prefix(s.as_bytes(), 0)
            .ok_or_else(|| VariantError::InvalidType(s.to_owned()))?;
        if used != s.len() {
            return Err(VariantError::InvalidType(s.to_owned()));
        }
        Ok(ty)
    }

    fn parse_prefix(s: &[u8], depth: usize) -> Option<(Self, usize)> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let ty = match *s.first()? {
            b'b' => VariantType::Bool,
            b'y' => VariantType::Byte,
            b'n' => VariantType::Int16,
            b'q' => VariantType::Uint16,
            b'i' => VariantType::Int32,
            b'u' => VariantType::Uint32,
            b'x' => VariantType::Int64,
            b't' => VariantType::Uint64,
            b'h' => VariantType::Handle,
            b'd' => VariantType::Double,
            b's' => VariantType::String,
            b'o' => VariantType::ObjectPath,
            b'g' => VariantType::Signature,
            b'v' => VariantType::Variant,
            b'm' => {
                let (child, used) = Self::parse_prefix(&s[1..], depth + 1)?;
                return Some((VariantType::Maybe(Box::new(child)), used + 1));
            }
            b'a' => {
                let (child, used) = Self::parse_prefix(&s[1..], depth + 1)?;
                return Some((VariantType::Array(Box::new(child)), used + 1));
            }
            b'(' => {
                let mut members = Vec::new();
                let mut pos = 1;
                while *s.get(pos)? != b')' {
                    let (member, used) = Self::parse_prefix(&s[pos..], depth + 1)?;
                    members.push(member);
                    pos += used;
                }
                return Some((VariantType::Tuple(members), pos + 1));
            }
            b'{' => {
                let (key, k_used) = Self::parse_prefix(&s[1..], depth + 1)?;
                if !key.is_basic() {
                    return None;
                }
                let (value, v_used) = Self::parse_prefix(&s[1 + k_used..], depth + 1)?;
                let end = 1 + k_used + v_used;
                if *s.get(end)? != b'}' {
                    return None;
                }
                return Some((VariantType::DictEntry(Box::new(key), Box::new(value)), end + 1));
            }
            _ => return None,
        };
        Some((ty, 1))
    }

    /// Basic types are the ones allowed as dictionary keys.
    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            VariantType::Variant
                | VariantType::Maybe(_)
                | VariantType::Array(_)
                | VariantType::Tuple(_)
                | VariantType::DictEntry(..)
        )
    }

    /// Serialised size for fixed-size types, `None` for variable-size ones.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            VariantType::Bool | VariantType::Byte => Some(1),
            VariantType::Int16 | VariantType::Uint16 => Some(2),
            VariantType::Int32 | VariantType::Uint32 | VariantType::Handle => Some(4),
            VariantType::Int64 | VariantType::Uint64 | VariantType::Double => Some(8),
            VariantType::String
            | VariantType::ObjectPath
            | VariantType::Signature
            | VariantType::Variant
            | VariantType::Maybe(_)
            | VariantType::Array(_) => None,
            VariantType::Tuple(members) => fixed_struct_size(members.iter(), self.alignment()),
            VariantType::DictEntry(k, v) => {
                fixed_struct_size([k.as_ref(), v.as_ref()].into_iter(), self.alignment())
            }
        }
    }

    pub fn alignment(&self) -> usize {
        match self {
            VariantType::String | VariantType::ObjectPath | VariantType::Signature => 1,
            VariantType::Variant => 8,
            VariantType::Maybe(child) | VariantType::Array(child) => child.alignment(),
            VariantType::Tuple(members) => {
                members.iter().map(VariantType::alignment).max().unwrap_or(1)
            }
            VariantType::DictEntry(k, v) => k.alignment().max(v.alignment()),
            fixed => fixed.fixed_size().unwrap_or(1),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            VariantType::Byte
                | VariantType::Int16
                | VariantType::Uint16
                | VariantType::Int32
                | VariantType::Uint32
                | VariantType::Int64
                | VariantType::Uint64
                | VariantType::Handle
        )
    }
}

fn fixed_struct_size<'t>(members: impl Iterator<Item = &'t VariantType>, align: usize) -> Option<usize> {
    let mut offset = 0;
    for member in members {
        offset = align_up(offset, member.alignment()) + member.fixed_size()?;
    }
    // The unit tuple still occupies one byte.
    Some(align_up(offset, align).max(1))
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            VariantType::Bool => "b",
            VariantType::Byte => "y",
            VariantType::Int16 => "n",
            VariantType::Uint16 => "q",
            VariantType::Int32 => "i",
            VariantType::Uint32 => "u",
            VariantType::Int64 => "x",
            VariantType::Uint64 => "t",
            VariantType::Handle => "h",
            VariantType::Double => "d",
            VariantType::String => "s",
            VariantType::ObjectPath => "o",
            VariantType::Signature => "g",
            VariantType::Variant => "v",
            VariantType::Maybe(child) => return write!(f, "m{child}"),
            VariantType::Array(child) => return write!(f, "a{child}"),
            VariantType::Tuple(members) => {
                f.write_str("(")?;
                for member in members {
                    write!(f, "{member}")?;
                }
                return f.write_str(")");
            }
            VariantType::DictEntry(k, v) => return write!(f, "{{{k}{v}}}"),
        };
        f.write_str(code)
    }
}

// ── Framing helpers ──────────────────────────────────────────────────────────

#[inline]
pub(crate) fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Width of each framing offset inside a container of `size` bytes.
#[inline]
pub(crate) fn offset_size(size: usize) -> usize {
    match size as u64 {
        0 => 0,
        1..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

fn read_offset(bytes: &[u8], width: usize) -> usize {
    match width {
        0 => 0,
        1 => bytes[0] as usize,
        2 => LittleEndian::read_u16(bytes) as usize,
        4 => LittleEndian::read_u32(bytes) as usize,
        _ => LittleEndian::read_u64(bytes) as usize,
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// A typed view over serialised GVariant bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRef<'a> {
    ty:   VariantType,
    data: &'a [u8],
}

impl<'a> VariantRef<'a> {
    pub fn new(ty: VariantType, data: &'a [u8]) -> Self {
        Self { ty, data }
    }

    pub fn ty(&self) -> &VariantType {
        &self.ty
    }

    fn mismatch(&self, expected: &'static str) -> VariantError {
        VariantError::TypeMismatch { expected, found: self.ty.to_string() }
    }

    fn bad_offset(&self, offset: usize) -> VariantError {
        VariantError::BadOffset { ty: self.ty.to_string(), offset, size: self.data.len() }
    }

    /// The bytes of a fixed-size value, checked against the type's width.
    fn fixed_bytes(&self) -> Result<&'a [u8], VariantError> {
        match self.ty.fixed_size() {
            Some(size) if size == self.data.len() => Ok(self.data),
            Some(size) => Err(VariantError::SizeMismatch {
                ty:       self.ty.to_string(),
                expected: size,
                found:    self.data.len(),
            }),
            None => Err(self.mismatch("a fixed-size type")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, VariantError> {
        if self.ty != VariantType::Bool {
            return Err(self.mismatch("'b'"));
        }
        Ok(self.fixed_bytes()?[0] != 0)
    }

    fn integer(&self) -> Result<i128, VariantError> {
        if !self.ty.is_integer() {
            return Err(self.mismatch("an integer"));
        }
        let b = self.fixed_bytes()?;
        Ok(match self.ty {
            VariantType::Byte => b[0] as i128,
            VariantType::Int16 => LittleEndian::read_i16(b) as i128,
            VariantType::Uint16 => LittleEndian::read_u16(b) as i128,
            VariantType::Int32 | VariantType::Handle => LittleEndian::read_i32(b) as i128,
            VariantType::Uint32 => LittleEndian::read_u32(b) as i128,
            VariantType::Int64 => LittleEndian::read_i64(b) as i128,
            _ => LittleEndian::read_u64(b) as i128,
        })
    }

    /// Any integer type whose value fits in an `i64`.
    pub fn as_i64(&self) -> Result<i64, VariantError> {
        let value = self.integer()?;
        i64::try_from(value).map_err(|_| VariantError::OutOfRange { value, target: "i64" })
    }

    /// Any integer type whose value fits in a `u64`; negative values are rejected.
    pub fn as_u64(&self) -> Result<u64, VariantError> {
        let value = self.integer()?;
        u64::try_from(value).map_err(|_| VariantError::OutOfRange { value, target: "u64" })
    }

    pub fn as_f64(&self) -> Result<f64, VariantError> {
        if self.ty != VariantType::Double {
            return Err(self.mismatch("'d'"));
        }
        Ok(LittleEndian::read_f64(self.fixed_bytes()?))
    }

    /// Borrow a string, object path or signature.
    pub fn as_str(&self) -> Result<&'a str, VariantError> {
        if !matches!(self.ty, VariantType::String | VariantType::ObjectPath | VariantType::Signature) {
            return Err(self.mismatch("a string"));
        }
        let (&last, body) = self.data.split_last().ok_or(VariantError::Unterminated)?;
        if last != 0 {
            return Err(VariantError::Unterminated);
        }
        std::str::from_utf8(body).map_err(|_| VariantError::InvalidUtf8)
    }

    /// Unwrap a `v` into its dynamically typed child.
    pub fn as_variant(&self) -> Result<VariantRef<'a>, VariantError> {
        if self.ty != VariantType::Variant {
            return Err(self.mismatch("'v'"));
        }
        let sep = self.data.iter().rposition(|&b| b == 0).ok_or(VariantError::MissingSeparator)?;
        let sig = std::str::from_utf8(&self.data[sep + 1..])
            .map_err(|_| VariantError::InvalidType(String::from_utf8_lossy(&self.data[sep + 1..]).into_owned()))?;
        Ok(VariantRef::new(VariantType::parse(sig)?, &self.data[..sep]))
    }

    pub fn as_maybe(&self) -> Result<Option<VariantRef<'a>>, VariantError> {
        let VariantType::Maybe(child) = &self.ty else {
            return Err(self.mismatch("a maybe type"));
        };
        if self.data.is_empty() {
            return Ok(None);
        }
        let body = match child.fixed_size() {
            Some(size) if size == self.data.len() => self.data,
            Some(size) => {
                return Err(VariantError::SizeMismatch {
                    ty:       self.ty.to_string(),
                    expected: size,
                    found:    self.data.len(),
                })
            }
            None => match self.data.split_last() {
                Some((&0, body)) => body,
                _ => return Err(self.bad_offset(self.data.len())),
            },
        };
        Ok(Some(VariantRef::new(child.as_ref().clone(), body)))
    }

    /// Number of elements in an array.
    pub fn len(&self) -> Result<usize, VariantError> {
        let VariantType::Array(elem) = &self.ty else {
            return Err(self.mismatch("an array"));
        };
        match elem.fixed_size() {
            Some(size) => Ok(self.data.len() / size),
            None => Ok(self.frame_table()?.1),
        }
    }

    pub fn is_empty(&self) -> Result<bool, VariantError> {
        Ok(self.len()? == 0)
    }

    /// Locate the end-offset table of a variable-element array:
    /// returns (table start, element count, offset width).
    fn frame_table(&self) -> Result<(usize, usize, usize), VariantError> {
        let size = self.data.len();
        if size == 0 {
            return Ok((0, 0, 0));
        }
        let width = offset_size(size);
        if size < width {
            return Err(self.bad_offset(size));
        }
        let table = read_offset(&self.data[size - width..], width);
        if table > size || (size - table) % width != 0 || table == size {
            return Err(self.bad_offset(table));
        }
        Ok((table, (size - table) / width, width))
    }

    /// All elements of an array, in stored order.
    pub fn elements(&self) -> Result<Vec<VariantRef<'a>>, VariantError> {
        let VariantType::Array(elem) = &self.ty else {
            return Err(self.mismatch("an array"));
        };

        if let Some(size) = elem.fixed_size() {
            if self.data.len() % size != 0 {
                return Err(self.bad_offset(self.data.len()));
            }
            return Ok(self
                .data
                .chunks_exact(size)
                .map(|chunk| VariantRef::new(elem.as_ref().clone(), chunk))
                .collect());
        }

        let (table, count, width) = self.frame_table()?;
        let align = elem.alignment();
        let mut out = Vec::with_capacity(count);
        let mut start = 0;
        for i in 0..count {
            let end = read_offset(&self.data[table + i * width..], width);
            start = align_up(start, align);
            if start > end || end > table {
                return Err(self.bad_offset(end));
            }
            out.push(VariantRef::new(elem.as_ref().clone(), &self.data[start..end]));
            start = end;
        }
        Ok(out)
    }

    /// Members of a tuple or dictionary entry, in declaration order.
    pub fn items(&self) -> Result<Vec<VariantRef<'a>>, VariantError> {
        let members: Vec<&VariantType> = match &self.ty {
            VariantType::Tuple(members) => members.iter().collect(),
            VariantType::DictEntry(k, v) => vec![k.as_ref(), v.as_ref()],
            _ => return Err(self.mismatch("a tuple or dictionary entry")),
        };
        if self.ty.fixed_size().is_some() {
            self.fixed_bytes()?;
        }

        let size = self.data.len();
        let width = offset_size(size);
        let mut table_end = size;
        let mut offset = 0;
        let mut out = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            offset = align_up(offset, member.alignment());
            let end = match member.fixed_size() {
                Some(fixed) => offset + fixed,
                None if i + 1 == members.len() => table_end,
                None => {
                    if table_end < width {
                        return Err(self.bad_offset(table_end));
                    }
                    table_end -= width;
                    read_offset(&self.data[table_end..], width)
                }
            };
            if offset > end || end > table_end {
                return Err(self.bad_offset(end));
            }
            out.push(VariantRef::new((*member).clone(), &self.data[offset..end]));
            offset = end;
        }
        Ok(out)
    }

    /// Split a dictionary entry into its key and value.
    pub fn entry(&self) -> Result<(VariantRef<'a>, VariantRef<'a>), VariantError> {
        if !matches!(self.ty, VariantType::DictEntry(..)) {
            return Err(self.mismatch("a dictionary entry"));
        }
        let mut items = self.items()?.into_iter();
        match (items.next(), items.next()) {
            (Some(k), Some(v)) => Ok((k, v)),
            _ => Err(self.mismatch("a dictionary entry")),
        }
    }

    /// Find `key` in an `a{s*}` dictionary.  Later duplicates are ignored.
    pub fn lookup(&self, key: &str) -> Result<Option<VariantRef<'a>>, VariantError> {
        match &self.ty {
            VariantType::Array(elem) if matches!(elem.as_ref(), VariantType::DictEntry(k, _) if **k == VariantType::String) => {}
            _ => return Err(self.mismatch("a string-keyed dictionary")),
        }
        for entry in self.elements()? {
            let (k, v) = entry.entry()?;
            if k.as_str()? == key {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

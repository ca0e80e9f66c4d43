//! Owned GVariant values and their serialisation.
//!
//! The inverse of [`VariantRef`](super::VariantRef): used to write fixture
//! cache files and to check that what the reader accepts is what GLib would
//! have written.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use super::{align_up, offset_size, VariantType};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(String),
    Variant(Box<Value>),
    /// Element type is carried explicitly so that empty arrays are typed.
    Array(VariantType, Vec<Value>),
    Tuple(Vec<Value>),
    DictEntry(Box<Value>, Box<Value>),
}

impl Value {
    /// An `a{sv}` dictionary, entries kept in the given order.
    pub fn dict<'k>(entries: impl IntoIterator<Item = (&'k str, Value)>) -> Self {
        let entry_ty = VariantType::DictEntry(Box::new(VariantType::String), Box::new(VariantType::Variant));
        let entries = entries
            .into_iter()
            .map(|(k, v)| {
                Value::DictEntry(
                    Box::new(Value::String(k.to_owned())),
                    Box::new(Value::Variant(Box::new(v))),
                )
            })
            .collect();
        Value::Array(entry_ty, entries)
    }

    pub fn ty(&self) -> VariantType {
        match self {
            Value::Bool(_) => VariantType::Bool,
            Value::Byte(_) => VariantType::Byte,
            Value::Int16(_) => VariantType::Int16,
            Value::Uint16(_) => VariantType::Uint16,
            Value::Int32(_) => VariantType::Int32,
            Value::Uint32(_) => VariantType::Uint32,
            Value::Int64(_) => VariantType::Int64,
            Value::Uint64(_) => VariantType::Uint64,
            Value::Double(_) => VariantType::Double,
            Value::String(_) => VariantType::String,
            Value::Variant(_) => VariantType::Variant,
            Value::Array(elem, _) => VariantType::Array(Box::new(elem.clone())),
            Value::Tuple(items) => VariantType::Tuple(items.iter().map(Value::ty).collect()),
            Value::DictEntry(k, v) => VariantType::DictEntry(Box::new(k.ty()), Box::new(v.ty())),
        }
    }

    pub fn type_string(&self) -> String {
        self.ty().to_string()
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes()?)
    }

    /// Append this value to `out`, whose length is already suitably aligned.
    fn encode(&self, out: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Value::Bool(b) => out.write_u8(*b as u8)?,
            Value::Byte(v) => out.write_u8(*v)?,
            Value::Int16(v) => out.write_i16::<LittleEndian>(*v)?,
            Value::Uint16(v) => out.write_u16::<LittleEndian>(*v)?,
            Value::Int32(v) => out.write_i32::<LittleEndian>(*v)?,
            Value::Uint32(v) => out.write_u32::<LittleEndian>(*v)?,
            Value::Int64(v) => out.write_i64::<LittleEndian>(*v)?,
            Value::Uint64(v) => out.write_u64::<LittleEndian>(*v)?,
            Value::Double(v) => out.write_f64::<LittleEndian>(*v)?,
            Value::String(s) => {
                out.write_all(s.as_bytes())?;
                out.write_u8(0)?;
            }
            Value::Variant(child) => {
                child.encode(out)?;
                out.write_u8(0)?;
                out.write_all(child.type_string().as_bytes())?;
            }
            Value::Array(elem, items) => {
                let body = encode_array(elem, items)?;
                out.write_all(&body)?;
            }
            Value::Tuple(items) => {
                let members: Vec<&Value> = items.iter().collect();
                out.write_all(&encode_struct(&members, &self.ty())?)?;
            }
            Value::DictEntry(k, v) => {
                out.write_all(&encode_struct(&[k.as_ref(), v.as_ref()], &self.ty())?)?;
            }
        }
        Ok(())
    }
}

fn pad_to(body: &mut Vec<u8>, align: usize) {
    body.resize(align_up(body.len(), align), 0);
}

/// Width of framing offsets for `count` offsets appended to `body_len` bytes.
fn framing_width(body_len: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    [1usize, 2, 4, 8]
        .into_iter()
        .find(|&w| offset_size(body_len + count * w) <= w)
        .unwrap_or(8)
}

fn write_offset(body: &mut Vec<u8>, offset: usize, width: usize) -> io::Result<()> {
    match width {
        1 => body.write_u8(offset as u8),
        2 => body.write_u16::<LittleEndian>(offset as u16),
        4 => body.write_u32::<LittleEndian>(offset as u32),
        _ => body.write_u64::<LittleEndian>(offset as u64),
    }
}

fn encode_array(elem: &VariantType, items: &[Value]) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut ends = Vec::with_capacity(items.len());
    for item in items {
        pad_to(&mut body, elem.alignment());
        item.encode(&mut body)?;
        ends.push(body.len());
    }
    if elem.fixed_size().is_none() {
        let width = framing_width(body.len(), ends.len());
        for end in ends {
            write_offset(&mut body, end, width)?;
        }
    }
    Ok(body)
}

fn encode_struct(members: &[&Value], ty: &VariantType) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut ends = Vec::new();
    for (i, member) in members.iter().enumerate() {
        let member_ty = member.ty();
        pad_to(&mut body, member_ty.alignment());
        member.encode(&mut body)?;
        if member_ty.fixed_size().is_none() && i + 1 != members.len() {
            ends.push(body.len());
        }
    }
    if let Some(size) = ty.fixed_size() {
        body.resize(size, 0);
        return Ok(body);
    }
    let width = framing_width(body.len(), ends.len());
    for end in ends.into_iter().rev() {
        write_offset(&mut body, end, width)?;
    }
    Ok(body)
}

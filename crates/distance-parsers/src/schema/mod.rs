//! Declarative field schema
//!
//! Fragment payloads are described as a static tree of [`Field`] combinators.
//! The same tree drives parsing ([`parse`]), emission ([`emit`]) and fresh
//! default construction ([`defaults`]):
//!
//! | Combinator | Parse | Emit |
//! |------------|-------|------|
//! | `Struct` | each member in order, into a [`Record`] | each member in order |
//! | `Codec` | one primitive | one primitive, range-checked |
//! | `Default(f, v)` | `v` if the section has ended, else `f` | `v` if the value is absent |
//! | `Optional(f)` | SKIP sentinel reads as absent | absent writes SKIP |
//! | `OptionalWith(f, s)` | like `Optional` with sentinel `s` | |
//! | `IfThenElse(c, a, b)` | `a` if `c` holds, else `b` | same choice |
//! | `Repeat(f, n)` | `n` items | exactly `n` items |
//! | `RepeatBy(f, name)` | as many items as field `name` says | same |
//! | `PrefixedArray(c, f)` | count with codec `c`, then items | count, then items |
//! | `Remainder` | all bytes up to the section end | verbatim |
//! | `Const(v, c)` | asserts `v` | writes `v` |
//! | `Pass` | nothing | nothing |
//!
//! Conditions see the section version and every field parsed so far in the
//! enclosing structs.

mod value;

pub use value::{FromValue, IntoValue, Record, Value};

use std::io::{Seek, Write};

use distance_core::{Error, Quat, Result, Vec3, SKIP};

use crate::bytes::{DstBytes, DstWriter};

/// Primitive codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// One byte, non-zero is true
    Bool,
    /// dst-string
    Str,
    /// Three `f32`
    Vec3,
    /// Four `f32`, xyzw
    Quat,
    /// Fixed-length blob
    Bytes(usize),
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::U8 => "u8",
            Codec::U16 => "u16",
            Codec::U32 => "u32",
            Codec::U64 => "u64",
            Codec::I8 => "i8",
            Codec::I16 => "i16",
            Codec::I32 => "i32",
            Codec::I64 => "i64",
            Codec::F32 => "f32",
            Codec::F64 => "f64",
            Codec::Bool => "bool",
            Codec::Str => "str",
            Codec::Vec3 => "vec3",
            Codec::Quat => "quat",
            Codec::Bytes(_) => "bytes",
        }
    }

    pub fn read(self, r: &mut DstBytes) -> Result<Value> {
        Ok(match self {
            Codec::U8 => Value::UInt(r.read_u8()?.into()),
            Codec::U16 => Value::UInt(r.read_u16()?.into()),
            Codec::U32 => Value::UInt(r.read_u32()?.into()),
            Codec::U64 => Value::UInt(r.read_u64()?),
            Codec::I8 => Value::Int(r.read_i8()?.into()),
            Codec::I16 => Value::Int(r.read_i16()?.into()),
            Codec::I32 => Value::Int(r.read_i32()?.into()),
            Codec::I64 => Value::Int(r.read_i64()?),
            Codec::F32 => Value::F32(r.read_f32()?),
            Codec::F64 => Value::F64(r.read_f64()?),
            Codec::Bool => Value::Bool(r.read_u8()? != 0),
            Codec::Str => Value::Str(r.read_str()?),
            Codec::Vec3 => Value::Vec3(Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?)),
            Codec::Quat => Value::Quat(Quat::new(
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
            )),
            Codec::Bytes(n) => Value::Bytes(r.read_bytes(n as u64)?.to_vec()),
        })
    }

    pub fn write<W: Write + Seek>(self, w: &mut DstWriter<W>, value: &Value) -> Result<()> {
        match self {
            Codec::U8 => w.write_u8(u8::from_value(value)?),
            Codec::U16 => w.write_u16(u16::from_value(value)?),
            Codec::U32 => w.write_u32(u32::from_value(value)?),
            Codec::U64 => w.write_u64(u64::from_value(value)?),
            Codec::I8 => w.write_i8(i8::from_value(value)?),
            Codec::I16 => w.write_i16(i16::from_value(value)?),
            Codec::I32 => w.write_i32(i32::from_value(value)?),
            Codec::I64 => w.write_i64(i64::from_value(value)?),
            Codec::F32 => w.write_f32(f32::from_value(value)?),
            Codec::F64 => w.write_f64(f64::from_value(value)?),
            Codec::Bool => w.write_u8(u8::from(bool::from_value(value)?)),
            Codec::Str => w.write_str(&String::from_value(value)?),
            Codec::Vec3 => {
                for c in Vec3::from_value(value)?.to_array() {
                    w.write_f32(c)?;
                }
                Ok(())
            }
            Codec::Quat => {
                for c in Quat::from_value(value)?.to_array() {
                    w.write_f32(c)?;
                }
                Ok(())
            }
            Codec::Bytes(n) => match value {
                Value::Bytes(b) if b.len() == n => w.write_bytes(b),
                Value::Bytes(b) => Err(Error::ValueOutOfRange {
                    codec: "bytes",
                    value: format!("{} bytes where {n} are required", b.len()),
                }),
                other => Err(Error::schema("", format!("expected bytes, found {}", other.kind()))),
            },
        }
    }

    /// Zero value of this codec
    pub fn zero(self) -> Value {
        match self {
            Codec::U8 | Codec::U16 | Codec::U32 | Codec::U64 => Value::UInt(0),
            Codec::I8 | Codec::I16 | Codec::I32 | Codec::I64 => Value::Int(0),
            Codec::F32 => Value::F32(0.0),
            Codec::F64 => Value::F64(0.0),
            Codec::Bool => Value::Bool(false),
            Codec::Str => Value::Str(String::new()),
            Codec::Vec3 => Value::Vec3(Vec3::ZERO),
            Codec::Quat => Value::Quat(Quat::IDENTITY),
            Codec::Bytes(n) => Value::Bytes(vec![0; n]),
        }
    }
}

/// A value that can appear in a static schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    Str(&'static str),
    Vec3([f32; 3]),
    Quat([f32; 4]),
}

impl ConstValue {
    pub fn to_value(self) -> Value {
        match self {
            ConstValue::None => Value::None,
            ConstValue::Bool(b) => Value::Bool(b),
            ConstValue::Int(v) => Value::Int(v),
            ConstValue::UInt(v) => Value::UInt(v),
            ConstValue::F32(v) => Value::F32(v),
            ConstValue::Str(s) => Value::Str(s.to_owned()),
            ConstValue::Vec3(v) => Value::Vec3(v.into()),
            ConstValue::Quat(q) => Value::Quat(q.into()),
        }
    }
}

/// Condition for [`Field::IfThenElse`]
#[derive(Debug, Clone, Copy)]
pub enum Cond {
    VersionAtLeast(u32),
    VersionBelow(u32),
    /// Inclusive version range
    VersionIn(u32, u32),
    /// A previously parsed field is truthy
    FieldTrue(&'static str),
    Fn(fn(&Ctx) -> bool),
}

impl Cond {
    pub fn eval(&self, ctx: &Ctx) -> bool {
        match *self {
            Cond::VersionAtLeast(v) => ctx.version >= v,
            Cond::VersionBelow(v) => ctx.version < v,
            Cond::VersionIn(lo, hi) => (lo..=hi).contains(&ctx.version),
            Cond::FieldTrue(name) => ctx.lookup(name).is_some_and(Value::is_true),
            Cond::Fn(f) => f(ctx),
        }
    }
}

/// Schema combinators
#[derive(Debug, Clone, Copy)]
pub enum Field {
    Struct(&'static [(&'static str, Field)]),
    Codec(Codec),
    Default(&'static Field, ConstValue),
    Optional(&'static Field),
    OptionalWith(&'static Field, [u8; 4]),
    IfThenElse(Cond, &'static Field, &'static Field),
    Repeat(&'static Field, usize),
    RepeatBy(&'static Field, &'static str),
    PrefixedArray(Codec, &'static Field),
    Remainder,
    Const(ConstValue, Codec),
    Pass,
}

/// Evaluation context: the section version and the fields seen so far
#[derive(Debug, Default)]
pub struct Ctx {
    pub version: u32,
    scopes: Vec<Record>,
}

impl Ctx {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            scopes: Vec::new(),
        }
    }

    /// Innermost field named `name` among the enclosing structs
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn count_of(&self, name: &str) -> Result<usize> {
        self.lookup(name)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| Error::schema(name, "count field missing or not an integer"))
    }
}

/// Parse `field` from the reader; reads stop at the reader's limit
pub fn parse(field: &Field, r: &mut DstBytes, ctx: &mut Ctx) -> Result<Value> {
    parse_inner(field, r, ctx).map(|(value, _)| value)
}

/// Parse a struct schema into a record for a section of `version`
pub fn parse_record(field: &Field, r: &mut DstBytes, version: u32) -> Result<Record> {
    match parse(field, r, &mut Ctx::new(version))? {
        Value::Record(record) => Ok(record),
        other => Err(Error::schema("", format!("schema produced {} instead of a record", other.kind()))),
    }
}

/// Returns the value and whether it was filled from a default at section end
fn parse_inner(field: &Field, r: &mut DstBytes, ctx: &mut Ctx) -> Result<(Value, bool)> {
    let value = match *field {
        Field::Struct(members) => {
            ctx.scopes.push(Record::new());
            let result = parse_members(members, r, ctx);
            let record = ctx.scopes.pop().unwrap_or_default();
            result?;
            Value::Record(record)
        }
        Field::Codec(codec) => codec.read(r)?,
        Field::Default(inner, value) => {
            if r.remaining() == 0 {
                return Ok((value.to_value(), true));
            }
            return parse_inner(inner, r, ctx);
        }
        Field::Optional(inner) => return parse_optional(inner, &SKIP, r, ctx),
        Field::OptionalWith(inner, ref sentinel) => return parse_optional(inner, sentinel, r, ctx),
        Field::IfThenElse(cond, then, otherwise) => {
            let branch = if cond.eval(ctx) { then } else { otherwise };
            return parse_inner(branch, r, ctx);
        }
        Field::Repeat(inner, n) => parse_items(inner, n, r, ctx)?,
        Field::RepeatBy(inner, name) => {
            let n = ctx.count_of(name)?;
            parse_items(inner, n, r, ctx)?
        }
        Field::PrefixedArray(count, inner) => {
            let n = count
                .read(r)?
                .as_u64()
                .ok_or_else(|| Error::schema("", "array count is not an integer"))?;
            parse_items(inner, n as usize, r, ctx)?
        }
        Field::Remainder => Value::Bytes(r.read_bytes(r.remaining())?.to_vec()),
        Field::Const(expected, codec) => {
            let at = r.tell();
            let found = codec.read(r)?;
            let expected = expected.to_value();
            if found != expected {
                return Err(Error::bad_framing(
                    at,
                    format!("expected constant {expected:?}, found {found:?}"),
                ));
            }
            found
        }
        Field::Pass => Value::None,
    };
    Ok((value, false))
}

fn parse_members(members: &[(&'static str, Field)], r: &mut DstBytes, ctx: &mut Ctx) -> Result<()> {
    for (name, member) in members {
        let (value, implicit) = parse_inner(member, r, ctx)?;
        if let Some(record) = ctx.scopes.last_mut() {
            if implicit && record.truncated_at.is_none() {
                record.truncated_at = Some(record.len());
            }
            record.push(*name, value);
        }
    }
    Ok(())
}

fn parse_optional(inner: &Field, sentinel: &[u8; 4], r: &mut DstBytes, ctx: &mut Ctx) -> Result<(Value, bool)> {
    if r.remaining() >= 4 && r.peek(4)?[..] == sentinel[..] {
        r.read_bytes(4)?;
        return Ok((Value::None, false));
    }
    parse_inner(inner, r, ctx)
}

fn parse_items(inner: &Field, n: usize, r: &mut DstBytes, ctx: &mut Ctx) -> Result<Value> {
    let mut items = Vec::with_capacity(n.min(4096));
    for _ in 0..n {
        items.push(parse(inner, r, ctx)?);
    }
    Ok(Value::List(items))
}

/// Emit `value` according to `field`
pub fn emit<W: Write + Seek>(field: &Field, value: &Value, w: &mut DstWriter<W>, ctx: &mut Ctx) -> Result<()> {
    match *field {
        Field::Struct(members) => {
            let record = value
                .as_record()
                .ok_or_else(|| Error::schema("", format!("expected record, found {}", value.kind())))?;
            ctx.scopes.push(record.clone());
            let result = emit_members(members, record, w, ctx);
            ctx.scopes.pop();
            result
        }
        Field::Codec(codec) => codec.write(w, value),
        Field::Default(inner, default) => {
            if value.is_none() {
                emit(inner, &default.to_value(), w, ctx)
            } else {
                emit(inner, value, w, ctx)
            }
        }
        Field::Optional(inner) => emit_optional(inner, &SKIP, value, w, ctx),
        Field::OptionalWith(inner, ref sentinel) => emit_optional(inner, sentinel, value, w, ctx),
        Field::IfThenElse(cond, then, otherwise) => {
            let branch = if cond.eval(ctx) { then } else { otherwise };
            emit(branch, value, w, ctx)
        }
        Field::Repeat(inner, n) => emit_items(inner, Some(n), value, w, ctx),
        Field::RepeatBy(inner, name) => {
            let n = ctx.count_of(name)?;
            emit_items(inner, Some(n), value, w, ctx)
        }
        Field::PrefixedArray(count, inner) => {
            let len = value.as_list().map_or(0, <[Value]>::len);
            count.write(w, &Value::UInt(len as u64))?;
            emit_items(inner, None, value, w, ctx)
        }
        Field::Remainder => match value {
            Value::Bytes(b) => w.write_bytes(b),
            Value::None => Ok(()),
            other => Err(Error::schema("", format!("expected bytes, found {}", other.kind()))),
        },
        Field::Const(constant, codec) => codec.write(w, &constant.to_value()),
        Field::Pass => Ok(()),
    }
}

/// Emit a record produced by [`parse_record`] or [`default_record`]
pub fn emit_record<W: Write + Seek>(field: &Field, record: &Record, w: &mut DstWriter<W>, version: u32) -> Result<()> {
    emit(field, &Value::Record(record.clone()), w, &mut Ctx::new(version))
}

fn emit_members<W: Write + Seek>(
    members: &[(&'static str, Field)],
    record: &Record,
    w: &mut DstWriter<W>,
    ctx: &mut Ctx,
) -> Result<()> {
    for (i, (name, member)) in members.iter().enumerate() {
        if record.truncated_at.is_some_and(|t| i >= t) {
            break;
        }
        let value = record.get(name).unwrap_or(&Value::None);
        emit(member, value, w, ctx).map_err(|e| match e {
            Error::Schema { field, message } if field.is_empty() => Error::schema(*name, message),
            other => other,
        })?;
    }
    Ok(())
}

fn emit_optional<W: Write + Seek>(
    inner: &Field,
    sentinel: &[u8; 4],
    value: &Value,
    w: &mut DstWriter<W>,
    ctx: &mut Ctx,
) -> Result<()> {
    if value.is_none() {
        w.write_bytes(sentinel)
    } else {
        emit(inner, value, w, ctx)
    }
}

fn emit_items<W: Write + Seek>(
    inner: &Field,
    expected: Option<usize>,
    value: &Value,
    w: &mut DstWriter<W>,
    ctx: &mut Ctx,
) -> Result<()> {
    let items = match value {
        Value::List(items) => items.as_slice(),
        Value::None => &[],
        other => return Err(Error::schema("", format!("expected list, found {}", other.kind()))),
    };
    if let Some(n) = expected {
        if items.len() != n {
            return Err(Error::schema("", format!("expected {n} items, found {}", items.len())));
        }
    }
    for item in items {
        emit(inner, item, w, ctx)?;
    }
    Ok(())
}

/// Fresh value for `field` with every default applied
pub fn defaults(field: &Field, ctx: &mut Ctx) -> Value {
    match *field {
        Field::Struct(members) => {
            ctx.scopes.push(Record::new());
            for (name, member) in members {
                let value = defaults(member, ctx);
                if let Some(record) = ctx.scopes.last_mut() {
                    record.push(*name, value);
                }
            }
            Value::Record(ctx.scopes.pop().unwrap_or_default())
        }
        Field::Codec(codec) => codec.zero(),
        Field::Default(_, value) | Field::Const(value, _) => value.to_value(),
        Field::Optional(_) | Field::OptionalWith(..) | Field::Pass => Value::None,
        Field::IfThenElse(cond, then, otherwise) => {
            let branch = if cond.eval(ctx) { then } else { otherwise };
            defaults(branch, ctx)
        }
        Field::Repeat(inner, n) => Value::List((0..n).map(|_| defaults(inner, ctx)).collect()),
        Field::RepeatBy(inner, name) => {
            let n = ctx.count_of(name).unwrap_or(0);
            Value::List((0..n).map(|_| defaults(inner, ctx)).collect())
        }
        Field::PrefixedArray(..) => Value::List(Vec::new()),
        Field::Remainder => Value::Bytes(Vec::new()),
    }
}

/// Fresh record for a struct schema at `version`
pub fn default_record(field: &Field, version: u32) -> Record {
    match defaults(field, &mut Ctx::new(version)) {
        Value::Record(record) => record,
        _ => Record::new(),
    }
}

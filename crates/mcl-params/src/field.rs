//! Fixed binary layouts.
//!
//! A [`Layout`] is an ordered list of typed fields packed big-endian with no
//! padding. Decoding produces a [`Record`]; records are immutable and every
//! change builds a new record, so a reader never sees a half-applied update.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ParamError, Result};
use crate::key::ParamKey;

/// Primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F64,
}

impl FieldType {
    /// Encoded width in bytes.
    pub const fn size(self) -> usize {
        match self {
            FieldType::Bool | FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::U8 => "u8",
            FieldType::U16 => "u16",
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::I8 => "i8",
            FieldType::I16 => "i16",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::F64 => "f64",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded field.
///
/// Equality compares doubles bit-for-bit, so `NaN == NaN` and `0.0 != -0.0`.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
}

impl FieldValue {
    pub const fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::U64(_) => FieldType::U64,
            FieldValue::I8(_) => FieldType::I8,
            FieldValue::I16(_) => FieldType::I16,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::I64(_) => FieldType::I64,
            FieldValue::F64(_) => FieldType::F64,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FieldValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match *self {
            FieldValue::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match *self {
            FieldValue::U16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Integer fields widened to `i128`; `None` for bools and doubles.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            FieldValue::U8(v) => Some(v.into()),
            FieldValue::U16(v) => Some(v.into()),
            FieldValue::U32(v) => Some(v.into()),
            FieldValue::U64(v) => Some(v.into()),
            FieldValue::I8(v) => Some(v.into()),
            FieldValue::I16(v) => Some(v.into()),
            FieldValue::I32(v) => Some(v.into()),
            FieldValue::I64(v) => Some(v.into()),
            FieldValue::Bool(_) | FieldValue::F64(_) => None,
        }
    }

    /// Parse text as a value of type `ty`.
    ///
    /// Booleans accept `true`/`false`/`1`/`0`/`on`/`off`.
    pub fn parse(ty: FieldType, text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || ParamError::InvalidValue {
            expected: ty,
            value: text.to_string(),
        };
        let value = match ty {
            FieldType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => FieldValue::Bool(true),
                "false" | "0" | "off" => FieldValue::Bool(false),
                _ => return Err(invalid()),
            },
            FieldType::U8 => FieldValue::U8(text.parse().map_err(|_| invalid())?),
            FieldType::U16 => FieldValue::U16(text.parse().map_err(|_| invalid())?),
            FieldType::U32 => FieldValue::U32(text.parse().map_err(|_| invalid())?),
            FieldType::U64 => FieldValue::U64(text.parse().map_err(|_| invalid())?),
            FieldType::I8 => FieldValue::I8(text.parse().map_err(|_| invalid())?),
            FieldType::I16 => FieldValue::I16(text.parse().map_err(|_| invalid())?),
            FieldType::I32 => FieldValue::I32(text.parse().map_err(|_| invalid())?),
            FieldType::I64 => FieldValue::I64(text.parse().map_err(|_| invalid())?),
            FieldType::F64 => FieldValue::F64(text.parse().map_err(|_| invalid())?),
        };
        Ok(value)
    }

    fn decode(ty: FieldType, src: &mut &[u8]) -> Self {
        match ty {
            FieldType::Bool => FieldValue::Bool(src.get_u8() != 0),
            FieldType::U8 => FieldValue::U8(src.get_u8()),
            FieldType::U16 => FieldValue::U16(src.get_u16()),
            FieldType::U32 => FieldValue::U32(src.get_u32()),
            FieldType::U64 => FieldValue::U64(src.get_u64()),
            FieldType::I8 => FieldValue::I8(src.get_i8()),
            FieldType::I16 => FieldValue::I16(src.get_i16()),
            FieldType::I32 => FieldValue::I32(src.get_i32()),
            FieldType::I64 => FieldValue::I64(src.get_i64()),
            FieldType::F64 => FieldValue::F64(src.get_f64()),
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        match *self {
            FieldValue::Bool(v) => dst.put_u8(u8::from(v)),
            FieldValue::U8(v) => dst.put_u8(v),
            FieldValue::U16(v) => dst.put_u16(v),
            FieldValue::U32(v) => dst.put_u32(v),
            FieldValue::U64(v) => dst.put_u64(v),
            FieldValue::I8(v) => dst.put_i8(v),
            FieldValue::I16(v) => dst.put_i16(v),
            FieldValue::I32(v) => dst.put_i32(v),
            FieldValue::I64(v) => dst.put_i64(v),
            FieldValue::F64(v) => dst.put_f64(v),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::U8(a), FieldValue::U8(b)) => a == b,
            (FieldValue::U16(a), FieldValue::U16(b)) => a == b,
            (FieldValue::U32(a), FieldValue::U32(b)) => a == b,
            (FieldValue::U64(a), FieldValue::U64(b)) => a == b,
            (FieldValue::I8(a), FieldValue::I8(b)) => a == b,
            (FieldValue::I16(a), FieldValue::I16(b)) => a == b,
            (FieldValue::I32(a), FieldValue::I32(b)) => a == b,
            (FieldValue::I64(a), FieldValue::I64(b)) => a == b,
            (FieldValue::F64(a), FieldValue::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::U8(v) => write!(f, "{v}"),
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::I8(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Domain constraint checked when a field is set by the client.
///
/// Doubles must always be finite in addition to the rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Any,
    /// `v > 0`
    Positive,
    /// `v >= 0`
    NonNegative,
    /// `lo < v < hi`
    Open(f64, f64),
    /// Enumeration code in `0..n`.
    Code(u8),
    /// Integer `>= n`.
    AtLeast(u64),
}

impl Rule {
    fn check(self, value: &FieldValue) -> std::result::Result<(), String> {
        if let FieldValue::F64(v) = *value {
            if !v.is_finite() {
                return Err(format!("{v} is not finite"));
            }
            return match self {
                Rule::Positive if v <= 0.0 => Err(format!("{v} must be > 0")),
                Rule::NonNegative if v < 0.0 => Err(format!("{v} must be >= 0")),
                Rule::Open(lo, hi) if v <= lo || v >= hi => {
                    Err(format!("{v} must be between {lo} and {hi} (exclusive)"))
                }
                _ => Ok(()),
            };
        }

        match (self, value.as_integer()) {
            (Rule::Code(n), Some(code)) if code >= i128::from(n) => {
                Err(format!("code {code} out of range 0..{n}"))
            }
            (Rule::AtLeast(min), Some(v)) if v < i128::from(min) => {
                Err(format!("{v} must be >= {min}"))
            }
            _ => Ok(()),
        }
    }
}

/// One named field of a layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: FieldValue,
    pub rule: Rule,
}

impl FieldSpec {
    pub const fn new(name: &'static str, default: FieldValue) -> Self {
        Self {
            name,
            ty: default.field_type(),
            default,
            rule: Rule::Any,
        }
    }

    pub const fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Validate a candidate value for this field.
    pub fn check(&self, key: ParamKey, value: &FieldValue) -> Result<()> {
        if value.field_type() != self.ty {
            return Err(ParamError::FieldType {
                key,
                field: self.name.to_string(),
                expected: self.ty,
                found: value.field_type(),
            });
        }
        self.rule.check(value).map_err(|reason| ParamError::Validation {
            key,
            field: self.name.to_string(),
            reason,
        })
    }
}

/// An ordered, packed, big-endian field list.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Layout {
    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size()).sum()
    }

    pub fn field(&self, name: &str) -> Option<(usize, &'static FieldSpec)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Record holding every field's default.
    pub fn default_record(&'static self) -> Record {
        Record {
            layout: self,
            values: self.fields.iter().map(|f| f.default).collect(),
        }
    }

    /// Decode a payload that must be exactly [`Layout::size`] bytes.
    pub fn decode(&'static self, key: ParamKey, payload: &[u8]) -> Result<Record> {
        let expected = self.size();
        if payload.len() != expected {
            return Err(ParamError::protocol(
                key,
                format!(
                    "{} expects {expected} bytes, got {}",
                    self.name,
                    payload.len()
                ),
            ));
        }

        let mut src = payload;
        let values = self
            .fields
            .iter()
            .map(|f| FieldValue::decode(f.ty, &mut src))
            .collect();
        Ok(Record {
            layout: self,
            values,
        })
    }
}

/// A decoded fixed-layout value.
#[derive(Debug, Clone)]
pub struct Record {
    layout: &'static Layout,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.layout.field(name).map(|(i, _)| self.values[i])
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn get_u8(&self, name: &str) -> Option<u8> {
        self.get(name).and_then(|v| v.as_u8())
    }

    pub fn get_u16(&self, name: &str) -> Option<u16> {
        self.get(name).and_then(|v| v.as_u16())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    /// `(name, value)` pairs in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldValue)> + '_ {
        self.layout
            .fields
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.name, *value))
    }

    /// Copy of this record with the given fields replaced.
    ///
    /// Every change is type- and domain-checked before anything is copied;
    /// on error `self` is untouched and no partial record exists.
    pub fn with_fields(&self, key: ParamKey, changes: &[(&str, FieldValue)]) -> Result<Record> {
        let mut values = self.values.clone();
        for (name, value) in changes {
            let (i, spec) = self.layout.field(name).ok_or_else(|| ParamError::UnknownField {
                key,
                field: (*name).to_string(),
            })?;
            spec.check(key, value)?;
            values[i] = *value;
        }
        Ok(Record {
            layout: self.layout,
            values,
        })
    }

    /// Domain-check every field of `self` that differs from `base`.
    ///
    /// Both records must share a layout. Unchanged fields are not checked,
    /// so values the system itself published can be written back as-is.
    pub fn check_changes(&self, key: ParamKey, base: &Record) -> Result<()> {
        let specs = self.layout.fields.iter();
        for ((spec, next), prev) in specs.zip(&self.values).zip(&base.values) {
            if next != prev {
                spec.check(key, next)?;
            }
        }
        Ok(())
    }

    pub fn with(&self, key: ParamKey, name: &str, value: FieldValue) -> Result<Record> {
        self.with_fields(key, &[(name, value)])
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.layout.size());
        for value in &self.values {
            value.encode(dst);
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.layout, other.layout) && self.values == other.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: Layout = Layout {
        name: "sample",
        fields: &[
            FieldSpec::new("flag", FieldValue::Bool(false)),
            FieldSpec::new("code", FieldValue::U8(0)).with_rule(Rule::Code(3)),
            FieldSpec::new("count", FieldValue::U16(1)).with_rule(Rule::AtLeast(1)),
            FieldSpec::new("level", FieldValue::F64(0.0)).with_rule(Rule::NonNegative),
            FieldSpec::new("offset", FieldValue::I32(0)),
        ],
    };

    const KEY: ParamKey = ParamKey::new(2, 200);

    #[test]
    fn size_is_packed() {
        assert_eq!(SAMPLE.size(), 1 + 1 + 2 + 8 + 4);
    }

    #[test]
    fn decode_reads_big_endian() {
        let mut wire = BytesMut::new();
        wire.put_u8(1);
        wire.put_u8(2);
        wire.put_u16(0x0102);
        wire.put_f64(2.5);
        wire.put_i32(-7);

        let record = SAMPLE.decode(KEY, &wire).unwrap();
        assert_eq!(record.get_bool("flag"), Some(true));
        assert_eq!(record.get_u8("code"), Some(2));
        assert_eq!(record.get_u16("count"), Some(0x0102));
        assert_eq!(record.get_f64("level"), Some(2.5));
        assert_eq!(record.get("offset"), Some(FieldValue::I32(-7)));

        let mut encoded = BytesMut::new();
        record.encode(&mut encoded);
        assert_eq!(encoded, wire);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let short = [0u8; 15];
        let long = [0u8; 17];
        assert!(matches!(
            SAMPLE.decode(KEY, &short),
            Err(ParamError::Protocol { .. })
        ));
        assert!(matches!(
            SAMPLE.decode(KEY, &long),
            Err(ParamError::Protocol { .. })
        ));
    }

    #[test]
    fn nonzero_byte_decodes_as_true() {
        let mut wire = [0u8; 16];
        wire[0] = 0x7F;
        let record = SAMPLE.decode(KEY, &wire).unwrap();
        assert_eq!(record.get_bool("flag"), Some(true));
    }

    #[test]
    fn with_is_copy_on_write() {
        let original = SAMPLE.default_record();
        let changed = original
            .with(KEY, "level", FieldValue::F64(1.5))
            .unwrap();
        assert_eq!(original.get_f64("level"), Some(0.0));
        assert_eq!(changed.get_f64("level"), Some(1.5));
    }

    #[test]
    fn with_checks_type_and_rule() {
        let record = SAMPLE.default_record();

        let err = record.with(KEY, "level", FieldValue::U8(1)).unwrap_err();
        assert!(matches!(err, ParamError::FieldType { expected: FieldType::F64, .. }));

        let err = record.with(KEY, "level", FieldValue::F64(-1.0)).unwrap_err();
        assert!(matches!(err, ParamError::Validation { .. }));

        let err = record.with(KEY, "level", FieldValue::F64(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, ParamError::Validation { .. }));

        let err = record.with(KEY, "code", FieldValue::U8(3)).unwrap_err();
        assert!(matches!(err, ParamError::Validation { .. }));

        let err = record.with(KEY, "count", FieldValue::U16(0)).unwrap_err();
        assert!(matches!(err, ParamError::Validation { .. }));

        let err = record.with(KEY, "missing", FieldValue::U8(0)).unwrap_err();
        assert!(matches!(err, ParamError::UnknownField { .. }));
    }

    #[test]
    fn multi_field_change_is_all_or_nothing() {
        let record = SAMPLE.default_record();
        let err = record
            .with_fields(
                KEY,
                &[
                    ("flag", FieldValue::Bool(true)),
                    ("level", FieldValue::F64(-2.0)),
                ],
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(record.get_bool("flag"), Some(false));
    }

    #[test]
    fn nan_equals_itself() {
        assert_eq!(FieldValue::F64(f64::NAN), FieldValue::F64(f64::NAN));
        assert_ne!(FieldValue::F64(0.0), FieldValue::F64(-0.0));
        assert_ne!(FieldValue::U8(1), FieldValue::U16(1));
    }

    #[test]
    fn parse_by_type() {
        assert_eq!(
            FieldValue::parse(FieldType::Bool, "on").unwrap(),
            FieldValue::Bool(true)
        );
        assert_eq!(
            FieldValue::parse(FieldType::U16, " 65535 ").unwrap(),
            FieldValue::U16(65535)
        );
        assert_eq!(
            FieldValue::parse(FieldType::F64, "1e3").unwrap(),
            FieldValue::F64(1000.0)
        );
        assert!(matches!(
            FieldValue::parse(FieldType::U8, "256"),
            Err(ParamError::InvalidValue { expected: FieldType::U8, .. })
        ));
        assert!(FieldValue::parse(FieldType::Bool, "yes please").is_err());
    }
}

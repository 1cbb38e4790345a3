use std::sync::Arc;

use bytes::BytesMut;

use crate::error::Result;
use crate::field::{Layout, Record};
use crate::key::ParamKey;
use crate::lockin::LockInReadings;
use crate::multiharmonic::MultiHarmonic;
use crate::waveform::{Waveform, WaveformKind};

/// How a parameter's payload is laid out.
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    /// Packed fixed-size record.
    Fixed(&'static Layout),
    MultiHarmonic,
    LockIn,
    Waveform(WaveformKind),
}

impl Codec {
    pub fn default_value(self) -> Value {
        match self {
            Codec::Fixed(layout) => Value::Record(layout.default_record()),
            Codec::MultiHarmonic => Value::MultiHarmonic(MultiHarmonic::default()),
            Codec::LockIn => Value::LockIn(Arc::new(LockInReadings::default())),
            Codec::Waveform(kind) => Value::Waveform(Arc::new(Waveform::empty(kind))),
        }
    }

    pub fn decode(self, key: ParamKey, payload: &[u8]) -> Result<Value> {
        Ok(match self {
            Codec::Fixed(layout) => Value::Record(layout.decode(key, payload)?),
            Codec::MultiHarmonic => Value::MultiHarmonic(MultiHarmonic::decode(key, payload)?),
            Codec::LockIn => Value::LockIn(Arc::new(LockInReadings::decode(key, payload)?)),
            Codec::Waveform(kind) => {
                Value::Waveform(Arc::new(Waveform::decode(kind, key, payload)?))
            }
        })
    }

    /// Whether `value` has the shape this codec produces.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Codec::Fixed(layout), Value::Record(record)) => std::ptr::eq(layout, record.layout()),
            (Codec::MultiHarmonic, Value::MultiHarmonic(_))
            | (Codec::LockIn, Value::LockIn(_))
            | (Codec::Waveform(_), Value::Waveform(_)) => true,
            _ => false,
        }
    }

    pub fn shape_name(self) -> &'static str {
        match self {
            Codec::Fixed(layout) => layout.name,
            Codec::MultiHarmonic => "multi-harmonic",
            Codec::LockIn => "lock-in data",
            Codec::Waveform(_) => "waveform",
        }
    }
}

/// The current value of a parameter.
///
/// Streamed values sit behind `Arc` so handing them to several observers
/// does not copy sample arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Record(Record),
    MultiHarmonic(MultiHarmonic),
    LockIn(Arc<LockInReadings>),
    Waveform(Arc<Waveform>),
}

impl Value {
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Record(record) => record.layout().name,
            Value::MultiHarmonic(_) => "multi-harmonic",
            Value::LockIn(_) => "lock-in data",
            Value::Waveform(_) => "waveform",
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_lockin(&self) -> Option<&Arc<LockInReadings>> {
        match self {
            Value::LockIn(readings) => Some(readings),
            _ => None,
        }
    }

    pub fn as_waveform(&self) -> Option<&Arc<Waveform>> {
        match self {
            Value::Waveform(wave) => Some(wave),
            _ => None,
        }
    }

    pub fn as_multi_harmonic(&self) -> Option<&MultiHarmonic> {
        match self {
            Value::MultiHarmonic(mh) => Some(mh),
            _ => None,
        }
    }

    /// Encode in wire layout. Waveforms encode to nothing.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Value::Record(record) => record.encode(dst),
            Value::MultiHarmonic(mh) => mh.encode(dst),
            Value::LockIn(readings) => readings.encode(dst),
            Value::Waveform(_) => {}
        }
    }
}

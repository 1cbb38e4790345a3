//! Parameter registry of the MCL lock-in protocol.
//!
//! Every protocol value is a parameter addressed by `(category, index)`.
//! Fixed-layout parameters carry packed big-endian records; lock-in data,
//! scope/FFT waveforms, and multi-harmonic settings have their own
//! variable-length decoders. Writable parameters queue one frame per
//! successful mutation; streamed parameters fan new values out to observers.

pub mod catalog;
pub mod enums;
pub mod error;
pub mod field;
pub mod key;
pub mod lockin;
pub mod multiharmonic;
pub mod observer;
pub mod parameter;
pub mod registry;
pub mod value;
pub mod views;
pub mod waveform;

pub use catalog::{descriptors, Descriptor, CONFIGURATION_COUNT};
pub use enums::{
    AmplitudeUnit, DutyCycleSource, FrequencySource, InputGain, LockIn, Module, PhaseSource,
    PllSource, WaveShape,
};
pub use error::{ParamError, Result};
pub use field::{FieldSpec, FieldType, FieldValue, Layout, Record, Rule};
pub use key::{Access, ParamKey};
pub use lockin::{GeneralReadings, LockInReadings, ModuleReadings};
pub use multiharmonic::MultiHarmonic;
pub use observer::{callback, Callback, Context};
pub use parameter::Parameter;
pub use registry::{Delivery, Registry};
pub use value::{Codec, Value};
pub use views::{
    Amplitude, Frequency, General, InputSettings, LockInControl, Offset, OutputSettings, PhaseShift,
    Pll,
};
pub use waveform::{Waveform, WaveformChannel, WaveformKind};

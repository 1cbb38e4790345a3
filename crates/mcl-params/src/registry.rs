use std::collections::BTreeMap;

use mcl_frame::{Frame, WriteQueue, CONFIGURATION, LOCKIN_DATA, WAVEFORMS};
use tracing::{debug, trace};

use crate::catalog::{self, descriptors, index};
use crate::enums::{LockIn, Module};
use crate::error::{ParamError, Result};
use crate::field::FieldValue;
use crate::key::ParamKey;
use crate::lockin::LockInReadings;
use crate::observer::{Callback, Context};
use crate::parameter::Parameter;
use crate::value::Value;
use crate::views::{
    Amplitude, Frequency, General, InputSettings, LockInControl, Offset, OutputSettings, PhaseShift,
    Pll,
};
use crate::waveform::Waveform;

/// Where an incoming frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was decoded into a registered parameter.
    Decoded,
    /// No parameter is registered at the frame's key; the payload was dropped.
    Unrouted,
}

/// Every parameter of one session, keyed by `(category, index)`.
///
/// Fully populated at construction and never changes shape afterwards.
/// Share it between threads behind an `Arc`.
#[derive(Debug)]
pub struct Registry {
    params: BTreeMap<ParamKey, Parameter>,
}

impl Registry {
    /// Build the registry from the static catalog. Writable parameters send
    /// their frames through `queue`.
    pub fn new(queue: WriteQueue) -> Self {
        let params: BTreeMap<_, _> = descriptors()
            .into_iter()
            .map(|d| (d.key, Parameter::new(d, &queue)))
            .collect();
        debug!(parameters = params.len(), "registry populated");
        Self { params }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The parameter at `key`, if one is registered.
    pub fn lookup(&self, key: ParamKey) -> Option<&Parameter> {
        self.params.get(&key)
    }

    pub fn parameter(&self, key: ParamKey) -> Result<&Parameter> {
        self.lookup(key).ok_or(ParamError::UnknownParameter(key))
    }

    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.params.values().find(|p| p.name() == name)
    }

    /// Parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    pub fn get(&self, key: ParamKey) -> Result<Value> {
        Ok(self.parameter(key)?.value())
    }

    /// Replace a parameter's whole value and send it.
    pub fn set(&self, key: ParamKey, value: Value) -> Result<()> {
        self.parameter(key)?.replace(value)
    }

    pub fn set_field(&self, key: ParamKey, name: &str, value: FieldValue) -> Result<()> {
        self.parameter(key)?.set_field(name, value)
    }

    /// Hand an incoming frame to its parameter.
    ///
    /// Unknown keys are not an error. A malformed payload is returned as
    /// [`ParamError::Protocol`] and the parameter keeps its previous value.
    pub fn dispatch(&self, frame: &Frame) -> Result<Delivery> {
        let key = ParamKey::new(frame.category, frame.index);
        match self.lookup(key) {
            Some(param) => {
                param.receive(&frame.payload)?;
                Ok(Delivery::Decoded)
            }
            None => {
                trace!(%key, len = frame.payload.len(), "no destination, frame dropped");
                Ok(Delivery::Unrouted)
            }
        }
    }

    pub fn register_observer(&self, key: ParamKey, callback: Callback, context: Context) -> Result<()> {
        self.parameter(key)?.register_observer(callback, context)
    }

    pub fn unregister_observer(&self, key: ParamKey, callback: &Callback) -> Result<()> {
        self.parameter(key)?.unregister_observer(callback)
    }

    fn config(&self, index: u16) -> Result<&Parameter> {
        self.parameter(ParamKey::new(CONFIGURATION, index))
    }

    fn numbered(&self, base: u16, count: u16, n: u16) -> Result<&Parameter> {
        if !(1..=count).contains(&n) {
            return Err(ParamError::InvalidEnum {
                kind: "channel number",
                value: n.to_string(),
            });
        }
        self.config(base + n - 1)
    }

    pub fn lockin(&self, lockin: LockIn) -> Result<LockInControl<'_>> {
        self.config(index::LOCKIN_CONTROL + lockin.offset())
            .map(LockInControl::new)
    }

    /// Input settings of `module`, channel 1 or 2.
    pub fn input(&self, module: Module, channel: u8) -> Result<InputSettings<'_>> {
        if !(1..=2).contains(&channel) {
            return Err(ParamError::InvalidEnum {
                kind: "input channel",
                value: channel.to_string(),
            });
        }
        self.config(index::INPUT_SETTINGS + module.offset() * 2 + u16::from(channel) - 1)
            .map(InputSettings::new)
    }

    pub fn output(&self, module: Module) -> Result<OutputSettings<'_>> {
        self.config(index::OUTPUT_SETTINGS + module.offset())
            .map(OutputSettings::new)
    }

    /// Frequency generator 1..=8.
    pub fn frequency(&self, n: u16) -> Result<Frequency<'_>> {
        self.numbered(index::FREQUENCY, 8, n).map(Frequency::new)
    }

    /// Amplitude 1..=5.
    pub fn amplitude(&self, n: u16) -> Result<Amplitude<'_>> {
        self.numbered(index::AMPLITUDE, 5, n).map(Amplitude::new)
    }

    /// Offset 1..=7.
    pub fn offset(&self, n: u16) -> Result<Offset<'_>> {
        self.numbered(index::OFFSET, 7, n).map(Offset::new)
    }

    /// PLL 1..=2.
    pub fn pll(&self, n: u16) -> Result<Pll<'_>> {
        self.numbered(index::PLL, 2, n).map(Pll::new)
    }

    /// Phase shift 1..=8.
    pub fn phase_shift(&self, n: u16) -> Result<PhaseShift<'_>> {
        self.numbered(index::PHASE_SHIFT, 8, n).map(PhaseShift::new)
    }

    pub fn general(&self) -> Result<General<'_>> {
        self.config(index::GENERAL).map(General::new)
    }

    /// Latest readings of a lock-in data stream.
    pub fn lockin_data(&self, lockin: LockIn) -> Result<std::sync::Arc<LockInReadings>> {
        let key = ParamKey::new(LOCKIN_DATA, index::LOCKIN_DATA + lockin.offset());
        streamed(key, self.get(key)?, Value::as_lockin)
    }

    pub fn scope(&self) -> Result<std::sync::Arc<Waveform>> {
        let key = ParamKey::new(WAVEFORMS, index::SCOPE);
        streamed(key, self.get(key)?, Value::as_waveform)
    }

    pub fn fft(&self) -> Result<std::sync::Arc<Waveform>> {
        let key = ParamKey::new(WAVEFORMS, index::FFT);
        streamed(key, self.get(key)?, Value::as_waveform)
    }

    /// Number of configuration indices the readiness barrier waits for.
    pub fn configuration_count(&self) -> u16 {
        catalog::CONFIGURATION_COUNT
    }
}

fn streamed<T: Clone>(
    key: ParamKey,
    value: Value,
    pick: impl Fn(&Value) -> Option<&T>,
) -> Result<T> {
    pick(&value).cloned().ok_or_else(|| ParamError::Shape {
        key,
        expected: "stream",
        found: value.shape_name(),
    })
}

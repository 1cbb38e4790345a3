//! Typed accessors over fixed-layout parameters.
//!
//! A view borrows a [`Parameter`] from the registry and translates between
//! domain types and record fields. Every setter goes through the field
//! rules, so an invalid value is rejected before anything is queued.

use crate::enums::{
    AmplitudeUnit, DutyCycleSource, FrequencySource, InputGain, Module, PhaseSource, PllSource,
    WaveShape,
};
use crate::error::{ParamError, Result};
use crate::field::FieldValue;
use crate::parameter::Parameter;

fn read<T>(param: &Parameter, name: &str, pick: impl FnOnce(&FieldValue) -> Option<T>) -> Result<T> {
    let record = param.record()?;
    record
        .get(name)
        .as_ref()
        .and_then(pick)
        .ok_or_else(|| ParamError::UnknownField {
            key: param.key(),
            field: name.to_string(),
        })
}

fn read_f64(param: &Parameter, name: &str) -> Result<f64> {
    read(param, name, FieldValue::as_f64)
}

fn read_bool(param: &Parameter, name: &str) -> Result<bool> {
    read(param, name, FieldValue::as_bool)
}

fn read_code(param: &Parameter, name: &str) -> Result<u8> {
    read(param, name, FieldValue::as_u8)
}

/// `Some(tc)` enables ramping with time constant `tc`; `None` disables it.
fn set_ramp(param: &Parameter, time_constant: Option<f64>) -> Result<()> {
    match time_constant {
        Some(tc) => param.set_fields(&[
            ("ramp_changes", FieldValue::Bool(true)),
            ("ramp_time_constant_s", FieldValue::F64(tc)),
        ]),
        None => param.set_field("ramp_changes", FieldValue::Bool(false)),
    }
}

fn ramp(param: &Parameter) -> Result<Option<f64>> {
    if read_bool(param, "ramp_changes")? {
        read_f64(param, "ramp_time_constant_s").map(Some)
    } else {
        Ok(None)
    }
}

macro_rules! view {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            param: &'a Parameter,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(param: &'a Parameter) -> Self {
                Self { param }
            }

            /// The underlying parameter.
            pub fn parameter(&self) -> &'a Parameter {
                self.param
            }
        }
    };
}

view! {
    /// Demodulation settings of one lock-in amplifier.
    LockInControl
}

impl LockInControl<'_> {
    pub fn frequency_source(&self) -> Result<FrequencySource> {
        FrequencySource::from_code(read_code(self.param, "frequency_source")?)
    }

    pub fn set_frequency_source(&self, source: FrequencySource) -> Result<()> {
        self.param
            .set_field("frequency_source", FieldValue::U8(source.code()))
    }

    pub fn wave_shape(&self) -> Result<WaveShape> {
        WaveShape::from_code(read_code(self.param, "wave_shape")?)
    }

    pub fn set_wave_shape(&self, shape: WaveShape) -> Result<()> {
        self.param.set_field("wave_shape", FieldValue::U8(shape.code()))
    }

    pub fn phase_source(&self) -> Result<PhaseSource> {
        PhaseSource::from_code(read_code(self.param, "phase_source")?)
    }

    pub fn set_phase_source(&self, source: PhaseSource) -> Result<()> {
        self.param
            .set_field("phase_source", FieldValue::U8(source.code()))
    }

    pub fn duty_cycle_source(&self) -> Result<DutyCycleSource> {
        DutyCycleSource::from_code(read_code(self.param, "duty_cycle_source")?)
    }

    pub fn set_duty_cycle_source(&self, source: DutyCycleSource) -> Result<()> {
        self.param
            .set_field("duty_cycle_source", FieldValue::U8(source.code()))
    }

    pub fn harmonic(&self) -> Result<u16> {
        read(self.param, "harmonic", FieldValue::as_u16)
    }

    /// Harmonic of the reference to demodulate, `1..=65535`.
    pub fn set_harmonic(&self, harmonic: u16) -> Result<()> {
        self.param.set_field("harmonic", FieldValue::U16(harmonic))
    }

    pub fn time_constant(&self) -> Result<f64> {
        read_f64(self.param, "time_constant")
    }

    pub fn set_time_constant(&self, seconds: f64) -> Result<()> {
        self.param.set_field("time_constant", FieldValue::F64(seconds))
    }

    pub fn filter_enabled(&self) -> Result<bool> {
        read_bool(self.param, "filter_enable")
    }

    pub fn set_filter_enabled(&self, enabled: bool) -> Result<()> {
        self.param.set_field("filter_enable", FieldValue::Bool(enabled))
    }

    /// Time constants of the two low-pass stages.
    pub fn stage_time_constants(&self) -> Result<(f64, f64)> {
        Ok((
            read_f64(self.param, "stage1_tc")?,
            read_f64(self.param, "stage2_tc")?,
        ))
    }

    pub fn set_stage_time_constants(&self, stage1: f64, stage2: f64) -> Result<()> {
        self.param.set_fields(&[
            ("stage1_tc", FieldValue::F64(stage1)),
            ("stage2_tc", FieldValue::F64(stage2)),
        ])
    }
}

view! {
    /// Front-end settings of one input channel.
    InputSettings
}

impl InputSettings<'_> {
    pub fn gain(&self) -> Result<InputGain> {
        InputGain::from_code(read_code(self.param, "gain")?)
    }

    pub fn set_gain(&self, gain: InputGain) -> Result<()> {
        self.param.set_field("gain", FieldValue::U8(gain.code()))
    }

    pub fn ac_coupling(&self) -> Result<bool> {
        read_bool(self.param, "ac_coupling")
    }

    pub fn set_ac_coupling(&self, ac: bool) -> Result<()> {
        self.param.set_field("ac_coupling", FieldValue::Bool(ac))
    }

    pub fn grounded(&self) -> Result<bool> {
        read_bool(self.param, "grounded")
    }

    pub fn set_grounded(&self, grounded: bool) -> Result<()> {
        self.param.set_field("grounded", FieldValue::Bool(grounded))
    }

    pub fn auto_range(&self) -> Result<bool> {
        read_bool(self.param, "auto_range")
    }

    pub fn set_auto_range(&self, auto: bool) -> Result<()> {
        self.param.set_field("auto_range", FieldValue::Bool(auto))
    }
}

view! {
    OutputSettings
}

impl OutputSettings<'_> {
    pub fn output_enabled(&self) -> Result<bool> {
        read_bool(self.param, "output_enabled")
    }

    pub fn set_output_enabled(&self, enabled: bool) -> Result<()> {
        self.param
            .set_field("output_enabled", FieldValue::Bool(enabled))
    }
}

view! {
    /// One of the eight frequency generators.
    Frequency
}

impl Frequency<'_> {
    pub fn hz(&self) -> Result<f64> {
        read_f64(self.param, "frequency_hz")
    }

    /// Must lie strictly between 0 and 2 MHz.
    pub fn set_hz(&self, hz: f64) -> Result<()> {
        self.param.set_field("frequency_hz", FieldValue::F64(hz))
    }

    pub fn ramp(&self) -> Result<Option<f64>> {
        ramp(self.param)
    }

    pub fn set_ramp(&self, time_constant: Option<f64>) -> Result<()> {
        set_ramp(self.param, time_constant)
    }
}

view! {
    Amplitude
}

impl Amplitude<'_> {
    pub fn volts(&self) -> Result<f64> {
        read_f64(self.param, "amplitude_v")
    }

    pub fn set_volts(&self, volts: f64) -> Result<()> {
        self.param.set_field("amplitude_v", FieldValue::F64(volts))
    }

    pub fn unit(&self) -> Result<AmplitudeUnit> {
        AmplitudeUnit::from_code(read_code(self.param, "unit")?)
    }

    pub fn set_unit(&self, unit: AmplitudeUnit) -> Result<()> {
        self.param.set_field("unit", FieldValue::U8(unit.code()))
    }

    pub fn ramp(&self) -> Result<Option<f64>> {
        ramp(self.param)
    }

    pub fn set_ramp(&self, time_constant: Option<f64>) -> Result<()> {
        set_ramp(self.param, time_constant)
    }
}

view! {
    Offset
}

impl Offset<'_> {
    pub fn volts(&self) -> Result<f64> {
        read_f64(self.param, "offset_v")
    }

    pub fn set_volts(&self, volts: f64) -> Result<()> {
        self.param.set_field("offset_v", FieldValue::F64(volts))
    }

    pub fn ramp(&self) -> Result<Option<f64>> {
        ramp(self.param)
    }

    pub fn set_ramp(&self, time_constant: Option<f64>) -> Result<()> {
        set_ramp(self.param, time_constant)
    }
}

view! {
    Pll
}

impl Pll<'_> {
    pub fn source(&self) -> Result<PllSource> {
        PllSource::from_code(read_code(self.param, "source")?)
    }

    pub fn set_source(&self, source: PllSource) -> Result<()> {
        self.param.set_field("source", FieldValue::U8(source.code()))
    }

    pub fn falling_edge(&self) -> Result<bool> {
        read_bool(self.param, "falling_edge")
    }

    pub fn set_falling_edge(&self, falling: bool) -> Result<()> {
        self.param
            .set_field("falling_edge", FieldValue::Bool(falling))
    }

    pub fn phase_shift_deg(&self) -> Result<f64> {
        read_f64(self.param, "phase_shift_deg")
    }

    pub fn set_phase_shift_deg(&self, degrees: f64) -> Result<()> {
        self.param
            .set_field("phase_shift_deg", FieldValue::F64(degrees))
    }
}

view! {
    PhaseShift
}

impl PhaseShift<'_> {
    pub fn degrees(&self) -> Result<f64> {
        read_f64(self.param, "phase_shift_deg")
    }

    pub fn set_degrees(&self, degrees: f64) -> Result<()> {
        self.param
            .set_field("phase_shift_deg", FieldValue::F64(degrees))
    }
}

view! {
    /// System-wide settings.
    General
}

impl General<'_> {
    /// Ask the system to publish its full configuration state.
    pub fn request_update(&self) -> Result<()> {
        self.param.set_field("update_user", FieldValue::Bool(true))
    }

    /// Modules the system reports as installed.
    pub fn installed_modules(&self) -> Result<Vec<Module>> {
        let record = self.param.record()?;
        Ok(Module::ALL
            .into_iter()
            .filter(|m| {
                record
                    .get_bool(&format!("installed_module_{}", m.letter()))
                    .unwrap_or(false)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use mcl_frame::{write_queue, WriteQueueReceiver};

    use super::*;
    use crate::catalog;
    use crate::enums::LockIn;
    use crate::registry::Registry;

    fn registry() -> (Registry, WriteQueueReceiver) {
        let (queue, rx) = write_queue();
        (Registry::new(queue), rx)
    }

    #[test]
    fn ramp_sets_flag_and_time_constant_in_one_frame() {
        let (registry, rx) = registry();
        let freq = registry.frequency(3).unwrap();
        freq.set_ramp(Some(0.25)).unwrap();
        assert_eq!(freq.ramp().unwrap(), Some(0.25));

        let frames = rx.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, catalog::index::FREQUENCY + 2);
        // frequency_hz (8) then ramp_changes (1) then the time constant
        assert_eq!(frames[0].payload[8], 1);
        assert_eq!(&frames[0].payload[9..17], &0.25f64.to_be_bytes());

        freq.set_ramp(None).unwrap();
        assert_eq!(freq.ramp().unwrap(), None);
        assert_eq!(rx.drain_frames().len(), 1);
    }

    #[test]
    fn frequency_range_is_open() {
        let (registry, rx) = registry();
        let freq = registry.frequency(1).unwrap();
        for bad in [0.0, -1.0, 2e6, f64::NAN, f64::INFINITY] {
            let err = freq.set_hz(bad).unwrap_err();
            assert!(err.is_validation(), "{bad}: {err}");
        }
        assert!(rx.drain_frames().is_empty());

        freq.set_hz(1_999_999.5).unwrap();
        assert_eq!(freq.hz().unwrap(), 1_999_999.5);
    }

    #[test]
    fn lockin_time_constants_must_be_positive() {
        let (registry, rx) = registry();
        let lockin = registry.lockin(LockIn::L1).unwrap();
        assert!(lockin.set_time_constant(0.0).is_err());
        assert!(lockin.set_stage_time_constants(0.1, -0.1).is_err());
        assert_eq!(lockin.time_constant().unwrap(), 1.0);
        assert!(rx.drain_frames().is_empty());

        lockin.set_stage_time_constants(0.1, 0.2).unwrap();
        assert_eq!(lockin.stage_time_constants().unwrap(), (0.1, 0.2));
        assert_eq!(rx.drain_frames().len(), 1);
    }

    #[test]
    fn harmonic_zero_rejected() {
        let (registry, _rx) = registry();
        let lockin = registry.lockin(LockIn::L2).unwrap();
        assert!(lockin.set_harmonic(0).unwrap_err().is_validation());
        lockin.set_harmonic(u16::MAX).unwrap();
        assert_eq!(lockin.harmonic().unwrap(), u16::MAX);
    }

    #[test]
    fn out_of_range_code_from_system_is_reported() {
        let (registry, _rx) = registry();
        let lockin = registry.lockin(LockIn::L1).unwrap();
        let mut raw = BytesMut::new();
        catalog::LOCKIN_CONTROL
            .default_record()
            .encode(&mut raw);
        // wave_shape sits after u8 + f64 + bool + f64 + f64 + u16
        raw[28] = 7;
        lockin.parameter().receive(&raw).unwrap();
        assert!(matches!(
            lockin.wave_shape(),
            Err(ParamError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn installed_modules_follow_flags() {
        let (registry, _rx) = registry();
        let general = registry.general().unwrap();
        let mut raw = BytesMut::new();
        catalog::GENERAL.default_record().encode(&mut raw);
        raw[2] = 1;
        raw[5] = 1;
        general.parameter().receive(&raw).unwrap();
        assert_eq!(general.installed_modules().unwrap(), vec![Module::A, Module::D]);
    }

    #[test]
    fn request_update_sends_general() {
        let (registry, rx) = registry();
        registry.general().unwrap().request_update().unwrap();
        let frames = rx.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, catalog::index::GENERAL);
        assert_eq!(frames[0].payload.len(), 11);
        assert_eq!(frames[0].payload[0], 1);
    }
}

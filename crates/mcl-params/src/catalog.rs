//! Static parameter catalog.
//!
//! Every parameter the client knows about, with its key, access mode, and
//! payload layout. Configuration indices not listed here still arrive during
//! startup; the client counts them for readiness and drops their payloads.

use mcl_frame::{CONFIGURATION, LOCKIN_DATA, WAVEFORMS};

use crate::enums::Module;
use crate::field::{FieldSpec, FieldValue, Layout, Rule};
use crate::key::{Access, ParamKey};
use crate::value::Codec;
use crate::waveform::WaveformKind;

/// First configuration index of each parameter family.
pub mod index {
    pub const LOCKIN_CONTROL: u16 = 6;
    pub const INPUT_SETTINGS: u16 = 8;
    pub const OUTPUT_SETTINGS: u16 = 18;
    pub const FREQUENCY: u16 = 34;
    pub const PLL: u16 = 42;
    pub const GENERAL: u16 = 44;
    pub const SUPPLY_MONITOR: u16 = 45;
    pub const OUTPUT_STATE: u16 = 51;
    pub const INPUT_STATE: u16 = 56;
    pub const OFFSET: u16 = 66;
    pub const FEEDBACK: u16 = 73;
    pub const AMPLITUDE: u16 = 75;
    pub const FUNCTION: u16 = 80;
    pub const PHASE_SHIFT: u16 = 90;
    pub const DUTY_CYCLE: u16 = 98;
    pub const SCOPE_SETTINGS: u16 = 106;
    pub const MULTI_HARMONIC: u16 = 107;
    pub const COMPOSITE: u16 = 110;

    /// Lock-in data streams (category 3).
    pub const LOCKIN_DATA: u16 = 0;
    /// Waveform streams (category 4).
    pub const SCOPE: u16 = 0;
    pub const FFT: u16 = 1;
}

/// Number of configuration indices the system publishes on connect.
pub const CONFIGURATION_COUNT: u16 = 137;

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldValue::Bool(false))
}

const fn byte(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldValue::U8(0))
}

const fn code(name: &'static str, count: u8) -> FieldSpec {
    FieldSpec::new(name, FieldValue::U8(0)).with_rule(Rule::Code(count))
}

const fn double(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldValue::F64(f64::NAN))
}

const fn positive(name: &'static str) -> FieldSpec {
    double(name).with_rule(Rule::Positive)
}

pub static LOCKIN_CONTROL: Layout = Layout {
    name: "lock-in control",
    fields: &[
        code("frequency_source", 8),
        FieldSpec::new("time_constant", FieldValue::F64(1.0)).with_rule(Rule::Positive),
        flag("filter_enable"),
        positive("stage1_tc"),
        positive("stage2_tc"),
        FieldSpec::new("harmonic", FieldValue::U16(1)).with_rule(Rule::AtLeast(1)),
        code("wave_shape", 3),
        code("phase_source", 8),
        code("duty_cycle_source", 8),
    ],
};

pub static INPUT_SETTINGS: Layout = Layout {
    name: "input settings",
    fields: &[
        code("gain", 12),
        flag("ac_coupling"),
        flag("grounded"),
        flag("auto_range"),
    ],
};

pub static OUTPUT_SETTINGS: Layout = Layout {
    name: "output settings",
    fields: &[
        flag("voltage_output_floating"),
        byte("voltage_output_range"),
        byte("current_range"),
        flag("current_autorange"),
        byte("fx"),
        byte("fy"),
        byte("kind"),
        flag("digital_out_phase_marker_fx"),
        flag("output_enabled"),
    ],
};

pub static FREQUENCY: Layout = Layout {
    name: "frequency",
    fields: &[
        FieldSpec::new("frequency_hz", FieldValue::F64(0.0)).with_rule(Rule::Open(0.0, 2e6)),
        flag("ramp_changes"),
        FieldSpec::new("ramp_time_constant_s", FieldValue::F64(0.0)).with_rule(Rule::Positive),
    ],
};

pub static PLL: Layout = Layout {
    name: "PLL",
    fields: &[
        code("source", 5),
        flag("falling_edge"),
        double("phase_shift_deg"),
    ],
};

pub static GENERAL: Layout = Layout {
    name: "general",
    fields: &[
        flag("update_user"),
        flag("send_calibrations"),
        flag("installed_module_a"),
        flag("installed_module_b"),
        flag("installed_module_c"),
        flag("installed_module_d"),
        flag("installed_module_e"),
        byte("configuration"),
        FieldSpec::new("apply_to_default", FieldValue::Bool(true)),
        flag("load_preferences"),
        flag("save_preferences"),
    ],
};

pub static SUPPLY_MONITOR: Layout = Layout {
    name: "supply monitor",
    fields: &[
        double("vcc_24v"),
        double("vcc_3p3v_ln"),
        double("vcc_5v_ln"),
        double("vcc_9v"),
        double("vcc_3p3v"),
        double("vcc_5v"),
        double("i_n"),
        double("v_n"),
        double("v_p"),
        double("i_p"),
        byte("hardware_revision"),
    ],
};

pub static OUTPUT_STATE: Layout = Layout {
    name: "output state",
    fields: &[
        byte("current_range"),
        flag("overload"),
        flag("frequency_too_high"),
        flag("under_range"),
    ],
};

pub static INPUT_STATE: Layout = Layout {
    name: "input state",
    fields: &[byte("gain"), flag("overload"), flag("under_range")],
};

pub static OFFSET: Layout = Layout {
    name: "offset",
    fields: &[
        double("offset_v"),
        flag("ramp_changes"),
        positive("ramp_time_constant_s"),
    ],
};

pub static FEEDBACK: Layout = Layout {
    name: "feedback",
    fields: &[
        byte("signal"),
        byte("feedback_type"),
        byte("output_gain"),
        byte("reference"),
        flag("after_low_pass"),
    ],
};

pub static AMPLITUDE: Layout = Layout {
    name: "amplitude",
    fields: &[
        flag("ramp_changes"),
        positive("ramp_time_constant_s"),
        code("unit", 3),
        double("amplitude_v").with_rule(Rule::NonNegative),
    ],
};

pub static FUNCTION: Layout = Layout {
    name: "function",
    fields: &[
        byte("shape"),
        byte("reference_level"),
        byte("amplitude"),
        byte("offset"),
        byte("duty_cycle"),
        byte("frequency"),
        byte("phase_shift"),
        FieldSpec::new("harmonic", FieldValue::U16(1)).with_rule(Rule::AtLeast(1)),
    ],
};

pub static PHASE_SHIFT: Layout = Layout {
    name: "phase shift",
    fields: &[double("phase_shift_deg")],
};

pub static DUTY_CYCLE: Layout = Layout {
    name: "duty cycle",
    fields: &[double("duty_cycle"), byte("unit")],
};

/// Channel flags of the scope settings, in wire order.
pub const SCOPE_CHANNELS: [&str; 16] = [
    "return_av1",
    "return_av2",
    "return_bv1",
    "return_bv2",
    "return_cv1",
    "return_cv2",
    "return_dv1",
    "return_dv2",
    "return_ev1",
    "return_ev2",
    "return_aimeas",
    "return_bimeas",
    "return_cimeas",
    "return_dimeas",
    "return_eimeas",
    "return_ref",
];

pub static SCOPE_SETTINGS: Layout = Layout {
    name: "scope settings",
    fields: &[
        flag(SCOPE_CHANNELS[0]),
        flag(SCOPE_CHANNELS[1]),
        flag(SCOPE_CHANNELS[2]),
        flag(SCOPE_CHANNELS[3]),
        flag(SCOPE_CHANNELS[4]),
        flag(SCOPE_CHANNELS[5]),
        flag(SCOPE_CHANNELS[6]),
        flag(SCOPE_CHANNELS[7]),
        flag(SCOPE_CHANNELS[8]),
        flag(SCOPE_CHANNELS[9]),
        flag(SCOPE_CHANNELS[10]),
        flag(SCOPE_CHANNELS[11]),
        flag(SCOPE_CHANNELS[12]),
        flag(SCOPE_CHANNELS[13]),
        flag(SCOPE_CHANNELS[14]),
        flag(SCOPE_CHANNELS[15]),
        FieldSpec::new("sampling_reduction_factor", FieldValue::U16(1)).with_rule(Rule::AtLeast(1)),
        byte("scope_samples"),
        flag("average_between_samples"),
        flag("return_output_instead_of_imeas"),
    ],
};

pub static COMPOSITE: Layout = Layout {
    name: "composite",
    fields: &[
        byte("frequency_a"),
        byte("frequency_b"),
        byte("frequency_8"),
        byte("n"),
        byte("m"),
    ],
};

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub key: ParamKey,
    pub name: String,
    pub access: Access,
    pub codec: Codec,
}

impl Descriptor {
    fn config(index: u16, name: impl Into<String>, access: Access, codec: Codec) -> Self {
        Self {
            key: ParamKey::new(CONFIGURATION, index),
            name: name.into(),
            access,
            codec,
        }
    }
}

/// Build the full catalog, ordered by key.
pub fn descriptors() -> Vec<Descriptor> {
    use Access::{ReadOnly, ReadWrite};

    let mut out = Vec::with_capacity(96);
    let mut family = |base: u16, names: Vec<String>, access: Access, layout: &'static Layout| {
        for (offset, name) in (0u16..).zip(names) {
            out.push(Descriptor::config(base + offset, name, access, Codec::Fixed(layout)));
        }
    };

    let numbered = |prefix: &str, count: u16| -> Vec<String> {
        (1..=count).map(|n| format!("{prefix}_{n}")).collect()
    };
    let per_module = |prefix: &str| -> Vec<String> {
        Module::ALL
            .iter()
            .map(|m| format!("{prefix}_{}", m.letter()))
            .collect()
    };
    let per_input = |prefix: &str| -> Vec<String> {
        Module::ALL
            .iter()
            .flat_map(|m| (1..=2).map(move |ch| format!("{prefix}_{}{ch}", m.letter())))
            .collect()
    };

    family(index::LOCKIN_CONTROL, numbered("lockin", 2), ReadWrite, &LOCKIN_CONTROL);
    family(index::INPUT_SETTINGS, per_input("input"), ReadWrite, &INPUT_SETTINGS);
    family(index::OUTPUT_SETTINGS, per_module("output"), ReadWrite, &OUTPUT_SETTINGS);
    family(index::FREQUENCY, numbered("frequency", 8), ReadWrite, &FREQUENCY);
    family(index::PLL, numbered("pll", 2), ReadWrite, &PLL);
    family(index::GENERAL, vec!["general".into()], ReadWrite, &GENERAL);
    family(index::SUPPLY_MONITOR, vec!["supply_monitor".into()], ReadOnly, &SUPPLY_MONITOR);
    family(index::OUTPUT_STATE, per_module("output_state"), ReadOnly, &OUTPUT_STATE);
    family(index::INPUT_STATE, per_input("input_state"), ReadOnly, &INPUT_STATE);
    family(index::OFFSET, numbered("offset", 7), ReadWrite, &OFFSET);
    family(index::FEEDBACK, numbered("feedback", 2), ReadWrite, &FEEDBACK);
    family(index::AMPLITUDE, numbered("amplitude", 5), ReadWrite, &AMPLITUDE);
    family(index::FUNCTION, numbered("function", 10), ReadWrite, &FUNCTION);
    family(index::PHASE_SHIFT, numbered("phase_shift", 8), ReadWrite, &PHASE_SHIFT);
    family(index::DUTY_CYCLE, numbered("duty_cycle", 8), ReadWrite, &DUTY_CYCLE);
    family(index::SCOPE_SETTINGS, vec!["scope_settings".into()], ReadWrite, &SCOPE_SETTINGS);
    family(index::COMPOSITE, vec!["composite".into()], ReadWrite, &COMPOSITE);

    for (offset, name) in (0u16..).zip(numbered("multi_harmonic", 2)) {
        out.push(Descriptor::config(
            index::MULTI_HARMONIC + offset,
            name,
            ReadWrite,
            Codec::MultiHarmonic,
        ));
    }

    for (offset, name) in (0u16..).zip(numbered("lockin_data", 2)) {
        out.push(Descriptor {
            key: ParamKey::new(LOCKIN_DATA, index::LOCKIN_DATA + offset),
            name,
            access: ReadOnly,
            codec: Codec::LockIn,
        });
    }
    out.push(Descriptor {
        key: ParamKey::new(WAVEFORMS, index::SCOPE),
        name: "scope".into(),
        access: ReadOnly,
        codec: Codec::Waveform(WaveformKind::Scope),
    });
    out.push(Descriptor {
        key: ParamKey::new(WAVEFORMS, index::FFT),
        name: "fft".into(),
        access: ReadOnly,
        codec: Codec::Waveform(WaveformKind::Fft),
    });

    out.sort_by_key(|d| d.key);
    out
}

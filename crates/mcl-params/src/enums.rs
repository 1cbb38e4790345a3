//! Closed label sets carried as small integer codes on the wire.

use std::fmt;
use std::str::FromStr;

use crate::error::{ParamError, Result};

macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member in wire-code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire code (position in [`Self::ALL`]).
            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Result<Self> {
                Self::ALL
                    .get(usize::from(code))
                    .copied()
                    .ok_or_else(|| ParamError::InvalidEnum {
                        kind: $kind,
                        value: code.to_string(),
                    })
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn labels() -> impl Iterator<Item = &'static str> {
                Self::ALL.iter().map(|v| v.label())
            }
        }

        impl FromStr for $name {
            type Err = ParamError;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| ParamError::InvalidEnum {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labeled_enum! {
    /// Oscillator a lock-in demodulates against.
    pub enum FrequencySource: "frequency source" {
        Frequency1 => "Frequency 1",
        Frequency2 => "Frequency 2",
        Frequency3 => "Frequency 3",
        Frequency4 => "Frequency 4",
        Frequency5 => "Frequency 5",
        Frequency6Pll => "Frequency 6 PLL",
        Frequency7Pll => "Frequency 7 PLL",
        Frequency8Comp1 => "Frequency 8 Comp1",
    }
}

labeled_enum! {
    /// Reference waveform shape.
    pub enum WaveShape: "wave shape" {
        Sine => "Sine",
        Square => "Square",
        Boxcar => "Boxcar",
    }
}

labeled_enum! {
    pub enum PhaseSource: "phase source" {
        Phase1 => "Phase 1",
        Phase2 => "Phase 2",
        Phase3 => "Phase 3",
        Phase4 => "Phase 4",
        Phase5 => "Phase 5",
        Phase6 => "Phase 6",
        Phase7 => "Phase 7",
        Inactive => "Inactive",
    }
}

labeled_enum! {
    pub enum DutyCycleSource: "duty cycle source" {
        DutyCycle1 => "Duty Cycle 1",
        DutyCycle2 => "Duty Cycle 2",
        DutyCycle3 => "Duty Cycle 3",
        DutyCycle4 => "Duty Cycle 4",
        DutyCycle5 => "Duty Cycle 5",
        DutyCycle6 => "Duty Cycle 6",
        DutyCycle7 => "Duty Cycle 7",
        Inactive => "Inactive",
    }
}

labeled_enum! {
    /// How an output amplitude is expressed.
    pub enum AmplitudeUnit: "amplitude unit" {
        Vrms => "Vrms",
        Vp => "Vp",
        Vpp => "Vpp",
    }
}

labeled_enum! {
    /// Digital input a PLL locks to.
    pub enum PllSource: "PLL source" {
        DioA => "DIO A",
        DioB => "DIO B",
        DioC => "DIO C",
        DioD => "DIO D",
        DioE => "DIO E",
    }
}

labeled_enum! {
    /// Input amplifier gain steps.
    pub enum InputGain: "input gain" {
        X1 => "1",
        X2 => "2",
        X5 => "5",
        X10 => "10",
        X20 => "20",
        X40 => "40",
        X100 => "100",
        X200 => "200",
        X500 => "500",
        X1000 => "1000",
        X2500 => "2500",
        X5000 => "5000",
    }
}

impl InputGain {
    /// Numeric gain factor.
    pub fn factor(self) -> u32 {
        match self {
            InputGain::X1 => 1,
            InputGain::X2 => 2,
            InputGain::X5 => 5,
            InputGain::X10 => 10,
            InputGain::X20 => 20,
            InputGain::X40 => 40,
            InputGain::X100 => 100,
            InputGain::X200 => 200,
            InputGain::X500 => 500,
            InputGain::X1000 => 1000,
            InputGain::X2500 => 2500,
            InputGain::X5000 => 5000,
        }
    }

    /// Exact gain step for `factor`.
    pub fn from_factor(factor: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.factor() == factor)
            .ok_or_else(|| ParamError::InvalidEnum {
                kind: "input gain",
                value: factor.to_string(),
            })
    }
}

/// Lock-in amplifier selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockIn {
    L1,
    L2,
}

impl LockIn {
    pub fn offset(self) -> u16 {
        match self {
            LockIn::L1 => 0,
            LockIn::L2 => 1,
        }
    }
}

impl TryFrom<u8> for LockIn {
    type Error = ParamError;

    /// 1-based, as printed on the front panel.
    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(LockIn::L1),
            2 => Ok(LockIn::L2),
            other => Err(ParamError::InvalidEnum {
                kind: "lock-in",
                value: other.to_string(),
            }),
        }
    }
}

/// Hardware module slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    A,
    B,
    C,
    D,
    E,
}

impl Module {
    pub const ALL: [Module; 5] = [Module::A, Module::B, Module::C, Module::D, Module::E];

    pub fn offset(self) -> u16 {
        self as u16
    }

    pub fn letter(self) -> char {
        match self {
            Module::A => 'a',
            Module::B => 'b',
            Module::C => 'c',
            Module::D => 'd',
            Module::E => 'e',
        }
    }
}

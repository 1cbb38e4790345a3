//! Frame categories.
//!
//! The first header byte routes a frame to one of five parameter groups.

/// Writable front-panel controls.
pub const CONTROLS: u8 = 0;

/// Read-only front-panel indicators.
pub const INDICATORS: u8 = 1;

/// Instrument configuration. Tracked by the readiness barrier.
pub const CONFIGURATION: u8 = 2;

/// Streamed lock-in readings.
pub const LOCKIN_DATA: u8 = 3;

/// Streamed scope and FFT waveforms.
pub const WAVEFORMS: u8 = 4;

/// Typed view of the category byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Controls,
    Indicators,
    Configuration,
    LockinData,
    Waveforms,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Controls,
        Category::Indicators,
        Category::Configuration,
        Category::LockinData,
        Category::Waveforms,
    ];

    /// Wire code of this category.
    pub fn code(self) -> u8 {
        match self {
            Category::Controls => CONTROLS,
            Category::Indicators => INDICATORS,
            Category::Configuration => CONFIGURATION,
            Category::LockinData => LOCKIN_DATA,
            Category::Waveforms => WAVEFORMS,
        }
    }

    /// Categories whose parameters are pushed continuously by the system.
    pub fn is_streaming(self) -> bool {
        matches!(self, Category::LockinData | Category::Waveforms)
    }

    /// Short lowercase name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Category::Controls => "controls",
            Category::Indicators => "indicators",
            Category::Configuration => "configuration",
            Category::LockinData => "lockin-data",
            Category::Waveforms => "waveforms",
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        match code {
            CONTROLS => Ok(Category::Controls),
            INDICATORS => Ok(Category::Indicators),
            CONFIGURATION => Ok(Category::Configuration),
            LOCKIN_DATA => Ok(Category::LockinData),
            WAVEFORMS => Ok(Category::Waveforms),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

use std::fmt;

use mcl_frame::Category;

/// Protocol address of a parameter: `(category, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub category: u8,
    pub index: u16,
}

impl ParamKey {
    pub const fn new(category: u8, index: u16) -> Self {
        Self { category, index }
    }

    /// Typed category, if the code is one the protocol defines.
    pub fn category(self) -> Option<Category> {
        Category::try_from(self.category).ok()
    }

    /// True for keys in the lock-in data and waveform categories.
    pub fn is_streaming(self) -> bool {
        self.category().is_some_and(Category::is_streaming)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.index)
    }
}

/// Whether a parameter accepts writes from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

impl Access {
    pub fn is_writable(self) -> bool {
        self == Access::ReadWrite
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::ReadOnly => "ro",
            Access::ReadWrite => "rw",
        })
    }
}

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ParamError, Result};
use crate::key::ParamKey;

/// Multi-harmonic demodulation settings of one lock-in.
///
/// Wire layout: `[u32 n][u8 × n settings][u32 m][u16 × m harmonics][bool mode]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiHarmonic {
    pub settings: Vec<u8>,
    pub harmonics: Vec<u16>,
    pub enabled: bool,
}

impl MultiHarmonic {
    /// Bytes past the mode flag are ignored.
    pub fn decode(key: ParamKey, payload: &[u8]) -> Result<Self> {
        let mut src = payload;
        let truncated = |what: &str| ParamError::protocol(key, format!("truncated {what}"));

        if src.remaining() < 4 {
            return Err(truncated("setting count"));
        }
        let n = src.get_u32() as usize;
        if src.remaining() < n {
            return Err(truncated("settings"));
        }
        let settings = src[..n].to_vec();
        src.advance(n);

        if src.remaining() < 4 {
            return Err(truncated("harmonic count"));
        }
        let m = src.get_u32() as usize;
        if src.remaining() < m.saturating_mul(2) {
            return Err(truncated("harmonics"));
        }
        let harmonics = (0..m).map(|_| src.get_u16()).collect();

        if !src.has_remaining() {
            return Err(truncated("mode flag"));
        }
        let enabled = src.get_u8() != 0;

        Ok(Self {
            settings,
            harmonics,
            enabled,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(9 + self.settings.len() + 2 * self.harmonics.len());
        dst.put_u32(self.settings.len() as u32);
        dst.put_slice(&self.settings);
        dst.put_u32(self.harmonics.len() as u32);
        for h in &self.harmonics {
            dst.put_u16(*h);
        }
        dst.put_u8(u8::from(self.enabled));
    }
}

//! Lock-in data stream decoder.
//!
//! Payload layout (big-endian):
//! ```text
//! [u32 n][f64 × n]   dc
//! [u32 n][f64 × n]   x
//! [u32 n][f64 × n]   y
//! [u32 n][f64 × n]   r
//! [u32 n][f64 × n]   theta (degrees)
//! [f64 × 5]          dt_s, cycles_per_sample, sync_index, time_s, lock-in f
//! [u32 m][f64×4 × m] per-module readings
//! [f64 × 3]          PLL1 f, PLL2 f, composite 1 f
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ParamError, Result};
use crate::key::ParamKey;

/// Readings shared by the whole lock-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneralReadings {
    pub dt_s: f64,
    pub cycles_per_sample: f64,
    pub sync_index: f64,
    pub time_s: f64,
    pub lockin_frequency_hz: f64,
    pub pll1_frequency_hz: f64,
    pub pll2_frequency_hz: f64,
    pub composite1_frequency_hz: f64,
}

impl Default for GeneralReadings {
    fn default() -> Self {
        Self {
            dt_s: f64::NAN,
            cycles_per_sample: f64::NAN,
            sync_index: f64::NAN,
            time_s: f64::NAN,
            lockin_frequency_hz: f64::NAN,
            pll1_frequency_hz: f64::NAN,
            pll2_frequency_hz: f64::NAN,
            composite1_frequency_hz: f64::NAN,
        }
    }
}

/// Readings reported per hardware module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleReadings {
    pub digital_in_frequency_hz: f64,
    pub digital_out_frequency_hz: f64,
    pub amplitude_vrms: f64,
    pub output_offset_v: f64,
}

/// One decoded lock-in data frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LockInReadings {
    pub dc: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub r: Vec<f64>,
    pub theta_deg: Vec<f64>,
    pub general: GeneralReadings,
    pub modules: Vec<ModuleReadings>,
}

impl LockInReadings {
    pub fn decode(key: ParamKey, payload: &[u8]) -> Result<Self> {
        let mut src = Cursor { key, buf: payload };

        let dc = src.f64_array("dc")?;
        let x = src.f64_array("x")?;
        let y = src.f64_array("y")?;
        let r = src.f64_array("r")?;
        let theta_deg = src.f64_array("theta")?;

        let head = src.f64s::<5>("general readings")?;

        let count = src.u32("module count")? as usize;
        src.need(count.saturating_mul(32), "module readings")?;
        let mut modules = Vec::with_capacity(count);
        for _ in 0..count {
            let [digital_in_frequency_hz, digital_out_frequency_hz, amplitude_vrms, output_offset_v] =
                src.f64s::<4>("module readings")?;
            modules.push(ModuleReadings {
                digital_in_frequency_hz,
                digital_out_frequency_hz,
                amplitude_vrms,
                output_offset_v,
            });
        }

        let tail = src.f64s::<3>("frequency readings")?;

        Ok(Self {
            dc,
            x,
            y,
            r,
            theta_deg,
            general: GeneralReadings {
                dt_s: head[0],
                cycles_per_sample: head[1],
                sync_index: head[2],
                time_s: head[3],
                lockin_frequency_hz: head[4],
                pll1_frequency_hz: tail[0],
                pll2_frequency_hz: tail[1],
                composite1_frequency_hz: tail[2],
            },
            modules,
        })
    }

    /// Encode in the same layout the system streams.
    pub fn encode(&self, dst: &mut BytesMut) {
        for array in [&self.dc, &self.x, &self.y, &self.r, &self.theta_deg] {
            dst.put_u32(array.len() as u32);
            for v in array {
                dst.put_f64(*v);
            }
        }
        let g = &self.general;
        for v in [g.dt_s, g.cycles_per_sample, g.sync_index, g.time_s, g.lockin_frequency_hz] {
            dst.put_f64(v);
        }
        dst.put_u32(self.modules.len() as u32);
        for m in &self.modules {
            dst.put_f64(m.digital_in_frequency_hz);
            dst.put_f64(m.digital_out_frequency_hz);
            dst.put_f64(m.amplitude_vrms);
            dst.put_f64(m.output_offset_v);
        }
        for v in [g.pll1_frequency_hz, g.pll2_frequency_hz, g.composite1_frequency_hz] {
            dst.put_f64(v);
        }
    }

    /// Integration time per sample: cycles per sample times lock-in frequency.
    pub fn integration_time(&self) -> f64 {
        self.general.cycles_per_sample * self.general.lockin_frequency_hz
    }

    /// Most recent `(x, y)` pair, if any samples arrived.
    pub fn latest_xy(&self) -> Option<(f64, f64)> {
        Some((*self.x.last()?, *self.y.last()?))
    }
}

struct Cursor<'a> {
    key: ParamKey,
    buf: &'a [u8],
}

impl Cursor<'_> {
    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(ParamError::protocol(
                self.key,
                format!(
                    "truncated {what}: need {n} bytes, {} left",
                    self.buf.remaining()
                ),
            ));
        }
        Ok(())
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    fn f64s<const N: usize>(&mut self, what: &str) -> Result<[f64; N]> {
        self.need(N * 8, what)?;
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.buf.get_f64();
        }
        Ok(out)
    }

    fn f64_array(&mut self, what: &str) -> Result<Vec<f64>> {
        let n = self.u32(what)? as usize;
        self.need(n.saturating_mul(8), what)?;
        Ok((0..n).map(|_| self.buf.get_f64()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: ParamKey = ParamKey::new(3, 0);

    fn sample(samples: usize, modules: usize) -> LockInReadings {
        let ramp = |base: f64| (0..samples).map(|i| base + i as f64).collect::<Vec<_>>();
        LockInReadings {
            dc: ramp(0.0),
            x: ramp(100.0),
            y: ramp(200.0),
            r: ramp(300.0),
            theta_deg: ramp(400.0),
            general: GeneralReadings {
                dt_s: 0.01,
                cycles_per_sample: 4.0,
                sync_index: 17.0,
                time_s: 123.5,
                lockin_frequency_hz: 1000.0,
                pll1_frequency_hz: 10.0,
                pll2_frequency_hz: 20.0,
                composite1_frequency_hz: 30.0,
            },
            modules: (0..modules)
                .map(|i| ModuleReadings {
                    digital_in_frequency_hz: i as f64,
                    digital_out_frequency_hz: 2.0 * i as f64,
                    amplitude_vrms: 0.5,
                    output_offset_v: -0.25,
                })
                .collect(),
        }
    }

    #[test]
    fn standard_frame_is_888_bytes() {
        // 16 samples per array and five modules is what the hardware streams.
        let readings = sample(16, 5);
        let mut wire = BytesMut::new();
        readings.encode(&mut wire);
        assert_eq!(wire.len(), 888);

        // General readings sit at fixed offsets in that frame.
        assert_eq!(&wire[660..668], &0.01f64.to_be_bytes());
        assert_eq!(&wire[700..704], &5u32.to_be_bytes());
        assert_eq!(&wire[864..872], &10.0f64.to_be_bytes());

        let decoded = LockInReadings::decode(KEY, &wire).unwrap();
        assert_eq!(decoded, readings);
    }

    #[test]
    fn arrays_follow_their_length_prefix() {
        let readings = sample(3, 1);
        let mut wire = BytesMut::new();
        readings.encode(&mut wire);

        let decoded = LockInReadings::decode(KEY, &wire).unwrap();
        assert_eq!(decoded.x, vec![100.0, 101.0, 102.0]);
        assert_eq!(decoded.latest_xy(), Some((102.0, 202.0)));
        assert_eq!(decoded.modules.len(), 1);
        assert_eq!(decoded.integration_time(), 4000.0);
    }

    #[test]
    fn truncated_payload_is_protocol_error() {
        let mut wire = BytesMut::new();
        sample(16, 5).encode(&mut wire);
        wire.truncate(wire.len() - 1);

        let err = LockInReadings::decode(KEY, &wire).unwrap_err();
        assert!(matches!(err, ParamError::Protocol { key, .. } if key == KEY));
    }

    #[test]
    fn oversized_count_is_rejected_without_allocating() {
        let mut wire = BytesMut::new();
        wire.put_u32(u32::MAX);
        wire.put_f64(1.0);
        assert!(LockInReadings::decode(KEY, &wire).is_err());
    }

    #[test]
    fn default_has_nan_general_readings() {
        let empty = LockInReadings::default();
        assert!(empty.general.dt_s.is_nan());
        assert!(empty.latest_xy().is_none());
    }
}

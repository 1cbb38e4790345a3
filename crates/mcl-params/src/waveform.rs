//! Scope and FFT waveform decoder.
//!
//! Payload layout:
//! ```text
//! [4 bytes, unused][u64 n][f64 × n samples][ASCII XML metadata, NUL padded]
//! ```
//! The metadata is a flattened LabVIEW cluster. It names the active channels
//! and the per-channel sample count, which together say how the flat sample
//! array splits into channels.

use bytes::Buf;
use roxmltree::{Document, Node};

use crate::error::{ParamError, Result};
use crate::key::ParamKey;

const SAMPLES_OFFSET: usize = 12;

/// Which waveform stream a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformKind {
    Scope,
    /// Spectra carry half as many points per channel as the scope setting.
    Fft,
}

/// Samples for one scope channel; empty when the channel is not returned.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformChannel {
    pub label: String,
    pub active: bool,
    pub samples: Vec<f64>,
}

/// A decoded scope or FFT frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub kind: WaveformKind,
    pub dt_s: f64,
    pub averages_completed: f64,
    pub df_hz: f64,
    pub averaging_done: bool,
    pub waveform_type: String,
    pub sampling_reduction_factor: u16,
    pub scope_samples: usize,
    pub average_between_samples: bool,
    pub return_output_instead_of_imeas: bool,
    pub channels: Vec<WaveformChannel>,
}

impl Waveform {
    /// Placeholder value held until the first frame arrives.
    pub fn empty(kind: WaveformKind) -> Self {
        Self {
            kind,
            dt_s: f64::NAN,
            averages_completed: f64::NAN,
            df_hz: f64::NAN,
            averaging_done: false,
            waveform_type: String::new(),
            sampling_reduction_factor: 0,
            scope_samples: 0,
            average_between_samples: false,
            return_output_instead_of_imeas: false,
            channels: Vec::new(),
        }
    }

    pub fn decode(kind: WaveformKind, key: ParamKey, payload: &[u8]) -> Result<Self> {
        let err = |reason: String| ParamError::protocol(key, reason);

        if payload.len() < SAMPLES_OFFSET {
            return Err(err(format!(
                "waveform header needs {SAMPLES_OFFSET} bytes, got {}",
                payload.len()
            )));
        }
        let count = (&payload[4..SAMPLES_OFFSET]).get_u64();
        let end = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(8))
            .and_then(|n| n.checked_add(SAMPLES_OFFSET))
            .filter(|end| *end <= payload.len())
            .ok_or_else(|| err(format!("sample count {count} exceeds payload")))?;

        let mut src = &payload[SAMPLES_OFFSET..end];
        let mut values = Vec::with_capacity((end - SAMPLES_OFFSET) / 8);
        while src.has_remaining() {
            values.push(src.get_f64());
        }

        let text = std::str::from_utf8(&payload[end..])
            .map_err(|e| err(format!("metadata is not text: {e}")))?
            .trim_end_matches('\0');
        let doc = Document::parse(text).map_err(|e| err(format!("metadata XML: {e}")))?;
        let meta = Metadata {
            key,
            root: doc.root_element(),
        };

        let dt_s: f64 = meta.number(meta.top("DBL", "dt (s)")?)?;
        let averages_completed: f64 = meta.number(meta.top("DBL", "averages completed")?)?;
        let df_hz: f64 = meta.number(meta.top("DBL", "df (Hz)")?)?;
        let averaging_done = meta.flag(meta.top("Boolean", "averaging done")?)?;
        let waveform_type = meta.choice(meta.top("EW", "Waveform Type")?)?.to_string();

        let sampling_reduction_factor: u16 =
            meta.number(meta.nested("U16", "Sampling reduction factor")?)?;
        let scope_samples: usize = meta
            .choice(meta.nested("EB", "#scope samples")?)?
            .trim()
            .parse()
            .map_err(|_| err("#scope samples choice is not a number".to_string()))?;
        let average_between_samples = meta.flag(meta.nested("Boolean", "Average between samples")?)?;
        let return_output_instead_of_imeas =
            meta.flag(meta.nested("Boolean", "Return output instead of Imeas")?)?;

        let chunk = match kind {
            WaveformKind::Scope => scope_samples,
            WaveformKind::Fft => scope_samples / 2,
        };

        let selector = meta.nested("Cluster", "Channels to return")?;
        let mut channels = Vec::new();
        let mut next = 0usize;
        for node in elements(selector, "Boolean") {
            let label = name_of(node).unwrap_or_default().to_string();
            let active = meta.flag(node)?;
            let samples = if active {
                let start = next * chunk;
                let slice = values.get(start..start + chunk).ok_or_else(|| {
                    err(format!(
                        "channel '{label}' needs samples {start}..{}, only {} present",
                        start + chunk,
                        values.len()
                    ))
                })?;
                next += 1;
                slice.to_vec()
            } else {
                Vec::new()
            };
            channels.push(WaveformChannel {
                label,
                active,
                samples,
            });
        }

        Ok(Self {
            kind,
            dt_s,
            averages_completed,
            df_hz,
            averaging_done,
            waveform_type,
            sampling_reduction_factor,
            scope_samples,
            average_between_samples,
            return_output_instead_of_imeas,
            channels,
        })
    }

    pub fn channel(&self, label: &str) -> Option<&WaveformChannel> {
        self.channels.iter().find(|c| c.label == label)
    }

    pub fn active_channels(&self) -> impl Iterator<Item = &WaveformChannel> {
        self.channels.iter().filter(|c| c.active)
    }
}

fn elements<'a, 'i>(parent: Node<'a, 'i>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'i>> {
    parent
        .children()
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
        .and_then(|n| n.text())
}

fn name_of<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    child_text(node, "Name").map(str::trim)
}

struct Metadata<'a, 'i> {
    key: ParamKey,
    root: Node<'a, 'i>,
}

impl<'a, 'i> Metadata<'a, 'i> {
    fn missing(&self, tag: &str, name: &str) -> ParamError {
        ParamError::protocol(self.key, format!("metadata has no {tag} '{name}'"))
    }

    fn named(parent: Node<'a, 'i>, tag: &'a str, name: &str) -> Option<Node<'a, 'i>> {
        elements(parent, tag).find(|n| name_of(*n) == Some(name))
    }

    /// Element directly under the root.
    fn top(&self, tag: &'a str, name: &str) -> Result<Node<'a, 'i>> {
        Self::named(self.root, tag, name).ok_or_else(|| self.missing(tag, name))
    }

    /// Element one cluster below the root.
    fn nested(&self, tag: &'a str, name: &str) -> Result<Node<'a, 'i>> {
        elements(self.root, "Cluster")
            .find_map(|cluster| Self::named(cluster, tag, name))
            .ok_or_else(|| self.missing(tag, name))
    }

    fn val(&self, node: Node<'a, 'i>) -> Result<&'a str> {
        child_text(node, "Val").map(str::trim).ok_or_else(|| {
            ParamError::protocol(
                self.key,
                format!("metadata {} has no value", name_of(node).unwrap_or("?")),
            )
        })
    }

    fn number<T: std::str::FromStr>(&self, node: Node<'a, 'i>) -> Result<T> {
        let text = self.val(node)?;
        text.parse().map_err(|_| {
            ParamError::protocol(
                self.key,
                format!(
                    "metadata {} value '{text}' is not numeric",
                    name_of(node).unwrap_or("?")
                ),
            )
        })
    }

    fn flag(&self, node: Node<'a, 'i>) -> Result<bool> {
        Ok(self.number::<i64>(node)? != 0)
    }

    /// Label of the selected entry of an enum element.
    fn choice(&self, node: Node<'a, 'i>) -> Result<&'a str> {
        let selected: usize = self.number(node)?;
        elements(node, "Choice")
            .nth(selected)
            .and_then(|n| n.text())
            .ok_or_else(|| {
                ParamError::protocol(
                    self.key,
                    format!(
                        "metadata {} selects missing choice {selected}",
                        name_of(node).unwrap_or("?")
                    ),
                )
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;

    const KEY: ParamKey = ParamKey::new(4, 0);

    pub(crate) const CHANNEL_LABELS: [&str; 4] = ["A V1", "A V2", "B V1", "A Imeas"];

    /// Build metadata the way the instrument flattens its scope cluster.
    pub(crate) fn metadata(active: &[bool], samples_choice: usize) -> String {
        let channels: String = CHANNEL_LABELS
            .iter()
            .zip(active)
            .map(|(label, on)| {
                format!(
                    "<Boolean><Name>{label}</Name><Val>{}</Val></Boolean>",
                    u8::from(*on)
                )
            })
            .collect();
        format!(
            "<Cluster><Name>scope</Name><NumElts>6</NumElts>\
             <DBL><Name>dt (s)</Name><Val>1.00000E-6</Val></DBL>\
             <DBL><Name>averages completed</Name><Val>3</Val></DBL>\
             <DBL><Name>df (Hz)</Name><Val>250.5</Val></DBL>\
             <Boolean><Name>averaging done</Name><Val>1</Val></Boolean>\
             <EW><Name>Waveform Type</Name><Choice>Scope</Choice><Choice>FFT</Choice><Val>0</Val></EW>\
             <Cluster><Name>settings</Name>\
             <Cluster><Name>Channels to return</Name><NumElts>4</NumElts>{channels}</Cluster>\
             <U16><Name>Sampling reduction factor</Name><Val>2</Val></U16>\
             <EB><Name>#scope samples</Name><Choice>4</Choice><Choice>8</Choice><Val>{samples_choice}</Val></EB>\
             <Boolean><Name>Average between samples</Name><Val>0</Val></Boolean>\
             <Boolean><Name>Return output instead of Imeas</Name><Val>1</Val></Boolean>\
             </Cluster></Cluster>"
        )
    }

    pub(crate) fn payload(samples: &[f64], xml: &str, padding: usize) -> Vec<u8> {
        let mut wire = BytesMut::new();
        wire.put_u32(0);
        wire.put_u64(samples.len() as u64);
        for s in samples {
            wire.put_f64(*s);
        }
        wire.put_slice(xml.as_bytes());
        wire.put_bytes(0, padding);
        wire.to_vec()
    }

    #[test]
    fn scope_samples_split_by_active_channel() {
        let samples: Vec<f64> = (0..8).map(f64::from).collect();
        let wire = payload(&samples, &metadata(&[true, false, true, false], 0), 7);

        let wave = Waveform::decode(WaveformKind::Scope, KEY, &wire).unwrap();
        assert_eq!(wave.scope_samples, 4);
        assert_eq!(wave.dt_s, 1e-6);
        assert_eq!(wave.averages_completed, 3.0);
        assert_eq!(wave.df_hz, 250.5);
        assert!(wave.averaging_done);
        assert_eq!(wave.waveform_type, "Scope");
        assert_eq!(wave.sampling_reduction_factor, 2);
        assert!(!wave.average_between_samples);
        assert!(wave.return_output_instead_of_imeas);

        let labels: Vec<_> = wave.channels.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, CHANNEL_LABELS);
        assert_eq!(wave.channels[0].samples, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(wave.channels[1].samples.is_empty());
        assert_eq!(wave.channel("B V1").unwrap().samples, vec![4.0, 5.0, 6.0, 7.0]);
        assert!(wave.channels[3].samples.is_empty());
        assert_eq!(wave.active_channels().count(), 2);
    }

    #[test]
    fn fft_uses_half_the_scope_samples() {
        let samples: Vec<f64> = (0..8).map(f64::from).collect();
        let wire = payload(&samples, &metadata(&[true, true, false, false], 1), 0);

        let wave = Waveform::decode(WaveformKind::Fft, KEY, &wire).unwrap();
        assert_eq!(wave.scope_samples, 8);
        assert_eq!(wave.channels[0].samples, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(wave.channels[1].samples, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn too_few_samples_is_protocol_error() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let wire = payload(&samples, &metadata(&[true, true, false, false], 0), 0);
        let err = Waveform::decode(WaveformKind::Scope, KEY, &wire).unwrap_err();
        assert!(matches!(err, ParamError::Protocol { .. }));
    }

    #[test]
    fn missing_metadata_element_is_protocol_error() {
        let xml = metadata(&[true, false, false, false], 0).replace("df (Hz)", "bandwidth");
        let wire = payload(&[0.0; 4], &xml, 0);
        let err = Waveform::decode(WaveformKind::Scope, KEY, &wire).unwrap_err();
        assert!(err.to_string().contains("df (Hz)"));
    }

    #[test]
    fn sample_count_beyond_payload_is_rejected() {
        let mut wire = BytesMut::new();
        wire.put_u32(0);
        wire.put_u64(1 << 40);
        assert!(Waveform::decode(WaveformKind::Scope, KEY, &wire).is_err());

        assert!(Waveform::decode(WaveformKind::Scope, KEY, &[0u8; 11]).is_err());
    }
}

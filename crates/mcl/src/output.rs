use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::net::IpAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mcl_client::SystemDescriptor;
use mcl_params::{FieldValue, LockInReadings, MultiHarmonic, ParamKey, Record, Value, Waveform};
use serde_json::{json, Map, Value as Json};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Non-finite doubles become `null`.
fn field_to_json(value: FieldValue) -> Json {
    match value {
        FieldValue::Bool(v) => Json::Bool(v),
        FieldValue::U8(v) => v.into(),
        FieldValue::U16(v) => v.into(),
        FieldValue::U32(v) => v.into(),
        FieldValue::U64(v) => v.into(),
        FieldValue::I8(v) => v.into(),
        FieldValue::I16(v) => v.into(),
        FieldValue::I32(v) => v.into(),
        FieldValue::I64(v) => v.into(),
        FieldValue::F64(v) => v.into(),
    }
}

fn record_to_json(record: &Record) -> Json {
    let fields: Map<String, Json> = record
        .fields()
        .map(|(name, value)| (name.to_string(), field_to_json(value)))
        .collect();
    Json::Object(fields)
}

fn samples(values: &[f64]) -> Json {
    Json::Array(values.iter().map(|&v| Json::from(v)).collect())
}

fn multi_harmonic_to_json(mh: &MultiHarmonic) -> Json {
    json!({
        "enabled": mh.enabled,
        "settings": mh.settings,
        "harmonics": mh.harmonics,
    })
}

fn lockin_to_json(readings: &LockInReadings) -> Json {
    let general = &readings.general;
    let modules: Vec<Json> = readings
        .modules
        .iter()
        .map(|m| {
            json!({
                "digital_in_frequency_hz": m.digital_in_frequency_hz,
                "digital_out_frequency_hz": m.digital_out_frequency_hz,
                "amplitude_vrms": m.amplitude_vrms,
                "output_offset_v": m.output_offset_v,
            })
        })
        .collect();
    json!({
        "dc": samples(&readings.dc),
        "x": samples(&readings.x),
        "y": samples(&readings.y),
        "r": samples(&readings.r),
        "theta_deg": samples(&readings.theta_deg),
        "general": {
            "dt_s": general.dt_s,
            "cycles_per_sample": general.cycles_per_sample,
            "sync_index": general.sync_index,
            "time_s": general.time_s,
            "lockin_frequency_hz": general.lockin_frequency_hz,
            "pll1_frequency_hz": general.pll1_frequency_hz,
            "pll2_frequency_hz": general.pll2_frequency_hz,
            "composite1_frequency_hz": general.composite1_frequency_hz,
        },
        "modules": modules,
    })
}

fn waveform_to_json(wave: &Waveform) -> Json {
    let channels: Map<String, Json> = wave
        .active_channels()
        .map(|ch| (ch.label.clone(), samples(&ch.samples)))
        .collect();
    json!({
        "kind": format!("{:?}", wave.kind).to_lowercase(),
        "dt_s": wave.dt_s,
        "df_hz": wave.df_hz,
        "averages_completed": wave.averages_completed,
        "averaging_done": wave.averaging_done,
        "waveform_type": wave.waveform_type,
        "sampling_reduction_factor": wave.sampling_reduction_factor,
        "scope_samples": wave.scope_samples,
        "channels": channels,
    })
}

pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Record(record) => record_to_json(record),
        Value::MultiHarmonic(mh) => multi_harmonic_to_json(mh),
        Value::LockIn(readings) => lockin_to_json(readings),
        Value::Waveform(wave) => waveform_to_json(wave),
    }
}

fn to_line(json: &Json) -> String {
    serde_json::to_string(json).unwrap_or_else(|_| "{}".to_string())
}

fn to_pretty(json: &Json) -> String {
    serde_json::to_string_pretty(json).unwrap_or_else(|_| "{}".to_string())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_value(key: ParamKey, name: &str, value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = json!({
                "category": key.category,
                "index": key.index,
                "name": name,
                "value": value_to_json(value),
            });
            println!("{}", to_line(&out));
        }
        OutputFormat::Table => match value {
            Value::Record(record) => {
                let mut table = new_table(vec!["FIELD", "TYPE", "VALUE"]);
                for (field, v) in record.fields() {
                    table.add_row(vec![
                        field.to_string(),
                        v.field_type().to_string(),
                        v.to_string(),
                    ]);
                }
                println!("{name} {key}");
                println!("{table}");
            }
            other => {
                println!("{name} {key}");
                println!("{}", to_pretty(&value_to_json(other)));
            }
        },
        OutputFormat::Pretty => {
            println!("{name} {key}");
            println!("{}", to_pretty(&value_to_json(value)));
        }
    }
}

pub fn print_systems(systems: &BTreeMap<IpAddr, SystemDescriptor>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<Json> = systems
                .iter()
                .map(|(ip, descriptor)| json!({ "ip": ip.to_string(), "descriptor": descriptor }))
                .collect();
            println!("{}", to_line(&Json::Array(out)));
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["IP", "DESCRIPTOR"]);
            for (ip, descriptor) in systems {
                let text = serde_json::to_string(descriptor).unwrap_or_default();
                table.add_row(vec![ip.to_string(), text]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if systems.is_empty() {
                println!("no systems found");
            }
            for (ip, descriptor) in systems {
                let name = descriptor.get_str("name").unwrap_or("unnamed");
                println!("{ip} {name}");
            }
        }
    }
}

/// One line per lock-in data frame.
pub fn print_reading(key: ParamKey, readings: &LockInReadings, format: OutputFormat) {
    let xy = readings.latest_xy();
    match format {
        OutputFormat::Json => {
            let out = json!({
                "category": key.category,
                "index": key.index,
                "samples": readings.x.len(),
                "time_s": readings.general.time_s,
                "x": xy.map(|(x, _)| x),
                "y": xy.map(|(_, y)| y),
            });
            println!("{}", to_line(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => match xy {
            Some((x, y)) => println!(
                "{key} t={:.3}s samples={} x={x:.6e} y={y:.6e}",
                readings.general.time_s,
                readings.x.len()
            ),
            None => println!("{key} t={:.3}s samples=0", readings.general.time_s),
        },
    }
}

#[cfg(test)]
mod tests {
    use mcl_params::{Codec, Layout};

    use super::*;

    #[test]
    fn non_finite_doubles_become_null() {
        assert_eq!(field_to_json(FieldValue::F64(f64::NAN)), Json::Null);
        assert_eq!(field_to_json(FieldValue::F64(1.5)), json!(1.5));
        assert_eq!(field_to_json(FieldValue::U16(7)), json!(7));
    }

    #[test]
    fn lockin_readings_serialize_arrays() {
        let readings = LockInReadings {
            x: vec![1.0, 2.0],
            y: vec![3.0, f64::INFINITY],
            ..LockInReadings::default()
        };
        let json = lockin_to_json(&readings);
        assert_eq!(json["x"], json!([1.0, 2.0]));
        assert_eq!(json["y"][1], Json::Null);
    }

    #[test]
    fn records_serialize_by_field_name() {
        let descriptor = mcl_params::descriptors()
            .into_iter()
            .find(|d| matches!(d.codec, Codec::Fixed(_)))
            .expect("catalog has fixed layouts");
        let layout: &Layout = match descriptor.codec {
            Codec::Fixed(layout) => layout,
            _ => unreachable!(),
        };
        let json = value_to_json(&Value::Record(layout.default_record()));
        let object = json.as_object().expect("record is an object");
        assert_eq!(object.len(), layout.fields.len());
        assert!(object.contains_key(layout.fields[0].name));
    }
}

//! Registry behavior driven the way the stream consumer and callers drive it.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use mcl_frame::{write_queue, Frame, FrameDecoder, WriteQueueReceiver};
use mcl_params::{
    callback, descriptors, AmplitudeUnit, Codec, DutyCycleSource, FieldType, FieldValue,
    FrequencySource, InputGain, LockIn, LockInReadings, Module, ParamError, ParamKey, PhaseSource,
    PllSource, Registry, Value, WaveShape,
};

fn registry() -> (Registry, WriteQueueReceiver) {
    let (queue, rx) = write_queue();
    (Registry::new(queue), rx)
}

#[derive(Clone, Copy)]
enum Boundary {
    Low,
    High,
    Odd,
}

fn put_boundary(buf: &mut BytesMut, ty: FieldType, which: Boundary) {
    match (ty, which) {
        (FieldType::Bool, Boundary::Low) => buf.put_u8(0),
        (FieldType::Bool, _) => buf.put_u8(1),
        (FieldType::U8, Boundary::Low) => buf.put_u8(0),
        (FieldType::U8, Boundary::High) => buf.put_u8(u8::MAX),
        (FieldType::U8, Boundary::Odd) => buf.put_u8(0x80),
        (FieldType::U16, Boundary::Low) => buf.put_u16(0),
        (FieldType::U16, Boundary::High) => buf.put_u16(u16::MAX),
        (FieldType::U16, Boundary::Odd) => buf.put_u16(0x8001),
        (FieldType::F64, Boundary::Low) => buf.put_f64(0.0),
        (FieldType::F64, Boundary::High) => buf.put_f64(f64::MAX),
        (FieldType::F64, Boundary::Odd) => buf.put_f64(f64::NAN),
        (other, _) => panic!("catalog uses no {other} fields"),
    }
}

#[test]
fn fixed_layouts_round_trip_boundary_values() {
    for d in descriptors() {
        let Codec::Fixed(layout) = d.codec else {
            continue;
        };
        for which in [Boundary::Low, Boundary::High, Boundary::Odd] {
            let mut wire = BytesMut::new();
            for field in layout.fields {
                put_boundary(&mut wire, field.ty, which);
            }

            let record = layout.decode(d.key, &wire).unwrap();
            let mut again = BytesMut::new();
            record.encode(&mut again);
            assert_eq!(again, wire, "{}", d.name);
            assert_eq!(layout.decode(d.key, &again).unwrap(), record, "{}", d.name);
        }
    }
}

#[test]
fn fixed_layout_length_mismatch_is_protocol_error() {
    let (registry, _rx) = registry();
    let key = ParamKey::new(2, 34);
    let err = registry
        .dispatch(&Frame::new(2, 34, vec![0u8; 16]))
        .unwrap_err();
    assert!(matches!(err, ParamError::Protocol { key: k, .. } if k == key));
}

#[test]
fn phase_shift_frame_split_across_reads_decodes() {
    let (registry, rx) = registry();
    let mut wire = BytesMut::new();
    wire.put_u8(2);
    wire.put_u16(90);
    wire.put_u32(8);
    wire.put_f64(-12.75);

    let mut decoder = FrameDecoder::default();
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();
    for chunk in wire.chunks(3) {
        buf.extend_from_slice(chunk);
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
    }
    assert_eq!(frames.len(), 1);

    registry.dispatch(&frames[0]).unwrap();
    assert_eq!(registry.phase_shift(1).unwrap().degrees().unwrap(), -12.75);
    assert!(rx.drain_frames().is_empty());
}

#[test]
fn negative_amplitude_rejected_without_frames() {
    let (registry, rx) = registry();
    let amplitude = registry.amplitude(1).unwrap();
    amplitude.set_volts(0.5).unwrap();
    rx.drain_frames();

    let err = amplitude.set_volts(-1.0).unwrap_err();
    assert!(matches!(err, ParamError::Validation { .. }));
    assert_eq!(amplitude.volts().unwrap(), 0.5);

    let generic = registry
        .set_field(ParamKey::new(2, 75), "amplitude_v", FieldValue::F64(-1.0))
        .unwrap_err();
    assert!(generic.is_validation());

    assert!(rx.drain_frames().is_empty());
}

#[test]
fn whole_record_set_is_validated_like_field_set() {
    let (registry, rx) = registry();
    let key = ParamKey::new(2, 75);
    registry
        .set_field(key, "amplitude_v", FieldValue::F64(0.5))
        .unwrap();
    rx.drain_frames();
    let before = registry.get(key).unwrap();

    let mut wire = BytesMut::new();
    before.encode(&mut wire);
    wire[10..18].copy_from_slice(&(-1.0f64).to_be_bytes());
    let Codec::Fixed(layout) = registry.parameter(key).unwrap().codec() else {
        panic!("amplitude is a fixed layout");
    };
    let negative = layout.decode(key, &wire).unwrap();

    let err = registry.set(key, Value::Record(negative)).unwrap_err();
    assert!(err.is_validation(), "{err}");
    assert_eq!(registry.get(key).unwrap(), before);
    assert!(rx.drain_frames().is_empty());

    let mut wire = BytesMut::new();
    before.encode(&mut wire);
    wire[10..18].copy_from_slice(&0.75f64.to_be_bytes());
    let raised = layout.decode(key, &wire).unwrap();
    registry.set(key, Value::Record(raised)).unwrap();
    assert_eq!(rx.drain_frames().len(), 1);
}

#[test]
fn generic_surface_checks_type_and_access() {
    let (registry, rx) = registry();
    let key = ParamKey::new(2, 90);

    let err = registry
        .set_field(key, "phase_shift_deg", FieldValue::U8(1))
        .unwrap_err();
    assert!(matches!(err, ParamError::FieldType { .. }));

    let err = registry
        .set_field(key, "no_such_field", FieldValue::F64(1.0))
        .unwrap_err();
    assert!(matches!(err, ParamError::UnknownField { .. }));

    let err = registry
        .set_field(ParamKey::new(2, 45), "vcc_5v", FieldValue::F64(5.0))
        .unwrap_err();
    assert!(matches!(err, ParamError::ReadOnly(_)));

    let err = registry
        .set(ParamKey::new(3, 0), Value::LockIn(Arc::default()))
        .unwrap_err();
    assert!(matches!(err, ParamError::ReadOnly(_)));

    assert!(rx.drain_frames().is_empty());

    let parsed = FieldValue::parse(FieldType::F64, "33.5").unwrap();
    registry.set_field(key, "phase_shift_deg", parsed).unwrap();
    let frames = rx.drain_frames();
    assert_eq!(frames, vec![Frame::new(2, 90, 33.5f64.to_be_bytes().to_vec())]);
}

#[test]
fn every_enum_label_round_trips_through_setters() {
    let (registry, rx) = registry();
    let lockin = registry.lockin(LockIn::L2).unwrap();

    for label in WaveShape::labels() {
        lockin.set_wave_shape(label.parse().unwrap()).unwrap();
        assert_eq!(lockin.wave_shape().unwrap().label(), label);
    }
    for label in FrequencySource::labels() {
        lockin.set_frequency_source(label.parse().unwrap()).unwrap();
        assert_eq!(lockin.frequency_source().unwrap().label(), label);
    }
    for label in PhaseSource::labels() {
        lockin.set_phase_source(label.parse().unwrap()).unwrap();
        assert_eq!(lockin.phase_source().unwrap().label(), label);
    }
    for label in DutyCycleSource::labels() {
        lockin.set_duty_cycle_source(label.parse().unwrap()).unwrap();
        assert_eq!(lockin.duty_cycle_source().unwrap().label(), label);
    }

    let input = registry.input(Module::C, 1).unwrap();
    for label in InputGain::labels() {
        input.set_gain(label.parse().unwrap()).unwrap();
        assert_eq!(input.gain().unwrap().label(), label);
    }

    let amplitude = registry.amplitude(2).unwrap();
    for label in AmplitudeUnit::labels() {
        amplitude.set_unit(label.parse().unwrap()).unwrap();
        assert_eq!(amplitude.unit().unwrap().label(), label);
    }

    let pll = registry.pll(2).unwrap();
    for label in PllSource::labels() {
        pll.set_source(label.parse().unwrap()).unwrap();
        assert_eq!(pll.source().unwrap().label(), label);
    }

    let sent = WaveShape::ALL.len()
        + FrequencySource::ALL.len()
        + PhaseSource::ALL.len()
        + DutyCycleSource::ALL.len()
        + InputGain::ALL.len()
        + AmplitudeUnit::ALL.len()
        + PllSource::ALL.len();
    assert_eq!(rx.drain_frames().len(), sent);
}

#[test]
fn invalid_labels_leave_field_unchanged() {
    let (registry, rx) = registry();
    let lockin = registry.lockin(LockIn::L1).unwrap();
    lockin.set_wave_shape(WaveShape::Boxcar).unwrap();
    rx.drain_frames();

    let err = "Triangle".parse::<WaveShape>().unwrap_err();
    assert!(err.is_validation());
    assert!("Frequency 9".parse::<FrequencySource>().is_err());
    assert!("3".parse::<InputGain>().is_err());

    let err = registry
        .set_field(ParamKey::new(2, 6), "wave_shape", FieldValue::U8(3))
        .unwrap_err();
    assert!(matches!(err, ParamError::Validation { .. }));

    assert_eq!(lockin.wave_shape().unwrap(), WaveShape::Boxcar);
    assert!(rx.drain_frames().is_empty());
}

fn lockin_frame(index: u16, x: f64) -> Frame {
    let readings = LockInReadings {
        x: vec![x],
        y: vec![-x],
        ..LockInReadings::default()
    };
    let mut payload = BytesMut::new();
    readings.encode(&mut payload);
    Frame::new(3, index, payload.freeze())
}

fn recorder() -> (mcl_params::Callback, mpsc::Receiver<f64>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let cb = callback(move |_key, value, _ctx| {
        if let Some((x, _)) = value.as_lockin().and_then(|r| r.latest_xy()) {
            let _ = tx.lock().unwrap().send(x);
        }
    });
    (cb, rx)
}

fn next(rx: &mpsc::Receiver<f64>) -> f64 {
    rx.recv_timeout(Duration::from_secs(2)).unwrap()
}

#[test]
fn two_observers_then_one_unregistered() {
    let (registry, _rx) = registry();
    let key = ParamKey::new(3, 0);
    let (first, first_rx) = recorder();
    let (second, second_rx) = recorder();

    registry
        .register_observer(key, Arc::clone(&first), Arc::new(()))
        .unwrap();
    registry
        .register_observer(key, Arc::clone(&second), Arc::new(()))
        .unwrap();

    for x in [1.0, 2.0, 3.0] {
        registry.dispatch(&lockin_frame(0, x)).unwrap();
    }
    for rx in [&first_rx, &second_rx] {
        assert_eq!([next(rx), next(rx), next(rx)], [1.0, 2.0, 3.0]);
    }

    registry.unregister_observer(key, &first).unwrap();
    registry.dispatch(&lockin_frame(0, 4.0)).unwrap();
    assert_eq!(next(&second_rx), 4.0);
    assert!(first_rx.recv_timeout(Duration::from_millis(200)).is_err());

    assert_eq!(registry.lockin_data(LockIn::L1).unwrap().latest_xy(), Some((4.0, -4.0)));
    assert!(matches!(
        registry.unregister_observer(key, &first),
        Err(ParamError::UnknownObserver(_))
    ));
}

#[test]
fn observers_are_per_stream() {
    let (registry, _rx) = registry();
    let (cb, rx) = recorder();
    registry
        .register_observer(ParamKey::new(3, 1), cb, Arc::new(()))
        .unwrap();

    registry.dispatch(&lockin_frame(0, 9.0)).unwrap();
    registry.dispatch(&lockin_frame(1, 7.0)).unwrap();
    assert_eq!(next(&rx), 7.0);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn malformed_stream_frame_keeps_value_and_skips_observers() {
    let (registry, _rx) = registry();
    let (cb, rx) = recorder();
    let key = ParamKey::new(3, 0);
    registry.register_observer(key, cb, Arc::new(())).unwrap();

    registry.dispatch(&lockin_frame(0, 5.0)).unwrap();
    assert_eq!(next(&rx), 5.0);

    let err = registry
        .dispatch(&Frame::new(3, 0, vec![0u8, 0, 0, 9]))
        .unwrap_err();
    assert!(matches!(err, ParamError::Protocol { .. }));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(registry.lockin_data(LockIn::L1).unwrap().x, vec![5.0]);
}

//! Capture engine tests: edge sequences, pulse latching, concurrent snapshots

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rc_car_controller::capture::{
    CaptureChannels, Edge, EdgePairCapture, EdgeState, PulseLatcher,
};
use rc_car_controller::config::ControllerConfig;
use rc_car_controller::convert::Calibration;
use rc_car_controller::fault::{FaultCode, FaultState};
use rc_car_controller::latch::Latch;

#[test]
fn test_pwm_train_publishes_every_pulse() {
    let latch = Latch::new();
    let mut capture = EdgePairCapture::new(&latch);

    // 74 Hz PWM, 1.5 ms high time
    let period_ticks = 80_000_000 / 74;
    for k in 0..10u32 {
        let rising = k * period_ticks;
        capture.on_edge(Edge::Rising, rising);
        assert_eq!(capture.on_edge(Edge::Falling, rising + 120_000), Some(120_000));
    }

    assert_eq!(latch.snapshot().updates, 10);
    assert_eq!(capture.stats().pairs, 10);
}

#[test]
fn test_missed_falling_edge_is_counted_not_published() {
    let latch = Latch::new();
    let faults = FaultState::new();
    let mut capture = EdgePairCapture::new(&latch).with_faults(&faults);

    capture.on_edge(Edge::Rising, 0);
    capture.on_edge(Edge::Falling, 1_000);
    assert_eq!(latch.snapshot().raw, 1_000);

    // Falling edge lost: period-long delta must never be published
    capture.on_edge(Edge::Rising, 10_000);
    capture.on_edge(Edge::Rising, 1_090_000);
    assert_eq!(latch.snapshot().raw, 1_000);
    assert_eq!(capture.state(), EdgeState::WaitingFalling);

    capture.on_edge(Edge::Falling, 1_091_000);
    assert_eq!(latch.snapshot().raw, 1_000);
    assert_eq!(latch.snapshot().updates, 2);

    let stats = capture.stats();
    assert_eq!(stats.missed_falling, 1);
    assert_eq!(stats.orphan_falling, 0);
    assert_eq!(faults.count(FaultCode::EdgeSequence), 1);
}

#[test]
fn test_starting_mid_pulse_ignores_first_falling() {
    let latch = Latch::new();
    let faults = FaultState::new();
    let mut capture = EdgePairCapture::new(&latch).with_faults(&faults);

    assert_eq!(capture.on_edge(Edge::Falling, 500), None);
    capture.on_edge(Edge::Rising, 1_000);
    assert_eq!(capture.on_edge(Edge::Falling, 1_400), Some(400));

    assert_eq!(capture.stats().orphan_falling, 1);
    assert_eq!(faults.count(FaultCode::EdgeSequence), 1);
}

#[test]
fn test_pulse_latch_replaces_previous_interval() {
    let latch = Latch::new();
    let mut latcher = PulseLatcher::new(&latch);
    let calibration = Calibration::new(&ControllerConfig::DEFAULT, 80_000_000).unwrap();

    latcher.on_interval(40);
    assert!((calibration.velocity(latch.snapshot().raw) - 25.0).abs() < 1e-3);

    latcher.on_interval(8);
    assert!((calibration.velocity(latch.snapshot().raw) - 5.0).abs() < 1e-3);
}

#[test]
fn test_snapshot_while_isr_updates() {
    let pulses: &'static Latch = Box::leak(Box::new(Latch::new()));
    let throttle_in: &'static Latch = Box::leak(Box::new(Latch::new()));
    let echo: &'static Latch = Box::leak(Box::new(Latch::new()));
    let stop = Arc::new(AtomicBool::new(false));

    // Simulated capture callbacks: each channel publishes its own constant
    let mut writers = Vec::new();
    for (latch, value) in [(pulses, 16u32), (throttle_in, 120_000), (echo, 466_480)] {
        let stop = Arc::clone(&stop);
        writers.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                latch.update(value);
            }
        }));
    }

    let channels = CaptureChannels {
        pulses,
        throttle_in,
        echo,
    };
    for _ in 0..10_000 {
        let raw = channels.snapshot();
        assert!(raw.pulse_count == 0 || raw.pulse_count == 16);
        assert!(raw.throttle_in_ticks == 0 || raw.throttle_in_ticks == 120_000);
        assert!(raw.echo_ticks == 0 || raw.echo_ticks == 466_480);
    }

    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
}

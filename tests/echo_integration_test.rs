// Integration tests driving the public engine API over the simulated backend

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use audio_echo::audio::{AudioFormat, CapturePermission, Player, Recorder, RingBuffer};
use audio_echo::engine::{EchoEngine, EngineState, FailPoint, SimulatedBackend};
use audio_echo::{EchoConfig, EchoError};

fn duplex_engine(sample_rate: i32, frames_per_buffer: i32) -> (EchoEngine, SimulatedBackend) {
    let backend = SimulatedBackend::new();
    let mut engine = EchoEngine::new(Arc::new(backend.clone()), EchoConfig::default());
    engine.create_engine(sample_rate, frames_per_buffer).unwrap();
    engine.create_player().unwrap();
    engine.create_recorder().unwrap();
    (engine, backend)
}

#[test]
fn test_injected_frame_reaches_render_output() {
    let (mut engine, backend) = duplex_engine(48000, 192);
    engine.start_echo().unwrap();

    let format = *engine.format().unwrap();
    let periods = engine.stats().ring.capacity_frames as usize / format.frames_per_buffer() as usize;
    assert_eq!(periods, 8);

    let mut capture = vec![0i16; format.samples_per_buffer()];
    let mut render = vec![0i16; format.samples_per_buffer()];

    // Output is requested before any input has arrived.
    backend.render(&mut render);
    assert!(render.iter().all(|&s| s == 0));

    let mut arrived_at = None;
    for period in 0..periods {
        capture.fill(0);
        if period == 0 {
            capture[100] = 12345;
        }
        assert!(backend.capture(&capture));
        assert!(backend.render(&mut render));

        if let Some(pos) = render.iter().position(|&s| s == 12345) {
            arrived_at = Some((period, pos));
            break;
        }
    }

    assert_eq!(arrived_at, Some((0, 100)));
    engine.stop_echo().unwrap();
    engine.delete_engine().unwrap();
}

#[test]
fn test_continuous_stream_is_passed_through_in_order() {
    let (mut engine, backend) = duplex_engine(48000, 64);
    engine.start_echo().unwrap();

    let mut next = 1i16;
    let mut expected = 1i16;
    let mut render = vec![0i16; 64];
    for _ in 0..200 {
        let capture: Vec<i16> = (0..64)
            .map(|_| {
                let sample = next;
                next = if next == i16::MAX { 1 } else { next + 1 };
                sample
            })
            .collect();
        backend.capture(&capture);
        backend.render(&mut render);
        for &sample in &render {
            assert_eq!(sample, expected);
            expected = if expected == i16::MAX { 1 } else { expected + 1 };
        }
    }

    let stats = engine.stats();
    assert_eq!(stats.capture.frames, 200 * 64);
    assert_eq!(stats.render.frames, 200 * 64);
    assert_eq!(stats.ring.underrun_frames, 0);
    assert_eq!(stats.ring.overrun_frames, 0);
}

#[test]
fn test_create_engine_rejects_zero_sample_rate() {
    let backend = SimulatedBackend::new();
    let mut engine = EchoEngine::new(Arc::new(backend), EchoConfig::default());

    let err = engine.create_engine(0, 192).unwrap_err();
    assert!(matches!(err, EchoError::UnsupportedFormat { .. }));
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn test_stop_echo_quiesces_concurrent_callbacks() {
    let (mut engine, backend) = duplex_engine(48000, 48);
    engine.start_echo().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let capture_thread = {
        let backend = backend.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let buffer = vec![7i16; 48];
            while !done.load(Ordering::Relaxed) {
                backend.capture(&buffer);
                thread::yield_now();
            }
        })
    };
    let render_thread = {
        let backend = backend.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut buffer = vec![0i16; 48];
            while !done.load(Ordering::Relaxed) {
                backend.render(&mut buffer);
                thread::yield_now();
            }
        })
    };

    // Let both callbacks run for a while before pulling the plug.
    while engine.stats().capture.invocations < 100 || engine.stats().render.invocations < 100 {
        thread::yield_now();
    }
    engine.stop_echo().unwrap();

    let after_stop = engine.stats();
    thread::sleep(Duration::from_millis(20));
    let later = engine.stats();

    done.store(true, Ordering::Relaxed);
    capture_thread.join().unwrap();
    render_thread.join().unwrap();

    assert_eq!(engine.state(), EngineState::Created);
    assert_eq!(after_stop.capture.invocations, later.capture.invocations);
    assert_eq!(after_stop.render.invocations, later.render.invocations);
    assert_eq!(backend.live_streams(), 0);
}

#[test]
fn test_stop_echo_twice_and_create_engine_twice() {
    let (mut engine, _) = duplex_engine(48000, 192);
    engine.start_echo().unwrap();
    engine.stop_echo().unwrap();
    assert!(engine.stop_echo().is_ok());

    assert!(matches!(
        engine.create_engine(48000, 192),
        Err(EchoError::InvalidState { .. })
    ));
}

#[test]
fn test_recorder_open_failure_rolls_back() {
    let backend = SimulatedBackend::new();
    let mut engine = EchoEngine::new(Arc::new(backend.clone()), EchoConfig::default());
    engine.create_engine(48000, 192).unwrap();
    engine.create_player().unwrap();

    backend.fail_next(
        FailPoint::OpenCapture,
        EchoError::UnsupportedFormat {
            reason: "rate not supported by microphone".to_string(),
        },
    );
    assert!(engine.create_recorder().is_err());
    assert_eq!(engine.state(), EngineState::Created);
    assert_eq!(backend.live_streams(), 0);
}

#[test]
fn test_permission_denied_maps_to_error() {
    let backend = SimulatedBackend::new();
    let mut engine = EchoEngine::new(Arc::new(backend), EchoConfig::default());
    engine.set_capture_permission(false);
    engine.create_engine(48000, 192).unwrap();
    engine.create_player().unwrap();

    assert_eq!(engine.create_recorder(), Err(EchoError::PermissionDenied));
}

#[test]
fn test_player_without_recorder_renders_silence() {
    let backend = SimulatedBackend::new();
    let format = AudioFormat::from_native(48000, 192, 1).unwrap();
    let ring = Arc::new(RingBuffer::new(192 * 8, 1).unwrap());
    let mut player = Player::create(&backend, &format, Arc::clone(&ring)).unwrap();
    player.start().unwrap();

    let mut out = vec![1i16; 192];
    for _ in 0..20 {
        backend.render(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }
    assert_eq!(ring.stats().underrun_frames, 20 * 192);
    player.destroy().unwrap();
}

#[test]
fn test_engine_renders_silence_when_nothing_is_captured() {
    let (mut engine, backend) = duplex_engine(48000, 192);
    engine.start_echo().unwrap();

    let mut out = vec![1i16; 192];
    for _ in 0..10 {
        assert!(backend.render(&mut out));
        assert!(out.iter().all(|&s| s == 0));
    }
}

#[test]
fn test_recorder_without_player_keeps_newest_frames() {
    let backend = SimulatedBackend::new();
    let format = AudioFormat::from_native(48000, 16, 1).unwrap();
    let ring = Arc::new(RingBuffer::new(64, 1).unwrap());
    let mut recorder = Recorder::create(
        &backend,
        &format,
        Arc::clone(&ring),
        CapturePermission::Granted,
    )
    .unwrap();
    recorder.start().unwrap();

    for block in 0..20i16 {
        let buffer: Vec<i16> = (0..16).map(|i| block * 16 + i).collect();
        backend.capture(&buffer);
        assert!(ring.available() <= ring.capacity());
    }
    recorder.destroy().unwrap();

    // 320 frames written into 64 slots: only frames 256..320 survive.
    let mut out = vec![0i16; 64];
    assert_eq!(ring.read(&mut out), 64);
    let expected: Vec<i16> = (256..320).collect();
    assert_eq!(out, expected);
    assert_eq!(ring.stats().overrun_frames, 256);
}

//! E2E tests for the sink adapters
//!
//! Drives the host-bus and USB sinks with their host models and checks the
//! byte stream the host sees, plus the underrun accounting when the host
//! reads more than the sink advertises.

use fusion_daq::sink::nor::BusState;
use fusion_daq::{
    cosine_ramp, FrameDecoder, NorHost, PipelineConfig, SinkConfig, SinkKind, Simulator,
    UsbBridge,
};

fn nor_config(device_count: usize) -> PipelineConfig {
    PipelineConfig {
        device_count,
        sink: SinkConfig {
            kind: SinkKind::Nor,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// The host-bus sink delivers a clean prefix of the frame stream to a host
/// that reads exactly one threshold's worth of words per `have_data`
#[test]
fn test_nor_sink_two_devices() {
    let mut sim = Simulator::nor(nor_config(2), NorHost::default()).unwrap();
    sim.run(1000 * 40 + 1000).unwrap();

    let layout = sim.pipeline().frame_layout();
    assert_eq!(layout.len(), 12);
    let mut decoder = FrameDecoder::new(layout);
    let frames = decoder.push(sim.received());

    assert!(frames.len() >= 960, "only {} frames arrived", frames.len());
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.counter, i as u16, "counter out of order at frame {}", i);
        let expected = cosine_ramp(i as u64);
        assert_eq!(frame.samples, vec![expected, expected], "frame {}", i);
    }
    let stats = decoder.stats();
    assert_eq!(stats.lost_frames, 0);
    assert_eq!(stats.resyncs, 0);

    let sink = sim.pipeline().stats().sink;
    assert_eq!(sink.underruns, 0);
    // The run may stop between a read's output and release cycles
    let received = sim.received().len() as u64;
    assert!(sink.bytes_delivered <= received && received <= sink.bytes_delivered + 4);
    assert!(sink.high_water <= 64);
}

/// A host that reads more words than `have_data` promised gets underruns,
/// and each one is reported instead of popping the queue
#[test]
fn test_nor_host_overread_counts_underruns() {
    let mut sim = Simulator::nor(nor_config(1), NorHost::new(96)).unwrap();
    sim.run(20_000).unwrap();
    sim.run_until(|s| !s.host().is_reading(), 1000).unwrap();

    let stats = sim.pipeline().stats();
    assert!(stats.sink.underruns > 0, "{:?}", stats.sink);
    assert!(!stats.is_clean());
    // Underrun reads still return a word on the bus
    assert_eq!(
        sim.received().len() as u64,
        (stats.sink.words_delivered + stats.sink.underruns) * 4
    );
}

/// The bus state machine is back in Idle between host reads
#[test]
fn test_nor_bus_idle_between_bursts() {
    let mut sim = Simulator::nor(nor_config(1), NorHost::default()).unwrap();
    let started = sim.run_until(|s| s.host().is_reading(), 10_000).unwrap();
    assert!(started, "have_data never rose");
    sim.run_until(|s| !s.host().is_reading(), 1000).unwrap();
    sim.run(2).unwrap();
    assert_eq!(sim.pipeline().sink().state(), BusState::Idle);
    assert_eq!(sim.received().len(), 32 * 4);
    assert_eq!(&sim.received()[..2], &[0xF0, 0x0F]);
}

/// `have_data` does not rise before the threshold is reached
#[test]
fn test_nor_have_data_waits_for_threshold() {
    let mut sim = Simulator::nor(nor_config(1), NorHost::default()).unwrap();
    // One frame of 8 bytes every 40 cycles: 32 words need about 640 cycles
    sim.run(400).unwrap();
    assert!(!sim.host().is_reading());
    assert!(sim.pipeline().sink().word_level() < 32);
    assert!(sim.received().is_empty());
}

/// The USB sink keeps every byte in order while the bridge is busy half the time
#[test]
fn test_usb_half_busy_in_order() {
    let config = PipelineConfig {
        device_count: 2,
        ..Default::default()
    };
    let mut sim = Simulator::usb(config, UsbBridge::busy(50, 1234)).unwrap();
    sim.run(300 * 40).unwrap();

    let mut decoder = FrameDecoder::new(sim.pipeline().frame_layout());
    let frames = decoder.push(sim.received());
    assert!(frames.len() >= 250, "only {} frames arrived", frames.len());
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.counter, i as u16);
        assert_eq!(frame.samples[1], cosine_ramp(i as u64));
    }
    let stats = sim.pipeline().stats();
    assert!(stats.is_clean(), "{:?}", stats);
    assert_eq!(stats.sink.bytes_delivered, sim.received().len() as u64);
}

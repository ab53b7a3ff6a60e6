//! E2E tests for persistent configuration
//!
//! Tests config round-trip through a JSON file, defaults for missing
//! fields, and rejection of invalid values before any pipeline is built.

use approx::assert_relative_eq;
use fusion_daq::{
    run_session, AcquisitionPipeline, AppConfig, ConfigError, EncoderVariant, Factor,
    PipelineConfig, PipelineError, SinkKind, UsbSink, Zone,
};
use std::sync::atomic::AtomicBool;

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fusion-daq").join("run.json");

    let mut config = AppConfig {
        frames: 250,
        nor_burst_words: 16,
        ..Default::default()
    };
    config.pipeline.device_count = 2;
    config.pipeline.zone = Zone::One;
    config.pipeline.oversampling = Factor::X4;
    config.pipeline.chain.depths = vec![128, 64, 64];
    config.pipeline.sink.kind = SinkKind::Nor;
    config.save(&path).unwrap();

    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{ "frames": 12, "pipeline": { "zone": 1, "sink": { "kind": "nor" } } }"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.frames, 12);
    assert_eq!(config.pipeline.zone, Zone::One);
    assert_eq!(config.pipeline.sink.kind, SinkKind::Nor);
    assert_eq!(config.pipeline.sink.nor_fifo_depth, 64);
    assert_eq!(config.pipeline.encoder, EncoderVariant::Handshake);
    assert_eq!(config.pipeline.chain.depths, vec![256; 4]);
}

#[test]
fn test_invalid_selectors_rejected_while_parsing() {
    for json in [
        r#"{"oversampling": 8}"#,
        r#"{"decimation": 0}"#,
        r#"{"zone": 3}"#,
        r#"{"encoder": "async"}"#,
    ] {
        assert!(
            serde_json::from_str::<PipelineConfig>(json).is_err(),
            "accepted {}",
            json
        );
    }
}

#[test]
fn test_invalid_geometry_rejected_at_construction() {
    let cases = [
        (
            PipelineConfig {
                channel_fifo_depth: 0,
                ..Default::default()
            },
            ConfigError::ZeroDepth {
                what: "channel queue",
            },
        ),
        (
            PipelineConfig {
                device_count: 0,
                ..Default::default()
            },
            ConfigError::NoDevices,
        ),
        (
            PipelineConfig {
                ready_timeout_cycles: 0,
                ..Default::default()
            },
            ConfigError::ZeroTimeout,
        ),
    ];
    for (config, expected) in cases {
        let err = AcquisitionPipeline::new(config, UsbSink::new()).unwrap_err();
        assert_eq!(err, PipelineError::Config(expected));
    }
}

#[test]
fn test_effective_sample_rate() {
    let config = PipelineConfig {
        sys_clk_freq: 100e6,
        target_sample_freq: 1e6,
        ..Default::default()
    };
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.sample_clock_divisor(), 100);
    assert_relative_eq!(config.effective_sample_freq(), 1e6);

    // 100 MHz / 1.3 MHz truncates to 76 cycles
    let config = PipelineConfig {
        sys_clk_freq: 100e6,
        target_sample_freq: 1.3e6,
        ..Default::default()
    };
    assert_eq!(config.sample_clock_divisor(), 76);
    assert_relative_eq!(
        config.effective_sample_freq(),
        1_315_789.47,
        max_relative = 1e-6
    );
}

#[test]
fn test_loaded_config_drives_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{ "frames": 64, "pipeline": { "device_count": 2, "sink": { "kind": "nor" } } }"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    let report = run_session(&config, &AtomicBool::new(false)).unwrap();
    assert!(report.frames_decoded >= 64);
    assert_eq!(report.sink, SinkKind::Nor);
    assert!(report.is_clean(), "{:?}", report);
}

//! Integration tests for the simulated instruments
//!
//! Builds instruments through their factories, the way the registry does.

use labshell_core::capabilities::Instrument;
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::{DriverErrorKind, InstrumentError};
use labshell_driver_mock::*;

fn params(src: &str) -> toml::Value {
    toml::from_str(src).unwrap()
}

#[tokio::test]
async fn example_exposes_all_output_channels() {
    let dmm = ExampleFactory
        .build("dmm1".into(), params("address = 'GPIB::1'"))
        .await
        .unwrap();

    for ch in 1..=OUTPUT_CHANNELS {
        let name = format!("ch{}_output", ch);
        dmm.set(&name, ch as f64).await.unwrap();
        assert_eq!(dmm.get(&name).await.unwrap(), ch as f64);
    }
}

#[tokio::test]
async fn example_rejects_unknown_parameter() {
    let dmm = ExampleFactory
        .build("dmm1".into(), params("address = 'GPIB::1'"))
        .await
        .unwrap();

    let err = dmm.get("ch5_output").await.unwrap_err();
    assert!(matches!(
        err,
        InstrumentError::UnknownParameter { ref instrument, ref parameter }
            if instrument == "dmm1" && parameter == "ch5_output"
    ));
}

#[tokio::test]
async fn build_fails_without_address() {
    let result = ExampleFactory
        .build("dmm1".into(), toml::Value::Table(Default::default()))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn signal_generator_realistic_mode_still_reads() {
    let gen = SignalGeneratorFactory
        .build(
            "dsgen".into(),
            params("amplitude = 0.0\noffset = -0.5\nmode = 'realistic'"),
        )
        .await
        .unwrap();
    assert_eq!(gen.get("wave").await.unwrap(), -0.5);
}

#[tokio::test]
async fn example_fail_after_injects_hardware_errors() {
    let dmm = ExampleFactory
        .build(
            "dmm1".into(),
            params("address = 'GPIB::1'\nfail_after = 2"),
        )
        .await
        .unwrap();

    assert!(dmm.get("ch1_output").await.is_ok());
    assert!(dmm.get("ch1_output").await.is_ok());
    match dmm.get("ch1_output").await {
        Err(InstrumentError::Driver(e)) => {
            assert_eq!(e.kind, DriverErrorKind::Hardware);
            assert_eq!(e.driver_type, "example");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    // writes are not counted
    assert!(dmm.set("ch1_output", 1.0).await.is_ok());
}

#[tokio::test]
async fn example_fail_rate_one_fails_every_operation() {
    let dmm = ExampleFactory
        .build(
            "dmm1".into(),
            params("address = 'GPIB::1'\nfail_rate = 1.0\nseed = 5"),
        )
        .await
        .unwrap();

    assert!(matches!(
        dmm.set("gain", 10.0).await,
        Err(InstrumentError::Driver(ref e)) if e.kind == DriverErrorKind::Hardware
    ));
    assert!(matches!(
        dmm.get("gain").await,
        Err(InstrumentError::Driver(_))
    ));
}

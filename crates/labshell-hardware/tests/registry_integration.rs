use std::sync::Arc;

use anyhow::{anyhow, Result};
use labshell_core::capabilities::Instrument;
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::{DriverErrorKind, InstrumentError};
use labshell_hardware::{construction_params, no_params, InstrumentRegistry};

struct BrokenFactory;

impl InstrumentFactory for BrokenFactory {
    fn instrument_type(&self) -> &'static str {
        "broken"
    }

    fn name(&self) -> &'static str {
        "Broken Factory"
    }

    fn validate(&self, _config: &toml::Value) -> Result<()> {
        Ok(())
    }

    fn build(
        &self,
        _name: String,
        _config: toml::Value,
    ) -> futures::future::BoxFuture<'static, Result<Arc<dyn Instrument>>> {
        Box::pin(async move { Err(anyhow!("bus not present")) })
    }
}

async fn scripted_registry() -> InstrumentRegistry {
    let registry = InstrumentRegistry::with_default_factories();
    let dmm = registry
        .create("dmm1", "example", construction_params([("address", "GPIB::1")]))
        .await
        .unwrap();
    let dsgen = registry
        .create("dsgen", "dummy_signal_generator", construction_params([("amplitude", 0.0)]))
        .await
        .unwrap();
    let combined = registry
        .create("combined", "virtual_composite", no_params())
        .await
        .unwrap();

    combined
        .add_variable_scaled("magnet", &dmm, "ch1_output", 0.02, -0.13, "mT")
        .unwrap();
    combined
        .add_variable_combined(
            "waveoffset",
            vec![dmm.term("ch2_output", 1.0, 0.0), dsgen.term("wave", 0.5, 0.0)],
            "%.04f",
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn scripted_session_creates_five_entities() {
    let registry = scripted_registry().await;
    assert_eq!(registry.names(), vec!["combined", "dmm1", "dsgen"]);

    let combined = registry.get("combined").unwrap();
    assert!(combined.is_composite());
    assert_eq!(
        combined.variable_names().unwrap(),
        vec!["magnet", "waveoffset"]
    );
    assert_eq!(
        combined.parameter("magnet").unwrap().units.as_deref(),
        Some("mT")
    );
}

#[tokio::test]
async fn scaled_variable_tracks_source() {
    let registry = scripted_registry().await;
    let dmm = registry.get("dmm1").unwrap();
    let combined = registry.get("combined").unwrap();

    for raw in [-10.0, -2.5, 0.0, 4.0, 10.0] {
        dmm.set("ch1_output", raw).await.unwrap();
        let magnet = combined.get("magnet").await.unwrap();
        assert!((magnet - (0.02 * raw - 0.13)).abs() < 1e-12, "raw={raw}");
    }
}

#[tokio::test]
async fn combined_variable_sums_terms() {
    let registry = scripted_registry().await;
    let dmm = registry.get("dmm1").unwrap();
    let dsgen = registry.get("dsgen").unwrap();
    let combined = registry.get("combined").unwrap();

    dmm.set("ch2_output", 3.0).await.unwrap();
    dsgen.set("offset", -1.0).await.unwrap();
    let value = combined.get("waveoffset").await.unwrap();
    assert!((value - (3.0 + 0.5 * -1.0)).abs() < 1e-12);
    assert_eq!(combined.format_value("waveoffset").await.unwrap(), "2.5000");
    assert!(matches!(
        combined.set("waveoffset", 0.0).await,
        Err(InstrumentError::ReadOnly { .. })
    ));
}

#[tokio::test]
async fn derived_variable_on_plain_instrument_is_unsupported() {
    let registry = scripted_registry().await;
    let dmm = registry.get("dmm1").unwrap();
    let dsgen = registry.get("dsgen").unwrap();
    assert!(matches!(
        dsgen.add_variable_scaled("magnet", &dmm, "ch1_output", 0.02, -0.13, "mT"),
        Err(InstrumentError::UnsupportedOperation { .. })
    ));
}

#[tokio::test]
async fn unknown_source_parameter_is_rejected() {
    let registry = scripted_registry().await;
    let dmm = registry.get("dmm1").unwrap();
    let combined = registry.get("combined").unwrap();
    assert!(matches!(
        combined.add_variable_scaled("field", &dmm, "ch5_output", 1.0, 0.0, "mT"),
        Err(InstrumentError::UnknownParameter { .. })
    ));
    assert!(matches!(
        combined.add_variable_combined("sum", vec![dmm.term("bogus", 1.0, 0.0)], ""),
        Err(InstrumentError::UnknownParameter { .. })
    ));
    assert_eq!(combined.variable_names().unwrap().len(), 2);
}

#[tokio::test]
async fn build_failure_is_driver_error() {
    let registry = InstrumentRegistry::new();
    registry.register_factory(Box::new(BrokenFactory));

    let err = registry.create("x", "broken", no_params()).await.unwrap_err();
    match err {
        InstrumentError::Driver(e) => {
            assert_eq!(e.kind, DriverErrorKind::Initialization);
            assert_eq!(e.driver_type, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!registry.contains("x"));
}

#[tokio::test]
async fn concurrent_creates_register_one_instance() {
    let registry = Arc::new(InstrumentRegistry::with_default_factories());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .create("dsgen", "dummy_signal_generator", no_params())
                .await
        }));
    }

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(InstrumentError::DuplicateName(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn removed_source_stays_alive_for_composite() {
    let registry = scripted_registry().await;
    let dmm = registry.remove("dmm1").unwrap();
    dmm.set("ch1_output", 1.0).await.unwrap();

    let combined = registry.get("combined").unwrap();
    let magnet = combined.get("magnet").await.unwrap();
    assert!((magnet - (0.02 - 0.13)).abs() < 1e-12);
}

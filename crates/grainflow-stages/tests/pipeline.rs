//! Integration test: the reference stages chained in one pipeline, driven
//! directly and through persisted settings.

use grainflow_core::{Category, DataArrayPath, ElementType};
use grainflow_engine::{EngineConfig, Pipeline, RunOutcome};
use grainflow_stage::{codes, PipelineSettings, StageRegistry};
use grainflow_stages::{
    register_builtin_stages, CreateDataArray, CreateDataContainer, FindNeighbors,
    FindVolumeFractions, MultiplyArrays, ScaleVolume,
};

fn cell(name: &str) -> DataArrayPath {
    DataArrayPath::new("Volume", Category::Cell, name)
}

fn build(ordered: bool) -> Pipeline {
    let mut container = CreateDataContainer::new("Volume", [3, 2, 1]);
    container.ensembles = 3;
    let phases = CreateDataArray::new(cell("Phases"), ElementType::Int32, 2.0);
    let ids = CreateDataArray::new(cell("GrainIds"), ElementType::Int32, 1.0);

    let mut pipeline = Pipeline::new();
    pipeline.push(container);
    if ordered {
        pipeline.push(phases);
        pipeline.push(FindVolumeFractions::new(cell("Phases")));
    } else {
        pipeline.push(FindVolumeFractions::new(cell("Phases")));
        pipeline.push(phases);
    }
    pipeline
        .push(ids)
        .push(FindNeighbors::new(cell("GrainIds")))
        .push(MultiplyArrays::new(
            cell("Phases"),
            cell("GrainIds"),
            cell("Product"),
        ))
        .push(ScaleVolume::new("Volume", [2.0, 2.0, 2.0]));
    pipeline
}

#[test]
fn full_chain_executes() {
    let mut pipeline = build(true);
    let preflight = pipeline.preflight();
    assert!(preflight.is_success(), "{:?}", preflight.messages);

    let report = pipeline.execute();
    assert!(report.is_success(), "{:?}", report.messages);

    let dc = pipeline.data().get("Volume").unwrap();
    let fractions = dc.array(Category::CellEnsemble, "VolumeFractions").unwrap();
    assert_eq!(fractions.as_slice::<f32>(), Some(&[0.0, 0.0, 1.0][..]));
    let counts = dc.array(Category::CellFeature, "NumNeighbors").unwrap();
    assert_eq!(counts.as_slice::<i32>(), Some(&[0, 0][..]));
    let product = dc.array(Category::Cell, "Product").unwrap();
    assert_eq!(product.as_slice::<f64>(), Some(&[2.0; 6][..]));
    assert_eq!(dc.geometry().spacing, [2.0, 2.0, 2.0]);
    dc.validate().unwrap();
}

#[test]
fn order_matters() {
    let pipeline = build(false);
    let report = pipeline.preflight();
    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            stage_index: 1,
            code: codes::MISSING_ARRAY
        }
    );
}

#[test]
fn persisted_pipeline_rebuilds_identically() {
    let mut registry = StageRegistry::new();
    register_builtin_stages(&mut registry).unwrap();

    let original = build(true);
    let json = original.to_settings().to_json().unwrap();
    let settings = PipelineSettings::from_json(&json).unwrap();
    let mut rebuilt = Pipeline::from_settings(&settings, &registry, EngineConfig::default()).unwrap();

    assert_eq!(rebuilt.len(), original.len());
    assert_eq!(rebuilt.to_settings(), original.to_settings());
    let report = rebuilt.execute();
    assert!(report.is_success(), "{:?}", report.messages);
    assert_eq!(rebuilt.data().get("Volume").unwrap().total_points(), 6);
}

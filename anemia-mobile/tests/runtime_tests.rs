use anemia_core::{Pipeline, PipelineConfig, Verdict};
use anemia_mobile::demo_artifacts;
use tempfile::TempDir;

#[test]
fn test_demo_artifacts_load() -> std::io::Result<()> {
    let dir = TempDir::new()?;
    let out = dir.path().join("nested").join("models");
    let (model, scaler) = demo_artifacts(&out)?;
    assert!(model.ends_with("anemia_model.json"));
    assert!(scaler.ends_with("scaler.json"));

    let pipeline = Pipeline::load(&PipelineConfig::in_dir(&out)).unwrap();
    assert_eq!(pipeline.evaluate(&[13.0, 4.5, 40.0, 28.0, 33.0]).unwrap(), Verdict::NoAnemia);
    Ok(())
}

#[test]
fn test_demo_artifacts_overwrite() -> std::io::Result<()> {
    let dir = TempDir::new()?;
    demo_artifacts(dir.path())?;
    demo_artifacts(dir.path())?;
    assert!(Pipeline::load(&PipelineConfig::in_dir(dir.path())).is_ok());
    Ok(())
}

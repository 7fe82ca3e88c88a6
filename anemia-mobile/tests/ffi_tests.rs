use anemia_mobile::*;
use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use tempfile::TempDir;

fn last_error() -> String {
    let ptr = anemia_last_error();
    assert!(!ptr.is_null());
    let msg = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
    anemia_string_free(ptr);
    msg
}

#[test]
fn ffi_load_predict_and_free() {
    let dir = TempDir::new().unwrap();
    let (model, scaler) = demo_artifacts(dir.path()).unwrap();
    let model = CString::new(model.to_str().unwrap()).unwrap();
    let scaler = CString::new(scaler.to_str().unwrap()).unwrap();

    let p = anemia_pipeline_load(model.as_ptr(), scaler.as_ptr());
    assert!(!p.is_null());

    let values = [13.0_f64, 4.5, 40.0, 28.0, 33.0];
    let mut verdict: c_int = -1;
    let status = anemia_predict(p, values.as_ptr(), values.len(), &mut verdict);
    assert_eq!(status, AnemiaStatus::Ok.code());
    assert_eq!(verdict, 0);

    let values = [9.0_f64, 3.5, 28.0, 23.0, 30.0];
    let status = anemia_predict(p, values.as_ptr(), values.len(), &mut verdict);
    assert_eq!(status, AnemiaStatus::Ok.code());
    assert_eq!(verdict, 1);
    assert!(anemia_last_error().is_null());

    anemia_pipeline_free(p);
}

#[test]
fn ffi_reports_request_errors_without_touching_verdict() {
    let dir = TempDir::new().unwrap();
    let (model, scaler) = demo_artifacts(dir.path()).unwrap();
    let model = CString::new(model.to_str().unwrap()).unwrap();
    let scaler = CString::new(scaler.to_str().unwrap()).unwrap();
    let p = anemia_pipeline_load(model.as_ptr(), scaler.as_ptr());
    assert!(!p.is_null());

    let mut verdict: c_int = -1;
    let values = [f64::NAN, 13.0, 40.0, 30.0, 33.0];
    let status = anemia_predict(p, values.as_ptr(), values.len(), &mut verdict);
    assert_eq!(status, AnemiaStatus::Incomplete.code());
    assert_eq!(verdict, -1);
    assert!(last_error().contains("HB"));

    let values = [-1.0, 13.0, 40.0, 30.0, 33.0];
    let status = anemia_predict(p, values.as_ptr(), values.len(), &mut verdict);
    assert_eq!(status, AnemiaStatus::OutOfDomain.code());

    let status = anemia_predict(p, values.as_ptr(), 3, &mut verdict);
    assert_eq!(status, AnemiaStatus::WrongArity.code());

    let status = anemia_predict(p, std::ptr::null(), 5, &mut verdict);
    assert_eq!(status, AnemiaStatus::InvalidArgument.code());

    anemia_pipeline_free(p);
}

#[test]
fn ffi_missing_artifact_returns_null_and_names_it() {
    let dir = TempDir::new().unwrap();
    let model = CString::new(dir.path().join("anemia_model.json").to_str().unwrap()).unwrap();
    let scaler = CString::new(dir.path().join("scaler.json").to_str().unwrap()).unwrap();

    let p = anemia_pipeline_load(model.as_ptr(), scaler.as_ptr());
    assert!(p.is_null());
    let msg = last_error();
    assert!(msg.starts_with("classifier artifact not found"), "{}", msg);

    assert!(anemia_pipeline_load(std::ptr::null(), scaler.as_ptr()).is_null());
    // Freeing null is a no-op.
    anemia_pipeline_free(p);
}

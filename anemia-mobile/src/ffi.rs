use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;

use anemia_core::{PipelineConfig, Pipeline};

use super::AnemiaStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = RefCell::new(None);
}

fn set_last_error(msg: String) {
    log::warn!("{}", msg);
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Opaque handle owning a loaded pipeline.
pub struct AnemiaPipeline {
    pipeline: Pipeline,
}

fn path_arg(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(ptr) };
    Some(PathBuf::from(cstr.to_string_lossy().into_owned()))
}

#[no_mangle]
pub extern "C" fn anemia_pipeline_load(
    model_path: *const c_char,
    scaler_path: *const c_char,
) -> *mut AnemiaPipeline {
    let (model_path, scaler_path) = match (path_arg(model_path), path_arg(scaler_path)) {
        (Some(m), Some(s)) => (m, s),
        _ => {
            set_last_error("model and scaler paths must not be null".to_string());
            return std::ptr::null_mut();
        }
    };
    let config = PipelineConfig {
        model_path,
        scaler_path,
        ..PipelineConfig::default()
    };
    match Pipeline::load(&config) {
        Ok(pipeline) => {
            clear_last_error();
            Box::into_raw(Box::new(AnemiaPipeline { pipeline }))
        }
        Err(e) => {
            set_last_error(e.to_string());
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "C" fn anemia_pipeline_free(pipeline: *mut AnemiaPipeline) {
    if !pipeline.is_null() {
        unsafe { drop(Box::from_raw(pipeline)); }
    }
}

/// Validate `len` values (HB, RBC, PCV, MCH, MCHC; NaN for a missing value)
/// and classify them. On success `out_verdict` receives 0 (no anemia) or
/// 1 (anemia).
#[no_mangle]
pub extern "C" fn anemia_predict(
    pipeline: *const AnemiaPipeline,
    values: *const f64,
    len: usize,
    out_verdict: *mut c_int,
) -> c_int {
    if pipeline.is_null() || values.is_null() || out_verdict.is_null() {
        set_last_error("pipeline, values and out_verdict must not be null".to_string());
        return AnemiaStatus::InvalidArgument.code();
    }
    let engine = unsafe { &*pipeline };
    let raw = unsafe { std::slice::from_raw_parts(values, len) };
    match engine.pipeline.evaluate(raw) {
        Ok(verdict) => {
            unsafe { *out_verdict = verdict.label() as c_int; }
            clear_last_error();
            AnemiaStatus::Ok.code()
        }
        Err(e) => {
            let status = AnemiaStatus::from(&e);
            set_last_error(e.to_string());
            status.code()
        }
    }
}

/// Message for the last failure on this thread, or null. Free it with
/// [`anemia_string_free`].
#[no_mangle]
pub extern "C" fn anemia_last_error() -> *mut c_char {
    LAST_ERROR.with(|e| match e.borrow().as_deref() {
        Some(msg) => CString::new(msg.replace('\0', " "))
            .map(CString::into_raw)
            .unwrap_or(std::ptr::null_mut()),
        None => std::ptr::null_mut(),
    })
}

#[no_mangle]
pub extern "C" fn anemia_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}

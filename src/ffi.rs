//! FFI bindings for Emoflux
//!
//! This module provides C-compatible functions for calling Emoflux from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `emoflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::DateTime;

use crate::aggregate::AggregationEngine;
use crate::classifier::TextClassifier;
use crate::error::FluxError;
use crate::persistence::FileBackend;
use crate::pipeline::{local_now, IngestionCoordinator};
use crate::store::{parse_log, EventStore};
use crate::types::{Emotion, Source};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Convert a JSON-producing result into a C string, recording any error
fn json_result_to_cstr(result: Result<String, FluxError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify text and return the classification result as JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `emoflux_free_string`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_classify_text(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let text_str = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return ptr::null_mut();
        }
    };

    let result = TextClassifier::classify(&text_str);
    json_result_to_cstr(serde_json::to_string(&result).map_err(FluxError::from))
}

/// Compute statistics for a JSON array of observations.
///
/// # Safety
/// - `observations_json` must be a valid null-terminated C string.
/// - `reference_time` is an RFC 3339 timestamp used as "now", or NULL for the
///   current local time.
/// - Returns a newly allocated string that must be freed with `emoflux_free_string`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_compute_statistics(
    observations_json: *const c_char,
    reference_time: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(observations_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid observations string pointer");
            return ptr::null_mut();
        }
    };

    let reference = if reference_time.is_null() {
        local_now()
    } else {
        let raw = match cstr_to_string(reference_time) {
            Some(s) => s,
            None => {
                set_last_error("Invalid reference time string pointer");
                return ptr::null_mut();
            }
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                set_last_error(&FluxError::InvalidTimestamp(format!("{raw}: {e}")).to_string());
                return ptr::null_mut();
            }
        }
    };

    let result = parse_log(&json_str).and_then(|observations| {
        let stats = AggregationEngine::compute(&observations, reference);
        serde_json::to_string(&stats).map_err(FluxError::from)
    });
    json_result_to_cstr(result)
}

// ============================================================================
// Stateful Store API
// ============================================================================

/// Opaque handle to a file-backed ingestion coordinator
pub struct EmofluxStoreHandle {
    coordinator: IngestionCoordinator<FileBackend>,
}

/// Open a file-backed event store in `dir`.
///
/// # Safety
/// - `dir` must be a valid null-terminated C string.
/// - `capacity` <= 0 selects the default capacity.
/// - Returns a pointer that must be freed with `emoflux_store_free`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_open(
    dir: *const c_char,
    capacity: i32,
) -> *mut EmofluxStoreHandle {
    clear_last_error();

    let dir_str = match cstr_to_string(dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid directory string pointer");
            return ptr::null_mut();
        }
    };

    let backend = match FileBackend::open(dir_str) {
        Ok(backend) => backend,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let store = if capacity <= 0 {
        EventStore::new(backend)
    } else {
        EventStore::with_capacity(backend, capacity as usize)
    };

    let handle = Box::new(EmofluxStoreHandle {
        coordinator: IngestionCoordinator::new(store),
    });
    Box::into_raw(handle)
}

/// Free a store handle.
///
/// # Safety
/// - `store` must be a valid pointer returned by `emoflux_store_open`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_free(store: *mut EmofluxStoreHandle) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Record an observation and return it as JSON.
///
/// # Safety
/// - `store` must be a valid pointer returned by `emoflux_store_open`.
/// - `emotion` and `source` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `emoflux_free_string`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_ingest(
    store: *mut EmofluxStoreHandle,
    emotion: *const c_char,
    confidence: f64,
    source: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return ptr::null_mut();
    }

    let handle = &mut *store;

    let emotion_str = match cstr_to_string(emotion) {
        Some(s) => s,
        None => {
            set_last_error("Invalid emotion string pointer");
            return ptr::null_mut();
        }
    };

    let source_str = match cstr_to_string(source) {
        Some(s) => s,
        None => {
            set_last_error("Invalid source string pointer");
            return ptr::null_mut();
        }
    };

    let result = emotion_str
        .parse::<Emotion>()
        .and_then(|emotion| Ok((emotion, source_str.parse::<Source>()?)))
        .and_then(|(emotion, source)| handle.coordinator.ingest(emotion, confidence, source))
        .and_then(|observation| serde_json::to_string(&observation).map_err(FluxError::from));
    json_result_to_cstr(result)
}

/// Export the full log as indented JSON.
///
/// # Safety
/// - `store` must be a valid pointer returned by `emoflux_store_open`.
/// - Returns a newly allocated string that must be freed with `emoflux_free_string`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_export(store: *mut EmofluxStoreHandle) -> *mut c_char {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return ptr::null_mut();
    }

    let handle = &*store;
    json_result_to_cstr(handle.coordinator.store().export())
}

/// Compute statistics over the full log as JSON.
///
/// # Safety
/// - `store` must be a valid pointer returned by `emoflux_store_open`.
/// - Returns a newly allocated string that must be freed with `emoflux_free_string`.
/// - Returns NULL on error; call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_statistics(store: *mut EmofluxStoreHandle) -> *mut c_char {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return ptr::null_mut();
    }

    let handle = &*store;
    let stats = handle.coordinator.statistics();
    json_result_to_cstr(serde_json::to_string(&stats).map_err(FluxError::from))
}

/// Remove every observation from the store.
///
/// # Safety
/// - `store` must be a valid pointer returned by `emoflux_store_open`.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `emoflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn emoflux_store_clear(store: *mut EmofluxStoreHandle) -> i32 {
    clear_last_error();

    if store.is_null() {
        set_last_error("Null store pointer");
        return -1;
    }

    let handle = &mut *store;

    match handle.coordinator.store_mut().clear() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Emoflux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Emoflux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn emoflux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Emoflux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn emoflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Emoflux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn emoflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        emoflux_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_classify_text() {
        let text = CString::new("I'm feeling absolutely wonderful today!").unwrap();

        unsafe {
            let json = take_string(emoflux_classify_text(text.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();

            assert_eq!(value["emotion"], "happy");
            assert_eq!(value["breakdown"]["happy"], 100);
        }
    }

    #[test]
    fn test_ffi_compute_statistics() {
        let observations = CString::new(
            r#"[
                {"id":"a","emotion":"sad","confidence":70,"timestamp":"2024-05-15T09:00:00+00:00","source":"text"},
                {"id":"b","emotion":"sad","confidence":50,"timestamp":"2024-05-14T09:00:00+00:00","source":"camera"}
            ]"#,
        )
        .unwrap();
        let reference = CString::new("2024-05-15T18:00:00+00:00").unwrap();

        unsafe {
            let json = take_string(emoflux_compute_statistics(
                observations.as_ptr(),
                reference.as_ptr(),
            ));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();

            assert_eq!(value["total_detections"], 2);
            assert_eq!(value["today_detections"], 1);
            assert_eq!(value["dominant_emotion"], "sad");
            assert_eq!(value["average_confidence"], 60);
            assert_eq!(value["hourly_activity"][9], 2);
        }
    }

    #[test]
    fn test_ffi_statistics_clamp_confidence() {
        let observations = CString::new(
            r#"[
                {"id":"a","emotion":"happy","confidence":250,"timestamp":"2024-05-15T09:00:00+00:00","source":"camera"},
                {"id":"b","emotion":"happy","confidence":-40,"timestamp":"2024-05-15T10:00:00+00:00","source":"camera"}
            ]"#,
        )
        .unwrap();
        let reference = CString::new("2024-05-15T18:00:00+00:00").unwrap();

        unsafe {
            let json = take_string(emoflux_compute_statistics(
                observations.as_ptr(),
                reference.as_ptr(),
            ));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();

            // 100 and 0 after clamping
            assert_eq!(value["average_confidence"], 50);
        }
    }

    #[test]
    fn test_ffi_bad_reference_time() {
        let observations = CString::new("[]").unwrap();
        let reference = CString::new("yesterday").unwrap();

        unsafe {
            let result = emoflux_compute_statistics(observations.as_ptr(), reference.as_ptr());
            assert!(result.is_null());

            let error = CStr::from_ptr(emoflux_last_error()).to_str().unwrap();
            assert!(error.contains("Invalid timestamp"));
        }
    }

    #[test]
    fn test_ffi_store_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CString::new(tmp.path().to_str().unwrap()).unwrap();
        let happy = CString::new("happy").unwrap();
        let camera = CString::new("camera").unwrap();

        unsafe {
            let store = emoflux_store_open(dir.as_ptr(), 0);
            assert!(!store.is_null());

            let observation = take_string(emoflux_store_ingest(
                store,
                happy.as_ptr(),
                82.0,
                camera.as_ptr(),
            ));
            assert!(observation.contains(r#""emotion":"happy""#));

            let stats = take_string(emoflux_store_statistics(store));
            let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
            assert_eq!(stats["total_detections"], 1);

            let exported = take_string(emoflux_store_export(store));
            assert!(exported.contains("\"source\": \"camera\""));

            assert_eq!(emoflux_store_clear(store), 0);
            assert_eq!(take_string(emoflux_store_export(store)), "[]");

            emoflux_store_free(store);
        }
    }

    #[test]
    fn test_ffi_ingest_rejects_unknown_label() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CString::new(tmp.path().to_str().unwrap()).unwrap();
        let bored = CString::new("bored").unwrap();
        let text = CString::new("text").unwrap();

        unsafe {
            let store = emoflux_store_open(dir.as_ptr(), 10);
            let result = emoflux_store_ingest(store, bored.as_ptr(), 50.0, text.as_ptr());
            assert!(result.is_null());

            let error = CStr::from_ptr(emoflux_last_error()).to_str().unwrap();
            assert!(error.contains("bored"));

            emoflux_store_free(store);
        }
    }

    #[test]
    fn test_ffi_null_store() {
        unsafe {
            assert!(emoflux_store_export(ptr::null_mut()).is_null());
            assert_eq!(emoflux_store_clear(ptr::null_mut()), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = emoflux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}

#![allow(non_snake_case)]

use super::*;
use std::mem::{offset_of, size_of};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
struct Pair {
    left: u64,
    right: u64,
}

unsafe impl RawMessage for Pair {}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn RbString___layout___len_then_data() {
    assert_eq!(offset_of!(RbString, len), 0);
    assert_eq!(offset_of!(RbString, data), size_of::<*const u8>().max(4));
    assert_eq!(size_of::<RbString>(), size_of::<RbBytes>());
}

#[test]
fn RbStringOwned___layout___len_data_capacity() {
    assert_eq!(offset_of!(RbStringOwned, len), 0);
    assert!(offset_of!(RbStringOwned, data) < offset_of!(RbStringOwned, capacity));
    assert_eq!(size_of::<RbStringOwned>(), size_of::<RbBytesOwned>());
}

#[test]
fn RbResponse___layout___header_fields_precede_data() {
    assert_eq!(offset_of!(RbResponse, error_code), 0);
    assert_eq!(offset_of!(RbResponse, len), 4);
    assert_eq!(offset_of!(RbResponse, capacity), 8);
    assert!(offset_of!(RbResponse, data) >= 12);
}

// ============================================================================
// Borrowed views
// ============================================================================

#[test]
fn RbString___none___is_absent() {
    let s = RbString::none();

    assert!(!s.is_present());
    assert!(s.is_empty());
    assert_eq!(unsafe { s.as_str() }.unwrap(), None);
}

#[test]
fn RbString___empty_c_string___is_present_empty() {
    let s = RbString::from_c_str(c"");

    assert!(s.is_present());
    assert!(s.is_empty());
    assert_eq!(unsafe { s.as_str() }.unwrap(), Some(""));
}

#[test]
fn RbString___from_c_str___excludes_terminator() {
    let s = RbString::from_c_str(c"hello");

    assert_eq!(s.len, 5);
    assert_eq!(unsafe { s.as_str() }.unwrap(), Some("hello"));
}

#[test]
fn RbString___invalid_utf8___is_ffi_error() {
    let raw = [0xFFu8, 0xFE, 0];
    let s = RbString {
        len: 2,
        data: raw.as_ptr(),
    };

    let err = unsafe { s.as_str() }.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Ffi);
}

#[test]
fn RbBytes___absent_and_empty___are_distinct() {
    let backing: [u8; 0] = [];
    let absent = RbBytes::none();
    let empty = RbBytes::from_slice(&backing).unwrap();

    assert_eq!(unsafe { absent.as_slice() }, None);
    assert_eq!(unsafe { empty.as_slice() }, Some(&[][..]));
}

#[test]
fn RbBytes___from_slice___borrows_in_place() {
    let data = [0xDE, 0xAD, 0xBE, 0xEF];

    let b = RbBytes::from_slice(&data).unwrap();

    assert_eq!(b.data, data.as_ptr());
    assert_eq!(unsafe { b.as_slice() }, Some(&data[..]));
}

#[test]
fn RbBytes___as_slice___outlives_the_view() {
    let data = vec![7u8, 8, 9];

    let bytes = {
        let view = RbBytes::from_slice(&data).unwrap();
        unsafe { view.as_slice() }
    };

    assert_eq!(bytes, Some(&data[..]));
}

#[test]
fn RbString___as_str___outlives_the_view() {
    let mut owned = RbStringOwned::from_slice("kept").unwrap();

    let text = unsafe { owned.as_borrowed().as_str() }.unwrap();

    assert_eq!(text, Some("kept"));
    assert!(owned.release());
}

// ============================================================================
// Owned buffers
// ============================================================================

#[test]
fn RbStringOwned___from_slice___is_null_terminated() {
    let mut s = RbStringOwned::from_slice("owned").unwrap();

    assert_eq!(s.len, 5);
    assert!(s.capacity as usize > s.len as usize);
    assert_eq!(unsafe { *s.data.add(5) }, 0);
    assert_eq!(unsafe { s.as_borrowed().as_str() }.unwrap(), Some("owned"));

    assert!(s.release());
}

#[test]
fn RbStringOwned___release___nulls_fields_and_detects_second_release() {
    let mut s = RbStringOwned::from_slice("twice").unwrap();
    let copy = RbStringOwned {
        len: s.len,
        data: s.data,
        capacity: s.capacity,
    };

    assert!(s.release());
    assert!(s.data.is_null());
    assert_eq!((s.len, s.capacity), (0, 0));

    let mut stale = copy;
    assert!(!stale.release());
}

#[test]
fn RbStringOwned___none___release_is_noop() {
    let mut s = RbStringOwned::none();

    assert!(!s.is_present());
    assert!(s.release());
}

#[test]
fn RbBytesOwned___empty_slice___is_present_empty() {
    let mut b = RbBytesOwned::from_slice(&[]).unwrap();

    assert!(b.is_present());
    assert_eq!(b.len, 0);
    assert_eq!(unsafe { b.as_borrowed().as_slice() }, Some(&[][..]));

    assert!(b.release());
}

#[test]
fn RbBytesOwned___release___returns_memory_to_ledger() {
    let mut b = RbBytesOwned::from_slice(&[1, 2, 3]).unwrap();
    let address = b.data;

    assert!(AllocationLedger::global().contains(address));
    assert!(b.release());
    assert!(!AllocationLedger::global().contains(address));
}

// ============================================================================
// Response envelope
// ============================================================================

#[test]
fn RbResponse___success___payload_is_aligned_copy() {
    let pair = Pair { left: 7, right: 9 };
    let mut response = RbResponse::success(&pair.to_bytes());

    assert!(!response.is_error());
    assert_eq!(response.code(), ErrorCode::None);
    assert_eq!(response.len as usize, size_of::<Pair>());
    assert_eq!(response.data as usize % std::mem::align_of::<Pair>(), 0);
    assert_eq!(unsafe { response.read::<Pair>() }.unwrap(), pair);
    let cast = unsafe { &*(response.data as *const Pair) };
    assert_eq!(*cast, pair);

    assert!(response.release());
}

#[test]
fn RbResponse___success_empty___is_present_empty() {
    let mut response = RbResponse::success(&[]);

    assert!(!response.data.is_null());
    assert_eq!(response.len, 0);
    assert_eq!(unsafe { response.payload() }, Some(&[][..]));

    assert!(response.release());
}

#[test]
fn RbResponse___error___carries_null_terminated_message() {
    let mut response = RbResponse::from_error(&PluginError::UnknownMessage(42));

    assert!(response.is_error());
    assert_eq!(response.code(), ErrorCode::UnknownMessage);
    assert_eq!(
        unsafe { response.error_message() }.as_deref(),
        Some("no handler for id 42")
    );
    let c_str = unsafe { CStr::from_ptr(response.data as *const std::ffi::c_char) };
    assert_eq!(c_str.to_bytes().len(), response.len as usize);
    assert_eq!(unsafe { response.payload() }, None);

    assert!(response.release());
}

#[test]
fn RbResponse___to_result___round_trips_error_kind() {
    let mut response = RbResponse::from_error(&PluginError::Handler("boom".into()));

    let err = unsafe { response.to_result() }.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Handler);
    assert!(err.to_string().contains("boom"));
    response.release();
}

#[test]
fn RbResponse___from_result___selects_branch() {
    let mut ok = RbResponse::from_result(Ok(vec![1, 2]));
    let mut failed = RbResponse::from_result(Err(PluginError::Timeout));

    assert_eq!(unsafe { ok.to_result() }.unwrap(), vec![1, 2]);
    assert_eq!(failed.code(), ErrorCode::Timeout);

    ok.release();
    failed.release();
}

#[test]
fn RbResponse___release_twice___second_is_detected() {
    let mut response = RbResponse::success(b"data");
    let mut duplicate = RbResponse {
        error_code: response.error_code,
        len: response.len,
        capacity: response.capacity,
        data: response.data,
    };

    assert!(response.release());
    assert!(!duplicate.release());
    assert!(duplicate.data.is_null());
}

#[test]
fn RbResponse___empty___release_is_noop() {
    let mut response = RbResponse::default();

    assert!(response.release());
    assert_eq!(response.error_code, 0);
}

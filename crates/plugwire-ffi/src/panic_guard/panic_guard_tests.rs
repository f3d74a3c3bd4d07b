#![allow(non_snake_case)]

use super::*;
use plugwire_core::ErrorCode;

#[test]
fn catch_panic___successful_function___returns_value() {
    let result = catch_panic(None, || 42);

    assert_eq!(result.unwrap(), 42);
}

#[test]
fn catch_panic___str_payload___becomes_internal_error() {
    let result: Result<(), PluginError> = catch_panic(None, || panic!("str panic"));

    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(err.to_string(), "internal error: plugin panicked: str panic");
}

#[test]
fn catch_panic___formatted_payload___keeps_message() {
    let detail = 7;
    let result: Result<(), PluginError> = catch_panic(None, || panic!("formatted {detail}"));

    assert!(result.unwrap_err().to_string().contains("formatted 7"));
}

#[test]
fn catch_panic___custom_payload___reports_unknown() {
    let result: Result<(), PluginError> =
        catch_panic(None, || std::panic::panic_any(3.5_f64));

    assert!(result.unwrap_err().to_string().contains("unknown payload"));
}

#[test]
fn catch_panic___unknown_handle___still_converts() {
    let result: Result<(), PluginError> =
        catch_panic(Some(HandleId::from_raw(0xFFFF_0000_0001)), || panic!("orphan"));

    assert_eq!(result.unwrap_err().code(), ErrorCode::Internal);
}

#[test]
fn install_panic_hook___repeated_calls___are_harmless() {
    install_panic_hook();
    install_panic_hook();

    let result: Result<(), PluginError> = catch_panic(None, || panic!("after hook"));

    assert!(result.is_err());
}

//! Custom assertion helpers for tests.
#![allow(dead_code)]

use tracing::error;

#[must_use]
pub fn assert_json_has_fields(json_str: &str, fields: &[&str]) -> serde_json::Value {
    let value: serde_json::Value =
        serde_json::from_str(json_str).expect("invalid JSON payload");
    for field in fields {
        if value.get(field).is_none() {
            error!(field, json = %value, "Missing expected JSON field");
            panic!("Missing JSON field: {field}");
        }
    }
    value
}

pub fn assert_json_array_len(json_str: &str, len: usize) {
    let value: serde_json::Value =
        serde_json::from_str(json_str).expect("invalid JSON payload");
    let array = value.as_array().expect("JSON value is not an array");
    if array.len() != len {
        error!(expected = len, actual = array.len(), "Unexpected JSON array length");
        panic!("Expected array length {len}, got {}", array.len());
    }
}

pub fn assert_no_ansi(output: &str) {
    if output.contains("\u{1b}[") {
        error!("ANSI escape sequence detected");
        panic!("Expected no ANSI escape sequences");
    }
}

pub fn assert_contains_all(output: &str, expected: &[&str]) {
    for needle in expected {
        if !output.contains(needle) {
            error!(needle, "Missing expected substring");
            panic!("Missing expected substring: {needle}");
        }
    }
}

/// Assert `needles` appear in `output` in the given order.
pub fn assert_in_order(output: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        match output[from..].find(needle) {
            Some(at) => from += at + needle.len(),
            None => {
                error!(needle, "Substring missing or out of order");
                panic!("Expected \"{needle}\" after byte {from} in:\n{output}");
            }
        }
    }
}

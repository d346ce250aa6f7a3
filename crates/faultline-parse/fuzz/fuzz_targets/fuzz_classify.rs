// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Fuzz target for failure classification and crash detection

#![no_main]

use libfuzzer_sys::fuzz_target;

use faultline_parse::classify;
use faultline_parse::detect_crash;

fuzz_target!(|data: &[u8]| {
    let output = String::from_utf8_lossy(data);

    let _ = classify::detect_kind(&output);
    let _ = classify::extract_location(&output);
    let _ = classify::extract_stack_trace(&output);
    assert!(!classify::extract_error_message(&output).is_empty());
    let _ = detect_crash(&output, false);
});

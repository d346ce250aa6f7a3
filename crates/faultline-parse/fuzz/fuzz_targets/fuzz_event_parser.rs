// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Fuzz target for the structured event parser

#![no_main]

use libfuzzer_sys::fuzz_target;

use faultline_parse::{EventParser, ParserOptions, StreamParser};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let parser = EventParser::new(ParserOptions::default().with_max_output_bytes(4096));

    for line in input.lines() {
        parser.process_line(line);
    }

    let _ = parser.flush();
    let _ = parser.stats();
});

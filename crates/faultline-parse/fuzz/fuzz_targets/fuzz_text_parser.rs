// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Fuzz target for the plain-text parser

#![no_main]

use libfuzzer_sys::fuzz_target;

use faultline_parse::{ParserOptions, StreamParser, TextParser};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let parser = TextParser::new(ParserOptions::default());

        for line in input.lines() {
            parser.process_line(line);
        }

        let _ = parser.flush();
    }
});

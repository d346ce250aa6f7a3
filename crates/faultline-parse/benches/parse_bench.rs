// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use faultline_parse::{ParseMode, ParserOptions, new_parser};

/// A structured stream of `tests` tests, one in ten failing
fn structured_stream(tests: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(tests * 4);
    for i in 0..tests {
        let test = format!("TestCase{i}");
        lines.push(format!(r#"{{"Action":"run","Package":"bench/p","Test":"{test}"}}"#));
        lines.push(format!(
            r#"{{"Action":"output","Package":"bench/p","Test":"{test}","Output":"=== RUN   {test}\n"}}"#
        ));
        if i % 10 == 0 {
            lines.push(format!(
                r#"{{"Action":"output","Package":"bench/p","Test":"{test}","Output":"    case_test.go:{i}: mismatch\n"}}"#
            ));
            lines.push(format!(
                r#"{{"Action":"fail","Package":"bench/p","Test":"{test}","Elapsed":0.01}}"#
            ));
        } else {
            lines.push(format!(
                r#"{{"Action":"pass","Package":"bench/p","Test":"{test}","Elapsed":0.01}}"#
            ));
        }
    }
    lines
}

fn text_stream(tests: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(tests * 3);
    for i in 0..tests {
        if i % 10 == 0 {
            lines.push(format!("--- FAIL: TestCase{i} (0.01s)"));
            lines.push(format!("    case_test.go:{i}: mismatch"));
        } else {
            lines.push(format!("--- PASS: TestCase{i} (0.01s)"));
        }
    }
    lines.push("FAIL\tbench/p\t1.0s".to_string());
    lines
}

fn parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for tests in [100, 1_000, 10_000] {
        for (mode, lines) in [
            (ParseMode::Structured, structured_stream(tests)),
            (ParseMode::Text, text_stream(tests)),
        ] {
            group.throughput(Throughput::Elements(lines.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), tests),
                &lines,
                |b, lines| {
                    b.iter(|| {
                        let parser = new_parser(mode, ParserOptions::default());
                        for line in lines {
                            parser.process_line(line);
                        }
                        std::hint::black_box(parser.flush())
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, parse_benchmark);
criterion_main!(benches);

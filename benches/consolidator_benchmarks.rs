//! Consolidator benchmark suite.
//!
//! Benchmarks for key operations:
//! - Delimited table parsing throughput
//! - Schema reconciliation of drifting tables
//! - Size-bounded part writing

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::path::Path;


use consolidator::schema::{GroupAccumulator, GroupTable};
use consolidator::sink::{OutputBase, PartWriterConfig, write_table};
use consolidator::source::reader::parse_table;
use consolidator::source::{Delimiter, GroupKey, SourcePeriod};

/// Benchmarks for delimited parsing.
fn table_parsing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_parsing");

    for size in [1000, 10000, 100000] {
        let text = bench_utils::generate_delimited(size);

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_pipe", size), &text, |b, text| {
            b.iter(|| parse_table(text, Delimiter::Pipe, Path::new("bench.csv")).unwrap());
        });
    }

    group.finish();
}

/// Merge twelve monthly tables, alternating between two column layouts.
fn merge_year(tables: &[consolidator::source::LoadedTable]) -> GroupTable {
    let mut accumulator = GroupAccumulator::new(GroupKey::new("bench").unwrap());
    for (month, table) in tables.iter().enumerate() {
        let period = SourcePeriod::parse(&format!("2024{:02}", month + 1)).unwrap();
        accumulator.append(&period, table.clone());
    }
    accumulator.finish().table
}

/// Benchmarks for schema reconciliation.
fn reconciliation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for rows_per_file in [1000, 10000] {
        let tables: Vec<_> = (0..12)
            .map(|month| bench_utils::generate_table(rows_per_file, month % 2 == 1))
            .collect();

        group.throughput(Throughput::Elements((rows_per_file * 12) as u64));
        group.bench_with_input(
            BenchmarkId::new("append_drifting", rows_per_file),
            &tables,
            |b, tables| {
                b.iter(|| merge_year(tables));
            },
        );
    }

    group.finish();
}

/// Benchmarks for part writing.
fn part_writing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("part_writing");
    let tables: Vec<_> = (0..12)
        .map(|month| bench_utils::generate_table(10000, month % 2 == 1))
        .collect();
    let table = merge_year(&tables);

    for max_part_mb in [1u64, 4, 64] {
        let temp = tempfile::TempDir::new().unwrap();
        let config = PartWriterConfig::default()
            .with_chunk_rows(10000)
            .with_max_part_size(max_part_mb * 1024 * 1024);

        group.throughput(Throughput::Elements(table.row_count() as u64));
        group.bench_with_input(
            BenchmarkId::new("write_table", max_part_mb),
            &table,
            |b, table| {
                b.iter(|| {
                    let base =
                        OutputBase::for_group(temp.path(), "bench", "20240101_000000", "csv");
                    write_table(table, base, config.clone()).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    table_parsing_benchmarks,
    reconciliation_benchmarks,
    part_writing_benchmarks,
);
criterion_main!(benches);

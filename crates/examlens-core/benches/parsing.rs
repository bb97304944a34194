use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examlens_core::parser::{extract_numbers, parse_marks_list, ScoreTable};

fn bench_extract_numbers(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_numbers");

    let short = "Roll 12: scored 87.5 out of 100";
    let page = {
        let mut s = String::new();
        for i in 0..200 {
            s.push_str(&format!("Student {i} obtained {} marks in paper {}\n", i % 101, i % 7));
        }
        s
    };

    group.bench_function("short", |b| b.iter(|| extract_numbers(black_box(short))));
    group.bench_function("200_lines", |b| b.iter(|| extract_numbers(black_box(&page))));

    group.finish();
}

fn bench_marks_list(c: &mut Criterion) {
    let list: String = (0..500)
        .map(|i| (i % 100).to_string())
        .collect::<Vec<_>>()
        .join(", ");

    c.bench_function("parse_marks_list_500", |b| {
        b.iter(|| parse_marks_list(black_box(&list)))
    });
}

fn bench_csv_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_tables");

    let small = generate_csv(30, 3);
    let large = generate_csv(1_000, 8);

    group.bench_function("30x3", |b| b.iter(|| ScoreTable::parse_str(black_box(&small))));
    group.bench_function("1000x8", |b| b.iter(|| ScoreTable::parse_str(black_box(&large))));

    group.finish();
}

fn generate_csv(rows: usize, subjects: usize) -> String {
    let mut s = String::from("Name");
    for j in 0..subjects {
        s.push_str(&format!(",Subject {j}"));
    }
    s.push('\n');
    for i in 0..rows {
        s.push_str(&format!("Student {i}"));
        for j in 0..subjects {
            s.push_str(&format!(",{}", (i * 7 + j * 13) % 101));
        }
        s.push('\n');
    }
    s
}

criterion_group!(benches, bench_extract_numbers, bench_marks_list, bench_csv_tables);
criterion_main!(benches);

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailextract::model::message::{CanonicalMessage, MessageDate};
use mailextract::plan::{sanitize_component, NameRegistry, PathPlanner};
use mailextract::write::OutputFormat;

fn bench_sanitize(c: &mut Criterion) {
    let subjects = [
        "Re: Fwd: Q3 <draft> \"final\" report?",
        "   lots   of\twhitespace\r\n and control\u{7} characters   ",
        "日本語のメール件名はとても長いのでここで切られる可能性があります",
        "CON",
    ];

    c.bench_function("sanitize_subjects", |b| {
        b.iter(|| {
            subjects
                .iter()
                .map(|s| sanitize_component(s, 120, "No Subject").len())
                .sum::<usize>()
        })
    });
}

fn bench_plan_duplicates(c: &mut Criterion) {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("bench-planning-nonexistent");
    let message = CanonicalMessage {
        subject: "Status".into(),
        date: MessageDate::Known(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()),
        ..Default::default()
    };
    let planner = PathPlanner::new(OutputFormat::Both);

    c.bench_function("plan_100_colliding_messages", |b| {
        b.iter(|| {
            let mut registry = NameRegistry::new();
            (0..100)
                .map(|_| planner.plan(&message, &dir, &mut registry).stem.len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_sanitize, bench_plan_duplicates);
criterion_main!(benches);

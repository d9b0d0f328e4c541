//! Rendering benchmarks: named templates, the default envelope, and text derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use mailq_core::TemplateData;
use mailq_templates::{render_default, render_template, strip_html, TemplateName};

fn sample_data() -> TemplateData {
    [
        ("firstName", json!("Ada")),
        ("newRole", json!("admin")),
        ("date", json!("2026-10-18")),
        ("loginUrl", json!("https://accucoder.example/login")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn bench_render(c: &mut Criterion) {
    let data = sample_data();
    let message = "Line one\nLine two\n".repeat(20);

    c.bench_function("render_template/role_changed", |b| {
        b.iter(|| render_template(black_box(TemplateName::RoleChanged), black_box(&data)))
    });

    c.bench_function("render_default", |b| {
        b.iter(|| render_default(black_box("Quarterly update"), black_box(&message), 2026))
    });

    let html = render_default("Quarterly update", &message, 2026);
    c.bench_function("strip_html/default_envelope", |b| {
        b.iter(|| strip_html(black_box(&html)))
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);

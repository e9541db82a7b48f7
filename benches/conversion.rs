//! Benchmarks for the conversion pipeline.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use bbx::dom::{parse_bytes, to_string};
use bbx::parse::SourceFormat;
use bbx::{ConversionConfig, ConversionContext};

const NIMAS_BYTES: &[u8] = include_bytes!("../tests/fixtures/sample-nimas.xml");

/// The sample chapter repeated until the source is big enough to time.
fn large_source() -> Vec<u8> {
    let sample = String::from_utf8_lossy(NIMAS_BYTES);
    let (Some(start), Some(end)) = (sample.find("<level1"), sample.find("</level1>")) else {
        return NIMAS_BYTES.to_vec();
    };
    let chapter = &sample[start..end + "</level1>".len()];
    let chapters = chapter.repeat(200);
    sample
        .replacen(chapter, &chapters, 1)
        .into_bytes()
}

fn context() -> ConversionContext {
    ConversionContext::new(ConversionConfig {
        validate: false,
        ..ConversionConfig::default()
    })
    .unwrap()
}

// ============================================================================
// Stage Benchmarks
// ============================================================================

fn bench_parse_source(c: &mut Criterion) {
    let source = large_source();

    c.bench_function("parse_source", |b| {
        b.iter(|| parse_bytes(&source).unwrap());
    });
}

fn bench_translate(c: &mut Criterion) {
    let ctx = context();
    let src = parse_bytes(&large_source()).unwrap();
    let parser = ctx.parser(SourceFormat::Nimas);

    c.bench_function("translate", |b| {
        b.iter(|| parser.translate(&src).unwrap());
    });
}

fn bench_fix(c: &mut Criterion) {
    let ctx = context();
    let src = parse_bytes(&large_source()).unwrap();
    let raw = ctx.parser(SourceFormat::Nimas).translate(&src).unwrap();

    c.bench_function("fix", |b| {
        b.iter(|| {
            let mut dom = raw.clone();
            ctx.engine().run(&mut dom).unwrap()
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let ctx = context();
    let conversion = bbx::convert_bytes(&large_source(), &ctx).unwrap();
    let validator = ctx.validator().enabled(true);

    c.bench_function("validate", |b| {
        b.iter(|| validator.validate(&conversion.dom).unwrap());
    });
}

// ============================================================================
// End-to-end Benchmarks
// ============================================================================

fn bench_convert(c: &mut Criterion) {
    let ctx = context();
    let source = large_source();

    c.bench_function("convert", |b| {
        b.iter(|| bbx::convert_bytes(&source, &ctx).unwrap());
    });
}

fn bench_serialize(c: &mut Criterion) {
    let ctx = context();
    let conversion = bbx::convert_bytes(&large_source(), &ctx).unwrap();

    c.bench_function("serialize", |b| {
        b.iter(|| to_string(&conversion.dom).unwrap());
    });
}

criterion_group!(
    benches,
    // Stages
    bench_parse_source,
    bench_translate,
    bench_fix,
    bench_validate,
    // End to end
    bench_convert,
    bench_serialize,
);
criterion_main!(benches);

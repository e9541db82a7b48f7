//! Conversion entry points.
//!
//! A conversion runs source tree → parser stage → fixer engine → validator.
//! Batch conversion spreads independent documents over worker threads that
//! share one [`ConversionContext`].

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::context::ConversionContext;
use crate::dom::{self, Dom};
use crate::error::Result;
use crate::fix::FixReport;
use crate::import;
use crate::parse::SourceFormat;
use crate::upgrade::{self, UpgradeReport};

/// A finished canonical document and how it was produced.
#[derive(Debug)]
pub struct Conversion {
    pub dom: Dom,
    pub report: ConversionReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub format: SourceFormat,
    pub fix: FixReport,
    /// Node count of the canonical tree.
    pub nodes: usize,
}

/// Convert an already-loaded source tree.
pub fn convert(src: &Dom, ctx: &ConversionContext) -> Result<Conversion> {
    let format = ctx.detect_format(src)?;
    let mut dom = ctx.parser(format).translate(src)?;
    let fix = ctx.engine().run(&mut dom)?;
    ctx.validator().validate(&dom)?;

    let report = ConversionReport {
        format,
        fix,
        nodes: dom.node_count(),
    };
    Ok(Conversion { dom, report })
}

/// Convert a source document held in memory (XML or a zipped EPUB).
pub fn convert_bytes(bytes: &[u8], ctx: &ConversionContext) -> Result<Conversion> {
    let src = import::load_bytes(bytes)?;
    convert(&src, ctx)
}

/// Convert a source document on disk.
pub fn convert_file<P: AsRef<Path>>(path: P, ctx: &ConversionContext) -> Result<Conversion> {
    let path = path.as_ref();
    let start = Instant::now();
    let src = import::load(path)?;
    let conversion = convert(&src, ctx)?;
    info!(
        input = %path.display(),
        format = %conversion.report.format,
        rewrites = conversion.report.fix.total_applied(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "converted document"
    );
    Ok(conversion)
}

/// Load an existing canonical document and bring it to the current version.
pub fn upgrade_file<P: AsRef<Path>>(path: P, ctx: &ConversionContext) -> Result<(Dom, UpgradeReport)> {
    let path = path.as_ref();
    let mut dom = dom::parse_bytes(&std::fs::read(path)?)?;
    let report = upgrade::upgrade(&mut dom, ctx)?;
    info!(
        input = %path.display(),
        from = report.from,
        to = report.to,
        "upgraded document"
    );
    Ok((dom, report))
}

/// Write a canonical document to disk.
pub fn write_file<P: AsRef<Path>>(dom: &Dom, path: P) -> Result<()> {
    let file = File::create(path)?;
    dom::write_to(dom, BufWriter::new(file))
}

/// Outcome of one document in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<ConversionReport>,
}

/// Convert `inputs` into `out_dir` as `<stem>.bbx`, using `jobs` worker
/// threads (at least one). Results come back in input order; a failed
/// document does not stop the others. Inputs sharing a stem get numbered
/// outputs (`book.bbx`, `book-2.bbx`, ...).
pub fn convert_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    jobs: usize,
    ctx: &ConversionContext,
) -> Result<Vec<BatchItem>> {
    std::fs::create_dir_all(out_dir)?;

    let outputs = output_paths(out_dir, inputs);
    let jobs = jobs.clamp(1, inputs.len().max(1));
    let next = AtomicUsize::new(0);
    let results = Mutex::new(Vec::with_capacity(inputs.len()));

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| {
                loop {
                    let idx = next.fetch_add(1, Ordering::Relaxed);
                    let Some(input) = inputs.get(idx) else {
                        break;
                    };
                    let output = outputs[idx].clone();
                    let result = convert_file(input, ctx).and_then(|conversion| {
                        write_file(&conversion.dom, &output)?;
                        Ok(conversion.report)
                    });
                    if let Err(e) = &result {
                        warn!(input = %input.display(), error = %e, "conversion failed");
                    }
                    let item = BatchItem {
                        input: input.clone(),
                        output,
                        result,
                    };
                    if let Ok(mut results) = results.lock() {
                        results.push((idx, item));
                    }
                }
            });
        }
    });

    let mut results = results.into_inner().unwrap_or_else(|e| e.into_inner());
    results.sort_by_key(|(idx, _)| *idx);
    let items: Vec<_> = results.into_iter().map(|(_, item)| item).collect();

    let failed = items.iter().filter(|i| i.result.is_err()).count();
    info!(documents = items.len(), failed, jobs, "batch finished");
    Ok(items)
}

/// One distinct output path per input, in input order.
fn output_paths(out_dir: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            let mut name = format!("{stem}.bbx");
            let mut n = 1;
            while !taken.insert(name.clone()) {
                n += 1;
                name = format!("{stem}-{n}.bbx");
            }
            if n > 1 {
                warn!(input = %input.display(), output = %name, "output name already taken");
            }
            out_dir.join(name)
        })
        .collect()
}

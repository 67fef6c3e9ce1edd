//! Batch orchestration for `batch_resize`.
//!
//! Items are independent pipelines against the same source. The output
//! directory is created once, up front; after that each item either
//! succeeds, fails, or (under `fail_fast`) is skipped, and the report lists
//! every item in request order regardless of how many ran at once.
//!
//! With `max_parallel = 1` items run strictly one after another. Larger
//! values run items on a dedicated rayon pool of that many threads (capped
//! at the core count), which bounds peak decode/encode memory.

use crate::catalog::BatchResizeParams;
use crate::config::{BatchConfig, effective_threads};
use crate::error::DispatchError;
use crate::imaging::ImageBackend;
use crate::outcome::{BatchItemReport, BatchReport, ItemStatus};
use crate::paths::ensure_dir;
use crate::pipeline::BatchItem;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn run_batch<B: ImageBackend>(
    backend: &B,
    params: &BatchResizeParams,
    items: Vec<BatchItem<'_>>,
    config: &BatchConfig,
) -> Result<BatchReport, DispatchError> {
    ensure_dir(&params.output_dir)?;

    let threads = effective_threads(config);
    let aborted = AtomicBool::new(false);
    let run = |item: &BatchItem<'_>| run_item(backend, item, config.fail_fast, &aborted);

    let reports: Vec<BatchItemReport> = if threads > 1 {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| items.par_iter().map(run).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "could not start batch thread pool, running sequentially");
                items.iter().map(run).collect()
            }
        }
    } else {
        items.iter().map(run).collect()
    };

    Ok(BatchReport::new(reports))
}

fn run_item<B: ImageBackend>(
    backend: &B,
    item: &BatchItem<'_>,
    fail_fast: bool,
    aborted: &AtomicBool,
) -> BatchItemReport {
    let destination = &item.pipeline.destination;
    if fail_fast && aborted.load(Ordering::SeqCst) {
        tracing::debug!(output = %destination.display(), "skipped after earlier failure");
        return BatchItemReport::new(item.spec, destination, ItemStatus::Skipped, None);
    }

    tracing::debug!(
        suffix = %item.spec.suffix,
        pipeline = %item.pipeline.describe(),
        "batch item"
    );
    match backend.execute(&item.pipeline) {
        Ok(()) => BatchItemReport::new(item.spec, destination, ItemStatus::Ok, None),
        Err(e) => {
            aborted.store(true, Ordering::SeqCst);
            let err = DispatchError::from(e);
            tracing::warn!(output = %destination.display(), error = %err, "batch item failed");
            BatchItemReport::new(item.spec, destination, ItemStatus::Failed, Some(err.to_string()))
        }
    }
}

//! Watch mode: process everything already in the input directory, then
//! keep converting files as they appear.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use notify::{EventKind, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::processor::Processor;

pub fn watch_dir(processor: &Processor, input_dir: &Path, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    processor.process_dir(input_dir)?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("create watcher")?;
    watcher
        .watch(input_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watch dir {}", input_dir.display()))?;

    while !stop.load(Ordering::Relaxed) {
        let event = match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                warn!(error = %e, "file watcher error");
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }
        for path in event.paths {
            if !path.is_file() {
                continue;
            }
            // a create event may fire while the file is still being
            // written; give the writer a moment to finish
            if std::fs::File::open(&path).is_err() {
                debug!(path = %path.display(), "file not readable yet, waiting");
                std::thread::sleep(Duration::from_secs(1));
            }
            if let Err(e) = processor.process_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to process file");
            }
        }
    }
    Ok(())
}

//! Page processing strategies.
//!
//! Pages share no state, so they can be interpreted on any thread. Two
//! strategies are provided:
//! - Sequential (baseline, supports early termination on a row limit)
//! - Channel-pipeline (reader thread, worker threads, writer on the caller's
//!   thread with a reorder buffer so output order matches input order)

use crate::dump::{extract_page, scan_pages, split_language_sections, PageFilter, SkipReason};
use crate::error::Result;
use crate::interpreter::interpret_page;
use crate::output::RowWriter;
use crate::record::EtymologyRow;
use crate::tables::Tables;

use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: usize = 1000;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads for the pipeline
    pub num_workers: usize,
    /// Bound of the page and result channels
    pub channel_buffer: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
        Self {
            num_workers: cpus.saturating_sub(1).max(1),
            channel_buffer: 10000,
        }
    }
}

/// Early-termination limits for trial runs
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Stop after this many rows are written
    pub rows: Option<usize>,
    /// Stop reading after this many pages
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub pages_read: usize,
    pub skipped_namespace: usize,
    pub skipped_redirect: usize,
    pub skipped_meta: usize,
    pub skipped_malformed: usize,
    pub sections_interpreted: usize,
    pub sections_with_rows: usize,
    pub rows_written: usize,
    /// Rows whose source language is only known by a nonstandard code
    pub unresolved_codes: usize,
    pub elapsed: Duration,
}

impl Stats {
    fn record_page(&mut self, page: &ProcessedPage) {
        self.pages_read += 1;
        match page.outcome {
            PageOutcome::Skipped(SkipReason::Namespace) => self.skipped_namespace += 1,
            PageOutcome::Skipped(SkipReason::Redirect) => self.skipped_redirect += 1,
            PageOutcome::Skipped(SkipReason::Meta) => self.skipped_meta += 1,
            PageOutcome::Skipped(SkipReason::Malformed) => self.skipped_malformed += 1,
            PageOutcome::Interpreted {
                sections,
                sections_with_rows,
            } => {
                self.sections_interpreted += sections;
                self.sections_with_rows += sections_with_rows;
            }
        }
    }

    pub fn pages_skipped(&self) -> usize {
        self.skipped_namespace + self.skipped_redirect + self.skipped_meta + self.skipped_malformed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Skipped(SkipReason),
    Interpreted { sections: usize, sections_with_rows: usize },
}

/// Result of page processing
#[derive(Debug)]
pub struct ProcessedPage {
    pub page_id: usize,
    pub outcome: PageOutcome,
    pub rows: Vec<EtymologyRow>,
}

/// Interpret every language section of one `<page>` block
pub fn process_page(page_xml: &str, page_id: usize, tables: &Tables, filter: &PageFilter) -> ProcessedPage {
    let page = match extract_page(page_xml, filter) {
        Ok(page) => page,
        Err(reason) => {
            log::debug!("Skipping page {} ({:?})", page_id, reason);
            return ProcessedPage {
                page_id,
                outcome: PageOutcome::Skipped(reason),
                rows: Vec::new(),
            };
        }
    };

    let lines = page.lines();
    let sections = split_language_sections(&lines, tables);
    let mut rows = Vec::new();
    let mut sections_with_rows = 0;
    for section in &sections {
        let section_rows = interpret_page(&page.title, section, tables);
        if !section_rows.is_empty() {
            sections_with_rows += 1;
        }
        rows.extend(section_rows);
    }

    ProcessedPage {
        page_id,
        outcome: PageOutcome::Interpreted {
            sections: sections.len(),
            sections_with_rows,
        },
        rows,
    }
}

/// Write one page's rows; returns true once the row limit is reached
fn write_page<W: Write>(
    page: ProcessedPage,
    stats: &mut Stats,
    writer: &mut RowWriter<W>,
    limit: Option<usize>,
    progress: &ProgressBar,
    start_time: Instant,
) -> Result<bool> {
    stats.record_page(&page);

    if stats.pages_read % PROGRESS_INTERVAL == 0 {
        let rate = stats.pages_read as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        progress.set_message(format!(
            "Pages: {} | Rows: {} | Rate: {:.0} pg/s",
            stats.pages_read, stats.rows_written, rate
        ));
    }

    for row in &page.rows {
        writer.write_row(row)?;
        stats.rows_written += 1;
        if row.has_unresolved_root() {
            stats.unresolved_codes += 1;
        }
        if limit.map_or(false, |l| stats.rows_written >= l) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Strategy 1: sequential processing on the calling thread
pub fn run_sequential<W: Write>(
    reader: impl Read,
    writer: &mut RowWriter<W>,
    tables: &Tables,
    filter: &PageFilter,
    limits: Limits,
    progress: &ProgressBar,
) -> Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();
    let mut failure = None;

    scan_pages(reader, |page_xml| {
        let page = process_page(&page_xml, stats.pages_read, tables, filter);
        match write_page(page, &mut stats, writer, limits.rows, progress, start_time) {
            Ok(limit_reached) => !limit_reached && limits.pages.map_or(true, |l| stats.pages_read < l),
            Err(e) => {
                failure = Some(e);
                false
            }
        }
    })?;

    if let Some(e) = failure {
        return Err(e);
    }
    writer.flush()?;
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

/// Strategy 2: channel pipeline.
/// Reader thread scans pages, workers interpret them, and the calling thread
/// writes results in page order through a reorder buffer.
pub fn process_channel_pipeline<W: Write>(
    reader: impl Read + Send + 'static,
    writer: &mut RowWriter<W>,
    tables: Arc<Tables>,
    filter: PageFilter,
    config: &ParallelConfig,
    limits: Limits,
    progress: &ProgressBar,
) -> Result<Stats> {
    // (page_id, xml) so results can be put back in order
    let (page_tx, page_rx): (SyncSender<(usize, String)>, Receiver<(usize, String)>) =
        sync_channel(config.channel_buffer);
    let (result_tx, result_rx): (SyncSender<ProcessedPage>, Receiver<ProcessedPage>) =
        sync_channel(config.channel_buffer);

    let limit_reached = Arc::new(AtomicBool::new(false));
    let start_time = Instant::now();

    let reader_limit_flag = Arc::clone(&limit_reached);
    let page_limit = limits.pages;
    let reader_handle = thread::spawn(move || read_pages_to_channel(reader, page_tx, page_limit, &reader_limit_flag));

    let page_rx = Arc::new(Mutex::new(page_rx));
    let filter = Arc::new(filter);
    let worker_handles: Vec<JoinHandle<()>> = (0..config.num_workers.max(1))
        .map(|_| {
            let rx = Arc::clone(&page_rx);
            let tx = result_tx.clone();
            let tables = Arc::clone(&tables);
            let filter = Arc::clone(&filter);
            let limit_flag = Arc::clone(&limit_reached);
            thread::spawn(move || process_pages_worker(rx, tx, &tables, &filter, &limit_flag))
        })
        .collect();

    // channels close once every worker is done
    drop(result_tx);
    drop(page_rx);

    let written = write_results_sorted(result_rx, writer, limits.rows, &limit_reached, progress, start_time);

    match reader_handle.join() {
        Ok(Err(e)) if written.is_ok() => return Err(e.into()),
        Err(_) => log::warn!("Page reader thread panicked"),
        _ => {}
    }
    for handle in worker_handles {
        if handle.join().is_err() {
            log::warn!("Page worker thread panicked");
        }
    }

    let mut stats = written?;
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn read_pages_to_channel(
    reader: impl Read,
    tx: SyncSender<(usize, String)>,
    page_limit: Option<usize>,
    limit_reached: &AtomicBool,
) -> std::io::Result<usize> {
    let mut page_id = 0usize;
    scan_pages(reader, |page_xml| {
        if limit_reached.load(Ordering::Relaxed) {
            return false;
        }
        if tx.send((page_id, page_xml)).is_err() {
            return false;
        }
        page_id += 1;
        page_limit.map_or(true, |l| page_id < l)
    })?;
    Ok(page_id)
}

fn process_pages_worker(
    rx: Arc<Mutex<Receiver<(usize, String)>>>,
    tx: SyncSender<ProcessedPage>,
    tables: &Tables,
    filter: &PageFilter,
    limit_reached: &AtomicBool,
) {
    loop {
        if limit_reached.load(Ordering::Relaxed) {
            break;
        }
        let item = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };
        match item {
            Some((page_id, xml)) => {
                // skipped pages are still sent so the reorder buffer never stalls
                if tx.send(process_page(&xml, page_id, tables, filter)).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
}

/// Write results in page order using a streaming reorder buffer.
///
/// In-order results are written immediately; results that arrive before their
/// predecessors wait in a `BTreeMap` keyed by page id.
fn write_results_sorted<W: Write>(
    rx: Receiver<ProcessedPage>,
    writer: &mut RowWriter<W>,
    limit: Option<usize>,
    limit_reached: &AtomicBool,
    progress: &ProgressBar,
    start_time: Instant,
) -> Result<Stats> {
    let mut stats = Stats::default();
    let mut pending: BTreeMap<usize, ProcessedPage> = BTreeMap::new();
    let mut next_expected = 0usize;
    let mut max_pending = 0usize;

    for result in rx {
        pending.insert(result.page_id, result);
        max_pending = max_pending.max(pending.len());

        while let Some(ready) = pending.remove(&next_expected) {
            if write_page(ready, &mut stats, writer, limit, progress, start_time)? {
                limit_reached.store(true, Ordering::SeqCst);
                writer.flush()?;
                return Ok(stats);
            }
            next_expected += 1;
        }
    }

    // only reachable with gaps, e.g. a worker that panicked
    while let Some((_, result)) = pending.pop_first() {
        if write_page(result, &mut stats, writer, limit, progress, start_time)? {
            limit_reached.store(true, Ordering::SeqCst);
            break;
        }
    }

    log::debug!("Reorder buffer peaked at {} pages", max_pending);
    writer.flush()?;
    Ok(stats)
}

use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

use crate::canonical::canonicalize;
use crate::settings::Settings;
use crate::decoder::RecordDecoder;
use crate::error::PersistError;
use crate::sink::{self, SequenceGenerator};

/// A content page ready to be written, numbered by the scanner.
#[derive(Debug)]
struct WriteJob {
    seq: u64,
    header: String,
    body: String,
    path: PathBuf,
}

struct ScanSummary {
    scanned: u64,
    dispatched: u64,
    aliases_skipped: u64,
}

#[derive(Debug, Default)]
pub struct SplitReport {
    pub scanned: u64,
    pub dispatched: u64,
    pub written: u64,
    pub aliases_skipped: u64,
    pub failures: Vec<(u64, PersistError)>,
}

/// Completion report: the total line, then any failed writes.
impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total articles: {}", self.dispatched)?;
        if !self.failures.is_empty() {
            write!(
                f,
                "\nFailed to write {} of {} articles:",
                self.failures.len(),
                self.dispatched
            )?;
            for (seq, err) in &self.failures {
                write!(f, "\n  #{}: {}", seq, err)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct DispatchOutcome {
    written: u64,
    failures: Vec<(u64, PersistError)>,
}

impl DispatchOutcome {
    fn record(&mut self, result: Result<(u64, Result<(), PersistError>), JoinError>) {
        match result {
            Ok((_, Ok(()))) => self.written += 1,
            Ok((seq, Err(e))) => {
                warn!("Write failed for article #{}: {}", seq, e);
                self.failures.push((seq, e));
            }
            Err(e) => error!("Write task aborted: {}", e),
        }
    }
}

/// Split the dump read from `input` into one file per content page under
/// `target_dir`, which must already exist.
///
/// Pages are decoded on a blocking thread and written by up to
/// `settings.max_in_flight` concurrent tasks. All writes are awaited before
/// returning, including when decoding fails part-way.
pub async fn split<R>(input: R, target_dir: &Path, settings: &Settings) -> Result<SplitReport>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<WriteJob>(settings.queue_depth);
    let dir = target_dir.to_path_buf();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} pages ({per_sec}) {msg}")?,
    );

    let scanner = tokio::task::spawn_blocking(move || scan(input, &dir, tx, pb));
    let outcome = dispatch(rx, settings.max_in_flight).await;

    let summary = match scanner.await.context("Scanner thread panicked")? {
        Ok(summary) => summary,
        Err(e) => {
            error!(
                "Decoding stopped; {} articles written before the failure",
                outcome.written
            );
            return Err(e);
        }
    };

    Ok(SplitReport {
        scanned: summary.scanned,
        dispatched: summary.dispatched,
        written: outcome.written,
        aliases_skipped: summary.aliases_skipped,
        failures: outcome.failures,
    })
}

/// Single-threaded decode loop. Owns the sequence generator, so numbers are
/// assigned in document order no matter when the writes finish. The spinner
/// is cleared whether the loop ends normally or on an error.
fn scan<R: BufRead>(
    input: R,
    dir: &Path,
    tx: mpsc::Sender<WriteJob>,
    pb: ProgressBar,
) -> Result<ScanSummary> {
    let result = scan_records(input, dir, &tx, &pb);
    pb.finish_and_clear();
    result
}

fn scan_records<R: BufRead>(
    input: R,
    dir: &Path,
    tx: &mpsc::Sender<WriteJob>,
    pb: &ProgressBar,
) -> Result<ScanSummary> {
    let mut decoder = RecordDecoder::new(input);
    let mut seq = SequenceGenerator::new();
    let mut scanned = 0u64;
    let mut aliases_skipped = 0u64;

    for record in decoder.by_ref() {
        let record = record.context("Error decoding dump")?;
        scanned += 1;
        pb.inc(1);

        if record.is_alias() {
            aliases_skipped += 1;
            debug!(
                title = %record.title,
                redirect_to = record.alias_target.as_deref().unwrap_or_default(),
                "Skipping redirect"
            );
            continue;
        }

        let n = seq.next_seq();
        let job = WriteJob {
            seq: n,
            header: canonicalize(&record.title),
            body: record.body,
            path: sink::artifact_path(dir, n),
        };
        if tx.blocking_send(job).is_err() {
            anyhow::bail!("Write dispatcher stopped before the dump was fully read");
        }
    }

    debug!(bytes = decoder.byte_offset(), "Reached end of dump");
    Ok(ScanSummary {
        scanned,
        dispatched: seq.issued(),
        aliases_skipped,
    })
}

/// Receive jobs until the scanner hangs up, keeping at most `max_in_flight`
/// writes running, then wait for every outstanding write.
async fn dispatch(mut rx: mpsc::Receiver<WriteJob>, max_in_flight: usize) -> DispatchOutcome {
    let mut tasks = JoinSet::new();
    let mut outcome = DispatchOutcome::default();

    while let Some(job) = rx.recv().await {
        while tasks.len() >= max_in_flight {
            match tasks.join_next().await {
                Some(result) => outcome.record(result),
                None => break,
            }
        }
        tasks.spawn(async move {
            let result = sink::persist(&job.header, &job.body, &job.path).await;
            (job.seq, result)
        });
    }

    while let Some(result) = tasks.join_next().await {
        outcome.record(result);
    }
    outcome
}

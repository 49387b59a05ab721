use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::PersistError;

pub const SEPARATOR: &str = "---------------";
const EXTENSION: &str = "txt";

/// Hands out output ordinals 0, 1, 2, ... in the order records are dispatched.
/// Owned by the scanning loop; workers get a copy of their number.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: u64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next;
        self.next += 1;
        seq
    }

    /// How many ordinals have been handed out.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

pub fn artifact_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("{}.{}", seq, EXTENSION))
}

/// Write `header`, the separator line and `body` to `path`, replacing any
/// existing file.
pub async fn persist(header: &str, body: &str, path: &Path) -> Result<(), PersistError> {
    write_artifact(header, body, path)
        .await
        .map_err(|source| PersistError {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_artifact(header: &str, body: &str, path: &Path) -> std::io::Result<()> {
    let file = File::create(path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.write_all(SEPARATOR.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

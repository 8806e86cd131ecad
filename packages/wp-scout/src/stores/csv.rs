//! Append-only CSV logs.
//!
//! Both the result store (`name,domain`) and the optional miss log
//! (`name,reason`) share one core with these rules:
//!
//! - The header is written once, when the file is created or empty. An
//!   existing file must carry the same header.
//! - On open, a trailing line without its newline (a crash mid-write) is
//!   truncated away before anything is appended.
//! - Each row goes out as a single `write_all` under a lock, followed by
//!   `flush` and `sync_data`. A failed write is rolled back to the previous
//!   length, so no partial row is ever left behind.
//! - A name is written at most once; membership is checked before append.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::ResultStore;
use crate::types::record::{AppendOutcome, MissRecord, ResultRecord};

/// Header of the result file.
pub const RESULT_HEADER: [&str; 2] = ["name", "domain"];

/// Header of the miss log.
pub const MISS_HEADER: [&str; 2] = ["name", "reason"];

struct LogState {
    file: tokio::fs::File,
    len: u64,
    known: HashSet<String>,
}

struct CsvLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl CsvLog {
    async fn open(path: &Path, header: [&'static str; 2]) -> StoreResult<Self> {
        let mut contents = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let intact = match contents.iter().rposition(|b| *b == b'\n') {
            Some(idx) => idx + 1,
            None => 0,
        };
        if intact < contents.len() {
            warn!(
                path = %path.display(),
                dropped_bytes = contents.len() - intact,
                "truncating torn trailing line"
            );
            contents.truncate(intact);
            let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
            file.set_len(intact as u64).await?;
            file.sync_all().await?;
        }

        let known = if contents.is_empty() {
            let bytes = encode_row(&header)?;
            tokio::fs::write(path, &bytes).await?;
            contents = bytes;
            HashSet::new()
        } else {
            read_names(path, &contents, header)?
        };

        let file = tokio::fs::OpenOptions::new().append(true).open(path).await?;
        let file_len = file.metadata().await?.len();
        file.sync_all().await?;
        debug!(path = %path.display(), bytes = contents.len(), rows = known.len(), "opened CSV log");

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LogState {
                file,
                len: file_len,
                known,
            }),
        })
    }

    async fn names(&self) -> HashSet<String> {
        self.state.lock().await.known.clone()
    }

    async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.known.contains(name)
    }

    async fn append(&self, fields: [&str; 2]) -> StoreResult<AppendOutcome> {
        let mut state = self.state.lock().await;
        if state.known.contains(fields[0]) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        let row = encode_row(&fields)?;
        if let Err(e) = write_synced(&mut state.file, &row).await {
            let len = state.len;
            if let Err(rollback) = state.file.set_len(len).await {
                warn!(path = %self.path.display(), error = %rollback, "rollback after failed write also failed");
            }
            return Err(e.into());
        }

        state.len += row.len() as u64;
        state.known.insert(fields[0].to_string());
        Ok(AppendOutcome::Appended)
    }
}

async fn write_synced(file: &mut tokio::fs::File, row: &[u8]) -> std::io::Result<()> {
    file.write_all(row).await?;
    file.flush().await?;
    file.sync_data().await
}

fn encode_row(fields: &[&str]) -> StoreResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

fn read_names(
    path: &Path,
    contents: &[u8],
    header: [&'static str; 2],
) -> StoreResult<HashSet<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents);

    let found: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if found != header {
        return Err(StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            found,
            expected: header,
        });
    }

    let mut names = HashSet::new();
    for record in reader.records() {
        let record = record?;
        match record.get(0).map(str::trim) {
            Some(name) if !name.is_empty() && record.len() >= 2 => {
                names.insert(name.to_string());
            }
            _ => {}
        }
    }
    Ok(names)
}

/// `name,domain` result file.
pub struct CsvResultStore {
    log: CsvLog,
}

impl CsvResultStore {
    /// Open or create the result file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let log = CsvLog::open(path.as_ref(), RESULT_HEADER).await?;
        info!(path = %log.path.display(), "result store ready");
        Ok(Self { log })
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }
}

#[async_trait]
impl ResultStore for CsvResultStore {
    async fn load(&self) -> StoreResult<HashSet<String>> {
        Ok(self.log.names().await)
    }

    async fn append(&self, record: &ResultRecord) -> StoreResult<AppendOutcome> {
        self.log
            .append([record.name.as_str(), record.domain.as_str()])
            .await
    }

    async fn contains(&self, name: &str) -> StoreResult<bool> {
        Ok(self.log.contains(name).await)
    }
}

/// `name,reason` log of names that ended without a match.
///
/// Only used when explicitly configured; its names join the resume set so
/// a restarted run does not probe them again.
pub struct CsvMissLog {
    log: CsvLog,
}

impl CsvMissLog {
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let log = CsvLog::open(path.as_ref(), MISS_HEADER).await?;
        info!(path = %log.path.display(), "miss log ready");
        Ok(Self { log })
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub async fn load(&self) -> HashSet<String> {
        self.log.names().await
    }

    pub async fn append(&self, record: &MissRecord) -> StoreResult<AppendOutcome> {
        self.log
            .append([record.name.as_str(), record.reason.as_str()])
            .await
    }
}

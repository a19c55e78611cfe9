use super::record::AccessRecord;

use chrono::{DateTime, NaiveDate, Utc};
use std::io;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LOG_EXTENSION: &str = "log";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Appends access records to daily files and serves them back.
pub struct AccessLog {
    dir: PathBuf,
    /// Keeps concurrent appends from interleaving inside a line.
    write_lock: Mutex<()>,
}

impl AccessLog {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn file_for(&self, timestamp: i64) -> PathBuf {
        let date = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
        self.dir
            .join(format!("{}.{}", date.format(DATE_FORMAT), LOG_EXTENSION))
    }

    pub async fn append(&self, record: &AccessRecord) -> io::Result<()> {
        let line = format!("{}\n", record);
        let path = self.file_for(record.timestamp);

        let _lock = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Emits the record as a tracing event and appends it.
    /// A failed append is logged, never surfaced to the request.
    pub async fn record(&self, record: AccessRecord) {
        tracing::info!(
            file_id = record.file_id.as_deref().unwrap_or("null"),
            requester = record.requester.as_deref().unwrap_or("null"),
            request_type = record.request_type.as_str(),
            status = record.status,
            size = record.size,
            "request resolved"
        );

        if let Err(e) = self.append(&record).await {
            tracing::warn!("Failed to append access log record: {}", e);
        }
    }

    /// Returns the log for `date` (`YYYY-MM-DD`), or the earliest log when no
    /// date is given. `Ok(None)` when there is no such log.
    pub async fn fetch(&self, date: Option<&str>) -> io::Result<Option<Vec<u8>>> {
        let path = match date {
            Some(date) => {
                if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("invalid date {:?}, expected YYYY-MM-DD", date),
                    ));
                }
                self.dir.join(format!("{}.{}", date, LOG_EXTENSION))
            }
            None => match self.list_logs().await?.into_iter().next() {
                Some(name) => self.dir.join(name),
                None => return Ok(None),
            },
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Log file names, oldest first.
    pub async fn list_logs(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&format!(".{}", LOG_EXTENSION)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

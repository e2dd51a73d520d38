//! # Local Recorder
//!
//! Appends observations to a date-partitioned CSV log on local storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/YYYY/MM/YYYY-MM-DD.csv
//! ```
//!
//! Year and month directories and the day's file are created on demand. The
//! header row (double-quoted labels) is written exactly once, when the file is
//! created; every data row follows the same [`SCHEMA`] order. Rows are only
//! ever appended.
//!
//! [`SCHEMA`]: crate::observation::schema::SCHEMA

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use csv::{QuoteStyle, WriterBuilder};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StationError};
use crate::observation::schema;
use crate::observation::Observation;

/// Date-partitioned tabular log writer.
#[derive(Debug, Clone)]
pub struct DailyLogRecorder {
    root: PathBuf,
}

impl DailyLogRecorder {
    /// Create a recorder writing under `root`.
    ///
    /// The root itself is the storage medium and is never created here.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the partition holding observations for `date`.
    #[must_use]
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    /// Append `obs` to its day's partition, creating it if needed.
    ///
    /// # Returns
    ///
    /// * `Result<PathBuf>` - Path of the partition that was written
    ///
    /// # Errors
    ///
    /// Returns [`StationError::StorageUnavailable`] if the storage root is
    /// missing, or an I/O / CSV error if writing fails. Nothing is retried.
    pub async fn record(&self, obs: &Observation) -> Result<PathBuf> {
        let mounted = fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !mounted {
            return Err(StationError::StorageUnavailable(format!(
                "{} is not mounted",
                self.root.display()
            )));
        }

        let path = self.partition_path(obs.timestamp().date_naive());
        if let Some(month_dir) = path.parent() {
            fs::create_dir_all(month_dir).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut buf = Vec::new();
        if file.metadata().await?.len() == 0 {
            info!("Creating daily log {}", path.display());
            encode(&mut buf, QuoteStyle::Always, schema::header())?;
        }
        encode(&mut buf, QuoteStyle::Necessary, row(obs))?;

        file.write_all(&buf).await?;
        file.flush().await?;

        debug!("Appended observation to {}", path.display());
        Ok(path)
    }
}

/// Encode one CSV record into `buf`.
fn encode<I, T>(buf: &mut Vec<u8>, style: QuoteStyle, record: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new().quote_style(style).from_writer(buf);
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

/// Row cells for `obs`, in header order.
fn row(obs: &Observation) -> Vec<String> {
    std::iter::once(obs.created_at())
        .chain(obs.fields().map(|(_, value)| value.to_string()))
        .collect()
}

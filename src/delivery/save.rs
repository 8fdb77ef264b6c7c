use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::composite::Composite;
use crate::errors::DeliveryError;

/// How many later timestamps a batch may move to when its own is taken.
const MAX_CLAIM_ATTEMPTS: i64 = 1000;

/// Writes composites into the storage directory.
pub struct SaveAdapter {
    directory: PathBuf,
}

impl SaveAdapter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        SaveAdapter {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Save every composite as `photobooth-<millis>.<ext>`. Returns the file
    /// names along with the timestamp shared by the batch.
    pub async fn save(
        &self,
        composites: &[Composite],
    ) -> Result<(i64, Vec<String>), DeliveryError> {
        if composites.is_empty() {
            return Err(DeliveryError::NoComposites);
        }
        tokio::fs::create_dir_all(&self.directory).await?;

        let now = chrono::Utc::now().timestamp_millis();
        let (millis, first) = self.claim(now, &composites[0]).await?;
        let mut names = Vec::with_capacity(composites.len());
        names.push(first);
        for (i, composite) in composites.iter().enumerate().skip(1) {
            let name = file_name(millis, i, composite);
            write_new(&self.directory.join(&name), composite).await?;
            names.push(name);
        }
        info!("Saved {} composite(s) under {}", names.len(), millis);
        Ok((millis, names))
    }

    // Writes the batch's first file, moving to the next millisecond while
    // the name is already taken
    async fn claim(&self, start: i64, composite: &Composite) -> Result<(i64, String), io::Error> {
        let mut millis = start;
        loop {
            let name = file_name(millis, 0, composite);
            match write_new(&self.directory.join(&name), composite).await {
                Ok(()) => return Ok((millis, name)),
                Err(e)
                    if e.kind() == io::ErrorKind::AlreadyExists
                        && millis - start < MAX_CLAIM_ATTEMPTS =>
                {
                    debug!("{} already exists, trying the next timestamp", name);
                    millis += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Locate the first file saved under `millis`.
    pub async fn find(&self, millis: i64) -> Option<PathBuf> {
        let prefix = format!("photobooth-{}.", millis);
        let mut entries = tokio::fs::read_dir(&self.directory).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Some(entry.path());
            }
        }
        None
    }
}

// Never replaces an existing file
async fn write_new(path: &Path, composite: &Composite) -> Result<(), io::Error> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(composite.bytes()).await?;
    file.flush().await?;
    debug!("Saved composite to {:?}", path);
    Ok(())
}

// Later composites in a batch get a `-<n>` suffix
fn file_name(millis: i64, index: usize, composite: &Composite) -> String {
    let ext = composite.format().extension();
    if index == 0 {
        format!("photobooth-{}.{}", millis, ext)
    } else {
        format!("photobooth-{}-{}.{}", millis, index + 1, ext)
    }
}

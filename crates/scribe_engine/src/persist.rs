use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use scribe_core::{ExportFormat, JobId};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("job id {0:?} cannot be used as a file name")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// `{jobId}.{ext}`. Job ids are server-assigned UUIDs; anything that could
/// escape the output directory is rejected.
pub fn export_filename(job_id: &JobId, format: ExportFormat) -> Result<String, PersistError> {
    let id = job_id.as_str();
    let forbidden = |c: char| matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || c.is_control();
    if id.is_empty() || id.starts_with('.') || id.chars().any(forbidden) {
        return Err(PersistError::InvalidName(id.to_string()));
    }
    Ok(format!("{id}.{}", format.as_str()))
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // `persist` replaces an existing export of the same job and format.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Saves a downloaded export as `{dir}/{jobId}.{ext}`.
pub fn save_export(
    dir: &Path,
    job_id: &JobId,
    format: ExportFormat,
    content: &[u8],
) -> Result<PathBuf, PersistError> {
    let filename = export_filename(job_id, format)?;
    AtomicFileWriter::new(dir.to_path_buf()).write(&filename, content)
}

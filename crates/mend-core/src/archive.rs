use mend_execution::Language;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const SLUG_LEN: usize = 30;

/// Writes every attempt's source next to the user as `<slug>_attempt_<n>.<ext>`.
#[derive(Debug, Clone)]
pub struct AttemptArchive {
    dir: PathBuf,
}

impl AttemptArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lowercased task with every non-alphanumeric ASCII char replaced by `_`,
    /// cut to 30 chars.
    pub fn slug(task: &str) -> String {
        task.chars()
            .flat_map(char::to_lowercase)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(SLUG_LEN)
            .collect()
    }

    pub fn file_name(task: &str, attempt: u32, language: Language) -> String {
        format!(
            "{}_attempt_{}.{}",
            Self::slug(task),
            attempt,
            language.extension()
        )
    }

    /// Write `source` for `attempt`, creating the directory if needed.
    /// An existing file from an earlier run is overwritten.
    pub fn write(
        &self,
        task: &str,
        attempt: u32,
        language: Language,
        source: &str,
    ) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(task, attempt, language));
        std::fs::write(&path, source)?;
        debug!("Archived attempt {} to {}", attempt, path.display());
        Ok(path)
    }
}

//! The watermark file in the sync root.

use marksync_engine::{Error, Watermark, WatermarkStore};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const WATERMARK_FILE: &str = ".marksync.sync";

/// Unix seconds as decimal text in `.marksync.sync`.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(WATERMARK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Result<Option<Watermark>, Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::Watermark(err.to_string())),
        };

        text.trim()
            .parse()
            .map(|secs| Some(Watermark::at(secs)))
            .map_err(|_| Error::Watermark(format!("{} holds {:?}, not a timestamp", self.path.display(), text.trim())))
    }

    fn save(&mut self, watermark: Watermark) -> Result<(), Error> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let write = || -> io::Result<()> {
            let mut tmp = NamedTempFile::new_in(dir)?;
            writeln!(tmp, "{}", watermark.as_secs())?;
            tmp.persist(&self.path).map_err(|err| err.error)?;
            Ok(())
        };
        write().map_err(|err| Error::Watermark(err.to_string()))
    }
}

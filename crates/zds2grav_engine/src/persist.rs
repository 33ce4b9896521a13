use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path} missing or not writable: {message}")]
    OutputDir { path: PathBuf, message: String },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Create `dir` with its parents when needed and check that files can be
/// created in it.
pub fn prepare_dir(dir: &Path) -> Result<(), PersistError> {
    let fail = |message: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        message,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(fail("path is not a directory".into())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?
        }
        Err(err) => return Err(fail(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

/// Writes the files of one page directory. Each file goes to a temp file in
/// the same directory first and is renamed over the target, so a reader
/// sees either the previous file or the complete new one.
#[derive(Debug)]
pub struct PageDirWriter {
    dir: PathBuf,
}

impl PageDirWriter {
    pub fn create(dir: PathBuf) -> Result<Self, PersistError> {
        prepare_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let fail = |source: io::Error| PersistError::Write {
            path: target.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(fail)?;
        tmp.write_all(content.as_ref()).map_err(fail)?;
        tmp.as_file_mut().sync_all().map_err(fail)?;
        tmp.persist(&target).map_err(|err| fail(err.error))?;
        Ok(target)
    }
}

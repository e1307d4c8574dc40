use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed to read cursor file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write cursor file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CursorError>;

/// Opaque journal resume token. Totally ordered by the journal itself;
/// never decoded or compared here, only stored and replayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persists the last-acknowledged cursor as a single flat file.
///
/// Touched only at startup (load) and after each fully-acknowledged bulk
/// flush (save); the pipeline owns it exclusively.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cursor. Absent or empty file means cold start:
    /// stream from the journal's current tail, not from history.
    pub fn load(&self) -> Result<Option<Cursor>> {
        let token = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No cursor file, cold start");
                return Ok(None);
            }
            Err(e) => {
                return Err(CursorError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let token = token.trim();
        if token.is_empty() {
            tracing::info!(path = %self.path.display(), "Empty cursor file, cold start");
            return Ok(None);
        }

        tracing::info!(path = %self.path.display(), "Loaded cursor");
        Ok(Some(Cursor::new(token)))
    }

    /// Overwrite the file with the new token: write to a temporary file in
    /// the same directory, fsync, then rename over the target. A crash must
    /// never leave a cursor pointing past what was actually acknowledged.
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        let write_err = |e| CursorError::Write {
            path: self.path.clone(),
            source: e,
        };

        let tmp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(cursor.as_str().as_bytes())
            .map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        tracing::debug!(cursor = %cursor, "Cursor saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_cold_start() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_empty_file_is_cold_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor");
        fs::write(&path, "").unwrap();
        let store = CursorStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));

        let cursor = Cursor::new("s=abc;i=2f9;b=deadbeef");
        store.save(&cursor).unwrap();

        assert_eq!(store.load().unwrap(), Some(cursor));
    }

    #[test]
    fn test_save_overwrites_previous_token() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));

        store.save(&Cursor::new("first")).unwrap();
        store.save(&Cursor::new("second")).unwrap();

        assert_eq!(store.load().unwrap(), Some(Cursor::new("second")));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));
        store.save(&Cursor::new("token")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cursor")]);
    }
}

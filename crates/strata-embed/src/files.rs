use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::asset::{AssetFile, MemoryFile, StaticFile};
use crate::error::{EmbedError, EmbedResult};
use crate::opener::Opener;

/// A named set of static assets.
///
/// Lookups go, in order, to the directory named by the override
/// environment variable (when set and non-empty), the in-memory set, and
/// the fallback directory.
#[derive(Debug, Default)]
pub struct Files {
    override_env: Option<String>,
    dir_fallback: Option<PathBuf>,
    slurp_to_memory: bool,
    files: Mutex<HashMap<String, Arc<StaticFile>>>,
}

impl Files {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every asset from the directory in environment variable `key`
    /// whenever it is set.
    pub fn override_env(mut self, key: impl Into<String>) -> Self {
        self.override_env = Some(key.into());
        self
    }

    /// Directory to try for names not in memory.
    pub fn dir_fallback(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir_fallback = Some(dir.into());
        self
    }

    /// Keep fallback files in memory after their first open.
    pub fn slurp_to_memory(mut self, slurp: bool) -> Self {
        self.slurp_to_memory = slurp;
        self
    }

    /// Decode `opener` and add the result under `name`.
    ///
    /// An asset that fails to decode is logged and skipped.
    pub fn add(&self, name: impl Into<String>, opener: &Opener, modtime: DateTime<Utc>) {
        let name = name.into();
        let contents = match opener.read_all() {
            Ok(contents) => contents,
            Err(e) => {
                warn!(asset = %name, error = %e, "could not add asset");
                return;
            }
        };
        debug!(asset = %name, size = contents.len(), "added asset");
        let file = Arc::new(StaticFile::new(name.clone(), contents, modtime));
        self.files.lock().expect("lock poisoned").insert(name, file);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files
            .lock()
            .expect("lock poisoned")
            .contains_key(name.trim_start_matches('/'))
    }

    /// Number of assets held in memory.
    pub fn len(&self) -> usize {
        self.files.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open the asset called `name`. A leading `/` is ignored.
    pub fn open(&self, name: &str) -> EmbedResult<AssetFile> {
        let name = name.strip_prefix('/').unwrap_or(name);

        if let Some(dir) = self.override_dir() {
            return open_disk(&dir.join(name), name).map(AssetFile::Disk);
        }

        let mut files = self.files.lock().expect("lock poisoned");
        if let Some(file) = files.get(name) {
            return Ok(AssetFile::Memory(MemoryFile::new(Arc::clone(file))));
        }

        let Some(dir) = &self.dir_fallback else {
            return Err(EmbedError::NotFound(name.to_string()));
        };
        let path = dir.join(name);
        let mut disk = open_disk(&path, name)?;
        if !self.slurp_to_memory {
            return Ok(AssetFile::Disk(disk));
        }

        let mut contents = Vec::new();
        disk.read_to_end(&mut contents)?;
        let modtime = disk
            .metadata()
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        debug!(asset = %name, size = contents.len(), "slurped fallback asset");
        let file = Arc::new(StaticFile::new(name, contents, modtime));
        files.insert(name.to_string(), Arc::clone(&file));
        Ok(AssetFile::Memory(MemoryFile::new(file)))
    }

    fn override_dir(&self) -> Option<PathBuf> {
        let key = self.override_env.as_deref()?;
        let dir = std::env::var_os(key)?;
        if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        }
    }
}

fn open_disk(path: &Path, name: &str) -> EmbedResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EmbedError::NotFound(name.to_string()),
        _ => EmbedError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    fn read_string(mut file: AssetFile) -> String {
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn added_assets_open_from_memory() {
        let files = Files::new();
        files.add("app.js", &Opener::Inline(b"console.log(1)".to_vec()), epoch());
        files.add("big.css", &Opener::compress(b"a{}".repeat(100).as_slice()).unwrap(), epoch());
        assert_eq!(files.len(), 2);

        let file = files.open("/app.js").unwrap();
        assert!(file.is_memory());
        assert_eq!(file.modtime().unwrap(), epoch());
        assert_eq!(read_string(file), "console.log(1)");
        assert_eq!(read_string(files.open("big.css").unwrap()), "a{}".repeat(100));
    }

    #[test]
    fn undecodable_asset_is_skipped() {
        let files = Files::new();
        files.add("bad.bin", &Opener::Compressed(b"garbage".to_vec()), epoch());
        assert!(!files.contains("bad.bin"));
        assert!(matches!(files.open("bad.bin"), Err(EmbedError::NotFound(_))));
    }

    #[test]
    fn missing_without_fallback_is_not_found() {
        let files = Files::new();
        match files.open("nope.txt") {
            Err(EmbedError::NotFound(name)) => assert_eq!(name, "nope.txt"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn fallback_dir_serves_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), b"<p>hi</p>").unwrap();
        let files = Files::new().dir_fallback(dir.path());

        let file = files.open("page.html").unwrap();
        assert!(!file.is_memory());
        assert_eq!(read_string(file), "<p>hi</p>");
        assert!(files.is_empty());
        assert!(matches!(files.open("other.html"), Err(EmbedError::NotFound(_))));
    }

    #[test]
    fn slurped_fallback_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.svg");
        std::fs::write(&path, b"<svg/>").unwrap();
        let files = Files::new().dir_fallback(dir.path()).slurp_to_memory(true);

        let mut file = files.open("logo.svg").unwrap();
        assert!(file.is_memory());
        file.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(read_string(file), "svg/>");

        // Served from memory once slurped, even if the disk copy goes away.
        std::fs::remove_file(&path).unwrap();
        assert!(files.contains("logo.svg"));
        assert_eq!(read_string(files.open("/logo.svg").unwrap()), "<svg/>");
    }

    #[test]
    fn override_env_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), b"from override").unwrap();
        let key = "STRATA_EMBED_TEST_OVERRIDE";
        let files = Files::new().override_env(key);
        files.add("app.js", &Opener::Inline(b"from memory".to_vec()), epoch());

        std::env::remove_var(key);
        assert_eq!(read_string(files.open("app.js").unwrap()), "from memory");

        std::env::set_var(key, dir.path());
        let file = files.open("app.js").unwrap();
        assert!(!file.is_memory());
        assert_eq!(read_string(file), "from override");
        assert!(matches!(files.open("missing.js"), Err(EmbedError::NotFound(_))));

        std::env::set_var(key, "");
        assert_eq!(read_string(files.open("app.js").unwrap()), "from memory");
        std::env::remove_var(key);
    }
}

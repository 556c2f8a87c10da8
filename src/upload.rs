use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{Error, Result};

/// Lower-cased extension of `name` if it appears in `allow_list`.
pub fn allowed_extension(name: &str, allow_list: &[String]) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    // ".png" on its own is a hidden file, not an image
    if stem.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    allow_list
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        .then_some(ext)
}

pub fn allowed_file(name: &str, allow_list: &[String]) -> bool {
    allowed_extension(name, allow_list).is_some()
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)?;
        debug!(path = %path.display(), "Created directory");
    }
    Ok(())
}

/// Files directly inside `dir` whose extension is allowed, sorted by name.
pub fn list_images(dir: &Path, allow_list: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let allowed = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| allowed_file(n, allow_list));
        if allowed {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Writes uploads and captures into one directory under collision-free names.
pub struct UploadStore {
    dir: PathBuf,
    counter: AtomicU64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh path in the upload directory. Nothing is created on disk.
    pub fn unique_path(&self, prefix: &str, ext: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{prefix}-{}-{nanos}-{n}.{ext}", std::process::id()))
    }

    /// Validates the file name and stores `bytes`.
    /// The client-supplied name only contributes its extension.
    pub fn store(&self, name: &str, bytes: &[u8], allow_list: &[String]) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(Error::Validation("no file selected".into()));
        }
        let Some(ext) = allowed_extension(name, allow_list) else {
            return Err(Error::Validation(format!(
                "{name}: file type not allowed (accepted: {})",
                allow_list.join(", ")
            )));
        };
        if bytes.is_empty() {
            return Err(Error::Validation(format!("{name}: empty file")));
        }
        let path = self.unique_path("upload", &ext);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "Stored upload");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(exts: &[&str]) -> Vec<String> {
        exts.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let general = list(&["png", "jpg", "jpeg", "webp", "bmp"]);
        assert!(allowed_file("holiday.JPG", &general));
        assert!(allowed_file("a.b.webp", &general));
        assert!(!allowed_file("anim.gif", &general));
        assert!(!allowed_file("no_extension", &general));
        assert!(!allowed_file(".png", &general));
        assert_eq!(allowed_extension("Scan.BMP", &general).as_deref(), Some("bmp"));
    }

    #[test]
    fn store_rejects_disallowed_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads")).unwrap();

        let err = store.store("anim.gif", b"GIF89a", &list(&["png"])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = store.store("", b"data", &list(&["png"])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }

    #[test]
    fn stored_uploads_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        let allow = list(&["png"]);

        let a = store.store("photo.png", b"one", &allow).unwrap();
        let b = store.store("photo.png", b"two", &allow).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "png");
        assert_eq!(fs::read(&b).unwrap(), b"two");
    }

    #[test]
    fn lists_only_allowed_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", "c.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let found = list_images(dir.path(), &list(&["png", "jpg"])).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::convert::{ConvertOptions, Frame};

/// One unit of work for the panel. Immutable once enqueued.
#[derive(Debug)]
pub enum Job {
    Clear,
    Convert {
        source: PathBuf,
        options: ConvertOptions,
        /// Uploaded or captured file that belongs to this job and is deleted afterwards.
        temporary: bool,
    },
    /// Bitplanes converted elsewhere; both paths are uploads owned by the job.
    LoadPrepared {
        black: Option<PathBuf>,
        red: Option<PathBuf>,
    },
    Raw {
        frame: Frame,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Clear => "clear",
            Job::Convert { .. } => "convert",
            Job::LoadPrepared { .. } => "load-prepared",
            Job::Raw { .. } => "raw",
        }
    }

    pub fn temporary_files(&self) -> Vec<&Path> {
        match self {
            Job::Convert {
                source,
                temporary: true,
                ..
            } => vec![source.as_path()],
            Job::LoadPrepared { black, red } => {
                black.iter().chain(red.iter()).map(PathBuf::as_path).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn remove_temporary_files(&self) {
        for path in self.temporary_files() {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed removing upload"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_images_are_never_temporary() {
        let job = Job::Convert {
            source: PathBuf::from("/srv/slides/a.png"),
            options: ConvertOptions::default(),
            temporary: false,
        };
        assert!(job.temporary_files().is_empty());
    }

    #[test]
    fn removes_owned_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let black = dir.path().join("b.bmp");
        fs::write(&black, b"x").unwrap();
        let job = Job::LoadPrepared {
            black: Some(black.clone()),
            red: Some(dir.path().join("missing.bmp")),
        };
        assert_eq!(job.temporary_files().len(), 2);
        job.remove_temporary_files();
        assert!(!black.exists());
    }
}

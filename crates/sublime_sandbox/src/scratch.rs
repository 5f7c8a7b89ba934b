//! Scratch files for a single build/run operation.
//!
//! Every operation gets its own [`ScratchArtifacts`] with a unique,
//! extension-free base path. Callers derive one file per artifact kind by
//! appending a suffix. Releasing the set removes those files and sweeps the
//! toolchain working directory for `error<N>.log` files that `bfmake` leaves
//! behind when it is killed before it can clean up.
//!
//! Release is best-effort: missing files and removal errors are ignored.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Suffix of the asm2bf source handed to the compiler.
pub const SOURCE_SUFFIX: &str = "asm";
/// Suffix of brainfuck code: compiler output and interpreter input.
pub const PROGRAM_SUFFIX: &str = "b";

const BASE_PREFIX: &str = "bfcode";

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Allocates scratch artifact sets inside one directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
    work_dir: PathBuf,
}

impl ScratchSpace {
    /// `dir` holds the artifacts; `work_dir` is where the toolchain runs and
    /// may leave its error logs.
    pub fn new(dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Reserve a fresh base path.
    ///
    /// Unique within the process through the sequence number, and across
    /// processes sharing the directory through the pid and a random UUID.
    /// The file name contains no `.`, so appending a suffix never clashes
    /// with an existing extension.
    pub fn allocate(&self) -> ScratchArtifacts {
        let seq = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{}-{}",
            BASE_PREFIX,
            std::process::id(),
            seq,
            Uuid::new_v4().simple()
        );
        let base = self.dir.join(name);
        debug!("Allocated scratch base {}", base.display());

        ScratchArtifacts {
            base,
            suffixes: Vec::new(),
            work_dir: self.work_dir.clone(),
            released: false,
        }
    }
}

/// Files belonging to one operation. Removed on release or drop, once.
#[derive(Debug)]
pub struct ScratchArtifacts {
    base: PathBuf,
    suffixes: Vec<&'static str>,
    work_dir: PathBuf,
    released: bool,
}

impl ScratchArtifacts {
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Path for the artifact with `suffix`, registered for removal.
    pub fn path(&mut self, suffix: &'static str) -> PathBuf {
        if !self.suffixes.contains(&suffix) {
            self.suffixes.push(suffix);
        }
        self.path_for(suffix)
    }

    /// Every artifact path registered so far.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.suffixes.iter().map(|suffix| self.path_for(suffix)).collect()
    }

    /// Remove the artifacts now instead of waiting for drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn path_for(&self, suffix: &str) -> PathBuf {
        let mut name = self.base.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for path in self.paths() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }

        sweep_error_logs(&self.work_dir);
    }
}

impl Drop for ScratchArtifacts {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Whether `name` looks like a toolchain error log: `error<digits>.log`.
pub fn is_error_log(name: &str) -> bool {
    name.strip_prefix("error")
        .and_then(|rest| rest.strip_suffix(".log"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Remove every `error<N>.log` directly inside `dir`. Returns how many went.
pub fn sweep_error_logs(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping error log sweep of {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_error_log(name) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => debug!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }

    if removed > 0 {
        debug!("Swept {} toolchain error log(s) from {}", removed, dir.display());
    }
    removed
}

//! Process-wide registry of texture files
//!
//! Maps interned paths to [`TextureFile`] records and enforces the
//! max-open-files budget with a clock sweep. Records are never removed:
//! closing a file under pressure drops only its reader handle, so a later
//! lookup reuses the parsed header.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::file::TextureFile;
use crate::state::SharedState;

struct RegistryInner {
    files: IndexMap<Arc<str>, Arc<TextureFile>>,
    sweep: usize,
}

/// Concurrent path → file map bounded by `max_open_files`
pub struct FileRegistry {
    shared: Arc<SharedState>,
    inner: Mutex<RegistryInner>,
}

impl FileRegistry {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self {
            shared,
            inner: Mutex::new(RegistryInner {
                files: IndexMap::new(),
                sweep: 0,
            }),
        }
    }

    /// Look up `path`, creating (and eagerly opening) the record on first
    /// request
    ///
    /// Idempotent: every call for the same path returns the same
    /// [`TextureFile`] identity, broken or not.
    pub fn find(&self, path: &str) -> Arc<TextureFile> {
        let mut inner = self.inner.lock();
        if let Some(file) = inner.files.get(path) {
            self.shared.stats.record_file_hit();
            file.mark_used();
            return file.clone();
        }
        self.shared.stats.record_file_miss();

        // Make room before the new record opens its handle.
        self.enforce_file_budget(&mut inner);

        let key: Arc<str> = Arc::from(path);
        let file = TextureFile::new(key.clone(), self.shared.clone());
        inner.files.insert(key, file.clone());
        file
    }

    /// Close idle files until the open-handle count is under budget
    ///
    /// Two-phase clock sweep: the first visit to a used file spares it, the
    /// second closes it. Bounded at two full passes per call so a fully
    /// pinned population overshoots instead of blocking.
    fn enforce_file_budget(&self, inner: &mut RegistryInner) {
        let max_open_files = self.shared.config.read().max_open_files;
        if inner.files.is_empty() {
            return;
        }
        let mut steps = 2 * inner.files.len();
        while self.shared.stats.open_files() >= max_open_files && steps > 0 {
            if inner.sweep >= inner.files.len() {
                inner.sweep = 0;
            }
            if let Some((_, file)) = inner.files.get_index(inner.sweep) {
                file.release();
            }
            inner.sweep += 1;
            steps -= 1;
        }
        if self.shared.stats.open_files() >= max_open_files {
            debug!(
                open_files = self.shared.stats.open_files(),
                max_open_files, "open-file budget overshoot, every file pinned"
            );
        }
    }

    /// Number of known files (open or not)
    pub fn len(&self) -> usize {
        self.inner.lock().files.len()
    }

    /// Check if no files have been requested yet
    pub fn is_empty(&self) -> bool {
        self.inner.lock().files.is_empty()
    }
}

//! Lifecycle & stats bridge (spec.md §4.6), plus the sync/defrag background
//! tickers elliptics' eblob backend runs alongside the command path
//! (SPEC_FULL.md §4 supplement).

use crate::error::{BackendError, Result};
use accessclassifier::{compute_vm_total_sq, Classifier};
use blobcodec::{decode_ext, DefragState, ExtHeader, Key, EHDR_LEN};
use blobconfig::BackendConfig;
use blobengine::{BlobEngine, EngineOptions};
use std::ffi::CString;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, info};

/// One record handed to an `iterate` caller (spec.md §4.6 "Iterate").
pub struct IterRecord {
    pub key: Key,
    pub payload: Vec<u8>,
    pub size: u64,
    pub extension_list: Option<ExtHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsStat {
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsReply {
    pub fs: FsStat,
    pub total_records: u64,
    pub removed_records: u64,
}

/// The five callback surfaces spec.md §9 describes as "a record of function
/// pointers": command handling, checksumming, iteration, storage-stat, and
/// cleanup. Modeled here as inherent methods on `Backend` rather than a
/// separate trait object, since this crate owns its only implementation;
/// the trait exists for callers (e.g. `blobd-cli`) that want to program
/// against the interface rather than the concrete type.
pub trait BackendCallbacks {
    fn stat(&self) -> Result<FsStat>;
    fn stats(&self) -> StatsReply;
    fn defrag_status(&self) -> DefragState;
    fn defrag_start(&self) -> Result<()>;
    fn cleanup(&self);
}

struct DefragProgress {
    state_code: AtomicU8, // 0 = Idle, 1 = InProgress, 2 = Complete
    percent: AtomicU8,
}

impl DefragProgress {
    fn idle() -> Self {
        DefragProgress {
            state_code: AtomicU8::new(0),
            percent: AtomicU8::new(0),
        }
    }

    fn load(&self) -> DefragState {
        match self.state_code.load(Ordering::Relaxed) {
            1 => DefragState::InProgress {
                percent_complete: self.percent.load(Ordering::Relaxed),
            },
            2 => DefragState::Complete,
            _ => DefragState::Idle,
        }
    }
}

/// Backend: created from config, serves commands, releases resources on
/// `cleanup`/`Drop` (spec.md §3 "Lifecycles").
pub struct Backend {
    data_path: PathBuf,
    engine: BlobEngine,
    classifier: Classifier,
    config: BackendConfig,
    defrag: Arc<DefragProgress>,
    maintenance: Mutex<Option<MaintenanceHandles>>,
}

struct MaintenanceHandles {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Backend {
    /// Init: validate non-empty data path, open the engine, take a
    /// filesystem stat, compute `vm_total_sq` (spec.md §4.6, §3 Invariant 5
    /// — this only happens once per `Backend` value; there is no ambient
    /// registry to re-initialize against).
    pub fn init(config: BackendConfig) -> Result<Self> {
        if config.data.trim().is_empty() {
            return Err(BackendError::InvalidConfig("data path must not be empty".into()));
        }
        let data_path = PathBuf::from(&config.data);

        let options = EngineOptions {
            blob_size: config.blob_size,
            blob_size_limit: config.blob_size_limit,
            records_in_blob: config.records_in_blob,
        };
        let engine = BlobEngine::open(&data_path, options)?;

        let vm_total_sq = compute_vm_total_sq();
        let classifier = Classifier::new(vm_total_sq);

        info!(data = %data_path.display(), "backend initialized");

        Ok(Backend {
            data_path,
            engine,
            classifier,
            config,
            defrag: Arc::new(DefragProgress::idle()),
            maintenance: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &BlobEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Spawns the sync-interval ticker (a no-op beyond logging here, since
    /// every write already goes through `File::write_at`/`write_all`
    /// without buffering) and the defrag scheduler thread described in
    /// SPEC_FULL.md §4. Stoppable from `cleanup`.
    pub fn spawn_maintenance(self: &Arc<Self>) {
        let mut guard = self.maintenance.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        if !self.config.defrag_timeout.is_zero() {
            let backend = Arc::clone(self);
            let stop = Arc::clone(&stop);
            let interval = self.config.defrag_timeout;
            // Poll the stop flag on a short tick so `cleanup` isn't kept
            // waiting for a whole `defrag_timeout`, but only actually run a
            // pass once a full interval has elapsed since the last one.
            let poll = interval.min(std::time::Duration::from_millis(200));
            handles.push(std::thread::spawn(move || {
                let mut elapsed = std::time::Duration::ZERO;
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(poll);
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    elapsed += poll;
                    if elapsed < interval {
                        continue;
                    }
                    elapsed = std::time::Duration::ZERO;
                    if let Err(e) = backend.defrag_start() {
                        error!(error = %e, "scheduled defrag pass failed");
                    }
                }
            }));
        }

        *guard = Some(MaintenanceHandles { stop, handles });
    }

    /// Read-only traversal for external collaborators (recovery,
    /// replication): the pre-callback extracts the extension header when
    /// present, adjusts the payload pointer and size, and hands the caller
    /// `{key, payload, size, extension_list}` (spec.md §4.6 "Iterate").
    pub fn iterate(&self, mut f: impl FnMut(IterRecord) -> Result<()>) -> Result<()> {
        self.engine
            .iterate(|key, file, data_offset, total_size, has_exthdr| {
                let (payload_offset, payload_size, extension_list) = if has_exthdr {
                    let ehdr = decode_ext(file, data_offset)?;
                    (data_offset + EHDR_LEN as u64, total_size - EHDR_LEN as u64, Some(ehdr))
                } else {
                    (data_offset, total_size, None)
                };

                let mut payload = vec![0u8; payload_size as usize];
                file.read_exact_at(&mut payload, payload_offset)?;

                f(IterRecord {
                    key,
                    payload,
                    size: payload_size,
                    extension_list,
                })
                .map_err(|e| blobengine::EngineError::InvalidState(e.to_string()))
            })
            .map_err(BackendError::from)
    }

    fn storage_stat(path: &Path) -> Result<FsStat> {
        let c_path = CString::new(path.as_os_str().to_str().unwrap_or("."))
            .map_err(|_| BackendError::InvalidConfig("data path contains a NUL byte".into()))?;

        // SAFETY: `c_path` is a valid NUL-terminated string for the duration
        // of this call, and `stat` is a plain-old-data struct zero-initialized
        // before libc fills it in.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(BackendError::Io(std::io::Error::last_os_error()));
        }

        let block_size = stat.f_frsize as u64;
        let free_bytes = stat.f_bavail as u64 * block_size;
        let total_bytes = stat.f_blocks as u64 * block_size;
        Ok(FsStat {
            used_bytes: total_bytes.saturating_sub(free_bytes),
            free_bytes,
        })
    }
}

impl BackendCallbacks for Backend {
    /// Filesystem usage of the data directory; falls back to its parent if
    /// the directory itself cannot be statted (spec.md §4.6 "Stats").
    fn stat(&self) -> Result<FsStat> {
        match Self::storage_stat(&self.data_path) {
            Ok(stat) => Ok(stat),
            Err(_) => {
                let parent = self.data_path.parent().unwrap_or(&self.data_path);
                Self::storage_stat(parent)
            }
        }
    }

    fn stats(&self) -> StatsReply {
        let fs = self.stat().unwrap_or_default();
        let engine_stats = self.engine.stats();
        StatsReply {
            fs,
            total_records: engine_stats.total_records,
            removed_records: engine_stats.removed_records,
        }
    }

    fn defrag_status(&self) -> DefragState {
        self.defrag.load()
    }

    fn defrag_start(&self) -> Result<()> {
        self.defrag.state_code.store(1, Ordering::Relaxed);
        self.defrag.percent.store(0, Ordering::Relaxed);
        info!("defrag pass starting");
        let result = self.engine.defrag();
        self.defrag.percent.store(100, Ordering::Relaxed);
        self.defrag.state_code.store(2, Ordering::Relaxed);
        match &result {
            Ok(()) => info!("defrag pass complete"),
            Err(e) => error!(error = %e, "defrag pass failed"),
        }
        result.map_err(BackendError::from)
    }

    /// Cleanup: stops maintenance threads, closes the engine, drops the
    /// mutex guard. Safe to call more than once.
    fn cleanup(&self) {
        if let Some(handles) = self.maintenance.lock().unwrap().take() {
            handles.stop.store(true, Ordering::Relaxed);
            for handle in handles.handles {
                let _ = handle.join();
            }
        }
        self.engine.close();
        info!("backend cleaned up");
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> BackendConfig {
        BackendConfig::from_str_config(&format!("[backend]\ndata = {}\n", dir.display())).unwrap()
    }

    #[test]
    fn init_opens_engine_and_reports_empty_stats() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::init(test_config(dir.path())).unwrap();
        let stats = backend.stats();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.removed_records, 0);
    }

    #[test]
    fn defrag_status_starts_idle_then_completes_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::init(test_config(dir.path())).unwrap();
        assert_eq!(backend.defrag_status(), DefragState::Idle);
        backend.defrag_start().unwrap();
        assert_eq!(backend.defrag_status(), DefragState::Complete);
    }

    #[test]
    fn empty_data_path_is_rejected() {
        let mut config = test_config(Path::new("/tmp"));
        config.data = String::new();
        assert!(matches!(
            Backend::init(config).unwrap_err(),
            BackendError::InvalidConfig(_)
        ));
    }

    #[test]
    fn stat_reports_nonzero_filesystem_totals() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::init(test_config(dir.path())).unwrap();
        let fs = backend.stat().unwrap();
        assert!(fs.free_bytes > 0 || fs.used_bytes > 0);
    }

    #[test]
    fn iterate_strips_extension_header_from_payload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::init(test_config(dir.path())).unwrap();

        let mut key = blobcodec::Key::ZERO;
        key.0[0] = 7;
        let mut io = blobcodec::IoAttr::new(key);
        io.size = 5;
        io.timestamp = 99;
        io.flags = blobcodec::CommandFlags::HAS_EXTHDR | blobcodec::CommandFlags::PLAIN_WRITE;
        crate::adapter::write(backend.engine(), &mut io, b"hello").unwrap();

        let mut seen = Vec::new();
        backend
            .iterate(|record| {
                seen.push((record.key, record.payload.clone(), record.size, record.extension_list.is_some()));
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 1);
        let (seen_key, payload, size, has_ext) = &seen[0];
        assert_eq!(*seen_key, key);
        assert_eq!(payload, b"hello");
        assert_eq!(*size, 5);
        assert!(*has_ext);
    }

    /// The defrag scheduler thread must wait out a full `defrag_timeout`
    /// before its first pass, not fire on every stop-flag poll tick.
    #[test]
    fn scheduled_defrag_waits_for_the_full_interval_before_first_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.defrag_timeout = std::time::Duration::from_millis(300);
        let backend = Arc::new(Backend::init(config).unwrap());

        backend.spawn_maintenance();

        std::thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(
            backend.defrag_status(),
            DefragState::Idle,
            "a pass must not run before a full defrag_timeout has elapsed"
        );

        std::thread::sleep(std::time::Duration::from_millis(450));
        assert_eq!(
            backend.defrag_status(),
            DefragState::Complete,
            "a pass must run once a full defrag_timeout has elapsed"
        );

        backend.cleanup();
    }
}

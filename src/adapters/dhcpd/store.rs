use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::adapters::{LocalFs, SystemClock};
use crate::domain::{LeaseError, LeaseSnapshot};
use crate::ports::{Clock, LeaseFile};

use super::parser::LeaseParser;

/// In-memory view of a dhcpd leases file, re-parsed only when the file's
/// modification time moves forward.
///
/// Refreshes are serialized by the lock around the last observed
/// modification time, which is held from the staleness check through the
/// commit. Parsed results are published as an immutable
/// [`LeaseSnapshot`] behind an `Arc`, so readers never wait on a parse and
/// never see the mapping of one pass paired with counters of another.
pub struct LeaseStore {
    path: PathBuf,
    debug: bool,
    fs: Arc<dyn LeaseFile>,
    clock: Arc<dyn Clock>,
    last_modified: Mutex<Option<SystemTime>>,
    snapshot: RwLock<Arc<LeaseSnapshot>>,
}

impl LeaseStore {
    /// Open the leases file at `path` and parse it once
    pub fn open(path: impl Into<PathBuf>, debug: bool) -> Result<Self, LeaseError> {
        Self::with_collaborators(path, debug, Arc::new(LocalFs), Arc::new(SystemClock))
    }

    pub fn with_collaborators(
        path: impl Into<PathBuf>,
        debug: bool,
        fs: Arc<dyn LeaseFile>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LeaseError> {
        let store = Self {
            path: path.into(),
            debug,
            fs,
            clock,
            last_modified: Mutex::new(None),
            snapshot: RwLock::new(Arc::new(LeaseSnapshot::default())),
        };

        if debug {
            debug!("Constructing lease store for {}", store.path.display());
        }

        store.read()?;
        Ok(store)
    }

    /// Re-synchronize with the file if its modification time advanced since
    /// the last refresh.
    ///
    /// On error the published snapshot is left as it was and the next call
    /// retries the same file version.
    pub fn read(&self) -> Result<(), LeaseError> {
        let mut last_modified = self
            .last_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let modified = self
            .fs
            .modified(&self.path)
            .map_err(|e| LeaseError::io(&self.path, e))?;

        if matches!(*last_modified, Some(last) if modified <= last) {
            if self.debug {
                debug!("{} has not changed since last read", self.path.display());
            }
            return Ok(());
        }

        // Queued callers see the store as caught up once they get the lock
        let previous = last_modified.replace(modified);

        if self.debug {
            debug!(
                "{} changed ({:?} > {:?}), parsing",
                self.path.display(),
                modified,
                previous
            );
        }

        match self.parse(modified) {
            Ok(snapshot) => {
                info!(
                    "Loaded {} leases from {} ({} valid, {} expired, {} skipped lines)",
                    snapshot.len(),
                    self.path.display(),
                    snapshot.valid,
                    snapshot.expired,
                    snapshot.warnings
                );
                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
                Ok(())
            }
            Err(e) => {
                *last_modified = previous;
                Err(e)
            }
        }
    }

    fn parse(&self, modified: SystemTime) -> Result<LeaseSnapshot, LeaseError> {
        let mut reader = self
            .fs
            .open(&self.path)
            .map_err(|e| LeaseError::io(&self.path, e))?;

        let now = self.clock.now();
        let mut parser = LeaseParser::new(self.debug);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| LeaseError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            // Hand-edited files may carry Latin-1 comments or hostnames
            let line = String::from_utf8_lossy(&buf);
            parser.feed(line.trim_end_matches(|c| c == '\n' || c == '\r'));
        }

        if self.debug {
            debug!("Scan finished with {} warnings", parser.warnings());
        }

        Ok(parser.finish(now, Some(DateTime::<Utc>::from(modified))))
    }

    /// The most recently published leases and counters
    pub fn snapshot(&self) -> Arc<LeaseSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Modification time of the file version behind the current snapshot
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.snapshot().modified
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::fs::File;
    use std::io::{self, BufReader, Cursor, Read, Write};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    /// Leases file held in memory with a controllable modification time
    #[derive(Default)]
    struct MemoryFile {
        modified: Mutex<Option<SystemTime>>,
        content: Mutex<Vec<u8>>,
        opens: AtomicUsize,
        fail_open: AtomicBool,
        fail_mid_stream: AtomicBool,
        open_delay: Option<Duration>,
    }

    /// Reader that fails once the preceding content is used up
    struct FaultyTail;

    impl Read for FaultyTail {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk fault"))
        }
    }

    impl MemoryFile {
        fn new(content: &str, modified: SystemTime) -> Self {
            Self {
                modified: Mutex::new(Some(modified)),
                content: Mutex::new(content.as_bytes().to_vec()),
                ..Default::default()
            }
        }

        fn write(&self, content: &[u8], modified: Option<SystemTime>) {
            *self.content.lock().unwrap() = content.to_vec();
            *self.modified.lock().unwrap() = modified;
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    impl LeaseFile for MemoryFile {
        fn modified(&self, _path: &Path) -> io::Result<SystemTime> {
            self.modified
                .lock()
                .unwrap()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn open(&self, _path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.open_delay {
                std::thread::sleep(delay);
            }
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            let content = Cursor::new(self.content.lock().unwrap().clone());
            if self.fail_mid_stream.load(Ordering::SeqCst) {
                return Ok(Box::new(BufReader::new(content.chain(FaultyTail))));
            }
            Ok(Box::new(content))
        }
    }

    const ONE_LEASE: &str = "lease 10.0.0.5 {\n  starts 3 2024/01/01 00:00:00;\n  ends 3 2024/01/01 12:00:00;\n  binding state free;\n}\n";
    const TWO_LEASES: &str = "lease 10.0.0.6 {\n  ends 3 2024/12/01 12:00:00;\n  binding state active;\n}\n\
                              lease 10.0.0.7 {\n  ends 3 2024/01/01 12:00:00;\n  binding state free;\n}\n";

    fn june_first() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn mtime(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn store_over(file: &Arc<MemoryFile>) -> LeaseStore {
        LeaseStore::with_collaborators(
            "/var/lib/dhcp/dhcpd.leases",
            false,
            file.clone(),
            Arc::new(FixedClock(june_first())),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_read_classifies_against_clock() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.valid, 0);
        assert_eq!(snapshot.expired, 1);
        assert_eq!(snapshot.parsed_at, Some(june_first()));
        assert_eq!(
            snapshot.get("10.0.0.5").unwrap().binding_state.as_deref(),
            Some("free")
        );
        assert_eq!(store.modified(), Some(DateTime::<Utc>::from(mtime(0))));
    }

    #[test]
    fn test_repeated_read_is_noop() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);
        let before = store.snapshot();

        store.read().unwrap();
        store.read().unwrap();

        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(store.modified(), before.modified);
        assert_eq!(file.opens(), 1);
    }

    #[test]
    fn test_newer_mtime_replaces_leases() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);

        file.write(TWO_LEASES.as_bytes(), Some(mtime(10)));
        store.read().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("10.0.0.5").is_none());
        assert_eq!(snapshot.valid, 1);
        assert_eq!(snapshot.expired, 1);
        assert_eq!(snapshot.valid + snapshot.expired, snapshot.len());
    }

    #[test]
    fn test_unchanged_mtime_ignores_new_content() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(10)));
        let store = store_over(&file);
        let before = store.snapshot();

        file.write(TWO_LEASES.as_bytes(), Some(mtime(10)));
        store.read().unwrap();
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        // An older mtime (clock skew) is not newer either
        file.write(TWO_LEASES.as_bytes(), Some(mtime(5)));
        store.read().unwrap();
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(file.opens(), 1);
    }

    #[test]
    fn test_same_content_newer_mtime_is_reparsed() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);
        let before = store.snapshot();

        file.write(ONE_LEASE.as_bytes(), Some(mtime(1)));
        store.read().unwrap();

        let after = store.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.leases, before.leases);
        assert_eq!(file.opens(), 2);
    }

    #[test]
    fn test_failed_open_keeps_data_and_retries() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);
        let before = store.snapshot();

        file.write(TWO_LEASES.as_bytes(), Some(mtime(10)));
        file.fail_open.store(true, Ordering::SeqCst);
        assert!(matches!(store.read(), Err(LeaseError::Io { .. })));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        file.fail_open.store(false, Ordering::SeqCst);
        store.read().unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_failed_stat_keeps_data() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);
        let before = store.snapshot();

        file.write(b"", None);
        assert!(store.read().is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_mid_stream_read_error_keeps_data() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);
        let before = store.snapshot();

        file.write(TWO_LEASES.as_bytes(), Some(mtime(10)));
        file.fail_mid_stream.store(true, Ordering::SeqCst);
        assert!(matches!(store.read(), Err(LeaseError::Io { .. })));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        file.fail_mid_stream.store(false, Ordering::SeqCst);
        store.read().unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let file = Arc::new(MemoryFile::new(ONE_LEASE, mtime(0)));
        let store = store_over(&file);

        file.write(
            b"# edited by Ren\xe9\r\nlease 10.0.0.9 {\r\n  client-hostname \"caf\xe9\";\r\n  binding state active;\r\n}\r\n",
            Some(mtime(10)),
        );
        store.read().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        let lease = snapshot.get("10.0.0.9").unwrap();
        assert_eq!(lease.hostname.as_deref(), Some("caf\u{fffd}"));
        assert_eq!(lease.binding_state.as_deref(), Some("active"));
        assert_eq!(snapshot.warnings, 0);
    }

    #[test]
    fn test_construction_fails_without_file() {
        let file = Arc::new(MemoryFile::default());
        let result = LeaseStore::with_collaborators(
            "/nonexistent/dhcpd.leases",
            true,
            file,
            Arc::new(FixedClock(june_first())),
        );
        assert!(matches!(result, Err(LeaseError::Io { .. })));
    }

    #[test]
    fn test_concurrent_readers_parse_once_per_version() {
        let file = Arc::new(MemoryFile {
            open_delay: Some(Duration::from_millis(20)),
            ..MemoryFile::new(ONE_LEASE, mtime(0))
        });
        let store = store_over(&file);
        file.write(TWO_LEASES.as_bytes(), Some(mtime(10)));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    store.read().unwrap();
                    let snapshot = store.snapshot();
                    assert_eq!(snapshot.valid + snapshot.expired, snapshot.len());
                });
            }
        });

        assert_eq!(file.opens(), 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_open_reads_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dhcpd.leases");
        let mut file = File::create(&path).unwrap();
        file.write_all(ONE_LEASE.as_bytes()).unwrap();
        file.set_modified(mtime(0)).unwrap();
        drop(file);

        let store = LeaseStore::open(&path, true).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(store.is_debug());
        assert_eq!(store.snapshot().len(), 1);

        let mut file = File::create(&path).unwrap();
        file.write_all(TWO_LEASES.as_bytes()).unwrap();
        file.set_modified(mtime(60)).unwrap();
        drop(file);

        store.read().unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("10.0.0.6").is_some());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LeaseStore::open(dir.path().join("dhcpd.leases"), false);
        assert!(matches!(result, Err(LeaseError::Io { .. })));
    }
}

use std::io::{self, BufRead};
use std::path::Path;
use std::time::SystemTime;

/// Port for the filesystem operations a lease refresh needs
pub trait LeaseFile: Send + Sync {
    /// Modification time of the file at `path`
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Open `path` as a line-readable stream
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead + Send>>;
}

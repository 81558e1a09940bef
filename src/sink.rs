//! Atomic file persistence. Plaintext is appended to `<target>.part` in the
//! target's own directory and only renamed to the final name once the whole
//! stream has arrived and authenticated, so the final path is never
//! partially visible.

use crate::TEMP_SUFFIX;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FileSink {
    target: PathBuf,
    temp: PathBuf,
    writer: BufWriter<File>,
}

/// Temp path lives next to the target so the final rename stays on one
/// volume (a single atomic filesystem operation).
fn temp_path(target: &Path) -> PathBuf {
    let mut os = target.as_os_str().to_os_string();
    os.push(TEMP_SUFFIX);
    PathBuf::from(os)
}

impl FileSink {
    /// Create (or truncate) the temporary file for a new transfer.
    pub fn open(target: &Path) -> io::Result<FileSink> {
        let temp = temp_path(target);
        debug!("Opening sink temp file: {}", temp.display());

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp)?;

        Ok(FileSink {
            target: target.to_path_buf(),
            temp,
            writer: BufWriter::new(file),
        })
    }

    /// Append one decrypted chunk. Writes are sequential; this sink is
    /// owned by exactly one session.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    /// Flush, sync, and atomically rename the temp file to the target.
    /// If any step fails the partial output is useless, so the temp file
    /// is removed before the error is returned.
    pub fn finalize(mut self) -> io::Result<PathBuf> {
        if let Err(e) = self.flush_and_rename() {
            let _ = fs::remove_file(&self.temp);
            return Err(e);
        }
        debug!("Finalized output file: {}", self.target.display());
        Ok(self.target)
    }

    fn flush_and_rename(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.temp, &self.target)
    }

    /// Drop the partial output. Removing an already-gone temp file is
    /// fine, so aborting twice (or after an external cleanup) is safe.
    pub fn abort(self) {
        drop(self.writer);
        match fs::remove_file(&self.temp) {
            Ok(()) => debug!("Removed temp file: {}", self.temp.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Failed to remove temp file {}: {}", self.temp.display(), e),
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_target(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("test_sink_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_append_and_finalize() {
        let target = test_target("finalize");

        let mut sink = FileSink::open(&target).expect("Should open sink");
        sink.append(b"hello ").unwrap();
        sink.append(b"world").unwrap();

        // target must not exist while the transfer is in flight
        assert!(!target.exists());
        assert!(temp_path(&target).exists());

        let written = sink.finalize().expect("Should finalize");
        assert_eq!(written, target);
        assert_eq!(fs::read(&target).unwrap(), b"hello world");
        assert!(!temp_path(&target).exists());

        let _ = fs::remove_file(&target);
    }

    #[test]
    fn test_abort_removes_temp() {
        let target = test_target("abort");

        let mut sink = FileSink::open(&target).expect("Should open sink");
        sink.append(b"partial data").unwrap();
        sink.abort();

        assert!(!target.exists());
        assert!(!temp_path(&target).exists());
    }

    #[test]
    fn test_abort_after_temp_already_gone() {
        let target = test_target("abort_gone");

        let sink = FileSink::open(&target).expect("Should open sink");
        fs::remove_file(sink.temp_path()).unwrap();

        // must not panic
        sink.abort();
        assert!(!target.exists());
    }

    #[test]
    fn test_finalize_overwrites_existing_target() {
        let target = test_target("overwrite");
        fs::write(&target, b"old contents").unwrap();

        let mut sink = FileSink::open(&target).unwrap();
        sink.append(b"new contents").unwrap();
        sink.finalize().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new contents");

        let _ = fs::remove_file(&target);
    }

    #[test]
    fn test_finalize_failure_removes_temp() {
        // make the rename fail: the target path is an existing directory
        let target = test_target("finalize_fail");
        fs::create_dir_all(&target).unwrap();

        let mut sink = FileSink::open(&target).expect("Should open sink");
        sink.append(b"doomed bytes").unwrap();

        sink.finalize()
            .expect_err("Rename onto a directory must fail");
        assert!(
            !temp_path(&target).exists(),
            "temp file must be removed when finalize fails"
        );

        let _ = fs::remove_dir_all(&target);
    }

    #[test]
    fn test_empty_stream_finalizes_to_empty_file() {
        let target = test_target("empty");

        let sink = FileSink::open(&target).unwrap();
        sink.finalize().unwrap();

        assert_eq!(fs::read(&target).unwrap().len(), 0);

        let _ = fs::remove_file(&target);
    }
}

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use super::record::{classify, Line, UserRecord};
use super::StoreError;

const LOCKFILE_SUFFIX: &str = ".lock";
const NEWFILE_SUFFIX: &str = ".new";

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Scan the users file for `username`. Lock-free: readers only ever see a
/// complete pre- or post-rename snapshot of the file.
///
/// Invalid lines are logged with their line number and skipped; they never
/// abort the scan.
pub fn lookup(path: &Path, username: &str) -> Result<Option<UserRecord>, StoreError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = String::new();
    let mut linenum = 0u32;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        linenum += 1;
        match classify(&line) {
            Line::Passthrough => {}
            Line::Invalid(reason) => {
                tracing::warn!(
                    file = %path.display(),
                    line = linenum,
                    %reason,
                    "ignoring invalid entry in users file"
                );
            }
            Line::Entry { username: u, .. } if u != username => {}
            Line::Entry { .. } => match UserRecord::parse_line(&line) {
                Ok(record) => return Ok(record),
                Err(reason) => {
                    tracing::warn!(
                        file = %path.display(),
                        line = linenum,
                        %reason,
                        "ignoring invalid entry in users file"
                    );
                }
            },
        }
    }
    Ok(None)
}

/// Rewrite the users file, replacing the entry for `record.username` with
/// the freshly serialized record. Returns whether a matching entry existed.
///
/// The rewrite streams into a sidecar `.new` file under an exclusive lock
/// on the `.lock` file, then atomically renames it over the original. Every
/// non-matching line, including comments, blanks and invalid entries, is
/// copied through byte-identical. On any failure the temporary file is
/// removed and the original is left untouched.
pub fn update(path: &Path, record: &UserRecord) -> Result<bool, StoreError> {
    let lock_path = sibling(path, LOCKFILE_SUFFIX);
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(&lock_path)
        .map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock.write().map_err(|source| StoreError::Lock {
        path: lock_path,
        source,
    })?;

    let new_path = sibling(path, NEWFILE_SUFFIX);
    let found = match rewrite(path, &new_path, record) {
        Ok(found) => found,
        Err(e) => {
            let _ = fs::remove_file(&new_path);
            return Err(e);
        }
    };
    if let Err(e) = fs::rename(&new_path, path) {
        let _ = fs::remove_file(&new_path);
        return Err(StoreError::Io(e));
    }
    Ok(found)
}

fn rewrite(path: &Path, new_path: &Path, record: &UserRecord) -> Result<bool, StoreError> {
    let mut reader = BufReader::new(File::open(path)?);
    // The users file holds raw secret keys; keep the replacement owner-only.
    let mut new_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(new_path)?;
    let mut line = String::new();
    let mut found = false;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        match classify(&line) {
            Line::Entry { username, .. } if username == record.username => {
                writeln!(new_file, "{record}")?;
                found = true;
            }
            _ => new_file.write_all(line.as_bytes())?,
        }
    }
    new_file.sync_all()?;
    Ok(found)
}

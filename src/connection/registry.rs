use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::BridgeError;

/// Canonical database file path -> number of handles holding it open, attachments included.
static OPEN_FILES: LazyLock<Mutex<HashMap<PathBuf, usize>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Where a connection's database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DbTarget {
    /// What the engine is asked to open.
    pub(crate) open_path: PathBuf,
    /// Absolute file path behind the target; `None` for in-memory databases.
    pub(crate) file: Option<PathBuf>,
}

impl DbTarget {
    pub(crate) fn resolve(name: &str, location: Option<&Path>) -> Result<Self, BridgeError> {
        if name.trim().is_empty() {
            return Err(BridgeError::Open {
                path: name.to_owned(),
                message: "database name is empty".into(),
            });
        }
        Self::from_path(Path::new(name), location).map_err(|err| BridgeError::Open {
            path: name.to_owned(),
            message: err.to_string(),
        })
    }

    /// Plain paths join `location`; `:memory:` and `file:` URIs go to the
    /// engine verbatim, with the file behind a URI still tracked.
    pub(crate) fn from_path(path: &Path, location: Option<&Path>) -> io::Result<Self> {
        let spelled = path.to_string_lossy();
        if spelled == ":memory:" {
            return Ok(Self {
                open_path: path.to_path_buf(),
                file: None,
            });
        }
        if spelled.starts_with("file:") {
            let file = uri_file(&spelled).map(std::path::absolute).transpose()?;
            return Ok(Self {
                open_path: path.to_path_buf(),
                file,
            });
        }
        let open_path = resolve_path(path, location);
        let file = std::path::absolute(&open_path)?;
        Ok(Self {
            open_path,
            file: Some(file),
        })
    }
}

/// Filesystem path named by a `file:` URI, or `None` for in-memory URIs.
fn uri_file(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file:")?;
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (path, query) = rest.split_once('?').map_or((rest, ""), |(p, q)| (p, q));
    if query.split('&').any(|pair| pair == "mode=memory") {
        return None;
    }
    let path = match path.strip_prefix("//") {
        Some(authority_and_path) => {
            let slash = authority_and_path.find('/')?;
            let authority = &authority_and_path[..slash];
            if !authority.is_empty() && authority != "localhost" {
                return None;
            }
            &authority_and_path[slash..]
        }
        None => path,
    };
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Join relative paths onto `location`.
pub(crate) fn resolve_path(path: &Path, location: Option<&Path>) -> PathBuf {
    match location {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Registry key for a file: its canonical path, so `..` segments and
/// symlinks name the same entry. Missing files keep the spelled path.
// A file that does not exist yet is keyed through its canonical parent, so
// the key matches the one computed once the engine has created it.
fn file_key(file: &Path) -> PathBuf {
    if let Ok(key) = fs::canonicalize(file) {
        return key;
    }
    match (file.parent(), file.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| file.to_path_buf()),
        _ => file.to_path_buf(),
    }
}

fn open_files() -> MutexGuard<'static, HashMap<PathBuf, usize>> {
    OPEN_FILES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `acquire` while holding the registry and record `file` as open on success.
/// Holding the lock keeps a concurrent delete from removing the file mid-open.
///
/// Returns the registry key to hand back to [`unregister`].
pub(crate) fn register_with<T>(
    file: Option<&Path>,
    acquire: impl FnOnce() -> Result<T, BridgeError>,
) -> Result<(T, Option<PathBuf>), BridgeError> {
    let mut files = open_files();
    let handle = acquire()?;
    let key = file.map(file_key);
    if let Some(key) = &key {
        *files.entry(key.clone()).or_insert(0) += 1;
    }
    Ok((handle, key))
}

pub(crate) fn unregister(key: &Path) {
    let mut files = open_files();
    if let Some(count) = files.get_mut(key) {
        *count -= 1;
        if *count == 0 {
            files.remove(key);
        }
    }
}

/// Remove a database file and its journal sidecars.
pub(crate) fn delete(target: &DbTarget) -> Result<(), BridgeError> {
    let Some(file) = &target.file else {
        return Err(BridgeError::InvalidState(format!(
            "{} is an in-memory database",
            target.open_path.display()
        )));
    };
    let files = open_files();
    let key = file_key(file);
    if files.contains_key(&key) {
        return Err(BridgeError::ResourceBusy(format!(
            "{} is held open by a connection",
            key.display()
        )));
    }
    fs::remove_file(&key)?;
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = key.clone().into_os_string();
        sidecar.push(suffix);
        match fs::remove_file(&sidecar) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
            _ => {}
        }
    }
    drop(files);
    debug!(path = %key.display(), "database file deleted");
    Ok(())
}

#[cfg(test)]
fn is_open(file: &Path) -> bool {
    open_files().contains_key(&file_key(file))
}

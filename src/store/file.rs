use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StateStore, StoreError};

const STATE_FILE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u8,
    entries: BTreeMap<String, String>, // base64 of the raw value
}

/// State store persisted as one JSON file.
///
/// Every mutation rewrites the whole file through a sibling temp file and a
/// rename, so a batch lands completely or not at all.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
}

impl FileStore {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => decode_state(&path, &bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(open_error(&path, err)),
        };
        debug!(path = %path.display(), records = entries.len(), "state file opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the state file; never the state file itself.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn flush(&self) -> io::Result<()> {
        let state = StateFile {
            version: STATE_FILE_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), general_purpose::STANDARD.encode(v)))
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }

    /// Applies `mutate` and persists; on a failed flush the in-memory view is
    /// restored so it keeps matching the file.
    fn commit(
        &mut self,
        mutate: impl FnOnce(&mut BTreeMap<String, Vec<u8>>),
    ) -> io::Result<()> {
        let previous = self.entries.clone();
        mutate(&mut self.entries);
        self.flush().map_err(|err| {
            self.entries = previous;
            err
        })
    }
}

fn decode_state(path: &Path, bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
    let state: StateFile = serde_json::from_slice(bytes).map_err(|e| open_error(path, e))?;
    if state.version != STATE_FILE_VERSION {
        return Err(open_error(
            path,
            format!("unsupported state file version {}", state.version),
        ));
    }
    state
        .entries
        .into_iter()
        .map(|(k, v)| {
            let raw = general_purpose::STANDARD
                .decode(v.as_bytes())
                .map_err(|e| open_error(path, format!("entry {k}: {e}")))?;
            Ok((k, raw))
        })
        .collect()
}

fn open_error(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Open {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

impl StateStore for FileStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.commit(|entries| {
            entries.insert(key.to_string(), value);
        })
        .map_err(|e| StoreError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.commit(|entries| {
            entries.remove(key);
        })
        .map_err(|e| StoreError::Delete {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn put_batch(&mut self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let keys = writes
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(",");
        self.commit(|entries| entries.extend(writes))
            .map_err(|e| StoreError::Write {
                key: keys,
                reason: e.to_string(),
            })
    }
}

//! 文件持久化的凭证存储
//!
//! 文件内容是一个 JSON 对象，凭证保存在 [`CREDENTIAL_KEY`] 下，其他键原样保留。
//! 写入先落到同目录临时文件再 rename，读者不会看到写了一半的文件。

use super::{CredentialStore, CREDENTIAL_KEY};
use crate::models::auth::Credential;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;

#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    current: RwLock<Option<Credential>>,
}

impl FileCredentialStore {
    /// 打开存储并加载已持久化的凭证；文件缺失或损坏时视为空
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match read_entries(&path) {
            Ok(entries) => entries.get(CREDENTIAL_KEY).and_then(|value| {
                serde_json::from_value::<Credential>(value.clone())
                    .map_err(|e| {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Stored credential is malformed, ignoring"
                        );
                    })
                    .ok()
            }),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read credential file, starting unauthenticated"
                );
                None
            }
        };

        tracing::debug!(
            path = %path.display(),
            authenticated = current.is_some(),
            "Credential store opened"
        );

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    fn persist(&self, credential: Option<&Credential>) {
        if let Err(e) = write_entry(&self.path, credential) {
            // 持久化失败不影响内存中的会话
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist credential"
            );
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, credential: Credential) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        self.persist(Some(&credential));
        *current = Some(credential);
    }

    fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if current.is_none() && !self.path.exists() {
            return;
        }
        self.persist(None);
        *current = None;
    }

    fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn read_entries(path: &Path) -> io::Result<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e),
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(entries) => Ok(entries),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "credential file is not a JSON object",
        )),
    }
}

fn write_entry(path: &Path, credential: Option<&Credential>) -> io::Result<()> {
    // 损坏的文件直接覆盖
    let mut entries = read_entries(path).unwrap_or_default();
    match credential {
        Some(credential) => {
            entries.insert(CREDENTIAL_KEY.to_string(), serde_json::to_value(credential)?);
        }
        None => {
            entries.remove(CREDENTIAL_KEY);
        }
    }

    write_private(path, &serde_json::to_vec_pretty(&Value::Object(entries))?)
}

/// 原子写入仅当前用户可读的文件
///
/// 临时文件由 `NamedTempFile` 以 0600 创建在目标同目录，写完后 persist（rename）到位，
/// 失败时临时文件随 drop 删除。
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

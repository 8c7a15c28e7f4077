//! Cookie 模式下的会话 cookie
//!
//! cookie jar 交给 reqwest 作为 cookie provider。打开时从文件加载，每次收到响应后写回，
//! 会话 cookie（无过期时间）也一并保存，行为与重新打开页面一致。

use crate::store::file::write_private;
use cookie_store::CookieStore;
use reqwest_cookie_store::CookieStoreMutex;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};

type StoreError = Box<dyn Error + Send + Sync>;

pub struct SessionCookies {
    jar: Arc<CookieStoreMutex>,
    path: Option<PathBuf>,
}

impl SessionCookies {
    /// 仅保存在进程内
    pub fn in_memory() -> Self {
        Self {
            jar: Arc::new(CookieStoreMutex::new(CookieStore::default())),
            path: None,
        }
    }

    /// 从文件加载；文件缺失或损坏时为空
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cookies = load(&path).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load session cookies, starting empty"
            );
            CookieStore::default()
        });

        Self {
            jar: Arc::new(CookieStoreMutex::new(cookies)),
            path: Some(path),
        }
    }

    pub(crate) fn provider(&self) -> Arc<CookieStoreMutex> {
        self.jar.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CookieStore> {
        self.jar.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().iter_any().next().is_none()
    }

    /// 写回文件；失败只记录告警
    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let mut buf = Vec::new();
        let serialized = {
            let jar = self.lock();
            cookie_store::serde::json::save_incl_expired_and_nonpersistent(&jar, &mut buf)
        };
        let result = serialized.and_then(|()| write_private(path, &buf).map_err(StoreError::from));

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist session cookies");
        }
    }

    /// 清空 jar 并删除持久化文件
    pub fn clear(&self) {
        self.lock().clear();

        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove session cookies")
                }
            }
        }
    }
}

fn load(path: &Path) -> Result<CookieStore, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CookieStore::default()),
        Err(e) => return Err(e.into()),
    };
    cookie_store::serde::json::load(BufReader::new(file))
}

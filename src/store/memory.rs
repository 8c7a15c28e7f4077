//! 进程内凭证存储

use super::CredentialStore;
use crate::models::auth::Credential;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, credential: Credential) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(credential);
    }

    fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }

    fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

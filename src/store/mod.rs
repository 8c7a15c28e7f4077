//! 凭证存储
//!
//! 同一时刻最多保存一份 [`Credential`]。存储对象在启动时创建，
//! 以 `Arc<dyn CredentialStore>` 注入 HTTP 客户端与认证服务。

pub mod file;
pub mod memory;

use crate::models::auth::Credential;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// 持久化文件中保存凭证所用的固定键名
pub const CREDENTIAL_KEY: &str = "token";

pub trait CredentialStore: Send + Sync {
    /// 保存凭证并整体替换旧值；持久化失败只记录告警，不向调用方报错
    fn set(&self, credential: Credential);

    /// 清除凭证，重复调用无副作用
    fn clear(&self);

    /// 读取当前凭证
    fn get(&self) -> Option<Credential>;

    fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}

//! 消息服务配置
//!
//! 对应配置文件中的 `[service]` 表，缺省字段取默认值。

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageServiceConfig {
    /// 待发送批处理的最大并发
    pub outstanding_concurrency: usize,
    /// 单批最多取出的待发送消息数
    pub outstanding_limit: usize,
    /// 分发后重新加载遇到 `NotFound` 时的重试次数
    pub reload_attempts: u32,
    pub reload_interval_ms: u64,
    /// 状态迁移遇到版本冲突时的重试次数
    pub update_retries: u32,
    /// 去重记录上未完成认领的租约
    pub claim_ttl_ms: u64,
}

impl Default for MessageServiceConfig {
    fn default() -> Self {
        Self {
            outstanding_concurrency: 8,
            outstanding_limit: 100,
            reload_attempts: 3,
            reload_interval_ms: 50,
            update_retries: 3,
            claim_ttl_ms: 30_000,
        }
    }
}

impl MessageServiceConfig {
    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        toml::from_str(raw)
            .map_err(|e| AppError::Validation(format!("invalid service configuration: {e}")))
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_millis(self.claim_ttl_ms)
    }
}

use crate::error::DomainResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// “该事件已被该处理器完整处理”的记录，写入一次、不更新不删除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListenerLog {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    /// 处理器签名，区分订阅同一事件类型的多个监听器
    pub handler: String,
    /// 处理耗时（毫秒）
    pub duration_ms: i64,
    pub handled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EventListenerLog {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        handler: impl Into<String>,
        duration_ms: i64,
        handled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            event_type: event_type.into(),
            handler: handler.into(),
            duration_ms,
            handled_at,
            created_at: Utc::now(),
        }
    }
}

/// 认领结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerClaim {
    /// 本次投递获得处理权
    Claimed,
    /// 已有完整处理记录，本次投递为重复
    AlreadyHandled,
    /// 另一次并发投递正在处理
    InProgress,
}

/// 去重日志仓储
///
/// `claim` 必须是针对（事件标识，处理器签名）的单次原子条件插入，
/// 这样两次并发重投不会同时越过存在性检查。
/// 未完成的认领带有租约：持有者崩溃或被中途丢弃后，租约过期即可被后续投递接管。
#[async_trait]
pub trait EventListenerLogRepository: Send + Sync {
    /// 是否已有完整处理记录
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool>;

    /// 原子认领处理权；租约已过期的未完成认领视为空闲
    async fn claim(&self, event_id: &str, handler: &str) -> Result<ListenerClaim>;

    /// 写入完整处理记录（完成认领）；已存在记录时不覆盖并返回 `false`
    async fn store(&self, log: &EventListenerLog) -> Result<bool>;

    /// 放弃未完成的认领，以便后续重投重新执行副作用
    async fn release(&self, event_id: &str, handler: &str) -> Result<()>;
}

#[async_trait]
impl<T> EventListenerLogRepository for Arc<T>
where
    T: EventListenerLogRepository + ?Sized,
{
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool> {
        (**self).has(event_id, handler).await
    }

    async fn claim(&self, event_id: &str, handler: &str) -> Result<ListenerClaim> {
        (**self).claim(event_id, handler).await
    }

    async fn store(&self, log: &EventListenerLog) -> Result<bool> {
        (**self).store(log).await
    }

    async fn release(&self, event_id: &str, handler: &str) -> Result<()> {
        (**self).release(event_id, handler).await
    }
}

use crate::{error::DomainResult as Result, message::Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 分页与过滤参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// 按内容的子串过滤
    #[serde(default)]
    pub query: Option<String>,
}

fn default_limit() -> usize {
    20
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            query: None,
        }
    }
}

/// 消息仓储：每个标识上的读写是原子的，跨标识不提供事务
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存新消息；标识已存在时返回 `Conflict`
    async fn store(&self, message: &Message) -> Result<()>;

    /// 保存一次状态迁移后的消息
    ///
    /// 仓储中的版本必须恰好是 `message.version - 1`，否则返回 `VersionConflict`，
    /// 调用方应重新加载后再迁移；不存在时返回 `NotFound`。
    async fn update(&self, message: &Message) -> Result<()>;

    /// 按标识加载；不存在时返回 `NotFound`
    async fn load(&self, id: Uuid) -> Result<Message>;

    /// 两个号码之间的消息，按 `order_timestamp` 倒序
    async fn index(&self, owner: &str, contact: &str, params: &IndexParams) -> Result<Vec<Message>>;

    /// 等待交给手机发送的消息，按 `order_timestamp` 正序
    async fn get_outstanding(&self, limit: usize) -> Result<Vec<Message>>;
}

#[async_trait]
impl<T> MessageRepository for Arc<T>
where
    T: MessageRepository + ?Sized,
{
    async fn store(&self, message: &Message) -> Result<()> {
        (**self).store(message).await
    }

    async fn update(&self, message: &Message) -> Result<()> {
        (**self).update(message).await
    }

    async fn load(&self, id: Uuid) -> Result<Message> {
        (**self).load(id).await
    }

    async fn index(&self, owner: &str, contact: &str, params: &IndexParams) -> Result<Vec<Message>> {
        (**self).index(owner, contact, params).await
    }

    async fn get_outstanding(&self, limit: usize) -> Result<Vec<Message>> {
        (**self).get_outstanding(limit).await
    }
}

//! 消息服务各操作的参数
//!
//! 与领域模型解耦，序列化友好，便于由接口层直接反序列化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sms_domain::message::MessageEventName;
use sms_domain::persist::IndexParams;
use uuid::Uuid;

/// 以给定标识创建消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStoreParams {
    pub id: Uuid,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// 对已有消息施加一次状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleMessageParams {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// API 受理的发送请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub source: String,
    pub request_received_at: DateTime<Utc>,
}

/// 手机上报的收件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceiveParams {
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageGetOutstandingParams {
    pub source: String,
    /// 缺省时使用服务配置中的 `outstanding_limit`
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageGetParams {
    pub owner: String,
    pub contact: String,
    #[serde(flatten)]
    pub index: IndexParams,
}

/// 手机就某条消息上报的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStorePhoneEventParams {
    pub message_id: Uuid,
    pub event_name: MessageEventName,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

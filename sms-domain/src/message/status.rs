use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// 消息方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// 手机 → API（手机已收到的短信）
    #[serde(rename = "mobile-originated")]
    MobileOriginated,
    /// API → 手机（等待手机发出的短信）
    #[serde(rename = "mobile-terminated")]
    MobileTerminated,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::MobileOriginated => "mobile-originated",
            MessageType::MobileTerminated => "mobile-terminated",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消息状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sending,
    Sent,
    Received,
}

impl MessageStatus {
    /// 允许记录发送尝试的状态集合（手机可能对同一条消息重试多次）
    pub const SEND_ATTEMPT_ALLOWED: &'static [MessageStatus] =
        &[MessageStatus::Pending, MessageStatus::Sending];

    /// 允许确认“已发送”的状态集合：必须先进入过 `Sending`
    pub const SENT_CONFIRMATION_ALLOWED: &'static [MessageStatus] = &[MessageStatus::Sending];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Received => "received",
        }
    }

    /// 终态：`Sent`（MobileTerminated）与 `Received`（MobileOriginated）
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Received)
    }

    /// 状态在前进方向上的序号
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sending => 1,
            MessageStatus::Sent | MessageStatus::Received => 2,
        }
    }

    /// 转换表：只允许原地停留在 `Sending`（重试）或向前推进
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (MessageStatus::Pending, MessageStatus::Sending)
                | (MessageStatus::Sending, MessageStatus::Sending)
                | (MessageStatus::Sending, MessageStatus::Sent)
        )
    }

    /// 将状态集合格式化为错误信息中的“期望状态”
    pub fn describe_set(set: &[MessageStatus]) -> String {
        let names: Vec<&str> = set.iter().map(MessageStatus::as_str).collect();
        format!("[{}]", names.join(", "))
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 手机针对一条已有消息上报的事件名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageEventName {
    Sent,
    Delivered,
    Failed,
}

impl MessageEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageEventName::Sent => "SENT",
            MessageEventName::Delivered => "DELIVERED",
            MessageEventName::Failed => "FAILED",
        }
    }
}

impl fmt::Display for MessageEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageEventName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(MessageEventName::Sent),
            "DELIVERED" => Ok(MessageEventName::Delivered),
            "FAILED" => Ok(MessageEventName::Failed),
            other => Err(DomainError::Parse {
                reason: format!("unknown message event name [{other}]"),
            }),
        }
    }
}

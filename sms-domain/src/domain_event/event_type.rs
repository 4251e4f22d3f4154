use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// 四种规范消息事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageEventType {
    /// API 已受理发送请求
    #[serde(rename = "message.api.sent")]
    ApiSent,
    /// 手机正在发送
    #[serde(rename = "message.phone.sending")]
    PhoneSending,
    /// 手机确认已发送
    #[serde(rename = "message.phone.sent")]
    PhoneSent,
    /// 手机收到一条短信
    #[serde(rename = "message.phone.received")]
    PhoneReceived,
}

impl MessageEventType {
    pub const ALL: [MessageEventType; 4] = [
        MessageEventType::ApiSent,
        MessageEventType::PhoneSending,
        MessageEventType::PhoneSent,
        MessageEventType::PhoneReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageEventType::ApiSent => "message.api.sent",
            MessageEventType::PhoneSending => "message.phone.sending",
            MessageEventType::PhoneSent => "message.phone.sent",
            MessageEventType::PhoneReceived => "message.phone.received",
        }
    }
}

impl fmt::Display for MessageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageEventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::Parse {
                reason: format!("unknown event type [{s}]"),
            })
    }
}

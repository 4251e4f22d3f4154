//! 领域层统一错误定义
//!
//! 覆盖序列化/解码、事件分发、仓储与状态机校验等最小必要集合，
//! 便于在应用层统一包装为带上下文的错误。
//!
use thiserror::Error;
use uuid::Uuid;

use crate::message::MessageStatus;

/// 统一错误类型（领域层最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/解码 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
    #[error("cannot decode event [{event_id}] of type [{event_type}]: {reason}")]
    Decode {
        event_id: String,
        event_type: String,
        reason: String,
    },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, event={event_id}: {source:#}")]
    EventHandler {
        handler: String,
        event_id: String,
        #[source]
        source: anyhow::Error,
    },

    // --- 仓储/持久化 ---
    #[error("repository error: {reason}")]
    Repository { reason: String },
    #[error("conflict: {reason}")]
    Conflict { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("version conflict on message [{message_id}]: expected={expected}, actual={actual}")]
    VersionConflict {
        message_id: Uuid,
        expected: u64,
        actual: u64,
    },

    // --- 状态机/值校验 ---
    #[error("message [{message_id}] has wrong status [{actual}]. expected {expected}")]
    InvalidState {
        message_id: Uuid,
        actual: MessageStatus,
        expected: String,
    },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        DomainError::EventBus {
            reason: reason.into(),
        }
    }

    pub fn repository(reason: impl Into<String>) -> Self {
        DomainError::Repository {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        DomainError::NotFound {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        DomainError::Conflict {
            reason: reason.into(),
        }
    }

    /// 是否为“记录不存在”，调用方可据此映射为 404 语义
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    /// 是否值得由调用方/传输层重试
    ///
    /// 解码失败与状态校验失败属于永久性错误，重投不会改变结果。
    pub fn is_retriable(&self) -> bool {
        match self {
            DomainError::EventBus { .. }
            | DomainError::Repository { .. }
            | DomainError::Conflict { .. }
            | DomainError::VersionConflict { .. } => true,
            DomainError::EventHandler { source, .. } => source
                .downcast_ref::<DomainError>()
                .is_none_or(DomainError::is_retriable),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(DomainError::not_found("message").is_not_found());
        assert!(!DomainError::not_found("message").is_retriable());
        assert!(DomainError::repository("down").is_retriable());
        assert!(
            DomainError::VersionConflict {
                message_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }
            .is_retriable()
        );

        let decode = DomainError::Decode {
            event_id: "e-1".into(),
            event_type: "message.phone.sent".into(),
            reason: "missing field `id`".into(),
        };
        assert!(!decode.is_retriable());

        let wrapped = DomainError::EventHandler {
            handler: "h".into(),
            event_id: "e-1".into(),
            source: anyhow::Error::new(decode),
        };
        assert!(!wrapped.is_retriable());

        let opaque = DomainError::EventHandler {
            handler: "h".into(),
            event_id: "e-2".into(),
            source: anyhow::anyhow!("timeout"),
        };
        assert!(opaque.is_retriable());
    }
}

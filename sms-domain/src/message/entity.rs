use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{MessageStatus, MessageType};
use crate::error::{DomainError, DomainResult};

/// 一条端到端跟踪的短信
///
/// 标识由首个事件的生产者分配（而非存储层），创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// API 侧号码
    pub owner: String,
    /// 对端号码
    pub contact: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub request_received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 与存储插入顺序无关的时间排序键
    pub order_timestamp: DateTime<Utc>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub send_attempt_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    /// 最近一次发送尝试到确认发送之间的耗时（毫秒）
    pub send_duration_ms: Option<i64>,
    /// 每次状态迁移加一，仓储据此做乐观锁校验
    #[serde(default)]
    pub version: u64,
}

impl Message {
    /// API 受理的待发送消息，初始状态 `Pending`
    pub fn mobile_terminated(
        id: Uuid,
        owner: impl Into<String>,
        contact: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner: owner.into(),
            contact: contact.into(),
            content: content.into(),
            message_type: MessageType::MobileTerminated,
            status: MessageStatus::Pending,
            request_received_at: timestamp,
            created_at: now,
            updated_at: now,
            order_timestamp: timestamp,
            last_attempted_at: None,
            send_attempt_count: 0,
            sent_at: None,
            received_at: None,
            send_duration_ms: None,
            version: 0,
        }
    }

    /// 手机已收到的消息，创建即处于终态 `Received`
    pub fn mobile_originated(
        id: Uuid,
        owner: impl Into<String>,
        contact: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner: owner.into(),
            contact: contact.into(),
            content: content.into(),
            message_type: MessageType::MobileOriginated,
            status: MessageStatus::Received,
            request_received_at: timestamp,
            created_at: now,
            updated_at: now,
            order_timestamp: timestamp,
            last_attempted_at: None,
            send_attempt_count: 0,
            sent_at: None,
            received_at: Some(timestamp),
            send_duration_ms: None,
            version: 0,
        }
    }

    /// 是否处于“发送中”（可记录发送尝试）的状态
    pub fn is_sending(&self) -> bool {
        MessageStatus::SEND_ATTEMPT_ALLOWED.contains(&self.status)
    }

    /// 是否为等待交给手机发送的消息
    pub fn is_outstanding(&self) -> bool {
        self.message_type == MessageType::MobileTerminated && self.status == MessageStatus::Pending
    }

    /// 记录一次发送尝试：进入（或停留在）`Sending`
    pub fn add_send_attempt(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.guard(MessageStatus::SEND_ATTEMPT_ALLOWED)?;
        self.advance(MessageStatus::Sending)?;

        self.last_attempted_at = Some(at);
        self.send_attempt_count += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 确认已发送：终态 `Sent`，`sent_at` 只设置这一次
    pub fn sent(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.guard(MessageStatus::SENT_CONFIRMATION_ALLOWED)?;
        self.advance(MessageStatus::Sent)?;

        let started = self.last_attempted_at.unwrap_or(self.request_received_at);
        self.send_duration_ms = Some((at - started).num_milliseconds().max(0));
        self.sent_at = Some(at);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn guard(&self, allowed: &[MessageStatus]) -> DomainResult<()> {
        if allowed.contains(&self.status) {
            return Ok(());
        }

        Err(DomainError::InvalidState {
            message_id: self.id,
            actual: self.status,
            expected: MessageStatus::describe_set(allowed),
        })
    }

    fn advance(&mut self, next: MessageStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidState {
                message_id: self.id,
                actual: self.status,
                expected: MessageStatus::describe_set(&[next]),
            });
        }
        self.status = next;
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn mobile_terminated_starts_pending() {
        let id = Uuid::new_v4();
        let m = Message::mobile_terminated(id, "+1000", "+2000", "hi", t0());

        assert_eq!(m.id, id);
        assert_eq!(m.status, MessageStatus::Pending);
        assert_eq!(m.message_type, MessageType::MobileTerminated);
        assert_eq!(m.request_received_at, t0());
        assert_eq!(m.order_timestamp, t0());
        assert!(m.last_attempted_at.is_none());
        assert!(m.sent_at.is_none());
        assert!(m.received_at.is_none());
        assert!(m.send_duration_ms.is_none());
        assert!(m.is_outstanding());
    }

    #[test]
    fn mobile_originated_is_received() {
        let m = Message::mobile_originated(Uuid::new_v4(), "+1000", "+2000", "yo", t0());

        assert_eq!(m.status, MessageStatus::Received);
        assert_eq!(m.received_at, Some(t0()));
        assert_eq!(m.order_timestamp, t0());
        assert!(!m.is_sending());
        assert!(!m.is_outstanding());
    }

    #[test]
    fn attempt_then_sent_computes_duration() {
        let mut m = Message::mobile_terminated(Uuid::new_v4(), "+1000", "+2000", "hi", t0());

        m.add_send_attempt(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(m.status, MessageStatus::Sending);
        assert_eq!(m.last_attempted_at, Some(t0() + Duration::seconds(1)));
        assert_eq!(m.send_attempt_count, 1);

        m.sent(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(m.status, MessageStatus::Sent);
        assert_eq!(m.sent_at, Some(t0() + Duration::seconds(5)));
        assert_eq!(m.send_duration_ms, Some(4_000));
        assert_eq!(m.version, 2);
    }

    #[test]
    fn repeated_attempts_stay_sending() {
        let mut m = Message::mobile_terminated(Uuid::new_v4(), "+1000", "+2000", "hi", t0());

        m.add_send_attempt(t0() + Duration::seconds(1)).unwrap();
        m.add_send_attempt(t0() + Duration::seconds(3)).unwrap();

        assert_eq!(m.status, MessageStatus::Sending);
        assert_eq!(m.send_attempt_count, 2);

        m.sent(t0() + Duration::seconds(4)).unwrap();
        assert_eq!(m.send_duration_ms, Some(1_000));
    }

    #[test]
    fn sent_on_pending_is_rejected_and_leaves_message_unchanged() {
        let mut m = Message::mobile_terminated(Uuid::new_v4(), "+1000", "+2000", "hi", t0());
        let before = m.clone();

        let err = m.sent(t0() + Duration::seconds(5)).unwrap_err();
        match err {
            DomainError::InvalidState {
                actual, expected, ..
            } => {
                assert_eq!(actual, MessageStatus::Pending);
                assert_eq!(expected, "[sending]");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(m, before);
        assert_eq!(m.version, 0);
    }

    #[test]
    fn terminal_timestamps_never_change() {
        let mut m = Message::mobile_terminated(Uuid::new_v4(), "+1000", "+2000", "hi", t0());
        m.add_send_attempt(t0() + Duration::seconds(1)).unwrap();
        m.sent(t0() + Duration::seconds(2)).unwrap();
        let sent_at = m.sent_at;

        assert!(m.sent(t0() + Duration::seconds(9)).is_err());
        assert!(m.add_send_attempt(t0() + Duration::seconds(9)).is_err());
        assert_eq!(m.sent_at, sent_at);
        assert_eq!(m.status, MessageStatus::Sent);

        let mut r = Message::mobile_originated(Uuid::new_v4(), "+1000", "+2000", "yo", t0());
        assert!(r.add_send_attempt(t0() + Duration::seconds(1)).is_err());
        assert!(r.sent(t0() + Duration::seconds(1)).is_err());
        assert_eq!(r.received_at, Some(t0()));
    }

    #[test]
    fn sent_before_attempt_clamps_duration() {
        let mut m = Message::mobile_terminated(Uuid::new_v4(), "+1000", "+2000", "hi", t0());
        m.add_send_attempt(t0() + Duration::seconds(10)).unwrap();
        m.sent(t0() + Duration::seconds(8)).unwrap();

        assert_eq!(m.send_duration_ms, Some(0));
    }
}

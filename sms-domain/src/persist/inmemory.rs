//! 基于内存的仓储实现
//!
//! 使用 `DashMap` 的 entry API 保证单个键上的检查与写入是原子的。
//! 适用于测试、示例与单进程部署。
//!
use super::{
    EventListenerLog, EventListenerLogRepository, IndexParams, ListenerClaim, MessageRepository,
};
use crate::error::{DomainError, DomainResult as Result};
use crate::message::Message;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 未完成认领的默认租约
const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(30);

#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<DashMap<Uuid, Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn store(&self, message: &Message) -> Result<()> {
        match self.messages.entry(message.id) {
            Entry::Occupied(_) => Err(DomainError::conflict(format!(
                "message with id [{}] already exists",
                message.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(message.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, message: &Message) -> Result<()> {
        let Some(mut current) = self.messages.get_mut(&message.id) else {
            return Err(DomainError::not_found(format!(
                "message with id [{}]",
                message.id
            )));
        };

        // 持有分片写锁期间比较并替换
        if current.version + 1 != message.version {
            return Err(DomainError::VersionConflict {
                message_id: message.id,
                expected: message.version.saturating_sub(1),
                actual: current.version,
            });
        }

        *current = message.clone();
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Message> {
        self.messages
            .get(&id)
            .map(|m| m.clone())
            .ok_or_else(|| DomainError::not_found(format!("message with id [{id}]")))
    }

    async fn index(&self, owner: &str, contact: &str, params: &IndexParams) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.owner == owner && m.contact == contact)
            .filter(|m| {
                params
                    .query
                    .as_deref()
                    .is_none_or(|q| m.content.contains(q))
            })
            .map(|m| m.clone())
            .collect();

        messages.sort_by(|a, b| b.order_timestamp.cmp(&a.order_timestamp));

        Ok(messages
            .into_iter()
            .skip(params.skip)
            .take(params.limit)
            .collect())
    }

    async fn get_outstanding(&self, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.is_outstanding())
            .map(|m| m.clone())
            .collect();

        messages.sort_by(|a, b| a.order_timestamp.cmp(&b.order_timestamp));
        messages.truncate(limit);

        Ok(messages)
    }
}

#[derive(Debug, Clone)]
enum LogSlot {
    InProgress { claimed_at: Instant },
    Handled(EventListenerLog),
}

#[derive(Clone)]
pub struct InMemoryEventListenerLogRepository {
    entries: Arc<DashMap<(String, String), LogSlot>>,
    claim_ttl: Duration,
}

impl Default for InMemoryEventListenerLogRepository {
    fn default() -> Self {
        Self::with_claim_ttl(DEFAULT_CLAIM_TTL)
    }
}

impl InMemoryEventListenerLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定未完成认领的租约，过期后可被后续投递接管
    pub fn with_claim_ttl(claim_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            claim_ttl,
        }
    }

    /// 已完成的处理记录数
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), LogSlot::Handled(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已完成的处理记录快照
    pub fn entries(&self) -> Vec<EventListenerLog> {
        self.entries
            .iter()
            .filter_map(|e| match e.value() {
                LogSlot::Handled(log) => Some(log.clone()),
                LogSlot::InProgress { .. } => None,
            })
            .collect()
    }

    fn key(event_id: &str, handler: &str) -> (String, String) {
        (event_id.to_string(), handler.to_string())
    }
}

#[async_trait]
impl EventListenerLogRepository for InMemoryEventListenerLogRepository {
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool> {
        Ok(matches!(
            self.entries.get(&Self::key(event_id, handler)).as_deref(),
            Some(LogSlot::Handled(_))
        ))
    }

    async fn claim(&self, event_id: &str, handler: &str) -> Result<ListenerClaim> {
        let now = Instant::now();
        let claim = match self.entries.entry(Self::key(event_id, handler)) {
            Entry::Vacant(slot) => {
                slot.insert(LogSlot::InProgress { claimed_at: now });
                ListenerClaim::Claimed
            }
            Entry::Occupied(mut slot) => {
                let expired = match slot.get() {
                    LogSlot::Handled(_) => return Ok(ListenerClaim::AlreadyHandled),
                    LogSlot::InProgress { claimed_at } => {
                        now.duration_since(*claimed_at) >= self.claim_ttl
                    }
                };
                if !expired {
                    return Ok(ListenerClaim::InProgress);
                }

                tracing::warn!(event_id, handler, "taking over expired listener claim");
                slot.insert(LogSlot::InProgress { claimed_at: now });
                ListenerClaim::Claimed
            }
        };
        Ok(claim)
    }

    async fn store(&self, log: &EventListenerLog) -> Result<bool> {
        let stored = match self.entries.entry(Self::key(&log.event_id, &log.handler)) {
            Entry::Vacant(slot) => {
                slot.insert(LogSlot::Handled(log.clone()));
                true
            }
            Entry::Occupied(mut slot) => {
                if matches!(slot.get(), LogSlot::Handled(_)) {
                    false
                } else {
                    slot.insert(LogSlot::Handled(log.clone()));
                    true
                }
            }
        };
        Ok(stored)
    }

    async fn release(&self, event_id: &str, handler: &str) -> Result<()> {
        self.entries
            .remove_if(&Self::key(event_id, handler), |_, slot| {
                matches!(slot, LogSlot::InProgress { .. })
            });
        Ok(())
    }
}

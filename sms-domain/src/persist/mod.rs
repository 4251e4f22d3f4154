//! 持久化协议（persist）
//!
//! 定义消息仓储与事件处理日志（去重日志）仓储的接口，并提供基于内存的实现：
//! - `MessageRepository`：消息的存取、按会话分页查询与待发送集合；
//! - `EventListenerLogRepository`：以（事件标识，处理器签名）为键的幂等账本，
//!   认领（claim）为单次原子条件插入。
//!
//! 具体存储后端（如 Postgres）由上层提供实现并注入。
//!
mod event_listener_log;
mod inmemory;
mod message_repository;

pub use event_listener_log::{EventListenerLog, EventListenerLogRepository, ListenerClaim};
pub use inmemory::{InMemoryEventListenerLogRepository, InMemoryMessageRepository};
pub use message_repository::{IndexParams, MessageRepository};

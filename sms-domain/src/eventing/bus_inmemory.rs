//! 内存版事件总线（InMemoryEventBus）
//!
//! 基于 `tokio::sync::broadcast` 的异步传输，满足 `EventDispatcher` 协议：
//! - `dispatch`：克隆并广播事件，立即返回，不等待任何处理器；
//! - `subscribe`：返回 `'static` 生命周期事件流，交给 `EventEngine` 消费；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：分发返回时副作用尚不可见，调用方需要轮询等待。

use crate::domain_event::EventEnvelope;
use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::EventDispatcher;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// 简单的内存事件总线实现
#[derive(Clone)]
pub struct InMemoryEventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl InMemoryEventBus {
    /// 创建一个内存总线，`capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 返回一个 'static 生命周期的事件流，便于在 tokio::spawn 中使用
    pub fn subscribe(&self) -> BoxStream<'static, Result<EventEnvelope>> {
        let rx = self.tx.subscribe();
        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| DomainError::event_bus(e.to_string())));
        Box::pin(stream)
    }
}

#[async_trait]
impl EventDispatcher for InMemoryEventBus {
    async fn dispatch(&self, event: &EventEnvelope) -> Result<()> {
        // 无订阅者时事件无人接收：对调用方而言这是传输失败
        self.tx
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| DomainError::event_bus(format!("no subscriber for event [{}]", event.id())))
    }
}

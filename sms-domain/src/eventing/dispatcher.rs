//! 事件分发器（EventDispatcher）协议
//!
//! 传输假定为“至少一次”投递；重试（如有）属于传输层职责。
//!
use crate::{domain_event::EventEnvelope, error::DomainResult as Result};
use async_trait::async_trait;
use std::sync::Arc;

/// 事件分发器：把事件信封发布到传输层
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: &EventEnvelope) -> Result<()>;
}

#[async_trait]
impl<T> EventDispatcher for Arc<T>
where
    T: EventDispatcher + ?Sized,
{
    async fn dispatch(&self, event: &EventEnvelope) -> Result<()> {
        (**self).dispatch(event).await
    }
}

//! 进程内分发器（LocalEventDispatcher）
//!
//! “分发即处理”：`dispatch` 在所有匹配的处理器执行完毕后才返回，
//! 因此调用方在分发之后立即重新加载即可看到处理器产生的状态变化。
//!
use super::{EventDispatcher, EventHandler, HandlerRegistry};
use crate::domain_event::EventEnvelope;
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, stream};
use std::sync::Arc;
use tracing::{debug, warn};

/// 同一事件广播给多个处理器时的默认并发
const DEFAULT_HANDLER_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct LocalEventDispatcher {
    registry: HandlerRegistry,
    handler_concurrency: usize,
}

impl Default for LocalEventDispatcher {
    fn default() -> Self {
        Self {
            registry: HandlerRegistry::default(),
            handler_concurrency: DEFAULT_HANDLER_CONCURRENCY,
        }
    }
}

impl LocalEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler_concurrency(mut self, concurrency: usize) -> Self {
        self.handler_concurrency = concurrency.max(1);
        self
    }

    /// 注册处理器（可在分发器被共享之后进行）
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        self.registry.register(handler);
    }

    pub fn register_all(&self, handlers: impl IntoIterator<Item = Arc<dyn EventHandler>>) {
        for h in handlers {
            self.registry.register(h);
        }
    }
}

#[async_trait]
impl EventDispatcher for LocalEventDispatcher {
    async fn dispatch(&self, event: &EventEnvelope) -> Result<()> {
        let handlers = self.registry.matching(event.event_type());
        if handlers.is_empty() {
            debug!(
                event_id = %event.id(),
                event_type = %event.event_type(),
                "no handler registered for event"
            );
            return Ok(());
        }

        let pending: Vec<BoxFuture<'_, Result<()>>> = handlers
            .into_iter()
            .map(|h| {
                async move {
                    h.handle(event)
                        .await
                        .map_err(|source| DomainError::EventHandler {
                            handler: h.handler_name().to_string(),
                            event_id: event.id().to_string(),
                            source,
                        })
                }
                .boxed()
            })
            .collect();

        let outcomes: Vec<Result<()>> = stream::iter(pending)
            .buffer_unordered(self.handler_concurrency)
            .collect()
            .await;

        let mut first_error = None;
        for outcome in outcomes {
            if let Err(err) = outcome {
                warn!(event_id = %event.id(), error = %err, "event handler failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

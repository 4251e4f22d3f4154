//! 事件引擎（EventEngine）
//!
//! 异步总线的长驻消费者：
//! - 订阅总线事件流，按处理器匹配分发并发执行；
//! - 处理失败仅记录日志，重投由传输层负责；
//! - 提供关闭与等待的 `EngineHandle`。
//!
use super::{EventHandler, HandlerRegistry, InMemoryEventBus};
use bon::Builder;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_engine_builder::{IsUnset, SetRegistry, State as BuilderState};

/// EventEngine：订阅 Bus 的事件流，分发到匹配的 Handler，并发处理
#[derive(Builder)]
pub struct EventEngine {
    event_bus: InMemoryEventBus,
    #[builder(setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: EventEngineConfig,
}

impl<S: BuilderState> EventEngineBuilder<S> {
    pub fn event_handlers(
        self,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> EventEngineBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(HandlerRegistry::new(handlers))
    }
}

impl EventEngine {
    /// 启动事件引擎，返回可用于关闭/等待的句柄
    ///
    /// 订阅在返回前完成，之后分发的事件不会丢失。
    pub fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(Self::subscribe_loop(self.clone(), token.clone()));

        EngineHandle {
            token,
            tasks: vec![task],
        }
    }

    fn subscribe_loop(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut stream = self.event_bus.subscribe();

        async move {
            let registry = self.registry.clone();
            let concurrency = self.config.handler_concurrency.max(1);
            info!("event engine started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        break;
                    }
                    maybe_event = stream.next() => {
                        match maybe_event {
                            Some(Ok(event)) => {
                                let merged = registry.matching(event.event_type());
                                if merged.is_empty() {
                                    debug!(event_id = %event.id(), event_type = %event.event_type(), "no handler for event");
                                    continue;
                                }

                                stream::iter(merged)
                                    .for_each_concurrent(Some(concurrency), |h| {
                                        let ev = event.clone();
                                        async move {
                                            if let Err(err) = h.handle(&ev).await {
                                                error!(
                                                    handler = %h.handler_name(),
                                                    event_id = %ev.id(),
                                                    event_type = %ev.event_type(),
                                                    error = %format!("{err:#}"),
                                                    "event handler failed"
                                                );
                                            }
                                        }
                                    })
                                    .await;
                            }
                            None => {
                                break;
                            }
                            Some(Err(err)) => {
                                // 广播缓冲区溢出时会丢失事件，继续处理下一个
                                warn!(error = %err, "event stream error");
                            }
                        }
                    }
                }
            }

            info!("event engine stopped");
        }
    }
}

/// 事件引擎配置
#[derive(Clone, Copy, Debug)]
pub struct EventEngineConfig {
    /// 单事件的处理并发（同一事件广播给多个 handler）
    pub handler_concurrency: usize,
}

impl Default for EventEngineConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

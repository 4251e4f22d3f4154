//! 消息事件监听层（MessageListener）
//!
//! 每种事件类型绑定一个处理器，控制流完全一致：
//! 1. 以签名 `MessageListener.<事件类型>` 认领去重记录；
//! 2. 已处理过则记录日志并直接成功；另一次投递正在处理则返回可重试的冲突；
//! 3. 解码载荷，调用对应的生命周期操作；
//! 4. 成功后写入去重记录，失败则释放认领，使后续重投能够重新执行副作用。
//!
use crate::context::AppContext;
use crate::error::{AppError, AppResult, ResultExt};
use crate::message_service::MessageService;
use crate::params::{HandleMessageParams, MessageStoreParams};
use async_trait::async_trait;
use chrono::Utc;
use sms_domain::domain_event::{
    EventEnvelope, MessageApiSentPayload, MessageEventPayload, MessageEventType,
    MessagePhoneReceivedPayload, MessagePhoneSendingPayload, MessagePhoneSentPayload,
};
use sms_domain::eventing::{EventHandler, HandledEventType};
use sms_domain::persist::{EventListenerLog, EventListenerLogRepository, ListenerClaim};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub struct MessageListener {
    service: MessageService,
    log_repository: Arc<dyn EventListenerLogRepository>,
}

impl MessageListener {
    pub fn new(service: MessageService, log_repository: Arc<dyn EventListenerLogRepository>) -> Self {
        Self {
            service,
            log_repository,
        }
    }

    /// 处理器签名，区分订阅同一事件类型的多个监听器
    pub fn signature(event_type: MessageEventType) -> String {
        format!("MessageListener.{event_type}")
    }

    /// 四种事件类型各一个处理器
    pub fn handlers(self: &Arc<Self>) -> Vec<Arc<dyn EventHandler>> {
        MessageEventType::ALL
            .into_iter()
            .map(|event_type| {
                Arc::new(MessageListenerBinding {
                    listener: Arc::clone(self),
                    event_type,
                    signature: Self::signature(event_type),
                }) as Arc<dyn EventHandler>
            })
            .collect()
    }

    /// 按信封上的类型路由并处理一次投递
    pub async fn handle_event(&self, event: &EventEnvelope) -> AppResult<()> {
        let event_type: MessageEventType = event
            .event_type()
            .parse()
            .map_err(|err| AppError::Decode(format!("event [{}]: {err}", event.id())))?;

        self.handle(event_type, &Self::signature(event_type), event)
            .await
    }

    #[instrument(skip_all, fields(event_id = %event.id(), handler = %signature))]
    async fn handle(
        &self,
        event_type: MessageEventType,
        signature: &str,
        event: &EventEnvelope,
    ) -> AppResult<()> {
        let claim = self
            .log_repository
            .claim(event.id(), signature)
            .await
            .with_context(|| {
                format!(
                    "cannot check listener log for event [{}] and handler [{signature}]",
                    event.id()
                )
            })?;

        match claim {
            ListenerClaim::AlreadyHandled => {
                info!("event has already been handled");
                return Ok(());
            }
            ListenerClaim::InProgress => {
                return Err(AppError::Conflict(format!(
                    "event [{}] is already being handled by [{signature}]",
                    event.id()
                )));
            }
            ListenerClaim::Claimed => {}
        }

        let started = Instant::now();
        if let Err(err) = self.apply(event_type, event).await {
            self.release(event, signature).await;
            return Err(err)
                .with_context(|| format!("[{signature}] cannot handle event [{}]", event.id()));
        }

        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let log = EventListenerLog::new(
            event.id(),
            event.event_type(),
            signature,
            duration_ms,
            Utc::now(),
        );

        match self.log_repository.store(&log).await {
            Ok(true) => {
                debug!(duration_ms, "event handled");
                Ok(())
            }
            Ok(false) => {
                warn!("listener log entry already existed");
                Ok(())
            }
            Err(err) => {
                self.release(event, signature).await;
                Err(err).with_context(|| {
                    format!(
                        "cannot store listener log for event [{}] and handler [{signature}]",
                        event.id()
                    )
                })
            }
        }
    }

    async fn apply(&self, event_type: MessageEventType, event: &EventEnvelope) -> AppResult<()> {
        let ctx = AppContext::new(event.source());

        match event_type {
            MessageEventType::ApiSent => {
                let payload: MessageApiSentPayload = decode(event)?;
                self.service
                    .store_sent_message(
                        &ctx,
                        MessageStoreParams {
                            id: payload.id,
                            owner: payload.owner,
                            contact: payload.contact,
                            content: payload.content,
                            timestamp: payload.request_received_at,
                        },
                    )
                    .await?;
            }
            MessageEventType::PhoneSending => {
                let payload: MessagePhoneSendingPayload = decode(event)?;
                self.service
                    .handle_message_sending(
                        &ctx,
                        HandleMessageParams {
                            id: payload.id,
                            timestamp: event.time(),
                        },
                    )
                    .await?;
            }
            MessageEventType::PhoneSent => {
                let payload: MessagePhoneSentPayload = decode(event)?;
                self.service
                    .handle_message_sent(
                        &ctx,
                        HandleMessageParams {
                            id: payload.id,
                            timestamp: payload.timestamp,
                        },
                    )
                    .await?;
            }
            MessageEventType::PhoneReceived => {
                let payload: MessagePhoneReceivedPayload = decode(event)?;
                self.service
                    .store_received_message(
                        &ctx,
                        MessageStoreParams {
                            id: payload.id,
                            owner: payload.owner,
                            contact: payload.contact,
                            content: payload.content,
                            timestamp: payload.timestamp,
                        },
                    )
                    .await?;
            }
        }

        Ok(())
    }

    async fn release(&self, event: &EventEnvelope, signature: &str) {
        if let Err(err) = self.log_repository.release(event.id(), signature).await {
            error!(error = %err, "cannot release listener claim");
        }
    }
}

fn decode<P: MessageEventPayload>(event: &EventEnvelope) -> AppResult<P> {
    event
        .data_as::<P>()
        .map_err(|err| AppError::Decode(err.to_string()))
}

/// 单一事件类型的处理器绑定
struct MessageListenerBinding {
    listener: Arc<MessageListener>,
    event_type: MessageEventType,
    signature: String,
}

#[async_trait]
impl EventHandler for MessageListenerBinding {
    fn handler_name(&self) -> &str {
        &self.signature
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One(self.event_type.to_string())
    }

    async fn handle(&self, event: &EventEnvelope) -> anyhow::Result<()> {
        self.listener
            .handle(self.event_type, &self.signature, event)
            .await?;
        Ok(())
    }
}

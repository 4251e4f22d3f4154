//! 消息生命周期服务（MessageService）
//!
//! 状态机的编排层：校验前置条件、迁移状态、持久化，并发射后续事件。
//! - `store_*` / `handle_*`：由监听层在收到事件后调用；
//! - `send_message` / `receive_message` / `store_event`：发射事件、分发，再重新加载；
//! - `get_outstanding`：把等待发送的消息交给 `OutstandingDispatcher` 批量分发。
//!
//! 分发之后的重新加载依赖分发器：进程内分发器返回时处理器已执行完毕；
//! 异步传输下遇到 `NotFound` 会按配置轮询等待。
//!
//! 状态迁移以“加载 → 迁移 → 带版本写回”完成，版本冲突时重新加载再迁移，
//! 同一条消息上的并发事件不会互相覆盖。取消只在分发开始前检查，
//! 已开始的进程内处理总会执行到底。
//!
use crate::config::MessageServiceConfig;
use crate::context::AppContext;
use crate::error::{AppError, AppResult, ResultExt};
use crate::outstanding::OutstandingDispatcher;
use crate::params::{
    HandleMessageParams, MessageGetOutstandingParams, MessageGetParams, MessageReceiveParams,
    MessageSendParams, MessageStoreParams, MessageStorePhoneEventParams,
};
use bon::Builder;
use sms_domain::domain_event::{
    EventEnvelope, MessageApiSentPayload, MessagePhoneReceivedPayload, MessagePhoneSendingPayload,
    MessagePhoneSentPayload,
};
use sms_domain::error::{DomainError, DomainResult};
use sms_domain::eventing::EventDispatcher;
use sms_domain::message::{Message, MessageEventName};
use sms_domain::persist::MessageRepository;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Clone, Builder)]
pub struct MessageService {
    repository: Arc<dyn MessageRepository>,
    dispatcher: Arc<dyn EventDispatcher>,
    #[builder(default)]
    config: MessageServiceConfig,
}

impl MessageService {
    /// 以 API 请求创建待发送消息
    #[instrument(skip_all, fields(message_id = %params.id))]
    pub async fn store_sent_message(
        &self,
        ctx: &AppContext,
        params: MessageStoreParams,
    ) -> AppResult<Message> {
        let message = Message::mobile_terminated(
            params.id,
            params.owner,
            params.contact,
            params.content,
            params.timestamp,
        );

        self.repository
            .store(&message)
            .await
            .with_context(|| format!("cannot store sent message [{}]", message.id))?;

        info!(source = %ctx.source, "stored mobile-terminated message");
        Ok(message)
    }

    /// 以手机收件创建消息，直接处于终态 `Received`
    #[instrument(skip_all, fields(message_id = %params.id))]
    pub async fn store_received_message(
        &self,
        ctx: &AppContext,
        params: MessageStoreParams,
    ) -> AppResult<Message> {
        let message = Message::mobile_originated(
            params.id,
            params.owner,
            params.contact,
            params.content,
            params.timestamp,
        );

        self.repository
            .store(&message)
            .await
            .with_context(|| format!("cannot store received message [{}]", message.id))?;

        info!(source = %ctx.source, "stored mobile-originated message");
        Ok(message)
    }

    /// 记录一次发送尝试
    #[instrument(skip_all, fields(message_id = %params.id))]
    pub async fn handle_message_sending(
        &self,
        _ctx: &AppContext,
        params: HandleMessageParams,
    ) -> AppResult<Message> {
        let message = self
            .transition(params.id, "record send attempt", |m| {
                m.add_send_attempt(params.timestamp)
            })
            .await?;

        debug!(attempts = message.send_attempt_count, "recorded send attempt");
        Ok(message)
    }

    /// 确认已发送
    #[instrument(skip_all, fields(message_id = %params.id))]
    pub async fn handle_message_sent(
        &self,
        _ctx: &AppContext,
        params: HandleMessageParams,
    ) -> AppResult<Message> {
        let message = self
            .transition(params.id, "confirm sent", |m| m.sent(params.timestamp))
            .await?;

        info!(duration_ms = ?message.send_duration_ms, "message sent");
        Ok(message)
    }

    /// 受理发送请求：分配标识，发射 `message.api.sent`，分发后返回已持久化的消息
    #[instrument(skip_all, fields(owner = %params.owner, contact = %params.contact))]
    pub async fn send_message(
        &self,
        ctx: &AppContext,
        params: MessageSendParams,
    ) -> AppResult<Message> {
        let payload = MessageApiSentPayload {
            id: Uuid::new_v4(),
            owner: params.owner,
            contact: params.contact,
            content: params.content,
            request_received_at: params.request_received_at,
        };

        let event = EventEnvelope::for_payload(params.source, &payload)
            .with_context(|| format!("cannot create event for message [{}]", payload.id))?;

        self.dispatch(ctx, payload.id, &event).await?;
        self.reload(ctx, payload.id).await
    }

    /// 受理手机收件：分配标识，发射 `message.phone.received`，分发后返回消息
    #[instrument(skip_all, fields(owner = %params.owner, contact = %params.contact))]
    pub async fn receive_message(
        &self,
        ctx: &AppContext,
        params: MessageReceiveParams,
    ) -> AppResult<Message> {
        let payload = MessagePhoneReceivedPayload {
            id: Uuid::new_v4(),
            owner: params.owner,
            contact: params.contact,
            content: params.content,
            timestamp: params.timestamp,
        };

        let event = EventEnvelope::for_payload(params.source, &payload)
            .with_context(|| format!("cannot create event for message [{}]", payload.id))?;

        self.dispatch(ctx, payload.id, &event).await?;
        self.reload(ctx, payload.id).await
    }

    /// 手机就已有消息上报事件；目前只处理 `SENT`
    #[instrument(skip_all, fields(message_id = %message.id, event_name = %params.event_name))]
    pub async fn store_event(
        &self,
        ctx: &AppContext,
        message: &Message,
        params: MessageStorePhoneEventParams,
    ) -> AppResult<Message> {
        if params.message_id != message.id {
            return Err(AppError::Validation(format!(
                "event for message [{}] reported against message [{}]",
                params.message_id, message.id
            )));
        }

        match params.event_name {
            MessageEventName::Sent => {
                let payload = MessagePhoneSentPayload {
                    id: message.id,
                    owner: message.owner.clone(),
                    contact: message.contact.clone(),
                    content: message.content.clone(),
                    timestamp: params.timestamp,
                };

                let event = EventEnvelope::for_payload(params.source, &payload)
                    .with_context(|| format!("cannot create event for message [{}]", message.id))?;

                self.dispatch(ctx, message.id, &event).await?;
                self.reload(ctx, message.id).await
            }
            other => Err(AppError::Validation(format!(
                "cannot handle message event [{other}] for message [{}]",
                message.id
            ))),
        }
    }

    /// 取出等待发送的消息并批量分发 `message.phone.sending`
    #[instrument(skip_all, fields(source = %params.source))]
    pub async fn get_outstanding(
        &self,
        ctx: &AppContext,
        params: MessageGetOutstandingParams,
    ) -> AppResult<Vec<Message>> {
        let limit = params.limit.unwrap_or(self.config.outstanding_limit);
        let messages = self
            .repository
            .get_outstanding(limit)
            .await
            .with_context(|| format!("cannot fetch up to {limit} outstanding messages"))?;

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let dispatcher =
            OutstandingDispatcher::new(self.clone(), self.config.outstanding_concurrency);
        Ok(dispatcher.process(ctx, &params.source, messages).await)
    }

    /// 为一条待发送消息发射 `message.phone.sending`，分发后返回刷新的消息
    pub async fn send_outstanding(
        &self,
        ctx: &AppContext,
        source: &str,
        message: &Message,
    ) -> AppResult<Message> {
        let payload = MessagePhoneSendingPayload {
            id: message.id,
            owner: message.owner.clone(),
            contact: message.contact.clone(),
            content: message.content.clone(),
        };

        let event = EventEnvelope::for_payload(source, &payload)
            .with_context(|| format!("cannot create event for message [{}]", message.id))?;

        self.dispatch(ctx, message.id, &event).await?;
        self.reload(ctx, message.id).await
    }

    pub async fn get_message(&self, _ctx: &AppContext, id: Uuid) -> AppResult<Message> {
        self.repository
            .load(id)
            .await
            .with_context(|| format!("cannot get message [{id}]"))
    }

    pub async fn get_messages(
        &self,
        _ctx: &AppContext,
        params: MessageGetParams,
    ) -> AppResult<Vec<Message>> {
        self.repository
            .index(&params.owner, &params.contact, &params.index)
            .await
            .with_context(|| {
                format!(
                    "cannot list messages between [{}] and [{}]",
                    params.owner, params.contact
                )
            })
    }

    /// 加载、迁移并带版本写回；版本冲突时按配置重新加载再迁移
    async fn transition<F>(&self, id: Uuid, action: &str, apply: F) -> AppResult<Message>
    where
        F: Fn(&mut Message) -> DomainResult<()>,
    {
        let mut attempt = 0;
        loop {
            let mut message = self
                .repository
                .load(id)
                .await
                .with_context(|| format!("cannot load message [{id}] to {action}"))?;

            apply(&mut message).with_context(|| format!("cannot {action} for message [{id}]"))?;

            match self.repository.update(&message).await {
                Ok(()) => return Ok(message),
                Err(DomainError::VersionConflict { actual, .. })
                    if attempt < self.config.update_retries =>
                {
                    attempt += 1;
                    debug!(message_id = %id, attempt, actual, "message changed concurrently");
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("cannot update message [{id}] after {action}"));
                }
            }
        }
    }

    /// 只在分发开始前检查取消，分发本身总是执行到底
    async fn dispatch(
        &self,
        ctx: &AppContext,
        message_id: Uuid,
        event: &EventEnvelope,
    ) -> AppResult<()> {
        if ctx.is_cancelled() {
            return Err(AppError::Cancelled(format!(
                "dispatch of event [{}] for message [{message_id}]",
                event.id()
            )));
        }

        self.dispatcher.dispatch(event).await.with_context(|| {
            format!(
                "cannot dispatch [{}] event [{}] for message [{message_id}]",
                event.event_type(),
                event.id()
            )
        })?;

        debug!(
            message_id = %message_id,
            event_id = %event.id(),
            event_type = %event.event_type(),
            "event dispatched"
        );
        Ok(())
    }

    /// 分发后重新加载；仅 `NotFound` 会按配置重试
    async fn reload(&self, ctx: &AppContext, id: Uuid) -> AppResult<Message> {
        let mut attempt = 0;
        loop {
            match self.repository.load(id).await {
                Ok(message) => return Ok(message),
                Err(err) if err.is_not_found() && attempt < self.config.reload_attempts => {
                    attempt += 1;
                    debug!(message_id = %id, attempt, "message not visible yet");

                    tokio::select! {
                        biased;
                        _ = ctx.cancellation.cancelled() => {
                            return Err(AppError::Cancelled(format!("reload of message [{id}]")));
                        }
                        _ = tokio::time::sleep(self.config.reload_interval()) => {}
                    }
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("cannot reload message [{id}]"));
                }
            }
        }
    }
}

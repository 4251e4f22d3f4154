//! 待发送消息的批量分发（OutstandingDispatcher）
//!
//! 有界工作池：`Semaphore` 限制同时运行的工作任务数，`JoinSet` 收集结果。
//! 单条消息失败只记录一行日志并从结果中剔除，不会中断整批；
//! 取消后不再派发新任务；已派发的任务执行到底，全部汇合后才返回。
//!
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::message_service::MessageService;
use sms_domain::message::Message;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument};
use uuid::Uuid;

pub struct OutstandingDispatcher {
    service: MessageService,
    concurrency: usize,
}

impl OutstandingDispatcher {
    pub fn new(service: MessageService, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
        }
    }

    /// 返回成功刷新的消息子集，顺序不定
    #[instrument(skip_all, fields(source = %source, batch = messages.len()))]
    pub async fn process(
        &self,
        ctx: &AppContext,
        source: &str,
        messages: Vec<Message>,
    ) -> Vec<Message> {
        let total = messages.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut workers: JoinSet<(Uuid, AppResult<Message>)> = JoinSet::new();

        for message in messages {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancellation.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // 信号量只在本函数内持有，不会被关闭
                    Err(_) => break,
                },
            };

            let service = self.service.clone();
            let ctx = ctx.clone();
            let source = source.to_string();

            workers.spawn(async move {
                let _permit = permit;
                let outcome = service.send_outstanding(&ctx, &source, &message).await;
                (message.id, outcome)
            });
        }

        let mut updated = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(message))) => updated.push(message),
                Ok((id, Err(err))) if matches!(err.root(), AppError::Cancelled(_)) => {
                    debug!(message_id = %id, "outstanding message cancelled");
                }
                Ok((id, Err(err))) => {
                    error!(message_id = %id, error = %err, "cannot dispatch outstanding message");
                }
                Err(err) => {
                    error!(error = %err, "outstanding worker failed");
                }
            }
        }

        debug!(total, dispatched = updated.len(), "outstanding batch finished");
        updated
    }
}

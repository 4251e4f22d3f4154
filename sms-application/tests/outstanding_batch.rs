use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sms_application::context::AppContext;
use sms_application::params::{MessageGetOutstandingParams, MessageStoreParams};
use sms_application::{
    MessageListener, MessageService, MessageServiceConfig, OutstandingDispatcher,
};
use sms_domain::domain_event::{EventEnvelope, MessageEventType};
use sms_domain::error::{DomainError, DomainResult};
use sms_domain::eventing::{EventDispatcher, LocalEventDispatcher};
use sms_domain::message::{Message, MessageStatus};
use sms_domain::persist::{InMemoryEventListenerLogRepository, InMemoryMessageRepository};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 对指定消息的 `message.phone.sending` 分发失败，其余转交进程内分发器
struct UnreachablePhone {
    inner: Arc<LocalEventDispatcher>,
    unreachable: HashSet<String>,
    delay: std::time::Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl UnreachablePhone {
    fn new(inner: Arc<LocalEventDispatcher>, unreachable: &[Uuid]) -> Self {
        Self {
            inner,
            unreachable: unreachable.iter().map(Uuid::to_string).collect(),
            delay: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EventDispatcher for UnreachablePhone {
    async fn dispatch(&self, event: &EventEnvelope) -> DomainResult<()> {
        if event.event_type() != MessageEventType::PhoneSending.as_str() {
            return self.inner.dispatch(event).await;
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = event.data()["id"].as_str().unwrap_or_default();
        if self.unreachable.contains(id) {
            return Err(DomainError::event_bus(format!("phone unreachable for [{id}]")));
        }
        self.inner.dispatch(event).await
    }
}

struct Batch {
    service: MessageService,
    phone: Arc<UnreachablePhone>,
    messages: Vec<Message>,
}

async fn batch(
    size: usize,
    unreachable: usize,
    config: MessageServiceConfig,
    delay: std::time::Duration,
) -> AnyResult<Batch> {
    let ids: Vec<Uuid> = (0..size).map(|_| Uuid::new_v4()).collect();
    let repository = Arc::new(InMemoryMessageRepository::new());
    let local = Arc::new(LocalEventDispatcher::new());
    let phone =
        Arc::new(UnreachablePhone::new(local.clone(), &ids[..unreachable]).with_delay(delay));

    let service = MessageService::builder()
        .repository(repository)
        .dispatcher(phone.clone())
        .config(config)
        .build();
    let listener = Arc::new(MessageListener::new(
        service.clone(),
        Arc::new(InMemoryEventListenerLogRepository::new()),
    ));
    local.register_all(listener.handlers());

    let ctx = AppContext::new("test");
    let mut messages = Vec::with_capacity(size);
    for (i, id) in ids.into_iter().enumerate() {
        let message = service
            .store_sent_message(
                &ctx,
                MessageStoreParams {
                    id,
                    owner: "+1000".into(),
                    contact: "+2000".into(),
                    content: format!("msg {i}"),
                    timestamp: Utc::now() + Duration::milliseconds(i as i64),
                },
            )
            .await?;
        messages.push(message);
    }

    Ok(Batch {
        service,
        phone,
        messages,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failing_dispatch_does_not_abort_the_batch() -> AnyResult<()> {
    let b = batch(5, 1, MessageServiceConfig::default(), Default::default()).await?;
    let failing = b.messages[0].id;
    let ctx = AppContext::new("test");

    let updated = b
        .service
        .get_outstanding(
            &ctx,
            MessageGetOutstandingParams {
                source: "phone-poll".into(),
                limit: None,
            },
        )
        .await?;

    assert_eq!(updated.len(), 4);
    assert_eq!(b.phone.calls.load(Ordering::SeqCst), 5);
    assert!(updated.iter().all(|m| m.status == MessageStatus::Sending));
    assert!(updated.iter().all(|m| m.id != failing));

    let untouched = b.service.get_message(&ctx, failing).await?;
    assert_eq!(untouched.status, MessageStatus::Pending);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_is_bounded() -> AnyResult<()> {
    let config = MessageServiceConfig {
        outstanding_concurrency: 2,
        ..Default::default()
    };
    let b = batch(8, 0, config, std::time::Duration::from_millis(20)).await?;

    let updated = b
        .service
        .get_outstanding(
            &AppContext::new("test"),
            MessageGetOutstandingParams {
                source: "phone-poll".into(),
                limit: None,
            },
        )
        .await?;

    assert_eq!(updated.len(), 8);
    assert!(b.phone.peak.load(Ordering::SeqCst) <= 2);
    Ok(())
}

#[tokio::test]
async fn limit_caps_the_batch() -> AnyResult<()> {
    let b = batch(5, 0, MessageServiceConfig::default(), Default::default()).await?;

    let updated = b
        .service
        .get_outstanding(
            &AppContext::new("test"),
            MessageGetOutstandingParams {
                source: "phone-poll".into(),
                limit: Some(2),
            },
        )
        .await?;

    // 按 order_timestamp 正序取出最早的两条
    let ids: HashSet<Uuid> = updated.iter().map(|m| m.id).collect();
    let expected: HashSet<Uuid> = b.messages[..2].iter().map(|m| m.id).collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[tokio::test]
async fn cancelled_batch_dispatches_nothing() -> AnyResult<()> {
    let b = batch(3, 0, MessageServiceConfig::default(), Default::default()).await?;
    let token = CancellationToken::new();
    token.cancel();
    let ctx = AppContext::new("test").with_cancellation(token);

    let dispatcher = OutstandingDispatcher::new(b.service.clone(), 4);
    let updated = dispatcher
        .process(&ctx, "phone-poll", b.messages.clone())
        .await;

    assert!(updated.is_empty());
    assert_eq!(b.phone.calls.load(Ordering::SeqCst), 0);
    for m in &b.messages {
        assert_eq!(
            b.service.get_message(&AppContext::default(), m.id).await?.status,
            MessageStatus::Pending
        );
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_mid_batch_lets_in_flight_workers_finish() -> AnyResult<()> {
    let config = MessageServiceConfig {
        outstanding_concurrency: 2,
        ..Default::default()
    };
    let b = batch(6, 0, config, std::time::Duration::from_millis(300)).await?;
    let ctx = AppContext::new("test");

    let token = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();
    });

    let dispatcher = OutstandingDispatcher::new(b.service.clone(), 2);
    let updated = dispatcher
        .process(&ctx, "phone-poll", b.messages.clone())
        .await;

    // 只有首批两个工作任务被派发，并且都执行到底
    assert_eq!(b.phone.calls.load(Ordering::SeqCst), 2);
    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|m| m.status == MessageStatus::Sending));

    let dispatched: HashSet<Uuid> = updated.iter().map(|m| m.id).collect();
    for m in b.messages.iter().filter(|m| !dispatched.contains(&m.id)) {
        assert_eq!(
            b.service.get_message(&AppContext::default(), m.id).await?.status,
            MessageStatus::Pending
        );
    }
    Ok(())
}

/// 收集格式化后的日志输出
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[tokio::test]
async fn a_failing_message_is_logged_exactly_once() -> AnyResult<()> {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let b = batch(4, 1, MessageServiceConfig::default(), Default::default()).await?;
    let failing = b.messages[0].id;

    let updated = b
        .service
        .get_outstanding(
            &AppContext::new("test"),
            MessageGetOutstandingParams {
                source: "phone-poll".into(),
                limit: None,
            },
        )
        .await?;
    assert_eq!(updated.len(), 3);

    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains("cannot dispatch outstanding message"));
    assert!(lines[0].contains(&failing.to_string()));
    Ok(())
}

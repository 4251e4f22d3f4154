//! 短信生命周期演示
//!
//! 在进程内把服务、监听层与分发器接起来，走一遍完整流程：
//! API 受理 → 手机拉取待发送 → 手机确认已发送，外加一条手机收件。

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use sms_application::context::AppContext;
use sms_application::params::{
    MessageGetOutstandingParams, MessageGetParams, MessageReceiveParams, MessageSendParams,
    MessageStorePhoneEventParams,
};
use sms_application::{MessageListener, MessageService, MessageServiceConfig};
use sms_domain::eventing::LocalEventDispatcher;
use sms_domain::message::MessageEventName;
use sms_domain::persist::{
    IndexParams, InMemoryEventListenerLogRepository, InMemoryMessageRepository,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// SMS lifecycle demo - drives messages through the event loop in-process
#[derive(Parser, Debug)]
#[command(name = "sms-demo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file with a [service] table
    #[arg(short, long, env = "SMS_DEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Number of outbound messages to send
    #[arg(short, long, default_value_t = 3)]
    messages: usize,

    /// API-side phone number
    #[arg(long, default_value = "+1000")]
    owner: String,

    /// Counterparty phone number
    #[arg(long, default_value = "+2000")]
    contact: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    service: MessageServiceConfig,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MessageServiceConfig> {
    let Some(path) = path else {
        return Ok(MessageServiceConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration file {}", path.display()))?;
    let file: FileConfig = toml::from_str(&raw)
        .with_context(|| format!("invalid configuration file {}", path.display()))?;
    Ok(file.service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    tracing::info!("Starting sms-demo v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_deref()).map_err(|e| {
        tracing::error!("Failed to load configuration: {:#}", e);
        e
    })?;
    tracing::info!(?config, "Configuration loaded");

    let repository = Arc::new(InMemoryMessageRepository::new());
    let logs = Arc::new(InMemoryEventListenerLogRepository::with_claim_ttl(
        config.claim_ttl(),
    ));
    let dispatcher = Arc::new(LocalEventDispatcher::new());

    let service = MessageService::builder()
        .repository(repository.clone())
        .dispatcher(dispatcher.clone())
        .config(config)
        .build();
    let listener = Arc::new(MessageListener::new(service.clone(), logs.clone()));
    dispatcher.register_all(listener.handlers());

    let ctx = AppContext::new("sms-demo");

    for i in 0..args.messages {
        let message = service
            .send_message(
                &ctx,
                MessageSendParams {
                    owner: args.owner.clone(),
                    contact: args.contact.clone(),
                    content: format!("hello #{i}"),
                    source: "sms-demo/api".into(),
                    request_received_at: Utc::now(),
                },
            )
            .await?;
        tracing::info!(message_id = %message.id, status = %message.status, "accepted");
    }

    let outstanding = service
        .get_outstanding(
            &ctx,
            MessageGetOutstandingParams {
                source: "sms-demo/phone".into(),
                limit: None,
            },
        )
        .await?;
    tracing::info!(count = outstanding.len(), "handed to phone");

    for message in &outstanding {
        let sent = service
            .store_event(
                &ctx,
                message,
                MessageStorePhoneEventParams {
                    message_id: message.id,
                    event_name: MessageEventName::Sent,
                    timestamp: Utc::now(),
                    source: "sms-demo/phone".into(),
                },
            )
            .await?;
        tracing::info!(
            message_id = %sent.id,
            duration_ms = ?sent.send_duration_ms,
            "phone confirmed sent"
        );
    }

    service
        .receive_message(
            &ctx,
            MessageReceiveParams {
                owner: args.owner.clone(),
                contact: args.contact.clone(),
                content: "got it, thanks".into(),
                source: "sms-demo/phone".into(),
                timestamp: Utc::now(),
            },
        )
        .await?;

    let thread = service
        .get_messages(
            &ctx,
            MessageGetParams {
                owner: args.owner,
                contact: args.contact,
                index: IndexParams {
                    limit: args.messages + 1,
                    ..Default::default()
                },
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&thread)?);
    tracing::info!(
        messages = repository.len(),
        handled_events = logs.len(),
        "Demo finished"
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! 短信生命周期应用层（sms-application）
//!
//! 在领域层之上编排消息生命周期：
//! - `MessageService`：状态迁移、持久化与事件发射；
//! - `MessageListener`：幂等的事件监听层；
//! - `OutstandingDispatcher`：待发送消息的有界并发批量分发。
//!
pub mod config;
pub mod context;
pub mod error;
pub mod message_listener;
pub mod message_service;
pub mod outstanding;
pub mod params;

pub use config::MessageServiceConfig;
pub use message_listener::MessageListener;
pub use message_service::MessageService;
pub use outstanding::OutstandingDispatcher;

//! 短信生命周期领域层（sms-domain）
//!
//! 提供消息生命周期所需的领域模型与基础设施接口：
//! - 消息实体与状态机（`message`）
//! - 事件信封、事件类型与载荷（`domain_event`）
//! - 事件分发协议、处理器注册与内存传输（`eventing`）
//! - 消息仓储与去重日志（`persist`）
//!
//! 本 crate 只定义领域层接口与内存实现，具体存储与传输由上层适配。
//!
//! 典型用法：
//! 1. 以 `Message` 的状态迁移方法表达业务规则；
//! 2. 通过 `MessageRepository` 持久化，`EventListenerLogRepository` 去重；
//! 3. 用 `LocalEventDispatcher` 或 `InMemoryEventBus` + `EventEngine` 连接处理器。
//!
pub mod domain_event;
pub mod error;
pub mod eventing;
pub mod message;
pub mod persist;

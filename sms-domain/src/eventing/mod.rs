//! 事件子系统（eventing）
//!
//! 提供事件分发与处理的基础抽象与运行时：
//! - `EventDispatcher`：把事件信封交给传输层，成功/失败同步返回，自身不重试；
//! - `EventHandler`：对某类/多类/全部事件进行消费处理；
//! - `LocalEventDispatcher`：进程内“分发即处理”，返回时处理器的副作用已可见；
//! - `InMemoryEventBus` + `EventEngine`：异步广播传输及其消费引擎，
//!   调用方需要轮询等待副作用可见。
//!
pub mod dispatcher;
pub mod dispatcher_local;
pub mod handler;
mod registry;

#[cfg(feature = "eventing")]
pub mod bus_inmemory;
#[cfg(feature = "eventing")]
pub mod engine;

pub use dispatcher::EventDispatcher;
pub use dispatcher_local::LocalEventDispatcher;
pub use handler::{EventHandler, HandledEventType};
pub use registry::HandlerRegistry;

#[cfg(feature = "eventing")]
pub use bus_inmemory::InMemoryEventBus;
#[cfg(feature = "eventing")]
pub use engine::{EngineHandle, EventEngine, EventEngineConfig};

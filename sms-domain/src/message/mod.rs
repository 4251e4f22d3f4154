//! 短信消息（Message）实体与状态机
//!
//! `Message` 是唯一的聚合：由首个事件创建，此后原地推进状态，不会被本子系统删除。
//! 状态只能沿 `Pending → Sending → Sent`（MobileTerminated）前进，
//! MobileOriginated 消息创建即处于终态 `Received`。
//!
mod entity;
mod status;

pub use entity::Message;
pub use status::{MessageEventName, MessageStatus, MessageType};

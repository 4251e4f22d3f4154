//! 事件信封（EventEnvelope）与消息事件载荷
//!
//! 信封是一次异步通信的单元：标识、类型、来源、时间与 JSON 载荷。
//! 标识按“发射”唯一：同一传输消息的重投保留标识，新的发射总是获得新标识。
//! 载荷类型通过 `MessageEventPayload` 与四种规范事件类型一一绑定。

mod event_envelope;
mod event_type;
mod payloads;

pub use event_envelope::{APPLICATION_JSON, EventEnvelope};
pub use event_type::MessageEventType;
pub use payloads::{
    MessageApiSentPayload, MessageEventPayload, MessagePhoneReceivedPayload,
    MessagePhoneSendingPayload, MessagePhoneSentPayload,
};

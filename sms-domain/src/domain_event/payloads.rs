use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::event_type::MessageEventType;

/// 事件载荷需要满足的通用能力边界
pub trait MessageEventPayload:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// 该载荷绑定的事件类型
    const EVENT_TYPE: MessageEventType;

    /// 载荷所描述的消息标识
    fn message_id(&self) -> Uuid;
}

/// `message.api.sent` 的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageApiSentPayload {
    pub id: Uuid,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub request_received_at: DateTime<Utc>,
}

/// `message.phone.sending` 的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneSendingPayload {
    pub id: Uuid,
    pub owner: String,
    pub contact: String,
    pub content: String,
}

/// `message.phone.sent` 的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneSentPayload {
    pub id: Uuid,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// `message.phone.received` 的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneReceivedPayload {
    pub id: Uuid,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

macro_rules! bind_event_type {
    ($payload:ty => $event_type:expr) => {
        impl MessageEventPayload for $payload {
            const EVENT_TYPE: MessageEventType = $event_type;

            fn message_id(&self) -> Uuid {
                self.id
            }
        }
    };
}

bind_event_type!(MessageApiSentPayload => MessageEventType::ApiSent);
bind_event_type!(MessagePhoneSendingPayload => MessageEventType::PhoneSending);
bind_event_type!(MessagePhoneSentPayload => MessageEventType::PhoneSent);
bind_event_type!(MessagePhoneReceivedPayload => MessageEventType::PhoneReceived);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn round_trip<P: MessageEventPayload>(payload: &P) -> P {
        let encoded = serde_json::to_vec(payload).unwrap();
        serde_json::from_slice(&encoded).unwrap()
    }

    #[test]
    fn field_names_are_stable() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let id = Uuid::new_v4();

        let api = MessageApiSentPayload {
            id,
            owner: "+1000".into(),
            contact: "+2000".into(),
            content: "hi".into(),
            request_received_at: at,
        };
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(
            value,
            json!({
                "id": id.to_string(),
                "owner": "+1000",
                "contact": "+2000",
                "content": "hi",
                "requestReceivedAt": "2024-05-01T12:00:00Z",
            })
        );

        let sent = MessagePhoneSentPayload {
            id,
            owner: "+1000".into(),
            contact: "+2000".into(),
            content: "hi".into(),
            timestamp: at,
        };
        let value = serde_json::to_value(&sent).unwrap();
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn payloads_survive_round_trip_with_edge_timestamps() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let precise = Utc.timestamp_opt(1_714_564_800, 123_456_789).unwrap();

        let api = MessageApiSentPayload {
            id: Uuid::new_v4(),
            owner: "+1000".into(),
            contact: "+2000".into(),
            content: String::new(),
            request_received_at: epoch,
        };
        assert_eq!(round_trip(&api), api);

        let sending = MessagePhoneSendingPayload {
            id: Uuid::nil(),
            owner: String::new(),
            contact: String::new(),
            content: "ünïcödé ✉".into(),
        };
        assert_eq!(round_trip(&sending), sending);

        let sent = MessagePhoneSentPayload {
            id: Uuid::new_v4(),
            owner: "+1000".into(),
            contact: "+2000".into(),
            content: "hi".into(),
            timestamp: precise,
        };
        assert_eq!(round_trip(&sent), sent);

        let received = MessagePhoneReceivedPayload {
            id: Uuid::new_v4(),
            owner: "+1000".into(),
            contact: "+2000".into(),
            content: "yo".into(),
            timestamp: precise,
        };
        assert_eq!(round_trip(&received), received);
        assert_eq!(received.message_id(), received.id);
    }

    #[test]
    fn payload_types_are_bound_to_event_types() {
        assert_eq!(MessageApiSentPayload::EVENT_TYPE, MessageEventType::ApiSent);
        assert_eq!(
            MessagePhoneSendingPayload::EVENT_TYPE,
            MessageEventType::PhoneSending
        );
        assert_eq!(MessagePhoneSentPayload::EVENT_TYPE, MessageEventType::PhoneSent);
        assert_eq!(
            MessagePhoneReceivedPayload::EVENT_TYPE,
            MessageEventType::PhoneReceived
        );
    }
}

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::event_type::MessageEventType;
use super::payloads::MessageEventPayload;
use crate::error::{DomainError, DomainResult};

/// 载荷的内容类型，固定为 JSON
pub const APPLICATION_JSON: &str = "application/json";

/// 事件信封：不可变的事实记录
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// 每次发射唯一（uuid 字符串）
    #[builder(into, default = Uuid::new_v4().to_string())]
    id: String,
    #[serde(rename = "type")]
    #[builder(into)]
    event_type: String,
    /// 自由格式的来源标记
    #[builder(into)]
    source: String,
    #[builder(default = Utc::now())]
    time: DateTime<Utc>,
    #[serde(rename = "datacontenttype")]
    #[builder(into, default = APPLICATION_JSON.to_string())]
    data_content_type: String,
    data: Value,
}

impl EventEnvelope {
    /// 以新的标识与当前 UTC 时间封装载荷
    pub fn new<P: Serialize>(
        event_type: MessageEventType,
        source: impl Into<String>,
        payload: &P,
    ) -> DomainResult<Self> {
        let data = serde_json::to_value(payload)?;

        Ok(Self::builder()
            .event_type(event_type.as_str())
            .source(source)
            .data(data)
            .build())
    }

    /// 使用载荷绑定的事件类型封装
    pub fn for_payload<P: MessageEventPayload>(
        source: impl Into<String>,
        payload: &P,
    ) -> DomainResult<Self> {
        Self::new(P::EVENT_TYPE, source, payload)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn data_content_type(&self) -> &str {
        &self.data_content_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// 解码载荷；失败为不可重试的解码错误
    pub fn data_as<P: MessageEventPayload>(&self) -> DomainResult<P> {
        if self.event_type != P::EVENT_TYPE.as_str() {
            return Err(self.decode_error(format!(
                "payload type is bound to [{}]",
                P::EVENT_TYPE
            )));
        }

        if self.data_content_type != APPLICATION_JSON {
            return Err(self.decode_error(format!(
                "unsupported content type [{}]",
                self.data_content_type
            )));
        }

        P::deserialize(&self.data).map_err(|e| self.decode_error(e.to_string()))
    }

    /// 编码为 JSON 字节（传输层使用）
    pub fn to_bytes(&self) -> DomainResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 从 JSON 字节解码信封本身
    pub fn from_bytes(bytes: &[u8]) -> DomainResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn decode_error(&self, reason: String) -> DomainError {
        DomainError::Decode {
            event_id: self.id.clone(),
            event_type: self.event_type.clone(),
            reason,
        }
    }
}

//! Pluggable codecs turning events and stored values into portable values.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, StepflowError, events::Event};

/// Event codec contract.
///
/// `deserialize(serialize(e))` must give back `e` for every event type the
/// workflow uses. Shared-store values go through `serialize_value` /
/// `deserialize_value`.
///
/// `serialize` must never return JSON `null`: in the streaming queue of a
/// snapshot `null` is the end-of-stream marker, and a snapshot fails with
/// [`StepflowError::Serialization`] rather than store an ambiguous entry.
pub trait EventCodec: Send + Sync {
    fn serialize(
        &self,
        event: &Event,
    ) -> Result<Value>;

    fn deserialize(
        &self,
        value: &Value,
    ) -> Result<Event>;

    fn serialize_value(
        &self,
        value: &Value,
    ) -> Result<Value> {
        Ok(value.clone())
    }

    fn deserialize_value(
        &self,
        value: &Value,
    ) -> Result<Value> {
        Ok(value.clone())
    }
}

/// Stores events as `{"type": ..., "data": {...}}` objects and values as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EventCodec for JsonCodec {
    fn serialize(
        &self,
        event: &Event,
    ) -> Result<Value> {
        Ok(serde_json::to_value(event)?)
    }

    fn deserialize(
        &self,
        value: &Value,
    ) -> Result<Event> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Stores events and values as base64-encoded JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl Base64Codec {
    fn encode<T: Serialize>(value: &T) -> Result<Value> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Value::String(STANDARD.encode(bytes)))
    }

    fn decode(value: &Value) -> Result<Value> {
        let Value::String(text) = value else {
            return Err(StepflowError::Convert(format!("expected a base64 string, got {value}")));
        };
        let bytes = STANDARD.decode(text)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl EventCodec for Base64Codec {
    fn serialize(
        &self,
        event: &Event,
    ) -> Result<Value> {
        Self::encode(event)
    }

    fn deserialize(
        &self,
        value: &Value,
    ) -> Result<Event> {
        Ok(serde_json::from_value(Self::decode(value)?)?)
    }

    fn serialize_value(
        &self,
        value: &Value,
    ) -> Result<Value> {
        Self::encode(value)
    }

    fn deserialize_value(
        &self,
        value: &Value,
    ) -> Result<Value> {
        Self::decode(value)
    }
}

/// Stock codec selector used by configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    Base64,
}

impl CodecKind {
    pub fn codec(&self) -> Box<dyn EventCodec> {
        match self {
            CodecKind::Json => Box::new(JsonCodec),
            CodecKind::Base64 => Box::new(Base64Codec),
        }
    }
}

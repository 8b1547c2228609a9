// src/cache/codec.rs

//! Text encoding for values crossing into the durable tier.

use serde_json::Value;

use crate::errors::Result;

pub fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

#![allow(dead_code)]

pub mod mock_service;
pub mod range_server;

use std::sync::Arc;

use stratus_core::http::{Pipeline, Transport};
use stratus_core::object::{ObjectClient, ObjectKind};
use stratus_core::retry::RetryOptions;

/// Client for `url` whose pipeline retries without sleeping.
pub fn client(url: &str, kind: ObjectKind, transport: Arc<dyn Transport>) -> ObjectClient {
    let pipeline = Pipeline::new(RetryOptions::immediate(3), transport);
    ObjectClient::new(url.parse().unwrap(), kind, Arc::new(pipeline))
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 251) as u8).collect()
}

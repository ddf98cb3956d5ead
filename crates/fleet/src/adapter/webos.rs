// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::AdapterError;

use super::{AdapterFuture, WebosSession};

const WEBOS_PORT: u16 = 3000;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebOS websocket handshake + remote control adapter.
pub struct TungsteniteWebosAdapter;

impl TungsteniteWebosAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TungsteniteWebosAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn manifest(stored_client_key: Option<&str>) -> serde_json::Value {
    json!({
        "type": "register",
        "id": "register_0",
        "payload": {
            "forcePairing": false,
            "pairingType": "PROMPT",
            "client-key": stored_client_key,
            "manifest": {
                "manifestVersion": 1,
                "permissions": ["CONTROL_POWER", "READ_INSTALLED_APPS"],
            }
        }
    })
}

impl WebosSession for TungsteniteWebosAdapter {
    fn connect_and_register<'a>(
        &'a self,
        ip: IpAddr,
        stored_client_key: Option<&'a str>,
    ) -> AdapterFuture<'a, String> {
        Box::pin(async move {
            let url = format!("ws://{ip}:{WEBOS_PORT}");
            let (mut stream, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(&url))
                .await
                .map_err(|_| AdapterError::timeout("webos websocket connect timed out"))?
                .map_err(|e| AdapterError::unreachable(format!("webos websocket connect failed: {e}")))?;

            let request = manifest(stored_client_key).to_string();
            stream
                .send(Message::Text(request.into()))
                .await
                .map_err(|e| AdapterError::protocol(format!("webos handshake send failed: {e}")))?;

            loop {
                let msg = tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.next())
                    .await
                    .map_err(|_| AdapterError::timeout("webos registration timed out"))?
                    .ok_or_else(|| AdapterError::unreachable("webos socket closed during handshake"))?
                    .map_err(|e| AdapterError::protocol(format!("webos handshake read failed: {e}")))?;

                let Message::Text(text) = msg else { continue };
                let parsed: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| AdapterError::protocol(format!("webos handshake payload malformed: {e}")))?;

                match parsed.get("type").and_then(|v| v.as_str()) {
                    Some("registered") => {
                        let client_key = parsed
                            .get("payload")
                            .and_then(|p| p.get("client-key"))
                            .and_then(|v| v.as_str())
                            .ok_or_else(|| AdapterError::protocol("registered without a client-key"))?;
                        return Ok(client_key.to_owned());
                    }
                    Some("error") => {
                        let message = parsed
                            .get("error")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown webos handshake error");
                        return Err(AdapterError::auth(message));
                    }
                    _ => continue, // e.g. a PROMPT status update, keep waiting.
                }
            }
        })
    }

    fn power_off<'a>(&'a self, ip: IpAddr, client_key: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("ws://{ip}:{WEBOS_PORT}");
            let (mut stream, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(&url))
                .await
                .map_err(|_| AdapterError::timeout("webos websocket connect timed out"))?
                .map_err(|e| AdapterError::unreachable(format!("webos websocket connect failed: {e}")))?;

            let auth = manifest(Some(client_key)).to_string();
            stream
                .send(Message::Text(auth.into()))
                .await
                .map_err(|e| AdapterError::protocol(format!("webos auth send failed: {e}")))?;

            let request = json!({
                "type": "request",
                "id": "power_off_0",
                "uri": "ssap://system/turnOff",
            })
            .to_string();
            stream
                .send(Message::Text(request.into()))
                .await
                .map_err(|e| AdapterError::protocol(format!("webos power-off send failed: {e}")))?;

            Ok(())
        })
    }
}

#[cfg(test)]
pub struct FakeWebosSession {
    pub client_key: String,
    pub power_off_calls: std::sync::Mutex<u32>,
}

#[cfg(test)]
impl FakeWebosSession {
    pub fn new(client_key: impl Into<String>) -> Self {
        Self { client_key: client_key.into(), power_off_calls: std::sync::Mutex::new(0) }
    }
}

#[cfg(test)]
impl WebosSession for FakeWebosSession {
    fn connect_and_register<'a>(
        &'a self,
        _ip: IpAddr,
        _stored_client_key: Option<&'a str>,
    ) -> AdapterFuture<'a, String> {
        let key = self.client_key.clone();
        Box::pin(async move { Ok(key) })
    }

    fn power_off<'a>(&'a self, _ip: IpAddr, _client_key: &'a str) -> AdapterFuture<'a, ()> {
        *self.power_off_calls.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[path = "webos_tests.rs"]
mod webos_tests;

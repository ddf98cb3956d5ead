// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::time::Duration;

use digest_auth::{AuthContext, WwwAuthenticateHeader};
use reqwest::Client;

use crate::error::AdapterError;

use super::{AdapterFuture, DigestReboot};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP Digest reboot adapter for BrightSign players, the only capability
/// that class exposes.
pub struct DigestRebootAdapter {
    client: Client,
}

impl DigestRebootAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::protocol(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl DigestReboot for DigestRebootAdapter {
    fn reboot<'a>(&'a self, ip: IpAddr, username: &'a str, password: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("http://{ip}/api/v1/control/reboot");

            let first = self
                .client
                .put(&url)
                .send()
                .await
                .map_err(|e| AdapterError::unreachable(format!("brightsign reboot request failed: {e}")))?;

            if first.status().is_success() {
                return Ok(());
            }
            if first.status() != reqwest::StatusCode::UNAUTHORIZED {
                return Err(AdapterError::protocol(format!(
                    "brightsign reboot returned unexpected status {}",
                    first.status()
                )));
            }

            let www_authenticate = first
                .headers()
                .get(reqwest::header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AdapterError::auth("brightsign 401 missing WWW-Authenticate header"))?;

            let mut header = WwwAuthenticateHeader::parse(www_authenticate)
                .map_err(|e| AdapterError::protocol(format!("malformed digest challenge: {e}")))?;

            let context = AuthContext::new(username, password, "/api/v1/control/reboot");
            let answer = header
                .respond(&context)
                .map_err(|e| AdapterError::auth(format!("failed to compute digest response: {e}")))?;

            let authorized = self
                .client
                .put(&url)
                .header(reqwest::header::AUTHORIZATION, answer.to_header_string())
                .send()
                .await
                .map_err(|e| AdapterError::unreachable(format!("brightsign authorized reboot failed: {e}")))?;

            if authorized.status().is_success() {
                Ok(())
            } else if authorized.status() == reqwest::StatusCode::UNAUTHORIZED {
                Err(AdapterError::auth("brightsign rejected digest credentials"))
            } else {
                Err(AdapterError::protocol(format!(
                    "brightsign authorized reboot returned status {}",
                    authorized.status()
                )))
            }
        })
    }
}

#[cfg(test)]
pub struct FakeDigestReboot {
    pub reboot_calls: std::sync::Mutex<u32>,
}

#[cfg(test)]
impl FakeDigestReboot {
    pub fn new() -> Self {
        Self { reboot_calls: std::sync::Mutex::new(0) }
    }
}

#[cfg(test)]
impl DigestReboot for FakeDigestReboot {
    fn reboot<'a>(&'a self, _ip: IpAddr, _username: &'a str, _password: &'a str) -> AdapterFuture<'a, ()> {
        *self.reboot_calls.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[path = "brightsign_tests.rs"]
mod brightsign_tests;

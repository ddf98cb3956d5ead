// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inventory HTTP client: JWT bearer login against `/auth/jwt/login`,
//! re-authenticating once on a 401, exactly as `UpstreamClient` wraps a
//! `reqwest::Client` for a single upstream in the driver crate this
//! service was generalized from.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::FleetConfig;
use crate::error::FleetError;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Raw inventory snapshot. Kept as `Vec<Value>` rather than typed structs
/// since [`super::classify::classify`] needs the untouched record shape to
/// run its dot-path filters against before a `Device` is ever constructed.
#[derive(Debug, Deserialize)]
pub struct InventoryResponse {
    pub devices: Vec<Value>,
    pub tags: Vec<Value>,
    pub locations: Vec<Value>,
}

pub struct ApiClient {
    base_url: String,
    username: String,
    password: String,
    client: Client,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &FleetConfig) -> Result<Self, FleetError> {
        let mut builder = Client::builder().timeout(std::time::Duration::from_secs(120));
        if let Ok(ca_pem) = std::fs::read(&config.api_root_ca) {
            let cert = reqwest::Certificate::from_pem(&ca_pem)
                .map_err(|e| FleetError::Inventory(format!("invalid api root ca: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build().map_err(|e| FleetError::Inventory(format!("building http client: {e}")))?;

        Ok(Self {
            base_url: format!("https://{}:443", config.api_hostname),
            username: config.api_system_username.clone(),
            password: config.api_system_password.clone(),
            client,
            token: RwLock::new(None),
        })
    }

    async fn login(&self) -> Result<(), FleetError> {
        let form = reqwest::multipart::Form::new().text("username", self.username.clone()).text("password", self.password.clone());
        let resp = self
            .client
            .post(format!("{}/auth/jwt/login", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| FleetError::Inventory(format!("login request failed: {e}")))?;
        let resp = resp.error_for_status().map_err(|e| FleetError::Inventory(format!("login rejected: {e}")))?;
        let body: LoginResponse =
            resp.json().await.map_err(|e| FleetError::Inventory(format!("login response malformed: {e}")))?;
        *self.token.write().await = Some(body.access_token);
        Ok(())
    }

    /// GETs `path` with a bearer token, logging in first if none is cached
    /// yet and re-authenticating once, then retrying, on a 401.
    async fn get(&self, path: &str) -> Result<Value, FleetError> {
        if self.token.read().await.is_none() {
            self.login().await?;
        }

        let token = self.token.read().await.clone();
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token.unwrap_or_default())
            .send()
            .await
            .map_err(|e| FleetError::Inventory(format!("request to {path} failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.login().await?;
            let token = self.token.read().await.clone();
            let resp = self
                .client
                .get(format!("{}{}", self.base_url, path))
                .bearer_auth(token.unwrap_or_default())
                .send()
                .await
                .map_err(|e| FleetError::Inventory(format!("retry request to {path} failed: {e}")))?;
            return resp
                .error_for_status()
                .map_err(|e| FleetError::Inventory(format!("{path} rejected after re-auth: {e}")))?
                .json()
                .await
                .map_err(|e| FleetError::Inventory(format!("{path} response malformed: {e}")));
        }

        resp.error_for_status()
            .map_err(|e| FleetError::Inventory(format!("{path} rejected: {e}")))?
            .json()
            .await
            .map_err(|e| FleetError::Inventory(format!("{path} response malformed: {e}")))
    }

    pub async fn fetch_inventory(&self) -> Result<InventoryResponse, FleetError> {
        let body = self.get("/api/").await?;
        serde_json::from_value(body).map_err(|e| FleetError::InventoryMismatch(format!("inventory payload: {e}")))
    }
}

/// Fetches the inventory, retrying indefinitely with a short backoff on any
/// error, grounded in the original's bare `except: await self.setup()`
/// retry-forever loop (tightened to a bounded sleep between attempts).
pub async fn fetch_with_retry(api: &ApiClient, config: &Arc<FleetConfig>) -> InventoryResponse {
    loop {
        match api.fetch_inventory().await {
            Ok(inventory) => return inventory,
            Err(err) => {
                tracing::warn!(err = %err, "inventory fetch failed, retrying");
                tokio::time::sleep(config.inventory_retry_interval()).await;
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted WebOS registration tokens. Replaces the original's bare
//! `open(path).read()/.write()` (flagged as a redesign target) with an
//! interface plus an atomic write-temp-then-rename implementation guarded
//! by a process-wide file lock, so concurrent registrations across TVs
//! never interleave writes to the same JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::adapter::AdapterFuture;
use crate::error::AdapterError;

pub trait CredentialStore: Send + Sync {
    fn load<'a>(&'a self, device_name: &'a str) -> AdapterFuture<'a, Option<String>>;
    fn save<'a>(&'a self, device_name: &'a str, client_key: &'a str) -> AdapterFuture<'a, ()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(flatten)]
    keys: HashMap<String, String>,
}

pub struct JsonFileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    async fn read_all(&self) -> CredentialFile {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => CredentialFile::default(),
        }
    }

    async fn write_all(&self, file: &CredentialFile) -> Result<(), AdapterError> {
        let body = serde_json::to_vec_pretty(file)
            .map_err(|e| AdapterError::protocol(format!("failed to serialize credential store: {e}")))?;
        let tmp_path = tmp_path_for(&self.path);
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| AdapterError::protocol(format!("failed to write credential store: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AdapterError::protocol(format!("failed to publish credential store: {e}")))
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl CredentialStore for JsonFileCredentialStore {
    fn load<'a>(&'a self, device_name: &'a str) -> AdapterFuture<'a, Option<String>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.read_all().await.keys.get(device_name).cloned())
        })
    }

    fn save<'a>(&'a self, device_name: &'a str, client_key: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut file = self.read_all().await;
            file.keys.insert(device_name.to_owned(), client_key.to_owned());
            self.write_all(&file).await
        })
    }
}

#[cfg(test)]
pub struct InMemoryCredentialStore {
    pub keys: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self { keys: Mutex::new(HashMap::new()) }
    }
}

#[cfg(test)]
impl CredentialStore for InMemoryCredentialStore {
    fn load<'a>(&'a self, device_name: &'a str) -> AdapterFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.keys.lock().await.get(device_name).cloned()) })
    }

    fn save<'a>(&'a self, device_name: &'a str, client_key: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            self.keys.lock().await.insert(device_name.to_owned(), client_key.to_owned());
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "credential_store_tests.rs"]
mod credential_store_tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use csnmp::{ObjectIdentifier, ObjectValue, Snmp2cClient};

use crate::error::AdapterError;

use super::{AdapterFuture, SnmpPorts};

const SNMP_PORT: u16 = 161;
const SNMP_TIMEOUT: Duration = Duration::from_secs(5);

/// SNMP v2c port-state adapter for Gude PDUs, backed by `csnmp`.
pub struct CsnmpAdapter;

impl CsnmpAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsnmpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect(ip: IpAddr, community: &str) -> Result<Snmp2cClient, AdapterError> {
    tokio::time::timeout(
        SNMP_TIMEOUT,
        Snmp2cClient::new((ip, SNMP_PORT).into(), community.as_bytes().to_vec(), None, 0),
    )
    .await
    .map_err(|_| AdapterError::timeout("snmp session setup timed out"))?
    .map_err(|e| AdapterError::unreachable(format!("snmp session setup failed: {e}")))
}

fn parse_oid(oid: &str) -> Result<ObjectIdentifier, AdapterError> {
    ObjectIdentifier::from_str(oid).map_err(|_| AdapterError::protocol(format!("malformed oid: {oid}")))
}

fn value_as_bool(value: &ObjectValue) -> Result<bool, AdapterError> {
    match value {
        ObjectValue::Integer(n) => Ok(*n != 0),
        ObjectValue::Unsigned32(n) => Ok(*n != 0),
        other => Err(AdapterError::protocol(format!("unexpected snmp value shape: {other:?}"))),
    }
}

impl SnmpPorts for CsnmpAdapter {
    fn get_ports<'a>(
        &'a self,
        ip: IpAddr,
        community: &'a str,
        oids: &'a [String],
    ) -> AdapterFuture<'a, Vec<bool>> {
        Box::pin(async move {
            let client = connect(ip, community).await?;
            let mut results = Vec::with_capacity(oids.len());
            for oid in oids {
                let oid = parse_oid(oid)?;
                let value = tokio::time::timeout(SNMP_TIMEOUT, client.get(oid))
                    .await
                    .map_err(|_| AdapterError::timeout("snmp get timed out"))?
                    .map_err(|e| AdapterError::protocol(format!("snmp get failed: {e}")))?;
                results.push(value_as_bool(&value)?);
            }
            Ok(results)
        })
    }

    fn set_ports<'a>(
        &'a self,
        ip: IpAddr,
        community: &'a str,
        values: &'a [(String, bool)],
    ) -> AdapterFuture<'a, Vec<bool>> {
        Box::pin(async move {
            let client = connect(ip, community).await?;
            let mut results = Vec::with_capacity(values.len());
            for (oid, desired) in values {
                let oid = parse_oid(oid)?;
                let value = ObjectValue::Integer(if *desired { 1 } else { 0 });
                let applied = tokio::time::timeout(SNMP_TIMEOUT, client.set(oid, value))
                    .await
                    .map_err(|_| AdapterError::timeout("snmp set timed out"))?
                    .map_err(|e| AdapterError::protocol(format!("snmp set failed: {e}")))?;
                results.push(value_as_bool(&applied)?);
            }
            Ok(results)
        })
    }
}

#[cfg(test)]
pub struct FakeSnmpPorts {
    pub ports: std::sync::Mutex<std::collections::HashMap<String, bool>>,
}

#[cfg(test)]
impl FakeSnmpPorts {
    pub fn new() -> Self {
        Self { ports: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }

    pub fn seed(&self, oid: &str, value: bool) {
        self.ports.lock().unwrap().insert(oid.to_owned(), value);
    }
}

#[cfg(test)]
impl SnmpPorts for FakeSnmpPorts {
    fn get_ports<'a>(
        &'a self,
        _ip: IpAddr,
        _community: &'a str,
        oids: &'a [String],
    ) -> AdapterFuture<'a, Vec<bool>> {
        let ports = self.ports.lock().unwrap();
        let values = oids.iter().map(|oid| *ports.get(oid).unwrap_or(&false)).collect();
        Box::pin(async move { Ok(values) })
    }

    fn set_ports<'a>(
        &'a self,
        _ip: IpAddr,
        _community: &'a str,
        values: &'a [(String, bool)],
    ) -> AdapterFuture<'a, Vec<bool>> {
        let mut ports = self.ports.lock().unwrap();
        let mut applied = Vec::with_capacity(values.len());
        for (oid, desired) in values {
            ports.insert(oid.clone(), *desired);
            applied.push(*desired);
        }
        Box::pin(async move { Ok(applied) })
    }
}

#[cfg(test)]
#[path = "snmp_gude_tests.rs"]
mod snmp_gude_tests;

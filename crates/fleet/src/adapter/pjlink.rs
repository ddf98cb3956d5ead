// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::AdapterError;

use super::{AdapterFuture, PjlinkPower, PjlinkSession, PjlinkStatus};

const PJLINK_PORT: u16 = 4352;
const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// PJLink class-1 text protocol client. Each call opens and tears down its
/// own TCP session rather than holding one across awaits — the device
/// mutex serializes calls per device, so there is never more than one
/// session open per projector at a time.
pub struct TcpPjlinkAdapter;

impl TcpPjlinkAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpPjlinkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens a session and returns the stream plus the auth digest to prefix
/// onto every subsequent command (empty string when the projector does not
/// require authentication).
async fn open_session(ip: IpAddr, password: &str) -> Result<(TcpStream, String), AdapterError> {
    let mut stream = tokio::time::timeout(SESSION_TIMEOUT, TcpStream::connect((ip, PJLINK_PORT)))
        .await
        .map_err(|_| AdapterError::timeout("pjlink connect timed out"))?
        .map_err(|e| AdapterError::unreachable(format!("pjlink connect failed: {e}")))?;

    let greeting = read_line(&mut stream).await?;
    let prefix = if let Some(seed) = greeting.strip_prefix("PJLINK 1 ") {
        md5_hex(format!("{}{}", seed.trim(), password).as_bytes())
    } else if greeting.starts_with("PJLINK 0") {
        String::new()
    } else {
        return Err(AdapterError::protocol(format!("unexpected pjlink greeting: {greeting}")));
    };

    Ok((stream, prefix))
}

async fn read_line(stream: &mut TcpStream) -> Result<String, AdapterError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = tokio::time::timeout(SESSION_TIMEOUT, stream.read(&mut byte))
            .await
            .map_err(|_| AdapterError::timeout("pjlink read timed out"))?
            .map_err(|e| AdapterError::unreachable(format!("pjlink read failed: {e}")))?;
        if n == 0 {
            break;
        }
        if byte[0] == b'\r' {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).map_err(|_| AdapterError::protocol("pjlink response was not utf8"))
}

async fn send_command(
    stream: &mut TcpStream,
    auth_prefix: &str,
    command: &str,
) -> Result<String, AdapterError> {
    stream
        .write_all(format!("{auth_prefix}{command}\r").as_bytes())
        .await
        .map_err(|e| AdapterError::protocol(format!("pjlink write failed: {e}")))?;
    read_line(stream).await
}

fn parse_power(value: &str) -> PjlinkPower {
    match value.trim() {
        "0" => PjlinkPower::Off,
        "1" => PjlinkPower::On,
        "2" => PjlinkPower::Cooling,
        "3" => PjlinkPower::Warming,
        _ => PjlinkPower::Unknown,
    }
}

fn parse_errors(value: &str) -> std::collections::HashMap<String, String> {
    const FIELDS: [&str; 6] = ["fan", "lamp", "temperature", "cover", "filter", "other"];
    let mut errors = std::collections::HashMap::new();
    for (field, code) in FIELDS.iter().zip(value.trim().chars()) {
        if code != '0' {
            errors.insert((*field).to_owned(), code.to_string());
        }
    }
    errors
}

fn parse_lamps(value: &str) -> Vec<(bool, u32)> {
    let tokens: Vec<&str> = value.trim().split_whitespace().collect();
    tokens
        .chunks(2)
        .filter_map(|pair| {
            let hours: u32 = pair.first()?.parse().ok()?;
            let on = pair.get(1).map(|s| *s == "1").unwrap_or(false);
            Some((on, hours))
        })
        .collect()
}

/// PJLink mandates MD5 specifically for its challenge/response
/// authentication (`md5(seed + password)`).
fn md5_hex(input: &[u8]) -> String {
    use md5::{Digest, Md5};
    let digest = Md5::digest(input);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl PjlinkSession for TcpPjlinkAdapter {
    fn query<'a>(&'a self, ip: IpAddr, password: &'a str) -> AdapterFuture<'a, PjlinkStatus> {
        Box::pin(async move {
            let (mut stream, auth) = open_session(ip, password).await?;

            let power = send_command(&mut stream, &auth, "%1POWR ?").await?;
            let power = power
                .split('=')
                .nth(1)
                .ok_or_else(|| AdapterError::protocol("malformed POWR response"))?
                .to_owned();

            let class = send_command(&mut stream, &auth, "%1CLSS ?").await.ok();
            let class = class
                .as_deref()
                .and_then(|r| r.split('=').nth(1))
                .and_then(|v| v.trim().parse::<u8>().ok());

            let errors = send_command(&mut stream, &auth, "%1ERST ?")
                .await
                .ok()
                .and_then(|r| r.split('=').nth(1).map(parse_errors))
                .unwrap_or_default();

            let lamps = send_command(&mut stream, &auth, "%1LAMP ?")
                .await
                .ok()
                .and_then(|r| r.split('=').nth(1).map(parse_lamps))
                .unwrap_or_default();

            Ok(PjlinkStatus {
                power: Some(parse_power(&power)),
                class,
                lamps,
                errors,
                resolution: None,
            })
        })
    }

    fn set_power<'a>(&'a self, ip: IpAddr, password: &'a str, on: bool) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let (mut stream, auth) = open_session(ip, password).await?;
            let command = if on { "%1POWR 1" } else { "%1POWR 0" };
            let response = send_command(&mut stream, &auth, command).await?;
            if response.contains("ERR") {
                return Err(AdapterError::protocol(format!("pjlink rejected power command: {response}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
pub struct FakePjlinkSession {
    pub status: std::sync::Mutex<PjlinkStatus>,
    pub set_power_calls: std::sync::Mutex<Vec<bool>>,
}

#[cfg(test)]
impl FakePjlinkSession {
    pub fn new(status: PjlinkStatus) -> Self {
        Self { status: std::sync::Mutex::new(status), set_power_calls: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl PjlinkSession for FakePjlinkSession {
    fn query<'a>(&'a self, _ip: IpAddr, _password: &'a str) -> AdapterFuture<'a, PjlinkStatus> {
        let status = self.status.lock().unwrap().clone();
        Box::pin(async move { Ok(status) })
    }

    fn set_power<'a>(&'a self, _ip: IpAddr, _password: &'a str, on: bool) -> AdapterFuture<'a, ()> {
        self.set_power_calls.lock().unwrap().push(on);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[path = "pjlink_tests.rs"]
mod pjlink_tests;

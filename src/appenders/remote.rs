//! Remote log server transport
//!
//! Sends each batch as one `POST /log/create-many` with a JSON body of the
//! form `{"logs":[{"level":..,"title":..,"message":..,"env":..,"data":..}]}`.
//! Only `200 OK` counts as delivered. Failed batches are not retried.

use crate::core::{
    auth::generate_hash, BatchTransport, Environment, LogLevel, LogRecord, LoggerConfig,
    LoggerError, Payload, Result,
};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

pub const PLATFORM_HEADER: &str = "Platform-Name";

/// Wire projection of one record
#[derive(Debug, Serialize)]
pub struct HttpLog<'a> {
    pub level: LogLevel,
    pub title: &'a str,
    pub message: &'a str,
    pub env: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Payload>,
}

impl<'a> From<&'a LogRecord> for HttpLog<'a> {
    fn from(record: &'a LogRecord) -> Self {
        Self {
            level: record.level,
            title: &record.title,
            message: &record.message,
            env: record.environment,
            data: record.payload.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogsRequest<'a> {
    pub logs: Vec<HttpLog<'a>>,
}

/// Serialize `records` into the create-many request body
///
/// # Errors
///
/// Returns error if a payload cannot be encoded as JSON
pub fn build_request_body(records: &[LogRecord]) -> Result<Vec<u8>> {
    let request = LogsRequest {
        logs: records.iter().map(HttpLog::from).collect(),
    };
    Ok(serde_json::to_vec(&request)?)
}

/// HTTP transport for the remote sink
///
/// The client is built on first use and rebuilt when the config snapshot
/// changes its TLS or timeout settings.
#[derive(Default)]
pub struct RemoteAppender {
    client: Option<(ClientKey, Client)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClientKey {
    insecure_skip_verify: bool,
    timeout: Duration,
}

impl RemoteAppender {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&mut self, config: &LoggerConfig) -> Result<&Client> {
        let key = ClientKey {
            insecure_skip_verify: config.insecure_skip_verify,
            timeout: config.request_timeout(),
        };

        let reusable = matches!(&self.client, Some((current, _)) if *current == key);
        if !reusable {
            let client = Client::builder()
                .timeout(key.timeout)
                .danger_accept_invalid_certs(key.insecure_skip_verify)
                .build()?;
            self.client = Some((key, client));
        }

        match self.client {
            Some((_, ref client)) => Ok(client),
            None => Err(LoggerError::other("HTTP client not initialized")),
        }
    }
}

impl BatchTransport for RemoteAppender {
    fn send_batch(&mut self, records: &[LogRecord], config: &LoggerConfig) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = build_request_body(records)?;
        let url = config.server_url();
        let token = generate_hash(&config.server_key);

        let response = self
            .client_for(config)?
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, token)
            .header(PLATFORM_HEADER, config.server_platform.as_str())
            .body(body)
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().unwrap_or_default();
            return Err(LoggerError::remote_status(status.as_u16(), text));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

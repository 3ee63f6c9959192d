//! Territory sharing by email through a hosted function.
//!
//! # Invariants
//! - The recipient email is validated before any request is sent.
//! - Only ids cross the wire; the function reads the territory itself.

use crate::model::validation::is_valid_email;
use crate::service::DomainSync;
use log::{error, info};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareRequest {
    pub territory_id: String,
    pub email: String,
}

#[derive(Debug)]
pub enum ShareError {
    InvalidEmail,
    UnknownTerritory(String),
    Http(reqwest::Error),
    /// Function answered with a non-success status or an `error` body.
    Rejected { status: u16, message: String },
}

impl Display for ShareError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "recipient email is invalid"),
            Self::UnknownTerritory(id) => write!(f, "territory not found: {id}"),
            Self::Http(err) => write!(f, "share request failed: {err}"),
            Self::Rejected { status, message } => {
                write!(f, "share rejected (status {status}): {message}")
            }
        }
    }
}

impl Error for ShareError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ShareError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

pub trait TerritoryShare {
    fn share(&self, request: &ShareRequest) -> Result<(), ShareError>;
}

/// POSTs `ShareRequest` JSON to a serverless function endpoint.
pub struct FunctionShareClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl FunctionShareClient {
    pub fn new(endpoint: Url, api_key: Option<String>, timeout: Duration) -> Result<Self, ShareError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl TerritoryShare for FunctionShareClient {
    fn share(&self, request: &ShareRequest) -> Result<(), ShareError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key.as_str()).bearer_auth(key);
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        parse_share_response(status, &body)
    }
}

/// Success needs a 2xx status and no `error` field in the body.
pub fn parse_share_response(status: u16, body: &str) -> Result<(), ShareError> {
    let error_message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").cloned())
        .map(|error| match error {
            Value::String(message) => message,
            other => other.to_string(),
        });

    match error_message {
        Some(message) => Err(ShareError::Rejected { status, message }),
        None if (200..300).contains(&status) => Ok(()),
        None => Err(ShareError::Rejected {
            status,
            message: body.trim().chars().take(200).collect(),
        }),
    }
}

/// Sends a known territory to `email`.
pub fn share_territory(
    sharer: &dyn TerritoryShare,
    sync: &DomainSync,
    territory_id: &str,
    email: &str,
) -> Result<(), ShareError> {
    let started_at = Instant::now();
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(ShareError::InvalidEmail);
    }
    if sync.territory(territory_id).is_none() {
        return Err(ShareError::UnknownTerritory(territory_id.to_string()));
    }

    let request = ShareRequest {
        territory_id: territory_id.to_string(),
        email: email.to_string(),
    };
    match sharer.share(&request) {
        Ok(()) => {
            info!(
                "event=territory_share module=share status=ok duration_ms={} id={territory_id}",
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=territory_share module=share status=error duration_ms={} id={territory_id} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

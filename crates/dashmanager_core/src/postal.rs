//! Brazilian postal-code (CEP) lookup used to prefill location addresses.
//!
//! # Responsibility
//! - Normalize user-typed codes and query the ViaCEP web service.
//! - Render a found address into the single-line location format.
//!
//! # Invariants
//! - Only 8-digit codes reach the network.
//! - A failed or empty lookup never modifies the location draft.

use crate::model::location::{Coordinates, LocationDraft};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Placeholder coordinates (São Paulo) applied after a successful lookup.
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    lat: -23.5505,
    lng: -46.6333,
};

const POSTAL_CODE_DIGITS: usize = 8;

/// Address fields returned by the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostalAddress {
    #[serde(rename = "cep", default)]
    pub code: String,
    #[serde(rename = "logradouro", default)]
    pub street: String,
    #[serde(rename = "complemento", default)]
    pub complement: String,
    #[serde(rename = "bairro", default)]
    pub neighborhood: String,
    #[serde(rename = "localidade", default)]
    pub city: String,
    #[serde(rename = "uf", default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(PostalAddress),
    NotFound,
}

#[derive(Debug)]
pub enum LookupError {
    InvalidCode(String),
    Http(reqwest::Error),
    Status(u16),
    InvalidResponse(String),
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode(code) => write!(f, "postal code must have 8 digits: `{code}`"),
            Self::Http(err) => write!(f, "postal lookup request failed: {err}"),
            Self::Status(status) => write!(f, "postal lookup returned status {status}"),
            Self::InvalidResponse(message) => write!(f, "invalid postal lookup response: {message}"),
        }
    }
}

impl Error for LookupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Resolves a normalized 8-digit code to an address.
pub trait PostalLookup {
    fn lookup(&self, code: &str) -> Result<LookupOutcome, LookupError>;
}

/// Blocking client for `{base}/ws/{code}/json/`.
pub struct ViaCepClient {
    client: Client,
    base_url: Url,
}

impl ViaCepClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }
}

impl PostalLookup for ViaCepClient {
    fn lookup(&self, code: &str) -> Result<LookupOutcome, LookupError> {
        let code =
            normalize_postal_code(code).ok_or_else(|| LookupError::InvalidCode(code.to_string()))?;
        let url = self
            .base_url
            .join(&format!("ws/{code}/json/"))
            .map_err(|err| LookupError::InvalidResponse(err.to_string()))?;

        let response = self.client.get(url).send()?;
        let status = response.status();
        // The service answers malformed codes with 400; treat it like an unknown code.
        if status.as_u16() == 400 {
            return Ok(LookupOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        parse_lookup_body(&response.text()?)
    }
}

/// Keeps digits only; returns `None` unless exactly 8 remain.
pub fn normalize_postal_code(input: &str) -> Option<String> {
    let digits = input
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    (digits.len() == POSTAL_CODE_DIGITS).then_some(digits)
}

/// Parses a lookup body; `{"erro": true}` (or `"true"`) means not found.
pub fn parse_lookup_body(body: &str) -> Result<LookupOutcome, LookupError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| LookupError::InvalidResponse(err.to_string()))?;
    let not_found = match value.get("erro") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        _ => false,
    };
    if not_found {
        return Ok(LookupOutcome::NotFound);
    }
    serde_json::from_value(value)
        .map(LookupOutcome::Found)
        .map_err(|err| LookupError::InvalidResponse(err.to_string()))
}

/// `street, number, complement, neighborhood, city - state, code`, skipping
/// empty parts.
pub fn format_address(
    address: &PostalAddress,
    number: Option<&str>,
    complement: Option<&str>,
) -> String {
    let city_state = format!("{} - {}", address.city.trim(), address.state.trim());
    [
        address.street.trim(),
        number.unwrap_or_default().trim(),
        complement.unwrap_or_default().trim(),
        address.neighborhood.trim(),
        city_state.as_str(),
        address.code.trim(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

/// Why a prefill left the draft untouched.
#[derive(Debug)]
pub enum PrefillError {
    InvalidCode,
    NotFound,
    Lookup(LookupError),
}

impl Display for PrefillError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "postal code must have 8 digits"),
            Self::NotFound => write!(f, "postal code not found"),
            Self::Lookup(err) => write!(f, "postal lookup failed: {err}"),
        }
    }
}

impl Error for PrefillError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lookup(err) => Some(err),
            _ => None,
        }
    }
}

/// Looks up `code` and writes the formatted address into `draft`.
///
/// On success the draft also gets `DEFAULT_COORDINATES` unless it already
/// has coordinates. The returned address can be reused to re-render after
/// number/complement edits.
pub fn prefill_address(
    draft: &mut LocationDraft,
    lookup: &dyn PostalLookup,
    code: &str,
    number: Option<&str>,
    complement: Option<&str>,
) -> Result<PostalAddress, PrefillError> {
    let code = normalize_postal_code(code).ok_or(PrefillError::InvalidCode)?;
    match lookup.lookup(&code) {
        Ok(LookupOutcome::Found(address)) => {
            draft.address = format_address(&address, number, complement);
            if draft.coordinates.is_none() {
                draft.coordinates = Some(DEFAULT_COORDINATES);
            }
            info!("event=postal_lookup module=postal status=ok");
            Ok(address)
        }
        Ok(LookupOutcome::NotFound) => {
            warn!("event=postal_lookup module=postal status=error error_code=not_found");
            Err(PrefillError::NotFound)
        }
        Err(err) => {
            warn!("event=postal_lookup module=postal status=error error_code=lookup_failed error={err}");
            Err(PrefillError::Lookup(err))
        }
    }
}

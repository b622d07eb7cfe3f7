//! Query parameters accepted by the gateway
//!
//! Every field is optional at the extractor level so that a missing or
//! malformed parameter is reported in the API envelope rather than as a bare
//! extractor rejection.

use serde::Deserialize;

use super::response::ApiError;
use crate::core_types::Amount;

/// `POST /accounts?owner=&balance=`
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountParams {
    pub owner: Option<String>,
    pub balance: Option<String>,
}

impl CreateAccountParams {
    pub fn validate(&self) -> Result<(String, i64), ApiError> {
        let owner = required("owner", &self.owner)?;
        let raw = required("balance", &self.balance)?;
        let balance = raw
            .parse::<i64>()
            .map_err(|_| ApiError::bad_request(format!("balance must be an integer, got {}", raw)))?;
        Ok((owner.to_string(), balance))
    }
}

/// `POST /transactions?from=&to=&value=`
#[derive(Debug, Default, Deserialize)]
pub struct CreateTransferParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
}

impl CreateTransferParams {
    pub fn validate(&self) -> Result<(String, String, i64), ApiError> {
        let from = required("from", &self.from)?;
        let to = required("to", &self.to)?;
        let value = required("value", &self.value)?;
        let amount = value.parse::<Amount>().map_err(ApiError::from)?;
        Ok((from.to_string(), to.to_string(), amount.get()))
    }
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("missing query parameter: {}", name))),
    }
}

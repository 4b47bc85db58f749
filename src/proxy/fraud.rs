//! Fraud score lookup for a proxy's public IP

use crate::proxy::models::{FailureReason, Flag, ProbeError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Fraud service verdict for one IP
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FraudReport {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub fraud_score: u8,
    #[serde(rename = "ISP", default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub proxy: Flag,
    #[serde(default)]
    pub vpn: Flag,
    #[serde(default)]
    pub tor: Flag,
    #[serde(default)]
    pub mobile: Flag,
    #[serde(default)]
    pub recent_abuse: Flag,
    #[serde(default)]
    pub bot_status: Flag,
}

impl FraudReport {
    /// Whether the service reported success, using JSON truthiness
    pub fn is_success(&self) -> bool {
        match &self.success {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null => false,
        }
    }

    pub fn isp(&self) -> String {
        self.isp
            .clone()
            .unwrap_or_else(|| Flag::NotAvailable.to_string())
    }
}

/// Score is clamped to 0-100; anything absent or non-numeric counts as 0
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let score = value.as_f64().unwrap_or(0.0);
    Ok(score.round().clamp(0.0, 100.0) as u8)
}

/// Build `{base}/{api_key}/{public_ip}?strictness=1`
pub fn fraud_url(base: &str, api_key: &str, public_ip: &str) -> String {
    format!(
        "{}/{}/{}?strictness=1",
        base.trim_end_matches('/'),
        api_key,
        public_ip
    )
}

/// Query the fraud service directly, without going through the proxy.
///
/// Transport errors map to `FraudServiceUnreachable`; an answer that is not
/// JSON or has a falsy `success` maps to `FraudServiceRejected`.
pub async fn score(
    client: &Client,
    base: &str,
    api_key: &str,
    public_ip: &str,
) -> Result<FraudReport, ProbeError> {
    let url = fraud_url(base, api_key, public_ip);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ProbeError::new(FailureReason::FraudServiceUnreachable, e.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|e| ProbeError::new(FailureReason::FraudServiceUnreachable, e.to_string()))?;

    let report: FraudReport = serde_json::from_str(&body).map_err(|e| {
        ProbeError::new(
            FailureReason::FraudServiceRejected,
            format!("invalid response: {}", e),
        )
    })?;

    if !report.is_success() {
        let detail = report
            .message
            .clone()
            .unwrap_or_else(|| "success flag not set".to_string());
        return Err(ProbeError::new(FailureReason::FraudServiceRejected, detail));
    }

    Ok(report)
}

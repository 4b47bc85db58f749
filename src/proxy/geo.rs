//! Geolocation lookup made through the proxy under test

use crate::proxy::models::{FailureReason, ProbeError};
use log::debug;
use reqwest::Client;
use serde::Deserialize;

/// Public-facing location of a proxy as seen by the geolocation service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeoLocation {
    /// Exit IP address of the proxy
    pub public_ip: String,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl GeoLocation {
    /// Human readable `city, region` string
    pub fn location(&self) -> String {
        let parts: Vec<&str> = [self.city.as_deref(), self.region.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            String::from("Unknown")
        } else {
            parts.join(", ")
        }
    }
}

/// Raw geolocation service response
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    message: Option<String>,
    query: Option<String>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
}

impl GeoResponse {
    fn into_location(self) -> Result<GeoLocation, ProbeError> {
        if self.status.as_deref() != Some("success") {
            let detail = self
                .message
                .or(self.status)
                .unwrap_or_else(|| "missing status".to_string());
            return Err(ProbeError::new(FailureReason::GeolocationRejected, detail));
        }

        let public_ip = self
            .query
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| {
                ProbeError::new(FailureReason::GeolocationRejected, "response has no public IP")
            })?;

        Ok(GeoLocation {
            public_ip,
            city: self.city,
            region: self.region_name,
        })
    }
}

/// Query the geolocation service with a client that routes through the proxy.
///
/// Transport errors map to `GeolocationUnreachable`; an answer that is not
/// JSON or does not report `"success"` maps to `GeolocationRejected`.
pub async fn locate(client: &Client, geo_url: &str) -> Result<GeoLocation, ProbeError> {
    let response = client
        .get(geo_url)
        .send()
        .await
        .map_err(|e| ProbeError::new(FailureReason::GeolocationUnreachable, e.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|e| ProbeError::new(FailureReason::GeolocationUnreachable, e.to_string()))?;

    let parsed: GeoResponse = serde_json::from_str(&body).map_err(|e| {
        debug!("Unparseable geolocation response: {}", e);
        ProbeError::new(
            FailureReason::GeolocationRejected,
            format!("invalid response: {}", e),
        )
    })?;

    parsed.into_location()
}

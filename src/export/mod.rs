//! Filtering and exporting checked proxies
//!
//! Rows can be narrowed with a [`FilterSpec`], ordered with [`sort_rows`] and
//! written out either as CSV with a chosen set of columns or as one templated
//! line per proxy.

pub mod filter;
pub mod render;

pub use filter::{filter, sort_rows, BoolFilter, FilterSpec};
pub use render::{
    render, render_tabular, render_templated, write_export, ExportError, ExportFormat,
    ExportMode, ExportSelection,
};

use crate::proxy::models::ProxyRow;
use std::fmt;
use std::str::FromStr;

/// Result table columns, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    ProxyIp,
    PublicIp,
    Location,
    Isp,
    FraudScore,
    Proxy,
    Vpn,
    Tor,
    Mobile,
    RecentAbuse,
    BotStatus,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::ProxyIp,
        Column::PublicIp,
        Column::Location,
        Column::Isp,
        Column::FraudScore,
        Column::Proxy,
        Column::Vpn,
        Column::Tor,
        Column::Mobile,
        Column::RecentAbuse,
        Column::BotStatus,
    ];

    /// Header text, also the placeholder name in templates
    pub fn name(&self) -> &'static str {
        match self {
            Column::ProxyIp => "Proxy IP",
            Column::PublicIp => "Public IP",
            Column::Location => "Location",
            Column::Isp => "ISP",
            Column::FraudScore => "Fraud Score",
            Column::Proxy => "Proxy",
            Column::Vpn => "VPN",
            Column::Tor => "Tor",
            Column::Mobile => "Mobile",
            Column::RecentAbuse => "Recent Abuse",
            Column::BotStatus => "Bot Status",
        }
    }

    /// The row's value in this column as displayed and exported
    pub fn value(&self, row: &ProxyRow) -> String {
        match self {
            Column::ProxyIp => row.proxy_host.clone(),
            Column::PublicIp => row.public_ip.clone(),
            Column::Location => row.location.clone(),
            Column::Isp => row.isp.clone(),
            Column::FraudScore => row.fraud_score.to_string(),
            Column::Proxy => row.is_proxy.to_string(),
            Column::Vpn => row.is_vpn.to_string(),
            Column::Tor => row.is_tor.to_string(),
            Column::Mobile => row.is_mobile.to_string(),
            Column::RecentAbuse => row.recent_abuse.to_string(),
            Column::BotStatus => row.bot_status.to_string(),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            Column::Proxy
                | Column::Vpn
                | Column::Tor
                | Column::Mobile
                | Column::RecentAbuse
                | Column::BotStatus
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    /// Accepts header names in any case, with spaces, dashes or underscores
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = |name: &str| -> String {
            name.chars()
                .filter(|c| !matches!(c, ' ' | '_' | '-'))
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = normalize(s);

        Column::ALL
            .into_iter()
            .find(|column| normalize(column.name()) == wanted)
            .ok_or_else(|| format!("Unknown column: {}", s))
    }
}

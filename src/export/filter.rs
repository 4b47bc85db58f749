//! Row filtering and column sorting

use crate::export::Column;
use crate::proxy::models::ProxyRow;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Requirement on one boolean column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolFilter {
    #[default]
    Any,
    True,
    False,
}

impl BoolFilter {
    /// The exact text a row must show in the column, if constrained
    pub fn required(&self) -> Option<&'static str> {
        match self {
            BoolFilter::Any => None,
            BoolFilter::True => Some("True"),
            BoolFilter::False => Some("False"),
        }
    }
}

impl FromStr for BoolFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "any" => Ok(BoolFilter::Any),
            "true" => Ok(BoolFilter::True),
            "false" => Ok(BoolFilter::False),
            _ => Err(format!("Invalid filter value: {}. Use: all, true, false", s)),
        }
    }
}

impl fmt::Display for BoolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.required().unwrap_or("All"))
    }
}

/// Which rows to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Inclusive upper bound on the fraud score
    pub max_fraud_score: u8,
    pub proxy: BoolFilter,
    pub vpn: BoolFilter,
    pub tor: BoolFilter,
    pub mobile: BoolFilter,
    pub recent_abuse: BoolFilter,
    pub bot_status: BoolFilter,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            max_fraud_score: 100,
            proxy: BoolFilter::Any,
            vpn: BoolFilter::Any,
            tor: BoolFilter::Any,
            mobile: BoolFilter::Any,
            recent_abuse: BoolFilter::Any,
            bot_status: BoolFilter::Any,
        }
    }
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_fraud_score(mut self, max: u8) -> Self {
        self.max_fraud_score = max.min(100);
        self
    }

    /// Set the requirement for one of the boolean columns; other columns are ignored
    pub fn with_bool(mut self, column: Column, requirement: BoolFilter) -> Self {
        match column {
            Column::Proxy => self.proxy = requirement,
            Column::Vpn => self.vpn = requirement,
            Column::Tor => self.tor = requirement,
            Column::Mobile => self.mobile = requirement,
            Column::RecentAbuse => self.recent_abuse = requirement,
            Column::BotStatus => self.bot_status = requirement,
            _ => {}
        }
        self
    }

    fn bool_constraints(&self) -> [(Column, BoolFilter); 6] {
        [
            (Column::Proxy, self.proxy),
            (Column::Vpn, self.vpn),
            (Column::Tor, self.tor),
            (Column::Mobile, self.mobile),
            (Column::RecentAbuse, self.recent_abuse),
            (Column::BotStatus, self.bot_status),
        ]
    }

    /// Whether a row passes every constraint.
    ///
    /// Boolean columns compare by text, so `N/A` matches neither `True` nor `False`.
    pub fn matches(&self, row: &ProxyRow) -> bool {
        if row.fraud_score > self.max_fraud_score {
            return false;
        }

        self.bool_constraints()
            .iter()
            .all(|(column, requirement)| match requirement.required() {
                Some(required) => column.value(row) == required,
                None => true,
            })
    }
}

/// Keep the rows that match `spec`, preserving their order
pub fn filter<'a, I>(rows: I, spec: &FilterSpec) -> Vec<&'a ProxyRow>
where
    I: IntoIterator<Item = &'a ProxyRow>,
{
    rows.into_iter().filter(|row| spec.matches(row)).collect()
}

/// Sort rows by one column.
///
/// Compares numerically when every value in the column is a number,
/// otherwise as text. The sort is stable.
pub fn sort_rows<R: Borrow<ProxyRow>>(rows: &mut [R], column: Column, descending: bool) {
    let numeric = rows
        .iter()
        .all(|row| column.value(row.borrow()).parse::<f64>().is_ok());

    rows.sort_by(|a, b| {
        let (a, b) = (column.value(a.borrow()), column.value(b.borrow()));
        let ordering = if numeric {
            let (a, b) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        } else {
            a.cmp(&b)
        };

        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

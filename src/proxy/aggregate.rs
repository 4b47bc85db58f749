//! Collected outcomes of one batch run

use crate::proxy::models::{ProbeFailure, ProbeOutcome, ProxyRow};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Counters shown under the results table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of successfully probed proxies
    pub total: usize,
    /// Successful proxies with a fraud score at or above the high risk threshold
    pub high_risk: usize,
}

/// Every outcome of one batch run.
///
/// Rows and failures are in completion order, not input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAggregate {
    pub rows: Vec<ProxyRow>,
    pub failures: Vec<ProbeFailure>,
    pub summary: Summary,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Record one outcome. Counters move together with the row they describe.
    pub fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success(row) => {
                self.summary.total += 1;
                if row.is_high_risk() {
                    self.summary.high_risk += 1;
                }
                self.rows.push(row);
            }
            ProbeOutcome::Failure(failure) => self.failures.push(failure),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of outcomes recorded so far
    pub fn len(&self) -> usize {
        self.rows.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save the aggregate as a JSON snapshot
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| {
                warn!("Cannot write results snapshot {:?}: {}", path, e);
                e
            })
            .with_context(|| format!("Failed to write results to {:?}", path))?;
        Ok(())
    }

    /// Load a snapshot written by [`ResultAggregate::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| {
                warn!("Cannot read results snapshot {:?}: {}", path, e);
                e
            })
            .with_context(|| format!("Failed to read results from {:?}", path))?;
        let aggregate = serde_json::from_str(&content)
            .map_err(|e| {
                warn!("Results snapshot {:?} is not valid: {}", path, e);
                e
            })
            .with_context(|| format!("Invalid results file {:?}", path))?;
        Ok(aggregate)
    }
}

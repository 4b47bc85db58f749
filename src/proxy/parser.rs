//! Proxy parser module for turning list lines into credentials

use crate::proxy::models::{FailureReason, ProbeFailure, ProxyCredential};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A line that is not in `host:port:username:password` format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed proxy line: {line:?}")]
pub struct ParseError {
    pub line: String,
}

impl From<ParseError> for ProbeFailure {
    fn from(err: ParseError) -> Self {
        ProbeFailure::new(&err.line, FailureReason::MalformedInput, "")
    }
}

/// Proxy parser for credential lines and list files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single `host:port:username:password` line.
    ///
    /// The line is trimmed and split on `:`; anything other than exactly four
    /// fields is rejected. Fields are not validated further, so a non-numeric
    /// port is carried through as written.
    pub fn parse_line(line: &str) -> std::result::Result<ProxyCredential, ParseError> {
        let parts: Vec<&str> = line.trim().split(':').collect();

        match parts.as_slice() {
            [host, port, username, password] => {
                Ok(ProxyCredential::new(host, port, username, password))
            }
            _ => Err(ParseError {
                line: line.to_string(),
            }),
        }
    }

    /// Split list content into candidate lines.
    ///
    /// Lines are trimmed; blank lines and `#` comments are dropped. Every
    /// remaining line is kept, malformed or not.
    pub fn read_lines(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Read candidate lines from a file
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read proxy list {:?}", path))?;
        Ok(Self::read_lines(&content))
    }

    /// Parse every line, separating credentials from malformed lines
    pub fn parse_all(lines: &[String]) -> (Vec<ProxyCredential>, Vec<ParseError>) {
        let mut credentials = Vec::new();
        let mut errors = Vec::new();
        for line in lines {
            match Self::parse_line(line) {
                Ok(credential) => credentials.push(credential),
                Err(err) => errors.push(err),
            }
        }
        (credentials, errors)
    }
}

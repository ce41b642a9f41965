//! Group authorization against a static allow-list.
//!
//! Matching is a plain nested loop: allow-list outer, claims inner, one
//! output per equal pair. The result is therefore ordered by allow-list
//! position, carries the allow-list's copy of each string and multiplies
//! on duplicates in either input. It is not a set intersection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::{Error, Result};

/// Groups eligible to receive tokens. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    groups: Vec<String>,
}

impl AllowList {
    /// Wrap an ordered group list.
    #[must_use]
    pub fn new(groups: Vec<String>) -> Self {
        Self { groups }
    }

    /// Read the first record of a comma-delimited file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Config(format!("Could not read allow-list file {}: {e}", path.display()))
        })?;
        Self::from_reader(file).map_err(|e| match e {
            Error::Config(msg) => {
                Error::Config(format!("Could not read csv file {}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Read the first CSV record from `reader`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut record = csv::StringRecord::new();
        let found = csv
            .read_record(&mut record)
            .map_err(|e| Error::Config(e.to_string()))?;
        if !found {
            return Err(Error::Config("file has no records".to_string()));
        }

        Ok(Self::new(record.iter().map(str::to_string).collect()))
    }

    /// Allowed groups in file order.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Whether filtering is disabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Compute the authorized groups for `claimed`.
    ///
    /// An empty allow-list passes `claimed` through unchanged. Otherwise an
    /// empty match is an [`Error::Authorization`].
    pub fn authorize(&self, claimed: &[String]) -> Result<Vec<String>> {
        if self.is_empty() {
            return Ok(claimed.to_vec());
        }

        let authorized = filter_groups(claimed, &self.groups);
        debug!(
            claimed = ?claimed,
            authorized = ?authorized,
            "Filtered group claims"
        );
        if authorized.is_empty() {
            return Err(Error::Authorization);
        }
        Ok(authorized)
    }
}

/// Nested-loop match of `claimed` against `allowed`.
#[must_use]
pub fn filter_groups(claimed: &[String], allowed: &[String]) -> Vec<String> {
    let mut filtered = Vec::new();
    for a in allowed {
        for g in claimed {
            if a == g {
                filtered.push(a.clone());
            }
        }
    }
    filtered
}

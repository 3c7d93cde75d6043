//! Where range specifications come from: an inline comma separated list or a
//! line delimited file.

use std::fs;
use std::path::PathBuf;

use crate::error::{RangeError, SourceError};
use crate::network::range::RangeSpec;

pub const DEFAULT_RANGE_FILE: &str = "ip.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSource {
    /// e.g. `1.1.1.1,2.2.2.2/24,2606:4700::/32`
    Inline(String),
    File(PathBuf),
}

impl Default for RangeSource {
    fn default() -> Self {
        RangeSource::File(PathBuf::from(DEFAULT_RANGE_FILE))
    }
}

impl RangeSource {
    /// Reads and parses every entry. The first malformed entry aborts loading.
    pub fn load(&self) -> Result<Vec<RangeSpec>, SourceError> {
        match self {
            RangeSource::Inline(text) => Ok(parse_commas(text)?),
            RangeSource::File(path) => {
                let content: String = fs::read_to_string(path).map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(parse_lines(&content)?)
            }
        }
    }
}

/// Parses a comma separated list, skipping empty items (`,,`, leading or trailing commas).
pub fn parse_commas(s: &str) -> Result<Vec<RangeSpec>, RangeError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<RangeSpec>)
        .collect()
}

/// Parses one entry per line; blank lines and `#` comments are skipped.
pub fn parse_lines(s: &str) -> Result<Vec<RangeSpec>, RangeError> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse::<RangeSpec>)
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

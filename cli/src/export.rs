//! CSV export of the final ranking.

use std::path::Path;

use anyhow::Context;
use edgeprobe_common::measurement::{ResultRow, ToRow};

/// Writes a header and one row per result. Nothing is written for an empty
/// result set.
pub fn write_csv<T: ToRow>(path: &Path, results: &[T], with_colo: bool) -> anyhow::Result<bool> {
    if results.is_empty() {
        return Ok(false);
    }

    let columns: usize = if with_colo {
        ResultRow::HEADERS.len()
    } else {
        ResultRow::HEADERS.len() - 1
    };

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(&ResultRow::HEADERS[..columns])?;
    for result in results {
        let row: ResultRow = result.to_row();
        writer.write_record(&row.fields()[..columns])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(true)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

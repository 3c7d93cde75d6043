use colored::*;
use edgeprobe_common::measurement::{ResultRow, ToRow};

use crate::terminal::colors;
use crate::terminal::print;

const GAP: &str = "  ";

/// Column count of the table, dropping the datacenter column when unused.
fn columns(show_colo: bool) -> usize {
    if show_colo {
        ResultRow::HEADERS.len()
    } else {
        ResultRow::HEADERS.len() - 1
    }
}

pub fn column_widths(rows: &[ResultRow], show_colo: bool) -> Vec<usize> {
    (0..columns(show_colo))
        .map(|col| {
            rows.iter()
                .map(|row| console::measure_text_width(row.fields()[col]))
                .chain(std::iter::once(ResultRow::HEADERS[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn pad(text: &str, width: usize) -> String {
    let fill: usize = width.saturating_sub(console::measure_text_width(text));
    format!("{text}{}", " ".repeat(fill))
}

fn cell_color(col: usize, row: &ResultRow) -> Color {
    match col {
        0 if row.addr.starts_with('[') => colors::IPV6_ADDR,
        0 => colors::IPV4_ADDR,
        3 if row.loss_rate != "0.00" => colors::LOSS,
        5 => colors::SPEED,
        6 => colors::ACCENT,
        _ => colors::TEXT_DEFAULT,
    }
}

pub fn header_line(widths: &[usize]) -> String {
    widths
        .iter()
        .enumerate()
        .map(|(col, width)| format!("{}", pad(ResultRow::HEADERS[col], *width).color(colors::PRIMARY).bold()))
        .collect::<Vec<String>>()
        .join(GAP)
}

pub fn row_line(row: &ResultRow, widths: &[usize]) -> String {
    widths
        .iter()
        .enumerate()
        .map(|(col, width)| format!("{}", pad(row.fields()[col], *width).color(cell_color(col, row))))
        .collect::<Vec<String>>()
        .join(GAP)
}

/// Prints the first `count` results as an aligned table.
pub fn print_table<T: ToRow>(results: &[T], count: usize, show_colo: bool) {
    let rows: Vec<ResultRow> = results.iter().take(count).map(ToRow::to_row).collect();
    if rows.is_empty() {
        return;
    }

    let widths: Vec<usize> = column_widths(&rows, show_colo);
    print::print(&header_line(&widths));
    for row in &rows {
        print::print(&row_line(row, &widths));
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

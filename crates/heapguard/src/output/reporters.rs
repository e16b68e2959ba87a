//! Built-in table and JSON renderings of a [`LeakReport`].

use super::{LeakReport, Reporter};
use crate::diagnostics::PREFIX;
use prettytable::{Attr, Cell, Row, Table};
use std::fmt;
use std::io::Write;

pub struct TableReporter;

impl Reporter for TableReporter {
    fn report(
        &self,
        leaks: &LeakReport,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if leaks.is_empty() {
            writeln!(out, "{} no unfreed blocks", PREFIX)?;
            return Ok(());
        }

        writeln!(
            out,
            "{} {} unfreed {} ({}) at {} call {}",
            PREFIX,
            leaks.total_blocks,
            plural(leaks.total_blocks, "block", "blocks"),
            format_bytes(leaks.total_bytes as u64),
            leaks.sites.len(),
            plural(leaks.sites.len(), "site", "sites"),
        )?;

        let mut table = Table::new();
        table.add_row(Row::new(
            ["Call site", "Blocks", "Bytes"]
                .iter()
                .map(|header| Cell::new(header).with_style(Attr::Bold))
                .collect(),
        ));

        for site in &leaks.sites {
            table.add_row(Row::new(vec![
                Cell::new(&format!("{}:{}", site.file, site.line)),
                Cell::new(&site.blocks.to_string()).style_spec("r"),
                Cell::new(&site.bytes.to_string()).style_spec("r"),
            ]));
        }

        table.print(out)?;
        Ok(())
    }
}

pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(
        &self,
        leaks: &LeakReport,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        writeln!(out, "{}", serde_json::to_string(leaks)?)?;
        Ok(())
    }
}

pub struct JsonPrettyReporter;

impl Reporter for JsonPrettyReporter {
    fn report(
        &self,
        leaks: &LeakReport,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        writeln!(out, "{}", serde_json::to_string_pretty(leaks)?)?;
        Ok(())
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        TableReporter
            .report(self, &mut buf)
            .map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Human-readable byte count: exact below 1 KB, one decimal above.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

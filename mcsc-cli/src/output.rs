use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

/// Column alignment for tabular output.
#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

/// Borderless, whitespace-aligned columns for terminal output.
pub struct TabWriter {
    table: Table,
    aligns: Vec<Align>,
    indent: String,
}

impl TabWriter {
    /// Columns are `(header, alignment)` pairs; an empty header row is not printed.
    pub fn new(columns: Vec<(&str, Align)>) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Disabled);

        if columns.iter().any(|(name, _)| !name.is_empty()) {
            let headers: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
            table.set_header(headers);
        }

        Self {
            table,
            aligns: columns.iter().map(|(_, align)| *align).collect(),
            indent: String::new(),
        }
    }

    /// Set the indent prefix for every line (e.g. `"  "` for 2-space indent).
    pub fn indent(mut self, prefix: &str) -> Self {
        self.indent = prefix.to_string();
        self
    }

    /// Add a row. Values are given in column order.
    pub fn row(&mut self, values: Vec<String>) {
        self.table.add_row(values);
    }

    /// Print the table to stdout.
    pub fn print(mut self) {
        // Columns only exist once a header or row has been added
        let last = self.aligns.len().saturating_sub(1);
        for (i, align) in self.aligns.iter().enumerate() {
            let cell_align = match align {
                Align::Left => CellAlignment::Left,
                Align::Right => CellAlignment::Right,
            };
            if let Some(col) = self.table.column_mut(i) {
                col.set_cell_alignment(cell_align);
                // Two spaces between columns, none at the outer edges
                let pad_left = if i == 0 { 0 } else { 1 };
                let pad_right = if i == last { 0 } else { 1 };
                col.set_padding((pad_left, pad_right));
            }
        }

        let output = self.table.to_string();
        for line in output.lines() {
            let trimmed = line.trim_end();
            if self.indent.is_empty() {
                println!("{trimmed}");
            } else {
                println!("{}{trimmed}", self.indent);
            }
        }
    }
}

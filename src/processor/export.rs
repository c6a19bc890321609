use std::fmt::Write;

use crate::processor::{ProcessorError, Value, dataset::Dataset};

/// A rectangular snapshot of a view, ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ExportTable {
    /// Copies `ordered_rows` of `dataset`, keeping only `visible_columns`
    /// in the given order.
    ///
    /// # Errors
    /// [`ProcessorError::MissingColumn`] if a visible column is not in the schema.
    pub fn from_view<S: AsRef<str>>(
        dataset: &Dataset,
        ordered_rows: &[usize],
        visible_columns: &[S],
    ) -> Result<Self, ProcessorError> {
        let positions = visible_columns
            .iter()
            .map(|name| {
                dataset
                    .schema()
                    .position(name.as_ref())
                    .ok_or_else(|| ProcessorError::MissingColumn(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = dataset
            .rows(ordered_rows)
            .map(|record| {
                positions
                    .iter()
                    .map(|&pos| record.values()[pos].clone())
                    .collect()
            })
            .collect();

        Ok(ExportTable {
            columns: visible_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            rows,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Header line plus one line per row, `\n` terminated
    pub fn to_delimited(&self, sep: char) -> String {
        let mut out = String::new();
        write_line(&mut out, self.columns.iter().map(String::as_str), sep);
        for row in &self.rows {
            let cells: Vec<_> = row.iter().map(Value::to_text).collect();
            write_line(&mut out, cells.iter().map(|c| c.as_ref()), sep);
        }
        out
    }

    pub fn to_csv(&self) -> String {
        self.to_delimited(',')
    }
}

fn write_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, sep: char) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(sep);
        }
        write_cell(out, cell, sep);
    }
    out.push('\n');
}

fn write_cell(out: &mut String, cell: &str, sep: char) {
    let needs_quotes = cell.contains(sep) || cell.contains(['"', '\n', '\r']);
    if needs_quotes {
        let _ = write!(out, "\"{}\"", cell.replace('"', "\"\""));
    } else {
        out.push_str(cell);
    }
}

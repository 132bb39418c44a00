//! In-memory columnar table shared by ingestion, cleaning and reporting.
//!
//! A [`Table`] owns a list of named [`Column`]s of equal length. Cells are
//! `Option<Value>`; `None` is a null cell. Column names are unique within a
//! table: [`Table::from_rows`] and [`Table::trim_headers`] de-duplicate by
//! appending `.1`, `.2`, ... to repeated names.

use std::collections::HashSet;

use crate::data::{Value, display_cell};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    pub fn non_null_count(&self) -> usize {
        self.cells.len() - self.null_count()
    }

    /// True when every non-null cell is a number (an all-null column counts).
    pub fn is_numeric(&self) -> bool {
        self.cells
            .iter()
            .flatten()
            .all(|value| matches!(value, Value::Number(_)))
    }

    pub fn numbers(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.cells
            .iter()
            .map(|cell| cell.as_ref().and_then(Value::as_number))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        debug_assert!(columns.iter().all(|c| c.cells.len() == row_count));
        let mut table = Table { columns, row_count };
        table.dedupe_names();
        table
    }

    /// Builds a table from a header row and row-major cells. Short rows are
    /// padded with nulls; extra cells beyond the header width are ignored.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<Value>>>) -> Self {
        let mut columns = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect::<Vec<_>>();
        for row in &rows {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.cells.push(row.get(idx).cloned().flatten());
            }
        }
        Table::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column)
            .and_then(|c| c.cells.get(row))
            .and_then(|cell| cell.as_ref())
    }

    /// Replaces the cells of an existing column or appends a new one.
    pub fn set_column(&mut self, name: &str, cells: Vec<Option<Value>>) {
        debug_assert!(self.columns.is_empty() || cells.len() == self.row_count);
        if self.columns.is_empty() {
            self.row_count = cells.len();
        }
        match self.column_mut(name) {
            Some(column) => column.cells = cells,
            None => self.columns.push(Column::new(name, cells)),
        }
    }

    pub fn set_numbers(&mut self, name: &str, values: Vec<Option<f64>>) {
        let cells = values.into_iter().map(|v| v.map(Value::Number)).collect();
        self.set_column(name, cells);
    }

    /// Applies `f` to every cell of `name`, if the column exists.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(Option<Value>) -> Option<Value>,
    {
        match self.column_mut(name) {
            Some(column) => {
                let cells = std::mem::take(&mut column.cells);
                column.cells = cells.into_iter().map(&mut f).collect();
                true
            }
            None => false,
        }
    }

    /// Trims surrounding whitespace from every column name.
    pub fn trim_headers(&mut self) {
        for column in &mut self.columns {
            let trimmed = column.name.trim();
            if trimmed.len() != column.name.len() {
                column.name = trimmed.to_string();
            }
        }
        self.dedupe_names();
    }

    /// Keeps only the rows whose entry in `mask` is true.
    pub fn retain_rows(&mut self, mask: &[bool]) {
        for column in &mut self.columns {
            let cells = std::mem::take(&mut column.cells);
            column.cells = cells
                .into_iter()
                .zip(mask.iter())
                .filter_map(|(cell, keep)| keep.then_some(cell))
                .collect();
        }
        self.row_count = mask.iter().filter(|keep| **keep).count();
    }

    pub fn head(&self, rows: usize) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.cells.iter().take(rows).cloned().collect()))
            .collect();
        Table::new(columns)
    }

    /// New table holding the rows at `indices`, in that order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let cells = indices
                    .iter()
                    .filter_map(|idx| c.cells.get(*idx).cloned())
                    .collect();
                Column::new(c.name.clone(), cells)
            })
            .collect();
        Table::new(columns)
    }

    pub fn select(&self, names: &[String]) -> Table {
        let columns = names
            .iter()
            .filter_map(|name| self.column(name).cloned())
            .collect();
        Table::new(columns)
    }

    /// Row-major display strings, nulls rendered empty.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        (0..self.row_count)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| display_cell(c.cells[row].as_ref()))
                    .collect()
            })
            .collect()
    }

    fn dedupe_names(&mut self) {
        let mut seen = HashSet::new();
        for column in &mut self.columns {
            if seen.insert(column.name.clone()) {
                continue;
            }
            let base = column.name.clone();
            let mut suffix = 1usize;
            loop {
                let candidate = format!("{base}.{suffix}");
                if seen.insert(candidate.clone()) {
                    column.name = candidate;
                    break;
                }
                suffix += 1;
            }
        }
    }
}

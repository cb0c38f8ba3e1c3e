//! Value tables: per-row variant data without one source node per row.
//!
//! A table holds typed columns and rows addressed by a stable numeric
//! id. The builder API enforces the structural invariant that every row
//! has exactly one value per column; cell writes are type-checked against
//! the column's declared type. Tables are expected to be small, so
//! lookups are linear scans.

use std::sync::Arc;

use morph_ir::{Image, Mesh};

/// Declared type of a table column.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColumnType {
    Scalar,
    Color,
    Image,
    Mesh,
    String,
}

/// One cell of a table. `Image`/`Mesh` cells may legitimately be absent.
#[derive(Clone, Debug)]
pub enum CellValue {
    Scalar(f32),
    Color([f32; 4]),
    Image(Option<Arc<Image>>),
    Mesh(Option<Arc<Mesh>>),
    String(String),
}

impl CellValue {
    /// Default cell for a freshly added row.
    pub fn empty(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Scalar => CellValue::Scalar(0.0),
            ColumnType::Color => CellValue::Color([0.0, 0.0, 0.0, 1.0]),
            ColumnType::Image => CellValue::Image(None),
            ColumnType::Mesh => CellValue::Mesh(None),
            ColumnType::String => CellValue::String(String::new()),
        }
    }

    /// The column type this cell value conforms to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            CellValue::Scalar(_) => ColumnType::Scalar,
            CellValue::Color(_) => ColumnType::Color,
            CellValue::Image(_) => ColumnType::Image,
            CellValue::Mesh(_) => ColumnType::Mesh,
            CellValue::String(_) => ColumnType::String,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Clone, Debug)]
pub struct Row {
    pub id: u32,
    /// Parallel to the table's column list.
    pub values: Vec<CellValue>,
}

/// Errors from the table builder API.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum TableError {
    #[error("column `{name}` already exists")]
    DuplicateColumn { name: String },
    #[error("row id {id} already exists")]
    DuplicateRow { id: u32 },
    #[error("no column named `{name}`")]
    UnknownColumn { name: String },
    #[error("no row with id {id}")]
    UnknownRow { id: u32 },
    #[error("column `{name}` holds {expected:?} values, got {found:?}")]
    CellTypeMismatch {
        name: String,
        expected: ColumnType,
        found: ColumnType,
    },
}

/// A named collection of typed columns and id-addressed rows.
#[derive(Clone, Debug, Default)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a column; existing rows gain an empty cell for it.
    pub fn add_column(&mut self, name: impl Into<String>, ty: ColumnType) -> Result<usize, TableError> {
        let name = name.into();
        if self.find_column(&name).is_some() {
            return Err(TableError::DuplicateColumn { name });
        }
        for row in &mut self.rows {
            row.values.push(CellValue::empty(ty));
        }
        self.columns.push(Column { name, ty });
        Ok(self.columns.len() - 1)
    }

    /// Add a row; it starts with an empty cell for every column.
    pub fn add_row(&mut self, id: u32) -> Result<usize, TableError> {
        if self.rows.iter().any(|r| r.id == id) {
            return Err(TableError::DuplicateRow { id });
        }
        let values = self.columns.iter().map(|c| CellValue::empty(c.ty)).collect();
        self.rows.push(Row { id, values });
        Ok(self.rows.len() - 1)
    }

    /// Set a cell by row id and column name, type-checked.
    pub fn set_cell(
        &mut self,
        row_id: u32,
        column: &str,
        value: CellValue,
    ) -> Result<(), TableError> {
        let col_index = self
            .find_column(column)
            .ok_or_else(|| TableError::UnknownColumn { name: column.to_owned() })?;
        let expected = self.columns[col_index].ty;
        let found = value.column_type();
        if expected != found {
            return Err(TableError::CellTypeMismatch {
                name: column.to_owned(),
                expected,
                found,
            });
        }
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == row_id)
            .ok_or(TableError::UnknownRow { id: row_id })?;
        row.values[col_index] = value;
        Ok(())
    }

    /// Index of the named column. Linear scan.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of the first string column, used to name selector options.
    pub fn find_name_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.ty == ColumnType::String)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (row index, column index).
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        &self.rows[row].values[column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        let mut table = Table::new("hair");
        table.add_column("Name", ColumnType::String).ok();
        table.add_column("Tint", ColumnType::Color).ok();
        table.add_row(1).ok();
        table.add_row(2).ok();
        table
    }

    #[test]
    fn every_row_has_one_value_per_column() {
        let mut table = sample();
        // Adding a column after rows exist backfills empty cells.
        table.add_column("Length", ColumnType::Scalar).ok();
        for row in table.rows() {
            assert_eq!(row.values.len(), table.columns().len());
        }
    }

    #[test]
    fn cell_writes_are_type_checked() {
        let mut table = sample();
        let err = table.set_cell(1, "Tint", CellValue::Scalar(1.0));
        assert_eq!(
            err,
            Err(TableError::CellTypeMismatch {
                name: "Tint".to_owned(),
                expected: ColumnType::Color,
                found: ColumnType::Scalar,
            })
        );
        assert!(table.set_cell(1, "Tint", CellValue::Color([1.0; 4])).is_ok());
    }

    #[test]
    fn duplicate_columns_and_rows_are_rejected() {
        let mut table = sample();
        assert!(matches!(
            table.add_column("Name", ColumnType::String),
            Err(TableError::DuplicateColumn { .. })
        ));
        assert!(matches!(table.add_row(1), Err(TableError::DuplicateRow { id: 1 })));
    }

    #[test]
    fn name_column_is_first_string_column() {
        let table = sample();
        assert_eq!(table.find_name_column(), Some(0));
        assert_eq!(table.find_column("Tint"), Some(1));
        assert_eq!(table.find_column("missing"), None);
    }
}

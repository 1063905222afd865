use std::{any::Any, collections::HashMap, sync::Arc};

use crate::{error::Error, Column, Result, Value};

/// One materialized column value: either a native storage value, or the
/// output of a registered converter for the column's declared type.
#[derive(Clone, Debug)]
pub enum Cell {
    Value(Value),
    Custom(CustomValue),
}

/// A converter-produced host value. Shared so rows stay cheaply cloneable.
#[derive(Clone)]
pub struct CustomValue(pub(crate) Arc<dyn Any + Send + Sync>);

impl std::fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomValue")
    }
}

impl Cell {
    /// The native value, if this cell was not converted.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Custom(_) => None,
        }
    }

    /// Downcast a converter-produced value to a concrete host type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Cell::Custom(v) => v.0.downcast_ref(),
            Cell::Value(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Value(Value::Null))
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.value().and_then(Value::as_integer)
    }

    pub fn as_real(&self) -> Option<f64> {
        self.value().and_then(Value::as_real)
    }

    pub fn as_text(&self) -> Option<&str> {
        self.value().and_then(Value::as_text)
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        self.value().and_then(Value::as_blob)
    }
}

/// One row of a result set, with columns converted per the registry.
#[derive(Clone, Debug)]
pub struct Row {
    cells: Box<[Cell]>,
    columns: Arc<Vec<Column>>,
    column_names: Arc<HashMap<Arc<str>, usize>>,
}

impl Row {
    pub(crate) fn new(
        cells: Vec<Cell>,
        columns: Arc<Vec<Column>>,
        column_names: Arc<HashMap<Arc<str>, usize>>,
    ) -> Self {
        Self {
            cells: cells.into_boxed_slice(),
            columns,
            column_names,
        }
    }

    /// The column definitions for this row.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The cells of this row, in column order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get a single cell by column index.
    pub fn get(&self, index: usize) -> Result<&Cell> {
        self.cells.get(index).ok_or(Error::ColumnIndexOutOfBounds {
            index,
            len: self.cells.len(),
        })
    }

    /// Get a single cell by column name.
    pub fn get_named(&self, column: &str) -> Result<&Cell> {
        let index = *self
            .column_names
            .get(column)
            .ok_or_else(|| Error::ColumnNotFound(column.into()))?;
        self.get(index)
    }
}

/// Maps each materialized row before it is handed to the caller.
pub type RowFactory = Arc<dyn Fn(Row) -> Row + Send + Sync>;

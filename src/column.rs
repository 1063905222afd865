use std::sync::Arc;

/// Metadata for one result column, captured when a statement is executed.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) name: Arc<str>,
    pub(crate) decl_type: Option<String>,
}

impl Column {
    /// The column name, as reported by the engine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type from the table definition, if the column maps
    /// directly to a table column. Drives converter lookup on fetch.
    pub fn decl_type(&self) -> Option<&str> {
        self.decl_type.as_deref()
    }
}

use log::debug;

use crate::{fields::CanonicalField, frame::Table, mapping::SchemaMapping, matcher::find_column};

/// Suggests a mapping from the table's raw column names.
///
/// Only input fields are considered; nothing derived is ever inferred here.
pub fn infer_schema(table: &Table) -> SchemaMapping {
    infer_from_headers(&table.headers())
}

pub fn infer_from_headers<S: AsRef<str>>(headers: &[S]) -> SchemaMapping {
    let mut schema = SchemaMapping::new();
    for field in CanonicalField::INPUTS {
        if let Some(column) = find_column(headers, field.aliases()) {
            debug!("Inferred '{field}' -> '{column}'");
            schema.insert(field, column);
        }
    }
    schema
}

//! Schema mappings, user overrides, and their persistence.
//!
//! A [`SchemaMapping`] associates canonical fields with concrete column
//! names. A [`UserMapping`] is a partial override: each mentioned field is
//! either pinned to a column or explicitly unset; fields it does not mention
//! keep their inferred value. Both persist as a flat object of
//! field-name → column-name-or-null, in JSON or (by extension) YAML.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    fields::{CanonicalField, is_synthesized_column},
    frame::Table,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMapping {
    fields: BTreeMap<CanonicalField, String>,
}

impl SchemaMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn insert(&mut self, field: CanonicalField, column: impl Into<String>) {
        self.fields.insert(field, column.into());
    }

    pub fn remove(&mut self, field: CanonicalField) -> Option<String> {
        self.fields.remove(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.fields.iter().map(|(field, column)| (*field, column.as_str()))
    }

    /// The mapped column for `field`, only if it exists in `table`.
    pub fn resolve<'a>(&'a self, field: CanonicalField, table: &Table) -> Option<&'a str> {
        self.get(field).filter(|column| table.has_column(column))
    }

    /// Drops fields whose column is not in `table`; returns the dropped fields.
    pub fn retain_present(&mut self, table: &Table) -> Vec<CanonicalField> {
        let dropped = self
            .fields
            .iter()
            .filter(|(_, column)| !table.has_column(column))
            .map(|(field, _)| *field)
            .collect::<Vec<_>>();
        for field in &dropped {
            self.fields.remove(field);
        }
        dropped
    }

    /// Flat export: every input field (null when unmapped) plus any
    /// engine-registered field that is present.
    pub fn to_flat(&self) -> BTreeMap<String, Option<String>> {
        CanonicalField::all()
            .filter(|field| field.is_input() || self.contains(*field))
            .map(|field| (field.as_str().to_string(), self.get(field).map(str::to_string)))
            .collect()
    }

    /// The same choices expressed as a user override.
    pub fn to_user_mapping(&self) -> UserMapping {
        UserMapping::from(self.to_flat())
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_flat()).context("Serializing schema mapping")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_flat(path, &self.to_flat())
    }
}

/// One user decision for a canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    Column(String),
    Unset,
}

impl Override {
    fn from_raw(value: Option<String>) -> Self {
        match value {
            Some(column) if column != "None" => Override::Column(column),
            _ => Override::Unset,
        }
    }

    fn into_raw(self) -> Option<String> {
        match self {
            Override::Column(column) => Some(column),
            Override::Unset => None,
        }
    }
}

/// Partial mapping supplied by a user, keyed by raw field name so unknown
/// keys from hand-written files can be reported rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Option<String>>",
    into = "BTreeMap<String, Option<String>>"
)]
pub struct UserMapping {
    entries: BTreeMap<String, Override>,
}

impl From<BTreeMap<String, Option<String>>> for UserMapping {
    fn from(raw: BTreeMap<String, Option<String>>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(key, value)| (key.trim().to_string(), Override::from_raw(value)))
            .collect();
        UserMapping { entries }
    }
}

impl From<UserMapping> for BTreeMap<String, Option<String>> {
    fn from(mapping: UserMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(key, value)| (key, value.into_raw()))
            .collect()
    }
}

impl UserMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: CanonicalField, value: Override) {
        self.entries.insert(field.as_str().to_string(), value);
    }

    pub fn set_column(&mut self, field: CanonicalField, column: impl Into<String>) {
        self.set(field, Override::Column(column.into()));
    }

    pub fn unset(&mut self, field: CanonicalField) {
        self.set(field, Override::Unset);
    }

    pub fn get(&self, field: CanonicalField) -> Option<&Override> {
        self.entries.get(field.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Override)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Layers `other` on top of `self`; later decisions win.
    pub fn extend(&mut self, other: UserMapping) {
        self.entries.extend(other.entries);
    }

    /// Parses a `field=column` directive as used on the command line.
    pub fn parse_assignment(assignment: &str) -> Result<(CanonicalField, String)> {
        let (field, column) = assignment
            .split_once('=')
            .with_context(|| format!("Mapping '{assignment}' must look like field=column"))?;
        let field = field
            .parse::<CanonicalField>()
            .map_err(anyhow::Error::msg)?;
        let column = column.trim();
        anyhow::ensure!(!column.is_empty(), "Mapping '{assignment}' is missing a column name");
        Ok((field, column.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let raw: BTreeMap<String, Option<String>> = if is_yaml_path(path) {
            serde_yaml::from_str(&contents).context("Parsing mapping YAML")?
        } else {
            serde_json::from_str(&contents).context("Parsing mapping JSON")?
        };
        Ok(UserMapping::from(raw))
    }
}

fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

fn write_flat(path: &Path, flat: &BTreeMap<String, Option<String>>) -> Result<()> {
    let contents = if is_yaml_path(path) {
        serde_yaml::to_string(flat).context("Serializing mapping YAML")?
    } else {
        serde_json::to_string_pretty(flat).context("Serializing mapping JSON")?
    };
    fs::write(path, contents).with_context(|| format!("Writing mapping file {path:?}"))
}

/// A user override that could not be honoured. The override is dropped and
/// the inferred value (if any) stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum MappingIssue {
    #[error("mapping for '{field}' names column '{column}', which is not in the table")]
    MissingColumn { field: CanonicalField, column: String },
    #[error("mapping for '{field}' names engine column '{column}'; it is recomputed instead")]
    SynthesizedColumn { field: CanonicalField, column: String },
    #[error("'{field}' is not a known canonical field")]
    UnknownField { field: String },
    #[error("'{field}' is computed by the engine and cannot be mapped")]
    DerivedField { field: CanonicalField },
    #[error("column '{column}' was inferred for several numeric fields: {fields:?}")]
    SharedColumn {
        column: String,
        fields: Vec<CanonicalField>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("column '{column}' is assigned to more than one numeric field: {fields:?}")]
    ConflictingColumn {
        column: String,
        fields: Vec<CanonicalField>,
    },
}

/// Applies `user` on top of `baseline` for a table with `columns`.
pub fn merge(
    baseline: &SchemaMapping,
    user: &UserMapping,
    columns: &[String],
) -> Result<(SchemaMapping, Vec<MappingIssue>), MappingError> {
    let mut schema = baseline.clone();
    let mut issues = Vec::new();
    let mut fresh_numeric: HashSet<String> = HashSet::new();

    for (key, value) in user.iter() {
        let field = match key.parse::<CanonicalField>() {
            Ok(field) => field,
            Err(_) => {
                issues.push(MappingIssue::UnknownField {
                    field: key.to_string(),
                });
                continue;
            }
        };
        if !field.is_input() {
            issues.push(MappingIssue::DerivedField { field });
            continue;
        }
        match value {
            Override::Unset => {
                schema.remove(field);
            }
            Override::Column(column) => {
                let column = column.trim();
                if columns.iter().any(|c| c == column) {
                    if field.is_numeric() && baseline.get(field) != Some(column) {
                        fresh_numeric.insert(column.to_string());
                    }
                    schema.insert(field, column);
                } else if is_synthesized_column(column) {
                    issues.push(MappingIssue::SynthesizedColumn {
                        field,
                        column: column.to_string(),
                    });
                } else {
                    issues.push(MappingIssue::MissingColumn {
                        field,
                        column: column.to_string(),
                    });
                }
            }
        }
    }

    // Restating inferred choices never conflicts; a column is rejected only
    // when the user newly assigns it to a numeric field that shares it.
    let conflict = schema
        .iter()
        .filter(|(field, column)| field.is_numeric() && fresh_numeric.contains(*column))
        .map(|(field, column)| (column.to_string(), field))
        .into_group_map()
        .into_iter()
        .filter(|(_, fields)| fields.len() > 1)
        .sorted()
        .next();
    if let Some((column, fields)) = conflict {
        return Err(MappingError::ConflictingColumn { column, fields });
    }

    issues.extend(shared_numeric_columns(&schema));
    for issue in &issues {
        match issue {
            MappingIssue::SynthesizedColumn { .. } => debug!("{issue}"),
            _ => warn!("{issue}"),
        }
    }
    Ok((schema, issues))
}

fn shared_numeric_columns(schema: &SchemaMapping) -> Vec<MappingIssue> {
    let mut by_column: HashMap<&str, Vec<CanonicalField>> = HashMap::new();
    for (field, column) in schema.iter().filter(|(field, _)| field.is_numeric()) {
        by_column.entry(column).or_default().push(field);
    }
    by_column
        .into_iter()
        .filter(|(_, fields)| fields.len() > 1)
        .sorted()
        .map(|(column, fields)| MappingIssue::SharedColumn {
            column: column.to_string(),
            fields,
        })
        .collect()
}

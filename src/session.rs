//! Per-session state: the current cleaned snapshot plus the mapping editor
//! that feeds it.
//!
//! Nothing here is global. A [`SessionStore`] is an owned value and a
//! [`Workbench`] owns one store, so independent sessions never see each
//! other's data.

use log::{debug, info};
use thiserror::Error;

use crate::{
    clean::{CleanError, Cleaned, clean},
    fields::CanonicalField,
    frame::Table,
    inference::infer_schema,
    mapping::{Override, SchemaMapping, UserMapping},
    report::Diagnostics,
};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("no upload loaded in this session")]
    NoUpload,
    #[error(transparent)]
    Clean(#[from] CleanError),
}

/// The cleaned table and mapping most recently stored for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub table: Table,
    pub schema: SchemaMapping,
}

impl From<Cleaned> for Snapshot {
    fn from(cleaned: Cleaned) -> Self {
        Snapshot {
            table: cleaned.table,
            schema: cleaned.schema,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<Snapshot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was stored before.
    pub fn set_current(&mut self, snapshot: Snapshot) -> &Snapshot {
        self.current.insert(snapshot)
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Result of a non-destructive clean with the pending mapping.
#[derive(Debug, Clone)]
pub struct Preview {
    pub cleaned: Cleaned,
    pub diagnostics: Diagnostics,
}

/// Mapping editor bound to one upload.
#[derive(Debug, Default)]
pub struct Workbench {
    raw: Option<Table>,
    inferred: SchemaMapping,
    pending: UserMapping,
    applied: Option<UserMapping>,
    store: SessionStore,
}

impl Workbench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a new upload, auto-cleans it into the store and resets the
    /// pending mapping to the inferred choices. The previous snapshot is
    /// dropped first, so a failed auto-clean leaves no current result. The
    /// upload stays loaded either way and overrides can still be applied.
    pub fn load(&mut self, raw: Table) -> Result<&Snapshot, SessionError> {
        let mut headers = raw.clone();
        headers.trim_headers();
        self.inferred = infer_schema(&headers);
        self.pending = self.inferred.to_user_mapping();
        self.applied = None;
        self.store.clear();
        self.raw = Some(raw);
        info!("Loaded upload with {} inferred field(s)", self.inferred.len());
        self.rerun_auto()
    }

    pub fn raw(&self) -> Option<&Table> {
        self.raw.as_ref()
    }

    pub fn inferred(&self) -> &SchemaMapping {
        &self.inferred
    }

    pub fn pending(&self) -> &UserMapping {
        &self.pending
    }

    /// The mapping used by the last successful [`Workbench::apply`].
    pub fn applied(&self) -> Option<&UserMapping> {
        self.applied.as_ref()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.store.current()
    }

    pub fn set_override(&mut self, field: CanonicalField, value: Override) {
        debug!("Pending override for '{field}': {value:?}");
        self.pending.set(field, value);
    }

    /// Layers a whole user mapping onto the pending one.
    pub fn extend_pending(&mut self, user: UserMapping) {
        self.pending.extend(user);
    }

    /// Cleans with the pending mapping without touching the store.
    pub fn preview(&self) -> Result<Preview, SessionError> {
        let raw = self.raw.as_ref().ok_or(SessionError::NoUpload)?;
        let cleaned = clean(raw, Some(&self.pending))?;
        let diagnostics = Diagnostics::compute(raw, &cleaned);
        Ok(Preview {
            cleaned,
            diagnostics,
        })
    }

    /// Cleans with the pending mapping and makes the result current.
    pub fn apply(&mut self) -> Result<&Snapshot, SessionError> {
        let raw = self.raw.as_ref().ok_or(SessionError::NoUpload)?;
        let cleaned = clean(raw, Some(&self.pending))?;
        self.applied = Some(self.pending.clone());
        info!("Applied mapping with {} override(s)", self.pending.len());
        Ok(self.store_cleaned(cleaned))
    }

    /// Discards pending edits and restores the auto-detected result.
    pub fn revert(&mut self) -> Result<&Snapshot, SessionError> {
        if self.raw.is_none() {
            return Err(SessionError::NoUpload);
        }
        self.pending = self.inferred.to_user_mapping();
        self.applied = None;
        self.rerun_auto()
    }

    /// Auto-cleans again; pending edits are kept.
    pub fn rerun_auto(&mut self) -> Result<&Snapshot, SessionError> {
        let raw = self.raw.as_ref().ok_or(SessionError::NoUpload)?;
        let cleaned = clean(raw, None)?;
        Ok(self.store_cleaned(cleaned))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn store_cleaned(&mut self, cleaned: Cleaned) -> &Snapshot {
        self.store.set_current(Snapshot::from(cleaned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn upload() -> Table {
        let text = |s: &str| Some(Value::Text(s.to_string()));
        Table::from_rows(
            vec!["date".into(), "product".into(), "total".into(), "gross".into()],
            vec![
                vec![text("2024-01-01"), text("A"), text("10"), text("12")],
                vec![text("2024-01-02"), text("B"), text("20"), text("24")],
            ],
        )
    }

    #[test]
    fn operations_without_upload_fail() {
        let mut bench = Workbench::new();
        assert_eq!(bench.preview().unwrap_err(), SessionError::NoUpload);
        assert_eq!(bench.apply().unwrap_err(), SessionError::NoUpload);
        assert_eq!(bench.revert().unwrap_err(), SessionError::NoUpload);
        assert_eq!(bench.rerun_auto().unwrap_err(), SessionError::NoUpload);
    }

    #[test]
    fn pending_defaults_to_inferred_choices() {
        let mut bench = Workbench::new();
        bench.load(upload()).unwrap();
        assert_eq!(
            bench.pending().get(CanonicalField::Revenue),
            Some(&Override::Column("total".into()))
        );
        assert_eq!(bench.pending().get(CanonicalField::Cost), Some(&Override::Unset));
    }

    #[test]
    fn store_replaces_and_clears() {
        let mut store = SessionStore::new();
        let table = Table::from_rows(vec!["a".into()], vec![]);
        store.set_current(Snapshot {
            table: table.clone(),
            schema: SchemaMapping::new(),
        });
        assert!(store.current().is_some());
        store.clear();
        assert!(store.current().is_none());
    }
}

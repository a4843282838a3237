//! Remote change catalog.
//!
//! The catalog serves framework changes between two versions as JSON
//! records. Records are normalised into a [`RuleFragment`] so the rest of the
//! pipeline never distinguishes remote rules from declarative ones.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::fragment::{
    DeprecatedModule, DeprecationAction, RemovedField, RemovedModel, RenamedField, RenamedModel,
    RuleFragment, TextCheck, TextReplacement,
};
use crate::version::VersionStep;

/// Extensions quoted identifiers are rewritten or checked in.
const IDENTIFIER_EXTENSIONS: [&str; 2] = [".py", ".xml"];

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// The entity got a new name.
    Rename,
    /// The entity no longer exists.
    Remove,
}

/// Kind of entity a record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A model, identified by its technical name.
    Model,
    /// A model field.
    Field,
    /// An external identifier.
    Xmlid,
    /// A value of a selection field.
    Selection,
    /// An addon module.
    Module,
}

/// One change as served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// What happened.
    pub change_type: ChangeType,
    /// What it happened to.
    pub entity_type: EntityType,
    /// Owning model, for fields and selections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Name before the change.
    pub old: String,
    /// Name after a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Serves framework changes for a version step.
pub trait ChangeCatalog {
    /// Lists the changes introduced by `step`.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when the catalog cannot be queried.
    fn changes(&self, step: VersionStep) -> Result<Vec<ChangeRecord>, CatalogError>;
}

/// [`ChangeCatalog`] backed by an HTTP service.
///
/// Queries `GET {base_url}/changes?from=<init>&to=<target>` and expects a
/// JSON array of [`ChangeRecord`] values.
#[derive(Debug, Clone)]
pub struct HttpChangeCatalog {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpChangeCatalog {
    /// Creates a client for `base_url` whose requests give up after `timeout`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            base_url: base_url.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// The service root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ChangeCatalog for HttpChangeCatalog {
    fn changes(&self, step: VersionStep) -> Result<Vec<ChangeRecord>, CatalogError> {
        let url = format!("{}/changes", self.base_url.trim_end_matches('/'));
        let response = self
            .agent
            .get(&url)
            .query("from", step.init().name())
            .query("to", step.target().name())
            .call()
            .map_err(|error| CatalogError::Unavailable {
                url: url.clone(),
                message: error.to_string(),
            })?;

        response
            .into_body()
            .read_json::<Vec<ChangeRecord>>()
            .map_err(|error| CatalogError::MalformedResponse {
                url,
                message: error.to_string(),
            })
    }
}

/// Converts catalog records into a fragment.
///
/// Records that lack a field their kind requires are skipped with a warning.
#[must_use]
pub fn normalize(records: &[ChangeRecord]) -> RuleFragment {
    let mut fragment = RuleFragment::default();
    for record in records {
        if !normalize_record(&mut fragment, record) {
            tracing::warn!(
                target: "migrator_rules::catalog",
                event = "catalog.record.skipped",
                change_type = ?record.change_type,
                entity_type = ?record.entity_type,
                old = %record.old,
                "skipping incomplete change record"
            );
        }
    }
    fragment
}

fn normalize_record(fragment: &mut RuleFragment, record: &ChangeRecord) -> bool {
    let note = record.note.clone();
    match (record.change_type, record.entity_type) {
        (ChangeType::Remove, EntityType::Model) => {
            fragment.removed_models.push(RemovedModel {
                model: record.old.clone(),
                note,
            });
        }
        (ChangeType::Rename, EntityType::Model) => {
            let Some(new) = record.new.clone() else {
                return false;
            };
            fragment.renamed_models.push(RenamedModel {
                old: record.old.clone(),
                new,
                note,
            });
        }
        (ChangeType::Remove, EntityType::Field) => {
            let Some(model) = record.model.clone() else {
                return false;
            };
            fragment.removed_fields.push(RemovedField {
                model,
                field: record.old.clone(),
                note,
            });
        }
        (ChangeType::Rename, EntityType::Field) => {
            let (Some(model), Some(new)) = (record.model.clone(), record.new.clone()) else {
                return false;
            };
            fragment.renamed_fields.push(RenamedField {
                model,
                old: record.old.clone(),
                new,
                note,
            });
        }
        (change_type, EntityType::Module) => {
            let action = match change_type {
                ChangeType::Remove => DeprecationAction::Removed,
                ChangeType::Rename => DeprecationAction::Renamed,
            };
            if action == DeprecationAction::Renamed && record.new.is_none() {
                return false;
            }
            fragment.deprecated_modules.push(DeprecatedModule {
                name: record.old.clone(),
                action,
                new_name: record.new.clone(),
                note,
            });
        }
        (ChangeType::Rename, EntityType::Xmlid) => {
            let Some(new) = record.new.as_deref() else {
                return false;
            };
            for extension in IDENTIFIER_EXTENSIONS {
                fragment
                    .text_replacements
                    .entry(extension.to_owned())
                    .or_default()
                    .push(TextReplacement::new(
                        quoted_pattern(&record.old),
                        format!("${{1}}{new}${{2}}"),
                    ));
            }
        }
        (ChangeType::Remove, EntityType::Xmlid) => {
            push_warning(fragment, &record.old, format!("Reference to removed '{}'", record.old));
        }
        (change_type, EntityType::Selection) => {
            let owner = record.model.as_deref().unwrap_or("unknown model");
            let message = match (change_type, record.new.as_deref()) {
                (ChangeType::Rename, Some(new)) => format!(
                    "Selection value '{}' of {owner} was renamed to '{new}'",
                    record.old
                ),
                _ => format!("Selection value '{}' of {owner} was removed", record.old),
            };
            push_warning(fragment, &record.old, message);
        }
    }
    true
}

fn push_warning(fragment: &mut RuleFragment, value: &str, message: String) {
    for extension in IDENTIFIER_EXTENSIONS {
        fragment
            .text_warnings
            .entry(extension.to_owned())
            .or_default()
            .push(TextCheck::new(quoted_pattern(value), message.clone()));
    }
}

/// Pattern matching `value` between single or double quotes.
#[must_use]
pub fn quoted_pattern(value: &str) -> String {
    format!(r#"(['"]){}(['"])"#, regex::escape(value))
}

//! Join Keys - How a parent and its results are correlated
//!
//! A [`JoinKey`] is what callers declare. At construction it is resolved
//! against the parent's key name into a [`KeyPlan`]: an ordered parent
//! field list plus a single [`KeySource`] describing where each result's
//! key comes from. Both variants of matching run through the same plan.
//!
//! Keys are compared as strings. In the default
//! [`KeyFormat::Concatenated`] format each value is stringified and the
//! values are separator-joined, so values that stringify identically
//! collide: an integer `1` and a string `"1"` produce the same key.
//! Concatenation follows `CONCAT_WS`: `null` values are skipped and empty
//! strings are kept. A `null` result key never matches, as in SQL.

use serde_json::Value;

use crate::config::{KeyFormat, RelationSettings};
use crate::error::{RelationError, RelationResult};
use crate::query::QueryBuilder;
use crate::record::Record;

/// Ordered, non-empty list of field names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec(Vec<String>);

impl KeySpec {
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(&self, side: &str) -> RelationResult<()> {
        if self.0.is_empty() {
            return Err(RelationError::configuration(format!(
                "{} join key must name at least one field",
                side
            )));
        }
        if let Some(blank) = self.0.iter().find(|f| f.trim().is_empty()) {
            return Err(RelationError::configuration(format!(
                "{} join key contains a blank field name '{}'",
                side, blank
            )));
        }
        Ok(())
    }
}

impl From<&str> for KeySpec {
    fn from(field: &str) -> Self {
        KeySpec(vec![field.to_string()])
    }
}

impl From<String> for KeySpec {
    fn from(field: String) -> Self {
        KeySpec(vec![field])
    }
}

impl From<Vec<&str>> for KeySpec {
    fn from(fields: Vec<&str>) -> Self {
        KeySpec(fields.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for KeySpec {
    fn from(fields: Vec<String>) -> Self {
        KeySpec(fields)
    }
}

impl From<&[&str]> for KeySpec {
    fn from(fields: &[&str]) -> Self {
        KeySpec(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeySpec {
    fn from(fields: [&str; N]) -> Self {
        KeySpec(fields.iter().map(|f| f.to_string()).collect())
    }
}

/// Where the key of each result record is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// A single result field, read directly
    SimpleKey(String),
    /// Result fields the query concatenates into the synthetic key column
    CompositeKey(KeySpec),
    /// A column the caller's constraints already expose on every result
    ComputedColumn(String),
}

/// Declared correlation between parents and results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKey {
    /// Results carry the parent's identity in `local_key`, defaulting to
    /// the parent's key field name
    Identity { local_key: Option<String> },
    /// Parent fields matched against the same-ordered result fields
    Composite { parent: KeySpec, result: KeySpec },
    /// Parent fields matched against a caller-provided result column
    Computed { parent: KeySpec, column: String },
}

impl JoinKey {
    pub fn identity(local_key: Option<&str>) -> Self {
        JoinKey::Identity {
            local_key: local_key.map(str::to_string),
        }
    }

    pub fn composite<P: Into<KeySpec>, R: Into<KeySpec>>(parent: P, result: R) -> Self {
        JoinKey::Composite {
            parent: parent.into(),
            result: result.into(),
        }
    }

    pub fn computed<P: Into<KeySpec>>(parent: P, column: &str) -> Self {
        JoinKey::Computed {
            parent: parent.into(),
            column: column.to_string(),
        }
    }

    /// Same field names on both sides
    pub fn matching<K: Into<KeySpec>>(fields: K) -> Self {
        let spec = fields.into();
        JoinKey::Composite {
            parent: spec.clone(),
            result: spec,
        }
    }

    /// Resolve against the parent's key name and validate
    pub fn resolve(&self, parent_key_name: &str, settings: &RelationSettings) -> RelationResult<KeyPlan> {
        let plan = match self {
            JoinKey::Identity { local_key } => KeyPlan {
                parent: KeySpec::from(parent_key_name),
                source: KeySource::SimpleKey(
                    local_key.clone().unwrap_or_else(|| parent_key_name.to_string()),
                ),
                format: settings.key_format,
            },
            JoinKey::Composite { parent, result } => {
                parent.validate("Parent")?;
                result.validate("Result")?;
                if parent.len() != result.len() {
                    return Err(RelationError::configuration(format!(
                        "Parent join key has {} field(s) but result join key has {}",
                        parent.len(),
                        result.len()
                    )));
                }
                let source = if result.len() == 1 {
                    KeySource::SimpleKey(result.fields()[0].clone())
                } else {
                    KeySource::CompositeKey(result.clone())
                };
                KeyPlan {
                    parent: parent.clone(),
                    source,
                    format: settings.key_format,
                }
            }
            JoinKey::Computed { parent, column } => {
                parent.validate("Parent")?;
                if column.trim().is_empty() {
                    return Err(RelationError::configuration(
                        "Computed join key column cannot be blank",
                    ));
                }
                if settings.key_format == KeyFormat::Typed {
                    return Err(RelationError::configuration(
                        "Typed keys cannot be matched against a precomputed column",
                    ));
                }
                KeyPlan {
                    parent: parent.clone(),
                    source: KeySource::ComputedColumn(column.clone()),
                    format: settings.key_format,
                }
            }
        };

        if plan.parent.is_empty() || parent_key_name.trim().is_empty() {
            return Err(RelationError::configuration("Parent key name cannot be blank"));
        }

        Ok(plan)
    }
}

impl From<&str> for JoinKey {
    fn from(field: &str) -> Self {
        JoinKey::matching(field)
    }
}

impl From<String> for JoinKey {
    fn from(field: String) -> Self {
        JoinKey::matching(field)
    }
}

impl From<Vec<&str>> for JoinKey {
    fn from(fields: Vec<&str>) -> Self {
        JoinKey::matching(fields)
    }
}

impl From<Vec<String>> for JoinKey {
    fn from(fields: Vec<String>) -> Self {
        JoinKey::matching(fields)
    }
}

impl<const N: usize> From<[&str; N]> for JoinKey {
    fn from(fields: [&str; N]) -> Self {
        JoinKey::matching(fields)
    }
}

impl From<KeySpec> for JoinKey {
    fn from(spec: KeySpec) -> Self {
        JoinKey::matching(spec)
    }
}

/// A resolved join key: parent field order plus result key source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPlan {
    parent: KeySpec,
    source: KeySource,
    format: KeyFormat,
}

impl KeyPlan {
    pub fn parent_fields(&self) -> &[String] {
        self.parent.fields()
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    /// Key of a parent record: its configured fields, in order
    pub fn parent_key(&self, parent: &Record, separator: &str) -> RelationResult<String> {
        let values = read_fields(parent, self.parent.fields(), "parent")?;
        Ok(self.render(&values, separator))
    }

    /// Key of a result record, according to the key source.
    ///
    /// `None` when the key column is `null`; such a row joins no parent.
    pub fn result_key(&self, result: &Record, settings: &RelationSettings) -> RelationResult<Option<String>> {
        let key = match (&self.source, self.format) {
            (KeySource::SimpleKey(field), _) => {
                let value = read_field(result, field, "result")?;
                (!value.is_null()).then(|| self.render(&[value], &settings.key_separator))
            }
            (KeySource::CompositeKey(spec), KeyFormat::Typed) => {
                let values = read_fields(result, spec.fields(), "result")?;
                Some(self.render(&values, &settings.key_separator))
            }
            (KeySource::CompositeKey(_), KeyFormat::Concatenated) => {
                let value = read_field(result, &settings.synthetic_column, "result")?;
                (!value.is_null()).then(|| stringify(value))
            }
            (KeySource::ComputedColumn(column), _) => {
                let value = read_field(result, column, "result")?;
                (!value.is_null()).then(|| stringify(value))
            }
        };
        Ok(key)
    }

    /// Result columns the query must concatenate under the synthetic alias
    pub fn synthetic_columns(&self) -> Option<&[String]> {
        match (&self.source, self.format) {
            (KeySource::CompositeKey(spec), KeyFormat::Concatenated) => Some(spec.fields()),
            _ => None,
        }
    }

    /// Distinct keys of `parents`, in first-seen order
    pub fn parent_keys(&self, parents: &[Record], separator: &str) -> RelationResult<Vec<String>> {
        let mut seen = std::collections::HashSet::with_capacity(parents.len());
        let mut keys = Vec::with_capacity(parents.len());
        for parent in parents {
            let key = self.parent_key(parent, separator)?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Restrict `query` to rows whose key is one of the parents' keys
    pub fn constrain(
        &self,
        query: QueryBuilder,
        parents: &[Record],
        settings: &RelationSettings,
    ) -> RelationResult<QueryBuilder> {
        match &self.source {
            KeySource::SimpleKey(field) => {
                // Raw values keep the column's native type in the comparison
                let parent_field = &self.parent.fields()[0];
                let mut seen = std::collections::HashSet::new();
                let mut values = Vec::new();
                for parent in parents {
                    let value = read_field(parent, parent_field, "parent")?;
                    if seen.insert(value.to_string()) {
                        values.push(value.clone());
                    }
                }
                Ok(query.where_in(field, values))
            }
            KeySource::CompositeKey(spec) => {
                let keys = self.parent_keys_concatenated(parents, &settings.key_separator)?;
                Ok(query.where_concat_in(spec.fields(), &settings.key_separator, keys))
            }
            KeySource::ComputedColumn(column) => {
                let keys = self.parent_keys(parents, &settings.key_separator)?;
                Ok(query.where_in(column, keys))
            }
        }
    }

    fn parent_keys_concatenated(&self, parents: &[Record], separator: &str) -> RelationResult<Vec<String>> {
        let plan = KeyPlan {
            format: KeyFormat::Concatenated,
            ..self.clone()
        };
        plan.parent_keys(parents, separator)
    }

    fn render(&self, values: &[&Value], separator: &str) -> String {
        match self.format {
            KeyFormat::Concatenated => concatenate(values, separator),
            KeyFormat::Typed => {
                let tuple: Vec<&Value> = values.to_vec();
                serde_json::to_string(&tuple).unwrap_or_default()
            }
        }
    }
}

/// Natural string form of a field value; `null` is the empty string
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Separator-joined values with `null`s skipped, as `CONCAT_WS` renders them
pub fn concatenate(values: &[&Value], separator: &str) -> String {
    values
        .iter()
        .filter(|value| !value.is_null())
        .map(|value| stringify(value))
        .collect::<Vec<_>>()
        .join(separator)
}

fn read_field<'r>(record: &'r Record, field: &str, side: &str) -> RelationResult<&'r Value> {
    record.get_field(field).ok_or_else(|| {
        RelationError::missing_field(
            field,
            format!("{} record in table '{}'", side, record.table()),
        )
    })
}

fn read_fields<'r>(record: &'r Record, fields: &[String], side: &str) -> RelationResult<Vec<&'r Value>> {
    fields
        .iter()
        .map(|field| read_field(record, field, side))
        .collect()
}

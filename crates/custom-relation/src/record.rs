//! Record Store - Dynamic records with a relation side-table
//!
//! Records carry their attributes as an ordered JSON map and keep loaded
//! relations in a separate name-keyed table, so attaching related data
//! never touches the attributes themselves.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{RelationError, RelationResult};

/// Default primary key field name
pub const DEFAULT_KEY_NAME: &str = "id";

/// A hydrated row: table, identity, attributes and loaded relations
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: String,
    key_name: String,
    attributes: Map<String, Value>,
    relations: HashMap<String, RelationValue>,
    eager_loads: Vec<String>,
}

impl Record {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            key_name: DEFAULT_KEY_NAME.to_string(),
            attributes: Map::new(),
            relations: HashMap::new(),
            eager_loads: Vec::new(),
        }
    }

    /// Build a record from a JSON object; any other JSON value is rejected
    pub fn from_json(table: &str, value: Value) -> RelationResult<Self> {
        match value {
            Value::Object(attributes) => Ok(Self {
                attributes,
                ..Self::new(table)
            }),
            other => Err(RelationError::Serialization(format!(
                "Expected a JSON object for a '{}' record, got {}",
                table, other
            ))),
        }
    }

    /// Build a record from any serializable model
    pub fn from_serialize<T: Serialize>(table: &str, key_name: &str, model: &T) -> RelationResult<Self> {
        let value = serde_json::to_value(model)?;
        Ok(Self::from_json(table, value)?.with_key_name(key_name))
    }

    /// Convert the attributes back into a typed model
    pub fn deserialize<T: DeserializeOwned>(&self) -> RelationResult<T> {
        Ok(serde_json::from_value(Value::Object(self.attributes.clone()))?)
    }

    pub fn with_key_name(mut self, key_name: &str) -> Self {
        self.key_name = key_name.to_string();
        self
    }

    pub fn with_attribute<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Identity value, if the key field is present
    pub fn get_key(&self) -> Option<&Value> {
        self.attributes.get(&self.key_name)
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Like [`Record::get_field`], but a missing field is an error
    pub fn require_field(&self, name: &str) -> RelationResult<&Value> {
        self.attributes.get(name).ok_or_else(|| {
            RelationError::missing_field(name, format!("record in table '{}'", self.table))
        })
    }

    pub fn set_field<V: Into<Value>>(&mut self, name: &str, value: V) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.relations.insert(name.to_string(), value);
    }

    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn take_relation(&mut self, name: &str) -> Option<RelationValue> {
        self.relations.remove(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Relations to load on this record once it is fetched
    pub fn set_eager_loads(&mut self, relations: Vec<String>) {
        self.eager_loads = relations;
    }

    pub fn eager_loads(&self) -> &[String] {
        &self.eager_loads
    }
}

/// Value stored in a record's relation slot
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// Plural relation: zero or more related records
    Many(Collection),
    /// Singular relation: at most one related record
    One(Option<Box<Record>>),
}

impl RelationValue {
    pub fn empty_many() -> Self {
        RelationValue::Many(Collection::empty())
    }

    pub fn none() -> Self {
        RelationValue::One(None)
    }

    pub fn as_many(&self) -> Option<&Collection> {
        match self {
            RelationValue::Many(collection) => Some(collection),
            RelationValue::One(_) => None,
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            RelationValue::One(record) => record.as_deref(),
            RelationValue::Many(_) => None,
        }
    }

    /// True for an empty collection or an absent singular value
    pub fn is_empty(&self) -> bool {
        match self {
            RelationValue::Many(collection) => collection.is_empty(),
            RelationValue::One(record) => record.is_none(),
        }
    }
}

/// Ordered collection of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: Vec<Record>,
}

impl Collection {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Values of one field across the collection; records lacking it yield `Null`
    pub fn pluck(&self, field: &str) -> Vec<Value> {
        self.records
            .iter()
            .map(|record| record.get_field(field).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl IntoIterator for Collection {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Build a collection from fetched records
pub fn new_collection(records: Vec<Record>) -> Collection {
    Collection::new(records)
}

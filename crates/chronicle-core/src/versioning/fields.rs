//! Tracked-field accessor table.
//!
//! Each record type declares, once at startup, which of its fields are
//! versioned. Every declared field gets a typed getter/setter pair that
//! converts to and from `serde_json::Value`, which is how snapshot data is
//! read from and written back onto a record.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::error::{ChronicleError, ChronicleResult};
use crate::versioning::VersionData;

type Getter<R> = Box<dyn Fn(&R) -> ChronicleResult<Value> + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, Value) -> ChronicleResult<()> + Send + Sync>;

/// Getter/setter pair for one tracked field.
pub struct FieldAccessor<R> {
    name: &'static str,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R> FieldAccessor<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read the field as a JSON value.
    pub fn get(&self, record: &R) -> ChronicleResult<Value> {
        (self.get)(record)
    }

    /// Overwrite the field. Fails if `value` does not fit the field's type.
    pub fn set(&self, record: &mut R, value: Value) -> ChronicleResult<()> {
        (self.set)(record, value)
    }
}

impl<R> std::fmt::Debug for FieldAccessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The ordered set of versioned fields of a record type.
#[derive(Debug)]
pub struct TrackedFields<R> {
    fields: Vec<FieldAccessor<R>>,
}

impl<R: 'static> TrackedFields<R> {
    pub fn builder() -> TrackedFieldsBuilder<R> {
        TrackedFieldsBuilder { fields: Vec::new() }
    }

    /// Declared field names, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldAccessor<R>> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldAccessor<R>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Current values of every tracked field.
    pub fn project(&self, record: &R) -> ChronicleResult<VersionData> {
        self.fields
            .iter()
            .map(|f| -> ChronicleResult<(String, Value)> {
                Ok((f.name.to_string(), f.get(record)?))
            })
            .collect()
    }

    /// Write snapshot values back onto `record`.
    ///
    /// Fields missing from `data` are left untouched; keys that are not
    /// tracked are skipped. Either every field is written or, on error,
    /// `record` is unchanged. Returns the number of fields written.
    pub fn apply(&self, record: &mut R, data: &VersionData) -> ChronicleResult<usize>
    where
        R: Clone,
    {
        let mut staged = record.clone();
        let mut applied = 0;
        for (key, value) in data {
            match self.get(key) {
                Some(field) => {
                    field.set(&mut staged, value.clone())?;
                    applied += 1;
                }
                None => warn!(field = %key, "ignoring untracked field in version data"),
            }
        }
        *record = staged;
        Ok(applied)
    }
}

/// Builder for [`TrackedFields`].
pub struct TrackedFieldsBuilder<R> {
    fields: Vec<FieldAccessor<R>>,
}

impl<R: 'static> TrackedFieldsBuilder<R> {
    /// Track a field through a pair of borrowing accessors.
    ///
    /// ```ignore
    /// TrackedFields::<Question>::builder()
    ///     .field("title", |q| &q.title, |q| &mut q.title)
    ///     .field("tags", |q| &q.tags, |q| &mut q.tags)
    ///     .build()?;
    /// ```
    pub fn field<T>(
        mut self,
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.fields.push(FieldAccessor {
            name,
            get: Box::new(move |record: &R| -> ChronicleResult<Value> {
                Ok(serde_json::to_value(get(record))?)
            }),
            set: Box::new(move |record: &mut R, value: Value| -> ChronicleResult<()> {
                *get_mut(record) = serde_json::from_value(value)
                    .map_err(|e| ChronicleError::invalid_field(name, e.to_string()))?;
                Ok(())
            }),
        });
        self
    }

    /// Finish the declaration. At least one field, no duplicates.
    pub fn build(self) -> ChronicleResult<TrackedFields<R>> {
        if self.fields.is_empty() {
            return Err(ChronicleError::Configuration(
                "a versioned record type must track at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name) {
                return Err(ChronicleError::Configuration(format!(
                    "field '{}' is tracked twice",
                    field.name
                )));
            }
        }

        Ok(TrackedFields {
            fields: self.fields,
        })
    }
}

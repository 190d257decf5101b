//! Field-path form state.
//!
//! Values live in one JSON object and are addressed by dotted paths such as
//! `experience.0.title`. Numeric segments index arrays.

use richtext_sync::{EventBus, Subscription};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Field path is empty")]
    EmptyPath,

    #[error("Invalid index `{segment}` in `{path}`")]
    InvalidIndex { path: String, segment: String },

    #[error("`{path}` goes through a value that is neither an object nor an array")]
    NotAContainer { path: String },

    #[error("Field `{field}` has an invalid value: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FormError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A single field was edited.
    Change,
    /// Every field was replaced.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Path of the edited field. `None` for a reset.
    pub name: Option<String>,
    pub kind: ChangeKind,
}

impl FieldChange {
    /// Whether this change may have touched `path`.
    pub fn affects(&self, path: &str) -> bool {
        match &self.name {
            None => true,
            Some(name) => {
                name == path
                    || name.starts_with(&format!("{path}."))
                    || path.starts_with(&format!("{name}."))
            }
        }
    }
}

pub struct FormState {
    values: RefCell<Value>,
    watchers: Rc<EventBus<FieldChange>>,
}

impl FormState {
    pub fn new(values: Value) -> Self {
        Self {
            values: RefCell::new(values),
            watchers: Rc::new(EventBus::new()),
        }
    }

    pub fn get_values(&self) -> Value {
        self.values.borrow().clone()
    }

    pub fn get_value(&self, path: &str) -> Option<Value> {
        let values = self.values.borrow();
        let mut current = &*values;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Set one field and notify watchers with [`ChangeKind::Change`].
    ///
    /// Missing intermediate objects and arrays are created. An array index may be
    /// at most the array's length, which appends.
    pub fn set_value(&self, path: &str, value: Value) -> Result<()> {
        if path.is_empty() {
            return Err(FormError::EmptyPath);
        }
        {
            let mut values = self.values.borrow_mut();
            let segments: Vec<&str> = path.split('.').collect();
            let slot = slot_mut(&mut values, path, &segments)?;
            *slot = value;
        }
        self.watchers.emit(&FieldChange {
            name: Some(path.to_string()),
            kind: ChangeKind::Change,
        });
        Ok(())
    }

    /// Replace every value and notify watchers with [`ChangeKind::Reset`].
    pub fn reset(&self, values: Value) {
        *self.values.borrow_mut() = values;
        self.watchers.emit(&FieldChange {
            name: None,
            kind: ChangeKind::Reset,
        });
    }

    /// Watch every change. Dropping the returned handle stops watching.
    pub fn watch(&self, callback: impl Fn(&FieldChange) + 'static) -> Subscription {
        self.watchers.subscribe(callback)
    }
}

fn slot_mut<'a>(root: &'a mut Value, path: &str, segments: &[&str]) -> Result<&'a mut Value> {
    let mut current = root;
    for (depth, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(FormError::EmptyPath);
        }
        if current.is_null() {
            *current = match segment.parse::<usize>() {
                Ok(_) => Value::Array(Vec::new()),
                Err(_) => Value::Object(Map::new()),
            };
        }
        let walked = segments[..=depth].join(".");
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index <= items.len())
                    .ok_or_else(|| FormError::InvalidIndex {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })?;
                if index == items.len() {
                    items.push(Value::Null);
                }
                &mut items[index]
            }
            _ => return Err(FormError::NotAContainer { path: walked }),
        };
    }
    Ok(current)
}

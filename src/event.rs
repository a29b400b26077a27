//! Mutation events produced by the write path.

use spatio_types::{Fields, Object};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// The kind of write that produced a [`MutationEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Object created or replaced; geometry may have moved.
    Set,
    /// Field-only update; geometry unchanged.
    Fset,
    Del,
    /// The whole collection was dropped.
    Drop,
    /// Any other write. Never produces notifications.
    Other(String),
}

impl CommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Set => "set",
            CommandKind::Fset => "fset",
            CommandKind::Del => "del",
            CommandKind::Drop => "drop",
            CommandKind::Other(name) => name,
        }
    }
}

impl FromStr for CommandKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "set" => CommandKind::Set,
            "fset" => CommandKind::Fset,
            "del" => CommandKind::Del,
            "drop" => CommandKind::Drop,
            other => CommandKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write against `(key, id)`.
///
/// `old_object` is the value before the write (absent on create), `new_object`
/// the value after it (absent on delete and drop). Immutable once built.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub command: CommandKind,
    pub key: String,
    pub id: String,
    pub old_object: Option<Object>,
    pub old_fields: Fields,
    pub new_object: Option<Object>,
    pub fields: Fields,
    pub timestamp: SystemTime,
}

impl MutationEvent {
    /// A `set` moving `id` from `old_object` to `new_object`.
    pub fn set(
        key: impl Into<String>,
        id: impl Into<String>,
        old_object: Option<Object>,
        new_object: Object,
    ) -> Self {
        Self {
            command: CommandKind::Set,
            key: key.into(),
            id: id.into(),
            old_object,
            old_fields: Fields::new(),
            new_object: Some(new_object),
            fields: Fields::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// An `fset` updating the fields of an unchanged object.
    pub fn fset(
        key: impl Into<String>,
        id: impl Into<String>,
        object: Object,
        old_fields: Fields,
        fields: Fields,
    ) -> Self {
        Self {
            command: CommandKind::Fset,
            key: key.into(),
            id: id.into(),
            old_object: Some(object.clone()),
            old_fields,
            new_object: Some(object),
            fields,
            timestamp: SystemTime::now(),
        }
    }

    pub fn del(key: impl Into<String>, id: impl Into<String>, old_object: Option<Object>) -> Self {
        Self {
            command: CommandKind::Del,
            key: key.into(),
            id: id.into(),
            old_object,
            old_fields: Fields::new(),
            new_object: None,
            fields: Fields::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn drop_collection(key: impl Into<String>) -> Self {
        Self {
            command: CommandKind::Drop,
            key: key.into(),
            id: String::new(),
            old_object: None,
            old_fields: Fields::new(),
            new_object: None,
            fields: Fields::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_old_fields(mut self, fields: Fields) -> Self {
        self.old_fields = fields;
        self
    }

    pub fn with_command(mut self, command: CommandKind) -> Self {
        self.command = command;
        self
    }

    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

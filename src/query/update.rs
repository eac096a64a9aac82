use crate::errors::StoreError;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdateOperator {
    CurrentDate,
    Inc,
    Max,
    Min,
    Mul,
    Rename,
    Set,
    SetOnInsert,
    Unset,
}

impl UpdateOperator {
    pub const ALL: [Self; 9] = [
        Self::CurrentDate,
        Self::Inc,
        Self::Max,
        Self::Min,
        Self::Mul,
        Self::Rename,
        Self::Set,
        Self::SetOnInsert,
        Self::Unset,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CurrentDate => "currentDate",
            Self::Inc => "inc",
            Self::Max => "max",
            Self::Min => "min",
            Self::Mul => "mul",
            Self::Rename => "rename",
            Self::Set => "set",
            Self::SetOnInsert => "setOnInsert",
            Self::Unset => "unset",
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::CurrentDate => "$currentDate",
            Self::Inc => "$inc",
            Self::Max => "$max",
            Self::Min => "$min",
            Self::Mul => "$mul",
            Self::Rename => "$rename",
            Self::Set => "$set",
            Self::SetOnInsert => "$setOnInsert",
            Self::Unset => "$unset",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }
}

impl fmt::Display for UpdateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the bare name (`set`) or the store key (`$set`).
impl FromStr for UpdateOperator {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix('$').unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|op| op.name() == bare)
            .ok_or_else(|| StoreError::UnsupportedOperator(s.to_string()))
    }
}

/// A single update operator applied to a whole field map.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub operator: UpdateOperator,
    pub fields: BsonDocument,
}

impl UpdateCommand {
    #[must_use]
    pub fn set(fields: BsonDocument) -> Self {
        build_update_command(UpdateOperator::Set, fields)
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.fields.is_empty()
    }

    /// `{ "<operator key>": fields }`
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(self.operator.key(), Bson::Document(self.fields.clone()));
        out
    }

    /// Combines several single-operator commands into one update document.
    /// Fields of repeated operators are unioned; a repeated field keeps the
    /// value from the later command.
    #[must_use]
    pub fn merge<'a, I>(commands: I) -> BsonDocument
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut out = BsonDocument::new();
        for cmd in commands {
            let key = cmd.operator.key();
            if let Ok(existing) = out.get_document_mut(key) {
                for (k, v) in &cmd.fields {
                    existing.insert(k.clone(), v.clone());
                }
            } else {
                out.insert(key, Bson::Document(cmd.fields.clone()));
            }
        }
        out
    }
}

/// Wraps `fields` as the single value of the operator's key. An empty map is
/// a valid no-op command.
#[must_use]
pub fn build_update_command(operator: UpdateOperator, fields: BsonDocument) -> UpdateCommand {
    UpdateCommand { operator, fields }
}

/// # Errors
/// Returns `UnsupportedOperator` if `operator` names none of the nine operators.
pub fn build_update_command_str(
    operator: &str,
    fields: BsonDocument,
) -> Result<UpdateCommand, StoreError> {
    Ok(build_update_command(operator.parse()?, fields))
}

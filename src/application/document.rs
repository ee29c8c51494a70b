//! Member document: the JSON export of a family's member collection.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::Member;

/// Either a bare array of member records or an object holding them under
/// `members` next to other family fields, which are kept as they are.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MemberDocument {
    Bare(Vec<Member>),
    Wrapped {
        members: Vec<Member>,
        #[serde(flatten)]
        rest: BTreeMap<String, Value>,
    },
}

impl Default for MemberDocument {
    fn default() -> Self {
        MemberDocument::Bare(Vec::new())
    }
}

impl MemberDocument {
    pub fn parse(content: &str, path: &Path) -> ApplicationResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let invalid = |message: String| ApplicationError::Document {
            path: path.to_path_buf(),
            message,
        };
        let value: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        match value {
            Value::Array(records) => Ok(Self::Bare(parse_records(records).map_err(invalid)?)),
            Value::Object(mut fields) => {
                let records = match fields.remove("members") {
                    Some(Value::Array(records)) => records,
                    Some(_) => return Err(invalid("`members` is not an array".to_string())),
                    None => return Err(invalid("object has no `members` array".to_string())),
                };
                Ok(Self::Wrapped {
                    members: parse_records(records).map_err(invalid)?,
                    rest: fields.into_iter().collect(),
                })
            }
            _ => Err(invalid(
                "expected an array of members or an object with `members`".to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> ApplicationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ApplicationError::OperationFailed {
            context: "serialize member document".to_string(),
            source: Box::new(e),
        })
    }

    pub fn members(&self) -> &[Member] {
        match self {
            MemberDocument::Bare(members) | MemberDocument::Wrapped { members, .. } => members,
        }
    }

    pub fn members_mut(&mut self) -> &mut Vec<Member> {
        match self {
            MemberDocument::Bare(members) | MemberDocument::Wrapped { members, .. } => members,
        }
    }
}

/// Reads each record on its own so an error names the record at fault.
fn parse_records(records: Vec<Value>) -> Result<Vec<Member>, String> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value(record).map_err(|e| format!("member record #{index}: {e}"))
        })
        .collect()
}

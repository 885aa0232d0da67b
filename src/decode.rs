//! Schema-checked decoding of response bodies.
//!
//! Every body goes through serde first and then through an explicit
//! [`Validate`] pass, so a response that parses but breaks a model invariant
//! (an empty id, a blank title) is rejected with a typed [`DecodeError`].
//! Lists are checked entry by entry: a bad entry is skipped, the rest stay.

use crate::models::{Task, TaskLog};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid `{field}` in response: {reason}")]
    Schema {
        field: &'static str,
        reason: &'static str,
    },
}

/// Conversion from an HTTP response body.
pub trait FromBody: Sized {
    /// `Ok(None)` means this type needs a body and the response had none.
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError>;
}

trait Validate {
    fn validate(&self) -> Result<(), DecodeError>;
}

fn require(value: &str, field: &'static str) -> Result<(), DecodeError> {
    if value.trim().is_empty() {
        Err(DecodeError::Schema {
            field,
            reason: "must not be empty",
        })
    } else {
        Ok(())
    }
}

impl Validate for Task {
    fn validate(&self) -> Result<(), DecodeError> {
        require(&self.id, "id")?;
        require(&self.title, "title")
    }
}

impl Validate for TaskLog {
    fn validate(&self) -> Result<(), DecodeError> {
        require(&self.id, "id")?;
        require(&self.task_id, "task_id")?;
        if let Some(end) = self.end_at {
            if end < self.start_at {
                return Err(DecodeError::Schema {
                    field: "end_at",
                    reason: "ends before it starts",
                });
            }
        }
        Ok(())
    }
}

// A JSON `null` payload counts as no body at all.
fn parse<T: DeserializeOwned>(body: Option<&[u8]>) -> Result<Option<T>, DecodeError> {
    match body {
        Some(bytes) => Ok(serde_json::from_slice::<Option<T>>(bytes)?),
        None => Ok(None),
    }
}

fn decode_one<T>(body: Option<&[u8]>) -> Result<Option<T>, DecodeError>
where
    T: DeserializeOwned + Validate,
{
    let Some(value) = parse::<T>(body)? else {
        return Ok(None);
    };
    value.validate()?;
    Ok(Some(value))
}

fn decode_list<T>(body: Option<&[u8]>) -> Result<Option<Vec<T>>, DecodeError>
where
    T: DeserializeOwned + Validate,
{
    let Some(items) = parse::<Vec<T>>(body)? else {
        return Ok(None);
    };
    let valid = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item.validate() {
            Ok(()) => Some(item),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping invalid list entry");
                None
            }
        })
        .collect();
    Ok(Some(valid))
}

impl FromBody for Task {
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        decode_one(body)
    }
}

impl FromBody for Vec<Task> {
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        decode_list(body)
    }
}

impl FromBody for TaskLog {
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        decode_one(body)
    }
}

impl FromBody for Vec<TaskLog> {
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        decode_list(body)
    }
}

// Health answers with plain text, possibly nothing at all.
impl FromBody for String {
    fn from_body(body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        Ok(Some(
            body.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default(),
        ))
    }
}

// DELETE answers 204 with no body, or 200 with a body nobody reads.
impl FromBody for () {
    fn from_body(_body: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        Ok(Some(()))
    }
}

//! Change-set decoder and applier

use serde_json::Value;
use thiserror::Error;

/// Change-set decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    #[error("Change set must be a JSON array, got {0}")]
    NotAnArray(String),

    #[error("Expected retain count at index {index}, got {found}")]
    InvalidRetain { index: usize, found: String },

    #[error("Unexpected change element at index {index}: {found}")]
    InvalidOperation { index: usize, found: String },

    #[error("Empty replacement at index {0}")]
    EmptyReplacement(usize),

    #[error("Expected deletion length at index {index}, got {found}")]
    InvalidDeleteLength { index: usize, found: String },
}

/// A single decoded step of a change set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStep {
    /// Copy the next `n` characters of the source unchanged
    Retain(usize),
    /// Skip `delete` characters of the source and emit `insert` instead
    Replace { delete: usize, insert: String },
}

/// A decoded change set, ready to be applied to any source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    steps: Vec<ChangeStep>,
}

impl ChangeSet {
    /// Decode the JSON change-set encoding
    pub fn decode(value: &Value) -> Result<Self, ChangeError> {
        let items = value
            .as_array()
            .ok_or_else(|| ChangeError::NotAnArray(describe(value)))?;

        // Error indices are positions in `items`, even with an implicit retain.
        let implicit_retain = matches!(items.first(), Some(first) if !first.is_number());
        let mut steps = Vec::with_capacity(items.len() + 1);
        let mut iter = items.iter().enumerate();

        if implicit_retain {
            steps.push(ChangeStep::Retain(0));
            if let Some((index, op)) = iter.next() {
                steps.push(decode_operation(index, op)?);
            }
        }

        while let Some((index, retain)) = iter.next() {
            let n = as_count(retain).ok_or_else(|| ChangeError::InvalidRetain {
                index,
                found: describe(retain),
            })?;
            steps.push(ChangeStep::Retain(n));

            if let Some((index, op)) = iter.next() {
                steps.push(decode_operation(index, op)?);
            }
        }

        Ok(Self { steps })
    }

    /// Decoded steps in order
    pub fn steps(&self) -> &[ChangeStep] {
        &self.steps
    }

    /// Apply the change set to `source`, producing the new text
    ///
    /// Whatever remains of `source` after the last step is appended.
    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        for step in &self.steps {
            match step {
                ChangeStep::Retain(n) => {
                    let (kept, tail) = split_chars(rest, *n);
                    out.push_str(kept);
                    rest = tail;
                }
                ChangeStep::Replace { delete, insert } => {
                    out.push_str(insert);
                    rest = split_chars(rest, *delete).1;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Decode `changes` and apply it to `source`
///
/// Fails without producing any output if the encoding is malformed.
pub fn apply(source: &str, changes: &Value) -> Result<String, ChangeError> {
    Ok(ChangeSet::decode(changes)?.apply(source))
}

/// Apply every encoding in order, starting from `seed`
pub fn replay<'a, I>(seed: &str, changes: I) -> Result<String, ChangeError>
where
    I: IntoIterator<Item = &'a Value>,
{
    changes
        .into_iter()
        .try_fold(seed.to_string(), |text, change| apply(&text, change))
}

fn decode_operation(index: usize, op: &Value) -> Result<ChangeStep, ChangeError> {
    if let Some(delete) = as_count(op) {
        return Ok(ChangeStep::Replace {
            delete,
            insert: String::new(),
        });
    }

    let parts = op.as_array().ok_or_else(|| ChangeError::InvalidOperation {
        index,
        found: describe(op),
    })?;
    let (first, segments) = parts
        .split_first()
        .ok_or(ChangeError::EmptyReplacement(index))?;
    let delete = as_count(first).ok_or_else(|| ChangeError::InvalidDeleteLength {
        index,
        found: describe(first),
    })?;

    let insert = segments
        .iter()
        .map(|segment| match segment {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ChangeStep::Replace { delete, insert })
}

/// Non-negative integer that fits in `usize`
fn as_count(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

/// Split `s` after `n` chars, clamping at the end of the string
fn split_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((at, _)) => s.split_at(at),
        None => (s, ""),
    }
}

fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 40 {
        let short: String = text.chars().take(40).collect();
        format!("{}...", short)
    } else {
        text
    }
}

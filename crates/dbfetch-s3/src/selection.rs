use std::fmt;

use crate::error::Error;
use crate::model::ObjectSummary;

/// Maps the 1-based indices shown to the user back to object keys.
#[derive(Debug, Clone, Default)]
pub struct SelectionIndex {
    keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Blank input.
    Skip,
    Choice { index: usize, key: String },
}

/// Rejected input, with a message fit for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSelection(pub String);

impl fmt::Display for InvalidSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidSelection {}

impl From<InvalidSelection> for Error {
    fn from(err: InvalidSelection) -> Self {
        Error::InvalidSelection(err.0)
    }
}

impl SelectionIndex {
    pub fn new(objects: &[ObjectSummary]) -> Self {
        Self {
            keys: objects.iter().map(|obj| obj.key.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.keys.get(i))
            .map(String::as_str)
    }

    pub fn validate(&self, input: &str) -> Result<Selection, InvalidSelection> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Selection::Skip);
        }

        let out_of_range = || {
            InvalidSelection(format!(
                "{input:?} is not a valid choice, enter a number between 1 and {} or leave empty to skip",
                self.len()
            ))
        };
        let index: usize = input.parse().map_err(|_| out_of_range())?;
        let key = self.key(index).ok_or_else(out_of_range)?;

        Ok(Selection::Choice {
            index,
            key: key.to_string(),
        })
    }
}

//! Token ↔ id bijection.
//!
//! Splitting text into tokens is left to the caller; this only maps
//! already-segmented tokens to the integer ids the model consumes.

use std::collections::HashMap;

use quill_core::{QuillError, Result};
use serde::{Deserialize, Serialize};

/// Fixed vocabulary. Ids are the positions of tokens in the construction list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(QuillError::InvalidArgument("vocabulary must not be empty".into()));
        }
        let mut ids = HashMap::with_capacity(tokens.len());
        for (id, tok) in tokens.iter().enumerate() {
            if ids.insert(tok.clone(), id).is_some() {
                return Err(QuillError::InvalidArgument(format!("duplicate token {:?}", tok)));
            }
        }
        Ok(Self { tokens, ids })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn id_of(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn token_of(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    /// Map tokens to ids, failing on the first unknown token.
    pub fn encode(&self, tokens: &[&str]) -> Result<Vec<usize>> {
        tokens
            .iter()
            .map(|t| {
                self.id_of(t)
                    .ok_or_else(|| QuillError::InvalidArgument(format!("unknown token {:?}", t)))
            })
            .collect()
    }

    /// Map ids back to tokens, failing on the first id outside the vocabulary.
    pub fn decode(&self, ids: &[usize]) -> Result<Vec<&str>> {
        ids.iter()
            .map(|&id| {
                self.token_of(id)
                    .ok_or(QuillError::IndexOutOfRange { index: id, bound: self.len() })
            })
            .collect()
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = QuillError;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        Vocabulary::new(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(v: Vocabulary) -> Self {
        v.tokens
    }
}

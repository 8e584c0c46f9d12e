use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::MemberId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    MoreInfoRequest,
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultNote {
    author: MemberId,
    kind: NoteKind,
    body: String,
    written_at: DateTime<Utc>,
}

impl ConsultNote {
    pub fn new(
        author: MemberId,
        kind: NoteKind,
        body: String,
        written_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if body.trim().is_empty() {
            return Err(DomainError::EmptyNote);
        }
        Ok(Self {
            author,
            kind,
            body,
            written_at,
        })
    }

    pub fn author(&self) -> &MemberId {
        &self.author
    }

    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn written_at(&self) -> DateTime<Utc> {
        self.written_at
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the voting user, supplied pre-validated by the identity layer.
pub type UserId = i64;

/// Identifier of a post or comment.
pub type TargetId = i64;

/// The kinds of content that can receive votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    /// Name of the table holding targets of this kind and their `vote_count`.
    pub fn table(&self) -> &'static str {
        match self {
            TargetKind::Post => "posts",
            TargetKind::Comment => "comments",
        }
    }

    /// Name of the nullable reference column on the `votes` table.
    pub fn vote_column(&self) -> &'static str {
        match self {
            TargetKind::Post => "post_id",
            TargetKind::Comment => "comment_id",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Post => write!(f, "post"),
            TargetKind::Comment => write!(f, "comment"),
        }
    }
}

/// A votable post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub id: TargetId,
}

impl Target {
    pub fn post(id: TargetId) -> Self {
        Self { kind: TargetKind::Post, id }
    }

    pub fn comment(id: TargetId) -> Self {
        Self { kind: TargetKind::Comment, id }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

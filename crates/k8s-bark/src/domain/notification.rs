use derive_more::Display;

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    /// Lower-case verb used in human-readable details.
    pub fn verb(self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }
}

/// Immutable, human-readable description of a novel resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: String,
    pub action: Action,
    pub subject: String,
    pub detail: String,
}

impl Notification {
    pub fn new(
        kind: impl Into<String>,
        action: Action,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            action,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

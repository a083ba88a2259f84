use serde_json::Value;

/// Last-known state of a single cluster object.
///
/// `name` is unique within `kind`; namespaced objects use `namespace/name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub kind: String,
    pub name: String,
    /// Cluster-assigned resourceVersion, changes on every real mutation.
    pub version: String,
    pub payload: Value,
}

impl ResourceRecord {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            version: version.into(),
            payload,
        }
    }
}

/// A single change reported by the live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Added(ResourceRecord),
    Modified(ResourceRecord),
    Deleted(ResourceRecord),
}

impl ChangeEvent {
    pub fn record(&self) -> &ResourceRecord {
        match self {
            ChangeEvent::Added(record)
            | ChangeEvent::Modified(record)
            | ChangeEvent::Deleted(record) => record,
        }
    }
}

/// Consistent point-in-time listing of one watch scope.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Collection resourceVersion to start watching from.
    pub version: String,
    pub records: Vec<ResourceRecord>,
}

/// Item yielded by a watch subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchItem {
    Change(ChangeEvent),
    /// Progress marker carrying only a newer resourceVersion.
    Bookmark(String),
}

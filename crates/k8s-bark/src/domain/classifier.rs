//! Decides whether a raw change is worth a notification.
//!
//! Everything here is pure: the caller supplies the previously stored record and
//! whether the name was part of the startup listing, and applies the store update
//! itself afterwards.

use std::collections::HashMap;

use crate::domain::notification::Action;
use crate::domain::notification::Notification;
use crate::domain::resource::ChangeEvent;
use crate::domain::resource::ResourceRecord;

const POD_KIND: &str = "Pod";

/// Classifies a change against the stored state.
///
/// - `Added` with no stored record emits `Created`, unless the name came from the
///   startup listing (the watch replaying objects that already existed).
/// - `Added` for a known name and `Modified` emit `Updated` only when the version
///   token moved.
/// - `Deleted` always emits `Deleted`.
pub fn classify(
    event: &ChangeEvent,
    previous: Option<&ResourceRecord>,
    in_initial_listing: bool,
) -> Option<Notification> {
    let action = match (event, previous) {
        (ChangeEvent::Deleted(_), _) => Action::Deleted,
        (ChangeEvent::Added(_), None) if in_initial_listing => return None,
        (ChangeEvent::Added(_), None) => Action::Created,
        (ChangeEvent::Added(current) | ChangeEvent::Modified(current), Some(stored))
            if stored.version == current.version =>
        {
            return None
        }
        (ChangeEvent::Added(_) | ChangeEvent::Modified(_), _) => Action::Updated,
    };

    let record = event.record();
    Some(Notification::new(
        record.kind.clone(),
        action,
        record.name.clone(),
        describe(record, action),
    ))
}

/// Renders the human-readable detail line for a record.
pub fn describe(record: &ResourceRecord, action: Action) -> String {
    let base = format!("{} {}", record.name, action.verb());
    if record.kind != POD_KIND || action == Action::Deleted {
        return base;
    }
    match record
        .payload
        .pointer("/status/phase")
        .and_then(|phase| phase.as_str())
    {
        Some(phase) => format!("{base} ({phase})"),
        None => base,
    }
}

/// Turns a fresh listing into the changes that bring `known` up to date.
///
/// Listed names without a known record become `Added`, listed names with a known
/// record become `Modified` and known names missing from the listing become
/// `Deleted`. Feeding the result through [`classify`] reports exactly what changed
/// while the watch was not running.
pub fn reconcile(listed: Vec<ResourceRecord>, known: Vec<ResourceRecord>) -> Vec<ChangeEvent> {
    let mut known: HashMap<String, ResourceRecord> = known
        .into_iter()
        .map(|record| (record.name.clone(), record))
        .collect();

    let mut events: Vec<ChangeEvent> = listed
        .into_iter()
        .map(|record| match known.remove(&record.name) {
            Some(_) => ChangeEvent::Modified(record),
            None => ChangeEvent::Added(record),
        })
        .collect();

    let mut gone: Vec<ResourceRecord> = known.into_values().collect();
    gone.sort_by(|a, b| a.name.cmp(&b.name));
    events.extend(gone.into_iter().map(ChangeEvent::Deleted));
    events
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    fn pod(name: &str, version: &str) -> ResourceRecord {
        ResourceRecord::new("Pod", name, version, json!({}))
    }

    #[test]
    fn added_unknown_resource_is_created() {
        let notification = classify(&ChangeEvent::Added(pod("a", "1")), None, false)
            .expect("should notify");
        assert_eq!(notification.action, Action::Created);
        assert_eq!(notification.subject, "a");
        assert_eq!(notification.kind, "Pod");
    }

    #[test]
    fn added_from_initial_listing_is_suppressed() {
        assert!(classify(&ChangeEvent::Added(pod("a", "1")), None, true).is_none());
    }

    #[test]
    fn added_replay_of_stored_resource_is_suppressed() {
        let stored = pod("a", "1");
        assert!(classify(&ChangeEvent::Added(pod("a", "1")), Some(&stored), true).is_none());
        assert!(classify(&ChangeEvent::Added(pod("a", "1")), Some(&stored), false).is_none());
    }

    #[test]
    fn added_with_new_version_for_stored_resource_is_updated() {
        let stored = pod("a", "1");
        let notification = classify(&ChangeEvent::Added(pod("a", "2")), Some(&stored), false)
            .expect("should notify");
        assert_eq!(notification.action, Action::Updated);
    }

    #[test]
    fn modified_with_same_version_is_suppressed() {
        let stored = pod("a", "2");
        assert!(classify(&ChangeEvent::Modified(pod("a", "2")), Some(&stored), false).is_none());
    }

    #[test]
    fn modified_with_new_version_is_updated() {
        let stored = pod("a", "1");
        let notification = classify(&ChangeEvent::Modified(pod("a", "2")), Some(&stored), true)
            .expect("should notify");
        assert_eq!(notification.action, Action::Updated);
        assert_eq!(notification.subject, "a");
    }

    #[test]
    fn modified_unknown_resource_is_updated() {
        let notification =
            classify(&ChangeEvent::Modified(pod("a", "3")), None, false).expect("should notify");
        assert_eq!(notification.action, Action::Updated);
    }

    #[test]
    fn deleted_is_always_reported() {
        let stored = pod("a", "1");
        for previous in [Some(&stored), None] {
            for initial in [true, false] {
                let notification = classify(&ChangeEvent::Deleted(pod("a", "1")), previous, initial)
                    .expect("should notify");
                assert_eq!(notification.action, Action::Deleted);
            }
        }
    }

    #[test]
    fn pod_detail_includes_phase() {
        let record = ResourceRecord::new(
            "Pod",
            "default/web-0",
            "5",
            json!({"status": {"phase": "Running"}}),
        );
        assert_eq!(
            describe(&record, Action::Updated),
            "default/web-0 updated (Running)"
        );
        assert_eq!(describe(&record, Action::Deleted), "default/web-0 deleted");
    }

    #[test]
    fn detail_without_phase() {
        let record = ResourceRecord::new("Service", "default/api", "5", json!({}));
        assert_eq!(describe(&record, Action::Created), "default/api created");
        assert_eq!(describe(&pod("b", "1"), Action::Created), "b created");
    }

    #[test]
    fn reconcile_reports_added_modified_and_deleted() {
        let listed = vec![pod("a", "2"), pod("c", "1")];
        let known = vec![pod("a", "1"), pod("b", "1")];

        let events = reconcile(listed, known);
        assert_eq!(
            events,
            vec![
                ChangeEvent::Modified(pod("a", "2")),
                ChangeEvent::Added(pod("c", "1")),
                ChangeEvent::Deleted(pod("b", "1")),
            ]
        );
    }
}

//! Bridges a [`ChangeSource`] to the classifier and the notification queue.

use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::domain::classifier;
use crate::domain::notification::Notification;
use crate::domain::queue::EnqueueError;
use crate::domain::queue::NotificationSender;
use crate::domain::resource::ChangeEvent;
use crate::domain::resource::Listing;
use crate::domain::resource::ResourceRecord;
use crate::domain::resource::WatchItem;
use crate::domain::snapshot_store::SnapshotStore;
use crate::domain::traits::ChangeSource;
use crate::infrastructure::k8s::KubernetesError;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Watches that close sooner than this are followed by a retry delay.
const MIN_WATCH_DURATION: Duration = Duration::from_secs(1);

/// Counters describing what an observer did with the events it saw.
#[derive(Debug, Default)]
pub struct ObserverStats {
    emitted: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ObserverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStatsSnapshot {
    pub emitted: u64,
    pub suppressed: u64,
    pub dropped: u64,
}

impl ObserverStats {
    pub fn snapshot(&self) -> ObserverStatsSnapshot {
        ObserverStatsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Watches one resource kind in one namespace scope.
///
/// The observer seeds the shared [`SnapshotStore`] from a full listing before it
/// classifies anything, then follows the live subscription until cancelled.
pub struct Observer<S> {
    source: S,
    state: ObserverState,
    list_timeout: Duration,
    retry_delay: Duration,
}

/// Everything the observer mutates while a watch stream borrows the source.
struct ObserverState {
    store: Arc<SnapshotStore>,
    queue: NotificationSender,
    /// Names present in the startup listing and not deleted since.
    initial: HashSet<String>,
    /// Names this observer has put into the store.
    owned: HashSet<String>,
    resume_version: Option<String>,
    stats: Arc<ObserverStats>,
}

impl<S: ChangeSource> Observer<S> {
    pub fn new(
        source: S,
        store: Arc<SnapshotStore>,
        queue: NotificationSender,
        list_timeout: Duration,
    ) -> Self {
        Self {
            source,
            state: ObserverState {
                store,
                queue,
                initial: HashSet::new(),
                owned: HashSet::new(),
                resume_version: None,
                stats: Arc::new(ObserverStats::default()),
            },
            list_timeout,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Delay before resuming after a failed watch.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn stats(&self) -> Arc<ObserverStats> {
        self.state.stats.clone()
    }

    pub fn is_primed(&self) -> bool {
        self.state.resume_version.is_some()
    }

    /// Performs the startup listing and seeds the store without notifying.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ListTimeout`] if the listing does not finish in time
    /// - [`KubernetesError::ListFailed`] if the cluster rejects the listing
    pub async fn prime(&mut self) -> Result<(), Report<KubernetesError>> {
        let listing = self.list().await?;
        let count = listing.records.len();
        for record in listing.records {
            self.state.initial.insert(record.name.clone());
            self.state.store_put(record);
        }
        self.state.resume_version = Some(listing.version);
        info!(
            kind = self.source.kind(),
            scope = %self.source.scope(),
            count,
            "Initial listing loaded into snapshot store"
        );
        Ok(())
    }

    /// Follows the change stream until `cancellation_token` fires.
    ///
    /// Primes the store first if [`Observer::prime`] has not run yet. Watch failures
    /// after startup are logged and retried; only the startup listing is fatal.
    #[tracing::instrument(skip_all, fields(kind = self.source.kind(), scope = %self.source.scope()))]
    pub async fn run(
        mut self,
        cancellation_token: CancellationToken,
    ) -> Result<(), Report<KubernetesError>> {
        if !self.is_primed() {
            self.prime().await?;
        }
        info!("Starting observer");

        loop {
            let started = Instant::now();
            let outcome = select! {
                _ = cancellation_token.cancelled() => None,
                result = self.follow() => Some(result),
            };
            let Some(result) = outcome else {
                info!("Observer shutdown requested");
                break;
            };

            match result {
                Ok(()) if started.elapsed() < MIN_WATCH_DURATION => {
                    debug!("Watch stream closed immediately, backing off");
                    if self.pause(&cancellation_token).await {
                        break;
                    }
                }
                Ok(()) => debug!("Watch stream closed by server, resuming"),
                Err(e) if matches!(e.current_context(), KubernetesError::WatchExpired { .. }) => {
                    warn!("Watch version expired, relisting: {e}");
                    if let Err(e) = self.resync().await {
                        error!("Relist failed: {e:?}");
                        if self.pause(&cancellation_token).await {
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Watch failed: {e:?}");
                    if self.pause(&cancellation_token).await {
                        break;
                    }
                }
            }
        }

        let stats = self.state.stats.snapshot();
        info!(
            emitted = stats.emitted,
            suppressed = stats.suppressed,
            dropped = stats.dropped,
            "Observer stopped"
        );
        Ok(())
    }

    /// Consumes one watch subscription until it ends or fails.
    async fn follow(&mut self) -> Result<(), Report<KubernetesError>> {
        let from_version = self.state.resume_version.clone().unwrap_or_default();
        let mut stream = self.source.watch(from_version);

        while let Some(item) = stream.next().await {
            match item {
                Ok(WatchItem::Bookmark(version)) => self.state.resume_version = Some(version),
                Ok(WatchItem::Change(event)) => {
                    self.state.resume_version = Some(event.record().version.clone());
                    self.state.apply(event, true);
                }
                Err(e) if matches!(e.current_context(), KubernetesError::InvalidObject { .. }) => {
                    warn!("Skipping event: {e:?}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Relists after the watch lost its place and reports what changed meanwhile.
    async fn resync(&mut self) -> Result<(), Report<KubernetesError>> {
        let listing = self.list().await?;
        let kind = self.source.kind().to_string();
        let known: Vec<ResourceRecord> = self
            .state
            .owned
            .iter()
            .filter_map(|name| self.state.store.get(&kind, name))
            .collect();

        let events = classifier::reconcile(listing.records, known);
        info!(changes = events.len(), "Reconciling snapshot after relist");
        for event in events {
            self.state.apply(event, false);
        }
        self.state.resume_version = Some(listing.version);
        Ok(())
    }

    async fn list(&self) -> Result<Listing, Report<KubernetesError>> {
        tokio::time::timeout(self.list_timeout, self.source.list())
            .await
            .map_err(|_| {
                Report::new(KubernetesError::ListTimeout {
                    scope: self.source.scope(),
                    seconds: self.list_timeout.as_secs(),
                })
            })?
    }

    /// Waits out the retry delay. Returns `true` if cancelled meanwhile.
    async fn pause(&self, cancellation_token: &CancellationToken) -> bool {
        select! {
            _ = cancellation_token.cancelled() => true,
            _ = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}

impl ObserverState {
    /// Classifies one change, updates the store and queues any notification.
    ///
    /// The store is updated whether or not the change was novel.
    fn apply(&mut self, event: ChangeEvent, honour_initial_listing: bool) {
        let record = event.record();
        let kind = record.kind.clone();
        let name = record.name.clone();

        let in_initial_listing = honour_initial_listing && self.initial.contains(&name);
        let previous = self.store.get(&kind, &name);
        let notification = classifier::classify(&event, previous.as_ref(), in_initial_listing);

        match event {
            ChangeEvent::Deleted(_) => {
                self.store.delete(&kind, &name);
                self.owned.remove(&name);
                self.initial.remove(&name);
            }
            ChangeEvent::Added(record) | ChangeEvent::Modified(record) => self.store_put(record),
        }

        match notification {
            Some(notification) => self.enqueue(notification),
            None => {
                self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %kind, name = %name, "Change is not novel, skipping");
            }
        }
    }

    fn store_put(&mut self, record: ResourceRecord) {
        self.owned.insert(record.name.clone());
        let kind = record.kind.clone();
        let name = record.name.clone();
        self.store.put(&kind, &name, record);
    }

    fn enqueue(&self, notification: Notification) {
        match self.queue.try_enqueue(notification) {
            Ok(()) => {
                self.stats.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                let reason = e.to_string();
                let full = matches!(e, EnqueueError::Full(_));
                let notification = e.into_inner();
                warn!(
                    kind = %notification.kind,
                    action = %notification.action,
                    subject = %notification.subject,
                    full,
                    "Dropping notification: {reason}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use futures::stream::BoxStream;
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::domain::notification::Action;
    use crate::domain::queue::notification_queue;
    use crate::domain::queue::NotificationReceiver;

    type Batch = Vec<Result<WatchItem, Report<KubernetesError>>>;

    /// Serves queued listings and watch batches; idles once batches run out.
    struct ScriptedSource {
        listings: Mutex<VecDeque<Listing>>,
        batches: Mutex<VecDeque<Batch>>,
        watched_from: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(listings: Vec<Listing>, batches: Vec<Batch>) -> Self {
            Self {
                listings: Mutex::new(listings.into()),
                batches: Mutex::new(batches.into()),
                watched_from: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChangeSource for ScriptedSource {
        fn kind(&self) -> &str {
            "Pod"
        }

        fn scope(&self) -> String {
            "all namespaces".to_string()
        }

        fn list(&self) -> BoxFuture<'_, Result<Listing, Report<KubernetesError>>> {
            let next = self.listings.lock().expect("lock").pop_front();
            Box::pin(async move {
                match next {
                    Some(listing) => Ok(listing),
                    None => futures::future::pending().await,
                }
            })
        }

        fn watch(
            &self,
            from_version: String,
        ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>> {
            self.watched_from.lock().expect("lock").push(from_version);
            match self.batches.lock().expect("lock").pop_front() {
                Some(batch) => futures::stream::iter(batch).boxed(),
                None => futures::stream::pending().boxed(),
            }
        }
    }

    fn pod(name: &str, version: &str) -> ResourceRecord {
        ResourceRecord::new("Pod", name, version, json!({}))
    }

    fn listing(version: &str, records: Vec<ResourceRecord>) -> Listing {
        Listing {
            version: version.to_string(),
            records,
        }
    }

    fn change(event: ChangeEvent) -> Result<WatchItem, Report<KubernetesError>> {
        Ok(WatchItem::Change(event))
    }

    fn drain(rx: &mut NotificationReceiver) -> Vec<(Action, String)> {
        let mut seen = Vec::new();
        while let Some(n) = rx.try_recv() {
            seen.push((n.action, n.subject));
        }
        seen
    }

    fn observer(
        source: ScriptedSource,
        capacity: usize,
    ) -> (Observer<ScriptedSource>, Arc<SnapshotStore>, NotificationReceiver) {
        let store = Arc::new(SnapshotStore::new());
        let (tx, rx) = notification_queue(capacity);
        let observer = Observer::new(source, store.clone(), tx, Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(10));
        (observer, store, rx)
    }

    #[tokio::test]
    async fn prime_seeds_store_without_notifying() {
        let source = ScriptedSource::new(
            vec![listing("10", vec![pod("a", "1"), pod("b", "4")])],
            vec![],
        );
        let (mut observer, store, mut rx) = observer(source, 10);

        observer.prime().await.expect("prime");

        assert!(observer.is_primed());
        assert_eq!(store.len("Pod"), 2);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn prime_times_out() {
        let source = ScriptedSource::new(vec![], vec![]);
        let store = Arc::new(SnapshotStore::new());
        let (tx, _rx) = notification_queue(10);
        let mut observer = Observer::new(source, store, tx, Duration::from_millis(20));

        let err = observer.prime().await.expect_err("listing never completes");
        assert!(matches!(
            err.current_context(),
            KubernetesError::ListTimeout { .. }
        ));
    }

    #[tokio::test]
    async fn startup_replay_and_duplicate_updates_are_suppressed() {
        let source = ScriptedSource::new(
            vec![listing("10", vec![pod("a", "1")])],
            vec![vec![
                change(ChangeEvent::Added(pod("a", "1"))),
                change(ChangeEvent::Modified(pod("a", "2"))),
                change(ChangeEvent::Modified(pod("a", "2"))),
                change(ChangeEvent::Added(pod("b", "3"))),
            ]],
        );
        let (mut observer, store, mut rx) = observer(source, 10);
        observer.prime().await.expect("prime");

        observer.follow().await.expect("follow");

        assert_eq!(
            drain(&mut rx),
            vec![
                (Action::Updated, "a".to_string()),
                (Action::Created, "b".to_string()),
            ]
        );
        assert_eq!(store.get("Pod", "a").map(|r| r.version), Some("2".to_string()));
        assert_eq!(
            observer.stats().snapshot(),
            ObserverStatsSnapshot {
                emitted: 2,
                suppressed: 2,
                dropped: 0,
            }
        );
        assert_eq!(observer.state.resume_version.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn delete_then_recreate_reports_created() {
        let source = ScriptedSource::new(
            vec![listing("10", vec![pod("a", "1")])],
            vec![vec![
                change(ChangeEvent::Deleted(pod("a", "5"))),
                change(ChangeEvent::Added(pod("a", "6"))),
            ]],
        );
        let (mut observer, store, mut rx) = observer(source, 10);
        observer.prime().await.expect("prime");

        observer.follow().await.expect("follow");

        assert_eq!(
            drain(&mut rx),
            vec![
                (Action::Deleted, "a".to_string()),
                (Action::Created, "a".to_string()),
            ]
        );
        assert_eq!(store.get("Pod", "a").map(|r| r.version), Some("6".to_string()));
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let events = (0..4)
            .map(|i| change(ChangeEvent::Added(pod(&format!("p{i}"), "1"))))
            .collect();
        let source = ScriptedSource::new(vec![listing("1", vec![])], vec![events]);
        let (mut observer, store, mut rx) = observer(source, 3);
        observer.prime().await.expect("prime");

        observer.follow().await.expect("follow");

        let subjects: Vec<String> = drain(&mut rx).into_iter().map(|(_, s)| s).collect();
        assert_eq!(subjects, vec![
            "p0".to_string(),
            "p1".to_string(),
            "p2".to_string()
        ]);
        assert_eq!(observer.stats().snapshot().dropped, 1);
        // The dropped change is still reflected in the store.
        assert!(store.get("Pod", "p3").is_some());
    }

    #[tokio::test]
    async fn invalid_object_is_skipped() {
        let source = ScriptedSource::new(
            vec![listing("1", vec![])],
            vec![vec![
                Err(Report::new(KubernetesError::InvalidObject {
                    message: "object has no name".to_string(),
                })),
                change(ChangeEvent::Added(pod("a", "2"))),
            ]],
        );
        let (mut observer, _store, mut rx) = observer(source, 10);
        observer.prime().await.expect("prime");

        observer.follow().await.expect("follow");

        assert_eq!(drain(&mut rx), vec![(Action::Created, "a".to_string())]);
    }

    #[tokio::test]
    async fn expired_watch_relists_and_reconciles() {
        let source = ScriptedSource::new(
            vec![
                listing("10", vec![pod("a", "1"), pod("b", "1")]),
                listing("20", vec![pod("a", "1"), pod("c", "15")]),
            ],
            vec![vec![Err(Report::new(KubernetesError::WatchExpired {
                message: "too old resource version".to_string(),
            }))]],
        );
        let (mut observer, store, mut rx) = observer(source, 10);
        observer.prime().await.expect("prime");

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { observer.run(token).await }
        });

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let n = rx.recv().await.expect("notification");
            seen.push((n.action, n.subject));
        }
        token.cancel();
        handle.await.expect("join").expect("observer");

        assert_eq!(
            seen,
            vec![
                (Action::Created, "c".to_string()),
                (Action::Deleted, "b".to_string()),
            ]
        );
        assert!(store.get("Pod", "b").is_none());
        assert_eq!(store.len("Pod"), 2);
    }

    #[tokio::test]
    async fn watch_resumes_from_last_seen_version() {
        let source = Arc::new(ScriptedSource::new(
            vec![listing("10", vec![])],
            vec![
                vec![
                    change(ChangeEvent::Added(pod("a", "11"))),
                    Ok(WatchItem::Bookmark("12".to_string())),
                ],
                vec![Err(Report::new(KubernetesError::WatchFailed {
                    message: "connection reset".to_string(),
                }))],
            ],
        ));
        let store = Arc::new(SnapshotStore::new());
        let (tx, _rx) = notification_queue(10);
        let observer = Observer::new(source.clone(), store, tx, Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(10));

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { observer.run(token).await }
        });

        // Initial watch, resumed watch after bookmark, third watch after the failure.
        while source.watched_from.lock().expect("lock").len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        handle.await.expect("join").expect("observer");

        let watched_from = source.watched_from.lock().expect("lock").clone();
        assert_eq!(watched_from[..3].to_vec(), vec![
            "10".to_string(),
            "12".to_string(),
            "12".to_string()
        ]);
    }

    /// Every watch ends at once without yielding anything.
    #[derive(Default)]
    struct ClosingSource {
        watches: AtomicU64,
    }

    impl ChangeSource for ClosingSource {
        fn kind(&self) -> &str {
            "Pod"
        }

        fn scope(&self) -> String {
            "all namespaces".to_string()
        }

        fn list(&self) -> BoxFuture<'_, Result<Listing, Report<KubernetesError>>> {
            Box::pin(async { Ok(listing("1", vec![])) })
        }

        fn watch(
            &self,
            _from_version: String,
        ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>> {
            self.watches.fetch_add(1, Ordering::Relaxed);
            futures::stream::empty().boxed()
        }
    }

    #[tokio::test]
    async fn closing_watch_backs_off_between_attempts() {
        let source = Arc::new(ClosingSource::default());
        let store = Arc::new(SnapshotStore::new());
        let (tx, _rx) = notification_queue(10);
        let observer = Observer::new(source.clone(), store, tx, Duration::from_secs(5))
            .with_retry_delay(Duration::from_millis(50));

        let token = CancellationToken::new();
        let handle = tokio::spawn(observer.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
        handle.await.expect("join").expect("observer");

        let watches = source.watches.load(Ordering::Relaxed);
        assert!(
            (2..=10).contains(&watches),
            "expected a handful of watch attempts, got {watches}"
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let source = ScriptedSource::new(vec![listing("1", vec![pod("a", "1")])], vec![]);
        let (observer, store, _rx) = observer(source, 10);
        let token = CancellationToken::new();
        token.cancel();

        observer.run(token).await.expect("observer");
        assert_eq!(store.len("Pod"), 1);
    }
}

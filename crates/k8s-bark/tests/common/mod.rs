#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_bark::config::NotifierConfig;
use k8s_bark::domain::ChangeEvent;
use k8s_bark::domain::ChangeSource;
use k8s_bark::domain::Listing;
use k8s_bark::domain::ResourceRecord;
use k8s_bark::domain::WatchItem;
use k8s_bark::k8s::KubernetesError;
use k8s_bark::notifier::BarkClient;
use serde_json::json;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

pub const TOKEN: &str = "test-token";

pub type Batch = Vec<Result<WatchItem, Report<KubernetesError>>>;

/// Simulated cluster: serves scripted listings and watch batches, then idles.
pub struct ScriptedSource {
    listings: Mutex<VecDeque<Listing>>,
    batches: Mutex<VecDeque<Batch>>,
}

impl ScriptedSource {
    pub fn new(listings: Vec<Listing>, batches: Vec<Batch>) -> Self {
        Self {
            listings: Mutex::new(listings.into()),
            batches: Mutex::new(batches.into()),
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
        _from_version: String,
    ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>> {
        match self.batches.lock().expect("lock").pop_front() {
            Some(batch) => futures::stream::iter(batch).boxed(),
            None => futures::stream::pending().boxed(),
        }
    }
}

pub fn pod(name: &str, version: &str) -> ResourceRecord {
    ResourceRecord::new("Pod", name, version, json!({}))
}

pub fn listing(version: &str, records: Vec<ResourceRecord>) -> Listing {
    Listing {
        version: version.to_string(),
        records,
    }
}

pub fn change(event: ChangeEvent) -> Result<WatchItem, Report<KubernetesError>> {
    Ok(WatchItem::Change(event))
}

pub fn notifier_config(base: &str) -> NotifierConfig {
    NotifierConfig {
        base_url: Url::parse(base).expect("valid url"),
        token: TOKEN.to_string(),
        request_timeout: Duration::from_secs(2),
        probe_interval: Duration::from_millis(50),
    }
}

pub fn bark_client(base: &str) -> Arc<BarkClient> {
    Arc::new(BarkClient::new(&notifier_config(base)).expect("client"))
}

/// Address where nothing is listening.
pub fn closed_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes this thread's log events into a [`LogCapture`] while the guard lives.
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

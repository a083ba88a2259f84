use core::fmt::Debug;

use error_stack::Report;
use error_stack::ResultExt;
use futures::future::BoxFuture;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use futures::TryStreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::api::ListParams;
use kube::api::WatchEvent;
use kube::api::WatchParams;
use kube::core::ErrorResponse;
use kube::Api;
use kube::Client;
use kube::Resource;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::domain::ChangeEvent;
use crate::domain::ChangeSource;
use crate::domain::Listing;
use crate::domain::ResourceRecord;
use crate::domain::WatchItem;
use crate::infrastructure::k8s::KubernetesError;

/// Server-side watch timeout; must stay below the API server's 295s limit.
const WATCH_TIMEOUT_SECS: u32 = 290;

const HTTP_GONE: u16 = 410;

/// Lists and watches one namespaced resource kind through the Kubernetes API.
pub struct KubeChangeSource<K> {
    api: Api<K>,
    kind: String,
    namespace: Option<String>,
}

impl<K> KubeChangeSource<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    /// Watches `namespace`, or every namespace when `None`.
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        let api = match &namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self {
            api,
            kind: K::kind(&()).to_string(),
            namespace,
        }
    }

    fn to_record(&self, object: K) -> Result<ResourceRecord, Report<KubernetesError>> {
        object_to_record(&self.kind, object)
    }

    fn translate(
        &self,
        item: Result<WatchEvent<K>, kube::Error>,
    ) -> Result<WatchItem, Report<KubernetesError>> {
        match item {
            Ok(WatchEvent::Added(object)) => Ok(WatchItem::Change(ChangeEvent::Added(
                self.to_record(object)?,
            ))),
            Ok(WatchEvent::Modified(object)) => Ok(WatchItem::Change(ChangeEvent::Modified(
                self.to_record(object)?,
            ))),
            Ok(WatchEvent::Deleted(object)) => Ok(WatchItem::Change(ChangeEvent::Deleted(
                self.to_record(object)?,
            ))),
            Ok(WatchEvent::Bookmark(bookmark)) => {
                Ok(WatchItem::Bookmark(bookmark.metadata.resource_version))
            }
            Ok(WatchEvent::Error(response)) => Err(watch_error(&response)),
            Err(kube::Error::Api(response)) => Err(watch_error(&response)),
            Err(e) => Err(Report::new(KubernetesError::WatchFailed {
                message: format!("Watch stream error: {e}"),
            })),
        }
    }
}

impl<K> ChangeSource for KubeChangeSource<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn scope(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("namespace {ns}"),
            None => "all namespaces".to_string(),
        }
    }

    fn list(&self) -> BoxFuture<'_, Result<Listing, Report<KubernetesError>>> {
        Box::pin(async move {
            let list = self.api.list(&ListParams::default()).await.map_err(|e| {
                Report::new(KubernetesError::ListFailed {
                    scope: self.scope(),
                    message: e.to_string(),
                })
            })?;

            let version = list.metadata.resource_version.clone().unwrap_or_default();
            let mut records = Vec::with_capacity(list.items.len());
            for object in list.items {
                match self.to_record(object) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping listed object: {e:?}"),
                }
            }
            Ok(Listing { version, records })
        })
    }

    fn watch(
        &self,
        from_version: String,
    ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>> {
        let api = self.api.clone();
        let params = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);

        stream::once(async move { api.watch(&params, &from_version).await })
            .try_flatten()
            .map(move |item| self.translate(item))
            .boxed()
    }
}

/// Converts a cluster object into a record keyed by `namespace/name`.
pub(crate) fn object_to_record<K>(
    kind: &str,
    object: K,
) -> Result<ResourceRecord, Report<KubernetesError>>
where
    K: Resource + Serialize,
{
    let Some(name) = object.meta().name.clone() else {
        return Err(Report::new(KubernetesError::InvalidObject {
            message: format!("{kind} without a name"),
        }));
    };
    let Some(version) = object.resource_version() else {
        return Err(Report::new(KubernetesError::InvalidObject {
            message: format!("{kind} {name} without a resourceVersion"),
        }));
    };
    let name = match object.namespace() {
        Some(ns) => format!("{ns}/{name}"),
        None => name,
    };
    let payload = serde_json::to_value(&object).change_context(KubernetesError::InvalidObject {
        message: format!("{kind} {name} could not be serialized"),
    })?;

    Ok(ResourceRecord::new(kind, name, version, payload))
}

fn watch_error(response: &ErrorResponse) -> Report<KubernetesError> {
    if response.code == HTTP_GONE {
        Report::new(KubernetesError::WatchExpired {
            message: response.message.clone(),
        })
    } else {
        Report::new(KubernetesError::WatchFailed {
            message: format!("{} ({}): {}", response.reason, response.code, response.message),
        })
    }
}

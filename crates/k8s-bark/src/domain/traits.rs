//! Seams between the pipeline and the cluster API.

use error_stack::Report;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::domain::resource::Listing;
use crate::domain::resource::WatchItem;
use crate::infrastructure::k8s::KubernetesError;

/// Lists and streams changes for one resource kind within one namespace scope.
pub trait ChangeSource: Send + Sync {
    /// Kind of the resources this source produces.
    fn kind(&self) -> &str;

    /// Human-readable description of the watch scope, used in logs.
    fn scope(&self) -> String;

    /// Consistent snapshot of every resource currently in scope.
    fn list(&self) -> BoxFuture<'_, Result<Listing, Report<KubernetesError>>>;

    /// Live subscription starting after `from_version`.
    ///
    /// The stream ends when the server closes the watch; callers resume from the
    /// last version they observed. A version the server no longer remembers is
    /// reported as [`KubernetesError::WatchExpired`].
    fn watch(
        &self,
        from_version: String,
    ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>>;
}

impl<T: ChangeSource + ?Sized> ChangeSource for std::sync::Arc<T> {
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn scope(&self) -> String {
        (**self).scope()
    }

    fn list(&self) -> BoxFuture<'_, Result<Listing, Report<KubernetesError>>> {
        (**self).list()
    }

    fn watch(
        &self,
        from_version: String,
    ) -> BoxStream<'_, Result<WatchItem, Report<KubernetesError>>> {
        (**self).watch(from_version)
    }
}

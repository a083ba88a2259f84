//! Kubernetes integration module.
//!
//! Provides the cluster side of the pipeline: a [`KubeChangeSource`] that lists a
//! resource kind and streams its changes through the Kubernetes watch API.

pub mod change_source;
pub mod types;

pub use change_source::KubeChangeSource;
pub use types::KubernetesError;

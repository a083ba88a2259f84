use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::config::ClusterLocation;
use crate::infrastructure::k8s::KubernetesError;

/// Builds a client for the configured cluster location.
///
/// `in-cluster` uses the service account mounted into the pod. `out-cluster` reads
/// `kubeconfig` when given, otherwise the default kubeconfig resolution
/// (`$KUBECONFIG` or `~/.kube/config`).
pub async fn init_kube_client(
    location: ClusterLocation,
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<KubernetesError>> {
    let config = match (location, kubeconfig) {
        (ClusterLocation::InCluster, _) => {
            Config::incluster().change_context(KubernetesError::ConnectionFailed {
                message: "Failed to load in-cluster service account config".to_string(),
            })?
        }
        (ClusterLocation::OutCluster, Some(kubeconfig_path)) => {
            let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).change_context(
                KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?
        }
        (ClusterLocation::OutCluster, None) => {
            Config::from_kubeconfig(&KubeConfigOptions::default())
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: "Failed to load default kubeconfig".to_string(),
                })?
        }
    };

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client".to_string(),
    })
}

//! Docker implementation of [`ContainerRuntime`] built on bollard.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    NetworkingConfig, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{
    EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding,
    RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::StreamExt;
use futures_util::TryStreamExt;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::errors::{TestEnvError, TestEnvResult};
use crate::runtime::{
    ContainerHandle, ContainerRuntime, LOOPBACK, ManagedResource, NetworkHandle,
};
use crate::spec::{
    ContainerSpec, ImageSource, NetworkSpec, RestartPolicy, LABEL_MANAGED, LABEL_RUN,
    LABEL_SCENARIO,
};

const REMOVAL_POLL_INTERVAL: Duration = Duration::from_millis(100);
const REMOVAL_GRACE: Duration = Duration::from_secs(5);

/// Container runtime backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    stop_timeout: Duration,
}

impl DockerRuntime {
    /// Connect using the local defaults (`DOCKER_HOST` or the platform socket).
    ///
    /// Connecting is lazy; call [`ContainerRuntime::ping`] to find out whether
    /// the daemon is actually reachable.
    pub fn connect(stop_timeout: Duration) -> TestEnvResult<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| TestEnvError::RuntimeUnavailable {
                reason: e.to_string(),
            })?;

        Ok(Self {
            docker,
            stop_timeout,
        })
    }

    async fn pull_image(&self, repository: &str, tag: &str) -> TestEnvResult<String> {
        let reference = format!("{}:{}", repository, tag);

        if self.docker.inspect_image(&reference).await.is_ok() {
            debug!(image = %reference, "Image exists locally");
            return Ok(reference);
        }

        info!(image = %reference, "Pulling image");

        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        trace!(image = %reference, status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    return Err(TestEnvError::ImageUnavailable {
                        image: reference,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(image = %reference, "✓ Image pulled");
        Ok(reference)
    }

    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &str,
        tag: &str,
    ) -> TestEnvResult<String> {
        info!(
            context = %context_dir.display(),
            dockerfile = dockerfile,
            image = tag,
            "Building image"
        );

        let context = archive_build_context(context_dir.to_path_buf()).await?;

        let options = BuildImageOptions {
            dockerfile,
            t: tag,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(context));
        while let Some(message) = stream.next().await {
            let build_info = message.map_err(|e| TestEnvError::ImageBuildFailed {
                context: context_dir.display().to_string(),
                reason: e.to_string(),
            })?;
            if let Some(line) = build_info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!(image = tag, "{}", line);
                }
            }
            if let Some(error) = build_info.error {
                return Err(TestEnvError::ImageBuildFailed {
                    context: context_dir.display().to_string(),
                    reason: error,
                });
            }
        }

        info!(image = tag, "✓ Image built");
        Ok(tag.to_string())
    }

    /// Remove a container that never made it to a handle.
    /// Poll until the daemon reports the container gone.
    async fn wait_for_removal(&self, container: &ContainerHandle) -> TestEnvResult<()> {
        let deadline = tokio::time::Instant::now() + self.stop_timeout + REMOVAL_GRACE;

        loop {
            match self
                .docker
                .inspect_container(&container.id, None::<InspectContainerOptions>)
                .await
            {
                Err(e) if is_not_found(&e) => return Ok(()),
                Err(e) if tokio::time::Instant::now() >= deadline => {
                    return Err(TestEnvError::ContainerRemovalFailed {
                        container: container.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Ok(_) if tokio::time::Instant::now() >= deadline => {
                    return Err(TestEnvError::ContainerRemovalFailed {
                        container: container.name.clone(),
                        reason: "container still present after removal started".to_string(),
                    });
                }
                _ => tokio::time::sleep(REMOVAL_POLL_INTERVAL).await,
            }
        }
    }

    async fn discard_container(&self, id: &str) {
        if let Err(e) = self
            .docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(container = id, error = %e, "Failed to discard container");
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> TestEnvResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| TestEnvError::RuntimeUnavailable {
                reason: e.to_string(),
            })
    }

    async fn ensure_image(&self, image: &ImageSource) -> TestEnvResult<String> {
        match image {
            ImageSource::Registry { repository, tag } => self.pull_image(repository, tag).await,
            ImageSource::Build {
                context_dir,
                dockerfile,
                tag,
            } => self.build_image(context_dir, dockerfile, tag).await,
        }
    }

    async fn start_container(
        &self,
        spec: &ContainerSpec,
        image: &str,
    ) -> TestEnvResult<ContainerHandle> {
        let start_failed = |reason: String| TestEnvError::ContainerStartFailed {
            container: spec.name.clone(),
            reason,
        };

        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .exposed_ports
            .iter()
            .map(|port| (format!("{}/tcp", port), HashMap::new()))
            .collect();

        // Ephemeral host ports keep parallel runs from colliding.
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .exposed_ports
            .iter()
            .map(|port| {
                (
                    format!("{}/tcp", port),
                    Some(vec![PortBinding {
                        host_ip: Some(LOOPBACK.to_string()),
                        host_port: None,
                    }]),
                )
            })
            .collect();

        let mut mounts = Vec::with_capacity(spec.mounts.len());
        for mount in &spec.mounts {
            let source = mount.source.canonicalize().map_err(|e| {
                start_failed(format!(
                    "bind mount source '{}' unavailable: {}",
                    mount.source.display(),
                    e
                ))
            })?;
            mounts.push(Mount {
                target: Some(mount.target.clone()),
                source: Some(source.display().to_string()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(mount.read_only),
                ..Default::default()
            });
        }

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            auto_remove: Some(spec.auto_remove),
            restart_policy: Some(docker_restart_policy(spec.restart_policy)),
            network_mode: spec.network.as_ref().map(|n| n.network.clone()),
            ..Default::default()
        };

        let networking_config = spec.network.as_ref().map(|attachment| NetworkingConfig {
            endpoints_config: HashMap::from([(
                attachment.network.clone(),
                EndpointSettings {
                    aliases: Some(attachment.aliases.clone()),
                    ..Default::default()
                },
            )]),
        });

        let container_config = Config {
            image: Some(image.to_string()),
            cmd: if spec.cmd.is_empty() {
                None
            } else {
                Some(spec.cmd.clone())
            },
            env: Some(spec.env_list()),
            exposed_ports: Some(exposed_ports),
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(host_config),
            networking_config,
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.as_str(),
                    ..Default::default()
                }),
                container_config,
            )
            .await
            .map_err(|e| start_failed(e.to_string()))?;
        let container_id = created.id;

        if let Err(e) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            self.discard_container(&container_id).await;
            return Err(start_failed(e.to_string()));
        }

        let details = match self
            .docker
            .inspect_container(&container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => details,
            Err(e) => {
                self.discard_container(&container_id).await;
                return Err(start_failed(format!("inspect failed: {}", e)));
            }
        };

        let port_map = details
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();
        let ports = resolve_host_ports(&port_map);

        if let Some(missing) = spec.exposed_ports.iter().find(|p| !ports.contains_key(p)) {
            self.discard_container(&container_id).await;
            return Err(TestEnvError::PortNotMapped {
                container: spec.name.clone(),
                port: *missing,
            });
        }

        info!(
            container = %spec.name,
            id = %container_id,
            ports = ?ports,
            "Container started"
        );

        Ok(ContainerHandle {
            id: container_id,
            name: spec.name.clone(),
            ports,
            network: spec.network.as_ref().map(|n| n.network.clone()),
        })
    }

    async fn purge_container(&self, container: &ContainerHandle) -> TestEnvResult<()> {
        debug!(container = %container.name, "Stopping container");

        if let Err(e) = self
            .docker
            .stop_container(
                &container.id,
                Some(StopContainerOptions {
                    t: self.stop_timeout.as_secs() as i64,
                }),
            )
            .await
        {
            // 304: already stopped, 404: auto-removed
            debug!(container = %container.name, error = %e, "Stop skipped");
        }

        match self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {
                debug!(container = %container.name, "Container already removed");
            }
            Err(e) if is_removal_in_progress(&e) => {
                // auto_remove containers are deleted by the daemon once stopped
                debug!(container = %container.name, "Removal already in progress");
                self.wait_for_removal(container).await?;
            }
            Err(e) => {
                return Err(TestEnvError::ContainerRemovalFailed {
                    container: container.name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        info!(container = %container.name, "✓ Container purged");
        Ok(())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> TestEnvResult<NetworkHandle> {
        let creation_failed = |reason: String| TestEnvError::NetworkCreationFailed {
            network: spec.name.clone(),
            reason,
        };

        let labels: HashMap<&str, &str> = spec
            .labels
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        self.docker
            .create_network(CreateNetworkOptions {
                name: spec.name.as_str(),
                check_duplicate: true,
                driver: "bridge",
                labels,
                ..Default::default()
            })
            .await
            .map_err(|e| creation_failed(e.to_string()))?;

        let inspected = self
            .docker
            .inspect_network(&spec.name, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|e| creation_failed(format!("inspect failed: {}", e)))?;

        let id = inspected.id.unwrap_or_else(|| spec.name.clone());
        info!(network = %spec.name, id = %id, "Network created");

        Ok(NetworkHandle {
            id,
            name: spec.name.clone(),
        })
    }

    async fn remove_network(&self, network: &NetworkHandle) -> TestEnvResult<()> {
        let inspected = match self
            .docker
            .inspect_network(&network.id, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(inspected) => inspected,
            Err(e) if is_not_found(&e) => {
                debug!(network = %network.name, "Network already removed");
                return Ok(());
            }
            Err(e) => {
                return Err(TestEnvError::NetworkRemovalFailed {
                    network: network.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let attached: Vec<String> = inspected
            .containers
            .unwrap_or_default()
            .into_iter()
            .map(|(id, container)| container.name.unwrap_or(id))
            .collect();
        if !attached.is_empty() {
            return Err(TestEnvError::NetworkInUse {
                network: network.name.clone(),
                attached,
            });
        }

        self.docker
            .remove_network(&network.id)
            .await
            .map_err(|e| TestEnvError::NetworkRemovalFailed {
                network: network.name.clone(),
                reason: e.to_string(),
            })?;

        info!(network = %network.name, "✓ Network removed");
        Ok(())
    }

    async fn list_managed_containers(
        &self,
        run_id: Option<&str>,
    ) -> TestEnvResult<Vec<ManagedResource>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters: label_filters(run_id),
                ..Default::default()
            }))
            .await
            .map_err(|e| TestEnvError::RuntimeUnavailable {
                reason: e.to_string(),
            })?;

        Ok(containers
            .into_iter()
            .filter_map(|container| {
                let id = container.id?;
                let name = container
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| name.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                let labels = container.labels.unwrap_or_default();
                Some(ManagedResource {
                    id,
                    name,
                    created_at: container
                        .created
                        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                    run_id: labels.get(LABEL_RUN).cloned(),
                    scenario: labels.get(LABEL_SCENARIO).cloned(),
                })
            })
            .collect())
    }

    async fn list_managed_networks(
        &self,
        run_id: Option<&str>,
    ) -> TestEnvResult<Vec<ManagedResource>> {
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions::<String> {
                filters: label_filters(run_id),
            }))
            .await
            .map_err(|e| TestEnvError::RuntimeUnavailable {
                reason: e.to_string(),
            })?;

        Ok(networks
            .into_iter()
            .filter_map(|network| {
                let id = network.id?;
                let labels = network.labels.unwrap_or_default();
                Some(ManagedResource {
                    name: network.name.unwrap_or_else(|| id.clone()),
                    id,
                    created_at: network
                        .created
                        .as_deref()
                        .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
                        .map(|created| created.with_timezone(&Utc)),
                    run_id: labels.get(LABEL_RUN).cloned(),
                    scenario: labels.get(LABEL_SCENARIO).cloned(),
                })
            })
            .collect())
    }

    async fn container_logs(
        &self,
        container: &ContainerHandle,
        tail: usize,
    ) -> TestEnvResult<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut logs = self.docker.logs(&container.id, Some(options));
        let mut output = String::new();

        while let Ok(Some(line)) = logs.try_next().await {
            output.push_str(&line.to_string());
        }

        Ok(output)
    }
}

fn docker_restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::Never => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::OnFailure { max_retries } => {
            (RestartPolicyNameEnum::ON_FAILURE, Some(i64::from(max_retries)))
        }
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
    };

    DockerRestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

/// Map `"{port}/tcp"` keys of an inspected port map to the first bound host port.
fn resolve_host_ports(port_map: &HashMap<String, Option<Vec<PortBinding>>>) -> BTreeMap<u16, u16> {
    port_map
        .iter()
        .filter_map(|(key, bindings)| {
            let container_port = key.strip_suffix("/tcp")?.parse::<u16>().ok()?;
            let host_port = bindings
                .as_ref()?
                .iter()
                .filter_map(|binding| binding.host_port.as_deref()?.parse::<u16>().ok())
                .find(|port| *port != 0)?;
            Some((container_port, host_port))
        })
        .collect()
}

fn label_filters(run_id: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut labels = vec![format!("{}=true", LABEL_MANAGED)];
    if let Some(run_id) = run_id {
        labels.push(format!("{}={}", LABEL_RUN, run_id));
    }
    HashMap::from([("label".to_string(), labels)])
}

fn is_removal_in_progress(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } if message.contains("already in progress")
    )
}

fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Tar a build context directory for the image build endpoint.
async fn archive_build_context(context_dir: PathBuf) -> TestEnvResult<Bytes> {
    let display = context_dir.display().to_string();
    let build_failed = |reason: String| TestEnvError::ImageBuildFailed {
        context: display.clone(),
        reason,
    };

    if !context_dir.is_dir() {
        return Err(build_failed("build context directory not found".to_string()));
    }

    let archived = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(true);
        builder.append_dir_all(".", &context_dir)?;
        builder.into_inner()
    })
    .await
    .map_err(|e| build_failed(format!("archiving task failed: {}", e)))?
    .map_err(|e| build_failed(format!("failed to archive build context: {}", e)))?;

    Ok(Bytes::from(archived))
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;

//! Declarative container and network specifications.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Label marking every resource created by the harness.
pub const LABEL_MANAGED: &str = "test_env.managed";

/// Label carrying the id of the pool that created a resource.
pub const LABEL_RUN: &str = "test_env.run";

/// Label carrying the scenario a resource belongs to.
pub const LABEL_SCENARIO: &str = "test_env.scenario";

/// Where a container image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A published image, pulled unless already present locally.
    Registry { repository: String, tag: String },

    /// An image built from a local directory before the container runs.
    Build {
        context_dir: PathBuf,
        dockerfile: String,
        tag: String,
    },
}

impl ImageSource {
    /// Image reference the container is created from.
    pub fn reference(&self) -> String {
        match self {
            ImageSource::Registry { repository, tag } => format!("{}:{}", repository, tag),
            ImageSource::Build { tag, .. } => tag.clone(),
        }
    }
}

/// Container restart behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    #[default]
    Never,
    OnFailure {
        max_retries: u32,
    },
    Always,
    UnlessStopped,
}

/// Host directory bound into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Membership of a container in a user-defined network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Name of the network to join
    pub network: String,

    /// Names other containers on the network can use to reach this one
    pub aliases: Vec<String>,
}

/// Everything needed to run one container.
///
/// `name` is the service's logical name. The environment derives the unique
/// container name from it and registers it as a network alias, so peers on
/// the same network address the service by its logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageSource,
    pub cmd: Vec<String>,
    pub env: Vec<(String, String)>,
    pub exposed_ports: Vec<u16>,
    pub mounts: Vec<BindMount>,
    pub restart_policy: RestartPolicy,
    pub auto_remove: bool,
    pub network: Option<NetworkAttachment>,
    pub labels: BTreeMap<String, String>,
}

impl ContainerSpec {
    fn new(name: impl Into<String>, image: ImageSource) -> Self {
        Self {
            name: name.into(),
            image,
            cmd: Vec::new(),
            env: Vec::new(),
            exposed_ports: Vec::new(),
            mounts: Vec::new(),
            restart_policy: RestartPolicy::Never,
            auto_remove: false,
            network: None,
            labels: BTreeMap::new(),
        }
    }

    /// Container running a published image.
    pub fn from_registry(
        name: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ImageSource::Registry {
                repository: repository.into(),
                tag: tag.into(),
            },
        )
    }

    /// Container running an image built from `context_dir`.
    pub fn from_build(
        name: impl Into<String>,
        context_dir: impl Into<PathBuf>,
        dockerfile: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ImageSource::Build {
                context_dir: context_dir.into(),
                dockerfile: dockerfile.into(),
                tag: tag.into(),
            },
        )
    }

    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        if !self.exposed_ports.contains(&port) {
            self.exposed_ports.push(port);
        }
        self
    }

    pub fn with_bind_mount(mut self, source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.mounts.push(BindMount {
            source: source.into(),
            target: target.into(),
            read_only: false,
        });
        self
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    /// Join `network`, reachable there under the logical name plus `aliases`.
    pub fn on_network<I, S>(mut self, network: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all_aliases = vec![self.name.clone()];
        for alias in aliases {
            let alias = alias.into();
            if !all_aliases.contains(&alias) {
                all_aliases.push(alias);
            }
        }
        self.network = Some(NetworkAttachment {
            network: network.into(),
            aliases: all_aliases,
        });
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Environment in Docker's `KEY=value` form.
    pub fn env_list(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }
}

/// A user-defined network to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;

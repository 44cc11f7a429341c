//! Container lifecycle orchestration for integration tests.
//!
//! A [`ContainerPool`] hands out one [`TestEnvironment`] per scenario. The
//! environment provisions containers and networks through a
//! [`ContainerRuntime`], gates on service readiness with bounded
//! exponential backoff and releases everything in reverse order of
//! acquisition when the scenario ends:
//!
//! ```no_run
//! use std::sync::Arc;
//! use test_env::{ContainerPool, ContainerSpec, EnvironmentConfig, TestEnvError};
//!
//! # async fn example() -> Result<(), TestEnvError> {
//! let pool = ContainerPool::connect(EnvironmentConfig::from_env()?).await?;
//! let env = pool.environment("object-storage");
//!
//! env.run(|env| {
//!     Box::pin(async move {
//!         let gcs = env
//!             .provision(
//!                 ContainerSpec::from_registry("gcs", "fsouza/fake-gcs-server", "latest")
//!                     .with_exposed_port(4443),
//!             )
//!             .await?;
//!         let endpoint = gcs.host_endpoint(4443)?;
//!         env.await_ready("gcs", &gcs, || async { Ok::<_, TestEnvError>(endpoint.clone()) })
//!             .await?;
//!         env.begin_execution()?;
//!         Ok::<_, TestEnvError>(())
//!     })
//! })
//! .await
//! # }
//! ```

pub mod config;
pub mod docker;
pub mod environment;
pub mod errors;
pub mod fake;
pub mod logging;
pub mod pool;
pub mod readiness;
pub mod runtime;
pub mod spec;
pub mod teardown;

pub use config::EnvironmentConfig;
pub use docker::DockerRuntime;
pub use environment::{ScenarioPhase, TestEnvironment};
pub use errors::{ErrorCategory, TestEnvError, TestEnvResult};
pub use logging::{init_logging, init_test_logging};
pub use pool::ContainerPool;
pub use readiness::{wait_until_ready, BackoffPolicy};
pub use runtime::{ContainerHandle, ContainerRuntime, ManagedResource, NetworkHandle, LOOPBACK};
pub use spec::{
    BindMount, ContainerSpec, ImageSource, NetworkAttachment, NetworkSpec, RestartPolicy,
    LABEL_MANAGED, LABEL_RUN, LABEL_SCENARIO,
};
pub use teardown::{
    ReleaseKind, ReleaseOutcome, ReleaseRecord, ReleaseStack, ServiceClient, TeardownReport,
};

//! Optional Redis for tests that need real WATCH/MULTI semantics.
//!
//! Uses `WORKERS_TEST_REDIS_URL` when set, otherwise starts a container
//! only when `WORKERS_TEST_DOCKER=1`. Tests skip when neither is available.

use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};

/// A reachable Redis, possibly backed by a container.
pub struct RedisTarget {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
}

impl RedisTarget {
    /// Returns `None` when no Redis is configured for tests.
    pub async fn start() -> Option<Self> {
        if let Some(url) = std::env::var("WORKERS_TEST_REDIS_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Some(Self {
                container: None,
                url,
            });
        }

        if std::env::var("WORKERS_TEST_DOCKER").as_deref() != Ok("1") {
            return None;
        }

        let (container, url) = start_redis().await;
        Some(Self {
            container: Some(container),
            url,
        })
    }
}

/// Start a Redis container, return it and its URL.
pub async fn start_redis() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("redis", "7.2-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    let container = image.start().await.expect("Failed to start Redis");
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let url = format!("redis://127.0.0.1:{}/0", port);

    (container, url)
}

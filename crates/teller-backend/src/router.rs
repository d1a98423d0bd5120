//! Backend selection, failover, and health accounting.
//!
//! Selection order for each request: the session's explicit preference
//! if it names a registered backend, then the configured default, then
//! remaining backends in priority order with the ones marked healthy
//! ahead of the rest. A failed attempt fails over to the next candidate
//! exactly once; a request never costs more than two backend calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use teller_core::config::TellerConfig;
use teller_core::Result;

use crate::backend::{HistoryTurn, LlmBackend};
use crate::descriptor::{BackendDescriptor, BackendKind};
use crate::error::BackendError;
use crate::ollama::OllamaBackend;
use crate::openai::OpenAiBackend;

/// Reply attributed to the backend that produced it.
#[derive(Debug, Clone)]
pub struct RoutedReply {
    pub text: String,
    pub backend: String,
    pub model: String,
    pub latency_ms: u64,
}

struct RegisteredBackend {
    descriptor: BackendDescriptor,
    backend: Arc<dyn LlmBackend>,
    healthy: AtomicBool,
}

/// Routes each query to one backend behind a uniform contract.
pub struct ModelRouter {
    backends: Vec<RegisteredBackend>,
    default_backend: Option<String>,
}

impl ModelRouter {
    pub fn new(default_backend: Option<String>) -> Self {
        Self {
            backends: Vec::new(),
            default_backend,
        }
    }

    /// Build a router with one adapter per configured backend. Backends
    /// with an unknown kind or a missing API key are skipped with a
    /// warning rather than failing startup.
    pub fn from_config(config: &TellerConfig) -> Result<Self> {
        let mut router = Self::new(config.router.default_backend.clone());
        for backend_config in &config.backends {
            let descriptor = match BackendDescriptor::from_config(backend_config) {
                Some(descriptor) => descriptor,
                None => {
                    warn!(
                        name = %backend_config.name,
                        kind = %backend_config.kind,
                        "skipping backend with unknown kind"
                    );
                    continue;
                }
            };
            match descriptor.kind {
                BackendKind::OpenAi => {
                    let env_name = match backend_config.api_key_env.as_deref() {
                        Some(env_name) => env_name,
                        None => {
                            warn!(name = %descriptor.name, "skipping backend without api_key_env");
                            continue;
                        }
                    };
                    let api_key = match std::env::var(env_name) {
                        Ok(api_key) => api_key,
                        Err(_) => {
                            warn!(
                                name = %descriptor.name,
                                env = %env_name,
                                "skipping backend, API key not set"
                            );
                            continue;
                        }
                    };
                    let backend = OpenAiBackend::new(descriptor.clone(), api_key)?;
                    router.register(descriptor, Arc::new(backend));
                }
                BackendKind::Ollama => {
                    let backend = OllamaBackend::new(descriptor.clone())?;
                    router.register(descriptor, Arc::new(backend));
                }
            }
        }
        if router.backends.is_empty() {
            warn!("no usable backends configured, every request will fail");
        }
        Ok(router)
    }

    /// Add a backend. Registration order does not matter; candidates are
    /// kept sorted by priority.
    pub fn register(&mut self, descriptor: BackendDescriptor, backend: Arc<dyn LlmBackend>) {
        self.backends.push(RegisteredBackend {
            descriptor,
            backend,
            healthy: AtomicBool::new(true),
        });
        self.backends.sort_by_key(|entry| entry.descriptor.priority);
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|entry| entry.descriptor.name.clone())
            .collect()
    }

    /// Health flag from the backend's most recent attempt, or `None` for
    /// an unknown name.
    pub fn is_healthy(&self, name: &str) -> Option<bool> {
        self.index_of(name)
            .map(|index| self.backends[index].healthy.load(Ordering::Relaxed))
    }

    /// Route with one failover attempt.
    pub async fn answer(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        preference: Option<&str>,
    ) -> std::result::Result<RoutedReply, BackendError> {
        self.route(prompt, history, preference, None, 2).await
    }

    /// Route a single attempt with a named backend excluded. Used to
    /// retry an empty reply on an alternate backend without asking the
    /// same one twice.
    pub async fn answer_excluding(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        preference: Option<&str>,
        exclude: &str,
    ) -> std::result::Result<RoutedReply, BackendError> {
        self.route(prompt, history, preference, Some(exclude), 1)
            .await
    }

    async fn route(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        preference: Option<&str>,
        exclude: Option<&str>,
        max_attempts: usize,
    ) -> std::result::Result<RoutedReply, BackendError> {
        let mut attempts = 0;
        for index in self.selection_order(preference) {
            if attempts >= max_attempts {
                break;
            }
            let entry = &self.backends[index];
            if exclude == Some(entry.descriptor.name.as_str()) {
                continue;
            }
            attempts += 1;
            match self.attempt(index, prompt, history).await {
                Ok(reply) => return Ok(reply),
                // Logged in attempt; move on to the next candidate.
                Err(_) => continue,
            }
        }
        Err(BackendError::AllBackendsFailed)
    }

    /// One bounded backend call, recording the outcome in the health
    /// flag. The timeout stops the wait; the backend itself is not told.
    async fn attempt(
        &self,
        index: usize,
        prompt: &str,
        history: &[HistoryTurn],
    ) -> std::result::Result<RoutedReply, BackendError> {
        let entry = &self.backends[index];
        let name = entry.descriptor.name.clone();
        debug!(backend = %name, "invoking backend");

        let outcome =
            match tokio::time::timeout(entry.descriptor.timeout, entry.backend.invoke(prompt, history))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout {
                    backend: name.clone(),
                    seconds: entry.descriptor.timeout.as_secs(),
                }),
            };

        match outcome {
            Ok(reply) => {
                entry.healthy.store(true, Ordering::Relaxed);
                debug!(backend = %name, latency_ms = reply.latency_ms, "backend answered");
                Ok(RoutedReply {
                    text: reply.text,
                    backend: name,
                    model: reply.model,
                    latency_ms: reply.latency_ms,
                })
            }
            Err(err) => {
                entry.healthy.store(false, Ordering::Relaxed);
                warn!(backend = %name, error = %err, "backend attempt failed");
                Err(err)
            }
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.backends
            .iter()
            .position(|entry| entry.descriptor.name == name)
    }

    /// Candidate indices in selection order, deduplicated. Backends
    /// marked unhealthy still appear at the end so a recovered backend
    /// gets retried when nothing else is left.
    fn selection_order(&self, preference: Option<&str>) -> Vec<usize> {
        fn push_unique(order: &mut Vec<usize>, index: usize) {
            if !order.contains(&index) {
                order.push(index);
            }
        }

        let mut order = Vec::with_capacity(self.backends.len());
        if let Some(name) = preference {
            if let Some(index) = self.index_of(name) {
                push_unique(&mut order, index);
            }
        }
        if let Some(name) = self.default_backend.as_deref() {
            if let Some(index) = self.index_of(name) {
                push_unique(&mut order, index);
            }
        }
        for (index, entry) in self.backends.iter().enumerate() {
            if entry.healthy.load(Ordering::Relaxed) {
                push_unique(&mut order, index);
            }
        }
        for index in 0..self.backends.len() {
            push_unique(&mut order, index);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use std::time::Duration;
    use teller_core::config::BackendConfig;

    fn make_descriptor(name: &str, priority: u32) -> BackendDescriptor {
        let config = BackendConfig {
            name: name.to_string(),
            priority,
            timeout_secs: 5,
            ..BackendConfig::default()
        };
        BackendDescriptor::from_config(&config).unwrap()
    }

    fn make_router(default: Option<&str>, names: &[(&str, u32)]) -> (ModelRouter, Vec<Arc<MockBackend>>) {
        let mut router = ModelRouter::new(default.map(|s| s.to_string()));
        let mut mocks = Vec::new();
        for (name, priority) in names {
            let mock = Arc::new(MockBackend::new(name));
            router.register(make_descriptor(name, *priority), mock.clone());
            mocks.push(mock);
        }
        (router, mocks)
    }

    // -- Selection --

    #[tokio::test]
    async fn test_default_backend_answers() {
        let (router, _mocks) =
            make_router(Some("secondary"), &[("primary", 0), ("secondary", 1)]);
        let reply = router.answer("hello", &[], None).await.unwrap();
        assert_eq!(reply.backend, "secondary");
    }

    #[tokio::test]
    async fn test_preference_overrides_default() {
        let (router, _mocks) =
            make_router(Some("primary"), &[("primary", 0), ("secondary", 1)]);
        let reply = router.answer("hello", &[], Some("secondary")).await.unwrap();
        assert_eq!(reply.backend, "secondary");
    }

    #[tokio::test]
    async fn test_unknown_preference_falls_back() {
        let (router, _mocks) = make_router(None, &[("primary", 0), ("secondary", 1)]);
        let reply = router.answer("hello", &[], Some("missing")).await.unwrap();
        assert_eq!(reply.backend, "primary");
    }

    #[tokio::test]
    async fn test_priority_order_without_default() {
        let (router, _mocks) = make_router(None, &[("slow", 7), ("fast", 2)]);
        let reply = router.answer("hello", &[], None).await.unwrap();
        assert_eq!(reply.backend, "fast");
    }

    // -- Failover --

    #[tokio::test]
    async fn test_failover_attributes_secondary() {
        let (router, mocks) = make_router(Some("primary"), &[("primary", 0), ("secondary", 1)]);
        mocks[0].push_failure(BackendError::Unavailable("primary".to_string()));
        let reply = router.answer("hello", &[], None).await.unwrap();
        assert_eq!(reply.backend, "secondary");
        assert_eq!(router.is_healthy("primary"), Some(false));
        assert_eq!(router.is_healthy("secondary"), Some(true));
    }

    #[tokio::test]
    async fn test_all_backends_failing_surfaces_all_failed() {
        let (router, mocks) = make_router(Some("primary"), &[("primary", 0), ("secondary", 1)]);
        mocks[0].push_failure(BackendError::Unavailable("primary".to_string()));
        mocks[1].push_failure(BackendError::Unavailable("secondary".to_string()));
        let err = router.answer("hello", &[], None).await.unwrap_err();
        assert_eq!(err, BackendError::AllBackendsFailed);
    }

    #[tokio::test]
    async fn test_never_more_than_two_attempts() {
        let (router, mocks) = make_router(None, &[("a", 0), ("b", 1), ("c", 2)]);
        mocks[0].push_failure(BackendError::Unavailable("a".to_string()));
        mocks[1].push_failure(BackendError::Unavailable("b".to_string()));
        let err = router.answer("hello", &[], None).await.unwrap_err();
        assert_eq!(err, BackendError::AllBackendsFailed);
        assert_eq!(mocks[0].call_count(), 1);
        assert_eq!(mocks[1].call_count(), 1);
        assert_eq!(mocks[2].call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_router_fails() {
        let router = ModelRouter::new(None);
        let err = router.answer("hello", &[], None).await.unwrap_err();
        assert_eq!(err, BackendError::AllBackendsFailed);
    }

    // -- Health --

    #[tokio::test]
    async fn test_unhealthy_backend_deprioritized() {
        let (router, mocks) = make_router(None, &[("primary", 0), ("secondary", 1)]);
        mocks[0].push_failure(BackendError::Unavailable("primary".to_string()));
        router.answer("warmup", &[], None).await.unwrap();
        assert_eq!(router.is_healthy("primary"), Some(false));

        // With primary marked down, the next request goes straight to the
        // secondary without touching primary.
        let before = mocks[0].call_count();
        let reply = router.answer("hello", &[], None).await.unwrap();
        assert_eq!(reply.backend, "secondary");
        assert_eq!(mocks[0].call_count(), before);
    }

    #[tokio::test]
    async fn test_failed_backend_recovers_on_success() {
        let (router, mocks) = make_router(None, &[("primary", 0), ("secondary", 1)]);
        mocks[0].push_failure(BackendError::Unavailable("primary".to_string()));
        router.answer("warmup", &[], None).await.unwrap();
        assert_eq!(router.is_healthy("primary"), Some(false));

        // An explicit preference still reaches the marked-down backend.
        let reply = router.answer("hello", &[], Some("primary")).await.unwrap();
        assert_eq!(reply.backend, "primary");
        assert_eq!(router.is_healthy("primary"), Some(true));
    }

    // -- Timeouts --

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_backend_fails_over() {
        let mut router = ModelRouter::new(None);
        let slow = Arc::new(MockBackend::new("slow").with_delay(Duration::from_secs(60)));
        let fast = Arc::new(MockBackend::new("fast"));
        router.register(make_descriptor("slow", 0), slow.clone());
        router.register(make_descriptor("fast", 1), fast.clone());

        let reply = router.answer("hello", &[], None).await.unwrap();
        assert_eq!(reply.backend, "fast");
        assert_eq!(router.is_healthy("slow"), Some(false));
        // The slow backend did receive the request before the wait gave up.
        assert_eq!(slow.call_count(), 1);
    }

    // -- Exclusion --

    #[tokio::test]
    async fn test_answer_excluding_skips_named_backend() {
        let (router, _mocks) = make_router(Some("primary"), &[("primary", 0), ("secondary", 1)]);
        let reply = router
            .answer_excluding("hello", &[], None, "primary")
            .await
            .unwrap();
        assert_eq!(reply.backend, "secondary");
    }

    #[tokio::test]
    async fn test_excluding_only_backend_fails() {
        let (router, _mocks) = make_router(None, &[("primary", 0)]);
        let err = router
            .answer_excluding("hello", &[], None, "primary")
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::AllBackendsFailed);
    }

    #[tokio::test]
    async fn test_answer_excluding_makes_single_attempt() {
        let (router, mocks) = make_router(None, &[("a", 0), ("b", 1), ("c", 2)]);
        mocks[1].push_failure(BackendError::Unavailable("b".to_string()));
        let err = router
            .answer_excluding("hello", &[], None, "a")
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::AllBackendsFailed);
        assert_eq!(mocks[2].call_count(), 0);
    }

    // -- Registration --

    #[test]
    fn test_registration_sorts_by_priority() {
        let (router, _mocks) = make_router(None, &[("low", 9), ("high", 1), ("mid", 5)]);
        assert_eq!(router.backend_names(), vec!["high", "mid", "low"]);
        assert_eq!(router.backend_count(), 3);
    }
}

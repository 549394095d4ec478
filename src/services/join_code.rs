use rand::Rng;
use tracing::{debug, warn};

use crate::{config::JoinCodeConfig, dao::session_store::SessionStore, error::ServiceError};

/// Reserve a free join code for `session_id`.
///
/// Every candidate is claimed with the store's unique-key insert; a collision simply moves on
/// to the next candidate. Random probes come first, then a linear sweep of the whole range from
/// a random offset, so the allocator either finds a free code or proves the range is full.
pub async fn allocate(
    store: &dyn SessionStore,
    config: &JoinCodeConfig,
    session_id: &str,
) -> Result<String, ServiceError> {
    let capacity = config.capacity();
    let (probes, offset) = {
        let mut rng = rand::rng();
        let probes: Vec<u32> = (0..config.random_attempts)
            .map(|_| rng.random_range(config.min..=config.max))
            .collect();
        (probes, rng.random_range(0..capacity))
    };

    let sweep = (0..capacity).map(|step| config.min + (offset + step) % capacity);
    let mut attempts = 0u32;

    for candidate in probes.into_iter().chain(sweep) {
        attempts += 1;
        let code = config.format(candidate);
        if store.reserve_join_code(&code, session_id).await? {
            debug!(session_id, join_code = %code, attempts, "join code reserved");
            return Ok(code);
        }
    }

    warn!(session_id, attempts, "join code range exhausted");
    Err(ServiceError::AllocationExhausted { attempts })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::dao::session_store::memory::InMemorySessionStore;

    fn small_range() -> JoinCodeConfig {
        JoinCodeConfig {
            min: 1000,
            max: 1009,
            random_attempts: 4,
        }
    }

    #[tokio::test]
    async fn codes_are_distinct_until_exhaustion() {
        let store = InMemorySessionStore::new();
        let config = small_range();
        let mut seen = HashSet::new();

        for i in 0..10 {
            let code = allocate(&store, &config, &format!("quiz-{i}")).await.unwrap();
            assert_eq!(code.len(), 4);
            assert!(seen.insert(code));
        }

        let err = allocate(&store, &config, "quiz-extra").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::AllocationExhausted { attempts: 14 }
        ));
    }

    #[tokio::test]
    async fn released_codes_can_be_reused() {
        let store = InMemorySessionStore::new();
        let config = JoinCodeConfig {
            min: 1000,
            max: 1000,
            random_attempts: 1,
        };

        let code = allocate(&store, &config, "a").await.unwrap();
        assert!(allocate(&store, &config, "b").await.is_err());

        store.release_join_code(&code, "a").await.unwrap();
        assert_eq!(allocate(&store, &config, "b").await.unwrap(), code);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_never_share_a_code() {
        let store = Arc::new(InMemorySessionStore::new());
        let config = JoinCodeConfig::default();

        let handles: Vec<_> = (0..1000)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    allocate(store.as_ref(), &config, &format!("quiz-{i}")).await
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let code = handle.await.unwrap().unwrap();
            assert!(seen.insert(code), "code handed out twice");
        }
        assert_eq!(seen.len(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_exhaust_instead_of_hanging() {
        let store = Arc::new(InMemorySessionStore::new());
        let config = JoinCodeConfig {
            min: 100_000,
            max: 100_049,
            random_attempts: 8,
        };

        let handles: Vec<_> = (0..60)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    allocate(store.as_ref(), &config, &format!("quiz-{i}")).await
                })
            })
            .collect();

        let mut granted = HashSet::new();
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(code) => assert!(granted.insert(code)),
                Err(ServiceError::AllocationExhausted { .. }) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(granted.len(), 50);
        assert_eq!(exhausted, 10);
    }
}

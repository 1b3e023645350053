//! Integration tests for unit-of-work isolation.
//!
//! Tests that request-scoped context never leaks between units of work:
//! - Concurrent async units of work on a multi-threaded runtime
//! - Thread-bound units of work delimited by `RequestStore::begin`
//! - Guards held across `.await` and restored on cancellation
//! - Snapshots handed to spawned tasks
//! - Async overrides and units of work on runtime threads without a scope

use std::sync::Arc;
use std::time::Duration;

use helios_tenancy::{RequestStore, Tenancy, TenantDimension, TenantRef, UnitOfWork};
use tokio::sync::Barrier;

fn tenant(id: &str) -> TenantRef {
    TenantRef::new("account", id)
}

// =============================================================================
// Concurrent Units of Work
// =============================================================================

mod concurrent {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_do_not_observe_each_other() {
        let tenancy = Arc::new(Tenancy::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tenancy = Arc::clone(&tenancy);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(RequestStore::scope(async move {
                    let mine = tenant(&format!("tenant-{i}"));
                    tenancy.set_current_tenant(Some(mine.clone()));

                    // Every request has assigned its tenant before any reads.
                    barrier.wait().await;
                    tokio::task::yield_now().await;

                    assert_eq!(tenancy.current_tenant(), Some(mine));
                }))
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_scope_starts_empty() {
        let tenancy = Tenancy::new();

        RequestStore::scope(async {
            tenancy.set_current_tenant(Some(tenant("acme")));
        })
        .await;

        let seen = RequestStore::scope(async { tenancy.current_tenant() }).await;
        assert_eq!(seen, None);
    }

    #[test]
    fn test_thread_bound_units_of_work_are_isolated() {
        let tenancy = Arc::new(Tenancy::new());

        let workers: Vec<_> = ["acme", "globex"]
            .into_iter()
            .map(|id| {
                let tenancy = Arc::clone(&tenancy);
                std::thread::spawn(move || {
                    let _unit = RequestStore::begin().unwrap();
                    tenancy.set_current_tenant(Some(tenant(id)));
                    std::thread::sleep(Duration::from_millis(10));
                    tenancy.current_tenant()
                })
            })
            .collect();

        let seen: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(seen, vec![Some(tenant("acme")), Some(tenant("globex"))]);
    }

    #[test]
    fn test_unit_of_work_end_discards_context() {
        let tenancy = Tenancy::new();

        let unit = RequestStore::begin().unwrap();
        tenancy.set_current_tenant(Some(tenant("acme")));
        tenancy.set_named_tenant(&TenantDimension::from_static("region"), Some(tenant("eu")));
        unit.end();

        let _next = RequestStore::begin().unwrap();
        assert_eq!(tenancy.current_tenant(), None);
        assert_eq!(
            tenancy.named_tenant(&TenantDimension::from_static("region")),
            None
        );
    }
}

// =============================================================================
// Async Scoped Overrides
// =============================================================================

mod async_scopes {
    use super::*;

    #[tokio::test]
    async fn test_with_tenant_async_holds_across_await() {
        let tenancy = Tenancy::new();

        RequestStore::scope(async {
            tenancy.set_current_tenant(Some(tenant("acme")));

            let inner = tenancy
                .with_tenant_async(tenant("globex"), async {
                    tokio::task::yield_now().await;
                    tenancy.current_tenant()
                })
                .await;

            assert_eq!(inner, Some(tenant("globex")));
            assert_eq!(tenancy.current_tenant(), Some(tenant("acme")));
        })
        .await;
    }

    #[tokio::test]
    async fn test_without_tenant_async() {
        let tenancy = Tenancy::new();
        tenancy.set_default_tenant(Some(tenant("default")));

        RequestStore::scope(async {
            let inside = tenancy
                .without_tenant_async(async { tenancy.current_tenant() })
                .await;
            assert_eq!(inside, None);
            assert_eq!(tenancy.current_tenant(), Some(tenant("default")));
        })
        .await;
    }

    #[tokio::test]
    async fn test_with_mutable_tenant_async() {
        let tenancy = Tenancy::new();

        RequestStore::scope(async {
            let inside = tenancy
                .with_mutable_tenant_async(async {
                    tokio::task::yield_now().await;
                    (tenancy.mutable_tenant(), tenancy.is_unscoped())
                })
                .await;
            assert_eq!(inside, (true, true));
            assert!(!tenancy.mutable_tenant());
            assert!(!tenancy.is_unscoped());
        })
        .await;
    }

    #[tokio::test]
    async fn test_named_tenant_async() {
        let tenancy = Tenancy::new();
        let region = TenantDimension::from_static("region");

        RequestStore::scope(async {
            let inside = tenancy
                .with_named_tenant_async(region.clone(), tenant("eu"), async {
                    tenancy.named_tenant(&region)
                })
                .await;
            assert_eq!(inside, Some(tenant("eu")));
            assert_eq!(tenancy.named_tenant(&region), None);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_work_still_restores() {
        let tenancy = Tenancy::new();

        RequestStore::scope(async {
            tenancy.set_current_tenant(Some(tenant("acme")));

            let slow = tenancy.with_tenant_async(tenant("globex"), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
            let timed_out = tokio::time::timeout(Duration::from_secs(1), slow).await;

            assert!(timed_out.is_err());
            assert_eq!(tenancy.current_tenant(), Some(tenant("acme")));
        })
        .await;
    }
}

// =============================================================================
// Snapshots
// =============================================================================

mod snapshots {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_carries_context_into_spawned_task() {
        let tenancy = Arc::new(Tenancy::new());

        let handle = RequestStore::scope({
            let tenancy = Arc::clone(&tenancy);
            async move {
                tenancy.set_current_tenant(Some(tenant("acme")));
                let snapshot = RequestStore::snapshot();

                let child = Arc::clone(&tenancy);
                tokio::spawn(snapshot.scope(async move { child.current_tenant() }))
            }
        })
        .await;

        assert_eq!(handle.await.unwrap(), Some(tenant("acme")));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let tenancy = Tenancy::new();

        RequestStore::scope(async {
            tenancy.set_current_tenant(Some(tenant("acme")));
            let snapshot = RequestStore::snapshot();

            snapshot
                .scope(async {
                    tenancy.set_current_tenant(Some(tenant("globex")));
                })
                .await;

            assert_eq!(tenancy.current_tenant(), Some(tenant("acme")));
        })
        .await;
    }
}

// =============================================================================
// Runtime Threads Without a Scope
// =============================================================================

mod unscoped_runtime {
    use super::*;

    #[tokio::test]
    async fn test_async_override_is_private_to_its_task() {
        let tenancy = Arc::new(Tenancy::new());

        let holder = {
            let tenancy = Arc::clone(&tenancy);
            tokio::spawn(async move {
                tenancy
                    .with_tenant_async(tenant("acme"), async {
                        tokio::task::yield_now().await;
                        tokio::task::yield_now().await;
                        tenancy.current_tenant()
                    })
                    .await
            })
        };
        let observer = {
            let tenancy = Arc::clone(&tenancy);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                tenancy.current_tenant()
            })
        };

        assert_eq!(holder.await.unwrap(), Some(tenant("acme")));
        assert_eq!(observer.await.unwrap(), None);
        assert_eq!(tenancy.current_tenant(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_async_overrides_without_scope() {
        let tenancy = Arc::new(Tenancy::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tenancy = Arc::clone(&tenancy);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    let mine = tenant(&format!("tenant-{i}"));
                    let seen = tenancy
                        .with_tenant_async(mine.clone(), async {
                            barrier.wait().await;
                            tokio::task::yield_now().await;
                            tenancy.current_tenant()
                        })
                        .await;
                    (mine, seen)
                })
            })
            .collect();

        for handle in handles {
            let (mine, seen) = handle.await.unwrap();
            assert_eq!(seen, Some(mine));
        }
    }

    #[tokio::test]
    async fn test_begin_refused_for_concurrent_tasks() {
        let first = tokio::spawn(async { RequestStore::begin().map(UnitOfWork::end) });
        let second = tokio::spawn(async { RequestStore::begin().map(UnitOfWork::end) });

        assert!(first.await.unwrap().unwrap_err().is_invalid_argument());
        assert!(second.await.unwrap().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_async_override_leaves_thread_store_untouched() {
        let tenancy = Tenancy::new();
        let _unit = RequestStore::begin().unwrap();
        tenancy.set_current_tenant(Some(tenant("acme")));

        let inner = tokio_test::block_on(
            tenancy.with_tenant_async(tenant("globex"), async { tenancy.current_tenant() }),
        );
        assert_eq!(inner, Some(tenant("globex")));

        // The seeded scope starts from the thread's context.
        let seeded = tokio_test::block_on(tenancy.with_named_tenant_async(
            "region",
            TenantRef::new("region", "eu"),
            async { tenancy.current_tenant() },
        ));
        assert_eq!(seeded, Some(tenant("acme")));

        assert_eq!(tenancy.current_tenant(), Some(tenant("acme")));
        assert_eq!(
            tenancy.named_tenant(&TenantDimension::from_static("region")),
            None
        );
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use labportal_backend::config::identifier_conf::IdentifierConfig;
use labportal_backend::model::counter::IdKind;
use labportal_backend::repository::counter_repo::InMemoryCounterRepository;
use labportal_backend::service::id_allocator::{IdentifierAllocator, SequentialIdAllocator};

fn allocator() -> Arc<dyn IdentifierAllocator> {
    Arc::new(SequentialIdAllocator::new(
        Arc::new(InMemoryCounterRepository::new()),
        IdentifierConfig::default(),
    ))
}

#[tokio::test]
async fn test_concurrent_allocations_are_unique() {
    let allocator = allocator();
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.next_id(IdKind::Client, 2025).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let id = handle.await.unwrap().unwrap();
        assert!(id.starts_with("CL-2025-"));
        assert!(ids.insert(id));
    }
    assert_eq!(ids.len(), 50);
    assert!(ids.contains("CL-2025-001"));
    assert!(ids.contains("CL-2025-050"));
}

#[tokio::test]
async fn test_sequences_are_per_kind_and_year() {
    let allocator = allocator();
    assert_eq!(allocator.next_id(IdKind::Client, 2025).await.unwrap(), "CL-2025-001");
    assert_eq!(allocator.next_id(IdKind::Project, 2025).await.unwrap(), "P-2025-001");
    assert_eq!(allocator.next_id(IdKind::Client, 2026).await.unwrap(), "CL-2026-001");
    assert_eq!(allocator.next_id(IdKind::Client, 2025).await.unwrap(), "CL-2025-002");
}

#[tokio::test]
async fn test_next_id_in_same_scope_follows_previous() {
    let allocator = allocator();
    let first = allocator.next_id(IdKind::Project, 2025).await.unwrap();
    let second = allocator.next_id(IdKind::Project, 2025).await.unwrap();

    let seq = |id: &str| id.rsplit('-').next().unwrap().parse::<u32>().unwrap();
    assert_eq!(seq(&second), seq(&first) + 1);
    assert_eq!(first, "P-2025-001");
    assert_eq!(second, "P-2025-002");
}

use archetype_assets::prelude::*;
use std::sync::Arc;

fn id(raw: u32) -> AssetId {
    AssetId::new(raw).unwrap()
}

fn setup(ids: &[u32]) -> (AssetManager, Arc<MemoryProvider>) {
    let provider = Arc::new(MemoryProvider::new());
    for raw in ids {
        provider.insert(id(*raw), RawAsset::new(0, format!("asset {raw}")));
    }
    let manager = AssetManager::new(AssetManagerConfig::default(), provider.clone()).unwrap();
    manager
        .define_scheme(
            0,
            SchemeDescriptor::new(|ctx: &mut LoadContext<'_, String>| {
                Ok(String::from_utf8_lossy(ctx.bytes()).into_owned())
            }),
        )
        .unwrap();
    (manager, provider)
}

fn pump(manager: &AssetManager) {
    while manager.processing() {
        while manager.process_custom_thread(RoleId(0)) {}
        while manager.process_control_thread() {}
    }
}

#[test]
fn test_eviction_happens_exactly_past_threshold() {
    let (manager, _provider) = setup(&[1]);
    let cache = OnDemandCache::new(manager.clone());
    assert_eq!(cache.eviction_threshold(), 20);

    assert!(cache.acquire::<String>(id(1)).is_none());
    assert_eq!(cache.current_tick(), 0);

    for tick in 1..=20 {
        assert_eq!(cache.tick(), 0, "evicted early at tick {tick}");
        assert!(cache.contains(id(1)));
    }
    assert_eq!(manager.references(id(1)), 1);

    assert_eq!(cache.tick(), 1);
    assert_eq!(cache.current_tick(), 21);
    assert!(!cache.contains(id(1)));
    assert_eq!(manager.references(id(1)), 0);

    pump(&manager);
    assert!(manager.is_empty());
}

#[test]
fn test_acquire_retries_until_ready() {
    let (manager, provider) = setup(&[2]);
    let cache = OnDemandCache::new(manager.clone());

    assert!(cache.acquire::<String>(id(2)).is_none());
    cache.tick();
    assert!(cache.acquire::<String>(id(2)).is_none());
    pump(&manager);
    cache.tick();
    assert_eq!(
        cache.acquire::<String>(id(2)).as_deref().map(String::as_str),
        Some("asset 2")
    );
    assert_eq!(provider.fetch_count(), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_cache_and_manual_references_coexist() {
    let (manager, _provider) = setup(&[3]);
    let cache = OnDemandCache::with_config(
        manager.clone(),
        OnDemandConfig {
            eviction_threshold: 1,
        },
    );

    manager.load(id(3));
    cache.preload(id(3));
    assert_eq!(manager.references(id(3)), 2);
    pump(&manager);

    cache.tick();
    cache.tick();
    assert!(cache.is_empty());
    // The manual reference keeps the asset alive
    assert!(manager.ready(id(3)));
    assert_eq!(manager.references(id(3)), 1);
}

#[test]
fn test_clear_unloads_everything() {
    let (manager, _provider) = setup(&[4, 5, 6]);
    let cache = OnDemandCache::new(manager.clone());
    for raw in [4, 5, 6] {
        cache.preload(id(raw));
    }
    pump(&manager);
    assert_eq!(cache.len(), 3);
    assert_eq!(manager.count_total(), 3);

    cache.clear();
    assert!(cache.is_empty());
    pump(&manager);
    assert_eq!(manager.count_total(), 0);
}

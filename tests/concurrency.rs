use archetype_assets::prelude::*;
use archetype_assets::BoundedQueue;
use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn id(raw: u32) -> AssetId {
    AssetId::new(raw).unwrap()
}

fn bytes_scheme() -> SchemeDescriptor {
    SchemeDescriptor::new(|ctx: &mut LoadContext<'_, Vec<u8>>| Ok(ctx.bytes().to_vec()))
}

/// Pump the control queue on this thread until `done` holds or time runs out
fn control_until(manager: &AssetManager, done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        while manager.process_control_thread() {}
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_concurrent_first_loads_fetch_once() {
    let provider = Arc::new(MemoryProvider::new());
    provider.insert(id(1), RawAsset::new(0, vec![9; 16]));
    let manager = AssetManager::new(AssetManagerConfig::default(), provider.clone()).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let manager = manager.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.load(id(1));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.references(id(1)), 2);
    assert_eq!(manager.count_total(), 1);
    while manager.process_custom_thread(RoleId(0)) {}
    // Exactly one fetch job was queued
    assert!(!manager.process_custom_thread(RoleId(0)));
    while manager.process_control_thread() {}
    assert_eq!(provider.fetch_count(), 1);
    assert!(manager.ready(id(1)));
}

#[test]
fn test_many_threads_loading_and_unloading() {
    let provider = Arc::new(MemoryProvider::new());
    for raw in 1..=32 {
        provider.insert(id(raw), RawAsset::new(0, raw.to_le_bytes().to_vec()));
    }
    let manager = AssetManager::new(AssetManagerConfig::default(), provider.clone()).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();
    let disk = WorkerPool::spawn(&manager, RoleId(0), 2).unwrap();

    let wg = WaitGroup::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let wg = wg.clone();
        thread::spawn(move || {
            for round in 0..50u32 {
                let target = id(round % 32 + 1);
                manager.load(target);
                manager.unload(target);
            }
            drop(wg);
        });
    }
    wg.wait();

    assert!(control_until(&manager, || manager.is_empty()));
    assert!(provider.fetch_count() >= 1);
    manager.terminate();
    disk.shutdown();
}

#[test]
fn test_terminate_unblocks_three_poppers() {
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new(4));
    let started = Arc::new(Barrier::new(4));
    let poppers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                started.wait();
                queue.pop()
            })
        })
        .collect();

    started.wait();
    thread::sleep(Duration::from_millis(50));
    queue.terminate();
    for popper in poppers {
        assert_eq!(popper.join().unwrap(), Err(AssetError::Terminated));
    }
}

#[test]
fn test_finalize_runs_on_owning_role_thread() {
    let finalized_on = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&finalized_on);

    let provider = Arc::new(MemoryProvider::new());
    provider.insert(id(7), RawAsset::new(3, "texture"));
    let manager = AssetManager::new(AssetManagerConfig::default(), provider).unwrap();
    manager
        .define_scheme(
            3,
            SchemeDescriptor::new(move |ctx: &mut LoadContext<'_, usize>| {
                let name = thread::current().name().unwrap_or_default().to_string();
                recorder.lock().push(name);
                Ok(ctx.bytes().len())
            })
            .on_role(RoleId(2)),
        )
        .unwrap();

    let disk = WorkerPool::spawn(&manager, RoleId(0), 2).unwrap();
    let gpu = WorkerPool::spawn(&manager, RoleId(2), 1).unwrap();

    manager.load(id(7));
    assert!(control_until(&manager, || manager.ready(id(7))));
    assert_eq!(manager.get::<usize>(id(7)).as_deref(), Some(&7));
    {
        let names = finalized_on.lock();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("asset-role#2"), "ran on {}", names[0]);
    }

    // Disposal also goes through the role thread before removal
    manager.unload(id(7));
    assert!(control_until(&manager, || manager.is_empty()));

    manager.terminate();
    disk.shutdown();
    gpu.shutdown();
}

#[test]
fn test_requests_beyond_queue_capacity_never_block() {
    let provider = Arc::new(MemoryProvider::new());
    for raw in 1..=100 {
        provider.insert(id(raw), RawAsset::new(0, vec![raw as u8]));
    }
    let config = AssetManagerConfig {
        queue_capacity: 2,
        ..Default::default()
    };
    let manager = AssetManager::new(config, provider).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();

    // No worker is running, so the role queue fills after two requests
    for raw in 1..=100 {
        manager.load(id(raw));
    }
    assert_eq!(manager.count_processing(), 100);

    while manager.processing() {
        while manager.process_custom_thread(RoleId(0)) {}
        while manager.process_control_thread() {}
    }
    assert!((1..=100).all(|raw| manager.ready(id(raw))));
    assert_eq!(manager.get::<Vec<u8>>(id(100)).as_deref(), Some(&vec![100u8]));
}

#[test]
fn test_wait_custom_thread_reports_termination() {
    let manager = AssetManager::with_provider(MemoryProvider::new());
    assert_eq!(
        manager.wait_custom_thread(RoleId(1), Duration::from_millis(5)),
        Ok(false)
    );

    let waiter = {
        let manager = manager.clone();
        thread::spawn(move || manager.wait_custom_thread(RoleId(1), Duration::from_secs(30)))
    };
    thread::sleep(Duration::from_millis(20));
    manager.terminate();
    assert_eq!(waiter.join().unwrap(), Err(AssetError::Terminated));
    assert!(manager.is_terminated());
    assert!(!manager.process_control_thread());
}

#[test]
fn test_unload_custom_thread_drains_role() {
    let provider = Arc::new(MemoryProvider::new());
    provider.insert(id(5), RawAsset::new(0, "x"));
    let manager = AssetManager::new(AssetManagerConfig::default(), provider).unwrap();
    manager
        .define_scheme(0, bytes_scheme().on_role(RoleId(1)))
        .unwrap();

    manager.load(id(5));
    while manager.process_custom_thread(RoleId(0)) {}
    manager.unload_custom_thread(RoleId(1));
    assert!(manager.ready(id(5)));

    manager.unload(id(5));
    manager.unload_custom_thread(RoleId(1));
    assert!(manager.is_empty());
}

#[test]
fn test_unload_after_terminate_settles() {
    let provider = Arc::new(MemoryProvider::new());
    provider.insert(id(1), RawAsset::new(0, "plain"));
    provider.insert(id(2), RawAsset::new(1, "bound"));
    let manager = AssetManager::new(AssetManagerConfig::default(), provider).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();
    manager
        .define_scheme(1, bytes_scheme().on_role(RoleId(2)))
        .unwrap();

    manager.load(id(1));
    manager.load(id(2));
    while manager.processing() {
        for role in manager.config().role_ids() {
            while manager.process_custom_thread(role) {}
        }
        while manager.process_control_thread() {}
    }
    assert!(manager.ready(id(1)) && manager.ready(id(2)));

    manager.terminate();
    manager.unload(id(1));
    manager.unload(id(2));
    for role in manager.config().role_ids() {
        manager.unload_custom_thread(role);
    }
    assert_eq!(manager.state(id(1)), None);
    assert_eq!(manager.state(id(2)), None);
    assert!(manager.wait_till_empty(Duration::from_secs(1)));
}

#[test]
fn test_load_after_terminate_fails_instead_of_hanging() {
    let provider = Arc::new(MemoryProvider::new());
    provider.insert(id(3), RawAsset::new(0, "late"));
    let manager = AssetManager::new(AssetManagerConfig::default(), provider.clone()).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();

    manager.terminate();
    manager.load(id(3));
    assert_eq!(manager.state(id(3)), Some(AssetState::Failed));
    assert_eq!(manager.error(id(3)), Some(AssetError::Terminated));
    assert!(!manager.processing());
    assert_eq!(provider.fetch_count(), 0);

    manager.unload(id(3));
    assert!(manager.is_empty());
}

#[test]
fn test_wait_till_empty_with_worker_and_control_threads() {
    let provider = Arc::new(MemoryProvider::new());
    for raw in 1..=16 {
        provider.insert(id(raw), RawAsset::new(0, vec![raw as u8; 4]));
    }
    let manager = AssetManager::new(AssetManagerConfig::default(), provider).unwrap();
    manager.define_scheme(0, bytes_scheme()).unwrap();
    let disk = WorkerPool::spawn(&manager, RoleId(0), 2).unwrap();

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let control = {
        let manager = manager.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(std::sync::atomic::Ordering::Acquire) {
                while manager.process_control_thread() {}
                thread::yield_now();
            }
        })
    };

    for raw in 1..=16 {
        manager.load(id(raw));
    }
    assert!(!manager.wait_till_empty(Duration::ZERO));
    for raw in 1..=16 {
        manager.unload(id(raw));
    }
    assert!(manager.wait_till_empty(Duration::from_secs(10)));

    stop.store(true, std::sync::atomic::Ordering::Release);
    control.join().unwrap();
    manager.terminate();
    disk.shutdown();
}

#![allow(dead_code, unused_imports)]

use archetype_assets::prelude::*;
use std::{sync::Arc, time::Instant};

fn populated_manager(count: u32) -> Result<AssetManager> {
    let provider = Arc::new(MemoryProvider::new());
    for raw in 1..=count {
        if let Some(id) = AssetId::new(raw) {
            provider.insert(id, RawAsset::new(0, vec![0u8; 1024]));
        }
    }
    let manager = AssetManager::new(AssetManagerConfig::default(), provider)?;
    manager.define_scheme(
        0,
        SchemeDescriptor::new(|ctx: &mut LoadContext<'_, Vec<u8>>| Ok(ctx.bytes().to_vec())),
    )?;
    Ok(manager)
}

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(manager))]
fn profile_loads(manager: &AssetManager, count: u32) {
    let _span = tracing::info_span!("load_loop", count = count).entered();
    for id in (1..=count).filter_map(AssetId::new) {
        if id.get() % 1_000 == 0 {
            tracing::info!("Requesting asset {}/{}", id, count);
        }
        manager.load(id);
    }
    while manager.processing() {
        while manager.process_custom_thread(manager.config().fetch_role) {}
        while manager.process_control_thread() {}
    }
}

#[cfg(feature = "profiling")]
fn main() -> Result<()> {
    let _guard = archetype_assets::profiling::init_file_subscriber("trace.json")?;
    let manager = populated_manager(10_000)?;

    println!("Profiling 10k asset loads...");
    let start = Instant::now();
    profile_loads(&manager, 10_000);
    println!(
        "Loaded {} assets in: {:?}",
        manager.count_total(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_load binary requires --features profiling");
}

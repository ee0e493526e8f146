//! Example: disk threads, a thread-bound "GPU" role and an on-demand cache
//!
//! Role 0 fetches bytes on two background threads, role 1 owns the fake GPU
//! context and finalizes textures, `main` is the control thread.

use archetype_assets::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TEXTURE: u32 = 0;
const DISK: RoleId = RoleId::new(0);
const GPU: RoleId = RoleId::new(1);

#[allow(dead_code)]
#[derive(Debug)]
struct Texture {
    texels: usize,
    uploaded_on: String,
}

fn main() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let names = ["stone.png", "grass.png", "water.png", "sand.png"];
    for (i, name) in names.iter().enumerate() {
        provider.insert(
            AssetId::from_name(name),
            RawAsset::new(TEXTURE, vec![0u8; 64 * (i + 1)]).with_label(*name),
        );
    }

    let config = AssetManagerConfig {
        roles: 2,
        ..Default::default()
    };
    let manager = AssetManager::new(config, provider)?;
    manager.define_scheme(
        TEXTURE,
        SchemeDescriptor::new(|ctx: &mut LoadContext<'_, Texture>| {
            Ok(Texture {
                texels: ctx.bytes().len(),
                uploaded_on: thread::current().name().unwrap_or("?").to_string(),
            })
        })
        .on_role(GPU),
    )?;

    let disk = WorkerPool::spawn(&manager, DISK, 2)?;
    let gpu = WorkerPool::spawn(&manager, GPU, 1)?;
    let cache = OnDemandCache::with_config(
        manager.clone(),
        OnDemandConfig {
            eviction_threshold: 5,
        },
    );

    for frame in 0..30 {
        // Only the first two textures stay in use after frame 10
        let visible = if frame < 10 { &names[..] } else { &names[..2] };
        for name in visible {
            if let Some(texture) = cache.acquire::<Texture>(AssetId::from_name(name)) {
                if frame % 10 == 0 {
                    println!("frame {frame}: {name} -> {texture:?}");
                }
            }
        }
        while manager.process_control_thread() {}
        let evicted = cache.tick();
        if evicted > 0 {
            println!("frame {frame}: evicted {evicted} idle textures");
        }
        thread::sleep(Duration::from_millis(5));
    }

    cache.clear();
    while manager.processing() {
        while manager.process_control_thread() {}
        thread::sleep(Duration::from_millis(1));
    }
    println!("All textures released: {}", manager.is_empty());

    manager.terminate();
    disk.shutdown();
    gpu.shutdown();
    Ok(())
}

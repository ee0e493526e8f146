//! Example: load, read and unload assets on a single thread
//!
//! Every role and the control queue are pumped from `main`, which is how a
//! tool or a test harness drives the manager without worker threads.

use archetype_assets::prelude::*;
use std::sync::Arc;

const SHADER: u32 = 0;

#[derive(Debug)]
struct Shader {
    source: String,
}

fn pump(manager: &AssetManager) {
    while manager.processing() {
        for role in manager.config().role_ids() {
            while manager.process_custom_thread(role) {}
        }
        while manager.process_control_thread() {}
    }
}

fn main() -> Result<()> {
    let provider = Arc::new(MemoryProvider::new());
    let lit = AssetId::from_name("shaders/lit.wgsl");
    provider.insert(lit, RawAsset::new(SHADER, "fn main() {}"));

    let manager = AssetManager::new(AssetManagerConfig::default(), provider.clone())?;
    manager.define_scheme(
        SHADER,
        SchemeDescriptor::new(|ctx: &mut LoadContext<'_, Shader>| {
            let source = std::str::from_utf8(ctx.bytes())
                .map_err(|e| AssetError::Decode(e.to_string()))?;
            Ok(Shader {
                source: source.to_string(),
            })
        }),
    )?;

    println!("Requesting {lit}...");
    let handle = manager.load_handle(lit);
    println!("State before pumping: {:?}", handle.state());

    pump(&manager);
    if let Some(shader) = handle.get::<Shader>() {
        println!("Loaded shader: {:?}", shader.source);
    }

    println!("Editing the source and reloading...");
    provider.insert(lit, RawAsset::new(SHADER, "fn main() { discard; }"));
    manager.reload(lit, false);
    pump(&manager);
    if let Some(shader) = handle.get::<Shader>() {
        println!("Generation {:?}: {:?}", manager.generation(lit), shader.source);
    }

    drop(handle);
    pump(&manager);
    println!("Tracked assets after unload: {}", manager.count_total());
    Ok(())
}

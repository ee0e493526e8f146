use archetype_assets::hot_reload::{apply_change_notifications, ChangeWatcher};
use archetype_assets::prelude::*;
use archetype_assets::{FallbackProvider, FileSystemProvider};
use std::fs;
use std::io::Cursor;
use std::sync::Arc;

const TEXT: u32 = 0;

fn text_scheme() -> SchemeDescriptor {
    SchemeDescriptor::new(|ctx: &mut LoadContext<'_, String>| {
        std::str::from_utf8(ctx.bytes())
            .map(str::to_owned)
            .map_err(|e| AssetError::Decode(format!("UTF-8 decode error: {e}")))
    })
}

fn pump(manager: &AssetManager) {
    while manager.processing() {
        while manager.process_custom_thread(manager.config().fetch_role) {}
        while manager.process_control_thread() {}
    }
}

#[test]
fn test_filesystem_assets_with_hot_reload() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(dir.path().join("config/game.txt"), "difficulty=easy").unwrap();

    let mut files = FileSystemProvider::new(dir.path());
    files.register_extension("txt", TEXT);
    assert_eq!(files.scan().unwrap(), 1);
    let files = Arc::new(files);

    let manager = AssetManager::new(AssetManagerConfig::default(), files.clone()).unwrap();
    manager.define_scheme(TEXT, text_scheme()).unwrap();

    let game = AssetId::from_name("config/game.txt");
    manager.load(game);
    pump(&manager);
    assert_eq!(
        manager.get::<String>(game).as_deref().map(String::as_str),
        Some("difficulty=easy")
    );
    assert_eq!(manager.label(game).as_deref(), Some("config/game.txt"));

    fs::write(dir.path().join("config/game.txt"), "difficulty=hard").unwrap();
    let notified = apply_change_notifications(&manager, Cursor::new("config/game.txt\nconfig/other.txt\n"))
        .unwrap();
    assert_eq!(notified, 1);
    pump(&manager);
    assert_eq!(
        manager.get::<String>(game).as_deref().map(String::as_str),
        Some("difficulty=hard")
    );
    assert_eq!(manager.generation(game), Some(1));

    let mut watcher = ChangeWatcher::new();
    watcher.watch_provider(&files);
    assert_eq!(watcher.watched_count(), 1);
}

#[test]
fn test_deleted_file_fails_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("note.txt"), "v1").unwrap();
    let mut files = FileSystemProvider::new(dir.path());
    files.register_extension("txt", TEXT);
    files.scan().unwrap();

    let manager = AssetManager::new(AssetManagerConfig::default(), Arc::new(files)).unwrap();
    manager.define_scheme(TEXT, text_scheme()).unwrap();
    let note = AssetId::from_name("note.txt");

    fs::remove_file(dir.path().join("note.txt")).unwrap();
    manager.load(note);
    pump(&manager);
    assert_eq!(manager.state(note), Some(AssetState::Failed));
    assert_eq!(manager.error(note), Some(AssetError::NotFound(note)));

    fs::write(dir.path().join("note.txt"), "v2").unwrap();
    manager.reload(note, false);
    pump(&manager);
    assert_eq!(
        manager.get::<String>(note).as_deref().map(String::as_str),
        Some("v2")
    );
}

#[test]
fn test_embedded_pack_falls_back_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("disk.txt"), "from disk").unwrap();
    let mut files = FileSystemProvider::new(dir.path());
    files.register_extension("txt", TEXT);
    files.scan().unwrap();

    let embedded = Arc::new(MemoryProvider::new());
    let builtin = AssetId::from_name("builtin.txt");
    embedded.insert(builtin, RawAsset::new(TEXT, "from memory"));

    let chain = FallbackProvider::new()
        .with(embedded.clone())
        .with(Arc::new(files));
    let manager = AssetManager::with_provider(chain);
    manager.define_scheme(TEXT, text_scheme()).unwrap();

    let disk = AssetId::from_name("disk.txt");
    manager.load(builtin);
    manager.load(disk);
    pump(&manager);
    assert_eq!(
        manager.get::<String>(builtin).as_deref().map(String::as_str),
        Some("from memory")
    );
    assert_eq!(
        manager.get::<String>(disk).as_deref().map(String::as_str),
        Some("from disk")
    );
    assert_eq!(embedded.fetch_count(), 2);
}

//! Save/load behaviour against real stores.

use std::io::Cursor as IoCursor;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;

use dragonart_core::history::delete_oldest;
use dragonart_core::persistence::{
    CompressionSettings, GuardConfig, LoadOutcome, SaveOutcome, SessionPersister, SkipReason,
};
use dragonart_core::{
    ArtifactId, EditMode, GenerationMetadata, ImageData, KvStore, MemoryKvStore, ParentRef,
    Session,
};
use dragonart_state::{FsKvStore, SESSION_KEY};

fn img(tag: u8) -> ImageData {
    ImageData::new("image/png", vec![tag])
}

fn png(width: u32, height: u32) -> ImageData {
    let pixels = RgbImage::from_pixel(width, height, Rgb([10, 200, 90]));
    let mut buf = IoCursor::new(Vec::new());
    pixels.write_to(&mut buf, ImageFormat::Png).unwrap();
    ImageData::new("image/png", buf.into_inner())
}

fn meta(mode: EditMode) -> GenerationMetadata {
    GenerationMetadata::new(mode, "prompt", "custom", "Chain")
}

fn persister(store: Arc<dyn KvStore>) -> SessionPersister {
    SessionPersister::new(
        store,
        SESSION_KEY,
        CompressionSettings::default(),
        GuardConfig::disabled(),
    )
}

async fn restore(store: Arc<dyn KvStore>) -> Session {
    match persister(store).load().await {
        LoadOutcome::Restored(session) => session,
        LoadOutcome::Fresh(log) => panic!("expected a restored session, log: {:?}", log.entries()),
    }
}

fn chain_session() -> (Session, Vec<ArtifactId>) {
    let mut s = Session::new("Chain", img(0));
    let a = s.append(img(1), ParentRef::Root, meta(EditMode::Edit)).id().clone();
    let b = s.append(img(2), a.clone().into(), meta(EditMode::Bw)).id().clone();
    let c = s.append(img(3), b.clone().into(), meta(EditMode::MtgCard)).id().clone();
    s.select(1).unwrap();
    s.toggle_favorite_current();
    (s, vec![a, b, c])
}

#[tokio::test]
async fn round_trip_preserves_chain_favorites_and_cursor() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let mut p = persister(store.clone());
    p.load().await;

    let (mut session, ids) = chain_session();
    assert!(p.save(&mut session).await.is_saved());

    let restored = restore(store).await;
    assert_eq!(restored.name(), "Chain");
    let restored_ids: Vec<&ArtifactId> = restored.store().iter().map(|a| a.id()).collect();
    assert_eq!(restored_ids, ids.iter().collect::<Vec<_>>());
    assert!(restored.store().at(0).unwrap().parent_id().is_root());
    assert!(restored.store().at(1).unwrap().parent_id().points_to(&ids[0]));
    assert!(restored.store().at(2).unwrap().parent_id().points_to(&ids[1]));
    assert_eq!(restored.cursor().index(), Some(1));
    assert_eq!(restored.favorites().iter().collect::<Vec<_>>(), vec![&ids[1]]);
    assert_eq!(restored.store().at(2).unwrap().edit_mode(), &EditMode::MtgCard);
    assert_eq!(restored.store().at(2).unwrap().metadata().custom_prompt, "custom");
}

#[tokio::test]
async fn restore_resumes_log_counter_and_records_restore() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let mut p = persister(store.clone());
    p.load().await;
    let (mut session, _) = chain_session();
    session.log_mut().push("one");
    session.log_mut().push("two");
    let counter = session.log().next_counter();
    p.save(&mut session).await;

    let restored = restore(store).await;
    let entries = restored.log().entries();
    assert!(entries[0].starts_with(&format!("{}: ", counter + 1)));
    assert!(entries[0].ends_with("Session \"Chain\" restored."));
    assert!(entries[1].ends_with("Restoring previous session..."));
    assert!(entries[2].ends_with("two"));
}

#[tokio::test]
async fn legacy_linear_history_is_migrated() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let legacy = json!({
        "mainImage": "data:image/png;base64,AA==",
        "sessionName": "Old",
        "history": [
            {"id": "a", "before": "data:image/png;base64,AA==", "after": "data:image/png;base64,AQ==", "prompt": "p", "editMode": "edit", "createdAt": 1},
            {"id": "b", "before": "data:image/png;base64,AQ==", "after": "data:image/png;base64,Ag==", "prompt": "p", "editMode": "bw", "createdAt": 2},
            {"id": "c", "before": "data:image/png;base64,Ag==", "after": "data:image/png;base64,Aw==", "prompt": "p", "editMode": "freestyle", "createdAt": 3}
        ],
        "logMessages": ["7: [10:00:00] Generated"]
    });
    store
        .set(SESSION_KEY, &serde_json::to_vec(&legacy).unwrap())
        .await
        .unwrap();

    let restored = restore(store).await;
    let parents: Vec<String> = restored
        .store()
        .iter()
        .map(|a| a.parent_id().to_string())
        .collect();
    assert_eq!(parents, vec!["root", "a", "b"]);
    assert_eq!(restored.cursor().index(), Some(2));
    assert_eq!(
        restored.resolve_before(restored.store().at(1).unwrap()),
        restored.store().at(0).unwrap().after_image()
    );
    assert!(restored.log().entries().iter().any(|l| {
        l.starts_with("9: ") && l.ends_with("Migrating session to new efficient data structure...")
    }));
}

#[tokio::test]
async fn unknown_mode_names_survive_save_and_reload() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let stored = json!({
        "mainImage": "data:image/png;base64,AA==",
        "sessionName": "Future",
        "history": [
            {"id": "a", "parentId": "root", "after": "data:image/png;base64,AQ==", "prompt": "p", "editMode": "hologram", "createdAt": 1}
        ]
    });
    store
        .set(SESSION_KEY, &serde_json::to_vec(&stored).unwrap())
        .await
        .unwrap();

    let mut p = persister(store.clone());
    let LoadOutcome::Restored(mut session) = p.load().await else {
        panic!("expected a restored session");
    };
    assert_eq!(
        session.store().at(0).unwrap().edit_mode(),
        &EditMode::Unrecognized("hologram".into())
    );
    assert!(p.save(&mut session).await.is_saved());

    let raw = store.get(SESSION_KEY).await.unwrap().unwrap();
    let saved: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(saved["history"][0]["editMode"], "hologram");

    let reloaded = restore(store).await;
    assert_eq!(reloaded.store().at(0).unwrap().edit_mode().as_str(), "hologram");
}

#[tokio::test]
async fn entries_missing_a_parent_are_attached_to_root() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let stored = json!({
        "mainImage": "data:image/png;base64,AA==",
        "sessionName": "Patchy",
        "history": [
            {"id": "a", "parentId": "root", "after": "data:image/png;base64,AQ==", "prompt": "p", "editMode": "edit", "createdAt": 1},
            {"id": "b", "after": "data:image/png;base64,Ag==", "prompt": "p", "editMode": "bw", "createdAt": 2},
            {"id": "c", "parentId": null, "after": "data:image/png;base64,Aw==", "prompt": "p", "editMode": "bw", "createdAt": 3},
            {"id": "d", "parentId": "a", "after": "data:image/png;base64,BA==", "prompt": "p", "editMode": "bw", "createdAt": 4}
        ]
    });
    store
        .set(SESSION_KEY, &serde_json::to_vec(&stored).unwrap())
        .await
        .unwrap();

    let restored = restore(store.clone()).await;
    let parents: Vec<String> = restored
        .store()
        .iter()
        .map(|a| a.parent_id().to_string())
        .collect();
    assert_eq!(parents, vec!["root", "root", "root", "a"]);
    assert_eq!(
        restored.resolve_before(restored.store().at(1).unwrap()),
        restored.root()
    );
    assert!(restored
        .log()
        .entries()
        .iter()
        .any(|l| l.contains("Repaired 2 step(s)")));
    assert!(!restored
        .log()
        .entries()
        .iter()
        .any(|l| l.contains("Migrating session")));
    assert!(store.get(SESSION_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn capacity_failure_is_sticky_until_pruned() {
    let store = Arc::new(MemoryKvStore::new());
    let mut p = persister(store.clone());
    p.load().await;

    let mut session = Session::new("Big", png(64, 64));
    for tag in 0..4 {
        session.append(png(32 + tag, 32), ParentRef::Root, meta(EditMode::Edit));
    }
    assert!(p.save(&mut session).await.is_saved());

    store.set_capacity(64);
    assert_eq!(p.save(&mut session).await, SaveOutcome::CapacityExceeded);
    assert!(session.is_storage_full());
    assert!(session
        .log()
        .latest()
        .unwrap()
        .ends_with("ERROR: Storage limit reached. Session not saved."));

    // Writes are not attempted while the flag is set.
    store.set_capacity(usize::MAX);
    assert_eq!(
        p.save(&mut session).await,
        SaveOutcome::Skipped(SkipReason::StorageFull)
    );

    let report = delete_oldest(&mut session, 2).unwrap();
    assert!(report.storage_full_cleared);
    assert!(!session.is_storage_full());
    assert!(p.save(&mut session).await.is_saved());
}

#[tokio::test]
async fn forced_save_recovers_and_logs() {
    let store = Arc::new(MemoryKvStore::new());
    let mut p = persister(store.clone());
    p.load().await;
    let mut session = Session::new("S", img(0));

    store.set_capacity(8);
    assert_eq!(p.save(&mut session).await, SaveOutcome::CapacityExceeded);
    store.set_capacity(usize::MAX);

    let outcome = p.force_save(&mut session).await;
    assert!(matches!(outcome, SaveOutcome::Saved { recovered: true, .. }));
    assert!(!session.is_storage_full());
    assert!(session
        .log()
        .latest()
        .unwrap()
        .ends_with("Storage space recovered. Session saved."));
}

#[tokio::test]
async fn stored_images_are_compressed() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let mut p = persister(store.clone());
    p.load().await;
    let mut session = Session::new("S", png(2000, 1000));
    session.append(png(1500, 1500), ParentRef::Root, meta(EditMode::Edit));
    p.save(&mut session).await;

    let restored = restore(store).await;
    assert_eq!(restored.root().mime(), "image/jpeg");
    let root = image::load_from_memory(restored.root().bytes()).unwrap();
    assert_eq!((root.width(), root.height()), (1024, 512));
    let after = restored.store().at(0).unwrap().after_image();
    let after = image::load_from_memory(after.bytes()).unwrap();
    assert_eq!((after.width(), after.height()), (1024, 1024));
}

#[tokio::test]
async fn filesystem_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KvStore> = Arc::new(FsKvStore::new(dir.path()).unwrap());
    let mut p = persister(store.clone());
    p.load().await;
    let (mut session, ids) = chain_session();
    assert!(p.save(&mut session).await.is_saved());

    let reopened: Arc<dyn KvStore> = Arc::new(FsKvStore::new(dir.path()).unwrap());
    let restored = restore(reopened).await;
    assert_eq!(restored.store().len(), ids.len());

    p.clear().await.unwrap();
    assert!(store.get(SESSION_KEY).await.unwrap().is_none());
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::*;
use crate::application::linkgraph::projector::LinkGraphProjector;
use crate::application::linkgraph::traversal::traverse;
use crate::domain::entities::entity::EntityType;
use crate::domain::entities::errors::ErrorKind;
use crate::infrastructure::backend::InMemoryEntityBackend;

/// Holds every call while gated until the test releases it, so responses can
/// be delivered in any order.
struct GatedBackend {
    inner: InMemoryEntityBackend,
    gated: AtomicBool,
    arrivals: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl GatedBackend {
    fn new(
        inner: InMemoryEntityBackend,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<oneshot::Sender<()>>) {
        let (arrivals, rx) = mpsc::unbounded_channel();
        let backend = Self {
            inner,
            gated: AtomicBool::new(false),
            arrivals,
        };
        (Arc::new(backend), rx)
    }

    fn gate(&self, on: bool) {
        self.gated.store(on, Ordering::SeqCst);
    }

    async fn hold(&self) {
        if !self.gated.load(Ordering::SeqCst) {
            return;
        }
        let (release, wait) = oneshot::channel();
        if self.arrivals.send(release).is_ok() {
            let _ = wait.await;
        }
    }
}

#[async_trait]
impl EntityBackend for GatedBackend {
    async fn list(&self) -> Result<Vec<Entity>, EntityError> {
        self.hold().await;
        self.inner.list().await
    }

    async fn create(&self, draft: &EntityDraft) -> Result<Entity, EntityError> {
        self.hold().await;
        self.inner.create(draft).await
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, EntityError> {
        self.hold().await;
        self.inner.update(entity).await
    }

    async fn delete(&self, id: &str) -> Result<Vec<Entity>, EntityError> {
        self.hold().await;
        self.inner.delete(id).await
    }

    async fn add_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        self.hold().await;
        self.inner.add_tags(id, tag_ids).await
    }

    async fn remove_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        self.hold().await;
        self.inner.remove_tags(id, tag_ids).await
    }
}

fn memory_store() -> (EntityStore, Arc<InMemoryEntityBackend>) {
    let backend = Arc::new(InMemoryEntityBackend::new());
    (EntityStore::new(backend.clone(), 64), backend)
}

fn note(title: &str) -> EntityDraft {
    EntityDraft::new(EntityType::Note, title)
}

fn seeded(id: &str, title: &str, parent: Option<&str>) -> Entity {
    let now = chrono::Utc::now();
    Entity {
        id: id.into(),
        entity_type: EntityType::Note,
        title: title.into(),
        content: String::new(),
        parent: parent.map(str::to_string),
        children: Vec::new(),
        tags: Default::default(),
        metadata: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

async fn assert_tree(store: &EntityStore) {
    let all = store.list().await;
    for e in &all {
        let mut expected: Vec<String> = all
            .iter()
            .filter(|c| c.parent.as_deref() == Some(e.id.as_str()))
            .map(|c| c.id.clone())
            .collect();
        expected.sort();
        assert_eq!(e.children, expected, "children of {}", e.id);
    }
}

#[tokio::test]
async fn identical_updates_never_dirty_a_clean_entity() {
    let (store, _) = memory_store();
    let id = store.create(note("Plan")).await.unwrap();
    assert!(!store.is_dirty(&id).await);

    assert!(!store.update(&id, EntityPatch::title("Plan")).await.unwrap());
    assert!(!store.update(&id, EntityPatch::title("  Plan ")).await.unwrap());
    assert!(!store.is_dirty(&id).await);

    assert!(store.update(&id, EntityPatch::content("body")).await.unwrap());
    assert!(store.is_dirty(&id).await);
    store.save(&id).await.unwrap();
    assert!(!store.is_dirty(&id).await);

    assert!(!store.update(&id, EntityPatch::content("body")).await.unwrap());
    assert!(!store.update(&id, EntityPatch::content("body")).await.unwrap());
    assert!(!store.is_dirty(&id).await);
}

#[tokio::test]
async fn children_follow_parent_through_moves_and_deletes() {
    let (store, _) = memory_store();
    let r1 = store.create(note("R1")).await.unwrap();
    let r2 = store.create(note("R2")).await.unwrap();
    let child = store
        .create(note("Child").with_parent(r1.clone()))
        .await
        .unwrap();
    let leaf = store
        .create(note("Leaf").with_parent(child.clone()))
        .await
        .unwrap();
    assert_tree(&store).await;

    store
        .update(&child, EntityPatch::parent(Some(r2.clone())))
        .await
        .unwrap();
    assert_tree(&store).await;
    assert!(store.get(&r1).await.unwrap().children.is_empty());

    store.save(&child).await.unwrap();
    assert_tree(&store).await;
    assert_eq!(store.get(&r2).await.unwrap().children, vec![child.clone()]);

    store.update(&child, EntityPatch::parent(None)).await.unwrap();
    assert_tree(&store).await;

    store.delete(&child).await.unwrap();
    assert!(store.get(&leaf).await.is_none());
    assert_eq!(store.list().await.len(), 2);
    assert_tree(&store).await;
}

#[tokio::test]
async fn edits_made_before_create_confirms_survive_the_id_swap() {
    let (backend, mut arrivals) =
        GatedBackend::new(InMemoryEntityBackend::new().with_next_id(42));
    let store = EntityStore::new(backend.clone(), 64);

    let t1 = store.insert_optimistic(note("Untitled")).await.unwrap();
    assert!(t1.starts_with("temp-"));

    backend.gate(true);
    let dispatch = tokio::spawn({
        let store = store.clone();
        let t1 = t1.clone();
        async move { store.dispatch_create(&t1).await }
    });
    let release = arrivals.recv().await.unwrap();
    assert_eq!(store.pending_operations(&t1).await, vec![Operation::Create]);
    assert!(store.update(&t1, EntityPatch::title("X")).await.unwrap());
    release.send(()).unwrap();

    assert_eq!(dispatch.await.unwrap().unwrap(), "42");
    let confirmed = store.get("42").await.unwrap();
    assert_eq!(confirmed.title, "X");
    assert_eq!(store.resolve_id(&t1).await, "42");
    assert_eq!(store.get(&t1).await.map(|e| e.id), Some("42".to_string()));
    assert!(store.is_dirty("42").await);
    assert!(store.pending_operations("42").await.is_empty());

    backend.gate(false);
    store.save("42").await.unwrap();
    assert!(!store.is_dirty("42").await);
    assert_eq!(backend.inner.snapshot("42").await.unwrap().title, "X");
}

#[tokio::test]
async fn children_created_under_a_temp_parent_are_reparented() {
    let (backend, mut arrivals) = GatedBackend::new(InMemoryEntityBackend::new());
    let store = EntityStore::new(backend.clone(), 64);

    let parent = store.insert_optimistic(note("Folder")).await.unwrap();
    let child = store
        .insert_optimistic(note("Inside").with_parent(parent.clone()))
        .await
        .unwrap();

    backend.gate(true);
    let dispatch = tokio::spawn({
        let store = store.clone();
        let parent = parent.clone();
        async move { store.dispatch_create(&parent).await }
    });
    let release = arrivals.recv().await.unwrap();
    assert_eq!(
        store.delete(&parent).await.unwrap_err(),
        EntityError::Pending(parent.clone())
    );
    release.send(()).unwrap();
    let real = dispatch.await.unwrap().unwrap();

    let moved = store.get(&child).await.unwrap();
    assert_eq!(moved.parent.as_deref(), Some(real.as_str()));
    assert_tree(&store).await;
}

#[tokio::test]
async fn child_create_waits_for_parent_in_flight() {
    let (backend, mut arrivals) = GatedBackend::new(InMemoryEntityBackend::new());
    let store = EntityStore::new(backend.clone(), 64);
    let folder = store.insert_optimistic(note("Folder")).await.unwrap();
    let inside = store
        .insert_optimistic(note("Inside").with_parent(folder.clone()))
        .await
        .unwrap();

    backend.gate(true);
    let parent_dispatch = tokio::spawn({
        let store = store.clone();
        let folder = folder.clone();
        async move { store.dispatch_create(&folder).await }
    });
    let release = arrivals.recv().await.unwrap();
    backend.gate(false);

    let child_dispatch = tokio::spawn({
        let store = store.clone();
        let inside = inside.clone();
        async move { store.dispatch_create(&inside).await }
    });
    while !store
        .pending_operations(&inside)
        .await
        .contains(&Operation::Create)
    {
        tokio::task::yield_now().await;
    }
    assert!(is_temp_id(&store.resolve_id(&inside).await));

    release.send(()).unwrap();
    let folder_id = parent_dispatch.await.unwrap().unwrap();
    let inside_id = child_dispatch.await.unwrap().unwrap();

    let server = backend.inner.snapshot(&inside_id).await.unwrap();
    assert_eq!(server.parent.as_deref(), Some(folder_id.as_str()));
    assert!(store.errors().await.is_empty());
    assert_tree(&store).await;
}

#[tokio::test]
async fn child_of_idle_unconfirmed_parent_is_refused_without_backend_call() {
    let (store, backend) = memory_store();
    let folder = store.insert_optimistic(note("Folder")).await.unwrap();
    let inside = store
        .insert_optimistic(note("Inside").with_parent(folder.clone()))
        .await
        .unwrap();

    assert_eq!(
        store.dispatch_create(&inside).await.unwrap_err(),
        EntityError::Pending(folder.clone())
    );
    assert!(backend.list().await.unwrap().is_empty());
    assert!(store.pending_operations(&inside).await.is_empty());
    let errors = store.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].entity_id.as_deref(), Some(inside.as_str()));

    let folder_id = store.dispatch_create(&folder).await.unwrap();
    let inside_id = store.dispatch_create(&inside).await.unwrap();
    let server = backend.snapshot(&inside_id).await.unwrap();
    assert_eq!(server.parent.as_deref(), Some(folder_id.as_str()));
    assert!(store.errors().await.is_empty());
}

#[tokio::test]
async fn late_save_response_does_not_clobber_newer_edit() {
    let (backend, mut arrivals) = GatedBackend::new(InMemoryEntityBackend::new());
    let store = EntityStore::new(backend.clone(), 64);
    let id = store.create(note("Doc")).await.unwrap();

    backend.gate(true);
    store.update(&id, EntityPatch::title("one")).await.unwrap();
    let save = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.save(&id).await }
    });
    let release = arrivals.recv().await.unwrap();
    store.update(&id, EntityPatch::title("two")).await.unwrap();
    release.send(()).unwrap();
    save.await.unwrap().unwrap();

    assert_eq!(store.get(&id).await.unwrap().title, "two");
    assert!(store.is_dirty(&id).await);
}

#[tokio::test]
async fn out_of_order_save_responses_keep_the_newest() {
    let (backend, mut arrivals) = GatedBackend::new(InMemoryEntityBackend::new());
    let store = EntityStore::new(backend.clone(), 64);
    let id = store.create(note("Doc")).await.unwrap();

    backend.gate(true);
    let spawn_save =
        |store: EntityStore, id: String| tokio::spawn(async move { store.save(&id).await });

    store.update(&id, EntityPatch::title("one")).await.unwrap();
    let first = spawn_save(store.clone(), id.clone());
    let release_first = arrivals.recv().await.unwrap();

    store.update(&id, EntityPatch::title("two")).await.unwrap();
    let second = spawn_save(store.clone(), id.clone());
    let release_second = arrivals.recv().await.unwrap();

    release_second.send(()).unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(store.get(&id).await.unwrap().title, "two");
    assert!(!store.is_dirty(&id).await);

    release_first.send(()).unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(store.get(&id).await.unwrap().title, "two");
    // the backend took the older write last, so the entity must go out again
    assert!(store.is_dirty(&id).await);

    backend.gate(false);
    store.save(&id).await.unwrap();
    assert_eq!(backend.inner.snapshot(&id).await.unwrap().title, "two");
    assert!(!store.is_dirty(&id).await);
}

#[tokio::test]
async fn save_resolving_after_delete_is_a_no_op() {
    let (backend, mut arrivals) = GatedBackend::new(InMemoryEntityBackend::new());
    let store = EntityStore::new(backend.clone(), 64);
    let id = store.create(note("Doomed")).await.unwrap();
    store.update(&id, EntityPatch::content("edits")).await.unwrap();

    backend.gate(true);
    let save = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.save(&id).await }
    });
    let release_save = arrivals.recv().await.unwrap();

    let delete = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.delete(&id).await }
    });
    arrivals.recv().await.unwrap().send(()).unwrap();
    delete.await.unwrap().unwrap();
    assert!(store.get(&id).await.is_none());

    release_save.send(()).unwrap();
    save.await.unwrap().unwrap();
    assert!(store.get(&id).await.is_none());
    assert!(store.list().await.is_empty());
    assert!(store.errors().await.is_empty());
}

#[tokio::test]
async fn failed_save_keeps_entity_dirty_and_records_error() {
    let (store, backend) = memory_store();
    let id = store.create(note("Draft")).await.unwrap();
    store.update(&id, EntityPatch::content("text")).await.unwrap();

    backend.fail_next(EntityError::Network("timeout".into())).await;
    let err = store.save(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(store.is_dirty(&id).await);
    assert_eq!(store.get(&id).await.unwrap().content, "text");

    let errors = store.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].operation, Operation::Save);
    assert_eq!(errors[0].entity_id.as_deref(), Some(id.as_str()));

    store.save(&id).await.unwrap();
    assert!(!store.is_dirty(&id).await);
    assert!(store.errors().await.is_empty());
}

#[tokio::test]
async fn failed_create_keeps_optimistic_entity_for_retry() {
    let (store, backend) = memory_store();
    backend.fail_next(EntityError::Network("offline".into())).await;

    let err = store.create(note("Offline note")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    let pending = store.list().await;
    assert_eq!(pending.len(), 1);
    let temp = pending[0].id.clone();
    assert!(pending[0].is_temporary());
    assert!(store.is_dirty(&temp).await);
    assert_eq!(store.errors().await[0].operation, Operation::Create);
    assert_eq!(
        store.save(&temp).await.unwrap_err(),
        EntityError::Pending(temp.clone())
    );

    let real = store.dispatch_create(&temp).await.unwrap();
    assert_eq!(real, "1");
    assert!(!store.is_dirty(&real).await);
    assert!(store.errors().await.is_empty());
}

#[tokio::test]
async fn deleting_unconfirmed_entity_stays_local() {
    let (store, backend) = memory_store();
    let parent = store.insert_optimistic(note("Local")).await.unwrap();
    store
        .insert_optimistic(note("Local child").with_parent(parent.clone()))
        .await
        .unwrap();
    let mut rx = store.subscribe();

    backend.fail_next(EntityError::Network("must not be called".into())).await;
    store.delete(&parent).await.unwrap();
    assert!(store.list().await.is_empty());
    assert!(store.dirty_ids().await.is_empty());

    let mut deleted = 0;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.kind, EntityEventKind::Deleted);
        deleted += 1;
    }
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn delete_prunes_children_and_link_graph() {
    let (store, _) = memory_store();
    let projector = LinkGraphProjector::new(store.clone());
    let mut rx = store.subscribe();

    let a = store
        .create(note("A").with_content("see [[B]]"))
        .await
        .unwrap();
    let b = store.create(note("B").with_parent(a.clone())).await.unwrap();
    while let Ok(event) = rx.try_recv() {
        projector.apply(&event).await;
    }
    let index = projector.index();
    let before = traverse(&*index.read().await, Some(a.as_str()), 2).unwrap();
    assert_eq!(before.nodes.len(), 2);

    store.delete(&b).await.unwrap();
    while let Ok(event) = rx.try_recv() {
        projector.apply(&event).await;
    }
    assert!(store.get(&a).await.unwrap().children.is_empty());
    let guard = index.read().await;
    assert!(!guard.contains(&b));
    let view = traverse(&*guard, Some(a.as_str()), 2).unwrap();
    assert_eq!(view.nodes.len(), 1);
    assert_eq!(view.nodes[0].id, a);
    assert!(view.edges.is_empty());
}

#[tokio::test]
async fn rejects_invalid_titles_cycles_and_unknown_parents() {
    let (store, _) = memory_store();
    assert!(matches!(
        store.create(note("   ")).await,
        Err(EntityError::Validation(_))
    ));
    assert!(matches!(
        store.create(note(&"x".repeat(101))).await,
        Err(EntityError::Validation(_))
    ));
    assert!(store.list().await.is_empty());

    let a = store.create(note("A")).await.unwrap();
    let b = store.create(note("B").with_parent(a.clone())).await.unwrap();
    assert!(matches!(
        store.update(&a, EntityPatch::parent(Some(b.clone()))).await,
        Err(EntityError::Validation(_))
    ));
    assert!(matches!(
        store.update(&a, EntityPatch::parent(Some(a.clone()))).await,
        Err(EntityError::Validation(_))
    ));
    assert_eq!(
        store
            .update(&a, EntityPatch::parent(Some("ghost".into())))
            .await
            .unwrap_err(),
        EntityError::NotFound("ghost".into())
    );
    assert!(!store.is_dirty(&a).await);
    assert_tree(&store).await;
}

#[tokio::test]
async fn tag_changes_apply_without_dirtying() {
    let (store, backend) = memory_store();
    let id = store
        .create(EntityDraft::new(EntityType::Media, "Photo"))
        .await
        .unwrap();
    let other = store.create(note("Other")).await.unwrap();

    store
        .add_tags(&id, &["travel".to_string(), "2024".to_string()])
        .await
        .unwrap();
    assert!(!store.is_dirty(&id).await);
    let tagged = store.entities_by_tags(&["travel".to_string()]).await;
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, id);

    store.remove_tags(&id, &["travel".to_string()]).await.unwrap();
    assert!(store.entities_by_tags(&["travel".to_string()]).await.is_empty());
    assert_eq!(
        backend.snapshot(&id).await.unwrap().tags.into_iter().collect::<Vec<_>>(),
        vec!["2024".to_string()]
    );
    assert!(store.get(&other).await.unwrap().tags.is_empty());

    let temp = store.insert_optimistic(note("Unsent")).await.unwrap();
    assert_eq!(
        store.add_tags(&temp, &["x".to_string()]).await.unwrap_err(),
        EntityError::Pending(temp.clone())
    );
}

#[tokio::test]
async fn reload_keeps_unconfirmed_local_state() {
    let backend = Arc::new(InMemoryEntityBackend::seeded(vec![
        seeded("1", "Server one", None),
        seeded("2", "Server two", Some("1")),
        seeded("3", "Gone soon", None),
    ]));
    let store = EntityStore::new(backend.clone(), 64);
    assert_eq!(store.load_all().await.unwrap(), 3);
    assert_eq!(store.get("1").await.unwrap().children, vec!["2".to_string()]);

    store.update("1", EntityPatch::title("Local one")).await.unwrap();
    let temp = store
        .insert_optimistic(note("Unsent").with_parent("1"))
        .await
        .unwrap();
    let orphan = store
        .insert_optimistic(note("Orphan").with_parent("3"))
        .await
        .unwrap();
    backend.delete("3").await.unwrap();

    let mut rx = store.subscribe();
    assert_eq!(store.load_all().await.unwrap(), 3);
    let one = store.get("1").await.unwrap();
    assert_eq!(one.title, "Local one");
    assert!(store.is_dirty("1").await);
    assert_eq!(one.children, vec!["2".to_string(), temp.clone()]);
    assert!(store.get("3").await.is_none());
    assert!(store.get(&orphan).await.is_none());
    assert_tree(&store).await;

    let kinds: Vec<EntityEventKind> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EntityEventKind::Deleted,
            EntityEventKind::Deleted,
            EntityEventKind::Reloaded
        ]
    );
}

#[tokio::test]
async fn failed_load_is_recorded() {
    let (store, backend) = memory_store();
    backend.fail_next(EntityError::Network("down".into())).await;
    assert!(store.load_all().await.is_err());
    let errors = store.errors().await;
    assert_eq!(errors[0].operation, Operation::Load);
    assert_eq!(errors[0].entity_id, None);

    store.load_all().await.unwrap();
    assert!(store.errors().await.is_empty());
}

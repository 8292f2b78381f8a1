use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, watch};

use crate::application::ports::entity_backend::EntityBackend;
use crate::domain::entities::entity::{
    Entity, EntityDraft, EntityPatch, LinkEntityData, compute_children, is_temp_id, new_temp_id,
    validate_title,
};
use crate::domain::entities::errors::{EntityError, Operation, OperationError};

mod events;
#[cfg(test)]
mod tests;

pub use events::{EntityEvent, EntityEventKind};

/// Sequence number of the last local edit, per field.
#[derive(Debug, Default, Clone, Copy)]
struct FieldStamps {
    title: u64,
    content: u64,
    parent: u64,
    entity_type: u64,
    metadata: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    create: bool,
    saves: usize,
    delete: bool,
}

impl Pending {
    fn is_idle(&self) -> bool {
        !self.create && self.saves == 0 && !self.delete
    }
}

#[derive(Default)]
struct StoreState {
    entities: HashMap<String, Entity>,
    dirty: HashSet<String>,
    stamps: HashMap<String, FieldStamps>,
    pending: HashMap<String, Pending>,
    // dispatch sequence of the newest save response applied per entity
    applied_saves: HashMap<String, u64>,
    aliases: HashMap<String, String>,
    errors: HashMap<(Operation, String), OperationError>,
    seq: u64,
}

impl StoreState {
    fn resolve(&self, id: &str) -> String {
        self.aliases
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn record_error(&mut self, operation: Operation, id: Option<&str>, error: &EntityError) {
        let key = (operation, id.unwrap_or_default().to_string());
        self.errors.insert(
            key,
            OperationError::new(operation, id.map(str::to_string), error),
        );
    }

    fn clear_error(&mut self, operation: Operation, id: Option<&str>) {
        self.errors
            .remove(&(operation, id.unwrap_or_default().to_string()));
    }

    fn settle_pending(&mut self, id: &str, settle: impl FnOnce(&mut Pending)) {
        if let Some(p) = self.pending.get_mut(id) {
            settle(p);
            if p.is_idle() {
                self.pending.remove(id);
            }
        }
    }

    /// Moves `id` from `old_parent`'s children to `new_parent`'s children.
    fn relink(&mut self, id: &str, old_parent: Option<&str>, new_parent: Option<&str>) {
        if let Some(parent) = old_parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.retain(|c| c != id);
        }
        if let Some(parent) = new_parent.and_then(|p| self.entities.get_mut(p)) {
            if let Err(pos) = parent.children.binary_search_by(|c| c.as_str().cmp(id)) {
                parent.children.insert(pos, id.to_string());
            }
        }
    }

    fn would_cycle(&self, id: &str, new_parent: &str) -> bool {
        let mut cursor = Some(new_parent.to_string());
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == id || steps > self.entities.len() {
                return true;
            }
            cursor = self.entities.get(&current).and_then(|e| e.parent.clone());
            steps += 1;
        }
        false
    }

    fn forget(&mut self, id: &str) {
        self.dirty.remove(id);
        self.stamps.remove(id);
        self.pending.remove(id);
        self.applied_saves.remove(id);
    }

    /// Removes a never-confirmed entity and its descendants without a backend call.
    fn remove_local_subtree(&mut self, id: &str) -> Vec<EntityEvent> {
        let parent = self.entities.get(id).and_then(|e| e.parent.clone());
        self.relink(id, parent.as_deref(), None);

        let mut events = Vec::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(next) = queue.pop_front() {
            if let Some(removed) = self.entities.remove(&next) {
                queue.extend(removed.children.iter().cloned());
                self.forget(&next);
                events.push(EntityEvent::deleted(next, Some(removed.link_data())));
            }
        }
        events
    }

    /// Replaces the set with the server's, keeping unconfirmed local state:
    /// dirty entities keep their edited fields and never-confirmed entities
    /// survive as long as their parent does.
    fn replace_all(&mut self, server: Vec<Entity>) -> Vec<EntityEvent> {
        let mut next: HashMap<String, Entity> = server
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let known: HashSet<String> = next.keys().cloned().collect();
        for (id, incoming) in next.iter_mut() {
            if !self.dirty.contains(id) {
                continue;
            }
            let Some(local) = self.entities.get(id) else {
                continue;
            };
            incoming.title = local.title.clone();
            incoming.content = local.content.clone();
            incoming.entity_type = local.entity_type;
            incoming.metadata = local.metadata.clone();
            let parent_alive = local.parent.as_ref().is_none_or(|p| known.contains(p));
            if parent_alive {
                incoming.parent = local.parent.clone();
            }
        }

        let mut local_only: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| is_temp_id(&e.id))
            .collect();
        loop {
            let before = local_only.len();
            local_only.retain(|e| {
                let attached = e.parent.as_ref().is_none_or(|p| next.contains_key(p));
                if attached {
                    next.insert(e.id.clone(), (*e).clone());
                }
                !attached
            });
            if local_only.is_empty() || local_only.len() == before {
                break;
            }
        }

        let removed: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();
        let mut events = Vec::with_capacity(removed.len() + 1);
        for id in removed {
            let old = self.entities.get(&id).map(Entity::link_data);
            self.forget(&id);
            events.push(EntityEvent::deleted(id, old));
        }

        compute_children(&mut next);
        self.entities = next;
        events.push(EntityEvent::reloaded());
        events
    }
}

enum CreateClaim {
    /// Already has a server id.
    Confirmed(String),
    /// Marked in flight; the caller sends it.
    Claimed(String),
}

fn same_fields(a: &Entity, b: &Entity) -> bool {
    a.title == b.title
        && a.content == b.content
        && a.parent == b.parent
        && a.entity_type == b.entity_type
        && a.metadata == b.metadata
}

/// Takes the server entity, except for fields edited locally after the write
/// was dispatched. Returns whether any such field was kept.
fn merge_confirmed(
    local: &Entity,
    server: Entity,
    dispatch_seq: u64,
    stamps: &FieldStamps,
) -> (Entity, bool) {
    let mut merged = server;
    let mut kept_local = false;
    if stamps.title > dispatch_seq && merged.title != local.title {
        merged.title = local.title.clone();
        kept_local = true;
    }
    if stamps.content > dispatch_seq && merged.content != local.content {
        merged.content = local.content.clone();
        kept_local = true;
    }
    if stamps.parent > dispatch_seq && merged.parent != local.parent {
        merged.parent = local.parent.clone();
        kept_local = true;
    }
    if stamps.entity_type > dispatch_seq && merged.entity_type != local.entity_type {
        merged.entity_type = local.entity_type;
        kept_local = true;
    }
    if stamps.metadata > dispatch_seq && merged.metadata != local.metadata {
        merged.metadata = local.metadata.clone();
        kept_local = true;
    }
    merged.children = local.children.clone();
    (merged, kept_local)
}

/// Canonical in-memory entity set and the only writer of entity state.
///
/// Every mutation is applied locally first and published on the event
/// channel; backend calls run without holding the state lock, so writes to
/// different entities proceed independently.
#[derive(Clone)]
pub struct EntityStore {
    state: Arc<RwLock<StoreState>>,
    backend: Arc<dyn EntityBackend>,
    events: broadcast::Sender<EntityEvent>,
    // bumped whenever a create settles, successfully or not
    creates_settled: Arc<watch::Sender<u64>>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn EntityBackend>, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        let (creates_settled, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            backend,
            events,
            creates_settled: Arc::new(creates_settled),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: EntityEvent) {
        // No subscribers is fine; the store stays authoritative either way.
        let _ = self.events.send(event);
    }

    pub async fn load_all(&self) -> Result<usize, EntityError> {
        let result = self.backend.list().await;
        let mut state = self.state.write().await;
        match result {
            Ok(server) => {
                let events = state.replace_all(server);
                state.clear_error(Operation::Load, None);
                let count = state.entities.len();
                for event in events {
                    self.publish(event);
                }
                tracing::info!(count, "entities_loaded");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(error = ?e, "entities_load_failed");
                state.record_error(Operation::Load, None, &e);
                Err(e)
            }
        }
    }

    /// Inserts the draft under a temporary id and returns that id. Nothing is
    /// sent to the backend until `dispatch_create`.
    pub async fn insert_optimistic(&self, draft: EntityDraft) -> Result<String, EntityError> {
        let title = validate_title(&draft.title)?;
        let mut state = self.state.write().await;
        let parent = match draft.parent.as_deref() {
            Some(p) => {
                let p = state.resolve(p);
                if !state.entities.contains_key(&p) {
                    return Err(EntityError::NotFound(p));
                }
                Some(p)
            }
            None => None,
        };

        let id = new_temp_id();
        let now = chrono::Utc::now();
        let entity = Entity {
            id: id.clone(),
            entity_type: draft.entity_type,
            title,
            content: draft.content,
            parent: parent.clone(),
            children: Vec::new(),
            tags: draft.tags,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        let data = entity.link_data();
        state.entities.insert(id.clone(), entity);
        state.relink(&id, None, parent.as_deref());
        state.dirty.insert(id.clone());
        self.publish(EntityEvent::created(data));
        tracing::debug!(entity_id = %id, "entity_inserted_optimistically");
        Ok(id)
    }

    /// Sends a locally inserted entity to the backend and swaps in the server
    /// id on success. On failure the entity stays in place for a retry.
    ///
    /// A child of an unconfirmed parent waits for the parent's create to
    /// settle so the backend only ever sees server ids. If the parent's create
    /// is not in flight the child is refused with `Pending`.
    pub async fn dispatch_create(&self, id: &str) -> Result<String, EntityError> {
        match self.claim_create(id).await? {
            CreateClaim::Confirmed(id) => Ok(id),
            CreateClaim::Claimed(temp_id) => self.send_create(temp_id).await,
        }
    }

    /// Like `dispatch_create`, but only the claim is awaited: the create
    /// counts as in flight once this returns and the backend call runs in the
    /// background. Failures are recorded on the store.
    pub async fn spawn_create(&self, id: &str) -> Result<(), EntityError> {
        if let CreateClaim::Claimed(temp_id) = self.claim_create(id).await? {
            let store = self.clone();
            tokio::spawn(async move {
                if let Err(e) = store.send_create(temp_id.clone()).await {
                    tracing::debug!(entity_id = %temp_id, error = ?e, "background_entity_create_failed");
                }
            });
        }
        Ok(())
    }

    async fn claim_create(&self, id: &str) -> Result<CreateClaim, EntityError> {
        let mut state = self.state.write().await;
        let temp_id = state.resolve(id);
        if !is_temp_id(&temp_id) {
            return Ok(CreateClaim::Confirmed(temp_id));
        }
        if !state.entities.contains_key(&temp_id) {
            return Err(EntityError::NotFound(temp_id));
        }
        let pending = state.pending.entry(temp_id.clone()).or_default();
        if pending.create {
            return Err(EntityError::Pending(temp_id));
        }
        pending.create = true;
        Ok(CreateClaim::Claimed(temp_id))
    }

    async fn send_create(&self, temp_id: String) -> Result<String, EntityError> {
        let mut settled = self.creates_settled.subscribe();
        let (draft, dispatch_seq) = loop {
            let mut state = self.state.write().await;
            let (draft, temp_parent) = match state.entities.get(&temp_id) {
                Some(e) => (
                    EntityDraft {
                        entity_type: e.entity_type,
                        title: e.title.clone(),
                        content: e.content.clone(),
                        parent: e.parent.clone(),
                        tags: e.tags.clone(),
                        metadata: e.metadata.clone(),
                    },
                    e.parent.clone().filter(|p| is_temp_id(p)),
                ),
                None => {
                    state.settle_pending(&temp_id, |p| p.create = false);
                    return Err(EntityError::NotFound(temp_id));
                }
            };
            let Some(parent) = temp_parent else {
                break (draft, state.seq);
            };
            if !state.pending.get(&parent).is_some_and(|p| p.create) {
                state.settle_pending(&temp_id, |p| p.create = false);
                let e = EntityError::Pending(parent);
                tracing::debug!(entity_id = %temp_id, error = ?e, "entity_create_parent_unconfirmed");
                state.record_error(Operation::Create, Some(&temp_id), &e);
                return Err(e);
            }
            drop(state);
            tracing::debug!(entity_id = %temp_id, parent_id = %parent, "entity_create_waits_for_parent");
            if settled.changed().await.is_err() {
                let mut state = self.state.write().await;
                state.settle_pending(&temp_id, |p| p.create = false);
                return Err(EntityError::Pending(parent));
            }
        };

        let result = self.backend.create(&draft).await;

        let mut state = self.state.write().await;
        state.settle_pending(&temp_id, |p| p.create = false);
        self.creates_settled.send_modify(|n| *n += 1);
        let server = match result {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(entity_id = %temp_id, error = ?e, "entity_create_failed");
                state.record_error(Operation::Create, Some(&temp_id), &e);
                return Err(e);
            }
        };

        let Some(local) = state.entities.remove(&temp_id) else {
            tracing::warn!(temp_id = %temp_id, entity_id = %server.id, "created_entity_removed_locally");
            return Ok(server.id);
        };
        let new_id = server.id.clone();
        state.relink(&temp_id, local.parent.as_deref(), None);
        for e in state.entities.values_mut() {
            if e.parent.as_deref() == Some(temp_id.as_str()) {
                e.parent = Some(new_id.clone());
            }
        }

        let stamps = state.stamps.remove(&temp_id).unwrap_or_default();
        let (merged, still_dirty) = merge_confirmed(&local, server, dispatch_seq, &stamps);
        let parent = merged.parent.clone();
        let (old_data, new_data) = (local.link_data(), merged.link_data());
        state.entities.insert(new_id.clone(), merged);
        state.relink(&new_id, None, parent.as_deref());

        state.stamps.insert(new_id.clone(), stamps);
        state.dirty.remove(&temp_id);
        if still_dirty {
            state.dirty.insert(new_id.clone());
        }
        state.aliases.insert(temp_id.clone(), new_id.clone());
        state.clear_error(Operation::Create, Some(&temp_id));

        self.publish(EntityEvent::id_reassigned(old_data, new_data));
        tracing::info!(temp_id = %temp_id, entity_id = %new_id, "entity_created");
        Ok(new_id)
    }

    pub async fn create(&self, draft: EntityDraft) -> Result<String, EntityError> {
        let temp_id = self.insert_optimistic(draft).await?;
        self.dispatch_create(&temp_id).await
    }

    /// Merges the fields of `patch` that differ from the current values.
    /// Returns whether anything changed; the entity is dirtied only then.
    pub async fn update(&self, id: &str, patch: EntityPatch) -> Result<bool, EntityError> {
        let mut state = self.state.write().await;
        let id = state.resolve(id);
        let current = state
            .entities
            .get(&id)
            .cloned()
            .ok_or_else(|| EntityError::NotFound(id.clone()))?;

        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let parent = match patch.parent {
            Some(Some(p)) => {
                let p = state.resolve(&p);
                if !state.entities.contains_key(&p) {
                    return Err(EntityError::NotFound(p));
                }
                if state.would_cycle(&id, &p) {
                    return Err(EntityError::Validation(format!(
                        "moving {id} under {p} would create a cycle"
                    )));
                }
                Some(Some(p))
            }
            other => other,
        };

        let seq = state.seq + 1;
        let mut stamps = state.stamps.get(&id).copied().unwrap_or_default();
        let mut next = current.clone();
        if let Some(title) = title.filter(|t| *t != next.title) {
            next.title = title;
            stamps.title = seq;
        }
        if let Some(content) = patch.content.filter(|c| *c != next.content) {
            next.content = content;
            stamps.content = seq;
        }
        if let Some(parent) = parent.filter(|p| *p != next.parent) {
            next.parent = parent;
            stamps.parent = seq;
        }
        if let Some(entity_type) = patch.entity_type.filter(|t| *t != next.entity_type) {
            next.entity_type = entity_type;
            stamps.entity_type = seq;
        }
        if let Some(metadata) = patch.metadata.filter(|m| *m != next.metadata) {
            next.metadata = metadata;
            stamps.metadata = seq;
        }
        if next == current {
            return Ok(false);
        }

        state.seq = seq;
        state.stamps.insert(id.clone(), stamps);
        next.updated_at = chrono::Utc::now();
        if next.parent != current.parent {
            state.relink(&id, current.parent.as_deref(), next.parent.as_deref());
        }
        let (old_data, new_data) = (current.link_data(), next.link_data());
        state.entities.insert(id.clone(), next);
        state.dirty.insert(id.clone());
        self.publish(EntityEvent::updated(old_data, new_data));
        tracing::debug!(entity_id = %id, "entity_updated");
        Ok(true)
    }

    /// Submits the current state. A response is applied field by field:
    /// fields edited after dispatch keep their local value and keep the
    /// entity dirty. Responses older than an applied one are dropped.
    pub async fn save(&self, id: &str) -> Result<(), EntityError> {
        let (snapshot, dispatch_seq) = {
            let mut state = self.state.write().await;
            let id = state.resolve(id);
            let entity = state
                .entities
                .get(&id)
                .cloned()
                .ok_or_else(|| EntityError::NotFound(id.clone()))?;
            if is_temp_id(&id) {
                return Err(EntityError::Pending(id));
            }
            state.pending.entry(id).or_default().saves += 1;
            let seq = state.seq;
            (entity, seq)
        };
        let id = snapshot.id.clone();

        let result = self.backend.update(&snapshot).await;

        let mut state = self.state.write().await;
        state.settle_pending(&id, |p| p.saves = p.saves.saturating_sub(1));
        let server = match result {
            Ok(server) => server,
            Err(e) if !state.entities.contains_key(&id) => {
                tracing::debug!(entity_id = %id, error = ?e, "save_failed_after_delete");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(entity_id = %id, error = ?e, "entity_save_failed");
                state.record_error(Operation::Save, Some(&id), &e);
                return Err(e);
            }
        };

        let Some(local) = state.entities.get(&id).cloned() else {
            tracing::debug!(entity_id = %id, "save_resolved_after_delete");
            return Ok(());
        };
        if state
            .applied_saves
            .get(&id)
            .is_some_and(|applied| *applied > dispatch_seq)
        {
            // The backend may now hold this older write; resend on the next save.
            if !same_fields(&local, &server) {
                state.dirty.insert(id.clone());
            }
            tracing::debug!(entity_id = %id, dispatch_seq, "stale_save_response_dropped");
            return Ok(());
        }
        state.applied_saves.insert(id.clone(), dispatch_seq);

        let stamps = state.stamps.get(&id).copied().unwrap_or_default();
        let (mut merged, still_dirty) = merge_confirmed(&local, server, dispatch_seq, &stamps);
        merged.id = id.clone();
        if merged
            .parent
            .as_ref()
            .is_some_and(|p| !state.entities.contains_key(p) || state.would_cycle(&id, p))
        {
            merged.parent = local.parent.clone();
        }
        if merged.parent != local.parent {
            state.relink(&id, local.parent.as_deref(), merged.parent.as_deref());
        }

        let (old_data, new_data) = (local.link_data(), merged.link_data());
        state.entities.insert(id.clone(), merged);
        if still_dirty {
            state.dirty.insert(id.clone());
        } else {
            state.dirty.remove(&id);
        }
        state.clear_error(Operation::Save, Some(&id));
        self.publish(EntityEvent::saved(old_data, new_data));
        tracing::debug!(entity_id = %id, still_dirty, "entity_saved");
        Ok(())
    }

    /// Removes the entity. The backend cascades to descendants and answers
    /// with the remaining set, which replaces the local one.
    pub async fn delete(&self, id: &str) -> Result<(), EntityError> {
        let id = {
            let mut state = self.state.write().await;
            let id = state.resolve(id);
            if !state.entities.contains_key(&id) {
                return Err(EntityError::NotFound(id));
            }
            if is_temp_id(&id) {
                if state.pending.get(&id).is_some_and(|p| p.create) {
                    return Err(EntityError::Pending(id));
                }
                for event in state.remove_local_subtree(&id) {
                    self.publish(event);
                }
                tracing::debug!(entity_id = %id, "local_entity_discarded");
                return Ok(());
            }
            state.pending.entry(id.clone()).or_default().delete = true;
            id
        };

        let result = self.backend.delete(&id).await;

        let mut state = self.state.write().await;
        state.settle_pending(&id, |p| p.delete = false);
        match result {
            Ok(remaining) => {
                let events = state.replace_all(remaining);
                state.clear_error(Operation::Delete, Some(&id));
                let removed = events.len().saturating_sub(1);
                for event in events {
                    self.publish(event);
                }
                tracing::info!(entity_id = %id, removed, "entity_deleted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(entity_id = %id, error = ?e, "entity_delete_failed");
                state.record_error(Operation::Delete, Some(&id), &e);
                Err(e)
            }
        }
    }

    pub async fn add_tags(&self, id: &str, tag_ids: &[String]) -> Result<(), EntityError> {
        self.change_tags(id, tag_ids, true).await
    }

    pub async fn remove_tags(&self, id: &str, tag_ids: &[String]) -> Result<(), EntityError> {
        self.change_tags(id, tag_ids, false).await
    }

    async fn change_tags(&self, id: &str, tag_ids: &[String], add: bool) -> Result<(), EntityError> {
        let id = {
            let state = self.state.read().await;
            let id = state.resolve(id);
            if !state.entities.contains_key(&id) {
                return Err(EntityError::NotFound(id));
            }
            if is_temp_id(&id) {
                return Err(EntityError::Pending(id));
            }
            id
        };

        let result = if add {
            self.backend.add_tags(&id, tag_ids).await
        } else {
            self.backend.remove_tags(&id, tag_ids).await
        };

        let mut state = self.state.write().await;
        match result {
            Ok(server) => {
                state.clear_error(Operation::Tag, Some(&id));
                let Some(entity) = state.entities.get_mut(&id) else {
                    tracing::debug!(entity_id = %id, "tag_change_resolved_after_delete");
                    return Ok(());
                };
                if entity.tags != server.tags {
                    let data = entity.link_data();
                    entity.tags = server.tags;
                    entity.updated_at = server.updated_at;
                    self.publish(EntityEvent::updated(data.clone(), data));
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(entity_id = %id, error = ?e, "entity_tag_change_failed");
                state.record_error(Operation::Tag, Some(&id), &e);
                Err(e)
            }
        }
    }

    pub async fn resolve_id(&self, id: &str) -> String {
        self.state.read().await.resolve(id)
    }

    pub async fn get(&self, id: &str) -> Option<Entity> {
        let state = self.state.read().await;
        state.entities.get(&state.resolve(id)).cloned()
    }

    pub async fn list(&self) -> Vec<Entity> {
        let state = self.state.read().await;
        let mut items: Vec<Entity> = state.entities.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    /// Entities carrying any of the given tags.
    pub async fn entities_by_tags(&self, tag_ids: &[String]) -> Vec<Entity> {
        let state = self.state.read().await;
        let mut items: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| tag_ids.iter().any(|t| e.tags.contains(t)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub async fn link_snapshot(&self) -> Vec<LinkEntityData> {
        let state = self.state.read().await;
        state.entities.values().map(Entity::link_data).collect()
    }

    pub async fn is_dirty(&self, id: &str) -> bool {
        let state = self.state.read().await;
        state.dirty.contains(&state.resolve(id))
    }

    /// Number of ancestors of `id` still waiting for a server id.
    pub async fn unconfirmed_ancestors(&self, id: &str) -> usize {
        let state = self.state.read().await;
        let mut cursor = state.entities.get(&state.resolve(id)).and_then(|e| e.parent.clone());
        let mut depth = 0;
        while let Some(parent) = cursor.filter(|p| is_temp_id(p)) {
            depth += 1;
            if depth > state.entities.len() {
                break;
            }
            cursor = state.entities.get(&parent).and_then(|e| e.parent.clone());
        }
        depth
    }

    pub async fn dirty_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state.dirty.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn pending_operations(&self, id: &str) -> Vec<Operation> {
        let state = self.state.read().await;
        let Some(p) = state.pending.get(&state.resolve(id)).copied() else {
            return Vec::new();
        };
        let mut ops = Vec::new();
        if p.create {
            ops.push(Operation::Create);
        }
        if p.saves > 0 {
            ops.push(Operation::Save);
        }
        if p.delete {
            ops.push(Operation::Delete);
        }
        ops
    }

    pub async fn errors(&self) -> Vec<OperationError> {
        let state = self.state.read().await;
        let mut errors: Vec<OperationError> = state.errors.values().cloned().collect();
        errors.sort_by_key(|e| e.at);
        errors
    }
}

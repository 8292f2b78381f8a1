use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::entity_backend::EntityBackend;
use crate::domain::entities::entity::{Entity, EntityDraft, validate_title};
use crate::domain::entities::errors::EntityError;

/// Backend kept in process memory. Mirrors the server rules the store relies
/// on: ids are assigned here, `delete` cascades to descendants and answers
/// with the remaining set.
pub struct InMemoryEntityBackend {
    entities: Mutex<HashMap<String, Entity>>,
    next_id: AtomicU64,
    failures: Mutex<VecDeque<EntityError>>,
}

impl Default for InMemoryEntityBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEntityBackend {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn seeded(entities: Vec<Entity>) -> Self {
        let map = entities
            .into_iter()
            .map(|mut e| {
                e.children.clear();
                (e.id.clone(), e)
            })
            .collect();
        Self {
            entities: Mutex::new(map),
            ..Self::new()
        }
    }

    pub fn with_next_id(self, next: u64) -> Self {
        self.next_id.store(next, Ordering::SeqCst);
        self
    }

    /// Makes the next call, whatever it is, fail with `error`.
    pub async fn fail_next(&self, error: EntityError) {
        self.failures.lock().await.push_back(error);
    }

    pub async fn snapshot(&self, id: &str) -> Option<Entity> {
        self.entities.lock().await.get(id).cloned()
    }

    async fn injected_failure(&self) -> Result<(), EntityError> {
        match self.failures.lock().await.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn sorted(map: &HashMap<String, Entity>) -> Vec<Entity> {
        let mut items: Vec<Entity> = map.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }
}

fn check_parent(map: &HashMap<String, Entity>, parent: Option<&str>) -> Result<(), EntityError> {
    match parent {
        Some(p) if !map.contains_key(p) => Err(EntityError::NotFound(p.to_string())),
        _ => Ok(()),
    }
}

#[async_trait]
impl EntityBackend for InMemoryEntityBackend {
    async fn list(&self) -> Result<Vec<Entity>, EntityError> {
        self.injected_failure().await?;
        Ok(Self::sorted(&*self.entities.lock().await))
    }

    async fn create(&self, draft: &EntityDraft) -> Result<Entity, EntityError> {
        self.injected_failure().await?;
        let title = validate_title(&draft.title)?;
        let mut map = self.entities.lock().await;
        check_parent(&map, draft.parent.as_deref())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let now = chrono::Utc::now();
        let entity = Entity {
            id: id.clone(),
            entity_type: draft.entity_type,
            title,
            content: draft.content.clone(),
            parent: draft.parent.clone(),
            children: Vec::new(),
            tags: draft.tags.clone(),
            metadata: draft.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        map.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, EntityError> {
        self.injected_failure().await?;
        let title = validate_title(&entity.title)?;
        let mut map = self.entities.lock().await;
        check_parent(&map, entity.parent.as_deref())?;
        let stored = map
            .get_mut(&entity.id)
            .ok_or_else(|| EntityError::NotFound(entity.id.clone()))?;
        stored.entity_type = entity.entity_type;
        stored.title = title;
        stored.content = entity.content.clone();
        stored.parent = entity.parent.clone();
        stored.tags = entity.tags.clone();
        stored.metadata = entity.metadata.clone();
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> Result<Vec<Entity>, EntityError> {
        self.injected_failure().await?;
        let mut map = self.entities.lock().await;
        if !map.contains_key(id) {
            return Err(EntityError::NotFound(id.to_string()));
        }
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(next) = queue.pop_front() {
            map.remove(&next);
            queue.extend(
                map.values()
                    .filter(|e| e.parent.as_deref() == Some(next.as_str()))
                    .map(|e| e.id.clone()),
            );
        }
        Ok(Self::sorted(&map))
    }

    async fn add_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        self.injected_failure().await?;
        let mut map = self.entities.lock().await;
        let stored = map
            .get_mut(id)
            .ok_or_else(|| EntityError::NotFound(id.to_string()))?;
        stored.tags.extend(tag_ids.iter().cloned());
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }

    async fn remove_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        self.injected_failure().await?;
        let mut map = self.entities.lock().await;
        let stored = map
            .get_mut(id)
            .ok_or_else(|| EntityError::NotFound(id.to_string()))?;
        for tag in tag_ids {
            stored.tags.remove(tag);
        }
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }
}

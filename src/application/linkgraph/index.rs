use std::collections::{BTreeSet, HashMap};

use crate::application::linkgraph::parser::EntityLookup;
use crate::domain::entities::entity::LinkEntityData;

/// Derived projection of the entity set used for navigation and the graph view.
///
/// Only `rebuild_all`, `patch_one` and `remove` mutate it. Besides the entries
/// it keeps the root list, a children map derived from `parent` and a
/// lowercase title map for link resolution.
#[derive(Debug, Default, Clone)]
pub struct LinkGraphIndex {
    entries: HashMap<String, LinkEntityData>,
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
    titles: HashMap<String, BTreeSet<String>>,
    generation: u64,
}

fn insert_sorted(list: &mut Vec<String>, id: &str) {
    if let Err(pos) = list.binary_search_by(|probe| probe.as_str().cmp(id)) {
        list.insert(pos, id.to_string());
    }
}

fn remove_sorted(list: &mut Vec<String>, id: &str) {
    if let Ok(pos) = list.binary_search_by(|probe| probe.as_str().cmp(id)) {
        list.remove(pos);
    }
}

impl LinkGraphIndex {
    pub fn rebuild_all<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = LinkEntityData>,
    {
        self.entries.clear();
        self.roots.clear();
        self.children.clear();
        self.titles.clear();
        for e in entities {
            self.entries.insert(e.id.clone(), e);
        }
        for e in self.entries.values() {
            match &e.parent {
                Some(parent) => self
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(e.id.clone()),
                None => self.roots.push(e.id.clone()),
            }
            self.titles
                .entry(e.title.to_lowercase())
                .or_default()
                .insert(e.id.clone());
        }
        self.roots.sort();
        for list in self.children.values_mut() {
            list.sort();
        }
        self.generation += 1;
    }

    pub fn patch_one(&mut self, entity: LinkEntityData) {
        if let Some(previous) = self.entries.remove(&entity.id) {
            self.unlink(&previous);
        }
        self.link(&entity);
        self.entries.insert(entity.id.clone(), entity);
        self.generation += 1;
    }

    pub fn remove(&mut self, id: &str) -> Option<LinkEntityData> {
        let removed = self.entries.remove(id)?;
        self.unlink(&removed);
        self.generation += 1;
        Some(removed)
    }

    fn link(&mut self, e: &LinkEntityData) {
        match &e.parent {
            Some(parent) => insert_sorted(self.children.entry(parent.clone()).or_default(), &e.id),
            None => insert_sorted(&mut self.roots, &e.id),
        }
        self.titles
            .entry(e.title.to_lowercase())
            .or_default()
            .insert(e.id.clone());
    }

    fn unlink(&mut self, e: &LinkEntityData) {
        match &e.parent {
            Some(parent) => {
                if let Some(list) = self.children.get_mut(parent) {
                    remove_sorted(list, &e.id);
                    if list.is_empty() {
                        self.children.remove(parent);
                    }
                }
            }
            None => remove_sorted(&mut self.roots, &e.id),
        }
        let key = e.title.to_lowercase();
        if let Some(ids) = self.titles.get_mut(&key) {
            ids.remove(&e.id);
            if ids.is_empty() {
                self.titles.remove(&key);
            }
        }
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation; lets readers tell whether a cached view is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl EntityLookup for LinkGraphIndex {
    fn get(&self, id: &str) -> Option<&LinkEntityData> {
        self.entries.get(id)
    }

    fn find_by_title(&self, title: &str) -> Option<&str> {
        let ids = self.titles.get(&title.to_lowercase())?;
        ids.iter()
            .find(|id| self.entries.get(*id).is_some_and(|e| e.title == title))
            .or_else(|| ids.iter().next())
            .map(String::as_str)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &LinkEntityData> + '_> {
        Box::new(self.entries.values())
    }
}

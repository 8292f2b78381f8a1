use serde::Serialize;

use crate::application::linkgraph::parser::{EntityLookup, referenced_targets};
use crate::application::services::entity_store::{EntityEvent, EntityEventKind};
use crate::domain::entities::entity::LinkEntityData;

/// How much of the link projection a mutation invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    None,
    Local,
    Global,
}

/// What the projector should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDecision {
    Skip,
    Patch(LinkEntityData),
    Rebuild,
    Remove(String),
}

impl ChangeDecision {
    pub fn scope(&self) -> ChangeScope {
        match self {
            ChangeDecision::Skip => ChangeScope::None,
            ChangeDecision::Patch(_) | ChangeDecision::Remove(_) => ChangeScope::Local,
            ChangeDecision::Rebuild => ChangeScope::Global,
        }
    }
}

fn targets<L: EntityLookup + ?Sized>(data: &LinkEntityData, lookup: &L) -> Vec<String> {
    data.content
        .as_deref()
        .map(|c| referenced_targets(c, lookup))
        .unwrap_or_default()
}

/// Compares two projections of the same entity.
///
/// A changed set of referenced target ids is GLOBAL, a changed title, parent or
/// type is LOCAL, anything else (prose, tags, metadata) is NONE.
pub fn classify<L: EntityLookup + ?Sized>(
    previous: Option<&LinkEntityData>,
    next: &LinkEntityData,
    lookup: &L,
) -> ChangeScope {
    let Some(previous) = previous else {
        return if targets(next, lookup).is_empty() {
            ChangeScope::Local
        } else {
            ChangeScope::Global
        };
    };
    if previous.content != next.content && targets(previous, lookup) != targets(next, lookup) {
        return ChangeScope::Global;
    }
    if previous.title != next.title
        || previous.parent != next.parent
        || previous.entity_type != next.entity_type
    {
        return ChangeScope::Local;
    }
    ChangeScope::None
}

/// Turns a store event into a projector action. `lookup` is the projection
/// as it stood before the event.
pub fn decide<L: EntityLookup + ?Sized>(event: &EntityEvent, lookup: &L) -> ChangeDecision {
    match event.kind {
        EntityEventKind::Reloaded | EntityEventKind::IdReassigned => ChangeDecision::Rebuild,
        EntityEventKind::Deleted => ChangeDecision::Remove(event.id.clone()),
        EntityEventKind::Created | EntityEventKind::Updated | EntityEventKind::Saved => {
            let Some(next) = &event.new_value else {
                return ChangeDecision::Skip;
            };
            let previous = lookup.get(&event.id).or(event.old_value.as_ref());
            match classify(previous, next, lookup) {
                ChangeScope::None => ChangeDecision::Skip,
                ChangeScope::Local => ChangeDecision::Patch(next.clone()),
                ChangeScope::Global => ChangeDecision::Rebuild,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::linkgraph::index::LinkGraphIndex;
    use crate::domain::entities::entity::EntityType;

    fn data(id: &str, title: &str, content: &str) -> LinkEntityData {
        LinkEntityData {
            id: id.into(),
            title: title.into(),
            parent: None,
            content: (!content.is_empty()).then(|| content.to_string()),
            entity_type: EntityType::Note,
        }
    }

    fn index() -> LinkGraphIndex {
        let mut idx = LinkGraphIndex::default();
        idx.rebuild_all(vec![
            data("e", "Essay", "draft mentioning [[t1]]"),
            data("t1", "Target one", ""),
            data("t2", "Target two", ""),
        ]);
        idx
    }

    #[test]
    fn prose_edit_keeping_targets_is_never_global() {
        let idx = index();
        let before = data("e", "Essay", "draft mentioning [[t1]]");
        let after = data("e", "Essay", "a much longer draft, still mentioning [[Target one]]");
        assert_eq!(classify(Some(&before), &after, &idx), ChangeScope::None);

        let retitled = data("e", "Essay v2", "rewritten prose about [[t1]]");
        assert_eq!(classify(Some(&before), &retitled, &idx), ChangeScope::Local);
    }

    #[test]
    fn adding_or_removing_a_target_is_global() {
        let idx = index();
        let before = data("e", "Essay", "draft mentioning [[t1]]");
        let added = data("e", "Essay", "draft mentioning [[t1]] and [[t2]]");
        assert_eq!(classify(Some(&before), &added, &idx), ChangeScope::Global);

        let removed = data("e", "Essay", "draft mentioning nothing");
        assert_eq!(classify(Some(&before), &removed, &idx), ChangeScope::Global);
    }

    #[test]
    fn broken_links_do_not_count_as_targets() {
        let idx = index();
        let before = data("e", "Essay", "draft mentioning [[t1]]");
        let after = data("e", "Essay", "draft mentioning [[t1]] and [[nowhere]]");
        assert_eq!(classify(Some(&before), &after, &idx), ChangeScope::None);
    }

    #[test]
    fn parent_and_type_changes_are_local() {
        let idx = index();
        let before = data("t2", "Target two", "");
        let mut moved = before.clone();
        moved.parent = Some("e".into());
        assert_eq!(classify(Some(&before), &moved, &idx), ChangeScope::Local);

        let mut retyped = before.clone();
        retyped.entity_type = EntityType::Canvas;
        assert_eq!(classify(Some(&before), &retyped, &idx), ChangeScope::Local);
    }

    #[test]
    fn decisions_follow_event_kind() {
        let idx = index();
        let deleted = EntityEvent::deleted("t2".into(), Some(data("t2", "Target two", "")));
        assert_eq!(decide(&deleted, &idx), ChangeDecision::Remove("t2".into()));

        let created = EntityEvent::created(data("n", "New", ""));
        assert_eq!(decide(&created, &idx), ChangeDecision::Patch(data("n", "New", "")));

        let linking = EntityEvent::created(data("n", "New", "see [[t2]]"));
        assert_eq!(decide(&linking, &idx), ChangeDecision::Rebuild);

        let same = EntityEvent::updated(
            data("t1", "Target one", ""),
            data("t1", "Target one", ""),
        );
        assert_eq!(decide(&same, &idx).scope(), ChangeScope::None);

        assert_eq!(decide(&EntityEvent::reloaded(), &idx), ChangeDecision::Rebuild);
    }
}

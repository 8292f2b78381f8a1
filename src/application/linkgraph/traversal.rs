use std::collections::{HashSet, VecDeque};

use crate::application::linkgraph::index::LinkGraphIndex;
use crate::application::linkgraph::parser::{EntityLookup, parse_links};
use crate::domain::entities::entity::LinkEntityData;
use crate::domain::entities::errors::EntityError;
use crate::domain::linkgraph::graph::{GraphEdge, GraphNode, GraphView, LinkKind};

pub const DEFAULT_MAX_DEPTH: usize = 2;

struct Walk {
    view: GraphView,
    emitted: HashSet<String>,
    edges: HashSet<GraphEdge>,
}

impl Walk {
    /// Returns false when the node was already in the view.
    fn emit(&mut self, entity: &LinkEntityData, depth: usize) -> bool {
        if !self.emitted.insert(entity.id.clone()) {
            return false;
        }
        self.view.nodes.push(GraphNode {
            id: entity.id.clone(),
            label: entity.title.clone(),
            entity_type: entity.entity_type,
            depth,
        });
        true
    }

    fn connect(&mut self, source: &str, target: &str, kind: LinkKind) {
        let edge = GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        };
        if self.edges.insert(edge.clone()) {
            self.view.edges.push(edge);
        }
    }
}

/// Breadth-first walk over content links and the parent/child tree.
///
/// Starts at `start`, or at every root when `start` is `None`. Each node is
/// reported at the depth it was first discovered, which is its minimum
/// distance from the seeds. Parent/child edges always point from child to
/// parent; content edges from the linking entity to its target.
pub fn traverse(
    index: &LinkGraphIndex,
    start: Option<&str>,
    max_depth: usize,
) -> Result<GraphView, EntityError> {
    let seeds: Vec<&LinkEntityData> = match start {
        Some(id) => vec![
            index
                .get(id)
                .ok_or_else(|| EntityError::NotFound(id.to_string()))?,
        ],
        None => index.roots().iter().filter_map(|id| index.get(id)).collect(),
    };

    let mut walk = Walk {
        view: GraphView::default(),
        emitted: HashSet::new(),
        edges: HashSet::new(),
    };
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    for seed in seeds {
        walk.emit(seed, 0);
        queue.push_back((seed.id.clone(), 0));
    }

    while let Some((id, depth)) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(entity) = index.get(&id) else {
            continue;
        };
        walk.emit(entity, depth);
        if depth >= max_depth {
            continue;
        }

        let mut neighbors: Vec<(&str, &str, &str, LinkKind)> = Vec::new();
        let links = parse_links(&id, entity.content.as_deref().unwrap_or_default(), index);
        for link in &links {
            if let Some(target) = link.target_id.as_deref() {
                neighbors.push((target, entity.id.as_str(), target, LinkKind::Markdown));
            }
        }
        if let Some(parent) = entity.parent.as_deref() {
            neighbors.push((parent, entity.id.as_str(), parent, LinkKind::ChildToParent));
        }
        for child in index.children_of(&id) {
            neighbors.push((
                child.as_str(),
                child.as_str(),
                entity.id.as_str(),
                LinkKind::ChildToParent,
            ));
        }

        for (neighbor, source, target, kind) in neighbors {
            let Some(next) = index.get(neighbor) else {
                continue;
            };
            if walk.emit(next, depth + 1) {
                queue.push_back((next.id.clone(), depth + 1));
            }
            walk.connect(source, target, kind);
        }
    }

    tracing::trace!(
        start = start.unwrap_or("<roots>"),
        max_depth,
        nodes = walk.view.nodes.len(),
        edges = walk.view.edges.len(),
        "graph_traversed"
    );
    Ok(walk.view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::entity::EntityType;

    fn data(id: &str, title: &str, parent: Option<&str>, content: &str) -> LinkEntityData {
        LinkEntityData {
            id: id.into(),
            title: title.into(),
            parent: parent.map(str::to_string),
            content: (!content.is_empty()).then(|| content.to_string()),
            entity_type: EntityType::Note,
        }
    }

    fn index(items: Vec<LinkEntityData>) -> LinkGraphIndex {
        let mut idx = LinkGraphIndex::default();
        idx.rebuild_all(items);
        idx
    }

    #[test]
    fn link_and_tree_edges_within_depth() {
        let idx = index(vec![
            data("A", "Alpha", None, "see [[B]]"),
            data("B", "Beta", Some("A"), ""),
            data("C", "Gamma", None, ""),
        ]);
        let view = traverse(&idx, Some("A"), 2).unwrap();

        let mut ids: Vec<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(view.edges.len(), 2);
        assert!(view.has_edge("A", "B", LinkKind::Markdown));
        assert!(view.has_edge("B", "A", LinkKind::ChildToParent));
        assert_eq!(view.node("B").map(|n| n.depth), Some(1));
    }

    #[test]
    fn cycles_terminate_and_edges_are_unique() {
        let idx = index(vec![
            data("x", "X", None, "[[y]] and again [[y]]"),
            data("y", "Y", None, "back to [[x]]"),
            data("z", "Z", None, "self [[z]]"),
        ]);
        let view = traverse(&idx, None, 10).unwrap();
        assert_eq!(view.nodes.len(), 3);
        assert_eq!(view.edges.len(), 3);
        assert!(view.has_edge("x", "y", LinkKind::Markdown));
        assert!(view.has_edge("y", "x", LinkKind::Markdown));
        assert!(view.has_edge("z", "z", LinkKind::Markdown));
        assert!(view.nodes.iter().all(|n| n.depth == 0));
    }

    #[test]
    fn nodes_carry_their_shortest_distance() {
        let idx = index(vec![
            data("r", "Root", None, "[[q]] then [[x]]"),
            data("p", "P", Some("r"), ""),
            data("q", "Q", Some("p"), "[[x]]"),
            data("x", "X", None, ""),
        ]);
        let view = traverse(&idx, Some("r"), 3).unwrap();
        assert_eq!(view.node("x").map(|n| n.depth), Some(1));
        assert_eq!(view.node("q").map(|n| n.depth), Some(1));
        assert_eq!(view.node("p").map(|n| n.depth), Some(1));
        assert!(view.has_edge("q", "x", LinkKind::Markdown));
        assert!(view.has_edge("q", "p", LinkKind::ChildToParent));
    }

    #[test]
    fn depth_zero_yields_seeds_only() {
        let idx = index(vec![
            data("a", "A", None, "[[b]]"),
            data("b", "B", None, ""),
        ]);
        let view = traverse(&idx, Some("a"), 0).unwrap();
        assert_eq!(view.nodes.len(), 1);
        assert!(view.edges.is_empty());
    }

    #[test]
    fn unknown_start_is_not_found() {
        let idx = index(vec![data("a", "A", None, "")]);
        assert_eq!(
            traverse(&idx, Some("missing"), DEFAULT_MAX_DEPTH).unwrap_err(),
            EntityError::NotFound("missing".into())
        );
        assert!(traverse(&LinkGraphIndex::default(), None, 2).unwrap().nodes.is_empty());
    }

    #[test]
    fn broken_links_add_nothing() {
        let idx = index(vec![data("a", "A", None, "[[gone]] and [[unterminated")]);
        let view = traverse(&idx, Some("a"), 2).unwrap();
        assert_eq!(view.nodes.len(), 1);
        assert!(view.edges.is_empty());
    }
}

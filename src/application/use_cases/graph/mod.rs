pub mod build_graph;
pub mod get_entity_links;

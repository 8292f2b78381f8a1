pub mod entity_store;
pub mod tabs;

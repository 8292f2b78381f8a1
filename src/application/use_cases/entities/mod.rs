pub mod create_entity;
pub mod delete_entity;
pub mod list_entities;
pub mod list_errors;
pub mod retry_create;
pub mod save_dirty;
pub mod save_entity;
pub mod tag_entity;
pub mod update_entity;

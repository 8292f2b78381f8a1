pub mod entity_backend;

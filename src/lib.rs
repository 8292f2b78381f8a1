// Module layout (Clean Architecture style)
// - bootstrap: configuration and service wiring
// - infrastructure: entity backend adapters (HTTP, in-memory)
// - presentation: HTTP handlers and routing
// - application: entity store, link graph projection, use cases
// - domain: core models

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub mod classifier;
pub mod index;
pub mod parser;
pub mod projector;
pub mod traversal;

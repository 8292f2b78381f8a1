pub mod entities;
pub mod graph;
pub mod tabs;

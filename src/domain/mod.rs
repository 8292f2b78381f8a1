pub mod entities;
pub mod linkgraph;

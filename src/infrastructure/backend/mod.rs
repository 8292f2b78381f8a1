pub mod http;
pub mod memory;

pub use http::ReqwestEntityBackend;
pub use memory::InMemoryEntityBackend;

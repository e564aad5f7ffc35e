//! ResourceService: the query layer's operation set over a `Store`.

mod resource;
pub use resource::ResourceService;

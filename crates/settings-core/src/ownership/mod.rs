pub mod discovery;
pub mod extractor;
pub mod index;
pub mod manifest;
pub mod pipeline;
pub mod resolver;
pub mod snapshot;

pub mod pipeline;
pub mod providers;
pub mod temp_store;

pub use pipeline::{Pipeline, PipelineError};
pub use temp_store::{LocalTempStore, MemoryTempStore, TempStore};

// Driver boundary, in-process driver and the facade handlers call
pub mod driver;
mod eval;
mod facade;
mod memory;
mod spatial;

pub use driver::{DocumentDriver, index_name};
pub use eval::{apply_update, eval_filter, Match};
pub use facade::DocumentStore;
pub use memory::MemoryDriver;
pub use spatial::{Geometry, haversine_m};

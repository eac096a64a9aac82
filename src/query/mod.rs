// Command builders: pure functions producing store command documents
mod filter;
mod geo;
mod update;

pub use filter::{FilterSpec, build_filter};
pub use geo::{
    Coordinates, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE, Position, SPATIAL_FIELD,
    SPATIAL_INDEX_TYPE, Shape, ShapeType, SpatialCommand, SpatialOperator, build_spatial_command,
    build_spatial_command_str,
};
pub use update::{UpdateCommand, UpdateOperator, build_update_command, build_update_command_str};

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Dynamic segmentation of a trail network: paths, located objects referencing
//! them by linear position, routing through the path graph and DEM profiles.

pub mod api;
pub mod config;
pub mod coord_conversion;
pub mod elevation;
pub mod engine;
pub mod geometry_utils;
pub mod ids;
pub mod network;
pub mod path_graph;
pub mod path_router;
pub mod recompute;
pub mod snapshot;
pub mod topology;

pub use config::EngineConfig;
pub use engine::{ElevationTarget, Engine, EngineError};
pub use ids::{AggregationId, PathId, TopologyId};
pub use network::Network;

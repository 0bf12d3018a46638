//! Statistics, relationship graphs and summary tables over a table of
//! narrative events (chapter, location, characters, activity).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod graph;
pub mod identity;
pub mod markers;
pub mod model;
pub mod rollup;
pub mod scale;
pub mod session;
pub mod source;

pub use atlas_types::{EntityKind, EntityStat, Graph, GraphKind, LocationMarker, RollupRow};
pub use config::Settings;
pub use error::{AtlasError, Result};
pub use filter::{ChapterRange, FilterSpec, Selection};
pub use model::{Event, EventTable};
pub use session::Session;

//! Loading and run driver around `rollup-core`.

pub mod config;
pub mod error;
pub mod run;
pub mod segment_loader;
pub mod summary;

pub use config::RollupConfig;
pub use error::{LoadError, LoadResult};
pub use run::{RollupOutcome, RollupRun};
pub use segment_loader::{load_segments, load_segments_file, LoadedSegments, SegmentFormat};
pub use summary::{LevelCount, TreeSummary};

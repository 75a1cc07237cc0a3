// Adapters layer: concrete sample sources and histogram builders behind the domain ports.

pub mod histogram;
pub mod sample_source;

pub use histogram::{SlotHistogramBuilder, SlotThresholds};
pub use sample_source::{
    EmptySampleSource, InMemorySampleSource, InMemorySampleSourceBuilder, QuerySampleSource,
};

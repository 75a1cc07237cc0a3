// Domain layer: value objects and ports. Concrete sources and builders live in adapters.

pub mod model;
pub mod ports;

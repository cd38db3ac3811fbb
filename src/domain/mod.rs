// Domain layer: records and ports. Nothing here touches the filesystem or network.

pub mod model;
pub mod ports;

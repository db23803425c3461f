pub mod driver;
pub mod error;
pub mod local;
pub mod swarm;

pub use driver::{ClusterDriver, ClusterInfo, InspectResult, LogLine, LogStream, SpawnOptions, SpawnResult};
pub use error::DriverError;
pub use local::LocalDriver;
pub use swarm::SwarmDriver;

//! Interactive force-directed layout for asset and application topologies.
//!
//! A [`Simulator`](simulator::Simulator) lays out nodes under link, charge,
//! collision, group and center forces, optionally approximating repulsion
//! with a Barnes-Hut quad-tree. A host runs it off the UI thread and streams
//! throttled positions to a [`LayoutClient`](client::LayoutClient), which the
//! renderer reads synchronously.
//!
//! # Example
//! ```no_run
//! use flowlens_layout::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let topology = Topology::from_json(
//!     r#"{"nodes": [{"id": "web"}, {"id": "db"}], "edges": [{"source": "web", "target": "db"}]}"#,
//! )?;
//!
//! let mut client = LayoutClient::spawn(HostOptions::default())?;
//! client.load(&topology, 1280.0, 720.0, &SimulationConfig::default())?;
//!
//! while !client.is_settled() {
//!     client.poll();
//!     if let Some(position) = client.position("web") {
//!         println!("web is at {position}");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod graph_data;
pub mod host;
pub mod quadtree;
pub mod simulator;

/// Exports all the core types of the library.
pub mod prelude {
    pub use crate::client::{LayoutClient, Positions};
    pub use crate::graph_data::{
        LinkInit, NodeInit, NodePatch, NodePosition, Topology, TopologyEdge, TopologyNode,
    };
    pub use crate::host::{
        ControlMessage, DragPhase, HostMessage, HostOptions, LocalHost, SimulationHost,
        ThreadHost,
    };
    pub use crate::simulator::components::nodes::PinState;
    pub use crate::simulator::ressources::config::{ForceKind, GroupCenter, SimulationConfig};
    pub use crate::simulator::{NodeView, SimulationState, Simulator, SimulatorBuilder};
}

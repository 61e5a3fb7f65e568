//! Execution hosts. A host owns one simulation and speaks the message protocol
//! in [`protocol`], either from a background thread ([`ThreadHost`]) or on the
//! caller's thread ([`LocalHost`]).

pub mod driver;
pub mod local;
pub mod protocol;
pub mod thread;

use anyhow::Result;

pub use driver::HostCore;
pub use local::LocalHost;
pub use protocol::{ControlMessage, DragPhase, HostMessage, HostOptions};
pub use thread::ThreadHost;

/// What a client needs from a host.
pub trait SimulationHost {
    /// Queues a control message. Fails once the host is gone.
    fn post(&mut self, message: ControlMessage) -> Result<()>;

    /// Next message in emission order, if one is waiting.
    fn next_message(&mut self) -> Option<HostMessage>;

    /// Gives a same-thread host the chance to run. Background hosts run on their own.
    fn pump(&mut self) {}

    /// Stops the host and discards undelivered output. Idempotent.
    fn terminate(&mut self);
}

use std::collections::VecDeque;

use anyhow::{bail, Result};

use crate::host::{
    driver::{Flow, HostCore},
    protocol::{ControlMessage, HostMessage, HostOptions},
    SimulationHost,
};

/// Runs the simulation on the caller's thread, one step per [`pump`](SimulationHost::pump).
///
/// For environments without background threads, and for tests that need
/// a fully deterministic schedule.
pub struct LocalHost {
    core: HostCore,
    inbox: VecDeque<ControlMessage>,
    outbox: VecDeque<HostMessage>,
    terminated: bool,
}

impl LocalHost {
    pub fn new(options: HostOptions) -> Self {
        Self {
            core: HostCore::new(options),
            inbox: VecDeque::new(),
            outbox: VecDeque::from([HostMessage::Ready]),
            terminated: false,
        }
    }

    /// Whether the next pump would take an automatic step.
    pub fn is_active(&self) -> bool {
        !self.terminated && self.core.is_active()
    }

    pub fn core(&self) -> &HostCore {
        &self.core
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new(HostOptions::default())
    }
}

impl SimulationHost for LocalHost {
    fn post(&mut self, message: ControlMessage) -> Result<()> {
        if self.terminated {
            bail!("local host already terminated");
        }
        self.inbox.push_back(message);
        Ok(())
    }

    fn next_message(&mut self) -> Option<HostMessage> {
        self.outbox.pop_front()
    }

    /// Handles every pending control message, then takes at most one step.
    fn pump(&mut self) {
        if self.terminated {
            return;
        }
        while let Some(message) = self.inbox.pop_front() {
            if self.core.handle(message, &mut self.outbox) == Flow::Terminate {
                self.terminate();
                return;
            }
        }
        self.core.step(&mut self.outbox);
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.inbox.clear();
        self.outbox.clear();
        self.core = HostCore::new(HostOptions::default());
    }
}

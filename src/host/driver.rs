use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::Sender,
};

use log::{debug, info, warn};

use crate::{
    host::protocol::{ControlMessage, DragPhase, HostMessage, HostOptions},
    simulator::{SimulationState, Simulator},
};

/// Where a host delivers its output. Returns `false` once nobody listens anymore.
pub trait Outbox {
    fn deliver(&mut self, message: HostMessage) -> bool;
}

impl Outbox for Sender<HostMessage> {
    fn deliver(&mut self, message: HostMessage) -> bool {
        self.send(message).is_ok()
    }
}

impl Outbox for VecDeque<HostMessage> {
    fn deliver(&mut self, message: HostMessage) -> bool {
        self.push_back(message);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// The host-side state machine, independent of how it is scheduled.
///
/// Owns at most one simulation, the current epoch and the throttle counter.
pub struct HostCore {
    options: HostOptions,
    simulator: Option<Simulator>,
    epoch: u64,
    unpublished: u32,
}

impl HostCore {
    pub fn new(options: HostOptions) -> Self {
        Self {
            options,
            simulator: None,
            epoch: 0,
            unpublished: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> Option<SimulationState> {
        self.simulator.as_ref().map(Simulator::state)
    }

    /// Whether an automatic step is scheduled.
    pub fn is_active(&self) -> bool {
        self.state().is_some_and(SimulationState::is_active)
    }

    pub fn handle(&mut self, message: ControlMessage, outbox: &mut impl Outbox) -> Flow {
        match message {
            ControlMessage::Init {
                nodes,
                links,
                width,
                height,
                config,
            } => {
                self.epoch += 1;
                self.unpublished = 0;
                self.simulator = None;
                let built = panic::catch_unwind(AssertUnwindSafe(|| {
                    Simulator::builder()
                        .config(config)
                        .canvas(width, height)
                        .build(nodes, links)
                }));
                match built {
                    Ok(Ok(simulator)) => {
                        info!("[epoch {}] Simulation initialized", self.epoch);
                        self.simulator = Some(simulator);
                        Flow::Continue
                    }
                    Ok(Err(error)) => self.fail(format!("{error:#}"), outbox),
                    Err(payload) => {
                        let reason = format!("init panicked: {}", panic_message(&*payload));
                        self.fail(reason, outbox)
                    }
                }
            }
            ControlMessage::Update { nodes, config } => {
                let result = self.guarded("update", |simulator| {
                    if let Some(patches) = nodes {
                        simulator.update_nodes(&patches);
                    }
                    match config {
                        Some(config) => simulator.update_config(config),
                        None => Ok(()),
                    }
                });
                match result {
                    Some(Ok(Err(error))) => self.fail(format!("{error:#}"), outbox),
                    Some(Err(reason)) => self.fail(reason, outbox),
                    _ => Flow::Continue,
                }
            }
            ControlMessage::Drag {
                node_id,
                x,
                y,
                phase,
            } => {
                let result = self.guarded("drag", |simulator| match phase {
                    DragPhase::Start => simulator.drag_start(&node_id, x, y),
                    DragPhase::Drag => simulator.drag_to(&node_id, x, y),
                    DragPhase::End => simulator.drag_end(&node_id, x, y),
                });
                match result {
                    Some(Err(reason)) => self.fail(reason, outbox),
                    _ => Flow::Continue,
                }
            }
            ControlMessage::Stop => {
                if let Some(simulator) = &mut self.simulator {
                    simulator.stop();
                }
                Flow::Continue
            }
            ControlMessage::Restart { alpha } => {
                self.unpublished = 0;
                let result = self.guarded("restart", |simulator| {
                    simulator.restart(alpha.unwrap_or(1.0))
                });
                match result {
                    Some(Err(reason)) => self.fail(reason, outbox),
                    _ => Flow::Continue,
                }
            }
            ControlMessage::Tick => {
                let result = self.guarded("tick", |simulator| {
                    let positions = simulator.tick();
                    (positions, simulator.alpha())
                });
                match result {
                    Some(Ok((positions, alpha))) => self.emit(
                        HostMessage::Tick {
                            epoch: self.epoch,
                            positions,
                            alpha,
                        },
                        outbox,
                    ),
                    Some(Err(reason)) => self.fail(reason, outbox),
                    None => Flow::Continue,
                }
            }
            ControlMessage::Terminate => {
                info!("[epoch {}] Host terminating", self.epoch);
                self.simulator = None;
                Flow::Terminate
            }
        }
    }

    /// Runs one automatic step if one is scheduled, publishing throttled ticks and the final `end`.
    pub fn step(&mut self, outbox: &mut impl Outbox) -> Flow {
        if !self.is_active() {
            return Flow::Continue;
        }

        match self.guarded("step", Simulator::step) {
            Some(Ok(SimulationState::Converged)) => {
                self.unpublished = 0;
                let positions = self
                    .simulator
                    .as_ref()
                    .map(Simulator::positions)
                    .unwrap_or_default();
                self.emit(
                    HostMessage::End {
                        epoch: self.epoch,
                        positions,
                    },
                    outbox,
                )
            }
            Some(Ok(_)) => {
                self.unpublished += 1;
                if self.unpublished < self.options.throttle() {
                    return Flow::Continue;
                }
                self.unpublished = 0;
                let Some(simulator) = &self.simulator else {
                    return Flow::Continue;
                };
                let message = HostMessage::Tick {
                    epoch: self.epoch,
                    positions: simulator.positions(),
                    alpha: simulator.alpha(),
                };
                self.emit(message, outbox)
            }
            Some(Err(reason)) => self.fail(reason, outbox),
            None => Flow::Continue,
        }
    }

    /// Runs `operation` on the simulation, turning a panic into an error message.
    ///
    /// `None` when there is no simulation to run it on.
    fn guarded<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Simulator) -> T,
    ) -> Option<Result<T, String>> {
        let Some(simulator) = self.simulator.as_mut() else {
            debug!("[epoch {}] No simulation; {operation} ignored", self.epoch);
            return None;
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(simulator)));
        Some(result.map_err(|payload| format!("{operation} panicked: {}", panic_message(&*payload))))
    }

    fn fail(&mut self, reason: impl std::fmt::Display, outbox: &mut impl Outbox) -> Flow {
        let reason = reason.to_string();
        warn!("[epoch {}] Simulation failed: {reason}", self.epoch);
        self.simulator = None;
        self.emit(
            HostMessage::Failed {
                epoch: self.epoch,
                reason,
            },
            outbox,
        )
    }

    fn emit(&self, message: HostMessage, outbox: &mut impl Outbox) -> Flow {
        if outbox.deliver(message) {
            Flow::Continue
        } else {
            debug!("[epoch {}] Output receiver gone", self.epoch);
            Flow::Terminate
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

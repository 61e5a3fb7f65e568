//! The caller's side of a host: a position cache the renderer reads
//! synchronously, plus imperative controls forwarded to the host.

use std::collections::HashMap;

use anyhow::Result;
use glam::Vec2;
use log::{debug, info};

use crate::{
    graph_data::{LinkInit, NodeInit, NodePatch, NodePosition, Topology},
    host::{ControlMessage, DragPhase, HostMessage, HostOptions, SimulationHost, ThreadHost},
    simulator::ressources::config::SimulationConfig,
};

/// Latest known position of every node, by id.
pub type Positions = HashMap<String, Vec2>;

type TickListener = Box<dyn FnMut(&Positions, f32)>;
type EndListener = Box<dyn FnMut(&Positions)>;
type FailureListener = Box<dyn FnMut(&str)>;

/// Inputs of the last `load`, to skip re-initializing on identical data.
#[derive(Debug, Clone, PartialEq)]
struct LoadKey {
    topology: Topology,
    width: f32,
    height: f32,
    config: SimulationConfig,
}

pub struct LayoutClient<H: SimulationHost = ThreadHost> {
    host: H,
    epoch: u64,
    ready: bool,
    snapshot: Positions,
    alpha: f32,
    settled: bool,
    failure: Option<String>,
    loaded: Option<LoadKey>,
    on_tick: Option<TickListener>,
    on_end: Option<EndListener>,
    on_failure: Option<FailureListener>,
    destroyed: bool,
}

impl LayoutClient<ThreadHost> {
    /// Starts a background host. Fails when the thread cannot be spawned.
    pub fn spawn(options: HostOptions) -> Result<Self> {
        Ok(Self::with_host(ThreadHost::spawn(options)?))
    }
}

impl<H: SimulationHost> LayoutClient<H> {
    pub fn with_host(host: H) -> Self {
        Self {
            host,
            epoch: 0,
            ready: false,
            snapshot: Positions::new(),
            alpha: 0.0,
            settled: false,
            failure: None,
            loaded: None,
            on_tick: None,
            on_end: None,
            on_failure: None,
            destroyed: false,
        }
    }

    pub fn on_tick(&mut self, listener: impl FnMut(&Positions, f32) + 'static) {
        self.on_tick = Some(Box::new(listener));
    }

    pub fn on_end(&mut self, listener: impl FnMut(&Positions) + 'static) {
        self.on_end = Some(Box::new(listener));
    }

    pub fn on_failure(&mut self, listener: impl FnMut(&str) + 'static) {
        self.on_failure = Some(Box::new(listener));
    }

    /// Initializes from a topology payload, unless the same data was loaded last time.
    ///
    /// Returns whether an `init` was issued.
    pub fn load(
        &mut self,
        topology: &Topology,
        width: f32,
        height: f32,
        config: &SimulationConfig,
    ) -> Result<bool> {
        if self.destroyed {
            return Ok(false);
        }
        let key = LoadKey {
            topology: topology.clone(),
            width,
            height,
            config: config.clone(),
        };
        if self.loaded.as_ref() == Some(&key) {
            debug!("Topology unchanged; keeping epoch {}", self.epoch);
            return Ok(false);
        }

        let (nodes, links) = topology.to_simulation_input();
        self.init(nodes, links, width, height, config.clone())?;
        self.loaded = Some(key);
        Ok(true)
    }

    /// Replaces the simulation. Output of earlier ones is ignored from now on.
    pub fn init(
        &mut self,
        nodes: Vec<NodeInit>,
        links: Vec<LinkInit>,
        width: f32,
        height: f32,
        config: SimulationConfig,
    ) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.host.post(ControlMessage::Init {
            nodes,
            links,
            width,
            height,
            config,
        })?;
        self.epoch += 1;
        self.loaded = None;
        self.snapshot.clear();
        self.alpha = 1.0;
        self.settled = false;
        self.failure = None;
        Ok(())
    }

    pub fn start_drag(&mut self, id: &str, x: f32, y: f32) -> Result<()> {
        self.settled = false;
        self.send_drag(id, x, y, DragPhase::Start)
    }

    pub fn drag(&mut self, id: &str, x: f32, y: f32) -> Result<()> {
        self.send_drag(id, x, y, DragPhase::Drag)
    }

    pub fn end_drag(&mut self, id: &str, x: f32, y: f32) -> Result<()> {
        self.send_drag(id, x, y, DragPhase::End)
    }

    fn send_drag(&mut self, id: &str, x: f32, y: f32, phase: DragPhase) -> Result<()> {
        self.send(ControlMessage::Drag {
            node_id: id.to_owned(),
            x,
            y,
            phase,
        })
    }

    pub fn stop(&mut self) -> Result<()> {
        self.send(ControlMessage::Stop)
    }

    /// Resumes stepping, reheating to `alpha` (1 when `None`).
    pub fn restart(&mut self, alpha: Option<f32>) -> Result<()> {
        self.settled = false;
        self.send(ControlMessage::Restart { alpha })
    }

    /// Requests exactly one step. Its positions arrive as a `tick`.
    pub fn tick(&mut self) -> Result<()> {
        self.send(ControlMessage::Tick)
    }

    pub fn update(
        &mut self,
        nodes: Option<Vec<NodePatch>>,
        config: Option<SimulationConfig>,
    ) -> Result<()> {
        if nodes.is_none() && config.is_none() {
            return Ok(());
        }
        self.send(ControlMessage::Update { nodes, config })
    }

    fn send(&mut self, message: ControlMessage) -> Result<()> {
        if self.destroyed {
            debug!("Client destroyed; {message:?} dropped");
            return Ok(());
        }
        self.host.post(message)
    }

    /// Lets the host run, then applies everything it has emitted.
    ///
    /// Returns how many messages were applied. Output of replaced simulations is skipped.
    pub fn poll(&mut self) -> usize {
        if self.destroyed {
            return 0;
        }
        self.host.pump();

        let mut applied = 0;
        while let Some(message) = self.host.next_message() {
            if self.apply(message) {
                applied += 1;
            }
            if self.destroyed {
                break;
            }
        }
        applied
    }

    fn apply(&mut self, message: HostMessage) -> bool {
        if let Some(epoch) = message.epoch() {
            if epoch != self.epoch {
                debug!("Stale message from epoch {epoch} ignored (current {})", self.epoch);
                return false;
            }
        }

        match message {
            HostMessage::Ready => {
                self.ready = true;
            }
            HostMessage::Tick {
                positions, alpha, ..
            } => {
                self.snapshot = collect_positions(positions);
                self.alpha = alpha;
                if let Some(listener) = &mut self.on_tick {
                    listener(&self.snapshot, alpha);
                }
            }
            HostMessage::End { positions, .. } => {
                self.snapshot = collect_positions(positions);
                self.settled = true;
                info!("Layout settled with {} nodes", self.snapshot.len());
                if let Some(listener) = &mut self.on_end {
                    listener(&self.snapshot);
                }
            }
            HostMessage::Failed { reason, .. } => {
                if let Some(listener) = &mut self.on_failure {
                    listener(&reason);
                }
                self.failure = Some(reason);
            }
        }
        true
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.snapshot.get(id).copied()
    }

    pub fn positions(&self) -> &Positions {
        &self.snapshot
    }

    /// Alpha of the last applied `tick`.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the current simulation has published its `end`.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Why the current simulation failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Terminates the host and forgets listeners and positions. Nothing is delivered afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.on_tick = None;
        self.on_end = None;
        self.on_failure = None;
        self.snapshot.clear();
        self.host.terminate();
        info!("Layout client destroyed at epoch {}", self.epoch);
    }
}

impl<H: SimulationHost> Drop for LayoutClient<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn collect_positions(positions: Vec<NodePosition>) -> Positions {
    positions
        .into_iter()
        .map(|position| (position.id, Vec2::new(position.x, position.y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::host::LocalHost;

    fn local(throttle: u32) -> LayoutClient<LocalHost> {
        LayoutClient::with_host(LocalHost::new(HostOptions {
            tick_throttle: throttle,
            ..Default::default()
        }))
    }

    fn topology() -> Topology {
        Topology::from_json(
            r#"{"nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
                "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "c"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn ready_then_ticks_fill_the_snapshot() {
        let mut client = local(1);
        let ticks = Rc::new(RefCell::new(0));
        let seen = ticks.clone();
        client.on_tick(move |positions, _| {
            assert_eq!(positions.len(), 3);
            *seen.borrow_mut() += 1;
        });

        assert!(client.load(&topology(), 400.0, 300.0, &SimulationConfig::default()).unwrap());
        assert_eq!(client.poll(), 2);
        assert!(client.is_ready());
        assert!(client.position("a").is_some());
        assert!(client.position("zz").is_none());
        assert_eq!(*ticks.borrow(), 1);
        assert!(client.alpha() < 1.0);
    }

    #[test]
    fn reinit_drops_positions_of_the_previous_graph() {
        let mut client = local(1);
        client.load(&topology(), 400.0, 300.0, &SimulationConfig::default()).unwrap();
        client.poll();
        assert!(client.position("a").is_some());

        let idle = SimulationConfig {
            auto_start: false,
            ..Default::default()
        };
        client
            .init(vec![NodeInit::new("fresh").at(10.0, 20.0)], Vec::new(), 400.0, 300.0, idle)
            .unwrap();
        assert!(client.positions().is_empty());

        client.poll();
        assert!(client.position("a").is_none());

        client.tick().unwrap();
        client.poll();
        assert_eq!(client.positions().len(), 1);
        assert!(client.position("fresh").is_some());
        assert!(client.position("a").is_none());
    }

    #[test]
    fn identical_load_is_skipped() {
        let mut client = local(1);
        let config = SimulationConfig::default();
        assert!(client.load(&topology(), 400.0, 300.0, &config).unwrap());
        assert!(!client.load(&topology(), 400.0, 300.0, &config).unwrap());
        assert!(client.load(&topology(), 500.0, 300.0, &config).unwrap());
    }

    #[test]
    fn runs_to_end_and_settles() {
        let mut client = local(10);
        let ended = Rc::new(RefCell::new(false));
        let flag = ended.clone();
        client.on_end(move |positions| {
            assert_eq!(positions.len(), 3);
            *flag.borrow_mut() = true;
        });
        client.load(&topology(), 400.0, 300.0, &SimulationConfig::default()).unwrap();

        for _ in 0..1000 {
            client.poll();
            if client.is_settled() {
                break;
            }
        }
        assert!(client.is_settled());
        assert!(*ended.borrow());

        client.restart(Some(0.2)).unwrap();
        assert!(!client.is_settled());
    }

    #[test]
    fn failure_is_reported_once() {
        let mut client = local(1);
        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = failures.clone();
        client.on_failure(move |reason| sink.borrow_mut().push(reason.to_owned()));

        let config = SimulationConfig {
            velocity_decay: 3.0,
            ..Default::default()
        };
        client.load(&topology(), 400.0, 300.0, &config).unwrap();
        for _ in 0..5 {
            client.poll();
        }
        assert_eq!(failures.borrow().len(), 1);
        assert!(client.failure().is_some_and(|reason| reason.contains("velocityDecay")));
    }

    #[test]
    fn output_of_replaced_simulation_is_ignored() {
        let mut client = local(1);
        client.load(&topology(), 400.0, 300.0, &SimulationConfig::default()).unwrap();
        client.poll();

        // Leave a tick of epoch 1 undelivered, then re-init.
        client.host_mut().pump();
        let (nodes, links) = (vec![NodeInit::new("x")], Vec::new());
        client.init(nodes, links, 400.0, 300.0, SimulationConfig::default()).unwrap();
        client.poll();

        assert!(client.position("x").is_some());
        assert!(client.position("a").is_none());
    }

    #[test]
    fn destroy_silences_everything() {
        let mut client = local(1);
        let ticks = Rc::new(RefCell::new(0));
        let seen = ticks.clone();
        client.on_tick(move |_, _| *seen.borrow_mut() += 1);
        client.load(&topology(), 400.0, 300.0, &SimulationConfig::default()).unwrap();
        client.host_mut().pump();

        client.destroy();
        assert!(client.is_destroyed());
        assert_eq!(client.poll(), 0);
        assert_eq!(*ticks.borrow(), 0);
        assert!(client.positions().is_empty());
        client.start_drag("a", 1.0, 1.0).unwrap();
        client.tick().unwrap();
        assert!(!client.load(&topology(), 1.0, 1.0, &SimulationConfig::default()).unwrap());
    }
}

pub mod components;
pub mod ressources;
mod systems;

use std::collections::{hash_map::Entry, HashMap};

use anyhow::{ensure, Result};
use glam::Vec2;
use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use specs::{Builder, Dispatcher, DispatcherBuilder, Entity, Join, World, WorldExt};

use crate::{
    graph_data::{LinkInit, NodeInit, NodePatch, NodePosition},
    quadtree::QuadTree,
    simulator::{
        components::{
            edges::{Connects, LinkId, Spring},
            nodes::{GroupKey, NodeId, PinState, Position, Velocity},
        },
        ressources::{
            config::{ForceKind, GroupCenter, SimulationConfig},
            simulator_vars::{Alpha, AlphaTarget, CanvasSize},
        },
        systems::{
            force_compute::{
                ComputeCenterForce, ComputeChargeForce, ComputeCollisionForce, ComputeGroupForce,
                ComputeLinkForce, QuadTreeConstructor,
            },
            position_compute::{initial_position, placement_spread},
            position_update::{sys_pin, sys_release, UpdateNodePosition},
        },
    },
};

/// Lifecycle of a simulation.
///
/// `Idle -> Running -> Cooling -> Converged`, with `Stopped` reachable from
/// anywhere through [`Simulator::stop`] and every state resumable through
/// [`Simulator::restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationState {
    /// Built but not stepping on its own. Manual ticks still work.
    Idle,
    /// Stepping with alpha held hot, right after a (re)start or while dragging.
    Running,
    /// Stepping while alpha decays toward zero.
    Cooling,
    /// Alpha fell below `alpha_min`. Terminal until restarted.
    Converged,
    /// Halted by the caller.
    Stopped,
}

impl SimulationState {
    /// Whether the automatic loop should keep stepping.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Cooling)
    }
}

/// A node as seen from outside the world.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pin: PinState,
    pub group_key: Option<String>,
}

/// Force-directed layout of one node/link set.
///
/// Owns its nodes and links exclusively; the outside world changes them
/// only through the drag and update operations.
pub struct Simulator {
    world: World,
    dispatcher: Dispatcher<'static, 'static>,
    forces: Vec<ForceKind>,
    index: HashMap<String, Entity>,
    link_count: usize,
    state: SimulationState,
    steps: u64,
}

impl Simulator {
    pub fn builder() -> SimulatorBuilder {
        SimulatorBuilder::default()
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.world.read_resource::<Alpha>().0
    }

    pub fn alpha_target(&self) -> f32 {
        self.world.read_resource::<AlphaTarget>().0
    }

    /// Number of steps taken since the simulation was built, manual ticks included.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    pub fn config(&self) -> SimulationConfig {
        (*self.world.read_resource::<SimulationConfig>()).clone()
    }

    /// The force pipeline currently wired into the dispatcher.
    pub fn forces(&self) -> &[ForceKind] {
        &self.forces
    }

    /// Advances one step if the automatic loop is active and returns the new state.
    pub fn step(&mut self) -> SimulationState {
        if !self.state.is_active() {
            return self.state;
        }

        self.advance();

        let alpha = self.alpha();
        let alpha_min = self.world.read_resource::<SimulationConfig>().alpha_min;
        self.state = if alpha < alpha_min {
            info!("Layout converged after {} steps", self.steps);
            SimulationState::Converged
        } else if self.alpha_target() > 0.0 {
            SimulationState::Running
        } else {
            SimulationState::Cooling
        };
        self.state
    }

    /// Advances exactly one step regardless of the state, which is left unchanged.
    pub fn tick(&mut self) -> Vec<NodePosition> {
        self.advance();
        self.positions()
    }

    fn advance(&mut self) {
        self.dispatcher.dispatch(&self.world);

        let target = self.alpha_target();
        let decay = self.world.read_resource::<SimulationConfig>().alpha_decay;
        let mut alpha = self.world.write_resource::<Alpha>();
        alpha.0 += (target - alpha.0) * decay;
        self.steps += 1;
    }

    /// Stops the automatic loop. The in-flight step, if any, has already completed.
    pub fn stop(&mut self) {
        debug!("Layout stopped in state {:?}", self.state);
        self.state = SimulationState::Stopped;
    }

    /// Reheats to `alpha` (clamped to `[0, 1]`) and resumes the automatic loop.
    pub fn restart(&mut self, alpha: f32) {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.world.write_resource::<Alpha>().0 = alpha;
        self.state = SimulationState::Running;
        debug!("Layout restarted at alpha {alpha}");
    }

    /// Resumes the loop without touching alpha.
    fn resume(&mut self) {
        if !self.state.is_active() {
            self.state = SimulationState::Running;
        }
    }

    /// Notify simulator that the user started dragging a node.
    ///
    /// Returns `false` when no node has that id.
    pub fn drag_start(&mut self, id: &str, x: f32, y: f32) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        sys_pin(&self.world, entity, Vec2::new(x, y));
        let hot = self.world.read_resource::<SimulationConfig>().drag_alpha_target;
        self.world.write_resource::<AlphaTarget>().0 = hot;
        self.resume();
        true
    }

    /// Update simulator with the pointer position of a dragged node.
    pub fn drag_to(&mut self, id: &str, x: f32, y: f32) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        sys_pin(&self.world, entity, Vec2::new(x, y));
        true
    }

    /// Notify simulator that the user released a dragged node.
    pub fn drag_end(&mut self, id: &str, x: f32, y: f32) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        sys_release(&self.world, entity, Vec2::new(x, y));
        self.world.write_resource::<AlphaTarget>().0 = 0.0;
        true
    }

    fn entity(&self, id: &str) -> Option<Entity> {
        let entity = self.index.get(id).copied();
        if entity.is_none() {
            debug!("[{id}] Unknown node ignored");
        }
        entity
    }

    /// Patches individual nodes in place. Returns how many patches matched a node.
    pub fn update_nodes(&mut self, patches: &[NodePatch]) -> usize {
        let mut positions = self.world.write_storage::<Position>();
        let mut velocities = self.world.write_storage::<Velocity>();
        let mut pins = self.world.write_storage::<PinState>();
        let mut groups = self.world.write_storage::<GroupKey>();

        let mut applied = 0;
        for patch in patches {
            let Some(&entity) = self.index.get(&patch.id) else {
                debug!("[{0}] Update for unknown node ignored", patch.id);
                continue;
            };
            applied += 1;

            if let Some(position) = positions.get_mut(entity) {
                position.0.x = patch.x.unwrap_or(position.0.x);
                position.0.y = patch.y.unwrap_or(position.0.y);
            }
            if let Some(velocity) = velocities.get_mut(entity) {
                velocity.0.x = patch.vx.unwrap_or(velocity.0.x);
                velocity.0.y = patch.vy.unwrap_or(velocity.0.y);
            }

            let pin = match (patch.fx, patch.fy) {
                (Some(Some(fx)), Some(Some(fy))) => Some(PinState::PinnedAt(Vec2::new(fx, fy))),
                (Some(None), _) | (_, Some(None)) => Some(PinState::Free),
                (None, None) => None,
                _ => {
                    debug!("[{0}] Pin needs both fx and fy; left unchanged", patch.id);
                    None
                }
            };
            if let Some(pin) = pin {
                let _ = pins.insert(entity, pin);
            }

            match &patch.group_key {
                Some(Some(group)) => {
                    let _ = groups.insert(entity, GroupKey(group.clone()));
                }
                Some(None) => {
                    groups.remove(entity);
                }
                None => {}
            }
        }
        applied
    }

    /// Swaps the config, rewiring the force pipeline only when it changes.
    pub fn update_config(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;

        let forces = config.force_wiring(self.node_count(), self.link_count);
        *self.world.write_resource::<SimulationConfig>() = config;
        if forces != self.forces {
            info!("Rewiring forces: {:?} -> {:?}", self.forces, forces);
            self.dispatcher = build_dispatcher(&forces, &mut self.world);
            self.forces = forces;
        }
        Ok(())
    }

    /// Replaces the center of one group, leaving the rest of the config alone.
    pub fn set_group_center(&mut self, group: impl Into<String>, x: f32, y: f32) {
        self.world
            .write_resource::<SimulationConfig>()
            .group_centers
            .insert(group.into(), GroupCenter { x, y });
    }

    pub fn set_canvas(&mut self, width: f32, height: f32) {
        *self.world.write_resource::<CanvasSize>() = CanvasSize { width, height };
    }

    /// Current positions in input order.
    pub fn positions(&self) -> Vec<NodePosition> {
        let ids = self.world.read_storage::<NodeId>();
        let positions = self.world.read_storage::<Position>();
        (&ids, &positions)
            .join()
            .map(|(id, position)| NodePosition {
                id: id.0.clone(),
                x: position.0.x,
                y: position.0.y,
            })
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<NodeView> {
        let entity = *self.index.get(id)?;
        let position = self.world.read_storage::<Position>().get(entity)?.0;
        let velocity = self
            .world
            .read_storage::<Velocity>()
            .get(entity)
            .map_or(Vec2::ZERO, |velocity| velocity.0);
        let pin = self
            .world
            .read_storage::<PinState>()
            .get(entity)
            .copied()
            .unwrap_or_default();
        let group_key = self
            .world
            .read_storage::<GroupKey>()
            .get(entity)
            .map(|group| group.0.clone());
        Some(NodeView {
            id: id.to_owned(),
            position,
            velocity,
            pin,
            group_key,
        })
    }
}

fn build_dispatcher(forces: &[ForceKind], world: &mut World) -> Dispatcher<'static, 'static> {
    let mut builder = DispatcherBuilder::new();
    let mut previous: Option<&'static str> = None;

    for &force in forces {
        let dependencies: Vec<&str> = previous.into_iter().collect();
        let name = force.system_name();
        builder = match force {
            ForceKind::Link => builder.with(ComputeLinkForce, name, &dependencies),
            ForceKind::Charge { approximate: true } => builder
                .with(QuadTreeConstructor, "quadtree_constructor", &dependencies)
                .with(
                    ComputeChargeForce { approximate: true },
                    name,
                    &["quadtree_constructor"],
                ),
            ForceKind::Charge { approximate: false } => {
                builder.with(ComputeChargeForce { approximate: false }, name, &dependencies)
            }
            ForceKind::Collision { indexed } => {
                builder.with(ComputeCollisionForce { indexed }, name, &dependencies)
            }
            ForceKind::Group => builder.with(ComputeGroupForce, name, &dependencies),
            ForceKind::Center => builder.with(ComputeCenterForce, name, &dependencies),
        };
        previous = Some(name);
    }

    let dependencies: Vec<&str> = previous.into_iter().collect();
    let mut dispatcher = builder
        .with(UpdateNodePosition, "update_node_position", &dependencies)
        .build();
    dispatcher.setup(world);
    dispatcher
}

/// Builder for `Simulator`
pub struct SimulatorBuilder {
    config: SimulationConfig,
    canvas: CanvasSize,
}

impl SimulatorBuilder {
    /// Get an instance of `SimulatorBuilder` with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every tuning parameter at once.
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Size of the drawing surface. Its center anchors the center and group forces.
    ///
    /// Default: `1280 x 720`
    pub fn canvas(mut self, width: f32, height: f32) -> Self {
        self.canvas = CanvasSize { width, height };
        self
    }

    /// Length of a link in neutral position.
    ///
    /// Default: `100.0`
    pub fn link_distance(mut self, distance: f32) -> Self {
        self.config.link_distance = distance;
        self
    }

    /// How strong nodes push each other away. Positive values attract.
    ///
    /// Default: `-300.0`
    pub fn charge_strength(mut self, strength: f32) -> Self {
        self.config.charge_strength = strength;
        self
    }

    /// Radius of the disc each node occupies. `0` disables collision.
    ///
    /// Default: `24.0`
    pub fn collision_radius(mut self, radius: f32) -> Self {
        self.config.collision_radius = radius;
        self
    }

    /// How strongly the layout's centroid is moved to the canvas center.
    ///
    /// Default: `0.1`
    pub fn center_strength(mut self, strength: f32) -> Self {
        self.config.center_strength = strength;
        self
    }

    /// How strong the pull toward group centers should be.
    ///
    /// Default: `0.1`
    pub fn group_strength(mut self, strength: f32) -> Self {
        self.config.group_strength = strength;
        self
    }

    /// Where nodes tagged with `group` gather.
    pub fn group_center(mut self, group: impl Into<String>, x: f32, y: f32) -> Self {
        self.config
            .group_centers
            .insert(group.into(), GroupCenter { x, y });
        self
    }

    /// How fast the simulation cools down.
    ///
    /// Default: `1 - 0.001^(1/300)`, converging in 300 steps
    pub fn alpha_decay(mut self, decay: f32) -> Self {
        self.config.alpha_decay = decay;
        self
    }

    /// Amount of friction applied to node velocities.
    ///
    /// `0.0` -> No friction
    ///
    /// `1.0` -> No movement
    ///
    /// Default: `0.4`
    pub fn velocity_decay(mut self, decay: f32) -> Self {
        self.config.velocity_decay = decay;
        self
    }

    /// Whether repulsion uses the Barnes-Hut quad-tree above the small-system threshold.
    ///
    /// Default: `true`
    pub fn barnes_hut(mut self, enabled: bool) -> Self {
        self.config.barnes_hut = enabled;
        self
    }

    /// How accurate the approximated force calculations should be.
    /// Higher numbers result in more approximations but faster calculations.
    ///
    /// `0.0` -> No approximation
    ///
    /// Default: `0.9`
    pub fn theta(mut self, theta: f32) -> Self {
        self.config.theta = theta;
        self
    }

    /// Seed for placing nodes that arrive without coordinates.
    ///
    /// Default: `1`
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Constructs an instance of `Simulator`
    ///
    /// Duplicate node ids keep their first occurrence. Links with an unknown
    /// endpoint and self-loops are dropped.
    pub fn build(self, nodes: Vec<NodeInit>, links: Vec<LinkInit>) -> Result<Simulator> {
        self.config.validate()?;

        let mut world = World::new();
        world.register::<NodeId>();
        world.register::<Position>();
        world.register::<Velocity>();
        world.register::<PinState>();
        world.register::<GroupKey>();
        world.register::<Connects>();
        world.register::<Spring>();
        world.register::<LinkId>();

        let spread = placement_spread(nodes.len(), self.config.link_distance);
        ensure!(
            (self.canvas.center().abs().max_element() + spread * 2.0).is_finite(),
            "linkDistance {} is too large to place {} nodes",
            self.config.link_distance,
            nodes.len()
        );
        let index = Self::create_nodes(&mut world, nodes, &self.config, self.canvas, spread);
        let link_count = Self::create_links(&mut world, links, &index);

        let forces = self.config.force_wiring(index.len(), link_count);
        let state = if self.config.auto_start {
            SimulationState::Running
        } else {
            SimulationState::Idle
        };
        world.insert(Alpha::default());
        world.insert(AlphaTarget::default());
        world.insert(self.canvas);
        world.insert(QuadTree::default());
        world.insert(self.config);
        let dispatcher = build_dispatcher(&forces, &mut world);

        info!(
            "Built layout with {} nodes, {} links, forces {:?}",
            index.len(),
            link_count,
            forces
        );
        Ok(Simulator {
            world,
            dispatcher,
            forces,
            index,
            link_count,
            state,
            steps: 0,
        })
    }

    fn create_nodes(
        world: &mut World,
        nodes: Vec<NodeInit>,
        config: &SimulationConfig,
        canvas: CanvasSize,
        spread: f32,
    ) -> HashMap<String, Entity> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let center = canvas.center();
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let Entry::Vacant(slot) = index.entry(node.id.clone()) else {
                warn!("[{0}] Duplicate node id dropped", node.id);
                continue;
            };

            let position = initial_position(&mut rng, center, spread, node.x, node.y);
            let velocity = Vec2::new(node.vx.unwrap_or(0.0), node.vy.unwrap_or(0.0));
            let pin = PinState::from_fixed(node.fx, node.fy);
            let builder = world
                .create_entity()
                .with(NodeId(node.id))
                .with(Position(pin.target().unwrap_or(position)))
                .with(Velocity(velocity))
                .with(pin);
            let entity = match node.group_key {
                Some(group) => builder.with(GroupKey(group)).build(),
                None => builder.build(),
            };
            slot.insert(entity);
        }
        index
    }

    fn create_links(
        world: &mut World,
        links: Vec<LinkInit>,
        index: &HashMap<String, Entity>,
    ) -> usize {
        let mut resolved = Vec::with_capacity(links.len());
        let mut degrees: HashMap<Entity, usize> = HashMap::new();

        for link in links {
            let (Some(&source), Some(&target)) = (index.get(&link.source), index.get(&link.target))
            else {
                debug!(
                    "[{0}] Link {1} -> {2} has an unknown endpoint; dropped",
                    link.id, link.source, link.target
                );
                continue;
            };
            if source == target {
                debug!("[{0}] Self-loop on {1} dropped", link.id, link.source);
                continue;
            }
            *degrees.entry(source).or_default() += 1;
            *degrees.entry(target).or_default() += 1;
            resolved.push((link.id, source, target));
        }

        let count = resolved.len();
        for (id, source, target) in resolved {
            world
                .create_entity()
                .with(Connects { source, target })
                .with(Spring::from_degrees(degrees[&source], degrees[&target]))
                .with(LinkId(id))
                .build();
        }
        count
    }
}

impl Default for SimulatorBuilder {
    /// Get an instance of `SimulatorBuilder` with default values
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            canvas: CanvasSize::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Simulator {
        Simulator::builder()
            .canvas(200.0, 200.0)
            .build(
                vec![NodeInit::new("a").at(90.0, 100.0), NodeInit::new("b").at(110.0, 100.0)],
                vec![LinkInit::new("a", "b")],
            )
            .unwrap()
    }

    #[test]
    fn starts_running_and_cools_after_first_step() {
        let mut simulator = pair();
        assert_eq!(simulator.state(), SimulationState::Running);
        assert_eq!(simulator.alpha(), 1.0);

        assert_eq!(simulator.step(), SimulationState::Cooling);
        assert!(simulator.alpha() < 1.0);
        assert_eq!(simulator.steps(), 1);
    }

    #[test]
    fn link_pulls_distant_pair_together() {
        let mut simulator = Simulator::builder()
            .canvas(1000.0, 1000.0)
            .charge_strength(0.0)
            .collision_radius(0.0)
            .center_strength(0.0)
            .group_strength(0.0)
            .link_distance(50.0)
            .build(
                vec![NodeInit::new("a").at(0.0, 0.0), NodeInit::new("b").at(400.0, 0.0)],
                vec![LinkInit::new("a", "b")],
            )
            .unwrap();
        assert_eq!(simulator.forces(), &[ForceKind::Link]);

        for _ in 0..300 {
            simulator.step();
        }
        let a = simulator.node("a").unwrap().position;
        let b = simulator.node("b").unwrap().position;
        assert!((a.distance(b) - 50.0).abs() < 5.0);
    }

    #[test]
    fn idle_simulation_only_moves_on_manual_ticks() {
        let config = SimulationConfig {
            auto_start: false,
            ..Default::default()
        };
        let mut simulator = Simulator::builder()
            .config(config)
            .build(
                vec![NodeInit::new("a").at(0.0, 0.0), NodeInit::new("b").at(1.0, 0.0)],
                Vec::new(),
            )
            .unwrap();
        assert_eq!(simulator.state(), SimulationState::Idle);

        let before = simulator.positions();
        assert_eq!(simulator.step(), SimulationState::Idle);
        assert_eq!(simulator.positions(), before);

        let after = simulator.tick();
        assert_ne!(after, before);
        assert_eq!(simulator.state(), SimulationState::Idle);
        assert_eq!(simulator.steps(), 1);
    }

    #[test]
    fn stop_and_restart() {
        let mut simulator = pair();
        simulator.step();
        simulator.stop();
        let alpha = simulator.alpha();
        assert_eq!(simulator.step(), SimulationState::Stopped);
        assert_eq!(simulator.alpha(), alpha);

        simulator.restart(0.5);
        assert_eq!(simulator.state(), SimulationState::Running);
        assert_eq!(simulator.alpha(), 0.5);

        simulator.restart(f32::NAN);
        assert_eq!(simulator.alpha(), 1.0);
    }

    #[test]
    fn duplicates_self_loops_and_dangling_links_are_dropped() {
        let simulator = Simulator::builder()
            .build(
                vec![NodeInit::new("a").at(1.0, 1.0), NodeInit::new("a").at(9.0, 9.0), NodeInit::new("b")],
                vec![
                    LinkInit::new("a", "a"),
                    LinkInit::new("a", "missing"),
                    LinkInit::new("a", "b"),
                ],
            )
            .unwrap();
        assert_eq!(simulator.node_count(), 2);
        assert_eq!(simulator.link_count(), 1);
        assert_eq!(simulator.node("a").unwrap().position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn drag_keeps_the_simulation_hot() {
        let mut simulator = pair();
        for _ in 0..400 {
            simulator.step();
        }
        assert_eq!(simulator.state(), SimulationState::Converged);

        assert!(simulator.drag_start("a", 10.0, 10.0));
        assert_eq!(simulator.state(), SimulationState::Running);
        assert_eq!(simulator.alpha_target(), 0.3);
        for _ in 0..50 {
            assert_eq!(simulator.step(), SimulationState::Running);
        }

        assert!(simulator.drag_end("a", 10.0, 10.0));
        assert_eq!(simulator.alpha_target(), 0.0);
        assert_eq!(simulator.step(), SimulationState::Cooling);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut simulator = pair();
        assert!(!simulator.drag_start("zz", 0.0, 0.0));
        assert!(!simulator.drag_to("zz", 0.0, 0.0));
        assert!(!simulator.drag_end("zz", 0.0, 0.0));
        assert_eq!(simulator.alpha_target(), 0.0);
        assert_eq!(simulator.update_nodes(&[NodePatch::new("zz").moved_to(1.0, 1.0)]), 0);
    }

    #[test]
    fn patches_move_pin_and_regroup_nodes() {
        let mut simulator = pair();
        let patches = [
            NodePatch::new("a").moved_to(5.0, 6.0).regrouped(Some("db".into())),
            NodePatch::new("b").pinned_at(50.0, 60.0),
        ];
        assert_eq!(simulator.update_nodes(&patches), 2);

        let a = simulator.node("a").unwrap();
        assert_eq!(a.position, Vec2::new(5.0, 6.0));
        assert_eq!(a.group_key.as_deref(), Some("db"));
        assert_eq!(
            simulator.node("b").unwrap().pin,
            PinState::PinnedAt(Vec2::new(50.0, 60.0))
        );

        simulator.update_nodes(&[
            NodePatch::new("a").regrouped(None),
            NodePatch::new("b").released(),
        ]);
        assert_eq!(simulator.node("a").unwrap().group_key, None);
        assert_eq!(simulator.node("b").unwrap().pin, PinState::Free);
    }

    #[test]
    fn config_update_rewires_only_when_needed() {
        let mut simulator = pair();
        let before = simulator.forces().to_vec();

        let mut config = simulator.config();
        config.group_centers.insert("db".into(), GroupCenter { x: 1.0, y: 2.0 });
        simulator.update_config(config.clone()).unwrap();
        assert_eq!(simulator.forces(), before.as_slice());

        config.collision_radius = 0.0;
        simulator.update_config(config).unwrap();
        assert!(!simulator
            .forces()
            .iter()
            .any(|force| matches!(force, ForceKind::Collision { .. })));
        simulator.step();

        let invalid = SimulationConfig {
            velocity_decay: -1.0,
            ..Default::default()
        };
        assert!(simulator.update_config(invalid).is_err());
        assert_eq!(simulator.config().collision_radius, 0.0);
    }

    #[test]
    fn group_force_gathers_nodes_at_their_center() {
        let mut simulator = Simulator::builder()
            .canvas(400.0, 400.0)
            .charge_strength(0.0)
            .collision_radius(0.0)
            .center_strength(0.0)
            .group_strength(0.2)
            .group_center("db", 300.0, 300.0)
            .build(
                vec![
                    NodeInit::new("a").at(0.0, 0.0).in_group("db"),
                    NodeInit::new("b").at(0.0, 0.0).in_group("unmapped"),
                ],
                Vec::new(),
            )
            .unwrap();
        for _ in 0..300 {
            simulator.step();
        }

        let a = simulator.node("a").unwrap().position;
        let b = simulator.node("b").unwrap().position;
        assert!(a.distance(Vec2::new(300.0, 300.0)) < 30.0);
        assert!(b.distance(Vec2::new(200.0, 200.0)) < 30.0);
    }

    #[test]
    fn invalid_config_fails_to_build() {
        let result = Simulator::builder()
            .alpha_decay(2.0)
            .build(vec![NodeInit::new("a")], Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn unplaceable_spread_fails_to_build() {
        let nodes = || (0..4).map(|i| NodeInit::new(format!("n{i}"))).collect::<Vec<_>>();
        let error = Simulator::builder()
            .link_distance(3e38)
            .build(nodes(), Vec::new())
            .err()
            .unwrap();
        assert!(error.to_string().contains("linkDistance"));

        assert!(Simulator::builder()
            .link_distance(1e6)
            .build(nodes(), Vec::new())
            .is_ok());
    }
}

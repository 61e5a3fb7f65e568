//! Tuning parameters of one simulation run.

use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Point a group of nodes is pulled toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupCenter {
    pub x: f32,
    pub y: f32,
}

impl From<GroupCenter> for Vec2 {
    fn from(center: GroupCenter) -> Self {
        Vec2::new(center.x, center.y)
    }
}

/// Immutable-per-run tuning of the force model and the integrator.
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Rest length of a link.
    pub link_distance: f32,
    /// Many-body strength. Negative values repel, positive values attract.
    pub charge_strength: f32,
    /// Distances below this are clamped when computing the charge force.
    pub charge_distance_min: f32,
    /// Radius of the disc each node occupies. `0` disables collision.
    pub collision_radius: f32,
    /// Fraction of an overlap resolved per relaxation pass.
    pub collision_strength: f32,
    /// Relaxation passes per step.
    pub collision_iterations: u32,
    /// Fraction of the offset between centroid and canvas center corrected per step.
    pub center_strength: f32,
    /// Pull toward the node's group center, or the canvas center without one.
    pub group_strength: f32,
    pub group_centers: BTreeMap<String, GroupCenter>,
    pub alpha_decay: f32,
    /// Alpha below which the simulation has converged.
    pub alpha_min: f32,
    /// Friction. Velocities are multiplied by `1 - velocity_decay` each step.
    pub velocity_decay: f32,
    /// Alpha target held while a node is dragged.
    pub drag_alpha_target: f32,
    /// Approximate repulsion with a quad-tree.
    pub barnes_hut: bool,
    /// Node count up to which the exact O(n²) repulsion is used anyway.
    pub barnes_hut_min_nodes: usize,
    /// Barnes-Hut accuracy. Smaller is more accurate and slower.
    pub theta: f32,
    /// Seed for the placement of nodes without coordinates.
    pub seed: u64,
    /// Start `Running`. When false the simulation starts `Idle` and only moves on manual ticks.
    pub auto_start: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            link_distance: 100.0,
            charge_strength: -300.0,
            charge_distance_min: 1.0,
            collision_radius: 24.0,
            collision_strength: 0.7,
            collision_iterations: 1,
            center_strength: 0.1,
            group_strength: 0.1,
            group_centers: BTreeMap::new(),
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_min: 0.001,
            velocity_decay: 0.4,
            drag_alpha_target: 0.3,
            barnes_hut: true,
            barnes_hut_min_nodes: 64,
            theta: 0.9,
            seed: 1,
            auto_start: true,
        }
    }
}

/// One term of the force pipeline, evaluated in the order of [`SimulationConfig::force_wiring`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceKind {
    Link,
    Charge { approximate: bool },
    Collision { indexed: bool },
    Group,
    Center,
}

impl ForceKind {
    pub fn system_name(self) -> &'static str {
        match self {
            Self::Link => "compute_link_force",
            Self::Charge { .. } => "compute_charge_force",
            Self::Collision { .. } => "compute_collision_force",
            Self::Group => "compute_group_force",
            Self::Center => "compute_center_force",
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid simulation config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("linkDistance", self.link_distance),
            ("chargeStrength", self.charge_strength),
            ("chargeDistanceMin", self.charge_distance_min),
            ("collisionRadius", self.collision_radius),
            ("collisionStrength", self.collision_strength),
            ("centerStrength", self.center_strength),
            ("groupStrength", self.group_strength),
            ("dragAlphaTarget", self.drag_alpha_target),
            ("theta", self.theta),
        ];
        for (name, value) in finite {
            ensure!(value.is_finite(), "{name} must be finite, got {value}");
        }

        ensure!(
            self.link_distance >= 0.0,
            "linkDistance must not be negative, got {}",
            self.link_distance
        );
        ensure!(
            self.charge_distance_min > 0.0,
            "chargeDistanceMin must be positive, got {}",
            self.charge_distance_min
        );
        ensure!(
            self.collision_radius >= 0.0,
            "collisionRadius must not be negative, got {}",
            self.collision_radius
        );
        ensure!(
            (0.0..=1.0).contains(&self.collision_strength),
            "collisionStrength must be within [0, 1], got {}",
            self.collision_strength
        );
        ensure!(
            (0.0..=1.0).contains(&self.center_strength),
            "centerStrength must be within [0, 1], got {}",
            self.center_strength
        );
        ensure!(
            (0.0..=1.0).contains(&self.alpha_decay),
            "alphaDecay must be within [0, 1], got {}",
            self.alpha_decay
        );
        ensure!(
            self.alpha_min > 0.0 && self.alpha_min < 1.0,
            "alphaMin must be within (0, 1), got {}",
            self.alpha_min
        );
        ensure!(
            (0.0..=1.0).contains(&self.velocity_decay),
            "velocityDecay must be within [0, 1], got {}",
            self.velocity_decay
        );
        ensure!(
            (0.0..=1.0).contains(&self.drag_alpha_target),
            "dragAlphaTarget must be within [0, 1], got {}",
            self.drag_alpha_target
        );
        ensure!(
            self.theta >= 0.0,
            "theta must not be negative, got {}",
            self.theta
        );
        for (group, center) in &self.group_centers {
            ensure!(
                center.x.is_finite() && center.y.is_finite(),
                "center of group {group:?} must be finite"
            );
        }
        Ok(())
    }

    /// Whether repulsion and collision go through the quad-tree for `node_count` nodes.
    pub fn uses_spatial_index(&self, node_count: usize) -> bool {
        self.barnes_hut && node_count > self.barnes_hut_min_nodes
    }

    /// The ordered force pipeline this config produces for a graph of the given size.
    pub fn force_wiring(&self, node_count: usize, link_count: usize) -> Vec<ForceKind> {
        let indexed = self.uses_spatial_index(node_count);
        let mut forces = Vec::with_capacity(5);
        if link_count > 0 {
            forces.push(ForceKind::Link);
        }
        if self.charge_strength != 0.0 {
            forces.push(ForceKind::Charge {
                approximate: indexed,
            });
        }
        if self.collision_radius > 0.0
            && self.collision_strength > 0.0
            && self.collision_iterations > 0
        {
            forces.push(ForceKind::Collision { indexed });
        }
        if self.group_strength != 0.0 {
            forces.push(ForceKind::Group);
        }
        if self.center_strength != 0.0 {
            forces.push(ForceKind::Center);
        }
        forces
    }

    pub fn group_center(&self, group: &str) -> Option<Vec2> {
        self.group_centers.get(group).copied().map(Vec2::from)
    }
}

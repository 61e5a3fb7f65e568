//! Plain data crossing the simulation boundary: node and link inputs,
//! patches, published positions, and the topology payload they are built from.

use anyhow::{Context, Result};
use petgraph::{graph::Graph, visit::EdgeRef, EdgeType};
use serde::{Deserialize, Deserializer, Serialize};

/// A node handed to the simulation at `init`.
///
/// Missing coordinates are chosen by the simulation. `fx`/`fy` pin the node
/// when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
}

impl NodeInit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: None,
            y: None,
            vx: None,
            vy: None,
            fx: None,
            fy: None,
            group_key: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.vx = Some(vx);
        self.vy = Some(vy);
        self
    }

    pub fn pinned_at(mut self, x: f32, y: f32) -> Self {
        self.fx = Some(x);
        self.fy = Some(y);
        self
    }

    pub fn in_group(mut self, group_key: impl Into<String>) -> Self {
        self.group_key = Some(group_key.into());
        self
    }
}

/// A link between two node ids. Links whose endpoints are missing are dropped at `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInit {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
}

impl LinkInit {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
        }
    }
}

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial change to one node of a running simulation.
///
/// Absent fields are left alone. `fx`/`fy` pin the node when both carry a
/// value and free it when either is an explicit `null`; `groupKey: null`
/// removes the node from its group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vy: Option<f32>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub fx: Option<Option<f32>>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub fy: Option<Option<f32>>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_key: Option<Option<String>>,
}

impl NodePatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn moved_to(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn pinned_at(mut self, x: f32, y: f32) -> Self {
        self.fx = Some(Some(x));
        self.fy = Some(Some(y));
        self
    }

    pub fn released(mut self) -> Self {
        self.fx = Some(None);
        self.fy = Some(None);
        self
    }

    pub fn regrouped(mut self, group_key: Option<String>) -> Self {
        self.group_key = Some(group_key);
        self
    }
}

/// Where a node is, as published to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

/// A node of the topology payload returned by the application/topology endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    #[serde(default, alias = "group", skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

/// An edge of the topology payload. Ids are optional upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

/// The `{nodes, edges}` topology payload, mapped onto simulation input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<TopologyNode>,
    #[serde(default)]
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid topology JSON")
    }

    /// Builds a topology from a graph whose node weights are the node ids.
    pub fn from_graph<N, E, Ty>(graph: &Graph<N, E, Ty>) -> Self
    where
        N: ToString,
        Ty: EdgeType,
    {
        let nodes = graph
            .node_weights()
            .map(|id| TopologyNode {
                id: id.to_string(),
                group_key: None,
                x: None,
                y: None,
            })
            .collect();
        let edges = graph
            .edge_references()
            .map(|edge| TopologyEdge {
                id: Some(format!("e{}", edge.id().index())),
                source: graph[edge.source()].to_string(),
                target: graph[edge.target()].to_string(),
            })
            .collect();
        Self { nodes, edges }
    }

    pub fn to_simulation_input(&self) -> (Vec<NodeInit>, Vec<LinkInit>) {
        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeInit {
                x: node.x,
                y: node.y,
                group_key: node.group_key.clone(),
                ..NodeInit::new(node.id.clone())
            })
            .collect();
        let links = self
            .edges
            .iter()
            .map(|edge| match &edge.id {
                Some(id) => LinkInit {
                    id: id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                },
                None => LinkInit::new(edge.source.clone(), edge.target.clone()),
            })
            .collect();
        (nodes, links)
    }
}

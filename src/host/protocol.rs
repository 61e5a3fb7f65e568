//! Messages crossing the host boundary. Everything here is plain JSON-serializable data.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    graph_data::{LinkInit, NodeInit, NodePatch, NodePosition},
    simulator::ressources::config::SimulationConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragPhase {
    Start,
    Drag,
    End,
}

/// Caller to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// Discards any previous simulation and builds a new one.
    Init {
        nodes: Vec<NodeInit>,
        #[serde(default)]
        links: Vec<LinkInit>,
        width: f32,
        height: f32,
        #[serde(default)]
        config: SimulationConfig,
    },
    /// Patches the running simulation in place.
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nodes: Option<Vec<NodePatch>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<SimulationConfig>,
    },
    Drag {
        node_id: String,
        x: f32,
        y: f32,
        phase: DragPhase,
    },
    Stop,
    Restart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alpha: Option<f32>,
    },
    /// One manual step, published whatever the state.
    Tick,
    /// Ends the host. Nothing is emitted afterwards.
    Terminate,
}

/// Host to caller.
///
/// `epoch` counts `init` messages, so output of a replaced simulation can be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    Ready,
    Tick {
        epoch: u64,
        positions: Vec<NodePosition>,
        alpha: f32,
    },
    End {
        epoch: u64,
        positions: Vec<NodePosition>,
    },
    Failed {
        epoch: u64,
        reason: String,
    },
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize control message")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid control message")
    }
}

impl HostMessage {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize host message")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid host message")
    }

    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::Ready => None,
            Self::Tick { epoch, .. } | Self::End { epoch, .. } | Self::Failed { epoch, .. } => {
                Some(*epoch)
            }
        }
    }
}

/// How a host schedules and publishes steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostOptions {
    /// Publish a `tick` every this many automatic steps. `0` is treated as `1`.
    pub tick_throttle: u32,
    /// Pause between automatic steps of the threaded host. `0` only yields, which keeps a core busy.
    pub frame_interval_ms: u64,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            tick_throttle: 3,
            frame_interval_ms: 4,
        }
    }
}

impl HostOptions {
    pub fn throttle(&self) -> u32 {
        self.tick_throttle.max(1)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_message_shape() {
        let message = ControlMessage::Drag {
            node_id: "a".into(),
            x: 1.0,
            y: 2.5,
            phase: DragPhase::Start,
        };
        assert_eq!(
            message.to_json().unwrap(),
            r#"{"type":"drag","nodeId":"a","x":1.0,"y":2.5,"phase":"start"}"#
        );
    }

    #[test]
    fn init_fills_defaults() {
        let message = ControlMessage::from_json(
            r#"{"type": "init", "nodes": [{"id": "a"}], "width": 800, "height": 600,
                "config": {"theta": 0.5}}"#,
        )
        .unwrap();
        let ControlMessage::Init {
            nodes,
            links,
            width,
            config,
            ..
        } = message
        else {
            panic!("expected init");
        };
        assert_eq!(nodes, vec![NodeInit::new("a")]);
        assert!(links.is_empty());
        assert_eq!(width, 800.0);
        assert_eq!(config.theta, 0.5);
        assert_eq!(config.link_distance, 100.0);
    }

    #[test]
    fn unit_and_optional_variants() {
        assert_eq!(
            ControlMessage::from_json(r#"{"type":"restart"}"#).unwrap(),
            ControlMessage::Restart { alpha: None }
        );
        assert_eq!(ControlMessage::Stop.to_json().unwrap(), r#"{"type":"stop"}"#);
        assert_eq!(HostMessage::Ready.to_json().unwrap(), r#"{"type":"ready"}"#);
        assert!(ControlMessage::from_json(r#"{"type":"explode"}"#).is_err());
    }

    #[test]
    fn host_messages_carry_their_epoch() {
        let end = HostMessage::from_json(r#"{"type":"end","epoch":4,"positions":[{"id":"a","x":1,"y":2}]}"#)
            .unwrap();
        assert_eq!(end.epoch(), Some(4));
        assert_eq!(HostMessage::Ready.epoch(), None);
    }

    #[test]
    fn throttle_is_at_least_one() {
        let options: HostOptions = serde_json::from_str(r#"{"tickThrottle": 0}"#).unwrap();
        assert_eq!(options.throttle(), 1);
        assert_eq!(HostOptions::default().throttle(), 3);
    }

    #[test]
    fn default_options_pause_between_steps() {
        let options: HostOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.frame_interval(), Duration::from_millis(4));
        assert!(!HostOptions::default().frame_interval().is_zero());

        let eager: HostOptions = serde_json::from_str(r#"{"frameIntervalMs": 0}"#).unwrap();
        assert_eq!(eager.frame_interval(), Duration::ZERO);
    }
}

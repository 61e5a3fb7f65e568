use std::{thread, time::Duration};

use flowlens_layout::prelude::*;

const TOPOLOGY: &str = r#"{
    "nodes": [
        {"id": "gateway", "group": "edge"},
        {"id": "web", "group": "edge"},
        {"id": "orders", "group": "services"},
        {"id": "billing", "group": "services"},
        {"id": "inventory", "group": "services"},
        {"id": "postgres", "group": "data"},
        {"id": "redis", "group": "data"}
    ],
    "edges": [
        {"source": "gateway", "target": "web"},
        {"source": "web", "target": "orders"},
        {"source": "web", "target": "billing"},
        {"source": "orders", "target": "inventory"},
        {"source": "orders", "target": "postgres"},
        {"source": "billing", "target": "postgres"},
        {"source": "inventory", "target": "redis"},
        {"source": "inventory", "target": "decommissioned"}
    ]
}"#;

fn main() -> anyhow::Result<()> {
    let topology = Topology::from_json(TOPOLOGY)?;
    let config = SimulationConfig::from_json(
        r#"{"groupStrength": 0.15, "groupCenters": {
            "edge": {"x": 200, "y": 360}, "services": {"x": 640, "y": 360}, "data": {"x": 1080, "y": 360}
        }}"#,
    )?;

    let mut client = LayoutClient::spawn(HostOptions {
        tick_throttle: 10,
        frame_interval_ms: 1,
    })?;
    client.on_tick(|positions, alpha| println!("tick alpha={alpha:.3} nodes={}", positions.len()));
    client.on_end(|positions| {
        let mut ids: Vec<_> = positions.keys().collect();
        ids.sort();
        for id in ids {
            println!("{id:>10} {}", positions[id]);
        }
    });
    client.load(&topology, 1280.0, 720.0, &config)?;

    // Drag the gateway somewhere else halfway through.
    let mut dragged = false;
    while !client.is_settled() {
        client.poll();
        if !dragged && client.alpha() < 0.5 {
            client.start_drag("gateway", 100.0, 100.0)?;
            client.drag("gateway", 120.0, 600.0)?;
            client.end_drag("gateway", 120.0, 600.0)?;
            dragged = true;
        }
        if let Some(reason) = client.failure() {
            anyhow::bail!("layout failed: {reason}");
        }
        thread::sleep(Duration::from_millis(16));
    }
    Ok(())
}

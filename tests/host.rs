use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use flowlens_layout::prelude::*;

const WAIT: Duration = Duration::from_secs(10);

fn chain(count: usize) -> (Vec<NodeInit>, Vec<LinkInit>) {
    let nodes = (0..count).map(|i| NodeInit::new(format!("n{i}"))).collect();
    let links = (1..count)
        .map(|i| LinkInit::new(format!("n{}", i - 1), format!("n{i}")))
        .collect();
    (nodes, links)
}

fn init(config: SimulationConfig) -> ControlMessage {
    let (nodes, links) = chain(12);
    ControlMessage::Init {
        nodes,
        links,
        width: 640.0,
        height: 480.0,
        config,
    }
}

#[test]
fn throttled_ticks_over_a_hundred_steps() {
    // Alpha crosses alphaMin on exactly the 100th step.
    let config = SimulationConfig {
        alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 99.5),
        ..Default::default()
    };

    for throttle in [1, 2, 3, 7, 10] {
        let mut host = LocalHost::new(HostOptions {
            tick_throttle: throttle,
            ..Default::default()
        });
        host.post(init(config.clone())).unwrap();
        for _ in 0..200 {
            host.pump();
        }

        let messages: Vec<HostMessage> = std::iter::from_fn(|| host.next_message()).collect();
        assert_eq!(messages.first(), Some(&HostMessage::Ready));
        let ticks = messages
            .iter()
            .filter(|message| matches!(message, HostMessage::Tick { .. }))
            .count();
        let ends = messages
            .iter()
            .filter(|message| matches!(message, HostMessage::End { .. }))
            .count();
        let expected = 100 / throttle as usize;

        assert!(
            ticks.abs_diff(expected) <= 1,
            "throttle {throttle}: {ticks} ticks, expected about {expected}"
        );
        assert_eq!(ends, 1);
        assert!(matches!(messages.last(), Some(HostMessage::End { .. })));
    }
}

#[test]
fn threaded_host_delivers_in_emission_order() {
    let mut host = ThreadHost::spawn(HostOptions {
        tick_throttle: 1,
        ..Default::default()
    })
    .unwrap();
    host.post(init(SimulationConfig::default())).unwrap();
    host.post(init(SimulationConfig::default())).unwrap();

    let mut messages = Vec::new();
    loop {
        let message = host
            .wait_message(WAIT)
            .expect("host went quiet before the second simulation ended");
        let done = matches!(message, HostMessage::End { epoch: 2, .. });
        messages.push(message);
        if done {
            break;
        }
    }
    assert_eq!(host.wait_message(Duration::from_millis(200)), None);

    assert_eq!(messages[0], HostMessage::Ready);
    let epochs: Vec<u64> = messages.iter().filter_map(HostMessage::epoch).collect();
    assert!(epochs.windows(2).all(|pair| pair[0] <= pair[1]));

    let alphas: Vec<f32> = messages
        .iter()
        .filter_map(|message| match message {
            HostMessage::Tick {
                epoch: 2, alpha, ..
            } => Some(*alpha),
            _ => None,
        })
        .collect();
    assert!(!alphas.is_empty());
    assert!(alphas.windows(2).all(|pair| pair[1] < pair[0]));
}

#[test]
fn threaded_drag_sequence_is_applied_in_order() {
    let mut host = ThreadHost::spawn(HostOptions::default()).unwrap();
    host.post(init(SimulationConfig {
        auto_start: false,
        ..Default::default()
    }))
    .unwrap();
    for (x, phase) in [
        (10.0, DragPhase::Start),
        (20.0, DragPhase::Drag),
        (30.0, DragPhase::Drag),
    ] {
        host.post(ControlMessage::Drag {
            node_id: "n0".into(),
            x,
            y: x,
            phase,
        })
        .unwrap();
    }
    host.post(ControlMessage::Stop).unwrap();
    host.post(ControlMessage::Tick).unwrap();

    let mut last = None;
    while let Some(message) = host.wait_message(Duration::from_millis(500)) {
        last = Some(message);
    }
    let positions = match last {
        Some(HostMessage::Tick { positions, .. }) => positions,
        other => panic!("expected the manual tick last, got {other:?}"),
    };
    let dragged = positions.iter().find(|node| node.id == "n0").unwrap();
    assert_eq!((dragged.x, dragged.y), (30.0, 30.0));
}

#[test]
fn client_follows_a_threaded_layout_to_the_end() {
    let mut client = LayoutClient::spawn(HostOptions::default()).unwrap();
    let topology = Topology::from_json(
        r#"{"nodes": [{"id": "web", "group": "frontend"}, {"id": "api"}, {"id": "db"}],
            "edges": [{"source": "web", "target": "api"}, {"source": "api", "target": "db"},
                      {"source": "api", "target": "cache"}]}"#,
    )
    .unwrap();
    let config = SimulationConfig {
        group_centers: [("frontend".to_owned(), GroupCenter { x: 100.0, y: 100.0 })].into(),
        ..Default::default()
    };
    client.load(&topology, 800.0, 600.0, &config).unwrap();

    let deadline = Instant::now() + WAIT;
    while !client.is_settled() {
        assert!(Instant::now() < deadline, "layout did not settle");
        client.poll();
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(client.is_ready());
    assert_eq!(client.positions().len(), 3);
    assert!(client.failure().is_none());
}

#[test]
fn destroyed_client_ignores_late_messages() {
    let mut client = LayoutClient::spawn(HostOptions {
        tick_throttle: 1,
        ..Default::default()
    })
    .unwrap();
    let delivered = Rc::new(RefCell::new(0));
    let counter = delivered.clone();
    client.on_tick(move |_, _| *counter.borrow_mut() += 1);

    let (nodes, links) = chain(30);
    client
        .init(nodes, links, 640.0, 480.0, SimulationConfig::default())
        .unwrap();

    let deadline = Instant::now() + WAIT;
    while *delivered.borrow() == 0 {
        assert!(Instant::now() < deadline, "no tick arrived");
        client.poll();
    }

    client.destroy();
    let before = *delivered.borrow();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(client.poll(), 0);
    assert_eq!(*delivered.borrow(), before);
    assert!(client.positions().is_empty());
    assert!(client.stop().is_ok());
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end controller scenarios.

use egui::{Pos2, Vec2};
use flowgraph_core::error::HookError;
use flowgraph_core::events::SocketAction;
use flowgraph_core::input::PointerEvent;
use flowgraph_core::presenter::RecordingPresenter;
use flowgraph_core::{
    ConnectionError, ExecuteHook, ExecutionError, GraphConfig, GraphController, GraphDocument, GraphError,
    GraphEvent, KeyCommand, NodeId, SocketDescriptor, SocketKey, Template, VisualUpdate,
};
use futures::executor::block_on;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

type Events = Rc<RefCell<Vec<GraphEvent>>>;

fn controller() -> GraphController<RecordingPresenter> {
    let mut c = GraphController::with_presenter(GraphConfig::default(), RecordingPresenter::default());
    c.register_template(Template::new("source", "Source").with_output(SocketDescriptor::new("out", "number")));
    c.register_template(Template::new("sink", "Sink").with_input(SocketDescriptor::new("in", "number")));
    c.register_template(Template::new("text_sink", "Text").with_input(SocketDescriptor::new("in", "string")));
    c.register_template(Template::new("any_sink", "Any").with_input(SocketDescriptor::new("in", "any")));
    c.register_template(
        Template::new("relay", "Relay")
            .with_input(SocketDescriptor::new("in", "number"))
            .with_output(SocketDescriptor::new("out", "number")),
    );
    c
}

fn record(c: &mut GraphController<RecordingPresenter>) -> Events {
    let events = Events::default();
    let sink = events.clone();
    c.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

fn out(node: &NodeId) -> SocketKey {
    SocketKey::output(node.clone(), "out")
}

fn inp(node: &NodeId) -> SocketKey {
    SocketKey::input(node.clone(), "in")
}

fn screen_of(c: &GraphController<RecordingPresenter>, key: &SocketKey) -> Pos2 {
    c.viewport().world_to_screen(c.grid().position(key).unwrap())
}

#[test]
fn test_connect_and_serialize() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("sink", Pos2::new(200.0, 0.0)).unwrap();
    c.create_edge(&out(&a), &inp(&b)).unwrap();

    let doc = c.serialize();
    assert_eq!(doc.edges.len(), 1);
    let edge = &doc.edges[0];
    assert_eq!(edge.from_node_id, a.as_str());
    assert_eq!(edge.from_socket_id, "out");
    assert_eq!(edge.to_node_id, b.as_str());
    assert_eq!(edge.to_socket_id, "in");

    // Loading the saved document reproduces the same structure
    let json = c.to_json().unwrap();
    let mut other = controller();
    other.load_json(&json).unwrap();
    assert_eq!(other.graph().node_count(), 2);
    assert!(other.graph().edge_between(&out(&a), &inp(&b)).is_some());
    assert_eq!(GraphDocument::from_json(&json).unwrap(), doc);
}

#[test]
fn test_type_compatibility() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let text = c.add_node("text_sink", Pos2::new(200.0, 0.0)).unwrap();
    let any = c.add_node("any_sink", Pos2::new(200.0, 200.0)).unwrap();
    assert!(!c.is_connectable(&out(&a), &inp(&text)));
    assert!(matches!(
        c.can_connect(&out(&a), &inp(&text)),
        Err(ConnectionError::IncompatibleTypes { .. })
    ));
    assert!(c.is_connectable(&out(&a), &inp(&any)));
    assert!(c.is_connectable(&inp(&any), &out(&a)));
}

#[test]
fn test_max_connections() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("source", Pos2::new(0.0, 200.0)).unwrap();
    let sink = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
    c.create_edge(&out(&a), &inp(&sink)).unwrap();
    let err = c.create_edge(&out(&b), &inp(&sink)).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Connection(ConnectionError::SocketFull(ref key)) if *key == inp(&sink)
    ));
    assert_eq!(c.graph().edge_count(), 1);
}

#[test]
fn test_paste_remapping() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::new(10.0, 10.0)).unwrap();
    let b = c.add_node("relay", Pos2::new(300.0, 10.0)).unwrap();
    let x = c.add_node("sink", Pos2::new(600.0, 10.0)).unwrap();
    c.create_edge(&out(&a), &inp(&b)).unwrap();
    c.create_edge(&out(&b), &inp(&x)).unwrap();

    c.select_node(&a, false);
    c.select_node(&b, true);
    c.key(KeyCommand::Copy);
    let pasted = c.paste().unwrap();

    assert_eq!(pasted.len(), 2);
    assert!(pasted.iter().all(|id| *id != a && *id != b));
    assert_ne!(pasted[0], pasted[1]);
    let offset = Vec2::new(20.0, 20.0);
    assert_eq!(c.graph().node(&pasted[0]).unwrap().position, Pos2::new(10.0, 10.0) + offset);
    assert_eq!(c.graph().node(&pasted[1]).unwrap().position, Pos2::new(300.0, 10.0) + offset);

    let new_edges: Vec<_> = c
        .graph()
        .edges()
        .filter(|e| pasted.contains(&e.from.node) || pasted.contains(&e.to.node))
        .collect();
    assert_eq!(new_edges.len(), 1);
    assert_eq!(new_edges[0].from.node, pasted[0]);
    assert_eq!(new_edges[0].to.node, pasted[1]);
    assert_eq!(c.selected_nodes(), pasted);
}

#[test]
fn test_execution_halts_on_error() {
    let runs: Rc<RefCell<Vec<String>>> = Rc::default();
    let hook = |fail: bool| {
        let runs = runs.clone();
        ExecuteHook::sync(move |ctx| {
            runs.borrow_mut().push(ctx.node_id().to_string());
            if fail {
                Err::<(), HookError>("boom".into())
            } else {
                Ok(())
            }
        })
    };

    let mut c = controller();
    c.register_template(
        Template::new("ok", "Ok")
            .with_input(SocketDescriptor::new("in", "flow"))
            .with_output(SocketDescriptor::new("out", "flow"))
            .with_hook(hook(false)),
    );
    c.register_template(
        Template::new("bad", "Bad")
            .with_input(SocketDescriptor::new("in", "flow"))
            .with_output(SocketDescriptor::new("out", "flow"))
            .with_hook(hook(true)),
    );
    let na = c.add_node_with(Some(NodeId::new("A")), "ok", Pos2::ZERO, Default::default()).unwrap();
    let nb = c.add_node_with(Some(NodeId::new("B")), "bad", Pos2::ZERO, Default::default()).unwrap();
    let nc = c.add_node_with(Some(NodeId::new("C")), "ok", Pos2::ZERO, Default::default()).unwrap();
    c.create_edge(&out(&na), &inp(&nb)).unwrap();
    c.create_edge(&out(&nb), &inp(&nc)).unwrap();
    let events = record(&mut c);

    let err = block_on(c.execute()).unwrap_err();
    let ExecutionError::NodeFailed { node, executed, .. } = err;
    assert_eq!(node, nb);
    assert_eq!(executed, 1);
    assert_eq!(*runs.borrow(), vec!["A".to_string(), "B".to_string()]);

    let events = events.borrow();
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::ExecutionCompleted { executed: 1, total: 3, error: Some(_) }
    )));
    // The failing node's busy indicator was cleared
    assert_eq!(
        c.presenter().updates.last(),
        Some(&VisualUpdate::NodeExecuting { node: nb, active: false })
    );
}

#[test]
fn test_no_dangling_edges() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("relay", Pos2::new(300.0, 0.0)).unwrap();
    let x = c.add_node("sink", Pos2::new(600.0, 0.0)).unwrap();
    c.create_edge(&out(&a), &inp(&b)).unwrap();
    c.create_edge(&out(&b), &inp(&x)).unwrap();

    c.select_node(&b, false);
    c.key(KeyCommand::DeleteSelection);
    assert!(!c.graph().contains_node(&b));
    assert_eq!(c.graph().edge_count(), 0);
    for node in c.graph().nodes() {
        for socket in node.sockets() {
            assert_eq!(socket.connection_count(), 0, "{}", socket.key());
        }
    }
    assert!(c.selection().is_empty());
}

#[test]
fn test_interactive_connection_from_input() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
    let events = record(&mut c);

    let t = Duration::ZERO;
    c.pointer_down(PointerEvent::mouse(screen_of(&c, &inp(&b)), t));
    assert!(c.connection().is_active());
    let target = screen_of(&c, &out(&a)) + Vec2::new(4.0, -3.0);
    c.pointer_move(PointerEvent::mouse(target, t));
    assert_eq!(c.connection().hover(), Some(&out(&a)));
    c.pointer_up(PointerEvent::mouse(target, t));

    assert!(!c.connection().is_active());
    let edge = c.graph().edges().next().unwrap();
    assert_eq!(edge.from, out(&a));
    assert_eq!(edge.to, inp(&b));
    assert!(events.borrow().iter().any(|e| matches!(e, GraphEvent::EdgeCreated { .. })));
    assert!(c.presenter().updates.contains(&VisualUpdate::ClearTempPath));
}

#[test]
fn test_interactive_rejection_reports_reason() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let text = c.add_node("text_sink", Pos2::new(300.0, 0.0)).unwrap();
    let events = record(&mut c);

    let t = Duration::ZERO;
    c.pointer_down(PointerEvent::mouse(screen_of(&c, &out(&a)), t));
    let target = screen_of(&c, &inp(&text));
    c.pointer_move(PointerEvent::mouse(target, t));
    c.pointer_up(PointerEvent::mouse(target, t));

    assert_eq!(c.graph().edge_count(), 0);
    assert!(events.borrow().iter().any(|e| matches!(
        e,
        GraphEvent::ConnectionFailed { reason: ConnectionError::IncompatibleTypes { .. }, .. }
    )));
}

#[test]
fn test_long_press_opens_socket_menu() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
    let edge = c.create_edge(&out(&a), &inp(&b)).unwrap();
    let events = record(&mut c);

    let at = screen_of(&c, &out(&a));
    c.pointer_down(PointerEvent::touch(0, at, Duration::ZERO));
    c.tick(Duration::from_millis(200));
    assert!(events.borrow().is_empty());
    c.tick(Duration::from_millis(600));

    let menu = events
        .borrow()
        .iter()
        .find_map(|e| match e {
            GraphEvent::SocketMenuRequested { socket, actions, .. } => Some((socket.clone(), actions.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(menu.0, out(&a));
    assert_eq!(
        menu.1,
        vec![SocketAction::DeleteConnection(edge.clone()), SocketAction::DeleteAllConnections]
    );
    c.pointer_up(PointerEvent::touch(0, at, Duration::from_millis(700)));

    assert_eq!(c.apply_socket_action(&menu.0, &menu.1[1]).unwrap(), 1);
    assert_eq!(c.graph().edge_count(), 0);
}

#[test]
fn test_movement_cancels_long_press() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
    let d = c.add_node("sink", Pos2::new(300.0, 200.0)).unwrap();
    c.create_edge(&out(&a), &inp(&b)).unwrap();
    let events = record(&mut c);

    let at = screen_of(&c, &out(&a));
    c.pointer_down(PointerEvent::touch(0, at, Duration::ZERO));
    let target = screen_of(&c, &inp(&d));
    c.pointer_move(PointerEvent::touch(0, target, Duration::from_millis(100)));
    c.tick(Duration::from_millis(900));
    c.pointer_up(PointerEvent::touch(0, target, Duration::from_millis(1000)));

    assert!(!events.borrow().iter().any(|e| matches!(e, GraphEvent::SocketMenuRequested { .. })));
    assert!(c.graph().edge_between(&out(&a), &inp(&d)).is_some());
    assert_eq!(c.graph().edge_count(), 2);
}

#[test]
fn test_read_only_ignores_editing_gestures() {
    let mut c = controller();
    let a = c.add_node("source", Pos2::ZERO).unwrap();
    let b = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
    c.set_read_only(true);

    let t = Duration::ZERO;
    let start = screen_of(&c, &out(&a));
    c.pointer_down(PointerEvent::mouse(start, t));
    assert!(!c.connection().is_active());
    let target = screen_of(&c, &inp(&b));
    c.pointer_move(PointerEvent::mouse(target, t));
    c.pointer_up(PointerEvent::mouse(target, t));
    assert_eq!(c.graph().edge_count(), 0);

    // Node press selects but does not drag
    c.pointer_down(PointerEvent::mouse(Pos2::new(60.0, 40.0), t));
    c.pointer_move(PointerEvent::mouse(Pos2::new(160.0, 40.0), t));
    c.pointer_up(PointerEvent::mouse(Pos2::new(160.0, 40.0), t));
    assert_eq!(c.selected_nodes(), vec![a.clone()]);
    assert_eq!(c.graph().node(&a).unwrap().position, Pos2::ZERO);

    assert!(matches!(
        c.create_edge(&out(&a), &inp(&b)),
        Err(GraphError::ReadOnly)
    ));
}

#[test]
fn test_cycle_is_reported_and_run_continues() {
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    let mut c = controller();
    c.register_template(
        Template::new("loop", "Loop")
            .with_input(SocketDescriptor::new("in", "number"))
            .with_output(SocketDescriptor::new("out", "number"))
            .with_hook(ExecuteHook::sync(move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            })),
    );
    let a = c.add_node("loop", Pos2::ZERO).unwrap();
    let b = c.add_node("loop", Pos2::new(300.0, 0.0)).unwrap();
    c.create_edge(&out(&a), &inp(&b)).unwrap();
    c.create_edge(&out(&b), &inp(&a)).unwrap();
    let events = record(&mut c);

    let report = block_on(c.execute()).unwrap();
    assert_eq!(report.executed.len(), 2);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(*count.borrow(), 2);
    assert!(events.borrow().iter().any(|e| matches!(e, GraphEvent::CycleDetected { .. })));
}

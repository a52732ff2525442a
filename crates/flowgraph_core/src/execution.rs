// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution scheduling.
//!
//! Each run walks the nodes in dependency order and awaits every node's hook
//! before starting the next. Cycles do not abort a run: the dependency that
//! closes a cycle is dropped and reported. Hooks can activate outputs; once
//! any output has been activated in a run, downstream nodes only run when one
//! of their inputs was activated.

use crate::error::ExecutionError;
use crate::events::{EventBus, GraphEvent};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::presenter::{Presenter, VisualUpdate};
use crate::socket::{Direction, SocketId, SocketKey};
use crate::template::TemplateRegistry;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A dependency ignored to break a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleBreak {
    /// Node whose dependency was dropped
    pub node: NodeId,
    /// Upstream node that closed the cycle
    pub upstream: NodeId,
}

/// Execution order for the current graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Nodes with hooks, upstream first
    pub order: Vec<NodeId>,
    /// Dependencies dropped to break cycles
    pub dropped: Vec<CycleBreak>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Planned order
    pub order: Vec<NodeId>,
    /// Nodes whose hooks ran
    pub executed: Vec<NodeId>,
    /// Nodes gated off by branch activation
    pub skipped: Vec<NodeId>,
    /// Dependencies dropped to break cycles
    pub dropped: Vec<CycleBreak>,
}

/// Build the execution plan: depth-first topological sort over the edge
/// dependencies, restricted to nodes whose template has a hook.
pub fn plan(graph: &Graph, registry: &TemplateRegistry) -> ExecutionPlan {
    let deps = graph.dependencies();
    let mut visited = HashSet::new();
    let mut on_stack = IndexSet::new();
    let mut sorted = Vec::with_capacity(deps.len());
    let mut dropped = Vec::new();

    for node_id in deps.keys() {
        visit(node_id, &deps, &mut visited, &mut on_stack, &mut sorted, &mut dropped);
    }

    let order = sorted
        .into_iter()
        .filter(|id| {
            graph
                .node(id)
                .and_then(|node| registry.get(&node.node_type))
                .is_some_and(|template| template.on_execute.is_some())
        })
        .collect();
    ExecutionPlan { order, dropped }
}

fn visit(
    node_id: &NodeId,
    deps: &IndexMap<NodeId, IndexSet<NodeId>>,
    visited: &mut HashSet<NodeId>,
    on_stack: &mut IndexSet<NodeId>,
    sorted: &mut Vec<NodeId>,
    dropped: &mut Vec<CycleBreak>,
) {
    if visited.contains(node_id) {
        return;
    }
    on_stack.insert(node_id.clone());

    // Visit all nodes that this node depends on
    if let Some(upstream) = deps.get(node_id) {
        for up in upstream {
            if on_stack.contains(up) {
                dropped.push(CycleBreak {
                    node: node_id.clone(),
                    upstream: up.clone(),
                });
                continue;
            }
            visit(up, deps, visited, on_stack, sorted, dropped);
        }
    }

    on_stack.swap_remove(node_id);
    visited.insert(node_id.clone());
    sorted.push(node_id.clone());
}

/// Input sockets activated during the current run
#[derive(Debug, Clone, Default)]
pub struct BranchState {
    active_inputs: HashSet<SocketKey>,
    tracking: bool,
}

impl BranchState {
    /// Forget every activation
    pub fn reset(&mut self) {
        self.active_inputs.clear();
        self.tracking = false;
    }

    /// Whether any output was activated this run
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Whether an input socket was activated
    pub fn is_active(&self, input: &SocketKey) -> bool {
        self.active_inputs.contains(input)
    }

    /// Mark every input fed by `output` as active
    pub fn activate_output(&mut self, graph: &Graph, output: &SocketKey) {
        self.tracking = true;
        for edge in graph.edges().filter(|e| e.from == *output) {
            self.active_inputs.insert(edge.to.clone());
        }
    }

    /// Gate check for a node about to run
    pub fn should_execute(&self, node: &Node) -> bool {
        if !node.has_inputs() || !self.tracking {
            return true;
        }
        node.inputs().any(|socket| self.active_inputs.contains(&socket.key()))
    }
}

/// Handle given to an execution hook
#[derive(Debug, Clone)]
pub struct NodeContext {
    node: NodeId,
    node_type: String,
    data: serde_json::Map<String, serde_json::Value>,
    outputs: Vec<SocketId>,
    active_inputs: Vec<SocketId>,
    activated: Rc<RefCell<Vec<SocketId>>>,
}

impl NodeContext {
    fn for_node(node: &Node, branches: &BranchState) -> Self {
        Self {
            node: node.id.clone(),
            node_type: node.node_type.clone(),
            data: node.data.clone(),
            outputs: node.outputs().map(|s| s.id.clone()).collect(),
            active_inputs: node
                .inputs()
                .filter(|s| branches.is_active(&s.key()))
                .map(|s| s.id.clone())
                .collect(),
            activated: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Node being executed
    pub fn node_id(&self) -> &NodeId {
        &self.node
    }

    /// Template name of the node
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Snapshot of the node's data bag
    pub fn data(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.data
    }

    /// One field of the data bag
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Output socket ids in display order
    pub fn outputs(&self) -> &[SocketId] {
        &self.outputs
    }

    /// Inputs activated by upstream nodes this run
    pub fn active_inputs(&self) -> &[SocketId] {
        &self.active_inputs
    }

    /// Activate an output by id; returns false if the node has no such output
    pub fn activate(&self, output: impl Into<SocketId>) -> bool {
        let output = output.into();
        if !self.outputs.contains(&output) {
            return false;
        }
        self.activated.borrow_mut().push(output);
        true
    }

    /// Activate the `index`-th output
    pub fn activate_index(&self, index: usize) -> bool {
        match self.outputs.get(index) {
            Some(id) => {
                self.activated.borrow_mut().push(id.clone());
                true
            }
            None => false,
        }
    }

    fn take_activated(&self) -> Vec<SocketId> {
        std::mem::take(&mut *self.activated.borrow_mut())
    }
}

/// Runs node hooks in dependency order with branch gating
#[derive(Debug, Default)]
pub struct ExecutionScheduler {
    branches: BranchState,
}

impl ExecutionScheduler {
    /// Create a scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Branch activations of the current or last run
    pub fn branches(&self) -> &BranchState {
        &self.branches
    }

    /// Execute every hooked node once.
    ///
    /// Halts at the first failing hook; the completion event carries the error
    /// before it is returned.
    pub async fn run<P: Presenter>(
        &mut self,
        graph: &Graph,
        registry: &TemplateRegistry,
        events: &mut EventBus,
        presenter: &mut P,
    ) -> Result<ExecutionReport, ExecutionError> {
        self.branches.reset();
        let plan = plan(graph, registry);
        for cycle in &plan.dropped {
            tracing::warn!(
                "Cycle detected: ignoring dependency of {} on {}",
                cycle.node,
                cycle.upstream
            );
            events.emit(&GraphEvent::CycleDetected {
                node: cycle.node.clone(),
                upstream: cycle.upstream.clone(),
            });
        }

        let total = plan.order.len();
        tracing::debug!("Executing {total} node(s)");
        events.emit(&GraphEvent::ExecutionStarted { total });

        let mut report = ExecutionReport {
            order: plan.order.clone(),
            dropped: plan.dropped,
            ..ExecutionReport::default()
        };

        for (index, node_id) in plan.order.iter().enumerate() {
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            let Some(hook) = registry
                .get(&node.node_type)
                .and_then(|t| t.on_execute.clone())
            else {
                continue;
            };
            if !self.branches.should_execute(node) {
                tracing::debug!("Skipping {node_id}: no active input");
                report.skipped.push(node_id.clone());
                events.emit(&GraphEvent::NodeSkipped {
                    node: node_id.clone(),
                });
                continue;
            }

            let ctx = NodeContext::for_node(node, &self.branches);
            presenter.apply(VisualUpdate::NodeExecuting {
                node: node_id.clone(),
                active: true,
            });
            let result = hook.call(ctx.clone()).await;
            presenter.apply(VisualUpdate::NodeExecuting {
                node: node_id.clone(),
                active: false,
            });

            if let Err(source) = result {
                let executed = report.executed.len();
                tracing::error!("Node {node_id} failed: {source}");
                events.emit(&GraphEvent::ExecutionCompleted {
                    executed,
                    total,
                    error: Some(source.to_string()),
                });
                return Err(ExecutionError::NodeFailed {
                    node: node_id.clone(),
                    executed,
                    source,
                });
            }

            for output in ctx.take_activated() {
                let key = SocketKey {
                    node: node_id.clone(),
                    direction: Direction::Output,
                    socket: output,
                };
                self.branches.activate_output(graph, &key);
            }
            report.executed.push(node_id.clone());
            events.emit(&GraphEvent::NodeExecuted {
                node: node_id.clone(),
                index,
            });
        }

        tracing::info!(
            "Execution complete: {}/{} node(s) ran",
            report.executed.len(),
            total
        );
        events.emit(&GraphEvent::ExecutionCompleted {
            executed: report.executed.len(),
            total,
            error: None,
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::presenter::RecordingPresenter;
    use crate::socket::SocketDescriptor;
    use crate::template::{ExecuteHook, Template};
    use futures::executor::block_on;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging_hook(log: &Log) -> ExecuteHook {
        let log = log.clone();
        ExecuteHook::sync(move |ctx| {
            log.borrow_mut().push(ctx.node_id().to_string());
            Ok(())
        })
    }

    fn step(log: &Log) -> Template {
        Template::new("step", "Step")
            .with_input(SocketDescriptor::new("in", "flow").with_max_connections(8))
            .with_output(SocketDescriptor::new("out", "flow"))
            .with_hook(logging_hook(log))
    }

    fn add(graph: &mut Graph, registry: &TemplateRegistry, id: &str, ty: &str) {
        let template = registry.get(ty).unwrap();
        graph
            .insert_node(Node::from_template(NodeId::new(id), template))
            .unwrap();
    }

    fn link(graph: &mut Graph, from: &str, from_socket: &str, to: &str) {
        graph
            .connect(
                &SocketKey::output(NodeId::new(from), from_socket),
                &SocketKey::input(NodeId::new(to), "in"),
            )
            .unwrap();
    }

    fn position(order: &[NodeId], id: &str) -> usize {
        order.iter().position(|n| n.as_str() == id).unwrap()
    }

    #[test]
    fn test_order_respects_dependencies() {
        let log = Log::default();
        let mut registry = TemplateRegistry::new();
        registry.register(step(&log));
        let mut graph = Graph::new();
        // Insert downstream nodes first so insertion order disagrees with dependencies
        for id in ["d", "c", "b", "a"] {
            add(&mut graph, &registry, id, "step");
        }
        link(&mut graph, "a", "out", "b");
        link(&mut graph, "a", "out", "c");
        link(&mut graph, "b", "out", "d");
        link(&mut graph, "c", "out", "d");

        let plan = plan(&graph, &registry);
        assert_eq!(plan.order.len(), 4);
        assert!(plan.dropped.is_empty());
        for edge in graph.edges() {
            assert!(
                position(&plan.order, edge.from.node.as_str()) < position(&plan.order, edge.to.node.as_str())
            );
        }
    }

    #[test]
    fn test_cycle_is_dropped_not_fatal() {
        let log = Log::default();
        let mut registry = TemplateRegistry::new();
        registry.register(step(&log));
        let mut graph = Graph::new();
        add(&mut graph, &registry, "a", "step");
        add(&mut graph, &registry, "b", "step");
        link(&mut graph, "a", "out", "b");
        link(&mut graph, "b", "out", "a");

        let plan = plan(&graph, &registry);
        assert_eq!(plan.order.len(), 2);
        assert_eq!(plan.dropped.len(), 1);

        let mut events = EventBus::new();
        let report = block_on(ExecutionScheduler::new().run(
            &graph,
            &registry,
            &mut events,
            &mut RecordingPresenter::default(),
        ))
        .unwrap();
        assert_eq!(report.executed.len(), 2);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_nodes_without_hooks_excluded() {
        let log = Log::default();
        let mut registry = TemplateRegistry::new();
        registry.register(step(&log));
        registry.register(Template::new("note", "Note"));
        let mut graph = Graph::new();
        add(&mut graph, &registry, "a", "step");
        add(&mut graph, &registry, "n", "note");
        let plan = plan(&graph, &registry);
        assert_eq!(plan.order, vec![NodeId::new("a")]);
    }

    fn branch_registry(log: &Log) -> TemplateRegistry {
        let mut registry = TemplateRegistry::new();
        registry.register(step(log));
        let branch_log = log.clone();
        registry.register(
            Template::new("branch", "Branch")
                .with_input(SocketDescriptor::new("in", "flow"))
                .with_output(SocketDescriptor::new("true", "flow"))
                .with_output(SocketDescriptor::new("false", "flow"))
                .with_hook(ExecuteHook::sync(move |ctx| {
                    branch_log.borrow_mut().push(ctx.node_id().to_string());
                    let condition = ctx.field("condition").and_then(serde_json::Value::as_bool);
                    ctx.activate(if condition == Some(true) { "true" } else { "false" });
                    Ok(())
                })),
        );
        registry
    }

    #[test]
    fn test_branch_gating() {
        let log = Log::default();
        let registry = branch_registry(&log);
        let mut graph = Graph::new();
        add(&mut graph, &registry, "start", "step");
        add(&mut graph, &registry, "if", "branch");
        add(&mut graph, &registry, "yes", "step");
        add(&mut graph, &registry, "no", "step");
        link(&mut graph, "start", "out", "if");
        link(&mut graph, "if", "true", "yes");
        link(&mut graph, "if", "false", "no");
        graph
            .node_mut(&NodeId::new("if"))
            .unwrap()
            .data
            .insert("condition".into(), serde_json::Value::Bool(true));

        let mut scheduler = ExecutionScheduler::new();
        let mut events = EventBus::new();
        let mut presenter = RecordingPresenter::default();
        let report = block_on(scheduler.run(&graph, &registry, &mut events, &mut presenter)).unwrap();

        assert_eq!(*log.borrow(), ["start", "if", "yes"]);
        assert_eq!(report.skipped, vec![NodeId::new("no")]);
        assert!(scheduler.branches().is_tracking());

        // State does not leak into the next run
        log.borrow_mut().clear();
        graph
            .node_mut(&NodeId::new("if"))
            .unwrap()
            .data
            .insert("condition".into(), serde_json::Value::Bool(false));
        block_on(scheduler.run(&graph, &registry, &mut events, &mut presenter)).unwrap();
        assert_eq!(*log.borrow(), ["start", "if", "no"]);
    }

    #[test]
    fn test_activation_helpers() {
        let node = Node::from_template(
            NodeId::new("n"),
            &Template::new("t", "T")
                .with_output(SocketDescriptor::new("a", "flow"))
                .with_output(SocketDescriptor::new("b", "flow")),
        );
        let ctx = NodeContext::for_node(&node, &BranchState::default());
        assert!(ctx.activate("b"));
        assert!(!ctx.activate("missing"));
        assert!(ctx.activate_index(0));
        assert!(!ctx.activate_index(5));
        assert_eq!(ctx.take_activated(), vec![SocketId::new("b"), SocketId::new("a")]);
    }

    #[test]
    fn test_failure_halts_run() {
        let log = Log::default();
        let mut registry = TemplateRegistry::new();
        registry.register(step(&log));
        let fail_log = log.clone();
        registry.register(
            Template::new("fail", "Fail")
                .with_input(SocketDescriptor::new("in", "flow"))
                .with_output(SocketDescriptor::new("out", "flow"))
                .with_hook(ExecuteHook::new(move |ctx| {
                    let log = fail_log.clone();
                    async move {
                        log.borrow_mut().push(ctx.node_id().to_string());
                        Err::<(), HookError>("boom".into())
                    }
                })),
        );
        let mut graph = Graph::new();
        add(&mut graph, &registry, "a", "step");
        add(&mut graph, &registry, "b", "fail");
        add(&mut graph, &registry, "c", "step");
        link(&mut graph, "a", "out", "b");
        link(&mut graph, "b", "out", "c");

        let completions = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventBus::new();
        let sink = completions.clone();
        events.subscribe(move |e| {
            if let GraphEvent::ExecutionCompleted { executed, total, error } = e {
                sink.borrow_mut().push((*executed, *total, error.clone()));
            }
        });
        let mut presenter = RecordingPresenter::default();
        let err = block_on(ExecutionScheduler::new().run(&graph, &registry, &mut events, &mut presenter))
            .unwrap_err();

        let ExecutionError::NodeFailed { node, executed, .. } = err;
        assert_eq!(node, NodeId::new("b"));
        assert_eq!(executed, 1);
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert_eq!(*completions.borrow(), vec![(1, 3, Some("boom".to_string()))]);
        assert_eq!(
            presenter.updates.last(),
            Some(&VisualUpdate::NodeExecuting {
                node: NodeId::new("b"),
                active: false
            })
        );
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in flow templates.
//!
//! Execution-flow nodes pass control along `exec` sockets: each node
//! activates the outputs that should continue, so branches gate everything
//! downstream of the path not taken.

use crate::error::HookError;
use crate::execution::NodeContext;
use crate::socket::SocketDescriptor;
use crate::template::{ExecuteHook, Template, TemplateRegistry};

/// Data type of execution-flow sockets
pub const EXEC: &str = "exec";

/// Category shared by the flow templates
pub const FLOW_CATEGORY: &str = "flow";

fn exec_in(id: &str) -> SocketDescriptor {
    SocketDescriptor::new(id, EXEC).with_max_connections(usize::MAX)
}

fn exec_out(id: &str) -> SocketDescriptor {
    SocketDescriptor::new(id, EXEC)
}

fn pass_through(ctx: &NodeContext) -> Result<(), HookError> {
    ctx.activate("out");
    Ok(())
}

/// Entry point of a flow
pub fn start() -> Template {
    Template::new("start", "Start")
        .with_category(FLOW_CATEGORY)
        .with_output(exec_out("out").with_label("Exec"))
        .with_size(140.0, 60.0)
        .with_hook(ExecuteHook::sync(pass_through))
}

/// If/else branching on the node's `condition` data field
pub fn branch() -> Template {
    Template::new("branch", "Branch")
        .with_category(FLOW_CATEGORY)
        .with_input(exec_in("in").with_label("Exec"))
        .with_output(exec_out("true").with_label("True"))
        .with_output(exec_out("false").with_label("False"))
        .with_hook(ExecuteHook::sync(|ctx| {
            let condition = match ctx.field("condition") {
                Some(serde_json::Value::Bool(b)) => *b,
                Some(serde_json::Value::Null) | None => false,
                Some(other) => return Err(format!("condition must be a boolean, got {other}").into()),
            };
            ctx.activate(if condition { "true" } else { "false" });
            Ok(())
        }))
}

/// Log the node's `message` data field
pub fn log() -> Template {
    Template::new("log", "Log")
        .with_category(FLOW_CATEGORY)
        .with_input(exec_in("in").with_label("Exec"))
        .with_output(exec_out("out").with_label("Exec"))
        .with_hook(ExecuteHook::sync(|ctx| {
            let message = ctx
                .field("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            tracing::info!("[{}] {message}", ctx.node_id());
            pass_through(ctx)
        }))
}

/// Join two flows
pub fn merge() -> Template {
    Template::new("merge", "Merge")
        .with_category(FLOW_CATEGORY)
        .with_input(exec_in("a").with_label("A"))
        .with_input(exec_in("b").with_label("B"))
        .with_output(exec_out("out").with_label("Exec"))
        .with_hook(ExecuteHook::sync(pass_through))
}

/// Every built-in template
pub fn templates() -> [Template; 4] {
    [start(), branch(), log(), merge()]
}

/// Register every built-in template
pub fn register_presets(registry: &mut TemplateRegistry) {
    for template in templates() {
        registry.register(template);
    }
}

/// Registry holding only the built-in templates
pub fn preset_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    register_presets(&mut registry);
    registry
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node templates and the template registry.
//!
//! A template describes a node type once: its sockets, default size and an
//! optional execution hook. Nodes are instantiated from templates by name.

use crate::error::HookError;
use crate::execution::NodeContext;
use crate::socket::SocketDescriptor;
use egui::Vec2;
use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Default node width in world units
pub const DEFAULT_WIDTH: f32 = 180.0;
/// Default node height in world units
pub const DEFAULT_HEIGHT: f32 = 80.0;

/// Future returned by an execution hook
pub type HookFuture = LocalBoxFuture<'static, Result<(), HookError>>;

/// Execution hook attached to a template
#[derive(Clone)]
pub struct ExecuteHook(Rc<dyn Fn(NodeContext) -> HookFuture>);

impl ExecuteHook {
    /// Wrap an asynchronous hook
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(NodeContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), HookError>> + 'static,
    {
        Self(Rc::new(move |ctx| hook(ctx).boxed_local()))
    }

    /// Wrap a synchronous hook
    pub fn sync<F>(hook: F) -> Self
    where
        F: Fn(&NodeContext) -> Result<(), HookError> + 'static,
    {
        Self(Rc::new(move |ctx| futures::future::ready(hook(&ctx)).boxed_local()))
    }

    pub(crate) fn call(&self, ctx: NodeContext) -> HookFuture {
        (self.0)(ctx)
    }
}

impl fmt::Debug for ExecuteHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecuteHook")
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique type name
    pub name: String,
    /// Display label
    pub label: String,
    /// Default width
    #[serde(default = "default_width")]
    pub width: f32,
    /// Default height
    #[serde(default = "default_height")]
    pub height: f32,
    /// Palette category
    #[serde(default)]
    pub category: String,
    /// Input sockets
    #[serde(default)]
    pub inputs: Vec<SocketDescriptor>,
    /// Output sockets
    #[serde(default)]
    pub outputs: Vec<SocketDescriptor>,
    /// Execution hook
    #[serde(skip)]
    pub on_execute: Option<ExecuteHook>,
}

fn default_width() -> f32 {
    DEFAULT_WIDTH
}

fn default_height() -> f32 {
    DEFAULT_HEIGHT
}

impl Template {
    /// Create a template with no sockets
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            category: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            on_execute: None,
        }
    }

    /// Add an input socket
    pub fn with_input(mut self, socket: SocketDescriptor) -> Self {
        self.inputs.push(socket);
        self
    }

    /// Add an output socket
    pub fn with_output(mut self, socket: SocketDescriptor) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Set the default size
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Attach an execution hook
    pub fn with_hook(mut self, hook: ExecuteHook) -> Self {
        self.on_execute = Some(hook);
        self
    }

    /// Default node size
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Registry of available node templates
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Rc<Template>>,
}

impl TemplateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any previous one with the same name.
    ///
    /// Existing nodes keep the sockets they were built with.
    pub fn register(&mut self, template: Template) {
        if self.templates.contains_key(&template.name) {
            tracing::debug!("Replacing template {}", template.name);
        }
        self.templates.insert(template.name.clone(), Rc::new(template));
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> Option<&Rc<Template>> {
        self.templates.get(name)
    }

    /// Whether a template is registered
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values().map(AsRef::as_ref)
    }

    /// Get templates by category
    pub fn templates_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Template> {
        self.templates().filter(move |t| t.category == category)
    }
}

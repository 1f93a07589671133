//! Build-time graph construction.
//!
//! Routing is a property of edges, not nodes: instead of a router
//! function plus a path map, every edge carries its own [`Predicate`] and
//! a branching node simply registers more than one outgoing edge,
//! evaluated in insertion order at run time (see `runtime.rs`). A node
//! having two outgoing edges is not an error; it is how
//! `on-tool-call`/`on-assistant-message` branches are expressed.

use std::collections::HashMap;
use std::sync::Arc;

use super::compile_error::CompilationError;
use super::node::Node;
use super::predicate::Predicate;

pub struct Graph<S> {
    pub(crate) name: String,
    pub(crate) start: String,
    pub(crate) finish: String,
    pub(crate) nodes: HashMap<String, Arc<dyn Node<S>>>,
    /// Edges in insertion order, keyed by source node id. Within one
    /// source, the `Vec` order is evaluation order.
    pub(crate) edges: HashMap<String, Vec<(String, Predicate<S>)>>,
}

impl<S> std::fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("finish", &self.finish)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .finish()
    }
}

impl<S> Graph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct GraphBuilder<S> {
    name: String,
    start: Option<String>,
    finish: Option<String>,
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Vec<(String, Predicate<S>)>>,
}

impl<S: Send + 'static> GraphBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        GraphBuilder {
            name: name.into(),
            start: None,
            finish: None,
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn node(mut self, node: Arc<dyn Node<S>>) -> Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    pub fn start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    pub fn finish(mut self, id: impl Into<String>) -> Self {
        self.finish = Some(id.into());
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>, predicate: Predicate<S>) -> Self {
        self.edges.entry(from.into()).or_default().push((to.into(), predicate));
        self
    }

    pub fn build(self) -> Result<Graph<S>, CompilationError> {
        let start = self.start.ok_or(CompilationError::MissingStart)?;
        let finish = self.finish.ok_or(CompilationError::MissingEnd)?;

        if !self.nodes.contains_key(&start) {
            return Err(CompilationError::NodeNotFound(start));
        }
        if !self.nodes.contains_key(&finish) {
            return Err(CompilationError::NodeNotFound(finish));
        }

        let mut has_incoming: HashMap<&str, bool> =
            self.nodes.keys().map(|k| (k.as_str(), false)).collect();
        let mut has_outgoing: HashMap<&str, bool> =
            self.nodes.keys().map(|k| (k.as_str(), false)).collect();

        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(CompilationError::NodeNotFound(from.clone()));
            }
            if !targets.is_empty() {
                has_outgoing.insert(from.as_str(), true);
            }
            for (to, _) in targets {
                if !self.nodes.contains_key(to) {
                    return Err(CompilationError::NodeNotFound(to.clone()));
                }
                has_incoming.insert(to.as_str(), true);
            }
        }

        for id in self.nodes.keys() {
            if id != &start && !has_incoming.get(id.as_str()).copied().unwrap_or(false) {
                return Err(CompilationError::UnreachableNode(id.clone()));
            }
            if id != &finish && !has_outgoing.get(id.as_str()).copied().unwrap_or(false) {
                return Err(CompilationError::DeadEndNode(id.clone()));
            }
        }

        Ok(Graph { name: self.name, start, finish, nodes: self.nodes, edges: self.edges })
    }
}

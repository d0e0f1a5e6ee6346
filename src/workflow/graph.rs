//! Runtime workflow representation using a directed graph.
//!
//! A [`Workflow`] is built once from a [`WorkflowModel`] and never mutated
//! afterwards, so executions share it through an `Arc` without locking.
//! Per-run state (paths, loop counters, statuses) lives in the dispatcher.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    WorkflowModel,
    error::ValidationError,
    workflow::{
        edge::Edge,
        node::{Node, NodeId, NodeType},
    },
};

/// Checks a definition without building anything the caller keeps.
///
/// Accepts iff node ids are unique, every node type is known, the entry point
/// exists and every edge endpoint exists. Cycles are checked separately by
/// [`Workflow::find_illegal_cycle`].
pub fn validate(model: &WorkflowModel) -> Result<(), ValidationError> {
    Workflow::try_from(model).map(|_| ())
}

#[derive(Debug, Clone)]
pub struct Workflow {
    id: String,
    name: String,
    entry_point: NodeId,
    graph: DiGraph<Node, Edge>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Workflow {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_point(&self) -> &NodeId {
        &self.entry_point
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get_node(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Outgoing edges of `nid` in definition order.
    pub fn outgoing_edges(
        &self,
        nid: &str,
    ) -> Vec<&Edge> {
        let Some(idx) = self.index.get(nid) else {
            return Vec::new();
        };
        // petgraph walks outgoing edges newest first
        let mut edges: Vec<_> = self.graph.edges_directed(*idx, Direction::Outgoing).collect();
        edges.sort_by_key(|e| e.id().index());
        edges.into_iter().map(|e| e.weight()).collect()
    }

    /// Nodes to schedule after `nid` completed.
    ///
    /// Non-branching nodes fire every outgoing edge. Branching nodes fire the first
    /// edge whose handle equals `branch_handle`, else the first default edge, else
    /// nothing.
    pub fn resolve_next(
        &self,
        nid: &str,
        branch_handle: Option<&str>,
    ) -> Vec<NodeId> {
        let Some(node) = self.get_node(nid) else {
            return Vec::new();
        };
        let edges = self.outgoing_edges(nid);

        if !node.node_type.is_branching() {
            return edges.into_iter().map(|e| e.target.clone()).collect();
        }

        let selected = branch_handle
            .filter(|h| !h.is_empty())
            .and_then(|h| edges.iter().find(|e| e.matches(h)))
            .or_else(|| edges.iter().find(|e| e.is_default()));

        selected.map(|e| vec![e.target.clone()]).unwrap_or_default()
    }

    /// First cycle found that does not pass through a `loop` node.
    ///
    /// The cycle is returned as a closed walk, e.g. `[a, b, a]`.
    pub fn find_illegal_cycle(&self) -> Option<Vec<NodeId>> {
        for scc in tarjan_scc(&self.graph) {
            let cyclic = scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]);
            if !cyclic {
                continue;
            }
            if scc.iter().any(|idx| self.graph[*idx].node_type == NodeType::Loop) {
                continue;
            }
            return Some(self.cycle_through(&scc));
        }
        None
    }

    /// Shortest closed walk from the first member of a strongly connected component back to itself.
    fn cycle_through(
        &self,
        scc: &[NodeIndex],
    ) -> Vec<NodeId> {
        let members: HashSet<NodeIndex> = scc.iter().copied().collect();
        let start = scc[0];
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut closing = None;

        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if next == start {
                    closing = Some(current);
                    break;
                }
                if members.contains(&next) && !parent.contains_key(&next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
            if closing.is_some() {
                break;
            }
        }

        let mut walk = vec![self.graph[start].id.clone()];
        let mut cursor = closing;
        while let Some(idx) = cursor {
            if idx == start {
                break;
            }
            walk.push(self.graph[idx].id.clone());
            cursor = parent.get(&idx).copied();
        }
        walk.push(self.graph[start].id.clone());
        let end = walk.len() - 1;
        walk[1..end].reverse();
        walk
    }

    /// Output a human-readable representation of the workflow graph
    pub fn schema(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Workflow {} ({}) ===", self.name, self.id));
        lines.push(format!(
            "Nodes: {}, Edges: {}, Entry: {}",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.entry_point
        ));

        for node in self.nodes() {
            let outgoing: Vec<String> = self
                .outgoing_edges(&node.id)
                .into_iter()
                .map(|e| match e.source_handle.as_deref() {
                    Some(h) if !h.is_empty() => format!("{}({})", e.target, h),
                    _ => e.target.clone(),
                })
                .collect();

            if outgoing.is_empty() {
                lines.push(format!("[{}] {} -> (end)", node.node_type, node.id));
            } else {
                lines.push(format!("[{}] {} -> {}", node.node_type, node.id, outgoing.join(", ")));
            }
        }

        lines.join("\n")
    }
}

impl TryFrom<&WorkflowModel> for Workflow {
    type Error = ValidationError;

    fn try_from(model: &WorkflowModel) -> Result<Self, ValidationError> {
        let mut graph: DiGraph<Node, Edge> = DiGraph::new();
        let mut index = HashMap::new();

        for node_model in model.nodes.iter() {
            if index.contains_key(&node_model.id) {
                return Err(ValidationError::DuplicateNode(node_model.id.clone()));
            }
            let node = Node::try_from(node_model)?;
            let nid = node.id.clone();
            index.insert(nid, graph.add_node(node));
        }

        if !index.contains_key(&model.entry_point) {
            return Err(ValidationError::MissingEntryPoint);
        }

        for edge_model in model.edges.iter() {
            let source = index.get(&edge_model.source).ok_or_else(|| ValidationError::DanglingEdge(edge_model.id.clone()))?;
            let target = index.get(&edge_model.target).ok_or_else(|| ValidationError::DanglingEdge(edge_model.id.clone()))?;
            graph.add_edge(*source, *target, Edge::from(edge_model));
        }

        Ok(Self {
            id: model.id.clone(),
            name: model.name.clone(),
            entry_point: model.entry_point.clone(),
            graph,
            index,
        })
    }
}

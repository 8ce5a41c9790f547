//! Reference graph
//!
//! Transitive set of types referenced by a struct or command through its
//! members/parameters, restricted by a member predicate. Every discovered
//! edge is recorded in a petgraph `DiGraph`, which both explains why a type
//! was reached and yields the closures.
//!
//! Self-referential structs (e.g. through a `pNext`-style pointer) are
//! normal. Types on a reference cycle form one strongly connected component
//! and share a single closure, so a result never depends on which member of
//! the cycle was looked up first.

use petgraph::algo::{astar, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::registry::Registry;
use crate::schema::MemberDecl;

pub type TypeSet = BTreeSet<String>;

/// Decides which members count as references
pub type MemberPredicate<'p> = Box<dyn Fn(&MemberDecl) -> bool + 'p>;

// =============================================================================
// Member Classification
// =============================================================================

/// Classifies members by their declaration text
#[derive(Debug, Clone)]
pub struct MemberClassifier {
    type_prefix: String,
    const_re: Regex,
    array_re: Regex,
}

impl MemberClassifier {
    pub fn new(type_prefix: impl Into<String>) -> Result<Self> {
        Ok(Self {
            type_prefix: type_prefix.into(),
            const_re: compile(r"\bconst\b")?,
            array_re: compile(r"\[[^]]+\]")?,
        })
    }

    pub fn type_prefix(&self) -> &str {
        &self.type_prefix
    }

    /// Does the declaration mention one of this API's own types?
    pub fn is_api_type(&self, member: &MemberDecl) -> bool {
        member.text().contains(&self.type_prefix)
    }

    /// Is this an API-typed input: const-qualified, or neither pointer nor array?
    pub fn is_input(&self, member: &MemberDecl) -> bool {
        let text = member.text();
        if !text.contains(&self.type_prefix) {
            return false;
        }
        if self.const_re.is_match(&text) {
            return true;
        }
        !(text.contains('*') || self.array_re.is_match(&text))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| RegistryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

// =============================================================================
// Reference Graph
// =============================================================================

pub struct ReferenceGraph<'r, 's> {
    registry: &'r Registry<'s>,
    api: Option<String>,
    predicate: MemberPredicate<'r>,
    closures: HashMap<String, TypeSet>,
    direct: HashMap<String, TypeSet>,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl<'r, 's> ReferenceGraph<'r, 's> {
    pub fn new(registry: &'r Registry<'s>, predicate: impl Fn(&MemberDecl) -> bool + 'r) -> Self {
        Self {
            registry,
            api: None,
            predicate: Box::new(predicate),
            closures: HashMap::new(),
            direct: HashMap::new(),
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Prefer `api`'s definitions of structs and commands
    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    /// Types named by members of `name` that satisfy the predicate
    pub fn directly_referenced(&mut self, name: &str) -> TypeSet {
        if let Some(types) = self.direct.get(name) {
            return types.clone();
        }

        let types: TypeSet = self
            .registry
            .members_of(name, self.api.as_deref())
            .unwrap_or_default()
            .iter()
            .filter(|member| (self.predicate)(*member))
            .filter_map(|member| member.type_name.clone())
            .collect();

        let from = self.node(name);
        for ty in &types {
            let to = self.node(ty);
            self.graph.update_edge(from, to, ());
        }
        self.direct.insert(name.to_string(), types.clone());
        types
    }

    /// Every type transitively reachable from `name`
    pub fn referenced_types(&mut self, name: &str) -> TypeSet {
        if let Some(types) = self.closures.get(name) {
            return types.clone();
        }

        let reachable = self.expand(name);

        // Components come out in reverse topological order, so every
        // component a member points into is closed before it is needed
        for component in kosaraju_scc(&self.graph) {
            let members: Vec<String> = component.iter().map(|&n| self.graph[n].clone()).collect();
            if !members.iter().all(|m| reachable.contains(m)) || self.closures.contains_key(&members[0]) {
                continue;
            }
            if members.len() > 1 {
                debug!(types = ?members, "reference cycle");
            }

            let mut closure = TypeSet::new();
            for member in &members {
                for ty in &self.direct[member] {
                    closure.insert(ty.clone());
                    if let Some(inner) = self.closures.get(ty) {
                        closure.extend(inner.iter().cloned());
                    }
                }
            }
            for member in members {
                self.closures.insert(member, closure.clone());
            }
        }

        self.closures.get(name).cloned().unwrap_or_default()
    }

    /// Record the direct references of everything reachable from `name`
    fn expand(&mut self, name: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            for ty in self.directly_referenced(&next) {
                if !seen.contains(&ty) {
                    stack.push(ty);
                }
            }
        }
        seen
    }

    /// Shortest reference chain from `source` to `target`, both included
    pub fn shortest_path(&mut self, source: &str, target: &str) -> Option<Vec<String>> {
        self.referenced_types(source);
        let start = *self.nodes.get(source)?;
        let goal = *self.nodes.get(target)?;
        let (_, path) = astar(&self.graph, start, |n| n == goal, |_| 1u32, |_| 0u32)?;
        Some(path.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }
}

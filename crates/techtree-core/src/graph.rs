//! Prerequisite graph built from a registry snapshot.
//!
//! The graph is an immutable arena: ids in registry order, an id -> index
//! map, and per-index requirement tables. It is recomputed wholesale from a
//! [`TechRegistry`] and never patched.
//!
//! # Depth
//!
//! A node's requirement units are its resolvable required parents plus each
//! `OR` group that has at least one resolvable alternative. Depth is
//! `1 + max(unit depth)`, where a required parent contributes its own depth
//! and an `OR` group the smallest depth among its alternatives. Nodes with no
//! units are roots at depth 0.
//!
//! Settling happens in nondecreasing depth order off a min-heap, so the first
//! alternative of an `OR` group to settle is its minimum. Whatever is left
//! over sits on or behind a cycle and is relaxed with a bounded
//! revisit-while-deeper pass: each node may grow at most `|V|` times before
//! its depth is frozen.

use crate::registry::TechRegistry;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{tech} requires unknown technology {missing}")]
    DanglingPrerequisite { tech: String, missing: String },

    #[error("{tech} is on a prerequisite cycle, depth frozen at {depth}")]
    CycleDetected { tech: String, depth: u32 },
}

// ---------------------------------------------------------------------------
// TechGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TechGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Resolved hard requirements, per node.
    required: Vec<Vec<usize>>,
    /// Resolved `OR` groups, per node; empty groups are dropped.
    any_of: Vec<Vec<Vec<usize>>>,
    /// Union of required parents and `OR` alternatives, declaration order.
    parents: Vec<Vec<usize>>,
    /// Inverse of `parents`, registry order.
    children: Vec<Vec<usize>>,
    depth: Vec<u32>,
    /// `widths[d]` = number of nodes at depth `d`.
    widths: Vec<usize>,
    max_depth: u32,
    max_width: usize,
    /// Sorted node indices that sit on a cycle.
    cyclic: Vec<usize>,
    warnings: Vec<GraphError>,
    generation: u64,
}

/// Alias for [`TechGraph::build`].
pub fn build_graph(registry: &TechRegistry) -> TechGraph {
    TechGraph::build(registry)
}

impl TechGraph {
    /// Build from the current registry contents. Idempotent and free of side
    /// effects on the registry.
    pub fn build(registry: &TechRegistry) -> Self {
        let mut graph = Self {
            generation: registry.generation(),
            ..Self::default()
        };

        for record in registry.iter() {
            graph.index.insert(record.id.clone(), graph.ids.len());
            graph.ids.push(record.id.clone());
        }

        let n = graph.ids.len();
        graph.required = vec![Vec::new(); n];
        graph.any_of = vec![Vec::new(); n];
        graph.parents = vec![Vec::new(); n];
        graph.children = vec![Vec::new(); n];

        for (node, record) in registry.iter().enumerate() {
            let prereqs = &record.prerequisites;
            for missing in prereqs.ids().into_iter().filter(|id| !graph.index.contains_key(*id)) {
                tracing::warn!(tech = %record.id, missing = %missing, "dangling prerequisite");
                graph.warnings.push(GraphError::DanglingPrerequisite {
                    tech: record.id.clone(),
                    missing: missing.to_string(),
                });
            }

            let required: Vec<usize> = prereqs
                .required
                .iter()
                .filter_map(|id| graph.index.get(id).copied())
                .collect();
            let groups: Vec<Vec<usize>> = prereqs
                .any_of
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .filter_map(|id| graph.index.get(id).copied())
                        .collect::<Vec<_>>()
                })
                .filter(|group| !group.is_empty())
                .collect();

            let mut parents: Vec<usize> = Vec::with_capacity(required.len());
            for &p in required.iter().chain(groups.iter().flatten()) {
                if !parents.contains(&p) {
                    parents.push(p);
                }
            }

            graph.required[node] = required;
            graph.any_of[node] = groups;
            graph.parents[node] = parents;
        }

        for node in 0..n {
            for i in 0..graph.parents[node].len() {
                let parent = graph.parents[node][i];
                graph.children[parent].push(node);
            }
        }

        graph.compute_depths();
        graph.compute_widths();

        tracing::debug!(
            nodes = n,
            max_depth = graph.max_depth,
            max_width = graph.max_width,
            cyclic = graph.cyclic.len(),
            warnings = graph.warnings.len(),
            "built tech graph"
        );
        graph
    }

    // -----------------------------------------------------------------------
    // Depth computation
    // -----------------------------------------------------------------------

    fn compute_depths(&mut self) {
        let n = self.ids.len();
        self.depth = vec![0; n];

        // Who waits on whom: parent -> (child, unit), where unit is `None`
        // for a required edge and `Some(g)` for `OR` group `g`.
        let mut waiters: Vec<Vec<(usize, Option<usize>)>> = vec![Vec::new(); n];
        let mut remaining: Vec<usize> = vec![0; n];
        let mut group_done: Vec<Vec<bool>> = Vec::with_capacity(n);

        for node in 0..n {
            for &p in &self.required[node] {
                waiters[p].push((node, None));
            }
            for (g, group) in self.any_of[node].iter().enumerate() {
                for &alt in group {
                    waiters[alt].push((node, Some(g)));
                }
            }
            remaining[node] = self.required[node].len() + self.any_of[node].len();
            group_done.push(vec![false; self.any_of[node].len()]);
        }

        let mut settled = vec![false; n];
        let mut acc: Vec<u32> = vec![0; n];
        let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
        for (node, &units) in remaining.iter().enumerate() {
            if units == 0 {
                heap.push(Reverse((0, node)));
            }
        }

        while let Some(Reverse((d, node))) = heap.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;
            self.depth[node] = d;

            for &(child, unit) in &waiters[node] {
                if settled[child] {
                    continue;
                }
                match unit {
                    None => {}
                    Some(g) if !group_done[child][g] => group_done[child][g] = true,
                    Some(_) => continue,
                }
                acc[child] = acc[child].max(d);
                remaining[child] -= 1;
                if remaining[child] == 0 {
                    heap.push(Reverse((acc[child] + 1, child)));
                }
            }
        }

        let unsettled: Vec<usize> = (0..n).filter(|&i| !settled[i]).collect();
        if !unsettled.is_empty() {
            self.relax_cycles(&unsettled, &settled);
        }
    }

    /// Bounded revisit-while-deeper relaxation over nodes the settle pass
    /// could not reach.
    fn relax_cycles(&mut self, unsettled: &[usize], settled: &[bool]) {
        let n = self.ids.len();
        let limit = u32::try_from(n).unwrap_or(u32::MAX);
        let mut visits: Vec<u32> = vec![0; n];
        let mut frozen = vec![false; n];
        let mut queued = vec![false; n];
        let mut queue: VecDeque<usize> = VecDeque::with_capacity(unsettled.len());
        for &node in unsettled {
            queued[node] = true;
            queue.push_back(node);
        }

        while let Some(node) = queue.pop_front() {
            queued[node] = false;
            if frozen[node] {
                continue;
            }
            let candidate = self.candidate_depth(node);
            if candidate <= self.depth[node] {
                continue;
            }
            self.depth[node] = candidate;
            visits[node] += 1;
            if visits[node] >= limit {
                frozen[node] = true;
            }
            for &child in &self.children[node] {
                if !settled[child] && !frozen[child] && !queued[child] {
                    queued[child] = true;
                    queue.push_back(child);
                }
            }
        }

        let mut in_scope = vec![false; n];
        for &node in unsettled {
            in_scope[node] = true;
        }
        self.cyclic = cycle_members(unsettled, &self.parents, &in_scope);
        self.cyclic.sort_unstable();

        for &node in &self.cyclic {
            let depth = self.depth[node];
            tracing::warn!(tech = %self.ids[node], depth, "prerequisite cycle");
            self.warnings.push(GraphError::CycleDetected {
                tech: self.ids[node].clone(),
                depth,
            });
        }
    }

    fn candidate_depth(&self, node: usize) -> u32 {
        let required = self.required[node].iter().map(|&p| self.depth[p]);
        let groups = self.any_of[node]
            .iter()
            .filter_map(|group| group.iter().map(|&alt| self.depth[alt]).min());
        required
            .chain(groups)
            .max()
            .map_or(0, |d| d.saturating_add(1))
    }

    fn compute_widths(&mut self) {
        self.max_depth = self.depth.iter().copied().max().unwrap_or(0);
        if self.ids.is_empty() {
            return;
        }
        self.widths = vec![0; self.max_depth as usize + 1];
        for &d in &self.depth {
            self.widths[d as usize] += 1;
        }
        self.max_width = self.widths.iter().copied().max().unwrap_or(0);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Nodes with no resolved requirement unit, in registry order.
    pub fn roots(&self) -> Vec<&str> {
        (0..self.ids.len())
            .filter(|&i| self.required[i].is_empty() && self.any_of[i].is_empty())
            .map(|i| self.ids[i].as_str())
            .collect()
    }

    pub fn depth(&self, id: &str) -> Option<u32> {
        self.index.get(id).map(|&i| self.depth[i])
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Number of nodes whose depth is exactly `depth`.
    pub fn width_at(&self, depth: u32) -> usize {
        self.widths.get(depth as usize).copied().unwrap_or(0)
    }

    /// Ids grouped by depth, sorted within each level.
    pub fn levels(&self) -> Vec<Vec<&str>> {
        let mut levels: Vec<Vec<&str>> = vec![Vec::new(); self.widths.len()];
        for (i, id) in self.ids.iter().enumerate() {
            levels[self.depth[i] as usize].push(id.as_str());
        }
        for level in &mut levels {
            level.sort_unstable();
        }
        levels
    }

    /// Resolved parents: required ids first, then `OR` alternatives.
    pub fn prerequisites(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.parents)
    }

    /// Resolved children, in registry order.
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.children)
    }

    fn neighbours<'a>(&'a self, id: &str, table: &'a [Vec<usize>]) -> Vec<&'a str> {
        match self.index.get(id) {
            Some(&i) => table[i].iter().map(|&j| self.ids[j].as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Canonical path from a root down to `id`, inclusive. At each step up
    /// the parent with the greatest depth strictly below the current one is
    /// taken, ties going to the smallest id. Empty for unknown ids.
    pub fn path_to_root(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let here = self.depth[current];
            let next = self.parents[current]
                .iter()
                .copied()
                .filter(|&p| self.depth[p] < here)
                .max_by(|&a, &b| {
                    self.depth[a]
                        .cmp(&self.depth[b])
                        .then_with(|| self.ids[b].cmp(&self.ids[a]))
                });
            match next {
                Some(p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }

        path.iter().rev().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Ids on a prerequisite cycle, sorted by registry position.
    pub fn cyclic(&self) -> Vec<&str> {
        self.cyclic.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    pub fn is_cyclic(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|i| self.cyclic.binary_search(i).is_ok())
    }

    /// Dangling references and frozen cycles found during the build.
    pub fn warnings(&self) -> &[GraphError] {
        &self.warnings
    }

    /// Registry generation this graph was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` once the registry has been mutated since the build.
    pub fn is_current(&self, registry: &TechRegistry) -> bool {
        self.generation == registry.generation()
    }
}

/// Members of non-trivial strongly connected components (and self-loops)
/// among `nodes`, following parent edges that stay in scope. Iterative
/// Tarjan.
fn cycle_members(nodes: &[usize], parents: &[Vec<usize>], in_scope: &[bool]) -> Vec<usize> {
    const UNVISITED: usize = usize::MAX;

    let n = parents.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next = 0usize;
    let mut out = Vec::new();

    for &start in nodes {
        if index[start] != UNVISITED {
            continue;
        }
        index[start] = next;
        lowlink[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut call: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = call.last_mut() {
            let v = frame.0;
            if let Some(&w) = parents[v].get(frame.1) {
                frame.1 += 1;
                if !in_scope[w] {
                    continue;
                }
                if index[w] == UNVISITED {
                    index[w] = next;
                    lowlink[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call.pop();
            if let Some(&(u, _)) = call.last() {
                lowlink[u] = lowlink[u].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 || parents[v].contains(&v) {
                    out.extend(component);
                }
            }
        }
    }

    out
}

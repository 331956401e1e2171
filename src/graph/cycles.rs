//! Dependency cycle detection.
//!
//! Strongly connected components are found with Tarjan's algorithm; inside
//! each component the shortest cycle through every member is recovered by
//! breadth-first search. Cycles are rotated to start at their smallest member
//! so each distinct cycle is reported once.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Find dependency cycles in a relation.
///
/// Each returned cycle is closed: `[a, b, c, a]`. The result is sorted.
pub fn find_cycles(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    let names: BTreeSet<&str> = edges
        .iter()
        .flat_map(|(from, tos)| std::iter::once(from.as_str()).chain(tos.iter().map(String::as_str)))
        .collect();
    for name in names {
        nodes.insert(name, graph.add_node(name));
    }
    for (from, tos) in edges {
        for to in tos {
            graph.add_edge(nodes[from.as_str()], nodes[to.as_str()], ());
        }
    }

    let mut cycles = BTreeSet::new();

    for component in tarjan_scc(&graph) {
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let trivial = component.len() == 1 && !graph.contains_edge(component[0], component[0]);
        if trivial {
            continue;
        }

        for &start in &component {
            if let Some(cycle) = shortest_cycle(&graph, start, &members) {
                cycles.insert(canonical_rotation(cycle));
            }
        }
    }

    cycles
        .into_iter()
        .map(|mut cycle| {
            let first = cycle[0].clone();
            cycle.push(first);
            cycle
        })
        .collect()
}

/// Shortest path from `start` back to itself, staying inside `members`.
fn shortest_cycle(
    graph: &DiGraph<&str, ()>,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
) -> Option<Vec<String>> {
    let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let mut successors: Vec<NodeIndex> = graph
            .neighbors(current)
            .filter(|n| members.contains(n))
            .collect();
        successors.sort_by_key(|n| graph[*n]);
        successors.dedup();

        for next in successors {
            if next == start {
                let mut path = vec![graph[current].to_string()];
                let mut node = current;
                while node != start {
                    node = parents[&node];
                    path.push(graph[node].to_string());
                }
                path.reverse();
                return Some(path);
            }
            if !parents.contains_key(&next) {
                parents.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}

/// Rotate an open cycle so it starts at its smallest member.
fn canonical_rotation(mut cycle: Vec<String>) -> Vec<String> {
    if let Some(pos) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        cycle.rotate_left(pos);
    }
    cycle
}

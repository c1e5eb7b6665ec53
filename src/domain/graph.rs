//! Whole-store dependency checks.
//!
//! Individual records validate their own dependency lists
//! ([`Spec::validate`]); this module checks the relationships *between*
//! records: every dependency must resolve, and the graph must be acyclic.

use std::collections::{HashMap, VecDeque};

use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};

use crate::domain::{ReqId, Spec};

/// A problem with the dependency graph of a set of records.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// A record depends on an identifier that no record has.
    #[error("{from} depends on {to} which does not exist")]
    UnknownDependency {
        /// The dependent record.
        from: ReqId,
        /// The missing dependency.
        to: ReqId,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", render_cycle(.0))]
    Cycle(Vec<ReqId>),
}

fn render_cycle(cycle: &[ReqId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Check that every dependency resolves and that there are no cycles.
///
/// Edges point from a record to the records it depends on. When a cycle is
/// found it is reported as a closed path starting and ending at its
/// lowest-numbered member, e.g. `REQ-001 -> REQ-002 -> REQ-001`.
///
/// # Errors
///
/// Returns the first unknown dependency (in record order), otherwise the
/// cycle containing the lowest identifier.
pub fn validate_dependencies(specs: &[Spec]) -> Result<(), GraphError> {
    let mut graph: DiGraphMap<ReqId, ()> = DiGraphMap::with_capacity(specs.len(), specs.len());
    for spec in specs {
        graph.add_node(spec.id);
    }

    for spec in specs {
        for &dependency in &spec.depends {
            if !graph.contains_node(dependency) {
                return Err(GraphError::UnknownDependency {
                    from: spec.id,
                    to: dependency,
                });
            }
            graph.add_edge(spec.id, dependency, ());
        }
    }

    let cycle = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .filter_map(|component| closed_path(&graph, &component))
        .min_by_key(|path| path[0]);

    cycle.map_or(Ok(()), |path| Err(GraphError::Cycle(path)))
}

/// Find a closed path through a strongly connected component.
///
/// Breadth-first search from the lowest member back to itself, restricted to
/// the component, so the reported cycle is a shortest one.
fn closed_path(graph: &DiGraphMap<ReqId, ()>, component: &[ReqId]) -> Option<Vec<ReqId>> {
    let start = *component.iter().min()?;
    let mut parent: HashMap<ReqId, ReqId> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        let mut successors: Vec<ReqId> = graph
            .neighbors(node)
            .filter(|n| component.contains(n))
            .collect();
        successors.sort();

        for next in successors {
            if next == start {
                let mut path = vec![start, node];
                let mut current = node;
                while let Some(&previous) = parent.get(&current) {
                    path.push(previous);
                    current = previous;
                }
                // Built back to front: start, node, ..., start.
                path.reverse();
                return Some(path);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use non_empty_string::NonEmptyString;

    use super::*;
    use crate::domain::SourceInfo;

    fn id(n: usize) -> ReqId {
        ReqId::from_number(n).unwrap()
    }

    fn spec(n: usize, depends: &[usize]) -> Spec {
        let mut spec = Spec::new(
            id(n),
            NonEmptyString::new(format!("Requirement {n}")).unwrap(),
            SourceInfo::default(),
        );
        spec.depends = depends.iter().copied().map(id).collect();
        spec
    }

    #[test]
    fn acyclic_graph_is_valid() {
        let specs = [spec(1, &[]), spec(2, &[1]), spec(3, &[1, 2])];
        assert_eq!(validate_dependencies(&specs), Ok(()));
    }

    #[test]
    fn empty_set_is_valid() {
        assert_eq!(validate_dependencies(&[]), Ok(()));
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let specs = [spec(1, &[]), spec(2, &[9])];
        assert_eq!(
            validate_dependencies(&specs),
            Err(GraphError::UnknownDependency {
                from: id(2),
                to: id(9)
            })
        );
    }

    #[test]
    fn two_node_cycle_is_reported_from_lowest_member() {
        let specs = [spec(2, &[1]), spec(1, &[2])];
        let error = validate_dependencies(&specs).unwrap_err();
        assert_eq!(error, GraphError::Cycle(vec![id(1), id(2), id(1)]));
        assert_eq!(
            error.to_string(),
            "dependency cycle detected: REQ-001 -> REQ-002 -> REQ-001"
        );
    }

    #[test]
    fn three_node_cycle_follows_edges() {
        let specs = [spec(1, &[3]), spec(2, &[1]), spec(3, &[2]), spec(4, &[1])];
        assert_eq!(
            validate_dependencies(&specs),
            Err(GraphError::Cycle(vec![id(1), id(3), id(2), id(1)]))
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let specs = [spec(5, &[5])];
        assert_eq!(
            validate_dependencies(&specs),
            Err(GraphError::Cycle(vec![id(5), id(5)]))
        );
    }
}

//! Dependency ordering of plan operations.

use super::{Action, Operation, PlanError};
use std::collections::{BTreeSet, HashMap};

/// Order operations so every operation runs after the one that declares a
/// name it references as container or placement anchor.
///
/// Independent operations keep their plan order. References to names no
/// operation declares add no edge. Returns indices into `operations`.
pub fn dependency_order(operations: &[Operation]) -> Result<Vec<usize>, PlanError> {
    let mut producers: HashMap<&str, usize> = HashMap::new();
    for (index, op) in operations.iter().enumerate() {
        if op.action == Action::Add {
            if let Some(name) = op.name.as_deref() {
                producers.entry(name).or_insert(index);
            }
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    let mut in_degree = vec![0usize; operations.len()];
    for (index, op) in operations.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for reference in op.references() {
            let Some(&producer) = producers.get(reference) else {
                continue;
            };
            if producer != index && seen.insert(producer) {
                dependents[producer].push(index);
                in_degree[index] += 1;
            }
        }
    }

    // Kahn's algorithm; the lowest ready index goes first to keep plan order.
    let mut ready: BTreeSet<usize> = (0..operations.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(operations.len());
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &next in &dependents[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < operations.len() {
        let operations = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(index, _)| format!("#{} ({})", index + 1, operations[index].label()))
            .collect();
        return Err(PlanError::DependencyCycle { operations });
    }

    if order.iter().enumerate().any(|(pos, &index)| pos != index) {
        log::debug!("Reordered plan operations: {:?}", order);
    }
    Ok(order)
}

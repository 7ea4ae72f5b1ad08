//! Pass ordering from before/after constraints.
//!
//! Two strategies are available:
//!
//! - [`OrderingMode::Splice`] walks the registration order once and moves a
//!   pass next to the pass it names. It never fails, but chained or
//!   conflicting constraints may leave some of them unsatisfied.
//! - [`OrderingMode::Topological`] builds a constraint graph and sorts it
//!   with Kahn's algorithm, breaking ties by registration order. Cycles are
//!   reported instead of silently resolved.
//!
//! Constraints naming an unregistered id are skipped in both modes.

use std::collections::HashSet;

/// Strategy used to resolve before/after constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingMode {
    /// Single non-fixed-point splice over the registration order.
    #[default]
    Splice,
    /// Stable topological sort with cycle detection.
    Topological,
}

/// Ordering constraints of one registered pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConstraint<'a> {
    /// Pass id.
    pub id: &'a str,
    /// Id this pass should precede.
    pub before: Option<&'a str>,
    /// Id this pass should follow.
    pub after: Option<&'a str>,
}

fn position(order: &[usize], passes: &[PassConstraint<'_>], id: &str) -> Option<usize> {
    order.iter().position(|&index| passes[index].id == id)
}

/// Order passes by splicing each constrained pass next to its target.
///
/// Returns indices into `passes`. First every `before` constraint is
/// applied in registration order: if the target currently runs earlier
/// than the pass, the pass is moved immediately in front of it. Then every
/// `after` constraint is applied symmetrically. Satisfied constraints are
/// left alone. Duplicate ids keep their first occurrence.
pub fn splice_order(passes: &[PassConstraint<'_>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..passes.len()).collect();

    for (index, pass) in passes.iter().enumerate() {
        let Some(target) = pass.before else { continue };
        let (Some(target_pos), Some(self_pos)) = (
            position(&order, passes, target),
            order.iter().position(|&i| i == index),
        ) else {
            log::trace!("Pass '{}' before unknown pass '{}', skipped", pass.id, target);
            continue;
        };
        if target_pos < self_pos {
            order.remove(self_pos);
            order.insert(target_pos, index);
        }
    }

    for (index, pass) in passes.iter().enumerate() {
        let Some(target) = pass.after else { continue };
        let (Some(target_pos), Some(self_pos)) = (
            position(&order, passes, target),
            order.iter().position(|&i| i == index),
        ) else {
            log::trace!("Pass '{}' after unknown pass '{}', skipped", pass.id, target);
            continue;
        };
        if target_pos > self_pos {
            order.remove(self_pos);
            // The target shifted one slot left when the pass was removed.
            order.insert(target_pos, index);
        }
    }

    let mut seen = HashSet::new();
    order.retain(|&index| seen.insert(passes[index].id));
    order
}

/// Order passes by a stable topological sort of their constraints.
///
/// Returns indices into `passes`, or the ids of the passes caught in (or
/// behind) a cycle.
pub fn topological_order(passes: &[PassConstraint<'_>]) -> Result<Vec<usize>, Vec<String>> {
    let count = passes.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];

    let find = |id: &str| passes.iter().position(|pass| pass.id == id);

    for (index, pass) in passes.iter().enumerate() {
        if let Some(target) = pass.before.and_then(find) {
            if target != index {
                successors[index].push(target);
                in_degree[target] += 1;
            }
        }
        if let Some(target) = pass.after.and_then(find) {
            if target != index {
                successors[target].push(index);
                in_degree[index] += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(count);
    let mut placed = vec![false; count];
    while order.len() < count {
        // Lowest registration index among the ready passes.
        let Some(next) = (0..count).find(|&i| !placed[i] && in_degree[i] == 0) else {
            let remaining = (0..count)
                .filter(|&i| !placed[i])
                .map(|i| passes[i].id.to_string())
                .collect();
            return Err(remaining);
        };
        placed[next] = true;
        order.push(next);
        for &successor in &successors[next] {
            in_degree[successor] -= 1;
        }
    }

    Ok(order)
}

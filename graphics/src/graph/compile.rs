//! Dependency discovery over resource versions.

use std::collections::{HashMap, VecDeque};

use super::pass::PassNode;
use super::resource::ResourceRef;

/// Passes and resources a frame needs.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Reachability {
    /// Reachable passes in registration order, each once.
    pub passes: Vec<usize>,
    /// Per logical resource: touched by a reachable pass or requested.
    pub needed: Vec<bool>,
}

/// Newest version of `target`'s resource written by any pass.
pub(crate) fn resolve_final(passes: &[PassNode], target: ResourceRef) -> Option<ResourceRef> {
    if !target.is_valid() {
        return None;
    }
    passes
        .iter()
        .flat_map(|pass| pass.bindings.outputs.iter().copied())
        .filter(|output| output.index() == target.index())
        .max_by_key(|output| output.version())
}

/// Walk backwards from `targets` through the producers of every input.
pub(crate) fn collect_passes(
    passes: &[PassNode],
    targets: &[ResourceRef],
    resource_count: usize,
) -> Reachability {
    let mut producers: HashMap<ResourceRef, usize> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        for &output in &pass.bindings.outputs {
            if let Some(previous) = producers.insert(output, index) {
                log::warn!(
                    "Passes '{}' and '{}' both produce {:?}",
                    passes[previous].name,
                    pass.name,
                    output
                );
            }
        }
    }

    let mut visited = vec![false; passes.len()];
    let mut needed = vec![false; resource_count];
    let mark = |resource: ResourceRef, needed: &mut [bool]| {
        if let Some(slot) = needed.get_mut(resource.index() as usize) {
            *slot = true;
        }
    };

    let mut queue: VecDeque<ResourceRef> = targets.iter().copied().collect();
    while let Some(resource) = queue.pop_front() {
        mark(resource, &mut needed);
        let Some(&producer) = producers.get(&resource) else {
            continue;
        };
        if std::mem::replace(&mut visited[producer], true) {
            continue;
        }
        let bindings = &passes[producer].bindings;
        for &output in &bindings.outputs {
            mark(output, &mut needed);
        }
        queue.extend(bindings.inputs.iter().copied());
    }

    Reachability {
        passes: visited
            .iter()
            .enumerate()
            .filter_map(|(index, &reached)| reached.then_some(index))
            .collect(),
        needed,
    }
}

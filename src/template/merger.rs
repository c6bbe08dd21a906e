//! Identity/component merger: unifies entities referenced across nested
//! template fragments before any attribute generation happens.
//!
//! An identity list declares "entity K in the parent may be identified with
//! entity X in one of several candidate fragments". One candidate is chosen
//! uniformly at random; K is deleted, every reference to K is rewritten to
//! the chosen entity, and the winning fragment's entities, relationships and
//! constraints are spliced into the parent. Cross-fragment constraints are
//! then ordinary constraints for the single-pass resolver.

use std::collections::HashSet;

use crate::rng::RunRng;

use super::Template;

/// Resolve all identities in `template`, recursively merging nested
/// fragments first. Fragments never chosen by any identity are discarded.
pub fn resolve_identities(template: &mut Template, rng: &mut RunRng) {
    let mut fragments = std::mem::take(&mut template.fragments);
    for fragment in &mut fragments {
        resolve_identities(fragment, rng);
    }

    let identities = std::mem::take(&mut template.identities);

    // Group candidates per parent entity, preserving declaration order.
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for identity in identities {
        match groups.iter_mut().find(|(parent, _)| *parent == identity.parent) {
            Some((_, candidates)) => candidates.push(identity.candidate),
            None => groups.push((identity.parent, vec![identity.candidate])),
        }
    }

    let mut spliced: HashSet<usize> = HashSet::new();
    for (parent, candidates) in groups {
        let Some(choice) = rng.choose(&candidates).cloned() else {
            continue;
        };
        let Some(fragment_idx) = fragments
            .iter()
            .position(|f| f.things.iter().any(|t| t.id == choice))
        else {
            tracing::warn!(
                parent,
                candidate = %choice,
                "identity candidate not found in any fragment; keeping parent entity"
            );
            continue;
        };

        template.things.retain(|t| t.id != parent);
        for relationship in &mut template.relationships {
            if relationship.node1 == parent {
                relationship.node1 = choice.clone();
            }
            if relationship.node2 == parent {
                relationship.node2 = choice.clone();
            }
        }
        for comparison in &mut template.comparisons {
            if comparison.thing1 == parent {
                comparison.thing1 = choice.clone();
            }
            if comparison.thing2 == parent {
                comparison.thing2 = choice.clone();
            }
        }

        // Splice each fragment at most once, even if several identities
        // resolve into it.
        if spliced.insert(fragment_idx) {
            let fragment = &mut fragments[fragment_idx];
            template.things.append(&mut fragment.things);
            template.relationships.append(&mut fragment.relationships);
            template.comparisons.append(&mut fragment.comparisons);
        }
    }
}

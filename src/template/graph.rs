//! Linearization of the `extends` graph

use std::collections::HashSet;

use tracing::trace;

use super::registry::{TemplateError, TemplateStore};

/// Ordered ancestors of `id`, earliest first, excluding `id` itself
///
/// Parents are visited left to right; each parent's own ancestors come before
/// it. A template reachable along several paths appears once, at its first
/// position.
pub fn linearize(store: &dyn TemplateStore, id: &str) -> Result<Vec<String>, TemplateError> {
    if store.definition(id).is_none() {
        return Err(TemplateError::NotFound { id: id.to_string() });
    }

    let mut walk = Walk {
        store,
        stack: vec![id.to_string()],
        seen: HashSet::new(),
        order: Vec::new(),
    };
    walk.visit(id)?;

    trace!(template = id, ancestors = ?walk.order, "linearized");
    Ok(walk.order)
}

struct Walk<'a> {
    store: &'a dyn TemplateStore,
    /// Templates currently being expanded (for cycle detection)
    stack: Vec<String>,
    seen: HashSet<String>,
    order: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, id: &str) -> Result<(), TemplateError> {
        let def = self
            .store
            .definition(id)
            .ok_or_else(|| TemplateError::NotFound { id: id.to_string() })?;

        for parent in &def.extends {
            if self.stack.iter().any(|open| open == parent) {
                let mut chain = self.stack.clone();
                chain.push(parent.clone());
                return Err(TemplateError::CircularReference {
                    chain: chain.join(" -> "),
                });
            }

            if self.seen.contains(parent) {
                continue;
            }

            if self.store.definition(parent).is_none() {
                return Err(TemplateError::UnknownParent {
                    template: id.to_string(),
                    parent: parent.clone(),
                });
            }

            self.stack.push(parent.clone());
            self.visit(parent)?;
            self.stack.pop();

            self.seen.insert(parent.clone());
            self.order.push(parent.clone());
        }

        Ok(())
    }
}

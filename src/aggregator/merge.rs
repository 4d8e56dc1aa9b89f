//! Folding event batches into category snapshots.

use crate::models::Category;

/// Fold one batch into every category.
///
/// Each category gains the batch entries that `matches` accepts and that it
/// does not already hold, in batch order. Every category is checked, not
/// only the one whose fetch produced the batch, so an event can land in a
/// category before that category's own fetch has started. Re-delivering a
/// batch leaves the categories unchanged.
pub fn merge_batch<E, M>(categories: &[Category<E>], batch: &[E], matches: &M) -> Vec<Category<E>>
where
    E: Clone + PartialEq,
    M: Fn(&E, &Category<E>) -> bool,
{
    categories
        .iter()
        .map(|category| {
            let mut fresh: Vec<&E> = Vec::new();
            for event in batch {
                if matches(event, category)
                    && !category.events.contains(event)
                    && !fresh.contains(&event)
                {
                    fresh.push(event);
                }
            }

            let mut updated = category.clone();
            updated.events.extend(fresh.into_iter().cloned());
            updated
        })
        .collect()
}

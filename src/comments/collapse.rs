use std::collections::HashSet;

use super::model::FlatComment;

/// Ids of comments the user collapsed. A display overlay only.
pub type CollapseSet = HashSet<String>;

/// Visible sequence for `flat` under `collapsed`.
///
/// Descendants of a collapsed comment are dropped; the collapsed comment
/// itself stays, flagged `is_collapsed`. One linear pass tracking the depth
/// at which the current collapse began.
pub fn apply_collapse(flat: &[FlatComment], collapsed: &CollapseSet) -> Vec<FlatComment> {
    project(flat, collapsed)
        .filter(|c| c.is_visible)
        .collect()
}

/// Like [`apply_collapse`], but hidden rows are kept with `is_visible = false`.
pub fn mark_visibility(flat: &[FlatComment], collapsed: &CollapseSet) -> Vec<FlatComment> {
    project(flat, collapsed).collect()
}

fn project<'a>(
    flat: &'a [FlatComment],
    collapsed: &'a CollapseSet,
) -> impl Iterator<Item = FlatComment> + 'a {
    let mut collapse_floor: Option<u32> = None;
    flat.iter().map(move |comment| {
        let mut out = comment.clone();
        out.is_collapsed = collapsed.contains(&comment.info.id);

        if collapse_floor.is_some_and(|floor| comment.depth > floor) {
            out.is_visible = false;
            return out;
        }

        collapse_floor = out.is_collapsed.then_some(comment.depth);
        out.is_visible = true;
        out
    })
}

/// Add `id` if absent, remove it if present.
pub fn toggle_collapse(collapsed: &CollapseSet, id: &str) -> CollapseSet {
    let mut next = collapsed.clone();
    if !next.remove(id) {
        next.insert(id.to_string());
    }
    next
}

/// `[1 reply]` / `[N replies]`
pub fn replies_label(child_count: usize) -> String {
    if child_count == 1 {
        "[1 reply]".to_string()
    } else {
        format!("[{} replies]", child_count)
    }
}

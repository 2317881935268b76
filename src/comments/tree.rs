use super::model::{Comment, FlatComment};

/// Pre-order walk of `tree` into display order.
///
/// Every node precedes its whole subtree and siblings keep source order.
/// Depth comes from the source when present, otherwise `parent + 1`.
/// Uses an explicit stack, so nesting depth is bounded only by memory.
pub fn flatten(tree: &[Comment]) -> Vec<FlatComment> {
    let mut flat = Vec::new();
    // Structural nesting level per emitted row; drives descendant counts even
    // when the source depths are inconsistent.
    let mut levels = Vec::new();

    let mut stack: Vec<(&Comment, u32, usize)> = tree
        .iter()
        .rev()
        .map(|node| (node, node.depth.unwrap_or(0), 0))
        .collect();

    while let Some((node, depth, level)) = stack.pop() {
        flat.push(FlatComment {
            info: node.info.clone(),
            depth,
            is_visible: true,
            has_children: !node.children.is_empty(),
            is_collapsed: false,
            child_count: 0,
        });
        levels.push(level);

        for child in node.children.iter().rev() {
            stack.push((child, child.depth.unwrap_or(depth + 1), level + 1));
        }
    }

    assign_child_counts(&mut flat, &levels);
    tracing::trace!(comment_count = flat.len(), "Flattened comment tree");
    flat
}

/// In pre-order a subtree is a contiguous run, so a node's descendant count
/// is the distance to the next row at the same level or shallower.
fn assign_child_counts(flat: &mut [FlatComment], levels: &[usize]) {
    let mut open: Vec<usize> = Vec::new();
    for (i, &level) in levels.iter().enumerate() {
        while let Some(&top) = open.last() {
            if levels[top] < level {
                break;
            }
            flat[top].child_count = i - top - 1;
            open.pop();
        }
        open.push(i);
    }

    let end = levels.len();
    for top in open {
        flat[top].child_count = end - top - 1;
    }
}

/// Re-nest a flat sequence by depth. Inverse of [`flatten`].
pub fn rebuild_tree(flat: &[FlatComment]) -> Vec<Comment> {
    let n = flat.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    for (i, node) in flat.iter().enumerate() {
        while let Some(&top) = open.last() {
            if flat[top].depth < node.depth {
                break;
            }
            open.pop();
        }
        match open.last() {
            Some(&parent) => children[parent].push(i),
            None => roots.push(i),
        }
        open.push(i);
    }

    // Children always sit after their parent, so build back to front.
    let mut built: Vec<Option<Comment>> = (0..n).map(|_| None).collect();
    for i in (0..n).rev() {
        let kids = std::mem::take(&mut children[i])
            .into_iter()
            .filter_map(|j| built[j].take())
            .collect();
        built[i] = Some(Comment {
            info: flat[i].info.clone(),
            depth: Some(flat[i].depth),
            children: kids,
        });
    }

    roots.into_iter().filter_map(|i| built[i].take()).collect()
}

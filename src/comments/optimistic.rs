use chrono::Utc;
use uuid::Uuid;

use super::error::CommentError;
use super::model::{CommentInfo, FlatComment, Vote};

impl FlatComment {
    /// Placeholder for a reply the local user just submitted.
    ///
    /// Gets a fresh UUID as its id; depth and parent are filled in by
    /// [`insert_optimistic`].
    pub fn optimistic(author: impl Into<String>, body: impl Into<String>, likes: Vote) -> Self {
        FlatComment {
            info: CommentInfo {
                id: Uuid::new_v4().to_string(),
                author: author.into(),
                body: body.into(),
                created_at: Utc::now(),
                score: 1,
                parent_id: None,
                is_submitter: false,
                is_moderator: false,
                flair: None,
                stickied: false,
                likes,
            },
            depth: 0,
            is_visible: true,
            has_children: false,
            is_collapsed: false,
            child_count: 0,
        }
    }
}

/// Insert a locally created reply into a flat sequence.
///
/// `parent_id: None` is a reply to the post and goes first at depth 0.
/// Otherwise the comment lands right after its parent, one level deeper,
/// and every ancestor's `child_count` grows by one. `parent_id` may be a bare
/// id or a `t1_` fullname.
pub fn insert_optimistic(
    flat: &[FlatComment],
    parent_id: Option<&str>,
    mut comment: FlatComment,
) -> Result<Vec<FlatComment>, CommentError> {
    while flat.iter().any(|c| c.info.id == comment.info.id) {
        comment.info.id = Uuid::new_v4().to_string();
    }
    comment.is_visible = true;
    comment.is_collapsed = false;
    comment.has_children = false;
    comment.child_count = 0;

    let Some(parent_id) = parent_id else {
        comment.depth = 0;
        let mut out = Vec::with_capacity(flat.len() + 1);
        out.push(comment);
        out.extend_from_slice(flat);
        return Ok(out);
    };

    let bare_id = parent_id.strip_prefix("t1_").unwrap_or(parent_id);
    let parent_index = flat
        .iter()
        .position(|c| c.info.id == bare_id)
        .ok_or_else(|| CommentError::ParentNotFound(parent_id.to_string()))?;

    let mut out = flat.to_vec();
    let parent = &mut out[parent_index];
    comment.depth = parent.depth + 1;
    comment.info.parent_id = Some(parent.info.fullname());
    parent.has_children = true;

    // Walk back over the ancestors: each earlier row shallower than the
    // last one seen.
    let mut depth = comment.depth;
    for row in out[..=parent_index].iter_mut().rev() {
        if row.depth < depth {
            row.child_count += 1;
            depth = row.depth;
            if depth == 0 {
                break;
            }
        }
    }

    out.insert(parent_index + 1, comment);
    Ok(out)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The local user's vote on a thing (`likes` on the wire).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    #[default]
    None,
    Down,
}

impl Vote {
    /// Value of the `dir` parameter on the vote endpoint.
    pub fn direction(self) -> i8 {
        match self {
            Vote::Up => 1,
            Vote::None => 0,
            Vote::Down => -1,
        }
    }
}

impl From<Option<bool>> for Vote {
    fn from(likes: Option<bool>) -> Self {
        match likes {
            Some(true) => Vote::Up,
            Some(false) => Vote::Down,
            None => Vote::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flair {
    pub text: String,
    pub background_color: Option<String>,
}

/// Scalar fields shared by the tree and flat forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    /// Fullname of the parent: `t1_…` for a reply, `t3_…` for a top-level comment.
    pub parent_id: Option<String>,
    pub is_submitter: bool,
    pub is_moderator: bool,
    pub flair: Option<Flair>,
    pub stickied: bool,
    pub likes: Vote,
}

impl CommentInfo {
    pub fn fullname(&self) -> String {
        format!("t1_{}", self.id)
    }
}

/// A comment with its direct replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub info: CommentInfo,
    /// Depth as reported by the source, if it reported one.
    pub depth: Option<u32>,
    pub children: Vec<Comment>,
}

impl Comment {
    pub fn new(info: CommentInfo) -> Self {
        Self {
            info,
            depth: None,
            children: Vec::new(),
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_children(mut self, children: Vec<Comment>) -> Self {
        self.children = children;
        self
    }

    /// Direct and indirect replies.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&Comment> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// One row of the flattened, display-ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatComment {
    pub info: CommentInfo,
    pub depth: u32,
    pub is_visible: bool,
    pub has_children: bool,
    pub is_collapsed: bool,
    /// Descendants, not just direct replies.
    pub child_count: usize,
}

impl FlatComment {
    pub fn id(&self) -> &str {
        &self.info.id
    }
}

/// A "load more" stub left in place of replies the listing did not include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreComments {
    pub parent_id: Option<String>,
    pub count: u64,
    pub children: Vec<String>,
    pub depth: Option<u32>,
}

/// The submission a comment thread hangs off.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub selftext: String,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub score: i64,
    pub num_comments: u64,
    pub created_at: DateTime<Utc>,
    pub over_18: bool,
    pub likes: Vote,
}

impl Post {
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }
}

/// Decoded comments page: the post, its comment tree, and any "more" stubs.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub post: Option<Post>,
    pub comments: Vec<Comment>,
    pub more: Vec<MoreComments>,
}

//! Comment thread processing: decode the nested listing, flatten it into
//! display order, and project collapse state and optimistic replies onto it.
//!
//! Everything here is pure and allocates a new sequence per call; inputs are
//! never mutated.

mod collapse;
mod error;
mod model;
mod optimistic;
mod tree;
pub mod wire;

pub use collapse::{apply_collapse, mark_visibility, replies_label, toggle_collapse, CollapseSet};
pub use error::CommentError;
pub use model::{Comment, CommentInfo, Flair, FlatComment, MoreComments, Post, Thread, Vote};
pub use optimistic::insert_optimistic;
pub use tree::{flatten, rebuild_tree};
pub use wire::decode_thread;

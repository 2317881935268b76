//! Comments page decoding through flatten, collapse and optimistic insert.

use redline::comments::{
    apply_collapse, decode_thread, flatten, insert_optimistic, mark_visibility, replies_label,
    toggle_collapse, CollapseSet, CommentError, FlatComment, Vote,
};

const PAGE: &str = r##"[
  {"kind": "Listing", "data": {"after": null, "children": [
    {"kind": "t3", "data": {
      "id": "abc123", "title": "Show and tell", "author": "op_user",
      "subreddit": "rust", "selftext": "What are you building?",
      "score": 42, "num_comments": 6, "created_utc": 1700000000.0,
      "over_18": false, "likes": true, "permalink": "/r/rust/comments/abc123/"
    }}
  ]}},
  {"kind": "Listing", "data": {"after": null, "children": [
    {"kind": "t1", "data": {
      "id": "A", "author": "op_user", "body": "first", "score": 10,
      "created_utc": 1700000100.0, "depth": 0, "parent_id": "t3_abc123",
      "is_submitter": true, "stickied": true, "distinguished": "moderator",
      "author_flair_text": "Rustacean", "author_flair_background_color": "#dea584",
      "likes": false,
      "replies": {"kind": "Listing", "data": {"children": [
        {"kind": "t1", "data": {
          "id": "B", "author": "bob", "body": "reply to A", "score": 3,
          "depth": 1, "parent_id": "t1_A", "replies": ""
        }},
        {"kind": "t1", "data": {
          "id": "C", "author": "carol", "body": "another reply", "score": 5,
          "depth": 1, "parent_id": "t1_A",
          "replies": {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {
              "id": "D", "author": null, "body": "[deleted]", "score": 1,
              "depth": 2, "parent_id": "t1_C", "replies": ""
            }},
            {"kind": "more", "data": {
              "count": 4, "children": ["E", "F"], "parent_id": "t1_C", "depth": 2
            }}
          ]}}
        }}
      ]}}
    }},
    {"kind": "t1", "data": {
      "id": "G", "author": "dave", "body": "top level two", "score": 1,
      "depth": 0, "parent_id": "t3_abc123", "replies": null
    }}
  ]}}
]"##;

fn ids(rows: &[FlatComment]) -> Vec<&str> {
    rows.iter().map(FlatComment::id).collect()
}

fn collapse_of(ids: &[&str]) -> CollapseSet {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn decodes_post_comments_and_more_stubs() {
    let thread = decode_thread(PAGE).unwrap();

    let post = thread.post.as_ref().unwrap();
    assert_eq!(post.fullname(), "t3_abc123");
    assert_eq!(post.title, "Show and tell");
    assert_eq!(post.likes, Vote::Up);

    assert_eq!(thread.comments.len(), 2);
    assert_eq!(thread.more.len(), 1);
    assert_eq!(thread.more[0].count, 4);
    assert_eq!(thread.more[0].parent_id.as_deref(), Some("t1_C"));
}

#[test]
fn decodes_author_badges() {
    let thread = decode_thread(PAGE).unwrap();
    let a = &thread.comments[0].info;

    assert!(a.is_submitter);
    assert!(a.is_moderator);
    assert!(a.stickied);
    assert_eq!(a.likes, Vote::Down);
    let flair = a.flair.as_ref().unwrap();
    assert_eq!(flair.text, "Rustacean");
    assert_eq!(flair.background_color.as_deref(), Some("#dea584"));

    let d = &thread.comments[0].children[1].children[0].info;
    assert_eq!(d.author, "[deleted]");
    assert_eq!(d.likes, Vote::None);
}

#[test]
fn flattens_in_display_order_with_descendant_counts() {
    let thread = decode_thread(PAGE).unwrap();
    let flat = flatten(&thread.comments);

    assert_eq!(ids(&flat), ["A", "B", "C", "D", "G"]);
    assert_eq!(
        flat.iter().map(|c| c.depth).collect::<Vec<_>>(),
        [0, 1, 1, 2, 0]
    );
    assert_eq!(
        flat.iter().map(|c| c.child_count).collect::<Vec<_>>(),
        [3, 0, 1, 0, 0]
    );
    assert!(flat.iter().all(|c| c.is_visible && !c.is_collapsed));
}

#[test]
fn collapsing_hides_only_the_subtree() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);

    let visible = apply_collapse(&flat, &collapse_of(&["C"]));
    assert_eq!(ids(&visible), ["A", "B", "C", "G"]);
    let c = visible.iter().find(|row| row.id() == "C").unwrap();
    assert!(c.is_collapsed);
    assert_eq!(replies_label(c.child_count), "[1 reply]");

    let visible = apply_collapse(&flat, &collapse_of(&["A"]));
    assert_eq!(ids(&visible), ["A", "G"]);
    assert_eq!(replies_label(visible[0].child_count), "[3 replies]");
}

#[test]
fn nested_collapse_inside_collapsed_parent() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let visible = apply_collapse(&flat, &collapse_of(&["A", "C"]));
    assert_eq!(ids(&visible), ["A", "G"]);

    // Expanding A reveals C, still collapsed.
    let collapsed = toggle_collapse(&collapse_of(&["A", "C"]), "A");
    let visible = apply_collapse(&flat, &collapsed);
    assert_eq!(ids(&visible), ["A", "B", "C", "G"]);
}

#[test]
fn mark_visibility_keeps_hidden_rows() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let marked = mark_visibility(&flat, &collapse_of(&["C"]));

    assert_eq!(marked.len(), flat.len());
    let hidden: Vec<&str> = marked
        .iter()
        .filter(|c| !c.is_visible)
        .map(FlatComment::id)
        .collect();
    assert_eq!(hidden, ["D"]);
}

#[test]
fn unknown_collapse_ids_are_ignored() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let visible = apply_collapse(&flat, &collapse_of(&["nope"]));
    assert_eq!(visible, flat);
}

#[test]
fn optimistic_reply_lands_under_its_parent() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let reply = FlatComment::optimistic("me", "nice", Vote::Up);
    let reply_id = reply.id().to_string();

    let updated = insert_optimistic(&flat, Some("t1_C"), reply).unwrap();
    assert_eq!(updated.len(), flat.len() + 1);
    assert_eq!(updated[3].id(), reply_id);
    assert_eq!(updated[3].depth, 2);
    assert_eq!(updated[3].info.parent_id.as_deref(), Some("t1_C"));
    assert_eq!(updated[3].info.likes, Vote::Up);

    let counts: Vec<usize> = updated.iter().map(|c| c.child_count).collect();
    assert_eq!(counts, [4, 0, 2, 0, 0, 0]);

    // The source sequence is untouched.
    assert_eq!(ids(&flat), ["A", "B", "C", "D", "G"]);
}

#[test]
fn optimistic_top_level_reply_goes_first() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let updated =
        insert_optimistic(&flat, None, FlatComment::optimistic("me", "hello", Vote::None)).unwrap();

    assert_eq!(updated[0].depth, 0);
    assert_eq!(updated[0].info.author, "me");
    assert_eq!(&updated[1..], &flat[..]);
}

#[test]
fn optimistic_reply_to_missing_parent_fails() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let reply = FlatComment::optimistic("me", "x", Vote::None);
    let err = insert_optimistic(&flat, Some("t1_zzz"), reply).unwrap_err();
    assert_eq!(err, CommentError::ParentNotFound("t1_zzz".to_string()));
}

#[test]
fn collapsed_parent_hides_optimistic_reply() {
    let flat = flatten(&decode_thread(PAGE).unwrap().comments);
    let reply = FlatComment::optimistic("me", "x", Vote::None);
    let updated = insert_optimistic(&flat, Some("B"), reply).unwrap();

    let visible = apply_collapse(&updated, &collapse_of(&["B"]));
    assert_eq!(ids(&visible), ["A", "B", "C", "D", "G"]);
    assert!(visible[1].has_children);
    assert_eq!(visible[1].child_count, 1);
}

#[test]
fn malformed_payload_is_an_error() {
    assert!(decode_thread("{}").is_err());
    assert!(decode_thread(r#"[{"kind": "Listing", "data": {"children": []}}]"#).is_err());
    assert!(decode_thread("not json").is_err());
}

#[test]
fn empty_thread_decodes() {
    let body = r#"[
        {"kind": "Listing", "data": {"children": []}},
        {"kind": "Listing", "data": {"children": []}}
    ]"#;
    let thread = decode_thread(body).unwrap();
    assert!(thread.post.is_none());
    assert!(thread.comments.is_empty());
    assert!(flatten(&thread.comments).is_empty());
}

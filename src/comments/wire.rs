//! JSON shapes of the comments endpoint and their conversion into the
//! comment model.
//!
//! The endpoint answers with a two-element array, `[post listing, comment
//! listing]`. Each comment's `replies` is either `""`, `null`, or another
//! listing.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::model::{Comment, CommentInfo, Flair, MoreComments, Post, Thread, Vote};

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListingData<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub children: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Thing {
    #[serde(rename = "t1")]
    Comment(Box<RawComment>),
    #[serde(rename = "t3")]
    Link(Box<RawPost>),
    #[serde(rename = "more")]
    More(RawMore),
}

/// The polymorphic `replies` field.
#[derive(Debug, Clone, Default)]
pub enum Replies {
    /// Field absent or `null`.
    #[default]
    Null,
    /// `""`, the endpoint's "no replies" marker.
    Empty,
    Listing(Box<Listing<Thing>>),
}

// Streams straight into the nested listing; an untagged enum would buffer
// the whole reply subtree first.
impl<'de> Deserialize<'de> for Replies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RepliesVisitor)
    }
}

struct RepliesVisitor;

impl<'de> Visitor<'de> for RepliesVisitor {
    type Value = Replies;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an empty string, null, or a listing")
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Replies, E> {
        Ok(Replies::Empty)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Replies, E> {
        Ok(Replies::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Replies, E> {
        Ok(Replies::Null)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Replies, A::Error> {
        let listing = Listing::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(Replies::Listing(Box::new(listing)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_submitter: bool,
    #[serde(default)]
    pub distinguished: Option<String>,
    #[serde(default)]
    pub author_flair_text: Option<String>,
    #[serde(default)]
    pub author_flair_background_color: Option<String>,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub likes: Option<bool>,
    #[serde(default)]
    pub replies: Replies,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub likes: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMore {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
}

/// `[post listing, comment listing]`
#[derive(Debug, Clone, Deserialize)]
pub struct CommentsPage(pub Listing<Thing>, pub Listing<Thing>);

/// Decode a comments page body into a [`Thread`].
pub fn decode_thread(body: &str) -> Result<Thread, serde_json::Error> {
    let page: CommentsPage = from_str_unbounded(body)?;
    Ok(page.into_thread())
}

/// `serde_json::from_str` without the 128-level nesting cap. Every comment
/// level costs several JSON levels, so deep threads would otherwise fail.
/// The stack grows on demand instead.
pub fn from_str_unbounded<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    let mut json = serde_json::Deserializer::from_str(body);
    json.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

impl CommentsPage {
    pub fn into_thread(self) -> Thread {
        let CommentsPage(posts, comments) = self;
        let post = posts.data.children.into_iter().find_map(|thing| match thing {
            Thing::Link(raw) => Some(Post::from(*raw)),
            _ => None,
        });

        let mut more = Vec::new();
        let comments = convert_children(comments.data.children, &mut more);
        Thread {
            post,
            comments,
            more,
        }
    }
}

/// A listing whose comments are still being converted.
struct Pending {
    things: std::vec::IntoIter<Thing>,
    converted: Vec<Comment>,
    /// The comment these are replies to; `None` for the top-level listing.
    owner: Option<(CommentInfo, Option<u32>)>,
}

impl Pending {
    fn new(things: Vec<Thing>, owner: Option<(CommentInfo, Option<u32>)>) -> Self {
        Self {
            things: things.into_iter(),
            converted: Vec::new(),
            owner,
        }
    }
}

/// Convert a listing into comment trees, collecting `more` stubs on the way.
/// Walks with an explicit stack of open listings.
fn convert_children(children: Vec<Thing>, more: &mut Vec<MoreComments>) -> Vec<Comment> {
    let mut stack = vec![Pending::new(children, None)];

    while let Some(top) = stack.last_mut() {
        match top.things.next() {
            Some(Thing::Comment(raw)) => {
                let (info, depth, replies) = split_comment(*raw);
                match replies {
                    Replies::Listing(listing) => {
                        stack.push(Pending::new(listing.data.children, Some((info, depth))));
                    }
                    Replies::Empty | Replies::Null => top.converted.push(Comment {
                        info,
                        depth,
                        children: Vec::new(),
                    }),
                }
            }
            Some(Thing::More(stub)) => more.push(MoreComments {
                parent_id: stub.parent_id,
                count: stub.count,
                children: stub.children,
                depth: stub.depth,
            }),
            Some(Thing::Link(_)) => {}
            None => {
                let Some(done) = stack.pop() else { break };
                let Some((info, depth)) = done.owner else {
                    return done.converted;
                };
                if let Some(parent) = stack.last_mut() {
                    parent.converted.push(Comment {
                        info,
                        depth,
                        children: done.converted,
                    });
                }
            }
        }
    }
    Vec::new()
}

fn split_comment(raw: RawComment) -> (CommentInfo, Option<u32>, Replies) {
    let flair = raw
        .author_flair_text
        .filter(|text| !text.is_empty())
        .map(|text| Flair {
            text,
            background_color: raw.author_flair_background_color.filter(|c| !c.is_empty()),
        });

    let info = CommentInfo {
        id: raw.id,
        author: raw.author.unwrap_or_else(|| "[deleted]".to_string()),
        body: raw.body.unwrap_or_default(),
        created_at: timestamp(raw.created_utc),
        score: raw.score,
        parent_id: raw.parent_id,
        is_submitter: raw.is_submitter,
        is_moderator: raw.distinguished.as_deref() == Some("moderator"),
        flair,
        stickied: raw.stickied,
        likes: Vote::from(raw.likes),
    };
    (info, raw.depth, raw.replies)
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        Post {
            id: raw.id,
            title: raw.title,
            author: raw.author.unwrap_or_else(|| "[deleted]".to_string()),
            subreddit: raw.subreddit,
            selftext: raw.selftext,
            url: raw.url,
            permalink: raw.permalink,
            score: raw.score,
            num_comments: raw.num_comments,
            created_at: timestamp(raw.created_utc),
            over_18: raw.over_18,
            likes: Vote::from(raw.likes),
        }
    }
}

fn timestamp(seconds: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds as i64, 0)
        .single()
        .unwrap_or_default()
}

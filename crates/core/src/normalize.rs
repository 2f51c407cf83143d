//! Maps loosely typed upstream records onto [`Comment`] and [`PostMeta`].
//!
//! Scrape datasets have shipped legacy flat keys, nested `owner` objects and
//! GraphQL-shaped `node` edges across releases, while the Graph API shape is
//! stable. Every field is therefore read through an ordered list of candidate
//! paths: the first candidate holding a non-empty value wins, otherwise the
//! field default applies (`None` for optional fields, `""` for text).

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::comments::{Comment, PostMeta};

/// Path into a record. Numeric segments index into arrays.
type FieldPath = &'static [&'static str];

const ID_PATHS: &[FieldPath] = &[&["id"], &["pk"], &["node", "id"]];
const USERNAME_PATHS: &[FieldPath] = &[
    &["ownerUsername"],
    &["username"],
    &["owner", "username"],
    &["from", "username"],
    &["node", "owner", "username"],
];
const TEXT_PATHS: &[FieldPath] = &[&["text"], &["node", "text"]];
const TIMESTAMP_PATHS: &[FieldPath] = &[
    &["timestamp"],
    &["takenAt"],
    &["createdAt"],
    &["created_at"],
    &["node", "created_at"],
];
const AVATAR_PATHS: &[FieldPath] = &[
    &["avatarUrl"],
    &["ownerProfilePicUrl"],
    &["owner", "profile_pic_url"],
    &["node", "owner", "profile_pic_url"],
];
const REPLY_PATHS: &[FieldPath] = &[&["replies"], &["replies", "data"]];

const CAPTION_PATHS: &[FieldPath] = &[
    &["postCaption"],
    &["caption"],
    &["edge_media_to_caption", "edges", "0", "node", "text"],
];
const IMAGE_PATHS: &[FieldPath] = &[
    &["imageUrl"],
    &["displayUrl"],
    &["display_url"],
    &["thumbnailUrl"],
    &["thumbnail_url"],
    &["mediaUrl"],
    &["media_url"],
];
const OWNER_USERNAME_PATHS: &[FieldPath] = &[&["ownerUsername"], &["owner", "username"]];
const OWNER_AVATAR_PATHS: &[FieldPath] = &[&["ownerProfilePicUrl"], &["owner", "profile_pic_url"]];
const CREATED_AT_PATHS: &[FieldPath] = &[&["timestamp"], &["takenAt"], &["createdAt"]];

const SYNTHETIC_ID_PREFIX: &str = "anon-";
const SYNTHETIC_ID_HEX_LEN: usize = 16;

/// Normalizes one record, using the current time when it carries no timestamp.
///
/// Returns `None` when neither an id nor a username can be resolved.
pub fn normalize_comment(record: &Value) -> Option<Comment> {
    normalize_comment_at(record, Utc::now())
}

pub fn normalize_comment_at(record: &Value, now: DateTime<Utc>) -> Option<Comment> {
    let username = first_text(record, USERNAME_PATHS).unwrap_or_default();
    let text = first_text(record, TEXT_PATHS).unwrap_or_default();
    let record_timestamp = first_timestamp(record, TIMESTAMP_PATHS);
    let id = match first_id(record) {
        Some(id) => id,
        None if username.is_empty() => return None,
        None => synthetic_id(
            &username,
            record_timestamp.as_deref().unwrap_or_default(),
            &text,
        ),
    };
    Some(Comment {
        id,
        username,
        text,
        timestamp: record_timestamp.unwrap_or_else(|| format_timestamp(now)),
        avatar_url: first_text(record, AVATAR_PATHS),
    })
}

/// Flattens top-level records and their nested replies into one sequence,
/// each reply placed directly after its parent.
pub fn normalize_thread<'a, I>(records: I) -> Vec<Comment>
where
    I: IntoIterator<Item = &'a Value>,
{
    normalize_thread_at(records, Utc::now())
}

pub fn normalize_thread_at<'a, I>(records: I, now: DateTime<Utc>) -> Vec<Comment>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut comments = Vec::new();
    for record in records {
        comments.extend(normalize_comment_at(record, now));
        for reply in reply_records(record) {
            comments.extend(normalize_comment_at(reply, now));
        }
    }
    disambiguate_synthetic_ids(&mut comments);
    comments
}

/// Identical anonymous records hash to the same synthetic id. Repeats keep
/// the first id and take the next free `-2`, `-3`, ... suffix, in order of
/// appearance. Upstream ids are left untouched.
pub fn disambiguate_synthetic_ids(comments: &mut [Comment]) {
    let mut used: HashSet<String> = comments
        .iter()
        .filter(|comment| !comment.id.starts_with(SYNTHETIC_ID_PREFIX))
        .map(|comment| comment.id.clone())
        .collect();
    for comment in comments
        .iter_mut()
        .filter(|comment| comment.id.starts_with(SYNTHETIC_ID_PREFIX))
    {
        if used.insert(comment.id.clone()) {
            continue;
        }
        let base = comment.id.clone();
        let mut ordinal = 2usize;
        loop {
            let candidate = format!("{base}-{ordinal}");
            if used.insert(candidate.clone()) {
                comment.id = candidate;
                break;
            }
            ordinal += 1;
        }
    }
}

/// Nested replies either as a bare array (scrape datasets) or wrapped in a
/// `data` envelope (Graph API).
pub fn reply_records(record: &Value) -> &[Value] {
    REPLY_PATHS
        .iter()
        .filter_map(|path| lookup(record, path))
        .find_map(|value| value.as_array().filter(|items| !items.is_empty()))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn normalize_meta(record: &Value) -> PostMeta {
    let owner_username = first_text(record, OWNER_USERNAME_PATHS);
    let owner_avatar_url = first_text(record, OWNER_AVATAR_PATHS).or_else(|| {
        owner_username
            .as_deref()
            .and_then(|owner| owner_avatar_from_comments(record, owner))
    });
    PostMeta {
        caption: first_text(record, CAPTION_PATHS),
        image_url: first_text(record, IMAGE_PATHS),
        owner_username,
        owner_avatar_url,
        created_at: first_timestamp(record, CREATED_AT_PATHS),
    }
}

/// Numbers are epoch seconds; non-empty strings pass through untouched.
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number.as_f64().and_then(epoch_seconds_to_iso),
        Value::String(raw) if !raw.trim().is_empty() => Some(raw.clone()),
        _ => None,
    }
}

pub fn epoch_seconds_to_iso(seconds: f64) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).map(format_timestamp)
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn owner_avatar_from_comments(record: &Value, owner: &str) -> Option<String> {
    record
        .get("latestComments")?
        .as_array()?
        .iter()
        .filter(|comment| first_text(comment, OWNER_USERNAME_PATHS).as_deref() == Some(owner))
        .find_map(|comment| first_text(comment, OWNER_AVATAR_PATHS))
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

fn first_text(record: &Value, paths: &[FieldPath]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(record, path))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
}

fn first_id(record: &Value) -> Option<String> {
    ID_PATHS
        .iter()
        .filter_map(|path| lookup(record, path))
        .find_map(|value| match value {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
}

fn first_timestamp(record: &Value, paths: &[FieldPath]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(record, path))
        .find_map(normalize_timestamp)
}

fn synthetic_id(username: &str, timestamp: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [username, timestamp, text] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{SYNTHETIC_ID_PREFIX}{}", &digest[..SYNTHETIC_ID_HEX_LEN])
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::candidates;
use crate::error::{Error, Result};
use crate::page_state::CanonicalItem;

/// Text of `map[key]`; numeric ids come through as their decimal form.
fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// A TikTok user as it appears inside a video item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct User {
    pub id: Option<String>,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub sec_uid: Option<String>,
}

impl User {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            id: text_field(map, "id"),
            username: text_field(map, "uniqueId"),
            nickname: text_field(map, "nickname"),
            sec_uid: text_field(map, "secUid"),
        }
    }
}

/// Who posted a video: older payloads only carry the username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    Username(String),
    Profile(User),
}

impl Author {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(Author::Username(name.clone())),
            Value::Object(map) => Some(Author::Profile(User::from_map(map))),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Author::Username(name) => Some(name),
            Author::Profile(user) => user.username.as_deref(),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.username().unwrap_or_default())
    }
}

/// The sound attached to a video, read from the item's `music` object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Sound {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub play_url: Option<String>,
}

impl Sound {
    fn from_item(item: &CanonicalItem) -> Option<Self> {
        let music = item.get("music")?.as_object()?;
        Some(Self {
            id: text_field(music, "id"),
            title: text_field(music, "title"),
            author_name: text_field(music, "authorName"),
            play_url: text_field(music, "playUrl"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Hashtag {
    pub id: Option<String>,
    pub title: Option<String>,
}

impl Hashtag {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                id: text_field(map, "id"),
                title: text_field(map, "title"),
            },
            other => Self {
                id: None,
                title: other.as_str().map(ToOwned::to_owned),
            },
        }
    }
}

/// `createTime` as posted. Values that are not epoch seconds are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateTime {
    At(DateTime<Utc>),
    Raw(Value),
}

impl CreateTime {
    fn from_value(value: &Value) -> Option<Self> {
        let seconds = match value {
            Value::Null => return None,
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|secs| secs.trunc() as i64)),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };

        Some(
            seconds
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(CreateTime::At)
                .unwrap_or_else(|| CreateTime::Raw(value.clone())),
        )
    }
}

/// `null`, `{}`, `[]`, `""`, `0` and `false` count as missing, so `statsV2: {}` yields to
/// `stats`.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// A TikTok video and the raw item it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub id: String,
    pub url: String,
    pub create_time: Option<CreateTime>,
    pub stats: Option<Value>,
    pub author: Option<Author>,
    pub sound: Option<Sound>,
    pub hashtags: Vec<Hashtag>,
    item: CanonicalItem,
}

impl Video {
    /// Build a video from its canonical item. The item must carry an `id`.
    pub fn from_item(item: CanonicalItem) -> Result<Self> {
        let id = match item.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                let keys: Vec<&str> = item.keys().map(String::as_str).collect();
                return Err(Error::Construction(format!(
                    "item has no id (keys: {})",
                    keys.join(", ")
                )));
            }
        };

        let create_time = item.get("createTime").and_then(CreateTime::from_value);
        let stats = ["statsV2", "stats"]
            .iter()
            .filter_map(|key| item.get(*key))
            .find(|stats| !is_empty_value(stats))
            .cloned();
        let author = item.get("author").and_then(Author::from_value);
        let sound = Sound::from_item(&item);
        let hashtags = item
            .get("challenges")
            .and_then(Value::as_array)
            .map(|challenges| challenges.iter().map(Hashtag::from_value).collect())
            .unwrap_or_default();
        let url = video_url(author.as_ref().and_then(Author::username), &id);

        Ok(Self {
            id,
            url,
            create_time,
            stats,
            author,
            sound,
            hashtags,
            item,
        })
    }

    /// The item exactly as it was scraped.
    pub fn as_value(&self) -> &CanonicalItem {
        &self.item
    }

    /// Media URLs found anywhere in the item, in document order.
    pub fn download_candidates(&self) -> Vec<String> {
        candidates::collect_from_object(&self.item)
    }
}

impl fmt::Display for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Video(id='{}')", self.id)
    }
}

/// `https://www.tiktok.com/@{author}/video/{id}`; an unknown author leaves the handle
/// empty, which TikTok redirects to the right profile.
pub fn video_url(author: Option<&str>, id: &str) -> String {
    format!(
        "https://www.tiktok.com/@{}/video/{id}",
        author.unwrap_or_default()
    )
}

/// What a caller handed us to identify a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoRef {
    /// A bare numeric id.
    Id(String),
    /// A URL with the id in its path.
    Canonical { id: String, url: Url },
    /// A URL we must follow (e.g. `vm.tiktok.com` short links) to learn the id.
    Unresolved(Url),
}

impl VideoRef {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(VideoRef::Id(input.to_string()));
        }

        let url = Url::parse(input).map_err(|_| Error::InvalidUrl(input.to_string()))?;
        let is_tiktok = url
            .host_str()
            .is_some_and(|host| host == "tiktok.com" || host.ends_with(".tiktok.com"));
        if !is_tiktok {
            return Err(Error::InvalidUrl(input.to_string()));
        }

        Ok(match id_from_url(&url) {
            Some(id) => VideoRef::Canonical { id, url },
            None => VideoRef::Unresolved(url),
        })
    }
}

/// The numeric id following a `video` or `photo` path segment.
pub fn id_from_url(url: &Url) -> Option<String> {
    let segments: Vec<_> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    segments.windows(2).find_map(|window| match window {
        [prefix, id]
            if matches!(*prefix, "video" | "photo")
                && !id.is_empty()
                && id.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some((*id).to_string())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> CanonicalItem {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn derives_fields_from_item() {
        let video = Video::from_item(item(json!({
            "id": "7106686413101468970",
            "createTime": "1654706400",
            "stats": { "playCount": 1 },
            "statsV2": { "playCount": "2" },
            "author": { "id": "1", "uniqueId": "davidteathercodes", "nickname": "David" },
            "music": { "id": "55", "title": "original sound" },
            "challenges": [ { "id": "9", "title": "rust" }, { "id": "10", "title": "code" } ]
        })))
        .unwrap();

        assert_eq!(video.id, "7106686413101468970");
        assert_eq!(
            video.create_time,
            Some(CreateTime::At(DateTime::from_timestamp(1_654_706_400, 0).unwrap()))
        );
        assert_eq!(video.stats, Some(json!({ "playCount": "2" })));
        assert_eq!(
            video.author.as_ref().and_then(Author::username),
            Some("davidteathercodes")
        );
        assert_eq!(video.sound.as_ref().unwrap().title.as_deref(), Some("original sound"));
        let titles: Vec<_> = video.hashtags.iter().filter_map(|h| h.title.as_deref()).collect();
        assert_eq!(titles, vec!["rust", "code"]);
        assert_eq!(
            video.url,
            "https://www.tiktok.com/@davidteathercodes/video/7106686413101468970"
        );
    }

    #[test]
    fn missing_id_is_construction_error() {
        let err = Video::from_item(item(json!({ "desc": "no id" }))).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn author_may_be_plain_username() {
        let video = Video::from_item(item(json!({ "id": "1", "author": "someone" }))).unwrap();
        assert_eq!(video.author, Some(Author::Username("someone".into())));
        assert_eq!(video.url, "https://www.tiktok.com/@someone/video/1");
    }

    #[test]
    fn uncoercible_create_time_is_kept_raw() {
        let video =
            Video::from_item(item(json!({ "id": "1", "createTime": "yesterday" }))).unwrap();
        assert_eq!(video.create_time, Some(CreateTime::Raw(json!("yesterday"))));

        let video = Video::from_item(item(json!({ "id": "1" }))).unwrap();
        assert_eq!(video.create_time, None);
    }

    #[test]
    fn float_create_time_is_truncated() {
        let video =
            Video::from_item(item(json!({ "id": "1", "createTime": 1_700_000_000.75 }))).unwrap();
        assert_eq!(
            video.create_time,
            Some(CreateTime::At(DateTime::from_timestamp(1_700_000_000, 0).unwrap()))
        );
    }

    #[test]
    fn stats_fall_back_to_v1() {
        let video =
            Video::from_item(item(json!({ "id": "1", "stats": { "diggCount": 3 } }))).unwrap();
        assert_eq!(video.stats, Some(json!({ "diggCount": 3 })));
        assert!(video.hashtags.is_empty());
    }

    #[test]
    fn empty_stats_v2_yields_to_stats() {
        let video = Video::from_item(item(json!({
            "id": "1",
            "statsV2": {},
            "stats": { "playCount": 9 }
        })))
        .unwrap();
        assert_eq!(video.stats, Some(json!({ "playCount": 9 })));
    }

    #[test]
    fn author_with_numeric_fields_keeps_profile() {
        let video = Video::from_item(item(json!({
            "id": "5",
            "author": { "id": 12345, "uniqueId": "alice", "nickname": null },
            "music": { "id": 6600, "title": "original sound" },
            "challenges": [ { "id": 42, "title": "rust" } ]
        })))
        .unwrap();

        let Some(Author::Profile(user)) = &video.author else {
            panic!("expected a profile author, got {:?}", video.author);
        };
        assert_eq!(user.id.as_deref(), Some("12345"));
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.nickname, None);
        assert_eq!(video.url, "https://www.tiktok.com/@alice/video/5");
        assert_eq!(video.sound.as_ref().unwrap().id.as_deref(), Some("6600"));
        assert_eq!(video.hashtags[0].id.as_deref(), Some("42"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = item(json!({
            "id": "1",
            "createTime": 1_700_000_000,
            "author": { "uniqueId": "a" },
            "challenges": [ { "title": "x" } ]
        }));
        let first = Video::from_item(raw.clone()).unwrap();
        let second = Video::from_item(first.as_value().clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_value(), &raw);
    }

    #[test]
    fn candidates_come_from_raw_item() {
        let video = Video::from_item(item(json!({
            "id": "1",
            "video": { "downloadAddr": "https://v.example/a", "playAddr": "https://v.example/p" }
        })))
        .unwrap();
        assert_eq!(video.download_candidates(), vec!["https://v.example/a"]);
    }

    #[test]
    fn parses_video_refs() {
        assert_eq!(VideoRef::parse(" 123 ").unwrap(), VideoRef::Id("123".into()));

        match VideoRef::parse("https://www.tiktok.com/@user/video/987654321?lang=en").unwrap() {
            VideoRef::Canonical { id, .. } => assert_eq!(id, "987654321"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            VideoRef::parse("https://vm.tiktok.com/ZT8abcd/").unwrap(),
            VideoRef::Unresolved(_)
        ));
        assert!(matches!(
            VideoRef::parse("https://example.com/video/1"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(VideoRef::parse("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn id_from_photo_url() {
        let url = Url::parse("https://www.tiktok.com/@user/photo/42").unwrap();
        assert_eq!(id_from_url(&url), Some("42".into()));
    }
}

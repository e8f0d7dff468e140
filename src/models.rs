//! Decoded shape of an archived export.
//!
//! Only the fields the image extraction reads are modelled; everything else in
//! the export is ignored by serde. Missing or `null` fields decode to their
//! empty defaults so a sparse tweet never fails the whole document.

use serde::{Deserialize, Deserializer, Serialize};

/// Media type tag excluded from image extraction.
pub const VIDEO_MEDIA_TYPE: &str = "video";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Export {
    #[serde(default, deserialize_with = "nullable")]
    pub timeline: Vec<Tweet>,
    #[serde(default, deserialize_with = "nullable")]
    pub favorites: Vec<Tweet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default, deserialize_with = "nullable")]
    pub user: User,
    #[serde(default, rename = "extended_entities", deserialize_with = "nullable")]
    pub entities: Entity,
    #[serde(default, rename = "retweeted_status", skip_serializing_if = "Option::is_none")]
    pub retweeted: Option<Retweet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retweet {
    #[serde(default, deserialize_with = "nullable")]
    pub id: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub user: User,
    #[serde(default, rename = "extended_entities", deserialize_with = "nullable")]
    pub entities: Entity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, rename = "profile_image_url_https", deserialize_with = "nullable")]
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default, deserialize_with = "nullable")]
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default, rename = "media_url_https", deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, rename = "type", deserialize_with = "nullable")]
    pub media_type: String,
}

/// Where a tweet's images come from: the tweet itself or the status it retweets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageSource<'a> {
    Own { user: &'a User, entities: &'a Entity },
    Retweet(&'a Retweet),
}

impl<'a> ImageSource<'a> {
    pub fn user(&self) -> &'a User {
        match self {
            ImageSource::Own { user, .. } => user,
            ImageSource::Retweet(rt) => &rt.user,
        }
    }

    pub fn entities(&self) -> &'a Entity {
        match self {
            ImageSource::Own { entities, .. } => entities,
            ImageSource::Retweet(rt) => &rt.entities,
        }
    }
}

impl Export {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn tweet_count(&self) -> usize {
        self.timeline.len() + self.favorites.len()
    }
}

impl Tweet {
    /// The embedded retweet, if one is really there.
    ///
    /// A `retweeted_status` whose id is 0 is treated as absent: exports write a
    /// zeroed object in place of a missing retweet and nothing distinguishes it
    /// from a genuine id of 0.
    pub fn retweet(&self) -> Option<&Retweet> {
        self.retweeted.as_ref().filter(|rt| rt.id != 0)
    }

    pub fn image_source(&self) -> ImageSource<'_> {
        match self.retweet() {
            Some(rt) => ImageSource::Retweet(rt),
            None => ImageSource::Own {
                user: &self.user,
                entities: &self.entities,
            },
        }
    }
}

impl Media {
    pub fn is_video(&self) -> bool {
        self.media_type == VIDEO_MEDIA_TYPE
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_tweet() {
        let json = r#"{
            "timeline": [{
                "id": 12,
                "text": "hello",
                "user": {"profile_image_url_https": "https://pbs.twimg.com/p1.jpg", "name": "a"},
                "extended_entities": {"media": [
                    {"media_url_https": "https://pbs.twimg.com/m1.jpg", "type": "photo"},
                    {"media_url_https": "https://pbs.twimg.com/m2.jpg", "type": "video"}
                ]}
            }],
            "favorites": []
        }"#;

        let export = Export::from_slice(json.as_bytes()).unwrap();
        assert_eq!(export.tweet_count(), 1);

        let tweet = &export.timeline[0];
        assert_eq!(tweet.user.profile_image_url, "https://pbs.twimg.com/p1.jpg");
        assert_eq!(tweet.entities.media.len(), 2);
        assert!(tweet.entities.media[1].is_video());
        assert!(tweet.retweet().is_none());
    }

    #[test]
    fn test_missing_and_null_fields_degrade_to_defaults() {
        let json = r#"{
            "timeline": [{}, {"user": null, "extended_entities": {"media": null}}],
            "favorites": null
        }"#;

        let export = Export::from_slice(json.as_bytes()).unwrap();
        assert_eq!(export.timeline.len(), 2);
        assert!(export.favorites.is_empty());
        assert_eq!(export.timeline[1].user.profile_image_url, "");
        assert!(export.timeline[1].entities.media.is_empty());
    }

    #[test]
    fn test_zero_retweet_id_counts_as_absent() {
        let json = r#"{"retweeted_status": {"id": 0, "user": {"profile_image_url_https": "rt"}}}"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();

        assert!(tweet.retweeted.is_some());
        assert!(tweet.retweet().is_none());
        assert!(matches!(tweet.image_source(), ImageSource::Own { .. }));
    }

    #[test]
    fn test_nonzero_retweet_supersedes_own_fields() {
        let json = r#"{
            "user": {"profile_image_url_https": "own"},
            "retweeted_status": {"id": 5, "user": {"profile_image_url_https": "rt"}}
        }"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();

        let source = tweet.image_source();
        assert_eq!(source.user().profile_image_url, "rt");
        assert!(source.entities().media.is_empty());
    }

    #[test]
    fn test_malformed_export_is_an_error() {
        assert!(Export::from_slice(b"{\"timeline\": 3}").is_err());
        assert!(Export::from_slice(b"not json").is_err());
    }
}

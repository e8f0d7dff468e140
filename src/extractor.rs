use crate::models::{Export, Tweet};

/// Collect candidate image URLs from tweets, in tweet order.
///
/// Each tweet contributes its source's profile image followed by every
/// non-video media URL. The source is the retweet when one is present and the
/// tweet itself otherwise, never both. URLs are passed through untouched,
/// empty strings included.
pub fn extract_image_urls(tweets: &[Tweet]) -> Vec<String> {
    let mut images = Vec::new();

    for tweet in tweets {
        let source = tweet.image_source();
        images.push(source.user().profile_image_url.clone());
        images.extend(
            source
                .entities()
                .media
                .iter()
                .filter(|media| !media.is_video())
                .map(|media| media.url.clone()),
        );
    }

    images
}

impl Export {
    /// Timeline URLs followed by favorites URLs, duplicates kept.
    pub fn image_urls(&self) -> Vec<String> {
        let mut urls = extract_image_urls(&self.timeline);
        urls.extend(extract_image_urls(&self.favorites));
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Media, Retweet, User};

    fn media(url: &str, media_type: &str) -> Media {
        Media {
            url: url.to_string(),
            media_type: media_type.to_string(),
        }
    }

    fn tweet(profile: &str, media: Vec<Media>) -> Tweet {
        Tweet {
            user: User {
                profile_image_url: profile.to_string(),
            },
            entities: Entity { media },
            retweeted: None,
        }
    }

    fn retweet_of(outer: Tweet, id: u64, profile: &str, media: Vec<Media>) -> Tweet {
        Tweet {
            retweeted: Some(Retweet {
                id,
                user: User {
                    profile_image_url: profile.to_string(),
                },
                entities: Entity { media },
            }),
            ..outer
        }
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(extract_image_urls(&[]).is_empty());
        assert!(Export::default().image_urls().is_empty());
    }

    #[test]
    fn test_own_fields_profile_then_media() {
        let tweets = vec![tweet(
            "p1",
            vec![media("m1", "photo"), media("m2", "video"), media("m3", "animated_gif")],
        )];

        assert_eq!(extract_image_urls(&tweets), vec!["p1", "m1", "m3"]);
    }

    #[test]
    fn test_retweet_fields_replace_outer_fields() {
        let outer = tweet("outer", vec![media("outer-media", "photo")]);
        let tweets = vec![retweet_of(outer, 5, "p2", vec![media("m3", "photo")])];

        let urls = extract_image_urls(&tweets);
        assert_eq!(urls, vec!["p2", "m3"]);
        assert!(!urls.contains(&"outer".to_string()));
        assert!(!urls.contains(&"outer-media".to_string()));
    }

    #[test]
    fn test_zero_id_retweet_falls_back_to_own_fields() {
        let outer = tweet("own", vec![media("own-media", "photo")]);
        let tweets = vec![retweet_of(outer, 0, "rt", vec![media("rt-media", "photo")])];

        assert_eq!(extract_image_urls(&tweets), vec!["own", "own-media"]);
    }

    #[test]
    fn test_videos_never_extracted_from_retweets() {
        let outer = tweet("own", vec![]);
        let tweets = vec![retweet_of(
            outer,
            9,
            "rt",
            vec![media("v1", "video"), media("i1", "photo"), media("v2", "video")],
        )];

        assert_eq!(extract_image_urls(&tweets), vec!["rt", "i1"]);
    }

    #[test]
    fn test_empty_profile_urls_pass_through() {
        let tweets = vec![tweet("", vec![]), tweet("", vec![])];
        assert_eq!(extract_image_urls(&tweets), vec!["", ""]);
    }

    #[test]
    fn test_export_concatenates_timeline_then_favorites() {
        let export = Export {
            timeline: vec![tweet("p1", vec![media("m1", "photo"), media("m2", "video")])],
            favorites: vec![retweet_of(
                tweet("ignored", vec![]),
                5,
                "p2",
                vec![media("m3", "photo")],
            )],
        };

        assert_eq!(export.image_urls(), vec!["p1", "m1", "p2", "m3"]);
    }
}

//! Meeting identifier generation.
//!
//! Every function here draws from the operating system CSPRNG. A failing
//! random source panics.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

pub const LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

pub const TOPIC_SUFFIX_LEN: usize = 20;
pub const PERSONAL_SUFFIX_LEN: usize = 20;
pub const TEAM_CHANNEL_SUFFIX_LEN: usize = 10;

const ADJECTIVES: &[&str] = &[
    "able", "agile", "amber", "ample", "azure", "bold", "brave", "breezy", "bright", "brisk",
    "calm", "candid", "cheery", "clever", "cosmic", "crisp", "curious", "daring", "dapper",
    "eager", "earnest", "fancy", "fearless", "fluffy", "frank", "gentle", "giddy", "glad",
    "golden", "grand", "happy", "hardy", "hearty", "humble", "jolly", "jovial", "keen", "kind",
    "lively", "lucky", "mellow", "merry", "mighty", "nimble", "noble", "plucky", "polite",
    "proud", "quick", "quiet", "rapid", "ready", "rosy", "rustic", "shiny", "snappy", "sunny",
    "swift", "tidy", "upbeat", "vivid", "warm", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "bison", "brook", "canyon", "cat", "cedar", "comet", "coral", "crane",
    "dolphin", "dune", "eagle", "ember", "falcon", "fern", "finch", "fjord", "fox", "galaxy",
    "garden", "gecko", "glacier", "harbor", "hawk", "heron", "island", "jaguar", "koala",
    "lagoon", "lantern", "lemur", "lynx", "maple", "meadow", "meteor", "moose", "nebula",
    "oasis", "otter", "owl", "panda", "pebble", "pine", "planet", "prairie", "puffin", "quartz",
    "raven", "reef", "river", "robin", "sparrow", "spruce", "summit", "tiger", "tulip", "valley",
    "walrus", "willow", "wombat", "yak", "zebra", "zephyr",
];

/// Returns `n` lowercase ASCII letters drawn uniformly from `a..=z`.
pub fn random_alpha_string(n: usize) -> String {
    let mut rng = OsRng;
    (0..n).map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char).collect()
}

/// Turns a free-form topic into an identifier seed: spaces become `-`, and
/// anything outside `[A-Za-z0-9-_]` is dropped. The result may be empty.
pub fn sanitize_topic_as_id(topic: &str) -> String {
    topic
        .replace(' ', "-")
        .chars()
        .filter(|ch| is_id_char(*ch))
        .collect()
}

/// Identifier for an explicit topic: the sanitized topic, a dash when the
/// topic survived sanitizing, then a random suffix.
pub fn topic_meeting_name(topic: &str) -> String {
    let mut name = sanitize_topic_as_id(topic);
    if !name.is_empty() {
        name.push('-');
    }
    name.push_str(&random_alpha_string(TOPIC_SUFFIX_LEN));
    name
}

/// A memorable `adjective-adjective-noun` name, e.g. `brave-sunny-otter`.
pub fn words_name() -> String {
    let mut rng = OsRng;
    let mut adjectives = ADJECTIVES.choose_multiple(&mut rng, 2);
    let first = adjectives.next().copied().unwrap_or("brave");
    let second = adjectives.next().copied().unwrap_or("sunny");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    format!("{first}-{second}-{noun}")
}

/// Whether a caller-supplied identifier can be placed in a join URL as-is.
/// Accepts exactly the alphabet the generators produce: `[A-Za-z0-9-_]`.
pub fn is_valid_meeting_id(meeting_id: &str) -> bool {
    !meeting_id.is_empty() && meeting_id.chars().all(is_id_char)
}

fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

pub fn uuid_name() -> String {
    Uuid::new_v4().to_string()
}

/// Usernames may contain `.`, which is dropped so the identifier stays in the
/// generator alphabet.
pub fn personal_name(username: &str) -> String {
    let username: String = username.chars().filter(|ch| is_id_char(*ch)).collect();
    format!("{username}-{}", random_alpha_string(PERSONAL_SUFFIX_LEN))
}

pub fn team_channel_name(team_name: &str, channel_name: &str) -> String {
    let mut name = String::new();
    if !team_name.is_empty() {
        name.push_str(team_name);
        name.push('-');
    }
    name.push_str(channel_name);
    name.push('-');
    name.push_str(&random_alpha_string(TEAM_CHANNEL_SUFFIX_LEN));
    name
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid_meeting_id, personal_name, random_alpha_string, sanitize_topic_as_id,
        team_channel_name, topic_meeting_name, uuid_name, words_name,
    };

    fn is_lower_alpha(value: &str) -> bool {
        value.chars().all(|ch| ch.is_ascii_lowercase())
    }

    #[test]
    fn random_alpha_string_has_requested_length_and_alphabet() {
        for n in [0, 1, 10, 20, 64] {
            let value = random_alpha_string(n);
            assert_eq!(value.len(), n);
            assert!(is_lower_alpha(&value), "unexpected characters in {value}");
        }
    }

    #[test]
    fn random_alpha_string_is_not_memoized() {
        assert_ne!(random_alpha_string(20), random_alpha_string(20));
    }

    #[test]
    fn sanitize_replaces_spaces_and_strips_punctuation() {
        assert_eq!(sanitize_topic_as_id("Sprint Planning!!"), "Sprint-Planning");
        assert_eq!(sanitize_topic_as_id("a_b-c d"), "a_b-c-d");
        assert_eq!(sanitize_topic_as_id("日本語 ✨"), "-");
        assert_eq!(sanitize_topic_as_id("?!"), "");
    }

    #[test]
    fn sanitize_output_only_contains_url_safe_characters() {
        let topics = [
            "Weekly sync (Q3) @ 10:00",
            "  leading and trailing  ",
            "tabs\tand\nnewlines",
            "emoji 🎉 party",
            "slashes/and\\backslashes",
            "",
        ];
        for topic in topics {
            let sanitized = sanitize_topic_as_id(topic);
            assert!(!sanitized.contains(' '));
            assert!(
                sanitized.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'),
                "`{sanitized}` contains characters outside [A-Za-z0-9-_]"
            );
        }
    }

    #[test]
    fn topic_meeting_name_keeps_topic_prefix() {
        let name = topic_meeting_name("Sprint Planning!!");
        let suffix = name.strip_prefix("Sprint-Planning-").expect("topic prefix");
        assert_eq!(suffix.len(), 20);
        assert!(is_lower_alpha(suffix));
    }

    #[test]
    fn topic_meeting_name_without_usable_topic_is_only_suffix() {
        let name = topic_meeting_name("!!!");
        assert_eq!(name.len(), 20);
        assert!(is_lower_alpha(&name));
    }

    #[test]
    fn personal_name_matches_username_pattern() {
        let name = personal_name("jdoe");
        let suffix = name.strip_prefix("jdoe-").expect("username prefix");
        assert_eq!(suffix.len(), 20);
        assert!(is_lower_alpha(suffix));
        assert_ne!(personal_name("jdoe"), personal_name("jdoe"));
    }

    #[test]
    fn team_channel_name_includes_team_when_present() {
        let name = team_channel_name("core", "town-square");
        let suffix = name.strip_prefix("core-town-square-").expect("team/channel prefix");
        assert_eq!(suffix.len(), 10);
        assert!(is_lower_alpha(suffix));
    }

    #[test]
    fn team_channel_name_omits_empty_team() {
        let name = team_channel_name("", "town-square");
        let suffix = name.strip_prefix("town-square-").expect("channel prefix");
        assert_eq!(suffix.len(), 10);
        assert!(is_lower_alpha(suffix));
    }

    #[test]
    fn words_name_has_three_segments() {
        let name = words_name();
        let segments: Vec<&str> = name.split('-').collect();
        assert_eq!(segments.len(), 3, "unexpected words name {name}");
        assert!(segments.iter().all(|segment| !segment.is_empty() && is_lower_alpha(segment)));
        assert_ne!(segments[0], segments[1]);
    }

    #[test]
    fn generated_names_are_valid_meeting_ids() {
        assert!(is_valid_meeting_id(&words_name()));
        assert!(is_valid_meeting_id(&uuid_name()));
        assert!(is_valid_meeting_id(&personal_name("jdoe")));
        assert!(is_valid_meeting_id(&topic_meeting_name("日本語")));
        assert!(is_valid_meeting_id(&team_channel_name("core", "town-square")));
    }

    #[test]
    fn personal_name_drops_characters_outside_id_alphabet() {
        let name = personal_name("j.doe");
        let suffix = name.strip_prefix("jdoe-").expect("dotless username prefix");
        assert_eq!(suffix.len(), 20);
        assert!(is_valid_meeting_id(&name));
    }

    #[test]
    fn words_name_draws_from_both_word_lists() {
        let names: std::collections::HashSet<String> = (0..50).map(|_| words_name()).collect();
        assert!(names.len() > 1, "words names should vary between calls");
    }

    #[test]
    fn meeting_ids_with_markup_are_rejected() {
        assert!(!is_valid_meeting_id(""));
        assert!(!is_valid_meeting_id("abc)[evil](https://example.com"));
        assert!(!is_valid_meeting_id("a b"));
        assert!(!is_valid_meeting_id("../admin"));
        assert!(!is_valid_meeting_id("j.doe-abc"));
    }

    #[test]
    fn uuid_name_is_hyphenated_v4() {
        let name = uuid_name();
        assert_eq!(name.len(), 36);
        let parsed = uuid::Uuid::parse_str(&name).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(uuid_name(), name);
    }
}

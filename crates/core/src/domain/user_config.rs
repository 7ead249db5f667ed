use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const USER_CONFIG_KEY_PREFIX: &str = "config_";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    Ask,
    Words,
    Uuid,
    Mattermost,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown naming scheme `{0}` (expected ask|words|uuid|mattermost)")]
pub struct UnknownNamingScheme(pub String);

impl NamingScheme {
    pub const ALL: [NamingScheme; 4] = [Self::Ask, Self::Words, Self::Uuid, Self::Mattermost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Words => "words",
            Self::Uuid => "uuid",
            Self::Mattermost => "mattermost",
        }
    }

    /// Stored preferences are never rejected: anything unrecognized means
    /// random words.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Words)
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingScheme {
    type Err = UnknownNamingScheme;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "words" => Ok(Self::Words),
            "uuid" => Ok(Self::Uuid),
            "mattermost" => Ok(Self::Mattermost),
            other => Err(UnknownNamingScheme(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserConfig {
    pub naming_scheme: NamingScheme,
}

#[derive(Debug, Default, Deserialize)]
struct StoredUserConfig {
    #[serde(default)]
    naming_scheme: String,
}

impl UserConfig {
    pub fn new(naming_scheme: NamingScheme) -> Self {
        Self { naming_scheme }
    }

    pub fn storage_key(user_id: &str) -> String {
        format!("{USER_CONFIG_KEY_PREFIX}{user_id}")
    }

    /// Decodes a stored record. A missing or blank `naming_scheme` resolves to
    /// `default_scheme`; an unrecognized one resolves to words.
    pub fn decode(raw: &[u8], default_scheme: NamingScheme) -> Result<Self, serde_json::Error> {
        let stored: StoredUserConfig = serde_json::from_slice(raw)?;
        let naming_scheme = if stored.naming_scheme.trim().is_empty() {
            default_scheme
        } else {
            NamingScheme::parse_lenient(&stored.naming_scheme)
        };
        Ok(Self { naming_scheme })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{NamingScheme, UserConfig};

    #[test]
    fn encodes_single_naming_scheme_field() {
        let encoded = UserConfig::new(NamingScheme::Mattermost).encode().expect("encode");
        assert_eq!(String::from_utf8(encoded).expect("utf8"), r#"{"naming_scheme":"mattermost"}"#);
    }

    #[test]
    fn decode_falls_back_to_words_for_unknown_scheme() {
        let config =
            UserConfig::decode(br#"{"naming_scheme":"zoom"}"#, NamingScheme::Uuid).expect("decode");
        assert_eq!(config.naming_scheme, NamingScheme::Words);
    }

    #[test]
    fn decode_uses_default_when_scheme_missing() {
        let config = UserConfig::decode(br#"{}"#, NamingScheme::Ask).expect("decode");
        assert_eq!(config.naming_scheme, NamingScheme::Ask);

        let blank =
            UserConfig::decode(br#"{"naming_scheme":""}"#, NamingScheme::Uuid).expect("decode");
        assert_eq!(blank.naming_scheme, NamingScheme::Uuid);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(UserConfig::decode(b"not json", NamingScheme::Words).is_err());
    }

    #[test]
    fn strict_parse_rejects_unknown_values() {
        assert_eq!("Mattermost".parse::<NamingScheme>(), Ok(NamingScheme::Mattermost));
        assert!("jitsi".parse::<NamingScheme>().is_err());
        assert_eq!(NamingScheme::parse_lenient("jitsi"), NamingScheme::Words);
    }

    #[test]
    fn storage_key_is_prefixed_user_id() {
        assert_eq!(UserConfig::storage_key("u1"), "config_u1");
    }
}

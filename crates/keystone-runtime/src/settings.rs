//! Settings of the `bot` section.
//!
//! | Key | Default | Meaning |
//! |-----|---------|---------|
//! | `token` | required | authentication token |
//! | `rest.timeout_seconds` | `120` | REST request timeout |
//! | `rest.buffer_size` | `256` | outgoing REST request buffer |
//! | `message_cache_max_size` | `2048` | values below 1 mean unbounded |
//! | `status` | `online` | `online`, `idle`, `dnd`, `invisible` |
//! | `activity` | none | see [`parse_activity`] |
//! | `debug_log_channel_id` | none | channel receiving diagnostic messages |

use std::time::Duration;

use keystone_core::{
    Activity, BootstrapResult, ClientSettings, ConfigSection, Presence, Snowflake, Status,
};
use tracing::warn;

/// Name of the section these settings are read from.
pub const BOT_SECTION: &str = "bot";

const DEFAULT_REST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REST_BUFFER_SIZE: usize = 256;
const DEFAULT_MESSAGE_CACHE_MAX_SIZE: i64 = 2048;

/// Parsed `bot` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    /// Settings for the transport builder.
    pub client: ClientSettings,
    /// Presence sent on login.
    pub presence: Presence,
    /// Channel receiving diagnostic messages.
    pub debug_log_channel: Option<Snowflake>,
}

impl BotSettings {
    /// Reads the settings from the `bot` section.
    ///
    /// # Errors
    ///
    /// `ConfigMalformed` when `token` is missing or a numeric value does not
    /// parse. Unknown `status`/`activity` values only log a warning.
    pub fn from_section(section: &ConfigSection) -> BootstrapResult<Self> {
        let token = section.require("token")?.trim().to_string();

        let rest_timeout = Duration::from_secs(
            section
                .parse::<u64>("rest.timeout_seconds")?
                .unwrap_or(DEFAULT_REST_TIMEOUT_SECS),
        );
        let rest_buffer_size = section
            .parse::<usize>("rest.buffer_size")?
            .unwrap_or(DEFAULT_REST_BUFFER_SIZE);
        let cache_size = section
            .parse::<i64>("message_cache_max_size")?
            .unwrap_or(DEFAULT_MESSAGE_CACHE_MAX_SIZE);
        let message_cache_max_size = usize::try_from(cache_size).ok().filter(|&n| n >= 1);

        let presence = parse_presence(section.get("status"), section.get("activity"));
        let debug_log_channel = section.parse::<Snowflake>("debug_log_channel_id")?;

        Ok(Self {
            client: ClientSettings {
                token,
                rest_timeout,
                rest_buffer_size,
                message_cache_max_size,
            },
            presence,
            debug_log_channel,
        })
    }
}

/// Builds the initial presence from the raw `status` and `activity` values.
///
/// An unknown status logs a warning and falls back to online. `invisible`
/// always drops the activity.
pub fn parse_presence(status: Option<&str>, activity: Option<&str>) -> Presence {
    let activity = activity.and_then(parse_activity);
    let status = match status.map(str::trim) {
        None | Some("online") => Status::Online,
        Some("idle") => Status::Idle,
        Some("dnd") => Status::DoNotDisturb,
        Some("invisible") => Status::Invisible,
        Some(other) => {
            warn!(
                status = other,
                "status: expected one of 'online', 'idle', 'dnd', 'invisible'; defaulting to 'online'"
            );
            Status::Online
        }
    };
    Presence::new(status, activity)
}

/// Parses an `activity` value.
///
/// Accepted forms: `""`, `none` or `null` (case-insensitive) for no activity,
/// `playing:<text>`, `watching:<text>`, `listening:<text>` and
/// `streaming:<url>:<text>`. For streaming the text follows the last `:`, so
/// the URL may contain colons. Anything else logs a warning and yields `None`.
pub fn parse_activity(raw: &str) -> Option<Activity> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("null")
    {
        return None;
    }

    let parsed = match value.split_once(':') {
        Some(("playing", text)) if !text.is_empty() => Some(Activity::Playing { text: text.into() }),
        Some(("watching", text)) if !text.is_empty() => Some(Activity::Watching { text: text.into() }),
        Some(("listening", text)) if !text.is_empty() => {
            Some(Activity::Listening { text: text.into() })
        }
        Some(("streaming", rest)) => match rest.rsplit_once(':') {
            Some((url, text)) if !url.is_empty() && !text.is_empty() => Some(Activity::Streaming {
                url: url.into(),
                text: text.into(),
            }),
            _ => None,
        },
        _ => None,
    };

    if parsed.is_none() {
        warn!(
            activity = value,
            "activity: expected one of ''|'none'|'null', 'playing:<text>', 'watching:<text>', \
             'listening:<text>' or 'streaming:<url>:<text>' in lower case; defaulting to no activity"
        );
    }
    parsed
}

#[cfg(test)]
mod tests {
    use keystone_core::BootstrapError;

    use super::*;

    fn section(entries: &[(&str, &str)]) -> ConfigSection {
        ConfigSection::from_entries(BOT_SECTION, entries.iter().copied())
    }

    #[test]
    fn test_defaults() {
        let settings = BotSettings::from_section(&section(&[("token", " abc ")])).unwrap();

        assert_eq!(settings.client.token, "abc");
        assert_eq!(settings.client.rest_timeout, Duration::from_secs(120));
        assert_eq!(settings.client.rest_buffer_size, 256);
        assert_eq!(settings.client.message_cache_max_size, Some(2048));
        assert_eq!(settings.presence, Presence::default());
        assert_eq!(settings.debug_log_channel, None);
    }

    #[test]
    fn test_explicit_values() {
        let settings = BotSettings::from_section(&section(&[
            ("token", "abc"),
            ("rest.timeout_seconds", "30"),
            ("rest.buffer_size", "64"),
            ("message_cache_max_size", "0"),
            ("debug_log_channel_id", "123456789012345678"),
        ]))
        .unwrap();

        assert_eq!(settings.client.rest_timeout, Duration::from_secs(30));
        assert_eq!(settings.client.rest_buffer_size, 64);
        assert_eq!(settings.client.message_cache_max_size, None);
        assert_eq!(settings.debug_log_channel, Some(Snowflake(123456789012345678)));
    }

    #[test]
    fn test_negative_cache_size_is_unbounded() {
        let settings =
            BotSettings::from_section(&section(&[("token", "abc"), ("message_cache_max_size", "-1")]))
                .unwrap();
        assert_eq!(settings.client.message_cache_max_size, None);
    }

    #[test]
    fn test_missing_token_and_bad_numbers() {
        assert!(matches!(
            BotSettings::from_section(&section(&[])),
            Err(BootstrapError::ConfigMalformed { key, .. }) if key == "token"
        ));
        assert!(matches!(
            BotSettings::from_section(&section(&[("token", "abc"), ("rest.timeout_seconds", "soon")])),
            Err(BootstrapError::ConfigMalformed { key, .. }) if key == "rest.timeout_seconds"
        ));
    }

    #[test]
    fn test_online_playing_presence() {
        let presence = parse_presence(Some("online"), Some("playing:Celeste"));
        assert_eq!(
            serde_json::to_value(&presence).unwrap(),
            serde_json::json!({
                "status": "online",
                "activity": { "kind": "playing", "text": "Celeste" }
            })
        );
    }

    #[test]
    fn test_invisible_ignores_activity() {
        for activity in ["playing:Celeste", "streaming:https://x.tv/a:Live", "garbage", ""] {
            let presence = parse_presence(Some("invisible"), Some(activity));
            assert_eq!(
                serde_json::to_value(&presence).unwrap(),
                serde_json::json!({ "status": "invisible" })
            );
        }
    }

    #[test]
    fn test_status_values() {
        assert_eq!(parse_presence(Some("idle"), None).status(), Status::Idle);
        assert_eq!(parse_presence(Some("dnd"), None).status(), Status::DoNotDisturb);
        assert_eq!(parse_presence(Some("away"), None).status(), Status::Online);
        assert_eq!(parse_presence(None, None).status(), Status::Online);
    }

    #[test]
    fn test_activity_forms() {
        assert_eq!(parse_activity("NONE"), None);
        assert_eq!(parse_activity("null"), None);
        assert_eq!(
            parse_activity("watching:the stars"),
            Some(Activity::Watching {
                text: "the stars".into()
            })
        );
        assert_eq!(
            parse_activity("listening:lofi: beats"),
            Some(Activity::Listening {
                text: "lofi: beats".into()
            })
        );
        assert_eq!(
            parse_activity("streaming:https://twitch.tv/gd:Level rates"),
            Some(Activity::Streaming {
                url: "https://twitch.tv/gd".into(),
                text: "Level rates".into()
            })
        );
        assert_eq!(parse_activity("streaming:nourl"), None);
        assert_eq!(parse_activity("playing:"), None);
        assert_eq!(parse_activity("Playing:Celeste"), None);
    }
}

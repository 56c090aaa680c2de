//! Transport boundary.
//!
//! Keystone does not speak any network protocol itself. The host supplies a
//! [`TransportBuilder`] that turns [`ClientSettings`] into a
//! [`TransportClient`]; the client logs in with an initial [`Presence`] and
//! returns a [`GatewaySession`] that the pipeline waits on until the
//! connection goes away.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Errors reported by transport implementations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The client could not be created from its settings.
    #[error("failed to build transport client: {0}")]
    BuildFailed(String),

    /// Logging in to the gateway failed.
    #[error("gateway login failed: {0}")]
    LoginFailed(String),

    /// A message could not be delivered.
    #[error("failed to send message to channel {channel}: {reason}")]
    SendFailed {
        /// Target channel.
        channel: Snowflake,
        /// Reason for failure.
        reason: String,
    },

    /// The connection is closed.
    #[error("connection closed")]
    Closed,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Snowflake
// =============================================================================

/// Numeric entity id (channel, user, guild).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Snowflake)
    }
}

// =============================================================================
// Presence
// =============================================================================

/// Online status shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Online.
    #[default]
    Online,
    /// Idle / away.
    Idle,
    /// Do not disturb.
    #[serde(rename = "dnd")]
    DoNotDisturb,
    /// Appears offline.
    Invisible,
}

impl Status {
    /// The configuration spelling of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::DoNotDisturb => "dnd",
            Self::Invisible => "invisible",
        }
    }
}

/// Activity displayed next to the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Activity {
    /// "Playing <text>".
    Playing {
        /// Displayed text.
        text: String,
    },
    /// "Watching <text>".
    Watching {
        /// Displayed text.
        text: String,
    },
    /// "Listening to <text>".
    Listening {
        /// Displayed text.
        text: String,
    },
    /// "Streaming <text>" linking to `url`.
    Streaming {
        /// Stream URL.
        url: String,
        /// Displayed text.
        text: String,
    },
}

/// Initial presence sent on login.
///
/// Built with [`Presence::new`], which keeps an invisible status free of any
/// activity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Presence {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity: Option<Activity>,
}

impl Presence {
    /// Builds a presence; an invisible status drops the activity.
    pub fn new(status: Status, activity: Option<Activity>) -> Self {
        match status {
            Status::Invisible => Self {
                status,
                activity: None,
            },
            _ => Self { status, activity },
        }
    }

    /// Online status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Displayed activity. Always `None` for [`Status::Invisible`].
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }
}

// =============================================================================
// Client settings
// =============================================================================

/// Settings used to build the primary transport client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Authentication token.
    pub token: String,
    /// Timeout applied to every REST request.
    pub rest_timeout: Duration,
    /// Size of the outgoing REST request buffer.
    pub rest_buffer_size: usize,
    /// Maximum number of cached messages; `None` means unbounded.
    pub message_cache_max_size: Option<usize>,
}

// =============================================================================
// Traits
// =============================================================================

/// Builds the primary transport client.
#[async_trait]
pub trait TransportBuilder: Send + Sync {
    /// Creates a client from the `bot` section settings.
    async fn build(&self, settings: &ClientSettings) -> TransportResult<Arc<dyn TransportClient>>;
}

/// The primary transport client handed to factories and plugins.
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    /// Short transport name for logs.
    fn name(&self) -> &str;

    /// Sends a plain text message to a channel.
    async fn send_message(&self, channel: Snowflake, content: &str) -> TransportResult<()>;

    /// Opens the gateway session with the given initial presence.
    async fn login(&self, presence: Presence) -> TransportResult<Arc<dyn GatewaySession>>;
}

/// A live gateway connection.
#[async_trait]
pub trait GatewaySession: Send + Sync + 'static {
    /// Completes once the session is disconnected.
    async fn on_disconnect(&self);
}

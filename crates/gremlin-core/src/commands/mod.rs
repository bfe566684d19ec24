//! Chat command front end
//!
//! Turns a chat message into a [`Command`] and runs it against the
//! registries, producing the reply text. Errors never escape this boundary:
//! every failure becomes a reply.
//!
//! ## Commands
//!
//! | Command | Aliases | Privileged |
//! |---------|---------|------------|
//! | `ban <target> [duration] [flag]` | | yes |
//! | `unban <target>` | | yes |
//! | `listOnline` | `users`, `online` | yes |
//! | `join [name...]` | | no |
//! | `clearEntries` | `clear_giveaway` | yes |

use crate::bans::BanRegistry;
use crate::config::CommandConfig;
use crate::entries::EntryRegistry;
use crate::error::Error;
use crate::presence::{PresenceDirectory, format_online_users};
use tracing::{debug, warn};

const ACCESS_DENIED: &str = "⛔ **ACCESS DENIED**\nModerator privileges required.";

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ban {
        target: String,
        duration: Option<String>,
        flagged: bool,
    },
    Unban {
        target: String,
    },
    ListOnline,
    Join {
        /// Display name; the caller's username when absent
        name: Option<String>,
    },
    ClearEntries,
    /// `ban`/`unban` with missing arguments
    Usage(&'static str),
}

impl Command {
    /// Parse a message
    ///
    /// Returns `None` when the message is not a known command.
    pub fn parse(prefix: &str, text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix(prefix)?;
        let mut tokens = body.split_whitespace();
        let name = tokens.next()?;

        let command = match name {
            "ban" => match tokens.next() {
                None => Command::Usage("Usage: !ban <ip_or_device> [duration] [y/n]"),
                Some(target) => Command::Ban {
                    target: target.to_string(),
                    duration: tokens.next().map(str::to_string),
                    flagged: tokens.next().is_some_and(is_affirmative),
                },
            },
            "unban" => match tokens.next() {
                None => Command::Usage("Usage: !unban <ip_or_device>"),
                Some(target) => Command::Unban {
                    target: target.to_string(),
                },
            },
            "listOnline" | "users" | "online" => Command::ListOnline,
            "join" => {
                // Display names keep their inner spacing
                let rest = body.trim_start().strip_prefix(name).unwrap_or("").trim();
                Command::Join {
                    name: (!rest.is_empty()).then(|| rest.to_string()),
                }
            }
            "clearEntries" | "clear_giveaway" => Command::ClearEntries,
            _ => return None,
        };

        Some(command)
    }

    /// Whether only moderators may run the command
    pub fn is_privileged(&self) -> bool {
        !matches!(self, Command::Join { .. })
    }
}

fn is_affirmative(token: &str) -> bool {
    matches!(token.to_lowercase().as_str(), "y" | "yes" | "true")
}

/// The actor who sent a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Stable actor id
    pub id: String,
    /// Display string recorded as a ban's issuer
    pub tag: String,
    /// Default display name for `join`
    pub username: String,
    /// Avatar reference recorded with giveaway entries
    pub avatar: Option<String>,
    /// Whether the actor may run privileged commands
    pub privileged: bool,
}

impl Caller {
    /// The local operator (privileged, no avatar)
    pub fn operator() -> Self {
        Self {
            id: "operator".to_string(),
            tag: "operator".to_string(),
            username: "operator".to_string(),
            avatar: None,
            privileged: true,
        }
    }
}

/// Dispatches commands to the registries
#[derive(Clone)]
pub struct CommandRouter {
    bans: BanRegistry,
    entries: EntryRegistry,
    presence: PresenceDirectory,
    config: CommandConfig,
}

impl CommandRouter {
    /// Create a new command router
    pub fn new(
        bans: BanRegistry,
        entries: EntryRegistry,
        presence: PresenceDirectory,
        config: CommandConfig,
    ) -> Self {
        Self {
            bans,
            entries,
            presence,
            config,
        }
    }

    /// Handle one message
    ///
    /// Returns the reply, or `None` if the message is not a command.
    pub async fn dispatch(&self, caller: &Caller, text: &str) -> Option<String> {
        let command = Command::parse(&self.config.prefix, text)?;
        debug!("{} issued {:?}", caller.tag, command);

        if command.is_privileged() && !caller.privileged {
            return Some(ACCESS_DENIED.to_string());
        }

        Some(self.execute(caller, command).await)
    }

    async fn execute(&self, caller: &Caller, command: Command) -> String {
        match command {
            Command::Usage(usage) => usage.to_string(),

            Command::Ban {
                target,
                duration,
                flagged,
            } => {
                let duration = duration.or_else(|| self.config.default_ban_duration.clone());
                match self
                    .bans
                    .ban(&target, duration.as_deref(), flagged, &caller.tag)
                    .await
                {
                    Ok(_) => format!(
                        "✅ Banned **{}** {}{}",
                        target,
                        duration
                            .map(|d| format!("for {}", d))
                            .unwrap_or_else(|| "permanently".to_string()),
                        if flagged { " (SCARED)" } else { "" }
                    ),
                    Err(e) => error_reply("Error", &e),
                }
            }

            Command::Unban { target } => match self.bans.unban(&target).await {
                Ok(()) => format!("✅ Unbanned **{}**", target),
                Err(e) => error_reply("Error", &e),
            },

            Command::ListOnline => match self.presence.online_users().await {
                Ok(users) => format_online_users(&users),
                Err(e) => error_reply("Error fetching users", &e),
            },

            Command::Join { name } => {
                let name = name.unwrap_or_else(|| caller.username.clone());
                match self
                    .entries
                    .join_with_avatar(&caller.id, &name, caller.avatar.as_deref())
                    .await
                {
                    Ok(entry) => format!(
                        "🎟️ **Entry Confirmed!** Ticket Name: **{}**",
                        entry.display_name
                    ),
                    Err(Error::AlreadyJoined(_)) => {
                        "⚠️ **You have already joined!** One entry per person.".to_string()
                    }
                    Err(e) => error_reply("Error joining giveaway", &e),
                }
            }

            Command::ClearEntries => match self.entries.clear().await {
                Ok(()) => "🗑️ **Giveaway entries cleared.**".to_string(),
                Err(e) => error_reply("Error clearing entries", &e),
            },
        }
    }
}

fn error_reply(context: &str, error: &Error) -> String {
    if !error.is_user_correctable() {
        warn!("{}: {}", context, error);
    }
    format!("{}: {}", context, error)
}

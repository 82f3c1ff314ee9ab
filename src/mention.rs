use crate::identity::{BotIdentity, APP_BOT_SUFFIX};
use clap::ValueEnum;
use std::ops::Range;

/// Substituted when a comment contains nothing but the mention.
pub const DEFAULT_QUERY: &str = "Please take a look at this discussion and share what you know.";

const HELP_KEYWORD: &str = "help";

/// How `@handle` is located inside comment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MentionPolicy {
    /// Any occurrence of `@handle`, so `@bot` also matches inside `@bot-helper`.
    Substring,
    /// `@handle` must not be glued to other login characters on either side.
    #[default]
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Ask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMention {
    pub mentioned: bool,
    pub is_self: bool,
    pub query: String,
    pub command: Command,
}

impl ParsedMention {
    pub fn should_reply(&self) -> bool {
        self.mentioned && !self.is_self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MentionParser {
    policy: MentionPolicy,
}

impl MentionParser {
    pub fn new(policy: MentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MentionPolicy {
        self.policy
    }

    /// Byte range of the first `@handle` token accepted by the policy.
    pub fn find_mention(&self, body: &str, handle: &str) -> Option<Range<usize>> {
        if handle.is_empty() {
            return None;
        }
        let token = format!("@{}", handle);

        match self.policy {
            MentionPolicy::Substring => body.find(&token).map(|start| start..start + token.len()),
            MentionPolicy::Boundary => body
                .match_indices(&token)
                .map(|(start, _)| start..start + token.len())
                .find(|range| {
                    let before = body[..range.start].chars().next_back();
                    let after = body[range.end..].chars().next();
                    !before.is_some_and(is_login_char) && !after.is_some_and(is_login_char)
                }),
        }
    }

    pub fn parse(&self, body: &str, actor: &str, bot: &BotIdentity) -> ParsedMention {
        let mention = self.find_mention(body, bot.mention_handle()).map(|range| {
            // `@helper[bot]` is stripped whole
            if bot.is_app() && body[range.end..].starts_with(APP_BOT_SUFFIX) {
                range.start..range.end + APP_BOT_SUFFIX.len()
            } else {
                range
            }
        });

        let stripped = match &mention {
            Some(range) => format!("{}{}", &body[..range.start], &body[range.end..]),
            None => body.to_string(),
        };
        let trimmed = stripped.trim();
        let query = if trimmed.is_empty() {
            DEFAULT_QUERY.to_string()
        } else {
            trimmed.to_string()
        };

        let command = if query.to_lowercase().contains(HELP_KEYWORD) {
            Command::Help
        } else {
            Command::Ask
        };

        ParsedMention {
            mentioned: mention.is_some(),
            is_self: bot.is(actor),
            query,
            command,
        }
    }
}

// Characters GitHub allows in a login
fn is_login_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

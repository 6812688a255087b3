//! Assertions on the shape of messages the bot posts back.

use std::fmt;

use chatops_slack::{Attachment, AttachmentField, SlackEvent};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Placeholder replaced with the test user's id in templates and patterns.
pub const USER_ID_PLACEHOLDER: &str = "{userid}";

pub const ACK_MARKER: &str = "details available at";
pub const HELP_LISTING_LINE: &str =
    "!help - Displays all of the help commands that this bot knows about.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationContext {
    pub user_id: String,
}

impl ExpectationContext {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }

    fn render(&self, template: &str) -> String {
        template.replace(USER_ID_PLACEHOLDER, &self.user_id)
    }

    fn render_pattern(&self, pattern: &str) -> String {
        pattern.replace(USER_ID_PLACEHOLDER, &regex::escape(&self.user_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One check against one received message.
pub enum Expectation {
    MessageType(String),
    TextContains(String),
    TextEquals(String),
    FromBot,
    HasAttachmentText,
    PretextMatches(String),
    PretextEquals(String),
    AttachmentTextMatches(String),
    AttachmentTextEquals(String),
    FallbackEqualsText,
    FieldsEqual(Vec<AttachmentField>),
    ImageUrlEquals(String),
    ColorEquals(String),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageType(kind) => write!(f, "type == {kind:?}"),
            Self::TextContains(needle) => write!(f, "text contains {needle:?}"),
            Self::TextEquals(text) => write!(f, "text == {text:?}"),
            Self::FromBot => f.write_str("bot_id is set"),
            Self::HasAttachmentText => f.write_str("first attachment has text"),
            Self::PretextMatches(pattern) => write!(f, "pretext matches /{pattern}/"),
            Self::PretextEquals(template) => write!(f, "pretext == {template:?}"),
            Self::AttachmentTextMatches(pattern) => {
                write!(f, "attachment text matches /{pattern}/")
            }
            Self::AttachmentTextEquals(text) => write!(f, "attachment text == {text:?}"),
            Self::FallbackEqualsText => f.write_str("attachment fallback == attachment text"),
            Self::FieldsEqual(fields) => {
                write!(f, "attachment has {} expected fields", fields.len())
            }
            Self::ImageUrlEquals(url) => write!(f, "image_url == {url:?}"),
            Self::ColorEquals(color) => write!(f, "color == {color:?}"),
        }
    }
}

impl Expectation {
    /// Checks `event`, returning a description of the mismatch on failure.
    pub fn check(&self, event: &SlackEvent, context: &ExpectationContext) -> Result<(), String> {
        match self {
            Self::MessageType(kind) => {
                expect_equal("type", event.event_type(), Some(kind.as_str()))
            }
            Self::TextContains(needle) => {
                let text = event.text.as_deref().ok_or("message has no text")?;
                if text.contains(needle.as_str()) {
                    Ok(())
                } else {
                    Err(format!("text was {text:?}"))
                }
            }
            Self::TextEquals(expected) => {
                expect_equal("text", event.text.as_deref(), Some(expected.as_str()))
            }
            Self::FromBot => match event.bot_id.as_deref() {
                Some(_) => Ok(()),
                None => Err("message has no bot_id".to_string()),
            },
            Self::HasAttachmentText => {
                let attachments = event
                    .attachments
                    .as_ref()
                    .ok_or("message has no attachments")?;
                let first = attachments.first().ok_or("attachment list is empty")?;
                first
                    .text
                    .as_ref()
                    .map(|_| ())
                    .ok_or_else(|| "first attachment has no text".to_string())
            }
            Self::PretextMatches(pattern) => {
                let pretext = attachment_str(event, "pretext", |a| a.pretext.as_deref())?;
                expect_match(&context.render_pattern(pattern), pretext)
            }
            Self::PretextEquals(template) => {
                let pretext = attachment_str(event, "pretext", |a| a.pretext.as_deref())?;
                let expected = context.render(template);
                expect_equal("pretext", Some(pretext), Some(expected.as_str()))
            }
            Self::AttachmentTextMatches(pattern) => {
                let text = attachment_str(event, "text", |a| a.text.as_deref())?;
                expect_match(&context.render_pattern(pattern), text)
            }
            Self::AttachmentTextEquals(expected) => {
                let text = attachment_str(event, "text", |a| a.text.as_deref())?;
                expect_equal("attachment text", Some(text), Some(expected.as_str()))
            }
            Self::FallbackEqualsText => {
                let attachment = first_attachment(event)?;
                expect_equal(
                    "fallback",
                    attachment.fallback.as_deref(),
                    attachment.text.as_deref(),
                )
            }
            Self::FieldsEqual(expected) => {
                let attachment = first_attachment(event)?;
                let fields = attachment.fields.as_deref().unwrap_or_default();
                if fields == expected.as_slice() {
                    Ok(())
                } else {
                    Err(format!("fields were {fields:?}, expected {expected:?}"))
                }
            }
            Self::ImageUrlEquals(expected) => {
                let attachment = first_attachment(event)?;
                expect_equal(
                    "image_url",
                    attachment.image_url.as_deref(),
                    Some(expected.as_str()),
                )
            }
            Self::ColorEquals(expected) => {
                let attachment = first_attachment(event)?;
                expect_equal("color", attachment.color.as_deref(), Some(expected.as_str()))
            }
        }
    }
}

fn first_attachment(event: &SlackEvent) -> Result<&Attachment, String> {
    event
        .first_attachment()
        .ok_or_else(|| "message has no attachments".to_string())
}

fn attachment_str<'a>(
    event: &'a SlackEvent,
    field: &str,
    select: impl Fn(&'a Attachment) -> Option<&'a str>,
) -> Result<&'a str, String> {
    let attachment = first_attachment(event)?;
    select(attachment).ok_or_else(|| format!("first attachment has no {field}"))
}

fn expect_equal(field: &str, actual: Option<&str>, expected: Option<&str>) -> Result<(), String> {
    if actual == expected {
        return Ok(());
    }
    Err(format!("{field} was {actual:?}, expected {expected:?}"))
}

fn expect_match(pattern: &str, haystack: &str) -> Result<(), String> {
    let regex = Regex::new(pattern).map_err(|error| format!("invalid pattern: {error}"))?;
    if regex.is_match(haystack) {
        Ok(())
    } else {
        Err(format!("{haystack:?} does not match"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}: {expectation}: {detail}", location(.message_index))]
/// A received message (or the message count) did not meet an expectation.
pub struct ExpectationFailure {
    pub message_index: Option<usize>,
    pub expectation: String,
    pub detail: String,
}

fn location(message_index: &Option<usize>) -> String {
    match message_index {
        Some(index) => format!("message[{index}]"),
        None => "messages".to_string(),
    }
}

/// Evaluates the count check and every per-message expectation.
///
/// `per_message[i]` applies to the `i`-th received message. All failures are
/// reported, not just the first.
pub fn evaluate(
    messages: &[SlackEvent],
    expected_count: usize,
    per_message: &[Vec<Expectation>],
    context: &ExpectationContext,
) -> Vec<ExpectationFailure> {
    let mut failures = Vec::new();
    if messages.len() != expected_count {
        let observed = messages
            .iter()
            .map(|message| serde_json::to_string(message).unwrap_or_default())
            .collect::<Vec<_>>();
        failures.push(ExpectationFailure {
            message_index: None,
            expectation: format!("exactly {expected_count} message(s)"),
            detail: format!("received {}: [{}]", messages.len(), observed.join(", ")),
        });
    }

    for (index, (message, expectations)) in messages.iter().zip(per_message).enumerate() {
        for expectation in expectations {
            if let Err(detail) = expectation.check(message, context) {
                failures.push(ExpectationFailure {
                    message_index: Some(index),
                    expectation: expectation.to_string(),
                    detail,
                });
            }
        }
    }
    failures
}

/// Acknowledgement posted before the action runs.
pub fn ack() -> Vec<Expectation> {
    vec![
        Expectation::MessageType("message".to_string()),
        Expectation::TextContains(ACK_MARKER.to_string()),
    ]
}

/// Help replies are posted directly, without an acknowledgement.
pub fn help_listing() -> Vec<Expectation> {
    vec![
        Expectation::MessageType("message".to_string()),
        Expectation::TextContains(HELP_LISTING_LINE.to_string()),
    ]
}

/// A bot message whose first attachment carries text addressed to the user.
pub fn bot_reply() -> Vec<Expectation> {
    vec![
        Expectation::MessageType("message".to_string()),
        Expectation::FromBot,
        Expectation::HasAttachmentText,
    ]
}

/// The default result format for a finished execution.
pub fn execution_result(action: &str, status: &str) -> Vec<Expectation> {
    let mut expectations = bot_reply();
    expectations.push(Expectation::PretextMatches(format!("<@{USER_ID_PLACEHOLDER}>")));
    expectations.extend([
        Expectation::AttachmentTextMatches(format!(
            r"Action {} completed\.",
            regex::escape(action)
        )),
        Expectation::AttachmentTextMatches(format!(r"status\s*:\s*{status}")),
        Expectation::AttachmentTextMatches(r"execution\s*:\s*[0-9a-fA-F]{24}".to_string()),
        // Durations may be integers or floats and may carry a unit like "μs".
        Expectation::AttachmentTextMatches(r"Took \d+.*s to complete\.".to_string()),
    ]);
    expectations
}

//! Thin Slack client used by the ChatOps end-to-end harness.
//!
//! Covers the Web API calls the harness needs to impersonate a user
//! (`auth.test`, `users.list`, `chat.postMessage`, `rtm.connect`) and the RTM
//! websocket feed used to observe the bot's replies.

pub mod api_client;
pub mod error;
mod helpers;
pub mod message;
pub mod rtm;

pub use api_client::{
    AuthIdentity, PostMessage, PostedMessage, RtmSession, SlackApiClient, SlackUser,
    DEFAULT_SLACK_API_BASE,
};
pub use error::SlackError;
pub use message::{Attachment, AttachmentField, SlackEvent};
pub use rtm::RtmFeed;

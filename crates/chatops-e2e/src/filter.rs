use chatops_slack::SlackEvent;

const NOISE_EVENT_TYPES: [&str; 2] = ["user_typing", "hello"];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Drops feed events that say nothing about the bot's behaviour.
///
/// Typing indicators are almost always a human in the channel and would
/// inflate the message count; `hello` is the RTM handshake; and the runner's
/// own posts echo back through the feed.
pub struct NoiseFilter {
    ignored_user_id: String,
}

impl NoiseFilter {
    pub fn ignoring_user(user_id: &str) -> Self {
        Self {
            ignored_user_id: user_id.to_string(),
        }
    }

    pub fn accepts(&self, event: &SlackEvent) -> bool {
        if let Some(event_type) = event.event_type() {
            if NOISE_EVENT_TYPES.contains(&event_type) {
                return false;
            }
        }
        event.user_id() != Some(self.ignored_user_id.as_str())
    }

    pub fn retain(&self, events: Vec<SlackEvent>) -> Vec<SlackEvent> {
        events
            .into_iter()
            .filter(|event| self.accepts(event))
            .collect()
    }
}

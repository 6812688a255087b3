//! Bounded polling of the event feed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chatops_slack::SlackEvent;

use crate::filter::NoiseFilter;

#[async_trait]
/// Source of buffered real-time events.
pub trait EventSource: Send {
    /// Returns every event buffered since the previous call, without waiting.
    async fn drain_events(&mut self) -> Result<Vec<SlackEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    /// Stop as soon as this many messages have been collected.
    pub stop_at: usize,
    /// Maximum number of ticks to wait; an iteration count, not a deadline.
    pub ticks: u64,
    pub tick: Duration,
}

/// Drains `source` once per tick, keeping events `filter` accepts, until
/// `stop_at` messages have accumulated or the tick budget runs out.
///
/// A single drain may push the result past `stop_at`; everything collected is
/// returned so callers can assert on the exact count.
pub async fn collect_messages<S>(
    source: &mut S,
    filter: &NoiseFilter,
    budget: PollBudget,
) -> Result<Vec<SlackEvent>>
where
    S: EventSource + ?Sized,
{
    let mut messages = Vec::new();
    for tick in 0..budget.ticks {
        if messages.len() >= budget.stop_at {
            tracing::debug!(tick, collected = messages.len(), "poll target reached");
            break;
        }
        tokio::time::sleep(budget.tick).await;

        let drained = source.drain_events().await?;
        let drained_count = drained.len();
        let accepted = filter.retain(drained);
        if drained_count > 0 {
            tracing::debug!(
                tick,
                drained = drained_count,
                accepted = accepted.len(),
                "drained rtm events"
            );
        }
        messages.extend(accepted);
    }
    Ok(messages)
}

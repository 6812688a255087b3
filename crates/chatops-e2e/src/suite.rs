//! Runs catalogued scenarios against a chat transport.
//!
//! Mirrors a classic xUnit lifecycle: one suite set-up (resolve the test
//! user, post an opening banner), per-scenario set-up and tear-down (pause,
//! fresh feed, drained buffer), and a closing banner that is always attempted.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chatops_slack::{PostMessage, RtmFeed, SlackApiClient, SlackEvent};

use crate::config::{E2eConfig, SuiteSettings};
use crate::expect::{evaluate, ExpectationContext, ExpectationFailure};
use crate::filter::NoiseFilter;
use crate::poll::{collect_messages, EventSource, PollBudget};
use crate::report::{OutcomeStatus, ScenarioOutcome, SuiteReport};
use crate::scenarios::{Scenario, WaitProfile};

pub const SUITE_START_BANNER: &str = "`===== BEGINNING ChatOps End-to-End Tests =====`";
pub const SUITE_END_BANNER: &str = "`===== FINISHED ChatOps End-to-End Tests =====`";

#[async_trait]
/// What the runner needs from the chat platform.
pub trait ChatTransport: EventSource {
    /// Resolves a user id from the member's real name.
    async fn resolve_user_id(&mut self, real_name: &str) -> Result<String>;

    async fn post_message(&mut self, channel: &str, text: &str, link_names: bool) -> Result<()>;

    /// Replaces the event feed with a fresh connection.
    async fn reconnect_feed(&mut self) -> Result<()>;
}

/// Live Slack transport: Web API for posting, RTM for observing.
pub struct SlackTransport {
    client: SlackApiClient,
    feed: Option<RtmFeed>,
}

impl SlackTransport {
    pub fn new(client: SlackApiClient) -> Self {
        Self { client, feed: None }
    }

    pub fn from_config(config: &E2eConfig) -> Result<Self> {
        let client = SlackApiClient::new(
            &config.api_base,
            &config.user_api_token,
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )
        .context("failed to create slack api client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl EventSource for SlackTransport {
    async fn drain_events(&mut self) -> Result<Vec<SlackEvent>> {
        let feed = self
            .feed
            .as_mut()
            .ok_or_else(|| anyhow!("rtm feed is not connected"))?;
        feed.drain()
            .context("rtm feed stopped before the scenario finished")
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn resolve_user_id(&mut self, real_name: &str) -> Result<String> {
        self.client
            .find_user_id_by_real_name(real_name)
            .await
            .with_context(|| format!("failed to resolve slack user '{real_name}'"))
    }

    async fn post_message(&mut self, channel: &str, text: &str, link_names: bool) -> Result<()> {
        let message = PostMessage::as_user(channel, text).with_link_names(link_names);
        let posted = self
            .client
            .post_message(&message)
            .await
            .context("failed to post slack message")?;
        tracing::debug!(channel = %posted.channel, ts = %posted.ts, "posted message");
        Ok(())
    }

    async fn reconnect_feed(&mut self) -> Result<()> {
        self.feed = None;
        let session = self
            .client
            .rtm_connect()
            .await
            .context("failed to start rtm session")?;
        let feed = RtmFeed::connect(&session.url)
            .await
            .context("failed to connect rtm websocket")?;
        tracing::debug!(self_id = ?session.self_id, "rtm feed connected");
        self.feed = Some(feed);
        Ok(())
    }
}

pub struct SuiteRunner<T> {
    transport: T,
    settings: SuiteSettings,
    user_id: Option<String>,
}

impl<T: ChatTransport> SuiteRunner<T> {
    pub fn new(transport: T, settings: SuiteSettings) -> Self {
        Self {
            transport,
            settings,
            user_id: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Resolves the test user and announces the run in the channel.
    pub async fn set_up_suite(&mut self) -> Result<()> {
        self.resolve_user().await?;
        self.transport
            .post_message(&self.settings.channel, SUITE_START_BANNER, false)
            .await?;
        tokio::time::sleep(self.settings.quarter_pause()).await;
        Ok(())
    }

    pub async fn tear_down_suite(&mut self) -> Result<()> {
        self.transport
            .post_message(&self.settings.channel, SUITE_END_BANNER, false)
            .await
    }

    async fn resolve_user(&mut self) -> Result<String> {
        if let Some(user_id) = &self.user_id {
            return Ok(user_id.clone());
        }
        let user_id = self
            .transport
            .resolve_user_id(&self.settings.user_username)
            .await?;
        tracing::info!(user = %self.settings.user_username, %user_id, "resolved test user");
        self.user_id = Some(user_id.clone());
        Ok(user_id)
    }

    /// Runs one scenario including its set-up and tear-down.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioOutcome {
        let started = Instant::now();
        tracing::info!(scenario = scenario.name, "running scenario");

        let result = match self.set_up_scenario().await {
            Ok(()) => self.exercise(scenario).await,
            Err(error) => Err(error),
        };
        if let Err(error) = self.tear_down_scenario().await {
            tracing::warn!(scenario = scenario.name, %error, "scenario teardown failed");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (status, messages_observed) = match result {
            Ok((failures, observed)) if failures.is_empty() => (OutcomeStatus::Passed, observed),
            Ok((failures, observed)) => (OutcomeStatus::Failed { failures }, observed),
            Err(error) => (
                OutcomeStatus::Errored {
                    message: format!("{error:#}"),
                },
                0,
            ),
        };
        match &status {
            OutcomeStatus::Passed => tracing::info!(scenario = scenario.name, "scenario passed"),
            OutcomeStatus::Failed { failures } => tracing::warn!(
                scenario = scenario.name,
                failures = failures.len(),
                "scenario failed"
            ),
            OutcomeStatus::Errored { message } => {
                tracing::error!(scenario = scenario.name, %message, "scenario errored")
            }
        }

        ScenarioOutcome {
            name: scenario.name.to_string(),
            messages_observed,
            elapsed_ms,
            status,
        }
    }

    /// Suite set-up, every scenario in order, then suite tear-down.
    ///
    /// Fails only when suite set-up fails; scenario failures and a failed
    /// closing banner are recorded in the report.
    pub async fn run_all(&mut self, scenarios: &[Scenario]) -> Result<SuiteReport> {
        self.set_up_suite()
            .await
            .context("suite set-up failed")?;

        let mut report = SuiteReport::default();
        for scenario in scenarios {
            let outcome = self.run_scenario(scenario).await;
            report.outcomes.push(outcome);
        }

        if let Err(error) = self.tear_down_suite().await {
            tracing::warn!(%error, "suite teardown failed");
            report.teardown_error = Some(format!("{error:#}"));
        }
        Ok(report)
    }

    async fn set_up_scenario(&mut self) -> Result<()> {
        tokio::time::sleep(self.settings.quarter_pause()).await;
        self.transport.reconnect_feed().await?;
        let stale = self.transport.drain_events().await?;
        tracing::debug!(discarded = stale.len(), "drained feed before scenario");
        Ok(())
    }

    async fn tear_down_scenario(&mut self) -> Result<()> {
        tokio::time::sleep(self.settings.quarter_pause()).await;
        self.transport.drain_events().await?;
        Ok(())
    }

    async fn exercise(
        &mut self,
        scenario: &Scenario,
    ) -> Result<(Vec<ExpectationFailure>, usize)> {
        let user_id = self.resolve_user().await?;
        let filter = NoiseFilter::ignoring_user(&user_id);

        let command = scenario.render_command(&self.settings.bot_username);
        self.transport
            .post_message(&self.settings.channel, &command, scenario.link_names)
            .await?;

        let budget = PollBudget {
            stop_at: scenario.stop_at,
            ticks: match scenario.wait {
                WaitProfile::Short => self.settings.dont_wait_ticks,
                WaitProfile::Long => self.settings.wait_ticks,
            },
            tick: self.settings.tick,
        };
        let mut messages = collect_messages(&mut self.transport, &filter, budget).await?;

        if scenario.settle {
            tokio::time::sleep(self.settings.half_pause()).await;
            let late = filter.retain(self.transport.drain_events().await?);
            messages.extend(late);
        }

        let context = ExpectationContext::new(&user_id);
        let failures = evaluate(
            &messages,
            scenario.expected_count,
            &scenario.messages,
            &context,
        );
        Ok((failures, messages.len()))
    }
}

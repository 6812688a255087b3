use std::time::Duration;

use chatops_slack::DEFAULT_SLACK_API_BASE;
use clap::Parser;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
/// Connection and timing settings for a live end-to-end run.
pub struct E2eConfig {
    #[arg(
        long,
        env = "SLACK_CHANNEL",
        help = "Channel the test user posts commands into"
    )]
    pub channel: String,

    #[arg(
        long = "bot-username",
        env = "SLACK_BOT_USERNAME",
        help = "Username of the chatops bot under test, used for @-mention commands"
    )]
    pub bot_username: String,

    #[arg(
        long = "user-api-token",
        env = "SLACK_USER_API_TOKEN",
        hide_env_values = true,
        help = "User token (xoxp-...) for the account that impersonates a human"
    )]
    pub user_api_token: String,

    #[arg(
        long = "user-username",
        env = "SLACK_USER_USERNAME",
        help = "Real name of the impersonated user; its own messages are ignored"
    )]
    pub user_username: String,

    #[arg(
        long = "wait-timeout-secs",
        env = "SLACK_WAIT_FOR_MESSAGES_TIMEOUT",
        default_value_t = 120,
        value_parser = parse_positive_u64,
        help = "Polling budget in seconds for commands that execute an action"
    )]
    pub wait_timeout_secs: u64,

    #[arg(
        long = "dont-wait-timeout-secs",
        env = "SLACK_DONT_WAIT_FOR_MESSAGES_TIMEOUT",
        default_value_t = 8,
        value_parser = parse_positive_u64,
        help = "Polling budget in seconds for quick replies and silence checks; a quarter of it separates tests"
    )]
    pub dont_wait_timeout_secs: u64,

    #[arg(
        long = "api-base",
        env = "SLACK_API_BASE",
        default_value = DEFAULT_SLACK_API_BASE,
        help = "Slack Web API base URL"
    )]
    pub api_base: String,

    #[arg(
        long = "request-timeout-ms",
        env = "SLACK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single Web API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "SLACK_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Attempts per Web API call before giving up on rate limits or server errors"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "SLACK_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff between Web API retries"
    )]
    pub retry_base_delay_ms: u64,
}

impl E2eConfig {
    /// Builds the configuration from `SLACK_*` environment variables only.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(["chatops-e2e"])
    }

    pub fn suite_settings(&self) -> SuiteSettings {
        SuiteSettings {
            channel: self.channel.clone(),
            bot_username: self.bot_username.clone(),
            user_username: self.user_username.clone(),
            wait_ticks: self.wait_timeout_secs,
            dont_wait_ticks: self.dont_wait_timeout_secs,
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Timing and identity the suite runner needs, independent of the transport.
pub struct SuiteSettings {
    pub channel: String,
    pub bot_username: String,
    pub user_username: String,
    pub wait_ticks: u64,
    pub dont_wait_ticks: u64,
    pub tick: Duration,
}

impl SuiteSettings {
    /// Pause taken around every test and after the opening banner.
    pub fn quarter_pause(&self) -> Duration {
        self.ticks(self.dont_wait_ticks) / 4
    }

    pub fn half_pause(&self) -> Duration {
        self.ticks(self.dont_wait_ticks) / 2
    }

    fn ticks(&self, count: u64) -> Duration {
        self.tick.saturating_mul(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::E2eConfig;

    const REQUIRED: [&str; 9] = [
        "chatops-e2e",
        "--channel",
        "#chatops-ci",
        "--bot-username",
        "stanley",
        "--user-api-token",
        "xoxp-test",
        "--user-username",
        "ChatOps Tester",
    ];

    #[test]
    fn unit_e2e_config_parses_flags_and_keeps_timeout_overrides() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--wait-timeout-secs", "30", "--dont-wait-timeout-secs", "4"]);
        let config = E2eConfig::try_parse_from(args).expect("parse");

        assert_eq!(config.channel, "#chatops-ci");
        assert_eq!(config.bot_username, "stanley");
        assert_eq!(config.user_username, "ChatOps Tester");
        assert_eq!(config.wait_timeout_secs, 30);
        assert_eq!(config.dont_wait_timeout_secs, 4);

        let settings = config.suite_settings();
        assert_eq!(settings.wait_ticks, 30);
        assert_eq!(settings.quarter_pause(), Duration::from_secs(1));
        assert_eq!(settings.half_pause(), Duration::from_secs(2));
    }

    #[test]
    fn regression_e2e_config_rejects_zero_timeouts() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--dont-wait-timeout-secs", "0"]);
        assert!(E2eConfig::try_parse_from(args).is_err());
    }

    #[test]
    fn unit_pauses_are_quarter_and_half_of_short_budget_in_ticks() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--dont-wait-timeout-secs", "8"]);
        let mut settings = E2eConfig::try_parse_from(args)
            .expect("parse")
            .suite_settings();
        settings.tick = Duration::from_millis(10);
        assert_eq!(settings.quarter_pause(), Duration::from_millis(20));
        assert_eq!(settings.half_pause(), Duration::from_millis(40));
    }
}

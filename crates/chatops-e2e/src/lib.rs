//! End-to-end harness for a chatops bot running in Slack.
//!
//! Posts commands as a real user, watches the RTM feed for the bot's replies,
//! and checks acknowledgements, execution results, and custom result formats
//! against a fixed scenario catalogue.

pub mod config;
pub mod expect;
pub mod filter;
pub mod poll;
pub mod report;
pub mod scenarios;
pub mod suite;

pub use config::{E2eConfig, SuiteSettings};
pub use expect::{Expectation, ExpectationContext, ExpectationFailure};
pub use filter::NoiseFilter;
pub use poll::{collect_messages, EventSource, PollBudget};
pub use report::{OutcomeStatus, ScenarioOutcome, SuiteReport};
pub use scenarios::{Scenario, WaitProfile};
pub use suite::{ChatTransport, SlackTransport, SuiteRunner};

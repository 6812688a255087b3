//! Scenarios against a real Slack workspace and a running bot.
//!
//! Run with `cargo test -p chatops-integration-tests --test live_slack -- --ignored`
//! after exporting the `SLACK_*` variables `chatops-e2e run` reads.

use chatops_e2e::{scenarios, E2eConfig, SlackTransport, SuiteRunner};
use tokio::sync::Mutex;

// Every scenario posts into the same channel; overlapping runs would read
// each other's replies.
static CHANNEL_LOCK: Mutex<()> = Mutex::const_new(());

async fn run_live(names: &[&str]) {
    let _guard = CHANNEL_LOCK.lock().await;
    let config = E2eConfig::from_env().expect("SLACK_* environment");
    let transport = SlackTransport::from_config(&config).expect("transport");
    let mut runner = SuiteRunner::new(transport, config.suite_settings());

    let names = names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
    let selected = scenarios::select(&names).expect("known scenarios");
    let report = runner.run_all(&selected).await.expect("suite set-up");
    assert!(report.is_success(), "{}", report.render_text());
}

macro_rules! live_scenarios {
    ($($name:ident),+ $(,)?) => {
        $(
            #[tokio::test]
            #[ignore = "requires a live Slack workspace and SLACK_* environment"]
            async fn $name() {
                run_live(&[stringify!($name)]).await;
            }
        )+
    };
}

live_scenarios!(
    non_response,
    help_shortcut,
    help_longcut,
    run_command_on_localhost,
    run_exact_command_on_localhost,
    run_exact_command_on_multiple_hosts,
    run_command_on_default_hosts,
    run_command_with_regex_and_default_parameter,
    execute_command_with_regex_and_default_parameter,
    run_command_with_extra_parameter,
    weird_run_remote_command_with_parameter,
    weird_run_remote_command_with_ssh,
    weird_omg_just_run_command,
    custom_ack,
    disabled_ack,
    disabled_ack_with_bad_command,
    alias_with_custom_result_format,
    alias_with_custom_result_format_and_multiple_hosts,
    alias_with_disabled_result,
    attachment_and_plaintext_backup,
    fields_parameter,
    jinja_input_parameters,
);

#[tokio::test]
#[ignore = "requires a live Slack workspace and SLACK_* environment"]
async fn integration_full_catalog_in_one_session() {
    run_live(&[]).await;
}

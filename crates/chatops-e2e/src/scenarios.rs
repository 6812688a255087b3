//! Catalogue of chat commands and the replies the bot must produce for them.

use chatops_slack::AttachmentField;

use crate::expect::{ack, bot_reply, execution_result, help_listing, Expectation};

const BOT_USER_PLACEHOLDER: &str = "{bot_user}";

const ECHO_DEFAULT_HOSTS: &str = "echo ChatOps run command on default hosts";

const CUSTOM_ACK_TEXT: &str = "Running the command(s) for you";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitProfile {
    /// Quick replies and silence checks.
    Short,
    /// Commands that wait for an execution to finish.
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    /// Message text; `{bot_user}` is replaced with the bot's username.
    pub command: String,
    pub link_names: bool,
    pub wait: WaitProfile,
    /// Polling stops early once this many messages arrived.
    pub stop_at: usize,
    pub expected_count: usize,
    /// Wait half the short budget after polling and drain once more, so a
    /// reply that should never come has a last chance to show up. The late
    /// drain is deliberate: what it picks up counts against `expected_count`.
    pub settle: bool,
    pub messages: Vec<Vec<Expectation>>,
}

impl Scenario {
    fn new(name: &'static str, command: &str, wait: WaitProfile) -> Self {
        Self {
            name,
            command: command.to_string(),
            link_names: false,
            wait,
            stop_at: 0,
            expected_count: 0,
            settle: false,
            messages: Vec::new(),
        }
    }

    fn expecting(mut self, messages: Vec<Vec<Expectation>>) -> Self {
        self.expected_count = messages.len();
        self.stop_at = messages.len();
        self.messages = messages;
        self
    }

    fn stopping_at(mut self, stop_at: usize) -> Self {
        self.stop_at = stop_at;
        self
    }

    pub fn render_command(&self, bot_username: &str) -> String {
        self.command.replace(BOT_USER_PLACEHOLDER, bot_username)
    }
}

fn remote_run(name: &'static str, command: &str) -> Scenario {
    Scenario::new(name, command, WaitProfile::Long)
        .expecting(vec![ack(), execution_result("core.remote", "succeeded")])
}

fn custom_format_body(command: &str, hosts: &[&str], output: &str) -> String {
    let noun = if hosts.len() == 1 { "host" } else { "hosts" };
    let mut body = format!(
        "Ran command `{command}` on `{}` {noun}.\n\nDetails are as follows:\n",
        hosts.len()
    );
    for host in hosts {
        body.push_str(&format!(
            "Host: `{host}`\n    ---&gt; stdout: {output}\n    ---&gt; stderr: \n"
        ));
    }
    body
}

fn with(mut base: Vec<Expectation>, extra: Vec<Expectation>) -> Vec<Expectation> {
    base.extend(extra);
    base
}

/// Every scenario, in the order the suite runs them.
pub fn catalog() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "non_response",
            "This message should not prompt a response from the bot",
            WaitProfile::Short,
        )
        .stopping_at(2),
        Scenario::new("help_shortcut", "!help", WaitProfile::Short)
            .expecting(vec![help_listing()]),
        Scenario {
            link_names: true,
            ..Scenario::new("help_longcut", "@{bot_user}help", WaitProfile::Short)
                .expecting(vec![help_listing()])
        },
        remote_run("run_command_on_localhost", "!run date on localhost"),
        remote_run(
            "run_exact_command_on_localhost",
            "!run \"echo ChatOps run exact command on localhost\" on localhost",
        ),
        remote_run(
            "run_exact_command_on_multiple_hosts",
            "!run \"echo ChatOps run exact command on multiple hosts\" on localhost,127.0.0.1",
        ),
        remote_run(
            "run_command_on_default_hosts",
            &format!("!default run \"{ECHO_DEFAULT_HOSTS}\""),
        ),
        remote_run(
            "run_command_with_regex_and_default_parameter",
            &format!("!regex run \"{ECHO_DEFAULT_HOSTS}\"."),
        ),
        remote_run(
            "execute_command_with_regex_and_default_parameter",
            &format!("!regex execute \"{ECHO_DEFAULT_HOSTS}\"!"),
        ),
        remote_run(
            "run_command_with_extra_parameter",
            &format!("!extra run \"{ECHO_DEFAULT_HOSTS}\" on localhost timeout=120"),
        ),
        remote_run(
            "weird_run_remote_command_with_parameter",
            &format!("!weird run remote command \"{ECHO_DEFAULT_HOSTS}\" on localhost"),
        ),
        remote_run(
            "weird_run_remote_command_with_ssh",
            &format!("!weird ssh to hosts localhost and run command \"{ECHO_DEFAULT_HOSTS}\""),
        ),
        remote_run(
            "weird_omg_just_run_command",
            &format!(
                "!weird OMG st2 just run this command \"{ECHO_DEFAULT_HOSTS}\" on ma boxes localhost already"
            ),
        ),
        Scenario::new(
            "custom_ack",
            &format!("!custom-ack run \"{ECHO_DEFAULT_HOSTS}\" on localhost"),
            WaitProfile::Long,
        )
        .expecting(vec![vec![
            Expectation::MessageType("message".to_string()),
            Expectation::FromBot,
            Expectation::TextEquals(CUSTOM_ACK_TEXT.to_string()),
        ]]),
        Scenario::new(
            "disabled_ack",
            &format!("!disabled-custom-ack run \"{ECHO_DEFAULT_HOSTS}\" on localhost"),
            WaitProfile::Long,
        )
        .expecting(vec![execution_result("core.remote", "succeeded")]),
        Scenario::new(
            "disabled_ack_with_bad_command",
            "!disabled-custom-ack run \"echof ChatOps run command on default hosts\" on localhost",
            WaitProfile::Long,
        )
        .expecting(vec![with(
            execution_result("core.remote", "failed"),
            vec![
                Expectation::AttachmentTextMatches(
                    r"stderr\s*:\s*bash: echof: command not found".to_string(),
                ),
                Expectation::AttachmentTextMatches(r"return_code\s*:\s*\d+".to_string()),
            ],
        )]),
        Scenario::new(
            "alias_with_custom_result_format",
            "!custom-format run \"echo ChatOps run command on single host\" on localhost",
            WaitProfile::Long,
        )
        .expecting(vec![
            ack(),
            with(
                bot_reply(),
                vec![
                    Expectation::PretextMatches("<@{userid}>".to_string()),
                    Expectation::FallbackEqualsText,
                    Expectation::AttachmentTextEquals(custom_format_body(
                        "echo ChatOps run command on single host",
                        &["localhost"],
                        "ChatOps run command on single host",
                    )),
                ],
            ),
        ]),
        Scenario::new(
            "alias_with_custom_result_format_and_multiple_hosts",
            "!custom-format run \"echo ChatOps run command on multiple hosts\" on localhost,127.0.0.1",
            WaitProfile::Long,
        )
        .expecting(vec![
            ack(),
            with(
                bot_reply(),
                vec![
                    Expectation::PretextMatches("<@{userid}>".to_string()),
                    Expectation::FallbackEqualsText,
                    Expectation::AttachmentTextEquals(custom_format_body(
                        "echo ChatOps run command on multiple hosts",
                        &["127.0.0.1", "localhost"],
                        "ChatOps run command on multiple hosts",
                    )),
                ],
            ),
        ]),
        Scenario {
            settle: true,
            ..Scenario::new(
                "alias_with_disabled_result",
                &format!("!disabled-result run \"{ECHO_DEFAULT_HOSTS}\" on localhost"),
                WaitProfile::Long,
            )
            .expecting(vec![ack()])
            .stopping_at(2)
        },
        Scenario::new(
            "attachment_and_plaintext_backup",
            "!plaintext-and-attachment run \"echo ChatOps run exact command with custom result format with plaintext and attachment\" on localhost",
            WaitProfile::Long,
        )
        .expecting(vec![
            ack(),
            with(
                bot_reply(),
                vec![
                    Expectation::PretextEquals("<@{userid}>: action completed! ".to_string()),
                    Expectation::FallbackEqualsText,
                ],
            ),
        ]),
        Scenario::new("fields_parameter", "!kitten pic", WaitProfile::Long).expecting(vec![
            ack(),
            with(
                bot_reply(),
                vec![
                    Expectation::PretextEquals("<@{userid}>: your kittens are here! ".to_string()),
                    Expectation::FallbackEqualsText,
                    Expectation::AttachmentTextEquals(" Regards from the Box Kingdom.".to_string()),
                    Expectation::FieldsEqual(vec![
                        AttachmentField::new("Kitten headcount", "Eight.", true),
                        AttachmentField::new("Number of boxes", "A bunch", true),
                    ]),
                    Expectation::ImageUrlEquals("http://i.imgur.com/Gb9kAYK.jpg".to_string()),
                    Expectation::ColorEquals("00AA00".to_string()),
                ],
            ),
        ]),
        Scenario::new(
            "jinja_input_parameters",
            "!say Hello in #88CCEE",
            WaitProfile::Long,
        )
        .expecting(vec![
            ack(),
            with(
                execution_result("core.noop", "succeeded"),
                vec![
                    Expectation::PretextEquals("<@{userid}>: ".to_string()),
                    Expectation::FallbackEqualsText,
                    Expectation::ColorEquals("88CCEE".to_string()),
                ],
            ),
        ]),
    ]
}

pub fn find(name: &str) -> Option<Scenario> {
    catalog()
        .into_iter()
        .find(|scenario| scenario.name == name)
}

/// Resolves `names` against the catalogue, preserving catalogue order.
/// An empty selection means every scenario.
pub fn select(names: &[String]) -> Result<Vec<Scenario>, String> {
    let all = catalog();
    if names.is_empty() {
        return Ok(all);
    }
    if let Some(unknown) = names
        .iter()
        .find(|name| !all.iter().any(|scenario| scenario.name == name.as_str()))
    {
        return Err(format!("unknown scenario '{unknown}'"));
    }
    Ok(all
        .into_iter()
        .filter(|scenario| names.iter().any(|name| name == scenario.name))
        .collect())
}

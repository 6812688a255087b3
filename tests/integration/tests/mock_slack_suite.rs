//! Runs the suite runner end to end against a mocked Slack: httpmock serves
//! the Web API and a local websocket server plays the RTM feed.

use std::time::Duration;

use chatops_e2e::{
    scenarios, ChatTransport, EventSource, OutcomeStatus, SlackTransport, SuiteRunner,
    SuiteSettings,
};
use chatops_slack::SlackApiClient;
use futures_util::SinkExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

const REPLY_DELAY: Duration = Duration::from_millis(100);

/// What the fake RTM endpoint does on one connection.
#[derive(Clone)]
enum RtmScript {
    /// `hello`, then the replies after a short delay so they land after the
    /// runner posted its command; the socket then stays open.
    Reply(Vec<Value>),
    /// `hello`, then the socket is dropped without a close handshake.
    HangUp,
}

async fn serve_rtm(replies: Vec<Value>) -> (String, JoinHandle<()>) {
    serve_rtm_scripts(vec![RtmScript::Reply(replies)]).await
}

/// Connection `n` follows `scripts[n]`; later connections repeat the last one.
async fn serve_rtm_scripts(scripts: Vec<RtmScript>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let mut connection = 0_usize;
        while let Ok((socket, _)) = listener.accept().await {
            let script = scripts
                .get(connection)
                .or_else(|| scripts.last())
                .cloned()
                .expect("at least one script");
            connection += 1;
            tokio::spawn(async move {
                let Ok(mut websocket) = accept_async(socket).await else {
                    return;
                };
                let hello = json!({"type": "hello"}).to_string();
                if websocket.send(WsMessage::Text(hello.into())).await.is_err() {
                    return;
                }
                let replies = match script {
                    RtmScript::HangUp => return,
                    RtmScript::Reply(replies) => replies,
                };
                tokio::time::sleep(REPLY_DELAY).await;
                for reply in replies {
                    if websocket
                        .send(WsMessage::Text(reply.to_string().into()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            });
        }
    });
    (format!("ws://{address}"), handle)
}

fn mock_web_api(server: &MockServer, rtm_url: &str) {
    server.mock(|when, then| {
        when.method(GET).path("/users.list");
        then.status(200).json_body(json!({
            "ok": true,
            "members": [
                {"id": "UBOT", "name": "stanley", "real_name": "Stanley"},
                {"id": "UTESTER", "name": "e2e", "real_name": "ChatOps Tester"}
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rtm.connect");
        then.status(200).json_body(json!({
            "ok": true,
            "url": rtm_url,
            "self": {"id": "UTESTER"}
        }));
    });
}

fn settings() -> SuiteSettings {
    SuiteSettings {
        channel: "C1".to_string(),
        bot_username: "stanley".to_string(),
        user_username: "ChatOps Tester".to_string(),
        wait_ticks: 20,
        dont_wait_ticks: 20,
        tick: Duration::from_millis(25),
    }
}

fn transport(server: &MockServer) -> SlackTransport {
    let client =
        SlackApiClient::new(&server.base_url(), "xoxp-test", 3_000, 2, 5).expect("client");
    SlackTransport::new(client)
}

fn runner(server: &MockServer) -> SuiteRunner<SlackTransport> {
    SuiteRunner::new(transport(server), settings())
}

#[tokio::test]
async fn integration_help_shortcut_passes_against_mocked_slack() {
    let (rtm_url, rtm_server) = serve_rtm(vec![
        json!({"type": "user_typing", "user": "UOTHER"}),
        json!({"type": "message", "user": "UTESTER", "text": "!help"}),
        json!({
            "type": "message",
            "user": "UBOT",
            "text": "!help - Displays all of the help commands that this bot knows about.\n!run - run a command"
        }),
    ])
    .await;
    let server = MockServer::start();
    mock_web_api(&server, &rtm_url);
    let banners = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("=====");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });
    let command = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"text\":\"!help\"")
            .body_includes("\"as_user\":true");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.1"}));
    });

    let mut runner = runner(&server);
    let selected = vec![scenarios::find("help_shortcut").expect("scenario")];
    let report = runner.run_all(&selected).await.expect("report");

    assert!(report.is_success(), "{}", report.render_text());
    assert_eq!(report.outcomes[0].messages_observed, 1);
    assert_eq!(runner.user_id(), Some("UTESTER"));
    banners.assert_hits(2);
    command.assert_hits(1);
    rtm_server.abort();
}

#[tokio::test]
async fn integration_custom_ack_mismatch_is_reported_as_failure() {
    let (rtm_url, rtm_server) = serve_rtm(vec![json!({
        "type": "message",
        "bot_id": "B1",
        "text": "details available at https://st2/#/history/5a8f"
    })])
    .await;
    let server = MockServer::start();
    mock_web_api(&server, &rtm_url);
    server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let mut runner = runner(&server);
    let scenario = scenarios::find("custom_ack").expect("scenario");
    let outcome = runner.run_scenario(&scenario).await;

    match outcome.status {
        OutcomeStatus::Failed { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].message_index, Some(0));
            assert!(failures[0].detail.contains("details available at"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    rtm_server.abort();
}

#[tokio::test]
async fn regression_unknown_test_user_aborts_suite_setup() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/users.list");
        then.status(200)
            .json_body(json!({"ok": true, "members": [{"id": "U1", "real_name": "Someone"}]}));
    });
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let mut runner = runner(&server);
    let error = runner
        .run_all(&scenarios::catalog())
        .await
        .expect_err("setup should fail");
    let rendered = format!("{error:#}");
    assert!(rendered.contains("suite set-up failed"));
    assert!(rendered.contains("ChatOps Tester"));
    post.assert_hits(0);
}

#[tokio::test]
async fn regression_silence_check_errors_when_rtm_feed_dies() {
    let (rtm_url, rtm_server) = serve_rtm_scripts(vec![RtmScript::HangUp]).await;
    let server = MockServer::start();
    mock_web_api(&server, &rtm_url);
    server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let mut runner = runner(&server);
    let outcome = runner
        .run_scenario(&scenarios::find("non_response").expect("scenario"))
        .await;

    match outcome.status {
        OutcomeStatus::Errored { message } => {
            assert!(message.contains("rtm feed closed"), "{message}");
        }
        other => panic!("dead feed must not look like silence, got {other:?}"),
    }
    rtm_server.abort();
}

#[tokio::test]
async fn integration_reconnect_discards_events_from_previous_socket() {
    let (rtm_url, rtm_server) = serve_rtm_scripts(vec![
        RtmScript::Reply(vec![json!({"type": "message", "bot_id": "B1", "text": "stale"})]),
        RtmScript::Reply(vec![json!({"type": "message", "bot_id": "B1", "text": "fresh"})]),
    ])
    .await;
    let server = MockServer::start();
    mock_web_api(&server, &rtm_url);

    let mut transport = transport(&server);
    transport.reconnect_feed().await.expect("first connect");
    transport.reconnect_feed().await.expect("second connect");
    tokio::time::sleep(REPLY_DELAY * 3).await;

    let texts = transport
        .drain_events()
        .await
        .expect("drain")
        .into_iter()
        .filter_map(|event| event.text)
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["fresh".to_string()]);
    rtm_server.abort();
}

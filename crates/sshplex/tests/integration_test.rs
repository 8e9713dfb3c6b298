//! Integration tests for the SSHplex MCP server, driven by a scripted tmux.

use rmcp::{handler::server::wrapper::Parameters, model::CallToolResult, ServerHandler};
use serde_json::Value;

use sshplex::{
    AttachParams, BroadcastParams, ConnectParams, EmptyParams, SendParams, SshplexMcpServer,
};
use sshplex_core::{HostRecord, PlexConfig};
use sshplex_mux::testing::{DriverCall, DriverOp, ScriptedDriver};
use sshplex_mux::MultiplexerDriver;

fn server_with(config: PlexConfig) -> (SshplexMcpServer, ScriptedDriver) {
    let driver = ScriptedDriver::new();
    let shared = driver.clone();
    let server = SshplexMcpServer::with_driver_factory(config, move || {
        Box::new(shared.clone()) as Box<dyn MultiplexerDriver>
    });
    (server, driver)
}

fn server() -> (SshplexMcpServer, ScriptedDriver) {
    let mut config = PlexConfig::default();
    config.tmux.max_panes_per_window = 2;
    config.tmux.start_directory = "/tmp".to_string();
    server_with(config)
}

fn body(result: &CallToolResult) -> Value {
    let json = serde_json::to_value(result).unwrap();
    let text = json["content"][0]["text"].as_str().unwrap().to_string();
    serde_json::from_str(&text).unwrap()
}

fn connect_params(names: &[&str], session: Option<&str>) -> ConnectParams {
    ConnectParams {
        hosts: names.iter().map(|n| HostRecord::new(*n)).collect(),
        session_name: session.map(str::to_string),
        username: Some("ops".to_string()),
        key_path: None,
        port: None,
        windows: false,
        broadcast: Some(false),
    }
}

#[tokio::test]
async fn test_connect_places_hosts() {
    let (server, driver) = server();

    let result = server
        .sshplex_connect(Parameters(connect_params(&["a", "b", "c"], Some("ops"))))
        .await
        .unwrap();
    let response = body(&result);

    assert_eq!(response["session_name"], "ops");
    assert_eq!(response["message"], "3/3 hosts connected");
    assert_eq!(response["connected"].as_array().unwrap().len(), 3);
    assert_eq!(response["connected"][2]["window"], 1);
    assert!(driver.session_exists("ops"));

    let typed: Vec<String> = driver
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            DriverCall::SendKeys { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(typed, vec!["ssh -p 22 ops@a", "ssh -p 22 ops@b", "ssh -p 22 ops@c"]);
}

#[tokio::test]
async fn test_connect_reports_failed_host() {
    let (server, driver) = server();
    driver.fail_next(DriverOp::SplitWindow, 2, "no space for new pane");
    driver.fail_next(DriverOp::NewWindow, 1, "server exited");

    let result = server
        .sshplex_connect(Parameters(connect_params(&["a", "b"], Some("ops"))))
        .await
        .unwrap();
    let response = body(&result);

    assert_eq!(response["message"], "1/2 hosts connected");
    assert_eq!(response["failed"][0]["host"], "b");
}

#[tokio::test]
async fn test_connect_rejects_bad_input() {
    let (server, _driver) = server();

    let err = server
        .sshplex_connect(Parameters(connect_params(&[], None)))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);

    let err = server
        .sshplex_connect(Parameters(connect_params(&["a"], Some("bad:name"))))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
}

#[tokio::test]
async fn test_second_connect_reuses_session() {
    let (server, driver) = server();

    server
        .sshplex_connect(Parameters(connect_params(&["a"], Some("ops"))))
        .await
        .unwrap();
    let result = server
        .sshplex_connect(Parameters(connect_params(&["b"], None)))
        .await
        .unwrap();

    assert_eq!(body(&result)["session_name"], "ops");
    assert_eq!(driver.windows_of("ops").len(), 1);

    let info = body(
        &server
            .sshplex_session_info(Parameters(EmptyParams {}))
            .await
            .unwrap(),
    );
    assert_eq!(info["windows"][0]["hosts"], serde_json::json!(["a", "b"]));
}

#[tokio::test]
async fn test_tools_require_session() {
    let (server, _driver) = server();

    let err = server
        .sshplex_session_info(Parameters(EmptyParams {}))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);

    let err = server
        .sshplex_broadcast(Parameters(BroadcastParams {
            action: "enable".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);

    let err = server
        .sshplex_close(Parameters(EmptyParams {}))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
}

#[tokio::test]
async fn test_broadcast_flow() {
    let (server, _driver) = server();
    server
        .sshplex_connect(Parameters(connect_params(&["a", "b", "c"], Some("ops"))))
        .await
        .unwrap();

    let broadcast = |action: &str| BroadcastParams {
        action: action.to_string(),
    };

    let enabled = body(
        &server
            .sshplex_broadcast(Parameters(broadcast("enable")))
            .await
            .unwrap(),
    );
    assert_eq!(enabled["changed"], true);
    // window 1 holds a single pane and is not synchronized
    assert_eq!(
        enabled["windows"],
        serde_json::json!([{"window": 0, "enabled": true}])
    );

    let toggled = body(
        &server
            .sshplex_broadcast(Parameters(broadcast("toggle")))
            .await
            .unwrap(),
    );
    assert_eq!(toggled["windows"][0]["enabled"], false);

    let status = body(
        &server
            .sshplex_broadcast(Parameters(broadcast("status")))
            .await
            .unwrap(),
    );
    assert_eq!(status["changed"], false);

    let err = server
        .sshplex_broadcast(Parameters(broadcast("sideways")))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
}

#[tokio::test]
async fn test_send_command() {
    let (server, _driver) = server();
    server
        .sshplex_connect(Parameters(connect_params(&["a", "b", "c"], Some("ops"))))
        .await
        .unwrap();

    let all = body(
        &server
            .sshplex_send(Parameters(SendParams {
                command: "uptime".to_string(),
                host: None,
            }))
            .await
            .unwrap(),
    );
    assert_eq!(all["sent"], 3);

    let one = body(
        &server
            .sshplex_send(Parameters(SendParams {
                command: "uptime".to_string(),
                host: Some("b".to_string()),
            }))
            .await
            .unwrap(),
    );
    assert_eq!(one["sent"], 1);

    let err = server
        .sshplex_send(Parameters(SendParams {
            command: "uptime".to_string(),
            host: Some("zz".to_string()),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
}

#[tokio::test]
async fn test_attach_without_terminal() {
    let (server, _driver) = server();
    server
        .sshplex_connect(Parameters(connect_params(&["a"], Some("ops"))))
        .await
        .unwrap();

    let response = body(
        &server
            .sshplex_attach(Parameters(AttachParams { auto: Some(false) }))
            .await
            .unwrap(),
    );
    assert_eq!(response["launched"], false);
    assert_eq!(response["command"], "tmux attach-session -t ops");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("tmux attach-session -t ops"));
}

#[tokio::test]
async fn test_close_then_reconnect() {
    let (server, driver) = server();
    server
        .sshplex_connect(Parameters(connect_params(&["a"], Some("ops"))))
        .await
        .unwrap();

    let closed = body(
        &server
            .sshplex_close(Parameters(EmptyParams {}))
            .await
            .unwrap(),
    );
    assert_eq!(closed["message"], "Session 'ops' closed");
    assert!(!driver.session_exists("ops"));

    let result = server
        .sshplex_connect(Parameters(connect_params(&["b"], Some("ops"))))
        .await
        .unwrap();
    assert_eq!(body(&result)["message"], "1/1 hosts connected");
    assert!(driver.session_exists("ops"));
}

#[tokio::test]
async fn test_list_sessions_marks_managed() {
    let driver = ScriptedDriver::new().with_existing_session("other");
    let shared = driver.clone();
    let server = SshplexMcpServer::with_driver_factory(PlexConfig::default(), move || {
        Box::new(shared.clone()) as Box<dyn MultiplexerDriver>
    });

    let before = body(
        &server
            .sshplex_list_sessions(Parameters(EmptyParams {}))
            .await
            .unwrap(),
    );
    assert_eq!(before["count"], 1);
    assert_eq!(before["sessions"][0]["managed"], false);

    server
        .sshplex_connect(Parameters(connect_params(&["a"], Some("ops"))))
        .await
        .unwrap();

    let after = body(
        &server
            .sshplex_list_sessions(Parameters(EmptyParams {}))
            .await
            .unwrap(),
    );
    assert_eq!(after["count"], 2);
    let managed: Vec<&str> = after["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["managed"] == true)
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(managed, vec!["ops"]);
}

#[tokio::test]
async fn test_list_sessions_reports_missing_tmux() {
    let (server, driver) = server();
    driver.fail_next(
        DriverOp::ListSessions,
        1,
        "unable to run tmux: No such file or directory (os error 2)",
    );

    let err = server
        .sshplex_list_sessions(Parameters(EmptyParams {}))
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32603);
    assert!(err.message.contains("unable to run tmux"));
}

#[test]
fn test_server_info() {
    let (server, _driver) = server();
    let info = server.get_info();
    assert!(info.capabilities.tools.is_some());
    assert!(info.instructions.unwrap().contains("sshplex_connect"));
}

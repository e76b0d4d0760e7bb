use ollama4rs::{AgentBuilder, ClientBuilder, ClientConfig, Role, StreamSinks, ToolBuilder};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "llama3.2",
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

async fn calculator_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("And times 2?"))
        .respond_with(reply("10."))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("[TOOL_RESULTS]"))
        .respond_with(reply("2 + 3 is 5."))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "add", "arguments": {"a": 2, "b": 3}}}]
            },
            "done": true
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn agent_keeps_history_across_turns() {
    let server = calculator_server().await;
    let add = ToolBuilder::new()
        .function_name("add")
        .function_description("adds two integers")
        .add_property("a", "integer", "left operand")
        .add_property("b", "integer", "right operand")
        .executor_fn(|args: Value| async move {
            Ok((args["a"].as_i64().unwrap_or_default() + args["b"].as_i64().unwrap_or_default())
                .to_string())
        })
        .build()
        .unwrap();
    let client = ClientConfig::default().base_url(server.uri()).build().unwrap();
    let mut agent = AgentBuilder::default()
        .set_name("Calc")
        .set_model("llama3.2")
        .set_client(client)
        .add_tool(add)
        .build()
        .await
        .unwrap();

    let first = agent.interact("What is 2 + 3?", StreamSinks::default()).await.unwrap();
    assert_eq!(first, "2 + 3 is 5.");
    let roles: Vec<_> = agent.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert!(agent.history()[0].content.contains("named Calc"));
    assert!(agent.history()[0].content.contains("- add: adds two integers"));

    let second = agent.interact("And times 2?", StreamSinks::default()).await.unwrap();
    assert_eq!(second, "10.");
    assert_eq!(agent.history().len(), 7);
    assert_eq!(
        agent.history().iter().filter(|m| m.role == Role::System).count(),
        1
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["tools"][0]["function"]["name"], "add");
    assert_eq!(body["messages"][0]["role"], "system");
    let last: Value = serde_json::from_slice(&requests[2].body).unwrap();
    assert_eq!(last["messages"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn failed_turn_keeps_the_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "out of memory"})))
        .mount(&server)
        .await;

    let mut agent = AgentBuilder::default()
        .set_model("llama3.2")
        .set_base_url(server.uri())
        .build()
        .await
        .unwrap();
    let err = agent.interact("hello", StreamSinks::default()).await.unwrap_err();

    assert!(err.to_string().contains("out of memory"));
    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.history()[1].content, "hello");
}

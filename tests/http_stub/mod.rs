use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// `choices[0].message.content` reply from the chat-completions gateway.
#[allow(dead_code)]
pub fn chat_reply(content: &str) -> StubResponse {
    StubResponse::json(
        200,
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }),
    )
}

/// Forced tool-call reply; `arguments` is sent as a JSON string the way the gateway does.
#[allow(dead_code)]
pub fn chat_tool_call(name: &str, arguments: &Value) -> StubResponse {
    StubResponse::json(
        200,
        serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "type": "function",
                        "function": { "name": name, "arguments": arguments.to_string() }
                    }]
                }
            }]
        }),
    )
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Answers POSTs on fixed paths with canned responses and records what it received.
pub struct HttpStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HttpStub {
    pub fn spawn(routes: Vec<(&'static str, StubResponse)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start http stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let Some((_, response)) = routes
                    .iter()
                    .find(|(route, _)| *route == path)
                    .filter(|_| request.method() == &tiny_http::Method::Post)
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_owned());
                recorded.lock().unwrap().push(RecordedRequest {
                    path: path.clone(),
                    authorization,
                    body: serde_json::from_str(&body).unwrap_or(Value::Null),
                });

                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"application/json"[..],
                )
                .expect("content-type header");
                let _ = request.respond(
                    tiny_http::Response::from_string(response.body.clone())
                        .with_status_code(response.status)
                        .with_header(header),
                );
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Chat-completions gateway answering every request with `response`.
    #[allow(dead_code)]
    pub fn gateway(response: StubResponse) -> Self {
        Self::spawn(vec![("/v1/chat/completions", response)])
    }

    #[allow(dead_code)]
    pub fn gateway_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    #[allow(dead_code)]
    pub fn functions_url(&self) -> String {
        format!("{}/functions/v1", self.base_url)
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

use crate::brief::llm::{CompletionRequest, TextGenerator};
use crate::error::GenerationError;
use std::cell::RefCell;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

type Reply = Box<dyn Fn(&CompletionRequest) -> Result<String, GenerationError>>;

/// Generator double that records every request it receives.
pub struct RecordingGenerator {
    calls: RefCell<Vec<CompletionRequest>>,
    reply: Reply,
}

impl RecordingGenerator {
    pub fn new(
        reply: impl Fn(&CompletionRequest) -> Result<String, GenerationError> + 'static,
    ) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            reply: Box::new(reply),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.prompt.clone()).collect()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.calls.borrow().clone()
    }
}

impl TextGenerator for RecordingGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.calls.borrow_mut().push(request.clone());
        (self.reply)(request)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

type Route = Box<dyn Fn(&RecordedRequest) -> (u16, String) + Send>;

/// Local HTTP server answering every request through `route`.
pub struct StubServer {
    addr: std::net::SocketAddr,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
    server: Arc<tiny_http::Server>,
}

impl StubServer {
    pub fn start(route: impl Fn(&RecordedRequest) -> (u16, String) + Send + 'static) -> Self {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").expect("bind stub server"));
        let addr = server.server_addr().to_ip().expect("ip listener");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let route: Route = Box::new(route);

        let worker = Arc::clone(&server);
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for mut request in worker.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = RecordedRequest {
                    method: request.method().as_str().to_string(),
                    url: request.url().to_string(),
                    body,
                    authorization: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string()),
                };
                let (status, payload) = route(&recorded);
                log.lock().expect("stub log").push(recorded);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("header");
                let response = tiny_http::Response::from_string(payload)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self { addr, seen, server }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().expect("stub log").clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

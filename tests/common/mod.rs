//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use tokio::task::JoinHandle;
use url::Url;

use http_dispatcher::config::DispatcherConfig;
use http_dispatcher::dispatch::ContextError;
use http_dispatcher::http::{HttpContext, HttpServer, ServerError};
use http_dispatcher::net::Listener;
use http_dispatcher::{Arguments, Dispatcher, Endpoint, HandlerError, HandlerResult, Param, RequestContext, Responder, Shutdown};

/// In-memory request context recording what was sent.
#[derive(Debug)]
pub struct TestContext {
    pub method: Method,
    pub url: String,
    pub status: Option<StatusCode>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Make every `send` fail, as if the client had gone away.
    pub fail_writes: bool,
}

impl TestContext {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            url: format!("http://test.local{path}"),
            status: None,
            content_type: None,
            body: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Handler-side helper: 200 with a text body.
    pub fn respond(&mut self, text: &str) -> Result<(), ContextError> {
        self.send(StatusCode::OK, "text/plain", text.as_bytes())
    }
}

impl RequestContext for TestContext {
    fn method(&self) -> &Method {
        &self.method
    }

    fn url(&self) -> Result<Url, ContextError> {
        Url::parse(&self.url).map_err(|source| ContextError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }

    fn send(&mut self, status: StatusCode, content_type: &str, body: &[u8]) -> Result<(), ContextError> {
        if self.fail_writes {
            return Err(ContextError::Write("connection closed".to_string()));
        }
        self.status = Some(status);
        self.content_type = Some(content_type.to_string());
        self.body = body.to_vec();
        Ok(())
    }
}

pub const NOT_FOUND_BODY: &str = r#"{"status":"error","error":"not found"}"#;
pub const EXCEPTION_BODY: &str = r#"{"status":"error","error":"exception thrown","errorType":"EXCEPTION"}"#;

/// `GET /sum/{left}/{right}` over two ints.
pub struct SumResponder;

impl SumResponder {
    fn sum(&self, ctx: &mut TestContext, args: &Arguments) -> HandlerResult {
        let left: i32 = args.get("left")?;
        let right: i32 = args.get("right")?;
        ctx.respond(&format!("{left}+{right}={}", left + right))?;
        Ok(())
    }
}

impl Responder<TestContext> for SumResponder {
    fn endpoints(&self) -> Vec<Endpoint<Self, TestContext>> {
        vec![Endpoint::get("/sum/{left}/{right}", Self::sum)
            .named("sum")
            .param(Param::int("left"))
            .param(Param::int("right"))]
    }
}

/// Answers every method on one path with a fixed label.
pub struct Labelled {
    pub label: &'static str,
    pub path: &'static str,
    pub prefixes: Vec<String>,
}

impl Labelled {
    pub fn new(label: &'static str, path: &'static str) -> Self {
        Self {
            label,
            path,
            prefixes: vec![String::new()],
        }
    }
}

impl Responder<TestContext> for Labelled {
    fn name(&self) -> &str {
        self.label
    }

    fn prefixes(&self) -> Vec<String> {
        self.prefixes.clone()
    }

    fn endpoints(&self) -> Vec<Endpoint<Self, TestContext>> {
        vec![Endpoint::new(self.path, |me: &Self, ctx: &mut TestContext, _: &Arguments| {
            ctx.respond(me.label)?;
            Ok(())
        })]
    }
}

/// Fails on `/fail` and panics on `/panic`.
pub struct FailingResponder;

impl Responder<TestContext> for FailingResponder {
    fn endpoints(&self) -> Vec<Endpoint<Self, TestContext>> {
        vec![
            Endpoint::new("/fail", |_: &Self, _: &mut TestContext, _: &Arguments| {
                Err(HandlerError::msg("nope"))
            }),
            Endpoint::new("/panic", |_: &Self, _: &mut TestContext, _: &Arguments| -> HandlerResult {
                panic!("handler exploded")
            }),
        ]
    }
}

pub fn dispatcher_with<R: Responder<TestContext>>(responder: R) -> Dispatcher<TestContext> {
    let dispatcher = Dispatcher::<TestContext>::new();
    dispatcher.add_responder(Arc::new(responder)).unwrap();
    dispatcher
}

/// An `HttpServer` running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to drain and stop.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub fn test_config() -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.shutdown.drain_timeout_secs = 2;
    config
}

pub async fn start_server(dispatcher: Arc<Dispatcher<HttpContext>>, config: DispatcherConfig) -> TestServer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(HttpServer::new(config, dispatcher).run(listener, shutdown.subscribe()));
    TestServer { addr, shutdown, handle }
}

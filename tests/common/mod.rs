//! Shared utilities for daemon integration tests.

#![allow(dead_code)]

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use threadsd::config::{load_config_from, ResolvedConfig};
use threadsd::lifecycle::{Daemon, InterruptSource};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Config with every listener on an ephemeral loopback port and the
/// embedded store inside `repo`.
pub fn test_config(repo: &TempDir, extra: &[&str]) -> ResolvedConfig {
    let mut args = vec![
        "threadsd".to_string(),
        "--hostAddr=/ip4/127.0.0.1/tcp/0".to_string(),
        "--apiAddr=/ip4/127.0.0.1/tcp/0".to_string(),
        "--apiProxyAddr=/ip4/127.0.0.1/tcp/0".to_string(),
        "--gatewayAddr=127.0.0.1:0".to_string(),
        format!("--badgerRepo={}", repo.path().display()),
    ];
    args.extend(extra.iter().map(|a| a.to_string()));
    load_config_from(args).unwrap()
}

pub async fn start_daemon(repo: &TempDir, extra: &[&str]) -> Daemon {
    Daemon::start(&test_config(repo, extra)).await.unwrap()
}

pub async fn is_reachable(addr: SocketAddr) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_secs(2), TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Interrupts delivered by the test instead of the OS.
pub struct TestInterrupts {
    rx: mpsc::UnboundedReceiver<()>,
}

pub fn interrupts() -> (mpsc::UnboundedSender<()>, TestInterrupts) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, TestInterrupts { rx })
}

#[async_trait]
impl InterruptSource for TestInterrupts {
    async fn interrupted(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// Wrap an encoded message in a gRPC data frame.
pub fn grpc_frame(message: &impl prost::Message) -> Vec<u8> {
    let payload = message.encode_to_vec();
    let mut frame = Vec::with_capacity(5 + payload.len());
    frame.push(0x00);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Split a gRPC-web body into its data payloads and its trailer block.
pub fn split_grpc_web_body(body: &[u8]) -> (Vec<Vec<u8>>, String) {
    let mut data = Vec::new();
    let mut trailers = String::new();
    let mut rest = body;
    while rest.len() >= 5 {
        let flag = rest[0];
        let len = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
        let payload = &rest[5..5 + len];
        if flag & 0x80 != 0 {
            trailers.push_str(&String::from_utf8_lossy(payload));
        } else {
            data.push(payload.to_vec());
        }
        rest = &rest[5 + len..];
    }
    (data, trailers)
}

/// Records `<step>:start` / `<step>:end` for every shutdown step event.
#[derive(Clone, Default)]
pub struct StepRecorder {
    steps: Arc<Mutex<Vec<String>>>,
}

impl StepRecorder {
    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct StepFields {
    step: Option<String>,
    message: Option<String>,
}

impl Visit for StepFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "step" {
            self.step = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            "step" => self.step = Some(format!("{value:?}").trim_matches('"').to_string()),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for StepRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = StepFields::default();
        event.record(&mut fields);
        let (Some(step), Some(message)) = (fields.step, fields.message) else {
            return;
        };
        let phase = match message.as_str() {
            "Shutting down" => "start",
            "Shutdown step complete" => "end",
            _ => return,
        };
        self.steps.lock().unwrap().push(format!("{step}:{phase}"));
    }
}

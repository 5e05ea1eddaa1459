#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sharecp_client::backend::{CommandOutput, CommandRunner};
use sharecp_client::ClientConfig;
use sharecp_core::{Credentials, Secret, ServerAddr, ShareResult};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn config(server: ServerAddr, share: &str) -> ClientConfig {
    ClientConfig::new(server, Credentials::new("alice", "pw"), share)
        .with_connect_timeout(Duration::from_secs(2))
}

pub fn memory_config(share: &str) -> ClientConfig {
    config(ServerAddr::new("nas", 445).expect("valid address"), share)
}

/// One recorded invocation of the protocol tool.
#[derive(Debug, Clone)]
pub struct Call {
    pub args: Vec<String>,
    pub password: Option<String>,
}

impl Call {
    /// The `-c` command, if any.
    pub fn command(&self) -> Option<&str> {
        let at = self.args.iter().position(|a| a == "-c")?;
        self.args.get(at + 1).map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    responses: VecDeque<CommandOutput>,
    uploads: Vec<(String, Vec<u8>)>,
}

/// Fake `smbclient`: records every call and answers from a queue, succeeding
/// with empty output once the queue runs dry. `put` commands capture the
/// spooled bytes so uploads can be checked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, output: CommandOutput) -> &Self {
        self.script.lock().unwrap().responses.push_back(output);
        self
    }

    pub fn ok(&self) -> &Self {
        self.respond(CommandOutput {
            success: true,
            ..Default::default()
        })
    }

    pub fn fail(&self, stderr: &str) -> &Self {
        self.respond(CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.script.lock().unwrap().uploads.clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[String], password: Option<&Secret>) -> ShareResult<CommandOutput> {
        let call = Call {
            args: args.to_vec(),
            password: password.map(|p| p.expose().to_string()),
        };
        let mut script = self.script.lock().unwrap();
        let output = script.responses.pop_front().unwrap_or(CommandOutput {
            success: true,
            ..Default::default()
        });

        if output.success {
            if let Some(put) = call.command().filter(|c| c.starts_with("put ")) {
                // put "<local>" "<remote>"
                let parts: Vec<&str> = put.split('"').collect();
                let bytes = std::fs::read(parts[1]).expect("spool file readable");
                script.uploads.push((parts[3].to_string(), bytes));
            }
        }
        script.calls.push(call);
        Ok(output)
    }
}

/// A local TCP endpoint that accepts one connection and reports when the
/// client side closes it.
pub struct Endpoint {
    pub addr: ServerAddr,
    pub closed: oneshot::Receiver<()>,
}

pub async fn endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 64];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            let _ = tx.send(());
        }
    });
    Endpoint {
        addr: ServerAddr::new("127.0.0.1", port).expect("valid address"),
        closed: rx,
    }
}

/// Server that drops its accepted socket once `hang_up` fires.
pub struct Hangup {
    pub addr: ServerAddr,
    pub hang_up: oneshot::Sender<()>,
}

pub async fn hangup_endpoint() -> Hangup {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            let _ = rx.await;
            drop(socket);
        }
    });
    Hangup {
        addr: ServerAddr::new("127.0.0.1", port).expect("valid address"),
        hang_up: tx,
    }
}

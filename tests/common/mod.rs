//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use bundle_server::build::{CompileError, CompileRequest, Compiler};
use bundle_server::config::ServerConfig;
use bundle_server::http::HttpServer;
use bundle_server::lifecycle::Shutdown;

/// In-process stand-in for the bundler.
///
/// Output is a header comment listing the build settings, then the entry source.
#[derive(Default)]
pub struct ScriptedCompiler {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl ScriptedCompiler {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compiler for ScriptedCompiler {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, Result<Bytes, CompileError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, fail) = (self.delay, self.fail);
        async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(CompileError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: format!("{}: SyntaxError", request.entry.display()),
                });
            }
            let source = tokio::fs::read_to_string(&request.entry)
                .await
                .map_err(|e| CompileError::Failed {
                    status: "exit status: 2".to_string(),
                    stderr: e.to_string(),
                })?;
            Ok(Bytes::from(format!(
                "/* transforms={} externals={} */\n{}",
                request.transforms.join(","),
                request.externals.join(","),
                source
            )))
        }
        .boxed()
    }
}

/// A temporary content root.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.content.root = self.root().to_path_buf();
        config
    }
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub updates: mpsc::UnboundedSender<ServerConfig>,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start(config: ServerConfig, compiler: Arc<dyn Compiler>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::with_compiler(config, compiler).unwrap();

        let shutdown = Shutdown::new();
        let (updates, config_updates) = mpsc::unbounded_channel();
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, config_updates, server_shutdown).await;
        });

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();

        Self {
            addr,
            client,
            updates,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

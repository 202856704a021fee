//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, panic recovery)
//! - Dispatch requests to the manifest or static path
//! - Swap in reloaded configuration without dropping requests
//!
//! # Design Decisions
//! - Per-request work reads one immutable `Runtime` snapshot
//! - The build cache outlives reloads so in-flight compiles stay deduplicated
//! - Listener address, request timeout, compiler command and worker count are
//!   fixed at startup

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::build::{BuildCache, BuildOutcome, BuildRequest, BuildSettings, CommandCompiler, Compiler};
use crate::config::ServerConfig;
use crate::descriptor::DescriptorParser;
use crate::http::encoding::Encoding;
use crate::http::request::{header_str, if_modified_since, X_REQUEST_ID};
use crate::http::response::{http_date, ServeError};
use crate::manifest::{load_manifest, ManifestMatcher};
use crate::observability::metrics;
use crate::routing::{ContentRouter, Route};

/// Errors preventing the server from starting or reloading.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid descriptor product: {0}")]
    Descriptor(#[from] regex::Error),

    #[error("invalid descriptor header name '{0}'")]
    Header(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything a request needs that can change on reload.
pub struct Runtime {
    pub config: ServerConfig,
    pub router: ContentRouter,
    pub parser: DescriptorParser,
    pub matcher: ManifestMatcher,
    pub build: BuildSettings,
    descriptor_header: HeaderName,
    vary: HeaderValue,
}

impl Runtime {
    pub fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let descriptor = &config.descriptor;
        let descriptor_header = HeaderName::from_bytes(descriptor.header.as_bytes())
            .map_err(|_| ServerError::Header(descriptor.header.clone()))?;
        let vary = HeaderValue::from_str(&format!("{}, accept-encoding", descriptor_header))
            .map_err(|_| ServerError::Header(descriptor.header.clone()))?;

        Ok(Self {
            router: ContentRouter::new(config.content.root.clone()),
            parser: DescriptorParser::new(&descriptor.product, descriptor.surface_namespace.clone())?,
            matcher: ManifestMatcher::new(descriptor.surface_namespace.clone()),
            build: BuildSettings::from_config(&config),
            descriptor_header,
            vary,
            config,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ArcSwap<Runtime>>,
    pub builds: Arc<BuildCache>,
}

/// HTTP server for manifest-driven bundles.
pub struct HttpServer {
    state: AppState,
    request_timeout: Duration,
}

impl HttpServer {
    /// Create a server that compiles with the configured bundler command.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let compiler = Arc::new(CommandCompiler::from_config(&config.compiler));
        Self::with_compiler(config, compiler)
    }

    /// Create a server with a custom compiler.
    pub fn with_compiler(config: ServerConfig, compiler: Arc<dyn Compiler>) -> Result<Self, ServerError> {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let builds = Arc::new(BuildCache::new(compiler, config.compiler.max_workers));
        let runtime = Arc::new(ArcSwap::from_pointee(Runtime::from_config(config)?));
        Ok(Self {
            state: AppState { runtime, builds },
            request_timeout,
        })
    }

    /// Currently active configuration.
    pub fn config(&self) -> ServerConfig {
        self.state.runtime.load().config.clone()
    }

    /// Replace the runtime configuration; invalid configs are logged and ignored.
    pub fn reload(&self, config: ServerConfig) {
        apply_config(&self.state.runtime, config);
    }

    /// The Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(serve_root))
            .route("/{*path}", get(serve_path))
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(CatchPanicLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = header_str(request.headers(), X_REQUEST_ID).unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs received on `config_updates` replace the runtime; the server
    /// stops gracefully when `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let runtime = Arc::clone(&self.state.runtime);
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&runtime, config);
            }
        });

        let app = self.router();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        reloader.abort();
        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_config(runtime: &ArcSwap<Runtime>, config: ServerConfig) {
    match Runtime::from_config(config) {
        Ok(next) => {
            tracing::info!(root = %next.config.content.root.display(), "Configuration reloaded");
            runtime.store(Arc::new(next));
        }
        Err(e) => tracing::error!(error = %e, "Rejected reloaded configuration"),
    }
}

async fn serve_root(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve(state, "", headers).await
}

async fn serve_path(State(state): State<AppState>, Path(path): Path<String>, headers: HeaderMap) -> Response {
    serve(state, &path, headers).await
}

async fn serve(state: AppState, path: &str, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let runtime = state.runtime.load_full();
    let route = runtime.router.resolve(path).await;
    let kind = route.kind();
    let encoding = Encoding::negotiate(header_str(&headers, header::ACCEPT_ENCODING));

    tracing::debug!(path, route = kind, ?encoding, "Serving");
    let result = match route {
        Route::Manifest { manifest, .. } => serve_manifest(&state, &runtime, &headers, &manifest, encoding).await,
        Route::Static(file) => serve_static(&file, encoding).await,
    };

    let response = result.unwrap_or_else(IntoResponse::into_response);
    metrics::record_request(kind, response.status().as_u16(), start);
    response
}

async fn serve_manifest(
    state: &AppState,
    runtime: &Runtime,
    headers: &HeaderMap,
    manifest_path: &std::path::Path,
    encoding: Encoding,
) -> Result<Response, ServeError> {
    let manifest = load_manifest(manifest_path).await?;
    let descriptor = runtime
        .parser
        .parse(header_str(headers, &runtime.descriptor_header).unwrap_or_default());

    let selection = runtime
        .matcher
        .select(&descriptor, &manifest.configs)
        .ok_or_else(|| ServeError::NoMatch {
            manifest: manifest_path.to_path_buf(),
        })?;

    let request = BuildRequest {
        file: runtime.router.root().join(&selection.config.file),
        transforms: selection.config.transforms.clone(),
        bindings: selection.config.bindings.clone(),
        if_modified_since: if_modified_since(headers),
    };
    let outcome = state.builds.fetch(&request, &runtime.build).await?;
    tracing::debug!(
        config = selection.index,
        file = %request.file.display(),
        outcome = outcome.label(),
        "Manifest config selected"
    );

    let modified = outcome.modified();
    let (status, body) = match outcome {
        BuildOutcome::NotModified { .. } => (StatusCode::NOT_MODIFIED, None),
        BuildOutcome::Cached { file, .. } => (StatusCode::OK, Some(encoding.encode_reader(file))),
        BuildOutcome::Compiled(artifact) => (StatusCode::OK, Some(encoding.encode_bytes(artifact.bytes))),
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::LAST_MODIFIED, http_date(modified))
        .header(header::VARY, runtime.vary.clone());
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/javascript");
            if let Some(coding) = encoding.header_value() {
                builder = builder.header(header::CONTENT_ENCODING, coding);
            }
            body
        }
        None => Body::empty(),
    };
    Ok(builder.body(body).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

async fn serve_static(path: &std::path::Path, encoding: Encoding) -> Result<Response, ServeError> {
    let not_found = || ServeError::NotFound(path.to_path_buf());
    let io_error = |source| ServeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(io_error(e)),
    };
    if !file.metadata().await.map_err(io_error)?.is_file() {
        return Err(not_found());
    }

    let mut response = encoding.encode_reader(file).into_response();
    if let Some(coding) = encoding.header_value() {
        response.headers_mut().insert(header::CONTENT_ENCODING, coding);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CompileError;
    use bytes::Bytes;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct EchoCompiler {
        calls: AtomicUsize,
    }

    impl Compiler for EchoCompiler {
        fn describe(&self) -> String {
            "echo".into()
        }

        fn compile(&self, request: crate::build::CompileRequest) -> BoxFuture<'static, Result<Bytes, CompileError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let source = tokio::fs::read(&request.entry).await.map_err(|e| CompileError::Failed {
                    status: "io".into(),
                    stderr: e.to_string(),
                })?;
                Ok(Bytes::from(source))
            }
            .boxed()
        }
    }

    fn server(root: &std::path::Path) -> (HttpServer, Arc<EchoCompiler>) {
        let mut config = ServerConfig::default();
        config.content.root = root.to_path_buf();
        let compiler = Arc::new(EchoCompiler {
            calls: AtomicUsize::new(0),
        });
        (HttpServer::with_compiler(config, compiler.clone()).unwrap(), compiler)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_static_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        let (server, _) = server(dir.path());

        let response = server.router().oneshot(get("/index.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert!(!response.headers().contains_key(header::CONTENT_ENCODING));
        assert_eq!(body(response).await, b"<html/>");

        let response = server.router().oneshot(get("/missing.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server.router().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_manifest_route() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "unused").unwrap();
        std::fs::write(dir.path().join("real.js"), "module.exports = 'real';").unwrap();
        std::fs::write(
            dir.path().join("app.manifest"),
            r#"{ "configs": [ { "version": "2.0.0", "file": "other.js" }, { "file": "real.js" } ] }"#,
        )
        .unwrap();
        let (server, compiler) = server(dir.path());

        let request = Request::builder()
            .uri("/app.js")
            .header(header::USER_AGENT, "LiquidCore/1.0.0")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/javascript");
        assert_eq!(response.headers()[header::VARY], "user-agent, accept-encoding");
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(body(response).await, b"module.exports = 'real';");
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join(".lib/real.js").is_file());
    }

    #[tokio::test]
    async fn test_externals_follow_selected_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.js"), "module.exports = 'real';").unwrap();
        std::fs::write(
            dir.path().join("app.manifest"),
            r#"{ "configs": [ { "bindings": ["sqlite3"], "file": "real.js" } ] }"#,
        )
        .unwrap();
        let (server, compiler) = server(dir.path());

        // Clients with extra bindings share the artifact built for the config.
        for agent in [
            "LiquidCore/1.0 Binding (sqlite3; leveldown)",
            "LiquidCore/1.0 Binding (sqlite3)",
            "LiquidCore/1.0 Binding (sqlite3; leveldown)",
        ] {
            let request = Request::builder()
                .uri("/app.js")
                .header(header::USER_AGENT, agent)
                .body(Body::empty())
                .unwrap();
            let response = server.router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{agent}");
            assert_eq!(body(response).await, b"module.exports = 'real';");
        }
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_manifest_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("picky.manifest"),
            r#"{ "configs": [ { "info": ["iOS"], "file": "ios.js" } ] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.manifest"), "{ configs: ").unwrap();
        std::fs::write(
            dir.path().join("gone.manifest"),
            r#"{ "configs": [ { "file": "nowhere.js" } ] }"#,
        )
        .unwrap();
        let (server, compiler) = server(dir.path());

        let response = server.router().oneshot(get("/picky.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server.router().oneshot(get("/broken.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = server.router().oneshot(get("/gone.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reload_switches_root() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("a.txt"), "second").unwrap();
        let (server, _) = server(first.path());

        let response = server.router().oneshot(get("/a.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut config = server.config();
        config.content.root = second.path().to_path_buf();
        server.reload(config);

        let response = server.router().oneshot(get("/a.txt")).await.unwrap();
        assert_eq!(body(response).await, b"second");
    }

    #[tokio::test]
    async fn test_invalid_reload_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server(dir.path());

        let mut config = server.config();
        config.descriptor.header = "not a header".into();
        server.reload(config);
        assert_eq!(server.config().descriptor.header, "user-agent");
    }
}

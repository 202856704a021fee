//! Artifact freshness and compilation.
//!
//! # States
//! - Fresh-cached: artifact exists, is at least as new as the source and was
//!   produced with the same build fingerprint
//!   - client copy at least as new as the artifact → `NotModified`
//!   - otherwise → `Cached` (stream the artifact file)
//! - Stale-or-absent: compile (single-flight, bounded workers, with timeout),
//!   store the artifact, then → `Compiled`
//!
//! # Design Decisions
//! - No in-memory bookkeeping: every request re-derives state from the filesystem
//! - Artifacts live in a cache directory next to the source (`src/.lib/app.js`)
//! - Artifacts are written to a temporary file and renamed into place
//! - Stores and freshness checks on one artifact path are serialized, so an
//!   artifact and its fingerprint sidecar are always read as a pair
//! - A failed artifact write is logged; the compiled bytes are still served

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::fs::{self, File};
use tokio::sync::{Mutex, Semaphore};

use crate::build::compiler::{CompileRequest, Compiler};
use crate::build::error::{BuildError, BuildResult, CompileError};
use crate::build::fingerprint::{Fingerprint, FINGERPRINT_SUFFIX};
use crate::build::single_flight::SingleFlight;
use crate::config::ServerConfig;
use crate::observability::metrics;

/// Build errors as seen by callers; compile failures are shared between waiters.
pub type SharedBuildError = Arc<BuildError>;

/// Build settings that may change with a configuration reload.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Name of the cache directory created next to each source file.
    pub cache_dir: String,
    pub compile_timeout: Duration,
    /// Modules never bundled, in addition to the selected config's bindings.
    pub builtin_modules: Vec<String>,
    /// Module globals the bundler may inject.
    pub allowed_globals: Vec<String>,
}

impl BuildSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            cache_dir: config.content.cache_dir.clone(),
            compile_timeout: Duration::from_secs(config.compiler.timeout_secs),
            builtin_modules: config.compiler.builtin_modules.clone(),
            allowed_globals: config.compiler.allowed_globals.clone(),
        }
    }

    /// Toolchain request for `request`: built-ins plus bindings are external.
    pub fn compile_request(&self, request: &BuildRequest) -> CompileRequest {
        let mut externals: Vec<String> = Vec::new();
        for module in self.builtin_modules.iter().chain(&request.bindings) {
            if !externals.contains(module) {
                externals.push(module.clone());
            }
        }
        CompileRequest {
            entry: request.file.clone(),
            externals,
            globals: self.allowed_globals.clone(),
            transforms: request.transforms.clone(),
        }
    }
}

/// One request for a build artifact.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Entry source file.
    pub file: PathBuf,
    pub transforms: Vec<String>,
    /// Bindings required by the selected config; excluded from the bundle.
    pub bindings: Vec<String>,
    /// Freshness timestamp supplied by the client (`If-Modified-Since`).
    pub if_modified_since: Option<SystemTime>,
}

/// Identity of a compile for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BuildKey {
    file: PathBuf,
    transforms: Vec<String>,
    bindings: Vec<String>,
}

/// A freshly compiled artifact.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub bytes: Bytes,
    pub modified: SystemTime,
}

/// What the build cache decided for a request.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The client's copy is current; send no body.
    NotModified { modified: SystemTime },
    /// Stream the existing artifact.
    Cached { file: File, modified: SystemTime },
    /// The artifact was rebuilt.
    Compiled(CompiledArtifact),
}

impl BuildOutcome {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotModified { .. } => "not_modified",
            Self::Cached { .. } => "cached",
            Self::Compiled(_) => "compiled",
        }
    }

    /// Modification time of the artifact being served.
    pub fn modified(&self) -> SystemTime {
        match self {
            Self::NotModified { modified } | Self::Cached { modified, .. } => *modified,
            Self::Compiled(artifact) => artifact.modified,
        }
    }
}

/// One lock per artifact path.
///
/// Different build keys share an output path when only their transforms or
/// bindings differ.
#[derive(Default)]
struct ArtifactLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl ArtifactLocks {
    fn get(&self, output: &Path) -> Arc<Mutex<()>> {
        self.locks.entry(output.to_path_buf()).or_default().clone()
    }
}

/// Filesystem-backed cache of compiled scripts.
pub struct BuildCache {
    compiler: Arc<dyn Compiler>,
    workers: Arc<Semaphore>,
    flights: SingleFlight<BuildKey, CompiledArtifact>,
    locks: Arc<ArtifactLocks>,
}

impl BuildCache {
    /// Create a cache running at most `max_workers` compiles at once.
    pub fn new(compiler: Arc<dyn Compiler>, max_workers: usize) -> Self {
        Self {
            compiler,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
            flights: SingleFlight::new(),
            locks: Arc::new(ArtifactLocks::default()),
        }
    }

    /// Decide how to answer `request`, compiling if needed.
    pub async fn fetch(
        &self,
        request: &BuildRequest,
        settings: &BuildSettings,
    ) -> Result<BuildOutcome, SharedBuildError> {
        let result = self.resolve(request, settings).await;
        match &result {
            Ok(outcome) => metrics::record_build(outcome.label()),
            Err(_) => metrics::record_build("error"),
        }
        result
    }

    async fn resolve(
        &self,
        request: &BuildRequest,
        settings: &BuildSettings,
    ) -> Result<BuildOutcome, SharedBuildError> {
        let source = &request.file;
        let source_modified = source_modified(source).await.map_err(Arc::new)?;
        let output = artifact_path(source, &settings.cache_dir)
            .ok_or_else(|| Arc::new(BuildError::SourceMissing(source.clone())))?;

        let compile_request = settings.compile_request(request);
        let fingerprint = Fingerprint::of(&compile_request, &self.compiler.describe());

        {
            // An open handle keeps the checked contents even if a store replaces the path later.
            let lock = self.locks.get(&output);
            let _guard = lock.lock().await;
            if let Some(modified) = fresh_artifact(&output, source_modified, fingerprint).await {
                if is_current(request.if_modified_since, modified) {
                    tracing::debug!(artifact = %output.display(), "Artifact is up-to-date on client");
                    return Ok(BuildOutcome::NotModified { modified });
                }
                match File::open(&output).await {
                    Ok(file) => {
                        tracing::debug!(artifact = %output.display(), "Using cached artifact");
                        return Ok(BuildOutcome::Cached { file, modified });
                    }
                    Err(e) => {
                        tracing::debug!(artifact = %output.display(), error = %e, "Cached artifact vanished, recompiling");
                    }
                }
            }
        }

        let key = BuildKey {
            file: source.clone(),
            transforms: request.transforms.clone(),
            bindings: request.bindings.clone(),
        };
        let compiler = Arc::clone(&self.compiler);
        let workers = Arc::clone(&self.workers);
        let lock = self.locks.get(&output);
        let timeout = settings.compile_timeout;

        let artifact = self
            .flights
            .run(key, move || {
                compile_and_store(compiler, workers, lock, compile_request, output, fingerprint, timeout).boxed()
            })
            .await?;
        Ok(BuildOutcome::Compiled(artifact))
    }

    /// Number of compiles currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }
}

/// Where the artifact for `source` is stored: `<dir>/<cache_dir>/<name>`.
pub fn artifact_path(source: &Path, cache_dir: &str) -> Option<PathBuf> {
    let name = source.file_name()?;
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    Some(dir.join(cache_dir).join(name))
}

fn fingerprint_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(FINGERPRINT_SUFFIX);
    artifact.with_file_name(name)
}

/// Truncate to whole seconds, the precision of HTTP dates.
pub fn whole_seconds(time: SystemTime) -> SystemTime {
    let secs = time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn is_current(if_modified_since: Option<SystemTime>, modified: SystemTime) -> bool {
    if_modified_since.is_some_and(|since| since >= whole_seconds(modified))
}

async fn source_modified(source: &Path) -> BuildResult<SystemTime> {
    match fs::metadata(source).await {
        Ok(metadata) if metadata.is_file() => metadata
            .modified()
            .map_err(|e| BuildError::io(source, e)),
        Ok(_) => Err(BuildError::SourceMissing(source.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(BuildError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => Err(BuildError::io(source, e)),
    }
}

/// Modification time of the artifact if it can be served as is.
async fn fresh_artifact(
    output: &Path,
    source_modified: SystemTime,
    fingerprint: Fingerprint,
) -> Option<SystemTime> {
    let metadata = fs::metadata(output).await.ok()?;
    let modified = metadata.modified().ok()?;
    if !metadata.is_file() || modified < source_modified {
        return None;
    }
    let stored = fs::read_to_string(fingerprint_path(output)).await.ok()?;
    if Fingerprint::parse(&stored) != Some(fingerprint) {
        tracing::debug!(artifact = %output.display(), "Build settings changed since artifact was written");
        return None;
    }
    Some(modified)
}

async fn compile_and_store(
    compiler: Arc<dyn Compiler>,
    workers: Arc<Semaphore>,
    lock: Arc<Mutex<()>>,
    request: CompileRequest,
    output: PathBuf,
    fingerprint: Fingerprint,
    timeout: Duration,
) -> BuildResult<CompiledArtifact> {
    let permit = workers
        .acquire_owned()
        .await
        .map_err(|_| BuildError::WorkersClosed)?;

    tracing::info!(
        entry = %request.entry.display(),
        artifact = %output.display(),
        transforms = ?request.transforms,
        "Compiling"
    );
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, compiler.compile(request)).await {
        Ok(result) => result,
        Err(_) => Err(CompileError::Timeout(timeout)),
    };
    drop(permit);
    metrics::record_compile(result.is_ok(), started);
    let bytes = result?;

    let stored = {
        let _guard = lock.lock().await;
        store_artifact(&output, &bytes, fingerprint).await
    };
    let modified = match stored {
        Ok(modified) => modified,
        Err(e) => {
            tracing::warn!(artifact = %output.display(), error = %e, "Failed to cache compiled artifact");
            SystemTime::now()
        }
    };
    Ok(CompiledArtifact { bytes, modified })
}

async fn store_artifact(output: &Path, bytes: &[u8], fingerprint: Fingerprint) -> BuildResult<SystemTime> {
    if let Some(dir) = output.parent() {
        match fs::create_dir_all(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(BuildError::io(dir, e)),
        }
    }

    let mut temp_name = output.file_name().unwrap_or_default().to_os_string();
    temp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let temp = output.with_file_name(temp_name);

    fs::write(&temp, bytes).await.map_err(|e| BuildError::io(&temp, e))?;

    // Without a sidecar the entry reads as stale until both halves are written.
    let sidecar = fingerprint_path(output);
    match fs::remove_file(&sidecar).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            return Err(BuildError::io(&sidecar, e));
        }
    }
    if let Err(e) = fs::rename(&temp, output).await {
        let _ = fs::remove_file(&temp).await;
        return Err(BuildError::io(output, e));
    }

    fs::write(&sidecar, fingerprint.to_string())
        .await
        .map_err(|e| BuildError::io(&sidecar, e))?;

    fs::metadata(output)
        .await
        .and_then(|metadata| metadata.modified())
        .map_err(|e| BuildError::io(output, e))
}

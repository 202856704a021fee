//! The external bundling toolchain.
//!
//! # Responsibilities
//! - Define the `compile(entry, options) → bytes` seam used by the build cache
//! - Run the configured bundler command and capture its output
//!
//! # Design Decisions
//! - The bundler is a black box: stdout is the artifact, a non-zero exit is a failure
//! - Child processes are killed when the compile future is dropped (timeouts)
//! - Tests substitute in-process compilers through the [`Compiler`] trait

use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::process::Command;

use crate::build::error::CompileError;
use crate::config::CompilerConfig;

/// Everything the toolchain needs to bundle one entry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub entry: PathBuf,
    /// Modules left out of the bundle and resolved at runtime instead.
    pub externals: Vec<String>,
    /// The only module globals the bundler may inject.
    pub globals: Vec<String>,
    /// Transforms applied to every bundled file.
    pub transforms: Vec<String>,
}

/// Produces bundled scripts.
pub trait Compiler: Send + Sync {
    /// Stable description of the toolchain invocation, folded into build
    /// fingerprints so that changing the toolchain invalidates artifacts.
    fn describe(&self) -> String;

    /// Bundle `request.entry`.
    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, Result<Bytes, CompileError>>;
}

/// Runs a bundler executable (browserify by default) per compile.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    external_flag: String,
    transform_flag: String,
    globals_flag: String,
}

impl CommandCompiler {
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            external_flag: config.external_flag.clone(),
            transform_flag: config.transform_flag.clone(),
            globals_flag: config.globals_flag.clone(),
        }
    }

    /// Full argument list for `request`; the entry file comes last.
    pub fn arguments(&self, request: &CompileRequest) -> Vec<String> {
        let mut args = self.args.clone();
        for external in &request.externals {
            args.push(self.external_flag.clone());
            args.push(external.clone());
        }
        if !request.globals.is_empty() {
            args.push(self.globals_flag.clone());
            args.push(request.globals.join(","));
        }
        for transform in &request.transforms {
            args.push(self.transform_flag.clone());
            args.push(transform.clone());
        }
        args.push(request.entry.to_string_lossy().into_owned());
        args
    }
}

impl Compiler for CommandCompiler {
    fn describe(&self) -> String {
        format!(
            "{} {} [{} {} {}]",
            self.program,
            self.args.join(" "),
            self.external_flag,
            self.globals_flag,
            self.transform_flag
        )
    }

    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, Result<Bytes, CompileError>> {
        let program = self.program.clone();
        let args = self.arguments(&request);

        async move {
            tracing::debug!(program = %program, ?args, "Spawning compiler");
            let output = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| CompileError::Spawn {
                    program: program.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(CompileError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            Ok(Bytes::from(output.stdout))
        }
        .boxed()
    }
}

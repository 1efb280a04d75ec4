//! Demo driver for mlld-core.
//!
//! There is no grammar in this crate (spec §1) — real documents arrive
//! as already-parsed [`mlld_core::ast::Node`] trees from a host. This
//! binary builds one small document by hand, wires the host
//! collaborators (filesystem, shell exec) to real implementations, and
//! prints the reconstructed output, to exercise the evaluator
//! end-to-end the way a host integration would.

use std::sync::Arc;

use async_trait::async_trait;
use mlld_core::ast::{Location, Node, NodeKind};
use mlld_core::effects::DocumentFormat;
use mlld_core::env::Environment;
use mlld_core::errors::MlldResult;
use mlld_core::evaluator::Evaluator;
use mlld_core::exec::{CommandExecutor, ExecLanguage, ExecRequest};
use mlld_core::interpolation::{FileLoader, FileWriter};
use mlld_core::resolver::resolvers::AllowList;
use mlld_core::resolver::{LockFile, ResolverManager};
use mlld_core::value::CommandResultValue;

struct DiskFileLoader;

#[async_trait]
impl FileLoader for DiskFileLoader {
    async fn load(&self, path: &str, section: Option<&str>) -> MlldResult<String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| mlld_core::errors::MlldError::FileNotFound { path: path.to_string() })?;
        match section {
            Some(heading) => Ok(extract_section(&content, heading)),
            None => Ok(content),
        }
    }
}

/// Naive `# Heading` section slice: everything from a matching heading
/// line up to (not including) the next heading at the same level.
fn extract_section(content: &str, heading: &str) -> String {
    let mut lines = content.lines();
    let mut out = Vec::new();
    let mut in_section = false;
    let mut level = 0usize;

    for line in &mut lines {
        let trimmed = line.trim_start();
        let this_level = trimmed.chars().take_while(|c| *c == '#').count();
        if this_level > 0 && trimmed[this_level..].trim() == heading {
            in_section = true;
            level = this_level;
            continue;
        }
        if in_section && this_level > 0 && this_level <= level {
            break;
        }
        if in_section {
            out.push(line);
        }
    }
    out.join("\n")
}

struct DiskFileWriter;

#[async_trait]
impl FileWriter for DiskFileWriter {
    async fn write(&self, path: &str, content: &str, append: bool) -> MlldResult<()> {
        if append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|_| mlld_core::errors::MlldError::FileNotFound { path: path.to_string() })?;
            tokio::io::AsyncWriteExt::write_all(&mut file, content.as_bytes())
                .await
                .map_err(|_| mlld_core::errors::MlldError::FileNotFound { path: path.to_string() })
        } else {
            tokio::fs::write(path, content)
                .await
                .map_err(|_| mlld_core::errors::MlldError::FileNotFound { path: path.to_string() })
        }
    }
}

struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, request: ExecRequest) -> MlldResult<CommandResultValue> {
        let mut command = match request.language {
            ExecLanguage::Sh => {
                let mut c = tokio::process::Command::new("sh");
                c.arg("-c").arg(&request.source);
                c
            }
            ExecLanguage::Js => {
                let mut c = tokio::process::Command::new("node");
                c.arg("-e").arg(&request.source);
                c
            }
            ExecLanguage::Python => {
                let mut c = tokio::process::Command::new("python3");
                c.arg("-c").arg(&request.source);
                c
            }
        };
        command.envs(&request.env_vars);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|e| mlld_core::errors::MlldError::TransportError { message: e.to_string() })?;

        Ok(CommandResultValue {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

fn text(s: &str) -> Node {
    Node::new(NodeKind::Text(s.to_string()), Location::default())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut resolvers = ResolverManager::new();
    let mut allowed_env = Vec::new();
    let mut allowed_roots = Vec::new();
    if let Ok(lock_text) = tokio::fs::read_to_string("mlld.lock.toml").await {
        match LockFile::parse(&lock_text) {
            Ok(lockfile) => {
                resolvers.apply_lockfile(&lockfile, AllowList::allow_all());
                allowed_env = lockfile.security.allowed_env.clone();
                allowed_roots = lockfile.security.allowed_roots.clone();
            }
            Err(err) => tracing::warn!(error = %err, "ignoring unparseable mlld.lock.toml"),
        }
    }

    let evaluator = Evaluator::new(
        Arc::new(DiskFileLoader),
        Arc::new(DiskFileWriter),
        Arc::new(ShellExecutor),
        resolvers,
        DocumentFormat::Markdown,
    )
    .with_allowed_env(allowed_env)
    .with_allowed_roots(allowed_roots);
    let env = Environment::root();

    let document = Node::new(
        NodeKind::Document(vec![
            text("mlld-core demo document"),
            Node::new(NodeKind::Newline, Location::default()),
            text("(host-supplied AST goes here; the grammar itself is out of scope)"),
        ]),
        Location::default(),
    );

    match evaluator.eval_document(&document, &env).await {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => {
            eprintln!("evaluation error [{}]: {err}", err.code());
            std::process::exit(1);
        }
    }
}

//! Central directive/expression evaluator (spec component C5): the
//! tree-walking dispatcher every handler module in this crate is
//! written against. Mirrors `just-bash`'s own interpreter split — one
//! dispatcher, one handler module per statement/directive kind — scaled
//! up from a single shell grammar to mlld's thirteen directive kinds.

pub mod exe;
pub mod for_loop;
pub mod guard_directive;
pub mod hook_directive;
pub mod import;
pub mod loop_directive;
pub mod output;
pub mod path;
pub mod run;
pub mod show;
pub mod stream;
pub mod tools;
pub mod var;
pub mod when;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ast::{DirectiveKind, LiteralValue, Location, Node, NodeKind};
use crate::context::{ContextManager, OperationFrame};
use crate::effects::{self, DocumentFormat};
use crate::env::{Environment, Intent};
use crate::errors::{MlldError, MlldResult};
use crate::exec::CommandExecutor;
use crate::hooks::{GuardDecision, GuardEntry, GuardInvoker, HookTiming, GuardRegistry, HookInvoker, HookRegistry};
use crate::interpolation::{EscapingStrategy, ExpressionEvaluator, FileLoader, FileWriter, InterpolationEngine};
use crate::pipeline::{self, PipelineEngine, StageInvoker, StageOutcome};
use crate::resolver::ResolverManager;
use crate::value::{SecurityDescriptor, Value, ValueData, Variable};

/// Holds every host collaborator (file loading, command execution,
/// module resolution) plus the runtime registries `/hook` and `/guard`
/// populate as a document evaluates.
pub struct Evaluator {
    pub file_loader: Arc<dyn FileLoader>,
    pub file_writer: Arc<dyn FileWriter>,
    pub executor: Arc<dyn CommandExecutor>,
    pub resolvers: ResolverManager,
    pub hooks: Mutex<HookRegistry>,
    pub guards: Mutex<GuardRegistry>,
    pub hook_bodies: Mutex<indexmap::IndexMap<String, (Vec<Node>, Environment)>>,
    pub pipeline: PipelineEngine,
    pub format: DocumentFormat,
    /// `security.allowedEnv` (spec §6.2): process environment variable
    /// names readable through the top-level `@input` resolver identifier.
    /// Empty by default — a document reads no ambient environment state
    /// until a lock file opts names in.
    pub allowed_env: Vec<String>,
    /// `security.allowedRoots` (spec §4.5 `/path`): absolute path prefixes
    /// a `/path @n = expr with { absolute: true }` binding may resolve
    /// under. Empty means no restriction — every absolute path is allowed,
    /// matching today's permissive default until a lock file opts in.
    pub allowed_roots: Vec<String>,
}

impl Evaluator {
    pub fn new(
        file_loader: Arc<dyn FileLoader>,
        file_writer: Arc<dyn FileWriter>,
        executor: Arc<dyn CommandExecutor>,
        resolvers: ResolverManager,
        format: DocumentFormat,
    ) -> Self {
        Self {
            file_loader,
            file_writer,
            executor,
            resolvers,
            hooks: Mutex::new(HookRegistry::new()),
            guards: Mutex::new(GuardRegistry::new()),
            hook_bodies: Mutex::new(indexmap::IndexMap::new()),
            pipeline: PipelineEngine::default(),
            format,
            allowed_env: Vec::new(),
            allowed_roots: Vec::new(),
        }
    }

    pub fn with_allowed_env(mut self, allowed_env: Vec<String>) -> Self {
        self.allowed_env = allowed_env;
        self
    }

    pub fn with_allowed_roots(mut self, allowed_roots: Vec<String>) -> Self {
        self.allowed_roots = allowed_roots;
        self
    }

    /// `getResolverVariable(name)` (spec §4.2): async-resolves a
    /// top-level resolver identifier. Only `input` exists today — it
    /// reads the process environment, filtered down to
    /// [`Evaluator::allowed_env`] (spec §6.2 `security.allowedEnv`), so a
    /// document can never read an environment variable its lock file
    /// didn't explicitly opt in.
    pub async fn get_resolver_variable(&self, name: &str) -> MlldResult<Value> {
        match name {
            "input" => {
                let mut fields = indexmap::IndexMap::new();
                for var in &self.allowed_env {
                    if let Ok(value) = std::env::var(var) {
                        fields.insert(var.clone(), Value::text(value));
                    }
                }
                Ok(Value::new(ValueData::Object(fields)))
            }
            other => Err(MlldError::VariableNotFound { name: other.to_string(), location: None }),
        }
    }

    /// Evaluates a top-level document, then reconstructs the rendered
    /// output from the intents it pushed along the way (spec §4.10).
    pub async fn eval_document(&self, document: &Node, env: &Environment) -> MlldResult<String> {
        let mut ctx = ContextManager::new();
        self.eval(document, env, &mut ctx).await?;
        let intents = env.take_intents().await;
        Ok(effects::reconstruct(&intents, self.format))
    }

    /// Evaluates one AST node. Returns a manually boxed future: this
    /// function is (indirectly, through nearly every directive handler
    /// in this module) recursive, and an `async fn` can't express a
    /// cycle through its own unboxed state machine.
    pub fn eval<'a>(
        &'a self,
        node: &'a Node,
        env: &'a Environment,
        ctx: &'a mut ContextManager,
    ) -> Pin<Box<dyn Future<Output = MlldResult<Value>> + Send + 'a>> {
        Box::pin(async move {
            match &node.kind {
                NodeKind::Document(children) | NodeKind::MlldRunBlock(children) => {
                    let mut last = Value::null();
                    for child in children {
                        last = self.eval(child, env, ctx).await?;
                    }
                    Ok(last)
                }
                NodeKind::Directive(directive) => {
                    self.eval_directive(&directive.kind, &node.location, env, ctx).await
                }
                NodeKind::Text(text) => {
                    env.push_intent(Intent::Content(text.clone())).await;
                    Ok(Value::text(text.clone()))
                }
                NodeKind::Newline => {
                    env.push_intent(Intent::Break).await;
                    Ok(Value::null())
                }
                NodeKind::Comment(_) => Ok(Value::null()),
                NodeKind::Frontmatter(map) => {
                    let mut fields = indexmap::IndexMap::new();
                    for (k, v) in map {
                        fields.insert(k.clone(), json_to_value(v));
                    }
                    Ok(Value::new(ValueData::Object(fields)))
                }
                NodeKind::CodeFence { content, .. } => Ok(Value::text(content.clone())),
                NodeKind::VariableReference(var_ref) => {
                    // `@ctx`/`@mx` are read-only views onto the live
                    // context stacks (spec §4.3), not ordinary bindings —
                    // resolved from `ctx` itself rather than `env.get`.
                    let base = match var_ref.name.as_str() {
                        "ctx" => ctx.ctx_view(),
                        "mx" => ctx.mx_view(),
                        "input" if !env.has("input").await => self.get_resolver_variable("input").await?,
                        _ => env.get(&var_ref.name).await?.value,
                    };
                    crate::interpolation::fields::resolve_field_chain(base, &var_ref.fields, env, self).await
                }
                NodeKind::ExecInvocation { callee, variant: _, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg, env, ctx).await?);
                    }
                    exe::invoke_exe(self, callee, &values, env, ctx).await
                }
                NodeKind::Literal(lit) => Ok(literal_value(lit)),
                NodeKind::BinaryExpression { op, left, right } => {
                    let l = self.eval(left, env, ctx).await?;
                    let r = self.eval(right, env, ctx).await?;
                    eval_binary(op, &l, &r)
                }
                NodeKind::UnaryExpression { op, operand } => {
                    let v = self.eval(operand, env, ctx).await?;
                    eval_unary(op, &v)
                }
                NodeKind::TernaryExpression { cond, if_true, if_false } => {
                    if self.eval(cond, env, ctx).await?.is_truthy() {
                        self.eval(if_true, env, ctx).await
                    } else {
                        self.eval(if_false, env, ctx).await
                    }
                }
                NodeKind::NewExpression { callee, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg, env, ctx).await?);
                    }
                    exe::invoke_exe(self, callee, &values, env, ctx).await
                }
                NodeKind::WhenExpression(when) => when::eval_when(self, when, env, ctx).await,
                NodeKind::ForExpression(for_node) => for_loop::eval_for(self, for_node, env, ctx).await,
                NodeKind::LoopExpression(loop_node) => loop_directive::eval_loop(self, loop_node, env, ctx).await,
                NodeKind::FileReference(file_ref) | NodeKind::LoadContent(file_ref) => {
                    let loader = self.file_loader.as_ref();
                    let engine = InterpolationEngine::new(loader, EscapingStrategy::None);
                    let path = engine.render(&file_ref.path, env, self).await?.render();
                    crate::interpolation::file_refs::load_file_reference(loader, &path, file_ref.section.as_deref())
                        .await
                }
                NodeKind::ExeBlock(nodes) => self.eval_block_with_return(nodes, env, ctx).await,
                NodeKind::LetAssignment { name, value } => {
                    let bound = self.eval(value, env, ctx).await?;
                    env.define(Variable::simple(name.clone(), bound.clone())).await;
                    Ok(bound)
                }
                NodeKind::AugmentedAssignment { name, op: _, value } => {
                    let rhs = self.eval(value, env, ctx).await?;
                    let existing = env.get(name).await?;
                    let bound = existing.value.concat(&rhs)?;
                    env.set(Variable::simple(name.clone(), bound.clone())).await?;
                    Ok(bound)
                }
                NodeKind::ExeReturn(inner) => self.eval(inner, env, ctx).await,
                NodeKind::LabelModification { labels, target } => {
                    let value = self.eval(target, env, ctx).await?;
                    let mut security = value.security.clone();
                    security.labels.extend(labels.iter().cloned());
                    Ok(Value::with_security(value.data, security))
                }
                NodeKind::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item, env, ctx).await?);
                    }
                    let security = SecurityDescriptor::merge_all(values.iter().map(|v| &v.security));
                    Ok(Value::with_security(ValueData::Array(values), security))
                }
                NodeKind::Object(pairs) => {
                    let mut fields = indexmap::IndexMap::new();
                    let mut security = SecurityDescriptor::new();
                    for (key, value_node) in pairs {
                        let value = self.eval(value_node, env, ctx).await?;
                        security = security.merge(&value.security);
                        fields.insert(key.clone(), value);
                    }
                    Ok(Value::with_security(ValueData::Object(fields), security))
                }
                NodeKind::Command(command) => {
                    let loader = self.file_loader.as_ref();
                    let engine = InterpolationEngine::new(loader, EscapingStrategy::None);
                    engine.render(&command.parts, env, self).await
                }
                NodeKind::Code(code) => Ok(Value::text(code.source.clone())),
                NodeKind::Template(parts) => {
                    let loader = self.file_loader.as_ref();
                    let engine = InterpolationEngine::new(loader, EscapingStrategy::None);
                    engine.render(parts, env, self).await
                }
                NodeKind::PipelineExpression { input, stages } => {
                    let value = self.eval(input, env, ctx).await?;
                    self.pipeline.run(value, stages, self, self, env, ctx).await
                }
            }
        })
    }

    /// Runs an `ExeBlock`'s nodes, honoring an early `ExeReturn` the
    /// same way `/exe` block bodies do.
    async fn eval_block_with_return(&self, nodes: &[Node], env: &Environment, ctx: &mut ContextManager) -> MlldResult<Value> {
        let mut last = Value::null();
        for node in nodes {
            if let NodeKind::ExeReturn(inner) = &node.kind {
                return self.eval(inner, env, ctx).await;
            }
            last = self.eval(node, env, ctx).await?;
        }
        Ok(last)
    }

    /// Runs a directive's before/after hooks and guards around its
    /// dispatch (spec §4.8: enter operation context, run before
    /// hooks/guards, evaluate, run after hooks/guards, exit). Guards
    /// decide (`deny` aborts, `transform` replaces the result); hooks
    /// are audit-only and never change control flow, matching the
    /// split already drawn between `HookInvoker` (side effects) and
    /// `GuardInvoker` (policy) elsewhere in this crate.
    async fn eval_directive(
        &self,
        kind: &DirectiveKind,
        location: &Location,
        env: &Environment,
        ctx: &mut ContextManager,
    ) -> MlldResult<Value> {
        let operation = operation_kind(kind);
        let label = directive_labels(kind).first().cloned();
        let depth_before = ctx.depth_snapshot();
        ctx.push_operation(OperationFrame { directive: operation.to_string(), label: label.clone() });

        let outcome = self.run_directive_with_guards(kind, operation, label.as_deref(), location, env, ctx).await;

        ctx.pop_operation();
        ctx.check_balanced_since(depth_before)?;
        outcome
    }

    async fn run_directive_with_guards(
        &self,
        kind: &DirectiveKind,
        operation: &str,
        label: Option<&str>,
        location: &Location,
        env: &Environment,
        ctx: &mut ContextManager,
    ) -> MlldResult<Value> {
        // Snapshot the registries and release the mutexes before invoking
        // anything: a guard/hook body can itself evaluate directives that
        // re-enter this same dispatch path, and `tokio::sync::Mutex` isn't
        // reentrant — holding the lock across that callback would deadlock.
        let guards = self.guards.lock().await.clone();
        let hooks = self.hooks.lock().await.clone();

        match guards.evaluate(HookTiming::Before, operation, label, env, ctx, self).await? {
            GuardDecision::Allow => {}
            GuardDecision::Deny { reason } => return Err(MlldError::GuardDeny { message: reason }),
            // `retry`/`transform` at the before phase only make sense inside
            // a pipeline stage (spec §4.7); outside one they degrade to
            // `allow`.
            GuardDecision::Retry { .. } | GuardDecision::Transform { .. } => {}
        }
        hooks.dispatch(HookTiming::Before, operation, None, label, None, env, ctx, self).await;

        let mut result = self.dispatch_directive(kind, location, env, ctx).await?;

        match guards.evaluate(HookTiming::After, operation, label, env, ctx, self).await? {
            GuardDecision::Allow | GuardDecision::Retry { .. } => {}
            GuardDecision::Deny { reason } => return Err(MlldError::GuardDeny { message: reason }),
            GuardDecision::Transform { value } => result = value,
        }
        hooks.dispatch(HookTiming::After, operation, None, label, None, env, ctx, self).await;

        Ok(result)
    }

    async fn dispatch_directive(
        &self,
        kind: &DirectiveKind,
        location: &Location,
        env: &Environment,
        ctx: &mut ContextManager,
    ) -> MlldResult<Value> {
        match kind {
            DirectiveKind::Var { name, value, augmented, is_tools, labels } => {
                var::eval_var(self, name, value, *augmented, *is_tools, labels, env, ctx).await?;
                Ok(Value::null())
            }
            DirectiveKind::Exe { name, params, body, labels, retryable } => {
                exe::eval_exe_define(name, params, body, labels, *retryable, env).await?;
                Ok(Value::null())
            }
            DirectiveKind::Run { command, assign_to } => {
                run::eval_run(self, command, assign_to.as_deref(), env, ctx).await?;
                Ok(Value::null())
            }
            DirectiveKind::When(when) => when::eval_when(self, when, env, ctx).await,
            DirectiveKind::For(for_node) => for_loop::eval_for(self, for_node, env, ctx).await,
            DirectiveKind::Loop(loop_node) => loop_directive::eval_loop(self, loop_node, env, ctx).await,
            DirectiveKind::Import { source, bindings, namespace_alias } => {
                import::eval_import(self, source, bindings, namespace_alias, env, ctx).await?;
                Ok(Value::null())
            }
            DirectiveKind::Output { value, target, append } => {
                output::eval_output(self, value, target, *append, location, env, ctx).await?;
                Ok(Value::null())
            }
            DirectiveKind::Show { value } => {
                show::eval_show(self, value, env, ctx).await?;
                Ok(Value::null())
            }
            DirectiveKind::Hook { name, timing, matcher, body } => {
                hook_directive::eval_hook_define(self, name, *timing, matcher, body, env).await?;
                Ok(Value::null())
            }
            DirectiveKind::Guard { name, timing, matcher, when } => {
                guard_directive::eval_guard_define(self, name, *timing, matcher, when).await?;
                Ok(Value::null())
            }
            DirectiveKind::Stream { enabled, target } => {
                stream::eval_stream(self, *enabled, target.as_deref()).await?;
                Ok(Value::null())
            }
            DirectiveKind::Path { name, expr, require_absolute } => {
                path::eval_path(self, name, expr, *require_absolute, env, ctx).await?;
                Ok(Value::null())
            }
        }
    }
}

/// Operation discriminator for `@ctx.op.type` and hook/guard matching
/// (spec §4.8: `op:var`, `op:exe`, `op:run`, ...). `for`'s per-item and
/// per-batch sub-operations are dispatched separately from inside
/// `for_loop::eval_for`, not here.
fn operation_kind(kind: &DirectiveKind) -> &'static str {
    match kind {
        DirectiveKind::Var { .. } => "var",
        DirectiveKind::Exe { .. } => "exe",
        DirectiveKind::Run { .. } => "run",
        DirectiveKind::When(_) => "when",
        DirectiveKind::For(_) => "for",
        DirectiveKind::Loop(_) => "loop",
        DirectiveKind::Import { .. } => "import",
        DirectiveKind::Output { .. } => "output",
        DirectiveKind::Show { .. } => "show",
        DirectiveKind::Hook { .. } => "hook",
        DirectiveKind::Guard { .. } => "guard",
        DirectiveKind::Stream { .. } => "stream",
        DirectiveKind::Path { .. } => "path",
    }
}

fn directive_labels(kind: &DirectiveKind) -> &[String] {
    match kind {
        DirectiveKind::Var { labels, .. } | DirectiveKind::Exe { labels, .. } => labels,
        _ => &[],
    }
}

fn literal_value(lit: &LiteralValue) -> Value {
    match lit {
        LiteralValue::String(s) => Value::text(s.clone()),
        LiteralValue::Number(n) => Value::new(ValueData::Number(*n)),
        LiteralValue::Bool(b) => Value::new(ValueData::Bool(*b)),
        LiteralValue::Null => Value::null(),
    }
}

fn numeric_pair(left: &Value, right: &Value) -> MlldResult<(f64, f64)> {
    match (&left.data, &right.data) {
        (ValueData::Number(a), ValueData::Number(b)) => Ok((*a, *b)),
        _ => Err(MlldError::InvalidValueType {
            expected: vec!["number".to_string()],
            actual: format!("{}/{}", left.type_name(), right.type_name()),
        }),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    left.to_json() == right.to_json()
}

fn bool_value(b: bool, left: &Value, right: &Value) -> Value {
    Value::with_security(ValueData::Bool(b), left.security.merge(&right.security))
}

fn eval_binary(op: &str, left: &Value, right: &Value) -> MlldResult<Value> {
    match op {
        "+" => match (&left.data, &right.data) {
            (ValueData::Number(a), ValueData::Number(b)) => {
                Ok(Value::with_security(ValueData::Number(a + b), left.security.merge(&right.security)))
            }
            _ => left.concat(right),
        },
        "-" | "*" | "/" | "%" => {
            let (a, b) = numeric_pair(left, right)?;
            let result = match op {
                "-" => a - b,
                "*" => a * b,
                "/" => a / b,
                _ => a % b,
            };
            Ok(Value::with_security(ValueData::Number(result), left.security.merge(&right.security)))
        }
        "==" => Ok(bool_value(values_equal(left, right), left, right)),
        "!=" => Ok(bool_value(!values_equal(left, right), left, right)),
        "<" | "<=" | ">" | ">=" => {
            let (a, b) = numeric_pair(left, right)?;
            let result = match op {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            };
            Ok(bool_value(result, left, right))
        }
        "&&" => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        "||" => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
        other => Err(MlldError::InvalidDirective {
            message: format!("unknown binary operator `{other}`"),
            location: None,
        }),
    }
}

fn eval_unary(op: &str, value: &Value) -> MlldResult<Value> {
    match op {
        "!" => Ok(Value::with_security(ValueData::Bool(!value.is_truthy()), value.security.clone())),
        "-" => match &value.data {
            ValueData::Number(n) => Ok(Value::with_security(ValueData::Number(-n), value.security.clone())),
            _ => Err(MlldError::InvalidValueType {
                expected: vec!["number".to_string()],
                actual: value.type_name().to_string(),
            }),
        },
        other => Err(MlldError::InvalidDirective {
            message: format!("unknown unary operator `{other}`"),
            location: None,
        }),
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::new(ValueData::Bool(*b)),
        serde_json::Value::Number(n) => Value::new(ValueData::Number(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Value::text(s.clone()),
        serde_json::Value::Array(items) => Value::new(ValueData::Array(items.iter().map(json_to_value).collect())),
        serde_json::Value::Object(map) => {
            let mut fields = indexmap::IndexMap::new();
            for (k, v) in map {
                fields.insert(k.clone(), json_to_value(v));
            }
            Value::new(ValueData::Object(fields))
        }
    }
}

#[async_trait]
impl ExpressionEvaluator for Evaluator {
    async fn eval_node(&self, node: &Node, env: &Environment) -> MlldResult<Value> {
        let mut ctx = ContextManager::new();
        self.eval(node, env, &mut ctx).await
    }
}

#[async_trait]
impl StageInvoker for Evaluator {
    /// Invokes an `/exe` callable as a pipeline stage. `input` is passed
    /// as the function's first argument, ahead of any literal stage
    /// args (spec §4.7). A sentinel return value is decoded back into a
    /// control signal rather than treated as the stage's output.
    async fn invoke(
        &self,
        callable: &str,
        variant: Option<&str>,
        args: &[Value],
        input: &Value,
        env: &Environment,
    ) -> MlldResult<StageOutcome> {
        let _ = variant;
        let mut ctx = ContextManager::new();
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(input.clone());
        call_args.extend(args.iter().cloned());
        let result = exe::invoke_exe(self, callable, &call_args, env, &mut ctx).await?;
        Ok(match pipeline::decode_signal(&result) {
            Some(signal) => StageOutcome::Signal(signal),
            None => StageOutcome::Value(result),
        })
    }

    /// `sourceRetryable` (spec §4.7): a retry is only honored if the
    /// stage's `/exe` definition was declared `retryable`.
    async fn is_retryable(&self, callable: &str, env: &Environment) -> bool {
        env.get_exe(callable).await.map(|def| def.retryable).unwrap_or(true)
    }
}

#[async_trait]
impl HookInvoker for Evaluator {
    async fn invoke_hook(&self, name: &str, _env: &Environment) -> MlldResult<()> {
        let mut ctx = ContextManager::new();
        hook_directive::run_hook_body(self, name, &mut ctx).await
    }
}

#[async_trait]
impl GuardInvoker for Evaluator {
    async fn invoke_guard(&self, guard: &GuardEntry, env: &Environment) -> MlldResult<GuardDecision> {
        let mut ctx = ContextManager::new();
        guard_directive::resolve_guard_decision(self, guard, env, &mut ctx).await
    }
}

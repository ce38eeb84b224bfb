use crate::Error;
use crate::ast::{Expr, Name, NumberType, Value};
use crate::builtinops::{core_modules, standard_extensions};
use crate::extension::{expand_unwraps, load_extensions, load_modules};
use rayon::prelude::*;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, trace};

mod context;
pub(crate) mod intooperation;
mod stack;

pub use context::{CancellationToken, Context, Position};
pub use intooperation::{
    BoolIter, FromParam, FromRest, IntIter, IntoOperation, IntoValueResult, IntoVariadicOperation,
    ListIter, OperationFn, ValueIter,
};
pub use stack::{Frame, Stack};

/// Pluggable literal parser: `Some(value)` for literal tokens, `None` for names.
pub type LiteralFn = dyn Fn(&str) -> Option<Value> + Send + Sync;

/// Pluggable argument post-processor, run on every evaluated argument list
/// before a closure or extension sees it.
pub type ArgumentFn = dyn Fn(Vec<Value>) -> Result<Vec<Value>, Error> + Send + Sync;

/// Evaluation limits and behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Frames an evaluation may hold before failing with `StackOverflow`.
    pub max_stack_depth: usize,
    /// Wall-clock budget applied by [`Runtime::context`].
    pub timeout: Option<Duration>,
    /// Evaluate argument lists concurrently on the rayon pool.
    pub parallel_arguments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_stack_depth: crate::DEFAULT_MAX_STACK_DEPTH,
            timeout: None,
            parallel_arguments: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_parallel_arguments(mut self, parallel: bool) -> Self {
        self.parallel_arguments = parallel;
        self
    }
}

/// The evaluator: configuration plus the two pluggable hooks.
///
/// A runtime holds no evaluation state, so one instance can drive any
/// number of concurrent evaluations.
#[derive(Clone)]
pub struct Runtime {
    config: Config,
    literal: Arc<LiteralFn>,
    arguments: Arc<ArgumentFn>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(Config::default())
    }
}

impl Runtime {
    /// Runtime with the default literal parser and splat expansion.
    pub fn new(config: Config) -> Self {
        debug!(
            max_stack_depth = config.max_stack_depth,
            parallel_arguments = config.parallel_arguments,
            "runtime created"
        );
        Runtime {
            config,
            literal: Arc::new(parse_literal),
            arguments: Arc::new(expand_unwraps),
        }
    }

    #[must_use]
    pub fn with_literal_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.literal = Arc::new(parser);
        self
    }

    #[must_use]
    pub fn with_argument_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>, Error> + Send + Sync + 'static,
    {
        self.arguments = Arc::new(processor);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One frame holding the control constructs and the standard extensions.
    pub fn global_stack(&self) -> Stack {
        let stack = Stack::new().push(Frame::new());
        let stack = load_modules(&stack, core_modules().iter().cloned());
        load_extensions(&stack, standard_extensions().iter().cloned())
    }

    /// Fresh top-level context carrying the configured timeout.
    pub fn context(&self) -> Context {
        match self.config.timeout {
            Some(timeout) => Context::new().with_timeout(timeout),
            None => Context::new(),
        }
    }

    /// Evaluate a top-level expression against a fresh global stack.
    pub fn eval(&self, expr: &Expr) -> Result<Value, Error> {
        self.step(&self.context(), &self.global_stack(), expr)
    }

    /// Read one form and evaluate it.
    #[cfg(feature = "sexpr")]
    pub fn eval_str(&self, input: &str) -> Result<Value, Error> {
        let expr = crate::sexpr::parse(input)?;
        self.eval(&expr)
    }

    /// Literal value of a token, if it is one
    pub fn literal(&self, token: &str) -> Option<Value> {
        (self.literal)(token)
    }

    /// Run the argument post-processor.
    pub fn process_arguments(&self, values: Vec<Value>) -> Result<Vec<Value>, Error> {
        (self.arguments)(values)
    }

    /// Evaluate one expression.
    ///
    /// Checks cancellation and the deadline, then the stack depth, before
    /// doing any work. Neither `stack` nor `expr` is modified.
    pub fn step(&self, ctx: &Context, stack: &Stack, expr: &Expr) -> Result<Value, Error> {
        ctx.check()?;
        if stack.depth() > self.config.max_stack_depth {
            debug!(
                depth = stack.depth(),
                limit = self.config.max_stack_depth,
                "stack overflow"
            );
            return Err(Error::StackOverflow {
                limit: self.config.max_stack_depth,
            });
        }
        ensure_sufficient_stack(|| self.eval_expr(ctx, stack, expr))
    }

    fn eval_expr(&self, ctx: &Context, stack: &Stack, expr: &Expr) -> Result<Value, Error> {
        match expr {
            Expr::Atom(token) => self.resolve(token, stack),
            Expr::Apply { command, args } => {
                let callee = self.step(&ctx.non_tail(), stack, command)?;
                let result = match callee {
                    Value::Module { native, .. } => native(self, ctx, stack, args),
                    Value::Closure {
                        params,
                        body,
                        captured,
                    } => self.apply_closure(ctx, stack, &params, &body, &captured, args),
                    other => Err(Error::CannotExecute(format!(
                        "{other} is a {}, not a function or module (in {expr})",
                        other.kind()
                    ))),
                };
                result.map_err(|err| add_context(err, expr))
            }
        }
    }

    fn resolve(&self, token: &str, stack: &Stack) -> Result<Value, Error> {
        if let Some(value) = self.literal(token) {
            return Ok(value);
        }
        stack
            .lookup(token)
            .cloned()
            .ok_or_else(|| Error::NameNotFound(token.to_owned()))
    }

    fn apply_closure(
        &self,
        ctx: &Context,
        stack: &Stack,
        params: &[Name],
        body: &Arc<Expr>,
        captured: &Frame,
        args: &[Expr],
    ) -> Result<Value, Error> {
        let values = self.eval_arguments(ctx, stack, args)?;
        let values = self.process_arguments(values)?;
        // Surplus arguments are dropped; too few is an error, no partial application
        if values.len() < params.len() {
            return Err(Error::arity_error_with_expr(
                params.len(),
                values.len(),
                format!("(lambda {} {body})", params.join(" ")),
            ));
        }

        let local = params
            .iter()
            .zip(values)
            .fold(captured.clone(), |frame, (param, value)| {
                frame.set(param.clone(), value)
            });

        let call_stack = if ctx.is_tail() {
            trace!(depth = stack.depth(), "tail call reuses top frame");
            stack.replace_top(local)
        } else {
            trace!(depth = stack.depth() + 1, "closure call pushes frame");
            stack.push(local)
        };
        self.step(&ctx.tail(), &call_stack, body)
    }

    /// Evaluate argument expressions against one stack snapshot, in non-tail
    /// position, returning values in argument order.
    ///
    /// With [`Config::parallel_arguments`] the arguments run on the rayon pool
    /// under a child cancellation token; the first failure cancels the
    /// siblings and is the error returned.
    pub fn eval_arguments(
        &self,
        ctx: &Context,
        stack: &Stack,
        args: &[Expr],
    ) -> Result<Vec<Value>, Error> {
        let ctx = ctx.non_tail();
        if !self.config.parallel_arguments || args.len() < 2 {
            return args.iter().map(|arg| self.step(&ctx, stack, arg)).collect();
        }

        let siblings = ctx.child();
        let first_error: OnceLock<Error> = OnceLock::new();
        let results: Vec<Option<Value>> = args
            .par_iter()
            .map(|arg| match self.step(&siblings, stack, arg) {
                Ok(value) => Some(value),
                Err(err) => {
                    if first_error.set(err).is_ok() {
                        siblings.cancellation().cancel();
                    }
                    None
                }
            })
            .collect();

        match first_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(results.into_iter().flatten().collect()),
        }
    }
}

/// Attach the failing expression to type and evaluation errors, once.
fn add_context(error: Error, expr: &Expr) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains(MARKER) => {
            Error::TypeError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        other => other,
    }
}

/// Default literal parser.
///
/// `_` is the wildcard, `*` the unwrap marker, `[]` the empty list, a
/// double-quoted token a list of character codes; anything that parses as
/// an `i64` is an integer. Every other token is a name.
pub fn parse_literal(token: &str) -> Option<Value> {
    match token {
        "_" => Some(Value::Wildcard),
        "*" => Some(Value::Unwrap),
        "[]" => Some(Value::List(im::Vector::new())),
        _ if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') => {
            let text = unescape(&token[1..token.len() - 1])?;
            Some(Value::List(
                text.chars()
                    .map(|c| Value::Int(NumberType::from(u32::from(c))))
                    .collect(),
            ))
        }
        _ => token.parse::<NumberType>().ok().map(Value::Int),
    }
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            // An unescaped quote inside means this was not one string token
            if c == '"' {
                return None;
            }
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Run `f` with enough native stack, growing it on the heap when the
/// remaining space drops below the red zone.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    const RED_ZONE: usize = 100 * 1024;
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

//! Modules and extensions: how native Rust code enters the language.
//!
//! A [`Module`] is the raw form. Its handler receives the runtime, the current
//! context and stack, and the *unevaluated* argument expressions, so it can
//! implement control constructs such as `let` or `match`.
//!
//! An [`Extension`] is the convenient form. Its native function only sees
//! evaluated, splat-expanded argument values; [`Extension::into_module`] wraps
//! it in a module that does the evaluation. Typed Rust functions can be
//! adapted with [`Extension::fixed`] and [`Extension::variadic`]:
//!
//! ```
//! use sprig::extension::{Arity, Extension};
//! use sprig::evaluator::IntIter;
//!
//! fn double(n: i64) -> i64 {
//!     n * 2
//! }
//! fn total(nums: IntIter<'_>) -> i64 {
//!     nums.sum()
//! }
//!
//! let double = Extension::fixed::<_, (i64,)>("double", "Doubles an integer", double);
//! let total = Extension::variadic::<_, (IntIter<'static>,)>(
//!     "total",
//!     "Sums its arguments",
//!     Arity::AtLeast(0),
//!     total,
//! );
//! assert_eq!(double.name(), "double");
//! assert_eq!(total.arity(), Arity::AtLeast(0));
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::Error;
use crate::ast::{Expr, Name, Value};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::{Context, Frame, Runtime, Stack};

/// Handler of a [`Value::Module`]: receives unevaluated argument expressions.
pub type ModuleFn =
    dyn Fn(&Runtime, &Context, &Stack, &[Expr]) -> Result<Value, Error> + Send + Sync;

/// Native function of an [`Extension`]: receives evaluated, expanded arguments.
pub type ExtensionFn = dyn Fn(&Context, Vec<Value>) -> Result<Value, Error> + Send + Sync;

/// Number of arguments an extension accepts after splat expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly N arguments
    Exact(usize),
    /// At least N arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check an argument count against this arity
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(expected) if got != expected => Err(Error::arity_error(expected, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(min, _) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(_, max) if got > max => Err(Error::arity_error(max, got)),
            _ => Ok(()),
        }
    }
}

/// A control construct or other raw built-in, ready to be bound in a frame.
#[derive(Clone)]
pub struct Module {
    name: Name,
    native: Arc<ModuleFn>,
    doc: Arc<str>,
}

impl Module {
    pub fn new<F>(name: &str, doc: &str, native: F) -> Self
    where
        F: Fn(&Runtime, &Context, &Stack, &[Expr]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Module {
            name: Arc::from(name),
            native: Arc::new(native),
            doc: Arc::from(doc),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// The runtime value bound under [`Module::name`]
    pub fn to_value(&self) -> Value {
        Value::Module {
            name: self.name.clone(),
            native: self.native.clone(),
            doc: self.doc.clone(),
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Module({})", self.name)
    }
}

/// A native function over evaluated arguments.
#[derive(Clone)]
pub struct Extension {
    name: Name,
    native: Arc<ExtensionFn>,
    doc: Arc<str>,
    arity: Arity,
}

impl Extension {
    /// Low-level constructor: the native function does its own argument checking.
    ///
    /// The context is passed through so long-running natives can poll
    /// [`Context::check`].
    pub fn new<F>(name: &str, doc: &str, native: F) -> Self
    where
        F: Fn(&Context, Vec<Value>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Extension {
            name: Arc::from(name),
            native: Arc::new(native),
            doc: Arc::from(doc),
            arity: Arity::Any,
        }
    }

    /// Adapt a function with a fixed list of typed parameters.
    ///
    /// The arity is the number of parameters; a mismatch after splat
    /// expansion is an [`Error::ArityMismatch`] and a conversion failure is an
    /// [`Error::TypeError`].
    pub fn fixed<F, Args>(name: &str, doc: &str, func: F) -> Self
    where
        F: IntoOperation<Args>,
    {
        let arity = Arity::Exact(<F as IntoOperation<Args>>::ARITY);
        Self::from_operation(name, doc, arity, func.into_operation())
    }

    /// Adapt a function whose last parameter collects the remaining arguments.
    pub fn variadic<F, Args>(name: &str, doc: &str, arity: Arity, func: F) -> Self
    where
        F: IntoVariadicOperation<Args>,
    {
        Self::from_operation(name, doc, arity, func.into_variadic_operation())
    }

    fn from_operation(name: &str, doc: &str, arity: Arity, op: Arc<OperationFn>) -> Self {
        let label: Name = Arc::from(name);
        let context_label = label.clone();
        Extension {
            name: label,
            native: Arc::new(move |_ctx: &Context, args: Vec<Value>| {
                arity.validate(args.len()).map_err(|err| match err {
                    Error::ArityMismatch { expected, got, .. } => {
                        Error::arity_error_with_expr(expected, got, context_label.to_string())
                    }
                    other => other,
                })?;
                op(args)
            }),
            doc: Arc::from(doc),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Call the native function directly with already-evaluated arguments.
    pub fn call(&self, ctx: &Context, args: Vec<Value>) -> Result<Value, Error> {
        (self.native)(ctx, args)
    }

    /// Wrap into a module that evaluates its argument expressions, runs the
    /// runtime's argument post-processor, then calls the native function.
    pub fn into_module(self) -> Module {
        let native = self.native;
        Module {
            name: self.name,
            native: Arc::new(move |rt: &Runtime, ctx: &Context, stack: &Stack, args: &[Expr]| {
                let values = rt.eval_arguments(ctx, stack, args)?;
                let values = rt.process_arguments(values)?;
                native(ctx, values)
            }),
            doc: self.doc,
        }
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Extension({}, {:?})", self.name, self.arity)
    }
}

/// Default argument post-processor: splice `*`-marked lists into the argument list.
///
/// `*` followed by a list is replaced by the list's elements; `*` followed by
/// another `*` survives the pass so the following pass can expand whatever
/// the inner `*` produced. Passes repeat until nothing changes.
pub fn expand_unwraps(mut values: Vec<Value>) -> Result<Vec<Value>, Error> {
    while values.iter().any(|v| matches!(v, Value::Unwrap)) {
        values = expand_once(values)?;
    }
    Ok(values)
}

fn expand_once(values: Vec<Value>) -> Result<Vec<Value>, Error> {
    let mut out = Vec::with_capacity(values.len());
    let mut iter = values.into_iter().peekable();
    while let Some(value) = iter.next() {
        if !matches!(value, Value::Unwrap) {
            out.push(value);
            continue;
        }
        if let Some(Value::List(items)) = iter.next_if(|next| matches!(next, Value::List(_))) {
            out.extend(items);
            continue;
        }
        match iter.peek() {
            // Kept for the next pass; the following `*` gets its own turn
            Some(Value::Unwrap) => out.push(Value::Unwrap),
            Some(other) => return Err(unwrap_target(other)),
            None => return Err(Error::InvalidUnwrapTarget("end of arguments".into())),
        }
    }
    Ok(out)
}

fn unwrap_target(value: &Value) -> Error {
    Error::InvalidUnwrapTarget(format!("{} ({value})", value.kind()))
}

/// Bind modules into the stack's top frame (creating one if the stack is empty).
#[must_use]
pub fn load_modules<I>(stack: &Stack, modules: I) -> Stack
where
    I: IntoIterator<Item = Module>,
{
    let mut top = stack.peek().cloned().unwrap_or_else(Frame::new);
    let mut count = 0usize;
    for module in modules {
        top = top.set(module.name.clone(), module.to_value());
        count += 1;
    }
    debug!(count, depth = stack.depth(), "loaded modules");
    stack.replace_top(top)
}

/// Wrap each extension into a module and bind it in the stack's top frame.
#[must_use]
pub fn load_extensions<I>(stack: &Stack, extensions: I) -> Stack
where
    I: IntoIterator<Item = Extension>,
{
    load_modules(stack, extensions.into_iter().map(Extension::into_module))
}

//! This module defines the expression tree consumed by the evaluator and the
//! runtime values it produces. [`Expr`] has exactly two shapes (an atomic token
//! and an application node) and is immutable once built; children are reference
//! counted so a closure can keep its body alive without copying the tree.
//! [`Value`] is the closed set of runtime values. Helper functions such as
//! [`atom`], [`apply`] and [`val`] keep AST construction terse in code and tests,
//! and the `From` impls let Rust integers, booleans and collections become values.

use std::sync::Arc;

use crate::Error;
use crate::evaluator::Frame;
use crate::extension::ModuleFn;

/// Type alias for number values in the interpreter
pub type NumberType = i64;

/// Interned-by-refcount binding name
pub type Name = Arc<str>;

/// Expression tree produced by the reader.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Literal, identifier, or one of the markers `_` and `*`
    Atom(Arc<str>),
    /// `(command arg...)`; never built with an empty argument list by the reader
    Apply {
        command: Arc<Expr>,
        args: Arc<[Expr]>,
    },
}

impl Expr {
    /// The token of an atom, `None` for applications
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Expr::Atom(token) => Some(token),
            Expr::Apply { .. } => None,
        }
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Atom(token) => write!(f, "Atom({token})"),
            Expr::Apply { command, args } => {
                write!(f, "Apply({command:?}")?;
                for arg in args.iter() {
                    write!(f, ", {arg:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Atom(token) => write!(f, "{token}"),
            Expr::Apply { command, args } => {
                write!(f, "({command}")?;
                for arg in args.iter() {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Build an atom expression
pub fn atom<S: AsRef<str>>(token: S) -> Expr {
    Expr::Atom(Arc::from(token.as_ref()))
}

/// Build an application expression
pub fn apply(command: Expr, args: Vec<Expr>) -> Expr {
    Expr::Apply {
        command: Arc::new(command),
        args: Arc::from(args),
    }
}

/// Core runtime value type
///
/// Booleans are not a separate kind: comparisons yield `Int(1)` or `Int(0)`.
#[derive(Clone)]
pub enum Value {
    /// Numbers (integers only)
    Int(NumberType),
    /// Immutable lists; `im::Vector` shares structure on append and slice
    List(im::Vector<Value>),
    /// The `*` marker, expanded away before an extension or closure sees its arguments
    Unwrap,
    /// The `_` marker, matches any subject in a `match` case
    Wildcard,
    /// User-defined functions (params, body, captured frame)
    Closure {
        params: Arc<[Name]>,
        body: Arc<Expr>,
        captured: Frame,
    },
    /// Built-in constructs and adapted extensions; they receive unevaluated arguments
    /// Uses name for equality comparison instead of function pointer
    Module {
        name: Name,
        native: Arc<ModuleFn>,
        doc: Arc<str>,
    },
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Unwrap => write!(f, "Unwrap"),
            Value::Wildcard => write!(f, "Wildcard"),
            Value::Closure { params, body, .. } => {
                write!(f, "Closure(params={params:?}, body={body})")
            }
            Value::Module { name, .. } => write!(f, "Module({name})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(NumberType::from(b))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<im::Vector<Value>> for Value {
    fn from(v: im::Vector<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl std::convert::TryInto<NumberType> for Value {
    type Error = Error;

    fn try_into(self) -> Result<NumberType, Error> {
        if let Value::Int(n) = self {
            Ok(n)
        } else {
            Err(Error::TypeError(format!("expected integer, got {self}")))
        }
    }
}

impl std::convert::TryInto<bool> for Value {
    type Error = Error;

    fn try_into(self) -> Result<bool, Error> {
        match self {
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(Error::TypeError(format!("expected boolean (0 or 1), got {other}"))),
        }
    }
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
pub fn nil() -> Value {
    Value::List(im::Vector::new())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::List(elements) => {
                write!(f, "[")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            Value::Unwrap => write!(f, "*"),
            Value::Wildcard => write!(f, "_"),
            Value::Closure { params, .. } => {
                write!(f, "#<closure")?;
                for param in params.iter() {
                    write!(f, " {param}")?;
                }
                write!(f, ">")
            }
            Value::Module { name, .. } => write!(f, "#<module:{name}>"),
        }
    }
}

impl Value {
    /// Check if a value represents the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    /// Short kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::List(_) => "list",
            Value::Unwrap => "unwrap marker",
            Value::Wildcard => "wildcard",
            Value::Closure { .. } => "closure",
            Value::Module { .. } => "module",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Unwrap, Value::Unwrap) | (Value::Wildcard, Value::Wildcard) => true,
            (
                Value::Closure {
                    params: p1,
                    body: b1,
                    captured: c1,
                },
                Value::Closure {
                    params: p2,
                    body: b2,
                    captured: c2,
                },
            ) => p1 == p2 && b1 == b2 && c1 == c2,
            // Compare modules by name, not function pointer
            (Value::Module { name: n1, .. }, Value::Module { name: n2, .. }) => n1 == n2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Int(42)),
            (val(-17), Value::Int(-17)),
            (val(4294967295u32), Value::Int(4294967295)),
            (val(-128i8), Value::Int(-128)),
            (val(NumberType::MAX), Value::Int(NumberType::MAX)),
            (val(NumberType::MIN), Value::Int(NumberType::MIN)),
            // Booleans are integers
            (val(true), Value::Int(1)),
            (val(false), Value::Int(0)),
            (nil(), Value::List(im::Vector::new())),
            (
                val([1, 2, 3]),
                Value::List(im::vector![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ),
            (
                val(vec![val([1]), val(2)]),
                Value::List(im::vector![
                    Value::List(im::vector![Value::Int(1)]),
                    Value::Int(2)
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_value_display() {
        assert_eq!(val(-5).to_string(), "-5");
        assert_eq!(val([1, 2, 3]).to_string(), "[1 2 3]");
        assert_eq!(nil().to_string(), "[]");
        assert_eq!(val(vec![val([1, 2]), nil()]).to_string(), "[[1 2] []]");
        assert_eq!(Value::Unwrap.to_string(), "*");
        assert_eq!(Value::Wildcard.to_string(), "_");
    }

    #[test]
    fn test_markers_compare_by_kind() {
        assert_eq!(Value::Wildcard, Value::Wildcard);
        assert_eq!(Value::Unwrap, Value::Unwrap);
        assert_ne!(Value::Wildcard, Value::Unwrap);
        assert_ne!(Value::Wildcard, val(0));
        assert_ne!(nil(), val(0));
    }

    #[test]
    fn test_expr_display() {
        let expr = apply(atom("add"), vec![atom("1"), apply(atom("f"), vec![atom("x")])]);
        assert_eq!(expr.to_string(), "(add 1 (f x))");
        assert_eq!(expr.as_atom(), None);
        assert_eq!(atom("x").as_atom(), Some("x"));
    }

    #[test]
    fn test_bool_conversion_is_strict() {
        let t: Result<bool, Error> = val(1).try_into();
        assert_eq!(t, Ok(true));
        let bad: Result<bool, Error> = val(2).try_into();
        assert!(bad.is_err());
    }
}

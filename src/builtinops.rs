//! Built-in control constructs and the standard extension library.
//!
//! ## Control constructs
//!
//! `let`, `lambda` and `match` are [`Module`]s: they receive their argument
//! expressions unevaluated and decide what to evaluate, in which scope and in
//! which position.
//!
//! ```text
//! (let n1 v1 n2 v2 ... final)        ; sequential bindings, final is a tail position
//! (lambda p1 p2 ... body)            ; captures the current top frame
//! (match subject c1 r1 ... default)  ; `_` as a case matches anything
//! ```
//!
//! ## Standard extensions
//!
//! Everything else is an ordinary [`Extension`] over evaluated arguments:
//! integer arithmetic, comparisons, strict boolean logic and immutable list
//! operations.
//!
//! - **Type Safety**: Operations reject incorrect types (e.g., `(not 42)` errors)
//! - **No Coercion**: there is no "truthiness"; booleans are exactly `0` and `1`
//! - **Overflow Detection**: Arithmetic operations detect and report overflow
//! - **Arity Checking**: Strict argument count validation for all functions
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`NumberType`, `bool`,
//!    `Value`, or the iterator types for list and rest parameters)
//! 2. **Add it to STANDARD_EXTENSIONS** with `Extension::fixed` or
//!    `Extension::variadic` and a doc string
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::ast::{Expr, Name, NumberType, Value};
use crate::evaluator::{BoolIter, Context, Frame, IntIter, ListIter, Runtime, Stack, ValueIter};
use crate::extension::{Arity, Extension, Module};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

//
// Control constructs
//

fn binding_name(rt: &Runtime, expr: &Expr, construct: &'static str) -> Result<Name, Error> {
    match expr {
        Expr::Atom(token) if rt.literal(token).is_none() => Ok(token.clone()),
        Expr::Atom(token) => Err(Error::malformed(
            construct,
            format!("cannot bind the literal `{token}`"),
        )),
        Expr::Apply { .. } => Err(Error::malformed(
            construct,
            format!("expected a name, got {expr}"),
        )),
    }
}

/// `(let n1 v1 ... final)`
pub(crate) fn eval_let(
    rt: &Runtime,
    ctx: &Context,
    stack: &Stack,
    args: &[Expr],
) -> Result<Value, Error> {
    let Some((last, bindings)) = args.split_last() else {
        return Err(Error::malformed("let", "requires a final expression"));
    };
    if !bindings.len().is_multiple_of(2) {
        return Err(Error::malformed(
            "let",
            format!(
                "expected name/value pairs followed by one final expression, got {} arguments",
                args.len()
            ),
        ));
    }

    // In tail position the caller's frame is finished with, so bind into it
    let mut scope = if ctx.is_tail() {
        stack.clone()
    } else {
        stack.push(Frame::new())
    };
    let binding_ctx = ctx.non_tail();
    for pair in bindings.chunks_exact(2) {
        let name = binding_name(rt, &pair[0], "let")?;
        let value = rt.step(&binding_ctx, &scope, &pair[1])?;
        scope = scope.bind(name, value);
    }
    rt.step(&ctx.tail(), &scope, last)
}

/// `(lambda p1 ... body)`
pub(crate) fn eval_lambda(
    rt: &Runtime,
    _ctx: &Context,
    stack: &Stack,
    args: &[Expr],
) -> Result<Value, Error> {
    let Some((body, param_exprs)) = args.split_last() else {
        return Err(Error::malformed("lambda", "requires a body"));
    };

    let mut params: Vec<Name> = Vec::with_capacity(param_exprs.len());
    for expr in param_exprs {
        let name = binding_name(rt, expr, "lambda")?;
        if params.contains(&name) {
            return Err(Error::malformed(
                "lambda",
                format!("duplicate parameter name: {name}"),
            ));
        }
        params.push(name);
    }

    Ok(Value::Closure {
        params: params.into(),
        body: Arc::new(body.clone()),
        captured: stack.peek().cloned().unwrap_or_default(),
    })
}

/// `(match subject c1 r1 ... default)`
pub(crate) fn eval_match(
    rt: &Runtime,
    ctx: &Context,
    stack: &Stack,
    args: &[Expr],
) -> Result<Value, Error> {
    let [subject_expr, rest @ ..] = args else {
        return Err(Error::malformed("match", "requires a subject and a default"));
    };
    if rest.len().is_multiple_of(2) {
        return Err(Error::malformed(
            "match",
            format!(
                "expected a subject, case/result pairs and a default, got {} arguments",
                args.len()
            ),
        ));
    }

    let probe = ctx.non_tail();
    let subject = rt.step(&probe, stack, subject_expr)?;
    let (default, cases) = rest.split_last().ok_or(Error::NoMatchingCase)?;
    for pair in cases.chunks_exact(2) {
        let case = rt.step(&probe, stack, &pair[0])?;
        if case == Value::Wildcard || case == subject {
            return rt.step(ctx, stack, &pair[1]);
        }
    }
    rt.step(ctx, stack, default)
}

//
// Standard extension implementations
//

fn expect_list(value: Value, op: &str) -> Result<im::Vector<Value>, Error> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(Error::TypeError(format!(
            "{op} requires a list, got {other}"
        ))),
    }
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: NumberType, rest: IntIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn builtin_add(args: IntIter<'_>) -> Result<NumberType, Error> {
    let mut sum: NumberType = 0;
    for arg in args {
        sum = sum
            .checked_add(arg)
            .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))?;
    }
    Ok(sum)
}

fn builtin_sub(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut iter = rest.peekable();

    if iter.peek().is_none() {
        return builtin_neg(first);
    }

    let mut result = first;
    for n in iter {
        result = result
            .checked_sub(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in subtraction".into()))?;
    }
    Ok(result)
}

fn builtin_mul(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut product = first;
    for n in rest {
        product = product
            .checked_mul(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in multiplication".into()))?;
    }
    Ok(product)
}

fn builtin_div(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut quotient = first;
    for n in rest {
        if n == 0 {
            return Err(Error::EvalError("division by zero".into()));
        }
        quotient = quotient
            .checked_div(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in division".into()))?;
    }
    Ok(quotient)
}

fn builtin_mod(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(Error::EvalError("division by zero".into()));
    }
    a.checked_rem(b)
        .ok_or_else(|| Error::EvalError("Integer overflow in remainder".into()))
}

fn builtin_neg(n: NumberType) -> Result<NumberType, Error> {
    n.checked_neg()
        .ok_or_else(|| Error::EvalError("Integer overflow in negation".into()))
}

fn builtin_eq(first: Value, mut rest: ValueIter<'_>) -> bool {
    rest.all(|v| *v == first)
}

fn builtin_ne(a: Value, b: Value) -> bool {
    a != b
}

fn builtin_not(b: bool) -> bool {
    !b
}

// Arguments are evaluated before the call, so there is no short circuit
fn builtin_and(mut args: BoolIter<'_>) -> bool {
    args.all(|b| b)
}

fn builtin_or(mut args: BoolIter<'_>) -> bool {
    args.any(|b| b)
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::List(args.cloned().collect())
}

fn builtin_len(list: Value) -> Result<NumberType, Error> {
    let items = expect_list(list, "len")?;
    NumberType::try_from(items.len())
        .map_err(|_| Error::EvalError("list too long to measure".into()))
}

fn builtin_head(list: Value) -> Result<Value, Error> {
    expect_list(list, "head")?
        .front()
        .cloned()
        .ok_or_else(|| Error::EvalError("head of empty list".into()))
}

fn builtin_tail(list: Value) -> Result<Value, Error> {
    let items = expect_list(list, "tail")?;
    if items.is_empty() {
        return Err(Error::EvalError("tail of empty list".into()));
    }
    Ok(Value::List(items.skip(1)))
}

fn builtin_cons(first: Value, rest: Value) -> Result<Value, Error> {
    let mut items = expect_list(rest, "cons")?;
    items.push_front(first);
    Ok(Value::List(items))
}

fn builtin_append(list: Value, last: Value) -> Result<Value, Error> {
    let mut items = expect_list(list, "append")?;
    items.push_back(last);
    Ok(Value::List(items))
}

fn builtin_concat(lists: ListIter<'_>) -> Value {
    let mut result = im::Vector::new();
    for list in lists {
        result.append(list.clone());
    }
    Value::List(result)
}

fn builtin_nth(list: Value, index: NumberType) -> Result<Value, Error> {
    let items = expect_list(list, "nth")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or_else(|| {
            Error::EvalError(format!(
                "index {index} out of range for list of length {}",
                items.len()
            ))
        })
}

fn builtin_range(start: NumberType, end: NumberType) -> Value {
    Value::List((start..end).map(Value::Int).collect())
}

fn builtin_reverse(list: Value) -> Result<Value, Error> {
    let items = expect_list(list, "reverse")?;
    Ok(Value::List(items.into_iter().rev().collect()))
}

fn builtin_doc(value: Value) -> Result<Value, Error> {
    match value {
        Value::Module { doc, .. } => Ok(Value::List(
            doc.chars()
                .map(|c| Value::Int(NumberType::from(u32::from(c))))
                .collect(),
        )),
        other => Err(Error::TypeError(format!(
            "doc requires a module, got {}",
            other.kind()
        ))),
    }
}

/// The control constructs, bound by [`Runtime::global_stack`].
static CORE_MODULES: LazyLock<Vec<Module>> = LazyLock::new(|| {
    vec![
        Module::new(
            "let",
            "(let n1 v1 ... final): bind names in order, then evaluate final",
            eval_let,
        ),
        Module::new(
            "lambda",
            "(lambda p1 ... body): closure over the current scope",
            eval_lambda,
        ),
        Module::new(
            "match",
            "(match subject c1 r1 ... default): first case equal to subject, or `_`",
            eval_match,
        ),
    ]
});

/// Global registry of the standard extensions.
///
/// Kept as one contiguous collection for ease of auditing; every entry is
/// wired through the same typed adapters hosts use for their own extensions.
static STANDARD_EXTENSIONS: LazyLock<Vec<Extension>> = LazyLock::new(|| {
    type Rest = IntIter<'static>;
    type Values = ValueIter<'static>;

    vec![
        // Arithmetic
        Extension::variadic::<_, (Rest,)>("add", "Sum of integers", Arity::Any, builtin_add),
        Extension::variadic::<_, (NumberType, Rest)>(
            "sub",
            "Subtract the rest from the first; negate a single argument",
            Arity::AtLeast(1),
            builtin_sub,
        ),
        Extension::variadic::<_, (NumberType, Rest)>(
            "mul",
            "Product of integers",
            Arity::AtLeast(1),
            builtin_mul,
        ),
        Extension::variadic::<_, (NumberType, Rest)>(
            "div",
            "Truncating division, left to right",
            Arity::AtLeast(2),
            builtin_div,
        ),
        Extension::fixed::<_, (NumberType, NumberType)>(
            "mod",
            "Remainder with the sign of the dividend",
            builtin_mod,
        ),
        Extension::fixed::<_, (NumberType,)>("neg", "Negation", builtin_neg),
        // Comparison
        Extension::variadic::<_, (Value, Values)>(
            "eq",
            "1 if all arguments are structurally equal",
            Arity::AtLeast(2),
            builtin_eq,
        ),
        Extension::fixed::<_, (Value, Value)>("ne", "1 if the arguments differ", builtin_ne),
        Extension::variadic::<_, (NumberType, Rest)>(
            "lt",
            "1 if strictly increasing",
            Arity::AtLeast(2),
            builtin_lt,
        ),
        Extension::variadic::<_, (NumberType, Rest)>(
            "le",
            "1 if non-decreasing",
            Arity::AtLeast(2),
            builtin_le,
        ),
        Extension::variadic::<_, (NumberType, Rest)>(
            "gt",
            "1 if strictly decreasing",
            Arity::AtLeast(2),
            builtin_gt,
        ),
        Extension::variadic::<_, (NumberType, Rest)>(
            "ge",
            "1 if non-increasing",
            Arity::AtLeast(2),
            builtin_ge,
        ),
        // Logic
        Extension::fixed::<_, (bool,)>("not", "Boolean negation", builtin_not),
        Extension::variadic::<_, (BoolIter<'static>,)>(
            "and",
            "1 if every argument is 1",
            Arity::AtLeast(1),
            builtin_and,
        ),
        Extension::variadic::<_, (BoolIter<'static>,)>(
            "or",
            "1 if any argument is 1",
            Arity::AtLeast(1),
            builtin_or,
        ),
        // Lists
        Extension::variadic::<_, (Values,)>("list", "List of the arguments", Arity::Any, builtin_list),
        Extension::fixed::<_, (Value,)>("len", "Number of elements", builtin_len),
        Extension::fixed::<_, (Value,)>("head", "First element", builtin_head),
        Extension::fixed::<_, (Value,)>("tail", "All but the first element", builtin_tail),
        Extension::fixed::<_, (Value, Value)>("cons", "Prepend an element", builtin_cons),
        Extension::fixed::<_, (Value, Value)>("append", "Append an element", builtin_append),
        Extension::variadic::<_, (ListIter<'static>,)>(
            "concat",
            "Concatenation of lists",
            Arity::Any,
            builtin_concat,
        ),
        Extension::fixed::<_, (Value, NumberType)>("nth", "Element at a 0-based index", builtin_nth),
        Extension::fixed::<_, (NumberType, NumberType)>(
            "range",
            "Integers from start (inclusive) to end (exclusive)",
            builtin_range,
        ),
        Extension::fixed::<_, (Value,)>("reverse", "Elements in reverse order", builtin_reverse),
        Extension::fixed::<_, (Value,)>("doc", "Documentation text of a module", builtin_doc),
    ]
});

/// Lazy static map from name to extension (private - use find_extension)
static EXTENSION_INDEX: LazyLock<HashMap<&'static str, &'static Extension>> =
    LazyLock::new(|| {
        let extensions: &'static [Extension] = STANDARD_EXTENSIONS.as_slice();
        extensions.iter().map(|ext| (ext.name(), ext)).collect()
    });

/// `let`, `lambda` and `match`
pub fn core_modules() -> &'static [Module] {
    CORE_MODULES.as_slice()
}

pub fn standard_extensions() -> &'static [Extension] {
    STANDARD_EXTENSIONS.as_slice()
}

pub fn find_extension(name: &str) -> Option<&'static Extension> {
    EXTENSION_INDEX.get(name).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, val};

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    fn text(s: &str) -> Value {
        Value::List(s.chars().map(|c| val(c as u32)).collect())
    }

    /// Invoke an extension through the registry with already-evaluated
    /// arguments, exercising the adapter layer and arity checks.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let ext = find_extension(name).unwrap();
        ext.call(&Context::new(), args.to_vec())
    }

    #[test]
    fn test_registry() {
        assert_eq!(find_extension("add").unwrap().arity(), Arity::Any);
        assert_eq!(find_extension("not").unwrap().arity(), Arity::Exact(1));
        assert_eq!(find_extension("lt").unwrap().arity(), Arity::AtLeast(2));
        assert!(find_extension("let").is_none());
        assert!(find_extension("unknown").is_none());

        let names: Vec<&str> = core_modules().iter().map(Module::name).collect();
        assert_eq!(names, vec!["let", "lambda", "match"]);

        // Names are unique
        assert_eq!(EXTENSION_INDEX.len(), standard_extensions().len());
        for ext in standard_extensions() {
            assert!(!ext.doc().is_empty(), "{} has no doc", ext.name());
        }
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();
        let all_fives: Vec<Value> = (0..10).map(|_| val(5)).collect();
        let mut mostly_fives = all_fives.clone();
        mostly_fives.push(val(6));
        let nested = val([val([val([1])])]);
        let mixed = val(vec![val(1), val([2]), nil()]);

        let test_cases: Vec<TestCase> = vec![
            // === ARITHMETIC ===
            test!("add", &[], success(0)),
            test!("add", &[val(1), val(2), val(3)], success(6)),
            test!("add", &many_ones, success(100)),
            test!("add", &[val(i64::MAX), val(1)], None),
            test!("add", &[val(1), nil()], None),
            test!("sub", &[val(10), val(3), val(2)], success(5)),
            test!("sub", &[val(5)], success(-5)),
            test!("sub", &[], None),
            test!("sub", &[val(i64::MIN)], None),
            test!("sub", &[val(i64::MIN), val(1)], None),
            test!("mul", &[val(2), val(3), val(4)], success(24)),
            test!("mul", &[val(7)], success(7)),
            test!("mul", &[val(i64::MAX), val(2)], None),
            test!("div", &[val(20), val(2), val(5)], success(2)),
            test!("div", &[val(-7), val(2)], success(-3)),
            test!("div", &[val(1), val(0)], None),
            test!("div", &[val(i64::MIN), val(-1)], None),
            test!("div", &[val(1)], None),
            test!("mod", &[val(7), val(3)], success(1)),
            test!("mod", &[val(-7), val(3)], success(-1)),
            test!("mod", &[val(7), val(0)], None),
            test!("neg", &[val(4)], success(-4)),
            test!("neg", &[val(1), val(2)], None),
            // === COMPARISON ===
            test!("eq", &[val(1), val(1)], success(true)),
            test!("eq", &all_fives, success(true)),
            test!("eq", &mostly_fives, success(false)),
            test!("eq", &[val([1, 2]), val([1, 2])], success(true)),
            test!("eq", &[val([1, 2]), val([2, 1])], success(false)),
            test!("eq", &[nil(), val(0)], success(false)),
            test!("eq", &[val(1)], None),
            test!("ne", &[val(1), val(2)], success(true)),
            test!("ne", &[nil(), nil()], success(false)),
            test!("lt", &[val(1), val(2), val(3)], success(true)),
            test!("lt", &[val(1), val(3), val(2)], success(false)),
            test!("lt", &[val(1), val(1)], success(false)),
            test!("le", &[val(1), val(1), val(2)], success(true)),
            test!("gt", &[val(3), val(2), val(1)], success(true)),
            test!("ge", &[val(3), val(3), val(4)], success(false)),
            test!("lt", &[val(1)], None),
            test!("lt", &[val(1), nil()], None),
            // === LOGIC ===
            test!("not", &[val(true)], success(false)),
            test!("not", &[val(0)], success(true)),
            test!("not", &[val(42)], None),
            test!("and", &[val(1), val(1), val(0)], success(false)),
            test!("and", &[val(1)], success(true)),
            test!("and", &[val(1), val(2)], None),
            test!("or", &[val(0), val(0), val(1)], success(true)),
            test!("or", &[val(0)], success(false)),
            test!("or", &[], None),
            // === LISTS ===
            test!("list", &[], Some(nil())),
            test!("list", &[val(1), val(2)], success([1, 2])),
            test!("list", &[val([1]), nil()], Some(val(vec![val([1]), nil()]))),
            test!("len", &[val([1, 2, 3])], success(3)),
            test!("len", &[nil()], success(0)),
            test!("len", &[val(3)], None),
            test!("head", &[val([1, 2])], success(1)),
            test!("head", &[nested.clone()], Some(val([val([1])]))),
            test!("head", &[nil()], None),
            test!("tail", &[val([1, 2, 3])], success([2, 3])),
            test!("tail", &[val([1])], Some(nil())),
            test!("tail", &[nil()], None),
            test!("cons", &[val(0), val([1, 2])], success([0, 1, 2])),
            test!("cons", &[val([0]), nil()], Some(val(vec![val([0])]))),
            test!("cons", &[val(0), val(1)], None),
            test!("append", &[val([1, 2]), val(3)], success([1, 2, 3])),
            test!("concat", &[val([1]), nil(), val([2, 3])], success([1, 2, 3])),
            test!("concat", &[], Some(nil())),
            test!("concat", &[val([1]), val(2)], None),
            test!("nth", &[val([5, 6, 7]), val(1)], success(6)),
            test!("nth", &[mixed.clone(), val(1)], success([2])),
            test!("nth", &[val([5]), val(1)], None),
            test!("nth", &[val([5]), val(-1)], None),
            test!("range", &[val(2), val(5)], success([2, 3, 4])),
            test!("range", &[val(5), val(2)], Some(nil())),
            test!("reverse", &[val([1, 2, 3])], success([3, 2, 1])),
            test!("reverse", &[nil()], Some(nil())),
            test!("reverse", &[val(1)], None),
            test!(
                "doc",
                &[find_extension("len").unwrap().clone().into_module().to_value()],
                Some(text("Number of elements"))
            ),
            test!("doc", &[val(1)], None),
        ];

        for (i, (name, actual, expected)) in test_cases.into_iter().enumerate() {
            match (actual, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "case #{} ({name})", i + 1);
                }
                (Err(_), None) => {}
                (actual, expected) => {
                    panic!("case #{} ({name}): expected {expected:?}, got {actual:?}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_error_message_construction() {
        type ErrorTest = (&'static str, Vec<Value>, &'static str);
        let cases: Vec<ErrorTest> = vec![
            ("add", vec![val(i64::MAX), val(1)], "Integer overflow in addition"),
            ("div", vec![val(1), val(0)], "division by zero"),
            ("head", vec![nil()], "head of empty list"),
            ("cons", vec![val(1), val(2)], "cons requires a list"),
            ("not", vec![val(7)], "expected boolean (0 or 1), got 7"),
            ("neg", vec![], "ArityMismatch: expression neg: expected 1 arguments, got 0"),
            ("nth", vec![val([1]), val(4)], "index 4 out of range for list of length 1"),
        ];
        for (name, args, fragment) in cases {
            let err = call_builtin(name, &args).unwrap_err();
            assert!(
                err.to_string().contains(fragment),
                "{name}: expected '{fragment}' in '{err}'"
            );
        }
    }

    #[test]
    fn test_tail_shares_structure() {
        let long = val((0..1000).collect::<Vec<i64>>());
        let rest = call_builtin("tail", &[long]).unwrap();
        match rest {
            Value::List(items) => {
                assert_eq!(items.len(), 999);
                assert_eq!(items.front(), Some(&val(1)));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[cfg(feature = "sexpr")]
    #[test]
    fn test_control_constructs_through_reader() {
        let rt = Runtime::default();
        let cases = vec![
            ("{x 2 y 3 (mul x y)}", val(6)),
            ("(match (len []) 0 \"empty\" \"full\")", text("empty")),
            ("(match [1] [] 0 _ 1 2)", val(1)),
            ("(let l (range 0 5) (nth l (sub (len l) 1)))", val(4)),
            ("(let f (lambda a b (list b a)) (f *[1 2]))", val([2, 1])),
            ("(doc let)", text("(let n1 v1 ... final): bind names in order, then evaluate final")),
        ];
        for (input, expected) in cases {
            assert_eq!(rt.eval_str(input).unwrap(), expected, "{input}");
        }
    }
}

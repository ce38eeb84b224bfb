use crate::Error;
use crate::ast::{NumberType, Value};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// Adapter layer that turns strongly-typed Rust functions into the erased
// `OperationFn` wrapped by `Extension::fixed` and `Extension::variadic`.
// Hosts name the traits only in bounds; the iterator aliases are the part
// they actually write in their signatures.

/// Canonical erased native function type produced by the adapters.
///
/// Natives receive ownership of their argument vector, enabling
/// implementations that consume or rearrange arguments if desired.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Fixed-arity argument conversion
// =====================================================================

/// Turns one argument `Value` into a strongly-typed parameter.
///
/// `Param<'a>` is the parameter type as seen by the native function for a
/// given lifetime of the local `Value` slot used during conversion.
pub trait FromParam {
    type Param<'a>;

    /// Convert a single argument into this parameter type.
    ///
    /// Implementations may either borrow from the provided `Value` (the list
    /// iterators) or consume it by value (`Value` itself, integers).
    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        // Move out so natives can keep list payloads without cloning
        Ok(std::mem::replace(value, Value::Wildcard))
    }
}

// Covers `i64` and `bool`, for which `ast.rs` provides `TryInto<T> for Value`.
impl<T> FromParam for T
where
    Value: std::convert::TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(value, Value::Wildcard);
        <Value as std::convert::TryInto<T>>::try_into(owned)
    }
}

impl<'b, K> FromParam for TypedValueIter<'b, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        if let Value::List(items) = value {
            TypedValueIter::<K>::from_list(items)
        } else {
            Err(Error::TypeError(format!("expected list, got {value}")))
        }
    }
}

// =====================================================================
// Generic typed iterator over argument slices and list values
// =====================================================================

/// Describes how to view each `Value` of a sequence as a typed element.
/// `check` runs over the whole sequence before iteration starts, so
/// `project` never sees a value of the wrong shape.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn check(v: &Value) -> Result<(), Error>;
    fn project<'a>(v: &'a Value) -> Self::Item<'a>;
}

enum Source<'a> {
    Args(std::slice::Iter<'a, Value>),
    List(im::vector::Iter<'a, Value>),
}

impl<'a> Iterator for Source<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        match self {
            Source::Args(iter) => iter.next(),
            Source::List(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Source::Args(iter) => iter.size_hint(),
            Source::List(iter) => iter.size_hint(),
        }
    }
}

/// Iterator over a run of arguments or the elements of a list argument,
/// parameterized by a [`ValueElementKind`] that determines the element type.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: Source<'a>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn from_args(values: &'a [Value]) -> Result<Self, Error> {
        values.iter().try_for_each(K::check)?;
        Ok(TypedValueIter {
            inner: Source::Args(values.iter()),
            _marker: PhantomData,
        })
    }

    pub(crate) fn from_list(values: &'a im::Vector<Value>) -> Result<Self, Error> {
        values.iter().try_for_each(K::check)?;
        Ok(TypedValueIter {
            inner: Source::List(values.iter()),
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.inner.next()?;
        Some(K::project(v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K> FusedIterator for TypedValueIter<'a, K> where K: ValueElementKind {}

// Concrete element kinds and their iterator aliases

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn check(_v: &Value) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        v
    }
}

#[doc(hidden)]
pub struct IntKind;

impl ValueElementKind for IntKind {
    type Item<'a> = NumberType;

    fn check(v: &Value) -> Result<(), Error> {
        match v {
            Value::Int(_) => Ok(()),
            other => Err(Error::TypeError(format!("expected integer, got {other}"))),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        match v {
            Value::Int(n) => *n,
            _ => unreachable!("IntKind::project saw a non-integer after check"),
        }
    }
}

#[doc(hidden)]
pub struct BoolKind;

impl ValueElementKind for BoolKind {
    type Item<'a> = bool;

    fn check(v: &Value) -> Result<(), Error> {
        match v {
            Value::Int(0 | 1) => Ok(()),
            other => Err(Error::TypeError(format!("expected boolean (0 or 1), got {other}"))),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        matches!(v, Value::Int(1))
    }
}

#[doc(hidden)]
pub struct ListKind;

impl ValueElementKind for ListKind {
    type Item<'a> = &'a im::Vector<Value>;

    fn check(v: &Value) -> Result<(), Error> {
        match v {
            Value::List(_) => Ok(()),
            other => Err(Error::TypeError(format!("expected list, got {other}"))),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        match v {
            Value::List(items) => items,
            _ => unreachable!("ListKind::project saw a non-list after check"),
        }
    }
}

/// Borrowed iterator over arbitrary values.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over integers; every element is type-checked before
/// the native function runs.
pub type IntIter<'a> = TypedValueIter<'a, IntKind>;

/// Borrowed iterator over booleans, strictly `0` or `1`.
pub type BoolIter<'a> = TypedValueIter<'a, BoolKind>;

/// Borrowed iterator over list values, for natives such as `concat`.
pub type ListIter<'a> = TypedValueIter<'a, ListKind>;

// =====================================================================
// Rest-parameter support for variadic operations
// =====================================================================

/// Builds the rest parameter from the arguments left after the fixed prefix.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::from_args(slice)
    }
}

// =====================================================================
// Return-type adaptation
// =====================================================================

/// Normalizes native return types to `Result<Value, Error>`: either a
/// plain `T: Into<Value>` or a `Result<T, Error>` of one.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Converts a typed Rust function into an [`OperationFn`], keyed by the
/// tuple of its one to three parameter types.
pub trait IntoOperation<Args> {
    /// Number of parameters
    const ARITY: usize;

    fn into_operation(self) -> Arc<OperationFn>;
}

/// Like [`IntoOperation`] for functions whose last parameter is a rest
/// iterator (`ValueIter<'a>`, `IntIter<'a>`, `ListIter<'a>`), optionally
/// after a prefix of one or two [`FromParam`] parameters.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: R = (self)(rest_param);
            result.into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by a single rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + Send
                + Sync
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: R = (self)( $( $p ),+, rest_param );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($prefix, len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for one arity: check the count up front,
/// then let `FromParam` borrow from or consume each owned slot.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R
                + Send
                + Sync
                + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            const ARITY: usize = $arity;

            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: R = (self)( $( $p ),+ );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, val};

    #[test]
    fn test_list_parameter_borrows_elements() {
        fn sum_list(nums: IntIter<'_>) -> i64 {
            nums.sum()
        }
        let op = <_ as IntoOperation<(IntIter<'static>,)>>::into_operation(sum_list);
        assert_eq!(op(vec![val([1, 2, 3, 4])]).unwrap(), val(10));
        assert_eq!(op(vec![nil()]).unwrap(), val(0));
        assert!(matches!(op(vec![val(3)]), Err(Error::TypeError(_))));
        assert!(matches!(op(vec![val(vec![val(1), nil()])]), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_result_returning_native() {
        fn safe_div(a: i64, b: i64) -> Result<i64, Error> {
            if b == 0 {
                Err(Error::EvalError("division by zero".into()))
            } else {
                Ok(a / b)
            }
        }
        let op = <_ as IntoOperation<(i64, i64)>>::into_operation(safe_div);
        assert_eq!(op(vec![val(6), val(3)]).unwrap(), val(2));
        let err = op(vec![val(1), val(0)]).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_bool_and_value_parameters() {
        fn pick(flag: bool, a: Value, b: Value) -> Value {
            if flag { a } else { b }
        }
        let op = <_ as IntoOperation<(bool, Value, Value)>>::into_operation(pick);
        assert_eq!(op(vec![val(1), val([1]), nil()]).unwrap(), val([1]));
        assert_eq!(op(vec![val(0), val([1]), nil()]).unwrap(), nil());
        assert!(matches!(op(vec![val(2), nil(), nil()]), Err(Error::TypeError(_))));
        assert_eq!(op(vec![val(1)]), Err(Error::arity_error(3, 1)));
    }

    #[test]
    fn test_rest_of_lists() {
        fn total_len(lists: ListIter<'_>) -> i64 {
            lists.map(|l| l.len() as i64).sum()
        }
        let op = <_ as IntoVariadicOperation<(ListIter<'static>,)>>::into_variadic_operation(
            total_len,
        );
        assert_eq!(op(vec![val([1, 2]), nil(), val([3])]).unwrap(), val(3));
        assert!(matches!(op(vec![val(1)]), Err(Error::TypeError(_))));
    }
}

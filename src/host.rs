//! Host-embedding surface: expose native Rust functions, constants
//! and namespaces to scripts as ordinary identifiers.
//!
//! The factories produce [`IdentifierData`] records that a
//! [`crate::script::Script`] binds to top-level slots:
//!
//! ```rust
//! use squill::host;
//!
//! let ns = host::namespace("geo", [
//!     host::constant("pi", std::f64::consts::PI),
//!     host::function("circumference", |r: f64| 2.0 * std::f64::consts::PI * r),
//! ]);
//! ```
//!
//! [`function`] accepts any Rust function or closure whose parameters
//! implement [`FromValue`] and whose return type implements
//! [`IntoValue`] (optionally wrapped in a `Result` with a displayable
//! error, which surfaces as a host error). Arity is enforced at call
//! time; argument conversion follows a fixed table: numeric widening
//! Int -> Real, identity for Bool/Char/String, arrays and tables to
//! `Vec<T>`.

use std::fmt::Display;
use std::rc::Rc;

use crate::value::{FnValue, NativeFn, Table, Value, ValueData};
use crate::vm::Vm;
use crate::{Error, EvalError};

/// A named value ready to be registered as a script identifier.
#[derive(Debug, Clone)]
pub struct IdentifierData {
    pub name: String,
    pub value: Value,
}

/// A mutable host binding.
pub fn variable(name: &str, value: impl IntoValue) -> IdentifierData {
    IdentifierData {
        name: name.to_owned(),
        value: value.into_value(),
    }
}

/// A binding scripts cannot assign or mutate through.
pub fn constant(name: &str, value: impl IntoValue) -> IdentifierData {
    let mut value = value.into_value();
    value.is_const = true;
    IdentifierData {
        name: name.to_owned(),
        value,
    }
}

/// Wrap a typed host function into a script-callable value.
pub fn function<F, Args, R>(name: &str, f: F) -> IdentifierData
where
    F: IntoNative<Args, R>,
{
    IdentifierData {
        name: name.to_owned(),
        value: Value::new(ValueData::Fn(FnValue::Native(f.into_native()))),
    }
}

/// Escape hatch for natives that need raw arguments or the VM itself.
pub fn function_raw(
    name: &str,
    f: impl Fn(Vec<Value>, &mut Vm) -> Result<Value, Error> + 'static,
) -> IdentifierData {
    IdentifierData {
        name: name.to_owned(),
        value: Value::new(ValueData::Fn(FnValue::Native(Rc::new(f)))),
    }
}

/// Bundle items into a table namespace: each item lands in the
/// table's member map under its own name. Namespaces nest.
pub fn namespace(
    name: &str,
    items: impl IntoIterator<Item = IdentifierData>,
) -> IdentifierData {
    let mut table = Table::new();
    for item in items {
        *table.dot(&item.name) = item.value;
    }
    IdentifierData {
        name: name.to_owned(),
        value: Value::from(table),
    }
}

// ----- conversions into script values -----------------------------------

/// Convert a host value into a script value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::nil()
    }
}

macro_rules! impl_into_value_via_from {
    ($($ty:ty),+) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )+
    };
}

impl_into_value_via_from!(i64, f64, bool, String, &str);

impl IntoValue for u8 {
    fn into_value(self) -> Value {
        Value::char_byte(self)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::new(ValueData::Array(
            self.into_iter().map(IntoValue::into_value).collect(),
        ))
    }
}

impl IntoValue for Table {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

// ----- conversions out of script values ---------------------------------

fn conversion_error(expected: &str, got: &Value) -> Error {
    EvalError::TypeMismatch(format!("expected {expected}, got {}", got.type_name())).into()
}

/// Convert a script argument into a typed host parameter.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Int(n) => Ok(n),
            _ => Err(conversion_error("integer", &value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Real(r) => Ok(r),
            // numeric widening
            ValueData::Int(n) => Ok(n as f64),
            _ => Err(conversion_error("real", &value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Bool(b) => Ok(b),
            _ => Err(conversion_error("bool", &value)),
        }
    }
}

impl FromValue for u8 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Char(b) => Ok(b),
            _ => Err(conversion_error("char", &value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Str(s) => Ok(s),
            _ => Err(conversion_error("string", &value)),
        }
    }
}

impl FromValue for Table {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Table(t) => Ok(t),
            _ => Err(conversion_error("table", &value)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value.data {
            ValueData::Array(items) => items.into_iter().map(T::from_value).collect(),
            // a table's keyed entries, in key order
            ValueData::Table(table) => table
                .array_map
                .into_values()
                .map(T::from_value)
                .collect(),
            _ => Err(conversion_error("array or table", &value)),
        }
    }
}

// ----- result normalization ---------------------------------------------

/// Normalize plain values and `Result`-returning host functions into
/// `Result<R, Error>`; displayable host errors become `Error::Host`.
pub trait IntoHostResult<R> {
    fn into_host_result(self) -> Result<R, Error>;
}

impl<R: IntoValue> IntoHostResult<R> for R {
    fn into_host_result(self) -> Result<R, Error> {
        Ok(self)
    }
}

impl<R: IntoValue, E: Display> IntoHostResult<R> for Result<R, E> {
    fn into_host_result(self) -> Result<R, Error> {
        self.map_err(|e| Error::Host(e.to_string()))
    }
}

// ----- typed function adapters ------------------------------------------

/// Convert a strongly-typed Rust function or closure into the erased
/// [`NativeFn`], parameterized by an argument tuple type.
pub trait IntoNative<Args, R> {
    fn into_native(self) -> Rc<NativeFn>;
}

// 0-arg functions / closures
impl<F, FR, R> IntoNative<(), R> for F
where
    F: Fn() -> FR + 'static,
    FR: IntoHostResult<R> + 'static,
    R: IntoValue + 'static,
{
    fn into_native(self) -> Rc<NativeFn> {
        Rc::new(move |args: Vec<Value>, _vm: &mut Vm| {
            if !args.is_empty() {
                return Err(EvalError::Arity {
                    expected: 0,
                    got: args.len(),
                }
                .into());
            }
            Ok((self)().into_host_result()?.into_value())
        })
    }
}

/// Adapter for each fixed arity: check the argument count, convert
/// each argument through [`FromValue`], call, convert the result.
macro_rules! impl_into_native_for_arity {
    ($arity:expr, $( $v:ident : $A:ident ),+ ) => {
        impl<F, FR, R, $( $A ),+> IntoNative<($( $A, )+), R> for F
        where
            F: Fn($( $A ),+) -> FR + 'static,
            FR: IntoHostResult<R> + 'static,
            R: IntoValue + 'static,
            $( $A: FromValue + 'static, )+
        {
            fn into_native(self) -> Rc<NativeFn> {
                Rc::new(move |args: Vec<Value>, _vm: &mut Vm| {
                    let args: [Value; $arity] = match args.try_into() {
                        Ok(args) => args,
                        Err(args) => {
                            return Err(EvalError::Arity {
                                expected: $arity,
                                got: args.len(),
                            }
                            .into());
                        }
                    };
                    let [$( $v ),+] = args;
                    $(
                        let $v: $A = <$A as FromValue>::from_value($v)?;
                    )+
                    Ok((self)($( $v ),+).into_host_result()?.into_value())
                })
            }
        }
    };
}

impl_into_native_for_arity!(1, a1: A1);
impl_into_native_for_arity!(2, a1: A1, a2: A2);
impl_into_native_for_arity!(3, a1: A1, a2: A2, a3: A3);
impl_into_native_for_arity!(4, a1: A1, a2: A2, a3: A3, a4: A4);
impl_into_native_for_arity!(5, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_into_native_for_arity!(6, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
impl_into_native_for_arity!(7, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7);
impl_into_native_for_arity!(8, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8);

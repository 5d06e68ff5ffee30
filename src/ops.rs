//! Binary, unary and truthiness semantics over values.
//!
//! Numeric operators cover the four Cartesian cases of Int and Real:
//! mixed operands promote Int to Real, `Int op Int` stays Int except
//! `/`, which always produces a Real. `%` switches to `fmod` when
//! either side is Real. Integer arithmetic wraps (two's complement)
//! and shift counts are masked to 0..=63.
//!
//! `..` concatenation is total: every operand coerces to text (raw
//! content for strings, the one-byte string for chars, the printable
//! form for everything else).

use crate::EvalError;
use crate::ast::{BinOp, IncDec, UnOp};
use crate::value::{Value, ValueData};

fn unsupported(op: BinOp, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::TypeMismatch(format!(
        "unsupported operand types for '{op}' ({} and {})",
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// Truthiness used by conditions: Bool by value, Int/Real by
/// non-zero; every other type is falsy.
pub fn truthy(value: &Value) -> bool {
    match value.data {
        ValueData::Bool(b) => b,
        ValueData::Int(n) => n != 0,
        ValueData::Real(r) => r != 0.0,
        _ => false,
    }
}

/// Text fragment a value contributes to `..` concatenation. Strings
/// contribute their raw content, chars their single byte; everything
/// else uses its printable form.
pub fn concat_text(value: &Value) -> String {
    match &value.data {
        ValueData::Str(s) => s.clone(),
        ValueData::Char(b) => (*b as char).to_string(),
        other => other.to_string(),
    }
}

// Arithmetic over the four numeric Cartesian cases. `$int` computes
// the Int x Int result, `$real` the promoted one.
macro_rules! numeric_binop {
    ($op:expr, $lhs:expr, $rhs:expr, |$l:ident, $r:ident| $int:expr, |$lf:ident, $rf:ident| $real:expr) => {
        match (&$lhs.data, &$rhs.data) {
            (ValueData::Int(a), ValueData::Int(b)) => {
                let ($l, $r) = (*a, *b);
                Ok(Value::new(ValueData::Int($int)))
            }
            (ValueData::Real(a), ValueData::Real(b)) => {
                let ($lf, $rf) = (*a, *b);
                Ok(Value::new(ValueData::Real($real)))
            }
            (ValueData::Int(a), ValueData::Real(b)) => {
                let ($lf, $rf) = (*a as f64, *b);
                Ok(Value::new(ValueData::Real($real)))
            }
            (ValueData::Real(a), ValueData::Int(b)) => {
                let ($lf, $rf) = (*a, *b as f64);
                Ok(Value::new(ValueData::Real($real)))
            }
            _ => Err(unsupported($op, $lhs, $rhs)),
        }
    };
}

// Relational comparison with Int -> Real promotion on mixed operands.
macro_rules! numeric_compare {
    ($op:expr, $lhs:expr, $rhs:expr, $cmp:tt) => {
        match (&$lhs.data, &$rhs.data) {
            (ValueData::Int(a), ValueData::Int(b)) => Ok(Value::from(a $cmp b)),
            (ValueData::Real(a), ValueData::Real(b)) => Ok(Value::from(a $cmp b)),
            (ValueData::Int(a), ValueData::Real(b)) => Ok(Value::from((*a as f64) $cmp *b)),
            (ValueData::Real(a), ValueData::Int(b)) => Ok(Value::from(*a $cmp (*b as f64))),
            _ => Err(unsupported($op, $lhs, $rhs)),
        }
    };
}

// Bitwise family: Int only.
macro_rules! bitwise_binop {
    ($op:expr, $lhs:expr, $rhs:expr, |$l:ident, $r:ident| $body:expr) => {
        match (&$lhs.data, &$rhs.data) {
            (ValueData::Int(a), ValueData::Int(b)) => {
                let ($l, $r) = (*a, *b);
                Ok(Value::new(ValueData::Int($body)))
            }
            _ => Err(unsupported($op, $lhs, $rhs)),
        }
    };
}

/// Apply a binary operator to two evaluated operands.
///
/// `&&`/`||` are not handled here: the evaluator short-circuits them
/// before operand evaluation.
pub fn apply_binary(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => {
            numeric_binop!(op, lhs, rhs, |l, r| l.wrapping_add(r), |a, b| a + b)
        }
        BinOp::Sub => {
            numeric_binop!(op, lhs, rhs, |l, r| l.wrapping_sub(r), |a, b| a - b)
        }
        BinOp::Mul => {
            numeric_binop!(op, lhs, rhs, |l, r| l.wrapping_mul(r), |a, b| a * b)
        }
        BinOp::Div => div_values(lhs, rhs),
        BinOp::Rem => rem_values(lhs, rhs),
        BinOp::Concat => Ok(Value::new(ValueData::Str(
            concat_text(lhs) + &concat_text(rhs),
        ))),
        BinOp::Eq => Ok(Value::from(lhs == rhs)),
        BinOp::Ne => Ok(Value::from(lhs != rhs)),
        BinOp::Lt => numeric_compare!(op, lhs, rhs, <),
        BinOp::Le => numeric_compare!(op, lhs, rhs, <=),
        BinOp::Gt => numeric_compare!(op, lhs, rhs, >),
        BinOp::Ge => numeric_compare!(op, lhs, rhs, >=),
        BinOp::And | BinOp::Or => Err(EvalError::UnknownOperator(op.symbol().to_owned())),
        BinOp::BitAnd => bitwise_binop!(op, lhs, rhs, |l, r| l & r),
        BinOp::BitOr => bitwise_binop!(op, lhs, rhs, |l, r| l | r),
        BinOp::BitXor => bitwise_binop!(op, lhs, rhs, |l, r| l ^ r),
        BinOp::Shl => {
            bitwise_binop!(op, lhs, rhs, |l, r| l.wrapping_shl((r & 63) as u32))
        }
        BinOp::Shr => {
            bitwise_binop!(op, lhs, rhs, |l, r| l.wrapping_shr((r & 63) as u32))
        }
    }
}

/// `/` produces a Real in every case; Int / Int is not truncating.
fn div_values(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (l, r) = match (&lhs.data, &rhs.data) {
        (ValueData::Int(a), ValueData::Int(b)) => (*a as f64, *b as f64),
        (ValueData::Real(a), ValueData::Real(b)) => (*a, *b),
        (ValueData::Int(a), ValueData::Real(b)) => (*a as f64, *b),
        (ValueData::Real(a), ValueData::Int(b)) => (*a, *b as f64),
        _ => return Err(unsupported(BinOp::Div, lhs, rhs)),
    };
    if r == 0.0 {
        return Err(EvalError::DivByZero);
    }
    Ok(Value::from(l / r))
}

fn rem_values(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (&lhs.data, &rhs.data) {
        (ValueData::Int(a), ValueData::Int(b)) => {
            if *b == 0 {
                return Err(EvalError::DivByZero);
            }
            Ok(Value::new(ValueData::Int(a.wrapping_rem(*b))))
        }
        (ValueData::Real(a), ValueData::Real(b)) => fmod(*a, *b),
        (ValueData::Int(a), ValueData::Real(b)) => fmod(*a as f64, *b),
        (ValueData::Real(a), ValueData::Int(b)) => fmod(*a, *b as f64),
        _ => Err(unsupported(BinOp::Rem, lhs, rhs)),
    }
}

fn fmod(l: f64, r: f64) -> Result<Value, EvalError> {
    if r == 0.0 {
        return Err(EvalError::DivByZero);
    }
    Ok(Value::from(l % r))
}

/// Apply a prefix operator to an evaluated operand. `++`/`--` return
/// the mutated value; the evaluator stores it back through the
/// operand's lvalue.
pub fn apply_unary(op: UnOp, operand: &Value) -> Result<Value, EvalError> {
    match (op, &operand.data) {
        (UnOp::Plus, ValueData::Int(n)) => Ok(Value::from(*n)),
        (UnOp::Plus, ValueData::Real(r)) => Ok(Value::from(*r)),
        (UnOp::Neg, ValueData::Int(n)) => Ok(Value::new(ValueData::Int(n.wrapping_neg()))),
        (UnOp::Neg, ValueData::Real(r)) => Ok(Value::from(-r)),
        (UnOp::Not, ValueData::Bool(b)) => Ok(Value::from(!b)),
        (UnOp::PreInc, ValueData::Int(n)) => Ok(Value::new(ValueData::Int(n.wrapping_add(1)))),
        (UnOp::PreInc, ValueData::Real(r)) => Ok(Value::from(r + 1.0)),
        (UnOp::PreDec, ValueData::Int(n)) => Ok(Value::new(ValueData::Int(n.wrapping_sub(1)))),
        (UnOp::PreDec, ValueData::Real(r)) => Ok(Value::from(r - 1.0)),
        (UnOp::AddrOf | UnOp::Deref, _) => {
            Err(EvalError::UnknownOperator(op.symbol().to_owned()))
        }
        (UnOp::Plus | UnOp::Neg | UnOp::PreInc | UnOp::PreDec | UnOp::Not, _) => {
            Err(EvalError::TypeMismatch(format!(
                "unsupported operand type for unary '{op}' ({})",
                operand.type_name()
            )))
        }
    }
}

/// Step a value for postfix `++`/`--`; the evaluator returns the
/// pre-mutation value and stores this one.
pub fn apply_incdec(op: IncDec, operand: &Value) -> Result<Value, EvalError> {
    match (op, &operand.data) {
        (IncDec::Inc, ValueData::Int(n)) => Ok(Value::new(ValueData::Int(n.wrapping_add(1)))),
        (IncDec::Inc, ValueData::Real(r)) => Ok(Value::from(r + 1.0)),
        (IncDec::Dec, ValueData::Int(n)) => Ok(Value::new(ValueData::Int(n.wrapping_sub(1)))),
        (IncDec::Dec, ValueData::Real(r)) => Ok(Value::from(r - 1.0)),
        _ => Err(EvalError::TypeMismatch(format!(
            "unsupported operand type for postfix '{}' ({})",
            op.symbol(),
            operand.type_name()
        ))),
    }
}

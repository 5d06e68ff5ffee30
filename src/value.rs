//! Core value model for the interpreter: the tagged [`Value`] union,
//! the dual-faceted [`Table`] container, and the total ordering on
//! values that keeps table iteration deterministic.
//!
//! A `Value` is a payload plus one `is_const` bit. Constness is a
//! property of the *cell* a value sits in: assignment and postfix
//! mutation through a const cell fail, while reads always succeed. A
//! successful store replaces the cell's flag with the incoming
//! value's flag.
//!
//! Tables carry two co-resident submaps sharing one identity:
//! `array_map` (arbitrary value keys, used by `t[k]`) and `dot_map`
//! (string names, used by `t.name`). Both are ordered maps so that
//! iteration and printing are deterministic.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FnProto;
use crate::vm::Vm;
use crate::{Error, EvalError};

/// Canonical erased native-function signature. Natives receive their
/// evaluated arguments by value and a reference to the VM, and run on
/// the caller's thread.
pub type NativeFn = dyn Fn(Vec<Value>, &mut Vm) -> Result<Value, Error>;

/// A callable value: either a host native or a script closure.
///
/// Closures share their AST body by reference; invoking one re-enters
/// a fresh frame each time. Function values compare and order by
/// identity (the shared allocation's address).
#[derive(Clone)]
pub enum FnValue {
    Native(Rc<NativeFn>),
    Closure(Rc<FnProto>),
}

impl FnValue {
    /// Identity used for ordering and equality of function values.
    pub(crate) fn addr(&self) -> usize {
        match self {
            FnValue::Native(f) => Rc::as_ptr(f) as *const () as usize,
            FnValue::Closure(p) => Rc::as_ptr(p) as usize,
        }
    }
}

/// The payload of a value.
#[derive(Clone)]
pub enum ValueData {
    Nil,
    Int(i64),
    Real(f64),
    Bool(bool),
    /// Single byte; the language's char literals decode to one byte.
    Char(u8),
    Str(String),
    Array(Vec<Value>),
    Table(Table),
    Fn(FnValue),
}

/// A script value: payload plus the const bit of the cell holding it.
#[derive(Clone)]
pub struct Value {
    pub data: ValueData,
    pub is_const: bool,
}

impl Value {
    pub fn nil() -> Self {
        Value {
            data: ValueData::Nil,
            is_const: false,
        }
    }

    pub fn new(data: ValueData) -> Self {
        Value {
            data,
            is_const: false,
        }
    }

    pub fn char_byte(b: u8) -> Self {
        Value::new(ValueData::Char(b))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.data, ValueData::Nil)
    }

    /// Type tag string, as reported by the `@type` intrinsic.
    pub fn type_name(&self) -> &'static str {
        match self.data {
            ValueData::Nil => "nil",
            ValueData::Int(_) => "integer",
            ValueData::Real(_) => "real",
            ValueData::Bool(_) => "bool",
            ValueData::Char(_) => "char",
            ValueData::Str(_) => "string",
            ValueData::Array(_) => "array",
            ValueData::Table(_) => "table",
            ValueData::Fn(_) => "function",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::new(ValueData::Int(n))
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::new(ValueData::Real(r))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::new(ValueData::Bool(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new(ValueData::Str(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new(ValueData::Str(s))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::new(ValueData::Array(
            items.into_iter().map(|x| x.into()).collect(),
        ))
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::new(ValueData::Table(t))
    }
}

/// Real numbers keep a decimal point in their printable form so they
/// stay distinguishable from integers.
fn format_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 {
        format!("{r:.1}")
    } else {
        format!("{r}")
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueData::Nil => write!(f, "nil"),
            ValueData::Int(n) => write!(f, "{n}"),
            ValueData::Real(r) => write!(f, "{}", format_real(*r)),
            ValueData::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            ValueData::Char(b) => write!(f, "'{}'", *b as char),
            ValueData::Str(s) => write!(f, "\"{s}\""),
            ValueData::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ValueData::Table(t) => write!(f, "{t}"),
            ValueData::Fn(_) => write!(f, "[function]"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_const {
            write!(f, "const {}", self.data)
        } else {
            write!(f, "{}", self.data)
        }
    }
}

// Equality ignores the const bit: constness belongs to the cell, not
// to the payload. Different tags never compare equal; aggregate and
// function values fall back to their printable forms, which makes two
// structurally identical tables equal and any two functions of the
// same identity equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Nil, ValueData::Nil) => true,
            (ValueData::Int(l), ValueData::Int(r)) => l == r,
            (ValueData::Real(l), ValueData::Real(r)) => l == r,
            (ValueData::Bool(l), ValueData::Bool(r)) => l == r,
            (ValueData::Char(l), ValueData::Char(r)) => l == r,
            (ValueData::Str(l), ValueData::Str(r)) => l == r,
            (ValueData::Array(_), ValueData::Array(_))
            | (ValueData::Table(_), ValueData::Table(_))
            | (ValueData::Fn(_), ValueData::Fn(_)) => {
                self.data.to_string() == other.data.to_string()
            }
            _ => false,
        }
    }
}

/// Ordering key wrapping a value. `array_map` is indexed by arbitrary
/// values, so keys need the total order of the data model: rank by
/// type tag, payloads by natural per-type order. Int/Real pairs
/// compare numerically first (same rule as the relational operators)
/// with the tag rank as tie-break so the order stays antisymmetric.
#[derive(Clone)]
pub struct Key(pub Value);

fn type_rank(data: &ValueData) -> u8 {
    match data {
        ValueData::Nil => 0,
        ValueData::Int(_) => 1,
        ValueData::Real(_) => 2,
        ValueData::Bool(_) => 3,
        ValueData::Char(_) => 4,
        ValueData::Str(_) => 5,
        ValueData::Array(_) => 6,
        ValueData::Table(_) => 7,
        ValueData::Fn(_) => 8,
    }
}

fn cmp_data(a: &ValueData, b: &ValueData) -> Ordering {
    match (a, b) {
        (ValueData::Nil, ValueData::Nil) => Ordering::Equal,
        (ValueData::Int(l), ValueData::Int(r)) => l.cmp(r),
        (ValueData::Real(l), ValueData::Real(r)) => l.total_cmp(r),
        (ValueData::Int(l), ValueData::Real(r)) => {
            (*l as f64).total_cmp(r).then(Ordering::Less)
        }
        (ValueData::Real(l), ValueData::Int(r)) => {
            l.total_cmp(&(*r as f64)).then(Ordering::Greater)
        }
        (ValueData::Bool(l), ValueData::Bool(r)) => l.cmp(r),
        (ValueData::Char(l), ValueData::Char(r)) => l.cmp(r),
        (ValueData::Str(l), ValueData::Str(r)) => l.cmp(r),
        (ValueData::Array(l), ValueData::Array(r)) => {
            for (lv, rv) in l.iter().zip(r.iter()) {
                match cmp_data(&lv.data, &rv.data) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            l.len().cmp(&r.len())
        }
        (ValueData::Table(l), ValueData::Table(r)) => l.to_string().cmp(&r.to_string()),
        (ValueData::Fn(l), ValueData::Fn(r)) => l.addr().cmp(&r.addr()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        cmp_data(&self.0.data, &other.0.data) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_data(&self.0.data, &other.0.data)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Aggregate value with array and record facets sharing one identity.
#[derive(Clone, Default)]
pub struct Table {
    /// Ordered mapping from arbitrary value keys, used by `t[k]`.
    pub array_map: BTreeMap<Key, Value>,
    /// Mapping from member names, used by `t.name`.
    pub dot_map: BTreeMap<String, Value>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Keyed cell for writing; inserts Nil when the key is absent.
    pub fn index(&mut self, key: Value) -> &mut Value {
        self.array_map.entry(Key(key)).or_insert_with(Value::nil)
    }

    /// Keyed cell for reading; absent keys fail `KeyMissing`.
    pub fn index_at(&self, key: &Value) -> Result<&Value, EvalError> {
        self.array_map
            .get(&Key(key.clone()))
            .ok_or_else(|| EvalError::KeyMissing(key.to_string()))
    }

    /// Member cell for writing; inserts Nil when the name is absent.
    pub fn dot(&mut self, name: &str) -> &mut Value {
        self.dot_map
            .entry(name.to_owned())
            .or_insert_with(Value::nil)
    }

    /// Member cell for reading; absent names fail `KeyMissing`.
    pub fn dot_at(&self, name: &str) -> Result<&Value, EvalError> {
        self.dot_map
            .get(name)
            .ok_or_else(|| EvalError::KeyMissing(name.to_owned()))
    }

    /// Total entry count across both submaps.
    pub fn len(&self) -> usize {
        self.array_map.len() + self.dot_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array_map.is_empty() && self.dot_map.is_empty()
    }
}

// Table printing shows both submaps concatenated: keyed entries as
// `[key] = value`, then members as `name = value`.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        let mut first = true;
        for (key, value) in &self.array_map {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "[{}] = {}", key.0, value)?;
        }
        for (name, value) in &self.dot_map {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name} = {value}")?;
        }
        write!(f, "]")
    }
}

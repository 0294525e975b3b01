//! Runtime value representation for the Skald VM.
//!
//! Values are immutable once constructed. Arrays and objects are
//! copy-on-write: structural operations build a new value and leave the
//! original untouched, which is what makes values safe to share freely
//! across scopes and call frames without ownership tracking.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::TypeError;
use crate::function::Function;
use crate::machine::BuiltinFn;

/// A native callable registered by the host.
///
/// The engine's only requirement is the synchronous callback signature;
/// results are pushed onto the operand stack by the callback itself.
#[derive(Clone)]
pub struct BuiltinFunction {
    /// Diagnostic name, shown in stack traces and display output.
    pub name: Rc<str>,
    func: Rc<BuiltinFn>,
}

impl BuiltinFunction {
    pub fn new(name: &str, func: Rc<BuiltinFn>) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    pub fn func(&self) -> Rc<BuiltinFn> {
        self.func.clone()
    }

    /// Identity address used for ordering and equality. Two distinct
    /// callables are never equal, even with identical code.
    fn addr(&self) -> usize {
        Rc::as_ptr(&self.func) as *const () as usize
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

/// Runtime value: a closed tagged variant.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// IEEE 754 double-precision number.
    Number(f64),
    /// Immutable string.
    String(Rc<str>),
    /// Ordered sequence of values.
    Array(Rc<Vec<Value>>),
    /// String-keyed mapping. Insertion order is not significant.
    Object(Rc<BTreeMap<String, Value>>),
    /// User-defined callable assembled from source.
    Function(Rc<Function>),
    /// Host-provided native callable, opaque to the engine.
    Builtin(BuiltinFunction),
    /// Wildcard used only in type-matching contexts; never produced as a
    /// runtime result.
    Any,
}

impl Value {
    pub fn string(value: &str) -> Value {
        Value::String(value.into())
    }

    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(values))
    }

    pub fn object(values: BTreeMap<String, Value>) -> Value {
        Value::Object(Rc::new(values))
    }

    fn tag_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
            Value::Function(_) => 6,
            Value::Builtin(_) => 7,
            Value::Any => 8,
        }
    }

    /// Tag name, as reported by the `typeof` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin-function",
            Value::Any => "any",
        }
    }

    /// Strict total order over all values.
    ///
    /// Ranks by variant tag first, then within a tag: numeric order for
    /// numbers (`f64::total_cmp`, so the order is total even for NaN),
    /// byte order for strings, elementwise-then-length for arrays and
    /// objects, and reference identity for callables.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.as_ref().cmp(b.as_ref()),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let key_ord = ka.cmp(kb);
                    if key_ord != Ordering::Equal {
                        return key_ord;
                    }
                    let val_ord = va.compare(vb);
                    if val_ord != Ordering::Equal {
                        return val_ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Function(a), Value::Function(b)) => {
                (Rc::as_ptr(a) as usize).cmp(&(Rc::as_ptr(b) as usize))
            }
            (Value::Builtin(a), Value::Builtin(b)) => a.addr().cmp(&b.addr()),
            (Value::Any, Value::Any) => Ordering::Equal,
            _ => self.tag_rank().cmp(&other.tag_rank()),
        }
    }

    /// Round-trippable text form. Unlike `Display`, strings are quoted and
    /// escaped, including strings nested in arrays and objects.
    pub fn serialise(&self) -> String {
        match self {
            Value::String(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        _ => out.push(c),
                    }
                }
                out.push('"');
                out
            }
            _ => self.to_string(),
        }
    }

    // ---- Casting helpers ----

    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(TypeError::new("bool", other.type_name())),
        }
    }

    pub fn as_number(&self) -> Result<f64, TypeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(TypeError::new("number", other.type_name())),
        }
    }

    pub fn as_string(&self) -> Result<&str, TypeError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(TypeError::new("string", other.type_name())),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], TypeError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(TypeError::new("array", other.type_name())),
        }
    }

    pub fn as_object(&self) -> Result<&BTreeMap<String, Value>, TypeError> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(TypeError::new("object", other.type_name())),
        }
    }

    pub fn as_function(&self) -> Result<&Rc<Function>, TypeError> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(TypeError::new("function", other.type_name())),
        }
    }

    pub fn as_builtin(&self) -> Result<&BuiltinFunction, TypeError> {
        match self {
            Value::Builtin(b) => Ok(b),
            other => Err(TypeError::new("builtin-function", other.type_name())),
        }
    }

    /// A non-negative integral number, usable as an array index or count.
    pub fn as_index(&self) -> Result<usize, TypeError> {
        let n = self.as_number()?;
        if n.fract() == 0.0 && n >= 0.0 {
            Ok(n as usize)
        } else {
            Err(TypeError::new("index", self.type_name()))
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_))
    }

    // ---- Arithmetic and comparison primitives ----
    //
    // These are the single implementation behind both the dedicated opcodes
    // and the generic operator builtins, so the two dispatch paths cannot
    // drift apart.

    pub fn add(&self, other: &Value) -> Result<Value, TypeError> {
        Ok(Value::Number(self.as_number()? + other.as_number()?))
    }

    pub fn subtract(&self, other: &Value) -> Result<Value, TypeError> {
        Ok(Value::Number(self.as_number()? - other.as_number()?))
    }

    pub fn multiply(&self, other: &Value) -> Result<Value, TypeError> {
        Ok(Value::Number(self.as_number()? * other.as_number()?))
    }

    pub fn divide(&self, other: &Value) -> Result<Value, TypeError> {
        Ok(Value::Number(self.as_number()? / other.as_number()?))
    }

    pub fn less_than(&self, other: &Value) -> Value {
        Value::Bool(self.compare(other) == Ordering::Less)
    }

    pub fn greater_than(&self, other: &Value) -> Value {
        Value::Bool(self.compare(other) == Ordering::Greater)
    }

    pub fn equals(&self, other: &Value) -> Value {
        Value::Bool(self.compare(other) == Ordering::Equal)
    }

    pub fn not_equals(&self, other: &Value) -> Value {
        Value::Bool(self.compare(other) != Ordering::Equal)
    }

    pub fn not(&self) -> Result<Value, TypeError> {
        Ok(Value::Bool(!self.as_bool()?))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item.serialise())?;
                }
                write!(f, "]")
            }
            Value::Object(items) => {
                write!(f, "{{")?;
                for (i, (key, value)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{key}\":{}", value.serialise())?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "function:{}", func.name),
            Value::Builtin(b) => write!(f, "builtin:{}", b.name),
            Value::Any => write!(f, "any"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Rc::new(value))
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(Rc::new(value))
    }
}

//! Runtime values: the tagged union the VM pushes, stores, and pops.
//!
//! Grounded on `object.h`'s `Object` union (`number`, `bool`, `null`,
//! refcounted `string`, refcounted `struct`, and a raw-pointer
//! `return address` variant) and on the teacher's own `Value` enum in
//! `vm.rs`, which already carries an `Addr(usize)` variant for exactly
//! this "pointer stored as a value" case.
//!
//! Refcounting is not hand-rolled: `Str` and `Struct` wrap `Rc`, so
//! `Clone` *is* `objincref` and `Drop` *is* `objdecref` — cloning an
//! `Rc` bumps its strong count the same way the original's `objincref`
//! does, and letting the last `Rc` drop frees the allocation and
//! recursively drops any `Rc`s nested in a struct's properties, the
//! same way `objdecref` recursively decrefs nested objects on reaching
//! zero. A struct field that points back to its own struct therefore
//! leaks, exactly as the design notes require ("cycles leak by
//! design") — nothing extra needs to be written to get that property.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
pub struct StructInstance {
    pub name: String,
    pub properties: RefCell<HashMap<String, Value>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Null,
    Str(Rc<String>),
    Struct(Rc<StructInstance>),
    /// A return address into the bytecode, used only inside call
    /// frames. Never observable from source-level code.
    Addr(usize),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Struct(_) => "struct",
            Value::Addr(_) => "pointer",
        }
    }

    /// Truthiness used by `JZ` and the unary `!` operator: `false` and
    /// `null` are falsy, everything else (including `0.0` and `""`) is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Struct(s) => {
                write!(f, "{} {{ ", s.name)?;
                for (k, v) in s.properties.borrow().iter() {
                    write!(f, "{k}: {v}, ")?;
                }
                write!(f, "}}")
            }
            Value::Addr(a) => write!(f, "<addr {a}>"),
        }
    }
}

/// A struct declaration's name and ordered field names, distinct from
/// any instance built from it.
#[derive(Debug, Clone)]
pub struct StructBlueprint {
    pub name: String,
    pub properties: Vec<String>,
}

/// A compiled function's entry point, keyed by name in globals
/// alongside plain values.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub location: usize,
    pub paramcount: usize,
}

/// One global binding: either a plain runtime value or a function
/// definition. Kept as a single enum (rather than two separate maps
/// keyed by the same name) so `GET_GLOBAL`/`INVOKE` share one lookup.
#[derive(Debug, Clone)]
pub enum Global {
    Value(Value),
    Function(Rc<Function>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Str(Rc::new(String::new())).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_clone_increments_strong_count() {
        let s = Rc::new(StructInstance {
            name: "P".to_string(),
            properties: RefCell::new(HashMap::new()),
        });
        let v1 = Value::Struct(Rc::clone(&s));
        assert_eq!(Rc::strong_count(&s), 2);
        let v2 = v1.clone();
        assert_eq!(Rc::strong_count(&s), 3);
        drop(v1);
        assert_eq!(Rc::strong_count(&s), 2);
        drop(v2);
        assert_eq!(Rc::strong_count(&s), 1);
    }

    #[test]
    fn test_struct_cycle_leaks_by_design() {
        let s = Rc::new(StructInstance {
            name: "Node".to_string(),
            properties: RefCell::new(HashMap::new()),
        });
        s.properties
            .borrow_mut()
            .insert("next".to_string(), Value::Struct(Rc::clone(&s)));
        // the struct now holds a reference to itself; strong_count
        // never reaches zero through ordinary dropping.
        assert_eq!(Rc::strong_count(&s), 2);
        drop(s);
    }
}

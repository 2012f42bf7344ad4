//! Stack-based virtual machine: a flat value stack, a parallel
//! frame-pointer stack for call frames, a globals table, and the
//! opcode dispatch loop.
//!
//! Grounded on `original_source/src/vm.c`'s `run()` for per-opcode
//! runtime behavior (operand order, comparison/arithmetic semantics,
//! the `INVOKE`/`RET` calling convention) and on the teacher's own
//! `vm.rs` for the shape of a dispatch loop over a flat error enum and
//! a `log::trace!`-instrumented step function. Refcounting is not hand
//! rolled: see `object.rs`.

use crate::bytecode::{Chunk, Op};
use crate::object::{Function, Global, StructBlueprint, StructInstance, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("undefined variable '{0}'")]
    UndefinedGlobal(String),
    #[error("'{0}' is not a function")]
    NotCallable(String),
    #[error("'{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("unsupported operand type(s) for '{op}': {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("'{0}' has no property '{1}'")]
    UndefinedProperty(String, String),
    #[error("cannot access a property on a {0}")]
    NotAStruct(&'static str),
    #[error("unknown struct '{0}'")]
    UnknownStruct(String),
    #[error("illegal opcode byte {0:#04x}")]
    IllegalOpcode(u8),
    #[error("bytecode ended mid-instruction")]
    TruncatedInstruction,
}

type Result<T> = std::result::Result<T, Error>;

/// One call frame's bookkeeping: where the stack began (so `RET` knows
/// how much to pop) and where to resume execution when it returns.
struct Frame {
    frame_pointer: usize,
    return_address: usize,
}

/// The running machine: value stack, frame stack, globals, and
/// compile-time struct blueprints carried over from the chunk.
pub struct Vm<'c> {
    chunk: &'c Chunk,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: HashMap<String, Global>,
    blueprints: HashMap<String, Rc<StructBlueprint>>,
}

impl<'c> Vm<'c> {
    pub fn new(chunk: &'c Chunk) -> Vm<'c> {
        Vm {
            chunk,
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            blueprints: HashMap::new(),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(Error::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or(Error::StackUnderflow)
    }

    fn read_u8(&self, ip: usize) -> Result<u8> {
        self.chunk
            .code
            .get(ip)
            .copied()
            .ok_or(Error::TruncatedInstruction)
    }

    fn read_u32(&self, ip: usize) -> Result<u32> {
        let bytes = self
            .chunk
            .code
            .get(ip..ip + 4)
            .ok_or(Error::TruncatedInstruction)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn read_i16(&self, ip: usize) -> Result<i16> {
        let bytes = self
            .chunk
            .code
            .get(ip..ip + 2)
            .ok_or(Error::TruncatedInstruction)?;
        Ok(i16::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn as_number(&self, v: &Value, op: &'static str, other: &Value) -> Result<f64> {
        match v {
            Value::Number(n) => Ok(*n),
            other_v => Err(Error::TypeMismatch {
                op,
                lhs: other_v.type_name(),
                rhs: other.type_name(),
            }),
        }
    }

    /// Runs the chunk to completion, writing `print` output to `out`.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<()> {
        let mut ip: usize = 0;
        while ip < self.chunk.code.len() {
            let byte = self.read_u8(ip)?;
            let op = Op::from_byte(byte).ok_or(Error::IllegalOpcode(byte))?;
            log::trace!("ip={} op={:?} stack={:?}", ip, op, self.stack);
            ip += 1;

            match op {
                Op::Const => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let n = *self
                        .chunk
                        .cp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?;
                    self.push(Value::Number(n));
                }
                Op::Str => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let s = self
                        .chunk
                        .sp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    self.push(Value::Str(Rc::new(s)));
                }
                Op::True => self.push(Value::Bool(true)),
                Op::Null => self.push(Value::Null),
                Op::Pop => {
                    self.pop()?;
                }
                Op::Add => self.binary_arith(|a, b| a + b, "+")?,
                Op::Sub => self.binary_arith(|a, b| a - b, "-")?,
                Op::Mul => self.binary_arith(|a, b| a * b, "*")?,
                Op::Div => self.binary_arith(|a, b| a / b, "/")?,
                Op::Mod => self.binary_arith(|a, b| a % b, "%")?,
                Op::Gt => self.binary_compare(|a, b| a > b, ">")?,
                Op::Lt => self.binary_compare(|a, b| a < b, "<")?,
                Op::Eq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(values_equal(&a, &b)));
                }
                Op::Neg => {
                    let v = self.pop()?;
                    let n = self.as_number(&v, "unary -", &v)?;
                    self.push(Value::Number(-n));
                }
                Op::Not => {
                    let v = self.pop()?;
                    self.push(Value::Bool(!v.is_truthy()));
                }
                Op::GetGlobal => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let name = self
                        .chunk
                        .sp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let value = match self.globals.get(&name) {
                        Some(Global::Value(v)) => v.clone(),
                        Some(Global::Function(_)) => {
                            return Err(Error::NotCallable(name));
                        }
                        None => return Err(Error::UndefinedGlobal(name)),
                    };
                    self.push(value);
                }
                Op::SetGlobal => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let name = self
                        .chunk
                        .sp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let value = self.peek()?.clone();
                    self.globals.insert(name, Global::Value(value));
                }
                Op::DeepGet => {
                    let slot = self.read_u32(ip)? as usize;
                    ip += 4;
                    let fp = self.current_fp();
                    let value = self
                        .stack
                        .get(fp + slot)
                        .ok_or(Error::StackUnderflow)?
                        .clone();
                    self.push(value);
                }
                Op::DeepSet => {
                    let slot = self.read_u32(ip)? as usize;
                    ip += 4;
                    let fp = self.current_fp();
                    let value = self.peek()?.clone();
                    let cell = self
                        .stack
                        .get_mut(fp + slot)
                        .ok_or(Error::StackUnderflow)?;
                    *cell = value;
                }
                Op::GetAttr => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let name = self
                        .chunk
                        .sp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let obj = self.pop()?;
                    let value = self.get_property(&obj, &name)?;
                    self.push(value);
                }
                Op::SetAttr => {
                    let idx = self.read_u32(ip)? as usize;
                    ip += 4;
                    let name = self
                        .chunk
                        .sp
                        .get(idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let value = self.pop()?;
                    let obj = self.pop()?;
                    self.set_property(&obj, &name, value.clone())?;
                    self.push(value);
                }
                Op::Jz => {
                    let offset = self.read_i16(ip)?;
                    let from = ip + 2;
                    let condition = self.pop()?;
                    ip = if condition.is_truthy() {
                        from
                    } else {
                        jump_target(from, offset)
                    };
                    continue;
                }
                Op::Jmp => {
                    let offset = self.read_i16(ip)?;
                    let from = ip + 2;
                    ip = jump_target(from, offset);
                    continue;
                }
                Op::Struct => {
                    let name_idx = self.read_u8(ip)? as usize;
                    ip += 1;
                    let propcount = self.read_u8(ip)? as usize;
                    ip += 1;
                    let name = self
                        .chunk
                        .sp
                        .get(name_idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let mut properties = Vec::with_capacity(propcount);
                    for _ in 0..propcount {
                        let prop_idx = self.read_u8(ip)? as usize;
                        ip += 1;
                        properties.push(
                            self.chunk
                                .sp
                                .get(prop_idx)
                                .ok_or(Error::TruncatedInstruction)?
                                .clone(),
                        );
                    }
                    self.blueprints.insert(
                        name.clone(),
                        Rc::new(StructBlueprint { name, properties }),
                    );
                }
                Op::StructInit => {
                    let name_idx = self.read_u8(ip)? as usize;
                    ip += 1;
                    let _fieldcount = self.read_u8(ip)? as usize;
                    ip += 1;
                    let name = self
                        .chunk
                        .sp
                        .get(name_idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    if !self.blueprints.contains_key(&name) {
                        return Err(Error::UnknownStruct(name));
                    }
                    let instance = Rc::new(StructInstance {
                        name,
                        properties: RefCell::new(HashMap::new()),
                    });
                    self.push(Value::Struct(instance));
                }
                Op::Prop => {
                    let prop_idx = self.read_u8(ip)? as usize;
                    ip += 1;
                    let name = self
                        .chunk
                        .sp
                        .get(prop_idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    // Marker recording which field the value just below
                    // the top belongs to; STRUCT_INIT_FINALIZE consumes
                    // these pairs below the struct still underneath.
                    self.push(Value::Str(Rc::new(name)));
                }
                Op::StructInitFinalize => {
                    let propcount = self.read_u8(ip)? as usize;
                    ip += 1;
                    let mut pairs = Vec::with_capacity(propcount);
                    for _ in 0..propcount {
                        let name = match self.pop()? {
                            Value::Str(s) => (*s).clone(),
                            other => {
                                return Err(Error::TypeMismatch {
                                    op: "struct field name",
                                    lhs: other.type_name(),
                                    rhs: "string",
                                })
                            }
                        };
                        let value = self.pop()?;
                        pairs.push((name, value));
                    }
                    let instance = self.pop()?;
                    if let Value::Struct(s) = &instance {
                        let mut properties = s.properties.borrow_mut();
                        for (name, value) in pairs {
                            properties.insert(name, value);
                        }
                    } else {
                        return Err(Error::NotAStruct(instance.type_name()));
                    }
                    self.push(instance);
                }
                Op::IncFpCount => {
                    // Reserved for frame-size bookkeeping; RET already
                    // knows how much to pop from the frame pointer it
                    // recorded at INVOKE time, so this is a no-op here.
                }
                Op::Func => {
                    let name_idx = self.read_u8(ip)? as usize;
                    ip += 1;
                    let paramcount = self.read_u8(ip)? as usize;
                    ip += 1;
                    let location = self.read_u8(ip)? as usize;
                    ip += 1;
                    let name = self
                        .chunk
                        .sp
                        .get(name_idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    self.globals.insert(
                        name.clone(),
                        Global::Function(Rc::new(Function {
                            name,
                            location,
                            paramcount,
                        })),
                    );
                }
                Op::Invoke => {
                    let name_idx = self.read_u8(ip)? as usize;
                    ip += 1;
                    let argcount = self.read_u8(ip)? as usize;
                    ip += 1;
                    let name = self
                        .chunk
                        .sp
                        .get(name_idx)
                        .ok_or(Error::TruncatedInstruction)?
                        .clone();
                    let function = match self.globals.get(&name) {
                        Some(Global::Function(f)) => Rc::clone(f),
                        Some(Global::Value(_)) => return Err(Error::NotCallable(name)),
                        None => return Err(Error::UndefinedGlobal(name)),
                    };
                    if function.paramcount != argcount {
                        return Err(Error::Arity {
                            name,
                            expected: function.paramcount,
                            found: argcount,
                        });
                    }
                    self.frames.push(Frame {
                        frame_pointer: self.stack.len() - argcount,
                        return_address: ip,
                    });
                    ip = function.location;
                    continue;
                }
                Op::Ret => {
                    let retval = self.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .expect("compiled functions always push a frame before RET runs");
                    self.stack.truncate(frame.frame_pointer);
                    self.push(retval);
                    ip = frame.return_address;
                    continue;
                }
                Op::Print => {
                    let value = self.pop()?;
                    let _ = writeln!(out, "{value}");
                }
            }
        }
        Ok(())
    }

    fn current_fp(&self) -> usize {
        self.frames.last().map(|f| f.frame_pointer).unwrap_or(0)
    }

    fn binary_arith(&mut self, f: impl Fn(f64, f64) -> f64, op: &'static str) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let bn = self.as_number(&b, op, &a)?;
        let an = self.as_number(&a, op, &b)?;
        self.push(Value::Number(f(an, bn)));
        Ok(())
    }

    fn binary_compare(&mut self, f: impl Fn(f64, f64) -> bool, op: &'static str) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let bn = self.as_number(&b, op, &a)?;
        let an = self.as_number(&a, op, &b)?;
        self.push(Value::Bool(f(an, bn)));
        Ok(())
    }

    fn get_property(&self, obj: &Value, name: &str) -> Result<Value> {
        match obj {
            Value::Struct(s) => s
                .properties
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedProperty(s.name.clone(), name.to_string())),
            other => Err(Error::NotAStruct(other.type_name())),
        }
    }

    fn set_property(&self, obj: &Value, name: &str, value: Value) -> Result<()> {
        match obj {
            Value::Struct(s) => {
                s.properties.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(Error::NotAStruct(other.type_name())),
        }
    }
}

fn jump_target(from: usize, offset: i16) -> usize {
    (from as i64 + offset as i64) as usize
}

/// Structural equality used by `EQ`. Unlike the original implementation
/// (which widens every operand to a raw double via `TO_DOUBLE`, so
/// `true == 1.0` would spuriously compare equal), this compares by
/// runtime type first: values of different types are never equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Struct(x), Value::Struct(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile;
    use crate::lexer::lex;
    use crate::optimizer::optimize_program;
    use crate::parser::parse;
    use crate::semantics::label_program;

    fn exec(source: &str) -> String {
        let tokens = lex(source).unwrap();
        let mut program = parse(&tokens).unwrap();
        label_program(&mut program, None).unwrap();
        optimize_program(&mut program);
        let chunk = compile(&program).unwrap();
        let mut out = Vec::new();
        let mut vm = Vm::new(&chunk);
        vm.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_arithmetic_and_print() {
        assert_eq!(exec("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn test_globals_roundtrip() {
        assert_eq!(exec("let x = 10; x = x + 5; print x;"), "15\n");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            exec("if (1 < 2) { print \"yes\"; } else { print \"no\"; }"),
            "yes\n"
        );
    }

    #[test]
    fn test_while_loop_with_break() {
        assert_eq!(
            exec("let i = 0; while (true) { if (i == 3) { break; } print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop_continue_runs_advance() {
        assert_eq!(
            exec("let i = 0; for (; i < 4; i = i + 1) { if (i == 2) { continue; } print i; }"),
            "0\n1\n3\n"
        );
    }

    #[test]
    fn test_function_call_and_return() {
        assert_eq!(
            exec("fn add(a, b) { return a + b; } print add(2, 3);"),
            "5\n"
        );
    }

    #[test]
    fn test_function_locals_do_not_leak_to_globals() {
        assert_eq!(
            exec("fn f() { let x = 1; return x; } let x = 99; f(); print x;"),
            "99\n"
        );
    }

    #[test]
    fn test_struct_field_read_and_write() {
        assert_eq!(
            exec("struct P { x, y } let p = P { x: 1, y: 2 }; p.x = p.x + p.y; print p.x;"),
            "3\n"
        );
    }

    #[test]
    fn test_structural_equality_distinguishes_types() {
        assert_eq!(exec("print true == 1;"), "false\n");
    }

    #[test]
    fn test_division_by_zero_is_infinity_not_a_runtime_error() {
        assert_eq!(exec("let x = 0; print 1 / x;"), "inf\n");
    }

    #[test]
    fn test_recursive_function() {
        assert_eq!(
            exec(
                "fn fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); } print fact(5);"
            ),
            "120\n"
        );
    }

    #[test]
    fn test_type_mismatch_is_a_runtime_error() {
        let tokens = lex("print 1 + \"a\";").unwrap();
        let mut program = parse(&tokens).unwrap();
        label_program(&mut program, None).unwrap();
        let chunk = compile(&program).unwrap();
        let mut out = Vec::new();
        let mut vm = Vm::new(&chunk);
        assert!(vm.run(&mut out).is_err());
    }
}

//! Bytecode interpreter loop.

use crate::builtins;
use crate::bytecode::{Chunk, Op, Program};
use crate::error::{VmError, VmResult};
use crate::ops;
use crate::vm::{CallContext, ExecutionResult, Vm};
use quarry_codec::{ArrayKey, ArrayMap, Value};
use std::f64::consts::PI;
use std::sync::Arc;

/// Snapshot iteration over an array in a `foreach`.
struct Iter {
    items: Arc<ArrayMap>,
    pos: usize,
}

struct Frame {
    chunk: usize,
    pc: usize,
    locals: Vec<Value>,
    iters: Vec<Iter>,
    /// Number of arguments the caller supplied.
    argc: usize,
    /// Operand stack height when the frame was entered.
    base: usize,
}

enum Flow {
    Next,
    Done(Value),
}

pub(crate) struct Machine<'m, 'db> {
    vm: &'m mut Vm<'db>,
    program: &'m Program,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    output: Vec<u8>,
}

impl<'m, 'db> Machine<'m, 'db> {
    pub(crate) fn new(vm: &'m mut Vm<'db>, program: &'m Program) -> Self {
        Self {
            vm,
            program,
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            output: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> VmResult<ExecutionResult> {
        let Some(main) = self.program.chunks.first() else {
            return Ok(ExecutionResult {
                output: Vec::new(),
                value: Value::Null,
            });
        };
        self.frames.push(Frame {
            chunk: 0,
            pc: 0,
            locals: vec![Value::Null; main.locals.len()],
            iters: Vec::new(),
            argc: 0,
            base: 0,
        });

        loop {
            let program = self.program;
            let Some(frame) = self.frames.last_mut() else {
                return Err(self.fail(VmError::runtime("no active frame")));
            };
            let chunk = &program.chunks[frame.chunk];
            let pc = frame.pc;
            let Some(&op) = chunk.code.get(pc) else {
                return Err(self.fail(VmError::runtime("execution ran past the end of a function")));
            };
            frame.pc += 1;
            match self.exec(op, chunk) {
                Ok(Flow::Next) => {}
                Ok(Flow::Done(value)) => {
                    return Ok(ExecutionResult {
                        output: std::mem::take(&mut self.output),
                        value,
                    })
                }
                Err(err) => return Err(self.fail(err.at_line(chunk.line_at(pc)))),
            }
        }
    }

    fn fail(&mut self, err: VmError) -> VmError {
        err.with_output(std::mem::take(&mut self.output))
    }

    fn frame(&mut self) -> VmResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| VmError::runtime("no active frame"))
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::runtime("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> VmResult<Vec<Value>> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| VmError::runtime("operand stack underflow"))?;
        Ok(self.stack.split_off(at))
    }

    fn top(&mut self) -> VmResult<&mut Value> {
        self.stack
            .last_mut()
            .ok_or_else(|| VmError::runtime("operand stack underflow"))
    }

    fn local(&mut self, slot: u16) -> VmResult<&mut Value> {
        self.frame()?
            .locals
            .get_mut(usize::from(slot))
            .ok_or_else(|| VmError::runtime("invalid local slot"))
    }

    fn jump(&mut self, target: u32) -> VmResult<()> {
        self.frame()?.pc = target as usize;
        Ok(())
    }

    fn exec(&mut self, op: Op, chunk: &Chunk) -> VmResult<Flow> {
        match op {
            Op::Push(index) => {
                let value = chunk
                    .constants
                    .get(index as usize)
                    .cloned()
                    .unwrap_or_default();
                self.stack.push(value);
            }
            Op::Constant(index) => {
                let name = chunk.names.get(index as usize).map_or("", String::as_str);
                let value = self.constant(name);
                self.stack.push(value);
            }
            Op::Load(slot) => {
                let value = self.local(slot)?.clone();
                self.stack.push(value);
            }
            Op::Store(slot) => {
                let value = self.top()?.clone();
                *self.local(slot)? = value;
            }
            Op::StorePath {
                slot,
                depth,
                append,
            } => {
                let value = self.pop()?;
                let keys = self.pop_n(usize::from(depth))?;
                store_path(self.local(slot)?, &keys, append, value.clone())?;
                self.stack.push(value);
            }
            Op::Modify { slot, op } => {
                let rhs = self.pop()?;
                let target = self.local(slot)?;
                let value = ops::binary(op, target, &rhs)?;
                *target = value.clone();
                self.stack.push(value);
            }
            Op::ModifyPath { slot, depth, op } => {
                let rhs = self.pop()?;
                let keys = self.pop_n(usize::from(depth))?;
                let root = self.local(slot)?;
                let value = ops::binary(op, &read_path(root, &keys), &rhs)?;
                store_path(root, &keys, false, value.clone())?;
                self.stack.push(value);
            }
            Op::Step {
                slot,
                delta,
                prefix,
            } => {
                let target = self.local(slot)?;
                let old = std::mem::take(target);
                let new = ops::step(&old, delta);
                *target = new.clone();
                self.stack.push(if prefix { new } else { old });
            }
            Op::StepPath {
                slot,
                depth,
                delta,
                prefix,
            } => {
                let keys = self.pop_n(usize::from(depth))?;
                let root = self.local(slot)?;
                let old = read_path(root, &keys);
                let new = ops::step(&old, delta);
                store_path(root, &keys, false, new.clone())?;
                self.stack.push(if prefix { new } else { old });
            }
            Op::Index => {
                let key = self.pop()?;
                let base = self.pop()?;
                self.stack.push(ops::index(&base, &key));
            }
            Op::Binary(op) => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(ops::binary(op, &a, &b)?);
            }
            Op::Unary(op) => {
                let value = self.pop()?;
                self.stack.push(ops::unary(op, &value));
            }
            Op::ToBool => {
                let top = self.top()?;
                *top = Value::Bool(top.to_bool());
            }
            Op::Jump(target) => self.jump(target)?,
            Op::JumpIfFalse(target) => {
                if !self.pop()?.to_bool() {
                    self.jump(target)?;
                }
            }
            Op::JumpIfFalseOrPop(target) => {
                if self.top()?.to_bool() {
                    self.pop()?;
                } else {
                    self.jump(target)?;
                }
            }
            Op::JumpIfTrueOrPop(target) => {
                if self.top()?.to_bool() {
                    self.jump(target)?;
                } else {
                    self.pop()?;
                }
            }
            Op::JumpIfArg { index, target } => {
                if usize::from(index) < self.frame()?.argc {
                    self.jump(target)?;
                }
            }
            Op::Pop => {
                self.pop()?;
            }
            Op::NewArray => self.stack.push(Value::empty_array()),
            Op::ArrayPush => {
                let value = self.pop()?;
                if let Some(array) = self.top()?.as_array_mut() {
                    array.push(value);
                }
            }
            Op::ArrayInsert => {
                let value = self.pop()?;
                let key = self.pop()?;
                if let Some(array) = self.top()?.as_array_mut() {
                    array.insert(ArrayKey::from_value(&key), value);
                }
            }
            Op::Call { name, argc } => {
                let name = chunk.names.get(name as usize).map_or("", String::as_str);
                self.call(name, usize::from(argc))?;
            }
            Op::Print(count) => {
                for value in self.pop_n(usize::from(count))? {
                    self.output.extend_from_slice(&value.to_bytes());
                }
            }
            Op::IterStart => {
                let items = match self.pop()? {
                    Value::Array(items) => items,
                    Value::Null => Arc::new(ArrayMap::new()),
                    other => {
                        return Err(VmError::runtime(format!(
                            "foreach expects an array, got {}",
                            other.type_name()
                        )))
                    }
                };
                self.frame()?.iters.push(Iter { items, pos: 0 });
            }
            Op::IterNext { exit, with_key } => {
                let frame = self.frame()?;
                let Some(iter) = frame.iters.last_mut() else {
                    return Err(VmError::runtime("no active foreach"));
                };
                let entry = iter
                    .items
                    .entry_at(iter.pos)
                    .map(|(k, v)| (k.to_value(), v.clone()));
                match entry {
                    Some((key, value)) => {
                        iter.pos += 1;
                        if with_key {
                            self.stack.push(key);
                        }
                        self.stack.push(value);
                    }
                    None => {
                        frame.iters.pop();
                        frame.pc = exit as usize;
                    }
                }
            }
            Op::IterEnd => {
                self.frame()?.iters.pop();
            }
            Op::Return => {
                let value = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| VmError::runtime("no active frame"))?;
                self.stack.truncate(frame.base);
                if self.frames.is_empty() {
                    return Ok(Flow::Done(value));
                }
                self.stack.push(value);
            }
        }
        Ok(Flow::Next)
    }

    /// Calls `name` with the top `argc` stack values as arguments.
    fn call(&mut self, name: &str, argc: usize) -> VmResult<()> {
        let program = self.program;
        if let Some(&index) = program.functions.get(name) {
            if self.frames.len() >= self.vm.config.max_call_depth {
                return Err(VmError::runtime(format!(
                    "maximum call depth of {} exceeded in {name}()",
                    self.vm.config.max_call_depth
                )));
            }
            let callee = &program.chunks[index];
            let mut locals = self.pop_n(argc)?;
            locals.truncate(callee.params);
            locals.resize(callee.locals.len(), Value::Null);
            self.frames.push(Frame {
                chunk: index,
                pc: 0,
                locals,
                iters: Vec::new(),
                argc,
                base: self.stack.len(),
            });
            return Ok(());
        }

        let args = self.pop_n(argc)?;
        let Vm {
            db,
            functions,
            records,
            ..
        } = &mut *self.vm;
        let mut ctx = CallContext::new(name, &mut self.output, *db, records);
        let result = if let Some(function) = functions.get(name) {
            function.call(&mut ctx, &args)?
        } else if let Some(builtin) = builtins::lookup(name) {
            builtin(&mut ctx, &args)?
        } else {
            return Err(VmError::runtime(format!(
                "call to undefined function {name}()"
            )));
        };
        self.stack.push(result);
        Ok(())
    }

    /// Registered constants first, then the built-in ones. Unknown names
    /// evaluate to themselves.
    fn constant(&self, name: &str) -> Value {
        if let Some(expand) = self.vm.constants.get(name) {
            return expand();
        }
        match name {
            "EOL" => Value::str("\n"),
            "INT_MAX" => Value::Int(i64::MAX),
            "INT_MIN" => Value::Int(i64::MIN),
            "PI" => Value::Real(PI),
            _ => Value::str(name),
        }
    }
}

/// Reads `root[k0][k1]...`, null where the path does not exist.
fn read_path(root: &Value, keys: &[Value]) -> Value {
    keys.iter()
        .fold(root.clone(), |value, key| ops::index(&value, key))
}

/// Writes through `root[k0][k1]...`, creating arrays in place of nulls.
fn store_path(root: &mut Value, keys: &[Value], append: bool, value: Value) -> VmResult<()> {
    let mut slot = root;
    for key in keys {
        slot = container(slot)?.entry_or_null(ArrayKey::from_value(key));
    }
    if append {
        container(slot)?.push(value);
    } else {
        *slot = value;
    }
    Ok(())
}

fn container(value: &mut Value) -> VmResult<&mut ArrayMap> {
    if value.is_null() {
        *value = Value::empty_array();
    }
    let kind = value.type_name();
    value
        .as_array_mut()
        .ok_or_else(|| VmError::runtime(format!("cannot use a {kind} as an array")))
}

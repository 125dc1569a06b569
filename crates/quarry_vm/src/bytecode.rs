//! Compiled program representation.
//!
//! A [`Program`] is a set of chunks, one per script function plus the
//! top-level code in chunk 0. Each chunk owns its instructions, a line table
//! parallel to them, a constant pool, a pool of names for calls and named
//! constants, and the names of its local slots (parameters first).

use crate::ast::{BinOp, UnOp};
use crate::error::{VmError, VmResult};
use quarry_codec::Value;
use std::collections::HashMap;

/// One stack-machine instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Op {
    /// Push a constant from the pool.
    Push(u32),
    /// Push a named constant, resolved at run time.
    Constant(u32),
    Load(u16),
    /// Store the top of stack into a local, leaving it on the stack.
    Store(u16),
    /// Pop a value and `depth` keys; store at the path under a local.
    StorePath {
        slot: u16,
        depth: u8,
        append: bool,
    },
    Modify {
        slot: u16,
        op: BinOp,
    },
    ModifyPath {
        slot: u16,
        depth: u8,
        op: BinOp,
    },
    /// `++`/`--` on a local.
    Step {
        slot: u16,
        delta: i8,
        prefix: bool,
    },
    StepPath {
        slot: u16,
        depth: u8,
        delta: i8,
        prefix: bool,
    },
    /// Pop key and container, push the element or null.
    Index,
    Binary(BinOp),
    Unary(UnOp),
    ToBool,
    Jump(u32),
    /// Pop and jump when falsy.
    JumpIfFalse(u32),
    /// Jump keeping the top when falsy, otherwise pop it.
    JumpIfFalseOrPop(u32),
    /// Jump keeping the top when truthy, otherwise pop it.
    JumpIfTrueOrPop(u32),
    /// Jump when the caller supplied argument `index`.
    JumpIfArg {
        index: u16,
        target: u32,
    },
    Pop,
    NewArray,
    /// Pop a value and append it to the array below it.
    ArrayPush,
    /// Pop a value and a key and insert them into the array below.
    ArrayInsert,
    Call {
        name: u32,
        argc: u8,
    },
    /// Pop and print `n` values in order.
    Print(u8),
    /// Pop an array and start iterating over a snapshot of it.
    IterStart,
    /// Push the next `[key,] value`, or drop the iterator and jump to `exit`.
    IterNext {
        exit: u32,
        with_key: bool,
    },
    /// Drop the innermost iterator.
    IterEnd,
    Return,
}

impl Op {
    fn retarget(&mut self, addr: u32) {
        match self {
            Op::Jump(t)
            | Op::JumpIfFalse(t)
            | Op::JumpIfFalseOrPop(t)
            | Op::JumpIfTrueOrPop(t)
            | Op::JumpIfArg { target: t, .. }
            | Op::IterNext { exit: t, .. } => *t = addr,
            _ => {}
        }
    }
}

/// Compiled code of one function.
#[derive(Debug, Clone, Default)]
pub(crate) struct Chunk {
    pub name: String,
    pub code: Vec<Op>,
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
    pub names: Vec<String>,
    pub locals: Vec<String>,
    pub params: usize,
}

impl Chunk {
    pub(crate) fn line_at(&self, pc: usize) -> u32 {
        self.lines.get(pc).copied().unwrap_or(0)
    }
}

/// A compiled script, ready to run on any [`crate::Vm`].
///
/// Programs are immutable and may be executed any number of times.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) functions: HashMap<String, usize>,
}

impl Program {
    /// Names of the functions the script defines, in source order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> + '_ {
        // chunk 0 is the top-level code
        self.chunks.iter().skip(1).map(|chunk| chunk.name.as_str())
    }

    /// Returns `true` if the script defines `name`.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Total number of instructions across all chunks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.chunks.iter().map(|c| c.code.len()).sum()
    }
}

/// Forward-reference jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Label(usize);

#[derive(Debug)]
enum LabelState {
    /// Addresses of jumps waiting for this label.
    Unresolved(Vec<usize>),
    Resolved(u32),
}

/// Emits instructions for one chunk and resolves labels.
#[derive(Debug, Default)]
pub(crate) struct ChunkBuilder {
    chunk: Chunk,
    labels: Vec<LabelState>,
}

impl ChunkBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            chunk: Chunk {
                name: name.to_string(),
                ..Chunk::default()
            },
            labels: Vec::new(),
        }
    }

    pub(crate) fn emit(&mut self, op: Op, line: u32) -> usize {
        self.chunk.code.push(op);
        self.chunk.lines.push(line);
        self.chunk.code.len() - 1
    }

    pub(crate) fn label(&mut self) -> Label {
        self.labels.push(LabelState::Unresolved(Vec::new()));
        Label(self.labels.len() - 1)
    }

    /// Emits a jump-family instruction aimed at `label`.
    pub(crate) fn emit_jump(&mut self, op: Op, label: Label, line: u32) -> usize {
        let addr = self.emit(op, line);
        match &mut self.labels[label.0] {
            LabelState::Unresolved(waiting) => waiting.push(addr),
            LabelState::Resolved(target) => {
                let target = *target;
                self.chunk.code[addr].retarget(target);
            }
        }
        addr
    }

    /// Binds `label` to the next instruction address.
    pub(crate) fn resolve(&mut self, label: Label) -> VmResult<()> {
        let here = self.address()?;
        let state = std::mem::replace(&mut self.labels[label.0], LabelState::Resolved(here));
        if let LabelState::Unresolved(waiting) = state {
            for addr in waiting {
                self.chunk.code[addr].retarget(here);
            }
        }
        Ok(())
    }

    fn address(&self) -> VmResult<u32> {
        u32::try_from(self.chunk.code.len())
            .map_err(|_| VmError::compile(0, "function body too large"))
    }

    pub(crate) fn constant(&mut self, value: Value) -> VmResult<u32> {
        let pool = &mut self.chunk.constants;
        let index = match pool.iter().position(|c| quarry_codec::strict_eq(c, &value)) {
            Some(index) => index,
            None => {
                pool.push(value);
                pool.len() - 1
            }
        };
        u32::try_from(index).map_err(|_| VmError::compile(0, "too many constants"))
    }

    pub(crate) fn name(&mut self, name: &str) -> VmResult<u32> {
        let pool = &mut self.chunk.names;
        let index = match pool.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                pool.push(name.to_string());
                pool.len() - 1
            }
        };
        u32::try_from(index).map_err(|_| VmError::compile(0, "too many names"))
    }

    /// Slot of a local, allocating it on first use.
    pub(crate) fn local(&mut self, name: &str, line: u32) -> VmResult<u16> {
        let locals = &mut self.chunk.locals;
        let index = match locals.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                locals.push(name.to_string());
                locals.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| VmError::compile(line, "too many variables"))
    }

    pub(crate) fn set_params(&mut self, count: usize) {
        self.chunk.params = count;
    }

    pub(crate) fn finish(self) -> VmResult<Chunk> {
        if self
            .labels
            .iter()
            .any(|l| matches!(l, LabelState::Unresolved(w) if !w.is_empty()))
        {
            return Err(VmError::compile(0, "unresolved jump target"));
        }
        Ok(self.chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_backward_labels() {
        let mut builder = ChunkBuilder::new("main");
        let top = builder.label();
        builder.resolve(top).unwrap();
        let end = builder.label();
        let forward = builder.emit_jump(Op::JumpIfFalse(0), end, 1);
        let backward = builder.emit_jump(Op::Jump(0), top, 1);
        builder.resolve(end).unwrap();
        builder.emit(Op::Return, 2);

        let chunk = builder.finish().unwrap();
        assert_eq!(chunk.code[forward], Op::JumpIfFalse(2));
        assert_eq!(chunk.code[backward], Op::Jump(0));
        assert_eq!(chunk.line_at(2), 2);
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let mut builder = ChunkBuilder::new("main");
        let never = builder.label();
        builder.emit_jump(Op::Jump(0), never, 1);
        assert!(builder.finish().is_err());
    }

    #[test]
    fn pools_deduplicate() {
        let mut builder = ChunkBuilder::new("main");
        let a = builder.constant(Value::Int(1)).unwrap();
        let b = builder.constant(Value::Real(1.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(builder.constant(Value::Int(1)).unwrap(), a);
        assert_eq!(builder.name("f").unwrap(), builder.name("f").unwrap());
        assert_eq!(builder.local("x", 1).unwrap(), 0);
        assert_eq!(builder.local("y", 1).unwrap(), 1);
        assert_eq!(builder.local("x", 1).unwrap(), 0);
    }
}

//! Syntax tree to bytecode.

use crate::ast::{BinOp, Expr, ExprKind, FunctionDef, Place, Stmt};
use crate::bytecode::{Chunk, ChunkBuilder, Label, Op, Program};
use crate::error::{VmError, VmResult};
use crate::parser;
use quarry_codec::Value;
use std::collections::HashMap;
use tracing::debug;

/// Compiles script source into a [`Program`].
///
/// Function definitions are hoisted: a function may be called before the
/// statement that defines it.
///
/// # Errors
///
/// Returns [`VmError::Compile`] with the 1-based line of the first error.
pub fn compile(source: &str) -> VmResult<Program> {
    let stmts = parser::parse(source)?;

    let mut defs = Vec::new();
    collect_functions(&stmts, &mut defs);

    let mut functions = HashMap::new();
    for (index, def) in defs.iter().enumerate() {
        if functions.insert(def.name.clone(), index + 1).is_some() {
            return Err(VmError::compile(
                def.line,
                format!("function {}() is defined twice", def.name),
            ));
        }
    }

    let mut chunks = Vec::with_capacity(defs.len() + 1);
    let mut main = FnCompiler::new("main");
    main.block(&stmts)?;
    chunks.push(main.finish(last_line(&stmts))?);
    for def in &defs {
        chunks.push(FnCompiler::function(def)?);
    }

    let program = Program { chunks, functions };
    debug!(
        functions = defs.len(),
        instructions = program.instruction_count(),
        "script compiled"
    );
    Ok(program)
}

fn collect_functions<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a FunctionDef>) {
    for stmt in stmts {
        match stmt {
            Stmt::Function(def) => {
                out.push(def);
                collect_functions(&def.body, out);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (_, body) in branches {
                    collect_functions(body, out);
                }
                if let Some(body) = otherwise {
                    collect_functions(body, out);
                }
            }
            Stmt::While(_, body)
            | Stmt::DoWhile(body, _)
            | Stmt::For { body, .. }
            | Stmt::Foreach { body, .. }
            | Stmt::Block(body) => collect_functions(body, out),
            _ => {}
        }
    }
}

fn last_line(stmts: &[Stmt]) -> u32 {
    match stmts.last() {
        Some(Stmt::Expr(e)) => e.line,
        Some(
            Stmt::Print(_, line) | Stmt::Break(line) | Stmt::Continue(line) | Stmt::Return(_, line),
        ) => *line,
        Some(Stmt::Function(def)) => def.line,
        _ => 1,
    }
}

struct LoopLabels {
    brk: Label,
    cont: Label,
}

struct FnCompiler {
    out: ChunkBuilder,
    loops: Vec<LoopLabels>,
}

impl FnCompiler {
    fn new(name: &str) -> Self {
        Self {
            out: ChunkBuilder::new(name),
            loops: Vec::new(),
        }
    }

    fn function(def: &FunctionDef) -> VmResult<Chunk> {
        let mut this = Self::new(&def.name);
        for param in &def.params {
            this.out.local(&param.name, def.line)?;
        }
        this.out.set_params(def.params.len());
        for (index, param) in def.params.iter().enumerate() {
            let Some(default) = &param.default else {
                continue;
            };
            let supplied = this.out.label();
            let index = u16::try_from(index)
                .map_err(|_| VmError::compile(def.line, "too many parameters"))?;
            this.out
                .emit_jump(Op::JumpIfArg { index, target: 0 }, supplied, def.line);
            this.expr(default)?;
            this.out.emit(Op::Store(index), def.line);
            this.out.emit(Op::Pop, def.line);
            this.out.resolve(supplied)?;
        }
        this.block(&def.body)?;
        this.finish(last_line(&def.body).max(def.line))
    }

    fn finish(mut self, line: u32) -> VmResult<Chunk> {
        let null = self.out.constant(Value::Null)?;
        self.out.emit(Op::Push(null), line);
        self.out.emit(Op::Return, line);
        self.out.finish()
    }

    fn block(&mut self, stmts: &[Stmt]) -> VmResult<()> {
        stmts.iter().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &Stmt) -> VmResult<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.out.emit(Op::Pop, expr.line);
            }
            Stmt::Print(args, line) => {
                for batch in args.chunks(usize::from(u8::MAX)) {
                    for arg in batch {
                        self.expr(arg)?;
                    }
                    self.out.emit(Op::Print(batch.len() as u8), *line);
                }
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                let end = self.out.label();
                for (cond, body) in branches {
                    let next = self.out.label();
                    self.expr(cond)?;
                    self.out.emit_jump(Op::JumpIfFalse(0), next, cond.line);
                    self.block(body)?;
                    self.out.emit_jump(Op::Jump(0), end, cond.line);
                    self.out.resolve(next)?;
                }
                if let Some(body) = otherwise {
                    self.block(body)?;
                }
                self.out.resolve(end)?;
            }
            Stmt::While(cond, body) => {
                let top = self.out.label();
                let end = self.out.label();
                self.out.resolve(top)?;
                self.expr(cond)?;
                self.out.emit_jump(Op::JumpIfFalse(0), end, cond.line);
                self.loop_body(body, end, top)?;
                self.out.emit_jump(Op::Jump(0), top, cond.line);
                self.out.resolve(end)?;
            }
            Stmt::DoWhile(body, cond) => {
                let top = self.out.label();
                let check = self.out.label();
                let end = self.out.label();
                self.out.resolve(top)?;
                self.loop_body(body, end, check)?;
                self.out.resolve(check)?;
                self.expr(cond)?;
                self.out.emit_jump(Op::JumpIfFalse(0), end, cond.line);
                self.out.emit_jump(Op::Jump(0), top, cond.line);
                self.out.resolve(end)?;
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                for expr in init {
                    self.expr(expr)?;
                    self.out.emit(Op::Pop, expr.line);
                }
                let top = self.out.label();
                let next = self.out.label();
                let end = self.out.label();
                self.out.resolve(top)?;
                if let Some(cond) = cond {
                    self.expr(cond)?;
                    self.out.emit_jump(Op::JumpIfFalse(0), end, cond.line);
                }
                self.loop_body(body, end, next)?;
                self.out.resolve(next)?;
                for expr in step {
                    self.expr(expr)?;
                    self.out.emit(Op::Pop, expr.line);
                }
                self.out.emit_jump(Op::Jump(0), top, 0);
                self.out.resolve(end)?;
            }
            Stmt::Foreach {
                subject,
                key,
                value,
                body,
            } => {
                let line = subject.line;
                self.expr(subject)?;
                self.out.emit(Op::IterStart, line);
                let top = self.out.label();
                let brk = self.out.label();
                let done = self.out.label();
                self.out.resolve(top)?;
                self.out.emit_jump(
                    Op::IterNext {
                        exit: 0,
                        with_key: key.is_some(),
                    },
                    done,
                    line,
                );
                let slot = self.out.local(value, line)?;
                self.out.emit(Op::Store(slot), line);
                self.out.emit(Op::Pop, line);
                if let Some(key) = key {
                    let slot = self.out.local(key, line)?;
                    self.out.emit(Op::Store(slot), line);
                    self.out.emit(Op::Pop, line);
                }
                self.loop_body(body, brk, top)?;
                self.out.emit_jump(Op::Jump(0), top, line);
                self.out.resolve(brk)?;
                self.out.emit(Op::IterEnd, line);
                self.out.resolve(done)?;
            }
            Stmt::Break(line) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.brk)
                    .ok_or_else(|| VmError::compile(*line, "'break' outside a loop"))?;
                self.out.emit_jump(Op::Jump(0), target, *line);
            }
            Stmt::Continue(line) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.cont)
                    .ok_or_else(|| VmError::compile(*line, "'continue' outside a loop"))?;
                self.out.emit_jump(Op::Jump(0), target, *line);
            }
            Stmt::Return(value, line) => {
                match value {
                    Some(expr) => self.expr(expr)?,
                    None => self.push(Value::Null, *line)?,
                }
                self.out.emit(Op::Return, *line);
            }
            Stmt::Function(_) => {}
            Stmt::Block(body) => self.block(body)?,
        }
        Ok(())
    }

    fn loop_body(&mut self, body: &[Stmt], brk: Label, cont: Label) -> VmResult<()> {
        self.loops.push(LoopLabels { brk, cont });
        let result = self.block(body);
        self.loops.pop();
        result
    }

    fn push(&mut self, value: Value, line: u32) -> VmResult<()> {
        let index = self.out.constant(value)?;
        self.out.emit(Op::Push(index), line);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> VmResult<()> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Literal(value) => self.push(value.clone(), line)?,
            ExprKind::Interpolated(parts) => {
                self.push(Value::str(""), line)?;
                for part in parts {
                    self.expr(part)?;
                    self.out.emit(Op::Binary(BinOp::Concat), line);
                }
            }
            ExprKind::Var(name) => {
                let slot = self.out.local(name, line)?;
                self.out.emit(Op::Load(slot), line);
            }
            ExprKind::Constant(name) => {
                let index = self.out.name(name)?;
                self.out.emit(Op::Constant(index), line);
            }
            ExprKind::Index(base, key) => {
                self.expr(base)?;
                self.expr(key)?;
                self.out.emit(Op::Index, line);
            }
            ExprKind::EmptyIndex(_) => {
                return Err(VmError::compile(line, "cannot use '[]' for reading"));
            }
            ExprKind::Array(entries) => {
                self.out.emit(Op::NewArray, line);
                for (key, value) in entries {
                    match key {
                        Some(key) => {
                            self.expr(key)?;
                            self.expr(value)?;
                            self.out.emit(Op::ArrayInsert, value.line);
                        }
                        None => {
                            self.expr(value)?;
                            self.out.emit(Op::ArrayPush, value.line);
                        }
                    }
                }
            }
            ExprKind::Unary(op, operand) => {
                self.expr(operand)?;
                self.out.emit(Op::Unary(*op), line);
            }
            ExprKind::Binary(op, lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.out.emit(Op::Binary(*op), line);
            }
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                let end = self.out.label();
                self.expr(lhs)?;
                self.out.emit(Op::ToBool, line);
                let jump = if matches!(expr.kind, ExprKind::And(..)) {
                    Op::JumpIfFalseOrPop(0)
                } else {
                    Op::JumpIfTrueOrPop(0)
                };
                self.out.emit_jump(jump, end, line);
                self.expr(rhs)?;
                self.out.emit(Op::ToBool, line);
                self.out.resolve(end)?;
            }
            ExprKind::Ternary(cond, then, otherwise) => {
                let other = self.out.label();
                let end = self.out.label();
                self.expr(cond)?;
                self.out.emit_jump(Op::JumpIfFalse(0), other, line);
                self.expr(then)?;
                self.out.emit_jump(Op::Jump(0), end, line);
                self.out.resolve(other)?;
                self.expr(otherwise)?;
                self.out.resolve(end)?;
            }
            ExprKind::Assign { target, op, value } => {
                let slot = self.out.local(&target.var, line)?;
                if target.path.is_empty() && !target.append {
                    self.expr(value)?;
                    let op = match op {
                        Some(op) => Op::Modify { slot, op: *op },
                        None => Op::Store(slot),
                    };
                    self.out.emit(op, line);
                } else {
                    let depth = self.path(target, line)?;
                    self.expr(value)?;
                    let op = match op {
                        Some(op) => Op::ModifyPath {
                            slot,
                            depth,
                            op: *op,
                        },
                        None => Op::StorePath {
                            slot,
                            depth,
                            append: target.append,
                        },
                    };
                    self.out.emit(op, line);
                }
            }
            ExprKind::Step {
                target,
                delta,
                prefix,
            } => {
                let slot = self.out.local(&target.var, line)?;
                let delta = if *delta > 0 { 1 } else { -1 };
                if target.path.is_empty() {
                    self.out.emit(
                        Op::Step {
                            slot,
                            delta,
                            prefix: *prefix,
                        },
                        line,
                    );
                } else {
                    let depth = self.path(target, line)?;
                    self.out.emit(
                        Op::StepPath {
                            slot,
                            depth,
                            delta,
                            prefix: *prefix,
                        },
                        line,
                    );
                }
            }
            ExprKind::Call(name, args) => {
                let argc = u8::try_from(args.len())
                    .map_err(|_| VmError::compile(line, "too many arguments"))?;
                for arg in args {
                    self.expr(arg)?;
                }
                let name = self.out.name(name)?;
                self.out.emit(Op::Call { name, argc }, line);
            }
        }
        Ok(())
    }

    /// Pushes the subscripts of a place and returns how many there are.
    fn path(&mut self, target: &Place, line: u32) -> VmResult<u8> {
        for key in &target.path {
            self.expr(key)?;
        }
        u8::try_from(target.path.len()).map_err(|_| VmError::compile(line, "subscript too deep"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_chunk_comes_first() {
        let program = compile("print f(); function f() { return 1; }").unwrap();
        assert_eq!(program.chunks.len(), 2);
        assert_eq!(program.chunks[0].name, "main");
        assert_eq!(program.functions["f"], 1);
        assert!(program.defines("f"));
    }

    #[test]
    fn nested_definitions_are_hoisted() {
        let program = compile("if (true) { function g($x) { return $x; } }").unwrap();
        assert!(program.defines("g"));
        assert_eq!(program.chunks[1].params, 1);
        assert_eq!(program.chunks[1].locals, vec!["x".to_string()]);
    }

    #[test]
    fn every_chunk_ends_in_return() {
        let program = compile("$a = 1; function f() { $b = 2; }").unwrap();
        for chunk in &program.chunks {
            assert_eq!(chunk.code.last(), Some(&Op::Return));
            assert_eq!(chunk.code.len(), chunk.lines.len());
        }
    }

    #[test]
    fn compile_errors() {
        let err = compile("function f() {}\nfunction f() {}").unwrap_err();
        assert!(matches!(err, VmError::Compile { line: 2, .. }), "{err}");

        let err = compile("$x = 1;\nbreak;").unwrap_err();
        assert!(matches!(err, VmError::Compile { line: 2, .. }), "{err}");

        assert!(compile("continue;").is_err());
        assert!(compile("print $a[];").is_err());
    }

    #[test]
    fn loops_patch_every_jump() {
        let program = compile(
            "for ($i = 0; $i < 3; $i++) { if ($i == 1) continue; if ($i == 2) break; }
             foreach ([1, 2] as $k => $v) { if ($v) break; }
             do { $n++; } while ($n < 3);",
        )
        .unwrap();
        let code = &program.chunks[0].code;
        let len = code.len() as u32;
        for op in code {
            match *op {
                Op::Jump(t)
                | Op::JumpIfFalse(t)
                | Op::JumpIfFalseOrPop(t)
                | Op::JumpIfTrueOrPop(t)
                | Op::IterNext { exit: t, .. } => assert!(t < len),
                _ => {}
            }
        }
    }
}

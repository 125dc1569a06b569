//! Recursive-descent statement parser with a Pratt expression core.

use crate::ast::{BinOp, Expr, ExprKind, FunctionDef, Param, Place, Stmt, UnOp};
use crate::error::{VmError, VmResult};
use crate::lexer::{Lexer, TemplatePart, Token, TokenKind};
use quarry_codec::Value;

// Binding powers, higher binds tighter. Infix pairs are (left, right).
mod bp {
    pub const TERNARY: u8 = 2;
    pub const OR: (u8, u8) = (3, 4);
    pub const AND: (u8, u8) = (5, 6);
    pub const EQUALITY: (u8, u8) = (7, 8);
    pub const COMPARISON: (u8, u8) = (9, 10);
    pub const ADD: (u8, u8) = (11, 12);
    pub const MUL: (u8, u8) = (13, 14);
    pub const PREFIX: u8 = 15;
}

/// Deepest statement or expression nesting accepted.
const MAX_NESTING: usize = 256;

/// Parses a whole script into top-level statements.
pub(crate) fn parse(source: &str) -> VmResult<Vec<Stmt>> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut stmts = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        if let Some(stmt) = parser.statement()? {
            stmts.push(stmt);
        }
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_next(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> VmResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> VmError {
        VmError::compile(
            self.line(),
            format!("expected {wanted}, found {}", self.peek().describe()),
        )
    }

    fn keyword(&self) -> Option<String> {
        match self.peek() {
            TokenKind::Ident(name) => Some(name.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.keyword().as_deref() == Some(word)
    }

    /// Enters one more level of nesting. The caller restores `depth`.
    fn nest(&mut self) -> VmResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(VmError::compile(
                self.line(),
                format!("nesting exceeds {MAX_NESTING} levels"),
            ));
        }
        Ok(())
    }

    fn end_statement(&mut self) -> VmResult<()> {
        if self.eat(&TokenKind::Semi) || self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// Returns `None` for an empty statement.
    fn statement(&mut self) -> VmResult<Option<Stmt>> {
        let base = self.depth;
        self.nest()?;
        let stmt = self.statement_at_depth();
        self.depth = base;
        stmt
    }

    fn statement_at_depth(&mut self) -> VmResult<Option<Stmt>> {
        let line = self.line();
        if self.eat(&TokenKind::Semi) {
            return Ok(None);
        }
        if self.eat(&TokenKind::LBrace) {
            return Ok(Some(Stmt::Block(self.block_rest()?)));
        }
        let stmt = match self.keyword().as_deref() {
            Some("print" | "echo") => {
                self.advance();
                let args = self.expr_list()?;
                if args.is_empty() {
                    return Err(self.unexpected("an expression"));
                }
                self.end_statement()?;
                Stmt::Print(args, line)
            }
            Some("if") => {
                self.advance();
                self.if_rest()?
            }
            Some("while") => {
                self.advance();
                let cond = self.condition()?;
                Stmt::While(cond, self.body()?)
            }
            Some("do") => {
                self.advance();
                let body = self.body()?;
                if !self.at_keyword("while") {
                    return Err(self.unexpected("'while'"));
                }
                self.advance();
                let cond = self.condition()?;
                self.end_statement()?;
                Stmt::DoWhile(body, cond)
            }
            Some("for") => {
                self.advance();
                self.for_rest()?
            }
            Some("foreach") => {
                self.advance();
                self.foreach_rest()?
            }
            Some("break") => {
                self.advance();
                self.end_statement()?;
                Stmt::Break(line)
            }
            Some("continue") => {
                self.advance();
                self.end_statement()?;
                Stmt::Continue(line)
            }
            Some("return") => {
                self.advance();
                let value = if self.at(&TokenKind::Semi) || self.at(&TokenKind::Eof) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.end_statement()?;
                Stmt::Return(value, line)
            }
            Some("function") if matches!(self.peek_next(), TokenKind::Ident(_)) => {
                self.advance();
                Stmt::Function(self.function_rest(line)?)
            }
            Some("else" | "elseif") => {
                return Err(VmError::compile(line, "'else' without 'if'"));
            }
            _ => {
                let expr = self.expr()?;
                self.end_statement()?;
                Stmt::Expr(expr)
            }
        };
        Ok(Some(stmt))
    }

    fn block_rest(&mut self) -> VmResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            if let Some(stmt) = self.statement()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    fn body(&mut self) -> VmResult<Vec<Stmt>> {
        if self.eat(&TokenKind::LBrace) {
            return self.block_rest();
        }
        Ok(self.statement()?.into_iter().collect())
    }

    fn condition(&mut self) -> VmResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(cond)
    }

    fn if_rest(&mut self) -> VmResult<Stmt> {
        let mut branches = vec![(self.condition()?, self.body()?)];
        let mut otherwise = None;
        loop {
            match self.keyword().as_deref() {
                Some("elseif") => {
                    self.advance();
                    branches.push((self.condition()?, self.body()?));
                }
                Some("else") => {
                    self.advance();
                    if self.at_keyword("if") {
                        self.advance();
                        branches.push((self.condition()?, self.body()?));
                    } else {
                        otherwise = Some(self.body()?);
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    fn for_rest(&mut self) -> VmResult<Stmt> {
        self.expect(&TokenKind::LParen)?;
        let init = self.expr_list()?;
        self.expect(&TokenKind::Semi)?;
        let cond = if self.at(&TokenKind::Semi) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(&TokenKind::Semi)?;
        let step = self.expr_list()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body: self.body()?,
        })
    }

    fn foreach_rest(&mut self) -> VmResult<Stmt> {
        self.expect(&TokenKind::LParen)?;
        let subject = self.expr()?;
        if !self.at_keyword("as") {
            return Err(self.unexpected("'as'"));
        }
        self.advance();
        let first = self.variable_name()?;
        let (key, value) = if self.eat(&TokenKind::FatArrow) {
            (Some(first), self.variable_name()?)
        } else {
            (None, first)
        };
        self.expect(&TokenKind::RParen)?;
        Ok(Stmt::Foreach {
            subject,
            key,
            value,
            body: self.body()?,
        })
    }

    fn variable_name(&mut self) -> VmResult<String> {
        match self.peek() {
            TokenKind::Variable(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a variable")),
        }
    }

    fn function_rest(&mut self, line: u32) -> VmResult<FunctionDef> {
        let TokenKind::Ident(name) = self.advance() else {
            return Err(self.unexpected("a function name"));
        };
        self.expect(&TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            if !params.is_empty() {
                self.expect(&TokenKind::Comma)?;
            }
            let param = self.variable_name()?;
            if params.iter().any(|p| p.name == param) {
                return Err(VmError::compile(
                    self.line(),
                    format!("duplicate parameter ${param}"),
                ));
            }
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.expr()?)
            } else {
                None
            };
            params.push(Param {
                name: param,
                default,
            });
        }
        self.expect(&TokenKind::LBrace)?;
        Ok(FunctionDef {
            name,
            params,
            body: self.block_rest()?,
            line,
        })
    }

    fn expr_list(&mut self) -> VmResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        if matches!(self.peek(), TokenKind::Semi | TokenKind::RParen | TokenKind::Eof) {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                return Ok(exprs);
            }
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn expr(&mut self) -> VmResult<Expr> {
        let base = self.depth;
        self.nest()?;
        let expr = self.assignment();
        self.depth = base;
        expr
    }

    fn assignment(&mut self) -> VmResult<Expr> {
        let lhs = self.expr_bp(0)?;
        let op = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            TokenKind::StarAssign => Some(BinOp::Mul),
            TokenKind::SlashAssign => Some(BinOp::Div),
            TokenKind::PercentAssign => Some(BinOp::Mod),
            TokenKind::DotDotAssign => Some(BinOp::Concat),
            _ => return Ok(lhs),
        };
        let line = self.line();
        self.advance();
        let target = place(lhs, op.is_none())?;
        let value = self.expr()?;
        Ok(Expr::new(
            ExprKind::Assign {
                target,
                op,
                value: Box::new(value),
            },
            line,
        ))
    }

    /// Every operator folded into `lhs` deepens the tree, so each one counts
    /// as a level of nesting.
    fn expr_bp(&mut self, min_bp: u8) -> VmResult<Expr> {
        let base = self.depth;
        self.nest()?;
        let mut lhs = self.prefix()?;
        loop {
            let line = self.line();
            if self.at(&TokenKind::Question) {
                if bp::TERNARY < min_bp {
                    break;
                }
                self.advance();
                self.nest()?;
                let then = self.expr()?;
                self.expect(&TokenKind::Colon)?;
                let otherwise = self.expr_bp(bp::TERNARY)?;
                lhs = Expr::new(
                    ExprKind::Ternary(Box::new(lhs), Box::new(then), Box::new(otherwise)),
                    line,
                );
                continue;
            }
            let Some((l_bp, r_bp)) = infix_bp(self.peek()) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let token = self.advance();
            self.nest()?;
            let rhs = self.expr_bp(r_bp)?;
            let kind = match token {
                TokenKind::AndAnd => ExprKind::And(Box::new(lhs), Box::new(rhs)),
                TokenKind::OrOr => ExprKind::Or(Box::new(lhs), Box::new(rhs)),
                other => {
                    let Some(op) = binary_op(&other) else {
                        return Err(VmError::compile(line, "unknown operator"));
                    };
                    ExprKind::Binary(op, Box::new(lhs), Box::new(rhs))
                }
            };
            lhs = Expr::new(kind, line);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn prefix(&mut self) -> VmResult<Expr> {
        let line = self.line();
        let expr = match self.advance() {
            TokenKind::Int(i) => Expr::new(ExprKind::Literal(Value::Int(i)), line),
            TokenKind::Real(r) => Expr::new(ExprKind::Literal(Value::Real(r)), line),
            TokenKind::Str(bytes) => Expr::new(ExprKind::Literal(Value::from(bytes)), line),
            TokenKind::Template(parts) => {
                let parts = parts
                    .into_iter()
                    .map(|part| match part {
                        TemplatePart::Text(bytes) => {
                            Expr::new(ExprKind::Literal(Value::from(bytes)), line)
                        }
                        TemplatePart::Var(name) => Expr::new(ExprKind::Var(name), line),
                    })
                    .collect();
                Expr::new(ExprKind::Interpolated(parts), line)
            }
            TokenKind::Variable(name) => Expr::new(ExprKind::Var(name), line),
            TokenKind::Ident(name) => self.identifier(name, line)?,
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
            TokenKind::LBracket => self.list_literal(line)?,
            TokenKind::LBrace => self.object_literal(line)?,
            TokenKind::Minus => {
                let operand = self.expr_bp(bp::PREFIX)?;
                match operand.kind {
                    ExprKind::Literal(Value::Int(i)) => {
                        Expr::new(ExprKind::Literal(Value::Int(i.wrapping_neg())), line)
                    }
                    ExprKind::Literal(Value::Real(r)) => {
                        Expr::new(ExprKind::Literal(Value::Real(-r)), line)
                    }
                    _ => Expr::new(ExprKind::Unary(UnOp::Neg, Box::new(operand)), line),
                }
            }
            TokenKind::Plus => {
                let operand = self.expr_bp(bp::PREFIX)?;
                Expr::new(ExprKind::Unary(UnOp::Plus, Box::new(operand)), line)
            }
            TokenKind::Bang => {
                let operand = self.expr_bp(bp::PREFIX)?;
                Expr::new(ExprKind::Unary(UnOp::Not, Box::new(operand)), line)
            }
            token @ (TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let operand = self.expr_bp(bp::PREFIX)?;
                Expr::new(
                    ExprKind::Step {
                        target: place(operand, false)?,
                        delta: if token == TokenKind::PlusPlus { 1 } else { -1 },
                        prefix: true,
                    },
                    line,
                )
            }
            other => {
                return Err(VmError::compile(
                    line,
                    format!("expected an expression, found {}", other.describe()),
                ))
            }
        };
        self.postfix(expr)
    }

    fn postfix(&mut self, mut expr: Expr) -> VmResult<Expr> {
        let base = self.depth;
        loop {
            let line = self.line();
            if matches!(
                self.peek(),
                TokenKind::LBracket | TokenKind::Dot | TokenKind::PlusPlus | TokenKind::MinusMinus
            ) {
                self.nest()?;
            }
            match self.peek() {
                TokenKind::LBracket => {
                    self.advance();
                    if self.eat(&TokenKind::RBracket) {
                        expr = Expr::new(ExprKind::EmptyIndex(Box::new(expr)), line);
                        continue;
                    }
                    let key = self.expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(key)), line);
                }
                TokenKind::Dot => {
                    self.advance();
                    let key = match self.advance() {
                        TokenKind::Ident(name) => Value::from(name),
                        TokenKind::Int(i) => Value::Int(i),
                        other => {
                            return Err(VmError::compile(
                                line,
                                format!("expected a member name, found {}", other.describe()),
                            ))
                        }
                    };
                    let key = Expr::new(ExprKind::Literal(key), line);
                    expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(key)), line);
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let delta = if self.advance() == TokenKind::PlusPlus { 1 } else { -1 };
                    expr = Expr::new(
                        ExprKind::Step {
                            target: place(expr, false)?,
                            delta,
                            prefix: false,
                        },
                        line,
                    );
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn identifier(&mut self, name: String, line: u32) -> VmResult<Expr> {
        if self.eat(&TokenKind::LParen) {
            let mut args = Vec::new();
            while !self.eat(&TokenKind::RParen) {
                if !args.is_empty() {
                    self.expect(&TokenKind::Comma)?;
                }
                args.push(self.expr()?);
            }
            return Ok(Expr::new(ExprKind::Call(name, args), line));
        }
        let kind = match name.to_ascii_lowercase().as_str() {
            "true" => ExprKind::Literal(Value::Bool(true)),
            "false" => ExprKind::Literal(Value::Bool(false)),
            "null" => ExprKind::Literal(Value::Null),
            _ => ExprKind::Constant(name),
        };
        Ok(Expr::new(kind, line))
    }

    fn list_literal(&mut self, line: u32) -> VmResult<Expr> {
        let mut entries = Vec::new();
        while !self.eat(&TokenKind::RBracket) {
            let first = self.expr()?;
            if self.eat(&TokenKind::FatArrow) {
                entries.push((Some(first), self.expr()?));
            } else {
                entries.push((None, first));
            }
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket)?;
                break;
            }
        }
        Ok(Expr::new(ExprKind::Array(entries), line))
    }

    fn object_literal(&mut self, line: u32) -> VmResult<Expr> {
        let mut entries = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            let key_line = self.line();
            let bare = match (self.peek(), self.peek_next()) {
                (TokenKind::Ident(name), TokenKind::Colon) => Some(name.clone()),
                _ => None,
            };
            let key = match bare {
                Some(name) => {
                    self.advance();
                    Expr::new(ExprKind::Literal(Value::from(name)), key_line)
                }
                None => self.expr()?,
            };
            self.expect(&TokenKind::Colon)?;
            entries.push((Some(key), self.expr()?));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace)?;
                break;
            }
        }
        Ok(Expr::new(ExprKind::Array(entries), line))
    }
}

fn infix_bp(token: &TokenKind) -> Option<(u8, u8)> {
    let pair = match token {
        TokenKind::OrOr => bp::OR,
        TokenKind::AndAnd => bp::AND,
        TokenKind::Eq | TokenKind::Ne | TokenKind::Identical | TokenKind::NotIdentical => {
            bp::EQUALITY
        }
        TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => bp::COMPARISON,
        TokenKind::Plus | TokenKind::Minus | TokenKind::DotDot => bp::ADD,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => bp::MUL,
        _ => return None,
    };
    Some(pair)
}

fn binary_op(token: &TokenKind) -> Option<BinOp> {
    let op = match token {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::DotDot => BinOp::Concat,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::Ne => BinOp::Ne,
        TokenKind::Identical => BinOp::Identical,
        TokenKind::NotIdentical => BinOp::NotIdentical,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Ge => BinOp::Ge,
        _ => return None,
    };
    Some(op)
}

/// Converts an expression into an assignment target.
fn place(expr: Expr, allow_append: bool) -> VmResult<Place> {
    let line = expr.line;
    let mut current = expr;
    let mut append = false;
    if let ExprKind::EmptyIndex(base) = current.kind {
        if !allow_append {
            return Err(VmError::compile(line, "'[]' can only be assigned to"));
        }
        append = true;
        current = *base;
    }
    let mut path = Vec::new();
    loop {
        match current.kind {
            ExprKind::Var(var) => {
                path.reverse();
                return Ok(Place { var, path, append });
            }
            ExprKind::Index(base, key) => {
                path.push(*key);
                current = *base;
            }
            _ => return Err(VmError::compile(line, "cannot assign to this expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(source: &str) -> Expr {
        match parse(source).unwrap().remove(0) {
            Stmt::Expr(expr) => expr,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn precedence() {
        let expr = single_expr("1 + 2 * 3;");
        let ExprKind::Binary(BinOp::Add, _, rhs) = expr.kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));

        let expr = single_expr("$a || $b && $c;");
        let ExprKind::Or(_, rhs) = expr.kind else {
            panic!("expected || at the root");
        };
        assert!(matches!(rhs.kind, ExprKind::And(_, _)));

        let expr = single_expr("'a' .. 1 + 2;");
        assert!(matches!(expr.kind, ExprKind::Binary(BinOp::Add, _, _)));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = single_expr("$a = $b = 3;");
        let ExprKind::Assign { target, value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(target.var, "a");
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn places() {
        let expr = single_expr("$doc.tags[] = 'x';");
        let ExprKind::Assign { target, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(target.var, "doc");
        assert_eq!(target.path.len(), 1);
        assert!(target.append);

        assert!(parse("$a[] += 1;").is_err());
        assert!(parse("f() = 1;").is_err());
        assert!(parse("print $a[];").is_ok());
    }

    #[test]
    fn statements() {
        let stmts = parse(
            "function f($a, $b = 2) { return $a + $b; }
             if ($x) { print 1; } elseif ($y) print 2; else if ($z) print 3; else { print 4; }
             for ($i = 0; $i < 3; $i++) {}
             foreach ($list as $k => $v) { continue; }
             do { break; } while (false);
             ;;",
        )
        .unwrap();
        assert_eq!(stmts.len(), 5);
        let Stmt::If { branches, otherwise } = &stmts[1] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 3);
        assert!(otherwise.is_some());
    }

    #[test]
    fn literals() {
        let expr = single_expr("$o = {name: 'x', 'age': 3, tags: [1, 2,], 'k' : [0 => 'a']};");
        let ExprKind::Assign { value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Array(entries) = value.kind else {
            panic!("expected object literal");
        };
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|(key, _)| key.is_some()));
    }

    #[test]
    fn errors_report_lines() {
        let err = parse("$a = 1;\n$b = ;").unwrap_err();
        assert!(matches!(err, VmError::Compile { line: 2, .. }), "{err}");

        let err = parse("if ($a) {\n print 1;\n").unwrap_err();
        assert!(matches!(err, VmError::Compile { line: 3, .. }), "{err}");

        assert!(parse("else { }").is_err());
        assert!(parse("function f($a, $a) {}").is_err());
        assert!(parse("print;").is_err());
    }

    #[test]
    fn braces_at_statement_start_open_a_block() {
        let err = parse("{name: 'x'};").unwrap_err();
        assert!(matches!(err, VmError::Compile { line: 1, .. }), "{err}");
    }

    #[test]
    fn deep_nesting_is_a_compile_error() {
        let deep = format!("$x = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&deep).unwrap_err();
        assert!(err.message().contains("nesting exceeds"), "{err}");

        let chain = format!("$x = 1{};", " + 1".repeat(5_000));
        assert!(parse(&chain).is_err());
        let blocks = format!("{}{}", "{".repeat(5_000), "}".repeat(5_000));
        assert!(parse(&blocks).is_err());
        let assigns = format!("{}1;", "$a = ".repeat(5_000));
        assert!(parse(&assigns).is_err());
        let members = format!("$a{};", ".k".repeat(5_000));
        assert!(parse(&members).is_err());

        let nested = format!("$x = {}1{};", "(".repeat(60), ")".repeat(60));
        assert!(parse(&nested).is_ok());
        let sum = format!("$x = 1{};", " + 1".repeat(100));
        assert!(parse(&sum).is_ok());
    }
}

use crate::parser::ast::*;
use crate::parser::error::ErrorList;
use crate::parser::locations::{Locatable, Pos, Position, SourceFile};
use crate::parser::tokenizer::Token;
use crate::parser::{parse_expr, parse_file};
use crate::scope::{close_scope, open_scope, ObjId, ObjKind, Object, Objects, Scope, Value};
use log::{debug, info, trace};
use std::io::Write;
use thiserror::Error;

/// Name of the only built-in function.
const PRINT: &str = "print";

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0}: undefined: {1}")]
    Undefined(Position, String),
    #[error("{0}: integer division by zero")]
    DivisionByZero(Position),
    #[error("{0}: integer overflow")]
    Overflow(Position),
    #[error("{0}: assignment mismatch: {1} variable(s) but {2} value(s)")]
    AssignmentMismatch(Position, usize, usize),
    #[error("{0}: mismatched types: {1}")]
    TypeMismatch(Position, String),
    #[error("{0}: cannot assign to {1}")]
    NotAssignable(Position, String),
    #[error("{0}: cannot call {1}")]
    NotCallable(Position, String),
    #[error("{0}: {1} is not a value")]
    NotAValue(Position, String),
    #[error("{0}: invalid literal {1}")]
    BadLiteral(Position, String),
    #[error("{0}: return outside function")]
    ReturnOutsideFunction(Position),
    #[error("{0}: cannot run code that failed to parse")]
    BadNode(Position),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Everything that can go wrong running a source buffer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] ErrorList),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Parses and runs `src`, writing the output of `print` to `out`.
pub fn exec<W: Write>(name: &str, src: &str, out: W) -> std::result::Result<(), Error> {
    let file = parse_file(name, src)?;
    Interpreter::new(out).execute(&file)?;
    Ok(())
}

/// Evaluates a single integer expression. `;` starts a comment here.
pub fn exec_expr(name: &str, src: &str) -> std::result::Result<i64, Error> {
    let file = parse_expr(name, src)?;
    Ok(Interpreter::new(std::io::sink()).evaluate(&file)?)
}

/// Tree-walking evaluator. Bindings survive across calls to
/// [`Interpreter::execute`], so one interpreter can serve a whole REPL session.
pub struct Interpreter<W: Write> {
    objects: Objects,
    top_scope: Scope,
    out: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Self {
        Self {
            objects: Objects::default(),
            top_scope: Scope::default(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs the statements of `file` in order. Evaluation stops at the first
    /// runtime error.
    pub fn execute(&mut self, file: &File) -> Result<()> {
        info!("executing {} statement(s) of {:?}", file.stmts.len(), file.name);
        let result = self.exec_stmts(&file.source, &file.stmts);
        let flushed = self.out.flush();
        result?;
        Ok(flushed?)
    }

    /// Like [`Interpreter::execute`], but a trailing expression statement
    /// that is not a call is evaluated and its value returned.
    pub fn execute_interactive(&mut self, file: &File) -> Result<Option<Value>> {
        match file.stmts.split_last() {
            Some((Stmt::Expr(last), init)) if !matches!(last.x, Expr::Call(_)) => {
                self.exec_stmts(&file.source, init)?;
                let value = self.eval_value(&file.source, &last.x)?;
                Ok(Some(value))
            }
            _ => self.execute(file).map(|_| None),
        }
    }

    /// Legacy entry point: `file` holds exactly one expression, which must
    /// evaluate to an integer.
    pub fn evaluate(&mut self, file: &File) -> Result<i64> {
        let src = &file.source;
        match file.stmts.as_slice() {
            [Stmt::Expr(stmt)] => match self.eval_value(src, &stmt.x)? {
                Value::Int(n) => Ok(n),
                other => Err(RuntimeError::TypeMismatch(
                    at(src, stmt.x.pos()),
                    format!("expected int, found {}", other.type_name()),
                )),
            },
            _ => Err(RuntimeError::BadNode(at(src, file.pos()))),
        }
    }

    fn in_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        open_scope(&mut self.top_scope);
        trace!("entered scope at depth {}", self.top_scope.depth());
        let result = f(self);
        close_scope(&mut self.top_scope);
        result
    }

    fn exec_stmts(&mut self, src: &SourceFile, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.exec_stmt(src, stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, src: &SourceFile, stmt: &Stmt) -> Result<()> {
        trace!("{} {:?}", at(src, stmt.pos()), stmt);
        match stmt {
            Stmt::Var(s) => self.exec_var(src, s),
            Stmt::Assign(s) => self.exec_assign(src, s),
            Stmt::Expr(s) => self.exec_expr_stmt(src, s),
            Stmt::Block(b) => self.in_scope(|i| i.exec_stmts(src, &b.stmts)),
            Stmt::If(s) => self.in_scope(|i| i.exec_if(src, s)),
            Stmt::Func(s) => {
                let id = self
                    .objects
                    .push(Object::new(ObjKind::Fun, &s.name.name, s.name.pos));
                self.bind_local(&s.name.name, id);
                Ok(())
            }
            Stmt::Return(s) => Err(RuntimeError::ReturnOutsideFunction(at(src, s.return_pos))),
            Stmt::Empty(_) => Ok(()),
            Stmt::Bad(s) => Err(RuntimeError::BadNode(at(src, s.from))),
        }
    }

    fn exec_var(&mut self, src: &SourceFile, s: &VarStmt) -> Result<()> {
        let values = if s.values.is_empty() {
            vec![Value::Int(0); s.names.len()]
        } else if s.values.len() != s.names.len() {
            return Err(RuntimeError::AssignmentMismatch(
                at(src, s.var_pos),
                s.names.len(),
                s.values.len(),
            ));
        } else {
            self.eval_values(src, &s.values)?
        };
        for (name, value) in s.names.iter().zip(values) {
            if !name.is_blank() {
                self.define(name, value);
            }
        }
        Ok(())
    }

    fn exec_assign(&mut self, src: &SourceFile, s: &AssignStmt) -> Result<()> {
        if s.lhs.len() != s.rhs.len() {
            return Err(RuntimeError::AssignmentMismatch(
                at(src, s.tok_pos),
                s.lhs.len(),
                s.rhs.len(),
            ));
        }
        let values = self.eval_values(src, &s.rhs)?;
        for (target, value) in s.lhs.iter().zip(values) {
            let Expr::Ident(ident) = target else {
                return Err(RuntimeError::NotAssignable(
                    at(src, target.pos()),
                    "expression".to_string(),
                ));
            };
            if ident.is_blank() {
                continue;
            }
            let existing = match s.tok {
                Token::DEFINE => self.top_scope.lookup_local(&ident.name),
                _ => self.top_scope.lookup(&ident.name),
            };
            match existing {
                Some(id) => {
                    let obj = self.objects.get_mut(id);
                    if obj.kind != ObjKind::Var && s.tok == Token::ASSIGN {
                        return Err(RuntimeError::NotAssignable(
                            at(src, ident.pos),
                            ident.name.clone(),
                        ));
                    }
                    obj.kind = ObjKind::Var;
                    obj.data = Some(value);
                }
                None => self.define(ident, value),
            }
        }
        Ok(())
    }

    fn exec_expr_stmt(&mut self, src: &SourceFile, s: &ExprStmt) -> Result<()> {
        if let Expr::Call(call) = &s.x {
            if self.is_builtin_print(&call.fun) {
                for arg in &call.args {
                    let value = self.eval_value(src, arg)?;
                    writeln!(self.out, "{value}")?;
                }
                return Ok(());
            }
        }
        self.eval_expr(src, &s.x).map(|_| ())
    }

    fn exec_if(&mut self, src: &SourceFile, s: &IfStmt) -> Result<()> {
        if let Some(init) = &s.init {
            self.exec_stmt(src, init)?;
        }
        let taken = match self.eval_value(src, &s.cond)? {
            Value::Bool(b) => b,
            other => {
                return Err(RuntimeError::TypeMismatch(
                    at(src, s.cond.pos()),
                    format!("non-boolean condition in if statement ({})", other.type_name()),
                ))
            }
        };
        if taken {
            self.in_scope(|i| i.exec_stmts(src, &s.body.stmts))
        } else if let Some(else_) = &s.else_ {
            self.exec_stmt(src, else_)
        } else {
            Ok(())
        }
    }

    /// Binds `ident` in the innermost scope, reusing an existing binding of
    /// the same scope.
    fn define(&mut self, ident: &Ident, value: Value) {
        if let Some(id) = self.top_scope.lookup_local(&ident.name) {
            let obj = self.objects.get_mut(id);
            obj.kind = ObjKind::Var;
            obj.data = Some(value);
            return;
        }
        let mut obj = Object::new(ObjKind::Var, &ident.name, ident.pos);
        obj.data = Some(value);
        let id = self.objects.push(obj);
        self.bind_local(&ident.name, id);
    }

    /// Points `name` at `id` in the innermost scope, replacing whatever that
    /// scope bound before.
    fn bind_local(&mut self, name: &str, id: ObjId) {
        if let Some(existing) = self.top_scope.insert(name, id) {
            *self.objects.get_mut(existing) = self.objects.get(id).clone();
        }
    }

    fn is_builtin_print(&self, fun: &Expr) -> bool {
        fun.as_ident()
            .is_some_and(|ident| ident.name == PRINT && self.top_scope.lookup(PRINT).is_none())
    }

    fn eval_values(&mut self, src: &SourceFile, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|x| self.eval_value(src, x)).collect()
    }

    /// Evaluates `x` and looks through a [`Value::Ref`] to the object's payload.
    fn eval_value(&mut self, src: &SourceFile, x: &Expr) -> Result<Value> {
        match self.eval_expr(src, x)? {
            Value::Ref(id) => {
                let obj = self.objects.get(id);
                obj.data
                    .clone()
                    .ok_or_else(|| RuntimeError::NotAValue(at(src, x.pos()), obj.name.clone()))
            }
            value => Ok(value),
        }
    }

    fn eval_expr(&mut self, src: &SourceFile, x: &Expr) -> Result<Value> {
        match x {
            Expr::BasicLit(lit) => eval_literal(src, lit),
            Expr::Ident(ident) => self.eval_ident(src, ident),
            Expr::Unary(u) => {
                let pos = at(src, u.op_pos);
                match (u.op, self.eval_value(src, &u.x)?) {
                    (Token::ADD, Value::Int(n)) => Ok(Value::Int(n)),
                    (Token::SUB, Value::Int(n)) => {
                        n.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow(pos))
                    }
                    (op, other) => Err(RuntimeError::TypeMismatch(
                        pos,
                        format!("invalid operation: {op}{}", other.type_name()),
                    )),
                }
            }
            Expr::Binary(b) => self.eval_binary(src, b),
            Expr::Call(call) => {
                let pos = at(src, call.fun.pos());
                match call.fun.as_ident() {
                    Some(_) if self.is_builtin_print(&call.fun) => {
                        Err(RuntimeError::NotAValue(pos, format!("{PRINT}(...)")))
                    }
                    Some(ident) => match self.top_scope.lookup(&ident.name) {
                        Some(_) => Err(RuntimeError::NotCallable(pos, ident.name.clone())),
                        None => Err(RuntimeError::Undefined(pos, ident.name.clone())),
                    },
                    None => Err(RuntimeError::NotCallable(pos, "expression".to_string())),
                }
            }
            Expr::Bad(bad) => Err(RuntimeError::BadNode(at(src, bad.from))),
        }
    }

    fn eval_ident(&self, src: &SourceFile, ident: &Ident) -> Result<Value> {
        let pos = at(src, ident.pos);
        if ident.is_blank() {
            return Err(RuntimeError::NotAValue(pos, ident.name.clone()));
        }
        match self.top_scope.lookup(&ident.name) {
            Some(id) if self.objects.get(id).kind == ObjKind::Fun => {
                Err(RuntimeError::NotAValue(pos, ident.name.clone()))
            }
            Some(id) => Ok(Value::Ref(id)),
            None if ident.name == PRINT => Err(RuntimeError::NotAValue(pos, ident.name.clone())),
            None => Err(RuntimeError::Undefined(pos, ident.name.clone())),
        }
    }

    fn eval_binary(&mut self, src: &SourceFile, b: &BinaryExpr) -> Result<Value> {
        let pos = at(src, b.op_pos);
        let x = self.eval_value(src, &b.x)?;
        if let Token::LAND | Token::LOR = b.op {
            let lhs = expect_bool(pos.clone(), b.op, x)?;
            if (b.op == Token::LAND) != lhs {
                return Ok(Value::Bool(lhs));
            }
            let y = self.eval_value(src, &b.y)?;
            return expect_bool(pos, b.op, y).map(Value::Bool);
        }
        let y = self.eval_value(src, &b.y)?;
        match (x, y) {
            (Value::Int(x), Value::Int(y)) => int_op(pos, b.op, x, y),
            (x, y) if std::mem::discriminant(&x) == std::mem::discriminant(&y) => match b.op {
                Token::EQL => Ok(Value::Bool(x == y)),
                Token::NEQ => Ok(Value::Bool(x != y)),
                op => Err(invalid_operation(pos, op, &x, &y)),
            },
            (x, y) => Err(invalid_operation(pos, b.op, &x, &y)),
        }
    }
}

fn at(src: &SourceFile, pos: Pos) -> Position {
    src.position(pos)
}

fn invalid_operation(pos: Position, op: Token, x: &Value, y: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch(
        pos,
        format!("invalid operation: {} {op} {}", x.type_name(), y.type_name()),
    )
}

fn expect_bool(pos: Position, op: Token, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::TypeMismatch(
            pos,
            format!("operator {op} not defined on {}", other.type_name()),
        )),
    }
}

fn int_op(pos: Position, op: Token, x: i64, y: i64) -> Result<Value> {
    let checked = match op {
        Token::ADD => x.checked_add(y),
        Token::SUB => x.checked_sub(y),
        Token::MUL => x.checked_mul(y),
        Token::QUO | Token::REM if y == 0 => return Err(RuntimeError::DivisionByZero(pos)),
        Token::QUO => x.checked_div(y),
        Token::REM => x.checked_rem(y),
        Token::EQL => return Ok(Value::Bool(x == y)),
        Token::NEQ => return Ok(Value::Bool(x != y)),
        Token::LSS => return Ok(Value::Bool(x < y)),
        Token::LEQ => return Ok(Value::Bool(x <= y)),
        Token::GTR => return Ok(Value::Bool(x > y)),
        Token::GEQ => return Ok(Value::Bool(x >= y)),
        op => return Err(invalid_operation(pos, op, &Value::Int(x), &Value::Int(y))),
    };
    checked.map(Value::Int).ok_or(RuntimeError::Overflow(pos))
}

fn eval_literal(src: &SourceFile, lit: &BasicLit) -> Result<Value> {
    let bad = || RuntimeError::BadLiteral(at(src, lit.pos), lit.value.clone());
    match lit.kind {
        Token::INT => lit.value.parse().map(Value::Int).map_err(|_| bad()),
        Token::STRING => unquote(&lit.value).map(Value::Str).ok_or_else(bad),
        _ => {
            debug!("unsupported literal kind {}", lit.kind);
            Err(bad())
        }
    }
}

/// Strips the quotes off a string literal and resolves its escapes.
fn unquote(lit: &str) -> Option<String> {
    let inner = lit.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}

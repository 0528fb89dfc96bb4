// # GRAMMAR
// #
// # One token of lookahead. Binary expressions use precedence climbing over
// # the table in `Token::precedence`; everything else is plain recursive
// # descent. Each parsing function is preceded by the rule it implements.
// #
// # Separators between statements are optional: a statement ends where the
// # next token can no longer extend it.

use super::ast::*;
use super::error::{ErrorList, MAX_ERRORS};
use super::locations::{Locatable, Pos, Position, SourceFile, NO_POS};
use super::tokenizer::{Mode, Scanner, Token, LOWEST_PREC};
use crate::scope::{close_scope, open_scope, ObjId, ObjKind, Object, Objects, Scope};
use log::{debug, trace};

/// Deepest nesting of statements and expressions the parser accepts.
const MAX_NEST_LEV: usize = 500;

/// Raised once the diagnostic cap is reached, or the nesting limit is
/// exceeded; unwinds the whole parse.
#[derive(Debug)]
struct Bailout;

type PResult<T> = Result<T, Bailout>;

struct Parser {
    scanner: Scanner,
    errors: ErrorList,
    objects: Objects,
    top_scope: Scope,
    nest_lev: usize,

    // lookahead
    pos: Pos,
    tok: Token,
    lit: String,
}

/// Parses a whole source unit in statement mode.
pub fn parse_file(name: &str, src: &str) -> Result<File, ErrorList> {
    let mut parser = Parser::new(name, src, Mode::Statements);
    let stmts = parser.parse_top_level();
    parser.finish(stmts)
}

/// Parses a single expression in legacy mode, where `;` starts a comment.
/// The expression ends up as the only statement of the returned `File`.
pub fn parse_expr(name: &str, src: &str) -> Result<File, ErrorList> {
    let mut parser = Parser::new(name, src, Mode::Expression);
    let stmts = parser.parse_single_expr();
    parser.finish(stmts)
}

impl Parser {
    fn new(name: &str, src: &str, mode: Mode) -> Self {
        let mut parser = Self {
            scanner: Scanner::new(SourceFile::new(name, src), mode),
            errors: ErrorList::default(),
            objects: Objects::default(),
            top_scope: Scope::default(),
            nest_lev: 0,
            pos: NO_POS,
            tok: Token::EOF,
            lit: String::new(),
        };
        parser.next();
        parser
    }

    fn finish(self, result: PResult<Vec<Stmt>>) -> Result<File, ErrorList> {
        let name = self.scanner.file().name().to_string();
        match result {
            Ok(stmts) if self.errors.is_empty() => {
                debug!("parsed {} statement(s) from {:?}", stmts.len(), name);
                Ok(File {
                    name,
                    stmts,
                    source: self.scanner.into_file(),
                    objects: self.objects,
                })
            }
            result => {
                if result.is_err() {
                    debug!("giving up on {:?} after {} error(s)", name, self.errors.len());
                }
                Err(self.errors)
            }
        }
    }

    fn next(&mut self) {
        let (lit, tok, pos) = self.scanner.next_token();
        trace!("{pos:?} {tok} {lit:?}");
        self.lit = lit;
        self.tok = tok;
        self.pos = pos;
    }

    fn position(&self, pos: Pos) -> Position {
        self.scanner.file().position(pos)
    }

    fn add_error(&mut self, pos: Pos, msg: &str) -> PResult<()> {
        let position = self.position(pos);
        debug!("syntax error at {position}: {msg}");
        self.errors.add(position, msg);
        if self.errors.len() >= MAX_ERRORS {
            return Err(Bailout);
        }
        Ok(())
    }

    /// How the current token is named in diagnostics.
    fn found(&self) -> String {
        if self.tok.is_literal() || self.tok == Token::IDENT {
            self.lit.clone()
        } else if self.tok == Token::ILLEGAL {
            format!("'{}'", self.lit)
        } else {
            format!("'{}'", self.tok)
        }
    }

    fn inc_nest_lev(&mut self) -> PResult<()> {
        self.nest_lev += 1;
        if self.nest_lev > MAX_NEST_LEV {
            self.add_error(self.pos, "exceeded max nesting depth")?;
            return Err(Bailout);
        }
        Ok(())
    }

    fn dec_nest_lev(&mut self, levels: usize) {
        self.nest_lev -= levels;
    }

    fn unterminated_string(&self) -> bool {
        self.tok == Token::ILLEGAL && self.lit.starts_with('"')
    }

    fn error_expected(&mut self, pos: Pos, what: &str) -> PResult<()> {
        if pos != self.pos {
            return self.add_error(pos, &format!("expected {what}"));
        }
        if self.unterminated_string() {
            return self.add_error(pos, "string literal not terminated");
        }
        let msg = format!("expected {what}, found {}", self.found());
        self.add_error(pos, &msg)
    }

    /// Consumes the current token whatever it is, reporting an error when it
    /// is not `tok`.
    fn expect(&mut self, tok: Token) -> PResult<Pos> {
        let pos = self.pos;
        if self.tok != tok {
            self.error_expected(pos, &format!("'{tok}'"))?;
        }
        self.next();
        Ok(pos)
    }

    /// Consumes a separating comma. A missing comma in front of something
    /// that can continue the list is reported and treated as present.
    fn at_comma(&mut self, context: &str, follow: Token) -> PResult<bool> {
        if self.tok == Token::COMMA {
            self.next();
            return Ok(true);
        }
        if self.tok != follow && !self.at_stmt_end() {
            self.add_error(self.pos, &format!("missing ',' in {context}"))?;
            return Ok(true);
        }
        Ok(false)
    }

    fn at_stmt_end(&self) -> bool {
        matches!(self.tok, Token::EOF | Token::SEMICOLON | Token::RBRACE)
    }

    fn open_scope(&mut self) {
        open_scope(&mut self.top_scope);
    }

    fn close_scope(&mut self) {
        close_scope(&mut self.top_scope);
    }

    /// Declares every non-blank name in the innermost scope.
    fn declare(&mut self, kind: ObjKind, names: &mut [Ident]) -> PResult<()> {
        for ident in names.iter_mut().filter(|ident| !ident.is_blank()) {
            if let Some(existing) = self.top_scope.lookup_local(&ident.name) {
                ident.obj = Some(existing);
                let msg = format!("{} redeclared in this block", ident.name);
                self.add_error(ident.pos, &msg)?;
                continue;
            }
            let id = self.objects.push(Object::new(kind, &ident.name, ident.pos));
            self.top_scope.insert(&ident.name, id);
            ident.obj = Some(id);
        }
        Ok(())
    }

    fn resolve(&self, ident: &mut Ident) {
        if !ident.is_blank() {
            ident.obj = self.top_scope.lookup(&ident.name);
        }
    }

    // # STATEMENTS
    // # ==========

    // File = { Statement [ ";" ] } EOF
    fn parse_top_level(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![];
        while self.tok != Token::EOF {
            if self.tok == Token::RBRACE {
                self.error_expected(self.pos, "statement")?;
                self.next();
                continue;
            }
            stmts.push(self.parse_stmt()?);
            if self.tok == Token::SEMICOLON {
                self.next();
            }
        }
        Ok(stmts)
    }

    fn parse_single_expr(&mut self) -> PResult<Vec<Stmt>> {
        let x = self.parse_expr()?;
        if self.tok != Token::EOF {
            self.error_expected(self.pos, "'EOF'")?;
        }
        Ok(vec![Stmt::Expr(ExprStmt { x })])
    }

    // StatementList = { Statement [ ";" ] }
    fn parse_stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![];
        while self.tok != Token::RBRACE && self.tok != Token::EOF {
            stmts.push(self.parse_stmt()?);
            if self.tok == Token::SEMICOLON {
                self.next();
            }
        }
        Ok(stmts)
    }

    // Statement = VarStmt | FuncStmt | IfStmt | Block | ReturnStmt | ";" | SimpleStmt
    fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.inc_nest_lev()?;
        let stmt = match self.tok {
            Token::VAR => self.parse_var_stmt(),
            Token::FUNC => self.parse_func_stmt(),
            Token::IF => self.parse_if_stmt(),
            Token::LBRACE => Ok(Stmt::Block(self.parse_block_stmt()?)),
            Token::RETURN => self.parse_return_stmt(),
            Token::SEMICOLON => {
                let semicolon = self.pos;
                self.next();
                Ok(Stmt::Empty(EmptyStmt { semicolon }))
            }
            _ => self.parse_simple_stmt(),
        };
        self.dec_nest_lev(1);
        stmt
    }

    // SimpleStmt = ExprList [ ( "=" | ":=" ) ExprList ]
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let lhs = self.parse_expr_list()?;
        match self.tok {
            Token::ASSIGN | Token::DEFINE => {
                let (tok_pos, tok) = (self.pos, self.tok);
                self.next();
                let rhs = self.parse_expr_list()?;
                let mut stmt = AssignStmt {
                    lhs,
                    tok_pos,
                    tok,
                    rhs,
                };
                if tok == Token::DEFINE {
                    self.short_var_decl(&mut stmt)?;
                }
                Ok(Stmt::Assign(stmt))
            }
            _ => {
                if lhs.len() > 1 {
                    self.error_expected(lhs[0].pos(), "1 expression")?;
                }
                let x = match lhs.into_iter().next() {
                    Some(x) => x,
                    None => Expr::Bad(BadExpr {
                        from: self.pos,
                        to: self.pos,
                    }),
                };
                Ok(Stmt::Expr(ExprStmt { x }))
            }
        }
    }

    /// Declares the new names on the left of `:=`. The right-hand side has
    /// been parsed already, so it still sees the outer bindings.
    fn short_var_decl(&mut self, stmt: &mut AssignStmt) -> PResult<()> {
        let mut new_names = 0;
        for x in stmt.lhs.iter_mut() {
            let Expr::Ident(ident) = x else {
                self.error_expected(x.pos(), "identifier on left side of :=")?;
                continue;
            };
            if ident.is_blank() {
                ident.obj = None;
                continue;
            }
            let obj = match self.top_scope.lookup_local(&ident.name) {
                Some(existing) => existing,
                None => {
                    new_names += 1;
                    self.new_var(ident)
                }
            };
            ident.obj = Some(obj);
        }
        if new_names == 0 {
            self.add_error(stmt.tok_pos, "no new variables on left side of :=")?;
        }
        Ok(())
    }

    fn new_var(&mut self, ident: &Ident) -> ObjId {
        let id = self
            .objects
            .push(Object::new(ObjKind::Var, &ident.name, ident.pos));
        self.top_scope.insert(&ident.name, id);
        id
    }

    // VarStmt = "var" IdentList [ Type ] [ "=" ExprList ]
    fn parse_var_stmt(&mut self) -> PResult<Stmt> {
        let var_pos = self.expect(Token::VAR)?;
        let mut names = self.parse_ident_list()?;
        let typ = match self.tok {
            Token::IDENT => Some(self.parse_ident()?),
            _ => None,
        };
        let values = match self.tok {
            Token::ASSIGN => {
                self.next();
                self.parse_expr_list()?
            }
            _ => vec![],
        };
        self.declare(ObjKind::Var, &mut names)?;
        Ok(Stmt::Var(VarStmt {
            var_pos,
            names,
            typ,
            values,
        }))
    }

    // FuncStmt = "func" Ident Params [ Result ] Block
    fn parse_func_stmt(&mut self) -> PResult<Stmt> {
        let func_pos = self.expect(Token::FUNC)?;
        let name = self.parse_ident()?;
        let mut names = [name];
        self.declare(ObjKind::Fun, &mut names)?;
        let [name] = names;

        self.open_scope();
        let params = self.parse_parameters(true)?;
        let results = self.parse_result()?;
        let body = self.parse_body()?;
        self.close_scope();

        Ok(Stmt::Func(FuncStmt {
            func_pos,
            name,
            params,
            results,
            body,
        }))
    }

    // Params     = "(" [ ParamGroup { "," ParamGroup } [ "," ] ] ")"
    // ParamGroup = Ident [ Type ]
    fn parse_parameters(&mut self, declare: bool) -> PResult<FieldList> {
        let opening = self.expect(Token::LPAREN)?;
        let mut fields = vec![];
        let mut pending = vec![];
        while self.tok != Token::RPAREN && self.tok != Token::EOF {
            pending.push(self.parse_ident()?);
            if self.tok == Token::IDENT {
                let typ = self.parse_ident()?;
                fields.push(Field {
                    names: std::mem::take(&mut pending),
                    typ: Some(typ),
                });
            }
            if !self.at_comma("parameter list", Token::RPAREN)? {
                break;
            }
        }
        if !pending.is_empty() {
            fields.push(Field {
                names: pending,
                typ: None,
            });
        }
        let closing = self.expect(Token::RPAREN)?;
        if declare {
            for field in fields.iter_mut() {
                self.declare(ObjKind::Var, &mut field.names)?;
            }
        }
        Ok(FieldList {
            opening,
            fields,
            closing,
        })
    }

    // Result = Params | Type
    fn parse_result(&mut self) -> PResult<Option<FieldList>> {
        match self.tok {
            Token::LPAREN => Ok(Some(self.parse_parameters(false)?)),
            Token::IDENT => {
                let typ = self.parse_ident()?;
                Ok(Some(FieldList {
                    opening: NO_POS,
                    fields: vec![Field {
                        names: vec![],
                        typ: Some(typ),
                    }],
                    closing: NO_POS,
                }))
            }
            _ => Ok(None),
        }
    }

    // IfStmt = "if" [ SimpleStmt ";" ] Expression Block [ "else" ( IfStmt | Block ) ]
    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let if_pos = self.expect(Token::IF)?;
        self.open_scope();
        let (init, cond) = self.parse_if_header()?;
        let body = self.parse_block_stmt()?;
        let else_ = match self.tok {
            Token::ELSE => {
                self.next();
                match self.tok {
                    Token::IF => {
                        self.inc_nest_lev()?;
                        let else_if = self.parse_if_stmt()?;
                        self.dec_nest_lev(1);
                        Some(Box::new(else_if))
                    }
                    Token::LBRACE => Some(Box::new(Stmt::Block(self.parse_block_stmt()?))),
                    _ => {
                        let pos = self.pos;
                        self.error_expected(pos, "if statement or block")?;
                        Some(Box::new(Stmt::Bad(BadStmt { from: pos, to: pos })))
                    }
                }
            }
            _ => None,
        };
        self.close_scope();
        Ok(Stmt::If(IfStmt {
            if_pos,
            init,
            cond,
            body,
            else_,
        }))
    }

    fn parse_if_header(&mut self) -> PResult<(Option<Box<Stmt>>, Expr)> {
        if self.tok == Token::LBRACE {
            return Ok((None, self.missing_condition()?));
        }

        let mut init = None;
        if self.tok != Token::SEMICOLON {
            init = Some(self.parse_simple_stmt()?);
        }
        let cond_stmt = if self.tok == Token::SEMICOLON {
            self.next();
            if self.tok == Token::LBRACE {
                return Ok((init.map(Box::new), self.missing_condition()?));
            }
            Some(self.parse_simple_stmt()?)
        } else {
            init.take()
        };

        let cond = match cond_stmt {
            Some(Stmt::Expr(s)) => s.x,
            Some(s) => {
                self.add_error(s.pos(), "expected condition, found simple statement")?;
                Expr::Bad(BadExpr {
                    from: s.pos(),
                    to: s.end(),
                })
            }
            None => self.missing_condition()?,
        };
        Ok((init.map(Box::new), cond))
    }

    fn missing_condition(&mut self) -> PResult<Expr> {
        self.add_error(self.pos, "missing condition in if statement")?;
        Ok(Expr::Bad(BadExpr {
            from: self.pos,
            to: self.pos,
        }))
    }

    // Block = "{" StatementList "}"
    fn parse_block_stmt(&mut self) -> PResult<BlockStmt> {
        self.open_scope();
        let block = self.parse_body()?;
        self.close_scope();
        Ok(block)
    }

    /// A block that shares the scope its caller opened.
    fn parse_body(&mut self) -> PResult<BlockStmt> {
        let lbrace = self.expect(Token::LBRACE)?;
        let stmts = self.parse_stmt_list()?;
        let rbrace = self.expect(Token::RBRACE)?;
        Ok(BlockStmt {
            lbrace,
            stmts,
            rbrace,
        })
    }

    // ReturnStmt = "return" [ ExprList ]
    fn parse_return_stmt(&mut self) -> PResult<Stmt> {
        let return_pos = self.expect(Token::RETURN)?;
        let results = match self.at_stmt_end() {
            true => vec![],
            false => self.parse_expr_list()?,
        };
        Ok(Stmt::Return(ReturnStmt {
            return_pos,
            results,
        }))
    }

    // # EXPRESSIONS
    // # ===========

    // IdentList = Ident { "," Ident }
    fn parse_ident_list(&mut self) -> PResult<Vec<Ident>> {
        let mut idents = vec![self.parse_ident()?];
        while self.tok == Token::COMMA {
            self.next();
            idents.push(self.parse_ident()?);
        }
        Ok(idents)
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        let pos = self.pos;
        if self.tok == Token::IDENT {
            let ident = Ident::new(pos, &self.lit);
            self.next();
            return Ok(ident);
        }
        self.expect(Token::IDENT)?;
        Ok(Ident::new(pos, "_"))
    }

    // ExprList = Expression { "," Expression }
    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.tok == Token::COMMA {
            self.next();
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    // Expression = UnaryExpr { binary_op UnaryExpr }
    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_expr(LOWEST_PREC + 1)
    }

    /// Folds operators of precedence `prec1` and higher. The right operand is
    /// parsed one level tighter, so equal precedences associate to the left.
    /// Every operand folded into `x` deepens the tree by one level.
    fn parse_binary_expr(&mut self, prec1: u8) -> PResult<Expr> {
        self.inc_nest_lev()?;
        let mut levels = 1;
        let mut x = self.parse_unary_expr()?;
        loop {
            let oprec = self.tok.precedence();
            if oprec < prec1 {
                self.dec_nest_lev(levels);
                return Ok(x);
            }
            self.inc_nest_lev()?;
            levels += 1;
            let (op, op_pos) = (self.tok, self.pos);
            self.next();
            let y = match self.missing_operand(op, op_pos)? {
                Some(bad) => bad,
                None => self.parse_binary_expr(oprec + 1)?,
            };
            x = Expr::Binary(BinaryExpr {
                x: Box::new(x),
                op_pos,
                op,
                y: Box::new(y),
            });
        }
    }

    /// Reports an operator with nothing after it that could start an operand.
    fn missing_operand(&mut self, op: Token, op_pos: Pos) -> PResult<Option<Expr>> {
        let starts_operand = matches!(
            self.tok,
            Token::IDENT
                | Token::INT
                | Token::FLOAT
                | Token::CHAR
                | Token::STRING
                | Token::LPAREN
                | Token::ADD
                | Token::SUB
                | Token::ILLEGAL
        );
        if starts_operand {
            return Ok(None);
        }
        let msg = format!("expected operand after '{op}', found {}", self.found());
        self.add_error(op_pos, &msg)?;
        Ok(Some(Expr::Bad(BadExpr {
            from: op_pos,
            to: self.pos,
        })))
    }

    // UnaryExpr = ( "+" | "-" ) UnaryExpr | PrimaryExpr
    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        match self.tok {
            Token::ADD | Token::SUB => {
                let (op, op_pos) = (self.tok, self.pos);
                self.inc_nest_lev()?;
                self.next();
                let x = match self.missing_operand(op, op_pos)? {
                    Some(bad) => bad,
                    None => self.parse_unary_expr()?,
                };
                self.dec_nest_lev(1);
                Ok(Expr::Unary(UnaryExpr {
                    op_pos,
                    op,
                    x: Box::new(x),
                }))
            }
            _ => self.parse_primary_expr(),
        }
    }

    // PrimaryExpr = Literal | "(" Expression ")" | Ident [ "(" [ ExprList [ "," ] ] ")" ]
    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        match self.tok {
            Token::IDENT => {
                let mut ident = self.parse_ident()?;
                self.resolve(&mut ident);
                let fun = Expr::Ident(ident);
                match self.tok {
                    Token::LPAREN => self.parse_call(fun),
                    _ => Ok(fun),
                }
            }
            Token::INT | Token::FLOAT | Token::CHAR | Token::STRING => {
                let lit = BasicLit {
                    pos,
                    kind: self.tok,
                    value: std::mem::take(&mut self.lit),
                };
                self.next();
                Ok(Expr::BasicLit(lit))
            }
            Token::LPAREN => {
                self.next();
                let x = self.parse_expr()?;
                self.expect(Token::RPAREN)?;
                Ok(x)
            }
            _ => {
                self.error_expected(pos, "operand")?;
                if !self.at_stmt_end() {
                    self.next();
                }
                Ok(Expr::Bad(BadExpr {
                    from: pos,
                    to: self.pos,
                }))
            }
        }
    }

    // Call = Ident "(" [ ExprList [ "," ] ] ")"
    fn parse_call(&mut self, fun: Expr) -> PResult<Expr> {
        let lparen = self.expect(Token::LPAREN)?;
        let mut args = vec![];
        while self.tok != Token::RPAREN && self.tok != Token::EOF {
            args.push(self.parse_expr()?);
            if !self.at_comma("argument list", Token::RPAREN)? {
                break;
            }
        }
        let rparen = self.expect(Token::RPAREN)?;
        Ok(Expr::Call(CallExpr {
            fun: Box::new(fun),
            lparen,
            args,
            rparen,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeclaration_allocates_no_object() {
        let src = "var a\nvar a, b\nfunc a() {}";
        let mut parser = Parser::new("t.gs", src, Mode::Statements);
        assert!(parser.parse_top_level().is_ok());
        assert_eq!(parser.errors.len(), 2);
        assert_eq!(parser.objects.len(), 2);
    }

    #[test]
    fn test_nesting_level_unwinds() {
        let mut parser = Parser::new("t.gs", "x := -(1 + 2) * -3
{ { print(x) } }", Mode::Statements);
        assert!(parser.parse_top_level().is_ok());
        assert!(parser.errors.is_empty());
        assert_eq!(parser.nest_lev, 0);
    }
}

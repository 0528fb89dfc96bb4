use super::ast::*;

/// Offset of the first byte of a file, so that `Pos(0)` never names real text.
const BASE: usize = 1;

/// A compact source position: the byte offset into its file plus [`BASE`].
/// Positions of the same file compare in source order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub usize);

pub const NO_POS: Pos = Pos(0);

impl Pos {
    pub fn is_valid(self) -> bool {
        self != NO_POS
    }
}

impl std::ops::Add<usize> for Pos {
    type Output = Pos;

    fn add(self, rhs: usize) -> Pos {
        Pos(self.0 + rhs)
    }
}

/// Human readable form of a [`Pos`], used in diagnostics.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Position {
    pub filename: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.filename.is_empty(), self.is_valid()) {
            (true, true) => write!(f, "{}:{}", self.line, self.column),
            (false, true) => write!(f, "{}:{}:{}", self.filename, self.line, self.column),
            (true, false) => write!(f, "-"),
            (false, false) => write!(f, "{}", self.filename),
        }
    }
}

/// A single source buffer together with the offsets at which its lines start.
#[derive(Clone, Debug)]
pub struct SourceFile {
    name: String,
    src: String,
    lines: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: &str, src: &str) -> Self {
        let lines = if src.is_empty() { vec![] } else { vec![0] };
        Self {
            name: name.to_string(),
            src: src.to_string(),
            lines,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn size(&self) -> usize {
        self.src.len()
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    /// Records the start of a new line. The offset must lie past the last
    /// recorded line start and inside the buffer; anything else is rejected
    /// and `false` is returned.
    pub fn add_line(&mut self, offset: usize) -> bool {
        let ascending = self.lines.last().map_or(true, |&last| last < offset);
        if ascending && offset < self.size() {
            self.lines.push(offset);
            true
        } else {
            false
        }
    }

    /// `offset` may equal the size of the file, which is where EOF sits.
    pub fn pos(&self, offset: usize) -> Pos {
        Pos(BASE + offset.min(self.size()))
    }

    pub fn offset(&self, p: Pos) -> Option<usize> {
        if p.0 < BASE || p.0 > BASE + self.size() {
            return None;
        }
        Some(p.0 - BASE)
    }

    pub fn position(&self, p: Pos) -> Position {
        let Some(offset) = self.offset(p) else {
            return Position {
                filename: self.name.clone(),
                ..Position::default()
            };
        };
        let line = self.lines.partition_point(|&start| start <= offset);
        let column = match line {
            0 => offset + 1,
            _ => offset - self.lines[line - 1] + 1,
        };
        Position {
            filename: self.name.clone(),
            offset,
            line: line.max(1),
            column,
        }
    }
}

/// Half-open range `[start, end)` of source positions.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// Extends this span up to the end of `other`.
    pub fn till<R: Locatable>(&self, other: &R) -> Self {
        Self {
            start: self.start,
            end: other.end().max(self.end),
        }
    }
}

pub trait Locatable {
    fn pos(&self) -> Pos;
    fn end(&self) -> Pos;

    fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }
}

impl<R> Locatable for Box<R>
where
    R: Locatable,
{
    fn pos(&self) -> Pos {
        (**self).pos()
    }
    fn end(&self) -> Pos {
        (**self).end()
    }
}

impl Locatable for Span {
    fn pos(&self) -> Pos {
        self.start
    }
    fn end(&self) -> Pos {
        self.end
    }
}

impl Locatable for Expr {
    fn pos(&self) -> Pos {
        match self {
            Self::BasicLit(x) => x.pos,
            Self::Ident(x) => x.pos,
            Self::Unary(x) => x.op_pos,
            Self::Binary(x) => x.x.pos(),
            Self::Call(x) => x.fun.pos(),
            Self::Bad(x) => x.from,
        }
    }
    fn end(&self) -> Pos {
        match self {
            Self::BasicLit(x) => x.pos + x.value.len(),
            Self::Ident(x) => x.end(),
            Self::Unary(x) => x.x.end(),
            Self::Binary(x) => x.y.end(),
            Self::Call(x) => x.rparen + 1,
            Self::Bad(x) => x.to,
        }
    }
}

impl Locatable for Ident {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn end(&self) -> Pos {
        self.pos + self.name.len()
    }
}

impl Locatable for Stmt {
    fn pos(&self) -> Pos {
        match self {
            Self::Var(s) => s.var_pos,
            Self::Assign(s) => s.lhs.first().map_or(s.tok_pos, Locatable::pos),
            Self::Expr(s) => s.x.pos(),
            Self::Block(s) => s.pos(),
            Self::If(s) => s.if_pos,
            Self::Func(s) => s.func_pos,
            Self::Return(s) => s.return_pos,
            Self::Empty(s) => s.semicolon,
            Self::Bad(s) => s.from,
        }
    }
    fn end(&self) -> Pos {
        match self {
            Self::Var(s) => {
                if let Some(value) = s.values.last() {
                    value.end()
                } else if let Some(typ) = &s.typ {
                    typ.end()
                } else {
                    s.names.last().map_or(s.var_pos + 3, Locatable::end)
                }
            }
            Self::Assign(s) => s
                .rhs
                .last()
                .map_or(s.tok_pos + s.tok.as_str().len(), Locatable::end),
            Self::Expr(s) => s.x.end(),
            Self::Block(s) => s.end(),
            Self::If(s) => match &s.else_ {
                Some(else_) => else_.end(),
                None => s.body.end(),
            },
            Self::Func(s) => s.body.end(),
            Self::Return(s) => s.results.last().map_or(s.return_pos + 6, Locatable::end),
            Self::Empty(s) => s.semicolon + 1,
            Self::Bad(s) => s.to,
        }
    }
}

impl Locatable for BlockStmt {
    fn pos(&self) -> Pos {
        self.lbrace
    }
    fn end(&self) -> Pos {
        if self.rbrace.is_valid() {
            return self.rbrace + 1;
        }
        match self.stmts.last() {
            Some(stmt) => stmt.end(),
            None => self.lbrace + 1,
        }
    }
}

impl Locatable for FieldList {
    fn pos(&self) -> Pos {
        if self.opening.is_valid() {
            return self.opening;
        }
        self.fields.first().map_or(NO_POS, Locatable::pos)
    }
    fn end(&self) -> Pos {
        if self.closing.is_valid() {
            return self.closing + 1;
        }
        self.fields.last().map_or(NO_POS, Locatable::end)
    }
}

impl Locatable for Field {
    fn pos(&self) -> Pos {
        match (self.names.first(), &self.typ) {
            (Some(name), _) => name.pos,
            (None, Some(typ)) => typ.pos,
            (None, None) => NO_POS,
        }
    }
    fn end(&self) -> Pos {
        match (&self.typ, self.names.last()) {
            (Some(typ), _) => typ.end(),
            (None, Some(name)) => name.end(),
            (None, None) => NO_POS,
        }
    }
}

impl Locatable for File {
    fn pos(&self) -> Pos {
        self.stmts.first().map_or(NO_POS, Locatable::pos)
    }
    fn end(&self) -> Pos {
        self.stmts.last().map_or(NO_POS, Locatable::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_starts_reject_out_of_order() {
        let mut file = SourceFile::new("test.gs", "a\nbc\nd");
        assert!(file.add_line(2));
        assert!(!file.add_line(2));
        assert!(!file.add_line(1));
        assert!(file.add_line(5));
        assert!(!file.add_line(6));
        assert_eq!(file.lines(), &[0, 2, 5]);
    }

    #[test]
    fn test_position_lookup() {
        let mut file = SourceFile::new("test.gs", "a\nbc\nd");
        file.add_line(2);
        file.add_line(5);
        assert_eq!(file.position(file.pos(0)).to_string(), "test.gs:1:1");
        assert_eq!(file.position(file.pos(3)).to_string(), "test.gs:2:2");
        assert_eq!(file.position(file.pos(5)).to_string(), "test.gs:3:1");
        assert_eq!(file.position(file.pos(6)).to_string(), "test.gs:3:2");
    }

    #[test]
    fn test_position_without_filename() {
        let file = SourceFile::new("", "42");
        assert_eq!(file.position(Pos(2)).to_string(), "1:2");
        assert_eq!(file.position(NO_POS).to_string(), "-");
    }

    #[test]
    fn test_pos_offset_roundtrip() {
        let file = SourceFile::new("", "abc");
        assert_eq!(file.pos(0), Pos(1));
        assert_eq!(file.offset(Pos(4)), Some(3));
        assert_eq!(file.offset(Pos(5)), None);
        assert_eq!(file.offset(NO_POS), None);
    }

    #[test]
    fn test_empty_file_position() {
        let file = SourceFile::new("empty.gs", "");
        assert!(file.lines().is_empty());
        assert_eq!(file.position(file.pos(0)).to_string(), "empty.gs:1:1");
    }
}

use super::locations::{Pos, SourceFile};
use const_format::concatcp;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Token {
    #[default]
    EOF,
    ILLEGAL,
    COMMENT,

    // literals
    INT,
    FLOAT,
    CHAR,
    STRING,

    // identifiers and operators
    IDENT,
    ADD,
    SUB,
    MUL,
    QUO,
    REM,
    LAND,
    LOR,
    LPAREN,
    RPAREN,
    LBRACK,
    RBRACK,
    LBRACE,
    RBRACE,
    COMMA,
    SEMICOLON,
    EQL,
    LSS,
    GTR,
    NOT,
    NEQ,
    LEQ,
    GEQ,
    ASSIGN,
    DEFINE,

    // keywords
    IF,
    ELSE,
    FOR,
    FUNC,
    RETURN,
    VAR,
}

const KEYWORDS: [Token; 6] = [
    Token::IF,
    Token::ELSE,
    Token::FOR,
    Token::FUNC,
    Token::RETURN,
    Token::VAR,
];

/// Precedence of anything that is not a binary operator.
pub const LOWEST_PREC: u8 = 0;

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EOF => "EOF",
            Self::ILLEGAL => "ILLEGAL",
            Self::COMMENT => "COMMENT",
            Self::INT => "INT",
            Self::FLOAT => "FLOAT",
            Self::CHAR => "CHAR",
            Self::STRING => "STRING",
            Self::IDENT => "IDENT",
            Self::ADD => "+",
            Self::SUB => "-",
            Self::MUL => "*",
            Self::QUO => "/",
            Self::REM => "%",
            Self::LAND => "&&",
            Self::LOR => "||",
            Self::LPAREN => "(",
            Self::RPAREN => ")",
            Self::LBRACK => "[",
            Self::RBRACK => "]",
            Self::LBRACE => "{",
            Self::RBRACE => "}",
            Self::COMMA => ",",
            Self::SEMICOLON => ";",
            Self::EQL => "==",
            Self::LSS => "<",
            Self::GTR => ">",
            Self::NOT => "!",
            Self::NEQ => "!=",
            Self::LEQ => "<=",
            Self::GEQ => ">=",
            Self::ASSIGN => "=",
            Self::DEFINE => ":=",
            Self::IF => "if",
            Self::ELSE => "else",
            Self::FOR => "for",
            Self::FUNC => "func",
            Self::RETURN => "return",
            Self::VAR => "var",
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::INT | Self::FLOAT | Self::CHAR | Self::STRING)
    }

    pub fn is_operator(&self) -> bool {
        !self.is_literal()
            && !self.is_keyword()
            && !matches!(self, Self::EOF | Self::ILLEGAL | Self::COMMENT)
    }

    pub fn is_keyword(&self) -> bool {
        KEYWORDS.contains(self)
    }

    /// Binary operator precedence; [`LOWEST_PREC`] for every other token.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::LOR => 1,
            Self::LAND => 2,
            Self::EQL | Self::NEQ | Self::LSS | Self::LEQ | Self::GTR | Self::GEQ => 3,
            Self::ADD | Self::SUB => 4,
            Self::MUL | Self::QUO | Self::REM => 5,
            _ => LOWEST_PREC,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static KEYWORD_TABLE: Lazy<HashMap<&'static str, Token>> =
    Lazy::new(|| KEYWORDS.iter().map(|tok| (tok.as_str(), *tok)).collect());

/// Maps an identifier to its keyword token, or [`Token::IDENT`].
pub fn lookup(ident: &str) -> Token {
    KEYWORD_TABLE.get(ident).copied().unwrap_or(Token::IDENT)
}

const S_DIGITS: &str = r"[0-9]+";
const S_NAME: &str = r"[A-Za-z_][A-Za-z0-9_]*";

static DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(concatcp!("^", S_DIGITS)).expect("Error compiling regex."));
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(concatcp!("^", S_NAME)).expect("Error compiling regex."));

/// Selects between the two historical readings of `;`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Mode {
    /// `;` separates statements.
    #[default]
    Statements,
    /// Single-expression mode: `;` starts a comment running to the end of the line.
    Expression,
}

#[derive(Clone, Copy, Default, Debug)]
struct Cursor {
    ch: Option<char>,
    offset: usize,
    rd_offset: usize,
}

pub struct Scanner {
    file: SourceFile,
    mode: Mode,
    cursor: Cursor,
}

impl Scanner {
    pub fn new(file: SourceFile, mode: Mode) -> Self {
        let mut scanner = Self {
            file,
            mode,
            cursor: Cursor::default(),
        };
        scanner.advance();
        scanner
    }

    pub fn file(&self) -> &SourceFile {
        &self.file
    }

    pub fn into_file(self) -> SourceFile {
        self.file
    }

    /// Returns the next `(lexeme, token, position)` triple. Once the buffer is
    /// exhausted every call yields [`Token::EOF`].
    pub fn next_token(&mut self) -> (String, Token, Pos) {
        loop {
            self.skip_whitespace();

            let offset = self.cursor.offset;
            let pos = self.file.pos(offset);
            let Some(ch) = self.cursor.ch else {
                return (String::new(), Token::EOF, pos);
            };
            if ch.is_ascii_digit() {
                return self.find_by_regex(&DIGITS, Token::INT);
            }
            if ch.is_ascii_alphabetic() || ch == '_' {
                let (lit, _, pos) = self.find_by_regex(&NAME, Token::IDENT);
                let tok = lookup(&lit);
                return (lit, tok, pos);
            }

            self.advance();
            let tok = match ch {
                '"' => return self.scan_string(offset),
                '(' => Token::LPAREN,
                ')' => Token::RPAREN,
                '[' => Token::LBRACK,
                ']' => Token::RBRACK,
                '{' => Token::LBRACE,
                '}' => Token::RBRACE,
                ',' => Token::COMMA,
                '+' => Token::ADD,
                '-' => Token::SUB,
                '*' => Token::MUL,
                '/' => Token::QUO,
                '%' => Token::REM,
                ':' => self.switch2(Token::ILLEGAL, '=', Token::DEFINE),
                '=' => self.switch2(Token::ASSIGN, '=', Token::EQL),
                '<' => self.switch2(Token::LSS, '=', Token::LEQ),
                '>' => self.switch2(Token::GTR, '=', Token::GEQ),
                '!' => self.switch2(Token::NOT, '=', Token::NEQ),
                '&' => self.switch2(Token::ILLEGAL, '&', Token::LAND),
                '|' => self.switch2(Token::ILLEGAL, '|', Token::LOR),
                ';' => match self.mode {
                    Mode::Expression => {
                        self.skip_comment();
                        continue;
                    }
                    Mode::Statements => Token::SEMICOLON,
                },
                _ => Token::ILLEGAL,
            };
            return (self.lexeme(offset), tok, pos);
        }
    }

    /// Reads the character at `rd_offset`. A newline left behind opens a new
    /// line in the source file.
    fn advance(&mut self) {
        if self.cursor.rd_offset < self.file.size() {
            self.cursor.offset = self.cursor.rd_offset;
            if self.cursor.ch == Some('\n') {
                let added = self.file.add_line(self.cursor.offset);
                debug_assert!(added, "line start out of order");
            }
            let ch = self.file.src()[self.cursor.rd_offset..].chars().next();
            self.cursor.rd_offset += ch.map_or(1, char::len_utf8);
            self.cursor.ch = ch;
        } else {
            self.cursor.offset = self.file.size();
            self.cursor.ch = None;
        }
    }

    fn lexeme(&self, start: usize) -> String {
        self.file.src()[start..self.cursor.offset].to_string()
    }

    fn switch2(&mut self, tok0: Token, ch1: char, tok1: Token) -> Token {
        if self.cursor.ch == Some(ch1) {
            self.advance();
            return tok1;
        }
        tok0
    }

    fn find_by_regex(&mut self, regex: &Regex, token: Token) -> (String, Token, Pos) {
        let start = self.cursor.offset;
        let len = regex
            .find(&self.file.src()[start..])
            .map_or(0, |m| m.end());
        while self.cursor.ch.is_some() && self.cursor.offset < start + len {
            self.advance();
        }
        (self.lexeme(start), token, self.file.pos(start))
    }

    /// The opening quote has been consumed already.
    fn scan_string(&mut self, start: usize) -> (String, Token, Pos) {
        let pos = self.file.pos(start);
        loop {
            match self.cursor.ch {
                None => return (self.lexeme(start), Token::ILLEGAL, pos),
                Some('"') => {
                    self.advance();
                    return (self.lexeme(start), Token::STRING, pos);
                }
                Some('\\') => {
                    self.advance();
                    if self.cursor.ch.is_some() {
                        self.advance();
                    }
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn skip_comment(&mut self) {
        while !matches!(self.cursor.ch, Some('\n') | None) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.cursor.ch, Some(' ' | '\t' | '\n' | '\r')) {
            self.advance();
        }
    }
}

impl Iterator for Scanner {
    type Item = (String, Token, Pos);

    /// Like [`Scanner::next_token`], but stops at EOF.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            (_, Token::EOF, _) => None,
            item => Some(item),
        }
    }
}

pub fn tokenize_string(name: &str, src: &str, mode: Mode) -> Vec<(String, Token, Pos)> {
    Scanner::new(SourceFile::new(name, src), mode).collect()
}

/// Whether a chunk of interactive input can be handed to the parser yet.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParserState {
    Ok,
    ContinuationNeeded,
}

pub fn input_state(src: &str) -> ParserState {
    let mut depth = 0isize;
    for (lit, tok, _) in Scanner::new(SourceFile::new("", src), Mode::Statements) {
        match tok {
            Token::LPAREN | Token::LBRACE | Token::LBRACK => depth += 1,
            Token::RPAREN | Token::RBRACE | Token::RBRACK => depth -= 1,
            Token::ILLEGAL if lit.starts_with('"') => return ParserState::ContinuationNeeded,
            _ => {}
        }
    }
    if depth > 0 {
        ParserState::ContinuationNeeded
    } else {
        ParserState::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize_string("", src, Mode::Statements)
            .into_iter()
            .map(|(_, tok, _)| tok)
            .collect()
    }

    fn triples(src: &str) -> Vec<(String, Token, usize)> {
        tokenize_string("", src, Mode::Statements)
            .into_iter()
            .map(|(lit, tok, pos)| (lit, tok, pos.0))
            .collect()
    }

    fn triple(lit: &str, tok: Token, pos: usize) -> (String, Token, usize) {
        (lit.to_string(), tok, pos)
    }

    #[test]
    fn test_number() {
        assert_eq!(tokens("-9"), vec![Token::SUB, Token::INT]);
        assert_eq!(triples("12345")[0], triple("12345", Token::INT, 1));
    }

    #[test]
    fn test_identifiers_and_positions() {
        assert_eq!(
            triples("abc+b+1"),
            vec![
                triple("abc", Token::IDENT, 1),
                triple("+", Token::ADD, 4),
                triple("b", Token::IDENT, 5),
                triple("+", Token::ADD, 6),
                triple("1", Token::INT, 7),
            ]
        );
    }

    #[test]
    fn test_statements() {
        let src = "var a = 1\ncefA := a+2\nif(a > cefA) {\n\tprint(\"yes\")\n}\n";
        assert_eq!(
            triples(src),
            vec![
                triple("var", Token::VAR, 1),
                triple("a", Token::IDENT, 5),
                triple("=", Token::ASSIGN, 7),
                triple("1", Token::INT, 9),
                triple("cefA", Token::IDENT, 11),
                triple(":=", Token::DEFINE, 16),
                triple("a", Token::IDENT, 19),
                triple("+", Token::ADD, 20),
                triple("2", Token::INT, 21),
                triple("if", Token::IF, 23),
                triple("(", Token::LPAREN, 25),
                triple("a", Token::IDENT, 26),
                triple(">", Token::GTR, 28),
                triple("cefA", Token::IDENT, 30),
                triple(")", Token::RPAREN, 34),
                triple("{", Token::LBRACE, 36),
                triple("print", Token::IDENT, 39),
                triple("(", Token::LPAREN, 44),
                triple("\"yes\"", Token::STRING, 45),
                triple(")", Token::RPAREN, 50),
                triple("}", Token::RBRACE, 52),
            ]
        );
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut scanner = Scanner::new(SourceFile::new("", "1"), Mode::Statements);
        assert_eq!(scanner.next_token().1, Token::INT);
        assert_eq!(scanner.next_token(), (String::new(), Token::EOF, Pos(2)));
        assert_eq!(scanner.next_token(), (String::new(), Token::EOF, Pos(2)));
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            tokens(":= == <= >= != && || = < > !"),
            vec![
                Token::DEFINE,
                Token::EQL,
                Token::LEQ,
                Token::GEQ,
                Token::NEQ,
                Token::LAND,
                Token::LOR,
                Token::ASSIGN,
                Token::LSS,
                Token::GTR,
                Token::NOT,
            ]
        );
    }

    #[test]
    fn test_incomplete_pairs_keep_lookahead() {
        assert_eq!(
            triples("<1 :a &b"),
            vec![
                triple("<", Token::LSS, 1),
                triple("1", Token::INT, 2),
                triple(":", Token::ILLEGAL, 4),
                triple("a", Token::IDENT, 5),
                triple("&", Token::ILLEGAL, 7),
                triple("b", Token::IDENT, 8),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("if else for func return var iff _x"),
            vec![
                Token::IF,
                Token::ELSE,
                Token::FOR,
                Token::FUNC,
                Token::RETURN,
                Token::VAR,
                Token::IDENT,
                Token::IDENT,
            ]
        );
        assert_eq!(lookup("var"), Token::VAR);
        assert_eq!(lookup("print"), Token::IDENT);
    }

    #[test]
    fn test_illegal_characters() {
        assert_eq!(
            tokens("()+-*/% 1 12\t 12345 @ \\ \r #"),
            vec![
                Token::LPAREN,
                Token::RPAREN,
                Token::ADD,
                Token::SUB,
                Token::MUL,
                Token::QUO,
                Token::REM,
                Token::INT,
                Token::INT,
                Token::INT,
                Token::ILLEGAL,
                Token::ILLEGAL,
                Token::ILLEGAL,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            triples(r#"print("a \"b\"")"#),
            vec![
                triple("print", Token::IDENT, 1),
                triple("(", Token::LPAREN, 6),
                triple(r#""a \"b\"""#, Token::STRING, 7),
                triple(")", Token::RPAREN, 16),
            ]
        );
        assert_eq!(triples("\"open"), vec![triple("\"open", Token::ILLEGAL, 1)]);
    }

    #[test]
    fn test_semicolon_modes() {
        assert_eq!(tokens("a; b"), vec![Token::IDENT, Token::SEMICOLON, Token::IDENT]);
        let src = ";comment 1\n 5 * 3; comment 2";
        let legacy: Vec<Token> = tokenize_string("", src, Mode::Expression)
            .into_iter()
            .map(|(_, tok, _)| tok)
            .collect();
        assert_eq!(legacy, vec![Token::INT, Token::MUL, Token::INT]);
    }

    #[test]
    fn test_newlines_register_lines() {
        let mut scanner = Scanner::new(SourceFile::new("t.gs", "a\n\nb\n"), Mode::Statements);
        while scanner.next_token().1 != Token::EOF {}
        assert_eq!(scanner.file().lines(), &[0, 2, 3]);
        let b = scanner.file().pos(3);
        assert_eq!(scanner.file().position(b).to_string(), "t.gs:3:1");
    }

    #[test]
    fn test_input_state() {
        assert_eq!(input_state("if a {"), ParserState::ContinuationNeeded);
        assert_eq!(input_state("print(1,"), ParserState::ContinuationNeeded);
        assert_eq!(input_state("print(\"abc"), ParserState::ContinuationNeeded);
        assert_eq!(input_state("if a { print(1) }"), ParserState::Ok);
        assert_eq!(input_state("}"), ParserState::Ok);
    }

    #[test]
    fn test_token_partitions() {
        assert!(Token::INT.is_literal());
        assert!(!Token::IDENT.is_literal());
        assert!(!Token::ADD.is_literal());
        assert!(Token::DEFINE.is_operator());
        assert!(Token::VAR.is_keyword());
        assert!(!Token::EOF.is_operator());
        assert!(Token::MUL.precedence() > Token::ADD.precedence());
        assert!(Token::ADD.precedence() > Token::LSS.precedence());
        assert!(Token::LSS.precedence() > Token::LAND.precedence());
        assert!(Token::LAND.precedence() > Token::LOR.precedence());
        assert_eq!(Token::ASSIGN.precedence(), LOWEST_PREC);
    }
}

//! Tokenizer
//!
//! Whitespace is mostly insignificant, but two things depend on it: newlines
//! end statements, and every token records whether whitespace preceded it so
//! the parser can tell `f(x)` from `f (x)` and `1:n` from `c ? a : b`.

use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Function,
    End,
    If,
    Elseif,
    Else,
    For,
    While,
    Return,
    Break,
    Continue,
    Struct,
    Mutable,
    Begin,
    Global,
    Local,
    Const,
    True,
    False,
}

/// Piece of a string literal
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(String),
    /// Source of a `$name` or `$(expr)` interpolation
    Code {
        source: String,
        line: usize,
        column: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    /// Hex or binary literal: value and width in bits
    Unsigned(u64, u32),
    Float(f64),
    Float32(f32),
    Str(Vec<StrPart>),
    Symbol(String),
    Ident(String),
    Keyword(Keyword),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    /// Whitespace (or a comment) directly precedes the token
    pub spaced: bool,
}

impl Token {
    /// Tokens after which `:name` is a range, not a symbol
    fn ends_operand(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Integer(_)
                | TokenKind::Unsigned(..)
                | TokenKind::Float(_)
                | TokenKind::Float32(_)
                | TokenKind::Str(_)
                | TokenKind::Symbol(_)
                | TokenKind::Ident(_)
                | TokenKind::Keyword(Keyword::End | Keyword::True | Keyword::False)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }
}

/// Longest spellings first; the second entry is the canonical operator
const OPERATORS: &[(&str, &str)] = &[
    ("===", "==="),
    ("!==", "!=="),
    (">>>", ">>>"),
    ("...", "..."),
    ("==", "=="),
    ("!=", "!="),
    ("<=", "<="),
    (">=", ">="),
    ("<:", "<:"),
    ("<<", "<<"),
    (">>", ">>"),
    ("&&", "&&"),
    ("||", "||"),
    ("=>", "=>"),
    ("->", "->"),
    ("::", "::"),
    ("+=", "+="),
    ("-=", "-="),
    ("*=", "*="),
    ("/=", "/="),
    ("^=", "^="),
    ("%=", "%="),
    ("|=", "|="),
    ("&=", "&="),
    ("÷=", "÷="),
    ("⊻=", "⊻="),
    ("≤", "<="),
    ("≥", ">="),
    ("≠", "!="),
    ("≡", "==="),
    ("+", "+"),
    ("-", "-"),
    ("*", "*"),
    ("/", "/"),
    ("^", "^"),
    ("%", "%"),
    ("&", "&"),
    ("|", "|"),
    ("~", "~"),
    ("!", "!"),
    ("<", "<"),
    (">", ">"),
    ("=", "="),
    ("?", "?"),
    (":", ":"),
    (".", "."),
    ("÷", "÷"),
    ("⊻", "⊻"),
    ("∈", "∈"),
    ("∉", "∉"),
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source, 1, 1).lex_all()
}

/// Tokenize an interpolated fragment at its position in the enclosing source
pub(crate) fn tokenize_at(
    source: &str,
    line: usize,
    column: usize,
) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source, line, column).lex_all()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, line: usize, column: usize) -> Self {
        Self {
            source,
            pos: 0,
            line,
            column,
            tokens: Vec::new(),
        }
    }

    fn lex_all(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            let spaced = self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(ch) = self.peek() else { break };

            let kind = match ch {
                '\n' => {
                    self.bump();
                    if matches!(
                        self.tokens.last().map(|t| &t.kind),
                        None | Some(TokenKind::Newline)
                    ) {
                        continue;
                    }
                    TokenKind::Newline
                }
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '"' => self.lex_string()?,
                '0'..='9' => self.lex_number()?,
                '.' if self.leading_dot_number() => self.lex_number()?,
                ':' if self.symbol_follows(spaced) => self.lex_symbol(),
                c if is_ident_start(c) => self.lex_ident_or_keyword(),
                '\'' => return Err(self.error("character literals are not supported")),
                '@' => return Err(self.error("macros are not supported")),
                _ => self.lex_operator()?,
            };
            self.tokens.push(Token {
                kind,
                line,
                column,
                spaced,
            });
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
            spaced: true,
        });
        Ok(self.tokens)
    }

    /// Skip spaces and comments; report whether anything was skipped
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.bump();
                }
                Some('#') if self.starts_with("#=") => self.skip_block_comment()?,
                Some('#') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        Ok(self.pos > start || self.tokens.is_empty())
    }

    /// `#= ... =#`, nestable
    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let err = self.error("unterminated block comment");
        let mut depth = 0usize;
        loop {
            if self.starts_with("#=") {
                self.advance(2);
                depth += 1;
            } else if self.starts_with("=#") {
                self.advance(2);
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if self.bump().is_none() {
                return Err(err);
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    /// `.5` unless the dot follows an operand
    fn leading_dot_number(&self) -> bool {
        self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) && !self.after_operand()
    }

    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(Token::ends_operand)
    }

    /// `:name` is a symbol unless it continues an operand like `1:n`
    fn symbol_follows(&self, spaced: bool) -> bool {
        !self.starts_with("::")
            && self.peek_nth(1).is_some_and(is_ident_start)
            && (spaced || !self.after_operand())
    }

    fn lex_symbol(&mut self) -> TokenKind {
        self.bump(); // :
        TokenKind::Symbol(self.take_ident())
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let name = self.take_ident();
        match keyword(&name) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(name),
        }
    }

    fn take_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let bang = c == '!' && self.peek_nth(1) != Some('=');
            if is_ident_continue(c) || bang {
                self.bump();
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn lex_operator(&mut self) -> Result<TokenKind, ParseError> {
        let rest = &self.source[self.pos..];
        let Some((spelling, op)) = OPERATORS.iter().find(|(s, _)| rest.starts_with(s)) else {
            let ch = self.peek().unwrap_or('\0');
            return Err(self.error(&format!("unexpected character `{ch}`")));
        };
        for _ in spelling.chars() {
            self.bump();
        }
        Ok(TokenKind::Op(op))
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        if self.starts_with("0x") || self.starts_with("0b") {
            return self.lex_unsigned();
        }
        let start = self.pos;
        self.take_digits();
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_nth(1) != Some('.') {
            let next = self.peek_nth(1);
            if next.is_some_and(|c| c.is_ascii_digit()) || !next.is_some_and(is_ident_start) {
                is_float = true;
                self.bump();
                self.take_digits();
            }
        }
        let mut single = false;
        if matches!(self.peek(), Some('e' | 'E' | 'f')) && self.exponent_follows() {
            single = self.peek() == Some('f');
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            self.take_digits();
        }

        let text: String = self.source[start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if single {
            let value: f64 = text
                .replace('f', "e")
                .parse()
                .map_err(|_| self.error("malformed Float32 literal"))?;
            return Ok(TokenKind::Float32(value as f32));
        }
        if is_float {
            let value: f64 = text.parse().map_err(|_| self.error("malformed float literal"))?;
            return Ok(TokenKind::Float(value));
        }
        text.parse::<i64>()
            .map(TokenKind::Integer)
            .map_err(|_| self.error(&format!("integer literal {text} does not fit in Int64")))
    }

    /// `0xff` is a `UInt8`; the digit count picks the width
    fn lex_unsigned(&mut self) -> Result<TokenKind, ParseError> {
        let radix = if self.starts_with("0x") { 16 } else { 2 };
        self.advance(2);
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_digit(radix) || c == '_') {
            self.bump();
        }
        let digits: String = self.source[start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        let bits_per_digit = if radix == 16 { 4 } else { 1 };
        let width = match digits.len() as u32 * bits_per_digit {
            0 => return Err(self.error("numeric literal has no digits")),
            1..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            33..=64 => 64,
            _ => return Err(self.error("unsigned literal wider than 64 bits")),
        };
        let value = u64::from_str_radix(&digits, radix)
            .map_err(|_| self.error("malformed unsigned literal"))?;
        Ok(TokenKind::Unsigned(value, width))
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_nth(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn take_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, ParseError> {
        let unterminated = self.error("unterminated string literal");
        let triple = self.starts_with("\"\"\"");
        self.advance(if triple { 3 } else { 1 });
        if triple && self.peek() == Some('\n') {
            self.bump();
        }

        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            if triple && self.starts_with("\"\"\"") {
                self.advance(3);
                break;
            }
            let Some(ch) = self.bump() else {
                return Err(unterminated);
            };
            match ch {
                '"' if !triple => break,
                '\\' => text.push(self.lex_escape()?),
                '$' => {
                    if !text.is_empty() {
                        parts.push(StrPart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(self.lex_interpolation()?);
                }
                _ => text.push(ch),
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(StrPart::Text(text));
        }
        Ok(TokenKind::Str(parts))
    }

    fn lex_escape(&mut self) -> Result<char, ParseError> {
        let err = self.error("invalid escape sequence");
        let Some(ch) = self.bump() else { return Err(err) };
        Ok(match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'e' => '\u{1b}',
            '\\' => '\\',
            '"' => '"',
            '$' => '$',
            '\'' => '\'',
            'u' | 'U' => {
                let braced = self.peek() == Some('{');
                if braced {
                    self.bump();
                }
                let max = if ch == 'u' && !braced { 4 } else { 8 };
                let start = self.pos;
                while self.pos - start < max && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    self.bump();
                }
                let digits = &self.source[start..self.pos];
                if braced && self.bump() != Some('}') {
                    return Err(err);
                }
                u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(err)?
            }
            _ => return Err(err),
        })
    }

    /// After `$`: either an identifier or a parenthesized expression
    fn lex_interpolation(&mut self) -> Result<StrPart, ParseError> {
        let (line, column) = (self.line, self.column);
        if self.peek().is_some_and(is_ident_start) {
            let source = self.take_ident();
            return Ok(StrPart::Code { source, line, column });
        }
        if self.peek() != Some('(') {
            return Err(self.error("`$` in a string must be followed by a name or `(`"));
        }
        let unbalanced = self.error("unbalanced `$(` interpolation");
        self.bump();
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut depth = 1usize;
        let mut in_string = false;
        loop {
            let Some(ch) = self.bump() else {
                return Err(unbalanced);
            };
            match ch {
                '\\' if in_string => {
                    self.bump();
                }
                '"' => in_string = !in_string,
                '(' if !in_string => depth += 1,
                ')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        let source = self.source[start..self.pos - 1].to_string();
        Ok(StrPart::Code { source, line, column })
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::new(self.line, self.column, message)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn starts_with(&self, needle: &str) -> bool {
        self.source[self.pos..].starts_with(needle)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword(text: &str) -> Option<Keyword> {
    Some(match text {
        "function" => Keyword::Function,
        "end" => Keyword::End,
        "if" => Keyword::If,
        "elseif" => Keyword::Elseif,
        "else" => Keyword::Else,
        "for" => Keyword::For,
        "while" => Keyword::While,
        "return" => Keyword::Return,
        "break" => Keyword::Break,
        "continue" => Keyword::Continue,
        "struct" => Keyword::Struct,
        "mutable" => Keyword::Mutable,
        "begin" => Keyword::Begin,
        "global" => Keyword::Global,
        "local" => Keyword::Local,
        "const" => Keyword::Const,
        "true" => Keyword::True,
        "false" => Keyword::False,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(
            kinds("1_000 0xff 1.5f0 2e3 .5"),
            vec![
                TokenKind::Integer(1000),
                TokenKind::Unsigned(255, 8),
                TokenKind::Float32(1.5),
                TokenKind::Float(2000.0),
                TokenKind::Float(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_juxtaposed_identifier_is_not_an_exponent() {
        assert_eq!(
            kinds("2x 1im"),
            vec![
                TokenKind::Integer(2),
                TokenKind::Ident("x".into()),
                TokenKind::Integer(1),
                TokenKind::Ident("im".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_symbol_versus_range() {
        assert_eq!(
            kinds("1:n :sym"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Op(":"),
                TokenKind::Ident("n".into()),
                TokenKind::Symbol("sym".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bang_identifiers() {
        assert_eq!(
            kinds("push!(a) a!=b"),
            vec![
                TokenKind::Ident("push!".into()),
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::RParen,
                TokenKind::Ident("a".into()),
                TokenKind::Op("!="),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_interpolation_parts() {
        let tokens = kinds("\"a $x b $(y + 1)\"");
        let TokenKind::Str(parts) = &tokens[0] else {
            panic!("expected a string token");
        };
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], StrPart::Text("a ".into()));
        assert!(matches!(&parts[1], StrPart::Code { source, .. } if source == "x"));
        assert!(matches!(&parts[3], StrPart::Code { source, .. } if source == "y + 1"));
    }

    #[test]
    fn test_comments_and_newlines_collapse() {
        assert_eq!(
            kinds("a # note\n\n#= block #= nested =# =#\nb"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Newline,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unicode_operators_normalize() {
        assert_eq!(
            kinds("a ≤ b ≠ c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Op("<="),
                TokenKind::Ident("b".into()),
                TokenKind::Op("!="),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = tokenize("x = 1\ny = \"open").unwrap_err();
        assert_eq!((err.line, err.column), (2, 5));
    }
}

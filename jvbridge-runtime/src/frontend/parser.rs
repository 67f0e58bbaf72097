//! Recursive-descent parser
//!
//! Precedence, loosest first: assignment, `->`, `=>`, `?:`, `||`, `&&`,
//! comparisons (chained), `:`, `+ - | ⊻`, `* / % & ÷` and numeric
//! juxtaposition, `<< >> >>>`, unary `- + ! ~`, `^`, then postfix calls,
//! indexing, field access, `{}` and `::`.

use std::rc::Rc;

use super::ast::{Expr, ParamDef};
use super::lexer::{tokenize_at, Keyword, StrPart, Token, TokenKind};
use super::ParseError;
use crate::objects::Value;

type PResult<T> = Result<T, ParseError>;

/// Deepest nesting of brackets, blocks and prefix operators
pub const MAX_PARSE_DEPTH: usize = 256;

/// Remaining stack below which nested parsing moves to a fresh segment
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

const COMPARISONS: &[&str] = &["==", "!=", "===", "!==", "<", "<=", ">", ">=", "<:", "∈", "∉"];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open `(`, `[` or `{`; newlines inside are insignificant
    nesting: usize,
    /// Open index brackets; `end` and a bare `:` refer to them
    indexing: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
            indexing: 0,
            depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> PResult<Vec<Expr>> {
        let program = self.parse_statements(&[])?;
        match self.peek().kind {
            TokenKind::Eof => Ok(program),
            _ => Err(self.unexpected()),
        }
    }

    /// A single expression filling all input, as inside `$(...)`
    fn parse_standalone(&mut self) -> PResult<Expr> {
        let expr = self.parse_expr()?;
        match self.peek().kind {
            TokenKind::Eof => Ok(expr),
            _ => Err(self.unexpected()),
        }
    }

    // ========================================================================
    // Statements and blocks
    // ========================================================================

    fn parse_statements(&mut self, terminators: &[Keyword]) -> PResult<Vec<Expr>> {
        let saved = (self.nesting, self.indexing);
        self.nesting = 0;
        self.indexing = 0;
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Keyword(kw) if terminators.contains(&kw) => break,
                _ => {}
            }
            body.push(self.parse_statement()?);
            match self.peek().kind {
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => {}
                TokenKind::Keyword(kw) if terminators.contains(&kw) => {}
                _ => return Err(self.unexpected()),
            }
        }
        (self.nesting, self.indexing) = saved;
        Ok(body)
    }

    /// Statements up to a closing keyword, which is consumed
    fn parse_block(&mut self, terminators: &[Keyword]) -> PResult<Vec<Expr>> {
        let body = self.parse_statements(terminators)?;
        match self.peek().kind {
            TokenKind::Keyword(kw) if terminators.contains(&kw) => Ok(body),
            _ => Err(self.error_here("expected `end`")),
        }
    }

    fn parse_statement(&mut self) -> PResult<Expr> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Struct) => {
                self.advance();
                self.parse_struct(false)
            }
            TokenKind::Keyword(Keyword::Mutable) => {
                self.advance();
                self.expect_keyword(Keyword::Struct)?;
                self.parse_struct(true)
            }
            TokenKind::Keyword(Keyword::Global) => {
                self.advance();
                self.parse_declaration(Expr::Global)
            }
            TokenKind::Keyword(Keyword::Local) => {
                self.advance();
                self.parse_declaration(Expr::Local)
            }
            TokenKind::Keyword(Keyword::Const) => {
                let token = self.advance();
                match self.parse_statement_expr()? {
                    assign @ Expr::Assign { .. } => Ok(Expr::Const(Box::new(assign))),
                    _ => Err(error_at(&token, "expected assignment after `const`")),
                }
            }
            _ => self.parse_statement_expr(),
        }
    }

    /// `global x`, `global x, y` and `global x = v`
    fn parse_declaration(&mut self, make: fn(Vec<String>) -> Expr) -> PResult<Expr> {
        let token = self.peek().clone();
        let expr = self.parse_statement_expr()?;
        let target = match &expr {
            Expr::Assign { target, .. } => target.as_ref(),
            other => other,
        };
        let names = match target {
            Expr::Ident(name) => vec![name.clone()],
            Expr::Tuple(items) => items
                .iter()
                .map(|item| match item {
                    Expr::Ident(name) => Ok(name.clone()),
                    _ => Err(error_at(&token, "expected a variable name")),
                })
                .collect::<PResult<Vec<_>>>()?,
            _ => return Err(error_at(&token, "expected a variable name")),
        };
        Ok(match expr {
            assign @ Expr::Assign { .. } => Expr::Block(vec![make(names), assign]),
            _ => make(names),
        })
    }

    fn parse_struct(&mut self, mutable: bool) -> PResult<Expr> {
        let name = self.expect_ident()?;
        let mut fields = Vec::new();
        loop {
            self.skip_separators();
            if self.eat_keyword(Keyword::End) {
                break;
            }
            let token = self.peek().clone();
            let field = self.parse_expr()?;
            fields.push(param_def(field, &token)?);
        }
        Ok(Expr::StructDef {
            name,
            mutable,
            fields,
        })
    }

    // ========================================================================
    // Assignment level
    // ========================================================================

    /// Expression statement; bare tuples like `a, b = b, a` are allowed
    fn parse_statement_expr(&mut self) -> PResult<Expr> {
        let first = self.parse_arrow()?;
        let lhs = if self.nesting == 0 && self.at(&TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat(&TokenKind::Comma) {
                items.push(self.parse_arrow()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };
        self.finish_assignment(lhs, true)
    }

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_arrow()?;
        self.finish_assignment(lhs, false)
    }

    fn finish_assignment(&mut self, lhs: Expr, bare_tuples: bool) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Op(op) if is_assignment(op) => op,
            _ => return Ok(lhs),
        };
        let token = self.advance();
        self.skip_newlines();
        let rhs = if bare_tuples {
            self.parse_statement_expr()?
        } else {
            self.parse_expr()?
        };
        if op == "=" {
            return assignment(lhs, rhs, &token);
        }
        if !matches!(lhs, Expr::Ident(_) | Expr::Index { .. } | Expr::Field { .. }) {
            return Err(error_at(&token, "invalid target for updating assignment"));
        }
        let binary = &op[..op.len() - 1];
        Ok(Expr::Assign {
            target: Box::new(lhs.clone()),
            value: Box::new(Expr::call(binary, vec![lhs, rhs])),
        })
    }

    fn parse_arrow(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_pair()?;
        if !self.at_op("->") {
            return Ok(lhs);
        }
        let token = self.advance();
        self.skip_newlines();
        let params = match lhs {
            Expr::Tuple(ref mut items) => std::mem::take(items)
                .into_iter()
                .map(|item| param_def(item, &token))
                .collect::<PResult<Vec<_>>>()?,
            single => vec![param_def(single, &token)?],
        };
        let body = self.parse_expr()?;
        Ok(Expr::Lambda {
            params,
            body: Rc::new(vec![body]),
        })
    }

    fn parse_pair(&mut self) -> PResult<Expr> {
        let lhs = self.parse_ternary()?;
        if self.at_op("=>") {
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_pair()?;
            return Ok(Expr::call("=>", vec![lhs, rhs]));
        }
        Ok(lhs)
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let cond = self.parse_or()?;
        if !self.at_op("?") {
            return Ok(cond);
        }
        self.advance();
        self.skip_newlines();
        let then = self.parse_ternary()?;
        self.skip_newlines();
        self.expect_op(":")?;
        self.skip_newlines();
        let otherwise = self.parse_ternary()?;
        Ok(Expr::If {
            branches: vec![(cond, vec![then])],
            otherwise: Some(vec![otherwise]),
        })
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_op("||") {
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.at_op("&&") {
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut operands = vec![self.parse_range()?];
        let mut ops = Vec::new();
        loop {
            let op = match &self.peek().kind {
                TokenKind::Op(op) if COMPARISONS.contains(op) => op.to_string(),
                TokenKind::Ident(name) if name == "in" || name == "isa" => name.clone(),
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            operands.push(self.parse_range()?);
            ops.push(op);
        }
        Ok(match ops.len() {
            0 => operands.remove(0),
            1 => Expr::call(&ops[0], operands),
            _ => Expr::Comparison { operands, ops },
        })
    }

    /// `a:b` and `a:s:b`; the colon must hug its left operand
    fn parse_range(&mut self) -> PResult<Expr> {
        let start = self.parse_sum()?;
        if !self.at_range_colon() {
            return Ok(start);
        }
        self.advance();
        let second = self.parse_sum()?;
        if self.at_range_colon() {
            self.advance();
            let stop = self.parse_sum()?;
            return Ok(Expr::call(":", vec![start, second, stop]));
        }
        Ok(Expr::call(":", vec![start, second]))
    }

    fn parse_sum(&mut self) -> PResult<Expr> {
        self.parse_left_assoc(&["+", "-", "|", "⊻"], Self::parse_term)
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        self.parse_left_assoc(&["*", "/", "%", "&", "÷"], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        self.parse_left_assoc(&["<<", ">>", ">>>"], Self::parse_unary)
    }

    fn parse_left_assoc(
        &mut self,
        ops: &[&str],
        operand: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut lhs = operand(self)?;
        let mut chained = None;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(op) if ops.contains(&op) => op,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            let rhs = operand(self)?;
            // `a + b + c` is a single call `+(a, b, c)`, likewise for `*`
            if chained == Some(op) {
                if let Expr::Call { args, .. } = &mut lhs {
                    args.push(rhs);
                    continue;
                }
            }
            chained = matches!(op, "+" | "*").then_some(op);
            lhs = Expr::call(op, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// Every nested construct passes through here once per level
    fn parse_unary(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_prefixed)
    }

    fn nested(&mut self, parse: fn(&mut Self) -> PResult<Expr>) -> PResult<Expr> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(self.error_here(&format!(
                "expression nested deeper than {MAX_PARSE_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || parse(self));
        self.depth -= 1;
        result
    }

    fn parse_prefixed(&mut self) -> PResult<Expr> {
        if let TokenKind::Op(op @ ("-" | "+" | "!" | "~")) = self.peek().kind {
            if self.at_operator_call() {
                return self.parse_power();
            }
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::call(op, vec![operand]));
        }
        let base = self.parse_power()?;
        // `2x`, `3(a + b)` and `1im`
        let next = self.peek();
        let juxtaposed = !next.spaced
            && matches!(next.kind, TokenKind::Ident(_) | TokenKind::LParen);
        if base.is_number_literal() && juxtaposed {
            let rhs = self.parse_power()?;
            return Ok(Expr::call("*", vec![base, rhs]));
        }
        Ok(base)
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if self.at_op("^") {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::call("^", vec![base, exponent]));
        }
        Ok(base)
    }

    // ========================================================================
    // Postfix and primary
    // ========================================================================

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        if expr.is_number_literal() {
            return Ok(expr);
        }
        loop {
            let next = self.peek();
            let spaced = next.spaced;
            match next.kind {
                TokenKind::LParen if !spaced => {
                    self.advance();
                    let (args, kwargs) = self.parse_call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                TokenKind::LBracket if !spaced => {
                    self.advance();
                    self.indexing += 1;
                    let indices = self.parse_list(TokenKind::RBracket)?;
                    self.indexing -= 1;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        indices,
                    };
                }
                TokenKind::LBrace if !spaced => {
                    self.advance();
                    let params = self.parse_list(TokenKind::RBrace)?;
                    expr = Expr::Curly {
                        target: Box::new(expr),
                        params,
                    };
                }
                TokenKind::Op(".") => {
                    let token = self.advance();
                    match self.advance().kind {
                        TokenKind::Ident(name) => {
                            expr = Expr::Field {
                                target: Box::new(expr),
                                name,
                            }
                        }
                        TokenKind::LParen => {
                            return Err(error_at(&token, "broadcasting is not supported"))
                        }
                        _ => return Err(error_at(&token, "expected a field name after `.`")),
                    }
                }
                TokenKind::Op("::") => {
                    self.advance();
                    let ty = self.parse_postfix()?;
                    expr = Expr::TypeAssert {
                        value: Box::new(expr),
                        ty: Box::new(ty),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// After `(`: positional arguments, then keywords after `;` or as `k = v`
    fn parse_call_args(&mut self) -> PResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        self.nesting += 1;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        let mut keywords_only = false;
        loop {
            if self.eat(&TokenKind::RParen) {
                break;
            }
            if self.eat(&TokenKind::Semicolon) {
                keywords_only = true;
                continue;
            }
            let keyword = match (&self.peek().kind, &self.peek_second().kind) {
                (TokenKind::Ident(name), TokenKind::Op("=")) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                kwargs.push((name, self.parse_expr()?));
            } else if keywords_only {
                return Err(self.error_here("expected a keyword argument"));
            } else {
                let arg = self.parse_expr()?;
                if self.at_op("...") {
                    self.advance();
                    args.push(Expr::Splat(Box::new(arg)));
                } else {
                    args.push(arg);
                }
            }
            if self.eat(&TokenKind::Comma) || self.at(&TokenKind::Semicolon) {
                continue;
            }
            self.expect(&TokenKind::RParen, "`)`")?;
            break;
        }
        self.nesting -= 1;
        Ok((args, kwargs))
    }

    /// Comma-separated expressions up to and including `close`
    fn parse_list(&mut self, close: TokenKind) -> PResult<Vec<Expr>> {
        self.nesting += 1;
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&close, "closing bracket")?;
                break;
            }
        }
        self.nesting -= 1;
        Ok(items)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.advance();
        let literal = |v: Value| -> PResult<Expr> { Ok(Expr::Literal(v)) };
        match token.kind {
            TokenKind::Integer(v) => literal(Value::Int64(v)),
            TokenKind::Unsigned(v, bits) => literal(match bits {
                8 => Value::UInt8(v as u8),
                16 => Value::UInt16(v as u16),
                32 => Value::UInt32(v as u32),
                _ => Value::UInt64(v),
            }),
            TokenKind::Float(x) => literal(Value::Float64(x)),
            TokenKind::Float32(x) => literal(Value::Float32(x)),
            TokenKind::Str(parts) => string_literal(parts),
            TokenKind::Symbol(name) => literal(Value::symbol(&name)),
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            TokenKind::Keyword(Keyword::True) => literal(Value::Bool(true)),
            TokenKind::Keyword(Keyword::False) => literal(Value::Bool(false)),
            TokenKind::Keyword(Keyword::End) if self.indexing > 0 => Ok(Expr::End),
            TokenKind::Keyword(Keyword::Function) => self.parse_function(&token),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::While) => {
                let cond = self.parse_expr()?;
                let body = self.parse_block(&[Keyword::End])?;
                self.advance();
                Ok(Expr::While {
                    cond: Box::new(cond),
                    body,
                })
            }
            TokenKind::Keyword(Keyword::Begin) => {
                let body = self.parse_block(&[Keyword::End])?;
                self.advance();
                Ok(Expr::Block(body))
            }
            TokenKind::Keyword(Keyword::Return) => {
                if self.at_statement_end() {
                    Ok(Expr::Return(None))
                } else {
                    Ok(Expr::Return(Some(Box::new(self.parse_expr()?))))
                }
            }
            TokenKind::Keyword(Keyword::Break) => Ok(Expr::Break),
            TokenKind::Keyword(Keyword::Continue) => Ok(Expr::Continue),
            TokenKind::Op(":")
                if self.indexing > 0
                    && matches!(self.peek().kind, TokenKind::Comma | TokenKind::RBracket) =>
            {
                Ok(Expr::Colon)
            }
            // `+(1, 2)` calls the operator by name
            TokenKind::Op(op) if self.at(&TokenKind::LParen) && !self.peek().spaced => {
                Ok(Expr::Ident(op.to_string()))
            }
            TokenKind::LParen => self.parse_paren(),
            TokenKind::LBracket => self.parse_vector(&token),
            _ => Err(unexpected(&token)),
        }
    }

    /// `()`, `(x)`, `(x,)` and `(a, b)`
    fn parse_paren(&mut self) -> PResult<Expr> {
        self.nesting += 1;
        if self.eat(&TokenKind::RParen) {
            self.nesting -= 1;
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.parse_expr()?;
        if self.eat(&TokenKind::RParen) {
            self.nesting -= 1;
            return Ok(first);
        }
        self.expect(&TokenKind::Comma, "`,` or `)`")?;
        let mut items = vec![first];
        while !self.eat(&TokenKind::RParen) {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen, "`)`")?;
                break;
            }
        }
        self.nesting -= 1;
        Ok(Expr::Tuple(items))
    }

    /// `[a, b]` and `[f(x) for x in xs if p(x)]`
    fn parse_vector(&mut self, open: &Token) -> PResult<Expr> {
        self.nesting += 1;
        if self.eat(&TokenKind::RBracket) {
            self.nesting -= 1;
            return Ok(Expr::Vector(Vec::new()));
        }
        let first = self.parse_expr()?;
        if self.eat_keyword(Keyword::For) {
            let var = self.parse_loop_target()?;
            self.expect_in()?;
            let iter = self.parse_expr()?;
            let filter = if self.eat_keyword(Keyword::If) {
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect(&TokenKind::RBracket, "`]`")?;
            self.nesting -= 1;
            return Ok(Expr::Comprehension {
                body: Box::new(first),
                var: Box::new(var),
                iter: Box::new(iter),
                filter,
            });
        }
        let mut items = vec![first];
        loop {
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            if !self.eat(&TokenKind::Comma) {
                return Err(error_at(open, "matrix literals are not supported"));
            }
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.nesting -= 1;
        Ok(Expr::Vector(items))
    }

    fn parse_function(&mut self, keyword: &Token) -> PResult<Expr> {
        let name = match self.peek().kind {
            TokenKind::LParen => None,
            _ => Some(self.expect_ident()?),
        };
        self.expect(&TokenKind::LParen, "`(`")?;
        let (args, kwargs) = self.parse_call_args()?;
        if !kwargs.is_empty() {
            return Err(error_at(keyword, "keyword parameters are not supported"));
        }
        let params = args
            .into_iter()
            .map(|arg| param_def(arg, keyword))
            .collect::<PResult<Vec<_>>>()?;
        let body = Rc::new(self.parse_block(&[Keyword::End])?);
        self.advance();
        Ok(match name {
            Some(name) => Expr::FunctionDef { name, params, body },
            None => Expr::Lambda { params, body },
        })
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        loop {
            let cond = self.parse_expr()?;
            let body = self.parse_block(&[Keyword::Elseif, Keyword::Else, Keyword::End])?;
            branches.push((cond, body));
            match self.advance().kind {
                TokenKind::Keyword(Keyword::Elseif) => continue,
                TokenKind::Keyword(Keyword::Else) => {
                    otherwise = Some(self.parse_block(&[Keyword::End])?);
                    self.advance();
                }
                _ => {}
            }
            break;
        }
        Ok(Expr::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> PResult<Expr> {
        let var = self.parse_loop_target()?;
        self.expect_in()?;
        let iter = self.parse_expr()?;
        let body = self.parse_block(&[Keyword::End])?;
        self.advance();
        Ok(Expr::For {
            var: Box::new(var),
            iter: Box::new(iter),
            body,
        })
    }

    /// `x` or `(k, v)`
    fn parse_loop_target(&mut self) -> PResult<Expr> {
        if self.eat(&TokenKind::LParen) {
            self.nesting += 1;
            let mut names = Vec::new();
            loop {
                names.push(Expr::Ident(self.expect_ident()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "`)`")?;
            self.nesting -= 1;
            return Ok(Expr::Tuple(names));
        }
        Ok(Expr::Ident(self.expect_ident()?))
    }

    fn expect_in(&mut self) -> PResult<()> {
        match &self.peek().kind {
            TokenKind::Ident(word) if word == "in" => {}
            TokenKind::Op("=" | "∈") => {}
            _ => return Err(self.error_here("expected `in`")),
        }
        self.advance();
        Ok(())
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    /// Position of the next significant token at or after `i`
    fn significant(&self, mut i: usize) -> usize {
        if self.nesting > 0 {
            while matches!(self.tokens[i].kind, TokenKind::Newline) {
                i += 1;
            }
        }
        i
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.significant(self.pos)]
    }

    fn peek_second(&self) -> &Token {
        let first = self.significant(self.pos);
        let next = (first + 1).min(self.tokens.len() - 1);
        &self.tokens[self.significant(next)]
    }

    /// Operator directly followed by `(`
    fn at_operator_call(&self) -> bool {
        let next = self.peek_second();
        matches!(self.peek().kind, TokenKind::Op(_))
            && matches!(next.kind, TokenKind::LParen)
            && !next.spaced
    }

    fn advance(&mut self) -> Token {
        let i = self.significant(self.pos);
        let token = self.tokens[i].clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos = i + 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Op(o) if o == op)
    }

    fn at_range_colon(&self) -> bool {
        let next = self.peek();
        matches!(next.kind, TokenKind::Op(":")) && !next.spaced
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Keyword(Keyword::End | Keyword::Else | Keyword::Elseif)
        )
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(kw))
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.eat(kind) {
            return Ok(());
        }
        Err(self.error_here(&format!("expected {what}")))
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.at_op(op) {
            self.advance();
            return Ok(());
        }
        Err(self.error_here(&format!("expected `{op}`")))
    }

    fn expect_keyword(&mut self, kw: Keyword) -> PResult<()> {
        if self.eat_keyword(kw) {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here("expected a name")),
        }
    }

    /// Newlines after a binary operator continue the expression
    fn skip_newlines(&mut self) {
        while matches!(self.tokens[self.pos].kind, TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.tokens[self.pos].kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> ParseError {
        unexpected(self.peek())
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => error_at(token, &format!("{message}, found end of input")),
            _ => error_at(token, message),
        }
    }
}

fn is_assignment(op: &str) -> bool {
    matches!(
        op,
        "=" | "+=" | "-=" | "*=" | "/=" | "^=" | "%=" | "|=" | "&=" | "÷=" | "⊻="
    )
}

/// `f(x) = body` defines a method; anything else must be assignable
fn assignment(mut lhs: Expr, rhs: Expr, token: &Token) -> PResult<Expr> {
    if matches!(
        lhs,
        Expr::Ident(_) | Expr::Index { .. } | Expr::Field { .. } | Expr::Tuple(_)
    ) {
        return Ok(Expr::Assign {
            target: Box::new(lhs),
            value: Box::new(rhs),
        });
    }
    let Expr::Call {
        callee,
        args,
        kwargs,
    } = &mut lhs
    else {
        return Err(error_at(token, "invalid assignment target"));
    };
    if !kwargs.is_empty() {
        return Err(error_at(token, "invalid assignment target"));
    }
    let Expr::Ident(name) = callee.as_mut() else {
        return Err(error_at(token, "invalid function name"));
    };
    let name = std::mem::take(name);
    let params = std::mem::take(args)
        .into_iter()
        .map(|arg| param_def(arg, token))
        .collect::<PResult<Vec<_>>>()?;
    Ok(Expr::FunctionDef {
        name,
        params,
        body: Rc::new(vec![rhs]),
    })
}

fn param_def(mut expr: Expr, token: &Token) -> PResult<ParamDef> {
    match &mut expr {
        Expr::Ident(name) => Ok(ParamDef {
            name: std::mem::take(name),
            ty: None,
        }),
        Expr::TypeAssert { value, ty } => match value.as_mut() {
            Expr::Ident(name) => Ok(ParamDef {
                name: std::mem::take(name),
                ty: Some(Expr::take(ty)),
            }),
            _ => Err(error_at(token, "expected a parameter name")),
        },
        _ => Err(error_at(token, "expected a parameter name")),
    }
}

fn string_literal(parts: Vec<StrPart>) -> PResult<Expr> {
    if let [StrPart::Text(text)] = parts.as_slice() {
        return Ok(Expr::Literal(Value::str(text)));
    }
    let pieces = parts
        .into_iter()
        .map(|part| match part {
            StrPart::Text(text) => Ok(Expr::Literal(Value::str(&text))),
            StrPart::Code {
                source,
                line,
                column,
            } => Parser::new(tokenize_at(&source, line, column)?).parse_standalone(),
        })
        .collect::<PResult<Vec<_>>>()?;
    Ok(Expr::Interpolate(pieces))
}

fn error_at(token: &Token, message: &str) -> ParseError {
    ParseError::new(token.line, token.column, message)
}

fn unexpected(token: &Token) -> ParseError {
    let what = match &token.kind {
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Op(op) => format!("`{op}`"),
        TokenKind::Keyword(kw) => format!("`{}`", format!("{kw:?}").to_lowercase()),
        TokenKind::LParen => "`(`".to_string(),
        TokenKind::RParen => "`)`".to_string(),
        TokenKind::LBracket => "`[`".to_string(),
        TokenKind::RBracket => "`]`".to_string(),
        TokenKind::LBrace => "`{`".to_string(),
        TokenKind::RBrace => "`}`".to_string(),
        TokenKind::Comma => "`,`".to_string(),
        TokenKind::Semicolon => "`;`".to_string(),
        _ => "literal".to_string(),
    };
    error_at(token, &format!("unexpected {what}"))
}

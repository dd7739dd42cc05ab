//! Python syntax-tree provider.
//!
//! Tokenizes with Python's logical-line and indentation rules, then parses
//! statements into the neutral tree. Expressions outside the literal /
//! comparison subset become [`Expr::Opaque`]; they never fail the parse.
//! Structural faults do: unbalanced brackets, unterminated strings,
//! inconsistent dedents, stray indentation, invalid characters.

use super::syntax::{Branch, CmpOp, Expr, IfChain, Module, Stmt, SyntaxError, SyntaxTreeProvider};
use std::path::Path;

const COMPOUND_KEYWORDS: &[&str] = &[
    "def", "class", "for", "while", "with", "try", "except", "finally", "else", "elif", "async",
    "match", "case",
];
const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];
const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "==", "!=", "<=", ">=", "**", "//", "<<", ">>", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "@=", "->", ":=",
];
const ONE_CHAR_OPS: &str = "+-*/%@&|^~<>=.,:;";

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonSyntax;

impl SyntaxTreeProvider for PythonSyntax {
    fn language(&self) -> &'static str {
        "python"
    }

    fn accepts(&self, path: &Path, source: &str) -> bool {
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "py" | "pyw" | "pyi"));
        let by_shebang = source
            .lines()
            .next()
            .is_some_and(|first| first.starts_with("#!") && first.contains("python"));
        by_extension || by_shebang
    }

    fn parse(&self, source: &str) -> Result<Module, SyntaxError> {
        let tokens = Lexer::new(source).run()?;
        Parser { tokens, pos: 0 }.module()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    /// `literal` is false for f-strings and bytes.
    Str { value: String, literal: bool },
    Op(String),
    /// Valid token the parser never needs to understand (imaginary numbers).
    Other,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    tok: Tok,
    line: usize,
}

impl Token {
    fn is_op(&self, op: &str) -> bool {
        matches!(&self.tok, Tok::Op(value) if value == op)
    }

    fn name(&self) -> Option<&str> {
        match &self.tok {
            Tok::Name(name) => Some(name),
            _ => None,
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    brackets: Vec<(char, usize)>,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.strip_prefix('\u{feff}').unwrap_or(source).chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() {
                let width = self.measure_indent();
                match self.peek() {
                    None => break,
                    Some('\n') => {
                        self.pos += 1;
                        self.line += 1;
                        continue;
                    }
                    Some('#') => {
                        self.skip_comment();
                        continue;
                    }
                    _ => {}
                }
                self.apply_indent(width)?;
                self.at_line_start = false;
            }

            let Some(c) = self.peek() else {
                break;
            };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.brackets.is_empty() {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' => self.continuation()?,
                '"' | '\'' => self.string("")?,
                '.' if self.peek_at(1).is_some_and(|next| next.is_ascii_digit()) => self.number(),
                c if c.is_ascii_digit() => self.number(),
                c if c == '_' || c.is_alphabetic() => self.name_or_prefixed_string()?,
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.pos += 1;
                    self.push(Tok::Op(c.to_string()));
                }
                ')' | ']' | '}' => self.close_bracket(c)?,
                _ => self.operator(c)?,
            }
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(SyntaxError::new(format!("'{open}' was never closed"), *line));
        }
        let needs_newline = self
            .tokens
            .last()
            .is_some_and(|token| !matches!(token.tok, Tok::Newline));
        if needs_newline {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    fn measure_indent(&mut self) -> usize {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }
        width
    }

    fn apply_indent(&mut self, width: usize) -> Result<(), SyntaxError> {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent);
        } else if width < current {
            while self.indents.last().is_some_and(|top| *top > width) {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if self.indents.last().copied() != Some(width) {
                return Err(SyntaxError::new(
                    "unindent does not match any outer indentation level",
                    self.line,
                ));
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn continuation(&mut self) -> Result<(), SyntaxError> {
        match (self.peek_at(1), self.peek_at(2)) {
            (Some('\n'), _) => {
                self.pos += 2;
                self.line += 1;
                Ok(())
            }
            (Some('\r'), Some('\n')) => {
                self.pos += 3;
                self.line += 1;
                Ok(())
            }
            _ => Err(SyntaxError::new(
                "unexpected character after line continuation character",
                self.line,
            )),
        }
    }

    fn close_bracket(&mut self, close: char) -> Result<(), SyntaxError> {
        let expected = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            Some((open, _)) if open == expected => {
                self.pos += 1;
                self.push(Tok::Op(close.to_string()));
                Ok(())
            }
            Some((open, _)) => Err(SyntaxError::new(
                format!("closing '{close}' does not match opening '{open}'"),
                self.line,
            )),
            None => Err(SyntaxError::new(format!("unmatched '{close}'"), self.line)),
        }
    }

    fn operator(&mut self, c: char) -> Result<(), SyntaxError> {
        let rest: String = self.chars[self.pos..].iter().take(3).collect();
        for op in THREE_CHAR_OPS.iter().chain(TWO_CHAR_OPS) {
            if rest.starts_with(op) {
                self.pos += op.chars().count();
                self.push(Tok::Op(op.to_string()));
                return Ok(());
            }
        }
        if ONE_CHAR_OPS.contains(c) {
            self.pos += 1;
            self.push(Tok::Op(c.to_string()));
            return Ok(());
        }
        Err(SyntaxError::new(
            format!("invalid character '{c}'"),
            self.line,
        ))
    }

    fn number(&mut self) {
        let start = self.pos;
        if self.peek() == Some('0')
            && let Some(marker) = self.peek_at(1)
            && let Some(radix) = match marker {
                'x' | 'X' => Some(16),
                'o' | 'O' => Some(8),
                'b' | 'B' => Some(2),
                _ => None,
            }
        {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.pos += 1;
            }
            let digits: String = self.chars[start + 2..self.pos]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            let tok = i64::from_str_radix(&digits, radix)
                .map(Tok::Int)
                .unwrap_or(Tok::Other);
            self.push(tok);
            return;
        }

        let mut is_float = false;
        self.eat_digits();
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            is_float = true;
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                self.eat_digits();
            }
        }
        if matches!(self.peek(), Some('j' | 'J')) {
            self.pos += 1;
            self.push(Tok::Other);
            return;
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let tok = if is_float {
            text.parse::<f64>().map(Tok::Float).unwrap_or(Tok::Other)
        } else {
            match text.parse::<i64>() {
                Ok(value) => Tok::Int(value),
                Err(_) => text.parse::<f64>().map(Tok::Float).unwrap_or(Tok::Other),
            }
        };
        self.push(tok);
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn name_or_prefixed_string(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == '_' || c.is_alphanumeric())
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if matches!(self.peek(), Some('"' | '\''))
            && STRING_PREFIXES.contains(&name.to_lowercase().as_str())
        {
            return self.string(&name.to_lowercase());
        }
        self.push(Tok::Name(name));
        Ok(())
    }

    fn string(&mut self, prefix: &str) -> Result<(), SyntaxError> {
        let raw = prefix.contains('r');
        let literal = !prefix.contains('f') && !prefix.contains('b');
        let start_line = self.line;
        let Some(quote) = self.peek() else {
            return Err(SyntaxError::new("unterminated string literal", start_line));
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new("unterminated string literal", start_line));
            };
            self.pos += 1;
            match c {
                '\\' => {
                    let Some(next) = self.peek() else {
                        return Err(SyntaxError::new("unterminated string literal", start_line));
                    };
                    self.pos += 1;
                    if next == '\n' {
                        self.line += 1;
                        if raw {
                            value.push('\\');
                            value.push('\n');
                        }
                        continue;
                    }
                    if raw {
                        value.push('\\');
                        value.push(next);
                    } else {
                        self.escape(next, &mut value);
                    }
                }
                '\n' if triple => {
                    self.line += 1;
                    value.push('\n');
                }
                '\n' => {
                    return Err(SyntaxError::new("unterminated string literal", start_line));
                }
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.pos += 2;
                        break;
                    }
                    value.push(c);
                }
                c => value.push(c),
            }
        }

        self.push(Tok::Str { value, literal });
        Ok(())
    }

    fn escape(&mut self, next: char, value: &mut String) {
        let hex_len = match next {
            'n' => return value.push('\n'),
            't' => return value.push('\t'),
            'r' => return value.push('\r'),
            '0' => return value.push('\0'),
            '\\' | '\'' | '"' => return value.push(next),
            'x' => 2,
            'u' => 4,
            'U' => 8,
            other => {
                value.push('\\');
                value.push(other);
                return;
            }
        };
        let digits: String = self.chars[self.pos..].iter().take(hex_len).collect();
        match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
            Some(decoded) if digits.chars().count() == hex_len => {
                self.pos += hex_len;
                value.push(decoded);
            }
            _ => {
                value.push('\\');
                value.push(next);
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn module(mut self) -> Result<Module, SyntaxError> {
        let body = self.statements(false)?;
        Ok(Module { body })
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn statements(&mut self, in_block: bool) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            let token = self.current();
            match token.tok {
                Tok::Eof => break,
                Tok::Dedent if in_block => {
                    self.pos += 1;
                    break;
                }
                Tok::Dedent => return Err(SyntaxError::new("unexpected unindent", token.line)),
                Tok::Indent => return Err(SyntaxError::new("unexpected indent", token.line)),
                Tok::Newline => self.pos += 1,
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    /// Tokens up to the next Newline, which is consumed.
    fn logical_line(&mut self) -> Vec<Token> {
        let mut line = Vec::new();
        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            match token.tok {
                Tok::Newline => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                _ => {
                    self.pos += 1;
                    line.push(token);
                }
            }
        }
        line
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let line = self.logical_line();
        let Some(first) = line.first() else {
            return Ok(Vec::new());
        };
        let line_no = first.line;
        let keyword = first.name().unwrap_or_default().to_string();

        if keyword == "if" {
            return Ok(vec![self.if_chain(line)?]);
        }
        if COMPOUND_KEYWORDS.contains(&keyword.as_str())
            && let Some(colon) = header_colon(&line)
        {
            let body = self.suite(&line[colon + 1..], line_no)?;
            return Ok(vec![Stmt::Block {
                keyword,
                body,
                line: line_no,
            }]);
        }
        Ok(simple_statements(&line))
    }

    /// Body after a header colon: inline simple statements or an indented block.
    fn suite(&mut self, inline: &[Token], line: usize) -> Result<Vec<Stmt>, SyntaxError> {
        if !inline.is_empty() {
            return Ok(simple_statements(inline));
        }
        if matches!(self.current().tok, Tok::Indent) {
            self.pos += 1;
            return self.statements(true);
        }
        Err(SyntaxError::new("expected an indented block", line))
    }

    fn if_chain(&mut self, first_line: Vec<Token>) -> Result<Stmt, SyntaxError> {
        let mut branches = Vec::new();
        let mut orelse = None;
        let mut header = first_line;
        loop {
            let line = header[0].line;
            let colon = header_colon(&header).ok_or_else(|| SyntaxError::new("expected ':'", line))?;
            let test = parse_expr(&header[1..colon]);
            let body = self.suite(&header[colon + 1..], line)?;
            branches.push(Branch { test, body, line });

            match self.current().name() {
                Some("elif") => header = self.logical_line(),
                Some("else") => {
                    let else_line = self.logical_line();
                    let line = else_line[0].line;
                    let colon = header_colon(&else_line)
                        .ok_or_else(|| SyntaxError::new("expected ':'", line))?;
                    orelse = Some(self.suite(&else_line[colon + 1..], line)?);
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If(IfChain { branches, orelse }))
    }
}

/// Index of the first `:` outside any brackets.
fn header_colon(tokens: &[Token]) -> Option<usize> {
    depth_zero_positions(tokens, ":").into_iter().next()
}

fn depth_zero_positions(tokens: &[Token], op: &str) -> Vec<usize> {
    let mut depth = 0usize;
    let mut out = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        let Tok::Op(value) = &token.tok else {
            continue;
        };
        match value.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            other if depth == 0 && other == op => out.push(idx),
            _ => {}
        }
    }
    out
}

fn simple_statements(tokens: &[Token]) -> Vec<Stmt> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut bounds = depth_zero_positions(tokens, ";");
    bounds.push(tokens.len());
    for end in bounds {
        let part = &tokens[start..end];
        if !part.is_empty() {
            out.extend(simple_statement(part));
        }
        start = end + 1;
    }
    out
}

fn simple_statement(tokens: &[Token]) -> Vec<Stmt> {
    let line = tokens[0].line;
    let eqs = depth_zero_positions(tokens, "=");
    let Some(last_eq) = eqs.last().copied() else {
        return vec![Stmt::Other { line }];
    };
    let value = parse_expr(&tokens[last_eq + 1..]);

    let mut assigns = Vec::new();
    let mut start = 0;
    for eq in &eqs {
        let segment = &tokens[start..*eq];
        start = eq + 1;
        let target = match segment {
            [single] => single.name(),
            // `name: annotation = value`
            [head, colon, _, ..] if eqs.len() == 1 && colon.is_op(":") => head.name(),
            _ => None,
        };
        if let Some(target) = target {
            assigns.push(Stmt::Assign {
                target: target.to_string(),
                value: value.clone(),
                line,
            });
        }
    }
    if assigns.is_empty() {
        assigns.push(Stmt::Other { line });
    }
    assigns
}

fn parse_expr(tokens: &[Token]) -> Expr {
    if tokens.is_empty() {
        return Expr::Opaque;
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    match parser.comparison() {
        Some(expr) if parser.pos == tokens.len() => expr,
        _ => Expr::Opaque,
    }
}

struct ExprParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl ExprParser<'_> {
    fn eat(&mut self, op: &str) -> bool {
        if self.tokens.get(self.pos).is_some_and(|token| token.is_op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_cmp(&self) -> Option<CmpOp> {
        match &self.tokens.get(self.pos)?.tok {
            Tok::Op(op) => CmpOp::from_token(op),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Option<Expr> {
        let left = self.unary()?;
        let Some(op) = self.peek_cmp() else {
            return Some(left);
        };
        self.pos += 1;
        let right = self.unary()?;
        if self.peek_cmp().is_some() {
            // Chained comparisons are out of scope.
            return None;
        }
        Some(Expr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.eat("-") {
            return match self.atom()? {
                Expr::Int(value) => Some(
                    value
                        .checked_neg()
                        .map(Expr::Int)
                        .unwrap_or(Expr::Float(-(value as f64))),
                ),
                Expr::Float(value) => Some(Expr::Float(-value)),
                _ => None,
            };
        }
        if self.eat("+") {
            return match self.atom()? {
                number @ (Expr::Int(_) | Expr::Float(_)) => Some(number),
                _ => None,
            };
        }
        self.atom()
    }

    fn atom(&mut self) -> Option<Expr> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        match &token.tok {
            Tok::Int(value) => Some(Expr::Int(*value)),
            Tok::Float(value) => Some(Expr::Float(*value)),
            Tok::Str { value, literal } => {
                let mut text = value.clone();
                let mut is_literal = *literal;
                while let Some(Token {
                    tok: Tok::Str { value, literal },
                    ..
                }) = self.tokens.get(self.pos)
                {
                    text.push_str(value);
                    is_literal &= *literal;
                    self.pos += 1;
                }
                Some(if is_literal {
                    Expr::Str(text)
                } else {
                    Expr::Opaque
                })
            }
            Tok::Name(name) => Some(match name.as_str() {
                "True" => Expr::Bool(true),
                "False" => Expr::Bool(false),
                "None" => Expr::None,
                _ => Expr::Name(name.clone()),
            }),
            Tok::Op(op) if op == "[" => self.sequence("]").map(Expr::List),
            Tok::Op(op) if op == "(" => {
                if self.eat(")") {
                    return Some(Expr::Tuple(Vec::new()));
                }
                let first = self.comparison()?;
                if self.eat(")") {
                    return Some(first);
                }
                if !self.eat(",") {
                    return None;
                }
                let mut items = vec![first];
                items.extend(self.sequence(")")?);
                Some(Expr::Tuple(items))
            }
            Tok::Op(op) if op == "{" => self.braces(),
            _ => None,
        }
    }

    /// Comma-separated items up to `close`; the opener is already consumed.
    fn sequence(&mut self, close: &str) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(items);
            }
            items.push(self.comparison()?);
            if self.eat(close) {
                return Some(items);
            }
            if !self.eat(",") {
                return None;
            }
        }
    }

    fn braces(&mut self) -> Option<Expr> {
        if self.eat("}") {
            return Some(Expr::Dict(Vec::new()));
        }
        let first = self.comparison()?;
        if !self.eat(":") {
            // Set display: consumed but not a recognized literal.
            if !self.eat("}") {
                if !self.eat(",") {
                    return None;
                }
                self.sequence("}")?;
            }
            return Some(Expr::Opaque);
        }
        let mut pairs = vec![(first, self.comparison()?)];
        loop {
            if self.eat("}") {
                return Some(Expr::Dict(pairs));
            }
            if !self.eat(",") {
                return None;
            }
            if self.eat("}") {
                return Some(Expr::Dict(pairs));
            }
            let key = self.comparison()?;
            if !self.eat(":") {
                return None;
            }
            pairs.push((key, self.comparison()?));
        }
    }
}

//! Source evaluation: lexer, expression parser, and tree-walking evaluator.
//!
//! The accepted grammar is a single expression: literals (numbers, strings
//! with the usual escape forms, `true`, `false`, `null`, `undefined`),
//! `new Boolean/Number/String/Date/Object(...)`, arrow functions with
//! positional parameters, and `+ - * /` arithmetic. String literals are
//! lexed into raw code points so escape sequences may spell out unpaired
//! surrogates; the source text itself stays valid UTF-8.

use crate::engine::heap::{FunctionData, Heap, HeapCell, ObjectData};
use crate::engine::string::EngineString;
use crate::engine::value::{HeapRef, ScriptValue};
use crate::engine::EngineError;
use chrono::NaiveDate;
use std::rc::Rc;

#[derive(Debug)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Literal code points, possibly including surrogate values written
    /// through escape sequences.
    Str(Vec<u32>),
    Ident(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    New(Ctor, Vec<Expr>),
    Arrow(Vec<String>, Rc<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ctor {
    Boolean,
    Number,
    String,
    Date,
    Object,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(f64),
    Str(Vec<u32>),
    Ident(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Plus,
    Minus,
    Star,
    Slash,
    Arrow,
}

fn syntax(msg: impl Into<String>) -> EngineError {
    EngineError::new(format!("SyntaxError: {}", msg.into()))
}

fn lex(source: &str) -> Result<Vec<Tok>, EngineError> {
    let mut toks = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '{' => {
                chars.next();
                toks.push(Tok::LBrace);
            }
            '}' => {
                chars.next();
                toks.push(Tok::RBrace);
            }
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            }
            ';' => {
                chars.next();
                toks.push(Tok::Semi);
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                toks.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '/' => {
                chars.next();
                toks.push(Tok::Slash);
            }
            '=' => {
                chars.next();
                if chars.next() != Some('>') {
                    return Err(syntax("expected '>' after '='"));
                }
                toks.push(Tok::Arrow);
            }
            '\'' | '"' => {
                chars.next();
                toks.push(Tok::Str(lex_string(&mut chars, c)?));
            }
            '0'..='9' => {
                toks.push(Tok::Num(lex_number(&mut chars)?));
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_part(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(name));
            }
            other => return Err(syntax(format!("unexpected character '{other}'"))),
        }
    }
    Ok(toks)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn lex_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<f64, EngineError> {
    let mut text = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if chars.peek() == Some(&'.') {
        text.push('.');
        chars.next();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                chars.next();
            } else {
                break;
            }
        }
    }
    if matches!(chars.peek(), Some('e') | Some('E')) {
        text.push('e');
        chars.next();
        if matches!(chars.peek(), Some('+') | Some('-')) {
            text.push(chars.next().unwrap());
        }
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                chars.next();
            } else {
                break;
            }
        }
    }
    text.parse::<f64>()
        .map_err(|_| syntax(format!("bad numeric literal '{text}'")))
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Result<Vec<u32>, EngineError> {
    let mut out = Vec::new();
    loop {
        let c = chars.next().ok_or_else(|| syntax("unterminated string"))?;
        if c == quote {
            return Ok(out);
        }
        if c != '\\' {
            out.push(c as u32);
            continue;
        }
        let esc = chars
            .next()
            .ok_or_else(|| syntax("unterminated escape sequence"))?;
        match esc {
            'n' => out.push(0x0a),
            't' => out.push(0x09),
            'r' => out.push(0x0d),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'v' => out.push(0x0b),
            '0' => out.push(0x00),
            'x' => out.push(lex_hex(chars, 2)?),
            'u' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut cp = 0u32;
                    let mut digits = 0;
                    loop {
                        let c = chars
                            .next()
                            .ok_or_else(|| syntax("unterminated escape sequence"))?;
                        if c == '}' {
                            break;
                        }
                        let d = c
                            .to_digit(16)
                            .ok_or_else(|| syntax("bad hex digit in escape"))?;
                        cp = cp * 16 + d;
                        digits += 1;
                        if digits > 6 || cp > 0x10ffff {
                            return Err(syntax("code point escape out of range"));
                        }
                    }
                    if digits == 0 {
                        return Err(syntax("empty code point escape"));
                    }
                    out.push(cp);
                } else {
                    out.push(lex_hex(chars, 4)?);
                }
            }
            other => out.push(other as u32),
        }
    }
}

fn lex_hex(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    count: usize,
) -> Result<u32, EngineError> {
    let mut val = 0u32;
    for _ in 0..count {
        let c = chars
            .next()
            .ok_or_else(|| syntax("unterminated escape sequence"))?;
        let d = c
            .to_digit(16)
            .ok_or_else(|| syntax("bad hex digit in escape"))?;
        val = val * 16 + d;
    }
    Ok(val)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

/// Parse a source text into a single expression.
pub fn parse(source: &str) -> Result<Expr, EngineError> {
    let toks = lex(source)?;
    let mut p = Parser { toks, pos: 0 };
    let expr = p.parse_expr()?;
    p.eat(&Tok::Semi);
    if p.pos != p.toks.len() {
        return Err(syntax("unexpected tokens after expression"));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), EngineError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(syntax(format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, EngineError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, EngineError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EngineError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Tok::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EngineError> {
        match self.advance() {
            Some(Tok::Num(n)) => Ok(Expr::Number(n)),
            Some(Tok::Str(cps)) => Ok(Expr::Str(cps)),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "new" => self.parse_new(),
                _ => {
                    // A lone parameter name may itself start an arrow.
                    if self.eat(&Tok::Arrow) {
                        let body = self.parse_arrow_body()?;
                        return Ok(Expr::Arrow(vec![name], Rc::new(body)));
                    }
                    Ok(Expr::Ident(name))
                }
            },
            Some(Tok::LParen) => {
                if let Some(arrow) = self.try_parse_arrow()? {
                    return Ok(arrow);
                }
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(other) => Err(syntax(format!("unexpected token {other:?}"))),
            None => Err(syntax("unexpected end of input")),
        }
    }

    fn parse_new(&mut self) -> Result<Expr, EngineError> {
        let name = match self.advance() {
            Some(Tok::Ident(name)) => name,
            _ => return Err(syntax("expected constructor name after 'new'")),
        };
        let ctor = match name.as_str() {
            "Boolean" => Ctor::Boolean,
            "Number" => Ctor::Number,
            "String" => Ctor::String,
            "Date" => Ctor::Date,
            "Object" => Ctor::Object,
            other => return Err(syntax(format!("unknown constructor '{other}'"))),
        };
        self.expect(&Tok::LParen, "'(' after constructor name")?;
        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Tok::RParen) {
                    break;
                }
                self.expect(&Tok::Comma, "',' between arguments")?;
            }
        }
        Ok(Expr::New(ctor, args))
    }

    /// Called with the opening paren already consumed. Returns the arrow
    /// expression when what follows is a parameter list and `=>`, otherwise
    /// rewinds and lets the caller parse a parenthesized expression.
    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, EngineError> {
        let save = self.pos;
        let mut params = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                match self.advance() {
                    Some(Tok::Ident(name)) => params.push(name),
                    _ => {
                        self.pos = save;
                        return Ok(None);
                    }
                }
                if self.eat(&Tok::RParen) {
                    break;
                }
                if !self.eat(&Tok::Comma) {
                    self.pos = save;
                    return Ok(None);
                }
            }
        }
        if !self.eat(&Tok::Arrow) {
            self.pos = save;
            return Ok(None);
        }
        let body = self.parse_arrow_body()?;
        Ok(Some(Expr::Arrow(params, Rc::new(body))))
    }

    fn parse_arrow_body(&mut self) -> Result<Expr, EngineError> {
        if !self.eat(&Tok::LBrace) {
            return self.parse_expr();
        }
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::Undefined);
        }
        match self.advance() {
            Some(Tok::Ident(kw)) if kw == "return" => {}
            _ => return Err(syntax("expected 'return' in arrow body")),
        }
        let expr = if matches!(self.peek(), Some(Tok::RBrace) | Some(Tok::Semi)) {
            Expr::Undefined
        } else {
            self.parse_expr()?
        };
        self.eat(&Tok::Semi);
        self.expect(&Tok::RBrace, "'}' after arrow body")?;
        Ok(expr)
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Evaluate an expression with positional parameters bound to `args`;
/// missing arguments read as `undefined`.
pub(crate) fn eval_expr(
    heap: &mut Heap,
    expr: &Expr,
    params: &[String],
    args: &[ScriptValue],
) -> Result<ScriptValue, EngineError> {
    match expr {
        Expr::Undefined => Ok(ScriptValue::Undefined),
        Expr::Null => Ok(ScriptValue::Null),
        Expr::Bool(b) => Ok(ScriptValue::Bool(*b)),
        Expr::Number(n) => Ok(ScriptValue::Number(*n)),
        Expr::Str(cps) => {
            let r = heap.alloc(HeapCell::Str(EngineString::from_code_points(cps)));
            Ok(ScriptValue::Ref(r))
        }
        Expr::Ident(name) => match params.iter().position(|p| p == name) {
            Some(i) => Ok(args.get(i).copied().unwrap_or(ScriptValue::Undefined)),
            None => Err(EngineError::new(format!(
                "ReferenceError: {name} is not defined"
            ))),
        },
        Expr::Neg(inner) => {
            let v = eval_expr(heap, inner, params, args)?;
            Ok(ScriptValue::Number(-to_number(heap, v)))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(heap, lhs, params, args)?;
            let r = eval_expr(heap, rhs, params, args)?;
            eval_binary(heap, *op, l, r)
        }
        Expr::New(ctor, arg_exprs) => {
            let mut vals = Vec::with_capacity(arg_exprs.len());
            for e in arg_exprs {
                vals.push(eval_expr(heap, e, params, args)?);
            }
            eval_new(heap, *ctor, &vals)
        }
        Expr::Arrow(fn_params, body) => {
            let r = heap.alloc(HeapCell::Function(FunctionData {
                params: fn_params.clone(),
                body: Rc::clone(body),
            }));
            Ok(ScriptValue::Ref(r))
        }
    }
}

/// Invoke an engine function value with already-converted arguments.
pub(crate) fn call_function(
    heap: &mut Heap,
    fref: HeapRef,
    args: &[ScriptValue],
) -> Result<ScriptValue, EngineError> {
    let (params, body) = match heap.get(fref) {
        HeapCell::Function(f) => (f.params.clone(), Rc::clone(&f.body)),
        _ => return Err(EngineError::new("TypeError: value is not callable")),
    };
    eval_expr(heap, &body, &params, args)
}

fn eval_binary(
    heap: &mut Heap,
    op: BinOp,
    lhs: ScriptValue,
    rhs: ScriptValue,
) -> Result<ScriptValue, EngineError> {
    if op == BinOp::Add {
        let l = unbox(heap, lhs);
        let r = unbox(heap, rhs);
        if is_string_value(heap, l) || is_string_value(heap, r) {
            let ls = to_engine_string(heap, l);
            let rs = to_engine_string(heap, r);
            let joined = ls.concat(&rs);
            return Ok(ScriptValue::Ref(heap.alloc(HeapCell::Str(joined))));
        }
        return Ok(ScriptValue::Number(to_number(heap, l) + to_number(heap, r)));
    }
    let l = to_number(heap, lhs);
    let r = to_number(heap, rhs);
    let out = match op {
        BinOp::Add => unreachable!(),
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => l / r,
    };
    Ok(ScriptValue::Number(out))
}

fn eval_new(heap: &mut Heap, ctor: Ctor, args: &[ScriptValue]) -> Result<ScriptValue, EngineError> {
    let cell = match ctor {
        Ctor::Boolean => {
            let b = args.first().map_or(false, |v| to_boolean(heap, *v));
            HeapCell::BoxedBool(b)
        }
        Ctor::Number => {
            let n = args.first().map_or(0.0, |v| to_number(heap, *v));
            HeapCell::BoxedNumber(n)
        }
        Ctor::String => {
            // Box the argument's string cell directly when it already is
            // one, otherwise materialize the converted text first.
            let inner = match args.first() {
                Some(ScriptValue::Ref(r)) if matches!(heap.get(*r), HeapCell::Str(_)) => *r,
                Some(v) => {
                    let s = to_engine_string(heap, *v);
                    heap.alloc(HeapCell::Str(s))
                }
                None => heap.alloc(HeapCell::Str(EngineString::narrow(Vec::new()))),
            };
            HeapCell::BoxedStr(inner)
        }
        Ctor::Date => HeapCell::Date(eval_date_ctor(heap, args)?),
        Ctor::Object => HeapCell::Object(ObjectData::default()),
    };
    Ok(ScriptValue::Ref(heap.alloc(cell)))
}

fn eval_date_ctor(heap: &mut Heap, args: &[ScriptValue]) -> Result<f64, EngineError> {
    let mut fields = [0.0f64; 7];
    for (i, v) in args.iter().enumerate().take(7) {
        fields[i] = to_number(heap, *v);
    }
    match args.len() {
        0 => Err(EngineError::new(
            "TypeError: new Date() without arguments is not supported",
        )),
        1 => Ok(fields[0].trunc()),
        _ => {
            if fields.iter().any(|f| f.is_nan()) {
                return Err(EngineError::new("RangeError: invalid date"));
            }
            // Calendar fields: year, 0-based month, day (default 1 when the
            // caller stops early), then hour/minute/second/millisecond.
            let year = fields[0].trunc() as i32;
            let month = fields[1].trunc() as u32 + 1;
            let day = if args.len() > 2 {
                fields[2].trunc() as u32
            } else {
                1
            };
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| EngineError::new("RangeError: invalid date"))?;
            let dt = date
                .and_hms_opt(
                    fields[3].trunc() as u32,
                    fields[4].trunc() as u32,
                    fields[5].trunc() as u32,
                )
                .ok_or_else(|| EngineError::new("RangeError: invalid date"))?;
            let ms = dt.and_utc().timestamp_millis() + fields[6].trunc() as i64;
            Ok(ms as f64)
        }
    }
}

/// Collapse boxed primitives to the primitive they wrap; other values pass
/// through unchanged.
fn unbox(heap: &Heap, v: ScriptValue) -> ScriptValue {
    if let ScriptValue::Ref(r) = v {
        match heap.get(r) {
            HeapCell::BoxedBool(b) => return ScriptValue::Bool(*b),
            HeapCell::BoxedNumber(n) => return ScriptValue::Number(*n),
            HeapCell::BoxedStr(inner) => return ScriptValue::Ref(*inner),
            _ => {}
        }
    }
    v
}

fn is_string_value(heap: &Heap, v: ScriptValue) -> bool {
    matches!(v, ScriptValue::Ref(r) if matches!(heap.get(r), HeapCell::Str(_)))
}

pub(crate) fn to_boolean(heap: &Heap, v: ScriptValue) -> bool {
    match v {
        ScriptValue::Undefined | ScriptValue::Null => false,
        ScriptValue::Bool(b) => b,
        ScriptValue::Number(n) => n != 0.0 && !n.is_nan(),
        ScriptValue::Ref(r) => match heap.get(r) {
            HeapCell::Str(s) => !s.is_empty(),
            _ => true,
        },
    }
}

pub(crate) fn to_number(heap: &Heap, v: ScriptValue) -> f64 {
    match v {
        ScriptValue::Undefined => f64::NAN,
        ScriptValue::Null => 0.0,
        ScriptValue::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        ScriptValue::Number(n) => n,
        ScriptValue::Ref(r) => match heap.get(r) {
            HeapCell::Str(s) => string_to_number(s),
            HeapCell::Date(ms) => *ms,
            HeapCell::BoxedBool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            HeapCell::BoxedNumber(n) => *n,
            HeapCell::BoxedStr(inner) => match heap.get(*inner) {
                HeapCell::Str(s) => string_to_number(s),
                _ => panic!("boxed string wraps a non-string cell"),
            },
            HeapCell::Function(_) | HeapCell::Object(_) => f64::NAN,
        },
    }
}

fn string_to_number(s: &EngineString) -> f64 {
    if !s.is_ascii() {
        return f64::NAN;
    }
    let text: String = s.code_points().iter().map(|c| *c as u8 as char).collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn to_engine_string(heap: &Heap, v: ScriptValue) -> EngineString {
    match v {
        ScriptValue::Undefined => EngineString::narrow(b"undefined".to_vec()),
        ScriptValue::Null => EngineString::narrow(b"null".to_vec()),
        ScriptValue::Bool(true) => EngineString::narrow(b"true".to_vec()),
        ScriptValue::Bool(false) => EngineString::narrow(b"false".to_vec()),
        ScriptValue::Number(n) => EngineString::narrow(number_to_text(n).into_bytes()),
        ScriptValue::Ref(r) => match heap.get(r) {
            HeapCell::Str(s) => s.clone(),
            HeapCell::Date(ms) => EngineString::narrow(number_to_text(*ms).into_bytes()),
            HeapCell::BoxedBool(b) => to_engine_string(heap, ScriptValue::Bool(*b)),
            HeapCell::BoxedNumber(n) => to_engine_string(heap, ScriptValue::Number(*n)),
            HeapCell::BoxedStr(inner) => to_engine_string(heap, ScriptValue::Ref(*inner)),
            HeapCell::Function(_) => EngineString::narrow(b"function".to_vec()),
            HeapCell::Object(_) => EngineString::narrow(b"[object Object]".to_vec()),
        },
    }
}

fn number_to_text(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

//! Restricted arithmetic expressions.
//!
//! Formulas, derived variables and constraints are written in a small
//! Python-flavoured language: numbers, variable names, `+ - * / // % **`,
//! comparisons, `and`/`or`/`not`, parentheses and the functions `abs`,
//! `min`, `max` and `round`. Anything else is rejected while parsing, so an
//! expression that parses can only ever compute a number or a boolean.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use virtual_expert_core::{Error, Result, Value};

// =============================================================================
// Scope
// =============================================================================

/// Variable lookup used during evaluation.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

const OPERATORS: [&str; 14] = [
    "**", "//", "<=", ">=", "==", "!=", "+", "-", "*", "/", "%", "<", ">", "=",
];

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                if chars[i] == '.' {
                    if is_float {
                        return Err(Error::expression(format!("Malformed number at position {}", start)));
                    }
                    is_float = true;
                }
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    is_float = true;
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            if is_float {
                let value = text
                    .parse::<f64>()
                    .map_err(|_| Error::expression(format!("Malformed number '{}'", text)))?;
                tokens.push(Token::Float(value));
            } else {
                let value = text
                    .parse::<i64>()
                    .map_err(|_| Error::expression(format!("Integer literal out of range: {}", text)))?;
                tokens.push(Token::Int(value));
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '\'' | '"' => return Err(Error::expression("String literals are not allowed")),
            _ => {
                let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| Error::expression(format!("Unexpected character '{}' at position {}", c, i)))?;
                if *op == "=" {
                    return Err(Error::expression("Assignment is not allowed"));
                }
                tokens.push(Token::Op(op));
                i += op.len();
                continue;
            }
        }
        i += 1;
    }

    Ok(tokens)
}

// =============================================================================
// Syntax Tree
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Min,
    Max,
    Round,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Func::Abs),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "round" => Some(Func::Round),
            _ => None,
        }
    }

    fn check_arity(&self, count: usize) -> Result<()> {
        let ok = match self {
            Func::Abs => count == 1,
            Func::Round => count == 1 || count == 2,
            Func::Min | Func::Max => count >= 1,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::expression(format!(
                "{:?}() called with {} argument(s)",
                self, count
            ).to_lowercase()))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Var(String),
    Neg(Box<Node>),
    Pos(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Compare(Box<Node>, Vec<(CmpOp, Node)>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(Error::expression(format!("Expected {:?}, found {:?}", expected, t))),
            None => Err(Error::expression(format!("Expected {:?}, found end of input", expected))),
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Node> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Op("<")) => CmpOp::Lt,
                Some(Token::Op("<=")) => CmpOp::Le,
                Some(Token::Op(">")) => CmpOp::Gt,
                Some(Token::Op(">=")) => CmpOp::Ge,
                Some(Token::Op("==")) => CmpOp::Eq,
                Some(Token::Op("!=")) => CmpOp::Ne,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.parse_sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Compare(Box::new(first), rest))
        }
    }

    fn parse_sum(&mut self) -> Result<Node> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node> {
        let mut left = self.parse_factor()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("//") {
                BinOp::FloorDiv
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.parse_factor()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Node> {
        if self.eat_op("-") {
            return Ok(Node::Neg(Box::new(self.parse_factor()?)));
        }
        if self.eat_op("+") {
            return Ok(Node::Pos(Box::new(self.parse_factor()?)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Node> {
        let base = self.parse_atom()?;
        if self.eat_op("**") {
            // The exponent binds like a unary operand: 2 ** -1, 2 ** 3 ** 2.
            let exponent = self.parse_factor()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Node::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Node::Literal(Value::Float(f))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Node::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Node::Literal(Value::Bool(false))),
                "and" | "or" | "not" => Err(Error::expression(format!("Unexpected keyword '{}'", name))),
                _ if matches!(self.peek(), Some(Token::LParen)) => {
                    let func = Func::lookup(&name)
                        .ok_or_else(|| Error::expression(format!("Function '{}' is not allowed", name)))?;
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.parse_or()?);
                            if matches!(self.peek(), Some(Token::Comma)) {
                                self.pos += 1;
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(Token::RParen)?;
                    func.check_arity(args.len())?;
                    Ok(Node::Call(func, args))
                }
                _ => Ok(Node::Var(name)),
            },
            Some(t) => Err(Error::expression(format!("Unexpected token {:?}", t))),
            None => Err(Error::expression("Unexpected end of expression")),
        }
    }
}

// =============================================================================
// Expression
// =============================================================================

/// A parsed, validated expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(Error::expression("Empty expression"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or()?;
        if let Some(extra) = parser.peek() {
            return Err(Error::expression(format!(
                "Unexpected {:?} in '{}'",
                extra, source
            )));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of every variable the expression references.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_vars(&self.root, &mut names);
        names
    }

    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> Result<Value> {
        eval(&self.root, scope)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and evaluate in one go.
pub fn evaluate<S: Scope + ?Sized>(source: &str, scope: &S) -> Result<Value> {
    Expression::parse(source)?.evaluate(scope)
}

/// Check an expression without evaluating it.
///
/// Returns one message per problem: a syntax error, or each referenced
/// variable missing from `available`.
pub fn validate(source: &str, available: &BTreeSet<String>) -> Vec<String> {
    match Expression::parse(source) {
        Ok(expr) => expr
            .variables()
            .into_iter()
            .filter(|name| !available.contains(name))
            .map(|name| format!("Unknown variable '{}' in expression '{}'", name, source))
            .collect(),
        Err(e) => vec![format!("Invalid expression '{}': {}", source, e)],
    }
}

fn collect_vars(node: &Node, names: &mut BTreeSet<String>) {
    match node {
        Node::Literal(_) => {}
        Node::Var(name) => {
            names.insert(name.clone());
        }
        Node::Neg(inner) | Node::Pos(inner) | Node::Not(inner) => collect_vars(inner, names),
        Node::Binary(_, l, r) | Node::And(l, r) | Node::Or(l, r) => {
            collect_vars(l, names);
            collect_vars(r, names);
        }
        Node::Compare(first, rest) => {
            collect_vars(first, names);
            for (_, node) in rest {
                collect_vars(node, names);
            }
        }
        Node::Call(_, args) => {
            for arg in args {
                collect_vars(arg, names);
            }
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(Num::Int(i64::from(*b))),
            Value::Int(i) => Ok(Num::Int(*i)),
            Value::Float(f) => Ok(Num::Float(*f)),
            Value::Text(s) => Err(Error::expression(format!("'{}' is not a number", s))),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Result<Value> {
        match self {
            Num::Int(i) => Ok(Value::Int(i)),
            Num::Float(f) if f.is_finite() => Ok(Value::Float(f)),
            Num::Float(f) if f.is_nan() => Err(Error::expression("Result is not a number")),
            Num::Float(_) => Err(Error::expression("Numeric overflow")),
        }
    }
}

fn overflow() -> Error {
    Error::expression("Numeric overflow")
}

fn eval<S: Scope + ?Sized>(node: &Node, scope: &S) -> Result<Value> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Var(name) => scope
            .lookup(name)
            .ok_or_else(|| Error::expression(format!("Unknown variable '{}'", name))),
        Node::Neg(inner) => match Num::from_value(&eval(inner, scope)?)? {
            Num::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Num::Float(f) => Ok(Value::Float(-f)),
        },
        Node::Pos(inner) => Num::from_value(&eval(inner, scope)?)?.into_value(),
        Node::Not(inner) => Ok(Value::Bool(!eval(inner, scope)?.is_truthy())),
        Node::And(l, r) => {
            let left = eval(l, scope)?;
            if left.is_truthy() {
                eval(r, scope)
            } else {
                Ok(left)
            }
        }
        Node::Or(l, r) => {
            let left = eval(l, scope)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(r, scope)
            }
        }
        Node::Binary(op, l, r) => {
            let left = Num::from_value(&eval(l, scope)?)?;
            let right = Num::from_value(&eval(r, scope)?)?;
            binary(*op, left, right)?.into_value()
        }
        Node::Compare(first, rest) => {
            let mut left = eval(first, scope)?;
            for (op, node) in rest {
                let right = eval(node, scope)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Node::Call(func, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, scope))
                .collect::<Result<Vec<_>>>()?;
            call(*func, &values)
        }
    }
}

fn binary(op: BinOp, left: Num, right: Num) -> Result<Num> {
    use Num::{Float, Int};

    match (op, left, right) {
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or_else(overflow),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or_else(overflow),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or_else(overflow),
        (BinOp::Add, a, b) => Ok(Float(a.as_f64() + b.as_f64())),
        (BinOp::Sub, a, b) => Ok(Float(a.as_f64() - b.as_f64())),
        (BinOp::Mul, a, b) => Ok(Float(a.as_f64() * b.as_f64())),
        (BinOp::Div, a, b) => {
            if b.as_f64() == 0.0 {
                return Err(Error::expression("Division by zero"));
            }
            Ok(Float(a.as_f64() / b.as_f64()))
        }
        (BinOp::FloorDiv, Int(a), Int(b)) => {
            if b == 0 {
                return Err(Error::expression("Division by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Int(q - 1))
            } else {
                Ok(Int(q))
            }
        }
        (BinOp::FloorDiv, a, b) => {
            if b.as_f64() == 0.0 {
                return Err(Error::expression("Division by zero"));
            }
            Ok(Float((a.as_f64() / b.as_f64()).floor()))
        }
        (BinOp::Mod, Int(a), Int(b)) => {
            if b == 0 {
                return Err(Error::expression("Modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Int(r + b))
            } else {
                Ok(Int(r))
            }
        }
        (BinOp::Mod, a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(Error::expression("Modulo by zero"));
            }
            Ok(Float(a - b * (a / b).floor()))
        }
        (BinOp::Pow, Int(a), Int(b)) if b >= 0 => {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).map(Int).ok_or_else(overflow)
        }
        (BinOp::Pow, a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if a == 0.0 && b < 0.0 {
                return Err(Error::expression("Zero cannot be raised to a negative power"));
            }
            Ok(Float(a.powf(b)))
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool> {
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return match op {
            CmpOp::Eq => Ok(a == b),
            CmpOp::Ne => Ok(a != b),
            _ => Err(Error::expression("Text values can only be compared for equality")),
        };
    }
    if left.as_str().is_some() || right.as_str().is_some() {
        return match op {
            CmpOp::Eq => Ok(false),
            CmpOp::Ne => Ok(true),
            _ => Err(Error::expression("Cannot order text against a number")),
        };
    }

    let ordering = match (Num::from_value(left)?, Num::from_value(right)?) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    };
    let Some(ordering) = ordering else {
        return Ok(matches!(op, CmpOp::Ne));
    };

    use std::cmp::Ordering::*;
    Ok(match op {
        CmpOp::Lt => ordering == Less,
        CmpOp::Le => ordering != Greater,
        CmpOp::Gt => ordering == Greater,
        CmpOp::Ge => ordering != Less,
        CmpOp::Eq => ordering == Equal,
        CmpOp::Ne => ordering != Equal,
    })
}

/// Round half to even.
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn call(func: Func, args: &[Value]) -> Result<Value> {
    match func {
        Func::Abs => match Num::from_value(&args[0])? {
            Num::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
            Num::Float(f) => Ok(Value::Float(f.abs())),
        },
        Func::Min | Func::Max => {
            let mut best: Option<(f64, &Value)> = None;
            for value in args {
                let n = Num::from_value(value)?.as_f64();
                let better = match best {
                    None => true,
                    Some((current, _)) if func == Func::Min => n < current,
                    Some((current, _)) => n > current,
                };
                if better {
                    best = Some((n, value));
                }
            }
            let (_, value) = best.ok_or_else(|| Error::expression("min()/max() need an argument"))?;
            Ok(match value {
                Value::Bool(b) => Value::Int(i64::from(*b)),
                other => other.clone(),
            })
        }
        Func::Round => {
            let x = Num::from_value(&args[0])?;
            match args.get(1) {
                None => match x {
                    Num::Int(i) => Ok(Value::Int(i)),
                    Num::Float(f) => {
                        let r = round_half_even(f);
                        if !r.is_finite() || r.abs() >= 9.2e18 {
                            return Err(overflow());
                        }
                        Ok(Value::Int(r as i64))
                    }
                },
                Some(digits) => {
                    let digits = match Num::from_value(digits)? {
                        Num::Int(d) => d,
                        Num::Float(_) => {
                            return Err(Error::expression("round() digits must be an integer"))
                        }
                    };
                    let digits = i32::try_from(digits.clamp(-300, 300)).map_err(|_| overflow())?;
                    let scale = 10f64.powi(digits);
                    let rounded = round_half_even(x.as_f64() * scale) / scale;
                    match x {
                        Num::Int(_) => Ok(Value::Int(rounded as i64)),
                        Num::Float(_) => Num::Float(rounded).into_value(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval_str(source: &str) -> Value {
        evaluate(source, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_str("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval_str("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval_str("-2 ** 2"), Value::Int(-4));
        assert_eq!(eval_str("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval_str("2 ** -1"), Value::Float(0.5));
    }

    #[test]
    fn test_integer_semantics() {
        assert_eq!(eval_str("7 // 2"), Value::Int(3));
        assert_eq!(eval_str("-7 // 2"), Value::Int(-4));
        assert_eq!(eval_str("-7 % 3"), Value::Int(2));
        assert_eq!(eval_str("7 % -3"), Value::Int(-2));
        assert_eq!(eval_str("10 / 2"), Value::Float(5.0));
        assert_eq!(eval_str("7.5 // 2"), Value::Float(3.0));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval_str("abs(-3)"), Value::Int(3));
        assert_eq!(eval_str("min(4, 2, 9)"), Value::Int(2));
        assert_eq!(eval_str("max(1, 2.5)"), Value::Float(2.5));
        assert_eq!(eval_str("round(2.5)"), Value::Int(2));
        assert_eq!(eval_str("round(3.5)"), Value::Int(4));
        assert_eq!(eval_str("round(2.675, 1)"), Value::Float(2.7));
    }

    #[test]
    fn test_variables_and_comparisons() {
        let vars = scope(&[("a", Value::Int(30)), ("b", Value::Int(12))]);
        assert_eq!(evaluate("a - b >= 10", &vars).unwrap(), Value::Bool(true));
        assert_eq!(evaluate("b < a < 20", &vars).unwrap(), Value::Bool(false));
        assert_eq!(
            evaluate("a > b and not b > a", &vars).unwrap(),
            Value::Bool(true)
        );

        let expr = Expression::parse("a * b + max(a, c)").unwrap();
        let names: Vec<_> = expr.variables().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rejects_unsafe_constructs() {
        for source in [
            "__import__('os')",
            "open(1)",
            "a.b",
            "a[0]",
            "x = 1",
            "\"text\"",
            "lambda: 1",
            "2 +",
            "",
        ] {
            assert!(Expression::parse(source).is_err(), "accepted {:?}", source);
        }
    }

    #[test]
    fn test_runtime_errors() {
        let empty = BTreeMap::new();
        assert!(evaluate("1 / 0", &empty).is_err());
        assert!(evaluate("5 // 0", &empty).is_err());
        assert!(evaluate("5 % 0", &empty).is_err());
        assert!(evaluate("9223372036854775807 + 1", &empty).is_err());
        assert!(evaluate("missing + 1", &empty).is_err());
    }

    #[test]
    fn test_validate_reports_unknown_variables() {
        let available: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert!(validate("a * 2", &available).is_empty());

        let errors = validate("a + b", &available);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'b'"));

        assert_eq!(validate("a +", &available).len(), 1);
    }
}

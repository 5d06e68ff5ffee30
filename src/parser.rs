//! Recursive-descent parser with a classic precedence ladder, one
//! method per level:
//!
//! ```text
//! assignment (right-assoc)
//!   logical_or  ||
//!   logical_and &&
//!   equality    == !=
//!   relational  < <= > >=
//!   concat      ..
//!   shift       << >>
//!   additive    + -
//!   multiplicative * / %
//!   unary-prefix  + - ! ++ -- & *
//!   postfix     . [ ] ( ) ++ --
//!   primary
//! ```
//!
//! Parsing and name resolution happen in a single pass: every
//! identifier occurrence is baked to a slot index via [`Scope`].
//! Lambda bodies open a fresh function scope; a name not found there
//! falls back to the top-level scope (so top-level bindings, module
//! imports and self-recursive functions resolve), otherwise it is
//! auto-declared in the innermost function. Block scopes shadow
//! without recycling slots.
//!
//! The parser is kept across REPL turns: [`Parser::reset`] swaps the
//! token stream but preserves the top-level slot map.

use std::rc::Rc;

use crate::ast::{BinOp, Expr, FnProto, IncDec, Param, UnOp};
use crate::lexer::{Token, TokenKind};
use crate::scope::Scope;
use crate::value::Value;
use crate::{Error, ParseError, ResolveError, modules};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    /// Top-level scope; survives `reset` so slots persist across turns.
    top: Scope,
    /// Function scopes opened by lambda bodies, innermost last.
    fn_scopes: Vec<Scope>,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            tokens: Vec::new(),
            current: 0,
            top: Scope::new(),
            fn_scopes: Vec::new(),
        }
    }

    /// Install a new token stream, keeping all accumulated scope state.
    pub fn reset(&mut self, tokens: Vec<Token>) {
        self.tokens = tokens;
        self.current = 0;
    }

    /// Slots the top-level frame needs so far.
    pub fn top_slots(&self) -> usize {
        self.top.len()
    }

    /// Bind a host identifier to a fresh top-level slot.
    pub fn register_top_level(&mut self, name: &str) -> Result<usize, ResolveError> {
        if self.top.find(name).is_some() {
            return Err(ResolveError::IdentifierRedeclared(name.to_owned()));
        }
        Ok(self.top.add(name))
    }

    /// Parse the whole token stream as a sequence of statements.
    pub fn parse(&mut self) -> Result<Expr, Error> {
        let mut statements = Vec::new();
        while self.current < self.tokens.len() {
            statements.push(self.parse_expression()?);
            self.match_punct(";");
        }
        Ok(Expr::Block(statements))
    }

    // ----- token helpers -------------------------------------------------

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.current + ahead)
    }

    fn match_punct(&mut self, lexeme: &str) -> bool {
        if self.peek_at(0).is_some_and(|t| t.is_punct(lexeme)) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn match_operator(&mut self, lexeme: &str) -> bool {
        if self.peek_at(0).is_some_and(|t| t.is_operator(lexeme)) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn match_assignment(&mut self, lexeme: &str) -> bool {
        if self.peek_at(0).is_some_and(|t| t.is_assignment(lexeme)) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, word: &str) -> bool {
        if self.peek_at(0).is_some_and(|t| t.is_identifier(word)) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn match_identifier(&mut self) -> Option<String> {
        if self
            .peek_at(0)
            .is_some_and(|t| t.kind == TokenKind::Identifier)
        {
            let lexeme = self.tokens[self.current].lexeme.clone();
            self.current += 1;
            Some(lexeme)
        } else {
            None
        }
    }

    /// The current token described for diagnostics.
    fn found_here(&self) -> String {
        match self.tokens.get(self.current) {
            Some(token) => format!("token '{}'", token.lexeme),
            None => "end of input".to_owned(),
        }
    }

    fn expect_punct(&mut self, lexeme: &'static str) -> Result<(), Error> {
        if self.match_punct(lexeme) {
            Ok(())
        } else {
            Err(ParseError::ExpectedToken {
                expected: lexeme,
                found: self.found_here(),
            }
            .into())
        }
    }

    // ----- scope helpers -------------------------------------------------

    fn cur_scope_mut(&mut self) -> &mut Scope {
        self.fn_scopes.last_mut().unwrap_or(&mut self.top)
    }

    /// Resolve a plain name to an identifier node. Inside a function:
    /// its own scope first, then the top-level scope, otherwise
    /// auto-declare locally. At top level every binding is global.
    fn resolve_identifier(&mut self, name: String) -> Expr {
        if let Some(scope) = self.fn_scopes.last() {
            if let Some(slot) = scope.find(&name) {
                return Expr::Identifier {
                    name,
                    slot,
                    global: false,
                };
            }
            if let Some(slot) = self.top.find(&name) {
                return Expr::Identifier {
                    name,
                    slot,
                    global: true,
                };
            }
            let slot = self.cur_scope_mut().add(&name);
            return Expr::Identifier {
                name,
                slot,
                global: false,
            };
        }
        let slot = match self.top.find(&name) {
            Some(slot) => slot,
            None => self.top.add(&name),
        };
        Expr::Identifier {
            name,
            slot,
            global: true,
        }
    }

    /// Run `f` inside a block scope of the current function, leaving
    /// the block even when `f` fails so the persistent top-level
    /// scope stays balanced.
    fn with_block_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.cur_scope_mut().enter();
        let result = f(self);
        self.cur_scope_mut().leave();
        result
    }

    // ----- precedence ladder ---------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr, Error> {
        // a bare `;` is an empty statement
        if self.peek_at(0).is_some_and(|t| t.is_punct(";")) {
            return Ok(Expr::Literal(Value::nil()));
        }
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        let left = self.parse_logical_or()?;

        let op = match self.peek_at(0) {
            Some(token)
                if token.kind == TokenKind::Assignment
                    && token.lexeme != "++"
                    && token.lexeme != "--" =>
            {
                token.lexeme.clone()
            }
            _ => return Ok(left),
        };
        self.current += 1;
        let right = self.parse_assignment()?;

        if op == "=" {
            Ok(Expr::Assign {
                target: Box::new(left),
                value: Box::new(right),
            })
        } else {
            let base = compound_base(&op).ok_or_else(|| {
                Error::Parse(ParseError::UnexpectedToken(format!("token '{op}'")))
            })?;
            Ok(Expr::CompoundAssign {
                op: base,
                target: Box::new(left),
                value: Box::new(right),
            })
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_logical_and()?;
        while self.match_operator("||") {
            let right = self.parse_logical_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_equality()?;
        while self.match_operator("&&") {
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_relational()?;
        loop {
            let op = if self.match_operator("==") {
                BinOp::Eq
            } else if self.match_operator("!=") {
                BinOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_concatenation()?;
        loop {
            let op = if self.match_operator("<=") {
                BinOp::Le
            } else if self.match_operator(">=") {
                BinOp::Ge
            } else if self.match_operator("<") {
                BinOp::Lt
            } else if self.match_operator(">") {
                BinOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }
    }

    fn parse_concatenation(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_shift()?;
        while self.match_operator("..") {
            let right = self.parse_shift()?;
            left = binary(BinOp::Concat, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.match_operator("<<") {
                BinOp::Shl
            } else if self.match_operator(">>") {
                BinOp::Shr
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.match_operator("+") {
                BinOp::Add
            } else if self.match_operator("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.match_operator("*") {
                BinOp::Mul
            } else if self.match_operator("/") {
                BinOp::Div
            } else if self.match_operator("%") {
                BinOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let op = match self.peek_at(0) {
            Some(token) if token.kind == TokenKind::Operator => match token.lexeme.as_str() {
                "+" => Some(UnOp::Plus),
                "-" => Some(UnOp::Neg),
                "!" => Some(UnOp::Not),
                "&" => Some(UnOp::AddrOf),
                "*" => Some(UnOp::Deref),
                _ => None,
            },
            Some(token) if token.kind == TokenKind::Assignment => match token.lexeme.as_str() {
                "++" => Some(UnOp::PreInc),
                "--" => Some(UnOp::PreDec),
                _ => None,
            },
            _ => None,
        };

        if let Some(op) = op {
            self.current += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_punct(".") {
                match self.match_identifier() {
                    Some(name) => {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            name,
                        };
                    }
                    None => {
                        return Err(ParseError::ExpectedToken {
                            expected: "identifier after '.'",
                            found: self.found_here(),
                        }
                        .into());
                    }
                }
            } else if self.match_punct("[") {
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.match_punct("(") {
                let args = self.parse_call_arguments()?;
                expr = Expr::Apply {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.match_assignment("++") {
                expr = Expr::Postfix {
                    op: IncDec::Inc,
                    operand: Box::new(expr),
                };
            } else if self.match_assignment("--") {
                expr = Expr::Postfix {
                    op: IncDec::Dec,
                    operand: Box::new(expr),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated arguments after an already-consumed `(`.
    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        if self.match_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.match_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        if self.match_punct("[") {
            return self.parse_bracket_literal();
        }
        if self.match_punct("{") {
            return self.parse_block();
        }

        if let Some(name) = self.match_identifier() {
            return match name.as_str() {
                "true" => Ok(Expr::Literal(Value::from(true))),
                "false" => Ok(Expr::Literal(Value::from(false))),
                "while" => self.parse_while_expression(),
                "do" => self.parse_do_while_expression(),
                "for" => self.parse_for_expression(),
                "if" => self.parse_if_expression(),
                "switch" => self.parse_switch_expression(),
                "function" => self.parse_function_definition(),
                "import" => self.parse_import_statement(),
                "break" => Ok(Expr::Break),
                "continue" => Ok(Expr::Continue),
                "return" => self.parse_return_statement(),
                "const" => {
                    let value = self.parse_expression()?;
                    Ok(Expr::Const(Box::new(value)))
                }
                _ if name.starts_with('@') => self.parse_native_call(name[1..].to_owned()),
                _ => Ok(self.resolve_identifier(name)),
            };
        }

        if let Some(token) = self.peek_at(0) {
            let kind = token.kind.clone();
            let lexeme = token.lexeme.clone();
            match kind {
                TokenKind::Integer(n) => {
                    self.current += 1;
                    return Ok(Expr::Literal(Value::from(n)));
                }
                TokenKind::Real(r) => {
                    self.current += 1;
                    return Ok(Expr::Literal(Value::from(r)));
                }
                TokenKind::Str => {
                    self.current += 1;
                    return Ok(Expr::Literal(Value::from(lexeme)));
                }
                TokenKind::Char => {
                    self.current += 1;
                    return match lexeme.bytes().next() {
                        Some(b) => Ok(Expr::Literal(Value::char_byte(b))),
                        None => Err(
                            ParseError::UnexpectedToken("empty char literal".to_owned()).into()
                        ),
                    };
                }
                _ => {}
            }
        }

        if self.match_punct("(") {
            let expr = self.parse_expression()?;
            self.expect_punct(")")?;
            return Ok(expr);
        }

        Err(ParseError::UnexpectedToken(self.found_here()).into())
    }

    // ----- compound constructs -------------------------------------------

    /// Statements after an already-consumed `{`.
    fn parse_block(&mut self) -> Result<Expr, Error> {
        if self.match_punct("}") {
            return Ok(Expr::Block(Vec::new()));
        }
        self.with_block_scope(|p| {
            let mut statements = Vec::new();
            loop {
                if p.current >= p.tokens.len() {
                    return Err(ParseError::ExpectedToken {
                        expected: "}",
                        found: "end of input".to_owned(),
                    }
                    .into());
                }
                statements.push(p.parse_expression()?);
                if p.match_punct("}") {
                    break;
                }
                p.match_punct(";");
                if p.match_punct("}") {
                    break;
                }
            }
            Ok(Expr::Block(statements))
        })
    }

    fn parse_while_expression(&mut self) -> Result<Expr, Error> {
        self.expect_punct("(")?;
        self.with_block_scope(|p| {
            let cond = p.parse_expression()?;
            p.expect_punct(")")?;
            let body = p.parse_expression()?;
            Ok(Expr::While {
                cond: Box::new(cond),
                body: Box::new(body),
            })
        })
    }

    fn parse_do_while_expression(&mut self) -> Result<Expr, Error> {
        self.with_block_scope(|p| {
            let body = p.parse_expression()?;
            if !p.match_keyword("while") {
                return Err(ParseError::ExpectedToken {
                    expected: "while after do-while body",
                    found: p.found_here(),
                }
                .into());
            }
            p.expect_punct("(")?;
            let cond = p.parse_expression()?;
            p.expect_punct(")")?;
            p.match_punct(";");
            Ok(Expr::DoWhile {
                body: Box::new(body),
                cond: Box::new(cond),
            })
        })
    }

    fn parse_for_expression(&mut self) -> Result<Expr, Error> {
        self.expect_punct("(")?;
        self.with_block_scope(|p| {
            let init = if p.match_punct(";") {
                None
            } else {
                let expr = p.parse_expression()?;
                p.expect_punct(";")?;
                Some(Box::new(expr))
            };
            let cond = if p.match_punct(";") {
                None
            } else {
                let expr = p.parse_expression()?;
                p.expect_punct(";")?;
                Some(Box::new(expr))
            };
            let update = if p.match_punct(")") {
                None
            } else {
                let expr = p.parse_expression()?;
                p.expect_punct(")")?;
                Some(Box::new(expr))
            };
            let body = p.parse_expression()?;
            Ok(Expr::For {
                init,
                cond,
                update,
                body: Box::new(body),
            })
        })
    }

    fn parse_if_expression(&mut self) -> Result<Expr, Error> {
        self.with_block_scope(|p| {
            let mut branches = vec![p.parse_if_branch()?];
            loop {
                if p.match_keyword("else") {
                    if p.match_keyword("if") {
                        branches.push(p.parse_if_branch()?);
                    } else {
                        let else_body = p.parse_expression()?;
                        return Ok(Expr::If {
                            branches,
                            else_branch: Some(Box::new(else_body)),
                        });
                    }
                } else {
                    return Ok(Expr::If {
                        branches,
                        else_branch: None,
                    });
                }
            }
        })
    }

    /// One `(condition) body` pair of an if/else-if chain. A `;`
    /// after the body is consumed so `else` can follow it.
    fn parse_if_branch(&mut self) -> Result<(Expr, Expr), Error> {
        self.expect_punct("(")?;
        let condition = self.parse_expression()?;
        self.expect_punct(")")?;
        let body = self.parse_expression()?;
        self.match_punct(";");
        Ok((condition, body))
    }

    fn parse_switch_expression(&mut self) -> Result<Expr, Error> {
        self.expect_punct("(")?;
        self.with_block_scope(|p| {
            let scrutinee = p.parse_expression()?;
            p.expect_punct(")")?;
            p.expect_punct("{")?;

            let mut cases = Vec::new();
            while p.match_keyword("case") {
                let key = p.parse_expression()?;
                p.expect_punct(":")?;
                let body = p.parse_expression()?;
                p.match_punct(";");
                cases.push((key, body));
            }

            let default = if p.match_keyword("default") {
                p.expect_punct(":")?;
                let body = p.parse_expression()?;
                p.match_punct(";");
                Some(Box::new(body))
            } else {
                None
            };

            p.expect_punct("}")?;
            Ok(Expr::Switch {
                scrutinee: Box::new(scrutinee),
                cases,
                default,
            })
        })
    }

    /// `function (params) body` after the `function` keyword, or
    /// `function name(params) body`, which desugars to
    /// `name = function (params) body`.
    fn parse_function_definition(&mut self) -> Result<Expr, Error> {
        if self.peek_at(0).is_some_and(|t| t.is_punct("(")) {
            return self.parse_lambda_expression();
        }
        let name = self.parse_primary()?;
        let lambda = self.parse_lambda_expression()?;
        Ok(Expr::Assign {
            target: Box::new(name),
            value: Box::new(lambda),
        })
    }

    fn parse_lambda_expression(&mut self) -> Result<Expr, Error> {
        self.expect_punct("(")?;

        self.fn_scopes.push(Scope::new());
        let result = self.parse_lambda_inner();
        self.fn_scopes.pop();
        result
    }

    fn parse_lambda_inner(&mut self) -> Result<Expr, Error> {
        let mut names = Vec::new();
        if !self.match_punct(")") {
            loop {
                match self.match_identifier() {
                    Some(name) => names.push(name),
                    None => {
                        return Err(ParseError::ExpectedToken {
                            expected: "identifier in parameter list",
                            found: self.found_here(),
                        }
                        .into());
                    }
                }
                if !self.match_punct(",") {
                    break;
                }
            }
            self.expect_punct(")")?;
        }

        let params: Vec<Param> = names
            .into_iter()
            .map(|name| {
                let slot = self.cur_scope_mut().add(&name);
                Param { name, slot }
            })
            .collect();

        let body = self.parse_expression()?;
        let locals_needed = self.fn_scopes.last().map_or(0, Scope::len);

        Ok(Expr::Lambda(Rc::new(FnProto {
            params,
            locals_needed,
            body,
        })))
    }

    /// `import NAME` or `import "NAME"`. The module is resolved right
    /// now; the emitted node just assigns the pre-built namespace
    /// value into a fresh slot bound to the module name.
    fn parse_import_statement(&mut self) -> Result<Expr, Error> {
        let name = match self.peek_at(0) {
            Some(token)
                if token.kind == TokenKind::Identifier || token.kind == TokenKind::Str =>
            {
                let name = token.lexeme.clone();
                self.current += 1;
                name
            }
            _ => {
                return Err(ParseError::ExpectedToken {
                    expected: "module name",
                    found: self.found_here(),
                }
                .into());
            }
        };

        let module = modules::resolve(&name)
            .ok_or_else(|| ParseError::ModuleNotFound(name.clone()))?;

        let scope_has = match self.fn_scopes.last() {
            Some(scope) => scope.find(&name).is_some(),
            None => self.top.find(&name).is_some(),
        };
        if scope_has {
            return Err(ParseError::DuplicateImport(name).into());
        }

        let global = self.fn_scopes.is_empty();
        let slot = self.cur_scope_mut().add(&name);
        Ok(Expr::Assign {
            target: Box::new(Expr::Identifier { name, slot, global }),
            value: Box::new(Expr::Literal(module)),
        })
    }

    fn parse_return_statement(&mut self) -> Result<Expr, Error> {
        let bare = match self.peek_at(0) {
            None => true,
            Some(token) => token.is_punct(";") || token.is_punct("}"),
        };
        if bare {
            return Ok(Expr::Return(None));
        }
        let value = self.parse_expression()?;
        Ok(Expr::Return(Some(Box::new(value))))
    }

    fn parse_native_call(&mut self, name: String) -> Result<Expr, Error> {
        self.expect_punct("(")?;
        let args = self.parse_call_arguments()?;
        Ok(Expr::NativeCall { name, args })
    }

    /// `[...]` literal body after the opening bracket. With no typed
    /// entries the literal is a pure array; any `key = value` entry
    /// turns it into a table.
    fn parse_bracket_literal(&mut self) -> Result<Expr, Error> {
        let mut keyed = Vec::new();
        let mut members = Vec::new();
        let mut elements = Vec::new();

        if self.match_punct("]") {
            return Ok(Expr::ArrayLit(elements));
        }

        loop {
            if self.match_punct("[") {
                // `[keys] = value` fans the inner array out over the
                // keyed submap; without `=` it is a nested array element
                let inner = self.parse_bracket_literal()?;
                if self.match_assignment("=") {
                    if !matches!(inner, Expr::ArrayLit(_)) {
                        return Err(ParseError::ExpectedToken {
                            expected: "array as table key",
                            found: "table literal".to_owned(),
                        }
                        .into());
                    }
                    let value = self.parse_expression()?;
                    keyed.push((inner, value));
                } else {
                    elements.push(inner);
                }
            } else if self.peek_at(0).map(|t| t.kind.clone()) == Some(TokenKind::Identifier)
                && self.peek_at(1).is_some_and(|t| t.is_assignment("="))
            {
                let name = self.tokens[self.current].lexeme.clone();
                self.current += 2;
                let value = self.parse_expression()?;
                members.push((name, value));
            } else {
                elements.push(self.parse_expression()?);
            }

            if !self.match_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;

        if keyed.is_empty() && members.is_empty() {
            Ok(Expr::ArrayLit(elements))
        } else {
            Ok(Expr::TableLit {
                keyed,
                members,
                elements,
            })
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Map a compound-assignment lexeme to its base operator.
fn compound_base(lexeme: &str) -> Option<BinOp> {
    match lexeme {
        "+=" => Some(BinOp::Add),
        "-=" => Some(BinOp::Sub),
        "*=" => Some(BinOp::Mul),
        "/=" => Some(BinOp::Div),
        "%=" => Some(BinOp::Rem),
        "&=" => Some(BinOp::BitAnd),
        "|=" => Some(BinOp::BitOr),
        "^=" => Some(BinOp::BitXor),
        "<<=" => Some(BinOp::Shl),
        ">>=" => Some(BinOp::Shr),
        _ => None,
    }
}

/// Convenience used by tests and simple embedders: lex and parse one
/// source fragment with a throwaway parser.
pub fn parse_source(source: &str) -> Result<Expr, Error> {
    let tokens = crate::lexer::tokenize(source)?;
    let mut parser = Parser::new();
    parser.reset(tokens);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::value::ValueData;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Expr {
        parse_source(source).unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"))
    }

    /// Unwrap the single statement of a parsed program.
    fn single(source: &str) -> Expr {
        match parse_ok(source) {
            Expr::Block(mut stmts) if stmts.len() == 1 => stmts.remove(0),
            other => panic!("expected one statement for {source:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_and_rejects() {
        let cases: Vec<(&str, bool)> = vec![
            ("a = 3 + 4 * (2 - 1) && true", true),
            ("a = while (!x) 1+1", true),
            ("for (i = 0; i < 10; i++) { i; }", true),
            ("for (; i < 10; i++) { i; i+=1 }", true),
            ("for (i = 0; ; i++) { i+=3 }", true),
            ("for (i = 0; i < 10; ) { i }", true),
            ("for(i=0; i<10; i++) { for(j=0; j<10; j++) {} }", true),
            ("*-i", true),
            (
                "if (x > 0) y = 1 else if (x < 0) y = -1 else y = 0",
                true,
            ),
            ("function (x, y) {x + y}", true),
            ("(function (x) x * x)(5)", true),
            ("add = function (a, b) a + b", true),
            ("function add(x, y) x + y", true),
            ("do { i = i + 1 } while (i < 3)", true),
            ("switch (x) { case 1: \"one\"; default: \"other\" }", true),
            ("import math", true),
            ("import \"math\"", true),
            ("t.a[0](1, 2)++", true),
            ("@print(\"Hello, World!\")", true),
            ("a = [1, 2, 3 + 4, 5 * 6]", true),
            ("b = [[1,2], [3,4], [5,6]]", true),
            ("t = [x = 1, y = 2, [10] = \"ten\"]", true),
            ("c = const 42", true),
            ("a = 1; b = 2; {c = 3; d = 4}; c = 5; e = 6", true),
            // rejects
            ("a = 3 + 4)", false),
            ("(1 + 2", false),
            ("a .", false),
            ("t[1", false),
            ("{ a = 1", false),
            ("function (x", false),
            ("for (i = 0 i < 10; i++) {}", false),
            ("do { x } until (x)", false),
            ("import nosuchmodule", false),
            ("f(1,", false),
            ("", true),
        ];

        for (i, (source, should_parse)) in cases.iter().enumerate() {
            let result = parse_source(source);
            assert_eq!(
                result.is_ok(),
                *should_parse,
                "case {}: {source:?} gave {result:?}",
                i + 1
            );
        }
    }

    #[test]
    fn test_precedence_shapes() {
        // multiplication binds tighter than addition
        match single("1 + 2 * 3") {
            Expr::Binary {
                op: BinOp::Add,
                right,
                ..
            } => {
                assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }

        // additive binds tighter than concatenation
        match single("a + b .. c") {
            Expr::Binary {
                op: BinOp::Concat,
                left,
                ..
            } => {
                assert!(matches!(*left, Expr::Binary { op: BinOp::Add, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }

        // assignment is right-associative
        match single("a = b = 1") {
            Expr::Assign { value, .. } => {
                assert!(matches!(*value, Expr::Assign { .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }

        // compound assignment strips the `=`
        match single("x += 2") {
            Expr::CompoundAssign { op, .. } => assert_eq!(op, BinOp::Add),
            other => panic!("unexpected shape: {other:?}"),
        }
        match single("x >>= 1") {
            Expr::CompoundAssign { op, .. } => assert_eq!(op, BinOp::Shr),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_slot_assignment_and_shadowing() {
        let mut parser = Parser::new();
        parser.reset(tokenize("a = 1; b = 2; {c = 3; d = 4}; c = 5; e = 6").unwrap());
        let program = parser.parse().unwrap();

        // collect identifier slots in statement order
        fn target_slot(expr: &Expr) -> usize {
            match expr {
                Expr::Assign { target, .. } => match **target {
                    Expr::Identifier { slot, .. } => slot,
                    ref other => panic!("unexpected target {other:?}"),
                },
                Expr::Block(stmts) => target_slot(&stmts[0]),
                other => panic!("unexpected statement {other:?}"),
            }
        }

        let Expr::Block(stmts) = program else {
            panic!("expected block");
        };
        assert_eq!(target_slot(&stmts[0]), 0); // a
        assert_eq!(target_slot(&stmts[1]), 1); // b
        let Expr::Block(inner) = &stmts[2] else {
            panic!("expected inner block");
        };
        assert_eq!(target_slot(&inner[0]), 2); // block-local c
        assert_eq!(target_slot(&inner[1]), 3); // block-local d
        // the block's `c` went out of visibility, so this is a new slot
        assert_eq!(target_slot(&stmts[3]), 4);
        assert_eq!(target_slot(&stmts[4]), 5); // e
        assert_eq!(parser.top_slots(), 6);
    }

    #[test]
    fn test_function_sugar_and_recursion_slots() {
        let mut parser = Parser::new();
        parser.reset(tokenize("f = function(n) { if (n < 2) n else f(n-1) + f(n-2) }").unwrap());
        let program = parser.parse().unwrap();

        let Expr::Block(stmts) = program else {
            panic!("expected block");
        };
        let Expr::Assign { target, value } = &stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Identifier { slot: f_slot, global: true, .. } = **target else {
            panic!("expected top-level identifier target");
        };
        let Expr::Lambda(proto) = &**value else {
            panic!("expected lambda");
        };
        assert_eq!(proto.params.len(), 1);
        assert_eq!(proto.params[0].slot, 0);
        assert_eq!(proto.locals_needed, 1);

        // the recursive reference resolves through the top-level slot
        fn find_global_ref(expr: &Expr, name: &str) -> Option<(usize, bool)> {
            match expr {
                Expr::Identifier {
                    name: n,
                    slot,
                    global,
                } if n == name => Some((*slot, *global)),
                Expr::Block(stmts) => stmts.iter().find_map(|s| find_global_ref(s, name)),
                Expr::If {
                    branches,
                    else_branch,
                } => branches
                    .iter()
                    .find_map(|(c, b)| {
                        find_global_ref(c, name).or_else(|| find_global_ref(b, name))
                    })
                    .or_else(|| {
                        else_branch.as_ref().and_then(|e| find_global_ref(e, name))
                    }),
                Expr::Binary { left, right, .. } => {
                    find_global_ref(left, name).or_else(|| find_global_ref(right, name))
                }
                Expr::Apply { callee, args } => find_global_ref(callee, name).or_else(|| {
                    args.iter().find_map(|a| find_global_ref(a, name))
                }),
                _ => None,
            }
        }
        let (slot, global) = find_global_ref(&proto.body, "f").expect("f reference");
        assert!(global, "recursive reference should resolve to top level");
        assert_eq!(slot, f_slot);
    }

    #[test]
    fn test_function_keyword_as_lambda() {
        match single("function (x) x") {
            Expr::Lambda(proto) => {
                assert_eq!(proto.params.len(), 1);
                assert_eq!(proto.locals_needed, 1);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_bracket_literals() {
        assert!(matches!(single("[]"), Expr::ArrayLit(ref v) if v.is_empty()));
        assert!(matches!(single("[1, 2, 3]"), Expr::ArrayLit(ref v) if v.len() == 3));
        // nested arrays stay arrays
        assert!(matches!(single("[[1,2],[3,4]]"), Expr::ArrayLit(ref v) if v.len() == 2));
        // bare identifier elements stay variable references
        match single("ns = [a, b]") {
            Expr::Assign { value, .. } => match *value {
                Expr::ArrayLit(ref v) => {
                    assert!(matches!(v[0], Expr::Identifier { .. }));
                }
                ref other => panic!("unexpected value {other:?}"),
            },
            other => panic!("unexpected shape: {other:?}"),
        }

        match single("[x = 1, y = 2, [10] = \"ten\", 99]") {
            Expr::TableLit {
                keyed,
                members,
                elements,
            } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].0, "x");
                assert_eq!(keyed.len(), 1);
                assert_eq!(elements.len(), 1);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_import_behavior() {
        // import resolves at parse time and binds an assignment
        let mut parser = Parser::new();
        parser.reset(tokenize("import math").unwrap());
        let program = parser.parse().unwrap();
        let Expr::Block(stmts) = program else {
            panic!("expected block");
        };
        match &stmts[0] {
            Expr::Assign { target, value } => {
                assert!(matches!(**target, Expr::Identifier { ref name, .. } if name == "math"));
                assert!(matches!(
                    **value,
                    Expr::Literal(Value {
                        data: ValueData::Table(_),
                        ..
                    })
                ));
            }
            other => panic!("unexpected import shape: {other:?}"),
        }

        // re-importing the same name in the same scope is an error
        parser.reset(tokenize("import math").unwrap());
        match parser.parse() {
            Err(Error::Parse(ParseError::DuplicateImport(name))) => assert_eq!(name, "math"),
            other => panic!("expected DuplicateImport, got {other:?}"),
        }

        // unknown modules fail at parse time
        match parse_source("import nosuch") {
            Err(Error::Parse(ParseError::ModuleNotFound(name))) => assert_eq!(name, "nosuch"),
            other => panic!("expected ModuleNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_register_top_level() {
        let mut parser = Parser::new();
        assert_eq!(parser.register_top_level("host_fn"), Ok(0));
        assert_eq!(
            parser.register_top_level("host_fn"),
            Err(ResolveError::IdentifierRedeclared("host_fn".to_owned()))
        );
        // scripts see the registered name at its slot
        parser.reset(tokenize("host_fn").unwrap());
        let Expr::Block(stmts) = parser.parse().unwrap() else {
            panic!("expected block");
        };
        assert!(matches!(
            stmts[0],
            Expr::Identifier {
                slot: 0,
                global: true,
                ..
            }
        ));
    }

    #[test]
    fn test_error_carries_lexeme() {
        match parse_source("a .") {
            Err(Error::Parse(ParseError::ExpectedToken { found, .. })) => {
                assert_eq!(found, "end of input");
            }
            other => panic!("unexpected result {other:?}"),
        }
        match parse_source("(1 + 2 ]") {
            Err(Error::Parse(ParseError::ExpectedToken { expected, found })) => {
                assert_eq!(expected, ")");
                assert_eq!(found, "token ']'");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}

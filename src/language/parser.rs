use crate::language::{
    ast::{ArithmeticOp, ComparisonOp, LogicalOp, Statement},
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    token::{Token, TokenKind},
};
use crate::runtime::value::{Class, Method};
use std::collections::HashMap;
use std::rc::Rc;

/// Parses a whole Mython program into the tree the interpreter consumes: a
/// root `Compound` whose `ClassDefinition` nodes carry fully built class
/// descriptors.
pub fn parse_program(source: &str) -> Result<Statement, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    classes: HashMap<String, Rc<Class>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            classes: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<Statement, SyntaxErrors> {
        let mut statements = Vec::new();
        while !self.is_eof() {
            if self.matches(TokenKind::Newline) {
                continue;
            }
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }
        if self.errors.is_empty() {
            Ok(Statement::Compound(statements))
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        if self.matches(TokenKind::Class) {
            return self.parse_class();
        }
        if self.matches(TokenKind::If) {
            return self.parse_if();
        }
        if self.matches(TokenKind::Print) {
            return self.parse_print();
        }
        if self.matches(TokenKind::Return) {
            return self.parse_return();
        }
        self.parse_simple()
    }

    fn parse_class(&mut self) -> Result<Statement, SyntaxError> {
        let name = self.expect_identifier("Expected class name")?;
        let parent = if self.matches(TokenKind::LParen) {
            let parent_name = self.expect_identifier("Expected base class name")?;
            self.expect(TokenKind::RParen, "Expected ')' after base class")?;
            match self.classes.get(&parent_name) {
                Some(class) => Some(Rc::clone(class)),
                None => {
                    return Err(self
                        .error_here(format!("Unknown base class `{parent_name}`"))
                        .with_help("Base classes must be declared before they are extended"));
                }
            }
        } else {
            None
        };
        self.expect(TokenKind::Colon, "Expected ':' after class header")?;
        self.expect(TokenKind::Newline, "Expected newline after class header")?;
        self.expect(TokenKind::Indent, "Expected an indented class body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_eof() {
            if self.matches(TokenKind::Newline) {
                continue;
            }
            self.expect(TokenKind::Def, "Expected `def` inside class body")?;
            methods.push(self.parse_method()?);
        }
        self.expect(TokenKind::Dedent, "Expected end of class body")?;
        let class = Class::new(name.clone(), methods, parent);
        self.classes.insert(name, Rc::clone(&class));
        Ok(Statement::ClassDefinition(class))
    }

    fn parse_method(&mut self) -> Result<Method, SyntaxError> {
        let name = self.expect_identifier("Expected method name")?;
        self.expect(TokenKind::LParen, "Expected '(' after method name")?;
        let receiver = self.expect_identifier("Expected `self` as the first parameter")?;
        if receiver != "self" {
            return Err(self.error_here("The first parameter of a method must be `self`"));
        }
        let mut formal_params = Vec::new();
        while self.matches(TokenKind::Comma) {
            formal_params.push(self.expect_identifier("Expected parameter name")?);
        }
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;
        self.expect(TokenKind::Colon, "Expected ':' after method signature")?;
        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Statement::method_body(body),
        })
    }

    fn parse_suite(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::Newline, "Expected newline before an indented block")?;
        self.expect(TokenKind::Indent, "Expected an indented block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_eof() {
            if self.matches(TokenKind::Newline) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent, "Expected end of block")?;
        Ok(Statement::Compound(statements))
    }

    fn parse_if(&mut self) -> Result<Statement, SyntaxError> {
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Colon, "Expected ':' after condition")?;
        let then_body = self.parse_suite()?;
        let else_body = if self.matches(TokenKind::Else) {
            self.expect(TokenKind::Colon, "Expected ':' after `else`")?;
            Some(self.parse_suite()?)
        } else {
            None
        };
        Ok(Statement::if_else(condition, then_body, else_body))
    }

    fn parse_print(&mut self) -> Result<Statement, SyntaxError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::Newline) && !self.is_eof() {
            loop {
                args.push(self.parse_expression()?);
                if self.matches(TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.end_of_line()?;
        Ok(Statement::Print(args))
    }

    fn parse_return(&mut self) -> Result<Statement, SyntaxError> {
        let value = if self.check(TokenKind::Newline) || self.is_eof() {
            Statement::NoneConst
        } else {
            self.parse_expression()?
        };
        self.end_of_line()?;
        Ok(Statement::returning(value))
    }

    fn parse_simple(&mut self) -> Result<Statement, SyntaxError> {
        let expr = self.parse_expression()?;
        let statement = if self.matches(TokenKind::Eq) {
            let value = self.parse_expression()?;
            match expr {
                Statement::Variable(mut path) => {
                    if path.len() == 1 {
                        let name = path.pop().unwrap_or_default();
                        Statement::assignment(name, value)
                    } else {
                        let field = path.pop().unwrap_or_default();
                        Statement::field_assignment(path, field, value)
                    }
                }
                _ => {
                    return Err(
                        self.error_here("Assignment target must be a variable or a field")
                    );
                }
            }
        } else {
            expr
        };
        self.end_of_line()?;
        Ok(statement)
    }

    fn parse_expression(&mut self) -> Result<Statement, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Statement, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.matches(TokenKind::Or) {
            let right = self.parse_and()?;
            left = Statement::logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Statement, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.matches(TokenKind::And) {
            let right = self.parse_not()?;
            left = Statement::logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Statement, SyntaxError> {
        if self.matches(TokenKind::Not) {
            let inner = self.parse_not()?;
            return Ok(Statement::logical_not(inner));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Statement, SyntaxError> {
        let left = self.parse_additive()?;
        let op = match self.current().kind {
            TokenKind::EqEq => ComparisonOp::Eq,
            TokenKind::BangEq => ComparisonOp::NotEq,
            TokenKind::Lt => ComparisonOp::Less,
            TokenKind::Gt => ComparisonOp::Greater,
            TokenKind::LtEq => ComparisonOp::LessEq,
            TokenKind::GtEq => ComparisonOp::GreaterEq,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Statement::comparison(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Statement, SyntaxError> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                ArithmeticOp::Add
            } else if self.matches(TokenKind::Minus) {
                ArithmeticOp::Sub
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = Statement::arithmetic(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Statement, SyntaxError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                ArithmeticOp::Mul
            } else if self.matches(TokenKind::Slash) {
                ArithmeticOp::Div
            } else {
                break;
            };
            let right = self.parse_factor()?;
            left = Statement::arithmetic(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Statement, SyntaxError> {
        if self.matches(TokenKind::Minus) {
            // unary minus desugars to subtraction from zero
            let inner = self.parse_factor()?;
            return Ok(Statement::arithmetic(
                ArithmeticOp::Sub,
                Statement::NumericConst(0),
                inner,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Statement, SyntaxError> {
        let mut expr = self.parse_atom()?;
        while self.matches(TokenKind::Dot) {
            let name = self.expect_identifier("Expected field or method name after '.'")?;
            if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                expr = Statement::method_call(expr, name, args);
            } else {
                match expr {
                    Statement::Variable(mut path) => {
                        path.push(name);
                        expr = Statement::Variable(path);
                    }
                    _ => {
                        return Err(self
                            .error_here("Fields can only be read through a named path")
                            .with_help(
                                "Bind the object to a variable first, or call a method on it",
                            ));
                    }
                }
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.matches(TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_atom(&mut self) -> Result<Statement, SyntaxError> {
        match self.current().kind.clone() {
            TokenKind::Number(value) => {
                self.pos += 1;
                Ok(Statement::NumericConst(value))
            }
            TokenKind::String(value) => {
                self.pos += 1;
                Ok(Statement::StringConst(value))
            }
            TokenKind::True => {
                self.pos += 1;
                Ok(Statement::BoolConst(true))
            }
            TokenKind::False => {
                self.pos += 1;
                Ok(Statement::BoolConst(false))
            }
            TokenKind::None => {
                self.pos += 1;
                Ok(Statement::NoneConst)
            }
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "Expected ')'")?;
                Ok(expr)
            }
            TokenKind::Identifier(name) => {
                self.pos += 1;
                if self.matches(TokenKind::LParen) {
                    let mut args = self.parse_arguments()?;
                    if name == "str" {
                        if args.len() != 1 {
                            return Err(self.error_here("`str` takes exactly one argument"));
                        }
                        let inner = args.pop().unwrap_or(Statement::NoneConst);
                        return Ok(Statement::stringify(inner));
                    }
                    match self.classes.get(&name) {
                        Some(class) => Ok(Statement::new_instance(Rc::clone(class), args)),
                        None => Err(self
                            .error_here(format!("Unknown class `{name}`"))
                            .with_help("Only classes and `str` can be called")),
                    }
                } else {
                    Ok(Statement::variable(name))
                }
            }
            _ => Err(self.error_here("Expected an expression")),
        }
    }

    fn end_of_line(&mut self) -> Result<(), SyntaxError> {
        if self.matches(TokenKind::Newline) || self.is_eof() {
            Ok(())
        } else {
            Err(self.error_here("Expected end of line"))
        }
    }

    fn current(&self) -> &Token {
        // the lexer always appends Eof, so the token list is never empty
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.current().kind == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.current().kind == kind {
            let token = self.current().clone();
            self.pos += 1;
            Ok(token)
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, SyntaxError> {
        if let TokenKind::Identifier(name) = &self.current().kind {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current().span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize(&mut self) {
        while !self.is_eof() {
            match self.current().kind {
                TokenKind::Newline | TokenKind::Dedent => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }
}

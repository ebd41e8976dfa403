use crate::error::{token_error, Error};
use crate::syntax::{Expr, ExprId, ExprKind, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

pub struct Parser<'t> {
    tokens: &'t Vec<Token>,
    current: usize,
    next_id: ExprId,
    pub had_error: bool,
}

macro_rules! matches {
    ( $sel:ident, $( $x:expr ),* ) => {
        {
            if $( $sel.check($x) )||* {
                $sel.advance();
                true
            } else {
                false
            }
        }
    };
}

impl<'t> Parser<'t> {
    /// `starting_id` lets a caller that parses several independent programs
    /// against one long-lived interpreter (the REPL) keep `ExprId`s unique
    /// across calls -- the resolver's side table lives on the interpreter
    /// and outlives any one `Parser`, so two unrelated expressions must
    /// never reuse an id.
    pub fn new(tokens: &'t Vec<Token>, starting_id: ExprId) -> Self {
        Self {
            tokens,
            current: 0,
            next_id: starting_id,
            had_error: false,
        }
    }

    /// The first id not used by this parse; pass it as the next call's
    /// `starting_id` to keep the sequence going.
    pub fn next_id(&self) -> ExprId {
        self.next_id
    }

    fn mk(&mut self, kind: ExprKind) -> Expr {
        let id = self.next_id;
        self.next_id += 1;
        Expr { id, kind }
    }

    // program        → declaration* EOF ;
    //
    // A statement that fails to parse is dropped rather than aborting the
    // whole parse: we synchronize to the next statement boundary and keep
    // going, so a single syntax error is reported alongside any others in
    // the same source instead of hiding them.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    // declaration    → classDecl | funDecl | varDecl | statement ;
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if matches!(self, TokenType::Var) {
            self.var_declaration()
        } else if matches!(self, TokenType::Class) {
            self.class_declaration()
        } else if matches!(self, TokenType::Fun) {
            self.named_function("function")
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(Error::Parse) => {
                self.synchronize();
                None
            }
            Err(_) => unreachable!("parser only ever produces Error::Parse"),
        }
    }

    // classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" ( "class"? function )* "}" ;
    //
    // A method prefixed with "class" is a class method — looked up when the
    // receiver of a `.` is the class object itself rather than an instance,
    // standing in for Lox's implicit metaclass.
    fn class_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if matches!(self, TokenType::Less) {
            let super_name = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(self.mk(ExprKind::Variable { name: super_name }))
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut class_methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if matches!(self, TokenType::Class) {
                class_methods.push(self.named_function("class method")?);
            } else {
                methods.push(self.named_function("method")?);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
        })
    }

    // Like most dynamically typed languages, fields are not explicitly listed
    // in the class declaration. Instances are loose bags of data and you can
    // freely add fields to them as you see fit using normal imperative code.

    // funDecl        → "fun" function ;
    // function       → IDENTIFIER "(" parameters? ")" block ;
    // parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
    fn named_function(&mut self, kind: &str) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        let function = self.function_body(kind)?;
        Ok(Stmt::Function { name, function })
    }

    // Parses the "(" parameters? ")" block" tail shared by named functions,
    // methods, and the anonymous `fun (...) { ... }` expression form.
    fn function_body(&mut self, kind: &str) -> Result<Expr, Error> {
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block()?;
        Ok(self.mk(ExprKind::Function { params, body }))
    }

    // statement      → exprStmt | printStmt | ifStmt | block | returnStmt | whileStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, Error> {
        if matches!(self, TokenType::For) {
            self.for_statement()
        } else if matches!(self, TokenType::If) {
            self.if_statement()
        } else if matches!(self, TokenType::Print) {
            self.print_statement()
        } else if matches!(self, TokenType::Return) {
            self.return_statement()
        } else if matches!(self, TokenType::While) {
            self.while_statement()
        } else if matches!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block {
                statements: self.block()?,
            })
        } else {
            self.expression_statement()
        }
    }

    // In Lox, the body of a function is a list of statements which don't
    // produce values, so we need dedicated syntax for emitting a result.
    // returnStmt     → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // the else is bound to the nearest if that precedes it
    // ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
    fn if_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if matches!(self, TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    // block          → "{" declaration* "}" ;
    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // whileStmt      → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    // forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
    //
    // Desugared straight into a `while` wrapped in a block: there's no
    // dedicated `For` node, `for` is just sugar the parser expands away.
    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches!(self, TokenType::Semicolon) {
            None
        } else if matches!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(incr) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expression: incr }],
            };
        }

        let condition = condition.unwrap_or_else(|| {
            self.mk(ExprKind::Literal {
                value: LiteralValue::Boolean(true),
            })
        });
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(init) = initializer {
            body = Stmt::Block {
                statements: vec![init, body],
            };
        }

        Ok(body)
    }

    // varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if matches!(self, TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // expression     → assignment ;
    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    // The trick is that the parser first processes the left side as if it
    // were an expression (r-value), then converts it to an assignment
    // target (l-value) if an "=" follows. This works because every valid
    // assignment target also happens to be valid syntax as a normal
    // expression.
    //
    // assignment     → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    fn assignment(&mut self) -> Result<Expr, Error> {
        let expr = self.logic_or()?;

        if matches!(self, TokenType::Equal) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);
            let expr_id = expr.id;

            return match expr.kind {
                ExprKind::Variable { name } => Ok(self.mk(ExprKind::Assign { name, value })),
                ExprKind::Get { object, name } => Ok(self.mk(ExprKind::Set {
                    object,
                    name,
                    value,
                })),
                kind => {
                    // Not throwing: the parser isn't in a confused state
                    // that needs panic-mode recovery, it just saw an
                    // invalid assignment target.
                    self.error(&equals, "Invalid assignment target.");
                    Ok(Expr { id: expr_id, kind })
                }
            };
        }

        Ok(expr)
    }

    // logic_or       → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logic_and()?;

        while matches!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.mk(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    // logic_and      → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;

        while matches!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.mk(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    // equality       → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;

        while matches!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = self.mk(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;

        while matches!(
            self,
            TokenType::GreaterEqual,
            TokenType::Greater,
            TokenType::LessEqual,
            TokenType::Less
        ) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = self.mk(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    // term           → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;

        while matches!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = self.mk(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // factor         → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;

        while matches!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = self.mk(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    // unary          → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.mk(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }

        self.call()
    }

    // call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = self.mk(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Only reporting, not throwing: the parser is still in
                    // a perfectly valid state, it just found too many args.
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(self.mk(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    // primary        → NUMBER | STRING | "true" | "false" | "nil"
    //                | "(" expression ")" | IDENTIFIER
    //                | "super" "." IDENTIFIER | "this"
    //                | "fun" "(" parameters? ")" block ;
    fn primary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::False) {
            return Ok(self.mk(ExprKind::Literal {
                value: LiteralValue::Boolean(false),
            }));
        }
        if matches!(self, TokenType::True) {
            return Ok(self.mk(ExprKind::Literal {
                value: LiteralValue::Boolean(true),
            }));
        }
        if matches!(self, TokenType::Nil) {
            return Ok(self.mk(ExprKind::Literal {
                value: LiteralValue::Nil,
            }));
        }
        if let TokenType::Number { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(self.mk(ExprKind::Literal {
                value: LiteralValue::Number(literal),
            }));
        }
        if let TokenType::String { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(self.mk(ExprKind::Literal {
                value: LiteralValue::String(literal),
            }));
        }
        if matches!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(self.mk(ExprKind::Super { keyword, method }));
        }
        if matches!(self, TokenType::This) {
            let keyword = self.previous().clone();
            return Ok(self.mk(ExprKind::This { keyword }));
        }
        if matches!(self, TokenType::Identifier) {
            let name = self.previous().clone();
            return Ok(self.mk(ExprKind::Variable { name }));
        }
        if matches!(self, TokenType::LeftParen) {
            let expression = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(self.mk(ExprKind::Grouping {
                expression: Box::new(expression),
            }));
        }
        if matches!(self, TokenType::Fun) {
            return self.function_body("anonymous function");
        }

        let token = self.peek().clone();
        Err(self.error(&token, "Expect expression."))
    }

    // printStmt      → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression: value })
    }

    // exprStmt       → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression: value })
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {
                    self.advance();
                }
            };
        }
    }

    // returns true if the current token is of the given type. Unlike
    // `advance`, it never consumes the token, it only looks at it.
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .expect("peek into end of token stream")
    }

    fn previous(&self) -> &Token {
        self.tokens
            .get(self.current - 1)
            .expect("previous was empty")
    }

    fn consume(&mut self, token_type: TokenType, msg: &str) -> Result<Token, Error> {
        if self.check(token_type) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error(&token, msg))
        }
    }

    fn error(&mut self, token: &Token, msg: &str) -> Error {
        self.had_error = true;
        token_error(token, msg);
        Error::Parse
    }
}

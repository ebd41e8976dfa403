use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::Error;
use crate::function::Function;
use crate::object::Object;
use crate::syntax::{Expr, ExprId, ExprKind, Stmt};
use crate::token::{Token, TokenType};

/// Walks the AST to completion, using the side table the resolver built to
/// turn a `Variable`/`Assign`/`This`/`Super` reference into a depth-addressed
/// environment lookup instead of a name search from globals down.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Object::Callable(Function::Native {
                name: "clock",
                arity: 0,
                body: Rc::new(|_args| {
                    let millis = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .expect("system clock is before the Unix epoch")
                        .as_millis();
                    Object::Number(millis as f64)
                }),
            }),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Called by the resolver as it walks the tree; poked directly rather
    /// than returned, since the resolver's only other output is diagnostics.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(())
            }

            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                println!("{value}");
                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Object::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
                Ok(())
            }

            Stmt::Block { statements } => {
                let block_env = Rc::new(RefCell::new(Environment::enclosed_by(&self.environment)));
                self.execute_block(statements, block_env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Object::Nil,
                };
                Err(Error::Return { value })
            }

            Stmt::Function { name, function } => {
                let callable = self.make_function(function, false);
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), Object::Callable(callable));
                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.execute_class(name, superclass, methods, class_methods),
        }
    }

    /// Executes `statements` in `environment`, then restores whatever
    /// environment was active before the call -- on every exit path,
    /// including an error or a `Return` unwind. Without the unconditional
    /// restore, an early `?` out of the loop below would leave `self`
    /// pointed at a dead block frame.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }
        self.environment = previous;
        result
    }

    fn make_function(&self, function_expr: &Expr, is_initializer: bool) -> Function {
        if let ExprKind::Function { params, body } = &function_expr.kind {
            Function::User {
                name: None,
                params: Rc::new(params.clone()),
                body: Rc::new(body.clone()),
                closure: Rc::clone(&self.environment),
                is_initializer,
            }
        } else {
            unreachable!("FunctionDecl/method always wraps an ExprKind::Function")
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: &Option<Expr>,
        methods: &[Stmt],
        class_methods: &[Stmt],
    ) -> Result<(), Error> {
        let superclass = match superclass_expr {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Object::Callable(Function::Class(class)) => Some(class),
                    _ => {
                        return Err(Error::Runtime {
                            token: name.clone(),
                            message: "Superclass must be a class.".to_string(),
                        });
                    }
                }
            }
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Nil);

        // `super` is bound in a synthetic scope enclosing the one the
        // methods themselves close over, then popped before the class's
        // own scope resumes.
        let previous_environment = if let Some(ref superclass) = superclass {
            let enclosing = Rc::clone(&self.environment);
            self.environment = Rc::new(RefCell::new(Environment::enclosed_by(&enclosing)));
            self.environment.borrow_mut().define(
                "super".to_string(),
                Object::Callable(Function::Class(Rc::clone(superclass))),
            );
            Some(enclosing)
        } else {
            None
        };

        let build_methods = |stmts: &[Stmt], interpreter: &Interpreter| {
            let mut map = HashMap::new();
            for stmt in stmts {
                if let Stmt::Function { name, function } = stmt {
                    let is_initializer = name.lexeme == "init";
                    map.insert(
                        name.lexeme.clone(),
                        interpreter.make_function(function, is_initializer),
                    );
                }
            }
            map
        };

        let method_map = build_methods(methods, self);
        let class_method_map = build_methods(class_methods, self);

        let class = Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: method_map,
            class_methods: class_method_map,
        });

        if let Some(enclosing) = previous_environment {
            self.environment = enclosing;
        }

        self.environment
            .borrow_mut()
            .assign(name, Object::Callable(Function::Class(class)))?;

        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Object, Error> {
        match &expr.kind {
            ExprKind::Literal { value } => Ok(literal_to_object(value)),

            ExprKind::Grouping { expression } => self.evaluate(expression),

            ExprKind::Variable { name } => self.lookup_variable(expr.id, name),

            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(&expr.id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, &name.lexeme, value.clone());
                    }
                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }
                Ok(value)
            }

            ExprKind::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.token_type {
                    TokenType::Minus => match right {
                        Object::Number(n) => Ok(Object::Number(-n)),
                        _ => Err(number_operand_error(operator)),
                    },
                    TokenType::Bang => Ok(Object::Boolean(!right.is_truthy())),
                    _ => unreachable!("unary operator grammar only admits '-' and '!'"),
                }
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;
                let left_truthy = left_value.is_truthy();
                if (operator.token_type == TokenType::Or) == left_truthy {
                    Ok(left_value)
                } else {
                    self.evaluate(right)
                }
            }

            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;
                let mut argument_values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                let function = match callee_value {
                    Object::Callable(f) => f,
                    _ => {
                        return Err(Error::Runtime {
                            token: paren.clone(),
                            message: "Can only call functions and classes.".to_string(),
                        })
                    }
                };

                if argument_values.len() != function.arity() {
                    return Err(Error::Runtime {
                        token: paren.clone(),
                        message: format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            argument_values.len()
                        ),
                    });
                }

                function.call(self, &argument_values)
            }

            ExprKind::Get { object, name } => {
                let object_value = self.evaluate(object)?;
                match object_value {
                    Object::Instance(instance) => instance.get(name),
                    Object::Callable(Function::Class(class)) => class
                        .find_class_method(&name.lexeme)
                        .map(|method| {
                            Object::Callable(method.bind(Object::Callable(Function::Class(
                                Rc::clone(&class),
                            ))))
                        })
                        .ok_or_else(|| Error::Runtime {
                            token: name.clone(),
                            message: format!("Undefined property '{}'.", name.lexeme),
                        }),
                    _ => Err(Error::Runtime {
                        token: name.clone(),
                        message: "Only instances have properties.".to_string(),
                    }),
                }
            }

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let object_value = self.evaluate(object)?;
                let instance = match object_value {
                    Object::Instance(instance) => instance,
                    _ => {
                        return Err(Error::Runtime {
                            token: name.clone(),
                            message: "Only instances have fields.".to_string(),
                        })
                    }
                };
                let value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            ExprKind::This { keyword } => self.lookup_variable(expr.id, keyword),

            ExprKind::Super { method, .. } => {
                let distance = *self
                    .locals
                    .get(&expr.id)
                    .expect("resolver always records a depth for 'super'");
                let superclass = match Environment::get_at(&self.environment, distance, "super") {
                    Object::Callable(Function::Class(class)) => class,
                    _ => unreachable!("resolver guarantees 'super' names a class"),
                };
                let instance = Environment::get_at(&self.environment, distance - 1, "this");

                superclass
                    .find_method(&method.lexeme)
                    .map(|m| Object::Callable(m.bind(instance)))
                    .ok_or_else(|| Error::Runtime {
                        token: method.clone(),
                        message: format!("Undefined property '{}'.", method.lexeme),
                    })
            }

            ExprKind::Function { .. } => Ok(Object::Callable(self.make_function(expr, false))),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a - b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::Slash => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a / b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::Star => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a * b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::Plus => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a + b)),
                (Object::String(a), Object::String(b)) => Ok(Object::String(a + &b)),
                _ => Err(Error::Runtime {
                    token: operator.clone(),
                    message: "Operands must be two numbers or two strings.".to_string(),
                }),
            },
            TokenType::Greater => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a > b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::GreaterEqual => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a >= b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::Less => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a < b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::LessEqual => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a <= b)),
                _ => Err(number_operands_error(operator)),
            },
            TokenType::BangEqual => Ok(Object::Boolean(!l.is_equal(&r))),
            TokenType::EqualEqual => Ok(Object::Boolean(l.is_equal(&r))),
            _ => unreachable!("binary operator grammar only admits arithmetic/comparison tokens"),
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Object, Error> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, &name.lexeme)),
            None => self.globals.borrow().get(name),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_to_object(value: &crate::syntax::LiteralValue) -> Object {
    use crate::syntax::LiteralValue;
    match value {
        LiteralValue::Number(n) => Object::Number(*n),
        LiteralValue::String(s) => Object::String(s.clone()),
        LiteralValue::Boolean(b) => Object::Boolean(*b),
        LiteralValue::Nil => Object::Nil,
    }
}

fn number_operand_error(operator: &Token) -> Error {
    Error::Runtime {
        token: operator.clone(),
        message: "Operand must be a number.".to_string(),
    }
}

fn number_operands_error(operator: &Token) -> Error {
    Error::Runtime {
        token: operator.clone(),
        message: "Operands must be numbers.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> Result<(), Error> {
        let mut scanner = Scanner::new(source.to_string());
        let tokens = scanner.scan_tokens().clone();
        let mut parser = Parser::new(&tokens, 0);
        let statements = parser.parse();
        assert!(!parser.had_error, "unexpected parse error in {source:?}");

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve_stmts(&statements);
        assert!(!resolver.had_error, "unexpected resolve error in {source:?}");

        interpreter.interpret(&statements)
    }

    #[test]
    fn arithmetic_and_print() {
        assert!(run("print 1 + 2;").is_ok());
    }

    #[test]
    fn closures_share_the_same_slot() {
        let source = "
            fun make(){ var i = 0; fun inc(){ i = i + 1; return i; } return inc; }
            var c = make();
            print c();
            print c();
            print c();
        ";
        assert!(run(source).is_ok());
    }

    #[test]
    fn resolver_pins_shadowed_global_read() {
        let source = "
            var a = \"global\";
            {
                fun show() { print a; }
                show();
                var a = \"block\";
                show();
            }
        ";
        assert!(run(source).is_ok());
    }

    #[test]
    fn classes_support_inheritance_and_super() {
        let source = "
            class B { init(n){ this.n = n; } }
            class C < B { init(n){ super.init(n); this.n = this.n + 1; } }
            print C(10).n;
        ";
        assert!(run(source).is_ok());
    }

    #[test]
    fn calling_a_string_is_a_runtime_error() {
        let err = run("var s = \"nope\"; s();").unwrap_err();
        match err {
            Error::Runtime { message, .. } => {
                assert_eq!(message, "Can only call functions and classes.")
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn adding_string_and_number_is_a_runtime_error() {
        let err = run("\"a\" + 1;").unwrap_err();
        match err {
            Error::Runtime { message, .. } => {
                assert_eq!(message, "Operands must be two numbers or two strings.")
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }
}

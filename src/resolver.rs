use std::collections::HashMap;
use std::mem;

use crate::error::token_error;
use crate::interpreter::Interpreter;
use crate::syntax::{Expr, ExprKind, Stmt};
use crate::token::Token;

// Much like we track scopes as we walk the tree, we track whether the code
// currently being visited is inside a function, and if so what kind -- an
// `init` method behaves differently from an ordinary method or function at
// a `return`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// A single static pass over the AST that resolves every variable reference
/// to a scope depth (or leaves it unresolved, meaning global) and pokes the
/// result directly into the interpreter's side table. No visitor trait:
/// each node kind is handled once, in one `match`, in each of
/// `resolve_expr`/`resolve_stmt`.
pub struct Resolver<'i> {
    interpreter: &'i mut Interpreter,
    // The scope stack is only used for local block scopes. Variables
    // declared at the top level in the global scope are not tracked here
    // since they are more dynamic in Lox. When resolving a variable, if we
    // can't find it in the stack of local scopes, we assume it is global.
    scopes: Vec<HashMap<String, bool>>,

    current_function: FunctionType,
    current_class: ClassType,

    pub had_error: bool,
}

impl<'i> Resolver<'i> {
    pub fn new(interpreter: &'i mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            had_error: false,
        }
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Declaration adds the variable to the innermost scope, marked "not
    // ready yet" (false), so that `var a = a;` inside a block can be caught:
    // the name exists but its initializer hasn't finished resolving.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.error(name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // Walk the scope stack from innermost to outermost. The first matching
    // scope wins and we stop there -- shadowing means the innermost
    // declaration is the one in effect, and looking past it would record
    // the wrong depth.
    fn resolve_local(&mut self, id: u32, name: &str) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.interpreter.resolve(id, i);
                return;
            }
        }
        // Not found in any local scope: treat as global, nothing to record.
    }

    // Creates a new scope for the body, binds the parameters in it, then
    // resolves the body in that scope. Unlike the interpreter, which only
    // touches a function body when it's called, static analysis walks into
    // the body immediately.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        token_error(token, message);
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal { .. } => {}

            ExprKind::Variable { name } => {
                // Reading a local variable inside its own initializer: the
                // name exists in the innermost scope but is marked "not
                // defined yet".
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(expr.id, &name.lexeme);
            }

            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, &name.lexeme);
            }

            ExprKind::Unary { right, .. } => self.resolve_expr(right),

            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            ExprKind::Grouping { expression } => self.resolve_expr(expression),

            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            // The property name itself is dynamic -- only the object
            // expression needs resolving.
            ExprKind::Get { object, .. } => self.resolve_expr(object),

            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            ExprKind::This { keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(expr.id, &keyword.lexeme);
            }

            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(expr.id, &keyword.lexeme);
            }

            ExprKind::Function { params, body } => {
                self.resolve_function(params, body, FunctionType::Function);
            }
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            // Whenever a `this` expression is encountered inside a method,
            // it resolves to a "local variable" defined in an implicit
            // scope just outside the method body block.
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                if let Some(superclass_expr) = superclass {
                    if let ExprKind::Variable {
                        name: superclass_name,
                    } = &superclass_expr.kind
                    {
                        if superclass_name.lexeme == name.lexeme {
                            self.error(superclass_name, "A class can't inherit from itself.");
                        }
                    }
                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    self.begin_scope();
                    self.scopes
                        .last_mut()
                        .expect("scope just pushed")
                        .insert("super".to_owned(), true);
                }

                self.begin_scope();
                self.scopes
                    .last_mut()
                    .expect("scope just pushed")
                    .insert("this".to_owned(), true);

                for method in methods {
                    if let Stmt::Function { name, function } = method {
                        let kind = if name.lexeme == "init" {
                            FunctionType::Initializer
                        } else {
                            FunctionType::Method
                        };
                        if let ExprKind::Function { params, body } = &function.kind {
                            self.resolve_function(params, body, kind);
                        }
                    }
                }

                // Class methods share the same `this` scope as instance
                // methods; at the call site `this` is bound to the class
                // object itself rather than an instance (see
                // `Function::bind` and the `ExprKind::Get` class-method arm
                // in interpreter.rs).
                for class_method in class_methods {
                    if let Stmt::Function { function, .. } = class_method {
                        if let ExprKind::Function { params, body } = &function.kind {
                            self.resolve_function(params, body, FunctionType::Method);
                        }
                    }
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }

            Stmt::Expression { expression } => self.resolve_expr(expression),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_stmt) = else_branch {
                    self.resolve_stmt(else_stmt);
                }
            }

            Stmt::Print { expression } => self.resolve_expr(expression),

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(return_value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(return_value);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            // Split into declare then define, in that order, to handle
            // edge cases like `var a = "outer"; { var a = a; }`.
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }

            // Declare and define the function's name eagerly, before
            // resolving its body, so it can recursively refer to itself.
            Stmt::Function { name, function } => {
                self.declare(name);
                self.define(name);
                if let ExprKind::Function { params, body } = &function.kind {
                    self.resolve_function(params, body, FunctionType::Function);
                }
            }
        }
    }
}

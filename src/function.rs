use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::Stmt;
use crate::token::Token;

/// Anything Lox can call: a host-implemented primitive, a user-defined
/// function or method (including bound methods and anonymous `fun`
/// expressions), or a class — calling a class constructs an instance.
#[derive(Clone)]
pub enum Function {
    /// A primitive exposed to Lox code but implemented in Rust. `clock` is
    /// the only one this crate defines; the `Rc<dyn Fn>` indirection exists
    /// so more could be registered without inventing a new enum variant per
    /// primitive.
    Native {
        name: &'static str,
        arity: usize,
        body: Rc<dyn Fn(&[Object]) -> Object>,
    },

    /// A user-defined function, method, or anonymous `fun` expression.
    /// `name` is `None` for anonymous functions (used only for display).
    /// `is_initializer` is set for methods named `init`, so that calling
    /// one always yields `this` regardless of what it `return`s.
    User {
        name: Option<Token>,
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },

    /// A class, callable to construct instances of itself.
    Class(Rc<LoxClass>),
}

impl Function {
    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { params, .. } => params.len(),
            Function::Class(class) => class
                .find_method("init")
                .map(|init| init.arity())
                .unwrap_or(0),
        }
    }

    /// Invokes the callable. The caller checks arity before calling this —
    /// it trusts `arguments.len() == self.arity()`.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Object]) -> Result<Object, Error> {
        match self {
            Function::Native { body, .. } => Ok(body(arguments)),

            Function::User {
                params,
                body,
                closure,
                is_initializer,
                ..
            } => {
                // Each call gets its own environment, enclosed by the
                // closure captured when the function was declared. Without
                // a fresh environment per call, recursive and re-entrant
                // calls to the same function would trample each other's
                // locals.
                let environment = Rc::new(RefCell::new(Environment::enclosed_by(closure)));
                for (param, argument) in params.iter().zip(arguments.iter()) {
                    environment
                        .borrow_mut()
                        .define(param.lexeme.clone(), argument.clone());
                }

                match interpreter.execute_block(body, environment) {
                    Err(Error::Return { value }) => {
                        if *is_initializer {
                            Ok(Environment::get_at(closure, 0, "this"))
                        } else {
                            Ok(value)
                        }
                    }
                    Err(other) => Err(other),
                    Ok(()) if *is_initializer => Ok(Environment::get_at(closure, 0, "this")),
                    Ok(()) => Ok(Object::Nil),
                }
            }

            Function::Class(class) => {
                let instance = Rc::new(crate::class::LoxInstance::new(class));
                if let Some(initializer) = class.find_method("init") {
                    initializer
                        .bind(Object::Instance(Rc::clone(&instance)))
                        .call(interpreter, arguments)?;
                }
                Ok(Object::Instance(instance))
            }
        }
    }

    /// Produces a fresh function value whose closure is a new environment,
    /// enclosing the method's original closure, with `this` bound to
    /// `instance`. This is what turns `object.method` into a value that
    /// remembers which object it was fetched from.
    pub fn bind(&self, instance: Object) -> Function {
        match self {
            Function::User {
                name,
                params,
                body,
                closure,
                is_initializer,
            } => {
                let environment = Rc::new(RefCell::new(Environment::enclosed_by(closure)));
                environment
                    .borrow_mut()
                    .define("this".to_string(), instance);
                Function::User {
                    name: name.clone(),
                    params: Rc::clone(params),
                    body: Rc::clone(body),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
            Function::Native { .. } | Function::Class(_) => {
                unreachable!("only user functions and methods are bound to an instance")
            }
        }
    }

    pub fn identity_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native { body: a, .. }, Function::Native { body: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            (Function::User { closure: a, .. }, Function::User { closure: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            (Function::Class(a), Function::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { name, .. } => write!(f, "<native fn {name}>"),
            Function::User { name: Some(n), .. } => write!(f, "<fn {}>", n.lexeme),
            Function::User { name: None, .. } => write!(f, "<fn>"),
            Function::Class(class) => write!(f, "{}", class.name),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

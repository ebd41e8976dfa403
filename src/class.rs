use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use crate::function::Function;
use crate::object::Object;
use crate::token::Token;

/// A class: its instance methods, and — standing in for an implicit
/// metaclass — a second map of "class methods" looked up when the receiver
/// of a `.` is the class object itself (`Shape.describe()` rather than
/// `shape.describe()`). Both maps are searched up the superclass chain.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Function>,
    pub class_methods: HashMap<String, Function>,
}

impl LoxClass {
    pub fn find_method(&self, name: &str) -> Option<Function> {
        self.methods
            .get(name)
            .cloned()
            .or_else(|| self.superclass.as_ref()?.find_method(name))
    }

    pub fn find_class_method(&self, name: &str) -> Option<Function> {
        self.class_methods
            .get(name)
            .cloned()
            .or_else(|| self.superclass.as_ref()?.find_class_method(name))
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An instance's state: a reference to its class plus a field map. Fields
/// shadow methods on lookup, and assignment always writes a field — Lox
/// instances are loose bags of data, not statically shaped records.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Object>>,
}

impl LoxInstance {
    pub fn new(class: &Rc<LoxClass>) -> Self {
        LoxInstance {
            class: Rc::clone(class),
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(self: &Rc<Self>, name: &Token) -> Result<Object, Error> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = self.class.find_method(&name.lexeme) {
            return Ok(Object::Callable(
                method.bind(Object::Instance(Rc::clone(self))),
            ));
        }

        Err(Error::Runtime {
            token: name.clone(),
            message: format!("Undefined property '{}'.", name.lexeme),
        })
    }

    pub fn set(&self, name: &Token, value: Object) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

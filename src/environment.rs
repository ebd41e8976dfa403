use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{error::Error, object::Object, token::Token};

/// One frame of the lexical scope chain. Globals are the root frame
/// (`enclosing: None`); every block, function call, and method invocation
/// gets its own frame enclosing the one active when it started.
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>, // Parent-pointer
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn enclosed_by(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    /// Unconditional write to this frame. On globals this may overwrite an
    /// existing binding (Lox permits redeclaring globals); on inner frames
    /// the resolver statically rejects duplicate declarations before this
    /// is ever called with a colliding name.
    pub fn define(&mut self, name: String, value: Object) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Object, Error> {
        let key = &*name.lexeme;
        if let Some(value) = self.values.get(key) {
            Ok((*value).clone())
        } else if let Some(ref enclosing) = self.enclosing {
            // It's probably faster to iteratively walk the chain, but
            // recursion reads better and the depth is bounded by lexical
            // nesting, never by attacker-controlled input.
            enclosing.borrow().get(name)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), Error> {
        let key = &*name.lexeme;
        if self.values.contains_key(key) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    /// Walks exactly `distance` frames outward from `env`. The resolver
    /// guarantees the target frame exists for every depth it records, so
    /// `get_at`/`assign_at` never need to handle a missing ancestor.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = Rc::clone(
                current
                    .borrow()
                    .enclosing
                    .as_ref()
                    .expect("resolver-recorded depth exceeds the live environment chain"),
            );
            current = next;
        }
        current
    }

    /// Reads `name` directly out of the frame `distance` scopes up, with no
    /// further chain walk. The resolver guarantees the slot exists there.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Object {
        Self::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolver guaranteed '{name}' at depth {distance}"))
    }

    pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str, value: Object) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{KloxError, Result};
use crate::token::Token;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Assignment never auto-creates a binding.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Read `name` exactly `distance` parent links up the chain.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value> {
        if distance == 0 {
            self.values
                .get(&name.lexeme)
                .cloned()
                .ok_or_else(|| undefined(name))
        } else {
            self.enclosing
                .as_ref()
                .expect("scope chain shorter than resolved depth")
                .borrow()
                .get_at(distance - 1, name)
        }
    }

    /// Write `name` exactly `distance` parent links up the chain.
    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Value) -> Result<()> {
        if distance == 0 {
            if self.values.contains_key(&name.lexeme) {
                self.values.insert(name.lexeme.clone(), value);
                Ok(())
            } else {
                Err(undefined(name))
            }
        } else {
            self.enclosing
                .as_ref()
                .expect("scope chain shorter than resolved depth")
                .borrow_mut()
                .assign_at(distance - 1, name, value)
        }
    }
}

fn undefined(name: &Token) -> KloxError {
    KloxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

//! Tree-walking evaluator.
//!
//! Statement execution returns `Result<(), Unwind>`: `break`, `continue` and
//! `return` travel as `Err` values just like runtime errors do, so the `?`
//! operator unwinds all of them through nested statements for free.  The
//! difference is who consumes them: `While` absorbs `Break`/`Continue`, a
//! function call absorbs `Return`, and only `Unwind::Error` is allowed to
//! reach `interpret`, where it becomes an ordinary crate error for the
//! driver.  Environments are restored on every exit path, normal or not.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{KloxError, Result};
use crate::token::{Token, TokenType};
use crate::value::{Function, NativeFn, Value};

/// Non-local control transfer.  `Break`, `Continue` and `Return` are not
/// errors; they are consumed by the enclosing loop or call and must never
/// surface at the top level of a well-formed program.
#[derive(Debug)]
pub enum Unwind {
    Break,
    Continue,
    Return(Value),
    Error(KloxError),
}

impl From<KloxError> for Unwind {
    fn from(err: KloxError) -> Self {
        Unwind::Error(err)
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Binding distances published by the resolver, keyed by expression id.
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
    repl_echo: bool,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Route `print` (and REPL echo) into the given sink.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(NativeFn {
                name: "clock",
                arity: 0,
                func: clock_native,
            }),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            out,
            repl_echo: false,
        }
    }

    /// In REPL mode bare expression statements echo their value.
    pub fn set_repl_echo(&mut self, on: bool) {
        self.repl_echo = on;
    }

    /// Resolver callback: `id` binds `depth` parent links up from the
    /// environment current at evaluation time.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for statement in statements {
            if let Err(unwind) = self.execute(statement) {
                match unwind {
                    Unwind::Error(err) => return Err(err),
                    _ => unreachable!("control-flow signal escaped to the top level"),
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> std::result::Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                let value = self.evaluate(expr)?;

                if self.repl_echo {
                    self.write_line(&value)?;
                }

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                self.write_line(&value)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body) {
                        Ok(()) => {}
                        Err(Unwind::Break) => break,
                        Err(Unwind::Continue) => continue,
                        Err(other) => return Err(other),
                    }
                }

                Ok(())
            }

            Stmt::Break(_) => Err(Unwind::Break),

            Stmt::Continue(_) => Err(Unwind::Continue),

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining function '{}'", name.lexeme);

                let function = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    closure: self.environment.clone(),
                }));

                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, function);

                Ok(())
            }
        }
    }

    /// Run `statements` inside `env`, restoring the previous environment on
    /// every exit path, including non-local unwinds.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> std::result::Result<(), Unwind> {
        let previous = mem::replace(&mut self.environment, env);

        let result = statements.iter().try_for_each(|s| self.execute(s));

        self.environment = previous;

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> std::result::Result<Value, Unwind> {
        match expr {
            Expr::Literal(literal) => Ok(literal_to_value(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;
                let truthy = is_truthy(&left_val);

                match operator.token_type {
                    TokenType::OR if truthy => Ok(left_val),
                    TokenType::AND if !truthy => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => Ok(self.look_up_variable(name, *id)?),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    self.environment
                        .borrow_mut()
                        .assign_at(distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
                ..
            } => self.evaluate_call(callee, paren, arguments),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Unwind> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(KloxError::runtime(operator, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => unreachable!("invalid unary operator"),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Unwind> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                // A string on the left stringifies whatever is on the right.
                (Value::String(l), r) => Ok(Value::String(format!("{}{}", l, r))),

                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),

                _ => Err(KloxError::runtime(
                    operator,
                    "Operands must be two strings or two numbers.",
                )
                .into()),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(_), Value::Number(r)) if r == 0.0 => Err(KloxError::runtime(
                    operator,
                    "It looks like you tried division by 0. Yeah better don't try this at home.",
                )
                .into()),

                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l / r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Bool(l > r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Bool(l >= r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Bool(l < r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Bool(l <= r)),

                _ => Err(numbers_expected(operator)),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => unreachable!("invalid binary operator"),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> std::result::Result<Value, Unwind> {
        let callee_val: Value = self.evaluate(callee)?;

        let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        match callee_val {
            Value::Native(native) => {
                if args.len() != native.arity {
                    return Err(arity_mismatch(paren, native.arity, args.len()));
                }

                debug!("Calling native '{}'", native.name);

                (native.func)(&args).map_err(|msg| KloxError::runtime(paren, msg).into())
            }

            Value::Function(function) => {
                if args.len() != function.arity() {
                    return Err(arity_mismatch(paren, function.arity(), args.len()));
                }

                debug!("Calling function '{}'", function.name.lexeme);

                self.call_function(&function, args)
            }

            _ => Err(KloxError::runtime(paren, "Can only call functions and classes.").into()),
        }
    }

    /// Invoke a user function: fresh environment under the captured closure,
    /// parameters bound, body run as a block.  A `Return` unwind stops here;
    /// falling off the end yields `nil`.
    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
    ) -> std::result::Result<Value, Unwind> {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            function.closure.clone(),
        )));

        for (param, arg) in function.params.iter().zip(args) {
            env.borrow_mut().define(&param.lexeme, arg);
        }

        match self.execute_block(&function.body, env) {
            Ok(()) => Ok(Value::Nil),
            Err(Unwind::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        if let Some(&distance) = self.locals.get(&id) {
            self.environment.borrow().get_at(distance, name)
        } else {
            self.globals.borrow().get(name)
        }
    }

    fn write_line(&mut self, value: &Value) -> std::result::Result<(), Unwind> {
        writeln!(self.out, "{}", value).map_err(|e| Unwind::Error(KloxError::Io(e)))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn numbers_expected(operator: &Token) -> Unwind {
    KloxError::runtime(operator, "Operands must be numbers.").into()
}

fn arity_mismatch(paren: &Token, expected: usize, got: usize) -> Unwind {
    KloxError::runtime(
        paren,
        format!("Expected {} arguments but got {}.", expected, got),
    )
    .into()
}

fn literal_to_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Nil => Value::Nil,
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::String(s.clone()),
    }
}

/// The one truthiness predicate: `nil` and `false` are falsey, everything
/// else (including `0` and `""`) is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

/// The one equality predicate; `==`/`!=` both route through here.
fn is_equal(left: &Value, right: &Value) -> bool {
    left == right
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

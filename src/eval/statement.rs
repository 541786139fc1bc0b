use std::rc::Rc;
use std::sync::Arc;

use super::context::ExecutionContext;
use super::evaluator::Runtime;
use super::value::{Closure, Key, Value};
use crate::ast::{Attribute, Block, Expression, Location, Statement};
use crate::error::{DslError, Error, Result, SourceLocation};
use crate::parser::Syntax;

/// How a block finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break(Location),
    Return(Vec<Value>),
}

impl Runtime<'_> {
    /// Run `block` in `context` without opening a new scope.
    pub(crate) fn exec_block(
        &mut self,
        block: &Block,
        context: &ExecutionContext,
    ) -> Result<Flow> {
        for statement in &block.statements {
            match self.exec_statement(statement, context)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        context: &ExecutionContext,
    ) -> Result<Flow> {
        match statement {
            Statement::Local {
                names,
                attributes,
                values,
                ..
            } => {
                let values = self.eval_list(values, names.len(), context)?;
                for (i, (name, value)) in names.iter().zip(values).enumerate() {
                    match attributes.get(i).copied().flatten() {
                        Some(Attribute::Const) => context.scope.declare_const(name.clone(), value),
                        None => context.scope.declare(name.clone(), value),
                    }
                }
            }
            Statement::LocalFunction { name, function, .. } => {
                // declared first so the body can call itself
                context.scope.declare(name.clone(), Value::Nil);
                let closure = Closure {
                    body: Rc::clone(function),
                    scope: Rc::clone(&context.scope),
                    file: Arc::clone(&context.file),
                };
                context
                    .scope
                    .declare(name.clone(), Value::Function(Rc::new(closure)));
            }
            Statement::Assign {
                targets, values, ..
            } => {
                let values = self.eval_list(values, targets.len(), context)?;
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, context)?;
                }
            }
            Statement::Expression(expression) => {
                self.eval_expression(expression, context)?;
            }
            Statement::If {
                branches,
                else_block,
            } => {
                for (condition, block) in branches {
                    let value = self.eval_expression(condition, context)?;
                    if self.truthy(&value) {
                        return self.exec_block(block, &context.child());
                    }
                }
                if let Some(block) = else_block {
                    return self.exec_block(block, &context.child());
                }
            }
            Statement::While { condition, body } => loop {
                let value = self.eval_expression(condition, context)?;
                if !self.truthy(&value) {
                    break;
                }
                match self.exec_block(body, &context.child())? {
                    Flow::Normal => {}
                    Flow::Break(_) => break,
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            },
            Statement::NumericFor {
                variable,
                start,
                end,
                step,
                body,
                location,
            } => {
                let at = context.at(*location);
                let start = self.eval_expression(start, context)?;
                let end = self.eval_expression(end, context)?;
                let step = match step {
                    Some(step) => self.eval_expression(step, context)?,
                    None => Value::Integer(1),
                };
                match (start, end, step) {
                    (Value::Integer(start), Value::Integer(end), Value::Integer(step)) => {
                        if step == 0 {
                            return Err(DslError::runtime("'for' step is zero", &at).into());
                        }
                        let mut i = start;
                        while (step > 0 && i <= end) || (step < 0 && i >= end) {
                            let value = Value::Integer(i);
                            match self.exec_loop_body(body, variable, value, context)? {
                                Flow::Normal => {}
                                Flow::Break(_) => break,
                                flow => return Ok(flow),
                            }
                            i = match i.checked_add(step) {
                                Some(next) => next,
                                None => break,
                            };
                        }
                    }
                    (start, end, step) => {
                        let (Some(start), Some(end), Some(step)) =
                            (start.as_number(), end.as_number(), step.as_number())
                        else {
                            let message = "'for' bounds must be numbers";
                            return Err(DslError::runtime(message, &at).into());
                        };
                        if step == 0.0 {
                            return Err(DslError::runtime("'for' step is zero", &at).into());
                        }
                        let mut i = start;
                        while (step > 0.0 && i <= end) || (step < 0.0 && i >= end) {
                            match self.exec_loop_body(body, variable, Value::Float(i), context)? {
                                Flow::Normal => {}
                                Flow::Break(_) => break,
                                flow => return Ok(flow),
                            }
                            i += step;
                        }
                    }
                }
            }
            Statement::ForEach {
                variables,
                iterable,
                body,
                location,
            } => {
                let at = context.at(*location);
                let mut iterable = self.eval_values(iterable, context)?.into_iter();
                let pairs = match iterable.next().unwrap_or_default() {
                    Value::Iterator(pairs) => pairs.as_ref().clone(),
                    function @ (Value::Function(_) | Value::Builtin(_)) => {
                        let state = iterable.next().unwrap_or_default();
                        let control = iterable.next().unwrap_or_default();
                        let iterator = (function, state, control);
                        return self.exec_iterator(iterator, variables, body, context, &at);
                    }
                    Value::Table(table) if self.syntax == Syntax::JavaScript => table
                        .borrow()
                        .sequence()
                        .into_iter()
                        .map(|value| (value, Value::Nil))
                        .collect(),
                    Value::Reference(unbound) => {
                        return Err(DslError::UnresolvedReference {
                            name: unbound.name.clone(),
                            location: unbound.location.clone(),
                        }
                        .into())
                    }
                    other => {
                        return Err(DslError::runtime(
                            format!("attempt to iterate over a {} value", other.kind()),
                            &at,
                        )
                        .into())
                    }
                };
                for (first, second) in pairs {
                    let scope = context.child();
                    let mut values = [first, second].into_iter();
                    for name in variables {
                        scope.scope.declare(name.clone(), values.next().unwrap_or_default());
                    }
                    match self.exec_block(body, &scope)? {
                        Flow::Normal => {}
                        Flow::Break(_) => break,
                        flow => return Ok(flow),
                    }
                }
            }
            Statement::Do(block) => return self.exec_block(block, &context.child()),
            Statement::Return(values, _) => {
                let values = self.eval_values(values, context)?;
                return Ok(Flow::Return(values));
            }
            Statement::Break(location) => return Ok(Flow::Break(*location)),
        }
        Ok(Flow::Normal)
    }

    fn exec_loop_body(
        &mut self,
        body: &Block,
        variable: &str,
        value: Value,
        context: &ExecutionContext,
    ) -> Result<Flow> {
        let scope = context.child();
        scope.scope.declare(variable, value);
        self.exec_block(body, &scope)
    }

    /// Generic `for` over an iterator function: call `function(state, control)`
    /// until its first result is nil.
    fn exec_iterator(
        &mut self,
        (function, state, mut control): (Value, Value, Value),
        variables: &[String],
        body: &Block,
        context: &ExecutionContext,
        at: &SourceLocation,
    ) -> Result<Flow> {
        loop {
            let results = self.call_value(function.clone(), vec![state.clone(), control], at)?;
            let first = results.first().cloned().unwrap_or_default();
            if first.is_nil() {
                return Ok(Flow::Normal);
            }
            control = first;
            let scope = context.child();
            let mut results = results.into_iter();
            for name in variables {
                scope.scope.declare(name.clone(), results.next().unwrap_or_default());
            }
            match self.exec_block(body, &scope)? {
                Flow::Normal => {}
                Flow::Break(_) => return Ok(Flow::Normal),
                flow => return Ok(flow),
            }
        }
    }

    /// Evaluate expressions left to right, padding with nil up to `count`.
    fn eval_list(
        &mut self,
        expressions: &[Expression],
        count: usize,
        context: &ExecutionContext,
    ) -> Result<Vec<Value>> {
        let mut values = self.eval_values(expressions, context)?;
        values.resize(count, Value::Nil);
        Ok(values)
    }

    fn assign(
        &mut self,
        target: &Expression,
        value: Value,
        context: &ExecutionContext,
    ) -> Result<()> {
        match target {
            Expression::Name(name, location) => {
                if context.scope.assign(name, value) {
                    return Ok(());
                }
                Err(DslError::runtime(
                    format!("attempt to assign to const variable '{}'", name),
                    &context.at(*location),
                )
                .into())
            }
            Expression::Index {
                target,
                key,
                location,
            } => {
                let at = context.at(*location);
                let container = self.eval_expression(target, context)?;
                let key = self.eval_expression(key, context)?;
                match container {
                    Value::Table(table) => {
                        let Some(key) = Key::from_value(&key) else {
                            return Err(DslError::runtime(
                                format!("invalid table key of type {}", key.kind()),
                                &at,
                            )
                            .into());
                        };
                        table.borrow_mut().set(key, value);
                        Ok(())
                    }
                    Value::Reference(unbound) => Err(Error::Dsl(DslError::UnresolvedReference {
                        name: unbound.name.clone(),
                        location: unbound.location.clone(),
                    })),
                    other => Err(DslError::runtime(
                        format!("attempt to index a {} value", other.kind()),
                        &at,
                    )
                    .into()),
                }
            }
            other => Err(DslError::runtime(
                "cannot assign to this expression",
                &context.at(other.location().unwrap_or_default()),
            )
            .into()),
        }
    }

    /// Dialect truthiness: JavaScript also treats `0`, `NaN` and `""` as false.
    pub(crate) fn truthy(&self, value: &Value) -> bool {
        match (self.syntax, value) {
            (Syntax::JavaScript, Value::Integer(0)) => false,
            (Syntax::JavaScript, Value::Float(f)) => *f != 0.0 && !f.is_nan(),
            (Syntax::JavaScript, Value::String(s)) => !s.is_empty(),
            _ => value.is_truthy(),
        }
    }
}

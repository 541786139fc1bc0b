use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use super::builtins;
use super::context::{ExecutionContext, Scope};
use super::evaluator::Runtime;
use super::statement::Flow;
use super::value::{Closure, Key, Table, Unbound, Value};
use crate::ast::{BinaryOperator, Expression, Literal, TableField, UnaryOperator};
use crate::directive;
use crate::error::{DslError, Error, Result, SourceLocation};
use crate::parser::Syntax;

fn unresolved(unbound: &Unbound) -> Error {
    DslError::UnresolvedReference {
        name: unbound.name.clone(),
        location: unbound.location.clone(),
    }
    .into()
}

impl Runtime<'_> {
    pub(crate) fn eval_expression(
        &mut self,
        expr: &Expression,
        context: &ExecutionContext,
    ) -> Result<Value> {
        match expr {
            Expression::Literal(literal) => Ok(Self::eval_literal(literal)),
            Expression::Name(name, location) => {
                Ok(self.eval_variable(name, context.at(*location), context))
            }
            Expression::Index {
                target,
                key,
                location,
            } => {
                let container = self.eval_expression(target, context)?;
                let key = self.eval_expression(key, context)?;
                self.index(&container, &key, &context.at(*location))
            }
            Expression::Group(inner) => self.eval_expression(inner, context),
            Expression::Call { .. } | Expression::MethodCall { .. } | Expression::Vararg(_) => {
                let values = self.eval_multi(expr, context)?;
                Ok(values.into_iter().next().unwrap_or_default())
            }
            Expression::Function(body) => Ok(Value::Function(Rc::new(Closure {
                body: Rc::clone(body),
                scope: Rc::clone(&context.scope),
                file: Arc::clone(&context.file),
            }))),
            Expression::Table(fields, location) => {
                self.eval_table(fields, &context.at(*location), context)
            }
            Expression::BinaryOp {
                op: BinaryOperator::And,
                left,
                right,
                ..
            } => {
                let left = self.eval_expression(left, context)?;
                if self.truthy(&left) {
                    self.eval_expression(right, context)
                } else {
                    Ok(left)
                }
            }
            Expression::BinaryOp {
                op: BinaryOperator::Or,
                left,
                right,
                ..
            } => {
                let left = self.eval_expression(left, context)?;
                if self.truthy(&left) {
                    Ok(left)
                } else {
                    self.eval_expression(right, context)
                }
            }
            Expression::BinaryOp {
                op,
                left,
                right,
                location,
            } => {
                let left = self.eval_expression(left, context)?;
                let right = self.eval_expression(right, context)?;
                self.eval_binary_op(*op, left, right, &context.at(*location))
            }
            Expression::UnaryOp {
                op,
                operand,
                location,
            } => {
                let operand = self.eval_expression(operand, context)?;
                self.eval_unary_op(*op, operand, &context.at(*location))
            }
        }
    }

    /// Every value a call or `...` produces; other expressions give one.
    pub(crate) fn eval_multi(
        &mut self,
        expr: &Expression,
        context: &ExecutionContext,
    ) -> Result<Vec<Value>> {
        match expr {
            Expression::Call {
                callee,
                arguments,
                location,
            } => {
                let function = self.eval_expression(callee, context)?;
                let arguments = self.eval_values(arguments, context)?;
                self.call_value(function, arguments, &context.at(*location))
            }
            Expression::MethodCall {
                target,
                method,
                arguments,
                location,
            } => {
                let target = self.eval_expression(target, context)?;
                let arguments = self.eval_values(arguments, context)?;
                self.call_method(target, method, arguments, &context.at(*location))
            }
            Expression::Vararg(location) => match &context.varargs {
                Some(varargs) => Ok(varargs.as_ref().clone()),
                None => Err(DslError::runtime(
                    "cannot use '...' outside a vararg function",
                    &context.at(*location),
                )
                .into()),
            },
            other => Ok(vec![self.eval_expression(other, context)?]),
        }
    }

    /// Lua expands a call or `...` ending a list into all of its values.
    fn expands(&self, expr: &Expression) -> bool {
        self.syntax == Syntax::Lua && expr.is_multi_valued()
    }

    /// Evaluate a list left to right, expanding its last entry.
    pub(crate) fn eval_values(
        &mut self,
        expressions: &[Expression],
        context: &ExecutionContext,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(expressions.len());
        for (i, expression) in expressions.iter().enumerate() {
            if i + 1 == expressions.len() && self.expands(expression) {
                values.extend(self.eval_multi(expression, context)?);
            } else {
                values.push(self.eval_expression(expression, context)?);
            }
        }
        Ok(values)
    }

    fn eval_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Nil => Value::Nil,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    /// Unbound names evaluate to a deferred reference instead of failing.
    fn eval_variable(
        &self,
        name: &str,
        location: SourceLocation,
        context: &ExecutionContext,
    ) -> Value {
        match context.scope.lookup(name) {
            Some(value) => value,
            None => Value::Reference(Rc::new(Unbound {
                name: name.to_string(),
                location,
            })),
        }
    }

    fn eval_table(
        &mut self,
        fields: &[TableField],
        location: &SourceLocation,
        context: &ExecutionContext,
    ) -> Result<Value> {
        let mut table = Table::new();
        let mut position = 0;
        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::Positional(expr) if i + 1 == fields.len() && self.expands(expr) => {
                    for value in self.eval_multi(expr, context)? {
                        position += 1;
                        table.set(Key::Integer(position), value);
                    }
                }
                TableField::Positional(expr) => {
                    position += 1;
                    let value = self.eval_expression(expr, context)?;
                    table.set(Key::Integer(position), value);
                }
                TableField::Named(name, expr) => {
                    let value = self.eval_expression(expr, context)?;
                    table.set(Key::String(name.clone()), value);
                }
                TableField::Keyed(key, expr) => {
                    let key = self.eval_expression(key, context)?;
                    let value = self.eval_expression(expr, context)?;
                    let Some(key) = Key::from_value(&key) else {
                        return Err(DslError::runtime(
                            format!("invalid table key of type {}", key.kind()),
                            location,
                        )
                        .into());
                    };
                    table.set(key, value);
                }
            }
        }
        Ok(Value::table(table))
    }

    pub(crate) fn index(
        &self,
        container: &Value,
        key: &Value,
        location: &SourceLocation,
    ) -> Result<Value> {
        match container {
            Value::Table(table) => Ok(Key::from_value(key)
                .map(|key| table.borrow().get(&key))
                .unwrap_or_default()),
            Value::String(_) => Ok(match key {
                Value::String(name) => builtins::string_function(name)
                    .map(Value::Builtin)
                    .unwrap_or_default(),
                _ => Value::Nil,
            }),
            Value::Reference(unbound) => Err(unresolved(unbound)),
            other => Err(DslError::runtime(
                format!("attempt to index a {} value", other.kind()),
                location,
            )
            .into()),
        }
    }

    /// Call `function` and collect everything it returns.
    pub(crate) fn call_value(
        &mut self,
        function: Value,
        arguments: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<Vec<Value>> {
        match function {
            Value::Function(closure) => self.call_function(&closure, arguments, location),
            Value::Builtin(builtin) => builtin.invoke(self, arguments, location),
            Value::Directive(spec) => Ok(vec![directive::invoke(self, spec, arguments, location)?]),
            Value::Reference(unbound) => Err(DslError::UnknownDirective {
                name: unbound.name.clone(),
                location: unbound.location.clone(),
            }
            .into()),
            other => Err(DslError::runtime(
                format!("attempt to call a {} value", other.kind()),
                location,
            )
            .into()),
        }
    }

    fn call_function(
        &mut self,
        closure: &Closure,
        arguments: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<Vec<Value>> {
        self.enter(location)?;
        let scope = Scope::with_parent(&closure.scope);
        let mut arguments = arguments.into_iter();
        for parameter in &closure.body.parameters {
            scope.declare(parameter.clone(), arguments.next().unwrap_or_default());
        }
        let mut context = ExecutionContext::new(scope, Arc::clone(&closure.file));
        if closure.body.variadic {
            context = context.with_varargs(arguments.collect());
        }
        let result = self.exec_block(&closure.body.body, &context);
        self.leave();

        match result? {
            Flow::Normal => Ok(Vec::new()),
            Flow::Return(values) => Ok(values),
            Flow::Break(at) => {
                Err(DslError::runtime("break outside a loop", &context.at(at)).into())
            }
        }
    }

    /// `target:method(args)`. Handles only accept modifier directives.
    fn call_method(
        &mut self,
        target: Value,
        method: &str,
        mut arguments: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<Vec<Value>> {
        match &target {
            Value::Record(_) | Value::Domain(_) => {
                debug!(method, "method on handle");
                let Some(spec) = directive::lookup(method) else {
                    return Err(DslError::UnknownDirective {
                        name: method.to_string(),
                        location: location.clone(),
                    }
                    .into());
                };
                Ok(vec![directive::apply_method(self, &target, spec, arguments, location)?])
            }
            Value::String(_) => {
                let Some(builtin) = builtins::string_function(method) else {
                    return Err(DslError::runtime(
                        format!("attempt to call a nil value (method '{}')", method),
                        location,
                    )
                    .into());
                };
                arguments.insert(0, target.clone());
                builtin.invoke(self, arguments, location)
            }
            Value::Table(table) => {
                let function = table.borrow().get(&Key::String(method.to_string()));
                if function.is_nil() {
                    return Err(DslError::runtime(
                        format!("attempt to call a nil value (method '{}')", method),
                        location,
                    )
                    .into());
                }
                arguments.insert(0, target.clone());
                self.call_value(function, arguments, location)
            }
            Value::Reference(unbound) => Err(unresolved(unbound)),
            other => Err(DslError::runtime(
                format!("attempt to index a {} value", other.kind()),
                location,
            )
            .into()),
        }
    }

    fn eval_binary_op(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        location: &SourceLocation,
    ) -> Result<Value> {
        match op {
            BinaryOperator::Equal => return Ok(Value::Boolean(left.raw_equals(&right))),
            BinaryOperator::NotEqual => return Ok(Value::Boolean(!left.raw_equals(&right))),
            _ => {}
        }
        for operand in [&left, &right] {
            if let Value::Reference(unbound) = operand {
                return Err(unresolved(unbound));
            }
        }
        match op {
            BinaryOperator::Add
                if self.syntax == Syntax::JavaScript
                    && (matches!(left, Value::String(_)) || matches!(right, Value::String(_))) =>
            {
                Ok(Value::String(format!(
                    "{}{}",
                    self.stringify(&left, location)?,
                    self.stringify(&right, location)?
                )))
            }
            BinaryOperator::Concat => self.eval_concat(&left, &right, location),
            BinaryOperator::LessThan => {
                self.compare(&left, &right, location, |o| o == Ordering::Less)
            }
            BinaryOperator::LessThanEqual => {
                self.compare(&left, &right, location, |o| o != Ordering::Greater)
            }
            BinaryOperator::GreaterThan => {
                self.compare(&left, &right, location, |o| o == Ordering::Greater)
            }
            BinaryOperator::GreaterThanEqual => {
                self.compare(&left, &right, location, |o| o != Ordering::Less)
            }
            _ => self.eval_arithmetic(op, &left, &right, location),
        }
    }

    fn eval_concat(&self, left: &Value, right: &Value, location: &SourceLocation) -> Result<Value> {
        for operand in [left, right] {
            if !matches!(operand, Value::String(_) | Value::Integer(_) | Value::Float(_)) {
                return Err(DslError::runtime(
                    format!("attempt to concatenate a {} value", operand.kind()),
                    location,
                )
                .into());
            }
        }
        Ok(Value::String(format!(
            "{}{}",
            self.stringify(left, location)?,
            self.stringify(right, location)?
        )))
    }

    fn to_number(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Integer(_) | Value::Float(_) => Some(value.clone()),
            Value::String(s) => parse_number(s.trim()),
            _ => None,
        }
    }

    fn eval_arithmetic(
        &self,
        op: BinaryOperator,
        left: &Value,
        right: &Value,
        location: &SourceLocation,
    ) -> Result<Value> {
        let (Some(a), Some(b)) = (self.to_number(left), self.to_number(right)) else {
            let culprit = if self.to_number(left).is_none() { left } else { right };
            return Err(DslError::runtime(
                format!("attempt to perform arithmetic on a {} value", culprit.kind()),
                location,
            )
            .into());
        };

        if let (Value::Integer(a), Value::Integer(b)) = (&a, &b) {
            let (a, b) = (*a, *b);
            let exact = match op {
                BinaryOperator::Add => a.checked_add(b),
                BinaryOperator::Subtract => a.checked_sub(b),
                BinaryOperator::Multiply => a.checked_mul(b),
                BinaryOperator::Divide if self.syntax == Syntax::JavaScript => {
                    match a.checked_rem(b) {
                        Some(0) => a.checked_div(b),
                        _ => None,
                    }
                }
                BinaryOperator::FloorDivide => {
                    if b == 0 {
                        let message = "attempt to perform 'n//0'";
                        return Err(DslError::runtime(message, location).into());
                    }
                    a.checked_div(b).map(|q| {
                        if a % b != 0 && ((a < 0) != (b < 0)) {
                            q - 1
                        } else {
                            q
                        }
                    })
                }
                BinaryOperator::Modulo if self.syntax == Syntax::Lua => {
                    if b == 0 {
                        return Err(DslError::runtime("attempt to perform 'n%0'", location).into());
                    }
                    a.checked_rem(b)
                        .map(|m| if m != 0 && ((m < 0) != (b < 0)) { m + b } else { m })
                }
                BinaryOperator::Modulo => a.checked_rem(b),
                _ => None,
            };
            if let Some(result) = exact {
                return Ok(Value::Integer(result));
            }
        }

        let (a, b) = (a.as_number().unwrap_or(f64::NAN), b.as_number().unwrap_or(f64::NAN));
        let result = match op {
            BinaryOperator::Add => a + b,
            BinaryOperator::Subtract => a - b,
            BinaryOperator::Multiply => a * b,
            BinaryOperator::Divide => a / b,
            BinaryOperator::FloorDivide => (a / b).floor(),
            BinaryOperator::Modulo if self.syntax == Syntax::Lua => a - (a / b).floor() * b,
            BinaryOperator::Modulo => a % b,
            BinaryOperator::Power => a.powf(b),
            other => {
                let message = format!("unsupported operator '{}'", other);
                return Err(DslError::runtime(message, location).into());
            }
        };
        Ok(Value::Float(result))
    }

    fn compare(
        &self,
        left: &Value,
        right: &Value,
        location: &SourceLocation,
        predicate: impl Fn(Ordering) -> bool,
    ) -> Result<Value> {
        let ordering = match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_number(), b.as_number()) {
                // NaN compares false both ways
                (Some(a), Some(b)) => match a.partial_cmp(&b) {
                    Some(ordering) => Some(ordering),
                    None => return Ok(Value::Boolean(false)),
                },
                _ => None,
            },
        };
        match ordering {
            Some(ordering) => Ok(Value::Boolean(predicate(ordering))),
            None => Err(DslError::runtime(
                format!("attempt to compare {} with {}", left.kind(), right.kind()),
                location,
            )
            .into()),
        }
    }

    fn eval_unary_op(
        &self,
        op: UnaryOperator,
        operand: Value,
        location: &SourceLocation,
    ) -> Result<Value> {
        if op == UnaryOperator::Not {
            return Ok(Value::Boolean(!self.truthy(&operand)));
        }
        if let Value::Reference(unbound) = &operand {
            return Err(unresolved(unbound));
        }
        match op {
            UnaryOperator::Negate => match self.to_number(&operand) {
                Some(Value::Integer(i)) => Ok(i
                    .checked_neg()
                    .map(Value::Integer)
                    .unwrap_or(Value::Float(-(i as f64)))),
                Some(Value::Float(f)) => Ok(Value::Float(-f)),
                _ => Err(DslError::runtime(
                    format!("attempt to perform arithmetic on a {} value", operand.kind()),
                    location,
                )
                .into()),
            },
            UnaryOperator::Length => match &operand {
                Value::String(s) if self.syntax == Syntax::JavaScript => {
                    Ok(Value::Integer(s.encode_utf16().count() as i64))
                }
                Value::String(s) => Ok(Value::Integer(s.len() as i64)),
                Value::Table(table) => Ok(Value::Integer(table.borrow().len())),
                other => Err(DslError::runtime(
                    format!("attempt to get length of a {} value", other.kind()),
                    location,
                )
                .into()),
            },
            UnaryOperator::Not => Ok(Value::Boolean(!self.truthy(&operand))),
        }
    }

    /// String form used by concatenation. JavaScript prints integral floats
    /// without a fractional part.
    pub(crate) fn stringify(&self, value: &Value, location: &SourceLocation) -> Result<String> {
        match (self.syntax, value) {
            (_, Value::String(s)) => Ok(s.clone()),
            (_, Value::Integer(i)) => Ok(i.to_string()),
            (Syntax::JavaScript, Value::Float(f)) if f.fract() == 0.0 && f.abs() < 1e21 => {
                // -0 prints as 0
                Ok(if *f == 0.0 { "0".to_string() } else { format!("{:.0}", f) })
            }
            (Syntax::JavaScript, Value::Float(f)) if f.is_nan() => Ok("NaN".to_string()),
            (Syntax::JavaScript, Value::Float(f)) if f.is_infinite() => {
                Ok(if *f > 0.0 { "Infinity" } else { "-Infinity" }.to_string())
            }
            (Syntax::JavaScript, Value::Float(f)) => Ok(f.to_string()),
            (Syntax::Lua, Value::Float(_)) => Ok(value.to_string()),
            (Syntax::JavaScript, Value::Boolean(b)) => Ok(b.to_string()),
            (Syntax::JavaScript, Value::Nil) => Ok("null".to_string()),
            (_, other) => Err(DslError::runtime(
                format!("attempt to concatenate a {} value", other.kind()),
                location,
            )
            .into()),
        }
    }
}

/// Decimal or hexadecimal number text, as accepted by arithmetic coercion and
/// `tonumber`.
pub(crate) fn parse_number(text: &str) -> Option<Value> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok().map(Value::Integer);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    // reject Rust-only spellings such as "inf" and "NaN"
    if text.is_empty() || text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    text.parse::<f64>().ok().map(Value::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Datum;
    use crate::eval::Evaluator;

    fn field(syntax: Syntax, expr: &str) -> Result<Datum> {
        let source = match syntax {
            Syntax::Lua => format!("TXT(\"t\", {})", expr),
            Syntax::JavaScript => format!("TXT(\"t\", \"\" + ({}));", expr),
        };
        let document = Evaluator::new(syntax).evaluate(&source, "test")?;
        Ok(document.records()[0].fields[1].clone())
    }

    fn text(s: &str) -> Datum {
        Datum::String(s.to_string())
    }

    #[test]
    fn test_lua_arithmetic() {
        assert_eq!(field(Syntax::Lua, "tostring(7 // 2)").unwrap(), text("3"));
        assert_eq!(field(Syntax::Lua, "tostring(-7 // 2)").unwrap(), text("-4"));
        assert_eq!(field(Syntax::Lua, "tostring(-7 % 3)").unwrap(), text("2"));
        assert_eq!(field(Syntax::Lua, "tostring(6 / 2)").unwrap(), text("3.0"));
        assert_eq!(field(Syntax::Lua, "tostring(2 ^ 3)").unwrap(), text("8.0"));
        assert_eq!(field(Syntax::Lua, "tostring(\"10\" + 5)").unwrap(), text("15"));
        assert_eq!(field(Syntax::Lua, "\"v\" .. 1.5").unwrap(), text("v1.5"));
    }

    #[test]
    fn test_javascript_arithmetic() {
        assert_eq!(field(Syntax::JavaScript, "6 / 2").unwrap(), text("3"));
        assert_eq!(field(Syntax::JavaScript, "7 / 2").unwrap(), text("3.5"));
        assert_eq!(field(Syntax::JavaScript, "-7 % 3").unwrap(), text("-1"));
        assert_eq!(field(Syntax::JavaScript, "\"a\" + 1 + 2").unwrap(), text("a12"));
        assert_eq!(field(Syntax::JavaScript, "1 + 2").unwrap(), text("3"));
        assert_eq!(field(Syntax::JavaScript, "\"abc\".length").unwrap(), text("3"));
        assert_eq!(
            field(Syntax::JavaScript, "1e19 * 10").unwrap(),
            text("100000000000000000000")
        );
        assert_eq!(field(Syntax::JavaScript, "-1e19").unwrap(), text("-10000000000000000000"));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(field(Syntax::Lua, "nil or \"fallback\"").unwrap(), text("fallback"));
        assert_eq!(field(Syntax::Lua, "tostring(false and 1)").unwrap(), text("false"));
        assert_eq!(field(Syntax::JavaScript, "0 || \"zero\"").unwrap(), text("zero"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(field(Syntax::Lua, "tostring(1 < 1.5)").unwrap(), text("true"));
        assert_eq!(field(Syntax::Lua, "tostring(\"a\" < \"b\")").unwrap(), text("true"));
        assert_eq!(field(Syntax::Lua, "tostring(1 == 1.0)").unwrap(), text("true"));
        let err = field(Syntax::Lua, "tostring(1 < \"x\")").unwrap_err();
        assert!(err.to_string().contains("attempt to compare number with string"));
    }

    #[test]
    fn test_reference_in_arithmetic_is_unresolved() {
        let err = field(Syntax::Lua, "MISSING .. \"x\"").unwrap_err();
        match err {
            Error::Dsl(DslError::UnresolvedReference { name, .. }) => assert_eq!(name, "MISSING"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_reference_is_stored_as_datum() {
        match field(Syntax::Lua, "LATER").unwrap() {
            Datum::Reference(reference) => {
                assert_eq!(reference.name, "LATER");
                assert_eq!(reference.slot.index, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_string_methods_and_closures() {
        assert_eq!(field(Syntax::Lua, "(\"www\"):upper()").unwrap(), text("WWW"));
        assert_eq!(
            field(
                Syntax::Lua,
                "(function(prefix) return function(n) return prefix .. n end end)(\"h\")(\"1\")"
            )
            .unwrap(),
            text("h1")
        );
        let err = field(Syntax::Lua, "(42)()").unwrap_err();
        assert!(err.to_string().contains("attempt to call a number value"));
    }

    #[test]
    fn test_parse_number() {
        assert!(parse_number("0x1F").is_some_and(|v| v.raw_equals(&Value::Integer(31))));
        assert!(parse_number("1e3").is_some_and(|v| v.raw_equals(&Value::Float(1000.0))));
        assert!(parse_number("inf").is_none());
        assert!(parse_number("").is_none());
    }
}

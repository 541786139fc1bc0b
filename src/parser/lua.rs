//! Parser for the Lua dialect operators write their configuration in.

use std::rc::Rc;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{cut, map, not, opt, recognize, value},
    error::{context, VerboseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    InputTake,
};
use tracing::instrument;

use super::{
    fail, is_ident_char, is_ident_start, location, mismatch, nested, number, quoted_string,
    PResult, Span, Syntax,
};
use crate::ast::*;

const KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

const OR: &[(&str, BinaryOperator)] = &[("or", BinaryOperator::Or)];
const AND: &[(&str, BinaryOperator)] = &[("and", BinaryOperator::And)];
const COMPARISON: &[(&str, BinaryOperator)] = &[
    ("==", BinaryOperator::Equal),
    ("~=", BinaryOperator::NotEqual),
    ("<=", BinaryOperator::LessThanEqual),
    (">=", BinaryOperator::GreaterThanEqual),
    ("<", BinaryOperator::LessThan),
    (">", BinaryOperator::GreaterThan),
];
const CONCAT: &[(&str, BinaryOperator)] = &[("..", BinaryOperator::Concat)];
const ADDITIVE: &[(&str, BinaryOperator)] =
    &[("+", BinaryOperator::Add), ("-", BinaryOperator::Subtract)];
const MULTIPLICATIVE: &[(&str, BinaryOperator)] = &[
    ("*", BinaryOperator::Multiply),
    ("//", BinaryOperator::FloorDivide),
    ("/", BinaryOperator::Divide),
    ("%", BinaryOperator::Modulo),
];
const POWER: &[(&str, BinaryOperator)] = &[("^", BinaryOperator::Power)];

/// Entry point of the Lua parser.
#[instrument(level = "debug", skip(input))]
pub fn parse_chunk(input: Span<'_>) -> PResult<'_, Chunk> {
    let (input, block) = block(input)?;
    let (input, _) = sp(input)?;
    if !input.fragment().is_empty() {
        // surface the real failure of the statement that stopped the block
        statement(input)?;
        return fail(input, "unexpected statement");
    }
    Ok((input, Chunk { block }))
}

// Trivia

/// Whitespace and comments.
fn sp(input: Span<'_>) -> PResult<'_, ()> {
    value((), many0(alt((value((), multispace1), comment))))(input)
}

fn comment(input: Span<'_>) -> PResult<'_, ()> {
    let (input, _) = tag("--")(input)?;
    if let Ok((rest, _)) = long_bracket(input) {
        return Ok((rest, ()));
    }
    value((), take_while(|c: char| c != '\n'))(input)
}

/// `[[ ... ]]` or `[==[ ... ]==]`, used by long strings and long comments.
fn long_bracket(input: Span<'_>) -> PResult<'_, String> {
    let (rest, open) = recognize(delimited(
        char('['),
        take_while(|c: char| c == '='),
        char('['),
    ))(input)?;
    let close = format!("]{}]", "=".repeat(open.fragment().len() - 2));
    let Some(end) = rest.fragment().find(&close) else {
        return fail(input, "unfinished long string");
    };
    let (after, body) = rest.take_split(end + close.len());
    let content = &body.fragment()[..end];
    let content = content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content);
    Ok((after, content.to_string()))
}

// Tokens

fn keyword<'a>(word: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    preceded(sp, terminated(tag(word), not(satisfy(is_ident_char))))
}

fn symbol<'a>(token: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    preceded(sp, tag(token))
}

fn expect_keyword<'a>(
    word: &'static str,
    message: &'static str,
) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    cut(context(message, keyword(word)))
}

fn expect_symbol<'a>(
    token: &'static str,
    message: &'static str,
) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    cut(context(message, symbol(token)))
}

/// `=` but not `==`
fn assign_eq(input: Span<'_>) -> PResult<'_, Span<'_>> {
    preceded(sp, terminated(tag("="), not(char('='))))(input)
}

/// `.` but not `..`
fn dot(input: Span<'_>) -> PResult<'_, Span<'_>> {
    preceded(sp, terminated(tag("."), not(char('.'))))(input)
}

/// `[` that does not open a long string
fn index_open(input: Span<'_>) -> PResult<'_, Span<'_>> {
    preceded(sp, terminated(tag("["), not(alt((char('['), char('='))))))(input)
}

/// `:` that does not start a label
fn colon(input: Span<'_>) -> PResult<'_, Span<'_>> {
    preceded(sp, terminated(tag(":"), not(char(':'))))(input)
}

fn name(input: Span<'_>) -> PResult<'_, String> {
    let (input, _) = sp(input)?;
    let (rest, ident) = recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)?;
    if KEYWORDS.contains(ident.fragment()) {
        return mismatch(input);
    }
    Ok((rest, ident.fragment().to_string()))
}

fn string_literal(input: Span<'_>) -> PResult<'_, String> {
    let (input, _) = sp(input)?;
    alt((|i| quoted_string(i, Syntax::Lua), long_bracket))(input)
}

/// Binary operator from `table`, longest spellings first.
fn operator<'a>(
    input: Span<'a>,
    table: &[(&'static str, BinaryOperator)],
) -> PResult<'a, (BinaryOperator, Location)> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    for (token, op) in table {
        let Ok((rest, _)) = tag::<_, _, VerboseError<Span<'a>>>(*token)(input) else {
            continue;
        };
        let is_word = token.chars().all(|c| c.is_ascii_alphabetic());
        if is_word && rest.fragment().starts_with(is_ident_char) {
            continue;
        }
        if *token == ".." && rest.fragment().starts_with('.') {
            return fail(input, "unexpected '...'");
        }
        return Ok((rest, (*op, at)));
    }
    mismatch(input)
}

// Blocks and statements

fn block(input: Span<'_>) -> PResult<'_, Block> {
    nested(input, |input| {
        let (input, statements) = many0(statement)(input)?;
        let mut statements: Vec<Statement> = statements.into_iter().flatten().collect();
        let (input, ret) = opt(return_statement)(input)?;
        statements.extend(ret);
        Ok((input, Block::new(statements)))
    })
}

fn statement(input: Span<'_>) -> PResult<'_, Option<Statement>> {
    alt((
        map(symbol(";"), |_| None),
        map(local_statement, Some),
        map(function_statement, Some),
        map(if_statement, Some),
        map(while_statement, Some),
        map(for_statement, Some),
        map(do_statement, Some),
        map(break_statement, Some),
        unsupported_statement,
        map(expression_statement, Some),
    ))(input)
}

fn unsupported_statement(input: Span<'_>) -> PResult<'_, Option<Statement>> {
    let (after, _) = sp(input)?;
    if keyword("goto")(after).is_ok() || symbol("::")(after).is_ok() {
        return fail(after, "goto and labels are not supported");
    }
    if keyword("repeat")(after).is_ok() {
        return fail(after, "repeat-until loops are not supported");
    }
    mismatch(input)
}

fn local_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("local")(input)?;
    let (input, _) = sp(input)?;
    let at = location(&input);
    if let Ok((input, _)) = keyword("function")(input) {
        let (input, name) = cut(name)(input)?;
        let (input, mut function) = cut(function_body)(input)?;
        function.name = Some(name.clone());
        return Ok((
            input,
            Statement::LocalFunction {
                name,
                function: Rc::new(function),
                location: at,
            },
        ));
    }
    let (input, declared) = cut(context(
        "expected a name after 'local'",
        separated_list1(symbol(","), pair(name, opt(attribute))),
    ))(input)?;
    let (names, attributes) = declared.into_iter().unzip();
    let (input, values) = match assign_eq(input) {
        Ok((rest, _)) => cut(expression_list)(rest)?,
        Err(_) => (input, vec![]),
    };
    Ok((
        input,
        Statement::Local {
            names,
            attributes,
            values,
            location: at,
        },
    ))
}

/// `<const>` after a local name.
fn attribute(input: Span<'_>) -> PResult<'_, Attribute> {
    let (input, _) = symbol("<")(input)?;
    let (input, _) = sp(input)?;
    let (rest, word) = cut(context("expected an attribute name", name))(input)?;
    let attribute = match word.as_str() {
        "const" => Attribute::Const,
        "close" => return fail(input, "to-be-closed variables are not supported"),
        _ => return fail(input, "unknown attribute"),
    };
    let (rest, _) = expect_symbol(">", "expected '>' to close the attribute")(rest)?;
    Ok((rest, attribute))
}

/// `function a.b.c:m(...) ... end`, lowered to an assignment.
fn function_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("function")(input)?;
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, first) = cut(context("expected a function name", name))(input)?;
    let (input, fields) = many0(preceded(dot, cut(name)))(input)?;
    let (input, method) = opt(preceded(colon, cut(name)))(input)?;
    let (input, mut function) = cut(function_body)(input)?;

    let mut full_name = first.clone();
    let mut target = Expression::Name(first, at);
    for field in fields.into_iter().chain(method.clone()) {
        full_name.push('.');
        full_name.push_str(&field);
        target = Expression::Index {
            target: Box::new(target),
            key: Box::new(Expression::string(field)),
            location: at,
        };
    }
    if method.is_some() {
        function.parameters.insert(0, "self".to_string());
    }
    function.name = Some(full_name);
    function.location = at;
    Ok((
        input,
        Statement::Assign {
            targets: vec![target],
            values: vec![Expression::Function(Rc::new(function))],
            location: at,
        },
    ))
}

fn function_body(input: Span<'_>) -> PResult<'_, FunctionBody> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = expect_symbol("(", "expected '(' to open the parameter list")(input)?;
    let (input, (parameters, variadic)) = parameter_list(input)?;
    let (input, _) = expect_symbol(")", "expected ')' to close the parameter list")(input)?;
    let (input, body) = block(input)?;
    let (input, _) = expect_keyword("end", "expected 'end' to close the function")(input)?;
    Ok((
        input,
        FunctionBody {
            name: None,
            parameters,
            variadic,
            body,
            location: at,
        },
    ))
}

/// Names, optionally ending in `...`.
fn parameter_list(mut input: Span<'_>) -> PResult<'_, (Vec<String>, bool)> {
    let mut parameters = Vec::new();
    loop {
        if let Ok((rest, _)) = symbol("...")(input) {
            return Ok((rest, (parameters, true)));
        }
        match name(input) {
            Ok((rest, parameter)) => {
                parameters.push(parameter);
                input = rest;
            }
            Err(nom::Err::Error(_)) if parameters.is_empty() => {
                return Ok((input, (parameters, false)))
            }
            Err(nom::Err::Error(_)) => {
                let (input, _) = sp(input)?;
                return fail(input, "expected a parameter name");
            }
            Err(e) => return Err(e),
        }
        match symbol(",")(input) {
            Ok((rest, _)) => input = rest,
            Err(_) => return Ok((input, (parameters, false))),
        }
    }
}

fn if_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("if")(input)?;
    let (input, condition) = cut(expression)(input)?;
    let (input, _) = expect_keyword("then", "expected 'then'")(input)?;
    let (mut input, then_block) = block(input)?;
    let mut branches = vec![(condition, then_block)];
    while let Ok((rest, _)) = keyword("elseif")(input) {
        let (rest, condition) = cut(expression)(rest)?;
        let (rest, _) = expect_keyword("then", "expected 'then'")(rest)?;
        let (rest, body) = block(rest)?;
        branches.push((condition, body));
        input = rest;
    }
    let (input, else_block) = opt(preceded(keyword("else"), block))(input)?;
    let (input, _) = expect_keyword("end", "expected 'end' to close 'if'")(input)?;
    Ok((
        input,
        Statement::If {
            branches,
            else_block,
        },
    ))
}

fn while_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("while")(input)?;
    let (input, condition) = cut(expression)(input)?;
    let (input, body) = do_block(input)?;
    Ok((input, Statement::While { condition, body }))
}

fn do_block(input: Span<'_>) -> PResult<'_, Block> {
    let (input, _) = expect_keyword("do", "expected 'do'")(input)?;
    let (input, body) = block(input)?;
    let (input, _) = expect_keyword("end", "expected 'end' to close the loop")(input)?;
    Ok((input, body))
}

fn for_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("for")(input)?;
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, first) = cut(context("expected a loop variable", name))(input)?;

    if let Ok((rest, _)) = assign_eq(input) {
        let (rest, start) = cut(expression)(rest)?;
        let (rest, _) = expect_symbol(",", "expected ',' in numeric for")(rest)?;
        let (rest, end) = cut(expression)(rest)?;
        let (rest, step) = opt(preceded(symbol(","), cut(expression)))(rest)?;
        let (rest, body) = do_block(rest)?;
        return Ok((
            rest,
            Statement::NumericFor {
                variable: first,
                start,
                end,
                step,
                body,
                location: at,
            },
        ));
    }

    let (input, more) = many0(preceded(symbol(","), cut(name)))(input)?;
    let (input, _) = expect_keyword("in", "expected '=' or 'in' after the loop variables")(input)?;
    let (input, iterable) = cut(expression_list)(input)?;
    let (input, body) = do_block(input)?;
    let mut variables = vec![first];
    variables.extend(more);
    Ok((
        input,
        Statement::ForEach {
            variables,
            iterable,
            body,
            location: at,
        },
    ))
}

fn do_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("do")(input)?;
    let (input, body) = block(input)?;
    let (input, _) = expect_keyword("end", "expected 'end' to close 'do'")(input)?;
    Ok((input, Statement::Do(body)))
}

fn break_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    map(keyword("break"), move |_| Statement::Break(at))(input)
}

fn return_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = keyword("return")(input)?;
    let (input, values) = opt(expression_list)(input)?;
    let (input, _) = opt(symbol(";"))(input)?;
    Ok((input, Statement::Return(values.unwrap_or_default(), at)))
}

/// Assignment or bare call.
fn expression_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (rest, first) = suffixed_expression(input)?;
    let (after_targets, more) = many0(preceded(symbol(","), cut(suffixed_expression)))(rest)?;

    if more.is_empty() && assign_eq(after_targets).is_err() {
        return match first {
            Expression::Call { .. } | Expression::MethodCall { .. } => {
                Ok((rest, Statement::Expression(first)))
            }
            _ => fail(input, "syntax error: expected an assignment or a function call"),
        };
    }

    let (rest, _) = cut(context("expected '='", assign_eq))(after_targets)?;
    let mut targets = vec![first];
    targets.extend(more);
    if !targets
        .iter()
        .all(|t| matches!(t, Expression::Name(..) | Expression::Index { .. }))
    {
        return fail(input, "cannot assign to this expression");
    }
    let (rest, values) = cut(expression_list)(rest)?;
    Ok((
        rest,
        Statement::Assign {
            targets,
            values,
            location: at,
        },
    ))
}

// Expressions

fn expression_list(input: Span<'_>) -> PResult<'_, Vec<Expression>> {
    separated_list1(symbol(","), expression)(input)
}

pub(crate) fn expression(input: Span<'_>) -> PResult<'_, Expression> {
    nested(input, |input| binary_left(input, and_expression, OR))
}

fn and_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, comparison_expression, AND)
}

fn comparison_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, concat_expression, COMPARISON)
}

/// `..` is right associative
fn concat_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, left) = additive_expression(input)?;
    match operator(input, CONCAT) {
        Ok((rest, (op, at))) => {
            let (rest, right) = cut(|i| nested(i, concat_expression))(rest)?;
            Ok((rest, binary(op, left, right, at)))
        }
        Err(nom::Err::Error(_)) => Ok((input, left)),
        Err(e) => Err(e),
    }
}

fn additive_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, multiplicative_expression, ADDITIVE)
}

fn multiplicative_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, unary_expression, MULTIPLICATIVE)
}

fn unary_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let prefix = alt((
        value(UnaryOperator::Not, keyword("not")),
        value(UnaryOperator::Length, char('#')),
        value(UnaryOperator::Negate, char('-')),
    ))(input);
    match prefix {
        Ok((rest, op)) => {
            let (rest, operand) = cut(|i| nested(i, unary_expression))(rest)?;
            Ok((
                rest,
                Expression::UnaryOp {
                    op,
                    operand: Box::new(operand),
                    location: at,
                },
            ))
        }
        Err(nom::Err::Error(_)) => power_expression(input),
        Err(e) => Err(e),
    }
}

/// `^` binds tighter than unary minus on its left and is right associative.
fn power_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, base) = simple_expression(input)?;
    match operator(input, POWER) {
        Ok((rest, (op, at))) => {
            let (rest, exponent) = cut(|i| nested(i, unary_expression))(rest)?;
            Ok((rest, binary(op, base, exponent, at)))
        }
        Err(nom::Err::Error(_)) => Ok((input, base)),
        Err(e) => Err(e),
    }
}

fn binary_left<'a>(
    input: Span<'a>,
    operand: fn(Span<'a>) -> PResult<'a, Expression>,
    table: &[(&'static str, BinaryOperator)],
) -> PResult<'a, Expression> {
    let (mut input, mut left) = operand(input)?;
    loop {
        match operator(input, table) {
            Ok((rest, (op, at))) => {
                let (rest, right) = cut(operand)(rest)?;
                left = binary(op, left, right, at);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, left)),
            Err(e) => return Err(e),
        }
    }
}

fn binary(op: BinaryOperator, left: Expression, right: Expression, at: Location) -> Expression {
    Expression::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
        location: at,
    }
}

fn simple_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    if let Ok((rest, _)) = tag::<_, _, VerboseError<Span<'_>>>("...")(input) {
        return Ok((rest, Expression::Vararg(location(&input))));
    }
    alt((
        map(keyword("nil"), |_| Expression::Literal(Literal::Nil)),
        map(keyword("true"), |_| Expression::Literal(Literal::Boolean(true))),
        map(keyword("false"), |_| Expression::Literal(Literal::Boolean(false))),
        map(number, Expression::Literal),
        map(string_literal, |s| Expression::Literal(Literal::String(s))),
        table_constructor,
        map(preceded(keyword("function"), cut(function_body)), |body| {
            Expression::Function(Rc::new(body))
        }),
        suffixed_expression,
    ))(input)
}

fn primary_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    alt((
        map(name, move |n| Expression::Name(n, at)),
        map(
            delimited(
                symbol("("),
                cut(expression),
                expect_symbol(")", "expected ')'"),
            ),
            |inner| match inner {
                multi if multi.is_multi_valued() => Expression::Group(Box::new(multi)),
                single => single,
            },
        ),
    ))(input)
}

/// Name or parenthesized expression followed by fields, indexes and calls.
fn suffixed_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (mut input, mut expr) = primary_expression(input)?;
    loop {
        let (after, _) = sp(input)?;
        let at = location(&after);
        if let Ok((rest, _)) = dot(after) {
            let (rest, field) = cut(context("expected a field name after '.'", name))(rest)?;
            expr = Expression::Index {
                target: Box::new(expr),
                key: Box::new(Expression::string(field)),
                location: at,
            };
            input = rest;
        } else if let Ok((rest, _)) = index_open(after) {
            let (rest, key) = cut(expression)(rest)?;
            let (rest, _) = expect_symbol("]", "expected ']'")(rest)?;
            expr = Expression::Index {
                target: Box::new(expr),
                key: Box::new(key),
                location: at,
            };
            input = rest;
        } else if let Ok((rest, _)) = colon(after) {
            let (rest, method) = cut(context("expected a method name after ':'", name))(rest)?;
            let (rest, arguments) = cut(context(
                "expected arguments for the method call",
                call_arguments,
            ))(rest)?;
            let call_at = expr.location().unwrap_or(at);
            expr = Expression::MethodCall {
                target: Box::new(expr),
                method,
                arguments,
                location: call_at,
            };
            input = rest;
        } else if let Ok((rest, arguments)) = call_arguments(after) {
            let call_at = expr.location().unwrap_or(at);
            expr = Expression::Call {
                callee: Box::new(expr),
                arguments,
                location: call_at,
            };
            input = rest;
        } else {
            return Ok((input, expr));
        }
    }
}

/// `(a, b)`, `{...}` or a string literal.
fn call_arguments(input: Span<'_>) -> PResult<'_, Vec<Expression>> {
    alt((
        delimited(
            symbol("("),
            separated_list0(symbol(","), expression),
            expect_symbol(")", "expected ')' to close the argument list"),
        ),
        map(table_constructor, |table| vec![table]),
        map(string_literal, |s| vec![Expression::Literal(Literal::String(s))]),
    ))(input)
}

fn table_constructor(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = char('{')(input)?;
    let (input, fields) = separated_list0(field_separator, table_field)(input)?;
    let (input, _) = opt(field_separator)(input)?;
    let (input, _) = expect_symbol("}", "expected '}' to close the table")(input)?;
    Ok((input, Expression::Table(fields, at)))
}

fn field_separator(input: Span<'_>) -> PResult<'_, Span<'_>> {
    alt((symbol(","), symbol(";")))(input)
}

fn table_field(input: Span<'_>) -> PResult<'_, TableField> {
    alt((
        map(
            pair(
                delimited(index_open, cut(expression), expect_symbol("]", "expected ']'")),
                preceded(cut(context("expected '='", assign_eq)), cut(expression)),
            ),
            |(key, value)| TableField::Keyed(key, value),
        ),
        map(pair(terminated(name, assign_eq), cut(expression)), |(key, value)| {
            TableField::Named(key, value)
        }),
        map(expression, TableField::Positional),
    ))(input)
}

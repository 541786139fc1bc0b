//! Parser for the engine's native JavaScript dialect.
//!
//! Only the subset needed to read configuration files back is accepted:
//! declarations, functions, arrows, `if`, loops, object and array literals.

use std::rc::Rc;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{cut, map, not, opt, recognize, value},
    error::{context, VerboseError},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use tracing::instrument;

use super::{
    fail, is_ident_char, location, mismatch, nested, number, quoted_string, PResult, Span,
    Syntax,
};
use crate::ast::*;

const KEYWORDS: [&str; 26] = [
    "break", "case", "class", "const", "continue", "default", "delete", "do", "else", "false",
    "for", "function", "if", "in", "let", "new", "null", "of", "return", "switch", "this",
    "true", "typeof", "undefined", "var", "while",
];

const OR: &[(&str, BinaryOperator)] = &[("||", BinaryOperator::Or)];
const AND: &[(&str, BinaryOperator)] = &[("&&", BinaryOperator::And)];
const EQUALITY: &[(&str, BinaryOperator)] = &[
    ("===", BinaryOperator::Equal),
    ("!==", BinaryOperator::NotEqual),
    ("==", BinaryOperator::Equal),
    ("!=", BinaryOperator::NotEqual),
];
const RELATIONAL: &[(&str, BinaryOperator)] = &[
    ("<=", BinaryOperator::LessThanEqual),
    (">=", BinaryOperator::GreaterThanEqual),
    ("<", BinaryOperator::LessThan),
    (">", BinaryOperator::GreaterThan),
];
const ADDITIVE: &[(&str, BinaryOperator)] =
    &[("+", BinaryOperator::Add), ("-", BinaryOperator::Subtract)];
const MULTIPLICATIVE: &[(&str, BinaryOperator)] = &[
    ("*", BinaryOperator::Multiply),
    ("/", BinaryOperator::Divide),
    ("%", BinaryOperator::Modulo),
];

/// Entry point of the JavaScript parser.
#[instrument(level = "debug", skip(input))]
pub fn parse_chunk(input: Span<'_>) -> PResult<'_, Chunk> {
    let (input, block) = statements(input)?;
    let (input, _) = sp(input)?;
    if !input.fragment().is_empty() {
        statement(input)?;
        return fail(input, "unexpected statement");
    }
    Ok((input, Chunk { block }))
}

// Trivia

fn sp(input: Span<'_>) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("//"), take_while(|c: char| c != '\n'))),
            block_comment,
        ))),
    )(input)
}

fn block_comment(input: Span<'_>) -> PResult<'_, ()> {
    let (rest, _) = tag("/*")(input)?;
    match terminated(take_until("*/"), tag::<_, _, VerboseError<Span<'_>>>("*/"))(rest) {
        Ok((rest, _)) => Ok((rest, ())),
        Err(_) => fail(input, "unfinished comment"),
    }
}

// Tokens

fn keyword<'a>(word: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    preceded(sp, terminated(tag(word), not(satisfy(is_identifier_char))))
}

fn symbol<'a>(token: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    preceded(sp, tag(token))
}

fn expect_symbol<'a>(
    token: &'static str,
    message: &'static str,
) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    cut(context(message, symbol(token)))
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    is_ident_char(c) || c == '$'
}

/// Any identifier-shaped word, keywords included.
fn word(input: Span<'_>) -> PResult<'_, String> {
    let (input, _) = sp(input)?;
    let (rest, ident) = recognize(pair(
        satisfy(is_identifier_start),
        take_while(is_identifier_char),
    ))(input)?;
    Ok((rest, ident.fragment().to_string()))
}

fn name(input: Span<'_>) -> PResult<'_, String> {
    let (rest, ident) = word(input)?;
    if KEYWORDS.contains(&ident.as_str()) {
        return mismatch(input);
    }
    Ok((rest, ident))
}

fn string_literal(input: Span<'_>) -> PResult<'_, String> {
    let (input, _) = sp(input)?;
    if input.fragment().starts_with('`') {
        return fail(input, "template literals are not supported");
    }
    quoted_string(input, Syntax::JavaScript)
}

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
        // `+=`, `++`, `<<`, `=>` and comments belong to other productions
        let next = rest.fragment().chars().next();
        let clash = match *token {
            "+" | "-" => matches!(next, Some(c) if c == '=' || token.starts_with(c)),
            "*" | "%" | "<" | ">" => matches!(next, Some('=') | Some('<') | Some('>')),
            "/" => matches!(next, Some('=') | Some('/') | Some('*')),
            _ => false,
        };
        if clash {
            continue;
        }
        return Ok((rest, (*op, at)));
    }
    mismatch(input)
}

// Statements

/// A statement list; function declarations are hoisted to the top.
fn statements(input: Span<'_>) -> PResult<'_, Block> {
    nested(input, |input| {
        let (input, parsed) = many0(statement)(input)?;
        let (mut functions, mut rest): (Vec<Statement>, Vec<Statement>) = parsed
            .into_iter()
            .flatten()
            .partition(|s| matches!(s, Statement::LocalFunction { .. }));
        functions.append(&mut rest);
        Ok((input, Block::new(functions)))
    })
}

fn statement(input: Span<'_>) -> PResult<'_, Vec<Statement>> {
    alt((
        map(symbol(";"), |_| vec![]),
        declaration,
        map(function_declaration, |s| vec![s]),
        map(if_statement, |s| vec![s]),
        map(while_statement, |s| vec![s]),
        map(for_statement, |s| vec![s]),
        map(return_statement, |s| vec![s]),
        map(break_statement, |s| vec![s]),
        map(block_statement, |s| vec![s]),
        unsupported_statement,
        map(expression_statement, |s| vec![s]),
    ))(input)
}

fn unsupported_statement(input: Span<'_>) -> PResult<'_, Vec<Statement>> {
    let (after, _) = sp(input)?;
    for word in ["switch", "do", "class", "continue", "try", "throw"] {
        if keyword(word)(after).is_ok() {
            return fail(after, "statement is not supported");
        }
    }
    mismatch(input)
}

fn end_of_statement(input: Span<'_>) -> PResult<'_, ()> {
    value((), opt(symbol(";")))(input)
}

/// Statement used as a loop or branch body.
fn body(input: Span<'_>) -> PResult<'_, Block> {
    nested(input, |input| match braced_block(input) {
        Ok((rest, block)) => Ok((rest, block)),
        Err(nom::Err::Error(_)) => {
            let (rest, parsed) = cut(context("expected a statement", statement))(input)?;
            Ok((rest, Block::new(parsed)))
        }
        Err(e) => Err(e),
    })
}

fn block_statement(input: Span<'_>) -> PResult<'_, Statement> {
    map(braced_block, Statement::Do)(input)
}

fn braced_block(input: Span<'_>) -> PResult<'_, Block> {
    let (input, _) = symbol("{")(input)?;
    let (input, block) = statements(input)?;
    let (input, _) = expect_symbol("}", "expected '}' to close the block")(input)?;
    Ok((input, block))
}

/// `var a = 1, b;` becomes one local per declarator.
fn declaration(input: Span<'_>) -> PResult<'_, Vec<Statement>> {
    let (input, attribute) = declaration_keyword(input)?;
    let (input, declarators) = cut(context(
        "expected a variable name",
        separated_list0(symbol(","), |i| declarator(i, attribute)),
    ))(input)?;
    if declarators.is_empty() {
        let (input, _) = sp(input)?;
        return fail(input, "expected a variable name");
    }
    let (input, _) = end_of_statement(input)?;
    Ok((input, declarators))
}

/// `var`, `let` or `const`; the latter forbids reassignment.
fn declaration_keyword(input: Span<'_>) -> PResult<'_, Option<Attribute>> {
    alt((
        value(None, keyword("var")),
        value(None, keyword("let")),
        value(Some(Attribute::Const), keyword("const")),
    ))(input)
}

fn declarator(input: Span<'_>, attribute: Option<Attribute>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, name) = name(input)?;
    let (input, initializer) = opt(preceded(assign_eq, cut(expression)))(input)?;
    Ok((
        input,
        Statement::Local {
            names: vec![name],
            attributes: vec![attribute],
            values: initializer.into_iter().collect(),
            location: at,
        },
    ))
}

/// `=` that is not part of `==` or `=>`
fn assign_eq(input: Span<'_>) -> PResult<'_, Span<'_>> {
    preceded(sp, terminated(tag("="), not(alt((char('='), char('>'))))))(input)
}

fn function_declaration(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("function")(input)?;
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, name) = cut(context("expected a function name", name))(input)?;
    let (input, mut function) = cut(function_rest)(input)?;
    function.name = Some(name.clone());
    function.location = at;
    Ok((
        input,
        Statement::LocalFunction {
            name,
            function: Rc::new(function),
            location: at,
        },
    ))
}

/// Parameter list and braced body.
fn function_rest(input: Span<'_>) -> PResult<'_, FunctionBody> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, parameters) = parameter_list(input)?;
    let (input, _) = expect_symbol("{", "expected '{' to open the function body")(input)?;
    let (input, body) = statements(input)?;
    let (input, _) = expect_symbol("}", "expected '}' to close the function body")(input)?;
    Ok((
        input,
        FunctionBody {
            name: None,
            parameters,
            variadic: false,
            body,
            location: at,
        },
    ))
}

fn parameter_list(input: Span<'_>) -> PResult<'_, Vec<String>> {
    let (input, _) = symbol("(")(input)?;
    let (input, parameters) = separated_list0(symbol(","), parameter)(input)?;
    let (input, _) = opt(symbol(","))(input)?;
    let (input, _) = symbol(")")(input)?;
    Ok((input, parameters))
}

fn parameter(input: Span<'_>) -> PResult<'_, String> {
    if let Ok((_, _)) = symbol("...")(input) {
        let (input, _) = sp(input)?;
        return fail(input, "rest parameters are not supported");
    }
    let (input, parameter) = name(input)?;
    if let Ok((_, _)) = assign_eq(input) {
        let (input, _) = sp(input)?;
        return fail(input, "default parameters are not supported");
    }
    Ok((input, parameter))
}

fn parenthesized(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = cut(context("expected '('", symbol("(")))(input)?;
    let (input, condition) = cut(expression)(input)?;
    let (input, _) = expect_symbol(")", "expected ')'")(input)?;
    Ok((input, condition))
}

fn if_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("if")(input)?;
    let (input, condition) = parenthesized(input)?;
    let (mut input, then_block) = body(input)?;
    let mut branches = vec![(condition, then_block)];
    let mut else_block = None;
    while let Ok((rest, _)) = keyword("else")(input) {
        if let Ok((rest, _)) = keyword("if")(rest) {
            let (rest, condition) = parenthesized(rest)?;
            let (rest, block) = body(rest)?;
            branches.push((condition, block));
            input = rest;
        } else {
            let (rest, block) = body(rest)?;
            else_block = Some(block);
            input = rest;
            break;
        }
    }
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
    let (input, condition) = parenthesized(input)?;
    let (input, body) = body(input)?;
    Ok((input, Statement::While { condition, body }))
}

/// `for (x of xs)` or the three-clause form, which becomes a `while` loop.
fn for_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = keyword("for")(input)?;
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = cut(context("expected '(' after 'for'", symbol("(")))(input)?;

    let for_of = preceded(
        opt(alt((keyword("var"), keyword("let"), keyword("const")))),
        terminated(name, keyword("of")),
    )(input);
    if let Ok((rest, variable)) = for_of {
        let (rest, iterable) = cut(expression)(rest)?;
        let (rest, _) = expect_symbol(")", "expected ')'")(rest)?;
        let (rest, body) = body(rest)?;
        return Ok((
            rest,
            Statement::ForEach {
                variables: vec![variable],
                iterable: vec![iterable],
                body,
                location: at,
            },
        ));
    }

    let (input, init) = alt((
        declaration_without_semicolon,
        map(simple_statement, |s| vec![s]),
        map(tag(""), |_| vec![]),
    ))(input)?;
    let (input, _) = expect_symbol(";", "expected ';' in for loop")(input)?;
    let (input, condition) = opt(expression)(input)?;
    let (input, _) = expect_symbol(";", "expected ';' in for loop")(input)?;
    let (input, update) = opt(simple_statement)(input)?;
    let (input, _) = expect_symbol(")", "expected ')'")(input)?;
    let (input, loop_body) = body(input)?;

    let mut statements = vec![Statement::Do(loop_body)];
    statements.extend(update);
    let mut outer = init;
    outer.push(Statement::While {
        condition: condition.unwrap_or(Expression::Literal(Literal::Boolean(true))),
        body: Block::new(statements),
    });
    Ok((input, Statement::Do(Block::new(outer))))
}

fn declaration_without_semicolon(input: Span<'_>) -> PResult<'_, Vec<Statement>> {
    let (input, attribute) = declaration_keyword(input)?;
    let result = cut(separated_list0(symbol(","), |i| declarator(i, attribute)))(input);
    result
}

fn return_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = keyword("return")(input)?;
    let (input, value) = opt(expression)(input)?;
    let (input, _) = end_of_statement(input)?;
    Ok((input, Statement::Return(value.into_iter().collect(), at)))
}

fn break_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = keyword("break")(input)?;
    let (input, _) = end_of_statement(input)?;
    Ok((input, Statement::Break(at)))
}

fn expression_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, statement) = simple_statement(input)?;
    let (input, _) = end_of_statement(input)?;
    Ok((input, statement))
}

/// Assignment, increment or call, without the terminator.
fn simple_statement(input: Span<'_>) -> PResult<'_, Statement> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (rest, target) = expression(input)?;
    let assignable = matches!(target, Expression::Name(..) | Expression::Index { .. });

    let (after, _) = sp(rest)?;
    let op_at = location(&after);
    let update: PResult<'_, Option<BinaryOperator>> = alt((
        value(Some(BinaryOperator::Add), tag("++")),
        value(Some(BinaryOperator::Subtract), tag("--")),
    ))(after);
    let compound: PResult<'_, Option<BinaryOperator>> = alt((
        value(Some(BinaryOperator::Add), tag("+=")),
        value(Some(BinaryOperator::Subtract), tag("-=")),
        value(None, assign_eq),
    ))(after);

    let (rest, value) = match (update, compound) {
        (Ok((rest, op)), _) => (rest, op.map(|op| (op, Expression::Literal(Literal::Integer(1))))),
        (_, Ok((rest, op))) => {
            let (rest, value) = cut(expression)(rest)?;
            match op {
                Some(op) => (rest, Some((op, value))),
                None => {
                    if !assignable {
                        return fail(input, "cannot assign to this expression");
                    }
                    return Ok((
                        rest,
                        Statement::Assign {
                            targets: vec![target],
                            values: vec![value],
                            location: at,
                        },
                    ));
                }
            }
        }
        _ => {
            return match target {
                Expression::Call { .. } | Expression::MethodCall { .. } => {
                    Ok((rest, Statement::Expression(target)))
                }
                _ => fail(input, "syntax error: expected an assignment or a function call"),
            }
        }
    };

    let Some((op, operand)) = value else {
        return fail(input, "cannot assign to this expression");
    };
    if !assignable {
        return fail(input, "cannot assign to this expression");
    }
    let combined = Expression::BinaryOp {
        op,
        left: Box::new(target.clone()),
        right: Box::new(operand),
        location: op_at,
    };
    Ok((
        rest,
        Statement::Assign {
            targets: vec![target],
            values: vec![combined],
            location: at,
        },
    ))
}

// Expressions

pub(crate) fn expression(input: Span<'_>) -> PResult<'_, Expression> {
    nested(input, |input| binary_left(input, and_expression, OR))
}

fn and_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, equality_expression, AND)
}

fn equality_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, relational_expression, EQUALITY)
}

fn relational_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, additive_expression, RELATIONAL)
}

fn additive_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, multiplicative_expression, ADDITIVE)
}

fn multiplicative_expression(input: Span<'_>) -> PResult<'_, Expression> {
    binary_left(input, unary_expression, MULTIPLICATIVE)
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
                left = Expression::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    location: at,
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, left)),
            Err(e) => return Err(e),
        }
    }
}

fn unary_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let prefix = alt((
        value(UnaryOperator::Not, terminated(char('!'), not(char('=')))),
        value(
            UnaryOperator::Negate,
            terminated(char('-'), not(alt((char('-'), char('='))))),
        ),
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
        Err(nom::Err::Error(_)) => postfix_expression(input),
        Err(e) => Err(e),
    }
}

/// Primary expression followed by member access, indexing and calls.
fn postfix_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (mut input, mut expr) = primary_expression(input)?;
    loop {
        let (after, _) = sp(input)?;
        let at = location(&after);
        let member = terminated(char::<_, VerboseError<Span<'_>>>('.'), not(char('.')))(after);
        if let Ok((rest, _)) = member {
            let (rest, field) = cut(context("expected a property name after '.'", word))(rest)?;
            expr = if field == "length" {
                Expression::UnaryOp {
                    op: UnaryOperator::Length,
                    operand: Box::new(expr),
                    location: at,
                }
            } else {
                Expression::Index {
                    target: Box::new(expr),
                    key: Box::new(Expression::string(field)),
                    location: at,
                }
            };
            input = rest;
        } else if let Ok((rest, _)) = symbol("[")(after) {
            let (rest, key) = cut(expression)(rest)?;
            let (rest, _) = expect_symbol("]", "expected ']'")(rest)?;
            expr = Expression::Index {
                target: Box::new(expr),
                key: Box::new(key),
                location: at,
            };
            input = rest;
        } else if let Ok((rest, _)) = symbol("(")(after) {
            let (rest, arguments) = separated_list0(symbol(","), expression)(rest)?;
            let (rest, _) = opt(symbol(","))(rest)?;
            let (rest, _) = expect_symbol(")", "expected ')' to close the argument list")(rest)?;
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

fn primary_expression(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    if keyword("this")(input).is_ok() || keyword("new")(input).is_ok() {
        return fail(input, "objects and constructors are not supported");
    }
    alt((
        arrow_function,
        map(alt((keyword("null"), keyword("undefined"))), |_| {
            Expression::Literal(Literal::Nil)
        }),
        map(keyword("true"), |_| Expression::Literal(Literal::Boolean(true))),
        map(keyword("false"), |_| Expression::Literal(Literal::Boolean(false))),
        map(number, Expression::Literal),
        map(string_literal, |s| Expression::Literal(Literal::String(s))),
        array_literal,
        object_literal,
        map(preceded(keyword("function"), cut(function_expression)), |body| {
            Expression::Function(Rc::new(body))
        }),
        map(name, move |n| Expression::Name(n, at)),
        delimited(
            symbol("("),
            cut(expression),
            expect_symbol(")", "expected ')'"),
        ),
    ))(input)
}

/// `function name?(params) { ... }` after the keyword.
fn function_expression(input: Span<'_>) -> PResult<'_, FunctionBody> {
    let (input, name) = opt(name)(input)?;
    let (input, mut function) = function_rest(input)?;
    function.name = name;
    Ok((input, function))
}

/// `x => expr`, `(a, b) => { ... }`
fn arrow_function(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, parameters) = alt((parameter_list, map(name, |n| vec![n])))(input)?;
    let (input, _) = symbol("=>")(input)?;
    let (input, body) = match braced_block(input) {
        Ok((rest, block)) => (rest, block),
        Err(nom::Err::Error(_)) => {
            let (rest, value) = cut(expression)(input)?;
            (rest, Block::new(vec![Statement::Return(vec![value], at)]))
        }
        Err(e) => return Err(e),
    };
    Ok((
        input,
        Expression::Function(Rc::new(FunctionBody {
            name: None,
            parameters,
            variadic: false,
            body,
            location: at,
        })),
    ))
}

fn array_literal(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = char('[')(input)?;
    let (input, items) = separated_list0(symbol(","), expression)(input)?;
    let (input, _) = opt(symbol(","))(input)?;
    let (input, _) = expect_symbol("]", "expected ']' to close the array")(input)?;
    Ok((
        input,
        Expression::Table(items.into_iter().map(TableField::Positional).collect(), at),
    ))
}

fn object_literal(input: Span<'_>) -> PResult<'_, Expression> {
    let (input, _) = sp(input)?;
    let at = location(&input);
    let (input, _) = char('{')(input)?;
    let (input, fields) = separated_list0(symbol(","), property)(input)?;
    let (input, _) = opt(symbol(","))(input)?;
    let (input, _) = expect_symbol("}", "expected '}' to close the object")(input)?;
    Ok((input, Expression::Table(fields, at)))
}

enum PropertyKey {
    Name(String),
    Number(Literal),
}

fn property(input: Span<'_>) -> PResult<'_, TableField> {
    let (input, _) = sp(input)?;
    let (input, key) = alt((
        map(word, PropertyKey::Name),
        map(string_literal, PropertyKey::Name),
        map(number, PropertyKey::Number),
    ))(input)?;
    let (input, _) = expect_symbol(":", "expected ':' after the property name")(input)?;
    let (input, value) = cut(expression)(input)?;
    let field = match key {
        PropertyKey::Name(key) => TableField::Named(key, value),
        PropertyKey::Number(key) => TableField::Keyed(Expression::Literal(key), value),
    };
    Ok((input, field))
}

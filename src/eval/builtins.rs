//! Standard library subset available to programs in both dialects.

use std::cmp::Ordering;
use std::f64::consts::PI;
use std::rc::Rc;

use tracing::info;

use super::context::Scope;
use super::evaluator::Runtime;
use super::expression::parse_number;
use super::value::{Builtin, Key, Table, TableRef, Value};
use crate::error::{DslError, Result, SourceLocation};

/// Longest string `string.rep` will build.
const MAX_STRING_SIZE: usize = 1 << 24;

/// Widest field and longest precision `string.format` accepts.
const MAX_FORMAT_DIGITS: usize = 99;

/// Most values `table.unpack` returns at once.
const MAX_UNPACK: i64 = 1 << 16;

static GLOBALS: &[Builtin] = &[
    Builtin::one("print", print),
    Builtin::one("type", type_of),
    Builtin::one("tostring", tostring),
    Builtin::one("tonumber", tonumber),
    Builtin::one("ipairs", ipairs),
    Builtin::one("pairs", pairs),
    Builtin::many("next", next),
    Builtin::many("select", select),
    Builtin::one("error", error),
    Builtin::one("assert", assert),
];

static TABLE_LIBRARY: &[Builtin] = &[
    Builtin::one("insert", table_insert),
    Builtin::one("concat", table_concat),
    Builtin::many("unpack", table_unpack),
];

static STRING_LIBRARY: &[Builtin] = &[
    Builtin::one("format", string_format),
    Builtin::one("sub", string_sub),
    Builtin::one("upper", string_upper),
    Builtin::one("lower", string_lower),
    Builtin::one("len", string_len),
    Builtin::one("rep", string_rep),
];

static MATH_LIBRARY: &[Builtin] = &[
    Builtin::one("floor", math_floor),
    Builtin::one("ceil", math_ceil),
    Builtin::one("abs", math_abs),
    Builtin::one("max", math_max),
    Builtin::one("min", math_min),
    Builtin::one("tointeger", math_tointeger),
];

pub(crate) fn install(globals: &Scope) {
    for builtin in GLOBALS {
        globals.declare(builtin.name, Value::Builtin(builtin));
    }
    globals.declare("table", library(TABLE_LIBRARY, []));
    globals.declare("string", library(STRING_LIBRARY, []));
    globals.declare(
        "math",
        library(
            MATH_LIBRARY,
            [
                ("huge", Value::Float(f64::INFINITY)),
                ("pi", Value::Float(PI)),
                ("maxinteger", Value::Integer(i64::MAX)),
                ("mininteger", Value::Integer(i64::MIN)),
            ],
        ),
    );
}

fn library(
    functions: &'static [Builtin],
    constants: impl IntoIterator<Item = (&'static str, Value)>,
) -> Value {
    let mut table = Table::new();
    for builtin in functions {
        table.set(Key::String(builtin.name.to_string()), Value::Builtin(builtin));
    }
    for (name, value) in constants {
        table.set(Key::String(name.to_string()), value);
    }
    Value::table(table)
}

/// Lookup for `s:method()` on strings.
pub(crate) fn string_function(name: &str) -> Option<&'static Builtin> {
    STRING_LIBRARY.iter().find(|builtin| builtin.name == name)
}

fn bad_argument(
    function: &str,
    index: usize,
    expected: &str,
    got: &Value,
    location: &SourceLocation,
) -> DslError {
    DslError::runtime(
        format!(
            "bad argument #{} to '{}' ({} expected, got {})",
            index,
            function,
            expected,
            got.kind()
        ),
        location,
    )
}

fn argument(args: &[Value], index: usize) -> Value {
    args.get(index - 1).cloned().unwrap_or_default()
}

/// Integral floats inside the `i64` range.
fn float_to_integer(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

fn string_argument(
    function: &str,
    args: &[Value],
    index: usize,
    location: &SourceLocation,
) -> Result<String> {
    match argument(args, index) {
        Value::String(s) => Ok(s),
        value @ (Value::Integer(_) | Value::Float(_)) => Ok(value.to_string()),
        other => Err(bad_argument(function, index, "string", &other, location).into()),
    }
}

fn number_argument(
    function: &str,
    args: &[Value],
    index: usize,
    location: &SourceLocation,
) -> Result<Value> {
    match argument(args, index) {
        value @ (Value::Integer(_) | Value::Float(_)) => Ok(value),
        value @ Value::String(_) => match parse_number(value.to_string().trim()) {
            Some(number) => Ok(number),
            None => Err(bad_argument(function, index, "number", &value, location).into()),
        },
        other => Err(bad_argument(function, index, "number", &other, location).into()),
    }
}

fn integer_argument(
    function: &str,
    args: &[Value],
    index: usize,
    location: &SourceLocation,
) -> Result<i64> {
    match number_argument(function, args, index, location)? {
        Value::Integer(i) => Ok(i),
        Value::Float(f) => float_to_integer(f).ok_or_else(|| {
            DslError::runtime(
                format!(
                    "bad argument #{} to '{}' (number has no integer representation)",
                    index, function
                ),
                location,
            )
            .into()
        }),
        other => Err(bad_argument(function, index, "number", &other, location).into()),
    }
}

fn float_argument(
    function: &str,
    args: &[Value],
    index: usize,
    location: &SourceLocation,
) -> Result<f64> {
    let value = number_argument(function, args, index, location)?;
    value
        .as_number()
        .ok_or_else(|| bad_argument(function, index, "number", &value, location).into())
}

fn table_argument(
    function: &str,
    args: &[Value],
    index: usize,
    location: &SourceLocation,
) -> Result<TableRef> {
    match argument(args, index) {
        Value::Table(table) => Ok(table),
        Value::Reference(unbound) => Err(DslError::UnresolvedReference {
            name: unbound.name.clone(),
            location: unbound.location.clone(),
        }
        .into()),
        other => Err(bad_argument(function, index, "table", &other, location).into()),
    }
}

fn print(_runtime: &mut Runtime<'_>, args: Vec<Value>, location: &SourceLocation) -> Result<Value> {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    info!(target: "dnslua::print", at = %location, "{}", line.join("\t"));
    Ok(Value::Nil)
}

fn type_of(_runtime: &mut Runtime<'_>, args: Vec<Value>, _: &SourceLocation) -> Result<Value> {
    let kind = match argument(&args, 1) {
        Value::Reference(_) => "nil",
        Value::Iterator(_) => "function",
        ref other => other.kind(),
    };
    Ok(Value::string(kind))
}

fn tostring(_runtime: &mut Runtime<'_>, args: Vec<Value>, _: &SourceLocation) -> Result<Value> {
    Ok(Value::String(argument(&args, 1).to_string()))
}

fn tonumber(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let value = argument(&args, 1);
    if args.len() >= 2 {
        let base = integer_argument("tonumber", &args, 2, location)?;
        if !(2..=36).contains(&base) {
            let message = "bad argument #2 to 'tonumber' (base out of range)";
            return Err(DslError::runtime(message, location).into());
        }
        let text = string_argument("tonumber", &args, 1, location)?;
        return Ok(i64::from_str_radix(text.trim(), base as u32)
            .map(Value::Integer)
            .unwrap_or_default());
    }
    Ok(match value {
        Value::Integer(_) | Value::Float(_) => value,
        Value::String(s) => parse_number(s.trim()).unwrap_or_default(),
        _ => Value::Nil,
    })
}

fn ipairs(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let table = table_argument("ipairs", &args, 1, location)?;
    let pairs = table
        .borrow()
        .sequence()
        .into_iter()
        .enumerate()
        .map(|(i, value)| (Value::Integer(i as i64 + 1), value))
        .collect();
    Ok(Value::Iterator(Rc::new(pairs)))
}

/// Iterates in insertion order.
fn pairs(_runtime: &mut Runtime<'_>, args: Vec<Value>, location: &SourceLocation) -> Result<Value> {
    let table = table_argument("pairs", &args, 1, location)?;
    let pairs = table
        .borrow()
        .entries()
        .map(|(key, value)| (key.to_value(), value.clone()))
        .collect();
    Ok(Value::Iterator(Rc::new(pairs)))
}

/// The entry after `key` in insertion order, or nil past the last one.
fn next(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Vec<Value>> {
    let table = table_argument("next", &args, 1, location)?;
    let table = table.borrow();
    let position = match argument(&args, 2) {
        key if key.is_nil() => 0,
        key => Key::from_value(&key)
            .and_then(|key| table.position(&key))
            .map(|position| position + 1)
            .ok_or_else(|| DslError::runtime("invalid key to 'next'", location))?,
    };
    Ok(match table.entry_at(position) {
        Some((key, value)) => vec![key.to_value(), value],
        None => vec![Value::Nil],
    })
}

/// `select('#', ...)` counts; `select(n, ...)` drops the first `n - 1`.
fn select(
    _runtime: &mut Runtime<'_>,
    mut args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Vec<Value>> {
    if let Value::String(s) = argument(&args, 1) {
        if s == "#" {
            return Ok(vec![Value::Integer(args.len() as i64 - 1)]);
        }
    }
    let n = integer_argument("select", &args, 1, location)?;
    let rest = args.len() as i64 - 1;
    let skip = match n {
        n if n < 0 && -n <= rest => rest + n,
        n if n > 0 => (n - 1).min(rest),
        _ => {
            let message = "bad argument #1 to 'select' (index out of range)";
            return Err(DslError::runtime(message, location).into());
        }
    };
    Ok(args.split_off(1 + skip as usize))
}

fn error(_runtime: &mut Runtime<'_>, args: Vec<Value>, location: &SourceLocation) -> Result<Value> {
    Err(DslError::runtime(argument(&args, 1).to_string(), location).into())
}

fn assert(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let value = argument(&args, 1);
    if value.is_truthy() {
        return Ok(value);
    }
    let message = match argument(&args, 2) {
        Value::Nil => "assertion failed!".to_string(),
        other => other.to_string(),
    };
    Err(DslError::runtime(message, location).into())
}

fn table_insert(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let table = table_argument("insert", &args, 1, location)?;
    match args.len() {
        2 => table.borrow_mut().push(args[1].clone()),
        3 => {
            let position = integer_argument("insert", &args, 2, location)?;
            let len = table.borrow().len();
            if position < 1 || position > len + 1 {
                let message = "bad argument #2 to 'insert' (position out of bounds)";
                return Err(DslError::runtime(message, location).into());
            }
            table.borrow_mut().insert_at(position, args[2].clone());
        }
        _ => {
            let message = "wrong number of arguments to 'insert'";
            return Err(DslError::runtime(message, location).into());
        }
    }
    Ok(Value::Nil)
}

fn table_concat(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let table = table_argument("concat", &args, 1, location)?;
    let separator = match argument(&args, 2) {
        Value::Nil => String::new(),
        _ => string_argument("concat", &args, 2, location)?,
    };
    let mut parts = Vec::new();
    for (i, value) in table.borrow().sequence().iter().enumerate() {
        match value {
            Value::String(s) => parts.push(s.clone()),
            Value::Integer(_) | Value::Float(_) => parts.push(value.to_string()),
            other => {
                return Err(DslError::runtime(
                    format!(
                        "invalid value (at index {}) in table for 'concat': {}",
                        i + 1,
                        other.kind()
                    ),
                    location,
                )
                .into())
            }
        }
    }
    Ok(Value::String(parts.join(&separator)))
}

/// `t[i], ..., t[j]`; `j` defaults to the sequence length.
fn table_unpack(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Vec<Value>> {
    let table = table_argument("unpack", &args, 1, location)?;
    let table = table.borrow();
    let first = match argument(&args, 2) {
        Value::Nil => 1,
        _ => integer_argument("unpack", &args, 2, location)?,
    };
    let last = match argument(&args, 3) {
        Value::Nil => table.len(),
        _ => integer_argument("unpack", &args, 3, location)?,
    };
    if first > last {
        return Ok(Vec::new());
    }
    if last.checked_sub(first).map_or(true, |n| n >= MAX_UNPACK) {
        return Err(DslError::runtime("too many results to unpack", location).into());
    }
    Ok((first..=last).map(|i| table.get(&Key::Integer(i))).collect())
}

/// One `%[flags][width][.precision]conversion` directive.
#[derive(Debug, Default)]
struct Conversion {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

impl Conversion {
    fn sign(&self, negative: bool) -> &'static str {
        match (negative, self.plus, self.space) {
            (true, _, _) => "-",
            (false, true, _) => "+",
            (false, false, true) => " ",
            _ => "",
        }
    }

    /// Pad `sign` + `body` to the field width. Zero padding goes between
    /// the sign and the digits.
    fn pad(&self, sign: &str, body: &str, zero: bool) -> String {
        let fill = self.width.saturating_sub(sign.len() + body.chars().count());
        if self.left {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if zero {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }

    /// Integer conversions: precision is a minimum digit count.
    fn integer(&self, negative: bool, digits: String) -> String {
        let digits = match self.precision {
            Some(precision) if digits.len() < precision => {
                format!("{}{}", "0".repeat(precision - digits.len()), digits)
            }
            _ => digits,
        };
        self.pad(self.sign(negative), &digits, self.zero && self.precision.is_none())
    }

    fn float(&self, value: f64) -> String {
        let sign = self.sign(value.is_sign_negative() && !value.is_nan());
        if value.is_nan() {
            return self.pad(sign, "nan", false);
        }
        if value.is_infinite() {
            return self.pad(sign, "inf", false);
        }
        let digits = format!("{:.*}", self.precision.unwrap_or(6), value.abs());
        self.pad(sign, &digits, self.zero)
    }

    fn string(&self, value: &str) -> String {
        match self.precision {
            Some(precision) => {
                let truncated: String = value.chars().take(precision).collect();
                self.pad("", &truncated, false)
            }
            None => self.pad("", value, false),
        }
    }
}

/// Parse flags, width and precision; stops before the conversion letter.
fn parse_conversion(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    location: &SourceLocation,
) -> Result<Conversion> {
    let mut conversion = Conversion::default();
    while let Some(&c) = chars.peek() {
        match c {
            '-' => conversion.left = true,
            '0' => conversion.zero = true,
            '+' => conversion.plus = true,
            ' ' => conversion.space = true,
            _ => break,
        }
        chars.next();
    }
    let number = |chars: &mut std::iter::Peekable<std::str::Chars<'_>>| -> Result<usize> {
        let mut value = 0;
        let mut digits = 0;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
            chars.next();
            digits += 1;
            value = value * 10 + digit as usize;
            if digits > 2 || value > MAX_FORMAT_DIGITS {
                let message = "invalid conversion to 'format' (width or precision too long)";
                return Err(DslError::runtime(message, location).into());
            }
        }
        Ok(value)
    };
    conversion.width = number(chars)?;
    if chars.peek() == Some(&'.') {
        chars.next();
        conversion.precision = Some(number(chars)?);
    }
    Ok(conversion)
}

/// `string.format` with flags `-0+ `, width and precision for `%d`, `%i`,
/// `%x`, `%X`, `%f` and `%s`, plus `%%`.
fn string_format(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let format = string_argument("format", &args, 1, location)?;
    let mut output = String::with_capacity(format.len());
    let mut next = 2;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            output.push('%');
            continue;
        }
        let conversion = parse_conversion(&mut chars, location)?;
        let text = match chars.next() {
            Some('d' | 'i') => {
                let value = integer_argument("format", &args, next, location)?;
                conversion.integer(value < 0, value.unsigned_abs().to_string())
            }
            Some('x') => {
                let value = integer_argument("format", &args, next, location)?;
                conversion.integer(false, format!("{:x}", value as u64))
            }
            Some('X') => {
                let value = integer_argument("format", &args, next, location)?;
                conversion.integer(false, format!("{:X}", value as u64))
            }
            Some('f') => conversion.float(float_argument("format", &args, next, location)?),
            Some('s') => conversion.string(&argument(&args, next).to_string()),
            other => {
                return Err(DslError::runtime(
                    format!(
                        "invalid conversion '%{}' to 'format'",
                        other.map(String::from).unwrap_or_default()
                    ),
                    location,
                )
                .into())
            }
        };
        output.push_str(&text);
        next += 1;
    }
    Ok(Value::String(output))
}

/// Byte-indexed substring; negative positions count from the end.
fn string_sub(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let s = string_argument("sub", &args, 1, location)?;
    let len = s.len() as i64;
    let start = integer_argument("sub", &args, 2, location)?;
    let end = match argument(&args, 3) {
        Value::Nil => -1,
        _ => integer_argument("sub", &args, 3, location)?,
    };
    let normalize = |i: i64| if i < 0 { len.saturating_add(i + 1).max(0) } else { i };
    let start = normalize(start).max(1);
    let end = normalize(end).min(len);
    if start > end {
        return Ok(Value::string(""));
    }
    let bytes = &s.as_bytes()[(start - 1) as usize..end as usize];
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn string_upper(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(Value::String(string_argument("upper", &args, 1, location)?.to_uppercase()))
}

fn string_lower(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(Value::String(string_argument("lower", &args, 1, location)?.to_lowercase()))
}

fn string_len(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(Value::Integer(string_argument("len", &args, 1, location)?.len() as i64))
}

/// The result size is checked before anything is allocated.
fn string_rep(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    let s = string_argument("rep", &args, 1, location)?;
    let count = integer_argument("rep", &args, 2, location)?;
    let separator = match argument(&args, 3) {
        Value::Nil => String::new(),
        _ => string_argument("rep", &args, 3, location)?,
    };
    if count <= 0 {
        return Ok(Value::string(""));
    }
    let too_large = || DslError::runtime("resulting string too large", location);
    let count = usize::try_from(count).map_err(|_| too_large())?;
    let total = s
        .len()
        .checked_mul(count)
        .and_then(|n| n.checked_add(separator.len().checked_mul(count - 1)?))
        .filter(|&n| n <= MAX_STRING_SIZE)
        .ok_or_else(too_large)?;
    if total == 0 {
        return Ok(Value::string(""));
    }
    let mut output = String::with_capacity(total);
    for i in 0..count {
        if i > 0 {
            output.push_str(&separator);
        }
        output.push_str(&s);
    }
    Ok(Value::String(output))
}

/// Integral results come back as integers when they fit.
fn rounded(value: Value, round: fn(f64) -> f64) -> Value {
    match value {
        Value::Float(f) => {
            let f = round(f);
            float_to_integer(f).map_or(Value::Float(f), Value::Integer)
        }
        other => other,
    }
}

fn math_floor(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(rounded(number_argument("floor", &args, 1, location)?, f64::floor))
}

fn math_ceil(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(rounded(number_argument("ceil", &args, 1, location)?, f64::ceil))
}

fn math_abs(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    Ok(match number_argument("abs", &args, 1, location)? {
        Value::Integer(i) => Value::Integer(i.wrapping_abs()),
        Value::Float(f) => Value::Float(f.abs()),
        other => other,
    })
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        _ => {
            let (a, b) = (a.as_number().unwrap_or(f64::NAN), b.as_number().unwrap_or(f64::NAN));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

/// Shared by `math.max` and `math.min`; the first argument wins ties.
fn extremum(
    function: &str,
    args: &[Value],
    location: &SourceLocation,
    wanted: Ordering,
) -> Result<Value> {
    if args.is_empty() {
        return Err(DslError::runtime(
            format!("bad argument #1 to '{}' (number expected, got no value)", function),
            location,
        )
        .into());
    }
    let mut best = number_argument(function, args, 1, location)?;
    for index in 2..=args.len() {
        let candidate = number_argument(function, args, index, location)?;
        if compare_numbers(&candidate, &best) == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn math_max(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    extremum("max", &args, location, Ordering::Greater)
}

fn math_min(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    location: &SourceLocation,
) -> Result<Value> {
    extremum("min", &args, location, Ordering::Less)
}

fn math_tointeger(
    _runtime: &mut Runtime<'_>,
    args: Vec<Value>,
    _: &SourceLocation,
) -> Result<Value> {
    Ok(match argument(&args, 1) {
        value @ Value::Integer(_) => value,
        Value::Float(f) => float_to_integer(f).map_or(Value::Nil, Value::Integer),
        _ => Value::Nil,
    })
}

#[cfg(test)]
mod tests {
    use crate::document::{Datum, Document};
    use crate::eval::Evaluator;
    use crate::parser::Syntax;
    use pretty_assertions::assert_eq;

    fn texts(source: &str) -> Vec<String> {
        let document: Document = Evaluator::new(Syntax::Lua)
            .evaluate(source, "test.lua")
            .unwrap();
        document
            .records()
            .iter()
            .map(|r| match &r.fields[1] {
                Datum::String(s) => s.clone(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    fn failure(source: &str) -> String {
        Evaluator::new(Syntax::Lua)
            .evaluate(source, "test.lua")
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn test_string_library() {
        let out = texts(
            r#"
            TXT("a", string.format("v=%s; n=%d; %%; %x", "spf1", 42, 255))
            TXT("b", ("example"):sub(2, 4))
            TXT("c", string.sub("example", -3))
            TXT("d", string.rep("ab", 3, "-"))
            TXT("e", tostring(string.len("héllo")))
            "#,
        );
        assert_eq!(out, vec!["v=spf1; n=42; %; ff", "xam", "ple", "ab-ab-ab", "6"]);
    }

    #[test]
    fn test_format_flags_width_and_precision() {
        let out = texts(
            r#"
            TXT("a", string.format("%03d|%-5s|%5s|%.2f", 7, "ab", "cd", 3.14159))
            TXT("b", string.format("%5.1f|%+d|% d|%-4d|", 2.375, 5, 5, -3))
            TXT("c", string.format("%x|%04X|%.3d|%.2s", -1, 171, 5, "hello"))
            TXT("d", string.format("%f|%05.1f|%f", 1, -2.5, math.huge))
            "#,
        );
        assert_eq!(
            out,
            vec![
                "007|ab   |   cd|3.14",
                "  2.4|+5| 5|-3  |",
                "ffffffffffffffff|00AB|005|he",
                "1.000000|-02.5|inf",
            ]
        );

        assert!(failure(r#"TXT("x", string.format("%100d", 1))"#).contains("invalid conversion"));
        assert!(failure(r#"TXT("x", string.format("%q", 1))"#).contains("invalid conversion"));
        assert!(failure(r#"TXT("x", string.format("%d", 1.5))"#)
            .contains("no integer representation"));
    }

    #[test]
    fn test_rep_refuses_huge_results() {
        assert!(failure(r#"TXT("x", string.rep("ab", 1e18))"#).contains("too large"));
        let source = r#"TXT("x", string.rep("a", 4611686018427387904, ","))"#;
        assert!(failure(source).contains("too large"));
        assert!(failure(r#"TXT("x", string.rep("a", 1e300))"#)
            .contains("no integer representation"));

        let out = texts(
            r#"
            TXT("a", "[" .. string.rep("", 1e18) .. "]")
            TXT("b", "[" .. string.rep("x", -5) .. "]")
            TXT("c", tostring(string.len(string.rep("0123456789abcdef", 1024))))
            "#,
        );
        assert_eq!(out, vec!["[]", "[]", "16384"]);
    }

    #[test]
    fn test_math_library() {
        let out = texts(
            r#"
            TXT("a", tostring(math.floor(3.7)) .. "," .. tostring(math.ceil(3.2)))
            TXT("b", tostring(math.floor(-3.5)) .. "," .. tostring(math.floor(5)))
            TXT("c", tostring(math.max(3, 9.5, 7)) .. "," .. tostring(math.min(4, -2, 8)))
            TXT("d", tostring(math.abs(-12)) .. "," .. tostring(math.abs(-1.5)))
            TXT("e", tostring(math.huge > 1e308) .. "," .. tostring(-math.huge < -1e308))
            TXT("f", tostring(math.tointeger(8.0)) .. "," .. tostring(math.tointeger(8.5)))
            TXT("g", tostring(math.maxinteger) .. "," .. tostring(math.floor(1e300) == 1e300))
            "#,
        );
        assert_eq!(
            out,
            vec![
                "3,4",
                "-4,5",
                "9.5,-2",
                "12,1.5",
                "true,true",
                "8,nil",
                "9223372036854775807,true",
            ]
        );
        assert!(failure("local x = math.max()").contains("got no value"));
    }

    #[test]
    fn test_next_select_and_unpack() {
        let out = texts(
            r##"
            local t = { a = 1, b = 2 }
            local k, v = next(t)
            TXT("first", k .. v)
            TXT("after", tostring(next(t, "b")))
            TXT("empty", tostring(next({})))
            TXT("count", tostring(select("#", 1, nil, 3)))
            TXT("pick", table.concat({ select(2, "a", "b", "c") }, ","))
            TXT("last", select(-1, "a", "b", "c"))
            local x, y, z = table.unpack({ "p", "q", "r" })
            TXT("unpack", x .. y .. z .. table.concat({ table.unpack({ 1, 2, 3, 4 }, 2, 3) }))
            "##,
        );
        assert_eq!(
            out,
            vec!["firsta1", "nil", "nil", "3", "b,c", "c", "pqr23"]
        );
        assert!(failure("next({ a = 1 }, \"zz\")").contains("invalid key to 'next'"));
        assert!(failure("select(0, 1)").contains("index out of range"));
        assert!(failure("table.unpack({}, 1, 1e9)").contains("too many results"));
    }

    #[test]
    fn test_table_library_and_iteration_order() {
        let out = texts(
            r#"
            local parts = { "a", "c" }
            table.insert(parts, 2, "b")
            table.insert(parts, "d")
            TXT("joined", table.concat(parts, ","))
            local seen = {}
            for k, v in pairs({ z = 1, y = 2, x = 3 }) do
                table.insert(seen, k .. v)
            end
            TXT("order", table.concat(seen, " "))
            "#,
        );
        assert_eq!(out, vec!["a,b,c,d", "z1 y2 x3"]);
    }

    #[test]
    fn test_type_tonumber_and_assert() {
        let out = texts(
            r#"
            TXT("t", type(UNDEFINED) .. "," .. type({}) .. "," .. type(print))
            TXT("n", tostring(tonumber("0x10")) .. "," .. tostring(tonumber("ff", 16))
                .. "," .. tostring(tonumber("nope")))
            "#,
        );
        assert_eq!(out, vec!["nil,table,function", "16,255,nil"]);

        assert!(failure("assert(false, \"custom failure\")").contains("custom failure"));
        assert!(failure("error(\"boom\")").contains("boom"));
    }
}

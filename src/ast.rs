//! Syntax tree shared by both front ends.
//!
//! The Lua and JavaScript parsers lower into the same statement and expression
//! forms, so a single interpreter executes either dialect.

use std::fmt;
use std::rc::Rc;

/// Line and column of a node inside its source unit, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// Root AST Definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `local a, b = x, y` / `var a = x`
    Local {
        names: Vec<String>,
        /// One entry per name.
        attributes: Vec<Option<Attribute>>,
        values: Vec<Expression>,
        location: Location,
    },
    /// `local function f() end`; the name is in scope inside the body.
    LocalFunction {
        name: String,
        function: Rc<FunctionBody>,
        location: Location,
    },
    Assign {
        targets: Vec<Expression>,
        values: Vec<Expression>,
        location: Location,
    },
    Expression(Expression),
    If {
        branches: Vec<(Expression, Block)>,
        else_block: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    NumericFor {
        variable: String,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        body: Block,
        location: Location,
    },
    /// `for k, v in pairs(t)`, `for k, v in next, t` and JavaScript
    /// `for (x of xs)`.
    ForEach {
        variables: Vec<String>,
        iterable: Vec<Expression>,
        body: Block,
        location: Location,
    },
    Do(Block),
    Return(Vec<Expression>, Location),
    Break(Location),
}

/// `local x <const>` / JavaScript `const x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub name: Option<String>,
    pub parameters: Vec<String>,
    /// Ends in `...`.
    pub variadic: bool,
    pub body: Block,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Name(String, Location),
    Index {
        target: Box<Expression>,
        key: Box<Expression>,
        location: Location,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        location: Location,
    },
    /// `target:method(args)`
    MethodCall {
        target: Box<Expression>,
        method: String,
        arguments: Vec<Expression>,
        location: Location,
    },
    Function(Rc<FunctionBody>),
    Table(Vec<TableField>, Location),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        location: Location,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        location: Location,
    },
    /// `...` inside a variadic function or at chunk level.
    Vararg(Location),
    /// `(f())` or `(...)`: keeps only the first value.
    Group(Box<Expression>),
}

impl Expression {
    pub fn location(&self) -> Option<Location> {
        match self {
            Expression::Literal(_) => None,
            Expression::Name(_, location)
            | Expression::Index { location, .. }
            | Expression::Call { location, .. }
            | Expression::MethodCall { location, .. }
            | Expression::Table(_, location)
            | Expression::BinaryOp { location, .. }
            | Expression::UnaryOp { location, .. }
            | Expression::Vararg(location) => Some(*location),
            Expression::Function(body) => Some(body.location),
            Expression::Group(inner) => inner.location(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    /// Calls and `...` produce every value they yield when they end a list.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Expression::Call { .. } | Expression::MethodCall { .. } | Expression::Vararg(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// `{ x }` / `[x]`
    Positional(Expression),
    /// `{ name = x }` / `{name: x}`
    Named(String, Expression),
    /// `{ [k] = x }`
    Keyed(Expression, Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "//")]
    FloorDivide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "^")]
    Power,
    #[strum(serialize = "..")]
    Concat,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "~=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "#")]
    Length,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_location() {
        let expr = Expression::Call {
            callee: Box::new(Expression::Name("A".to_string(), Location::new(3, 5))),
            arguments: vec![Expression::string("www")],
            location: Location::new(3, 5),
        };
        assert_eq!(expr.location(), Some(Location::new(3, 5)));
        assert_eq!(Expression::string("x").location(), None);
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(BinaryOperator::Concat.to_string(), "..");
        assert_eq!(UnaryOperator::Length.to_string(), "#");
    }
}

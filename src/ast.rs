// Expression-tree node kinds consumed by the evaluator.
//
// The tree is produced by an external parser and handed to `evaluate` by
// reference; serde derives let a pre-parsed tree travel as JSON (this is how
// the `jeval` binary receives expressions). The evaluator never mutates a
// node, so one tree can be evaluated any number of times.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single node of a parsed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// String literal
    String(String),
    /// Number literal
    Number(f64),
    /// Boolean literal
    Boolean(bool),
    /// Null literal
    Null,

    /// Variable reference (`$name`); the empty name is `$`, the context itself
    Variable(String),
    /// Field access by name
    Name(String),
    /// Argument placeholder (`?`) inside a partial application
    Placeholder,

    /// Navigation chain (`a.b[0].c`); `keep_arrays` is set for the
    /// array-preserving form (`a.b[]`)
    Path { steps: Vec<Node>, keep_arrays: bool },

    /// Numeric negation (`-x`)
    Negation(Box<Node>),
    /// Inclusive integer range (`a..b`)
    Range { lhs: Box<Node>, rhs: Box<Node> },

    /// Array constructor (`[a, b, c]`)
    Array(Vec<Node>),
    /// Object constructor (`{k: v, ...}`)
    Object(Vec<(Node, Node)>),
    /// Object constructor applied to the result of an expression (`expr{...}`)
    Group {
        expr: Box<Node>,
        pairs: Vec<(Node, Node)>,
    },

    /// Parenthesized expression sequence (`(e1; e2; e3)`)
    Block(Vec<Node>),
    /// Ternary conditional (`cond ? then : else`)
    Conditional {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    /// Variable binding (`$name := expr`)
    Assignment { name: String, value: Box<Node> },

    /// Wildcard (`*`): every direct child value
    Wildcard,
    /// Descendant (`**`): every value at any depth
    Descendant,

    /// Base expression with one or more filters (`expr[f1][f2]`)
    Predicate { expr: Box<Node>, filters: Vec<Node> },
    /// Sort (`expr^(terms)`)
    Sort { expr: Box<Node>, terms: Vec<SortTerm> },

    /// Lambda definition (`function($a, $b) { body }`)
    Lambda { params: Vec<String>, body: Box<Node> },
    /// Lambda with declared parameter types
    TypedLambda {
        params: Vec<String>,
        types: Vec<ParamType>,
        body: Box<Node>,
    },
    /// Object transform (`|pattern|update, delete|`)
    Transform {
        pattern: Box<Node>,
        update: Box<Node>,
        deletes: Option<Box<Node>>,
    },

    /// Partial application (`f(?, x)`)
    Partial { func: Box<Node>, args: Vec<Node> },
    /// Function invocation (`f(a, b)`)
    FunctionCall { func: Box<Node>, args: Vec<Node> },
    /// Function application / pipeline (`x ~> f`)
    Apply { lhs: Box<Node>, rhs: Box<Node> },

    /// Arithmetic (`+ - * / %`)
    Numeric {
        op: NumericOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Comparison, equality and membership
    Comparison {
        op: ComparisonOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Short-circuiting `and` / `or`
    Logical {
        op: LogicalOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// String concatenation (`&`)
    Concat { lhs: Box<Node>, rhs: Box<Node> },
}

/// One term of a sort expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortTerm {
    pub expr: Node,
    pub dir: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Declared parameter type of a typed lambda. The signature grammar itself is
/// a parser concern; the evaluator only consumes the decoded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Number,
    String,
    Bool,
    Array,
    Object,
    Function,
    Any,
}

impl ParamType {
    pub fn describe(self) -> &'static str {
        match self {
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Bool => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Function => "function",
            ParamType::Any => "any",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for NumericOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumericOp::Add => "+",
            NumericOp::Subtract => "-",
            NumericOp::Multiply => "*",
            NumericOp::Divide => "/",
            NumericOp::Modulo => "%",
        })
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::In => "in",
        })
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        })
    }
}

impl Node {
    /// Shorthand for a field-access path (`a.b.c`).
    pub fn path(names: &[&str]) -> Node {
        Node::Path {
            steps: names.iter().map(|n| Node::Name((*n).into())).collect(),
            keep_arrays: false,
        }
    }

    pub fn string(s: impl Into<String>) -> Node {
        Node::String(s.into())
    }

    pub fn number(n: f64) -> Node {
        Node::Number(n)
    }

    pub fn variable(name: impl Into<String>) -> Node {
        Node::Variable(name.into())
    }

    pub fn name(name: impl Into<String>) -> Node {
        Node::Name(name.into())
    }
}

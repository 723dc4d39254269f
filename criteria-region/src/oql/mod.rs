//! OQL compiler
//!
//! Turns criteria expressions and queries into OQL text for a region's
//! query service. Constants are either inlined as literals or, in bind
//! variable mode, replaced by `$1..$n` placeholders in depth-first,
//! left-to-right order with their values collected alongside the text.
//!
//! Logical compositions are always parenthesised, so nesting never depends
//! on operator precedence.

pub mod keys;

pub use keys::extract_keys;

use criteria_core::{BackendError, Expression, Operator, Path, Query, Value};

/// Compiled OQL text with the values bound to its placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OqlWithVariables {
    variables: Vec<Value>,
    oql: String,
}

impl OqlWithVariables {
    pub fn new(variables: Vec<Value>, oql: String) -> Self {
        Self { variables, oql }
    }

    pub fn oql(&self) -> &str {
        &self.oql
    }

    /// Values for `$1..$n`, in placeholder order
    pub fn variables(&self) -> &[Value] {
        &self.variables
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.oql, self.variables)
    }
}

/// Renders a path as an OQL attribute reference
pub type PathNaming = fn(&Path) -> String;

/// `address.city`
pub fn dotted(path: &Path) -> String {
    path.to_string_path()
}

/// `e.value.address.city`, for queries over `region.entries e`
pub fn entry_value(path: &Path) -> String {
    format!("e.value.{}", path.to_string_path())
}

/// Expression to OQL compiler
#[derive(Debug, Clone)]
pub struct QueryVisitor {
    bind_variables: bool,
    path_naming: PathNaming,
    variables: Vec<Value>,
}

impl QueryVisitor {
    pub fn new(bind_variables: bool) -> Self {
        Self {
            bind_variables,
            path_naming: dotted,
            variables: Vec::new(),
        }
    }

    pub fn with_path_naming(mut self, path_naming: PathNaming) -> Self {
        self.path_naming = path_naming;
        self
    }

    /// Compile a filter expression into a `WHERE` condition
    pub fn compile(mut self, expression: &Expression) -> Result<OqlWithVariables, OqlError> {
        let oql = self.visit(expression)?;
        Ok(OqlWithVariables::new(self.variables, oql))
    }

    fn visit(&mut self, expression: &Expression) -> Result<String, OqlError> {
        match expression {
            Expression::Constant(constant) => self.operand(constant.value().clone()),
            Expression::Path(path) => Ok((self.path_naming)(path)),
            Expression::Call(call) => {
                let args = call.arguments();
                if !call.operator().arity().accepts(args.len()) {
                    return Err(OqlError::MalformedCall(call.operator()));
                }
                match call.operator() {
                    op @ (Operator::And | Operator::Or) => {
                        let joiner = if op == Operator::And { " AND " } else { " OR " };
                        let parts = args
                            .iter()
                            .map(|arg| self.visit(arg))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(format!("({})", parts.join(joiner)))
                    }
                    Operator::Not => Ok(format!("NOT ({})", self.visit(&args[0])?)),
                    Operator::IsPresent => {
                        let path = self.visit(&args[0])?;
                        Ok(format!("(IS_DEFINED({path}) AND {path} != NULL)"))
                    }
                    Operator::IsAbsent => {
                        let path = self.visit(&args[0])?;
                        Ok(format!("(IS_UNDEFINED({path}) OR {path} = NULL)"))
                    }
                    Operator::In => {
                        let left = self.visit(&args[0])?;
                        let right = self.visit(&args[1])?;
                        Ok(format!("{left} IN {right}"))
                    }
                    Operator::NotIn => {
                        let left = self.visit(&args[0])?;
                        let right = self.visit(&args[1])?;
                        Ok(format!("NOT ({left} IN {right})"))
                    }
                    op @ (Operator::StartsWith | Operator::EndsWith | Operator::Contains) => {
                        let left = self.visit(&args[0])?;
                        let text = args[1]
                            .as_constant()
                            .and_then(|c| c.value().as_str())
                            .ok_or(OqlError::InvalidOperand {
                                operator: op,
                                expected: "a string constant",
                            })?;
                        let escaped = escape_like(text);
                        let pattern = match op {
                            Operator::StartsWith => format!("{escaped}%"),
                            Operator::EndsWith => format!("%{escaped}"),
                            _ => format!("%{escaped}%"),
                        };
                        let right = self.operand(Value::String(pattern))?;
                        Ok(format!("{left} LIKE {right}"))
                    }
                    Operator::Matches => Err(OqlError::UnsupportedOperator(Operator::Matches)),
                    op => {
                        let symbol = comparison_symbol(op)
                            .ok_or(OqlError::UnsupportedOperator(op))?;
                        let left = self.visit(&args[0])?;
                        let right = self.visit(&args[1])?;
                        Ok(format!("{left} {symbol} {right}"))
                    }
                }
            }
        }
    }

    fn operand(&mut self, value: Value) -> Result<String, OqlError> {
        if self.bind_variables {
            self.variables.push(value);
            Ok(format!("${}", self.variables.len()))
        } else {
            literal(&value)
        }
    }
}

fn comparison_symbol(operator: Operator) -> Option<&'static str> {
    match operator {
        Operator::Equal => Some("="),
        Operator::NotEqual => Some("!="),
        Operator::LessThan => Some("<"),
        Operator::LessThanOrEqual => Some("<="),
        Operator::GreaterThan => Some(">"),
        Operator::GreaterThanOrEqual => Some(">="),
        _ => None,
    }
}

/// Render a value as an OQL literal
pub fn literal(value: &Value) -> Result<String, OqlError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int32(i) => Ok(i.to_string()),
        Value::Int64(i) => Ok(format!("{i}L")),
        Value::Float64(f) if f.is_finite() => Ok(format!("{f:?}")),
        Value::Float64(f) => Err(OqlError::UnsupportedLiteral(f.to_string())),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(items) => {
            let items = items.iter().map(literal).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("SET({})", items.join(", ")))
        }
        Value::Object(_) => Err(OqlError::UnsupportedLiteral("object".to_string())),
    }
}

/// Escape LIKE wildcards so `text` matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `SELECT * FROM <region> [WHERE ..] [ORDER BY ..] [LIMIT n] [OFFSET m]`
pub fn compile_select(
    region_path: &str,
    query: &Query,
    bind_variables: bool,
) -> Result<OqlWithVariables, OqlError> {
    let mut oql = format!("SELECT * FROM {region_path}");
    let mut variables = Vec::new();

    if let Some(filter) = query.filter() {
        let condition = QueryVisitor::new(bind_variables).compile(filter)?;
        oql.push_str(" WHERE ");
        oql.push_str(condition.oql());
        variables = condition.variables;
    }

    if !query.collations().is_empty() {
        let order_by = query
            .collations()
            .iter()
            .map(|c| {
                let suffix = if c.direction().is_ascending() { "" } else { " DESC" };
                format!("{}{}", dotted(c.path()), suffix)
            })
            .collect::<Vec<_>>()
            .join(", ");
        oql.push_str(" ORDER BY ");
        oql.push_str(&order_by);
    }

    if let Some(limit) = query.get_limit() {
        oql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.get_offset() {
        oql.push_str(&format!(" OFFSET {offset}"));
    }

    Ok(OqlWithVariables::new(variables, oql))
}

/// `SELECT DISTINCT e.key FROM <region>.entries e WHERE ..`
pub fn compile_key_select(
    region_path: &str,
    filter: &Expression,
    bind_variables: bool,
) -> Result<OqlWithVariables, OqlError> {
    let condition = QueryVisitor::new(bind_variables)
        .with_path_naming(entry_value)
        .compile(filter)?;
    let oql = format!(
        "SELECT DISTINCT e.key FROM {region_path}.entries e WHERE {}",
        condition.oql
    );
    Ok(OqlWithVariables::new(condition.variables, oql))
}

/// OQL compilation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OqlError {
    #[error("Operator {0} has no OQL equivalent")]
    UnsupportedOperator(Operator),

    #[error("Value {0} cannot be written as an OQL literal")]
    UnsupportedLiteral(String),

    #[error("Call to {0} has the wrong number of arguments")]
    MalformedCall(Operator),

    #[error("Operator {operator} expects {expected} as its right operand")]
    InvalidOperand {
        operator: Operator,
        expected: &'static str,
    },
}

impl OqlError {
    /// Surface as a backend error of `backend`
    pub fn into_backend_error(self, backend: &'static str) -> BackendError {
        match self {
            OqlError::UnsupportedOperator(operator) => {
                BackendError::UnsupportedOperator { operator, backend }
            }
            other => BackendError::native(backend, other),
        }
    }
}

//! Evaluation of transpiled fragments, with host containment.
//!
//! Host-visible side effects (alert, confirm, prompt) go through a [`Host`]
//! whose handlers are swappable. [`SuppressGuard`] swaps them for inert
//! no-ops for the duration of a speculative evaluation, so validating a
//! draft fragment never pops dialogs; the real handlers come back when the
//! guard drops, including on an early `?` return.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::ValueFormatError;
use crate::transpiler::{BinaryOperator, EvaluableArtifact, Expr, UnaryOperator};
use crate::value::{Element, FunctionValue, Value};

pub struct Interactive {
    pub alert: Box<dyn FnMut(&str)>,
    pub confirm: Box<dyn FnMut(&str) -> bool>,
    pub prompt: Box<dyn FnMut(&str) -> Option<String>>,
}

impl Interactive {
    pub fn inert() -> Self {
        Self {
            alert: Box::new(|_| ()),
            confirm: Box::new(|_| false),
            prompt: Box::new(|_| None),
        }
    }
}

/// The evaluation host. Cloning shares the same handler cell, so a clone
/// held by a sync context sees handler swaps made through the original.
#[derive(Clone)]
pub struct Host {
    interactive: Rc<RefCell<Interactive>>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            interactive: Rc::new(RefCell::new(Interactive::inert())),
        }
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alert(&self, alert: impl FnMut(&str) + 'static) {
        self.interactive.borrow_mut().alert = Box::new(alert);
    }

    pub fn set_confirm(&self, confirm: impl FnMut(&str) -> bool + 'static) {
        self.interactive.borrow_mut().confirm = Box::new(confirm);
    }

    pub fn set_prompt(&self, prompt: impl FnMut(&str) -> Option<String> + 'static) {
        self.interactive.borrow_mut().prompt = Box::new(prompt);
    }

    fn alert(&self, message: &str) {
        (self.interactive.borrow_mut().alert)(message);
    }

    fn confirm(&self, message: &str) -> bool {
        (self.interactive.borrow_mut().confirm)(message)
    }

    fn prompt(&self, message: &str) -> Option<String> {
        (self.interactive.borrow_mut().prompt)(message)
    }
}

/// Swaps the host's interactive handlers for inert ones; restores the real
/// handlers on drop.
pub struct SuppressGuard {
    interactive: Rc<RefCell<Interactive>>,
    saved: Option<Interactive>,
}

impl SuppressGuard {
    pub fn engage(host: &Host) -> Self {
        let saved = host.interactive.replace(Interactive::inert());
        Self {
            interactive: Rc::clone(&host.interactive),
            saved: Some(saved),
        }
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.interactive.borrow_mut() = saved;
        }
    }
}

/// Evaluate an artifact: statements run in order, the last one's value is
/// the result. An empty artifact yields `Unset`.
pub fn evaluate(artifact: &EvaluableArtifact, host: &Host) -> Result<Value, ValueFormatError> {
    let scope = Scope::empty();
    let mut result = Value::Unset;
    for statement in &artifact.statements {
        result = eval_expr(statement, &scope, host)?;
    }
    Ok(result)
}

/// Invoke a function value with the given arguments. Used when a committed
/// function property is actually called, as opposed to merely validated.
pub fn call_function(
    function: &FunctionValue,
    arguments: &[Value],
    host: &Host,
) -> Result<Value, ValueFormatError> {
    let mut bindings = Vec::with_capacity(function.parameters.len());
    for (index, parameter) in function.parameters.iter().enumerate() {
        let argument = arguments.get(index).cloned().unwrap_or(Value::Unset);
        bindings.push((parameter.clone(), argument));
    }
    let scope = Scope { bindings };

    let mut result = Value::Unset;
    for statement in function.body.iter() {
        result = eval_expr(statement, &scope, host)?;
    }
    Ok(result)
}

struct Scope {
    bindings: Vec<(String, Value)>,
}

impl Scope {
    fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(binding, _)| binding == name)
            .map(|(_, value)| value)
    }
}

fn eval_expr(expr: &Expr, scope: &Scope, host: &Host) -> Result<Value, ValueFormatError> {
    let value = match expr {
        Expr::Number(number) => Value::Number(*number),
        Expr::Text(text) => Value::Text(Arc::from(text.as_str())),
        Expr::Bool(value) => Value::Bool(*value),
        Expr::Null => Value::Null,
        Expr::Object { entries } => Value::Object(
            entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), eval_expr(value, scope, host)?)))
                .collect::<Result<_, ValueFormatError>>()?,
        ),
        Expr::Array { items } => Value::Array(
            items
                .iter()
                .map(|item| eval_expr(item, scope, host))
                .collect::<Result<_, ValueFormatError>>()?,
        ),
        Expr::Function {
            parameters,
            body,
            source,
        } => Value::Function(FunctionValue {
            parameters: parameters.clone(),
            body: Arc::new(body.clone()),
            source: Arc::from(source.as_str()),
        }),
        Expr::Path(path) => eval_path(path, scope)?,
        Expr::Call { path, arguments } => {
            let arguments = arguments
                .iter()
                .map(|argument| eval_expr(argument, scope, host))
                .collect::<Result<Vec<_>, _>>()?;
            eval_call(path, &arguments, scope, host)?
        }
        Expr::Unary { operator, operand } => {
            let operand = eval_expr(operand, scope, host)?;
            eval_unary(*operator, &operand)?
        }
        Expr::Binary {
            operator,
            operand_a,
            operand_b,
        } => {
            let a = eval_expr(operand_a, scope, host)?;
            let b = eval_expr(operand_b, scope, host)?;
            eval_binary(*operator, &a, &b)?
        }
    };
    Ok(value)
}

fn eval_path(path: &[String], scope: &Scope) -> Result<Value, ValueFormatError> {
    let (head, rest) = path
        .split_first()
        .ok_or_else(|| ValueFormatError::Evaluation("empty path".to_owned()))?;

    let mut value = scope
        .lookup(head)
        .cloned()
        .ok_or_else(|| ValueFormatError::Evaluation(format!("'{head}' is not defined")))?;

    for part in rest {
        value = match value {
            Value::Object(entries) => entries
                .into_iter()
                .find(|(key, _)| key == part)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    ValueFormatError::Evaluation(format!("no member '{part}'"))
                })?,
            other => {
                return Err(ValueFormatError::Evaluation(format!(
                    "cannot read '{part}' of a {}",
                    other.kind_name()
                )));
            }
        };
    }
    Ok(value)
}

fn eval_call(
    path: &[String],
    arguments: &[Value],
    scope: &Scope,
    host: &Host,
) -> Result<Value, ValueFormatError> {
    let parts: Vec<&str> = path.iter().map(String::as_str).collect();
    match parts.as_slice() {
        ["el"] => build_element(arguments),
        ["alert"] | ["window", "alert"] => {
            host.alert(&display_argument(arguments));
            Ok(Value::Unset)
        }
        ["confirm"] | ["window", "confirm"] => {
            Ok(Value::Bool(host.confirm(&display_argument(arguments))))
        }
        ["prompt"] | ["window", "prompt"] => {
            Ok(match host.prompt(&display_argument(arguments)) {
                Some(reply) => Value::Text(Arc::from(reply.as_str())),
                None => Value::Null,
            })
        }
        ["console", "log"] => {
            tracing::debug!(message = %display_argument(arguments), "console.log");
            Ok(Value::Unset)
        }
        _ => match eval_path(path, scope)? {
            Value::Function(function) => call_function(&function, arguments, host),
            Value::NativeCallback(callback) => Ok(callback(arguments)),
            other => Err(ValueFormatError::Evaluation(format!(
                "'{}' is not callable (a {})",
                path.join("."),
                other.kind_name()
            ))),
        },
    }
}

fn build_element(arguments: &[Value]) -> Result<Value, ValueFormatError> {
    let mut arguments = arguments.iter();
    let tag = match arguments.next() {
        Some(Value::Text(tag)) => tag.to_string(),
        _ => {
            return Err(ValueFormatError::Evaluation(
                "el() needs a tag name".to_owned(),
            ));
        }
    };
    let attributes = match arguments.next() {
        Some(Value::Object(entries)) => entries.clone(),
        None => Vec::new(),
        Some(other) => {
            return Err(ValueFormatError::Evaluation(format!(
                "el() attributes must be an object, got {}",
                other.kind_name()
            )));
        }
    };
    let children = match arguments.next() {
        Some(Value::Array(items)) => items.clone(),
        None => Vec::new(),
        Some(other) => vec![other.clone()],
    };
    Ok(Value::Markup(Element {
        tag,
        attributes,
        children,
    }))
}

fn display_argument(arguments: &[Value]) -> String {
    match arguments.first() {
        None => String::new(),
        Some(Value::Text(text)) => text.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(value)) => value.to_string(),
        Some(Value::Null) => "null".to_owned(),
        Some(other) => format!("{other:?}"),
    }
}

fn eval_unary(operator: UnaryOperator, operand: &Value) -> Result<Value, ValueFormatError> {
    match (operator, operand) {
        (UnaryOperator::Negate, Value::Number(number)) => Ok(Value::Number(-number)),
        (UnaryOperator::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (operator, operand) => Err(ValueFormatError::Evaluation(format!(
            "cannot apply {operator:?} to a {}",
            operand.kind_name()
        ))),
    }
}

fn eval_binary(
    operator: BinaryOperator,
    a: &Value,
    b: &Value,
) -> Result<Value, ValueFormatError> {
    use BinaryOperator::*;
    match operator {
        Add => match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            // `+` concatenates when either side is text, as users expect.
            (Value::Text(a), b) => Ok(Value::Text(Arc::from(format!(
                "{a}{}",
                display_argument(&[b.clone()])
            )))),
            (a, Value::Text(b)) => Ok(Value::Text(Arc::from(format!(
                "{}{b}",
                display_argument(&[a.clone()])
            )))),
            (a, b) => Err(numeric_operands_error("+", a, b)),
        },
        Subtract | Multiply | Divide => match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match operator {
                Subtract => a - b,
                Multiply => a * b,
                _ => a / b,
            })),
            (a, b) => Err(numeric_operands_error(symbol(operator), a, b)),
        },
        Equal => Ok(Value::Bool(a == b)),
        NotEqual => Ok(Value::Bool(a != b)),
        Less | LessOrEqual | Greater | GreaterOrEqual => match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(match operator {
                Less => a < b,
                LessOrEqual => a <= b,
                Greater => a > b,
                _ => a >= b,
            })),
            (a, b) => Err(numeric_operands_error(symbol(operator), a, b)),
        },
    }
}

fn symbol(operator: BinaryOperator) -> &'static str {
    use BinaryOperator::*;
    match operator {
        Add => "+",
        Subtract => "-",
        Multiply => "*",
        Divide => "/",
        Equal => "==",
        NotEqual => "!=",
        Less => "<",
        LessOrEqual => "<=",
        Greater => ">",
        GreaterOrEqual => ">=",
    }
}

fn numeric_operands_error(symbol: &str, a: &Value, b: &Value) -> ValueFormatError {
    ValueFormatError::Evaluation(format!(
        "'{symbol}' needs numbers, got {} and {}",
        a.kind_name(),
        b.kind_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::transpile;
    use std::cell::Cell;

    fn eval(source: &str, host: &Host) -> Value {
        evaluate(&transpile(source).unwrap(), host).unwrap()
    }

    #[test]
    fn last_statement_wins() {
        let host = Host::new();
        assert_eq!(eval("1; 2; 3", &host), Value::Number(3.0));
    }

    #[test]
    fn empty_fragment_is_unset() {
        let host = Host::new();
        assert_eq!(
            evaluate(&transpile("").unwrap(), &host).unwrap(),
            Value::Unset
        );
    }

    #[test]
    fn alert_goes_through_the_host() {
        let host = Host::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        host.set_alert(move |message| sink.borrow_mut().push(message.to_owned()));

        eval("window.alert('hi'); alert('again')", &host);
        assert_eq!(*seen.borrow(), vec!["hi".to_owned(), "again".to_owned()]);
    }

    #[test]
    fn suppress_guard_silences_and_restores() {
        let host = Host::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        host.set_alert(move |_| counter.set(counter.get() + 1));

        {
            let _guard = SuppressGuard::engage(&host);
            eval("alert('silent')", &host);
            assert_eq!(count.get(), 0);
        }
        eval("alert('loud')", &host);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn confirm_result_flows_back() {
        let host = Host::new();
        host.set_confirm(|_| true);
        assert_eq!(eval("confirm('sure?')", &host), Value::Bool(true));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        let host = Host::new();
        assert_eq!(eval("2 + 3 * 4", &host), Value::Number(14.0));
        assert_eq!(
            eval("'n = ' + 5", &host),
            Value::Text(Arc::from("n = 5"))
        );
    }

    #[test]
    fn function_values_are_callable() {
        let host = Host::new();
        let value = eval("(a, b) => a + b", &host);
        let Value::Function(function) = value else {
            panic!("expected a function");
        };
        let result =
            call_function(&function, &[Value::Number(2.0), Value::Number(40.0)], &host).unwrap();
        assert_eq!(result, Value::Number(42.0));
    }

    #[test]
    fn markup_evaluates_to_an_element() {
        let host = Host::new();
        let value = eval("<div id='x'>hello</div>", &host);
        let Value::Markup(element) = value else {
            panic!("expected markup");
        };
        assert_eq!(element.tag, "div");
        assert_eq!(element.children, vec![Value::Text(Arc::from("hello"))]);
    }

    #[test]
    fn evaluation_error_is_reported() {
        let host = Host::new();
        let error = evaluate(&transpile("missing(1)").unwrap(), &host).unwrap_err();
        assert!(matches!(error, ValueFormatError::Evaluation(_)));
    }
}

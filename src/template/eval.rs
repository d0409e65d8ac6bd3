//! Executing a parsed template against [`TemplateParameters`].
use super::params::{PREFIX, Param, TemplateParameters};
use super::parse::{Builtin, Expr, Node};
use crate::error::TemplateError;
use crate::paths;

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    const fn truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::List(l) => !l.is_empty(),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::List(l) => format!("[{}]", l.join(" ")),
        }
    }

    fn equals(&self, other: &Self) -> Result<bool, String> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(a == b),
            (Self::Bool(a), Self::Bool(b)) => Ok(a == b),
            _ => Err("incompatible types for comparison".to_string()),
        }
    }
}

fn exec_err(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Exec {
        line,
        message: message.into(),
    }
}

/// Render `nodes` to a string.
pub(super) fn execute(nodes: &[Node], params: &TemplateParameters) -> Result<String, TemplateError> {
    let mut out = String::new();
    execute_into(nodes, params, &mut out)?;
    Ok(out)
}

fn execute_into(
    nodes: &[Node],
    params: &TemplateParameters,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Output { expr, line } => out.push_str(&eval(expr, params, *line)?.render()),
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = None;
                for branch in branches {
                    if eval(&branch.cond, params, branch.line)?.truthy() {
                        taken = Some(&branch.body);
                        break;
                    }
                }
                execute_into(taken.unwrap_or(otherwise), params, out)?;
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, params: &TemplateParameters, line: usize) -> Result<Value, TemplateError> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Field(param) => field(*param, params, line),
        Expr::Method { param, arg } => {
            let Value::Str(arg) = eval(arg, params, line)? else {
                return Err(exec_err(
                    line,
                    format!("{} expects a string argument", param.name()),
                ));
            };
            method(*param, &arg, params, line)
        }
        Expr::Call { func, args } => call(*func, args, params, line),
    }
}

fn field(param: Param, params: &TemplateParameters, line: usize) -> Result<Value, TemplateError> {
    match param {
        Param::Os => Ok(Value::Str(params.os.clone())),
        Param::Arch => Ok(Value::Str(params.arch.clone())),
        Param::Host => Ok(Value::Str(params.host.clone())),
        Param::Categories => Ok(Value::List(params.categories.clone())),
        Param::HasCategory | Param::Env | Param::Exists | Param::Read => Err(exec_err(
            line,
            format!("{PREFIX}{} takes exactly 1 argument", param.name()),
        )),
    }
}

fn method(
    param: Param,
    arg: &str,
    params: &TemplateParameters,
    line: usize,
) -> Result<Value, TemplateError> {
    match param {
        Param::HasCategory => Ok(Value::Bool(params.has_category(arg))),
        Param::Env => Ok(Value::Str(params.env_var(arg).to_string())),
        Param::Exists => Ok(Value::Bool(paths::exists(&params.expand_path(arg)))),
        Param::Read => {
            let path = params.expand_path(arg);
            let mut content = std::fs::read_to_string(&path)
                .map_err(|e| exec_err(line, format!("reading {}: {e}", path.display())))?;
            if content.ends_with('\n') {
                content.pop();
                if content.ends_with('\r') {
                    content.pop();
                }
            }
            Ok(Value::Str(content))
        }
        Param::Os | Param::Arch | Param::Host | Param::Categories => Err(exec_err(
            line,
            format!("{} is not a method", param.name()),
        )),
    }
}

fn call(
    func: Builtin,
    args: &[Expr],
    params: &TemplateParameters,
    line: usize,
) -> Result<Value, TemplateError> {
    match func {
        Builtin::Eq | Builtin::Ne => {
            let mut values = args.iter().map(|a| eval(a, params, line));
            let first = values
                .next()
                .ok_or_else(|| exec_err(line, "missing arguments"))??;
            let mut any_equal = false;
            for value in values {
                if first.equals(&value?).map_err(|m| exec_err(line, m))? {
                    any_equal = true;
                    break;
                }
            }
            Ok(Value::Bool(if func == Builtin::Eq {
                any_equal
            } else {
                !any_equal
            }))
        }
        Builtin::Not => {
            let value = args
                .first()
                .map(|a| eval(a, params, line))
                .ok_or_else(|| exec_err(line, "missing argument"))??;
            Ok(Value::Bool(!value.truthy()))
        }
        Builtin::And | Builtin::Or => {
            let want = func == Builtin::Or;
            let mut last = Value::Bool(!want);
            for arg in args {
                last = eval(arg, params, line)?;
                if last.truthy() == want {
                    break;
                }
            }
            Ok(last)
        }
    }
}

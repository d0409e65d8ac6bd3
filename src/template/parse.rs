//! Splitting template text into actions and parsing them into a tree.
use super::params::{PREFIX, Param};
use crate::error::TemplateError;

/// A piece of template text after delimiter handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Segment {
    Text(String),
    /// Body of a `{{ … }}` action with delimiters and trim markers removed.
    Action { body: String, line: usize },
}

/// A node of the parsed template tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Node {
    Text(String),
    Output { expr: Expr, line: usize },
    If { branches: Vec<Branch>, otherwise: Vec<Node> },
}

/// One `if` / `else if` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Branch {
    pub cond: Expr,
    pub line: usize,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Builtin {
    Eq,
    Ne,
    Not,
    And,
    Or,
}

impl Builtin {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "not" => Some(Self::Not),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Accepted argument counts as `(min, max)`.
    const fn arity(self) -> (usize, usize) {
        match self {
            Self::Eq => (2, usize::MAX),
            Self::Ne => (2, 2),
            Self::Not => (1, 1),
            Self::And | Self::Or => (1, usize::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Expr {
    Str(String),
    Bool(bool),
    Field(Param),
    Method { param: Param, arg: Box<Expr> },
    Call { func: Builtin, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Param(Param),
    Str(String),
    LParen,
    RParen,
}

fn parse_err(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        line,
        message: message.into(),
    }
}

/// Split `text` into literal text and action bodies, honouring `{{-`/`-}}`
/// trim markers and dropping `{{/* … */}}` comments.
pub(super) fn split(text: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut line = 1;
    let mut trim_next = false;

    while let Some((before, after)) = rest.split_once("{{") {
        let (after, trim_left) = match after.strip_prefix('-') {
            Some(r) if r.starts_with(char::is_whitespace) => (r, true),
            _ => (after, false),
        };

        let mut chunk = before;
        if trim_left {
            chunk = chunk.trim_end();
        }
        if trim_next {
            chunk = chunk.trim_start();
        }
        push_text(&mut segments, chunk);
        line += before.matches('\n').count();

        let (inner, tail) = find_close(after)
            .and_then(|close| after.split_at_checked(close))
            .ok_or_else(|| parse_err(line, "unclosed action"))?;
        rest = tail.strip_prefix("}}").unwrap_or(tail);
        let action_line = line;
        line += inner.matches('\n').count();

        let mut body = inner.trim();
        trim_next = false;
        if let Some(stripped) = body.strip_suffix('-')
            && (stripped.is_empty() || stripped.ends_with(char::is_whitespace))
        {
            body = stripped.trim_end();
            trim_next = true;
        }

        if body.starts_with("/*") {
            if !body.ends_with("*/") || body.len() < 4 {
                return Err(parse_err(action_line, "comment must fill the whole action"));
            }
            continue;
        }
        segments.push(Segment::Action {
            body: body.to_string(),
            line: action_line,
        });
    }

    let mut tail = rest;
    if trim_next {
        tail = tail.trim_start();
    }
    push_text(&mut segments, tail);
    Ok(segments)
}

fn push_text(segments: &mut Vec<Segment>, chunk: &str) {
    if !chunk.is_empty() {
        segments.push(Segment::Text(chunk.to_string()));
    }
}

/// Byte index of the `}}` closing an action whose body starts `inner`.
fn find_close(inner: &str) -> Option<usize> {
    let trimmed = inner.trim_start();
    if let Some(comment) = trimmed.strip_prefix("/*") {
        let end = inner.len() - comment.len() + comment.find("*/")? + 2;
        return inner.get(end..)?.find("}}").map(|i| i + end);
    }
    let bytes = inner.as_bytes();
    let mut in_str = false;
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' if in_str => i += 1,
            b'"' => in_str = !in_str,
            b'}' if !in_str && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn tokenize(body: &str, line: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(read_string(&mut chars, line)?));
            }
            '$' => {
                let mut end = body.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                let reference = body.get(start..end).unwrap_or_default();
                let name = reference
                    .strip_prefix(PREFIX)
                    .ok_or_else(|| parse_err(line, format!("unsupported reference {reference}")))?;
                let param = Param::from_name(name)
                    .ok_or_else(|| parse_err(line, format!("unknown parameter {reference}")))?;
                tokens.push(Token::Param(param));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(parse_err(line, format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    line: usize,
) -> Result<String, TemplateError> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '"' => return Ok(out),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, c @ ('"' | '\\'))) => out.push(c),
                Some((_, c)) => {
                    return Err(parse_err(line, format!("unknown escape sequence \\{c}")));
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(parse_err(line, "unterminated string"))
}

enum Operand {
    Expr(Expr),
    Func(Builtin),
    Method(Param),
}

/// Parse a command: a function or method applied to operands, or a
/// single operand.
fn parse_command(
    tokens: &[Token],
    idx: &mut usize,
    line: usize,
    nested: bool,
) -> Result<Expr, TemplateError> {
    let mut operands = Vec::new();
    loop {
        match tokens.get(*idx) {
            None if nested => return Err(parse_err(line, "unclosed left paren")),
            None => break,
            Some(Token::RParen) if nested => {
                *idx += 1;
                break;
            }
            Some(Token::RParen) => return Err(parse_err(line, "unexpected right paren")),
            Some(Token::LParen) => {
                *idx += 1;
                operands.push(Operand::Expr(parse_command(tokens, idx, line, true)?));
            }
            Some(Token::Str(s)) => {
                *idx += 1;
                operands.push(Operand::Expr(Expr::Str(s.clone())));
            }
            Some(Token::Param(p)) => {
                *idx += 1;
                operands.push(if p.arity() == 0 {
                    Operand::Expr(Expr::Field(*p))
                } else {
                    Operand::Method(*p)
                });
            }
            Some(Token::Word(w)) => {
                *idx += 1;
                operands.push(match w.as_str() {
                    "true" => Operand::Expr(Expr::Bool(true)),
                    "false" => Operand::Expr(Expr::Bool(false)),
                    other => Operand::Func(Builtin::from_word(other).ok_or_else(|| {
                        parse_err(line, format!("function \"{other}\" not defined"))
                    })?),
                });
            }
        }
    }

    let mut operands = operands.into_iter();
    let head = operands
        .next()
        .ok_or_else(|| parse_err(line, "missing value for command"))?;
    let args = operands
        .map(|op| match op {
            Operand::Expr(e) => Ok(e),
            Operand::Func(f) => Err(parse_err(
                line,
                format!("function \"{}\" must be called in parentheses", f.name()),
            )),
            Operand::Method(p) => Err(parse_err(
                line,
                format!("{PREFIX}{} must be called in parentheses", p.name()),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match head {
        Operand::Func(func) => {
            let (min, max) = func.arity();
            if args.len() < min || args.len() > max {
                return Err(parse_err(
                    line,
                    format!(
                        "wrong number of args for {}: got {}",
                        func.name(),
                        args.len()
                    ),
                ));
            }
            Ok(Expr::Call { func, args })
        }
        Operand::Method(param) => {
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(arg), None) => Ok(Expr::Method {
                    param,
                    arg: Box::new(arg),
                }),
                _ => Err(parse_err(
                    line,
                    format!("{PREFIX}{} takes exactly 1 argument", param.name()),
                )),
            }
        }
        Operand::Expr(expr) if args.is_empty() => Ok(expr),
        Operand::Expr(_) => Err(parse_err(
            line,
            "can't give argument to non-function",
        )),
    }
}

/// Control structure of a single action.
enum Item {
    Text(String),
    Output(Expr, usize),
    If(Expr, usize),
    ElseIf(Expr, usize),
    Else(usize),
    End(usize),
}

fn classify(body: &str, line: usize) -> Result<Item, TemplateError> {
    let tokens = tokenize(body, line)?;
    let mut idx = 0;
    match tokens.first() {
        Some(Token::Word(w)) if w == "if" => {
            idx = 1;
            Ok(Item::If(parse_command(&tokens, &mut idx, line, false)?, line))
        }
        Some(Token::Word(w)) if w == "end" => {
            if tokens.len() > 1 {
                return Err(parse_err(line, "unexpected tokens after end"));
            }
            Ok(Item::End(line))
        }
        Some(Token::Word(w)) if w == "else" => match tokens.get(1) {
            None => Ok(Item::Else(line)),
            Some(Token::Word(w)) if w == "if" => {
                idx = 2;
                Ok(Item::ElseIf(
                    parse_command(&tokens, &mut idx, line, false)?,
                    line,
                ))
            }
            Some(_) => Err(parse_err(line, "unexpected tokens after else")),
        },
        _ => Ok(Item::Output(
            parse_command(&tokens, &mut idx, line, false)?,
            line,
        )),
    }
}

/// Build the node tree from split segments.
pub(super) fn build(segments: Vec<Segment>) -> Result<Vec<Node>, TemplateError> {
    let items = segments
        .into_iter()
        .map(|seg| match seg {
            Segment::Text(t) => Ok(Item::Text(t)),
            Segment::Action { body, line } => classify(&body, line),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = items.into_iter();
    let (nodes, terminator) = parse_list(&mut items)?;
    match terminator {
        None => Ok(nodes),
        Some(Item::End(line)) => Err(parse_err(line, "unexpected {{end}}")),
        Some(Item::Else(line) | Item::ElseIf(_, line)) => {
            Err(parse_err(line, "unexpected {{else}}"))
        }
        Some(_) => Err(parse_err(0, "unexpected parser state")),
    }
}

/// Parse nodes until the input ends or an `else`/`end` is reached; the
/// terminator is returned to the caller.
fn parse_list(
    items: &mut impl Iterator<Item = Item>,
) -> Result<(Vec<Node>, Option<Item>), TemplateError> {
    let mut nodes = Vec::new();
    while let Some(item) = items.next() {
        match item {
            Item::Text(t) => nodes.push(Node::Text(t)),
            Item::Output(expr, line) => nodes.push(Node::Output { expr, line }),
            Item::If(cond, line) => nodes.push(parse_if(items, cond, line)?),
            term @ (Item::ElseIf(..) | Item::Else(_) | Item::End(_)) => {
                return Ok((nodes, Some(term)));
            }
        }
    }
    Ok((nodes, None))
}

fn parse_if(
    items: &mut impl Iterator<Item = Item>,
    cond: Expr,
    if_line: usize,
) -> Result<Node, TemplateError> {
    let mut branches = Vec::new();
    let mut cond = cond;
    let mut line = if_line;
    loop {
        let (body, terminator) = parse_list(items)?;
        branches.push(Branch { cond, line, body });
        match terminator {
            Some(Item::End(_)) => {
                return Ok(Node::If {
                    branches,
                    otherwise: Vec::new(),
                });
            }
            Some(Item::ElseIf(next, next_line)) => {
                cond = next;
                line = next_line;
            }
            Some(Item::Else(_)) => {
                let (otherwise, terminator) = parse_list(items)?;
                return match terminator {
                    Some(Item::End(_)) => Ok(Node::If {
                        branches,
                        otherwise,
                    }),
                    Some(Item::Else(l) | Item::ElseIf(_, l)) => {
                        Err(parse_err(l, "unexpected {{else}} after {{else}}"))
                    }
                    _ => Err(parse_err(if_line, "unclosed {{if}}")),
                };
            }
            _ => return Err(parse_err(if_line, "unclosed {{if}}")),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn action(body: &str, line: usize) -> Segment {
        Segment::Action {
            body: body.to_string(),
            line,
        }
    }

    fn text(t: &str) -> Segment {
        Segment::Text(t.to_string())
    }

    #[test]
    fn split_plain_text() {
        assert_eq!(split("no macros\n").unwrap(), vec![text("no macros\n")]);
    }

    #[test]
    fn split_tracks_lines() {
        let segs = split("a\nb {{ x }}\n{{ y }}").unwrap();
        assert_eq!(
            segs,
            vec![text("a\nb "), action("x", 2), text("\n"), action("y", 3)]
        );
    }

    #[test]
    fn split_counts_lines_inside_actions() {
        let segs = split("a{{ if\n x }}b\n{{/* two\nlines */}}{{ y }}").unwrap();
        assert_eq!(
            segs,
            vec![text("a"), action("if\n x", 1), text("b\n"), action("y", 4)]
        );
    }

    #[test]
    fn split_honours_trim_markers() {
        let segs = split("a  \n{{- x -}}\n  b").unwrap();
        assert_eq!(segs, vec![text("a"), action("x", 2), text("b")]);
    }

    #[test]
    fn split_drops_comments() {
        let segs = split("a{{/* note }} here */}}b").unwrap();
        assert_eq!(segs, vec![text("a"), text("b")]);
    }

    #[test]
    fn split_ignores_braces_in_strings() {
        let segs = split(r#"{{ eq "}}" "x" }}"#).unwrap();
        assert_eq!(segs, vec![action(r#"eq "}}" "x""#, 1)]);
    }

    #[test]
    fn split_unclosed_action() {
        let err = split("line\n{{ if").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Parse {
                line: 2,
                message: "unclosed action".to_string()
            }
        );
    }

    #[test]
    fn tokenize_rejects_unknown_parameter() {
        let err = tokenize("$.Dotfiles.Shell", 1).unwrap_err();
        assert!(err.to_string().contains("unknown parameter $.Dotfiles.Shell"));
    }

    #[test]
    fn tokenize_string_escapes() {
        let tokens = tokenize(r#""a\"b\n""#, 1).unwrap();
        assert_eq!(tokens, vec![Token::Str("a\"b\n".to_string())]);
    }

    #[test]
    fn build_if_else_chain() {
        let segs = split(
            r#"{{ if eq $.Dotfiles.OS "linux" }}L{{ else if $.Dotfiles.Host }}H{{ else }}O{{ end }}"#,
        )
        .unwrap();
        let nodes = build(segs).unwrap();
        let [Node::If { branches, otherwise }] = nodes.as_slice() else {
            panic!("expected a single if node, got {nodes:?}");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise, &vec![Node::Text("O".to_string())]);
        assert_eq!(branches[1].cond, Expr::Field(Param::Host));
    }

    #[test]
    fn build_method_call() {
        let nodes = build(split(r#"{{ $.Dotfiles.Env "EDITOR" }}"#).unwrap()).unwrap();
        assert_eq!(
            nodes,
            vec![Node::Output {
                expr: Expr::Method {
                    param: Param::Env,
                    arg: Box::new(Expr::Str("EDITOR".to_string())),
                },
                line: 1,
            }]
        );
    }

    #[test]
    fn build_rejects_unclosed_if() {
        let err = build(split("{{ if $.Dotfiles.Host }}x").unwrap()).unwrap_err();
        assert!(err.to_string().contains("unclosed {{if}}"));
    }

    #[test]
    fn build_rejects_stray_end() {
        let err = build(split("x\n{{ end }}").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "line 2: unexpected {{end}}");
    }

    #[test]
    fn build_rejects_bad_arity() {
        let err = build(split(r#"{{ ne $.Dotfiles.OS }}"#).unwrap()).unwrap_err();
        assert!(err.to_string().contains("wrong number of args for ne"));
        let err = build(split(r#"{{ eq $.Dotfiles.Env "X" }}"#).unwrap()).unwrap_err();
        assert!(err.to_string().contains("must be called in parentheses"));
    }

    #[test]
    fn build_parenthesised_subexpression() {
        let nodes = build(
            split(r#"{{ if and (eq $.Dotfiles.OS "linux") ($.Dotfiles.HasCategory "work") }}y{{ end }}"#)
                .unwrap(),
        )
        .unwrap();
        let [Node::If { branches, .. }] = nodes.as_slice() else {
            panic!("expected a single if node, got {nodes:?}");
        };
        let Expr::Call { func, args } = &branches[0].cond else {
            panic!("expected a call");
        };
        assert_eq!(*func, Builtin::And);
        assert_eq!(args.len(), 2);
    }
}

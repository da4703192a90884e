//! Go `text/template` support for command and `solo.rb` templates.
//!
//! Templates are written in Go template syntax (`{{.Version}}`,
//! `{{if .Version}} -v {{.Version}}{{end}}`) and translated into minijinja
//! source before rendering. The supported subset covers field output,
//! `if`/`else if`/`else`/`end` blocks, comments, `{{-` and `-}}` trim
//! markers, literals, parentheses, and the `not`, `and`, `or`, `eq`, `ne`,
//! `lt`, `le`, `gt`, `ge` and `len` functions. Variables, pipelines and the
//! remaining actions are rejected.

use std::iter::Peekable;
use std::str::{CharIndices, Chars};

use thiserror::Error;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

/// Raised when a template uses syntax outside the supported subset.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("template: {0}")]
pub struct SyntaxError(String);

impl SyntaxError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Translates a Go template into equivalent minijinja source.
///
/// # Errors
///
/// Returns [`SyntaxError`] when an action is malformed, unbalanced, or uses
/// an unsupported construct.
pub fn translate(source: &str) -> Result<String, SyntaxError> {
    let mut out = String::with_capacity(source.len());
    let mut depth = 0_usize;
    let mut trim_leading = false;
    let mut rest = source;

    while let Some((before, after)) = rest.split_once(LEFT_DELIM) {
        let action = split_action(after)?;
        let mut text = before;
        if trim_leading {
            text = text.trim_start_matches(is_space);
        }
        if action.trim_left {
            text = text.trim_end_matches(is_space);
        }
        push_text(&mut out, text);
        translate_action(action.body, &mut depth, &mut out)?;

        trim_leading = action.trim_right;
        rest = action.rest;
    }

    if trim_leading {
        rest = rest.trim_start_matches(is_space);
    }
    push_text(&mut out, rest);

    if depth > 0 {
        return Err(SyntaxError::new("unexpected EOF: missing {{end}}"));
    }
    Ok(out)
}

const fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

fn push_text(out: &mut String, text: &str) {
    let escaped = text
        .replace("{%", r#"{{ "{%" }}"#)
        .replace("{#", r#"{{ "{#" }}"#);
    // A trailing brace would fuse with the next tag's opening delimiter.
    let (head, brace) = escaped
        .strip_suffix('{')
        .map_or((escaped.as_str(), ""), |head| (head, r#"{{ "{" }}"#));
    out.push_str(head);
    out.push_str(brace);
}

struct Action<'a> {
    body: &'a str,
    trim_left: bool,
    trim_right: bool,
    rest: &'a str,
}

/// Splits the action starting right after `{{` from the text that follows.
fn split_action(after: &str) -> Result<Action<'_>, SyntaxError> {
    let (trim_left, inner) = match after.strip_prefix('-') {
        Some(stripped) if stripped.starts_with(is_space) => (true, stripped),
        _ => (false, after),
    };
    let (raw_body, rest) = split_at_close(inner)?;
    let (trim_right, body) = match raw_body.strip_suffix('-') {
        Some(stripped) if stripped.ends_with(is_space) => (true, stripped),
        _ => (false, raw_body),
    };

    Ok(Action {
        body,
        trim_left,
        trim_right,
        rest,
    })
}

/// Finds the closing `}}`, skipping quoted strings and comments.
fn split_at_close(inner: &str) -> Result<(&str, &str), SyntaxError> {
    let mut chars = inner.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' | '`' | '\'' => skip_quoted(&mut chars, ch)?,
            '/' if chars.next_if(|&(_, next)| next == '*').is_some() => {
                skip_comment(&mut chars)?;
            }
            '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                let body = inner.get(..idx);
                let rest = inner.get(idx + RIGHT_DELIM.len()..);
                return body
                    .zip(rest)
                    .ok_or_else(|| SyntaxError::new("unclosed action"));
            }
            _ => {}
        }
    }
    Err(SyntaxError::new("unclosed action"))
}

fn skip_quoted(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> Result<(), SyntaxError> {
    while let Some((_, ch)) = chars.next() {
        if ch == quote {
            return Ok(());
        }
        if ch == '\\' && quote != '`' {
            chars.next();
        }
    }
    Err(SyntaxError::new("unterminated quoted string"))
}

fn skip_comment(chars: &mut Peekable<CharIndices<'_>>) -> Result<(), SyntaxError> {
    while let Some((_, ch)) = chars.next() {
        if ch == '*' && chars.next_if(|&(_, next)| next == '/').is_some() {
            return Ok(());
        }
    }
    Err(SyntaxError::new("unclosed comment"))
}

fn translate_action(body: &str, depth: &mut usize, out: &mut String) -> Result<(), SyntaxError> {
    let trimmed = body.trim_matches(is_space);
    if trimmed.starts_with("/*") {
        if trimmed.ends_with("*/") {
            return Ok(());
        }
        return Err(SyntaxError::new("comment ends before closing delimiter"));
    }

    let tokens = Lexer::new(trimmed).tokens()?;
    match tokens.as_slice() {
        [Token::Ident(word), args @ ..] if word == "if" => {
            let condition = expression(args, "if")?;
            *depth += 1;
            out.push_str(&format!("{{% if {condition} %}}"));
        }
        [Token::Ident(word), ..] if word == "else" && *depth == 0 => {
            return Err(SyntaxError::new("unexpected {{else}}"));
        }
        [Token::Ident(word)] if word == "else" => out.push_str("{% else %}"),
        [Token::Ident(word), Token::Ident(next), args @ ..] if word == "else" && next == "if" => {
            let condition = expression(args, "else if")?;
            out.push_str(&format!("{{% elif {condition} %}}"));
        }
        [Token::Ident(word), ..] if word == "else" => {
            return Err(SyntaxError::new("unsupported {{else}} clause"));
        }
        [Token::Ident(word)] if word == "end" => {
            if *depth == 0 {
                return Err(SyntaxError::new("unexpected {{end}}"));
            }
            *depth -= 1;
            out.push_str("{% endif %}");
        }
        [Token::Ident(word), ..] if word == "end" => {
            return Err(SyntaxError::new("unexpected value after {{end}}"));
        }
        [Token::Ident(word), ..] if is_unsupported_action(word) => {
            return Err(SyntaxError::new(format!(
                "{{{{{word}}}}} actions are not supported"
            )));
        }
        _ => {
            let value = expression(&tokens, "command")?;
            out.push_str(&format!("{{{{ {value} }}}}"));
        }
    }
    Ok(())
}

fn is_unsupported_action(word: &str) -> bool {
    matches!(
        word,
        "range" | "with" | "define" | "template" | "block" | "break" | "continue"
    )
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Token {
    Field(String),
    Dot,
    Ident(String),
    Str(String),
    Number(String),
    LParen,
    RParen,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(ch) = self.chars.next_if(|&ch| pred(ch)) {
            taken.push(ch);
        }
        taken
    }

    fn tokens(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        while let Some(&ch) = self.chars.peek() {
            let token = match ch {
                c if is_space(c) => {
                    self.chars.next();
                    continue;
                }
                '(' => {
                    self.chars.next();
                    Token::LParen
                }
                ')' => {
                    self.chars.next();
                    Token::RParen
                }
                '|' => return Err(SyntaxError::new("pipelines are not supported")),
                '$' => return Err(SyntaxError::new("variables are not supported")),
                '\'' => return Err(SyntaxError::new("character constants are not supported")),
                '"' => self.quoted()?,
                '`' => self.raw()?,
                '.' => self.field()?,
                c if c.is_ascii_digit() || c == '-' || c == '+' => self.number()?,
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.take_while(is_ident_char)),
                other => return Err(SyntaxError::new(format!("unexpected {other:?} in action"))),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn field(&mut self) -> Result<Token, SyntaxError> {
        let mut path = Vec::new();
        while self.chars.next_if_eq(&'.').is_some() {
            let name = self.take_while(is_ident_char);
            if name.is_empty() && path.is_empty() {
                return Ok(Token::Dot);
            }
            if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(SyntaxError::new(format!("bad field name {name:?}")));
            }
            path.push(name);
        }
        Ok(Token::Field(path.join(".")))
    }

    fn quoted(&mut self) -> Result<Token, SyntaxError> {
        self.chars.next();
        let mut value = String::new();
        while let Some(ch) = self.chars.next() {
            match ch {
                '"' => return Ok(Token::Str(value)),
                '\\' => match self.chars.next() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(escaped @ ('\\' | '"' | '\'')) => value.push(escaped),
                    Some(other) => {
                        return Err(SyntaxError::new(format!(
                            "unsupported escape \\{other} in string"
                        )));
                    }
                    None => break,
                },
                other => value.push(other),
            }
        }
        Err(SyntaxError::new("unterminated quoted string"))
    }

    fn raw(&mut self) -> Result<Token, SyntaxError> {
        self.chars.next();
        let value = self.take_while(|ch| ch != '`');
        if self.chars.next() != Some('`') {
            return Err(SyntaxError::new("unterminated raw quoted string"));
        }
        Ok(Token::Str(value))
    }

    fn number(&mut self) -> Result<Token, SyntaxError> {
        let text =
            self.take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-'));
        if text.parse::<i64>().is_ok() || text.parse::<f64>().is_ok() {
            Ok(Token::Number(text.trim_start_matches('+').to_owned()))
        } else {
            Err(SyntaxError::new(format!("bad number syntax: {text:?}")))
        }
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_constant(name: &str) -> bool {
    matches!(name, "true" | "false" | "nil")
}

fn expression(tokens: &[Token], context: &str) -> Result<String, SyntaxError> {
    if tokens.is_empty() {
        return Err(SyntaxError::new(format!("missing value for {context}")));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.command()?;
    if let Some(token) = parser.peek() {
        return Err(SyntaxError::new(format!(
            "unexpected {token:?} in {context}"
        )));
    }
    Ok(value)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_command_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::RParen))
    }

    /// Parses a function call with its arguments, or a single operand.
    fn command(&mut self) -> Result<String, SyntaxError> {
        let function = match self.peek() {
            Some(Token::Ident(name)) if !is_constant(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = function {
            self.pos += 1;
            let mut args = Vec::new();
            while !self.at_command_end() {
                args.push(self.operand()?);
            }
            return call(&name, &args);
        }

        let value = self.operand()?;
        if self.at_command_end() {
            Ok(value)
        } else {
            Err(SyntaxError::new(format!(
                "can't give argument to non-function {value}"
            )))
        }
    }

    fn operand(&mut self) -> Result<String, SyntaxError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| SyntaxError::new("missing operand"))?;
        self.pos += 1;
        match token {
            Token::Field(path) => Ok(path),
            Token::Dot => Err(SyntaxError::new(
                "`.` on its own is not supported; name a field such as .Version",
            )),
            Token::Str(value) => Ok(string_literal(&value)),
            Token::Number(number) => Ok(number),
            Token::Ident(name) if name == "true" || name == "false" => Ok(name),
            Token::Ident(name) if name == "nil" => Ok(String::from("none")),
            Token::Ident(name) => Err(SyntaxError::new(format!(
                "function {name} needs parentheses when used as an argument"
            ))),
            Token::LParen => {
                let inner = self.command()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(SyntaxError::new("unclosed left paren"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::RParen => Err(SyntaxError::new("unexpected right paren")),
        }
    }
}

fn call(name: &str, args: &[String]) -> Result<String, SyntaxError> {
    match (name, args) {
        ("not", [value]) => Ok(format!("(not {value})")),
        ("len", [value]) => Ok(format!("({value}|length)")),
        ("and" | "or", [_, ..]) => Ok(format!("({})", args.join(&format!(" {name} ")))),
        ("eq", [first, others @ ..]) if !others.is_empty() => {
            let clauses: Vec<String> = others
                .iter()
                .map(|other| format!("{first} == {other}"))
                .collect();
            Ok(format!("({})", clauses.join(" or ")))
        }
        ("ne", [left, right]) => Ok(format!("({left} != {right})")),
        ("lt", [left, right]) => Ok(format!("({left} < {right})")),
        ("le", [left, right]) => Ok(format!("({left} <= {right})")),
        ("gt", [left, right]) => Ok(format!("({left} > {right})")),
        ("ge", [left, right]) => Ok(format!("({left} >= {right})")),
        ("not" | "len" | "and" | "or" | "eq" | "ne" | "lt" | "le" | "gt" | "ge", _) => {
            Err(SyntaxError::new(format!(
                "wrong number of args for {name}: got {}",
                args.len()
            )))
        }
        _ => Err(SyntaxError::new(format!(
            "function {name:?} is not supported"
        ))),
    }
}

fn string_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            other => literal.push(other),
        }
    }
    literal.push('"');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "sh install.sh{{if .Version}} -v {{.Version}}{{end}}",
        "sh install.sh{% if Version %} -v {{ Version }}{% endif %}"
    )]
    #[case("run {{ .StagingDirectory }}/solo.rb", "run {{ StagingDirectory }}/solo.rb")]
    #[case("{{if not .Sudo}}x{{else}}y{{end}}", "{% if (not Sudo) %}x{% else %}y{% endif %}")]
    #[case("{{if .A}}a{{else if .B}}b{{end}}", "{% if A %}a{% elif B %}b{% endif %}")]
    #[case(
        r#"{{ if (not (eq .RolesPath "")) }}r{{end}}"#,
        r#"{% if (not (RolesPath == "")) %}r{% endif %}"#
    )]
    #[case(
        r#"{{if eq .Version "13" "14"}}old{{end}}"#,
        r#"{% if (Version == "13" or Version == "14") %}old{% endif %}"#
    )]
    #[case("{{if and .A .B}}ab{{end}}", "{% if (A and B) %}ab{% endif %}")]
    #[case(
        "{{if gt (len .Version) 0}}v{{end}}",
        "{% if ((Version|length) > 0) %}v{% endif %}"
    )]
    #[case("{{.Node.Name}}", "{{ Node.Name }}")]
    #[case("a{{/* note */}}b", "ab")]
    fn translates_supported_actions(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(translate(source).expect("template translates"), expected);
    }

    #[test]
    fn trim_markers_remove_adjacent_whitespace() {
        let translated = translate("a  \n{{- .X -}}\n\t b").expect("template translates");
        assert_eq!(translated, "a{{ X }}b");
    }

    #[test]
    fn dash_without_space_is_not_a_trim_marker() {
        let translated = translate("a {{-3}} b").expect("template translates");
        assert_eq!(translated, "a {{ -3 }} b");
    }

    #[test]
    fn literal_jinja_delimiters_in_text_are_preserved() {
        let translated = translate("{% raw %} {# x #}").expect("template translates");
        assert_eq!(translated, r#"{{ "{%" }} raw %} {{ "{#" }} x #}"#);
    }

    #[test]
    fn delimiters_inside_strings_do_not_close_the_action() {
        let translated = translate(r#"{{if eq .X "}}"}}y{{end}}"#).expect("template translates");
        assert_eq!(translated, r#"{% if (X == "}}") %}y{% endif %}"#);
    }

    #[rstest]
    #[case("{{if .Version}}unterminated", "missing {{end}}")]
    #[case("done{{end}}", "unexpected {{end}}")]
    #[case("{{else}}", "unexpected {{else}}")]
    #[case("{{range .Items}}x{{end}}", "{{range}}")]
    #[case("{{.Version | printf \"%s\"}}", "pipelines")]
    #[case("{{$v := .Version}}", "variables")]
    #[case("{{.}}", "`.`")]
    #[case("{{printf \"%s\" .Version}}", "\"printf\"")]
    #[case("{{.Version", "unclosed action")]
    #[case("{{}}", "missing value")]
    #[case("{{not}}", "wrong number of args for not")]
    fn unsupported_or_malformed_templates_are_rejected(
        #[case] source: &str,
        #[case] fragment: &str,
    ) {
        let err = translate(source).expect_err("template should be rejected");
        assert!(err.to_string().contains(fragment), "{err}");
    }
}

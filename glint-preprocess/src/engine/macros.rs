//! Macro table and text expansion

use std::collections::{HashMap, VecDeque};

use crate::engine::error::{PreprocessError, PreprocessResult};

/// A `#define`d macro. `params` is `None` for object-like macros.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Macro {
    pub params: Option<Vec<String>>,
    pub body: String,
}

impl Macro {
    pub fn object(body: impl Into<String>) -> Self {
        Self {
            params: None,
            body: body.into(),
        }
    }

    pub fn function(params: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            params: Some(params),
            body: body.into(),
        }
    }
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub(crate) fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Length in bytes of the identifier starting at `start`.
pub(crate) fn ident_len(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .take_while(|b| is_ident_continue(**b))
        .count()
}

/// Length in bytes of the numeric literal starting at `start`, suffixes and exponents included.
pub(crate) fn number_len(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' {
            i += 1;
        } else if (c == b'+' || c == b'-') && matches!(bytes[i - 1], b'e' | b'E') {
            i += 1;
        } else {
            break;
        }
    }
    i - start
}

fn char_len(text: &str, at: usize) -> usize {
    text[at..].chars().next().map_or(1, char::len_utf8)
}

/// Defined macros, keyed by name. Redefinition replaces the previous entry.
#[derive(Debug, Clone, Default)]
pub(crate) struct MacroTable {
    macros: HashMap<String, Macro>,
    max_depth: usize,
}

impl MacroTable {
    pub fn new(max_depth: usize) -> Self {
        Self {
            macros: HashMap::new(),
            max_depth,
        }
    }

    pub fn define(&mut self, name: impl Into<String>, definition: Macro) {
        self.macros.insert(name.into(), definition);
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Expand every macro invocation in `text`.
    ///
    /// A replacement is rescanned together with the text that follows it, so an
    /// object-like macro may expand to the name of a function-like macro whose
    /// arguments come after it. Each token remembers the macros it came from and
    /// is never expanded by one of them again.
    pub fn expand(&self, text: &str, line: usize) -> PreprocessResult<String> {
        let tokens = self.expand_tokens(tokenize(text), line)?;
        Ok(tokens.into_iter().map(|token| token.text).collect())
    }

    fn expand_tokens(&self, tokens: Vec<Token>, line: usize) -> PreprocessResult<Vec<Token>> {
        let mut input: VecDeque<Token> = tokens.into();
        let mut out = Vec::with_capacity(input.len());

        while let Some(token) = input.pop_front() {
            let definition = match token.kind {
                TokenKind::Ident if !token.hidden.contains(&token.text) => {
                    self.macros.get(&token.text)
                }
                _ => None,
            };
            let Some(definition) = definition else {
                out.push(token);
                continue;
            };
            if token.hidden.len() >= self.max_depth {
                return Err(PreprocessError::RecursionLimit {
                    name: token.hidden.first().cloned().unwrap_or_default(),
                    depth: self.max_depth,
                    line,
                });
            }

            let (replacement, mut hidden) = match &definition.params {
                None => (
                    self.substitute(&definition.body, &[], &[], line)?,
                    token.hidden.clone(),
                ),
                Some(params) => {
                    let open = input.iter().position(|t| t.kind != TokenKind::Space);
                    let Some(open) = open.filter(|&open| input[open].is_punct("(")) else {
                        // Function-like macro name without arguments stays as is.
                        out.push(token);
                        continue;
                    };
                    let (mut args, close) = collect_arguments(&input, open).ok_or_else(|| {
                        PreprocessError::UnterminatedArguments {
                            name: token.text.clone(),
                            line,
                        }
                    })?;
                    if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                        args.clear();
                    }
                    if args.len() != params.len() {
                        return Err(PreprocessError::ArgumentMismatch {
                            name: token.text.clone(),
                            expected: params.len(),
                            found: args.len(),
                            line,
                        });
                    }

                    // Only macros hiding both the name and the closing parenthesis stay hidden.
                    let hidden = token
                        .hidden
                        .iter()
                        .filter(|name| input[close].hidden.contains(name))
                        .cloned()
                        .collect();
                    input.drain(..=close);
                    (self.substitute(&definition.body, params, &args, line)?, hidden)
                }
            };

            hidden.push(token.text);
            for mut replaced in replacement.into_iter().rev() {
                for name in &hidden {
                    if !replaced.hidden.contains(name) {
                        replaced.hidden.push(name.clone());
                    }
                }
                input.push_front(replaced);
            }
        }

        Ok(out)
    }

    /// Replace parameter names in `body` with their arguments and apply `##` pasting.
    /// Arguments are fully expanded first unless they are an operand of `##`.
    fn substitute(
        &self,
        body: &str,
        params: &[String],
        args: &[Vec<Token>],
        line: usize,
    ) -> PreprocessResult<Vec<Token>> {
        let body = tokenize(body);
        let param_index = |token: &Token| {
            (token.kind == TokenKind::Ident)
                .then(|| params.iter().position(|p| *p == token.text))
                .flatten()
        };
        let pastes_at = |i: usize| {
            body.get(i).is_some_and(|t| t.is_punct("#"))
                && body.get(i + 1).is_some_and(|t| t.is_punct("#"))
        };
        let next_solid = |mut i: usize| {
            while body.get(i).is_some_and(|t| t.kind == TokenKind::Space) {
                i += 1;
            }
            i
        };

        let mut out: Vec<Token> = Vec::with_capacity(body.len());
        let mut i = 0;
        while i < body.len() {
            if pastes_at(i) {
                while out.last().is_some_and(|t| t.kind == TokenKind::Space) {
                    out.pop();
                }
                i = next_solid(i + 2);
                let Some(right) = body.get(i) else {
                    break;
                };
                let mut right = match param_index(right) {
                    Some(idx) => args[idx].clone(),
                    None => vec![right.clone()],
                };
                i += 1;
                if right.is_empty() {
                    continue;
                }
                let first = right.remove(0);
                let left = out.pop().map(|t| t.text).unwrap_or_default();
                out.extend(tokenize(&(left + &first.text)));
                out.extend(right);
                continue;
            }

            let token = &body[i];
            match param_index(token) {
                Some(idx) if pastes_at(next_solid(i + 1)) => out.extend(args[idx].iter().cloned()),
                Some(idx) => out.extend(self.expand_tokens(args[idx].clone(), line)?),
                None => out.push(token.clone()),
            }
            i += 1;
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Ident,
    Number,
    Space,
    Punct,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    /// Macros whose expansion produced this token.
    hidden: Vec<String>,
}

impl Token {
    fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let (kind, len) = if is_ident_start(b) {
            (TokenKind::Ident, ident_len(bytes, i))
        } else if b.is_ascii_digit()
            || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            (TokenKind::Number, number_len(bytes, i))
        } else if matches!(b, b' ' | b'\t') {
            let len = bytes[i..]
                .iter()
                .take_while(|c| matches!(c, b' ' | b'\t'))
                .count();
            (TokenKind::Space, len)
        } else {
            (TokenKind::Punct, char_len(text, i))
        };
        tokens.push(Token {
            kind,
            text: text[i..i + len].to_string(),
            hidden: Vec::new(),
        });
        i += len;
    }

    tokens
}

/// Collect the parenthesised arguments opening at `input[open]`.
/// Returns the arguments with surrounding blanks trimmed and the index of the
/// closing parenthesis, or `None` if the list is not closed.
fn collect_arguments(input: &VecDeque<Token>, open: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;

    for (idx, token) in input.iter().enumerate().skip(open + 1) {
        if token.is_punct(")") && depth == 0 {
            args.push(trim_spaces(current));
            return Some((args, idx));
        }
        if token.is_punct(",") && depth == 0 {
            args.push(trim_spaces(std::mem::take(&mut current)));
            continue;
        }
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth -= 1;
        }
        current.push(token.clone());
    }
    None
}

fn trim_spaces(mut tokens: Vec<Token>) -> Vec<Token> {
    while tokens.last().is_some_and(|t| t.kind == TokenKind::Space) {
        tokens.pop();
    }
    let leading = tokens
        .iter()
        .take_while(|t| t.kind == TokenKind::Space)
        .count();
    tokens.drain(..leading);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MacroTable {
        MacroTable::new(32)
    }

    #[test]
    fn test_object_macro_whole_words_only() {
        let mut macros = table();
        macros.define("PI", Macro::object("3.14159"));
        let out = macros.expand("float a = PI * PIE + PI_2;", 1).unwrap();
        assert_eq!(out, "float a = 3.14159 * PIE + PI_2;");
    }

    #[test]
    fn test_numbers_are_not_identifiers() {
        let mut macros = table();
        macros.define("u", Macro::object("BROKEN"));
        macros.define("e", Macro::object("BROKEN"));
        let out = macros.expand("uint x = 1u + 0x1Fu; float y = 1e-3;", 1).unwrap();
        assert_eq!(out, "uint x = 1u + 0x1Fu; float y = 1e-3;");
    }

    #[test]
    fn test_function_macro_nested_arguments() {
        let mut macros = table();
        macros.define(
            "MUL",
            Macro::function(vec!["a".into(), "b".into()], "((a) * (b))"),
        );
        let out = macros.expand("x = MUL(f(1, 2), y);", 1).unwrap();
        assert_eq!(out, "x = ((f(1, 2)) * (y));");
    }

    #[test]
    fn test_function_macro_without_call_is_kept() {
        let mut macros = table();
        macros.define("F", Macro::function(vec!["x".into()], "x"));
        assert_eq!(macros.expand("float F;", 1).unwrap(), "float F;");
    }

    #[test]
    fn test_self_reference_is_not_reexpanded() {
        let mut macros = table();
        macros.define("color", Macro::object("color * tint"));
        assert_eq!(macros.expand("color", 1).unwrap(), "color * tint");
    }

    #[test]
    fn test_replacement_rescanned_with_following_text() {
        let mut macros = table();
        macros.define("F", Macro::function(vec!["x".into()], "x"));
        macros.define("G", Macro::object("F"));
        macros.define("H", Macro::object("G"));
        assert_eq!(macros.expand("G(1.0) + H(2.0)", 1).unwrap(), "1.0 + 2.0");
    }

    #[test]
    fn test_nested_call_of_same_macro() {
        let mut macros = table();
        macros.define("F", Macro::function(vec!["x".into()], "(x)"));
        assert_eq!(macros.expand("F(F(1))", 1).unwrap(), "((1))");
    }

    #[test]
    fn test_token_pasting() {
        let mut macros = table();
        macros.define(
            "UNIFORM",
            Macro::function(vec!["name".into()], "u_ ## name"),
        );
        assert_eq!(macros.expand("UNIFORM(light)", 1).unwrap(), "u_light");
    }

    #[test]
    fn test_argument_mismatch() {
        let mut macros = table();
        macros.define("F", Macro::function(vec!["a".into(), "b".into()], "a"));
        let err = macros.expand("F(1)", 7).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::ArgumentMismatch {
                name: "F".into(),
                expected: 2,
                found: 1,
                line: 7,
            }
        );
    }

    #[test]
    fn test_unterminated_arguments() {
        let mut macros = table();
        macros.define("F", Macro::function(vec!["a".into()], "a"));
        assert!(matches!(
            macros.expand("F(1, (2)", 3),
            Err(PreprocessError::UnterminatedArguments { line: 3, .. })
        ));
    }

    #[test]
    fn test_zero_parameter_macro() {
        let mut macros = table();
        macros.define("ZERO", Macro::function(Vec::new(), "0.0"));
        assert_eq!(macros.expand("ZERO( )", 1).unwrap(), "0.0");
    }

    #[test]
    fn test_recursion_limit() {
        let mut macros = MacroTable::new(4);
        for i in 0..10 {
            macros.define(format!("M{i}"), Macro::object(format!("M{}", i + 1)));
        }
        assert!(matches!(
            macros.expand("M0", 1),
            Err(PreprocessError::RecursionLimit { depth: 4, .. })
        ));
    }
}

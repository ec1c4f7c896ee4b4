//! C-style macro preprocessor for GLSL source.
//!
//! Handles `#define`, `#undef`, conditional blocks, `#error` and line
//! splicing. `#version`, `#extension`, `#pragma` and `#line` are passed
//! through for the driver. Every input line produces exactly one output line
//! so compiler diagnostics keep their line numbers.

mod error;
mod expr;
mod macros;

#[cfg(test)]
mod tests;

pub use error::{PreprocessError, PreprocessResult};

use macros::{Macro, MacroTable, ident_len, is_ident_start};
use std::iter::Peekable;
use std::str::Lines;
use tracing::{debug, trace};

use crate::defines::MacroDefine;

/// Default limit on nested macro expansion.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 64;

/// Expands macros and conditionals in shader source.
pub trait PreprocessorEngine {
    /// Preprocess `source` with `defines` applied in order before the first line.
    /// A later define of the same name replaces an earlier one.
    fn preprocess(&self, source: &str, defines: &[MacroDefine]) -> PreprocessResult<String>;
}

/// The built-in [`PreprocessorEngine`]. Holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    max_expansion_depth: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }
}

impl PreprocessorEngine for Preprocessor {
    #[tracing::instrument(level = "debug", skip_all, fields(defines = defines.len()))]
    fn preprocess(&self, source: &str, defines: &[MacroDefine]) -> PreprocessResult<String> {
        let mut run = Run::new(self.max_expansion_depth);
        for define in defines {
            trace!("predefine {}", define);
            run.macros
                .define(define.name.clone(), Macro::object(define.value.clone()));
        }
        let output = run.process(source)?;
        debug!("Preprocessed {} bytes into {} bytes", source.len(), output.len());
        Ok(output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BranchState {
    /// No branch of the block has been taken yet.
    Searching,
    /// The current branch is being emitted.
    Active,
    /// A branch was already taken, or the whole block sits in an inactive region.
    Done,
}

#[derive(Debug)]
struct Conditional {
    state: BranchState,
    seen_else: bool,
    opened_at: usize,
}

/// State for a single `preprocess` call.
struct Run {
    macros: MacroTable,
    conditionals: Vec<Conditional>,
    line: usize,
}

impl Run {
    fn new(max_depth: usize) -> Self {
        Self {
            macros: MacroTable::new(max_depth),
            conditionals: Vec::new(),
            line: 0,
        }
    }

    fn is_active(&self) -> bool {
        self.conditionals
            .last()
            .is_none_or(|c| c.state == BranchState::Active)
    }

    fn process(&mut self, source: &str) -> PreprocessResult<String> {
        let text = strip_comments(&source.replace("\r\n", "\n"));
        let mut output = String::with_capacity(text.len());
        let mut lines = text.lines().peekable();

        while let Some((mut logical, mut consumed)) = next_logical_line(&mut lines) {
            let start_line = self.line + 1;
            self.line = start_line;

            let emitted = loop {
                let result = self.process_line(&logical);
                // A macro call may carry its arguments over onto the following lines.
                if matches!(result, Err(PreprocessError::UnterminatedArguments { .. }))
                    && !is_directive(&logical)
                    && lines.peek().is_some_and(|next| !is_directive(next))
                {
                    if let Some((next, count)) = next_logical_line(&mut lines) {
                        logical.push(' ');
                        logical.push_str(&next);
                        consumed += count;
                        continue;
                    }
                }
                break result?;
            };

            if let Some(emitted) = emitted {
                output.push_str(&emitted);
            }
            for _ in 0..consumed {
                output.push('\n');
            }
            self.line = start_line + consumed - 1;
        }

        if let Some(first) = self.conditionals.first() {
            return Err(PreprocessError::UnterminatedConditional {
                count: self.conditionals.len(),
                line: first.opened_at,
            });
        }
        Ok(output)
    }

    fn process_line(&mut self, line: &str) -> PreprocessResult<Option<String>> {
        if let Some(rest) = line.trim_start().strip_prefix('#') {
            let rest = rest.trim_start();
            let name_len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphabetic() || *b == b'_')
                .count();
            let (name, args) = rest.split_at(name_len);
            return self.directive(name, args.trim(), line);
        }

        if self.is_active() {
            self.macros.expand(line, self.line).map(Some)
        } else {
            Ok(None)
        }
    }

    fn directive(
        &mut self,
        name: &str,
        args: &str,
        line: &str,
    ) -> PreprocessResult<Option<String>> {
        match name {
            "if" => {
                let state = if self.is_active() {
                    branch_state(self.evaluate(args)?)
                } else {
                    BranchState::Done
                };
                self.open(state);
            }
            "ifdef" | "ifndef" => {
                let state = if self.is_active() {
                    let ident = self.identifier(name, args)?;
                    branch_state(self.macros.is_defined(ident) == (name == "ifdef"))
                } else {
                    BranchState::Done
                };
                self.open(state);
            }
            "elif" => {
                let state = self.current(name)?.state;
                let next = match state {
                    BranchState::Searching => branch_state(self.evaluate(args)?),
                    BranchState::Active | BranchState::Done => BranchState::Done,
                };
                self.current(name)?.state = next;
            }
            "else" => {
                let current = self.current(name)?;
                current.seen_else = true;
                current.state = match current.state {
                    BranchState::Searching => BranchState::Active,
                    BranchState::Active | BranchState::Done => BranchState::Done,
                };
            }
            "endif" => {
                if self.conditionals.pop().is_none() {
                    return Err(PreprocessError::UnbalancedConditional {
                        directive: name.to_string(),
                        line: self.line,
                    });
                }
            }
            _ if !self.is_active() => {}
            "define" => self.define(args)?,
            "undef" => {
                let ident = self.identifier(name, args)?;
                self.macros.undefine(ident);
            }
            "error" => {
                return Err(PreprocessError::ErrorDirective {
                    message: args.to_string(),
                    line: self.line,
                });
            }
            "version" | "extension" | "pragma" | "line" => return Ok(Some(line.to_string())),
            "include" => return Err(PreprocessError::UnresolvedInclude { line: self.line }),
            // A lone `#` is the null directive.
            "" if args.is_empty() => {}
            _ => {
                return Err(PreprocessError::UnknownDirective {
                    directive: if name.is_empty() { args } else { name }.to_string(),
                    line: self.line,
                });
            }
        }
        Ok(None)
    }

    fn open(&mut self, state: BranchState) {
        self.conditionals.push(Conditional {
            state,
            seen_else: false,
            opened_at: self.line,
        });
    }

    /// Innermost open conditional, for `#elif` / `#else`.
    fn current(&mut self, directive: &str) -> PreprocessResult<&mut Conditional> {
        let line = self.line;
        let current = self.conditionals.last_mut().ok_or_else(|| {
            PreprocessError::UnbalancedConditional {
                directive: directive.to_string(),
                line,
            }
        })?;
        if current.seen_else {
            return Err(PreprocessError::Malformed {
                directive: directive.to_string(),
                message: "follows #else".to_string(),
                line,
            });
        }
        Ok(current)
    }

    fn identifier<'a>(&self, directive: &str, args: &'a str) -> PreprocessResult<&'a str> {
        let bytes = args.as_bytes();
        if bytes.first().is_some_and(|b| is_ident_start(*b)) && ident_len(bytes, 0) == bytes.len()
        {
            Ok(args)
        } else {
            Err(PreprocessError::Malformed {
                directive: directive.to_string(),
                message: format!("expected a macro name, found '{args}'"),
                line: self.line,
            })
        }
    }

    fn define(&mut self, args: &str) -> PreprocessResult<()> {
        let malformed = |message: String| PreprocessError::Malformed {
            directive: "define".to_string(),
            message,
            line: self.line,
        };

        let bytes = args.as_bytes();
        if !bytes.first().is_some_and(|b| is_ident_start(*b)) {
            return Err(malformed(format!("expected a macro name, found '{args}'")));
        }
        let name_end = ident_len(bytes, 0);
        let name = &args[..name_end];
        let rest = &args[name_end..];

        // Function-like only when '(' directly follows the name.
        let definition = if let Some(after_open) = rest.strip_prefix('(') {
            let close = after_open
                .find(')')
                .ok_or_else(|| malformed(format!("unterminated parameter list for {name}")))?;
            let list = after_open[..close].trim();
            let params = if list.is_empty() {
                Vec::new()
            } else {
                list.split(',').map(|p| p.trim().to_string()).collect()
            };
            for param in &params {
                let pbytes = param.as_bytes();
                let valid = pbytes.first().is_some_and(|b| is_ident_start(*b))
                    && ident_len(pbytes, 0) == pbytes.len();
                if !valid {
                    return Err(malformed(format!("invalid parameter '{param}' for {name}")));
                }
            }
            Macro::function(params, after_open[close + 1..].trim())
        } else {
            Macro::object(rest.trim())
        };

        trace!("#define {} at line {}", name, self.line);
        self.macros.define(name, definition);
        Ok(())
    }

    /// Evaluate an `#if` / `#elif` condition.
    fn evaluate(&self, args: &str) -> PreprocessResult<bool> {
        let resolved = self.resolve_defined(args)?;
        let expanded = self.macros.expand(&resolved, self.line)?;
        expr::evaluate(&expanded)
            .map(|value| value != 0)
            .map_err(|message| PreprocessError::InvalidExpression {
                message,
                line: self.line,
            })
    }

    /// Replace `defined NAME` and `defined(NAME)` with 1 or 0.
    fn resolve_defined(&self, text: &str) -> PreprocessResult<String> {
        let invalid = || PreprocessError::InvalidExpression {
            message: "'defined' requires a macro name".to_string(),
            line: self.line,
        };

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < bytes.len() {
            if !is_ident_start(bytes[i]) {
                let len = text[i..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&text[i..i + len]);
                i += len;
                continue;
            }

            let len = ident_len(bytes, i);
            let ident = &text[i..i + len];
            i += len;
            if ident != "defined" {
                out.push_str(ident);
                continue;
            }

            let skip_ws = |mut j: usize| {
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                j
            };
            i = skip_ws(i);
            let parenthesised = bytes.get(i) == Some(&b'(');
            if parenthesised {
                i = skip_ws(i + 1);
            }
            if !bytes.get(i).is_some_and(|b| is_ident_start(*b)) {
                return Err(invalid());
            }
            let name_len = ident_len(bytes, i);
            let name = &text[i..i + name_len];
            i += name_len;
            if parenthesised {
                i = skip_ws(i);
                if bytes.get(i) != Some(&b')') {
                    return Err(invalid());
                }
                i += 1;
            }
            out.push_str(if self.macros.is_defined(name) { " 1 " } else { " 0 " });
        }

        Ok(out)
    }
}

fn branch_state(taken: bool) -> BranchState {
    if taken {
        BranchState::Active
    } else {
        BranchState::Searching
    }
}

/// Next line with `\` continuations spliced, and the number of source lines it used.
fn next_logical_line(lines: &mut Peekable<Lines<'_>>) -> Option<(String, usize)> {
    let mut logical = lines.next()?.to_string();
    let mut count = 1;
    while logical.ends_with('\\') {
        logical.pop();
        let Some(next) = lines.next() else {
            break;
        };
        logical.push_str(next);
        count += 1;
    }
    Some((logical, count))
}

fn is_directive(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Remove `//` and `/* */` comments, keeping every newline.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                out.push(' ');
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

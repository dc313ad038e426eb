//! Macro definitions and expansion
//!
//! Macros are either object-like (a replacement string) or function-like
//! (an ordered parameter list plus a replacement string). Expansion works on
//! one logical line at a time: arguments are expanded before substitution,
//! and substituted bodies are re-expanded with the invoked macro name
//! suppressed so that self-reference can never loop.

use std::collections::{HashMap, HashSet};

/// A single macro definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    /// Name of the macro
    pub name: String,
    /// Parameter names for a function-like macro; `None` for object-like
    pub params: Option<Vec<String>>,
    /// The replacement body, trimmed of surrounding whitespace
    pub body: String,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

/// The active-macro map: identifier -> macro descriptor.
///
/// Definitions shadow by overwrite; `#undef` removes.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
        }
    }

    /// Define a macro, overwriting any previous definition of the same name.
    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name.clone(), def);
    }

    /// Remove a macro definition.
    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Check whether a macro is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Look up a macro definition.
    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    /// Expand macros in one logical line of text.
    pub fn expand_line(&self, line: &str) -> String {
        let mut expanding = HashSet::new();
        self.expand_text(line, &mut expanding)
    }

    /// Expand macros in `text`, with the names in `expanding` suppressed.
    fn expand_text(&self, text: &str, expanding: &mut HashSet<String>) -> String {
        let mut result = String::with_capacity(text.len());
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut i = 0;

        while i < len {
            let b = bytes[i];

            if b == b'"' || b == b'\'' {
                i = copy_literal(bytes, i, &mut result);
            } else if b.is_ascii_digit() {
                i = copy_number(bytes, i, &mut result);
            } else if is_ident_start(b) {
                i = self.expand_identifier(bytes, i, &mut result, expanding);
            } else {
                result.push(b as char);
                i += 1;
            }
        }

        result
    }

    /// Expand one identifier starting at `start`, or copy it through.
    fn expand_identifier(
        &self,
        bytes: &[u8],
        start: usize,
        result: &mut String,
        expanding: &mut HashSet<String>,
    ) -> usize {
        let len = bytes.len();
        let mut i = start + 1;
        while i < len && is_ident_cont(bytes[i]) {
            i += 1;
        }
        let ident = std::str::from_utf8(&bytes[start..i]).unwrap_or_default();

        if expanding.contains(ident) {
            // Self-reference: copy through unexpanded
            result.push_str(ident);
            return i;
        }

        let Some(def) = self.macros.get(ident) else {
            result.push_str(ident);
            return i;
        };

        match &def.params {
            None => {
                // Object-like macro: substitute the body and re-expand it
                expanding.insert(ident.to_string());
                let expanded = self.expand_text(&def.body, expanding);
                expanding.remove(ident);
                result.push_str(&expanded);
                i
            }
            Some(params) => {
                // Function-like: only expands when followed by '('
                let mut j = i;
                while j < len && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j >= len || bytes[j] != b'(' {
                    result.push_str(ident);
                    return i;
                }

                let (args, after) = parse_invocation_args(bytes, j);
                let expanded_args: Vec<String> = args
                    .iter()
                    .map(|a| self.expand_text(a.trim(), expanding))
                    .collect();

                let substituted = substitute_params(&def.body, params, &expanded_args);

                expanding.insert(ident.to_string());
                let expanded = self.expand_text(&substituted, expanding);
                expanding.remove(ident);

                result.push_str(&expanded);
                after
            }
        }
    }
}

/// Parse the text after `#define ` into a macro definition.
///
/// A parameter list is only recognised when the `(` immediately follows the
/// macro name; with intervening whitespace the definition is object-like and
/// the body begins at the parenthesis.
pub fn parse_define(line: &str) -> Option<MacroDef> {
    let line = line.trim();
    let bytes = line.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0]) {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() && is_ident_cont(bytes[i]) {
        i += 1;
    }
    let name = line[..i].to_string();

    if i < bytes.len() && bytes[i] == b'(' {
        // Function-like macro
        let (raw_params, after) = parse_invocation_args(bytes, i);
        let params = raw_params
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let body = line[after.min(line.len())..].trim().to_string();
        Some(MacroDef {
            name,
            params: Some(params),
            body,
        })
    } else {
        // Object-like macro
        let body = line[i..].trim().to_string();
        Some(MacroDef {
            name,
            params: None,
            body,
        })
    }
}

/// Consume a balanced-paren argument list starting at the opening paren.
///
/// Arguments are split by commas at top-level paren nesting; string and
/// character literals suppress comma splitting. Returns the raw argument
/// texts and the position just past the closing paren.
fn parse_invocation_args(bytes: &[u8], open: usize) -> (Vec<String>, usize) {
    let len = bytes.len();
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut i = open + 1;

    while i < len {
        match bytes[i] {
            b'(' => {
                depth += 1;
                current.push('(');
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    if !current.trim().is_empty() || !args.is_empty() {
                        args.push(current);
                    }
                    return (args, i + 1);
                }
                depth -= 1;
                current.push(')');
                i += 1;
            }
            b',' if depth == 0 => {
                args.push(std::mem::take(&mut current));
                i += 1;
            }
            b'"' | b'\'' => {
                i = copy_literal(bytes, i, &mut current);
            }
            b => {
                current.push(b as char);
                i += 1;
            }
        }
    }

    // Unterminated list: keep what we have
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current);
    }
    (args, i)
}

/// Substitute parameter occurrences in a macro body by the matching
/// arguments, boundary-checked so names inside longer identifiers and
/// inside literals are left alone. Arguments are inserted trimmed.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut result = String::with_capacity(body.len());
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = copy_literal(bytes, i, &mut result);
        } else if is_ident_start(b) {
            let start = i;
            i += 1;
            while i < len && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let ident = &body[start..i];
            if let Some(idx) = params.iter().position(|p| p == ident) {
                result.push_str(args.get(idx).map(|a| a.trim()).unwrap_or(""));
            } else {
                result.push_str(ident);
            }
        } else {
            result.push(b as char);
            i += 1;
        }
    }

    result
}

/// Copy a string or character literal verbatim, honouring escapes.
/// Returns the position just past the closing quote.
fn copy_literal(bytes: &[u8], start: usize, out: &mut String) -> usize {
    let quote = bytes[start];
    let len = bytes.len();
    out.push(quote as char);
    let mut i = start + 1;
    while i < len {
        let b = bytes[i];
        if b == b'\\' && i + 1 < len {
            out.push('\\');
            out.push(bytes[i + 1] as char);
            i += 2;
            continue;
        }
        out.push(b as char);
        i += 1;
        if b == quote {
            break;
        }
    }
    i
}

/// Copy a numeric token verbatim so suffix-shaped identifiers inside it
/// (as in `1e5` or `0xFF`) are never treated as macro names.
fn copy_number(bytes: &[u8], start: usize, out: &mut String) -> usize {
    let len = bytes.len();
    let mut i = start;
    while i < len {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' {
            out.push(b as char);
            i += 1;
        } else if (b == b'+' || b == b'-')
            && i > start
            && matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P')
        {
            out.push(b as char);
            i += 1;
        } else {
            break;
        }
    }
    i
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub(crate) fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(defs: &[&str]) -> MacroTable {
        let mut t = MacroTable::new();
        for d in defs {
            t.define(parse_define(d).unwrap());
        }
        t
    }

    #[test]
    fn test_parse_object_like() {
        let def = parse_define("MAX 100").unwrap();
        assert_eq!(def.name, "MAX");
        assert_eq!(def.params, None);
        assert_eq!(def.body, "100");
    }

    #[test]
    fn test_parse_function_like() {
        let def = parse_define("ADD(a, b) ((a) + (b))").unwrap();
        assert_eq!(def.name, "ADD");
        assert_eq!(def.params, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(def.body, "((a) + (b))");
    }

    #[test]
    fn test_whitespace_before_paren_is_object_like() {
        let def = parse_define("PAIR (1, 2)").unwrap();
        assert_eq!(def.params, None);
        assert_eq!(def.body, "(1, 2)");
    }

    #[test]
    fn test_object_like_expansion() {
        let t = table(&["MAX 100"]);
        assert_eq!(t.expand_line("int x = MAX;"), "int x = 100;");
    }

    #[test]
    fn test_no_partial_replacement() {
        let t = table(&["MAX 100"]);
        assert_eq!(t.expand_line("int MAXIMUM = 50;"), "int MAXIMUM = 50;");
    }

    #[test]
    fn test_function_like_expansion() {
        let t = table(&["ADD(a, b) ((a) + (b))"]);
        assert_eq!(t.expand_line("ADD(1, 4)"), "((1) + (4))");
    }

    #[test]
    fn test_function_like_without_parens_copies_through() {
        let t = table(&["ADD(a, b) ((a) + (b))"]);
        assert_eq!(t.expand_line("int ADD;"), "int ADD;");
    }

    #[test]
    fn test_argument_expansion_before_substitution() {
        let t = table(&["ADD(a, b) ((a) + (b))", "MIN_VAL 1"]);
        assert_eq!(t.expand_line("ADD(MIN_VAL, 4)"), "((1) + (4))");
    }

    #[test]
    fn test_nested_invocation_argument() {
        let t = table(&["ADD(a, b) ((a) + (b))"]);
        assert_eq!(t.expand_line("ADD(ADD(1, 2), 3)"), "((((1) + (2))) + (3))");
    }

    #[test]
    fn test_self_reference_does_not_loop() {
        let t = table(&["X X + 1"]);
        assert_eq!(t.expand_line("X"), "X + 1");
    }

    #[test]
    fn test_literals_are_opaque() {
        let t = table(&["MAX 100"]);
        assert_eq!(t.expand_line("\"MAX\" 'M' MAX"), "\"MAX\" 'M' 100");
    }

    #[test]
    fn test_idempotent_without_macros() {
        let t = MacroTable::new();
        let line = "for (int i = 0; i < 2.5e-3; i = i + 1) s += i;";
        assert_eq!(t.expand_line(line), line);
    }

    #[test]
    fn test_undefine() {
        let mut t = table(&["MAX 100"]);
        t.undefine("MAX");
        assert_eq!(t.expand_line("MAX"), "MAX");
        assert!(!t.is_defined("MAX"));
    }

    #[test]
    fn test_commas_in_string_argument() {
        let t = table(&["FIRST(a, b) a"]);
        assert_eq!(t.expand_line("FIRST(\"x,y\", 2)"), "\"x,y\"");
    }
}

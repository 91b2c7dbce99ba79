//! Template-call parser for single lines of wiki markup.
//!
//! Only the subset of syntax needed to recover etymology and pronunciation
//! arguments is understood: `{{name|positional|key=value}}` calls, nesting,
//! `+`-joined compound groups, and parenthesized asides that hide markup.

/// Nesting depth past which argument values are kept as plain text
pub const MAX_NESTING: usize = 32;

/// Value of a template argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    /// The argument itself contained one or more template calls
    Nested(Vec<TemplateCall>),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            ArgValue::Nested(_) => None,
        }
    }
}

/// One argument: `key` is empty for positional arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub key: String,
    pub value: ArgValue,
}

impl Arg {
    pub fn is_positional(&self) -> bool {
        self.key.is_empty()
    }
}

/// A parsed `{{...}}` call; argument order is preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCall {
    pub args: Vec<Arg>,
}

impl TemplateCall {
    pub fn positionals(&self) -> impl Iterator<Item = &ArgValue> {
        self.args.iter().filter(|a| a.is_positional()).map(|a| &a.value)
    }

    /// n-th positional argument; named arguments do not count
    pub fn positional(&self, n: usize) -> Option<&ArgValue> {
        self.positionals().nth(n)
    }

    pub fn positional_text(&self, n: usize) -> Option<&str> {
        self.positional(n).and_then(ArgValue::as_text)
    }

    /// Template name, i.e. the first positional argument
    pub fn name(&self) -> Option<&str> {
        self.positional_text(0)
    }

    pub fn named(&self, key: &str) -> Option<&ArgValue> {
        self.args.iter().find(|a| a.key == key).map(|a| &a.value)
    }
}

/// A top-level unit of a line: a lone call or several calls joined by `+`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateGroup {
    Single(TemplateCall),
    Compound(Vec<TemplateCall>),
}

impl TemplateGroup {
    pub fn calls(&self) -> &[TemplateCall] {
        match self {
            TemplateGroup::Single(call) => std::slice::from_ref(call),
            TemplateGroup::Compound(calls) => calls,
        }
    }

    pub fn first(&self) -> Option<&TemplateCall> {
        self.calls().first()
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, TemplateGroup::Compound(_))
    }
}

/// Parse every top-level template group on a line
pub fn parse_line(line: &str) -> Vec<TemplateGroup> {
    split_calls(line)
        .into_iter()
        .map(|members| {
            let mut calls: Vec<TemplateCall> = members.into_iter().map(|inner| parse_call(inner, 1)).collect();
            if calls.len() == 1 {
                TemplateGroup::Single(calls.remove(0))
            } else {
                TemplateGroup::Compound(calls)
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Brace scanning
// ─────────────────────────────────────────────────────────────────────────────

/// Find the inner text of each top-level `{{...}}` call, grouping calls joined
/// by a top-level `+`. Delimiters are ASCII, so byte offsets are char boundaries.
fn split_calls(text: &str) -> Vec<Vec<&str>> {
    let bytes = text.as_bytes();
    let mut groups: Vec<Vec<&str>> = Vec::new();

    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_paren = false;
    let mut compound = false;

    let mut i = 0;
    while i + 1 < bytes.len() {
        let (c, next) = (bytes[i], bytes[i + 1]);
        if in_paren {
            if c == b')' {
                in_paren = false;
            }
        } else if depth == 0 && c == b'(' {
            in_paren = true;
        } else if c == b'{' && next == b'{' {
            if depth == 0 {
                start = i + 2;
            }
            depth += 1;
            i += 1;
        } else if c == b'}' && next == b'}' {
            // stray closers at depth 0 are ignored
            if depth > 0 {
                depth -= 1;
                if depth == 0 {
                    let inner = &text[start..i];
                    match groups.last_mut() {
                        Some(group) if compound => group.push(inner),
                        _ => groups.push(vec![inner]),
                    }
                    compound = false;
                }
            }
            i += 1;
        } else if c == b'+' && depth == 0 {
            compound = true;
        }
        i += 1;
    }

    // an unterminated call (depth > 0 here) contributes nothing
    groups
}

/// Split a call's inner text on `|` that is not inside a nested call
fn split_pipes(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut sections = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        if c == b'{' && next == Some(b'{') {
            depth += 1;
            i += 1;
        } else if c == b'}' && next == Some(b'}') {
            depth = depth.saturating_sub(1);
            i += 1;
        } else if c == b'|' && depth == 0 {
            sections.push(&inner[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    sections.push(&inner[start..]);
    sections
}

/// Split `key=value` on the first `=` reached through alphabetic characters only
fn split_key(raw: &str) -> (&str, &str) {
    for (i, ch) in raw.char_indices() {
        if ch == '=' {
            return (&raw[..i], &raw[i + 1..]);
        } else if !ch.is_alphabetic() {
            break;
        }
    }
    ("", raw)
}

fn parse_call(inner: &str, depth: usize) -> TemplateCall {
    let args = split_pipes(inner)
        .into_iter()
        .map(|raw| parse_arg(raw, depth))
        .collect();
    TemplateCall { args }
}

fn parse_arg(raw: &str, depth: usize) -> Arg {
    let (key, value) = split_key(raw);

    if depth < MAX_NESTING {
        let nested: Vec<TemplateCall> = split_calls(value)
            .into_iter()
            .flatten()
            .map(|inner| parse_call(inner, depth + 1))
            .collect();
        if !nested.is_empty() {
            return Arg {
                key: key.to_string(),
                value: ArgValue::Nested(nested),
            };
        }
    }

    Arg {
        key: key.to_string(),
        value: ArgValue::Text(value.to_string()),
    }
}

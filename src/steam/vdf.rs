//! Minimal parser for Valve's KeyValues ("VDF") text format, enough for
//! `libraryfolders.vdf` and `appmanifest_*.acf`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum VdfValue {
    String(String),
    Node(VdfNode),
}

/// One `{ ... }` block. Keys are case-sensitive, as Steam writes them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VdfNode(pub BTreeMap<String, VdfValue>);

impl VdfNode {
    pub fn get_node(&self, key: &str) -> Option<&VdfNode> {
        match self.0.get(key) {
            Some(VdfValue::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(VdfValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &VdfValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parse a KeyValues document into its root node.
///
/// The format is line-oriented: a bare key line opens a block with the
/// following `{`, a `"key" "value"` line is a string entry, and `//` starts
/// a comment. An unmatched closing brace is an error; an unclosed block at
/// end of input is tolerated, matching how Steam's own files are consumed.
pub fn parse(input: &str) -> Result<VdfNode> {
    let mut stack: Vec<VdfNode> = vec![VdfNode::default()];
    let mut keys: Vec<String> = Vec::new();
    let mut pending_key: Option<String> = None;

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if line == "{" {
            let key = pending_key.take().unwrap_or_default();
            keys.push(key);
            stack.push(VdfNode::default());
            continue;
        }

        if line == "}" {
            if stack.len() <= 1 {
                return Err(Error::Config("unexpected closing brace in VDF".into()));
            }
            let node = stack.pop().expect("stack underflow");
            let key = keys.pop().expect("key underflow");
            stack
                .last_mut()
                .expect("root always present")
                .0
                .insert(key, VdfValue::Node(node));
            continue;
        }

        let tokens = tokenize_line(line);
        match tokens.len() {
            1 => pending_key = Some(tokens.into_iter().next().expect("len checked")),
            n if n >= 2 => {
                let mut it = tokens.into_iter();
                let key = it.next().expect("len checked");
                let value = it.next().expect("len checked");
                stack
                    .last_mut()
                    .expect("root always present")
                    .0
                    .insert(key, VdfValue::String(value));
            }
            _ => {}
        }
    }

    Ok(stack.into_iter().next().expect("root always present"))
}

fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            if in_quotes {
                tokens.push(std::mem::take(&mut current));
            }
            in_quotes = !in_quotes;
            continue;
        }

        if in_quotes || !c.is_whitespace() {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARYFOLDERS: &str = r#"
"libraryfolders"
{
    "0"
    {
        "path"      "/home/user/.local/share/Steam"
        "label"     ""
        "apps"
        {
            "292030"        "38594541069"
        }
    }
    "1"
    {
        "path"      "/mnt/games/SteamLibrary"
        "apps"
        {
            "1091500"       "68719476736"
        }
    }
}
"#;

    #[test]
    fn parses_nested_blocks() {
        let root = parse(LIBRARYFOLDERS).unwrap();
        let folders = root.get_node("libraryfolders").unwrap();
        let first = folders.get_node("0").unwrap();
        assert_eq!(first.get_str("path"), Some("/home/user/.local/share/Steam"));
        assert_eq!(first.get_str("label"), Some(""));
        assert_eq!(
            first.get_node("apps").unwrap().get_str("292030"),
            Some("38594541069")
        );
        assert_eq!(
            folders.get_node("1").unwrap().get_str("path"),
            Some("/mnt/games/SteamLibrary")
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let root = parse("// header\n\n\"k\"  \"v\"\n").unwrap();
        assert_eq!(root.get_str("k"), Some("v"));
    }

    #[test]
    fn quoted_values_keep_inner_whitespace() {
        let root = parse("\"name\"\t\t\"The Witcher 3: Wild Hunt\"\n").unwrap();
        assert_eq!(root.get_str("name"), Some("The Witcher 3: Wild Hunt"));
    }

    #[test]
    fn unmatched_closing_brace_errors() {
        assert!(parse("}\n").is_err());
    }

    #[test]
    fn unclosed_block_is_tolerated() {
        let root = parse("\"outer\"\n{\n\"k\" \"v\"\n").unwrap();
        // The unclosed block is dropped rather than failing the parse.
        assert!(root.get_node("outer").is_none());
    }

    #[test]
    fn wrong_typed_access_returns_none() {
        let root = parse(LIBRARYFOLDERS).unwrap();
        assert!(root.get_str("libraryfolders").is_none());
        assert!(root.get_node("missing").is_none());
    }
}

use std::collections::HashMap;
use std::path::Path;

use crate::suite::SourcePosition;

/// A `fn` item declared directly inside an `impl` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFn {
    pub name: String,
    pub position: SourcePosition,
    pub is_pub: bool,
}

/// Declaration positions of the methods found in one Rust source file,
/// keyed by the self type of the `impl` blocks that declare them.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    impls: HashMap<String, Vec<DeclaredFn>>,
}

impl SourceIndex {
    /// Read and index a source file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(extract_methods_from_source(&source))
    }

    /// Methods of `type_name` in textual order, across all of its impl blocks.
    pub fn methods_of(&self, type_name: &str) -> &[DeclaredFn] {
        self.impls.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First declaration of `method` on `type_name`.
    pub fn find(&self, type_name: &str, method: &str) -> Option<&DeclaredFn> {
        self.methods_of(type_name).iter().find(|f| f.name == method)
    }

    pub fn type_count(&self) -> usize {
        self.impls.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Lifetime,
    Literal,
    Arrow,
    PathSep,
    Punct(u8),
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    offset: usize,
}

/// Build a lookup table of byte-offset → 1-indexed line number.
fn build_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0usize]; // line 1 starts at offset 0
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn offset_to_position(source: &str, line_starts: &[usize], offset: usize) -> SourcePosition {
    let idx = match line_starts.binary_search(&offset) {
        Ok(idx) => idx,
        Err(idx) => idx - 1, // idx is the next line
    };
    let column = source[line_starts[idx]..offset].chars().count() + 1;
    SourcePosition::new((idx + 1) as u32, column as u32)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Skip a quoted string body starting just after the opening quote.
fn skip_quoted(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// If a raw string (`r"..."`, `r#"..."#`) starts at `i`, return the offset past it.
fn skip_raw_string(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    let mut hashes = 0;
    while j < bytes.len() && bytes[j] == b'#' {
        hashes += 1;
        j += 1;
    }
    if j >= bytes.len() || bytes[j] != b'"' {
        return None;
    }
    j += 1;
    while j < bytes.len() {
        if bytes[j] == b'"'
            && bytes[j + 1..].len() >= hashes
            && bytes[j + 1..j + 1 + hashes].iter().all(|&b| b == b'#')
        {
            return Some(j + 1 + hashes);
        }
        j += 1;
    }
    Some(bytes.len())
}

fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 0usize;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"/*") {
            depth += 1;
            i += 2;
        } else if bytes[i..].starts_with(b"*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        let start = i;

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'/' && next == Some(b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if b == b'/' && next == Some(b'*') {
            i = skip_block_comment(bytes, i);
            continue;
        }

        let kind = if b == b'"' {
            i = skip_quoted(bytes, i + 1);
            TokenKind::Literal
        } else if b == b'r' && matches!(next, Some(b'"') | Some(b'#')) && skip_raw_string(bytes, i).is_some() {
            i = skip_raw_string(bytes, i).unwrap_or(bytes.len());
            TokenKind::Literal
        } else if b == b'b' && next == Some(b'"') {
            i = skip_quoted(bytes, i + 2);
            TokenKind::Literal
        } else if b == b'b' && next == Some(b'r') && skip_raw_string(bytes, i + 1).is_some() {
            i = skip_raw_string(bytes, i + 1).unwrap_or(bytes.len());
            TokenKind::Literal
        } else if b == b'b' && next == Some(b'\'') {
            i = skip_char_literal(source, i + 1).unwrap_or(i + 2);
            TokenKind::Literal
        } else if b == b'\'' {
            match skip_char_literal(source, i) {
                Some(end) => {
                    i = end;
                    TokenKind::Literal
                }
                None => {
                    i += 1;
                    while i < bytes.len() && is_ident_continue(bytes[i]) {
                        i += 1;
                    }
                    TokenKind::Lifetime
                }
            }
        } else if b == b'r' && next == Some(b'#') && bytes.get(i + 2).is_some_and(|&c| is_ident_start(c)) {
            // Raw identifier: the token text excludes the `r#` prefix.
            i += 2;
            let ident_start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            tokens.push(Token { kind: TokenKind::Ident, text: &source[ident_start..i], offset: ident_start });
            continue;
        } else if is_ident_start(b) {
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            TokenKind::Ident
        } else if b.is_ascii_digit() {
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            TokenKind::Literal
        } else if b == b'-' && next == Some(b'>') {
            i += 2;
            TokenKind::Arrow
        } else if b == b':' && next == Some(b':') {
            i += 2;
            TokenKind::PathSep
        } else {
            i += 1;
            TokenKind::Punct(b)
        };

        tokens.push(Token { kind, text: &source[start..i.min(bytes.len())], offset: start });
    }

    tokens
}

/// If a character literal starts at the quote at `i`, return the offset past it.
/// Returns None for lifetimes and labels.
fn skip_char_literal(source: &str, i: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    match bytes.get(i + 1)? {
        b'\\' => {
            // Past the backslash and the escaped character.
            let mut j = i + 3;
            while j < bytes.len() && bytes[j] != b'\'' {
                j += 1;
            }
            Some((j + 1).min(bytes.len()))
        }
        _ => {
            let ch = source.get(i + 1..)?.chars().next()?;
            let close = i + 1 + ch.len_utf8();
            (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
        }
    }
}

/// Whether an `impl` keyword at `idx` starts an item rather than an
/// `impl Trait` type.
fn is_item_impl(tokens: &[Token<'_>], idx: usize) -> bool {
    let Some(prev) = idx.checked_sub(1).map(|p| &tokens[p]) else { return true };
    match prev.kind {
        TokenKind::Punct(b'}') | TokenKind::Punct(b';') | TokenKind::Punct(b'{') | TokenKind::Punct(b']') => true,
        TokenKind::Ident => matches!(prev.text, "unsafe" | "default"),
        _ => false,
    }
}

/// Self type of an impl header: the last path segment outside generics.
fn self_type_name(tokens: &[Token<'_>]) -> Option<String> {
    let mut angle = 0usize;
    let mut name = None;
    for tok in tokens {
        match tok.kind {
            TokenKind::Punct(b'<') => angle += 1,
            TokenKind::Punct(b'>') => angle = angle.saturating_sub(1),
            TokenKind::Ident if angle == 0 && !matches!(tok.text, "dyn" | "mut" | "const") => {
                name = Some(tok.text.to_string());
            }
            _ => {}
        }
    }
    name
}

/// Parse `impl [<..>] [Trait for] Type [where ..] {`, starting just after
/// `impl`. Returns the self type name and the index of the opening brace.
fn parse_impl_header(tokens: &[Token<'_>], start: usize) -> Option<(String, usize)> {
    let mut j = start;
    let mut angle = 0usize;

    // Generic parameters directly after `impl`.
    if tokens.get(j)?.kind == TokenKind::Punct(b'<') {
        loop {
            match tokens.get(j)?.kind {
                TokenKind::Punct(b'<') => angle += 1,
                TokenKind::Punct(b'>') => {
                    angle -= 1;
                    if angle == 0 {
                        j += 1;
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
    }

    let mut type_start = j;
    let mut type_end = None;
    while let Some(tok) = tokens.get(j) {
        match tok.kind {
            TokenKind::Punct(b'<') => angle += 1,
            TokenKind::Punct(b'>') => angle = angle.saturating_sub(1),
            TokenKind::Ident if angle == 0 && tok.text == "for" && type_end.is_none() => type_start = j + 1,
            TokenKind::Ident if angle == 0 && tok.text == "where" => {
                type_end.get_or_insert(j);
            }
            TokenKind::Punct(b'{') if angle == 0 => {
                let end = type_end.unwrap_or(j);
                return self_type_name(&tokens[type_start..end]).map(|name| (name, j));
            }
            TokenKind::Punct(b';') if angle == 0 => return None,
            _ => {}
        }
        j += 1;
    }
    None
}

/// Whether the `fn` keyword at `idx` carries a `pub` visibility.
fn declared_pub(tokens: &[Token<'_>], idx: usize) -> bool {
    let mut k = idx;
    while k > 0 {
        k -= 1;
        let tok = &tokens[k];
        match tok.kind {
            TokenKind::Ident if tok.text == "pub" => return true,
            TokenKind::Ident if matches!(tok.text, "const" | "async" | "unsafe" | "extern" | "default") => {}
            TokenKind::Literal => {} // extern "C"
            TokenKind::Punct(b')') => {
                // pub(crate), pub(in path)
                while k > 0 && tokens[k].kind != TokenKind::Punct(b'(') {
                    k -= 1;
                }
            }
            _ => return false,
        }
    }
    false
}

/// Extract the methods declared in every `impl` block of a Rust source string.
pub fn extract_methods_from_source(source: &str) -> SourceIndex {
    let tokens = tokenize(source);
    let line_starts = build_line_starts(source);
    let mut index = SourceIndex::default();

    let mut depth = 0usize;
    // (brace depth inside the impl body, self type)
    let mut open_impls: Vec<(usize, String)> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let tok = tokens[i];
        match tok.kind {
            TokenKind::Punct(b'{') => depth += 1,
            TokenKind::Punct(b'}') => {
                depth = depth.saturating_sub(1);
                if open_impls.last().is_some_and(|(d, _)| *d > depth) {
                    open_impls.pop();
                }
            }
            TokenKind::Ident if tok.text == "impl" && is_item_impl(&tokens, i) => {
                if let Some((type_name, brace)) = parse_impl_header(&tokens, i + 1) {
                    depth += 1;
                    open_impls.push((depth, type_name));
                    i = brace + 1;
                    continue;
                }
            }
            TokenKind::Ident if tok.text == "fn" => {
                let Some((body_depth, type_name)) = open_impls.last() else {
                    i += 1;
                    continue;
                };
                if *body_depth == depth {
                    if let Some(name) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Ident) {
                        index.impls.entry(type_name.clone()).or_default().push(DeclaredFn {
                            name: name.text.to_string(),
                            position: offset_to_position(source, &line_starts, name.offset),
                            is_pub: declared_pub(&tokens, i),
                        });
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    index
}

//! Translation of `<{ ... }>` templates into Handlebars source.
//!
//! Handlebars only knows `{{ }}`. Every tag body is copied between `{{` and
//! `}}` unchanged, and every run of literal text is replaced by a call to the
//! text helper that writes it back verbatim, so Handlebars never interprets
//! template text. The helper call carries as many newlines as the text it
//! replaces, which keeps line numbers in Handlebars errors aligned with the
//! source template.

use crate::error::{VaultifyError, VaultifyResult};

pub const OPEN: &str = "<{";
pub const CLOSE: &str = "}>";

/// Name of the helper that emits literal text chunks.
pub const TEXT_HELPER: &str = "__text";

/// A template rewritten for Handlebars.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    /// Handlebars source
    pub source: String,
    /// Literal text, indexed by the argument of the text helper
    pub chunks: Vec<String>,
}

/// Name of the secret lookup function.
pub const VAULT_HELPER: &str = "vault";

/// Decode template bytes as UTF-8.
///
/// Invalid input is a parse error at the line holding the first bad byte.
pub fn decode(source: &[u8]) -> VaultifyResult<&str> {
    std::str::from_utf8(source).map_err(|err| {
        let valid = &source[..err.valid_up_to()];
        VaultifyError::Parse {
            line: 1 + valid.iter().filter(|b| **b == b'\n').count(),
            message: format!("template is not valid UTF-8: {}", err),
        }
    })
}

/// Rewrite a `<{ }>` template as Handlebars source.
///
/// A tag body starting with `~` trims the whitespace before the tag, one
/// ending with `~` trims the whitespace after it.
pub fn translate(template: &str) -> VaultifyResult<Translated> {
    let mut translated = Translated {
        source: String::with_capacity(template.len() + 32),
        chunks: Vec::new(),
    };
    let mut rest = template;
    let mut line = 1;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let text = &rest[..start];
        let after = &rest[start + OPEN.len()..];
        let tag_line = line + count_newlines(text);

        let end = find_close(after).ok_or_else(|| VaultifyError::Parse {
            line: tag_line,
            message: format!("unclosed tag: missing '{}'", CLOSE),
        })?;
        let body = &after[..end];

        if references_vault(body) {
            return Err(VaultifyError::InvalidArgument(format!(
                "line {}: {} must be called with a secret name, e.g. {} \"NAME\"",
                tag_line, VAULT_HELPER, VAULT_HELPER
            )));
        }

        let trim_before = body.starts_with('~');
        let trim_after = body.len() > 1 && body.ends_with('~');

        translated.push_text(text, trim_next, trim_before);
        translated.source.push_str("{{");
        translated.source.push_str(body);
        translated.source.push_str("}}");

        line = tag_line + count_newlines(body);
        trim_next = trim_after;
        rest = &after[end + CLOSE.len()..];
    }

    translated.push_text(rest, trim_next, false);
    Ok(translated)
}

impl Translated {
    fn push_text(&mut self, text: &str, trim_start: bool, trim_end: bool) {
        if text.is_empty() {
            return;
        }

        let mut chunk = text;
        if trim_start {
            chunk = chunk.trim_start();
        }
        if trim_end {
            chunk = chunk.trim_end();
        }

        self.source
            .push_str(&format!("{{{{{} {}", TEXT_HELPER, self.chunks.len()));
        // Newlines of the replaced text, including trimmed ones
        for _ in 0..count_newlines(text) {
            self.source.push('\n');
        }
        self.source.push_str("}}");
        self.chunks.push(chunk.to_string());
    }
}

/// Find the offset of the `}>` closing a tag body.
///
/// String literals are skipped so a quoted `}>` does not end the tag.
/// Comment bodies are not tokenized.
fn find_close(body: &str) -> Option<usize> {
    let unmarked = body.strip_prefix('~').unwrap_or(body);
    let marker = body.len() - unmarked.len();

    if unmarked.starts_with("!--") {
        return unmarked
            .find("--}>")
            .or_else(|| unmarked.find("--~}>").map(|i| i + 1))
            .map(|i| marker + i + 2);
    }
    if unmarked.starts_with('!') {
        return body.find(CLOSE);
    }

    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(_), b'\\') => i += 1,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, c @ (b'"' | b'\'')) => quote = Some(c),
            (None, b'}') if bytes.get(i + 1) == Some(&b'>') => return Some(i),
            (None, _) => {}
        }
        i += 1;
    }
    None
}

/// Whether a tag body uses `vault` as a value rather than calling it.
///
/// `vault` is a call when it starts the tag or a subexpression. Block
/// parameters (`as |vault|`) are names, not references.
fn references_vault(body: &str) -> bool {
    if body.trim_start_matches('~').starts_with('!') {
        return false;
    }

    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut prev: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == b'\\' {
                i += 1;
            } else if c == q {
                quote = None;
                prev = Some(c);
            }
            i += 1;
            continue;
        }

        if c == b'"' || c == b'\'' {
            quote = Some(c);
            i += 1;
        } else if c.is_ascii_whitespace() {
            i += 1;
        } else if is_separator(c) {
            prev = Some(c);
            i += 1;
        } else {
            let start = i;
            while i < bytes.len() && !is_word_end(bytes[i]) {
                i += 1;
            }
            let called = matches!(prev, None | Some(b'(' | b'{' | b'~' | b'|'));
            if &body[start..i] == VAULT_HELPER && !called {
                return true;
            }
            prev = Some(bytes[i - 1]);
        }
    }
    false
}

fn is_separator(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'=' | b'|' | b'~' | b'{' | b'}')
}

fn is_word_end(c: u8) -> bool {
    c.is_ascii_whitespace() || is_separator(c) || c == b'"' || c == b'\''
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

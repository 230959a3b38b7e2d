//! Literal-aware scanning over rendered Go source.
//!
//! Fragment bodies are pre-rendered text, so the chain extractor and the
//! error-path rewrite both need to pair parentheses without being fooled by
//! a `(` inside `"a (string)"`, a raw string, a rune literal or a comment.

/// Iterator over `(offset, byte)` for every byte that is code, skipping the
/// contents and delimiters of literals and comments.
pub struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CodeBytes<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::from(text, 0)
    }

    /// Start scanning at `pos`, which must not be inside a literal.
    pub fn from(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }
}

impl Iterator for CodeBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.bytes;
        while self.pos < bytes.len() {
            let i = self.pos;
            match bytes[i] {
                quote @ (b'"' | b'\'') => self.pos = skip_quoted(bytes, i, quote),
                b'`' => {
                    self.pos = bytes[i + 1..]
                        .iter()
                        .position(|&b| b == b'`')
                        .map_or(bytes.len(), |p| i + 1 + p + 1);
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    self.pos = bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| i + p);
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    self.pos = bytes[i + 2..]
                        .windows(2)
                        .position(|w| w == b"*/")
                        .map_or(bytes.len(), |p| i + 2 + p + 2);
                }
                b => {
                    self.pos += 1;
                    return Some((i, b));
                }
            }
        }
        None
    }
}

/// Offset just past an interpreted string or rune literal starting at
/// `start`. An unterminated literal ends at the newline.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Per-byte flag: `true` where the byte is code rather than literal or
/// comment text.
fn code_mask(text: &str) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    for (i, _) in CodeBytes::new(text) {
        mask[i] = true;
    }
    mask
}

/// Offsets of every occurrence of `pattern` that starts in code.
pub fn find_all_in_code(text: &str, pattern: &str) -> Vec<usize> {
    let mask = code_mask(text);
    text.match_indices(pattern)
        .map(|(i, _)| i)
        .filter(|&i| mask[i])
        .collect()
}

/// Offset of the first occurrence of `pattern` that starts in code.
pub fn find_in_code(text: &str, pattern: &str) -> Option<usize> {
    find_all_in_code(text, pattern).into_iter().next()
}

/// Offset of the `)` matching the `(` at `open`, tracking nesting depth.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    if text.as_bytes().get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, b) in CodeBytes::from(text, open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Offset of the `(` opening the outermost call group whose `)` is the
/// last non-whitespace byte of `text`: the group that applies an
/// expression to its argument. Scanning starts at `start`.
pub fn final_call_open(text: &str, start: usize) -> Option<usize> {
    let end = text.trim_end().len().checked_sub(1)?;
    if text.as_bytes()[end] != b')' {
        return None;
    }

    let mut stack = Vec::new();
    for (i, b) in CodeBytes::from(text, start) {
        match b {
            b'(' => stack.push(i),
            b')' => {
                let open = stack.pop()?;
                if stack.is_empty() && i == end {
                    return Some(open);
                }
            }
            _ => {}
        }
    }
    None
}

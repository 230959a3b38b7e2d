//! Rendering Rust values as Go literals.

/// Quote `s` as a Go interpreted string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `value` as a Go decimal literal, if it is a plain finite number.
///
/// Leading zeros are dropped from the integer part: Go reads `0123` as
/// octal and rejects `09` outright.
pub fn number(value: &str) -> Option<String> {
    let value = value.trim();
    let plain = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    match value.parse::<f64>() {
        Ok(n) if plain && n.is_finite() => {}
        _ => return None,
    }

    let (sign, unsigned) = match value.strip_prefix(['-', '+']) {
        Some(rest) => (&value[..1], rest),
        None => ("", value),
    };
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let (int_part, tail) = unsigned.split_at(digits);
    let trimmed = int_part.trim_start_matches('0');
    let int_part = if trimmed.is_empty() && !int_part.is_empty() {
        "0"
    } else {
        trimmed
    };
    Some(format!("{sign}{int_part}{tail}"))
}

/// `value` as written, if it is an integer.
pub fn integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

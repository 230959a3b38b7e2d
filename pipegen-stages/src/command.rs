//! The origin command recorded in each fragment.
//!
//! It is the invocation with the generation switches removed, so that the
//! header comment of a generated program can be pasted back into a shell.

/// Name the binary is recorded under, whatever path it was run from.
pub const PROGRAM: &str = "pipegen";

/// Switches that only select generation mode.
const MODE_SWITCHES: [&str; 3] = ["-g", "--generate", "--no-generate"];

/// Render `args` (including argv[0]) as a shell-safe command line.
pub fn origin_command<S: AsRef<str>>(args: &[S]) -> String {
    let mut parts = vec![PROGRAM.to_string()];
    parts.extend(
        args.iter()
            .skip(1)
            .map(AsRef::as_ref)
            .filter(|arg| !MODE_SWITCHES.contains(arg))
            .map(shell_quote),
    );
    parts.join(" ")
}

fn is_simple_shell_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':')
}

/// Quote `s` for a POSIX shell when it contains anything but simple chars.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_simple_shell_char) {
        return s.to_string();
    }

    if s.contains('\'') {
        let mut escaped = String::with_capacity(s.len() + 2);
        escaped.push('"');
        for c in s.chars() {
            if matches!(c, '\\' | '"' | '$' | '`') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('"');
        return escaped;
    }

    format!("'{s}'")
}

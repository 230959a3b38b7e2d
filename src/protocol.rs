//! Line-delimited fragment protocol.
//!
//! Fragments travel between pipeline processes as JSON Lines: one
//! self-describing object per line, in emission order. An empty or absent
//! upstream is the normal "first stage" condition and yields no fragments.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// Read every fragment from `reader` until end of stream.
///
/// Blank lines are skipped. Any other line that is not UTF-8 or does not
/// decode as a fragment is a framing error reported with its 1-based line
/// number.
pub fn read_fragments<R: BufRead>(mut reader: R) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    let mut buf = Vec::new();
    let mut line_num = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_num += 1;

        let line = std::str::from_utf8(&buf).map_err(|e| Error::Protocol {
            line: line_num,
            message: format!("invalid UTF-8: {e}"),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fragment = serde_json::from_str::<Fragment>(line).map_err(|e| Error::Protocol {
            line: line_num,
            message: e.to_string(),
        })?;
        fragments.push(fragment);
    }

    debug!(count = fragments.len(), "read upstream fragments");
    Ok(fragments)
}

/// Read upstream fragments from standard input.
///
/// Stdin attached to a terminal means nothing is piped in, so this stage
/// is first in the chain.
pub fn read_stdin() -> Result<Vec<Fragment>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        debug!("stdin is a terminal; no upstream fragments");
        return Ok(Vec::new());
    }
    read_fragments(stdin.lock())
}

/// Append one fragment as a single line.
pub fn write_fragment<W: Write>(writer: &mut W, fragment: &Fragment) -> Result<()> {
    serde_json::to_writer(&mut *writer, fragment)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write a fragment sequence in order and flush.
pub fn write_fragments<W: Write>(mut writer: W, fragments: &[Fragment]) -> Result<()> {
    for fragment in fragments {
        write_fragment(&mut writer, fragment)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a fragment sequence to standard output.
pub fn write_stdout(fragments: &[Fragment]) -> Result<()> {
    let stdout = io::stdout();
    write_fragments(stdout.lock(), fragments)
}

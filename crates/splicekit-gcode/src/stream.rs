//! Line streaming with early abort

use std::borrow::Cow;
use std::io::{self, BufRead};

/// Call `f` with every line of `reader` (1-based line number, text without
/// the line terminator).
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD; slicers put
/// Latin-1 text in comments, and a comment is never interpreted.
///
/// The first error returned by `f` stops the stream and is returned as is.
/// Returns the number of lines read.
pub fn for_each_line<R, F, E>(mut reader: R, mut f: F) -> Result<usize, E>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<(), E>,
    E: From<io::Error>,
{
    let mut buffer = Vec::new();
    let mut line_no = 0;

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        line_no += 1;
        let text = String::from_utf8_lossy(&buffer);
        if let Cow::Owned(_) = text {
            tracing::warn!("Line {} is not valid UTF-8; invalid bytes replaced", line_no);
        }
        let line = text.trim_end_matches(['\n', '\r']);
        f(line_no, line)?;
    }

    Ok(line_no)
}

use async_stream::try_stream;
use futures::{Stream, StreamExt};

/// Splits a byte stream into newline-delimited lines.
///
/// Blank lines are skipped, a trailing `\r` is dropped and the last line is
/// emitted even when the body does not end with `\n`.
pub(crate) fn ndjson_lines<S, B, E>(bytes: S) -> impl Stream<Item = Result<Vec<u8>, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    try_stream! {
        let mut buf = Vec::<u8>::new();
        futures::pin_mut!(bytes);

        while let Some(chunk) = bytes.next().await {
            buf.extend_from_slice(chunk?.as_ref());

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                if let Some(line) = trim_line(&line[..line.len() - 1]) {
                    yield line.to_vec();
                }
            }
        }

        if let Some(line) = trim_line(&buf) {
            yield line.to_vec();
        }
    }
}

fn trim_line(line: &[u8]) -> Option<&[u8]> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(line)
    }
}

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde_json::{from_slice, Value};
use tracing::{trace, warn};

use crate::error::{OandaError, Result};

/// Splits a chunked streaming body into newline delimited json events. Events
/// may be cut anywhere between two chunks; blank keep-alive lines are skipped.
pub(crate) fn json_lines<S, B, E>(chunks: S) -> impl Stream<Item=Result<Value>> + Send + 'static
    where
        S: Stream<Item=std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<OandaError> + Send + 'static,
{
    let lines = LineBuffer {
        chunks: chunks.boxed(),
        buffer: Vec::new(),
        done: false,
    };
    stream::unfold(lines, |mut lines| async move {
        lines.next_event().await.map(|event| (event, lines))
    })
}

struct LineBuffer<B, E> {
    chunks: BoxStream<'static, std::result::Result<B, E>>,
    buffer: Vec<u8>,
    done: bool,
}

impl<B, E> LineBuffer<B, E>
    where
        B: AsRef<[u8]>,
        E: Into<OandaError>,
{
    async fn next_event(&mut self) -> Option<Result<Value>> {
        loop {
            if let Some(line) = self.next_line() {
                if is_blank(&line) {
                    continue;
                }
                return Some(parse(&line));
            }
            if self.done {
                if is_blank(&self.buffer) {
                    return None;
                }
                let line = std::mem::take(&mut self.buffer);
                return Some(parse(&line));
            }
            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(error)) => {
                    warn!("Transactions stream connection failed");
                    self.done = true;
                    self.buffer.clear();
                    return Some(Err(error.into()));
                }
                None => self.done = true,
            }
        }
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let position = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line = self.buffer.drain(..=position).collect::<Vec<_>>();
        line.pop();
        Some(line)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|byte| byte.is_ascii_whitespace())
}

fn parse(line: &[u8]) -> Result<Value> {
    trace!("Stream event: {}", String::from_utf8_lossy(line));
    Ok(from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;

    fn collect(chunks: Vec<Result<&'static [u8]>>) -> Vec<Result<Value>> {
        block_on(json_lines(stream::iter(chunks)).collect::<Vec<_>>())
    }

    #[test]
    fn test_events_split_across_chunks() {
        let events = collect(vec![
            Ok(br#"{"type":"HEARTBEAT","lastTransactionID":"6"}"#.as_slice()),
            Ok(b"\n{\"type\":\"ORDER_".as_slice()),
            Ok(b"FILL\",\"id\":\"7\"}\r\n\n".as_slice()),
        ]);
        let events = events.into_iter().map(Result::unwrap).collect::<Vec<_>>();
        assert_eq!(events, vec![
            json!({"type": "HEARTBEAT", "lastTransactionID": "6"}),
            json!({"type": "ORDER_FILL", "id": "7"}),
        ]);
    }

    #[test]
    fn test_trailing_event_without_newline() {
        let events = collect(vec![Ok(br#"{"id":"1"}"#.as_slice())]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &json!({"id": "1"}));
    }

    #[test]
    fn test_transport_error_ends_the_sequence() {
        let events = collect(vec![
            Ok(b"{\"id\":\"1\"}\n{\"id\"".as_slice()),
            Err(OandaError::Other(anyhow::anyhow!("connection reset"))),
            Ok(b"{\"id\":\"2\"}\n".as_slice()),
        ]);
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(OandaError::Other(_))));
    }

    #[test]
    fn test_malformed_line_is_reported() {
        let events = collect(vec![Ok(b"not json\n{\"id\":\"1\"}\n".as_slice())]);
        assert!(matches!(events[0], Err(OandaError::JsonParse(_))));
        assert!(events[1].is_ok());
    }
}

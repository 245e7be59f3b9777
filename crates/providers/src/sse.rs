//! Server-sent-events plumbing for streaming chat responses.
//!
//! [`SseDecoder`] turns arbitrary byte chunks into complete `data:` payloads.
//! Bytes are buffered until a newline arrives, so multi-byte UTF-8 sequences
//! split across network chunks (common with German umlauts) decode intact.
//!
//! [`spawn_pump`] drives a response body on a background task and feeds a
//! [`FragmentSender`]; each vendor supplies only a payload parser.

use futures::StreamExt;
use paragraf_core::error::ProviderError;
use paragraf_core::provider::FragmentSender;
use tracing::{debug, trace};

/// Incremental line decoder for an SSE body.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the `data:` payloads of every completed line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final unterminated line at end of body.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    // Skip blank separators, comments and non-data fields (event:, id:, retry:)
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim().is_empty() {
        return None;
    }
    Some(data.to_string())
}

/// What a vendor parser extracted from one SSE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseStep {
    /// A text delta; `finished` is set once the backend reports a finish reason.
    Delta { text: String, finished: bool },
    /// Explicit end-of-stream sentinel (`[DONE]`).
    Done,
    /// Keep-alive or metadata-only payload.
    Skip,
}

/// Payload parser supplied by each vendor.
pub(crate) type SseParser = fn(&str) -> Result<SseStep, ProviderError>;

/// Read `response` as SSE on a background task, pushing fragments to `sender`.
///
/// The stream completes on an explicit sentinel, or at end of body when a
/// finish reason was seen. A body that ends without either is left
/// unfinished, which the consumer observes as an interruption. When the
/// consumer drops its stream the task returns at once, dropping the response
/// and with it the backend connection.
pub(crate) fn spawn_pump(
    provider: String,
    response: reqwest::Response,
    sender: FragmentSender,
    parse: SseParser,
) {
    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut saw_finish = false;

        loop {
            let next = tokio::select! {
                _ = sender.closed() => {
                    debug!(provider = %provider, "Stream consumer dropped, releasing backend request");
                    return;
                }
                next = body.next() => next,
            };

            let payloads = match next {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    sender.fail(ProviderError::StreamInterrupted(e.to_string())).await;
                    return;
                }
                None => break,
            };

            for payload in payloads {
                trace!(provider = %provider, data = %payload, "SSE payload");
                match parse(&payload) {
                    Ok(SseStep::Delta { text, finished }) => {
                        saw_finish |= finished;
                        if !text.is_empty() && !sender.fragment(text).await {
                            return;
                        }
                    }
                    Ok(SseStep::Done) => {
                        sender.finish().await;
                        return;
                    }
                    Ok(SseStep::Skip) => {}
                    Err(e) => {
                        sender.fail(e).await;
                        return;
                    }
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            match parse(&payload) {
                Ok(SseStep::Delta { text, finished }) => {
                    saw_finish |= finished;
                    if !text.is_empty() && !sender.fragment(text).await {
                        return;
                    }
                }
                Ok(SseStep::Done) => saw_finish = true,
                Ok(SseStep::Skip) => {}
                Err(e) => {
                    sender.fail(e).await;
                    return;
                }
            }
        }

        if saw_finish {
            sender.finish().await;
        } else {
            debug!(provider = %provider, "SSE body ended without a finish signal");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_lines() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.push(b"data: {\"a\":1}\n\n: keep-alive\nevent: message\ndata:[DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn buffers_partial_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: hal").is_empty());
        assert_eq!(decoder.push(b"lo\r\n"), vec!["hallo"]);
    }

    #[test]
    fn keeps_utf8_split_across_chunks() {
        let text = "data: Fahrlässigkeit\n".as_bytes();
        // split inside the two-byte 'ä'
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["Fahrlässigkeit"]);
    }

    #[test]
    fn flushes_unterminated_tail() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert!(decoder.finish().is_none());
    }
}

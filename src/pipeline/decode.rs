//! Streaming decoders (Bytes -> JSON Value)
//!
//! Bytes are buffered raw until a whole frame is present, so multi-byte
//! UTF-8 sequences split across chunks decode correctly.

use crate::config::StreamFormat;
use crate::pipeline::{Decoder, PipelineError};
use crate::{BoxStream, Error, PipeResult};
use bytes::{Buf, Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde_json::Value;

const DONE_SIGNAL: &str = "[DONE]";

/// Server-sent events decoder.
///
/// Frames end at a blank line (`\n\n` or `\r\n\r\n`). The `data:` lines of a
/// frame are joined with `\n` and parsed as one JSON document; comment lines
/// and other fields are ignored. A `[DONE]` payload ends the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseDecoder;

fn find_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

enum Frame {
    Message(Value),
    Done,
    Skip,
}

fn parse_frame(raw: &[u8]) -> PipeResult<Frame> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| PipelineError::Decoder(format!("invalid UTF-8 in event stream: {}", e)))?;
    let mut data: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data.is_empty() {
        return Ok(Frame::Skip);
    }
    let payload = data.join("\n");
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Ok(Frame::Skip);
    }
    if trimmed == DONE_SIGNAL {
        return Ok(Frame::Done);
    }
    Ok(Frame::Message(serde_json::from_str(trimmed)?))
}

#[async_trait::async_trait]
impl Decoder for SseDecoder {
    async fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> PipeResult<BoxStream<'static, Value>> {
        // state: (input, buffer, finished)
        let stream = stream::unfold(
            (input, BytesMut::new(), false),
            |(mut input, mut buf, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some((idx, len)) = find_boundary(&buf) {
                        let frame = buf.split_to(idx);
                        buf.advance(len);
                        match parse_frame(&frame) {
                            Ok(Frame::Message(v)) => return Some((Ok(v), (input, buf, false))),
                            Ok(Frame::Done) => return None,
                            Ok(Frame::Skip) => continue,
                            Err(e) => return Some((Err(e), (input, buf, true))),
                        }
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                        Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                        None => {
                            // a trailing frame without the final blank line
                            let rest = buf.split();
                            return match parse_frame(&rest) {
                                Ok(Frame::Message(v)) => Some((Ok(v), (input, buf, true))),
                                Ok(Frame::Done) | Ok(Frame::Skip) => None,
                                Err(e) => Some((Err(e), (input, buf, true))),
                            };
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

/// NDJSON / JSONL decoder.
///
/// Values are framed by the JSON grammar rather than by newlines, so a
/// pretty-printed JSON array of messages decodes as well: brackets and commas
/// between top-level values are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Draining,
    Finished,
}

enum Next {
    Value(Value),
    NeedMore,
    Fail(Error),
}

fn is_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'[' | b']' | b',')
}

fn next_value(buf: &mut BytesMut, at_eof: bool) -> Next {
    let skip = buf.iter().position(|b| !is_separator(*b)).unwrap_or(buf.len());
    buf.advance(skip);
    if buf.is_empty() {
        return Next::NeedMore;
    }
    let parsed = {
        let mut values = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Value>();
        values.next().map(|r| r.map(|v| (v, values.byte_offset())))
    };
    match parsed {
        // a number touching the end of the buffer may still be growing
        Some(Ok((v, used))) if v.is_number() && used == buf.len() && !at_eof => Next::NeedMore,
        Some(Ok((v, used))) => {
            buf.advance(used);
            Next::Value(v)
        }
        Some(Err(e)) if e.is_eof() && !at_eof => Next::NeedMore,
        Some(Err(e)) => Next::Fail(Error::Serialization(e)),
        None => Next::NeedMore,
    }
}

#[async_trait::async_trait]
impl Decoder for NdjsonDecoder {
    async fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> PipeResult<BoxStream<'static, Value>> {
        let stream = stream::unfold(
            (input, BytesMut::new(), Phase::Reading),
            |(mut input, mut buf, mut phase)| async move {
                loop {
                    if phase == Phase::Finished {
                        return None;
                    }
                    match next_value(&mut buf, phase == Phase::Draining) {
                        Next::Value(v) => return Some((Ok(v), (input, buf, phase))),
                        Next::Fail(e) => return Some((Err(e), (input, buf, Phase::Finished))),
                        Next::NeedMore if phase == Phase::Draining => return None,
                        Next::NeedMore => {}
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                        Some(Err(e)) => return Some((Err(e), (input, buf, Phase::Finished))),
                        None => phase = Phase::Draining,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

pub fn create_decoder(format: StreamFormat) -> Box<dyn Decoder> {
    match format {
        StreamFormat::Sse => Box::new(SseDecoder),
        StreamFormat::Ndjson => Box::new(NdjsonDecoder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn chunks(parts: &[&'static [u8]]) -> BoxStream<'static, Bytes> {
        let items: Vec<PipeResult<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(decoder: &dyn Decoder, parts: &[&'static [u8]]) -> PipeResult<Vec<Value>> {
        decoder
            .decode_stream(chunks(parts))
            .await?
            .try_collect()
            .await
    }

    #[tokio::test]
    async fn sse_frames_split_across_chunks() {
        let out = collect(
            &SseDecoder,
            &[b"data: {\"a\":", b"1}\n", b"\ndata: {\"a\":2}\n\n"],
        )
        .await
        .unwrap();
        assert_eq!(out, vec![serde_json::json!({"a":1}), serde_json::json!({"a":2})]);
    }

    #[tokio::test]
    async fn sse_handles_crlf_comments_and_multiline_data() {
        let out = collect(
            &SseDecoder,
            &[b": keep-alive\r\n\r\nevent: message\r\ndata: {\"a\":\r\ndata: 3}\r\n\r\n"],
        )
        .await
        .unwrap();
        assert_eq!(out, vec![serde_json::json!({"a":3})]);
    }

    #[tokio::test]
    async fn sse_multibyte_text_split_mid_character() {
        let full = "data: {\"t\":\"héllo\"}\n\n".as_bytes();
        let split = full.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let (a, b) = full.split_at(split);
        let a: &'static [u8] = Box::leak(a.to_vec().into_boxed_slice());
        let b: &'static [u8] = Box::leak(b.to_vec().into_boxed_slice());
        let out = collect(&SseDecoder, &[a, b]).await.unwrap();
        assert_eq!(out, vec![serde_json::json!({"t":"héllo"})]);
    }

    #[tokio::test]
    async fn sse_stops_on_done_and_reports_bad_json() {
        let out = collect(&SseDecoder, &[b"data: {}\n\ndata: [DONE]\n\ndata: {}\n\n"])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);

        let err = collect(&SseDecoder, &[b"data: {oops\n\n"]).await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[tokio::test]
    async fn sse_trailing_frame_without_blank_line() {
        let out = collect(&SseDecoder, &[b"data: {\"x\":true}"]).await.unwrap();
        assert_eq!(out, vec![serde_json::json!({"x":true})]);
    }

    #[tokio::test]
    async fn ndjson_lines_and_json_array() {
        let out = collect(&NdjsonDecoder, &[b"{\"a\":1}\n\n{\"a\"", b":2}\n"])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);

        let out = collect(&NdjsonDecoder, &[b"[{\"a\":1}\n,{\"a\":2}\n]"])
            .await
            .unwrap();
        assert_eq!(out, vec![serde_json::json!({"a":1}), serde_json::json!({"a":2})]);
    }

    #[tokio::test]
    async fn ndjson_pretty_printed_array_split_across_chunks() {
        let out = collect(
            &NdjsonDecoder,
            &[
                b"[{\n  \"candidates\": [\n    {\"index\": 0, \"t\": \"a,b]\"}\n",
                b"  ]\n}\n,\r\n{\n  \"n\"",
                b": 1",
                b"2\n}\n]\n",
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            vec![
                serde_json::json!({"candidates": [{"index": 0, "t": "a,b]"}]}),
                serde_json::json!({"n": 12}),
            ]
        );
    }

    #[tokio::test]
    async fn ndjson_truncated_value_is_an_error() {
        let err = collect(&NdjsonDecoder, &[b"[{\"a\":1},\n{\"a\":"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}

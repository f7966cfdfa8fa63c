// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for chat-completions streaming responses.
//!
//! The response body is read by a dedicated task that parses Server-Sent
//! Events with `eventsource-stream` and forwards text deltas through a
//! bounded channel. The consumer side is a [`DeltaReceiver`]; dropping it
//! cancels the reader, which drops the response and closes the connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use guardian_core::GuardianError;
use guardian_core::types::StreamDelta;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::types::ChatChunk;

/// Data payload that terminates a stream.
const DONE_MARKER: &str = "[DONE]";

/// Outcome of parsing one `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The `[DONE]` marker.
    Done,
    /// Non-empty text fragments in order, and the finish reason of the first
    /// choice that carried one. Choices after a finishing choice are ignored.
    Chunk {
        texts: Vec<String>,
        finish: Option<String>,
    },
    /// Unparsable or empty payload.
    Skip,
}

/// Parses a single SSE data payload.
pub fn parse_data(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == DONE_MARKER {
        return Frame::Done;
    }

    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!(error = %e, "skipping unparsable stream frame");
            return Frame::Skip;
        }
    };

    let mut texts = Vec::new();
    let mut finish = None;
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            texts.push(content);
        }
        if choice.finish_reason.is_some() {
            finish = choice.finish_reason;
            break;
        }
    }
    Frame::Chunk { texts, finish }
}

type DeltaItem = Result<StreamDelta, GuardianError>;

/// Consumer half of a streamed completion.
pub struct DeltaReceiver {
    rx: mpsc::Receiver<DeltaItem>,
    cancel: CancellationToken,
}

impl Stream for DeltaReceiver {
    type Item = DeltaItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for DeltaReceiver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns the reader task for an accepted streaming response.
///
/// At most `buffer` deltas are queued; the reader waits for the consumer
/// when the queue is full.
pub fn spawn_delta_reader(response: reqwest::Response, buffer: usize) -> DeltaReceiver {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let mut events = Box::pin(response.bytes_stream().eventsource());
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("delta consumer dropped, closing upstream stream");
                    return;
                }
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    let _ = tx
                        .send(Err(GuardianError::Stream {
                            message: format!("SSE stream error: {e}"),
                        }))
                        .await;
                    return;
                }
                None => {
                    debug!("upstream closed the stream without a done marker");
                    return;
                }
            };

            match parse_data(&event.data) {
                Frame::Skip => continue,
                Frame::Done => {
                    let _ = tx.send(Ok(StreamDelta::Finished { reason: None })).await;
                    return;
                }
                Frame::Chunk { texts, finish } => {
                    for text in texts {
                        if tx.send(Ok(StreamDelta::Text(text))).await.is_err() {
                            return;
                        }
                    }
                    if let Some(reason) = finish {
                        let _ = tx
                            .send(Ok(StreamDelta::Finished {
                                reason: Some(reason),
                            }))
                            .await;
                        return;
                    }
                }
            }
        }
    });

    DeltaReceiver { rx, cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    async fn collect(sse: &str) -> Vec<DeltaItem> {
        let response = mock_sse_response(sse).await;
        spawn_delta_reader(response, 4).collect().await
    }

    fn texts(items: &[DeltaItem]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| match item {
                Ok(StreamDelta::Text(t)) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_done_marker() {
        assert_eq!(parse_data("[DONE]"), Frame::Done);
        assert_eq!(parse_data(" [DONE] "), Frame::Done);
    }

    #[test]
    fn parse_garbage_is_skipped() {
        assert_eq!(parse_data("{not json"), Frame::Skip);
        assert_eq!(parse_data(""), Frame::Skip);
    }

    #[test]
    fn parse_skips_empty_content() {
        let frame = parse_data(r#"{"choices":[{"delta":{"content":""}}]}"#);
        assert_eq!(
            frame,
            Frame::Chunk {
                texts: vec![],
                finish: None
            }
        );
    }

    #[test]
    fn parse_stops_at_finishing_choice() {
        let frame = parse_data(
            r#"{"choices":[
                {"delta":{"content":"a"}},
                {"delta":{"content":"b"},"finish_reason":"stop"},
                {"delta":{"content":"c"}}
            ]}"#,
        );
        assert_eq!(
            frame,
            Frame::Chunk {
                texts: vec!["a".into(), "b".into()],
                finish: Some("stop".into())
            }
        );
    }

    #[tokio::test]
    async fn deltas_arrive_in_order_until_done() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            ": keep-alive comment\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        let items = collect(sse).await;
        assert_eq!(texts(&items), vec!["Hel", "lo"]);
        assert!(matches!(
            items.last(),
            Some(Ok(StreamDelta::Finished { reason: None }))
        ));
    }

    #[tokio::test]
    async fn finish_reason_ends_stream() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Bye\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        );
        let items = collect(sse).await;
        assert_eq!(texts(&items), vec!["Bye"]);
        match items.last() {
            Some(Ok(StreamDelta::Finished { reason })) => assert_eq!(reason.as_deref(), Some("stop")),
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let sse = concat!(
            "data: {broken\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let items = collect(sse).await;
        assert_eq!(texts(&items), vec!["ok"]);
        assert!(items.iter().all(|item| item.is_ok()));
    }

    #[tokio::test]
    async fn data_lines_without_blank_separator_form_one_skipped_event() {
        // Consecutive data lines join with a newline into a single payload,
        // which is not one JSON document.
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"d\"}}]}\n\n",
        );
        let items = collect(sse).await;
        assert_eq!(texts(&items), vec!["d"]);
        assert!(items.iter().all(|item| item.is_ok()));
        assert!(!items
            .iter()
            .any(|item| matches!(item, Ok(StreamDelta::Finished { .. }))));
    }

    #[test]
    fn joined_payload_is_skipped() {
        let joined = "{\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n[DONE]";
        assert_eq!(parse_data(joined), Frame::Skip);
    }

    #[tokio::test]
    async fn stream_without_done_marker_just_ends() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}\n\n";
        let items = collect(sse).await;
        assert_eq!(items.len(), 1);
        assert_eq!(texts(&items), vec!["cut"]);
    }

    #[tokio::test]
    async fn dropping_receiver_cancels_reader() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n".repeat(50);
        let response = mock_sse_response(&sse).await;
        let mut receiver = spawn_delta_reader(response, 1);
        let first = receiver.next().await;
        assert!(matches!(first, Some(Ok(StreamDelta::Text(_)))));
        let token = receiver.cancel.clone();
        drop(receiver);
        assert!(token.is_cancelled());
    }
}

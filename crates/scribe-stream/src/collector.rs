//! Result collector: inbound events to an ordered transcript.

use tracing::{debug, trace, warn};

use crate::errors::SessionError;
use crate::protocol::{DialectProfile, ProtocolEvent};
use crate::transport::{Frame, Transport};

/// Receive and decode events until the final result.
///
/// Fragments are kept in receive order and joined without separators.
/// The final event is the only normal way out; a warning ends collection
/// with [`SessionError::ProtocolFormat`] and an unknown status with
/// [`SessionError::ServiceException`].
pub async fn collect(
    transport: &dyn Transport,
    profile: &DialectProfile,
) -> Result<String, SessionError> {
    let mut fragments: Vec<String> = Vec::new();
    loop {
        let raw = match transport.receive().await? {
            Frame::Text(raw) => raw,
            Frame::Binary(bytes) => {
                return Err(SessionError::ProtocolFormat(format!(
                    "unexpected binary frame ({} bytes)",
                    bytes.len()
                )));
            }
            Frame::Close(reason) => {
                return Err(SessionError::Transport(format!(
                    "connection closed before final result: {}",
                    reason.as_deref().unwrap_or("no reason")
                )));
            }
        };

        match profile.decode(&raw) {
            ProtocolEvent::Ack => trace!("progress event"),
            ProtocolEvent::Partial(text) => {
                trace!(fragment = %text, "partial result");
                fragments.push(text);
            }
            ProtocolEvent::Final(text) => {
                fragments.push(text);
                debug!(fragments = fragments.len(), "final result received");
                return Ok(fragments.concat());
            }
            ProtocolEvent::Warning(detail) => {
                warn!(%detail, "malformed or rejected event");
                return Err(SessionError::ProtocolFormat(detail));
            }
            ProtocolEvent::FatalError(payload) => {
                warn!(%payload, "service reported an exception");
                return Err(SessionError::ServiceException { payload });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedTransport;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use scribe_settings::Dialect;
    use serde_json::json;
    use std::time::Duration;

    fn live() -> &'static DialectProfile {
        DialectProfile::for_dialect(Dialect::LasrLive).unwrap()
    }

    #[tokio::test]
    async fn joins_partials_and_final_in_order() {
        let (transport, _peer) = ScriptedTransport::scripted(&[
            json!({"errno": 8}),
            json!({"errno": 0, "data": {"onebest": "hello"}}),
            json!({"errno": 8}),
            json!({"errno": 0, "data": {"onebest": ", "}}),
            json!({"errno": 9, "data": {"onebest": "world"}}),
        ]);
        let text = collect(transport.as_ref(), live()).await.unwrap();
        assert_eq!(text, "hello, world");
    }

    #[tokio::test]
    async fn events_after_final_are_not_consumed() {
        let (transport, peer) = ScriptedTransport::scripted(&[
            json!({"errno": 9, "data": {"onebest": "done"}}),
            json!({"errno": 0, "data": {"onebest": "late"}}),
        ]);
        assert_eq!(collect(transport.as_ref(), live()).await.unwrap(), "done");
        drop(peer);
        assert_matches!(transport.receive().await, Ok(Frame::Text(t)) if t.contains("late"));
    }

    #[tokio::test]
    async fn format_error_ends_collection() {
        let (transport, _peer) = ScriptedTransport::scripted(&[
            json!({"errno": 0, "data": {"onebest": "a"}}),
            json!({"errno": 10, "error": "bad audio"}),
        ]);
        assert_matches!(
            collect(transport.as_ref(), live()).await,
            Err(SessionError::ProtocolFormat(m)) if m.contains("bad audio")
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_format_error() {
        let (transport, peer) = ScriptedTransport::new();
        peer.push(Frame::Text("{not json".into()));
        assert_matches!(
            collect(&transport, live()).await,
            Err(SessionError::ProtocolFormat(_))
        );
    }

    #[tokio::test]
    async fn unknown_status_is_service_exception_with_payload() {
        let (transport, _peer) = ScriptedTransport::scripted(&[json!({"errno": 3, "error": "internal"})]);
        assert_matches!(
            collect(transport.as_ref(), live()).await,
            Err(SessionError::ServiceException { payload }) if payload.contains("internal")
        );
    }

    #[tokio::test]
    async fn peer_close_frame_is_transport_error() {
        let (transport, peer) = ScriptedTransport::new();
        peer.push(Frame::Close(Some("going away".into())));
        assert_matches!(
            collect(&transport, live()).await,
            Err(SessionError::Transport(m)) if m.contains("going away")
        );
    }

    #[tokio::test]
    async fn binary_event_is_format_error() {
        let (transport, peer) = ScriptedTransport::new();
        peer.push(Frame::Binary(vec![1, 2, 3]));
        assert_matches!(
            collect(&transport, live()).await,
            Err(SessionError::ProtocolFormat(_))
        );
    }

    #[tokio::test]
    async fn hangup_is_transport_error() {
        let (transport, peer) = ScriptedTransport::new();
        drop(peer);
        assert_matches!(collect(&transport, live()).await, Err(SessionError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn local_close_unblocks_receive() {
        let (transport, _peer) = ScriptedTransport::scripted(&[]);
        let closer = transport.clone();
        let _close = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            closer.close().await;
        });
        let result = tokio::time::timeout(Duration::from_secs(5), collect(transport.as_ref(), live()))
            .await
            .expect("collector must not hang");
        assert_matches!(result, Err(SessionError::Transport(_)));
    }

    #[tokio::test]
    async fn realtime_uses_final_rec_only() {
        let profile = DialectProfile::for_dialect(Dialect::DuiRealtime).unwrap();
        let (transport, _peer) = ScriptedTransport::scripted(&[
            json!({"eof": 0, "result": {"var": "hel"}}),
            json!({"eof": 0, "result": {"var": "hello"}}),
            json!({"eof": 1, "result": {"rec": "hello there"}}),
        ]);
        assert_eq!(collect(transport.as_ref(), profile).await.unwrap(), "hello there");
    }

    fn fragment() -> impl Strategy<Value = Option<String>> {
        // None is a progress event.
        prop_oneof![Just(None), "[a-z ]{0,6}".prop_map(Some)]
    }

    proptest! {
        #[test]
        fn transcript_is_ordered_concatenation(
            events in proptest::collection::vec(fragment(), 0..20),
            last in "[a-z]{0,6}",
        ) {
            let mut script: Vec<_> = events
                .iter()
                .map(|e| match e {
                    Some(t) => json!({"errno": 0, "data": {"onebest": t}}),
                    None => json!({"errno": 8}),
                })
                .collect();
            script.push(json!({"errno": 9, "data": {"onebest": last}}));
            let expected: String = events.iter().flatten().cloned().chain([last.clone()]).collect();

            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let text = rt.block_on(async {
                let (transport, _peer) = ScriptedTransport::scripted(&script);
                collect(transport.as_ref(), live()).await.unwrap()
            });
            prop_assert_eq!(text, expected);
        }
    }
}

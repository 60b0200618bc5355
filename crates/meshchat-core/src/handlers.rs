//! Handler / result adapter for typed frame dispatch
//!
//! A handler pairs a payload mapper with a delivery channel. The mapper is a
//! pure function of the payload: it returns `None` when the shape is not its
//! concern (skip, not an error), or the typed result to deliver. Because
//! mappers are pure, dispatch is free to try every registered handler per
//! frame in any order.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::frame::{FramePayload, StatusEvent, TextMessage};
use crate::types::HandlerToken;
use crate::Result;

// ----------------------------------------------------------------------------
// Type-Erased Handler
// ----------------------------------------------------------------------------

/// A registered handler: tries its mapper against a decoded payload and, on
/// a match, delivers the typed result. Returns whether the payload was
/// recognized.
pub(crate) type BoxedHandler = Box<dyn Fn(&FramePayload) -> bool + Send + Sync>;

/// Registry of live handlers keyed by token
pub(crate) type HandlerMap = HashMap<HandlerToken, BoxedHandler>;

/// Adapt a typed mapper and its delivery channel into a type-erased handler
pub(crate) fn adapt<T, M>(mapper: M, sender: mpsc::UnboundedSender<Result<T>>) -> BoxedHandler
where
    T: Send + 'static,
    M: Fn(&FramePayload) -> Option<Result<T>> + Send + Sync + 'static,
{
    Box::new(move |payload| match mapper(payload) {
        Some(result) => {
            let _ = sender.send(result);
            true
        }
        None => false,
    })
}

// ----------------------------------------------------------------------------
// Built-in Mappers
// ----------------------------------------------------------------------------

/// Mapper recognizing text-message payloads
pub fn text_message_mapper(payload: &FramePayload) -> Option<Result<TextMessage>> {
    match payload {
        FramePayload::Text(message) => Some(Ok(message.clone())),
        _ => None,
    }
}

/// Mapper recognizing peer status payloads
pub fn status_event_mapper(payload: &FramePayload) -> Option<Result<StatusEvent>> {
    match payload {
        FramePayload::Status(event) => Some(Ok(event.clone())),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionStatus;
    use crate::types::PeerId;

    fn text_payload(text: &str) -> FramePayload {
        FramePayload::Text(TextMessage::new(text))
    }

    fn status_payload() -> FramePayload {
        FramePayload::Status(StatusEvent {
            peer: PeerId::new("alice"),
            status: ConnectionStatus::Connected,
        })
    }

    #[tokio::test]
    async fn test_mapper_selects_matching_shape() {
        assert!(text_message_mapper(&text_payload("hi")).is_some());
        assert!(text_message_mapper(&status_payload()).is_none());
        assert!(status_event_mapper(&status_payload()).is_some());
        assert!(status_event_mapper(&text_payload("hi")).is_none());
    }

    #[tokio::test]
    async fn test_adapted_handler_delivers_once_on_match() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = adapt(text_message_mapper, tx);

        assert!(handler(&text_payload("hello")));
        let delivered = rx.recv().await.unwrap().unwrap();
        assert_eq!(delivered.text, "hello");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_adapted_handler_skips_other_shapes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = adapt(text_message_mapper, tx);

        assert!(!handler(&status_payload()));
        assert!(rx.try_recv().is_err());
    }
}

//! Notification payloads sent to event-stream listeners.
//!
//! Every event serialises to one flat JSON object whose `event` field names
//! the stream event type:
//!
//! ```
//! use fpterm_terminal::FpEvent;
//!
//! let json = serde_json::to_string(&FpEvent::result(true, 7, 95)).unwrap();
//! assert_eq!(json, r#"{"event":"result","ok":true,"id":7,"score":95}"#);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use fpterm_core::TemplateId;

/// Text of the prompt event.
pub const PROMPT_MESSAGE: &str = "Ponga su huella";

/// Kind of a queued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Prompt,
    Result,
    EnrollStart,
    EnrollAbort,
    EnrollResult,
    EraseRequest,
    EraseResult,
}

impl EventKind {
    /// Event type on the stream.
    pub fn stream_name(&self) -> &'static str {
        match self {
            EventKind::Prompt => "prompt",
            EventKind::Result => "result",
            EventKind::EnrollStart | EventKind::EnrollAbort | EventKind::EnrollResult => "enroll",
            EventKind::EraseRequest | EventKind::EraseResult => "erase",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Prompt => "prompt",
            EventKind::Result => "result",
            EventKind::EnrollStart => "enrollStart",
            EventKind::EnrollAbort => "enrollAbort",
            EventKind::EnrollResult => "enrollResult",
            EventKind::EraseRequest => "eraseRequest",
            EventKind::EraseResult => "eraseResult",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollStage {
    Start,
    Abort,
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EraseStage {
    Request,
    Result,
}

/// A notification as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum FpEvent {
    Prompt {
        msg: String,
    },
    Result {
        ok: bool,
        /// `-1` when nothing was identified.
        id: i32,
        score: u16,
    },
    Enroll {
        stage: EnrollStage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u16>,
    },
    Erase {
        stage: EraseStage,
        id: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
    },
}

impl FpEvent {
    pub fn prompt() -> Self {
        FpEvent::Prompt {
            msg: PROMPT_MESSAGE.to_string(),
        }
    }

    pub fn result(ok: bool, id: i32, score: u16) -> Self {
        FpEvent::Result { ok, id, score }
    }

    pub fn enroll_start(id: Option<TemplateId>) -> Self {
        FpEvent::Enroll {
            stage: EnrollStage::Start,
            ok: None,
            id: id.map(|id| id.as_u16()),
        }
    }

    pub fn enroll_abort() -> Self {
        FpEvent::Enroll {
            stage: EnrollStage::Abort,
            ok: None,
            id: None,
        }
    }

    pub fn enroll_result(ok: bool, id: TemplateId) -> Self {
        FpEvent::Enroll {
            stage: EnrollStage::Result,
            ok: Some(ok),
            id: Some(id.as_u16()),
        }
    }

    pub fn erase_request(id: u16) -> Self {
        FpEvent::Erase {
            stage: EraseStage::Request,
            id,
            ok: None,
        }
    }

    pub fn erase_result(id: TemplateId, ok: bool) -> Self {
        FpEvent::Erase {
            stage: EraseStage::Result,
            id: id.as_u16(),
            ok: Some(ok),
        }
    }

    /// Queue kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            FpEvent::Prompt { .. } => EventKind::Prompt,
            FpEvent::Result { .. } => EventKind::Result,
            FpEvent::Enroll { stage, .. } => match stage {
                EnrollStage::Start => EventKind::EnrollStart,
                EnrollStage::Abort => EventKind::EnrollAbort,
                EnrollStage::Result => EventKind::EnrollResult,
            },
            FpEvent::Erase { stage, .. } => match stage {
                EraseStage::Request => EventKind::EraseRequest,
                EraseStage::Result => EventKind::EraseResult,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(raw: u16) -> TemplateId {
        TemplateId::new(raw).unwrap()
    }

    #[rstest]
    #[case(FpEvent::prompt(), r#"{"event":"prompt","msg":"Ponga su huella"}"#)]
    #[case(FpEvent::result(true, 7, 95), r#"{"event":"result","ok":true,"id":7,"score":95}"#)]
    #[case(FpEvent::result(false, -1, 0), r#"{"event":"result","ok":false,"id":-1,"score":0}"#)]
    #[case(FpEvent::enroll_start(None), r#"{"event":"enroll","stage":"start"}"#)]
    #[case(
        FpEvent::enroll_start(Some(TemplateId::new(4).unwrap())),
        r#"{"event":"enroll","stage":"start","id":4}"#
    )]
    #[case(FpEvent::enroll_abort(), r#"{"event":"enroll","stage":"abort"}"#)]
    #[case(
        FpEvent::enroll_result(true, TemplateId::new(12).unwrap()),
        r#"{"event":"enroll","stage":"result","ok":true,"id":12}"#
    )]
    #[case(FpEvent::erase_request(5), r#"{"event":"erase","stage":"request","id":5}"#)]
    #[case(
        FpEvent::erase_result(TemplateId::new(5).unwrap(), false),
        r#"{"event":"erase","stage":"result","id":5,"ok":false}"#
    )]
    fn test_event_json(#[case] event: FpEvent, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&event).unwrap(), expected);
    }

    #[test]
    fn test_kind_and_stream_name() {
        assert_eq!(FpEvent::prompt().kind(), EventKind::Prompt);
        assert_eq!(FpEvent::enroll_result(false, id(1)).kind(), EventKind::EnrollResult);
        assert_eq!(FpEvent::erase_request(1).kind().stream_name(), "erase");
        assert_eq!(EventKind::EnrollAbort.stream_name(), "enroll");
        assert_eq!(EventKind::EraseResult.to_string(), "eraseResult");
    }

    #[test]
    fn test_event_parses_back() {
        let parsed: FpEvent =
            serde_json::from_str(r#"{"event":"enroll","stage":"result","ok":false,"id":3}"#)
                .unwrap();
        assert_eq!(parsed, FpEvent::enroll_result(false, id(3)));
    }
}

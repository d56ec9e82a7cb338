//! Presentation adapter: frames and errors as transport-neutral JSON.
//!
//! Hosts embedding the engine (HTTP handlers, template contexts) consume
//! these instead of reaching into the frame types. Optional frame fields
//! are omitted from the JSON, never emitted as `null`.

use serde::Serialize;
use serde_json::Value;

use crate::application::frame::LeftFrame;
use crate::domain::error::EngineError;

/// Serialized frame envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEnvelope {
    pub data: Value,
}

/// Serialized error envelope with the transport status the error maps to.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub error: String,
}

pub fn render_frame(frame: &LeftFrame) -> Result<FrameEnvelope, serde_json::Error> {
    Ok(FrameEnvelope {
        data: serde_json::to_value(frame)?,
    })
}

/// The transport status an engine error maps to.
pub fn error_status(error: &EngineError) -> u16 {
    match error {
        EngineError::NotFound { .. } => 404,
        EngineError::PermissionDenied { .. } => 403,
        EngineError::Unavailable(_) => 503,
        EngineError::InvalidArgument(_) => 400,
    }
}

pub fn render_error(error: &EngineError) -> ErrorEnvelope {
    ErrorEnvelope {
        status: error_status(error),
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::application::pagination::paginate;
    use crate::application::repos::StoreError;
    use crate::domain::rows::Row;

    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(error_status(&EngineError::not_found("x")), 404);
        assert_eq!(error_status(&EngineError::permission_denied("today")), 403);
        assert_eq!(
            error_status(&EngineError::Unavailable(StoreError::from_persistence(
                "down"
            ))),
            503
        );
        assert_eq!(error_status(&EngineError::invalid_argument("bad")), 400);
    }

    #[test]
    fn frame_envelope_omits_absent_fields() {
        let frame = LeftFrame {
            slug: "agenda".to_owned(),
            safename: Some("agenda".to_owned()),
            slug_identifier: "/topic/",
            year: None,
            year_range: None,
            tabs: None,
            parameters: "?a=popular".to_owned(),
            refresh_count: 0,
            page: paginate(vec![Row::topic("t", "t", 1)], 10, 1),
        };
        let envelope = render_frame(&frame).expect("frame serializes");
        assert!(envelope.data.get("year").is_none());
        assert_eq!(envelope.data["parameters"], "?a=popular");
    }
}

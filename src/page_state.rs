use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, InvalidResponse, Result};
use crate::http::HttpResponse;
use crate::scanner::{self, Scan};

/// Raw metadata object for one video, exactly as TikTok embedded it in the page.
pub type CanonicalItem = Map<String, Value>;

const SIGI_STATE_OPEN: &str = r#"<script id="SIGI_STATE" type="application/json">"#;
const REHYDRATION_OPEN: &str =
    r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">"#;
const SCRIPT_CLOSE: &str = "</script>";

/// The two page-state payloads TikTok has shipped on video pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// `SIGI_STATE`: `{"ItemModule": {<id>: <item>}}`.
    Legacy,
    /// `__UNIVERSAL_DATA_FOR_REHYDRATION__`: `{"__DEFAULT_SCOPE__": {"webapp.video-detail":
    /// {"statusCode", "itemInfo": {"itemStruct"}}}}`.
    Rehydration,
}

impl PageShape {
    /// Shapes in the order they are attempted.
    pub const ORDER: [PageShape; 2] = [PageShape::Legacy, PageShape::Rehydration];

    fn open_marker(self) -> &'static str {
        match self {
            PageShape::Legacy => SIGI_STATE_OPEN,
            PageShape::Rehydration => REHYDRATION_OPEN,
        }
    }

    /// Pull the item for `item_id` out of a decoded payload of this shape.
    pub fn normalize(
        self,
        mut payload: Value,
        item_id: &str,
    ) -> std::result::Result<CanonicalItem, InvalidResponse> {
        let item = match self {
            PageShape::Legacy => payload
                .get_mut("ItemModule")
                .and_then(|module| module.get_mut(item_id))
                .map(Value::take),
            PageShape::Rehydration => {
                let Some(detail) = payload.pointer_mut("/__DEFAULT_SCOPE__/webapp.video-detail")
                else {
                    return Err(InvalidResponse::ItemAbsent);
                };

                match detail.get("statusCode") {
                    None => {}
                    Some(code) if code.as_i64() == Some(0) => {}
                    Some(code) => {
                        return Err(InvalidResponse::UpstreamStatus(code.as_i64().unwrap_or(-1)))
                    }
                }

                detail.pointer_mut("/itemInfo/itemStruct").map(Value::take)
            }
        };

        match item {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(InvalidResponse::ItemAbsent),
        }
    }
}

/// Turn a fetched video page into the canonical item for `item_id`.
pub fn extract(page: &HttpResponse, item_id: &str) -> Result<CanonicalItem> {
    if page.status != StatusCode::OK {
        return Err(Error::Upstream {
            status: page.status,
        });
    }

    let html = page.text();
    let (shape, item) = extract_from_html(&html, item_id)?;
    debug!(?shape, item_id, "extracted page state");
    Ok(item)
}

/// Try each [`PageShape`] in order. A later shape is only consulted when the earlier
/// shape's open marker is absent; once a marker is found its outcome is final.
pub fn extract_from_html(
    html: &str,
    item_id: &str,
) -> std::result::Result<(PageShape, CanonicalItem), InvalidResponse> {
    for shape in PageShape::ORDER {
        match scanner::between(html, shape.open_marker(), SCRIPT_CLOSE) {
            Scan::NoOpen => continue,
            Scan::Unterminated => return Err(InvalidResponse::UnterminatedMarker),
            Scan::Found(raw) => {
                let payload: Value = serde_json::from_str(raw)
                    .map_err(|err| InvalidResponse::MalformedPayload(err.to_string()))?;
                return shape.normalize(payload, item_id).map(|item| (shape, item));
            }
        }
    }

    Err(InvalidResponse::MarkerNotFound)
}

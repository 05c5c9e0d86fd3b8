use anyhow::{Context, anyhow};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{PublishedResults, Publisher, accepted};
use crate::assemble::PickSet;
use crate::calibration::Label;
use crate::error::PublishError;

#[derive(Serialize)]
struct IngestRequest<'a> {
    source: &'a str,
    #[serde(flatten)]
    picks: &'a PickSet,
}

#[derive(Debug, Default, Deserialize)]
struct IngestResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    /// Per-label validity flags on a 422.
    #[serde(default)]
    details: BTreeMap<Label, bool>,
    /// The persisted payload, echoed back on success.
    #[serde(default)]
    at: Option<String>,
    #[serde(rename = "P2", default)]
    p2: Option<String>,
    #[serde(rename = "P3", default)]
    p3: Option<String>,
    #[serde(rename = "P4", default)]
    p4: Option<String>,
    #[serde(rename = "P5", default)]
    p5: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// Posts accepted sets to a results server's ingest endpoint.
pub struct HttpPublisher {
    client: reqwest::blocking::Client,
    ingest_url: String,
    source: String,
}

impl HttpPublisher {
    pub fn new(base_url: &str, source: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build publish HTTP client")?;

        Ok(Self {
            client,
            ingest_url: format!("{}/api/results/ingest", base_url.trim_end_matches('/')),
            source: source.into(),
        })
    }
}

impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    fn publish(&self, candidate: &PickSet) -> Result<PublishedResults, PublishError> {
        // Never send a partial set
        let sent = accepted(candidate, &self.source)?;

        let response = self
            .client
            .post(&self.ingest_url)
            .json(&IngestRequest {
                source: &self.source,
                picks: candidate,
            })
            .send()
            .with_context(|| format!("POST {} failed", self.ingest_url))
            .map_err(PublishError::Transport)?;

        let status = response.status();
        let body: IngestResponse = response.json().unwrap_or_default();

        interpret(status, body, sent)
    }
}

/// Maps the ingest response to the persisted results. On success the
/// server's own stamp and fields win over what was sent.
fn interpret(
    status: StatusCode,
    body: IngestResponse,
    sent: PublishedResults,
) -> Result<PublishedResults, PublishError> {
    if status.is_success() && body.ok {
        if body.at.is_none() {
            log::debug!("publish: ingest response carried no timestamp, keeping local {}", sent.at);
        }
        return Ok(PublishedResults {
            at: body.at.unwrap_or(sent.at),
            p2: body.p2.unwrap_or(sent.p2),
            p3: body.p3.unwrap_or(sent.p3),
            p4: body.p4.unwrap_or(sent.p4),
            p5: body.p5.unwrap_or(sent.p5),
            source: body.source.unwrap_or(sent.source),
        });
    }
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        let invalid = body
            .details
            .into_iter()
            .filter(|(_, valid)| !valid)
            .map(|(label, _)| label)
            .collect();
        return Err(PublishError::Rejected { invalid });
    }
    Err(PublishError::Transport(anyhow!(
        "ingest returned HTTP {}: {}",
        status,
        body.error.as_deref().unwrap_or("no error message")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let picks = PickSet {
            p2: Some("12".into()),
            p3: Some("345".into()),
            p4: Some("6789".into()),
            p5: Some("01234".into()),
        };
        let json = serde_json::to_value(IngestRequest {
            source: "auto",
            picks: &picks,
        })
        .unwrap();

        assert_eq!(json["source"], "auto");
        assert_eq!(json["P3"], "345");
        assert_eq!(json["P5"], "01234");
    }

    fn sent() -> PublishedResults {
        PublishedResults {
            at: "2026-10-15T10:11:00+09:00".into(),
            p2: "12".into(),
            p3: "345".into(),
            p4: "6789".into(),
            p5: "01234".into(),
            source: "auto".into(),
        }
    }

    #[test]
    fn test_accepted_results_use_server_stamp() {
        let body: IngestResponse = serde_json::from_str(
            r#"{"ok":true,"at":"2026-10-15T01:11:02.114Z","P2":"12","P3":"345","P4":"6789","P5":"01234","source":"auto"}"#,
        )
        .unwrap();

        let results = interpret(StatusCode::OK, body, sent()).unwrap();
        assert_eq!(results.at, "2026-10-15T01:11:02.114Z");
        assert_eq!(results.p4, "6789");
        assert_eq!(results.source, "auto");
    }

    #[test]
    fn test_bare_ok_keeps_local_stamp() {
        let body: IngestResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert_eq!(interpret(StatusCode::OK, body, sent()).unwrap(), sent());
    }

    #[test]
    fn test_unprocessable_maps_to_rejection() {
        let body: IngestResponse = serde_json::from_str(
            r#"{"ok":false,"error":"invalid_digits","details":{"P2":true,"P3":false,"P4":true,"P5":false}}"#,
        )
        .unwrap();

        match interpret(StatusCode::UNPROCESSABLE_ENTITY, body, sent()) {
            Err(PublishError::Rejected { invalid }) => assert_eq!(invalid, vec![Label::P3, Label::P5]),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_server_error_is_transport() {
        let result = interpret(StatusCode::INTERNAL_SERVER_ERROR, IngestResponse::default(), sent());
        assert!(matches!(result, Err(PublishError::Transport(_))));
        let ok = IngestResponse {
            ok: true,
            ..Default::default()
        };
        assert!(interpret(StatusCode::OK, ok, sent()).is_ok());
    }

    #[test]
    fn test_partial_set_never_sent() {
        let publisher = HttpPublisher::new("http://127.0.0.1:9", "auto", Duration::from_millis(50)).unwrap();
        let result = publisher.publish(&PickSet::default());
        assert!(matches!(result, Err(PublishError::Rejected { .. })));
    }
}

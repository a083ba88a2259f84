//! HTTP client for a Bark push-notification server.
//!
//! Bark exposes `GET /healthz` for liveness and `GET /{token}/{title}/{body}` for
//! pushes. Every path segment is percent-encoded, so titles and bodies may contain
//! `/` or spaces.

use error_stack::Report;
use error_stack::ResultExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::NotifierConfig;
use crate::domain::Notification;
use crate::infrastructure::notifier::error::NotifierError;
use crate::infrastructure::notifier::health::Availability;

/// Reply code the notifier puts in the body for an accepted request.
pub const REPLY_CODE_OK: i64 = 200;

const LIVENESS_OK: &str = "ok";

/// Structured body returned by the notifier.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierReply {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

pub struct BarkClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl BarkClient {
    pub fn new(config: &NotifierConfig) -> Result<Self, Report<NotifierError>> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .change_context(NotifierError::Configuration {
                message: "Failed to create HTTP client for notifier".into(),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Probes `/healthz`.
    ///
    /// # Errors
    ///
    /// - [`NotifierError::Transport`] if the server cannot be reached
    /// - [`NotifierError::Status`] on a non-success HTTP status
    /// - [`NotifierError::Protocol`] if the body is unreadable or malformed
    pub async fn probe(&self) -> Result<Availability, Report<NotifierError>> {
        let url = self.endpoint(&["healthz"])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .change_context(NotifierError::Transport {
                message: format!("Liveness probe to {} failed", self.base_url),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Report::new(NotifierError::Status {
                status: status.as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .change_context(NotifierError::Protocol {
                message: "Liveness body could not be read".into(),
            })?;
        parse_liveness(&body)
    }

    /// Pushes one notification.
    ///
    /// # Errors
    ///
    /// - [`NotifierError::Transport`] if the server cannot be reached
    /// - [`NotifierError::Rejected`] if the reply code is not 200
    /// - [`NotifierError::Status`] on a non-success HTTP status, whatever the reply says
    /// - [`NotifierError::Protocol`] if a successful response has no valid reply body
    pub async fn push(&self, notification: &Notification) -> Result<(), Report<NotifierError>> {
        let url = self.push_url(notification)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .change_context(NotifierError::Transport {
                message: format!("Push to {} failed", self.base_url),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .change_context(NotifierError::Protocol {
                message: "Push reply could not be read".into(),
            })?;

        let reply: NotifierReply = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(Report::new(NotifierError::Status {
                    status: status.as_u16(),
                }))
            }
            Err(e) => {
                return Err(Report::new(e)
                    .change_context(NotifierError::Protocol {
                        message: "Push reply is not a valid notifier reply".into(),
                    })
                    .attach_printable(format!("body: {body}")))
            }
        };

        if reply.code != REPLY_CODE_OK {
            return Err(Report::new(NotifierError::Rejected {
                code: reply.code,
                message: reply.message,
            }));
        }
        if !status.is_success() {
            return Err(Report::new(NotifierError::Status {
                status: status.as_u16(),
            })
            .attach_printable(format!("reply: {} {}", reply.code, reply.message)));
        }

        debug!(kind = %notification.kind, subject = %notification.subject, "Notification accepted");
        Ok(())
    }

    /// `{base}/{token}/{kind}/{action}:{detail}`.
    pub fn push_url(&self, notification: &Notification) -> Result<Url, Report<NotifierError>> {
        let body = format!("{}:{}", notification.action, notification.detail);
        self.endpoint(&[&self.token, &notification.kind, &body])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Report<NotifierError>> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Report::new(NotifierError::Configuration {
                    message: format!("Notifier address {} cannot carry a path", self.base_url),
                })
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Interprets a liveness body.
///
/// A body starting with `{` must be a reply object; code 200 means available. Any
/// other body is a bare status token where only `ok` means available.
pub fn parse_liveness(body: &str) -> Result<Availability, Report<NotifierError>> {
    let body = body.trim();
    if body.starts_with('{') {
        let reply: NotifierReply =
            serde_json::from_str(body).change_context(NotifierError::Protocol {
                message: format!("Malformed liveness reply: {body}"),
            })?;
        return Ok(if reply.code == REPLY_CODE_OK {
            Availability::Available
        } else {
            Availability::Unavailable
        });
    }

    Ok(if body.eq_ignore_ascii_case(LIVENESS_OK) {
        Availability::Available
    } else {
        Availability::Unavailable
    })
}

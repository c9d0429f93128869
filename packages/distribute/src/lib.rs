#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Subscriber lookup and delivery of the rendered digest.
//!
//! [`RecipientStore`] yields the addresses to mail and [`Mailer`] sends one
//! message. [`distribute`] ties them together, sending sequentially and
//! carrying on past individual delivery failures.

use std::time::Duration;

use serde::Deserialize;
use weston_brief_config::{BriefConfig, DeliveryCredentials};

/// Timeout for each delivery request.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while looking up recipients or sending mail.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP request failed, timed out, or returned a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not in the expected shape.
    #[error("Unexpected response: {0}")]
    Parse(String),
}

/// Source of delivery addresses.
pub trait RecipientStore: Send + Sync {
    /// Returns every subscriber address.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the lookup fails.
    fn recipients(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, DeliveryError>> + Send;
}

/// Sends one message to one address.
pub trait Mailer: Send + Sync {
    /// Sends `content` to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the message is not accepted.
    fn send(
        &self,
        address: &str,
        subject: &str,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

/// Outcome of a distribution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Addresses the digest was sent to.
    pub sent: Vec<String>,
    /// Addresses that could not be sent to, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Sends `content` to every recipient in `store`.
///
/// A failed send is logged and recorded in [`DeliverySummary::failed`]; the
/// remaining recipients are still attempted.
///
/// # Errors
///
/// Returns [`DeliveryError`] if the recipient lookup fails. Nothing is sent
/// in that case.
pub async fn distribute(
    store: &impl RecipientStore,
    mailer: &impl Mailer,
    subject: &str,
    content: &str,
) -> Result<DeliverySummary, DeliveryError> {
    let recipients = store.recipients().await?;
    log::info!("Sending digest to {} subscriber(s)", recipients.len());

    let mut summary = DeliverySummary::default();
    for address in recipients {
        match mailer.send(&address, subject, content).await {
            Ok(()) => {
                log::info!("Sent digest to {address}");
                summary.sent.push(address);
            }
            Err(e) => {
                log::error!("Failed to send digest to {address}: {e}");
                summary.failed.push((address, e.to_string()));
            }
        }
    }

    Ok(summary)
}

/// Reads subscribers from a Supabase `subscribers` table through its REST
/// API.
pub struct SupabaseRecipients {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct SubscriberRow {
    email: Option<String>,
}

impl SupabaseRecipients {
    /// Creates a store for the project at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Creates a store from the delivery credentials.
    #[must_use]
    pub fn from_credentials(credentials: &DeliveryCredentials) -> Self {
        Self::new(
            &credentials.supabase_url,
            &credentials.supabase_service_key,
        )
    }
}

impl RecipientStore for SupabaseRecipients {
    async fn recipients(&self) -> Result<Vec<String>, DeliveryError> {
        let url = format!("{}/rest/v1/subscribers", self.base_url);
        let body: serde_json::Value = self
            .client
            .get(&url)
            .query(&[("select", "email")])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(SEND_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rows: Vec<SubscriberRow> = serde_json::from_value(body)
            .map_err(|e| DeliveryError::Parse(format!("subscriber rows: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.email)
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect())
    }
}

/// Sends mail through the Brevo transactional email API.
pub struct BrevoMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
}

impl BrevoMailer {
    /// Creates a mailer posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: &str, api_key: &str, sender_name: &str, sender_email: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            sender_name: sender_name.to_string(),
            sender_email: sender_email.to_string(),
        }
    }

    /// Creates a mailer from the run configuration and credentials.
    #[must_use]
    pub fn from_config(config: &BriefConfig, credentials: &DeliveryCredentials) -> Self {
        Self::new(
            &config.brevo_url,
            &credentials.brevo_api_key,
            &config.sender_name,
            &config.sender_email,
        )
    }
}

impl Mailer for BrevoMailer {
    async fn send(&self, address: &str, subject: &str, content: &str) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": address }],
            "subject": subject,
            "htmlContent": format!("<pre>{}</pre>", escape_html(content)),
        });

        self.client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Escapes text for inclusion in an HTML body.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct FixedRecipients(Vec<&'static str>);

    impl RecipientStore for FixedRecipients {
        async fn recipients(&self) -> Result<Vec<String>, DeliveryError> {
            Ok(self.0.iter().map(ToString::to_string).collect())
        }
    }

    struct FailingRecipients;

    impl RecipientStore for FailingRecipients {
        async fn recipients(&self) -> Result<Vec<String>, DeliveryError> {
            Err(DeliveryError::Parse("store offline".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        reject: Option<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            address: &str,
            _subject: &str,
            _content: &str,
        ) -> Result<(), DeliveryError> {
            if self.reject == Some(address) {
                return Err(DeliveryError::Parse("mailbox full".to_string()));
            }
            self.sent.lock().unwrap().push(address.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_block_others() {
        let store = FixedRecipients(vec!["a@example.com", "b@example.com", "c@example.com"]);
        let mailer = RecordingMailer {
            reject: Some("b@example.com"),
            ..RecordingMailer::default()
        };

        let summary = distribute(&store, &mailer, "Brief", "# Digest").await.unwrap();

        assert_eq!(summary.sent, vec!["a@example.com", "c@example.com"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b@example.com");
        assert_eq!(
            *mailer.sent.lock().unwrap(),
            vec!["a@example.com", "c@example.com"]
        );
    }

    #[tokio::test]
    async fn lookup_failure_sends_nothing() {
        let mailer = RecordingMailer::default();
        let result = distribute(&FailingRecipients, &mailer, "Brief", "# Digest").await;
        assert!(result.is_err());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_subscribers_from_supabase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/subscribers"))
            .and(query_param("select", "email"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "email": "a@example.com" },
                { "email": " b@example.com " },
                { "email": null },
                { "email": "" }
            ])))
            .mount(&server)
            .await;

        let store = SupabaseRecipients::new(&format!("{}/", server.uri()), "service-key");
        assert_eq!(
            store.recipients().await.unwrap(),
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[tokio::test]
    async fn posts_to_brevo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/smtp/email"))
            .and(header("api-key", "brevo-key"))
            .and(body_partial_json(json!({
                "sender": { "name": "Weston Wolverine", "email": "noreply@example.com" },
                "to": [{ "email": "a@example.com" }],
                "subject": "Your Weston Wolverine Brief",
                "htmlContent": "<pre># Brief &amp; more</pre>"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = BrevoMailer::new(
            &format!("{}/v3/smtp/email", server.uri()),
            "brevo-key",
            "Weston Wolverine",
            "noreply@example.com",
        );
        mailer
            .send("a@example.com", "Your Weston Wolverine Brief", "# Brief & more")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_send_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mailer = BrevoMailer::new(&server.uri(), "bad-key", "Weston", "noreply@example.com");
        assert!(matches!(
            mailer.send("a@example.com", "Brief", "text").await,
            Err(DeliveryError::Http(_))
        ));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}

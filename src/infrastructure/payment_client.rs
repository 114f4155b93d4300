//! Hosted checkout client speaking the Stripe `checkout/sessions` API.
//!
//! Calls are blocking and must run on the blocking pool (`web::block`).

use std::collections::HashMap;

use reqwest::blocking::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::PaymentConfig;
use crate::domain::errors::DomainError;
use crate::domain::payment::{CheckoutSession, CheckoutSessionDetails, CheckoutSessionRequest};
use crate::domain::ports::PaymentProcessor;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("processor returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("checkout session {0} has no redirect URL")]
    MissingUrl(String),
}

impl From<PaymentError> for DomainError {
    fn from(e: PaymentError) -> Self {
        DomainError::Processor(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    id: String,
    url: Option<String>,
    #[serde(default)]
    payment_status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct HttpPaymentProcessor {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl HttpPaymentProcessor {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }

    fn parse_session(response: Response) -> Result<SessionPayload, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json()?);
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorPayload>(&body)
            .map(|p| p.error.message)
            .unwrap_or(body);
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn create(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&session_form(request))
            .send()?;

        let session = Self::parse_session(response)?;
        let url = session.url.ok_or_else(|| PaymentError::MissingUrl(session.id.clone()))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    fn retrieve(&self, session_id: &str) -> Result<CheckoutSessionDetails, PaymentError> {
        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .bearer_auth(self.secret_key.expose_secret())
            .send()?;

        let session = Self::parse_session(response)?;
        Ok(CheckoutSessionDetails {
            id: session.id,
            payment_status: session.payment_status,
            metadata: session.metadata,
        })
    }
}

impl PaymentProcessor for HttpPaymentProcessor {
    fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError> {
        Ok(self.create(request)?)
    }

    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSessionDetails, DomainError> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomainError::validation("malformed checkout session id"));
        }
        Ok(self.retrieve(session_id)?)
    }
}

/// Flattens a session request into the bracketed form encoding the API expects.
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    form
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::domain::payment::PaymentLineItem;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: "gbp".to_string(),
            line_items: vec![
                PaymentLineItem {
                    name: "Chore coat".to_string(),
                    unit_amount: 12000,
                    quantity: 1,
                },
                PaymentLineItem {
                    name: "Apron".to_string(),
                    unit_amount: 3500,
                    quantity: 2,
                },
            ],
            success_url: "https://shop.test/payments/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.test/payments/cancelled".to_string(),
            client_reference_id: "order-1".to_string(),
            metadata: HashMap::from([("order_id".to_string(), "order-1".to_string())]),
            idempotency_key: "checkout-order-1-initial".to_string(),
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn form_encodes_line_items_by_index() {
        let form = session_form(&request());

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("12000"));
        assert_eq!(field(&form, "line_items[0][price_data][currency]"), Some("gbp"));
        assert_eq!(
            field(&form, "line_items[1][price_data][product_data][name]"),
            Some("Apron")
        );
        assert_eq!(field(&form, "line_items[1][quantity]"), Some("2"));
    }

    #[test]
    fn form_carries_redirects_and_order_reference() {
        let form = session_form(&request());

        assert_eq!(
            field(&form, "success_url"),
            Some("https://shop.test/payments/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(field(&form, "client_reference_id"), Some("order-1"));
        assert_eq!(field(&form, "metadata[order_id]"), Some("order-1"));
    }

    #[test]
    fn api_error_becomes_processor_error() {
        let err: DomainError = PaymentError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
        }
        .into();
        match err {
            DomainError::Processor(msg) => assert!(msg.contains("Your card was declined.")),
            other => panic!("expected processor error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_session_id_is_rejected_without_a_request() {
        let processor = HttpPaymentProcessor::new(&PaymentConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            secret_key: SecretString::from("sk_test_unused"),
            currency: "gbp".to_string(),
            timeout: Duration::from_millis(10),
        })
        .expect("client");

        assert!(matches!(
            processor.retrieve_session("../../v1/charges"),
            Err(DomainError::Validation(_))
        ));
    }
}

/// Email relay client
///
/// Mail goes out through a plain HTTP relay: `POST <base_url>/email` with a
/// JSON body. Delivery is best-effort; callers log failures and carry on.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::error::EmailError;
use crate::validators::is_valid_email;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

/// A validated sender address
#[derive(Debug, Clone)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, EmailError> {
        let email = is_valid_email(&s).map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderEmail,
        timeout: std::time::Duration,
    ) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::ServiceUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            sender,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        text_content: Option<&str>,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: recipient,
            subject,
            html: html_content,
            text: text_content,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach email relay");
                EmailError::ServiceUnavailable(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!(error = %e, "Email relay returned error");
                EmailError::SendFailed(e.to_string())
            })?;

        Ok(())
    }

    /// Credentials for an account provisioned after payment
    pub async fn send_welcome_email(
        &self,
        recipient: &str,
        first_name: Option<&str>,
        password: &str,
        login_url: &str,
    ) -> Result<(), EmailError> {
        let greeting = first_name.unwrap_or("there");
        let html = welcome_html(greeting, recipient, password, login_url);
        let text = format!(
            "Hello {},\n\nYour Academy account is ready.\nEmail: {}\nPassword: {}\n\nSign in at {} and change your password.",
            greeting, recipient, password, login_url
        );

        self.send_email(recipient, "Welcome to the Academy", &html, Some(&text))
            .await
    }

    pub async fn send_password_reset_email(
        &self,
        recipient: &str,
        reset_link: &str,
    ) -> Result<(), EmailError> {
        let html = format!(
            "<p>A password reset was requested for your Academy account.</p>\
             <p><a href=\"{}\">Choose a new password</a></p>\
             <p>The link expires in one hour. Ignore this email if you did not ask for it.</p>",
            encode_double_quoted_attribute(reset_link)
        );
        let text = format!(
            "A password reset was requested for your Academy account.\n\nChoose a new password: {}\n\nThe link expires in one hour.",
            reset_link
        );

        self.send_email(recipient, "Reset your password", &html, Some(&text))
            .await
    }
}

/// Every interpolated value is HTML-escaped
fn welcome_html(greeting: &str, recipient: &str, password: &str, login_url: &str) -> String {
    format!(
        "<p>Hello {},</p>\
         <p>Your Academy account is ready.</p>\
         <p>Email: <strong>{}</strong><br/>Password: <strong>{}</strong></p>\
         <p><a href=\"{}\">Sign in</a> and change your password.</p>",
        encode_text(greeting),
        encode_text(recipient),
        encode_text(password),
        encode_double_quoted_attribute(login_url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_parse_valid_email() {
        let sender = SenderEmail::parse("Academy@Example.com".to_string()).unwrap();
        assert_eq!(sender.inner(), "academy@example.com");
    }

    #[test]
    fn test_sender_parse_invalid_email() {
        assert!(SenderEmail::parse("invalid-email".to_string()).is_err());
    }

    #[test]
    fn test_request_body_omits_missing_text() {
        let body = SendEmailRequest {
            from: "a@example.com",
            to: "b@example.com",
            subject: "Hi",
            html: "<p>Hi</p>",
            text: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["from"], "a@example.com");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_html_in_names_is_escaped() {
        let html = welcome_html(
            "<script>alert(1)</script>",
            "lena@example.com",
            "Calm-River-Stone-042",
            "https://academy.test/login\"><b>",
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("Hello &lt;script&gt;alert(1)&lt;/script&gt;,"));
        assert!(!html.contains("login\"><b>"));
        assert!(html.contains("Calm-River-Stone-042"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_an_error() {
        let client = EmailClient::new(
            "http://127.0.0.1:9".to_string(),
            SenderEmail::parse("academy@example.com".to_string()).unwrap(),
            std::time::Duration::from_millis(200),
        )
        .unwrap();

        let result = client
            .send_email("user@example.com", "Subject", "<p>Body</p>", None)
            .await;
        assert!(result.is_err());
    }
}

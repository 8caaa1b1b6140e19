//! Gmail v1 client: sending plain-text mail and scanning recent messages

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::config::endpoint;
use crate::credentials::Credentials;
use crate::errors::ServiceError;

/// Number of most recent messages inspected by an inbox scan
pub const INBOX_SCAN_LIMIT: u32 = 5;

// Gmail bodies arrive as base64url, with or without padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Default, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub body: Option<MessageBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .filter(|data| !data.is_empty())
    }
}

impl Message {
    /// Still-encoded bodies in scan order: the single-part body, then each top-level part.
    pub fn encoded_bodies(&self) -> impl Iterator<Item = &str> + '_ {
        self.payload
            .data()
            .into_iter()
            .chain(self.payload.parts.iter().filter_map(MessagePart::data))
    }
}

pub fn decode_body(data: &str) -> Result<String, ServiceError> {
    let bytes = BODY_ENGINE
        .decode(data.trim())
        .map_err(|err| ServiceError::Decode(format!("message body: {err}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Authenticated handle on the Gmail API for the `me` user
#[derive(Clone, Debug)]
pub struct GmailClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(
        http: reqwest::Client,
        base: impl Into<String>,
        credentials: &Credentials,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http,
            base: base.into(),
            access_token: credentials.access_token()?.to_string(),
        })
    }

    /// Send a raw RFC 5322 message.
    pub async fn send_raw(&self, message: &[u8]) -> Result<(), ServiceError> {
        let url = endpoint(&self.base, &["users", "me", "messages", "send"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "raw": URL_SAFE.encode(message) }))
            .send()
            .await?;
        ServiceError::check(response).await?;
        Ok(())
    }

    /// Ids of the newest messages matching a Gmail search query.
    pub async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>, ServiceError> {
        let url = endpoint(&self.base, &["users", "me", "messages"])?;
        let max_results = max_results.to_string();
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await?;
        let list: MessageList = ServiceError::check(response).await?.json().await?;
        Ok(list.messages.into_iter().map(|message| message.id).collect())
    }

    pub async fn get_message(&self, id: &str) -> Result<Message, ServiceError> {
        let url = endpoint(&self.base, &["users", "me", "messages", id])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?;
        Ok(ServiceError::check(response).await?.json().await?)
    }
}

/// Build a plain-text RFC 5322 message.
///
/// Non-ASCII subjects use RFC 2047 encoded words; non-ASCII bodies are
/// base64 encoded.
pub fn build_message(subject: &str, from: &str, to: &str, content: &str) -> String {
    let mut message = String::new();
    message.push_str(&format!("Subject: {}\r\n", encode_header(subject)));
    message.push_str(&format!("From: {}\r\n", encode_header(from)));
    message.push_str(&format!("To: {}\r\n", encode_header(to)));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");

    let mut body = content.replace("\r\n", "\n");
    if !body.ends_with('\n') {
        body.push('\n');
    }
    if body.is_ascii() {
        message.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
        message.push_str(&body.replace('\n', "\r\n"));
    } else {
        message.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        let encoded = STANDARD.encode(body.as_bytes());
        for line in encoded.as_bytes().chunks(76) {
            message.push_str(&String::from_utf8_lossy(line));
            message.push_str("\r\n");
        }
    }
    message
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Capture group 1 of the first match in `message`'s bodies.
///
/// Bodies are decoded one at a time, so parts after the matching one are
/// never decoded. A match whose first group did not participate ends the
/// scan with `Some(None)`.
pub fn first_capture(
    pattern: &Regex,
    message: &Message,
) -> Result<Option<Option<String>>, ServiceError> {
    for data in message.encoded_bodies() {
        let body = decode_body(data)?;
        if let Some(captures) = pattern.captures(&body) {
            return Ok(Some(captures.get(1).map(|group| group.as_str().to_string())));
        }
    }
    Ok(None)
}

/// Compile an extraction pattern, which must have at least one capture group.
pub fn extraction_pattern(raw: &str) -> Result<Regex, ServiceError> {
    let pattern = Regex::new(raw)?;
    if pattern.captures_len() < 2 {
        return Err(ServiceError::Regex(format!("{raw:?} has no capture group")));
    }
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ascii_message() {
        let message = build_message("Report", "me@example.com", "you@example.com", "Line 1\nLine 2");
        assert_eq!(
            message,
            "Subject: Report\r\nFrom: me@example.com\r\nTo: you@example.com\r\nMIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=\"utf-8\"\r\nContent-Transfer-Encoding: 7bit\r\n\r\n\
             Line 1\r\nLine 2\r\n"
        );
    }

    #[test]
    fn encodes_non_ascii_subject_and_body() {
        let message = build_message("予定", "me@example.com", "you@example.com", "こんにちは");
        assert!(message.contains("Subject: =?utf-8?b?5LqI5a6a?=\r\n"), "{message}");
        assert!(message.contains("Content-Transfer-Encoding: base64\r\n\r\n"));

        let body = message.split("\r\n\r\n").nth(1).unwrap().replace("\r\n", "");
        let decoded = STANDARD.decode(body).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "こんにちは\n");
    }

    #[test]
    fn decodes_padded_and_unpadded_bodies() {
        assert_eq!(decode_body("Y29kZTogMTIzNA").unwrap(), "code: 1234");
        assert_eq!(decode_body("Y29kZTogMTIzNA==").unwrap(), "code: 1234");
        assert!(matches!(decode_body("***"), Err(ServiceError::Decode(_))));
    }

    fn message_with(single: Option<&str>, parts: &[Option<&str>]) -> Message {
        let encoded = |raw: &str| URL_SAFE.encode(raw);
        serde_json::from_value(json!({
            "id": "m1",
            "payload": {
                "body": single.map(|raw| json!({ "data": encoded(raw) })).unwrap_or(json!({ "size": 0 })),
                "parts": parts
                    .iter()
                    .map(|part| match part {
                        Some(raw) => json!({ "body": { "data": encoded(raw) } }),
                        None => json!({ "body": { "size": 0 } }),
                    })
                    .collect::<Vec<_>>(),
            }
        }))
        .unwrap()
    }

    #[test]
    fn scans_single_part_body_before_parts() {
        let message = message_with(Some("code: 1111"), &[None, Some("code: 2222")]);
        assert_eq!(message.encoded_bodies().count(), 2);

        let pattern = extraction_pattern(r"code: (\d+)").unwrap();
        assert_eq!(first_capture(&pattern, &message).unwrap(), Some(Some("1111".to_string())));

        let parts_only = message_with(None, &[Some("hello"), Some("code: 2222")]);
        assert_eq!(first_capture(&pattern, &parts_only).unwrap(), Some(Some("2222".to_string())));

        let pin = extraction_pattern(r"pin: (\d+)").unwrap();
        assert_eq!(first_capture(&pin, &message).unwrap(), None);
    }

    #[test]
    fn stops_decoding_at_first_match() {
        let mut message = message_with(Some("code: 1111"), &[]);
        message.payload.parts.push(MessagePart {
            body: Some(MessageBody {
                data: Some("***not base64***".to_string()),
            }),
            parts: Vec::new(),
        });

        let pattern = extraction_pattern(r"code: (\d+)").unwrap();
        assert_eq!(first_capture(&pattern, &message).unwrap(), Some(Some("1111".to_string())));

        // Reached only when nothing earlier matched.
        let pin = extraction_pattern(r"pin: (\d+)").unwrap();
        assert!(matches!(first_capture(&pin, &message), Err(ServiceError::Decode(_))));
    }

    #[test]
    fn optional_group_ends_scan_empty() {
        let pattern = extraction_pattern(r"code(: \d+)?").unwrap();
        let message = message_with(Some("code"), &[Some("code: 5")]);
        assert_eq!(first_capture(&pattern, &message).unwrap(), Some(None));
    }

    #[test]
    fn pattern_requires_capture_group() {
        assert!(matches!(extraction_pattern(r"\d+"), Err(ServiceError::Regex(_))));
        assert!(matches!(extraction_pattern(r"(\d+"), Err(ServiceError::Regex(_))));
    }
}

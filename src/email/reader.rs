use crate::core::Storage;
use crate::domain::model::{Attachment, EmailMessage};
use crate::utils::error::Result;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

fn walk<'a, 'b>(part: &'b ParsedMail<'a>, out: &mut Vec<&'b ParsedMail<'a>>) {
    out.push(part);
    for sub in &part.subparts {
        walk(sub, out);
    }
}

fn is_attachment(part: &ParsedMail) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect()
}

/// Prefers the first HTML part, then the first plain-text part.
fn best_body(mail: &ParsedMail) -> String {
    if mail.subparts.is_empty() {
        return match mail.ctype.mimetype.as_str() {
            "text/html" | "text/plain" => mail.get_body().unwrap_or_default(),
            _ => String::new(),
        };
    }

    let mut parts = Vec::new();
    walk(mail, &mut parts);

    let mut html = None;
    let mut text = None;
    for part in parts.into_iter().filter(|p| !is_attachment(p)) {
        match part.ctype.mimetype.as_str() {
            "text/html" if html.is_none() => html = part.get_body().ok(),
            "text/plain" if text.is_none() => text = part.get_body().ok(),
            _ => {}
        }
    }
    html.or(text).unwrap_or_default()
}

fn attachments(mail: &ParsedMail) -> Vec<Attachment> {
    let mut parts = Vec::new();
    walk(mail, &mut parts);

    let mut out = Vec::new();
    for part in parts.into_iter().filter(|p| is_attachment(p)) {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .map(String::as_str)
            .unwrap_or("attachment.bin");
        let filename = sanitize_filename(filename);

        match part.get_body_raw() {
            Ok(data) => out.push(Attachment {
                filename,
                content_type: part.ctype.mimetype.clone(),
                data,
            }),
            Err(e) => tracing::warn!("Skipping broken attachment {}: {}", filename, e),
        }
    }
    out
}

/// Parses a raw RFC 822 message into body text and decoded attachments.
pub fn parse_eml(filename: &str, raw: &[u8]) -> Result<EmailMessage> {
    let mail = mailparse::parse_mail(raw)?;

    Ok(EmailMessage {
        filename: filename.to_string(),
        subject: mail.headers.get_first_value("Subject"),
        body: best_body(&mail),
        attachments: attachments(&mail),
    })
}

/// Reads every `.eml` under `prefix` in key order. Unreadable messages are
/// logged and skipped; `max_messages` caps the number returned.
pub async fn read_inbox<S: Storage>(
    storage: &S,
    prefix: &str,
    max_messages: Option<usize>,
) -> Result<Vec<EmailMessage>> {
    let keys = storage.list(prefix, ".eml").await?;
    if keys.is_empty() {
        tracing::warn!("No .eml files found in {}", storage.location(prefix));
        return Ok(Vec::new());
    }

    let mut messages = Vec::new();
    for key in keys {
        if let Some(max) = max_messages {
            if messages.len() >= max {
                tracing::info!("Hit max_messages={}, stopping", max);
                break;
            }
        }

        let filename = key.rsplit('/').next().unwrap_or(&key).to_string();
        let raw = match storage.read_file(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Error reading {}: {}", key, e);
                continue;
            }
        };
        match parse_eml(&filename, &raw) {
            Ok(message) => {
                tracing::debug!(
                    "Parsed {} ({} attachments)",
                    filename,
                    message.attachments.len()
                );
                messages.push(message);
            }
            Err(e) => tracing::warn!("Error processing {}: {}", filename, e),
        }
    }

    Ok(messages)
}

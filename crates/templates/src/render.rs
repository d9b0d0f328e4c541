//! Placeholder substitution, the default envelope and plain-text derivation.

use std::sync::LazyLock;

use regex::Regex;

use mailq_core::{EmailJob, NewEmail, TemplateData};

use crate::catalog::{TemplateName, BRAND_NAME, BRAND_TAGLINE};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// The parts of a job that affect its rendered body.
#[derive(Debug, Clone, Copy)]
pub struct EmailContent<'a> {
    pub subject: &'a str,
    pub message: &'a str,
    pub template: Option<&'a str>,
    pub template_data: Option<&'a TemplateData>,
}

impl<'a> From<&'a EmailJob> for EmailContent<'a> {
    fn from(job: &'a EmailJob) -> Self {
        Self {
            subject: &job.subject,
            message: &job.message,
            template: job.template.as_deref(),
            template_data: job.template_data.as_ref(),
        }
    }
}

impl<'a> From<&'a NewEmail> for EmailContent<'a> {
    fn from(email: &'a NewEmail) -> Self {
        Self {
            subject: &email.subject,
            message: &email.message,
            template: email.template.as_deref(),
            template_data: email.template_data.as_ref(),
        }
    }
}

/// Produce the HTML body for a job.
///
/// A named template is used only when both `template` and `template_data` are
/// present; otherwise subject and message go into the default envelope.
pub fn render_email(content: EmailContent<'_>, year: i32) -> String {
    match (content.template, content.template_data) {
        (Some(name), Some(data)) => render_template(TemplateName::resolve(name), data),
        _ => render_default(content.subject, content.message, year),
    }
}

/// Replace each `{{key}}` for the keys present in `data`.
///
/// Placeholders without a matching key are left as-is.
pub fn render_template(name: TemplateName, data: &TemplateData) -> String {
    let mut content = name.skeleton().to_string();
    for (key, value) in data {
        let placeholder = format!("{{{{{key}}}}}");
        if content.contains(&placeholder) {
            content = content.replace(&placeholder, &value_text(value));
        }
    }
    content
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Generic branded envelope for ad-hoc subject/message pairs.
pub fn render_default(subject: &str, message: &str, year: i32) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{subject}</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f3f4f6;">
  <div style="max-width: 600px; margin: 20px auto; background-color: white; border-radius: 8px; overflow: hidden; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
    <div style="background: linear-gradient(135deg, #2563eb 0%, #7c3aed 100%); padding: 30px; text-align: center;">
      <h1 style="color: white; margin: 0; font-size: 28px;">{BRAND_NAME}</h1>
      <p style="color: rgba(255,255,255,0.9); margin: 5px 0 0 0;">{BRAND_TAGLINE}</p>
    </div>
    <div style="padding: 40px 30px;">
      <h2 style="color: #1f2937; margin-top: 0;">{subject}</h2>
      <div style="color: #4b5563; line-height: 1.6; white-space: pre-wrap;">
        {message}
      </div>
    </div>
    <div style="background-color: #f9fafb; padding: 20px 30px; text-align: center; border-top: 1px solid #e5e7eb;">
      <p style="color: #6b7280; font-size: 14px; margin: 0;">
        &copy; {year} {BRAND_NAME}. All rights reserved.
      </p>
      <p style="color: #9ca3af; font-size: 12px; margin: 10px 0 0 0;">
        You received this email because you have an account with {BRAND_NAME}.
      </p>
    </div>
  </div>
</body>
</html>
"#
    )
}

/// Plain-text fallback: drop tags, collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    WS_RE.replace_all(&without_tags, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(pairs: &[(&str, serde_json::Value)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_known_placeholders() {
        let html = render_template(
            TemplateName::RoleChanged,
            &data(&[
                ("firstName", json!("Ada")),
                ("newRole", json!("admin")),
                ("date", json!("2026-10-18")),
            ]),
        );

        assert!(html.contains("Hi Ada,"));
        assert!(html.contains("<strong>admin</strong>"));
        assert!(html.contains("on 2026-10-18."));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn unmatched_placeholders_stay_verbatim() {
        let html = render_template(TemplateName::Welcome, &data(&[("firstName", json!("Ada"))]));

        assert!(html.contains("Hi Ada,"));
        assert!(html.contains(r#"href="{{loginUrl}}""#));
    }

    #[test]
    fn non_string_values_use_json_text() {
        let html = render_template(
            TemplateName::AdminNotification,
            &data(&[("firstName", json!(null)), ("message", json!(42))]),
        );

        assert!(html.contains("Hi ,"));
        assert!(html.contains("42"));
    }

    #[test]
    fn unknown_template_renders_admin_notification() {
        let content = EmailContent {
            subject: "s",
            message: "m",
            template: Some("doesNotExist"),
            template_data: Some(&data(&[("message", json!("Server restarted"))])),
        };

        let html = render_email(content, 2026);
        assert!(html.contains("Admin Notification"));
        assert!(html.contains("Server restarted"));
    }

    #[test]
    fn template_without_data_uses_default_envelope() {
        let content = EmailContent {
            subject: "Quarterly update",
            message: "New codes are live.",
            template: Some("welcome"),
            template_data: None,
        };

        let html = render_email(content, 2031);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Quarterly update</title>"));
        assert!(html.contains("New codes are live."));
        assert!(html.contains("&copy; 2031 AccuCoder"));
        assert!(!html.contains("Welcome to AccuCoder"));
    }

    #[test]
    fn strip_html_removes_tags_and_collapses_whitespace() {
        let text = strip_html("<div>\n  <p>Hi <b>Ada</b>,</p>\n\n<p>bye</p>  </div>");
        assert_eq!(text, "Hi Ada, bye");
    }

    #[test]
    fn strip_html_of_rendered_template_has_no_markup() {
        let html = render_template(TemplateName::Welcome, &data(&[("firstName", json!("Ada"))]));
        let text = strip_html(&html);

        assert!(text.starts_with("Welcome to AccuCoder! Hi Ada,"));
        assert!(!text.contains('<'));
        assert!(!text.contains("  "));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rendering_is_deterministic(
                name in prop::sample::select(TemplateName::ALL.to_vec()),
                first in "[a-zA-Z ]{0,20}",
                extra in "[a-z0-9]{0,12}",
            ) {
                let d = data(&[("firstName", json!(first)), ("message", json!(extra))]);
                prop_assert_eq!(render_template(name, &d), render_template(name, &d));
            }

            #[test]
            fn stripped_text_is_trimmed_and_single_spaced(html in "[<>a-z /\n\t]{0,64}") {
                let text = strip_html(&html);
                prop_assert_eq!(text.trim(), text.as_str());
                prop_assert!(!text.contains("  "));
                prop_assert!(!text.contains('\n'));
            }
        }
    }
}

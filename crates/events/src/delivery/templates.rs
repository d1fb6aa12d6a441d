//! HTML email layouts.

use fleetwatch_core::catalog::EmailLayout;
use fleetwatch_db::models::alert::Alert;
use fleetwatch_db::models::user::UserContact;

const BRAND: &str = "Fleetwatch Portal";

const STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Arial,sans-serif;\
line-height:1.6;color:#333;max-width:600px;margin:0 auto;padding:20px;background:#f5f5f5}\
.container{background:#fff;border-radius:8px;padding:30px}\
.logo{text-align:center;font-size:24px;font-weight:bold;color:#3b82f6;margin-bottom:30px}\
.button{display:inline-block;padding:12px 24px;background:#3b82f6;color:#fff;\
text-decoration:none;border-radius:6px;margin-top:20px}\
.footer{text-align:center;color:#666;font-size:14px;margin-top:30px;padding-top:20px;border-top:1px solid #eee}";

/// Subject and body produced for one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub layout: EmailLayout,
    pub subject: String,
    pub html: String,
}

/// Render the layout the alert's kind calls for.
pub fn render_email(
    layout: EmailLayout,
    alert: &Alert,
    contact: &UserContact,
    portal_base_url: &str,
) -> RenderedEmail {
    let name = contact.full_name.as_deref().unwrap_or(&contact.email);
    match layout {
        EmailLayout::Notification => {
            let button = alert
                .action_url
                .as_deref()
                .map(|path| {
                    format!(
                        r#"<a href="{}" class="button">View in the portal</a>"#,
                        escape_html(&absolute_url(portal_base_url, path))
                    )
                })
                .unwrap_or_default();
            let content = format!(
                "<h2>Hello {},</h2><h3>{}</h3><p>{}</p>{button}",
                escape_html(name),
                escape_html(&alert.title),
                escape_html(&alert.message),
            );
            RenderedEmail {
                layout,
                subject: alert.title.clone(),
                html: page(
                    &alert.title,
                    &content,
                    "<p>This is an automatic notification. Please do not reply.</p>",
                ),
            }
        }
        EmailLayout::Welcome => {
            let subject = format!("Welcome to {BRAND}");
            let content = format!(
                "<h2>Welcome {}!</h2>\
                 <p>Your account has been created.</p>\
                 <ul><li><strong>Email:</strong> {}</li><li><strong>Role:</strong> {}</li></ul>\
                 <p>Please change your password after the first login.</p>\
                 <a href=\"{}\" class=\"button\">Sign in</a>",
                escape_html(name),
                escape_html(&contact.email),
                escape_html(&contact.role),
                escape_html(&absolute_url(portal_base_url, "/auth/login")),
            );
            RenderedEmail {
                layout,
                html: page(
                    &subject,
                    &content,
                    "<p>If you need help, contact your administrator.</p>",
                ),
                subject,
            }
        }
    }
}

fn page(title: &str, content: &str, footer: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
         <title>{}</title><style>{STYLE}</style></head>\
         <body><div class=\"container\"><div class=\"logo\">{BRAND}</div>\
         <div class=\"content\">{content}</div><div class=\"footer\">{footer}</div></div></body></html>",
        escape_html(title)
    )
}

/// Join a portal path onto the base URL. Absolute URLs pass through.
pub fn absolute_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contact() -> UserContact {
        UserContact {
            id: 3,
            email: "ada@example.com".into(),
            full_name: Some("Ada <Admin>".into()),
            role: "employee".into(),
        }
    }

    fn alert(action_url: Option<&str>) -> Alert {
        Alert {
            id: 1,
            recipient_id: 3,
            kind: "request_approved".into(),
            category: "approval".into(),
            priority: "medium".into(),
            title: "Request approved".into(),
            message: "Your laptop request has been approved".into(),
            metadata: serde_json::json!({}),
            action_url: action_url.map(str::to_string),
            read: false,
            read_at: None,
            created_at: Utc::now(),
            dedup_key: None,
        }
    }

    #[test]
    fn notification_uses_alert_title_and_escapes_values() {
        let email = render_email(
            EmailLayout::Notification,
            &alert(Some("/resources?id=4")),
            &contact(),
            "https://portal.example.com/",
        );
        assert_eq!(email.subject, "Request approved");
        assert!(email.html.contains("Hello Ada &lt;Admin&gt;,"));
        assert!(email.html.contains("https://portal.example.com/resources?id=4"));
    }

    #[test]
    fn notification_without_link_has_no_button() {
        let email = render_email(EmailLayout::Notification, &alert(None), &contact(), "http://x");
        assert!(!email.html.contains("class=\"button\""));
    }

    #[test]
    fn welcome_links_to_login() {
        let email = render_email(EmailLayout::Welcome, &alert(None), &contact(), "http://x");
        assert_eq!(email.subject, "Welcome to Fleetwatch Portal");
        assert!(email.html.contains("http://x/auth/login"));
        assert!(email.html.contains("employee"));
    }

    #[test]
    fn absolute_url_joins_cleanly() {
        assert_eq!(absolute_url("http://a/", "/b"), "http://a/b");
        assert_eq!(absolute_url("http://a", "b"), "http://a/b");
        assert_eq!(absolute_url("http://a", "https://c/d"), "https://c/d");
    }
}

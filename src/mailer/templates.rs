/// Notification templates
use chrono::{DateTime, Utc};

/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Escape text for inclusion in HTML
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
    .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: #2563eb; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
    .button {{ display: inline-block; padding: 12px 30px; background: #2563eb; color: white; text-decoration: none; border-radius: 5px; margin: 20px 0; }}
    .info-box {{ background: #dbeafe; border-left: 4px solid #3b82f6; padding: 15px; margin: 15px 0; }}
    .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="header"><h1>{heading}</h1></div>
    <div class="content">
{body}
    </div>
    <div class="footer"><p>&copy; Unibro. All rights reserved.</p></div>
  </div>
</body>
</html>"#
    )
}

fn button(url: &str, label: &str) -> String {
    let url = html_escape(url);
    format!(
        r#"<div style="text-align: center;"><a href="{url}" class="button">{label}</a></div>
<p>Or copy this link: <br><small>{url}</small></p>"#
    )
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

impl Notification {
    fn new(to: &str, subject: &str, html: String) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        }
    }

    pub fn verification(to: &str, name: &str, verification_url: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Thank you for registering with Unibro!</p>\n\
             <p>Please verify your email address by clicking the button below:</p>\n{}\n\
             <p><strong>This link will expire in 24 hours.</strong></p>\n\
             <p>If you didn't create an account, please ignore this email.</p>",
            html_escape(name),
            button(verification_url, "Verify Email Address"),
        );
        Self::new(to, "Verify Your Email - Unibro", layout("Verify Your Email", &body))
    }

    pub fn welcome(to: &str, name: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Thank you for joining Unibro! Your account is ready and you can \
             now access all shared course materials.</p>",
            html_escape(name)
        );
        Self::new(to, "Welcome to Unibro!", layout("Welcome to Unibro!", &body))
    }

    pub fn login_alert(to: &str, name: &str, at: DateTime<Utc>, address: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>We detected a new login to your account.</p>\n\
             <div class=\"info-box\"><p><strong>Time:</strong> {}</p>\
             <p><strong>IP Address:</strong> {}</p></div>\n\
             <p>If this wasn't you, please reset your password immediately.</p>",
            html_escape(name),
            format_time(at),
            html_escape(address),
        );
        Self::new(to, "New Login to Your Account - Unibro", layout("New Login Detected", &body))
    }

    pub fn password_reset(to: &str, name: &str, reset_url: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>We received a request to reset your password.</p>\n{}\n\
             <p><strong>This link will expire in 1 hour.</strong></p>\n\
             <p>If you didn't request this, please ignore this email. Your password will \
             remain unchanged.</p>",
            html_escape(name),
            button(reset_url, "Reset Password"),
        );
        Self::new(to, "Password Reset Request - Unibro", layout("Password Reset", &body))
    }

    pub fn password_changed(to: &str, name: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Your password has been changed successfully.</p>\n\
             <p>If you didn't make this change, please contact support immediately.</p>",
            html_escape(name)
        );
        Self::new(
            to,
            "Password Changed Successfully - Unibro",
            layout("Password Changed", &body),
        )
    }

    pub fn account_locked(to: &str, name: &str, until: DateTime<Utc>) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Your account has been temporarily locked after too many \
             failed login attempts.</p>\n\
             <div class=\"info-box\"><p><strong>Unlocks at:</strong> {}</p></div>\n\
             <p>If this wasn't you, we recommend resetting your password once the lock expires.</p>",
            html_escape(name),
            format_time(until),
        );
        Self::new(to, "Account Locked - Unibro", layout("Account Locked", &body))
    }

    pub fn resource_submitted(
        to: &str,
        admin_name: &str,
        uploader_name: &str,
        title: &str,
        course_name: &str,
        resource_type: &str,
        review_url: &str,
    ) -> Self {
        let body = format!(
            "<h2>Hi {},</h2>\n<p>A new resource has been submitted and requires your review.</p>\n\
             <div class=\"info-box\"><p><strong>Uploaded by:</strong> {}</p>\
             <p><strong>Title:</strong> {}</p><p><strong>Course:</strong> {}</p>\
             <p><strong>Type:</strong> {}</p></div>\n{}",
            html_escape(admin_name),
            html_escape(uploader_name),
            html_escape(title),
            html_escape(course_name),
            html_escape(resource_type),
            button(review_url, "Review Resource"),
        );
        Self::new(
            to,
            "New Resource Submitted for Approval - Unibro",
            layout("New Resource Awaiting Review", &body),
        )
    }

    pub fn resource_approved(to: &str, name: &str, title: &str, course_name: &str) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Your resource has been approved and is now visible to other \
             students.</p>\n<div class=\"info-box\"><p><strong>Title:</strong> {}</p>\
             <p><strong>Course:</strong> {}</p></div>",
            html_escape(name),
            html_escape(title),
            html_escape(course_name),
        );
        Self::new(
            to,
            "Your Resource Has Been Approved! - Unibro",
            layout("Resource Approved", &body),
        )
    }

    pub fn resource_rejected(
        to: &str,
        name: &str,
        title: &str,
        course_name: &str,
        reason: &str,
    ) -> Self {
        let body = format!(
            "<h2>Hi {}!</h2>\n<p>Unfortunately your resource submission was not approved.</p>\n\
             <div class=\"info-box\"><p><strong>Title:</strong> {}</p>\
             <p><strong>Course:</strong> {}</p><p><strong>Reason:</strong> {}</p></div>\n\
             <p>You are welcome to submit an updated version.</p>",
            html_escape(name),
            html_escape(title),
            html_escape(course_name),
            html_escape(reason),
        );
        Self::new(
            to,
            "Resource Submission Update - Unibro",
            layout("Resource Submission Update", &body),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_user_content_is_escaped() {
        let n = Notification::resource_rejected(
            "s@example.edu",
            "<b>Sam</b>",
            "Notes",
            "CS101",
            "Contains <img src=x>",
        );
        assert!(n.html.contains("&lt;b&gt;Sam&lt;/b&gt;"));
        assert!(n.html.contains("Contains &lt;img src=x&gt;"));
        assert!(!n.html.contains("<img src=x>"));
    }

    #[test]
    fn test_locked_notice_carries_unlock_time() {
        let until = DateTime::parse_from_rfc3339("2026-03-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let n = Notification::account_locked("s@example.edu", "Sam", until);
        assert_eq!(n.subject, "Account Locked - Unibro");
        assert!(n.html.contains("2026-03-01 14:30:00 UTC"));
    }

    #[test]
    fn test_verification_link_present() {
        let n = Notification::verification(
            "s@example.edu",
            "Sam",
            "http://localhost:5173/verify-email/abc123",
        );
        assert!(n.html.contains("http://localhost:5173/verify-email/abc123"));
        assert_eq!(n.to, "s@example.edu");
    }
}

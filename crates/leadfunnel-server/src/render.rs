//! Server-rendered HTML for the funnel page.
//!
//! One page, one form per step. Every interpolated value goes through
//! [`escape`].

use std::fmt::Write as _;

use leadfunnel_core::{Field, FlowVariant, Funnel, Notice, NoticeKind, Step};

use crate::config::PageContent;

/// Escape text for use in HTML content and double-quoted attributes.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the whole page for `funnel`, including any drained `notices`.
#[must_use]
pub fn page(funnel: &Funnel, content: &PageContent, notices: &[Notice]) -> String {
    let mut html = String::with_capacity(16384);
    html.push_str(PAGE_HEAD);
    html.push_str("<body>\n");
    render_notices(&mut html, notices);
    html.push_str("<main class=\"layout\">\n");
    render_header(&mut html, content);
    html.push_str("<section class=\"card\">\n");
    render_progress(&mut html, funnel);
    match funnel.step() {
        Step::Success => render_success(&mut html, funnel),
        _ => render_form(&mut html, funnel),
    }
    html.push_str("</section>\n</main>\n</body></html>\n");
    html
}

fn render_notices(html: &mut String, notices: &[Notice]) {
    if notices.is_empty() {
        return;
    }
    html.push_str("<div class=\"toasts\">\n");
    for notice in notices {
        let class = match notice.kind {
            NoticeKind::Success => "toast toast-success",
            NoticeKind::Error => "toast toast-error",
        };
        let _ = writeln!(
            html,
            "<div class=\"{class}\" role=\"status\">{}</div>",
            escape(&notice.message)
        );
    }
    html.push_str("</div>\n");
}

fn render_header(html: &mut String, content: &PageContent) {
    let _ = write!(
        html,
        "<header class=\"magnet\">\n<h1>{}</h1>\n<p class=\"subtitle\">{}</p>\n",
        escape(&content.title),
        escape(&content.subtitle)
    );
    if !content.highlights.is_empty() {
        html.push_str("<ul class=\"highlights\">\n");
        for h in &content.highlights {
            let _ = writeln!(html, "<li>{}</li>", escape(h));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</header>\n");
}

fn render_progress(html: &mut String, funnel: &Funnel) {
    let total = funnel.flow().editable_steps();
    let current = funnel.step_number();
    let _ = writeln!(
        html,
        "<ol class=\"progress\" aria-label=\"Step {} of {total}\">",
        current.min(total)
    );
    for n in 1..=total {
        let class = if n < current {
            "completed"
        } else if n == current {
            "active"
        } else {
            "pending"
        };
        let marker = if n < current { "&#10003;".to_owned() } else { n.to_string() };
        let _ = writeln!(html, "<li class=\"{class}\">{marker}</li>");
    }
    html.push_str("</ol>\n");
}

fn render_form(html: &mut String, funnel: &Funnel) {
    let fields = funnel.visible_fields();
    let submitting = funnel.step() == Step::Submitting;
    let on_contact_step = !fields.contains(&Field::Name);
    let collapsed = funnel.flow() == FlowVariant::Collapsed;

    let (heading, blurb, action) = if on_contact_step {
        (
            "Almost There!",
            "Just a few more details to complete your request.",
            "/contact",
        )
    } else {
        (
            "Get Your Free Guide",
            "Enter your details to receive our exclusive resource.",
            "/basic",
        )
    };
    let _ = write!(
        html,
        "<h2>{heading}</h2>\n<p class=\"muted\">{blurb}</p>\n\
         <form method=\"post\" action=\"{action}\" novalidate>\n<fieldset{}>\n",
        if submitting { " disabled" } else { "" }
    );

    for &field in fields {
        render_field(html, funnel, field);
    }

    let label = if submitting {
        "Processing..."
    } else if on_contact_step || collapsed {
        "Get Your Free Guide"
    } else {
        "Continue"
    };
    let _ = writeln!(
        html,
        "<button type=\"submit\" class=\"btn btn-primary\">{label}</button>"
    );
    html.push_str("</fieldset>\n</form>\n");

    if on_contact_step && !submitting {
        html.push_str(
            "<form method=\"post\" action=\"/back\">\
             <button type=\"submit\" class=\"btn btn-ghost\">Back</button></form>\n",
        );
    }
}

fn render_field(html: &mut String, funnel: &Funnel, field: Field) {
    let form = funnel.form();
    let error = funnel.errors().get(field);
    let invalid = if error.is_some() {
        " aria-invalid=\"true\""
    } else {
        ""
    };

    match field {
        Field::Consent => {
            let _ = write!(
                html,
                "<div class=\"field checkbox\"><input type=\"checkbox\" id=\"consent\" \
                 name=\"consent\" value=\"on\"{}{invalid}/>\
                 <label for=\"consent\">I agree to receive communications about products, \
                 services, and events.</label>",
                if form.consent { " checked" } else { "" }
            );
        }
        Field::Name | Field::Email | Field::Phone => {
            let (label, kind, placeholder, value) = match field {
                Field::Name => ("Full Name", "text", "John Doe", &form.name),
                Field::Email => ("Email Address", "email", "john@example.com", &form.email),
                _ => (
                    "Phone Number (Optional)",
                    "tel",
                    "+1 (555) 123-4567",
                    &form.phone,
                ),
            };
            let name = field.as_str();
            let _ = write!(
                html,
                "<div class=\"field\"><label for=\"{name}\">{label}</label>\
                 <input type=\"{kind}\" id=\"{name}\" name=\"{name}\" \
                 placeholder=\"{placeholder}\" value=\"{}\"{invalid}/>",
                escape(value)
            );
        }
    }

    if let Some(e) = error {
        let _ = write!(html, "<p class=\"error\">{}</p>", escape(&e.to_string()));
    }
    html.push_str("</div>\n");
}

fn render_success(html: &mut String, funnel: &Funnel) {
    html.push_str(
        "<div class=\"success\">\n<div class=\"check\">&#10003;</div>\n\
         <h2>Thank You!</h2>\n\
         <p class=\"muted\">Your free guide is ready to download.</p>\n",
    );
    let _ = writeln!(
        html,
        "<form method=\"post\" action=\"/download\"><button type=\"submit\" \
         class=\"btn btn-primary\"{}>Download Your Guide</button></form>",
        if funnel.is_downloading() { " disabled" } else { "" }
    );
    html.push_str(
        "<p class=\"small muted\">Having trouble? Contact our support team.</p>\n</div>\n",
    );
}

const PAGE_HEAD: &str = r##"<!DOCTYPE html>
<html lang="en"><head><meta charset="utf-8"/><meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Get Your Free Guide</title>
<style>
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
:root{--bg:#EEF2FF;--card:#FFFFFF;--text:#1F2937;--muted:#6B7280;--primary:#4F46E5;--ok:#16A34A;--err:#DC2626;--font:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif}
body{font-family:var(--font);background:linear-gradient(135deg,#EFF6FF,#EEF2FF,#FAF5FF);color:var(--text);line-height:1.6;min-height:100vh;-webkit-font-smoothing:antialiased}
.layout{max-width:1100px;margin:0 auto;padding:48px 24px;display:flex;flex-wrap:wrap;gap:48px;align-items:center}
.magnet{flex:1 1 420px}
.magnet h1{font-size:44px;font-weight:800;line-height:1.15;margin-bottom:16px}
.subtitle{font-size:18px;color:var(--muted);margin-bottom:24px}
.highlights{list-style:none;display:flex;flex-wrap:wrap;gap:12px}
.highlights li{background:rgba(79,70,229,.08);color:var(--primary);padding:6px 16px;border-radius:50px;font-size:14px;font-weight:600}
.card{flex:1 1 380px;background:var(--card);border-radius:16px;padding:32px;box-shadow:0 20px 40px rgba(31,41,55,.08)}
.card h2{font-size:24px;font-weight:700;margin-bottom:4px}
.muted{color:var(--muted)}
.small{font-size:13px}
.progress{list-style:none;display:flex;gap:12px;margin-bottom:24px}
.progress li{width:32px;height:32px;border-radius:50%;display:flex;align-items:center;justify-content:center;font-size:14px;font-weight:700;background:#E5E7EB;color:var(--muted)}
.progress li.active{background:var(--primary);color:#fff}
.progress li.completed{background:var(--ok);color:#fff}
form{margin-top:20px}
fieldset{border:none;display:flex;flex-direction:column;gap:16px}
.field label{display:block;font-size:14px;font-weight:600;margin-bottom:6px}
.field input[type=text],.field input[type=email],.field input[type=tel]{width:100%;padding:10px 14px;border:1px solid #D1D5DB;border-radius:8px;font-size:15px;font-family:var(--font)}
.field input[aria-invalid=true]{border-color:var(--err)}
.checkbox{display:flex;gap:10px;align-items:flex-start}
.checkbox label{font-weight:400;color:var(--muted)}
.error{color:var(--err);font-size:13px;margin-top:4px}
.btn{display:inline-flex;align-items:center;justify-content:center;width:100%;padding:12px 28px;border-radius:8px;font-size:15px;font-weight:700;font-family:var(--font);border:none;cursor:pointer}
.btn-primary{background:linear-gradient(135deg,#2563EB,#4F46E5);color:#fff}
.btn-primary:disabled{opacity:.6;cursor:wait}
.btn-ghost{background:none;color:var(--muted);margin-top:8px}
.success{text-align:center;display:flex;flex-direction:column;gap:16px}
.check{font-size:48px;color:var(--ok)}
.toasts{position:fixed;top:16px;right:16px;display:flex;flex-direction:column;gap:8px;z-index:10}
.toast{background:#fff;padding:12px 20px;border-radius:8px;box-shadow:0 8px 24px rgba(31,41,55,.15);font-size:14px}
.toast-success{border-left:4px solid var(--ok)}
.toast-error{border-left:4px solid var(--err)}
@media(max-width:768px){.magnet h1{font-size:32px}}
</style></head>
"##;

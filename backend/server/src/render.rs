//! # Page rendering
//!
//! Plain HTML built from a [`PageSnapshot`], no client framework.
//!
//! - Every user supplied value goes through [`escape`]
//! - Field errors render under their input
//! - Submit is disabled while the description is over the limit, a small script keeps the
//!   counter and the button in sync while typing
//! - Delete buttons only exist while a session is present
use std::fmt::Write;

use records::Rating;
use url::form_urlencoded::byte_serialize;

use crate::{
    form::{Field, FieldErrors},
    page::{DraftStage, PageSnapshot},
};

const GOOGLE_CLIENT_SCRIPT: &str = "https://accounts.google.com/gsi/client";

const STYLE: &str = "
body { font-family: system-ui, sans-serif; background: #f9fafb; color: #111827; margin: 0; }
header { display: flex; justify-content: space-between; align-items: center; padding: 1rem 2rem; }
main { max-width: 32rem; margin: 0 auto; padding-bottom: 2rem; }
.card { background: #fff; border-radius: .5rem; box-shadow: 0 4px 12px rgba(0,0,0,.08); padding: 1.5rem; margin-bottom: 1rem; }
.review { display: flex; justify-content: space-between; align-items: flex-start; }
input, textarea { width: 100%; box-sizing: border-box; padding: .75rem; border: 1px solid #d1d5db; border-radius: .5rem; }
.invalid { border-color: #ef4444; }
.error { margin-top: .5rem; font-size: .875rem; color: #ef4444; background: #fef2f2; padding: .5rem; border-radius: .25rem; }
.notice { background: #fffbeb; border: 1px solid #f59e0b; }
.counter { font-size: .875rem; text-align: right; color: #6b7280; }
.counter.over { color: #ef4444; }
.field { margin-bottom: 1rem; }
.muted { font-size: .875rem; color: #6b7280; }
button { padding: .5rem 1rem; border: 0; border-radius: .5rem; color: #fff; background: #22c55e; cursor: pointer; }
button:disabled { background: #9ca3af; cursor: not-allowed; }
button.danger { background: #ef4444; }
button.plain { background: #374151; }
";

const COUNTER_SCRIPT: &str = "
const description = document.getElementById('description');
const counter = document.getElementById('counter');
const submit = document.getElementById('submit');
const max = Number(description.dataset.max);
const sync = () => {
  const length = [...description.value].length;
  counter.textContent = `${length}/${max} characters`;
  counter.classList.toggle('over', length > max);
  submit.disabled = length > max;
};
description.addEventListener('input', sync);
";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub google_client_id: Option<&'a str>,
    pub sign_up_enabled: bool,
    pub notice: Option<&'a str>,
}

pub fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

pub fn render_page(snapshot: &PageSnapshot, options: &RenderOptions<'_>) -> String {
    let mut html = String::new();

    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Review App</title>\n");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    if options.google_client_id.is_some() && !snapshot.is_authenticated() {
        let _ = writeln!(html, "<script src=\"{GOOGLE_CLIENT_SCRIPT}\" async></script>");
    }
    html.push_str("</head>\n<body>\n");

    render_header(&mut html, snapshot, options);

    html.push_str("<main>\n");
    if let Some(notice) = options.notice {
        let _ = writeln!(html, "<div class=\"card notice\" role=\"alert\">{}</div>", escape(notice));
    }
    render_form(&mut html, snapshot);
    render_reviews(&mut html, snapshot);
    html.push_str("</main>\n");

    let _ = writeln!(html, "<script>{COUNTER_SCRIPT}</script>");
    html.push_str("</body>\n</html>\n");

    html
}

fn render_header(html: &mut String, snapshot: &PageSnapshot, options: &RenderOptions<'_>) {
    html.push_str("<header>\n<h1>Review App</h1>\n<div>\n");

    match &snapshot.session {
        Some(session) => {
            let who = session.email.as_deref().unwrap_or(&session.uid);
            let _ = writeln!(html, "<span class=\"muted\">Signed in as {}</span>", escape(who));
            html.push_str(
                "<form method=\"post\" action=\"/auth/logout\" style=\"display:inline\">\
                 <button class=\"plain\" type=\"submit\">Logout</button></form>\n",
            );
        }
        None => {
            if let Some(client_id) = options.google_client_id {
                let _ = writeln!(
                    html,
                    "<div id=\"g_id_onload\" data-client_id=\"{}\" data-ux_mode=\"popup\" \
                     data-login_uri=\"/auth/google\" data-auto_prompt=\"false\"></div>\n\
                     <div class=\"g_id_signin\" data-type=\"standard\" data-text=\"signin\"></div>",
                    escape(client_id)
                );
            }
            if options.sign_up_enabled {
                html.push_str(
                    "<details><summary class=\"muted\">Admin sign up</summary>\
                     <form method=\"post\" action=\"/auth/register\">\
                     <input type=\"email\" name=\"email\" placeholder=\"Email\" required>\
                     <input type=\"password\" name=\"password\" placeholder=\"Password\" required>\
                     <button class=\"plain\" type=\"submit\">Sign up</button></form></details>\n",
                );
            }
        }
    }

    html.push_str("</div>\n</header>\n");
}

/// Percent-encodes one URL path segment. The result is plain ASCII and safe inside an attribute.
pub fn path_segment(segment: &str) -> String {
    byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn field_error(html: &mut String, errors: &FieldErrors, field: Field) {
    if let Some(error) = errors.get(&field) {
        let _ = writeln!(html, "<div class=\"error\">{}</div>", escape(&error.to_string()));
    }
}

fn invalid_class(errors: &FieldErrors, field: Field) -> &'static str {
    if errors.contains_key(&field) {
        " class=\"invalid\""
    } else {
        ""
    }
}

fn render_form(html: &mut String, snapshot: &PageSnapshot) {
    let draft = &snapshot.draft;
    let errors = &snapshot.errors;
    let max = snapshot.max_description_chars;
    let too_long = snapshot.description_too_long();

    html.push_str("<section class=\"card\">\n<h2>Add a Review</h2>\n");
    let _ = writeln!(
        html,
        "<form method=\"post\" action=\"/reviews\" data-stage=\"{}\">",
        snapshot.stage.as_str()
    );
    if snapshot.stage == DraftStage::Rejected {
        html.push_str("<div class=\"error\" role=\"alert\">Please fix the fields below.</div>\n");
    }

    html.push_str("<div class=\"field\">\n");
    let _ = writeln!(
        html,
        "<input type=\"text\" name=\"name\" placeholder=\"Your name\" value=\"{}\"{}>",
        escape(&draft.name),
        invalid_class(errors, Field::Name)
    );
    field_error(html, errors, Field::Name);
    html.push_str("</div>\n");

    html.push_str("<div class=\"field\">\n");
    let rating = draft.rating.map(|r| r.to_string()).unwrap_or_default();
    let _ = writeln!(
        html,
        "<input type=\"number\" name=\"rating\" placeholder=\"Rating out of {max_rating}\" \
         min=\"{min_rating}\" max=\"{max_rating}\" value=\"{rating}\"{class}>",
        min_rating = Rating::MIN,
        max_rating = Rating::MAX,
        class = invalid_class(errors, Field::Rating),
    );
    field_error(html, errors, Field::Rating);
    html.push_str("</div>\n");

    html.push_str("<div class=\"field\">\n");
    let description_class = if too_long || errors.contains_key(&Field::Description) {
        " class=\"invalid\""
    } else {
        ""
    };
    let _ = writeln!(
        html,
        "<textarea id=\"description\" name=\"description\" placeholder=\"Description\" \
         data-max=\"{max}\"{description_class}>{}</textarea>",
        escape(&draft.description)
    );
    let _ = writeln!(
        html,
        "<div id=\"counter\" class=\"counter{}\">{}/{max} characters</div>",
        if too_long { " over" } else { "" },
        draft.description_chars()
    );
    field_error(html, errors, Field::Description);
    html.push_str("</div>\n");

    let _ = writeln!(
        html,
        "<button id=\"submit\" type=\"submit\"{}>Submit</button>",
        if too_long { " disabled" } else { "" }
    );
    html.push_str("</form>\n</section>\n");
}

fn render_reviews(html: &mut String, snapshot: &PageSnapshot) {
    html.push_str("<section id=\"reviews\">\n");

    for review in &snapshot.reviews {
        html.push_str("<article class=\"card review\">\n<div>\n");
        let _ = writeln!(html, "<h3>{}</h3>", escape(&review.name));
        let _ = writeln!(
            html,
            "<p class=\"muted\">{} / {}</p>",
            review.rating,
            Rating::MAX
        );
        let _ = writeln!(html, "<p class=\"muted\">{}</p>", review.language);
        let _ = writeln!(html, "<p>{}</p>", escape(&review.description));
        html.push_str("</div>\n");

        if snapshot.is_authenticated() {
            let _ = writeln!(
                html,
                "<form method=\"post\" action=\"/reviews/{}/delete\">\
                 <button class=\"danger\" type=\"submit\">Delete</button></form>",
                path_segment(review.id.as_str())
            );
        }

        html.push_str("</article>\n");
    }

    html.push_str("</section>\n");
}

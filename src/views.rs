use crate::session::SessionState;
use crate::services::uploads::FILE_FIELD;

pub const NO_READING: &str = "No reading available";

const STYLE: &str = "body{font-family:Georgia,serif;max-width:720px;margin:40px auto;padding:0 16px;color:#2d2438;background:#faf7f2}\
h1{color:#5b3f7a}.notice{background:#fde8e8;border:1px solid #e0a3a3;padding:8px 12px;border-radius:6px}\
.reading{white-space:pre-wrap;line-height:1.5}.error{color:#9b2c2c}img{max-width:100%;border-radius:8px}";

/// What the result page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub reading: String,
    pub image_filename: Option<String>,
}

impl ResultView {
    pub fn from_session(state: Option<&SessionState>) -> Self {
        match state.and_then(|s| s.reading.as_ref()) {
            Some(reading) => Self {
                reading: reading.text.clone(),
                image_filename: Some(reading.image_filename.clone())
                    .filter(|name| !name.is_empty()),
            },
            None => Self {
                reading: NO_READING.to_string(),
                image_filename: None,
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.reading.starts_with("Error:")
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    )
}

pub fn index_page(notices: &[String]) -> String {
    let notices: String = notices
        .iter()
        .map(|n| format!("<p class=\"notice\">{}</p>\n", escape_html(n)))
        .collect();

    layout(
        "Palm Reader",
        &format!(
            "<h1>Palm Reader</h1>\n{notices}\
             <p>Upload a clear photo of your palm (png, jpg or jpeg).</p>\n\
             <form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
             <input type=\"file\" name=\"{FILE_FIELD}\" accept=\".png,.jpg,.jpeg\">\n\
             <button type=\"submit\">Read my palm</button>\n</form>"
        ),
    )
}

pub fn result_page(view: &ResultView) -> String {
    let image = view
        .image_filename
        .as_deref()
        .map(|name| {
            let name = escape_html(name);
            format!("<img src=\"/uploads/{name}\" alt=\"{name}\">\n")
        })
        .unwrap_or_default();
    let class = if view.is_error() { "reading error" } else { "reading" };

    layout(
        "Your Palm Reading",
        &format!(
            "<h1>Your Palm Reading</h1>\n{image}<div class=\"{class}\">{}</div>\n\
             <p><a href=\"/\">Read another palm</a></p>",
            escape_html(&view.reading)
        ),
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

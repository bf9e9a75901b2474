//! HTML pages for the upload UI
//!
//! The surface is three small server-rendered pages: the upload form, the
//! download-link page for cached delivery, and a generic error page. No
//! template engine; the pages are static apart from a handful of values.

/// Shared page shell.
fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - Sheetpress</title>
<style>
  body {{ font-family: system-ui, sans-serif; max-width: 38rem; margin: 4rem auto; padding: 0 1rem; color: #222; }}
  h1 {{ font-size: 1.4rem; }}
  form {{ margin-top: 1.5rem; }}
  input[type=file] {{ display: block; margin: 1rem 0; }}
  button, .button {{ background: #2563eb; color: #fff; border: 0; padding: 0.5rem 1.25rem; border-radius: 4px; font-size: 1rem; cursor: pointer; text-decoration: none; display: inline-block; }}
  .error {{ color: #b91c1c; }}
  .hint {{ color: #666; font-size: 0.9rem; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

/// The upload form served on `GET /`.
pub fn render_upload_form() -> String {
    page(
        "Upload",
        r#"<h1>Convert a spreadsheet to PDF</h1>
<p class="hint">Only .xlsx workbooks are accepted. Each sheet is scaled to fit its width to one page.</p>
<form method="post" action="/" enctype="multipart/form-data">
  <input type="file" name="uploaded_file" accept=".xlsx" required>
  <button type="submit">Convert to PDF</button>
</form>"#,
    )
}

/// Result page for cached delivery: an anchor to the presigned artifact URL.
pub fn render_link_page(filename: &str, url: &str, ttl_hours: u64, cache_hit: bool) -> String {
    let note = if cache_hit {
        "This document was converted previously; the cached result is served."
    } else {
        "Conversion complete."
    };
    page(
        "Download",
        &format!(
            r#"<h1>Your PDF is ready</h1>
<p>{note}</p>
<p><a class="button" href="{url}">Download {filename}</a></p>
<p class="hint">This link expires in {ttl_hours} hours.</p>
<p><a href="/">Convert another spreadsheet</a></p>"#,
            note = note,
            url = escape(url),
            filename = escape(filename),
            ttl_hours = ttl_hours,
        ),
    )
}

/// Generic error page; `message` describes the failure class only.
pub fn render_error_page(title: &str, message: &str) -> String {
    page(
        title,
        &format!(
            r#"<h1 class="error">{title}</h1>
<p>{message}</p>
<p><a href="/">Back to upload</a></p>"#,
            title = escape(title),
            message = escape(message),
        ),
    )
}

/// Minimal HTML escaping for interpolated values.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_posts_the_expected_field() {
        let html = render_upload_form();
        assert!(html.contains(r#"name="uploaded_file""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(html.contains(r#"accept=".xlsx""#));
    }

    #[test]
    fn link_page_carries_the_url_and_expiry() {
        let html = render_link_page("Q1.pdf", "https://store.example/abc?sig=1", 6, false);
        assert!(html.contains("https://store.example/abc?sig=1"));
        assert!(html.contains("expires in 6 hours"));
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let html = render_error_page("Oops", "<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}

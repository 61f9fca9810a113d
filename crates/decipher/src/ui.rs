//! Server-rendered page. Everything here is a pure function of a [`View`].

use std::fmt::Write;

use crate::intake::ACCEPT;
use crate::state::View;

pub const TITLE: &str = "Image Text Decipher";

/// Seconds between reloads while something is still pending.
const REFRESH_SECS: u32 = 1;

const STYLE: &str = r#"
body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
  font-family: system-ui, sans-serif; color: #f1f5f9;
  background: linear-gradient(rgba(15,23,42,.95), rgba(15,23,42,.95)),
    radial-gradient(circle at top left, #1e3a8a 0%, transparent 30%),
    radial-gradient(circle at bottom right, #1e3a8a 0%, transparent 40%); background-color: #0f172a; }
.wrap { width: 100%; max-width: 42rem; padding: 1.5rem; }
header, footer { text-align: center; }
header p, footer p { color: #94a3b8; }
main { background: rgba(30,41,59,.5); border: 1px solid #334155; border-radius: .75rem; padding: 1.5rem; }
main > * + * { margin-top: 1.5rem; }
.dropzone { display: flex; flex-direction: column; align-items: center; justify-content: center; height: 16rem;
  border: 2px dashed #475569; border-radius: .5rem; background: #1e293b; cursor: pointer; color: #94a3b8; }
.dropzone.dragging { border-color: #6366f1; background: rgba(49,46,129,.5); }
.dropzone img { max-height: 100%; max-width: 100%; object-fit: contain; }
.dropzone input { display: none; }
.actions { display: flex; justify-content: center; }
button { background: #4f46e5; color: #fff; font-weight: 600; border: 0; border-radius: .5rem; padding: .75rem 1.5rem; cursor: pointer; }
button:disabled { background: #3730a3; cursor: not-allowed; }
.error { color: #f87171; background: rgba(127,29,29,.5); border: 1px solid #b91c1c; border-radius: .375rem; padding: .75rem; text-align: center; }
.result { background: rgba(15,23,42,.7); border: 1px solid #334155; border-radius: .5rem; padding: 1rem; }
.result h2 { color: #818cf8; font-size: 1.125rem; margin: 0 0 .5rem; }
.result p { white-space: pre-wrap; margin: 0; }
"#;

// Auto-submits picks and drops; reports drag enter/leave to the server once per transition.
const SCRIPT: &str = r#"
const zone = document.getElementById('dropzone');
const form = document.getElementById('upload');
const input = document.getElementById('dropzone-file');
const source = document.getElementById('upload-source');
let dragging = zone.classList.contains('dragging');
function drag(on, event) {
  zone.classList.toggle('dragging', on);
  if (on !== dragging) {
    dragging = on;
    fetch('/drag', { method: 'POST', body: new URLSearchParams({ event }) });
  }
}
['dragenter', 'dragover'].forEach(t => zone.addEventListener(t, e => { e.preventDefault(); drag(true, t.slice(4)); }));
zone.addEventListener('dragleave', e => { e.preventDefault(); drag(false, 'leave'); });
zone.addEventListener('drop', e => {
  e.preventDefault();
  zone.classList.remove('dragging');
  dragging = false;
  if (e.dataTransfer.files && e.dataTransfer.files[0]) {
    const files = new DataTransfer();
    files.items.add(e.dataTransfer.files[0]);
    input.files = files.files;
    source.value = 'drop';
    form.submit();
  }
});
input.addEventListener('change', () => { if (input.files && input.files[0]) { source.value = 'picker'; form.submit(); } });
"#;

/// Escape text for use in element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub fn render_page(view: &View) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    if view.is_loading || view.preview_pending {
        let _ = writeln!(html, "<meta http-equiv=\"refresh\" content=\"{REFRESH_SECS}\">");
    }
    let _ = writeln!(html, "<title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>");
    html.push_str("<div class=\"wrap\">\n<header>\n");
    let _ = writeln!(html, "<h1>{TITLE}</h1>");
    html.push_str(
        "<p>Upload a blurry or pixelated image, and let Gemini reveal the hidden text.</p>\n</header>\n<main>\n",
    );

    render_dropzone(&mut html, view);

    if let Some(error) = &view.error {
        let _ = writeln!(html, "<div class=\"error\" role=\"alert\">{}</div>", escape(error));
    }

    if view.file_name.is_some() {
        render_analyze_button(&mut html, view.is_loading);
    }

    if let Some(result) = &view.result {
        let _ = writeln!(
            html,
            "<section class=\"result\">\n<h2>Analysis Result:</h2>\n<p>{}</p>\n</section>",
            escape(result)
        );
    }

    html.push_str("</main>\n<footer><p>Powered by Google Gemini</p></footer>\n</div>\n");
    let _ = writeln!(html, "<script>{SCRIPT}</script>\n</body>\n</html>");
    html
}

fn render_dropzone(html: &mut String, view: &View) {
    html.push_str("<form id=\"upload\" method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n");
    let class = if view.dragging { "dropzone dragging" } else { "dropzone" };
    let _ = writeln!(html, "<label id=\"dropzone\" for=\"dropzone-file\" class=\"{class}\">");
    match (&view.preview, &view.file_name) {
        (Some(preview), name) => {
            let alt = name.as_deref().unwrap_or("Uploaded preview");
            let _ = writeln!(
                html,
                "<img src=\"{}\" alt=\"{}\">",
                escape(preview.as_uri()),
                escape(alt)
            );
        }
        (None, Some(name)) if view.preview_pending => {
            let _ = writeln!(html, "<p>Loading preview of {}...</p>", escape(name));
        }
        (None, Some(name)) => {
            let _ = writeln!(html, "<p>{} (no preview available)</p>", escape(name));
        }
        (None, None) => {
            html.push_str(
                "<p><strong>Click to upload</strong> or drag and drop</p>\n<p><small>PNG, JPG, GIF or WEBP</small></p>\n",
            );
        }
    }
    let _ = writeln!(html, "<input id=\"dropzone-file\" type=\"file\" name=\"file\" accept=\"{ACCEPT}\">");
    html.push_str("<input id=\"upload-source\" type=\"hidden\" name=\"source\" value=\"picker\">\n");
    html.push_str("</label>\n</form>\n");
}

fn render_analyze_button(html: &mut String, is_loading: bool) {
    html.push_str("<form class=\"actions\" method=\"post\" action=\"/analyze\">\n");
    if is_loading {
        html.push_str("<button type=\"submit\" disabled aria-busy=\"true\">Analyzing...</button>\n");
    } else {
        html.push_str("<button type=\"submit\">Analyze Image</button>\n");
    }
    html.push_str("</form>\n");
}

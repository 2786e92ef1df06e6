//! The standalone viewer document.

use std::fmt::Write;

use super::{ExportEntry, ExportPlan, IMAGES_DIR};

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; background-color: #18181b; color: #f4f4f5; margin: 0; padding: 2rem; }
        h1 { text-align: center; color: #e4e4e7; margin-bottom: 2rem; font-weight: 700; }
        h2 { color: #a1a1aa; border-bottom: 1px solid #3f3f46; padding-bottom: 0.5rem; margin-top: 3rem; margin-bottom: 1.5rem; }
        .gallery { display: grid; grid-template-columns: repeat(auto-fill, minmax(380px, 1fr)); gap: 2rem; max-width: 1920px; margin: 0 auto; }
        .gallery-item { background-color: #27272a; border-radius: 12px; overflow: hidden; display: flex; flex-direction: column; border: 1px solid #3f3f46; }
        .gallery-item .image-container { position: relative; width: 100%; min-height: 400px; background-color: #18181b; display: flex; align-items: center; justify-content: center; overflow: hidden; }
        .gallery-item img { max-width: 100%; height: auto; display: block; user-select: none; -webkit-user-drag: none; }
        .gallery-item .caption { padding: 0.75rem 1rem; background-color: #3f3f46; text-align: center; font-weight: 600; font-size: 0.9rem; color: #d4d4d8; }
        footer { text-align: center; margin-top: 3rem; padding-top: 1.5rem; border-top: 1px solid #3f3f46; color: #a1a1aa; }
        .comparison-slider { cursor: ew-resize; position: relative; aspect-ratio: 2/3; }
        .comparison-slider img { width: 100%; height: 100%; object-fit: contain; }
        .comparison-slider .after-image { position: absolute; top: 0; left: 0; }
        .comparison-slider .before-wrapper { position: absolute; top: 0; left: 0; width: 100%; height: 100%; overflow: hidden; }
        .comparison-slider .slider-line { position: absolute; top: 0; bottom: 0; width: 3px; background-color: rgba(255,255,255,0.7); pointer-events: none; transform: translateX(-1.5px); }
        .comparison-slider .slider-handle { position: absolute; top: 50%; width: 44px; height: 44px; border: 3px solid rgba(255,255,255,0.7); border-radius: 50%; background-color: rgba(24, 24, 27, 0.6); pointer-events: none; transform: translate(-50%, -50%); }
"#;

const SCRIPT: &str = r#"
        document.addEventListener('DOMContentLoaded', () => {
            document.querySelectorAll('.comparison-slider').forEach(slider => {
                let dragging = false;
                const before = slider.querySelector('.before-wrapper');
                const line = slider.querySelector('.slider-line');
                const setPosition = (x) => {
                    const rect = slider.getBoundingClientRect();
                    const percent = Math.max(0, Math.min(100, ((x - rect.left) / rect.width) * 100));
                    before.style.clipPath = `inset(0 ${100 - percent}% 0 0)`;
                    line.style.left = `${percent}%`;
                };
                slider.addEventListener('pointerdown', (e) => { e.preventDefault(); dragging = true; setPosition(e.clientX); });
                slider.addEventListener('pointermove', (e) => { if (dragging) { e.preventDefault(); setPosition(e.clientX); } });
                window.addEventListener('pointerup', () => { dragging = false; });
                const rect = slider.getBoundingClientRect();
                setPosition(rect.left + rect.width / 2);
            });
        });
"#;

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
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

fn comparison_item(out: &mut String, entry: &ExportEntry, before_file: &str) {
    let caption = escape_html(&entry.caption);
    let _ = write!(
        out,
        r#"
            <div class="gallery-item">
                <div class="image-container comparison-slider">
                    <img src="{IMAGES_DIR}/{after}" class="after-image" alt="After: {caption}">
                    <div class="before-wrapper">
                        <img src="{IMAGES_DIR}/{before}" class="before-image" alt="Before: {caption}">
                    </div>
                    <div class="slider-line"><div class="slider-handle"></div></div>
                </div>
                <div class="caption">{caption}</div>
            </div>"#,
        after = escape_html(&entry.after_file),
        before = escape_html(before_file),
    );
}

fn gallery_item(out: &mut String, entry: &ExportEntry) {
    let caption = escape_html(&entry.caption);
    let _ = write!(
        out,
        r#"
            <div class="gallery-item">
                <div class="image-container">
                    <img src="{IMAGES_DIR}/{after}" alt="{caption}">
                </div>
                <div class="caption">{caption}</div>
            </div>"#,
        after = escape_html(&entry.after_file),
    );
}

/// Render `index.html` for `plan`. Sections with no entries are omitted.
pub fn render_viewer_html(plan: &ExportPlan) -> String {
    let mut comparisons = String::new();
    let mut gallery = String::new();
    for entry in &plan.entries {
        match &entry.before_file {
            Some(before) => comparison_item(&mut comparisons, entry, before),
            None => gallery_item(&mut gallery, entry),
        }
    }

    let name = escape_html(&plan.session_name);
    let mut body = String::new();
    if !comparisons.is_empty() {
        let _ = write!(
            body,
            r#"<h2>Transformations &amp; Comparisons</h2><div class="gallery">{comparisons}</div>"#
        );
    }
    if !gallery.is_empty() {
        let _ = write!(body, r#"<h2>Gallery</h2><div class="gallery">{gallery}</div>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Session: {name}</title>
    <style>{STYLE}</style>
</head>
<body>
    <h1>{name}</h1>
    {body}
    <footer>Exported {date}</footer>
    <script>{SCRIPT}</script>
</body>
</html>
"#,
        date = plan.exported_at.format("%Y-%m-%d"),
    )
}

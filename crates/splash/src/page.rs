//! Splash page rendering

/// Delay before the page reloads itself, in milliseconds
pub const REFRESH_AFTER_MS: u32 = 12_000;

pub fn render(title: &str, message: &str) -> String {
    let title = escape(title);
    let message = escape(message);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <style>
    body {{
      margin: 0;
      padding: 0;
      font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
      background: #0b1220;
      color: #f8fafc;
    }}
    .wrap {{
      min-height: 100vh;
      display: flex;
      align-items: center;
      justify-content: center;
      padding: 2rem;
    }}
    .card {{
      max-width: 560px;
      width: 100%;
      background: #111827;
      border-radius: 16px;
      padding: 32px;
      box-shadow: 0 12px 30px rgba(0, 0, 0, 0.35);
    }}
    h1 {{ margin: 0 0 12px 0; font-size: 28px; font-weight: 700; }}
    p {{ margin: 0; font-size: 16px; line-height: 1.6; color: #cbd5f5; }}
    .hint {{ margin-top: 20px; font-size: 13px; color: #94a3b8; }}
  </style>
</head>
<body>
  <div class="wrap">
    <div class="card">
      <h1>{title}</h1>
      <p>{message}</p>
      <p class="hint">This page will refresh automatically.</p>
    </div>
  </div>
  <script>
    setTimeout(function () {{
      window.location.reload();
    }}, {refresh});
  </script>
</body>
</html>"#,
        title = title,
        message = message,
        refresh = REFRESH_AFTER_MS,
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

//! Embedded HTML pages.
//!
//! Both pages are self-contained (inline CSS and JS) so the binary can be
//! deployed without a static directory. Replies are inserted with
//! `textContent`; no markup from the model is ever rendered.

const STYLE: &str = r#"
  body { font-family: system-ui, sans-serif; margin: 0; background: #f5f5f4; color: #1c1917; }
  main { max-width: 42rem; margin: 0 auto; padding: 1.5rem; }
  h1 { font-size: 1.4rem; }
  form.login { display: flex; gap: .5rem; }
  input, textarea, button { font: inherit; padding: .5rem .75rem; border-radius: .4rem; border: 1px solid #a8a29e; }
  button { background: #1c1917; color: #fafaf9; cursor: pointer; }
  .error { color: #b91c1c; }
  #log { display: flex; flex-direction: column; gap: .5rem; margin: 1rem 0; }
  .msg { white-space: pre-wrap; padding: .6rem .8rem; border-radius: .5rem; }
  .user { align-self: flex-end; background: #dbeafe; }
  .assistant { align-self: flex-start; background: #fff; border: 1px solid #e7e5e4; }
  .bar { display: flex; justify-content: space-between; align-items: center; }
  #usage { font-size: .85rem; color: #57534e; }
"#;

const CHAT_SCRIPT: &str = r#"
const MESSAGES = {
  unauthorized: "Your session has ended. Please log in again.",
  empty: "Type a message first.",
  too_long: "That message is too long.",
  cooldown: "Slow down a little and try again in a moment.",
  daily_limit: "The daily message limit has been reached.",
  llm_unreachable: "The assistant is unreachable right now.",
  llm_error: "The assistant returned an error.",
  llm_invalid: "The assistant sent a reply that could not be read.",
};

const log = document.getElementById("log");
const form = document.getElementById("send");
const input = document.getElementById("input");
const status = document.getElementById("status");
const usage = document.getElementById("usage");

function append(role, text) {
  const div = document.createElement("div");
  div.className = "msg " + role;
  div.textContent = text;
  log.appendChild(div);
  div.scrollIntoView();
}

async function refreshUsage() {
  const res = await fetch("/api/usage");
  if (res.ok) {
    const u = await res.json();
    usage.textContent = u.count + " / " + u.limit + " today";
  }
}

form.addEventListener("submit", async (e) => {
  e.preventDefault();
  const text = input.value;
  status.textContent = "";
  const res = await fetch("/api/chat", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ input: text }),
  });
  const body = await res.json().catch(() => ({}));
  if (res.ok) {
    append("user", text.trim());
    append("assistant", body.text);
    input.value = "";
    refreshUsage();
  } else if (body.error === "unauthorized") {
    window.location = "/login";
  } else {
    status.textContent = MESSAGES[body.error] || ("Request failed: " + (body.error || res.status));
  }
});

document.getElementById("lock").addEventListener("click", async () => {
  await fetch("/api/lock", { method: "POST" });
  window.location = "/login";
});

refreshUsage();
"#;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// The PIN form, optionally with an error line above it.
pub fn login_page(app_name: &str, error: Option<&str>) -> String {
    let name = escape_html(app_name);
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape_html(e)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{name}</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<h1>{name}</h1>
{error}
<form class="login" method="post" action="/login">
  <input type="password" name="pin" inputmode="numeric" autocomplete="current-password" placeholder="PIN" autofocus required>
  <button type="submit">Unlock</button>
</form>
</main>
</body>
</html>
"#
    )
}

/// The chat client shown to authenticated sessions.
pub fn chat_page(app_name: &str) -> String {
    let name = escape_html(app_name);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{name}</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<div class="bar">
  <h1>{name}</h1>
  <span id="usage"></span>
  <button id="lock" type="button">Lock</button>
</div>
<div id="log"></div>
<p id="status" class="error"></p>
<form id="send">
  <textarea id="input" rows="3" style="width:100%;box-sizing:border-box" placeholder="Message"></textarea>
  <button type="submit">Send</button>
</form>
</main>
<script>{CHAT_SCRIPT}</script>
</body>
</html>
"#
    )
}

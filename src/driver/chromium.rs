//! Chromium-backed page driver using chromiumoxide.
//!
//! One [`FormSession`] owns one headless browser and one page. Snapshots,
//! clicks, and writes are all performed through injected JavaScript that
//! runs the same control query as [`PageSnapshot::from_html`], so control
//! indices line up between observation and action. All injected values
//! pass through [`sanitize_js_string`] before landing in a JS string
//! literal.

use super::PageDriver;
use crate::resolver::fill::WriteStrategy;
use crate::resolver::snapshot::PageSnapshot;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;

/// Shared JS prelude: collect the visible interactive controls in the
/// same order the snapshot model uses.
const COLLECT_PRELUDE: &str = r#"
    const __fw_collect = () => {
        const out = [];
        const els = document.querySelectorAll(
            'button, [role="button"], [role="radio"], input, textarea, [contenteditable="true"]'
        );
        for (const el of els) {
            if (!(el.offsetWidth > 0 && el.offsetHeight > 0)) continue;
            const tag = el.tagName.toLowerCase();
            const roleAttr = el.getAttribute('role') || '';
            let role = null;
            if (tag === 'button' || roleAttr === 'button') role = 'button';
            else if (roleAttr === 'radio') role = 'radio';
            else if (tag === 'textarea') role = 'text_area';
            else if (el.getAttribute('contenteditable') === 'true') role = 'editable';
            else if (tag === 'input') {
                const type = (el.getAttribute('type') || 'text').toLowerCase();
                if (type === 'hidden' || type === 'checkbox') continue;
                else if (type === 'radio') role = 'radio';
                else if (type === 'submit') role = 'button';
                else role = 'text_input';
            }
            if (!role) continue;
            out.push({ el, role });
        }
        return out;
    };
"#;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. FIELDWORK_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("FIELDWORK_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A live browser session on one survey form.
pub struct FormSession {
    browser: Browser,
    page: Page,
    form_url: String,
}

impl FormSession {
    /// Launch headless Chromium and open the form.
    pub async fn launch(form_url: &str) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set FIELDWORK_CHROMIUM_PATH or install google-chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drain CDP events for the lifetime of the session.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page(form_url)
            .await
            .context("failed to open form page")?;
        let _ = page.wait_for_navigation().await;

        Ok(Self {
            browser,
            page,
            form_url: form_url.to_string(),
        })
    }

    /// Close the page and shut the browser down.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.page.close().await;
        let _ = self.browser.close().await;
        Ok(())
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn eval_bool(&self, script: &str) -> Result<bool> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl PageDriver for FormSession {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let script = format!(
            r#"(() => {{
                {COLLECT_PRELUDE}
                const controls = __fw_collect().map((c, i) => ({{
                    index: i,
                    role: c.role,
                    text: (c.el.textContent || '').replace(/\s+/g, ' ').trim(),
                    label: (c.el.getAttribute('aria-label') || '').trim(),
                    enabled: !c.el.disabled,
                }}));
                const page_text = (document.body.innerText || '')
                    .replace(/\s+/g, ' ').trim().toLowerCase();
                return JSON.stringify({{ controls, page_text }});
            }})()"#
        );
        let json = self.eval_string(&script).await?;
        serde_json::from_str(&json).context("driver returned a malformed snapshot")
    }

    async fn invoke(&self, index: usize) -> Result<()> {
        let script = format!(
            r#"(() => {{
                {COLLECT_PRELUDE}
                const c = __fw_collect()[{index}];
                if (!c) return false;
                c.el.click();
                return true;
            }})()"#
        );
        if !self.eval_bool(&script).await? {
            bail!("control {index} no longer present");
        }
        Ok(())
    }

    async fn set_text(&self, index: usize, text: &str, strategy: WriteStrategy) -> Result<()> {
        let value = sanitize_js_string(text);
        let body = match strategy {
            WriteStrategy::DirectSet => format!(
                r#"if (c.role === 'editable') c.el.textContent = '{value}';
                   else c.el.value = '{value}';"#
            ),
            WriteStrategy::SyntheticEvents => format!(
                r#"c.el.focus();
                   if (c.role === 'editable') c.el.textContent = '{value}';
                   else c.el.value = '{value}';
                   c.el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                   c.el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                   c.el.dispatchEvent(new Event('blur', {{ bubbles: true }}));"#
            ),
            WriteStrategy::CharByChar => format!(
                r#"c.el.focus();
                   c.el.value = '';
                   c.el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                   const text = '{value}';
                   for (let i = 0; i < text.length; i++) {{
                       c.el.value = text.substring(0, i + 1);
                       c.el.dispatchEvent(new KeyboardEvent('keydown', {{ bubbles: true }}));
                       c.el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                       await new Promise(r => setTimeout(r, 15));
                   }}
                   c.el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                   c.el.dispatchEvent(new Event('blur', {{ bubbles: true }}));"#
            ),
            WriteStrategy::InsertCommand => format!(
                r#"c.el.focus();
                   document.execCommand('selectAll');
                   document.execCommand('insertText', false, '{value}');
                   c.el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                   c.el.dispatchEvent(new Event('change', {{ bubbles: true }}));"#
            ),
        };

        let script = format!(
            r#"(async () => {{
                {COLLECT_PRELUDE}
                const c = __fw_collect()[{index}];
                if (!c) return false;
                {body}
                return true;
            }})()"#
        );
        if !self.eval_bool(&script).await? {
            bail!("control {index} no longer present");
        }
        Ok(())
    }

    async fn read_value(&self, index: usize) -> Result<String> {
        let script = format!(
            r#"(() => {{
                {COLLECT_PRELUDE}
                const c = __fw_collect()[{index}];
                if (!c) return '';
                return (c.el.value !== undefined && c.el.value !== null && c.el.value !== '')
                    ? c.el.value
                    : (c.el.textContent || '');
            }})()"#
        );
        self.eval_string(&script).await
    }

    async fn confirm_key(&self) -> Result<()> {
        let script = r#"(() => {
            const target = document.activeElement || document.body;
            const opts = { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true };
            target.dispatchEvent(new KeyboardEvent('keydown', opts));
            target.dispatchEvent(new KeyboardEvent('keyup', opts));
            return true;
        })()"#;
        self.eval_bool(script).await?;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.page
            .goto(self.form_url.as_str())
            .await
            .context("failed to reload form")?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes everything that could break out of a JS string context:
/// backslashes, quotes, backticks, newlines, and script-tag brackets.
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_js_string("hello"), "hello");
        assert_eq!(sanitize_js_string("it's"), "it\\'s");
        assert_eq!(sanitize_js_string("a\"b"), "a\\\"b");
    }

    #[test]
    fn test_sanitize_script_injection() {
        let malicious = r#"</script><script>alert(1)</script>"#;
        let sanitized = sanitize_js_string(malicious);
        assert!(!sanitized.contains("</script>"));
        assert!(sanitized.contains("\\x3c/script\\x3e"));
    }

    #[test]
    fn test_sanitize_strips_null_bytes() {
        assert_eq!(sanitize_js_string("ab\0cd"), "abcd");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_session_snapshot_and_fill() {
        let session = FormSession::launch(
            "data:text/html,<h1>What is your name?</h1><input type='text'/><button>OK</button>",
        )
        .await
        .expect("failed to launch session");

        let snap = session.snapshot().await.expect("snapshot failed");
        assert_eq!(snap.controls.len(), 2);
        assert!(snap.page_text.contains("what is your name?"));

        session
            .set_text(0, "Alex Johnson", WriteStrategy::SyntheticEvents)
            .await
            .expect("set_text failed");
        let value = session.read_value(0).await.expect("read_value failed");
        assert_eq!(value, "Alex Johnson");

        session.close().await.expect("close failed");
    }
}

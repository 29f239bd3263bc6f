//! Chrome DevTools Protocol implementation of [`Portal`].
//!
//! Element handles index into a page-side registry (`window.__hxreg`), and
//! all DOM operations go through a small JS bridge evaluated on the page.
//! The portal's own markup already forces script-level clicks in places, so
//! the bridge is no less capable than trusted-input automation here, and it
//! keeps frame traversal (same-origin) uniform with top-level lookups.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{ElementHandle, Locator, Portal, Wait};

/// Owns the launched browser and its CDP event handler task. Created once
/// at startup, shut down once at the end of the run, success or not.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a headful Chrome and open a blank page. The window stays
    /// visible so the operator can complete the second factor by hand.
    pub async fn launch() -> Result<(Self, Page)> {
        let chrome_path = find_chrome()
            .context("Chrome/Chromium not found. Install Chrome or Chromium to drive the portal.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .with_head()
            .viewport(None)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .build()
            .map_err(|e| anyhow!("Failed to configure browser: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser.new_page("about:blank").await?;

        Ok((Self { browser, handler_task }, page))
    }

    pub async fn shutdown(self) {
        drop(self.browser);
        self.handler_task.abort();
    }
}

/// CDP-backed portal over a single page.
pub struct CdpPortal {
    page: Page,
}

impl CdpPortal {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn eval<T>(&self, expression: String, fallback: T) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .page
            .evaluate(expression)
            .await
            .context("Script evaluation failed")?;
        Ok(result.into_value::<T>().unwrap_or(fallback))
    }

    /// Script body that resolves the current document (walking entered
    /// frames) and binds `reg`, `doc` and `win`. Returns `null` early when
    /// a frame in the stack is gone.
    fn prelude() -> &'static str {
        "const reg = window.__hxreg = window.__hxreg || { els: [], frames: [] };\n\
         let doc = document;\n\
         let win = window;\n\
         for (const sel of reg.frames) {\n\
           const frame = doc.querySelector(sel);\n\
           if (!frame || !frame.contentDocument) { return null; }\n\
           doc = frame.contentDocument;\n\
           win = frame.contentWindow;\n\
         }"
    }

    fn wrap(body: String) -> String {
        format!("(function() {{\n{}\n{}\n}})()", Self::prelude(), body)
    }

    /// JS expression locating the first match for `locator` under `scope`
    /// (a JS identifier holding an element or document).
    fn finder(locator: &Locator, scope: &str) -> String {
        match locator {
            Locator::Css(sel) => format!("{scope}.querySelector({})", js_str(sel)),
            Locator::Id(id) => {
                format!("{scope}.querySelector({})", js_str(&format!("[id={id:?}]")))
            }
            Locator::XPath(xpath) => format!(
                "doc.evaluate({}, {scope}, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_str(xpath)
            ),
            Locator::LinkText(text) => format!(
                "doc.evaluate({}, {scope}, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_str(&link_text_xpath(text))
            ),
        }
    }

    fn readiness_guard(wait: Wait) -> &'static str {
        match wait {
            Wait::Present => "",
            Wait::Visible => {
                "if (!(el.offsetParent !== null || el.getClientRects().length > 0)) { return null; }\n"
            }
            Wait::Clickable => {
                "if (!(el.offsetParent !== null || el.getClientRects().length > 0)) { return null; }\n\
                 if (el.disabled) { return null; }\n"
            }
        }
    }

    /// Body operating on a registered element bound to `el`; `body` must
    /// end with a `return`.
    fn with_element(element: &ElementHandle, body: &str) -> String {
        Self::wrap(format!(
            "const el = reg.els[{idx}];\n\
             if (!el) {{ return null; }}\n\
             {body}",
            idx = element.raw(),
        ))
    }
}

#[async_trait]
impl Portal for CdpPortal {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn try_find(&self, locator: &Locator, wait: Wait) -> Result<Option<ElementHandle>> {
        let script = Self::wrap(format!(
            "const el = {finder};\n\
             if (!el) {{ return null; }}\n\
             {guard}\
             reg.els.push(el);\n\
             return reg.els.length - 1;",
            finder = Self::finder(locator, "doc"),
            guard = Self::readiness_guard(wait),
        ));
        let found: Option<u64> = self.eval(script, None).await?;
        Ok(found.map(ElementHandle::new))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let ok: bool = self
            .eval(
                Self::with_element(
                    element,
                    "el.scrollIntoView({ block: 'center' });\n\
                     el.click();\n\
                     return true;",
                ),
                false,
            )
            .await?;
        if !ok {
            return Err(anyhow!("Stale element handle on click"));
        }
        Ok(())
    }

    async fn click_unchecked(&self, element: &ElementHandle) -> Result<()> {
        let ok: bool = self
            .eval(Self::with_element(element, "el.click();\nreturn true;"), false)
            .await?;
        if !ok {
            return Err(anyhow!("Stale element handle on click"));
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let body = format!(
            "el.focus();\n\
             el.value = {value};\n\
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
             return true;",
            value = js_str(text),
        );
        let ok: bool = self.eval(Self::with_element(element, &body), false).await?;
        if !ok {
            return Err(anyhow!("Stale element handle on type"));
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        self.eval(
            Self::with_element(element, "return el.innerText || el.textContent || '';"),
            String::new(),
        )
        .await
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let body = format!("return el.getAttribute({});", js_str(name));
        self.eval(Self::with_element(element, &body), None).await
    }

    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let bind_scope = match scope {
            Some(element) => format!(
                "const ctx = reg.els[{}];\nif (!ctx) {{ return []; }}",
                element.raw()
            ),
            None => "const ctx = doc;".to_string(),
        };
        let collect = match locator {
            Locator::Css(sel) | Locator::Id(sel) => {
                let query = match locator {
                    Locator::Id(id) => format!("[id={id:?}]"),
                    _ => sel.clone(),
                };
                format!(
                    "ctx.querySelectorAll({}).forEach(function(e) {{\n\
                       reg.els.push(e);\n\
                       out.push(reg.els.length - 1);\n\
                     }});",
                    js_str(&query)
                )
            }
            Locator::XPath(xpath) => format!(
                "const owner = ctx.ownerDocument || doc;\n\
                 const found = owner.evaluate({}, ctx, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\n\
                 for (let i = 0; i < found.snapshotLength; i++) {{\n\
                   reg.els.push(found.snapshotItem(i));\n\
                   out.push(reg.els.length - 1);\n\
                 }}",
                js_str(xpath)
            ),
            Locator::LinkText(text) => format!(
                "const owner = ctx.ownerDocument || doc;\n\
                 const found = owner.evaluate({}, ctx, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\n\
                 for (let i = 0; i < found.snapshotLength; i++) {{\n\
                   reg.els.push(found.snapshotItem(i));\n\
                   out.push(reg.els.length - 1);\n\
                 }}",
                js_str(&link_text_xpath(text))
            ),
        };
        let script = Self::wrap(format!(
            "{bind_scope}\n\
             const out = [];\n\
             {collect}\n\
             return out;"
        ));
        let indices: Vec<u64> = self.eval(script, Vec::new()).await?;
        Ok(indices.into_iter().map(ElementHandle::new).collect())
    }

    async fn select_options(&self, element: &ElementHandle) -> Result<Vec<String>> {
        self.eval(
            Self::with_element(
                element,
                "return Array.from(el.options || []).map(function(o) { return o.value; });",
            ),
            Vec::new(),
        )
        .await
    }

    async fn select_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let body = format!(
            "el.value = {value};\n\
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
             return true;",
            value = js_str(value),
        );
        let ok: bool = self.eval(Self::with_element(element, &body), false).await?;
        if !ok {
            return Err(anyhow!("Stale element handle on select"));
        }
        Ok(())
    }

    async fn eval_bool(&self, expression: &str) -> Result<bool> {
        // Shadow `window`/`document` so the expression sees the innermost
        // frame's globals.
        let script = Self::wrap(format!(
            "return !!(function(window, document) {{ return ({expression}); }})(win, doc);"
        ));
        self.eval(script, false).await
    }

    async fn enter_frame(&self, locator: &Locator) -> Result<()> {
        let selector = match locator {
            Locator::Id(id) => format!("[id={id:?}]"),
            Locator::Css(sel) => sel.clone(),
            other => {
                return Err(anyhow!("Frame locator must be by id or css, got {other}"));
            }
        };
        let script = Self::wrap(format!(
            "const frame = doc.querySelector({sel});\n\
             if (!frame || !frame.contentDocument) {{ return false; }}\n\
             reg.frames.push({sel});\n\
             return true;",
            sel = js_str(&selector),
        ));
        let ok: bool = self.eval(script, false).await?;
        if !ok {
            return Err(anyhow!("Frame {locator} is not available"));
        }
        Ok(())
    }

    async fn exit_frame(&self) -> Result<()> {
        let script = "(function() {\n\
                        const reg = window.__hxreg;\n\
                        if (reg && reg.frames.length > 0) { reg.frames.pop(); }\n\
                        return true;\n\
                      })()"
            .to_string();
        let _: bool = self.eval(script, false).await?;
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create download dir: {}", dir.display()))?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.display().to_string())
            .build()
            .map_err(|e| anyhow!("Failed to build download params: {e}"))?;

        self.page.execute(params).await?;
        Ok(())
    }

    async fn page_title(&self) -> Result<String> {
        self.eval("document.title".to_string(), String::new()).await
    }

    async fn current_url(&self) -> Result<String> {
        self.eval("location.href".to_string(), String::new()).await
    }
}

/// Encode a Rust string as a JS string literal.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// XPath for an anchor whose normalized text equals `text`. The portal's
/// link texts never contain quotes, but guard against a stray `'` anyway.
fn link_text_xpath(text: &str) -> String {
    if text.contains('\'') {
        format!("//a[normalize-space(text())=\"{text}\"]")
    } else {
        format!("//a[normalize-space(text())='{text}']")
    }
}

/// Find a Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // NixOS
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_str_escapes_quotes_and_newlines() {
        assert_eq!(js_str("plain"), "\"plain\"");
        assert_eq!(js_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_str("a\nb"), "\"a\\nb\"");
    }

    #[test]
    fn link_text_xpath_prefers_single_quotes() {
        assert_eq!(
            link_text_xpath("Trade Book"),
            "//a[normalize-space(text())='Trade Book']"
        );
        assert_eq!(
            link_text_xpath("it's"),
            "//a[normalize-space(text())=\"it's\"]"
        );
    }

    #[test]
    fn finder_uses_attribute_selector_for_ids() {
        let expr = CdpPortal::finder(&Locator::id("txtu"), "doc");
        assert!(expr.contains("querySelector"));
        assert!(expr.contains("id=\\\"txtu\\\""));
    }
}

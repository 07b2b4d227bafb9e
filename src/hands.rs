use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
use tracing::{info, warn};

use crate::browser::{Browser, ScrollTarget};

/// Pause after input events so the page can react before it is observed.
const SETTLE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    /// Chrome binary; auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// DevTools websocket URL of an already running Chrome to attach to
    /// instead of starting one.
    pub attach_url: Option<String>,
    pub idle_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            attach_url: None,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

struct Session {
    _chrome: Chrome,
    tab: Arc<Tab>,
}

/// [`Browser`] backed by a real Chrome over the DevTools protocol.
///
/// CDP calls block, so each one runs on tokio's blocking pool.
pub struct ChromeBrowser {
    options: ChromeOptions,
    session: Mutex<Option<Session>>,
}

impl ChromeBrowser {
    pub fn new(options: ChromeOptions) -> Self {
        Self {
            options,
            session: Mutex::new(None),
        }
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.tab.clone())
            .ok_or_else(|| anyhow!("browser is not launched"))
    }

    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
    {
        let tab = self.tab()?;
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| anyhow!("browser task panicked: {e}"))?
    }
}

fn start_session(options: ChromeOptions) -> Result<Session> {
    if let Some(url) = options.attach_url {
        info!(target: "hands", %url, "attaching to existing Chrome");
        let chrome = Chrome::connect(url.clone())
            .map_err(|e| anyhow!("could not attach to Chrome at {url}: {e}"))?;
        let tab = chrome.new_tab()?;
        return Ok(Session {
            _chrome: chrome,
            tab,
        });
    }

    let launch = LaunchOptions {
        headless: options.headless,
        path: options.chrome_path,
        args: vec![
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--password-store=basic"),
        ],
        idle_browser_timeout: options.idle_timeout,
        ..Default::default()
    };

    info!(target: "hands", headless = options.headless, "starting Chrome");
    let chrome = Chrome::new(launch).map_err(|e| anyhow!("Browser launch failed: {e}"))?;
    let tab = chrome.new_tab()?;
    tab.navigate_to("about:blank")?;
    info!(target: "hands", "Chrome ready");

    Ok(Session {
        _chrome: chrome,
        tab,
    })
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn launch(&mut self) -> Result<()> {
        let options = self.options.clone();
        let session = tokio::task::spawn_blocking(move || start_session(options))
            .await
            .map_err(|e| anyhow!("Browser launch panicked: {e}"))??;
        let previous = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session);
        if previous.is_some() {
            warn!(target: "hands", "launch replaced a running session");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            // Dropping the handle shuts down a Chrome we started; an attached
            // Chrome keeps running, so only our tab is closed.
            tokio::task::spawn_blocking(move || {
                if let Err(e) = session.tab.close(false) {
                    warn!(target: "hands", error = %e, "failed to close tab");
                }
                drop(session);
            })
            .await
            .map_err(|e| anyhow!("browser shutdown panicked: {e}"))?;
            info!(target: "hands", "browser closed");
        }
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element(&selector)?.click()?;
            std::thread::sleep(SETTLE);
            Ok(())
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element(&selector)?.click()?;
            let js_selector = serde_json::to_string(&selector)?;
            tab.evaluate(
                &format!("(document.querySelector({js_selector}) || {{}}).value = ''"),
                false,
            )?;
            tab.type_str(&text)?;
            Ok(())
        })
        .await
    }

    async fn scroll(&self, target: ScrollTarget) -> Result<()> {
        self.with_tab(move |tab| {
            match target {
                ScrollTarget::Element(selector) => {
                    tab.wait_for_element(&selector)?.scroll_into_view()?;
                }
                ScrollTarget::By(y) => {
                    tab.evaluate(&format!("window.scrollBy(0, {y})"), false)?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        self.with_tab(|tab| tab.get_content()).await
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_url())).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.with_tab(move |tab| {
            let png =
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
            std::fs::write(&path, png)?;
            Ok(())
        })
        .await
    }
}

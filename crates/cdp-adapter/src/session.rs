//! Single-page Chromium session with XPath element operations.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::util::{normalize_user_agent, prune_stale_versions};

const CLEAR_FIELD_JS: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
        this.dispatchEvent(new Event('change', { bubbles: true }));
    } else if (this.isContentEditable) {
        this.textContent = '';
    }
}"#;

/// A launched browser with one active page.
///
/// The session is owned by the caller and shared by reference with the
/// interpreter; only [`ChromeSession::close`] tears it down.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    implicit_wait: Duration,
    poll_interval: Duration,
}

impl ChromeSession {
    /// Launch Chromium and prepare a page for scripted actions.
    pub async fn launch(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder().headless_mode(headless_mode(&cfg));
        if let Some(executable) = &cfg.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some((data_dir, profile)) = cfg.profile_args() {
            builder = builder.arg(data_dir).arg(profile);
        }
        let browser_config = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Launch)
                .with_hint(format!("invalid browser config: {err}"))
        })?;

        info!(
            headless = cfg.headless,
            executable = ?cfg.executable,
            profile = ?cfg.profile_directory,
            "launching chromium"
        );

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Launch).with_hint(err.to_string())
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(?err, "cdp handler error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let session = Self {
            browser,
            page,
            handler_task,
            implicit_wait: cfg.implicit_wait(),
            poll_interval: cfg.poll_interval(),
        };
        session.override_user_agent().await?;

        if let Some(cache_dir) = &cfg.driver_cache_dir {
            if let Err(err) = prune_stale_versions(cache_dir) {
                warn!(cache_dir = %cache_dir.display(), ?err, "failed to prune browser versions");
            }
        }

        Ok(session)
    }

    async fn override_user_agent(&self) -> Result<(), AdapterError> {
        let user_agent: String = self
            .page
            .evaluate("navigator.userAgent")
            .await?
            .into_value()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("user agent is not a string: {err}"))
            })?;
        let normalized = normalize_user_agent(&user_agent);
        debug!(user_agent = %normalized, "overriding user agent");
        self.page
            .execute(SetUserAgentOverrideParams::new(normalized))
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        debug!(url, "navigating");
        self.page.goto(url).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation).with_hint(format!("{url}: {err}"))
        })?;
        Ok(())
    }

    pub async fn refresh(&self) -> Result<(), AdapterError> {
        debug!("reloading page");
        self.page.execute(ReloadParams::default()).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// First element matching `xpath`, polling until the implicit wait elapses.
    pub async fn find_one(&self, xpath: &str) -> Result<Element, AdapterError> {
        self.find_all(xpath).await?.into_iter().next().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no element matches {xpath}"))
        })
    }

    /// All elements matching `xpath`. Waits for at least one to appear, up to the
    /// implicit wait. No match yields an empty list; protocol failures are errors.
    pub async fn find_all(&self, xpath: &str) -> Result<Vec<Element>, AdapterError> {
        let deadline = Instant::now() + self.implicit_wait;
        loop {
            match self.page.find_xpaths(xpath).await {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => {}
                Err(err) if is_empty_search(&err) => {}
                Err(err) => {
                    return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("{xpath}: {err}")))
                }
            }
            if Instant::now() >= deadline {
                debug!(xpath, "element lookup gave up");
                return Ok(Vec::new());
            }
            sleep(self.poll_interval).await;
        }
    }

    pub async fn click(&self, xpath: &str) -> Result<(), AdapterError> {
        let element = self.find_one(xpath).await?;
        element.click().await?;
        Ok(())
    }

    pub async fn clear(&self, xpath: &str) -> Result<(), AdapterError> {
        let element = self.find_one(xpath).await?;
        element.call_js_fn(CLEAR_FIELD_JS, false).await?;
        Ok(())
    }

    pub async fn type_text(&self, xpath: &str, text: &str) -> Result<(), AdapterError> {
        let element = self.find_one(xpath).await?;
        element.focus().await?;
        element.type_str(text).await?;
        Ok(())
    }

    pub async fn press_key(&self, xpath: &str, key: &str) -> Result<(), AdapterError> {
        let element = self.find_one(xpath).await?;
        element.focus().await?;
        element.press_key(key).await?;
        Ok(())
    }

    /// Rendered text of the first matching element.
    pub async fn read_text(&self, xpath: &str) -> Result<String, AdapterError> {
        let element = self.find_one(xpath).await?;
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    /// Close the browser and stop the protocol handler.
    pub async fn close(mut self) -> Result<(), AdapterError> {
        info!("closing chromium");
        self.browser.close().await?;
        if let Err(err) = self.browser.wait().await {
            warn!(?err, "chromium did not exit cleanly");
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// Headless runs use Chrome's current headless implementation (`--headless=new`).
fn headless_mode(cfg: &CdpConfig) -> HeadlessMode {
    if cfg.headless {
        HeadlessMode::New
    } else {
        HeadlessMode::False
    }
}

/// Chrome answers a search with no hits by rejecting the empty result range
/// requested afterwards; that, and `NotFound`, mean "nothing matched".
fn is_empty_search(err: &CdpError) -> bool {
    match err {
        CdpError::NotFound => true,
        CdpError::Chrome(inner) => inner.message.contains("Invalid search result range"),
        _ => false,
    }
}

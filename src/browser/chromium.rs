//! Chromium backend for [`Browser`], driven over the DevTools protocol.
//!
//! The workflow is synchronous, so the driver owns a private tokio runtime and
//! blocks on every protocol call. Element queries go through
//! `document.evaluate` snapshots; native clicks, typing and file uploads go
//! through DevTools input and DOM commands.

use crate::{
    browser::{Browser, BrowserLauncher, Element},
    config::BrowserConfig,
};
use anyhow::{Context, Result, anyhow};
use chromiumoxide::{
    Page,
    cdp::browser_protocol::{dom::SetFileInputFilesParams, network::ClearBrowserCookiesParams},
};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::{path::Path, time::Duration};
use tokio::{runtime::Runtime, task::JoinHandle};

const ALIVE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ChromiumBrowser {
    runtime: Runtime,
    browser: Option<chromiumoxide::Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!("launching browser (headless: {})", config.headless);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("failed to create browser runtime")?;

        let (browser, page, handler) = runtime.block_on(async {
            let mut builder = chromiumoxide::BrowserConfig::builder()
                .args(["--ignore-certificate-errors", "--no-first-run"]);

            if let Some(bin) = &config.chrome_bin {
                builder = builder.chrome_executable(bin);
            }

            if !config.headless {
                builder = builder.with_head();
            }

            let browser_config = builder
                .build()
                .map_err(|e| anyhow!(e))
                .context("failed to build browser config")?;

            let (browser, mut events) = chromiumoxide::Browser::launch(browser_config)
                .await
                .context("failed to launch browser")?;

            let handler = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if event.is_err() {
                        break;
                    }
                }
                debug!("browser event loop exited");
            });

            let page = browser
                .new_page("about:blank")
                .await
                .context("failed to open browser page")?;

            Ok::<_, anyhow::Error>((browser, page, handler))
        })?;

        Ok(Self {
            runtime,
            browser: Some(browser),
            page,
            handler,
        })
    }

    fn evaluate<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        self.runtime.block_on(async {
            self.page
                .evaluate(script)
                .await
                .context("failed to evaluate script")?
                .into_value::<T>()
                .context("failed to decode script result")
        })
    }

    /// Run `body` with `el` bound to the element behind `element`.
    fn on_element<T: DeserializeOwned>(&self, element: &Element, body: &str) -> Result<T> {
        self.evaluate(format!(
            "(() => {{ const el = {}; if (!el) {{ throw new Error('stale element'); }} {body} }})()",
            snapshot_item(element)?
        ))
    }

    fn protocol_element(&self, element: &Element) -> Result<chromiumoxide::Element> {
        self.runtime.block_on(async {
            self.page
                .find_xpaths(element.selector.as_str())
                .await
                .with_context(|| format!("failed to query {}", element.selector))?
                .into_iter()
                .nth(element.index)
                .with_context(|| format!("failed to resolve stale element {}", element.selector))
        })
    }
}

fn snapshot_item(element: &Element) -> Result<String> {
    let xpath = serde_json::to_string(&element.selector).context("failed to quote selector")?;
    Ok(format!(
        "document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotItem({})",
        element.index
    ))
}

impl Browser for ChromiumBrowser {
    fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        let xpath = serde_json::to_string(selector).context("failed to quote selector")?;
        let count: usize = self.evaluate(format!(
            "document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength"
        ))?;

        Ok((0..count).map(|index| Element::new(selector, index)).collect())
    }

    fn is_displayed(&self, element: &Element) -> Result<bool> {
        self.on_element(
            element,
            "const r = el.getBoundingClientRect(); \
             return getComputedStyle(el).visibility !== 'hidden' && r.width > 0 && r.height > 0;",
        )
    }

    fn is_enabled(&self, element: &Element) -> Result<bool> {
        self.on_element(element, "return !el.disabled;")
    }

    fn is_selected(&self, element: &Element) -> Result<bool> {
        self.on_element(element, "return !!(el.checked || el.selected);")
    }

    fn text(&self, element: &Element) -> Result<String> {
        self.on_element(element, "return el.textContent || '';")
    }

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let name = serde_json::to_string(name).context("failed to quote attribute name")?;
        let raw: String = self.on_element(
            element,
            &format!("return JSON.stringify(el.getAttribute({name}));"),
        )?;

        serde_json::from_str(&raw).context("failed to decode attribute")
    }

    fn native_click(&mut self, element: &Element) -> Result<()> {
        let target = self.protocol_element(element)?;
        self.runtime.block_on(async {
            target
                .click()
                .await
                .map(|_| ())
                .with_context(|| format!("failed to click {}", element.selector))
        })
    }

    fn script_click(&mut self, element: &Element) -> Result<()> {
        self.on_element::<bool>(element, "el.scrollIntoView(true); el.click(); return true;")
            .map(|_| ())
    }

    fn send_keys(&mut self, element: &Element, text: &str) -> Result<()> {
        let target = self.protocol_element(element)?;
        self.runtime.block_on(async {
            target
                .focus()
                .await
                .context("failed to focus input")?
                .type_str(text)
                .await
                .map(|_| ())
                .context("failed to type text")
        })
    }

    fn upload_file(&mut self, element: &Element, path: &Path) -> Result<()> {
        let target = self.protocol_element(element)?;
        let mut params = SetFileInputFilesParams::new(vec![path.display().to_string()]);
        params.backend_node_id = Some(target.backend_node_id);

        self.runtime.block_on(async {
            self.page
                .execute(params)
                .await
                .map(|_| ())
                .context("failed to set file input")
        })
    }

    fn select_value(&mut self, element: &Element, value: &str) -> Result<()> {
        let value = serde_json::to_string(value).context("failed to quote value")?;
        self.on_element::<bool>(
            element,
            &format!(
                "el.value = {value}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;"
            ),
        )
        .map(|_| ())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        self.runtime.block_on(async {
            self.page
                .goto(url)
                .await
                .map(|_| ())
                .with_context(|| format!("failed to open {url}"))
        })
    }

    fn clear_cookies(&mut self) -> Result<()> {
        self.runtime.block_on(async {
            self.page
                .execute(ClearBrowserCookiesParams::default())
                .await
                .map(|_| ())
                .context("failed to clear browser cookies")
        })
    }

    fn is_alive(&self) -> bool {
        if self.browser.is_none() || self.handler.is_finished() {
            return false;
        }

        self.runtime
            .block_on(tokio::time::timeout(ALIVE_TIMEOUT, self.page.evaluate("1")))
            .is_ok_and(|result| result.is_ok())
    }

    fn quit(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        debug!("quit() called");

        let result = self.runtime.block_on(async {
            browser.close().await.context("failed to close browser")?;
            browser
                .wait()
                .await
                .context("failed to wait for browser exit")?;
            Ok::<_, anyhow::Error>(())
        });

        self.handler.abort();
        result
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            warn!("failed to quit browser: {e:#}");
        }
    }
}

pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl BrowserLauncher for ChromiumLauncher {
    fn launch(&self) -> Result<Box<dyn Browser>> {
        Ok(Box::new(ChromiumBrowser::launch(&self.config)?))
    }
}

//! Action primitives over a [`Browser`]: locate-with-wait, click-with-fallback,
//! typing, navigation and reloads.

use crate::{
    browser::{Browser, Element},
    clock::Clock,
    error::ConsoleError,
    selectors::SelectorChain,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::{
    path::Path,
    rc::Rc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CLICK_BACKOFF: Duration = Duration::from_secs(1);

pub struct Console {
    browser: Box<dyn Browser>,
    clock: Rc<dyn Clock>,
}

impl Console {
    pub fn new(browser: Box<dyn Browser>, clock: Rc<dyn Clock>) -> Self {
        Self { browser, clock }
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration)
    }

    /// Swap in a fresh browser session, quitting the old one.
    pub fn replace_browser(&mut self, browser: Box<dyn Browser>) {
        let mut old = std::mem::replace(&mut self.browser, browser);
        if let Err(e) = old.quit() {
            warn!("failed to quit replaced browser: {e:#}");
        }
    }

    pub fn is_alive(&self) -> bool {
        self.browser.is_alive()
    }

    pub fn quit(&mut self) -> Result<()> {
        self.browser.quit().context("failed to quit browser")
    }

    /// Poll for the first match of `selector` until `timeout` elapses.
    ///
    /// Fails with [`ConsoleError::ElementNotFound`] once the timeout is over.
    pub fn locate(&self, selector: &str, timeout: Duration, visible: bool) -> Result<Element> {
        let deadline = self.clock.now() + timeout;

        loop {
            if let Some(element) = self.first_match(selector, visible) {
                return Ok(element);
            }

            if self.clock.now() >= deadline {
                return Err(ConsoleError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout,
                }
                .into());
            }

            self.clock.sleep(POLL_INTERVAL);
        }
    }

    /// Poll until at least one match of `selector` exists and return all of them.
    pub fn locate_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Element>> {
        self.locate(selector, timeout, false)?;
        self.browser
            .find_all(selector)
            .with_context(|| format!("failed to find elements: {selector}"))
    }

    /// Short existence check without waiting.
    pub fn exists(&self, selector: &str) -> bool {
        self.browser
            .find_all(selector)
            .map(|elements| !elements.is_empty())
            .unwrap_or(false)
    }

    /// Short check whether a displayed match exists, without waiting.
    pub fn is_visible(&self, selector: &str) -> bool {
        self.first_match(selector, true).is_some()
    }

    /// Whether a displayed match exists that is also enabled, without waiting.
    pub fn is_interactive(&self, selector: &str) -> bool {
        self.first_match(selector, true)
            .is_some_and(|element| self.browser.is_enabled(&element).unwrap_or(false))
    }

    fn first_match(&self, selector: &str, visible: bool) -> Option<Element> {
        let elements = self.browser.find_all(selector).ok()?;

        elements
            .into_iter()
            .find(|element| !visible || self.browser.is_displayed(element).unwrap_or(false))
    }

    /// Click the first visible match of `selector`.
    ///
    /// Each attempt waits up to `timeout` for the element, tries a native
    /// click and falls back to a script click. Attempts are separated by a
    /// short backoff.
    pub fn click(&mut self, selector: &str, timeout: Duration, attempts: u32) -> bool {
        for attempt in 1..=attempts.max(1) {
            match self.locate(selector, timeout, true) {
                Ok(element) => {
                    if self.click_element(&element) {
                        return true;
                    }
                }
                Err(e) => debug!("click attempt {attempt} for {selector}: {e:#}"),
            }

            if attempt < attempts {
                self.clock.sleep(CLICK_BACKOFF);
            }
        }

        false
    }

    pub fn click_element(&mut self, element: &Element) -> bool {
        match self.browser.native_click(element) {
            Ok(()) => true,
            Err(e) => {
                debug!("native click on {} failed: {e:#}", element.selector);
                match self.browser.script_click(element) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("script click on {} failed: {e:#}", element.selector);
                        false
                    }
                }
            }
        }
    }

    /// Script click only, for controls the console hides behind hover menus.
    pub fn script_click(&mut self, selector: &str, timeout: Duration) -> bool {
        match self.locate(selector, timeout, false) {
            Ok(element) => self.browser.script_click(&element).is_ok(),
            Err(_) => false,
        }
    }

    /// Click the first alternative of `chain` that can be clicked.
    pub fn click_first(&mut self, chain: SelectorChain, timeout: Duration) -> Option<&'static str> {
        chain
            .iter()
            .copied()
            .find(|selector| self.click(selector, timeout, 1))
    }

    /// First alternative of `chain` that currently exists, without waiting.
    pub fn first_existing(&self, chain: SelectorChain) -> Option<&'static str> {
        chain.iter().copied().find(|selector| self.exists(selector))
    }

    pub fn type_text(&mut self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        let element = self.locate(selector, timeout, true)?;
        self.browser
            .send_keys(&element, text)
            .with_context(|| format!("failed to type into {selector}"))
    }

    pub fn select(&mut self, selector: &str, value: &str, timeout: Duration) -> Result<()> {
        let element = self.locate(selector, timeout, true)?;
        self.browser
            .select_value(&element, value)
            .with_context(|| format!("failed to select {value} in {selector}"))
    }

    pub fn upload(&mut self, selector: &str, path: &Path, timeout: Duration) -> Result<()> {
        let element = self.locate(selector, timeout, false)?;
        self.browser
            .upload_file(&element, path)
            .with_context(|| format!("failed to upload {}", path.display()))
    }

    pub fn is_selected(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let element = self.locate(selector, timeout, false)?;
        self.browser
            .is_selected(&element)
            .with_context(|| format!("failed to read state of {selector}"))
    }

    /// Text of the first match of `selector`, without waiting.
    pub fn text_of(&self, selector: &str) -> Option<String> {
        let element = self.first_match(selector, false)?;
        self.browser.text(&element).ok()
    }

    pub fn attribute_of(&self, selector: &str, name: &str) -> Option<String> {
        let element = self.first_match(selector, false)?;
        self.browser.attribute(&element, name).ok().flatten()
    }

    pub fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigate() called: {url}");
        self.browser
            .navigate(url)
            .with_context(|| format!("failed to navigate to {url}"))
    }

    /// Reload `url`, optionally with a cache-busting query and a clean cookie jar.
    pub fn reload(&mut self, url: &str, bust_cache: bool, clear_cookies: bool) -> Result<()> {
        if clear_cookies {
            self.browser
                .clear_cookies()
                .context("failed to clear cookies")?;
        }

        let target = if bust_cache {
            cache_busted(url, unix_millis())
        } else {
            url.to_string()
        };

        self.navigate(&target)
    }
}

fn cache_busted(url: &str, stamp: u128) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}_={stamp}")
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

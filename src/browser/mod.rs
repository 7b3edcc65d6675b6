//! Browser automation seam
//!
//! The workflow never talks to a browser directly. It consumes the
//! [`Browser`] trait through the [`Console`] action primitives, and gets fresh
//! browser sessions from a [`BrowserLauncher`].

pub mod chromium;
pub mod console;

pub use console::Console;

use anyhow::Result;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::path::Path;

/// Handle to the `index`-th match of an XPath selector.
///
/// Handles are resolved lazily by the backend on every use, so a handle
/// survives page re-renders as long as the selector still matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub selector: String,
    pub index: usize,
}

impl Element {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Browser {
    /// All current matches of `selector`, without waiting.
    fn find_all(&self, selector: &str) -> Result<Vec<Element>>;
    fn is_displayed(&self, element: &Element) -> Result<bool>;
    fn is_enabled(&self, element: &Element) -> Result<bool>;
    fn is_selected(&self, element: &Element) -> Result<bool>;
    /// Text content of the element, hidden text included.
    fn text(&self, element: &Element) -> Result<String>;
    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>>;
    fn native_click(&mut self, element: &Element) -> Result<()>;
    fn script_click(&mut self, element: &Element) -> Result<()>;
    fn send_keys(&mut self, element: &Element, text: &str) -> Result<()>;
    fn upload_file(&mut self, element: &Element, path: &Path) -> Result<()>;
    fn select_value(&mut self, element: &Element, value: &str) -> Result<()>;
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn clear_cookies(&mut self) -> Result<()>;
    /// Whether the automation transport still answers.
    fn is_alive(&self) -> bool;
    fn quit(&mut self) -> Result<()>;
}

/// Source of fresh browser sessions, used at the start of a device run and
/// whenever a dead transport has to be replaced.
pub trait BrowserLauncher {
    fn launch(&self) -> Result<Box<dyn Browser>>;
}

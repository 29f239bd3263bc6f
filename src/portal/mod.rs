//! Narrow capability interface over the brokerage portal's UI.
//!
//! Flows never talk to the browser directly; everything goes through
//! [`Portal`], which keeps the automation backend swappable (the CDP
//! implementation lives in [`cdp`], tests script a fake).

pub mod cdp;

use std::fmt;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use cdp::{BrowserSession, CdpPortal};

/// One way of locating a logical UI element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Id(String),
    Css(String),
    XPath(String),
    LinkText(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Locator::LinkText(value.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={v}"),
            Locator::Css(v) => write!(f, "css={v}"),
            Locator::XPath(v) => write!(f, "xpath={v}"),
            Locator::LinkText(v) => write!(f, "link-text={v}"),
        }
    }
}

/// Readiness condition an element must satisfy before it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Attached to the document.
    Present,
    /// Attached and rendered.
    Visible,
    /// Rendered and not disabled.
    Clickable,
}

/// Opaque handle to a located element.
///
/// Handles are only meaningful against the portal that produced them and
/// are invalidated by page navigation; flows re-resolve after navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// UI interaction primitives the extraction flows consume.
///
/// Deliberately minimal: navigate, probe, click, type, read, plus the few
/// portal oddities the flows need (frames, script probes, download
/// routing). Mirrors what the host UI actually requires rather than a
/// general automation surface.
#[async_trait]
pub trait Portal: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Single non-blocking probe for `locator` under `wait`. `Ok(None)`
    /// means "not there (yet)"; waiting and fallback candidates are the
    /// caller's business (see [`crate::locate::resolve`]).
    async fn try_find(&self, locator: &Locator, wait: Wait) -> Result<Option<ElementHandle>>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Script-level click for controls that are present but not
    /// interaction-ready through normal input.
    async fn click_unchecked(&self, element: &ElementHandle) -> Result<()>;

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()>;

    async fn text(&self, element: &ElementHandle) -> Result<String>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// All matches for `locator`, scoped to `scope` when given, in document
    /// order. No waiting; an empty result is not an error.
    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>>;

    /// Option values of a `<select>` control, in listed order.
    async fn select_options(&self, element: &ElementHandle) -> Result<Vec<String>>;

    async fn select_value(&self, element: &ElementHandle, value: &str) -> Result<()>;

    /// Evaluate a boolean script expression in the current document
    /// context (the innermost entered frame, if any).
    async fn eval_bool(&self, expression: &str) -> Result<bool>;

    /// Push an embedded frame onto the context stack; subsequent finds and
    /// script probes run against the frame's document.
    async fn enter_frame(&self, locator: &Locator) -> Result<()>;

    /// Pop back to the enclosing document context.
    async fn exit_frame(&self) -> Result<()>;

    /// Route browser downloads to `dir` from now on.
    async fn set_download_dir(&self, dir: &Path) -> Result<()>;

    async fn page_title(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;
}

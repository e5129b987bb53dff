use std::{error::Error as StdError, future::Future, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::{
    error::WebDriverResult, prelude::*, ChromiumLikeCapabilities, ChromeCapabilities,
    DesiredCapabilities, WebDriver, WindowHandle,
};

use crate::configuration::BrowserSettings;

use super::page::{SchemePage, Target};

const CHROME_ARGS: [&str; 4] = [
    "--disable-setuid-sandbox",
    "--no-first-run",
    "--no-zygote",
    "--disable-blink-features=AutomationControlled",
];

/// Failures that mean no browser can be used at all.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("browser unavailable: {0}")]
    Unavailable(#[source] Box<dyn StdError + Send + Sync>),
}

impl SessionError {
    fn unavailable(error: impl StdError + Send + Sync + 'static) -> Self {
        SessionError::Unavailable(Box::new(error))
    }
}

/// One browser with one primary page. Extra pages are short-lived tabs.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn SchemePage;

    /// Opens a new tab; the caller must `close` it.
    async fn open_page(&self) -> anyhow::Result<Box<dyn SchemePage>>;

    /// Releases the browser. Errors are logged, never returned.
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, SessionError>;
}

pub struct Droid {
    driver: Option<WebDriver>,
    page: DroidPage,
}

impl Droid {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, SessionError> {
        let caps = chrome_capabilities(settings).map_err(SessionError::unavailable)?;

        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps)
            .await
            .map_err(SessionError::unavailable)?;
        log::info!(
            "Started browser session via {} (headless: {})",
            settings.webdriver_url,
            settings.headless
        );

        Ok(Droid {
            page: DroidPage::primary(driver.clone()),
            driver: Some(driver),
        })
    }
}

fn chrome_capabilities(settings: &BrowserSettings) -> WebDriverResult<ChromeCapabilities> {
    let mut caps = DesiredCapabilities::chrome();
    if settings.headless {
        caps.set_headless()?;
    }
    caps.set_no_sandbox()?;
    caps.set_disable_dev_shm_usage()?;
    caps.set_disable_gpu()?;
    for arg in CHROME_ARGS {
        caps.add_arg(arg)?;
    }
    caps.add_arg(&format!(
        "--window-size={},{}",
        settings.window_width, settings.window_height
    ))?;
    caps.add_arg(&format!("--user-agent={}", settings.user_agent))?;
    Ok(caps)
}

#[async_trait]
impl BrowserSession for Droid {
    fn page(&self) -> &dyn SchemePage {
        &self.page
    }

    async fn open_page(&self) -> anyhow::Result<Box<dyn SchemePage>> {
        let driver = self
            .driver
            .clone()
            .context("Browser session already closed")?;
        let origin = driver.window().await?;
        let tab = driver.new_tab().await?;
        driver.switch_to_window(tab.clone()).await?;

        Ok(Box::new(DroidPage {
            driver,
            tab: Some(TabWindows { tab, origin }),
        }))
    }

    async fn close(self: Box<Self>) {
        let mut droid = self;
        if let Some(driver) = droid.driver.take() {
            match driver.quit().await {
                Ok(()) => log::info!("Closed browser session"),
                Err(e) => log::warn!("Failed to quit browser session: {:?}", e),
            }
        }
    }
}

impl Drop for Droid {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        // Reached when a run is cancelled mid-phase.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = driver.quit().await {
                        log::warn!("Failed to quit dropped browser session: {:?}", e);
                    }
                });
            }
            Err(_) => log::error!("Browser session dropped outside a runtime, leaking it"),
        }
    }
}

pub struct DroidFactory {
    settings: BrowserSettings,
}

impl DroidFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        DroidFactory { settings }
    }
}

#[async_trait]
impl SessionProvider for DroidFactory {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        Ok(Box::new(Droid::launch(&self.settings).await?))
    }
}

struct TabWindows {
    tab: WindowHandle,
    origin: WindowHandle,
}

/// A page backed by the WebDriver session's current window.
pub struct DroidPage {
    driver: WebDriver,
    tab: Option<TabWindows>,
}

impl DroidPage {
    fn primary(driver: WebDriver) -> Self {
        DroidPage { driver, tab: None }
    }

    async fn element(&self, target: &Target) -> WebDriverResult<WebElement> {
        self.driver.find(by(target)).await
    }
}

fn by(target: &Target) -> By {
    match target {
        Target::Css(css) => By::Css(*css),
        Target::Text(text) => By::XPath(format!("//*[contains(text(), \"{}\")]", text)),
    }
}

#[async_trait]
impl SchemePage for DroidPage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    async fn title(&self) -> anyhow::Result<String> {
        Ok(self.driver.title().await?)
    }

    async fn source(&self) -> anyhow::Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn is_visible(&self, target: &Target) -> anyhow::Result<bool> {
        match self.element(target).await {
            Ok(element) => Ok(element.is_displayed().await?),
            Err(_) => Ok(false),
        }
    }

    async fn wait_for(&self, target: &Target, timeout: Duration) -> anyhow::Result<()> {
        self.driver
            .query(by(target))
            .wait(timeout, Duration::from_millis(250))
            .and_displayed()
            .first()
            .await
            .with_context(|| format!("{:?} not visible after {:?}", target, timeout))?;
        Ok(())
    }

    async fn click(&self, target: &Target) -> anyhow::Result<()> {
        self.element(target).await?.click().await?;
        Ok(())
    }

    async fn force_click(&self, target: &Target) -> anyhow::Result<()> {
        let element = self.element(target).await?;
        self.driver
            .execute(
                "arguments[0].click(); arguments[0].focus();",
                vec![element.to_json()?],
            )
            .await?;
        Ok(())
    }

    async fn fill(&self, target: &Target, value: &str) -> anyhow::Result<()> {
        let element = self.element(target).await?;
        element.clear().await?;
        element.send_keys(value).await?;
        Ok(())
    }

    async fn type_keys(
        &self,
        target: &Target,
        text: &str,
        delay: Duration,
    ) -> anyhow::Result<()> {
        let element = self.element(target).await?;
        for ch in text.chars() {
            let key = ch.to_string();
            element.send_keys(key.as_str()).await?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn press_enter(&self, target: &Target) -> anyhow::Result<()> {
        // WebDriver code point for the Enter key.
        self.element(target).await?.send_keys("\u{E007}").await?;
        Ok(())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> anyhow::Result<Value> {
        let ret = self.driver.execute(script, args).await?;
        Ok(ret.json().clone())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        if let Some(windows) = &self.tab {
            self.driver.switch_to_window(windows.tab.clone()).await?;
            close_and_return(
                self.driver.close_window(),
                self.driver.switch_to_window(windows.origin.clone()),
            )
            .await?;
        }
        Ok(())
    }
}

/// Runs `restore` even when `close` fails, so the driver never stays on a
/// dead window. The first error wins.
async fn close_and_return<E>(
    close: impl Future<Output = Result<(), E>>,
    restore: impl Future<Output = Result<(), E>>,
) -> Result<(), E> {
    let closed = close.await;
    let restored = restore.await;
    closed.and(restored)
}

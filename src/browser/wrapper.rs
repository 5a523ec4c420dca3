//! Browser lifecycle management
//!
//! `BrowserWrapper` pairs the chromiumoxide browser with its event handler
//! task and profile directory so cleanup happens on every exit path.
//! `SearchSession` layers the capture-specific page setup on top: one page
//! per run, mobile emulation and stealth applied once, fresh navigation per
//! keyword.

use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide_cdp::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};
use crate::{BrowserProfile, RunEnvironment, browser_setup};

/// Runs before any page script on every navigation, hiding the most
/// commonly probed automation marker
const WEBDRIVER_SHIM: &str = "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";

/// Wrapper for Browser and its event handler task
///
/// The handler MUST be aborted when the browser is done, or it runs
/// indefinitely after the browser closes. Drop handles that; the profile
/// directory is only removed after the process has fully exited.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the profile directory. Only valid after `browser.wait()` has
    /// completed; Chrome holds file locks until the process exits.
    pub(crate) fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop() kills the Chrome process itself

        if let Some(dir) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without explicit close. Profile directory will be \
                 orphaned: {}. Call SearchSession::close() for a clean shutdown.",
                dir.display()
            );
        }
    }
}

/// One browser session driving the capture batch
///
/// Owns exactly one page for its whole lifetime. Device emulation and the
/// stealth shim are applied once at open; every keyword gets a fresh
/// navigation on the same page so no overlay state leaks between keywords.
pub struct SearchSession {
    wrapper: BrowserWrapper,
    page: Page,
}

impl SearchSession {
    /// Launch the browser and prepare the emulated page
    pub async fn open(profile: &BrowserProfile, environment: RunEnvironment) -> BrowserResult<Self> {
        let (browser, handler, user_data_dir) = browser_setup::launch_browser(profile, environment)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
        let wrapper = BrowserWrapper::new(browser, handler, user_data_dir);

        // blank page first: emulation and the shim must be in place before
        // the target page loads
        let page = wrapper
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        let session = Self { wrapper, page };
        session.prepare_page(profile).await?;
        Ok(session)
    }

    async fn prepare_page(&self, profile: &BrowserProfile) -> BrowserResult<()> {
        let map_cdp = |e: chromiumoxide::error::CdpError| BrowserError::EmulationFailed(e.to_string());

        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(WEBDRIVER_SHIM))
            .await
            .map_err(map_cdp)?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(profile.viewport_width as i64)
            .height(profile.viewport_height as i64)
            .device_scale_factor(profile.device_scale_factor)
            .mobile(true)
            .build()
            .map_err(BrowserError::EmulationFailed)?;
        self.page.execute(metrics).await.map_err(map_cdp)?;

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(profile.user_agent.clone())
            .accept_language(profile.accept_language.clone())
            .platform("iPhone")
            .build()
            .map_err(BrowserError::EmulationFailed)?;
        self.page.execute(ua).await.map_err(map_cdp)?;

        Ok(())
    }

    /// Reload the target page from scratch. Called at the start of every
    /// keyword so stale suggestion panels never leak into the next one.
    pub async fn navigate_fresh(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Verify the browser process is still responding. A failure here is
    /// session-fatal: the batch cannot continue.
    pub async fn health_check(&self) -> BrowserResult<()> {
        self.wrapper
            .browser()
            .version()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::SessionLost(e.to_string()))
    }

    /// Close the browser process and release every resource.
    ///
    /// Both `close()` and `wait()` are required: close sends the command,
    /// wait blocks until the process has actually exited. Only then can
    /// the profile directory be removed. Safe on every exit path because
    /// the caller runs it regardless of how the batch ended.
    pub async fn close(mut self) {
        info!("Shutting down browser session");

        if let Err(e) = self.wrapper.browser_mut().close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.wrapper.browser_mut().wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.wrapper.cleanup_temp_dir();
    }
}

//! Side-effecting navigation for the login and logout entry points.
//!
//! Both endpoints are plain browser pages owned by the backend: login sets
//! the session cookie and redirects back, logout clears it. The client only
//! has to send the user there.

use anyhow::{Context, Result};

/// Sends the user to a backend page.
pub trait Navigator {
    /// Navigate to `url`.
    fn navigate(&self, url: &str) -> Result<()>;
}

/// Opens URLs in the system browser.
///
/// When `LIVEFEED_NO_BROWSER` or `CI` is set, the URL is only printed.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> Result<()> {
        let headless =
            std::env::var("LIVEFEED_NO_BROWSER").is_ok() || std::env::var("CI").is_ok();
        if headless {
            println!("  Open this URL in your browser:");
            println!();
            println!("    {}", url);
            println!();
            return Ok(());
        }

        log::info!("[Navigator] Opening {}", url);
        open_browser(url)
    }
}

/// Try to open a URL in the user's browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("Failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("Failed to open browser")?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
            .context("Failed to open browser")?;
    }

    Ok(())
}

use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Addresses and language of the device console
    pub device: DeviceConfig,

    /// Browser automation backend configuration
    pub browser: BrowserConfig,

    /// Path configuration
    pub paths: PathConfig,

    /// Waits, bounds and retry counts
    pub timings: Timings,

    /// Run against the built-in simulated router instead of real hardware
    pub dry_run: bool,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub candidate_urls: Vec<String>,
    pub language: String,
}

#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_bin: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub firmware_dir: PathBuf,
    pub firmware_table: Option<PathBuf>,
    pub credential_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Timings {
    pub probe_rounds: u32,
    pub probe_delay: Duration,
    pub probe_timeout: Duration,
    pub reboot_probe_rounds: u32,
    pub reboot_probe_delay: Duration,
    pub menu_ready_timeout: Duration,
    pub sweep_rounds: u32,
    pub sweep_backoff: Duration,
    pub dialog_timeout: Duration,
    pub button_auth_timeout: Duration,
    pub step_attempts: u32,
    pub step_retry_pause: Duration,
    pub update_dwell: Duration,
    pub reset_dwell: Duration,
    pub forgot_password_dwell: Duration,
    pub reset_confirm_timeout: Duration,
    pub reset_confirm_cycles: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            probe_rounds: 20,
            probe_delay: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            reboot_probe_rounds: 40,
            reboot_probe_delay: Duration::from_secs(10),
            menu_ready_timeout: Duration::from_secs(3),
            sweep_rounds: 15,
            sweep_backoff: Duration::from_millis(1500),
            dialog_timeout: Duration::from_secs(3),
            button_auth_timeout: Duration::from_secs(120),
            step_attempts: 2,
            step_retry_pause: Duration::from_secs(2),
            update_dwell: Duration::from_secs(50),
            reset_dwell: Duration::from_secs(45),
            forgot_password_dwell: Duration::from_secs(50),
            reset_confirm_timeout: Duration::from_secs(180),
            reset_confirm_cycles: 3,
        }
    }
}

pub const DEFAULT_CANDIDATE_URLS: &[&str] = &[
    "http://fritz.box",
    "http://192.168.178.1",
    "http://169.254.139.1",
    "http://169.254.1.1",
];

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it loads
    /// all configuration from environment variables. Subsequent calls return
    /// the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. The tool cannot do anything
    /// useful without a valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    fn load_internal() -> Result<Self> {
        let device = DeviceConfig::load()?;
        let browser = BrowserConfig::load()?;
        let paths = PathConfig::load()?;
        let timings = Timings::load()?;
        let dry_run = parse_flag("DRY_RUN", false)?;

        Ok(Self {
            device,
            browser,
            paths,
            timings,
            dry_run,
        })
    }
}

impl DeviceConfig {
    fn load() -> Result<Self> {
        let candidate_urls = env::var("FRITZ_CANDIDATE_URLS")
            .map(|urls| parse_url_list(&urls))
            .unwrap_or_else(|_| DEFAULT_CANDIDATE_URLS.iter().map(|s| s.to_string()).collect());

        anyhow::ensure!(
            !candidate_urls.is_empty(),
            "failed to load FRITZ_CANDIDATE_URLS: no address given"
        );

        let language = env::var("FRITZ_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        Ok(Self {
            candidate_urls,
            language,
        })
    }
}

impl BrowserConfig {
    fn load() -> Result<Self> {
        let headless = parse_flag("BROWSER_HEADLESS", true)?;
        let chrome_bin = env::var("CHROME_BIN").ok().map(PathBuf::from);

        Ok(Self {
            headless,
            chrome_bin,
        })
    }
}

impl PathConfig {
    fn load() -> Result<Self> {
        let base_dir = Self::base_dir()?;

        let firmware_dir = env::var("FIRMWARE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_dir.join("firmware-and-recovery"));
        let firmware_table = env::var("FIRMWARE_TABLE").ok().map(PathBuf::from);
        let credential_file = env::var("CREDENTIAL_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_dir.join("generated-credentials.txt"));

        Ok(Self {
            firmware_dir,
            firmware_table,
            credential_file,
        })
    }

    #[cfg(not(any(test, feature = "mock")))]
    fn base_dir() -> Result<PathBuf> {
        let exe = env::current_exe().context("failed to get executable path")?;
        exe.parent()
            .map(PathBuf::from)
            .context("failed to get executable directory")
    }

    // In test mode, use temp directory to keep test runs away from the build output
    #[cfg(any(test, feature = "mock"))]
    fn base_dir() -> Result<PathBuf> {
        let base_dir = env::temp_dir().join("fritz-provision-test");
        std::fs::create_dir_all(&base_dir).context("failed to create test directory")?;
        Ok(base_dir)
    }
}

impl Timings {
    fn load() -> Result<Self> {
        let mut timings = Self::default();

        if let Ok(rounds) = env::var("PROBE_ROUNDS") {
            timings.probe_rounds = rounds
                .parse::<u32>()
                .context("failed to parse PROBE_ROUNDS: invalid format")?;
        }

        if let Ok(secs) = env::var("PROBE_DELAY_SECS") {
            timings.probe_delay = Duration::from_secs(
                secs.parse::<u64>()
                    .context("failed to parse PROBE_DELAY_SECS: invalid format")?,
            );
        }

        Ok(timings)
    }
}

fn parse_flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(value) => parse_bool(&value).with_context(|| format!("failed to parse {name}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean: {other}"),
    }
}

fn parse_url_list(urls: &str) -> Vec<String> {
    urls.split(',')
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

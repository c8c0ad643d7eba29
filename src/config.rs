//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for browser-vision, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for a local single-machine setup
//! - Builder-style overrides from the command line
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BROWSER_VISION_ARTIFACT_DIR` | Root directory for run artifacts | `static/runs` |
//! | `BROWSER_VISION_PUBLIC_PREFIX` | URL prefix for artifact links | `/static/runs` |
//! | `BROWSER_VISION_CAPTURE_INTERVAL_MS` | Delay between frame captures (ms) | `1000` |
//! | `BROWSER_VISION_AGENT_TIMEOUT` | Orchestrator-side agent timeout (seconds) | unset |
//! | `BROWSER_VISION_LOGIN_URL` | Login page the task starts from | `https://testing.praxilabs-lms.com` |
//! | `BROWSER_VISION_LOGIN_MARKER` | Text confirming a successful login | `Courses` |
//! | `BROWSER_VISION_AGENT_CMD` | Agent command line | `browser-agent` |
//! | `BROWSER_VISION_SCREENSHOT_CMD` | Screenshot command line, `{path}` is substituted | `import -window root {path}` |
//! | `BROWSER_VISION_BROWSER_CMD` | Browser launcher kept alive for the session | unset |
//!
//! # Example
//!
//! ```bash
//! export BROWSER_VISION_ARTIFACT_DIR="/var/lib/browser-vision/runs"
//! export BROWSER_VISION_AGENT_CMD="python3 agent.py --max-steps 100"
//! export BROWSER_VISION_AGENT_TIMEOUT=900
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default artifact root directory
pub const DEFAULT_ARTIFACT_DIR: &str = "static/runs";

/// Default URL prefix under which artifacts are served
pub const DEFAULT_PUBLIC_PREFIX: &str = "/static/runs";

/// Default delay between frame captures (milliseconds)
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 1000;

/// Default login page
pub const DEFAULT_LOGIN_URL: &str = "https://testing.praxilabs-lms.com";

/// Default text whose presence confirms a login
pub const DEFAULT_LOGIN_MARKER: &str = "Courses";

/// Default agent command
pub const DEFAULT_AGENT_CMD: &str = "browser-agent";

/// Default screenshot command (ImageMagick full-screen grab)
pub const DEFAULT_SCREENSHOT_CMD: &str = "import -window root {path}";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the artifact root
pub const ENV_ARTIFACT_DIR: &str = "BROWSER_VISION_ARTIFACT_DIR";

/// Environment variable for the public URL prefix
pub const ENV_PUBLIC_PREFIX: &str = "BROWSER_VISION_PUBLIC_PREFIX";

/// Environment variable for the capture interval
pub const ENV_CAPTURE_INTERVAL_MS: &str = "BROWSER_VISION_CAPTURE_INTERVAL_MS";

/// Environment variable for the agent timeout
pub const ENV_AGENT_TIMEOUT: &str = "BROWSER_VISION_AGENT_TIMEOUT";

/// Environment variable for the login page
pub const ENV_LOGIN_URL: &str = "BROWSER_VISION_LOGIN_URL";

/// Environment variable for the login confirmation marker
pub const ENV_LOGIN_MARKER: &str = "BROWSER_VISION_LOGIN_MARKER";

/// Environment variable for the agent command
pub const ENV_AGENT_CMD: &str = "BROWSER_VISION_AGENT_CMD";

/// Environment variable for the screenshot command
pub const ENV_SCREENSHOT_CMD: &str = "BROWSER_VISION_SCREENSHOT_CMD";

/// Environment variable for the browser launcher command
pub const ENV_BROWSER_CMD: &str = "BROWSER_VISION_BROWSER_CMD";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for browser-vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-run orchestration settings
    pub run: RunSettings,
    /// Login scenario settings used when composing tasks
    pub scenario: ScenarioSettings,
    /// External command lines for the automation engine
    pub commands: CommandSettings,
}

/// Settings consumed by the run orchestrator
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Root directory under which each run gets its own subdirectory
    pub artifact_dir: PathBuf,
    /// URL prefix mapped onto `artifact_dir`
    pub public_prefix: String,
    /// Delay between frame captures
    pub capture_interval: Duration,
    /// Optional upper bound on agent execution
    pub agent_timeout: Option<Duration>,
}

/// Settings for the login preamble of composed tasks
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    /// Login page URL
    pub login_url: String,
    /// Text that must be visible after logging in
    pub login_marker: String,
}

/// Command lines for the process-backed engine
#[derive(Debug, Clone)]
pub struct CommandSettings {
    /// Agent program and arguments
    pub agent: Vec<String>,
    /// Screenshot program and arguments (`{path}` is replaced per frame)
    pub screenshot: Vec<String>,
    /// Browser launcher kept alive for the session, if any
    pub browser: Option<Vec<String>>,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            run: RunSettings::from_env(),
            scenario: ScenarioSettings::from_env(),
            commands: CommandSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            run: RunSettings::defaults(),
            scenario: ScenarioSettings::defaults(),
            commands: CommandSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RunSettings {
    /// Create run settings from environment variables
    pub fn from_env() -> Self {
        Self {
            artifact_dir: env::var(ENV_ARTIFACT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
            public_prefix: env::var(ENV_PUBLIC_PREFIX)
                .unwrap_or_else(|_| DEFAULT_PUBLIC_PREFIX.to_string()),
            capture_interval: Duration::from_millis(
                env::var(ENV_CAPTURE_INTERVAL_MS)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CAPTURE_INTERVAL_MS),
            ),
            agent_timeout: env::var(ENV_AGENT_TIMEOUT)
                .ok()
                .and_then(|s| parse_timeout_secs(&s)),
        }
    }

    /// Create run settings with defaults
    pub fn defaults() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
            capture_interval: Duration::from_millis(DEFAULT_CAPTURE_INTERVAL_MS),
            agent_timeout: None,
        }
    }

    /// Override the artifact root
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Override the capture interval
    pub fn capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval = interval;
        self
    }

    /// Override the agent timeout
    pub fn agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ScenarioSettings {
    /// Create scenario settings from environment variables
    pub fn from_env() -> Self {
        Self {
            login_url: env::var(ENV_LOGIN_URL).unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
            login_marker: env::var(ENV_LOGIN_MARKER)
                .unwrap_or_else(|_| DEFAULT_LOGIN_MARKER.to_string()),
        }
    }

    /// Create scenario settings with defaults
    pub fn defaults() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            login_marker: DEFAULT_LOGIN_MARKER.to_string(),
        }
    }
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl CommandSettings {
    /// Create command settings from environment variables
    pub fn from_env() -> Self {
        Self {
            agent: env::var(ENV_AGENT_CMD)
                .map(|s| split_command(&s))
                .unwrap_or_else(|_| split_command(DEFAULT_AGENT_CMD)),
            screenshot: env::var(ENV_SCREENSHOT_CMD)
                .map(|s| split_command(&s))
                .unwrap_or_else(|_| split_command(DEFAULT_SCREENSHOT_CMD)),
            browser: env::var(ENV_BROWSER_CMD)
                .ok()
                .map(|s| split_command(&s))
                .filter(|parts| !parts.is_empty()),
        }
    }

    /// Create command settings with defaults
    pub fn defaults() -> Self {
        Self {
            agent: split_command(DEFAULT_AGENT_CMD),
            screenshot: split_command(DEFAULT_SCREENSHOT_CMD),
            browser: None,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a timeout in whole seconds; `0` and garbage mean "no timeout"
fn parse_timeout_secs(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}

/// Split a command line on whitespace
pub fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

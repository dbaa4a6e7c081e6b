//! Startup console output.

use std::io::IsTerminal;
use std::sync::OnceLock;

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_GRAY: &str = "\x1b[90m";

/// Whether colors are enabled (off when `NO_COLOR` is set or stdout is not a terminal).
fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        std::io::stdout().is_terminal()
    })
}

fn color(s: impl AsRef<str>, ansi: &str) -> String {
    if colors_enabled() {
        format!("{}{}{}", ansi, s.as_ref(), ANSI_RESET)
    } else {
        s.as_ref().to_string()
    }
}

/// Prints the startup phases in order.
pub struct StartupLogger {
    phase: StartupPhase,
    quiet: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StartupPhase {
    Banner,
    Initialization,
    Configuration,
    Services,
    Ready,
}

/// Service status for startup logging.
pub enum ServiceStatus {
    Started,
    Error,
    Disabled,
}

impl StartupLogger {
    pub fn new() -> Self {
        Self {
            phase: StartupPhase::Banner,
            quiet: false,
        }
    }

    /// A logger that prints nothing.
    pub fn quiet() -> Self {
        Self {
            phase: StartupPhase::Banner,
            quiet: true,
        }
    }

    pub fn banner(&mut self) {
        if self.quiet {
            return;
        }
        self.phase = StartupPhase::Banner;

        println!();
        println!(
            "{}",
            color("┌─────────────────────────────────────────┐", ANSI_CYAN)
        );
        println!(
            "{}{}{}",
            color("│ ", ANSI_CYAN),
            color("Device Simulation", ANSI_BOLD),
            color("                       │", ANSI_CYAN)
        );
        println!(
            "{}{}{}",
            color("│ ", ANSI_CYAN),
            color(format!("REST API v1 - {:<25}", devsim_core::VERSION), ANSI_DIM),
            color(" │", ANSI_CYAN)
        );
        println!(
            "{}",
            color("└─────────────────────────────────────────┘", ANSI_CYAN)
        );
        println!();
    }

    pub fn phase_init(&mut self) {
        self.enter(StartupPhase::Initialization, "Initialization");
    }

    pub fn phase_config(&mut self) {
        self.enter(StartupPhase::Configuration, "Configuration");
    }

    pub fn phase_services(&mut self) {
        self.enter(StartupPhase::Services, "Services");
    }

    pub fn phase_ready(&mut self) {
        if self.quiet || self.phase == StartupPhase::Ready {
            return;
        }
        println!();
        println!(
            "{} {}",
            color("✓", ANSI_GREEN),
            color("Server ready", ANSI_BOLD)
        );
        self.phase = StartupPhase::Ready;
    }

    fn enter(&mut self, phase: StartupPhase, title: &str) {
        if self.quiet || self.phase == phase {
            return;
        }
        println!(
            "{} {} {}",
            color("›", ANSI_BOLD),
            color(title, ANSI_BLUE),
            color("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━", ANSI_DIM)
        );
        self.phase = phase;
    }

    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        println!("  {} {}", color("●", ANSI_BLUE), message);
    }

    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        println!("  {} {}", color("⚠", ANSI_YELLOW), message);
    }

    /// Indented, dim.
    pub fn detail(&self, message: &str) {
        if self.quiet {
            return;
        }
        println!("    {}", color(message, ANSI_GRAY));
    }

    pub fn service(&self, name: &str, status: ServiceStatus) {
        if self.quiet {
            return;
        }
        let (icon, color_code) = match status {
            ServiceStatus::Started => ("✓", ANSI_GREEN),
            ServiceStatus::Error => ("✗", ANSI_RED),
            ServiceStatus::Disabled => ("○", ANSI_GRAY),
        };
        println!("    {} {:30}", color(icon, color_code), name);
    }

    /// Print the listening address and the API entry points.
    pub fn ready_info(&self, addr: &str) {
        if self.quiet {
            return;
        }
        println!();
        println!(
            "  {} {}",
            color("Status:", ANSI_BOLD),
            color(format!("http://{addr}/v1/status"), ANSI_CYAN)
        );
        println!(
            "  {} {}",
            color("Models:", ANSI_BOLD),
            color(format!("http://{addr}/v1/devicemodels"), ANSI_CYAN)
        );
        println!(
            "  {} {}",
            color("Sims:  ", ANSI_BOLD),
            color(format!("http://{addr}/v1/simulations"), ANSI_CYAN)
        );
        println!();
        println!(
            "{} {}",
            color("Press", ANSI_BOLD),
            color("Ctrl+C to stop.", ANSI_DIM)
        );
        println!();
    }
}

impl Default for StartupLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_logger_tracks_no_phase() {
        let mut logger = StartupLogger::quiet();
        logger.phase_init();
        logger.phase_ready();
        assert!(logger.phase == StartupPhase::Banner);
    }

    #[test]
    fn test_phases_advance() {
        let mut logger = StartupLogger::new();
        logger.phase_init();
        assert!(logger.phase == StartupPhase::Initialization);
        logger.phase_services();
        logger.phase_ready();
        assert!(logger.phase == StartupPhase::Ready);
    }

    #[test]
    fn test_color_wrapper_keeps_text() {
        assert!(color("test", ANSI_GREEN).contains("test"));
    }
}

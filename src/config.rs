//! Process-wide configuration, resolved once at start-up.

/// Environment toggle enabling generation mode for a whole pipeline.
pub const GENERATE_ENV: &str = "PIPEGEN_GO";

/// Whether a stage performs its operation or describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Execute,
    Generate,
}

impl Mode {
    /// Combine the explicit per-invocation switch with the environment
    /// toggle. The switch wins whenever it is given.
    pub fn resolve(flag: Option<bool>, env: Option<&str>) -> Self {
        let generate = flag
            .or_else(|| env.and_then(parse_toggle))
            .unwrap_or(false);
        if generate {
            Mode::Generate
        } else {
            Mode::Execute
        }
    }

    /// Resolve against the current process environment.
    pub fn from_env(flag: Option<bool>) -> Self {
        let env = std::env::var(GENERATE_ENV).ok();
        Self::resolve(flag, env.as_deref())
    }

    pub fn is_generate(self) -> bool {
        self == Mode::Generate
    }
}

fn parse_toggle(value: &str) -> Option<bool> {
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Collapse a `--generate` / `--no-generate` pair into an explicit switch.
pub fn switch_from_flags(generate: bool, no_generate: bool) -> Option<bool> {
    match (generate, no_generate) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_execute() {
        assert_eq!(Mode::resolve(None, None), Mode::Execute);
    }

    #[test]
    fn test_env_toggle_enables_generation() {
        assert_eq!(Mode::resolve(None, Some("1")), Mode::Generate);
        assert_eq!(Mode::resolve(None, Some("TRUE")), Mode::Generate);
        assert_eq!(Mode::resolve(None, Some("yes")), Mode::Execute);
        assert_eq!(Mode::resolve(None, Some("0")), Mode::Execute);
    }

    #[test]
    fn test_switch_takes_precedence() {
        assert_eq!(Mode::resolve(Some(false), Some("1")), Mode::Execute);
        assert_eq!(Mode::resolve(Some(true), Some("0")), Mode::Generate);
        assert_eq!(Mode::resolve(Some(true), None), Mode::Generate);
    }

    #[test]
    fn test_switch_from_flags() {
        assert_eq!(switch_from_flags(false, false), None);
        assert_eq!(switch_from_flags(true, false), Some(true));
        assert_eq!(switch_from_flags(false, true), Some(false));
    }
}

use musicbox::config;

/// Load settings, falling back to defaults. A fallback comes back with the
/// reason so it can be logged once logging is up.
pub fn load_settings() -> (config::Settings, Option<String>) {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                (config::Settings::default(), Some(format!("invalid config: {msg}")))
            } else {
                (s, None)
            }
        }
        // Config is optional; failures should not prevent the command from running.
        Err(e) => (
            config::Settings::default(),
            Some(format!("failed to load config: {e}")),
        ),
    }
}

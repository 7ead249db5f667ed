use gmeet_core::config::{AppConfig, LoadOptions};
use gmeet_core::SettingsHandle;
use tracing::{error, info};

/// Re-reads the configuration and swaps in the new plugin settings. A config
/// that fails to load or validate leaves the running settings in place.
pub fn reload_settings(options: &LoadOptions, settings: &SettingsHandle) -> bool {
    match AppConfig::load(options.clone()) {
        Ok(config) => {
            info!(
                event_name = "system.config.reloaded",
                correlation_id = "reload",
                naming_scheme = %config.plugin.naming_scheme,
                "plugin settings reloaded"
            );
            settings.replace(config.plugin);
            true
        }
        Err(error) => {
            error!(
                event_name = "system.config.reload_failed",
                correlation_id = "reload",
                error = %error,
                "config reload failed; keeping previous settings"
            );
            false
        }
    }
}

#[cfg(unix)]
pub async fn watch_hangup(options: LoadOptions, settings: std::sync::Arc<SettingsHandle>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(error) => {
            error!(
                event_name = "system.config.watch_failed",
                correlation_id = "reload",
                error = %error,
                "could not install SIGHUP handler; config reload disabled"
            );
            return;
        }
    };

    while hangups.recv().await.is_some() {
        reload_settings(&options, &settings);
    }
}

#[cfg(not(unix))]
pub async fn watch_hangup(_options: LoadOptions, _settings: std::sync::Arc<SettingsHandle>) {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use std::fs;

    use gmeet_core::config::{LoadOptions, PluginSettings};
    use gmeet_core::{NamingScheme, SettingsHandle};
    use tempfile::TempDir;

    use super::reload_settings;

    const VALID: &str = r#"
[mattermost]
site_url = "https://chat.example.com"
bot_token = "bot-token"
command_token = "command-token"

[plugin]
naming_scheme = "uuid"
server_locale = "fr"
"#;

    #[test]
    fn reload_swaps_plugin_settings() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("gmeet.toml");
        fs::write(&path, VALID).expect("write config");
        let settings = SettingsHandle::new(PluginSettings::default());
        let before = settings.snapshot();

        let options =
            LoadOptions { config_path: Some(path), require_file: true, ..LoadOptions::default() };
        assert!(reload_settings(&options, &settings));

        let after = settings.snapshot();
        assert_eq!(after.naming_scheme, NamingScheme::Uuid);
        assert_eq!(after.server_locale, "fr");
        assert_eq!(before.naming_scheme, NamingScheme::Words);
    }

    #[test]
    fn invalid_config_keeps_previous_settings() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("gmeet.toml");
        fs::write(&path, VALID.replace("\"uuid\"", "\"zoom\"")).expect("write config");
        let settings = SettingsHandle::new(PluginSettings {
            naming_scheme: NamingScheme::Mattermost,
            ..PluginSettings::default()
        });

        let options =
            LoadOptions { config_path: Some(path), require_file: true, ..LoadOptions::default() };
        assert!(!reload_settings(&options, &settings));

        assert_eq!(settings.snapshot().naming_scheme, NamingScheme::Mattermost);
    }
}

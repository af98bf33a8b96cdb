use crate::cli::SettingsArgs;
use crate::config::load_settings;
use crate::error::Result;
use tracing::info;

pub fn run(args: SettingsArgs) -> Result<()> {
    let settings = load_settings(
        args.source.settings.as_deref(),
        &args.source.set_values,
        args.source.repeats,
    )?;
    let content = settings.to_toml_string()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Wrote settings to {:?}", path);
            println!("Settings written to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SettingsSource;
    use septop::engine::settings::SepTopSettings;

    #[test]
    fn written_settings_load_back_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let args = SettingsArgs {
            source: SettingsSource {
                repeats: Some(4),
                set_values: vec!["thermo-settings.temperature=310 kelvin".to_string()],
                ..SettingsSource::default()
            },
            output: Some(path.clone()),
        };
        run(args).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let settings = SepTopSettings::from_toml_str(&content).unwrap();
        assert_eq!(settings.protocol_repeats, 4);
        assert!(content.contains("310"));
    }
}

use crate::error::{CliError, Result};
use septop::engine::settings::SepTopSettings;
use std::path::Path;
use toml::{Table, Value};
use tracing::debug;

/// Loads protocol settings from an optional TOML file, then applies `--set` overrides and
/// the repeat count.
///
/// Missing keys in the file keep their protocol defaults.
pub fn load_settings(
    path: Option<&Path>,
    set_values: &[String],
    repeats: Option<usize>,
) -> Result<SepTopSettings> {
    let mut settings = match path {
        Some(path) => {
            debug!("Loading settings from file: {:?}", path);
            let content = std::fs::read_to_string(path)?;
            SepTopSettings::from_toml_str(&content).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })?
        }
        None => SepTopSettings::default(),
    };

    settings = apply_set_values(settings, set_values)?;
    if let Some(repeats) = repeats {
        settings.protocol_repeats = repeats;
    }
    Ok(settings)
}

fn apply_set_values(settings: SepTopSettings, set_values: &[String]) -> Result<SepTopSettings> {
    if set_values.is_empty() {
        return Ok(settings);
    }
    let mut table: Table = toml::from_str(&settings.to_toml_string()?)
        .map_err(|e| CliError::Config(format!("Could not re-read settings: {}", e)))?;

    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let path: Vec<&str> = key.trim().split('.').collect();
        let (leaf, parents) = path
            .split_last()
            .filter(|(leaf, _)| !leaf.is_empty())
            .ok_or_else(|| CliError::Config(format!("Empty configuration key in '{}'", kv_pair)))?;

        let mut current = &mut table;
        for part in parents {
            current = current
                .get_mut(*part)
                .and_then(Value::as_table_mut)
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    ))
                })?;
        }
        debug!("Overriding setting '{}' with '{}'", key, value_str);
        current.insert(leaf.to_string(), parse_value(value_str.trim()));
    }

    let content = toml::to_string(&table)
        .map_err(|e| CliError::Config(format!("Could not serialize settings: {}", e)))?;
    Ok(SepTopSettings::from_toml_str(&content)?)
}

/// Interprets a raw override as a TOML value, falling back to a plain string so that
/// quantities such as `4 femtosecond` need no quoting.
fn parse_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

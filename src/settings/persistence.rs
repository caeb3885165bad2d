// to be called on startup and quit; remembers the settings between runs.
// Only settings live here, recorded loops are never written to disk.
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::config::StationConfig;

pub const LOOPTTY_DIR: &str = ".looptty";
const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "looptty.log";

// <project_dir>/.looptty/config.json
fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(LOOPTTY_DIR).join(CONFIG_FILE)
}

pub fn log_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(LOOPTTY_DIR).join(LOG_FILE)
}

// A missing or unreadable file just means defaults; a file that parses but
// fails validation is ignored too.
pub fn load_config(project_dir: &Path) -> Option<StationConfig> {
    let path = config_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    let config: StationConfig = match serde_json::from_str(&data) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("ignoring {}: {e}", path.display());
            return None;
        }
    };
    if let Err(e) = config.validate() {
        tracing::warn!("ignoring {}: {e}", path.display());
        return None;
    }
    Some(config)
}

// Save the settings, making the directory if it doesn't exist already
pub fn save_config(project_dir: &Path, config: &StationConfig) -> anyhow::Result<()> {
    let path = config_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::config::Tempo;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("looptty-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("roundtrip");
        let mut config = StationConfig::default();
        config.tempo = Tempo::new(96.0, (3, 4), 4).unwrap();
        save_config(&dir, &config).unwrap();
        assert_eq!(load_config(&dir), Some(config));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_file_means_defaults() {
        let dir = scratch_dir("garbage");
        std::fs::create_dir_all(dir.join(LOOPTTY_DIR)).unwrap();
        std::fs::write(config_file_path(&dir), "not json").unwrap();
        assert_eq!(load_config(&dir), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let dir = scratch_dir("invalid");
        std::fs::create_dir_all(dir.join(LOOPTTY_DIR)).unwrap();
        std::fs::write(
            config_file_path(&dir),
            r#"{"tempo": {"bpm": 0.0, "meter": [4, 4], "bars": 2}}"#,
        )
        .unwrap();
        assert_eq!(load_config(&dir), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_range_tempo_is_ignored() {
        let dir = scratch_dir("out-of-range");
        std::fs::create_dir_all(dir.join(LOOPTTY_DIR)).unwrap();
        std::fs::write(
            config_file_path(&dir),
            r#"{"tempo": {"bpm": 0.01, "meter": [13, 3], "bars": 100000}}"#,
        )
        .unwrap();
        assert_eq!(load_config(&dir), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

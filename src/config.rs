//! Runtime settings.
//!
//! File format: TOML
//! Default path (Linux/XDG): `$XDG_CONFIG_HOME/tracksplit/config.toml` or
//! `~/.config/tracksplit/config.toml`
//!
//! Precedence (highest wins):
//! 1) Environment variables (prefix `TRACKSPLIT__`, `__` as nested separator)
//! 2) Config file (if present)
//! 3) Struct defaults

use std::path::{Path, PathBuf};
use std::{env, fmt};

use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output: OutputSettings,
    pub tags: TagSettings,
    pub tools: ToolSettings,
    pub preview: PreviewSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory that receives the numbered segment files (created if missing).
    pub dir: PathBuf,
    /// Encoder passed to the transcoder as `-acodec`.
    pub codec: String,
    /// Bitrate passed to the transcoder as `-b:a`.
    pub bitrate: String,
    /// File extension of produced segments, without the dot.
    pub extension: String,
    /// Upper bound on the title part of a file name, in characters.
    pub max_title_len: usize,
    /// Replace existing segments instead of failing on them.
    pub overwrite: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            codec: "mp3".to_string(),
            bitrate: "192k".to_string(),
            extension: "mp3".to_string(),
            max_title_len: 100,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    /// Album field written to every segment.
    pub album: String,
    /// Artist used for tracks that don't carry their own.
    pub default_artist: String,
    /// Whether to embed the session's cover image.
    pub embed_cover: bool,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            album: "Album".to_string(),
            default_artist: "Unknown Artist".to_string(),
            embed_cover: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: PathBuf,
    pub yt_dlp: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            yt_dlp: PathBuf::from("yt-dlp"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Length of an audition clip, in seconds.
    pub seconds: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self { seconds: 30 }
    }
}

impl Settings {
    /// Load settings from the environment and the default config file location.
    pub fn load() -> Result<Self> {
        Self::load_from(resolve_config_path().as_deref())
    }

    /// Load settings from the environment and an explicit (optional) config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("TRACKSPLIT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let problems: Vec<&str> = [
            (self.output.codec.trim().is_empty(), "output.codec must not be empty"),
            (self.output.bitrate.trim().is_empty(), "output.bitrate must not be empty"),
            (
                self.output.extension.trim().trim_start_matches('.').is_empty(),
                "output.extension must not be empty",
            ),
            (self.output.max_title_len == 0, "output.max_title_len must be >= 1"),
            (self.preview.seconds == 0, "preview.seconds must be >= 1"),
        ]
        .into_iter()
        .filter_map(|(bad, msg)| bad.then_some(msg))
        .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::msg(problems.join("; ")))
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "output={} codec={} bitrate={} ext={}",
            self.output.dir.display(),
            self.output.codec,
            self.output.bitrate,
            self.output.extension
        )
    }
}

/// Resolve the config path from `TRACKSPLIT_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("TRACKSPLIT_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/tracksplit/config.toml`, or `~/.config/tracksplit/config.toml` when
/// `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("tracksplit").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    struct EnvGuard {
        key: &'static str,
        old: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, val: &str) -> Self {
            let old = env::var_os(key);
            unsafe {
                env::set_var(key, val);
            }
            Self { key, old }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.old.take() {
                Some(v) => unsafe {
                    env::set_var(self.key, v);
                },
                None => unsafe {
                    env::remove_var(self.key);
                },
            }
        }
    }

    #[test]
    fn defaults_match_the_classic_layout() {
        let s = Settings::default();
        assert_eq!(s.output.dir, PathBuf::from("output"));
        assert_eq!(s.output.codec, "mp3");
        assert_eq!(s.output.bitrate, "192k");
        assert_eq!(s.output.max_title_len, 100);
        assert!(s.output.overwrite);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[output]\nbitrate = \"320k\"\nextension = \"m4a\"\n\n[tags]\nalbum = \"Live at Home\"\n",
        )?;

        let s = Settings::load_from(Some(&path))?;
        assert_eq!(s.output.bitrate, "320k");
        assert_eq!(s.output.extension, "m4a");
        assert_eq!(s.output.codec, "mp3");
        assert_eq!(s.tags.album, "Live at Home");
        Ok(())
    }

    #[test]
    fn missing_file_falls_back_to_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let s = Settings::load_from(Some(&dir.path().join("nope.toml")))?;
        assert_eq!(s.preview.seconds, 30);
        Ok(())
    }

    #[test]
    fn environment_overrides_the_file() -> anyhow::Result<()> {
        let _lock = env_lock();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools]\nyt_dlp = \"/usr/local/bin/yt-dlp\"\n")?;

        let s = Settings::load_from(Some(&path))?;
        assert_eq!(s.tools.yt_dlp, PathBuf::from("/usr/local/bin/yt-dlp"));

        let _g = EnvGuard::set("TRACKSPLIT__TOOLS__YT_DLP", "/opt/yt-dlp");
        let s = Settings::load_from(Some(&path))?;
        assert_eq!(s.tools.yt_dlp, PathBuf::from("/opt/yt-dlp"));
        Ok(())
    }

    #[test]
    fn config_path_prefers_the_explicit_variable() {
        let _lock = env_lock();
        let _g1 = EnvGuard::set("TRACKSPLIT_CONFIG_PATH", "/tmp/tracksplit-test.toml");
        assert_eq!(
            resolve_config_path(),
            Some(PathBuf::from("/tmp/tracksplit-test.toml"))
        );
    }

    #[test]
    fn default_path_follows_xdg() {
        let _lock = env_lock();
        let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-home");
        assert_eq!(
            default_config_path(),
            Some(PathBuf::from("/tmp/xdg-home/tracksplit/config.toml"))
        );
    }

    #[test]
    fn validate_lists_every_problem() {
        let mut s = Settings::default();
        s.output.codec = " ".into();
        s.output.max_title_len = 0;
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("output.codec"));
        assert!(err.contains("output.max_title_len"));
    }
}

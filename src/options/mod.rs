//! Runtime options with TOML file support.
//!
//! Every section uses `#[serde(default)]`, so partial files (e.g. only
//! overriding `[window]`) work. Command-line flags are applied on top.

mod render_target;
mod textures;
mod transport;
mod window;

use std::path::Path;

pub use render_target::RenderTargetSettings;
use serde::{Deserialize, Serialize};
pub use textures::TextureOptions;
pub use transport::TransportOptions;
pub use window::WindowOptions;

use crate::error::TextureError;

/// Top-level options container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Options {
    /// Window size and placement.
    pub window: WindowOptions,
    /// Image loading.
    pub textures: TextureOptions,
    /// Capture target.
    pub render_target: RenderTargetSettings,
    /// Playback.
    pub transport: TransportOptions,
}

impl Options {
    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`TextureError::Io`] if the file cannot be read,
    /// [`TextureError::OptionsParse`] if it is not valid TOML for these
    /// options.
    pub fn load(path: &Path) -> Result<Self, TextureError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TextureError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`TextureError::OptionsParse`] on serialization failure,
    /// [`TextureError::Io`] on write failure.
    pub fn save(&self, path: &Path) -> Result<(), TextureError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TextureError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::BufferKind;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[render_target]
kind = "color_and_depth"
float_texture = true

[window]
position = [10, 20]
"#;
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.render_target.kind, BufferKind::ColorAndDepth);
        assert!(opts.render_target.float_texture);
        assert!(opts.render_target.alpha);
        assert_eq!(opts.window.position, Some([10, 20]));
        assert_eq!(opts.window.width, 1280);
        assert!(opts.textures.async_loading);
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[render_target]\nkind = \"triple\"\n").unwrap();
        assert!(matches!(
            Options::load(&path),
            Err(TextureError::OptionsParse(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vistex.toml");
        let mut opts = Options::default();
        opts.transport.loop_point = 8.0;
        opts.textures.mipmaps = false;
        opts.save(&path).unwrap();
        assert_eq!(Options::load(&path).unwrap(), opts);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Options::load(&dir.path().join("none.toml")),
            Err(TextureError::Io(_))
        ));
    }
}

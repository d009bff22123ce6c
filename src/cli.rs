//! Command-line arguments of the `vistex` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::options::Options;

/// Off-screen render-target and texture viewer.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "vistex", version)]
pub struct Args {
    /// Start fullscreen.
    #[arg(short, long)]
    pub fullscreen: bool,

    /// Window size.
    #[arg(short, long, value_name = "W,H", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Window position.
    #[arg(
        short,
        long,
        value_name = "X,Y",
        value_parser = parse_position,
        allow_hyphen_values = true
    )]
    pub position: Option<(i32, i32)>,

    /// Options file; flags override its values.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run this many frames without a window and exit.
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<u32>,

    /// Images to display.
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,
}

fn parse_pair<T: std::str::FromStr>(s: &str) -> Result<(T, T), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got `{s}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<T>()
            .map_err(|_| format!("`{v}` is not a valid number"))
    };
    Ok((parse(a)?, parse(b)?))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = parse_pair::<u32>(s)?;
    if w == 0 || h == 0 {
        return Err(format!("window size must be non-zero, got `{s}`"));
    }
    Ok((w, h))
}

fn parse_position(s: &str) -> Result<(i32, i32), String> {
    parse_pair(s)
}

impl Args {
    /// Override `options` with the flags that were given.
    pub fn apply_to(&self, options: &mut Options) {
        if self.fullscreen {
            options.window.fullscreen = true;
        }
        if let Some((width, height)) = self.size {
            options.window.width = width;
            options.window.height = height;
        }
        if let Some((x, y)) = self.position {
            options.window.position = Some([x, y]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_window_flags() {
        let args =
            Args::try_parse_from(["vistex", "-f", "-s", "800,600", "-p", "-10,20", "a.png"])
                .unwrap();
        assert!(args.fullscreen);
        assert_eq!(args.size, Some((800, 600)));
        assert_eq!(args.position, Some((-10, 20)));
        assert_eq!(args.images, vec![PathBuf::from("a.png")]);

        let mut options = Options::default();
        args.apply_to(&mut options);
        assert!(options.window.fullscreen);
        assert_eq!((options.window.width, options.window.height), (800, 600));
        assert_eq!(options.window.position, Some([-10, 20]));
    }

    #[test]
    fn rejects_malformed_pairs() {
        for bad in ["800", "800,", "a,b", "0,600"] {
            assert!(Args::try_parse_from(["vistex", "-s", bad]).is_err(), "{bad}");
        }
    }

    #[test]
    fn help_is_a_display_request() {
        let err = Args::try_parse_from(["vistex", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let args = Args::try_parse_from(["vistex", "--headless", "3"]).unwrap();
        let mut options = Options::default();
        options.window.width = 640;
        args.apply_to(&mut options);
        assert_eq!(options.window.width, 640);
        assert_eq!(args.headless, Some(3));
    }
}

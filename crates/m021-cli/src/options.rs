use clap::Parser;
use m021_hw::{CaptureConfig, ConfigError};
use std::io::{self, Write};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("M021_BUILD_REV"), ")");

#[derive(Parser, Debug)]
#[command(
    name = "m021-capture",
    version = VERSION,
    about = "Capture frames from an LI-USB30-M021 (or any V4L2) camera and display them"
)]
pub struct Cli {
    /// Index of the video device to stream frames from
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub device: i64,

    /// Frame width in pixels; must be a mode the camera supports
    #[arg(short, long, default_value_t = 800, allow_negative_numbers = true)]
    pub width: i64,

    /// Frame height in pixels; must be a mode the camera supports
    #[arg(short = 'k', long, default_value_t = 460, allow_negative_numbers = true)]
    pub height: i64,

    /// Comma-separated B,G,R offsets added to every pixel. For negative
    /// values use the "=" form, e.g. -c=-1,-3,-5
    #[arg(short, long = "color-corr", default_value = "0,0,0")]
    pub color_corr: String,

    /// List V4L2 capture devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Cli {
    /// Validate the raw options into a capture configuration.
    pub fn resolve(&self) -> Result<CaptureConfig, ConfigError> {
        CaptureConfig::new(self.device, self.width, self.height, Some(self.color_corr.as_str()))
    }

    /// Whether a non-empty correction string was given (the default counts).
    pub fn correction_supplied(&self) -> bool {
        !self.color_corr.is_empty()
    }
}

/// Echo the resolved settings the way the capture tool has always printed them.
pub fn echo(config: &CaptureConfig, correction_supplied: bool, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Device: {}", config.device())?;
    writeln!(out, "Frame Dims: {}x{}", config.width(), config.height())?;
    if correction_supplied {
        writeln!(out, "Color Corrections: {}", config.correction())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use m021_hw::ColorCorrection;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["m021-capture"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.device, 0);
        assert_eq!(cli.width, 800);
        assert_eq!(cli.height, 460);
        assert_eq!(cli.color_corr, "0,0,0");
        assert!(!cli.list_devices);

        let cfg = cli.resolve().unwrap();
        assert_eq!(cfg.correction(), ColorCorrection::NONE);
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-d", "2", "-w", "640", "-k", "480"]);
        let cfg = cli.resolve().unwrap();
        assert_eq!((cfg.device(), cfg.width(), cfg.height()), (2, 640, 480));
    }

    #[test]
    fn test_negative_correction_with_equals() {
        let cli = parse(&["--width", "800", "--height", "460", "--color-corr=-1,-3,-5"]);
        assert_eq!(
            cli.resolve().unwrap().correction(),
            ColorCorrection::new(-1, -3, -5)
        );

        let cli = parse(&["-c=-1,-3,-5"]);
        assert_eq!(cli.color_corr, "-1,-3,-5");
    }

    #[test]
    fn test_negative_correction_without_equals_is_usage_error() {
        let result = Cli::try_parse_from(["m021-capture", "--color-corr", "-1,-3,-5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_device_is_invalid_argument() {
        let cli = parse(&["--device", "-1"]);
        let err = cli.resolve().unwrap_err();
        assert_eq!(err.field(), "device");
    }

    #[test]
    fn test_bad_corrections_rejected() {
        assert!(parse(&["-c", "1,2,3,4"]).resolve().is_err());
        assert!(parse(&["-c", "200,0,0"]).resolve().is_err());
    }

    #[test]
    fn test_zero_height_rejected() {
        let err = parse(&["-k", "0"]).resolve().unwrap_err();
        assert_eq!(err.field(), "height");
    }

    #[test]
    fn test_non_numeric_width_is_usage_error() {
        assert!(Cli::try_parse_from(["m021-capture", "-w", "wide"]).is_err());
    }

    #[test]
    fn test_echo_with_correction() {
        let cfg = parse(&["--color-corr=-1,-3,-5"]).resolve().unwrap();
        let mut out = Vec::new();
        echo(&cfg, true, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Device: 0\nFrame Dims: 800x460\nColor Corrections: [-1, -3, -5]\n"
        );
    }

    #[test]
    fn test_echo_empty_correction_omitted() {
        let cli = parse(&["-c", ""]);
        assert!(!cli.correction_supplied());
        let cfg = cli.resolve().unwrap();
        let mut out = Vec::new();
        echo(&cfg, cli.correction_supplied(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Device: 0\nFrame Dims: 800x460\n");
    }

    #[test]
    fn test_version_carries_build_rev() {
        assert!(VERSION.contains(env!("M021_BUILD_REV")));
    }
}

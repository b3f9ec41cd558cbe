use batlayer_core::config::IconSize;
use batlayer_core::platform::Rgba16;
use batlayer_core::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "batlayer",
    version = batlayer_core::version(),
    about = "BatLayer - Shows a battery level icon on top of the display",
)]
pub struct Args {
    /// Background fill colour, 16 bit RGBA hex (e.g. 0x000F). 0 disables the fill
    #[arg(short = 'b', value_name = "RGBA", value_parser = parse_color)]
    pub background: Option<Rgba16>,

    /// Index of the display to draw on
    #[arg(short = 'd', value_name = "NUMBER")]
    pub display: Option<u32>,

    /// Layer of the lowest overlay
    #[arg(short = 'l', value_name = "LAYER", allow_hyphen_values = true)]
    pub layer: Option<i32>,

    /// Horizontal offset in pixels
    #[arg(short = 'x', value_name = "OFFSET", allow_hyphen_values = true)]
    pub x_offset: Option<i32>,

    /// Vertical offset in pixels
    #[arg(short = 'y', value_name = "OFFSET", allow_hyphen_values = true)]
    pub y_offset: Option<i32>,

    /// Stop after this many milliseconds. 0 runs until told to stop
    #[arg(short = 't', value_name = "MS")]
    pub timeout_ms: Option<u32>,

    /// Do not read key presses
    #[arg(short = 'n', long = "no-interactive")]
    pub no_interactive: bool,

    /// Icon size: 0 small, 1 medium, 2 large. Anything else means small
    #[arg(short = 's', value_name = "SIZE")]
    pub icon_size: Option<u32>,

    /// Cycle through the levels once a second
    #[arg(short = 'a', long = "animate")]
    pub animate: bool,

    /// Read commands from stdin. This is the default
    #[arg(short = 'p', long = "pipe", conflicts_with = "no_pipe")]
    pub pipe: bool,

    /// Do not read commands from stdin, use key presses and animation instead
    #[arg(short = 'P', long = "no-pipe")]
    pub no_pipe: bool,

    /// Specify custom configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Draw into memory instead of a real display
    #[arg(long = "headless")]
    pub headless: bool,

    /// Log everything, including per event traces
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log informational messages and above
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Load the configuration and every icon, then exit
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Image to show for the first level instead of the icon set's own
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,
}

impl Args {
    /// Copies every flag that was given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(background) = self.background {
            config.background = background;
        }
        if let Some(display) = self.display {
            config.display = display;
        }
        if let Some(layer) = self.layer {
            config.layer = layer;
        }
        if let Some(x) = self.x_offset {
            config.x_offset = x;
        }
        if let Some(y) = self.y_offset {
            config.y_offset = y;
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        if self.no_interactive {
            config.interactive = false;
        }
        if let Some(size) = self.icon_size {
            config.icon_size = IconSize::from_index(size);
        }
        if self.animate {
            config.animate = true;
        }
        if self.pipe {
            config.pipe = true;
        } else if self.no_pipe {
            config.pipe = false;
        }
        if self.headless {
            config.headless = true;
        }
        if let Some(image) = &self.image {
            config.initial_image = Some(image.clone());
        }
    }
}

fn parse_color(value: &str) -> Result<Rgba16, String> {
    Rgba16::parse(value).ok_or_else(|| format!("'{value}' is not a 16 bit hex colour"))
}

pub fn parse_args() -> Args {
    Args::parse()
}

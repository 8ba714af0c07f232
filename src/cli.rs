use clap::Parser;
use std::path::PathBuf;
use vrplayer_config::ProjectionAngle;

#[derive(Parser, Debug)]
#[command(
    name = "vrplayer",
    version,
    about = "Head-tracked 180/360 degree stereoscopic video player"
)]
pub struct Cli {
    /// Video covers the full sphere
    #[arg(long = "360", conflicts_with = "half_sphere")]
    pub full_sphere: bool,

    /// Video covers the front hemisphere (default)
    #[arg(long = "180")]
    pub half_sphere: bool,

    /// Video file to play
    pub video: PathBuf,
}

impl Cli {
    /// Parse the process arguments. Usage errors exit with status 1;
    /// `--help` and `--version` exit with status 0.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if e.use_stderr() => {
                let _ = e.print();
                std::process::exit(1);
            }
            Err(e) => e.exit(),
        }
    }

    pub fn projection_angle(&self) -> ProjectionAngle {
        if self.full_sphere {
            ProjectionAngle::Full
        } else {
            ProjectionAngle::Half
        }
    }
}

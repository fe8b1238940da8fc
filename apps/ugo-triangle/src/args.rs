//! Command line parsing.

use anyhow::{anyhow, bail, Context};
use ugo_app::{AppConfig, ShaderPaths};

/// What the command line asked for.
#[derive(Debug)]
pub enum Command {
    Run(AppConfig),
    Help,
}

/// Parse arguments (without the program name) on top of the default config.
pub fn parse<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut config = AppConfig::default();
    let mut clear_only = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--validation" => config.validation = true,
            "--no-validation" => config.validation = false,
            "--clear-only" => clear_only = true,
            "--shader-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| anyhow!("--shader-dir requires a directory"))?;
                config.shaders = Some(ShaderPaths::in_dir(dir));
            }
            "--size" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--size requires <W>x<H>"))?;
                let (width, height) = parse_size(&value)?;
                config = config.with_size(width, height);
            }
            other => bail!("Unknown argument: {other}"),
        }
    }

    if clear_only {
        config.shaders = None;
    }

    Ok(Command::Run(config))
}

/// Parse `<W>x<H>` with both sides non-zero.
fn parse_size(value: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("Invalid size {value:?}, expected <W>x<H>"))?;
    let width: u32 = w.parse().with_context(|| format!("Invalid width {w:?}"))?;
    let height: u32 = h.parse().with_context(|| format!("Invalid height {h:?}"))?;
    if width == 0 || height == 0 {
        bail!("Window size must be non-zero, got {width}x{height}");
    }
    Ok((width, height))
}

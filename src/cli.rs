use clap::{Parser, ValueEnum};
use mipmap_atlas::{Error, FilterMode};
use std::path::{Path, PathBuf};

/// Input used when `--input` is not given.
pub const DEFAULT_INPUT: &str = "data/source.png";

/// Where the primitives run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// wgpu render passes and texture copies
    Device,
    /// `image::imageops` on the CPU
    Host,
}

/// Build a mipmap chain for each input image and save it packed next to the
/// source in a `W + W/2` by `H` atlas.
#[derive(Debug, Parser)]
#[command(name = "mipmap-atlas", version)]
pub struct Args {
    /// Comma separated input images
    #[arg(short = 'i', long = "input", visible_alias = "i", value_delimiter = ',')]
    pub input: Vec<String>,

    /// Comma separated output images, matched to the inputs by position.
    /// Defaults to `<input stem>_mipmap.png`
    #[arg(short = 'o', long = "output", visible_alias = "o", value_delimiter = ',')]
    pub output: Vec<String>,

    /// Resampling filter: 1 nearest, 2 cubic, anything else linear
    #[arg(
        short = 'm',
        long = "mode",
        visible_alias = "m",
        allow_hyphen_values = true
    )]
    pub mode: Option<String>,

    #[arg(long, value_enum, default_value_t = Backend::Device)]
    pub backend: Backend,

    /// Also save every mip level as `<output stem>_level<k>.png`
    #[arg(long)]
    pub dump_levels: bool,

    /// Also save a grayscale copy of the atlas as `<output stem>.pgm`
    #[arg(long)]
    pub gray: bool,
}

/// One input image and where its atlas goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Job {
    pub fn level_output(&self, level: usize) -> PathBuf {
        self.output
            .with_file_name(format!("{}_level{}.png", stem(&self.output), level))
    }

    pub fn gray_output(&self) -> PathBuf {
        self.output.with_extension("pgm")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub jobs: Vec<Job>,
    pub filter: FilterMode,
    pub backend: Backend,
    pub dump_levels: bool,
    pub gray: bool,
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// `<dir>/<stem>_mipmap.png` for an input `<dir>/<stem>.<ext>`.
pub fn default_output(input: &Path) -> PathBuf {
    input.with_file_name(format!("{}_mipmap.png", stem(input)))
}

impl Config {
    /// Applies defaults and pairs inputs with outputs.
    pub fn resolve(args: Args) -> Result<Self, Error> {
        let inputs: Vec<PathBuf> = if args.input.is_empty() {
            let default = PathBuf::from(DEFAULT_INPUT);
            if !default.is_file() {
                log::error!("no `--input` given and `{}` does not exist", DEFAULT_INPUT);
                return Err(Error::InputResolution);
            }
            vec![default]
        } else {
            args.input
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect()
        };
        if inputs.is_empty() {
            return Err(Error::InputResolution);
        }
        if args.output.len() > inputs.len() {
            log::warn!(
                "{} outputs given for {} inputs, ignoring the extra outputs",
                args.output.len(),
                inputs.len()
            );
        }

        let filter = match args.mode.as_deref() {
            None => FilterMode::default(),
            Some(mode) => {
                let filter = FilterMode::from_mode_arg(mode);
                if !matches!(mode.trim(), "1" | "2") {
                    log::info!("mode `{}` selects the default linear filter", mode);
                }
                filter
            }
        };

        let jobs = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| {
                let output = args
                    .output
                    .get(i)
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| default_output(&input));
                Job { input, output }
            })
            .collect();

        Ok(Config {
            jobs,
            filter,
            backend: args.backend,
            dump_levels: args.dump_levels,
            gray: args.gray,
        })
    }
}

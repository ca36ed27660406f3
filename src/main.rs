mod cli;

use clap::Parser;
use cli::{Args, Backend, Config, Job};
use log::LevelFilter;
use mipmap_atlas::{
    codec, CopyPrimitive, DeviceContext, Error, GenerationError, HostContext,
    MipmapAtlasGenerator, ResizePrimitive, Stage,
};
#[cfg(feature = "debug")]
use renderdoc::{RenderDoc, V110};
use std::process::ExitCode;

fn init_logger() {
    let mut builder = env_logger::Builder::new();
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter(None, LevelFilter::Warn);
        builder.filter(Some("mipmap_atlas"), LevelFilter::Info);
    }
    builder.init();
}

/// The stage a failed job did not reach, and why.
type JobError = (Stage, Error);

fn generation_stage(error: &Error) -> Stage {
    match error {
        Error::Generation(GenerationError::Resize { .. }) => Stage::ChainBuilt,
        _ => Stage::Composed,
    }
}

fn process<C>(
    context: &C,
    generator: &MipmapAtlasGenerator,
    job: &Job,
    config: &Config,
) -> Result<(), JobError>
where
    C: ResizePrimitive + CopyPrimitive,
{
    let source = codec::load_rgba(&job.input).map_err(|e| (Stage::Loaded, e))?;
    let generated = generator
        .generate(context, &source)
        .map_err(|e| (generation_stage(&e), e))?;

    let save = |res: Result<(), Error>| res.map_err(|e| (Stage::Saved, e));
    save(codec::save_png(&job.output, &generated.image))?;
    for (level, image) in generated.levels.iter().enumerate() {
        save(codec::save_png(&job.level_output(level), image))?;
    }
    if config.gray {
        save(codec::save_pgm(
            &job.gray_output(),
            &codec::to_gray(&generated.image),
        ))?;
    }
    log::info!(
        "{} `{}` ({}x{})",
        Stage::Saved,
        job.output.display(),
        generated.image.width(),
        generated.image.height()
    );
    Ok(())
}

/// Processes every job in order. The first failure abandons the remaining jobs.
fn run<C>(context: &C, config: &Config) -> Result<(), Error>
where
    C: ResizePrimitive + CopyPrimitive,
{
    let generator = MipmapAtlasGenerator::new(config.filter).keep_levels(config.dump_levels);
    log::info!("using {} filtering", generator.filter());
    let total = config.jobs.len();
    for (index, job) in config.jobs.iter().enumerate() {
        log::info!(
            "[{}/{}] `{}` -> `{}`",
            index + 1,
            total,
            job.input.display(),
            job.output.display()
        );
        if let Err((stage, e)) = process(context, &generator, job, config) {
            log::error!(
                "failed to {} `{}`: {} ({} remaining image(s) skipped)",
                stage.action(),
                job.input.display(),
                e,
                total - index - 1
            );
            return Err(e);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logger();

    let config = match Config::resolve(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    #[cfg(feature = "debug")]
    let mut rd: Option<RenderDoc<V110>> = match RenderDoc::new() {
        Ok(rd) => Some(rd),
        Err(e) => {
            log::warn!("unable to connect to RenderDoc: {}", e);
            None
        }
    };
    #[cfg(feature = "debug")]
    if let Some(rd) = rd.as_mut() {
        rd.start_frame_capture(std::ptr::null(), std::ptr::null());
    }

    // job failures are logged by `run`
    let result = match config.backend {
        Backend::Device => match futures::executor::block_on(DeviceContext::new()) {
            Ok(context) => run(&context, &config),
            Err(e) => {
                log::error!("{}", e);
                Err(e)
            }
        },
        Backend::Host => run(&HostContext::new(), &config),
    };

    #[cfg(feature = "debug")]
    if let Some(rd) = rd.as_mut() {
        rd.end_frame_capture(std::ptr::null(), std::ptr::null());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mipmap_atlas::{util::*, FilterMode};
    use image::RgbaImage;
    use std::path::PathBuf;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("mipmap-atlas-driver-{}", std::process::id()))
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_source(path: &std::path::Path, width: u32, height: u32) {
        let image = RgbaImage::from_raw(width, height, checkerboard_rgba8(width, height, 2)).unwrap();
        codec::save_png(path, &image).unwrap();
    }

    fn config(jobs: Vec<Job>) -> Config {
        Config {
            jobs,
            filter: FilterMode::Linear,
            backend: Backend::Host,
            dump_levels: false,
            gray: false,
        }
    }

    #[test]
    fn first_failure_abandons_the_batch() {
        init();
        let dir = scratch("abandon");
        let valid = dir.join("valid.png");
        write_source(&valid, 8, 8);
        let config = config(vec![
            Job {
                input: dir.join("missing.png"),
                output: dir.join("missing_mipmap.png"),
            },
            Job {
                input: valid,
                output: dir.join("valid_mipmap.png"),
            },
        ]);
        let res = run(&HostContext::new(), &config);
        assert!(matches!(res, Err(Error::ImageLoad { .. })));
        assert!(!dir.join("missing_mipmap.png").exists());
        assert!(!dir.join("valid_mipmap.png").exists());
    }

    #[test]
    fn batch_writes_every_output() {
        init();
        let dir = scratch("batch");
        let mut jobs = Vec::new();
        for (name, width, height) in &[("a", 8, 8), ("b", 6, 4)] {
            let input = dir.join(format!("{}.png", name));
            write_source(&input, *width, *height);
            jobs.push(Job {
                output: cli::default_output(&input),
                input,
            });
        }
        run(&HostContext::new(), &config(jobs)).unwrap();
        let a = codec::load_rgba(&dir.join("a_mipmap.png")).unwrap();
        assert_eq!((a.width(), a.height()), (12, 8));
        let b = codec::load_rgba(&dir.join("b_mipmap.png")).unwrap();
        assert_eq!((b.width(), b.height()), (9, 4));
    }

    #[test]
    fn levels_and_gray_outputs() {
        init();
        let dir = scratch("extras");
        let input = dir.join("cat.png");
        write_source(&input, 8, 8);
        let job = Job {
            output: dir.join("cat_atlas.png"),
            input,
        };
        let mut config = config(vec![job.clone()]);
        config.dump_levels = true;
        config.gray = true;
        let generator = MipmapAtlasGenerator::new(config.filter).keep_levels(true);
        process(&HostContext::new(), &generator, &job, &config).unwrap();

        for (level, size) in [4, 2, 1].iter().enumerate() {
            let image = codec::load_rgba(&dir.join(format!("cat_atlas_level{}.png", level))).unwrap();
            assert_eq!((image.width(), image.height()), (*size, *size));
        }
        assert!(!dir.join("cat_atlas_level3.png").exists());

        let bytes = std::fs::read(dir.join("cat_atlas.pgm")).unwrap();
        assert!(bytes.starts_with(b"P5"));
        let gray = codec::load_gray(&dir.join("cat_atlas.pgm")).unwrap();
        assert_eq!(gray.dimensions(), (12, 8));
    }

    #[test]
    fn failures_report_their_stage() {
        init();
        let dir = scratch("stages");
        let generator = MipmapAtlasGenerator::default();
        let missing = Job {
            input: dir.join("missing.png"),
            output: dir.join("out.png"),
        };
        let config = config(vec![]);
        match process(&HostContext::new(), &generator, &missing, &config) {
            Err((stage, Error::ImageLoad { .. })) => assert_eq!(stage, Stage::Loaded),
            other => panic!("unexpected {:?}", other),
        }

        let input = dir.join("ok.png");
        write_source(&input, 4, 4);
        let unwritable = Job {
            input,
            output: dir.join("no-such-dir").join("out.png"),
        };
        match process(&HostContext::new(), &generator, &unwritable, &config) {
            Err((stage, Error::OutputWrite { .. })) => assert_eq!(stage, Stage::Saved),
            other => panic!("unexpected {:?}", other),
        }

        let resize = Error::Generation(GenerationError::Resize {
            level: 2,
            reason: "lost".to_string(),
        });
        assert_eq!(generation_stage(&resize), Stage::ChainBuilt);
        assert_eq!(Stage::Loaded.action(), "load");
    }
}

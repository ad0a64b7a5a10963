use anyhow::Context;
use burn::backend::NdArray;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use burn::tensor::Distribution;
use clap::Parser;
use segnets::models::SegmentationModelConfig;
use segnets::models::prefabs::PREFAB_SEGMENTATION_MAP;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// $ --prefab=uresnet16-mono --batch-size=2 --height=192 --width=224 --log-level=trace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Model prefab name; ignored when `--config` is set.
    #[arg(long, default_value = "uresnet16-mono")]
    prefab: String,

    /// Load the model config from a JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of output classes.
    #[arg(long)]
    classes: Option<usize>,

    /// Override the number of input channels.
    #[arg(long)]
    channels: Option<usize>,

    /// Write the resolved model config to a JSON file.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Batch size of the probe input.
    #[arg(short, long, default_value_t = 2)]
    batch_size: usize,

    /// Height of the probe input.
    #[arg(long, default_value_t = 192)]
    height: usize,

    /// Width of the probe input.
    #[arg(long, default_value_t = 224)]
    width: usize,

    /// List the known prefabs and exit.
    #[arg(long)]
    list_prefabs: bool,

    /// Log level; `trace` shows every stage shape.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn setup_tracing(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

/// Resolve the model config from the args.
fn resolve_config(args: &Args) -> anyhow::Result<SegmentationModelConfig> {
    let mut config = match &args.config {
        Some(path) => SegmentationModelConfig::load(path)
            .map_err(|err| anyhow::anyhow!("Loading config {}: {err:?}", path.display()))?,
        None => PREFAB_SEGMENTATION_MAP
            .try_lookup_prefab(&args.prefab)?
            .new_config(),
    };

    if let Some(classes) = args.classes {
        config = config.with_num_classes(classes);
    }
    if let Some(channels) = args.channels {
        config = config.with_input_channels(channels);
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(args.log_level)?;

    if args.list_prefabs {
        for prefab in PREFAB_SEGMENTATION_MAP.items {
            println!("{:<16} {}", prefab.name, prefab.description);
        }
        return Ok(());
    }

    type B = NdArray<f32>;
    let device = Default::default();
    backend_main::<B>(&args, &device)
}

/// Build the model and run one forward pass on random input.
pub fn backend_main<B: Backend>(
    args: &Args,
    device: &B::Device,
) -> anyhow::Result<()> {
    let config = resolve_config(args)?;
    tracing::info!(family = config.family(), "config: {config}");

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("Saving config {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved config");
    }

    let model = config.init::<B>(device);
    tracing::info!(num_params = model.num_params(), "model ready");

    let input: Tensor<B, 4> = Tensor::random(
        [
            args.batch_size,
            model.input_channels(),
            args.height,
            args.width,
        ],
        Distribution::Normal(0.0, 1.0),
        device,
    );
    tracing::info!(dims = ?input.dims(), "input");

    let output = model.forward(input);
    tracing::info!(dims = ?output.dims(), "output");

    Ok(())
}

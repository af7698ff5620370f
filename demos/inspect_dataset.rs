//! Example: Inspect a WRF dataset described by a JSON descriptor
//!
//! Run with: cargo run --example inspect_dataset -- path/to/dataset.json [timestep]
//!
//! Without arguments a small synthetic dataset is written to a temp directory
//! and inspected instead.

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use wrf_volume::{
    utils::format_bytes, ChannelInfo, DatasetDescriptor, GridGeometry, SlabWriter, VolumeKey,
};

fn synthetic(dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let geometry = GridGeometry::new(32, 24, 10, 4, 2).with_fields_2d(1);
    let descriptor = DatasetDescriptor::new("synthetic.bin", geometry)
        .with_channel(ChannelInfo::new("T", 0, 250.0, 310.0))
        .with_channel(ChannelInfo::new("QVAPOR", 1, 0.0, 0.02));

    let mut writer = SlabWriter::create(
        dir.join("synthetic.bin"),
        geometry,
        wrf_volume::StrideLayout::Packed,
    )?;
    for t in 0..geometry.num_timesteps {
        for c in 0..geometry.num_channels {
            let range = descriptor.channels[c].range();
            let data: Vec<f32> = (0..geometry.volume_len())
                .map(|i| {
                    let phase = (i + t * 97) as f64 / geometry.volume_len() as f64;
                    (range.min + range.span() * phase.fract()) as f32
                })
                .collect();
            writer.write_volume(t, c, &data)?;
        }
    }
    writer.write_field_2d(0, &vec![120.0; geometry.slice_len()])?;
    writer.finish()?;

    let mut descriptor = descriptor;
    descriptor.reserve_2d_fields_per_timestep = Some(false);
    let path = dir.join("synthetic.json");
    descriptor.save(&path)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let temp = tempfile::TempDir::new()?;
    let descriptor_path = match args.first() {
        Some(path) => path.into(),
        None => synthetic(temp.path())?,
    };
    let timestep: usize = match args.get(1) {
        Some(t) => t.parse().context("timestep must be an integer")?,
        None => 0,
    };

    let descriptor = DatasetDescriptor::from_path(&descriptor_path)
        .with_context(|| format!("loading {}", descriptor_path.display()))?;
    let layout = descriptor.layout()?;

    println!("WRF dataset: {}", descriptor.data_path().display());
    println!("  {}", layout.summary());
    println!(
        "  Expected file size: {}",
        format_bytes(layout.expected_file_len()?)
    );
    println!();

    let loader = descriptor.loader();
    let volumes = loader
        .load_timestep(timestep)
        .await
        .with_context(|| format!("reading timestep {}", timestep))?;

    println!("Timestep {}:", timestep);
    for volume in &volumes {
        let VolumeKey { channel, .. } = volume.key();
        let name = descriptor
            .channel(channel)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        match volume.value_range() {
            Some(range) => println!(
                "  channel {} ({}): [{:.4}, {:.4}]",
                channel, name, range.min, range.max
            ),
            None => println!("  channel {} ({}): no finite samples", channel, name),
        }
    }

    if descriptor.num_fields_2d > 0 {
        let field = loader.load_field_2d(0).await?;
        if let Some(range) = field.value_range() {
            println!("  2D field 0: [{:.4}, {:.4}]", range.min, range.max);
        }
    }

    let stats = loader.cache_stats();
    println!();
    println!("Cache: {} / {} volumes", stats.entries, stats.capacity);

    Ok(())
}

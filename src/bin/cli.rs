use std::path::PathBuf;

use clap::Parser;
use hexmapgen::{World, WorldGenerationParams};
use tracing_subscriber::EnvFilter;

/// Генератор гексагональных карт: суша, высоты, сток и реки
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Сид вместо указанного в конфигурации
    #[arg(short, long)]
    seed: Option<u64>,

    /// Маска суши вместо указанной в конфигурации
    #[arg(short, long)]
    mask: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let mut params = WorldGenerationParams::from_toml_file(&cli.config)?;
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(mask) = cli.mask {
        params.land.mask = Some(mask);
    }

    println!(
        "Генерация мира (размер: {}×{}, сид: {})...",
        params.width, params.height, params.seed
    );
    let world = World::generate(&params)?;
    let summary = world.summary();

    println!("Гексов: {} (суша: {})", summary.hexes, summary.land_hexes);
    println!(
        "Участков суши: {} (с открытым берегом: {})",
        summary.regions, summary.open_coastlines
    );
    println!(
        "Стоков: {}, устьев: {}, бассейнов: {}, рек: {}",
        summary.sinks, summary.outflows, summary.basins, summary.rivers
    );

    println!("\nГотово!");
    Ok(())
}

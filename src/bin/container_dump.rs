use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use device_qc::core::Cell;
use device_qc::store::Container;
use std::path::PathBuf;

fn render(cell: &Cell) -> String {
    match cell {
        Cell::Null => "-".to_string(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => format!("{:.6e}", v),
        Cell::Text(s) => s.clone(),
        Cell::Timestamp(ts) => ts.to_rfc3339(),
    }
}

/// List the entries of a DQCC container (`.dqc`, written by `device_qc`;
/// not HDF5), or print one of them as a table.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Container file
    #[arg(value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// Entry path to print, e.g. `channel_impedances`
    entry: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let container = Container::open(&cli.file)
        .with_context(|| format!("Failed to open {:?}", cli.file))?;

    let Some(entry) = cli.entry else {
        for key in container.keys() {
            let table = container.get(key)?;
            println!(
                "{:<40} {:>6} rows  data columns: {}",
                key,
                table.len(),
                container.data_columns(key)?.join(", ")
            );
        }
        return Ok(());
    };

    let table = container.get(&entry)?;
    let index_name = table.index_name().unwrap_or("index");
    println!("{}\t{}", index_name, table.column_names().join("\t"));
    for i in 0..table.len() {
        let cells: Vec<String> = table
            .row(i)
            .unwrap_or_default()
            .into_iter()
            .map(render)
            .collect();
        println!("{}\t{}", render(&table.index()[i]), cells.join("\t"));
    }
    Ok(())
}

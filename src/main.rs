use std::path::Path;

use suiterun::symbols::SourceIndex;
use suiterun::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("order") => match (args.get(2), args.get(3)) {
            (Some(file), Some(type_name)) => print_order(Path::new(file), type_name),
            _ => usage(),
        },
        Some("settings") => {
            let settings = suiterun::config::resolve(args.get(2).map(Path::new));
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        _ => usage(),
    }
}

/// Print `type_name`'s methods in declaration order.
fn print_order(file: &Path, type_name: &str) -> Result<()> {
    let index = SourceIndex::load(file).map_err(|e| {
        tracing::debug!("Failed to read {}: {}", file.display(), e);
        suiterun::Error::SourceUnavailable { file: file.display().to_string() }
    })?;

    for method in index.methods_of(type_name) {
        let visibility = if method.is_pub { "" } else { " (private)" };
        println!("{} {}{}", method.position, method.name, visibility);
    }
    Ok(())
}

fn usage() -> Result<()> {
    eprintln!("Usage: suiterun <order <file.rs> <Type>|settings [project_root]>");
    std::process::exit(2);
}

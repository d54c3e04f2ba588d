//! Standalone binary to validate endpoint descriptor files.
//! Used by CI to ensure custom descriptor YAML is accepted by the registry.
//!
//! Usage:
//!   validate_descriptors [--dump] [FILE.yaml ...]
//!
//! Without file arguments, every `*.yaml`/`*.yml` under `STABILITY_DESCRIPTOR_DIR`
//! is checked. `--dump` prints the built-in catalog as YAML and exits.

use stability_rs::Registry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn descriptor_files(args: &[String]) -> std::io::Result<Vec<PathBuf>> {
    if !args.is_empty() {
        return Ok(args.iter().map(PathBuf::from).collect());
    }
    let Ok(dir) = std::env::var("STABILITY_DESCRIPTOR_DIR") else {
        return Ok(Vec::new());
    };
    let mut files = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(pos) = args.iter().position(|a| a == "--dump") {
        args.remove(pos);
        print!("{}", Registry::builtin().to_yaml_string()?);
        return Ok(());
    }

    println!("=== Built-in Catalog ===");
    let mut errors = Vec::new();
    for d in Registry::builtin().descriptors() {
        print!("Validating {}... ", d.id);
        match stability_rs::registry::validate_descriptor(d) {
            Ok(()) => println!("✅"),
            Err(e) => {
                println!("❌");
                errors.push(format!("  builtin/{}: {}", d.id, e));
            }
        }
    }

    let files = descriptor_files(&args)?;
    if files.is_empty() {
        println!("\nNo descriptor files given (pass paths or set STABILITY_DESCRIPTOR_DIR)");
    } else {
        println!("\n=== Descriptor Files ===");
    }
    for path in &files {
        let name = path.display().to_string();
        print!("Validating {}... ", name);
        match std::fs::read_to_string(path) {
            Ok(content) => match Registry::from_yaml_str(&content) {
                Ok(registry) => {
                    println!("✅ ({} endpoints)", registry.len());
                    let overridden: Vec<&str> = registry
                        .ids()
                        .filter(|id| Registry::builtin().contains(id))
                        .collect();
                    if !overridden.is_empty() {
                        println!("    overrides built-in: {}", overridden.join(", "));
                    }
                }
                Err(e) => {
                    println!("❌");
                    errors.push(format!("  {}: {}", name, e));
                }
            },
            Err(e) => {
                println!("❌");
                errors.push(format!("  {}: Read error: {}", name, e));
            }
        }
    }

    println!("\n=== Summary ===");
    if errors.is_empty() {
        println!("✅ All descriptors are valid!");
        Ok(())
    } else {
        println!("❌ Found {} validation error(s):\n", errors.len());
        for err in &errors {
            println!("{}", err);
        }
        std::process::exit(1);
    }
}

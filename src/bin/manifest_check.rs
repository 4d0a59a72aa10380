//! Offline manifest checks.
//!
//! ```text
//! pinsync-check <manifest>...          decode every service and verify the file round-trips
//! pinsync-check diff <old> <new>       compare two manifests and print the report
//! ```

use anyhow::{bail, Context, Result};
use pinsync::logging::{self, Profile};
use pinsync::manifest::ManifestDocument;
use pinsync::types::{PlatformSnapshot, Release};
use std::io::IsTerminal;
use std::path::Path;

async fn read_manifest(path: &Path) -> Result<(Vec<u8>, ManifestDocument)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc = ManifestDocument::parse(&bytes)
        .with_context(|| format!("{} is not a valid manifest", path.display()))?;
    Ok((bytes, doc))
}

async fn check(paths: &[String]) -> Result<()> {
    let mut failures = Vec::new();
    for path in paths {
        let path = Path::new(path);
        print!("Checking {}... ", path.display());
        let outcome = async {
            let (bytes, doc) = read_manifest(path).await?;
            let services = doc.load()?;
            let round_trip = doc.content() == bytes;
            Ok::<_, anyhow::Error>((services.len(), round_trip))
        }
        .await;
        match outcome {
            Ok((count, true)) => println!("✅ {} services", count),
            Ok((count, false)) => println!("✅ {} services (layout will be normalised on write)", count),
            Err(e) => {
                println!("❌");
                failures.push(format!("  {}: {:#}", path.display(), e));
            }
        }
    }

    if !failures.is_empty() {
        eprintln!("\n{} manifest(s) failed:", failures.len());
        for failure in &failures {
            eprintln!("{}", failure);
        }
        bail!("manifest check failed");
    }
    Ok(())
}

async fn diff(old: &str, new: &str) -> Result<()> {
    let mut snapshots = Vec::with_capacity(2);
    for path in [old, new] {
        let (_, doc) = read_manifest(Path::new(path)).await?;
        let services = doc
            .load()
            .with_context(|| format!("failed to decode {}", path))?;
        snapshots.push(PlatformSnapshot::new(Release::new(path), services));
    }
    let result = pinsync::compare(&snapshots[0], &snapshots[1]);
    print!("{}", result.render(std::io::stdout().is_terminal()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(Profile::Compact);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("-h") | Some("--help") => {
            println!("usage: pinsync-check <manifest>...");
            println!("       pinsync-check diff <old> <new>");
            Ok(())
        }
        Some("diff") => match &args[1..] {
            [old, new] => diff(old, new).await,
            _ => bail!("diff expects exactly two manifest paths"),
        },
        Some(_) => check(&args).await,
    }
}

//! Concise example: run commands concurrently on a pool of stay-open exiftool processes.
use exiftool_exec::{ExifTool, ExifToolBuilder, ExifToolConfig, ExifToolError};
use std::env;
use std::sync::Arc;
use std::thread;

fn main() -> Result<(), ExifToolError> {
    // EXIFTOOL_PATH and EXIFTOOL_CLEANUP_DELAY override the defaults.
    let mut config = ExifToolConfig::from_env()?;
    config.pool_size = 4;

    let files: Vec<String> = env::args().skip(1).collect();
    if files.is_empty() {
        println!("Usage: pool <file>...");
        return Ok(());
    }

    let exiftool: Arc<ExifTool> = Arc::new(ExifToolBuilder::from_config(config).build()?);
    println!("Using exiftool {} at '{}'", exiftool.version(), exiftool.path());

    let handles: Vec<_> = files
        .into_iter()
        .map(|file| {
            let exiftool = Arc::clone(&exiftool);
            thread::spawn(move || {
                let lines = exiftool.execute_lines(&["-S", "-FileName", "-ImageSize", file.as_str()]);
                (file, lines)
            })
        })
        .collect();

    println!("\n--- Results ---");
    for handle in handles {
        match handle.join() {
            Ok((file, Ok(lines))) => println!("{}: {}", file, lines.join(", ")),
            Ok((file, Err(e))) => eprintln!("{}: {}", file, e),
            Err(_) => eprintln!("Worker thread panicked"),
        }
    }

    // Processes are shut down when the last reference is dropped.
    Ok(())
}

//! Unlock a vault and print its folders and items.
//!
//! Run with: `cargo run --example list_items -- <path/to/vault.opvault> <password>`
//!
//! Set `RUST_LOG=opvault=debug` to see the decode steps.

use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(path), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: list_items <vault> <password>");
        std::process::exit(2);
    };

    // 1. Open and unlock
    let vault = opvault::open(&path)?;
    let info = vault.profile_info();
    println!("Profile {} ({} iterations)", info.profile_name, info.iterations);
    vault.unlock(&password)?;

    // 2. Folders
    let folders = vault.folders()?;
    println!("{} folder(s)", folders.len());
    for folder in folders.values() {
        let kind = if folder.is_smart() { " (smart)" } else { "" };
        println!("  {}{}", folder.title().unwrap_or("<untitled>"), kind);
    }

    // 3. Items, with attachment sizes
    let items = vault.items()?;
    println!("{} item(s)", items.len());
    for item in items.values().filter(|i| !i.is_trashed()) {
        println!(
            "  [{}] {} {}",
            item.category(),
            item.title().unwrap_or("<untitled>"),
            item.username().unwrap_or("")
        );
        for attachment in item.attachments() {
            let data = attachment.data()?;
            println!(
                "      {} ({} bytes)",
                attachment.filename().unwrap_or("<unnamed>"),
                data.len()
            );
        }
    }

    vault.lock();
    Ok(())
}

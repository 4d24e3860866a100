//! Enumerate all CrayOn bridges on the system
//!
//! This example demonstrates runtime bridge discovery through sysfs.

use crayon_driver::{usb_ids, BridgeManager, Result};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("crayon_driver=debug")
        .init();

    println!("CrayOn bridge enumeration ({})\n", usb_ids::lsusb_filter());

    let manager = BridgeManager::discover()?;

    println!("Found {} bridge(s):\n", manager.bridge_count());

    for bridge in manager.bridges() {
        println!("Bridge {:03}/{:03}:", bridge.bus, bridge.address);
        println!("   Product:    {}", bridge.product);
        println!("   Node:       {}", bridge.path().display());
        println!();
    }

    println!("✅ Discovery complete");

    Ok(())
}

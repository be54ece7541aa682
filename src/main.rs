use nusb::list_devices;
use sunnybeam_lib::constants::{PID, VID};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Listing connected USB devices...");

    let mut count = 0;
    let mut beams = 0;
    for device_info in list_devices()? {
        count += 1;
        let is_beam = device_info.vendor_id() == VID && device_info.product_id() == PID;
        if is_beam {
            beams += 1;
        }

        info!(
            "Device #{}: VID: {:#06x}, PID: {:#06x}, Bus: {:03}, Address: {:03}{}",
            count,
            device_info.vendor_id(),
            device_info.product_id(),
            device_info.bus_number(),
            device_info.device_address(),
            if is_beam { "  <-- Sunny Beam" } else { "" }
        );
        info!(
            "  Manufacturer: {}",
            device_info.manufacturer_string().unwrap_or("<Not available>")
        );
        info!("  Product: {}", device_info.product_string().unwrap_or("<Not available>"));

        match device_info.serial_number() {
            Some(serial) if is_beam && serial.trim().parse::<u32>().is_err() => {
                warn!("  Serial: {} (not numeric, the handshake will fail)", serial)
            }
            Some(serial) => info!("  Serial: {}", serial),
            None => info!("  Serial: <Not available>"),
        }
    }

    if count == 0 {
        info!("No USB devices found.");
    } else if beams == 0 {
        info!("No Sunny Beam ({:04x}:{:04x}) among {} devices.", VID, PID, count);
    } else {
        info!("{} Sunny Beam(s) found.", beams);
    }

    Ok(())
}

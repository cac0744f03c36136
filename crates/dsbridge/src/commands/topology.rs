//! `dsbridge topology`: devices with their resolved function blocks.

use dsbridge_core::{Bridge, DeviceType, Topology};

use crate::error::CliError;

pub async fn handle(bridge: &Bridge) -> Result<(), CliError> {
    bridge.connect().await?;
    let snapshot = bridge.registry().snapshot();
    bridge.disconnect().await;

    print!("{}", render(&*snapshot?));
    Ok(())
}

fn render(topology: &Topology) -> String {
    let mut out = format!(
        "{} ({}): {} devices, {} zones\n",
        topology.name(),
        topology.apartment_id(),
        topology.devices().len(),
        topology.zones().len()
    );

    for device in topology.devices() {
        let line = match topology.function_block_for_device(&device.id) {
            Ok(block) => {
                let props = block.properties();
                let mut line = format!(
                    "{}  {:<24} {:<8} {}",
                    device.id,
                    device.attributes.name,
                    type_label(block.device_type()),
                    block.attributes.technical_name
                );
                if props.dimmable {
                    line.push_str("  dimmable");
                }
                if let Some(channel) = props.position_channel {
                    line.push_str(&format!("  position={channel}"));
                }
                if let Some(channel) = props.tilt_channel {
                    line.push_str(&format!("  tilt={channel}"));
                }
                line
            }
            Err(e) => format!("{}  {:<24} error: {e}", device.id, device.attributes.name),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn type_label(kind: DeviceType) -> &'static str {
    match kind {
        DeviceType::Light => "light",
        DeviceType::Blind => "blind",
        DeviceType::Joker => "joker",
        DeviceType::Unknown => "unknown",
    }
}

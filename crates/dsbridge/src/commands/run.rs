//! `dsbridge run`: stream controller events and output changes into the log until Ctrl-C.

use std::sync::Arc;

use tracing::info;

use dsbridge_api::HandlerError;
use dsbridge_api::model::Event;
use dsbridge_core::{Bridge, EventKind};

use crate::cli::RunArgs;
use crate::error::CliError;

fn default_kinds() -> Vec<EventKind> {
    vec![EventKind::CallScene, EventKind::ButtonClick]
}

pub async fn handle(bridge: &Bridge, args: RunArgs) -> Result<(), CliError> {
    let kinds = if args.kinds.is_empty() {
        default_kinds()
    } else {
        args.kinds
    };

    bridge.connect().await?;

    for kind in kinds {
        let handler_bridge = bridge.clone();
        let subscribed = bridge
            .subscribe(kind.clone(), move |event: Arc<Event>| {
                let bridge = handler_bridge.clone();
                async move {
                    log_event(&bridge, &event);
                    // scene calls move outputs; the registry logs changed targets
                    if event.name == EventKind::CallScene {
                        bridge.reload_status().await?;
                    }
                    Ok::<(), HandlerError>(())
                }
            })
            .await;

        if let Err(e) = subscribed {
            bridge.disconnect().await;
            return Err(e.into());
        }
        info!(%kind, "listening");
    }

    let stopped = tokio::signal::ctrl_c().await;
    info!("shutting down");
    bridge.disconnect().await;
    stopped?;
    Ok(())
}

fn log_event(bridge: &Bridge, event: &Event) {
    let zone_id = event.properties.zone_id.or(event.source.zone_id);
    let zone_name = zone_id.and_then(|id| {
        bridge
            .registry()
            .zone(&id.to_string())
            .ok()
            .map(|zone| zone.attributes.name)
    });

    info!(
        kind = %event.name,
        zone = ?zone_id,
        zone_name = zone_name.as_deref().unwrap_or("-"),
        scene = ?event.properties.scene_id,
        group = ?event.properties.group_id,
        dsid = event.source.dsid.as_deref().unwrap_or("-"),
        button = ?event.properties.button_index,
        click = ?event.properties.click_type,
        "event"
    );
}

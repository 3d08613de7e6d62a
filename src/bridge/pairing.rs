//! Bridge discovery and first-time pairing
//!
//! With both `bridge_ip` and `user` in the Glovelight file the bridge is used
//! directly. Otherwise the first bridge on the network is discovered, the
//! user is asked to press its link button, and the new credentials are
//! written back to the Glovelight file for the next session.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

use super::{BridgeError, HueBridge, LightBridge};
use crate::config::GlovelightConfig;

/// Device type registered with the bridge when pairing
pub const DEVICE_TYPE: &str = "glovelight#Glovelight User";

/// Return a client for the configured bridge, discovering and pairing if needed
///
/// `confirm` is read for one line after the link-button prompt; pass a
/// buffered stdin in production.
pub async fn establish<R>(
    config: &mut GlovelightConfig,
    discovery_url: &str,
    confirm: &mut R,
) -> Result<HueBridge, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    if config.has_bridge_credentials() {
        info!("Connecting to Hue bridge at: {}", config.bridge_ip);
        return Ok(HueBridge::new(config.bridge_ip.clone(), config.user.clone()));
    }

    let mut bridge = if config.bridge_ip.is_empty() {
        info!("Discovering Hue bridge...");
        let bridge = HueBridge::discover(discovery_url).await?;
        info!("Discovered Hue bridge: {}", bridge.host());
        config.bridge_ip = bridge.host().to_string();
        bridge
    } else {
        HueBridge::new(config.bridge_ip.clone(), "")
    };

    info!("Press the Link button on your Hue bridge then press Enter within 30 seconds.");
    let mut line = String::new();
    confirm
        .read_line(&mut line)
        .await
        .map_err(BridgeError::Pairing)?;

    config.user = bridge.create_user(DEVICE_TYPE).await?;
    info!("✅ Paired with Hue bridge at {}", config.bridge_ip);

    // Credentials survive a failed write for this session only
    if let Err(e) = config.save().await {
        error!(
            "Could not write Glovelight to {}: {}",
            config.location.display(),
            e
        );
    }

    Ok(bridge)
}

//! Camera discovery through the proxy's device list
//!
//! Listing and authorization live on the server side; this client only
//! reads `GET /api/devices` and turns each entry into something a viewer
//! can select and label.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::transport::ProxyClient;
use crate::types::CameraId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRelation {
    pub parent: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One camera-capable device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Fully-qualified device name, `enterprises/{project}/devices/{id}`
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub traits: serde_json::Value,
    #[serde(default)]
    pub parent_relations: Vec<ParentRelation>,
}

impl Camera {
    #[must_use]
    pub fn camera_id(&self) -> CameraId {
        CameraId::from_device_name(&self.name)
    }

    /// Room name from the first parent relation, else the identifier
    #[must_use]
    pub fn display_name(&self) -> String {
        self.parent_relations
            .first()
            .and_then(|r| r.display_name.as_deref())
            .filter(|n| !n.is_empty())
            .map_or_else(|| self.camera_id().to_string(), ToString::to_string)
    }

    /// Short device type, e.g. `CAMERA` for `sdm.devices.types.CAMERA`
    #[must_use]
    pub fn kind_label(&self) -> &str {
        self.device_type
            .rsplit('.')
            .next()
            .unwrap_or(&self.device_type)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicesResponse {
    #[serde(default)]
    cameras: Vec<Camera>,
    #[serde(default)]
    requires_partner_connection: bool,
    #[serde(default)]
    partner_connection_url: Option<String>,
}

/// Result of a device listing
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub cameras: Vec<Camera>,
    /// Set when the account has not linked any devices yet
    pub partner_connection_url: Option<String>,
}

impl DeviceList {
    #[must_use]
    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.iter().map(Camera::camera_id).collect()
    }
}

#[derive(Clone)]
pub struct DeviceDirectory {
    client: ProxyClient,
}

impl DeviceDirectory {
    #[must_use]
    pub const fn new(client: ProxyClient) -> Self {
        Self { client }
    }

    pub async fn list_cameras(&self) -> Result<DeviceList, TransportError> {
        let response: DevicesResponse = self.client.get_json(&["api", "devices"]).await?;

        if response.requires_partner_connection {
            tracing::warn!("No devices linked, partner connection required");
            return Ok(DeviceList {
                cameras: Vec::new(),
                partner_connection_url: response.partner_connection_url,
            });
        }

        tracing::debug!(count = response.cameras.len(), "Listed cameras");
        Ok(DeviceList {
            cameras: response.cameras,
            partner_connection_url: None,
        })
    }
}

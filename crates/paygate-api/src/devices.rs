// Device endpoints
//
// CRUD over `api/v1/device`. Reads take the wallet's invoice (read) key,
// mutations take the admin (write) key of the owning wallet.

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::client::{ApiClient, push_ids};
use crate::error::Error;
use crate::models::{ApiDevice, ConnectionStatus};

impl ApiClient {
    /// List every device visible to the key's user.
    ///
    /// `GET api/v1/device`
    pub async fn list_devices(&self, read_key: &SecretString) -> Result<Vec<ApiDevice>, Error> {
        let url = self.api_url("device")?;
        debug!("listing devices");
        self.get(url, Some(read_key)).await
    }

    /// Fetch a single device.
    ///
    /// `GET api/v1/device/{id}`
    pub async fn get_device(&self, read_key: &SecretString, id: &str) -> Result<ApiDevice, Error> {
        let url = self.api_url_with("device", &[id])?;
        debug!(id, "fetching device");
        self.get(url, Some(read_key)).await
    }

    /// Create a device. The server assigns the device id plus an id and
    /// LNURL for every switch in the payload.
    ///
    /// `POST api/v1/device`
    pub async fn create_device(
        &self,
        write_key: &SecretString,
        payload: &(impl Serialize + Sync),
    ) -> Result<ApiDevice, Error> {
        let url = self.api_url("device")?;
        debug!("creating device");
        self.post(url, write_key, payload).await
    }

    /// Update a device.
    ///
    /// `PUT api/v1/device/{id}`
    pub async fn update_device(
        &self,
        write_key: &SecretString,
        id: &str,
        payload: &(impl Serialize + Sync),
    ) -> Result<ApiDevice, Error> {
        let url = self.api_url_with("device", &[id])?;
        debug!(id, "updating device");
        self.put(url, write_key, payload).await
    }

    /// Delete a device.
    ///
    /// `DELETE api/v1/device/{id}`
    pub async fn delete_device(&self, write_key: &SecretString, id: &str) -> Result<(), Error> {
        let url = self.api_url_with("device", &[id])?;
        debug!(id, "deleting device");
        self.delete(url, write_key).await
    }

    /// Device ids the server currently holds a hardware channel for.
    ///
    /// `GET api/v1/ws/status`
    pub async fn connection_status(
        &self,
        read_key: &SecretString,
    ) -> Result<ConnectionStatus, Error> {
        let url = self.api_url("ws/status")?;
        debug!("fetching connection status");
        self.get(url, Some(read_key)).await
    }

    /// URL of the rendered payment QR image for one switch.
    ///
    /// `cache_buster` is appended as a bare query string so repeated opens
    /// never reuse a cached image.
    pub fn qrcode_url(&self, device_id: &str, switch_id: &str, cache_buster: i64) -> Result<Url, Error> {
        let mut url = self.root_url("device")?;
        push_ids(&mut url, &[device_id, switch_id, "qrcode"])?;
        url.set_query(Some(&cache_buster.to_string()));
        Ok(url)
    }
}

// Catalog endpoints
//
// Unauthenticated lookup lists the console uses to populate editor choices.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;

impl ApiClient {
    /// IANA timezone names the server accepts, sorted case-insensitively.
    ///
    /// `GET api/v1/timezones`
    pub async fn list_timezones(&self) -> Result<Vec<String>, Error> {
        let url = self.api_url("timezones")?;
        debug!("listing timezones");
        self.get(url, None).await
    }

    /// Fiat currency codes the server can price in (besides `sat`).
    ///
    /// `GET api/v1/currencies`
    pub async fn list_currencies(&self) -> Result<Vec<String>, Error> {
        let url = self.api_url("currencies")?;
        debug!("listing currencies");
        self.get(url, None).await
    }
}

// Apartment document, property tree and session endpoints.

use reqwest::Method;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::model::{Apartment, ApartmentStatus, FloatValue};
use crate::transport::Params;

const APARTMENT: &str = "api/v1/apartment";
const APARTMENT_STATUS: &str = "api/v1/apartment/status";
const LOGOUT: &str = "json/system/logout";

impl Client {
    /// Full apartment topology.
    ///
    /// `GET api/v1/apartment` (answers with the `{ data }` envelope)
    pub async fn get_apartment(&self) -> Result<Apartment, Error> {
        debug!("fetching apartment document");
        self.call_as(APARTMENT, &Params::new()).await
    }

    /// Live output values, submodule locks and device states.
    ///
    /// `GET api/v1/apartment/status`
    pub async fn get_apartment_status(&self) -> Result<ApartmentStatus, Error> {
        debug!("fetching apartment status");
        self.call_as(APARTMENT_STATUS, &Params::new()).await
    }

    /// `GET json/property/getFloating?path=`
    pub async fn property_get_floating(&self, path: &str) -> Result<FloatValue, Error> {
        self.call_as("json/property/getFloating", &Params::new().with("path", path))
            .await
    }

    /// End the session on the controller and forget the token.
    ///
    /// Single attempt; a no-op when not logged in.
    pub async fn logout(&self) -> Result<(), Error> {
        let Some(token) = self.session().clear().await else {
            return Ok(());
        };
        debug!("logging out");
        self.transport()
            .send(
                Method::GET,
                LOGOUT,
                &Params::new(),
                Some(token.expose()),
                None,
                None,
            )
            .await
            .map(drop)
    }
}

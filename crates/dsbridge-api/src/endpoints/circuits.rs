// Circuit (dSM meter) endpoints.

use crate::client::Client;
use crate::error::Error;
use crate::model::{Circuits, Consumption, EnergyMeterValue};
use crate::transport::Params;

impl Client {
    /// `GET json/apartment/getCircuits`
    pub async fn apartment_get_circuits(&self) -> Result<Circuits, Error> {
        self.call_as("json/apartment/getCircuits", &Params::new())
            .await
    }

    /// `GET json/circuit/getConsumption?id=` (watts)
    pub async fn circuit_get_consumption(&self, dsid: &str) -> Result<Consumption, Error> {
        self.call_as("json/circuit/getConsumption", &Params::new().with("id", dsid))
            .await
    }

    /// `GET json/circuit/getEnergyMeterValue?id=` (watt-seconds)
    pub async fn circuit_get_energy_meter_value(
        &self,
        dsid: &str,
    ) -> Result<EnergyMeterValue, Error> {
        self.call_as(
            "json/circuit/getEnergyMeterValue",
            &Params::new().with("id", dsid),
        )
        .await
    }
}

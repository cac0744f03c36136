// Device output channel endpoints.

use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::model::OutputChannelValues;
use crate::transport::Params;

impl Client {
    /// `GET json/device/setOutputChannelValue?dsid=&channelvalues=&applyNow=1`
    ///
    /// `channels` are `(channel name, value)` pairs, sent as `a=1;b=2`.
    pub async fn device_set_output_channel_value(
        &self,
        dsid: &str,
        channels: &[(&str, i64)],
    ) -> Result<(), Error> {
        let channel_values = channels
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(";");
        debug!(dsid, channel_values, "setting output channels");
        let params = Params::new()
            .with("dsid", dsid)
            .with("channelvalues", channel_values)
            .with("applyNow", 1);
        self.call("json/device/setOutputChannelValue", &params)
            .await
            .map(drop)
    }

    /// `GET json/device/getOutputChannelValue?dsid=&channels=a;b`
    pub async fn device_get_output_channel_value(
        &self,
        dsid: &str,
        channels: &[&str],
    ) -> Result<OutputChannelValues, Error> {
        let params = Params::new()
            .with("dsid", dsid)
            .with("channels", channels.join(";"));
        self.call_as("json/device/getOutputChannelValue", &params)
            .await
    }
}

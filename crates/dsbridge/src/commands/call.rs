//! `dsbridge call`: one resilient request, JSON result on stdout.

use dsbridge_api::Params;
use dsbridge_core::Bridge;

use crate::cli::CallArgs;
use crate::error::CliError;

pub async fn handle(bridge: &Bridge, args: CallArgs) -> Result<(), CliError> {
    let params: Params = args.params.into_iter().collect();

    let result = if args.post {
        bridge
            .client()
            .call_post(&args.endpoint, &params, None)
            .await
            .map_err(dsbridge_core::CoreError::from)
    } else {
        bridge.call(&args.endpoint, &params).await
    };

    // Log out whatever the outcome.
    bridge.disconnect().await;

    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

use crate::commands::common::{format_drain_report, open_context, signed_in, GlobalOptions};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let (_, context) = open_context(options).await?;
    let (uid, coordinator) = signed_in(&context).await?;
    let report = coordinator.flush(&uid).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_drain_report(&report));
    }
    Ok(())
}

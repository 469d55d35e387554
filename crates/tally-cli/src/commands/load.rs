use crate::commands::common::{format_load_summary, open_context, signed_in, GlobalOptions};
use crate::error::CliError;

pub async fn run_load(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let (_, context) = open_context(options).await?;
    let (uid, coordinator) = signed_in(&context).await?;
    let result = coordinator.load_all(&uid).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    for line in format_load_summary(&result) {
        println!("{line}");
    }
    Ok(())
}

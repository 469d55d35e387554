use tally_core::util::unix_millis_now;

use crate::commands::common::{
    format_queue_lines, open_context, queue_item_to_list_item, signed_in, GlobalOptions,
    QueueListItem,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let (_, context) = open_context(options).await?;
    let (uid, coordinator) = signed_in(&context).await?;
    let pending = coordinator.queue().pending(&uid).await?;

    if as_json {
        let json_items = pending
            .iter()
            .map(queue_item_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No pending writes.");
    } else {
        for line in format_queue_lines(&pending, unix_millis_now()) {
            println!("{line}");
        }
    }

    let total = coordinator.queue().total_size().await?;
    if total > pending.len() {
        println!(
            "{} more writes are queued for other accounts on this device.",
            total - pending.len()
        );
    }
    Ok(())
}

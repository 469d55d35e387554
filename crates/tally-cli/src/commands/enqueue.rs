use tally_core::models::MutationKind;
use tally_core::{Collection, Mutation};

use crate::commands::common::{
    format_drain_report, open_context, parse_data, signed_in, GlobalOptions,
};
use crate::error::CliError;

pub async fn run_enqueue(
    kind: MutationKind,
    collection: Collection,
    id: &str,
    data: Option<&str>,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let mutation = build_mutation(kind, collection, id, data)?;
    let (_, context) = open_context(options).await?;
    let (uid, coordinator) = signed_in(&context).await?;

    let outcome = coordinator.submit(&uid, mutation).await?;
    println!(
        "Queued {} {}/{} ({})",
        outcome.item.mutation.kind,
        outcome.item.mutation.collection,
        outcome.item.mutation.target_id,
        outcome.item.id
    );
    println!("{}", format_drain_report(&outcome.drain));
    Ok(())
}

/// Build the mutation described by the command line.
pub fn build_mutation(
    kind: MutationKind,
    collection: Collection,
    id: &str,
    data: Option<&str>,
) -> Result<Mutation, CliError> {
    let data = parse_data(data)?;
    let mutation = match (kind, data) {
        (MutationKind::Set, Some(data)) => Mutation::set(collection, id, data),
        (MutationKind::Update, Some(data)) => Mutation::update(collection, id, data),
        (MutationKind::Delete, None) => Mutation::delete(collection, id),
        (MutationKind::Set | MutationKind::Update, None) => {
            return Err(CliError::InvalidData(format!("{kind} requires --data")));
        }
        (MutationKind::Delete, Some(_)) => {
            return Err(CliError::InvalidData(
                "delete does not take --data".to_string(),
            ));
        }
    };
    mutation.validate()?;
    Ok(mutation)
}

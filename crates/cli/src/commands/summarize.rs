use ailvi_core::UserId;
use ailvi_service::SummaryOutcome;
use ailvi_storage::traits::SummaryStore;
use anyhow::Result;

use crate::{build_engine, open_storage};

pub(crate) async fn run(user: &str, list: bool) -> Result<()> {
    let user_id = UserId::new(user);

    if list {
        let storage = open_storage().await?;
        let summaries = storage.get_summaries(&user_id).await?;
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    let engine = build_engine().await?;
    match engine.summarize(&user_id).await? {
        SummaryOutcome::Delivered(summary) => println!("{}", summary.text),
        SummaryOutcome::RetryLater => {
            anyhow::bail!("summary pipeline failed for {user_id}, try again later")
        },
    }
    Ok(())
}

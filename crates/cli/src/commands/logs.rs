use ailvi_core::UserId;
use ailvi_storage::traits::MessageLogStore;
use anyhow::Result;

use crate::open_storage;

pub(crate) async fn run(user: &str, limit: usize) -> Result<()> {
    let storage = open_storage().await?;
    let entries = storage.recent_messages(&UserId::new(user), limit).await?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

//! Index administration helpers. Nothing here coordinates with other
//! writers: an index created between the check and the delete is not seen.

use tracing::info;

use crate::errors::Result;
use crate::transport::SearchTransport;

pub async fn index_exists<T>(transport: &T, index: &str) -> Result<bool>
where
    T: SearchTransport + ?Sized,
{
    if transport.index_exists(index).await? {
        info!("The index '{}' exists.", index);
        Ok(true)
    } else {
        info!("The index '{}' does not exist.", index);
        Ok(false)
    }
}

pub async fn delete_index<T>(transport: &T, index: &str) -> Result<()>
where
    T: SearchTransport + ?Sized,
{
    transport.delete_index(index).await?;
    info!("The index '{}' was deleted.", index);
    Ok(())
}

/// Returns whether a deletion happened.
pub async fn delete_index_if_exists<T>(transport: &T, index: &str) -> Result<bool>
where
    T: SearchTransport + ?Sized,
{
    if index_exists(transport, index).await? {
        delete_index(transport, index).await?;
        Ok(true)
    } else {
        Ok(false)
    }
}

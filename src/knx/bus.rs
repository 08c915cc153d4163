use super::address::GroupAddress;
use super::telegram::GroupTelegram;
use crate::error::Result;
use async_trait::async_trait;

/// Connection to the KNX bus as seen by the bridge sessions.
///
/// Every error returned here is treated as fatal by the caller.
#[async_trait]
pub trait BusClient: Send {
    /// Switch the connection into group monitor mode.
    async fn open_group_socket(&mut self) -> Result<()>;

    /// Wait for the next group telegram.
    async fn read_group_telegram(&mut self) -> Result<GroupTelegram>;

    /// Drop whatever mode the connection is in so it can be reopened.
    async fn reset_connection(&mut self) -> Result<()>;

    /// Send an APDU to a group address.
    async fn send_apdu(&mut self, dest: GroupAddress, apdu: &[u8]) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

pub mod fronius;
pub mod model;
pub mod poller;
pub mod store;
pub mod sun;

#[derive(Debug, Clone)]
pub enum Error {
    /// Response shape doesn't match any known collection type, or a required
    /// field is absent where zero-defaulting does not apply.
    MalformedResponse(String),
    /// Connection to the device could not be established or timed out.
    TransientNetwork(String),
    /// Anything else, including store-write failures.
    Unclassified(String),
}

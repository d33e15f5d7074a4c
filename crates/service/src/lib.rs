pub mod client;
pub mod directory;
pub mod outbound;
pub mod peer;
pub mod subtree;

pub use directory::Directory;
pub use outbound::Outbound;

/// A fresh message ID for S2S SAY/LIST/WHO/VERIFY (spec §4.5): a
/// 64-bit value off the system entropy source, wide enough that
/// collisions in the 48-entry window are negligible.
pub(crate) fn generate_id() -> u64 {
    rand::random()
}

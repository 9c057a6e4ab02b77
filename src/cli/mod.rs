pub mod options;
pub mod setup;

pub use options::ConvoyCli;
pub use setup::init_tracing;

#![doc = include_str!("../README.md")]

#[macro_use]
pub mod macros;
pub mod client;
pub mod service;
pub mod types;

cfg_if::cfg_if! {
    if #[cfg(feature = "stub_client")] {
        pub mod stub;
    }
}

pub mod prelude {
    //! Re-exports of everything needed to talk to the scoring backend
    pub use crate::client::RestClient;
    pub use crate::service::{ClientError, ScoringService};
    pub use crate::types::*;

    #[cfg(feature = "stub_client")]
    pub use crate::stub::StubClient;
}

//! External collaborators: generative-AI API and the JSON contract collection.

pub mod gemini_client {
    pub use crate::gemini_client::*;
}

pub mod rate_limiter {
    pub use crate::rate_limiter::*;
}

pub mod contract_store {
    pub use crate::contract_store::*;
}

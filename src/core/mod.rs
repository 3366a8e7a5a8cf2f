// Guarantee analysis: pure transformations over a contract's benefits
pub mod value_parser {
    pub use crate::value_parser::*;
}

pub mod slider {
    pub use crate::slider::*;
}

pub mod analyzer {
    pub use crate::analyzer::*;
}

pub mod frontend_config {
    pub use crate::frontend_config::*;
}

pub mod guarantee_catalog {
    pub use crate::guarantee_catalog::*;
}

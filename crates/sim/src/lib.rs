pub mod analysis;
pub mod feed;
pub mod model;

pub use analysis::NaiveAnalysis;
pub use feed::SyntheticFeed;
pub use model::HeuristicModel;

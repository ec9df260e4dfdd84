pub mod campaigns;
pub mod dashboard;
pub mod health;
pub mod influencers;
pub mod posts;
pub mod snapshots;

pub use campaigns::*;
pub use dashboard::*;
pub use health::*;
pub use influencers::*;
pub use posts::*;
pub use snapshots::*;

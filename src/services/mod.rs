pub mod articles;
pub mod dataset;
pub mod popularity;
pub mod predictor;
pub mod recommendations;
pub mod users;

pub use articles::{ArticleCatalog, ArticleRegistrar, NewArticle};
pub use dataset::Dataset;
pub use popularity::PopularityRanker;
pub use predictor::{Predictor, SvdppModel};
pub use recommendations::Recommender;
pub use users::UserRegistry;

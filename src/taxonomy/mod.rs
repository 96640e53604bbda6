pub mod model;
pub mod mutation;
pub mod store;

pub use model::{Classification, ClassificationLabels, Grade, Section, TaxonomyTree, Topic};
pub use mutation::{NodeDraft, NodeInput, TaxonomyCoordinator};
pub use store::TreeStore;

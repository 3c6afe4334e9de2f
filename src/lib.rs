pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod model;
pub mod parser;
pub mod path;
pub mod query;
pub mod schema;

pub use config::Config;
pub use error::{RelgraphError, Result};
pub use executor::{RawQueryClient, RecordedResponseClient, SurrealGraphExecutor};
pub use graph::{LivenessGraph, Matcher, MatchersWithTimestamp, VisiblePeriod};
pub use model::{GraphQueryExecutor, Model, ResourceMatcherQuery};
pub use parser::SurrealResponseParser;
pub use path::{PathFinder, PathV2};
pub use query::{QueryRequest, SurrealQueryBuilder};
pub use schema::{RelationCategory, RelationType, ResourceType, TraversalDirection};

pub mod core;
pub mod io;
pub mod parser;
pub mod run;
pub mod service;

pub use crate::core::config::ResolverConfig;
pub use crate::core::error::{GnResolverError, Result};
pub use crate::core::match_kind::MatchKind;
pub use crate::core::models::{CandidateMatch, NameQuery, NameRequest, ResolvedResponse};
pub use crate::core::resolver::{ResolveControl, Resolver, ResolverJob, ResultProcessor};
pub use crate::core::stats::{RunStatus, Stats};
pub use crate::run::{run, RunOptions};
pub use crate::service::{GnIndexClient, NameResolutionService, ServiceError};

pub const DEFAULT_RESOLVER_URL: &str = "http://index-api.globalnames.org/api/graphql";

pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub const MAX_WORKERS: usize = 10;

pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

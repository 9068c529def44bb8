//! Weight-map caching between grid pairs.

mod weight_cache;

pub use weight_cache::{
    resolve_decorrelation, CacheKey, WeightCache, WeightSet, FALLBACK_DECORRELATION,
};

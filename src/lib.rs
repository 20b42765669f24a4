//! Armada reconciles declarative deployment templates stored in its database
//! against one or more Kubernetes clusters. It resolves the template currently
//! live on each target cluster, merges caller-supplied changes onto it, mints
//! new immutable template versions, and fans the result out across clusters
//! while recording every publish attempt.
//!
//! The HTTP layer, authentication, and the real Kubernetes transport live in
//! the embedding service; armada is the core they call into.

pub mod api;
pub mod cluster;
pub mod conf;
pub mod storage;
pub mod workload;

//! # airline-nlu
//!
//! Rule-based natural language understanding for airline reservation queries.
//!
//! An utterance such as "Show flights from DEL to BOM" is normalized, its
//! entities extracted, its intent classified against a fixed catalog, its
//! slots resolved, and finally turned into a declarative, parameter-bound
//! [`nlu::QueryDescriptor`] (or an action request, or a request for the
//! missing slot). The core is synchronous and pure; [`service`] and
//! [`http_server`] add the optional external annotator and an HTTP surface.

pub mod config;
pub mod error;
pub mod http_server;
pub mod logging;
pub mod nlu;
pub mod service;

pub use error::{Error, Result};
pub use nlu::{Interpretation, Pipeline};
pub use service::NluService;

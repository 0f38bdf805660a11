use error::QuarryError;

pub mod artifact;
pub mod error;
pub mod local;
pub mod policy;
pub mod processing;
pub mod provider;
pub mod query;
pub mod remote;
pub mod repository;
pub mod sink;
pub mod status;

#[cfg(test)]
mod test_utils;

pub type QuarryResult<T> = std::result::Result<T, QuarryError>;

mod auth;
mod binary;
mod client;
mod col;
pub mod constant;
mod engine;
pub mod error;
mod framed;
mod long_data;
mod opts;
mod prepared;
mod task;
mod transport;
mod value;

pub use client::{stream_param, Client, ClientEvent};
pub use col::ColumnDescriptor;
pub use error::{Error, Result};
pub use opts::{Character, Opts};
pub use task::{OkPayload, QueryOutcome, Resultset};
pub use value::{Param, Value};

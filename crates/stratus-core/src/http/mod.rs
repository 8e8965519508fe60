//! HTTP request pipeline: request/response model, the policy chain and the
//! curl transport at its end.

mod body;
mod headers;
mod pipeline;
mod policies;
mod request;
mod response;
mod transport;

pub use body::{read_to_end, BodyStream, FileBody, MemoryBody};
pub use headers::Headers;
pub use pipeline::{Next, Pipeline, PipelineBuilder, Policy};
pub use policies::{
    LoggingPolicy, PerRetryPolicy, RequestIdPolicy, TelemetryPolicy, API_VERSION, HEADER_DATE,
    HEADER_REQUEST_ID, HEADER_VERSION,
};
pub use request::{redacted_url, Method, Request};
pub use response::{reason_phrase, AttemptStats, Response};
pub use transport::{CurlTransport, Transport, TransportOptions};

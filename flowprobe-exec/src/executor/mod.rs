pub mod events;
pub mod http;
mod orchestrator;
mod request;
pub mod response;
mod result;
mod step_runner;
mod types;

pub use events::{
    CompositeEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink, TracingEventSink,
};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use orchestrator::Orchestrator;
pub use request::{build_request, RequestBuildError};
pub use result::{AuthStatus, ExecutionError, RunSummary, StepResponse, TestResult, TestStatus};
pub use types::{ConfigError, ExecutorConfig, RunOptions};

use crate::mapping::Json;
use crate::transport::RawResponse;
use thiserror::Error;

/// Boxed error used for caller-supplied domain errors and preserved causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by nodes and chains.
///
/// Every stage converts its internal failures into one of these variants at
/// its own boundary; nothing else ever crosses from one node to the next.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The route could not be resolved into an absolute URL.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Connectivity or transport failure reported by the HTTP client.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// 4xx/5xx status with no server-specific mapping.
    #[error(transparent)]
    Http(#[from] HttpStatusError),

    /// Domain error produced by an [`ErrorMapperAdapter`](crate::response::ErrorMapperAdapter).
    #[error(transparent)]
    ServerMapped(#[from] ServerMappedError),

    /// Body decoding or model mapping failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Cache adapter could not serve the request.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The server answered `304 Not Modified`.
    ///
    /// Carries the raw response so the caller can fall back to a cache.
    #[error("HTTP 304: not modified")]
    NotModified(Box<RawResponse>),

    /// The request payload could not be encoded with the selected strategy.
    #[error("Request encoding failed: {0}")]
    Encoding(String),

    /// The invocation was cancelled through its [`CancelHandle`](crate::cancel::CancelHandle).
    #[error("Call was cancelled")]
    Cancelled,

    /// A pager was asked for a page after it reported the end of the data.
    #[error("No more pages")]
    NoMorePages,

    /// Builder or configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl NodeError {
    /// Whether this error is the cancellation marker.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NodeError::Cancelled)
    }
}

impl From<anyhow::Error> for NodeError {
    fn from(err: anyhow::Error) -> Self {
        NodeError::Other(err.to_string())
    }
}

/// URL construction failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Cannot build URL from '{0}'")]
    CannotBuildUrl(String),
}

/// Transport-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("No internet connection")]
    NoInternetConnection,

    #[error("Request timed out")]
    Timeout,

    #[error("Can't connect to host: {0}")]
    CantConnectToHost(String),

    /// Any other failure raised by the HTTP client.
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::CantConnectToHost(err.to_string())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// Generic classification of a failed HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpStatusError {
    #[error("HTTP 400: bad request")]
    BadRequest { body: Vec<u8> },

    #[error("HTTP 401: unauthorized")]
    Unauthorized { body: Vec<u8> },

    #[error("HTTP 403: forbidden")]
    Forbidden { body: Vec<u8> },

    #[error("HTTP 404: not found")]
    NotFound,

    #[error("HTTP 500: internal server error")]
    InternalServerError { body: Vec<u8> },

    #[error("HTTP {status}: undefined error")]
    Undefined { status: u16, body: Vec<u8> },
}

impl HttpStatusError {
    /// HTTP status code this error was classified from.
    pub fn status(&self) -> u16 {
        match self {
            HttpStatusError::BadRequest { .. } => 400,
            HttpStatusError::Unauthorized { .. } => 401,
            HttpStatusError::Forbidden { .. } => 403,
            HttpStatusError::NotFound => 404,
            HttpStatusError::InternalServerError { .. } => 500,
            HttpStatusError::Undefined { status, .. } => *status,
        }
    }
}

/// A server error body mapped into a domain error by an adapter.
#[derive(Error, Debug)]
#[error("HTTP {status}: {source}")]
pub struct ServerMappedError {
    /// Original HTTP status.
    pub status: u16,
    /// Decoded error body.
    pub payload: Json,
    /// The domain error returned by the adapter.
    #[source]
    pub source: BoxError,
}

impl ServerMappedError {
    /// Borrow the domain error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }
}

/// Body decoding and model mapping failures.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not valid for the configured codec.
    #[error("Bad JSON format: {0}")]
    BadJsonFormat(String),

    /// A model could not be converted into its raw payload.
    #[error("Can't map object to raw: {0}")]
    CantMapObjectToRaw(#[source] MappingError),

    /// A raw payload could not be converted into the model.
    #[error("Can't map object from raw: {0}")]
    CantMapObjectFromRaw(#[source] MappingError),
}

/// Failures raised by [`RawEncodable`](crate::mapping::RawEncodable) and
/// [`RawDecodable`](crate::mapping::RawDecodable) implementations.
#[derive(Error, Debug)]
pub enum MappingError {
    /// A non-empty payload is missing the array wrapper key.
    #[error("Can't find array key in raw: {0:?}")]
    CantFindKeyInRaw(Json),

    /// A required key is absent or has the wrong type.
    #[error("Missing or mistyped key '{0}'")]
    MissingKey(String),

    /// The serde codec rejected the value.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The value did not serialize to a JSON object.
    #[error("Value is not a JSON object")]
    NotAnObject,

    #[error("{0}")]
    Custom(String),
}

/// Cache adapter failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Can't find response in cache")]
    CantFindInCache,

    #[error("Can't load response from cache: {0}")]
    CantLoadFromCache(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

pub mod engine;
pub mod entry;
pub mod error;
pub mod extract;
pub mod extractor;
pub mod feed;
pub mod metadata;
pub mod registry;
pub mod search;
pub mod suite;
pub mod thumbnail;
pub mod transport;

pub use engine::Scraper;
pub use error::{Error, Result};
pub use extractor::{ExtractionMethod, OEmbedMethod, ScrapeMethod};
pub use feed::{FeedInfo, FeedPage, FeedSource, FeedState, RawItem, Termination, VideoFeed};
pub use metadata::{Field, FieldValue, VideoRecord};
pub use registry::Registry;
pub use search::{SearchPage, SearchQuery, SearchSession};
pub use suite::{ApiTier, AttemptOutcome, Extraction, MethodAttempt, OrderBy, Suite, UrlMatch};
pub use transport::{
    BearerTokenSigner, Client, CredentialSigner, HttpTransport, Request, Response, Transport,
};

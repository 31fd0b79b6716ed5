mod http;
mod index_sync;
mod layout;
mod template;

pub use http::{
    http_backend_for, parse_download_backend_preference, parse_response_headers, CurlBackend,
    DownloadBackendPreference, HttpBackend, HttpResponseMeta, InProcessBackend,
};
pub use index_sync::{IndexLoad, IndexOrigin, IndexSync};
pub use layout::{resolve_cache_root, resolve_cache_root_from, CacheLayout};
pub use template::{TemplateFetcher, TemplateSource, DEFAULT_TEMPLATE_BASE_URL};
